pub mod compute;
pub mod keys;
