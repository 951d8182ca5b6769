pub mod analyzers;
pub mod baselines;
pub mod config;
pub mod error;
pub mod estimate;
pub mod fetch;
pub mod geometry;
pub mod infra;
pub mod orchestrator;
pub mod output;
pub mod parser;
pub mod remote_sensing;
pub mod services;
pub mod summary;
pub mod synthetic;
pub mod thresholds;
pub mod vegetation;
