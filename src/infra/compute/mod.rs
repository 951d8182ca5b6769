//! HTTP implementation of [`GeospatialBackend`](crate::services::geospatial_api::GeospatialBackend).

mod client;

pub use client::ComputeClient;
