pub mod geospatial_api;
