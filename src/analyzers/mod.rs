//! Classification, index and confidence stages shared by every estimation
//! path, plus the per-pixel raster path.

pub mod confidence;
pub mod indices;
pub mod raster;
pub mod severity;
pub mod speckle;
pub mod utility;
