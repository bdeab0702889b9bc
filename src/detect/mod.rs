//! Person detection seam.
//!
//! The pipeline only sees `DetectionSource`. Concrete strategies live in
//! `backends` and are picked by `build_detector` from configuration.

mod backend;
mod backends;
mod registry;
mod result;

pub use backend::DetectionSource;
pub use backends::ReplayBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::{build_detector, DetectorKind, DetectorSettings};
pub use result::{non_max_suppression, BoundingBox, Detection, ObjectClass};
