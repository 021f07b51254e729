// geoanchor_core/src/error.rs

use crate::types::ContextHandle;
use thiserror::Error;

/// Every way a collaborator call can fail. None of these reach the caller of
/// `step`; they are absorbed there and only show up as `clamped == false`
/// or as a stale pose.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MapError {
    #[error("anchor context {0:?} is no longer registered")]
    StaleContext(ContextHandle),

    #[error("terrain provider is not initialized")]
    TerrainUnavailable,

    #[error("geodetic conversion service is not initialized")]
    GeodeticUnavailable,

    #[error("terrain data at ({x:.2}, {z:.2}) is not resident")]
    DataNotResident { x: f64, z: f64 },

    #[error("position ({x:.2}, {z:.2}) is outside the terrain coverage")]
    OutsideCoverage { x: f64, z: f64 },

    #[error("terrain is authored in context {expected:?}, query was in {actual:?}")]
    ContextMismatch {
        expected: ContextHandle,
        actual: ContextHandle,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
