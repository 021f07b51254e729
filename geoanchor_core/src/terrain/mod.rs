// geoanchor_core/src/terrain/mod.rs

//! The contract of the external terrain / ground clamp provider and the pure
//! mapping from per-query options to a clamp request.

use nalgebra::{Matrix3, Vector3};
use std::fmt::Debug;

use crate::error::MapError;
use crate::options::{LoadOptions, LocationOptions, PositionOptions, QualityOptions};
use crate::types::ContextHandle;

/// What the provider should do with the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClampMode {
    /// No ground contact; only the local frame is refreshed.
    #[default]
    None,
    /// Snap to the ground, keep the local frame independent of the surface normal.
    Ground,
    /// Snap to the ground and orient the local frame normal-to-surface.
    GroundNormalToSurface,
}

/// Provider-side flags of a clamp request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClampFlags {
    /// The call may block until the terrain data is resident.
    pub wait_for_data: bool,
    /// Use the highest-fidelity intersection available.
    pub highest_quality: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClampRequest {
    pub mode: ClampMode,
    pub flags: ClampFlags,
}

impl ClampRequest {
    /// Maps per-query options onto a provider request.
    ///
    /// | position | align to surface | mode                    |
    /// |----------|------------------|-------------------------|
    /// | Free     | any              | `None`                  |
    /// | Surface  | no               | `Ground`                |
    /// | Surface  | yes              | `GroundNormalToSurface` |
    pub fn from_options(options: &LocationOptions) -> Self {
        let mode = match (options.position, options.rotation.align_to_surface()) {
            (PositionOptions::Free, _) => ClampMode::None,
            (PositionOptions::Surface, false) => ClampMode::Ground,
            (PositionOptions::Surface, true) => ClampMode::GroundNormalToSurface,
        };

        let flags = ClampFlags {
            wait_for_data: options.load == LoadOptions::WaitForData,
            highest_quality: options.quality == QualityOptions::Highest,
        };

        Self { mode, flags }
    }
}

/// A single clamp query against the provider, in anchor-context coordinates.
#[derive(Debug, Clone, Copy)]
pub struct ClampQuery {
    pub context: ContextHandle,
    pub position: Vector3<f64>,
    /// The caller's current local orientation (east, north, up columns).
    pub local_orientation: Matrix3<f64>,
    pub request: ClampRequest,
}

/// Everything a successful clamp hands back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampSample {
    pub position: Vector3<f64>,
    pub normal: Vector3<f32>,
    pub local_orientation: Matrix3<f64>,
}

// --- TERRAIN PROVIDER TRAIT ---
/// The external terrain / clamp provider. One instance is shared by every entity,
/// so implementations must be safe for concurrent read-style queries.
pub trait TerrainProvider: Debug + Send + Sync {
    /// Clamps the query position. With `flags.wait_for_data` the call may block the
    /// calling thread until the needed data is paged in; without it the call must
    /// return immediately, failing with `MapError::DataNotResident` if it cannot answer.
    fn clamp(&self, query: &ClampQuery) -> Result<ClampSample, MapError>;
}

pub mod height_field;

pub use height_field::{GridSpec, HeightFieldTerrain, TileId, TileLoader};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RotationOptions;

    fn options(position: PositionOptions, rotation: RotationOptions) -> LocationOptions {
        LocationOptions {
            position,
            rotation,
            ..Default::default()
        }
    }

    #[test]
    fn test_clamp_mode_table() {
        let cases = [
            (PositionOptions::Free, RotationOptions::NONE, ClampMode::None),
            (
                PositionOptions::Free,
                RotationOptions::ALIGN_TO_SURFACE,
                ClampMode::None,
            ),
            (
                PositionOptions::Surface,
                RotationOptions::NONE,
                ClampMode::Ground,
            ),
            (
                PositionOptions::Surface,
                RotationOptions::ALIGN_TO_VELOCITY,
                ClampMode::Ground,
            ),
            (
                PositionOptions::Surface,
                RotationOptions::ALIGN_TO_SURFACE,
                ClampMode::GroundNormalToSurface,
            ),
        ];

        for (position, rotation, expected) in cases {
            let request = ClampRequest::from_options(&options(position, rotation));
            assert_eq!(request.mode, expected, "{position:?} / {rotation:?}");
        }
    }

    #[test]
    fn test_clamp_flags() {
        let base = LocationOptions::on_surface();
        assert_eq!(ClampRequest::from_options(&base).flags, ClampFlags::default());

        let waiting = ClampRequest::from_options(&base.with_load(LoadOptions::WaitForData));
        assert!(waiting.flags.wait_for_data);
        assert!(!waiting.flags.highest_quality);

        let precise = ClampRequest::from_options(
            &base
                .with_load(LoadOptions::WaitForData)
                .with_quality(QualityOptions::Highest),
        );
        assert!(precise.flags.wait_for_data);
        assert!(precise.flags.highest_quality);
    }
}
