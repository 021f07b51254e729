// geoanchor_core/src/position/clamp.rs

use tracing::{debug, trace, warn};

use crate::error::MapError;
use crate::map::SystemMap;
use crate::options::LocationOptions;
use crate::position::MapPosition;
use crate::terrain::ClampRequest;

impl MapPosition {
    /// Refreshes position, normal and local orientation from the terrain provider.
    ///
    /// Returns whether the refresh succeeded, which is also stored in `clamped`.
    /// On failure every other field keeps its previous value.
    pub fn ground_clamp(&mut self, map: &SystemMap, options: &LocationOptions) -> bool {
        self.ground_clamp_with(map, ClampRequest::from_options(options))
    }

    pub fn ground_clamp_with(&mut self, map: &SystemMap, request: ClampRequest) -> bool {
        match map.update_position(self, request) {
            Ok(sample) => {
                self.apply_frame(sample.position, sample.normal, sample.local_orientation);
                self.clamped = true;
            }
            Err(err) => {
                match &err {
                    // Expected every frame while tiles stream in.
                    MapError::DataNotResident { .. } | MapError::OutsideCoverage { .. } => {
                        trace!(%err, ?request, "Ground clamp missed")
                    }
                    MapError::StaleContext(_) => warn!(%err, "Ground clamp on a detached position"),
                    _ => debug!(%err, ?request, "Ground clamp unavailable"),
                }
                self.clamped = false;
            }
        }
        self.clamped
    }
}
