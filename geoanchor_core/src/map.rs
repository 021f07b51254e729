// geoanchor_core/src/map.rs

use nalgebra::Vector3;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::context::{AnchorContext, ContextRegistry};
use crate::error::MapError;
use crate::frames::TangentFrame;
use crate::geodetic::GeodeticService;
use crate::position::MapPosition;
use crate::terrain::{ClampQuery, ClampRequest, ClampSample, TerrainProvider};
use crate::types::ContextHandle;

/// A point on the globe, as handed to the position setters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlobalPosition {
    /// Latitude / longitude in degrees, altitude in metres.
    Geodetic { lat: f64, lon: f64, alt: f64 },
    /// World-frame cartesian coordinates.
    Cartesian(Vector3<f64>),
}

/// The collaborators every map position talks to: the anchor contexts, the terrain
/// provider and the geodetic service. Either provider may be missing, in which case
/// the operations that need it degrade to no-ops.
#[derive(Debug, Default, Clone)]
pub struct SystemMap {
    pub contexts: ContextRegistry,
    terrain: Option<Arc<dyn TerrainProvider>>,
    geodetic: Option<Arc<dyn GeodeticService>>,
}

impl SystemMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_terrain(mut self, terrain: Arc<dyn TerrainProvider>) -> Self {
        self.terrain = Some(terrain);
        self
    }

    pub fn with_geodetic(mut self, geodetic: Arc<dyn GeodeticService>) -> Self {
        self.geodetic = Some(geodetic);
        self
    }

    pub fn set_terrain(&mut self, terrain: Option<Arc<dyn TerrainProvider>>) {
        self.terrain = terrain;
    }

    pub fn terrain(&self) -> Option<&dyn TerrainProvider> {
        self.terrain.as_deref()
    }

    pub fn geodetic(&self) -> Result<&dyn GeodeticService, MapError> {
        self.geodetic.as_deref().ok_or(MapError::GeodeticUnavailable)
    }

    pub fn add_context(&mut self, context: AnchorContext) -> ContextHandle {
        self.contexts.insert(context)
    }

    /// Adds a topocentric (X east, Y up, Z south) context at a geodetic origin.
    pub fn add_topocentric_context(
        &mut self,
        name: &str,
        lat: f64,
        lon: f64,
        alt: f64,
    ) -> Result<ContextHandle, MapError> {
        let context = AnchorContext::topocentric(name, self.geodetic()?, lat, lon, alt);
        Ok(self.contexts.insert(context))
    }

    pub fn to_cartesian(&self, global: &GlobalPosition) -> Result<Vector3<f64>, MapError> {
        match *global {
            GlobalPosition::Geodetic { lat, lon, alt } => {
                if !(lat.is_finite() && lon.is_finite() && alt.is_finite()) {
                    return Err(MapError::InvalidInput(format!(
                        "non-finite geodetic position ({lat}, {lon}, {alt})"
                    )));
                }
                Ok(self.geodetic()?.to_cartesian(lat, lon, alt))
            }
            GlobalPosition::Cartesian(p) => {
                if !p.iter().all(|c| c.is_finite()) {
                    return Err(MapError::InvalidInput(format!(
                        "non-finite cartesian position {p:?}"
                    )));
                }
                Ok(p)
            }
        }
    }

    /// Moves `pos` to a global position, expressed in its anchor context.
    ///
    /// Rebuilds the local orientation from the geodetic frame at the point, resets the
    /// normal to the local up axis and then refreshes through a non-clamping provider
    /// update. On error nothing on `pos` is modified.
    pub fn set_position(&self, pos: &mut MapPosition, global: GlobalPosition) -> Result<(), MapError> {
        let world = self.to_cartesian(&global)?;
        let geodetic = self.geodetic()?;
        let context = self.contexts.get(pos.context())?;

        let local = context.world_to_local(&world);
        let local_orientation = context.world_matrix_to_local(&geodetic.orientation_matrix_at(&world));
        let up = local_orientation.up();
        pos.apply_frame(
            local,
            Vector3::new(up.x as f32, up.y as f32, up.z as f32),
            local_orientation,
        );
        pos.set_tangent_frame(local_orientation);
        trace!(?global, ?local, "Position set");

        // A missing terrain provider is fine here: the geodetic frame is already valid.
        if self.terrain.is_some() {
            let _ = pos.ground_clamp_with(self, ClampRequest::default());
        }
        Ok(())
    }

    /// Issues one clamp request against the terrain provider for `pos`.
    pub fn update_position(
        &self,
        pos: &MapPosition,
        request: ClampRequest,
    ) -> Result<ClampSample, MapError> {
        let terrain = self.terrain.as_deref().ok_or(MapError::TerrainUnavailable)?;
        // A stale context must not reach the provider.
        self.contexts.get(pos.context())?;

        // Start from the geodetic frame so an earlier surface alignment cannot leak
        // into a query that asks for none.
        let query = ClampQuery {
            context: pos.context(),
            position: *pos.local_position(),
            local_orientation: *pos.tangent_frame(),
            request,
        };
        terrain.clamp(&query)
    }

    /// Re-expresses `pos` in another anchor context. The world-space location and
    /// orientation are unchanged; clamp state is kept.
    pub fn reanchor(&self, pos: &mut MapPosition, to: ContextHandle) -> Result<(), MapError> {
        let from = pos.context();
        let transform = self.contexts.get_transform(from, to)?;
        let rotation = transform.rotation.to_rotation_matrix();
        let position = transform.transform_point(&(*pos.local_position()).into()).coords;
        let normal = rotation * pos.normal().cast::<f64>();
        let local_orientation = rotation.matrix() * pos.local_orientation();
        let tangent_frame = rotation.matrix() * pos.tangent_frame();

        pos.reanchor_to(to);
        pos.apply_frame(
            position,
            Vector3::new(normal.x as f32, normal.y as f32, normal.z as f32),
            local_orientation,
        );
        pos.set_tangent_frame(tangent_frame);
        debug!(?from, ?to, "Position re-anchored");
        Ok(())
    }
}
