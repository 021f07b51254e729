// geoanchor_core/src/context.rs

use nalgebra::{Isometry3, Matrix3, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use tracing::debug;

use crate::error::MapError;
use crate::frames::TangentFrame;
use crate::geodetic::GeodeticService;
use crate::types::ContextHandle;

/// A scene-graph node that defines the local frame positions are expressed in.
#[derive(Debug, Clone)]
pub struct AnchorContext {
    pub name: String,
    /// Maps context-local coordinates to world (cartesian) coordinates.
    pub to_world: Isometry3<f64>,
}

impl AnchorContext {
    pub fn new(name: impl Into<String>, to_world: Isometry3<f64>) -> Self {
        Self {
            name: name.into(),
            to_world,
        }
    }

    /// A context whose origin sits at the given geodetic point with local axes
    /// X = east, Y = up, Z = south.
    pub fn topocentric(
        name: impl Into<String>,
        geodetic: &dyn GeodeticService,
        lat_deg: f64,
        lon_deg: f64,
        alt: f64,
    ) -> Self {
        let origin = geodetic.to_cartesian(lat_deg, lon_deg, alt);
        let enu = geodetic.orientation_matrix_at(&origin);
        let axes = Matrix3::from_columns(&[enu.east(), enu.up(), -enu.north()]);
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(axes));
        Self::new(name, Isometry3::from_parts(Translation3::from(origin), rotation))
    }

    pub fn local_to_world(&self, local: &Vector3<f64>) -> Vector3<f64> {
        (self.to_world * Point3::from(*local)).coords
    }

    pub fn world_to_local(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.to_world.inverse_transform_point(&Point3::from(*world)).coords
    }

    /// Re-expresses a world-frame direction matrix (e.g. an ENU basis) in context axes.
    pub fn world_matrix_to_local(&self, m: &Matrix3<f64>) -> Matrix3<f64> {
        self.to_world.rotation.to_rotation_matrix().matrix().transpose() * m
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    context: Option<AnchorContext>,
}

/// Owns anchor contexts and hands out weak, generational handles to them.
#[derive(Debug, Default, Clone)]
pub struct ContextRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, context: AnchorContext) -> ContextHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.context = Some(context);
            return ContextHandle::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            context: Some(context),
        });
        ContextHandle::new(index, 0)
    }

    /// Removes a context. Handles to it become stale; the slot is reused with a new generation.
    pub fn remove(&mut self, handle: ContextHandle) -> Option<AnchorContext> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let context = slot.context.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        debug!(?handle, name = %context.name, "Anchor context removed");
        Some(context)
    }

    pub fn get(&self, handle: ContextHandle) -> Result<&AnchorContext, MapError> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.context.as_ref())
            .ok_or(MapError::StaleContext(handle))
    }

    pub fn get_mut(&mut self, handle: ContextHandle) -> Result<&mut AnchorContext, MapError> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.context.as_mut())
            .ok_or(MapError::StaleContext(handle))
    }

    pub fn contains(&self, handle: ContextHandle) -> bool {
        self.get(handle).is_ok()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.context.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the transform taking coordinates in `from` to coordinates in `to`.
    pub fn get_transform(
        &self,
        from: ContextHandle,
        to: ContextHandle,
    ) -> Result<Isometry3<f64>, MapError> {
        let from_to_world = self.get(from)?.to_world;
        let to_to_world = self.get(to)?.to_world;
        // T_to_from = (T_world_to)^-1 * T_world_from
        Ok(to_to_world.inverse() * from_to_world)
    }
}
