// geoanchor_core/src/types.rs

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

// --- Core Identifier ---
/// A weak, generational reference to an anchor context owned by a `ContextRegistry`.
///
/// The handle never keeps the context alive. Once the context is removed, every
/// lookup through an old handle fails with `MapError::StaleContext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContextHandle {
    pub index: u32,
    pub generation: u32,
}

impl ContextHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Packs the handle into a single integer, e.g. for use as a map key in an adapter layer.
    pub fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

// --- Pose Result ---
/// The only value handed back to the rendering layer: a single-precision position
/// relative to the anchor context plus a rotation. Recomputed on every query.
///
/// The two halves use different handedness. `position` is in context coordinates.
/// `rotation` is in the terrain provider's output convention, whose Z axis is
/// mirrored against the context: its up column is the surface normal with Z
/// negated, and north is the negated north of the context tangent frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

impl Transform {
    /// Builds a transform from double-precision parts, narrowing both to `f32`.
    pub fn from_f64(position: &Vector3<f64>, rotation: &UnitQuaternion<f64>) -> Self {
        let q = rotation.quaternion();
        Self {
            position: Vector3::new(position.x as f32, position.y as f32, position.z as f32),
            // Already unit length in f64, the cast does not need renormalizing.
            rotation: UnitQuaternion::new_unchecked(Quaternion::new(
                q.w as f32, q.i as f32, q.j as f32, q.k as f32,
            )),
        }
    }

    pub fn to_isometry(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.position), self.rotation)
    }
}
