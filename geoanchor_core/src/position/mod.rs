// geoanchor_core/src/position/mod.rs

//! Map-anchored positions and the per-frame transform derivation.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use tracing::debug;

use crate::error::MapError;
use crate::frames::{enu_frame, frame_rotation, surface_basis, EulerAngles, TangentFrame};
use crate::map::{GlobalPosition, SystemMap};
use crate::options::LocationOptions;
use crate::types::{ContextHandle, Transform};

mod clamp;
pub mod kinematic;
pub mod location;

pub use kinematic::KinematicState;
pub use location::{MapLocation, Motion, PoseSource};

/// Adjustments a pose source makes before the shared clamp + compose step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseOverride {
    /// New context-local position, e.g. from extrapolation.
    pub position: Option<Vector3<f64>>,
    /// New intrinsic yaw in radians; pitch and roll are never overridden.
    pub yaw: Option<f64>,
}

/// A static position anchored to a scene-graph context.
#[derive(Debug, Clone, PartialEq)]
pub struct MapPosition {
    /// Weak reference to the anchor context.
    context: ContextHandle,
    /// Position relative to `context`.
    position: Vector3<f64>,
    /// True if the last clamp refresh succeeded.
    clamped: bool,
    /// Surface normal in context coordinates, only trustworthy while `clamped`.
    normal: Vector3<f32>,
    /// Columns: east, north, up of the tangent frame at `position`, possibly
    /// re-oriented normal-to-surface by the last clamp.
    local_orientation: Matrix3<f64>,
    /// The geodetic tangent frame from the last set, never touched by clamps.
    /// Every clamp query starts from it.
    tangent_frame: Matrix3<f64>,
    euler: EulerAngles,
}

impl MapPosition {
    /// A position at the context origin with a flat, topocentric (X east, Y up,
    /// Z south) frame until the first set or clamp.
    pub fn new(context: ContextHandle) -> Self {
        let flat = enu_frame(
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(0.0, 0.0, -1.0),
            &Vector3::new(0.0, 1.0, 0.0),
        );
        Self {
            context,
            position: Vector3::zeros(),
            clamped: false,
            normal: Vector3::new(0.0, 1.0, 0.0),
            local_orientation: flat,
            tangent_frame: flat,
            euler: EulerAngles::default(),
        }
    }

    pub fn context(&self) -> ContextHandle {
        self.context
    }

    pub fn local_position(&self) -> &Vector3<f64> {
        &self.position
    }

    /// Single-precision position relative to the context.
    pub fn position(&self) -> Vector3<f32> {
        Vector3::new(
            self.position.x as f32,
            self.position.y as f32,
            self.position.z as f32,
        )
    }

    pub fn is_clamped(&self) -> bool {
        self.clamped
    }

    pub fn normal(&self) -> &Vector3<f32> {
        &self.normal
    }

    pub fn local_orientation(&self) -> &Matrix3<f64> {
        &self.local_orientation
    }

    /// The surface-independent tangent frame clamp queries are built from.
    pub fn tangent_frame(&self) -> &Matrix3<f64> {
        &self.tangent_frame
    }

    pub fn euler(&self) -> &EulerAngles {
        &self.euler
    }

    /// The entity-intrinsic rotation, without the tangent frame.
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.euler.to_quaternion()
    }

    pub fn set_geodetic_position(
        &mut self,
        map: &SystemMap,
        lat: f64,
        lon: f64,
        alt: f64,
    ) -> Result<(), MapError> {
        map.set_position(self, GlobalPosition::Geodetic { lat, lon, alt })
    }

    pub fn set_cartesian_position(
        &mut self,
        map: &SystemMap,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(), MapError> {
        map.set_position(self, GlobalPosition::Cartesian(Vector3::new(x, y, z)))
    }

    /// Sets the position directly in context coordinates, leaving frame and normal alone.
    pub fn set_local_position(&mut self, position: Vector3<f64>) {
        self.position = position;
    }

    /// Angles in radians.
    pub fn set_intrinsic_rotation(&mut self, yaw: f64, pitch: f64, roll: f64) {
        self.euler = EulerAngles::new(yaw, pitch, roll);
    }

    pub(crate) fn apply_frame(
        &mut self,
        position: Vector3<f64>,
        normal: Vector3<f32>,
        local_orientation: Matrix3<f64>,
    ) {
        self.position = position;
        self.normal = normal;
        self.local_orientation = local_orientation;
    }

    pub(crate) fn set_tangent_frame(&mut self, frame: Matrix3<f64>) {
        self.tangent_frame = frame;
    }

    pub(crate) fn reanchor_to(&mut self, context: ContextHandle) {
        self.context = context;
    }

    /// The static pose at `time`: clamp, then compose frame and intrinsic rotation.
    pub fn step(&mut self, map: &SystemMap, _time: f64, options: &LocationOptions) -> Transform {
        self.compose(map, options, PoseOverride::default())
    }

    /// The clamp + compose routine shared by every pose source.
    ///
    /// A failed clamp does not stop composition; the transform is then built from
    /// the last known normal and frame.
    pub fn compose(
        &mut self,
        map: &SystemMap,
        options: &LocationOptions,
        pose: PoseOverride,
    ) -> Transform {
        if let Some(position) = pose.position {
            self.position = position;
        }
        if let Some(yaw) = pose.yaw {
            self.euler.yaw = yaw;
        }

        self.ground_clamp(map, options);

        // The provider's normal and the output frame differ in handedness along Z.
        let n = self.normal;
        let up = Vector3::new(n.x as f64, n.y as f64, -(n.z as f64));
        let east = self.local_orientation.east();
        let fixed_north = -self.local_orientation.north();

        let (east, north) = if options.rotation.align_to_surface() {
            surface_basis(&east, &up).unwrap_or_else(|| {
                debug!(?east, ?up, "East parallel to surface normal, using fixed frame");
                (east, fixed_north)
            })
        } else {
            (east, fixed_north)
        };

        let frame = frame_rotation(&east, &up, &north);
        Transform::from_f64(&self.position, &(frame * self.rotation()))
    }
}
