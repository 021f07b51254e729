// geoanchor_core/src/position/kinematic.rs

use nalgebra::Vector3;
use tracing::trace;

use crate::error::MapError;
use crate::frames::{project_off_axis, signed_angle, TangentFrame, DEGENERATE_NORM_SQUARED};
use crate::map::{GlobalPosition, SystemMap};
use crate::options::LocationOptions;
use crate::position::{MapPosition, PoseOverride};

// --- Constant Acceleration Extrapolation ---
/// A kinematic sample in the entity's local frame, valid at `reference_time`.
///
/// Velocity and acceleration are expressed in the local frame at the time they were
/// set and are never re-rotated while extrapolating.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KinematicState {
    /// Context-local position at `reference_time`.
    pub sampled_position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub acceleration: Vector3<f64>,
    pub reference_time: f64,
}

impl KinematicState {
    /// Closed-form displacement after `dt`: `v*dt + a*dt^2/2`.
    pub fn displacement(&self, dt: f64) -> Vector3<f64> {
        self.velocity * dt + 0.5 * self.acceleration * dt * dt
    }

    /// Instantaneous velocity after `dt`.
    pub fn velocity_at(&self, dt: f64) -> Vector3<f64> {
        self.velocity + self.acceleration * dt
    }

    /// Extrapolated position and heading at `time`, before clamping.
    ///
    /// `base` supplies the current local frame; its up and north columns define
    /// the heading reference. No bound is put on `time - reference_time`.
    pub fn derive(&self, base: &MapPosition, time: f64, options: &LocationOptions) -> PoseOverride {
        let dt = time - self.reference_time;
        let v = self.displacement(dt);

        // Stationary: nothing moved, the current position stands.
        if v.dot(&v) == 0.0 {
            return PoseOverride::default();
        }

        let position = Some(self.sampled_position + v);
        if !options.rotation.align_to_velocity() {
            return PoseOverride {
                position,
                yaw: None,
            };
        }

        PoseOverride {
            position,
            yaw: self.heading(base, dt),
        }
    }

    /// Yaw that turns the frame's north onto the direction of travel, or `None`
    /// (keep the current yaw) when the tangential velocity has no direction.
    fn heading(&self, base: &MapPosition, dt: f64) -> Option<f64> {
        let frame = base.local_orientation();
        let n = frame.up();
        let north = frame.north();

        let Some(direction) = self.velocity_at(dt).try_normalize(DEGENERATE_NORM_SQUARED.sqrt())
        else {
            trace!(dt, "Instantaneous velocity is zero, holding heading");
            return None;
        };

        let proj = project_off_axis(&direction, &n);
        if proj.norm_squared() < DEGENERATE_NORM_SQUARED {
            trace!(?direction, "Velocity parallel to up axis, holding heading");
            return None;
        }

        Some(-signed_angle(&north, &proj, &n))
    }

    /// Re-expresses world-frame velocity and acceleration in the local frame of `pos`.
    ///
    /// The world orientation at the point is inverted in full rather than transposed.
    pub fn from_world(
        map: &SystemMap,
        pos: &mut MapPosition,
        world: GlobalPosition,
        velocity_world: Vector3<f64>,
        acceleration_world: Vector3<f64>,
        time: f64,
    ) -> Result<Self, MapError> {
        if !(velocity_world.iter().chain(acceleration_world.iter()).all(|c| c.is_finite())
            && time.is_finite())
        {
            return Err(MapError::InvalidInput(
                "non-finite kinematic sample".to_string(),
            ));
        }

        let cartesian = map.to_cartesian(&world)?;
        let world_orientation = map.geodetic()?.orientation_matrix_at(&cartesian);
        let world_to_enu = world_orientation.try_inverse().ok_or_else(|| {
            MapError::InvalidInput("orientation matrix at point is singular".to_string())
        })?;

        map.set_position(pos, GlobalPosition::Cartesian(cartesian))?;

        let to_local = pos.local_orientation() * world_to_enu;
        Ok(Self {
            sampled_position: *pos.local_position(),
            velocity: to_local * velocity_world,
            acceleration: to_local * acceleration_world,
            reference_time: time,
        })
    }
}
