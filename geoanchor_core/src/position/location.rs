// geoanchor_core/src/position/location.rs

use nalgebra::Vector3;
use std::fmt::Debug;

use crate::error::MapError;
use crate::map::{GlobalPosition, SystemMap};
use crate::options::LocationOptions;
use crate::position::{KinematicState, MapPosition, PoseOverride};
use crate::types::{ContextHandle, Transform};

/// Anything that can say where an anchored entity should be at a query time,
/// before ground clamping and frame composition.
pub trait PoseSource: Debug {
    fn derive_pose(&self, base: &MapPosition, time: f64, options: &LocationOptions) -> PoseOverride;
}

/// How a located entity moves between updates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Motion {
    /// Stays wherever it was last put.
    #[default]
    Static,
    /// Dead-reckons from the last kinematic sample.
    Kinematic(KinematicState),
}

impl PoseSource for Motion {
    fn derive_pose(&self, base: &MapPosition, time: f64, options: &LocationOptions) -> PoseOverride {
        match self {
            Motion::Static => PoseOverride::default(),
            Motion::Kinematic(state) => state.derive(base, time, options),
        }
    }
}

/// An entity's anchored position together with its motion model.
#[derive(Debug, Clone, PartialEq)]
pub struct MapLocation {
    pos: MapPosition,
    motion: Motion,
}

impl MapLocation {
    pub fn new_static(context: ContextHandle) -> Self {
        Self {
            pos: MapPosition::new(context),
            motion: Motion::Static,
        }
    }

    /// A kinematic location at rest until its first `set_kinematic_params`.
    pub fn new_kinematic(context: ContextHandle) -> Self {
        Self {
            pos: MapPosition::new(context),
            motion: Motion::Kinematic(KinematicState::default()),
        }
    }

    pub fn with_motion(pos: MapPosition, motion: Motion) -> Self {
        Self { pos, motion }
    }

    pub fn map_pos(&self) -> &MapPosition {
        &self.pos
    }

    pub fn map_pos_mut(&mut self) -> &mut MapPosition {
        &mut self.pos
    }

    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    pub fn is_kinematic(&self) -> bool {
        matches!(self.motion, Motion::Kinematic(_))
    }

    /// The pose at `time`: derive from the motion model, then clamp and compose.
    pub fn step(&mut self, map: &SystemMap, time: f64, options: &LocationOptions) -> Transform {
        let pose = self.motion.derive_pose(&self.pos, time, options);
        self.pos.compose(map, options, pose)
    }

    /// Moves the entity to a world cartesian point and stores a world-frame velocity
    /// and acceleration sample taken at time `t`.
    ///
    /// Only valid for kinematic locations. On error neither the position nor the
    /// previous sample is modified.
    #[allow(clippy::too_many_arguments)]
    pub fn set_kinematic_params(
        &mut self,
        map: &SystemMap,
        x: f64,
        y: f64,
        z: f64,
        velocity: Vector3<f64>,
        acceleration: Vector3<f64>,
        t: f64,
    ) -> Result<(), MapError> {
        if !self.is_kinematic() {
            return Err(MapError::InvalidInput(
                "kinematic parameters on a static location".to_string(),
            ));
        }

        let world = GlobalPosition::Cartesian(Vector3::new(x, y, z));
        let state = KinematicState::from_world(map, &mut self.pos, world, velocity, acceleration, t)?;
        self.motion = Motion::Kinematic(state);
        Ok(())
    }
}
