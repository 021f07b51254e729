// geoanchor_core/src/options.rs

//! Per-query configuration. Nothing here is persisted on a position; callers
//! pass a `LocationOptions` to every `step`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::{BitOr, BitOrAssign};

/// Whether the entity must rest on the ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PositionOptions {
    #[default]
    Free,
    Surface,
}

/// Whether a clamp query may block until terrain data is resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoadOptions {
    #[default]
    NoWait,
    WaitForData,
}

/// Whether to ask the provider for its most precise (and most expensive) intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QualityOptions {
    #[default]
    Standard,
    Highest,
}

/// Bit-set of orientation behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RotationOptions(u8);

impl RotationOptions {
    pub const NONE: Self = Self(0);
    /// Orientation follows the terrain slope.
    pub const ALIGN_TO_SURFACE: Self = Self(1 << 0);
    /// Heading follows the direction of travel (kinematic positions only).
    pub const ALIGN_TO_VELOCITY: Self = Self(1 << 1);

    const NAMED: [(&'static str, Self); 2] = [
        ("AlignToSurface", Self::ALIGN_TO_SURFACE),
        ("AlignToVelocity", Self::ALIGN_TO_VELOCITY),
    ];

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn align_to_surface(self) -> bool {
        self.contains(Self::ALIGN_TO_SURFACE)
    }

    pub fn align_to_velocity(self) -> bool {
        self.contains(Self::ALIGN_TO_VELOCITY)
    }

    fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl BitOr for RotationOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for RotationOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// Serialized as a list of flag names, e.g. `rotation = ["AlignToSurface"]`.
impl Serialize for RotationOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names())
    }
}

impl<'de> Deserialize<'de> for RotationOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names: Vec<String> = Deserialize::deserialize(deserializer)?;
        let mut flags = Self::NONE;
        for name in &names {
            let flag = Self::NAMED
                .iter()
                .find(|(n, _)| *n == name.as_str())
                .map(|(_, f)| *f)
                .ok_or_else(|| {
                    <D::Error as serde::de::Error>::unknown_variant(
                        name,
                        &["AlignToSurface", "AlignToVelocity"],
                    )
                })?;
            flags |= flag;
        }
        Ok(flags)
    }
}

/// The complete per-query configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationOptions {
    #[serde(default)]
    pub position: PositionOptions,
    #[serde(default)]
    pub rotation: RotationOptions,
    #[serde(default)]
    pub load: LoadOptions,
    #[serde(default)]
    pub quality: QualityOptions,
}

impl LocationOptions {
    /// Ground-following, surface-aligned, non-blocking.
    pub fn on_surface() -> Self {
        Self {
            position: PositionOptions::Surface,
            rotation: RotationOptions::ALIGN_TO_SURFACE,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rotation: RotationOptions) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_load(mut self, load: LoadOptions) -> Self {
        self.load = load;
        self
    }

    pub fn with_quality(mut self, quality: QualityOptions) -> Self {
        self.quality = quality;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_flags_combine() {
        let both = RotationOptions::ALIGN_TO_SURFACE | RotationOptions::ALIGN_TO_VELOCITY;
        assert!(both.align_to_surface());
        assert!(both.align_to_velocity());
        assert!(!RotationOptions::ALIGN_TO_SURFACE.align_to_velocity());
        assert!(RotationOptions::NONE.is_empty());
        // The empty set is contained in everything.
        assert!(RotationOptions::NONE.contains(RotationOptions::NONE));
    }

    #[test]
    fn test_rotation_flag_names() {
        let both = RotationOptions::ALIGN_TO_SURFACE | RotationOptions::ALIGN_TO_VELOCITY;
        assert_eq!(both.names(), vec!["AlignToSurface", "AlignToVelocity"]);
        assert!(RotationOptions::NONE.names().is_empty());
    }

    #[test]
    fn test_on_surface_defaults() {
        let opts = LocationOptions::on_surface();
        assert_eq!(opts.position, PositionOptions::Surface);
        assert_eq!(opts.load, LoadOptions::NoWait);
        assert_eq!(opts.quality, QualityOptions::Standard);
        assert!(opts.rotation.align_to_surface());
    }
}
