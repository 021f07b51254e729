// geoanchor_core/src/frames.rs

//! Orthonormal tangent-frame helpers.
//!
//! A local orientation is stored as a 3x3 matrix whose columns are the east,
//! north and up unit vectors of the tangent frame, expressed in the anchor
//! context's coordinates. The pose composed for the rendering layer instead
//! uses an (east, up, north) ordering, see [`frame_rotation`].

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Squared length below which a vector is treated as having no direction.
pub const DEGENERATE_NORM_SQUARED: f64 = 1e-12;

/// Column accessors for a local orientation matrix.
pub trait TangentFrame {
    fn east(&self) -> Vector3<f64>;
    fn north(&self) -> Vector3<f64>;
    fn up(&self) -> Vector3<f64>;
}

impl TangentFrame for Matrix3<f64> {
    fn east(&self) -> Vector3<f64> {
        self.column(0).into_owned()
    }

    fn north(&self) -> Vector3<f64> {
        self.column(1).into_owned()
    }

    fn up(&self) -> Vector3<f64> {
        self.column(2).into_owned()
    }
}

/// Builds a local orientation matrix from its three basis vectors.
pub fn enu_frame(east: &Vector3<f64>, north: &Vector3<f64>, up: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::from_columns(&[*east, *north, *up])
}

/// Removes the component of `v` along the unit vector `axis`.
pub fn project_off_axis(v: &Vector3<f64>, axis: &Vector3<f64>) -> Vector3<f64> {
    v - v.dot(axis) * axis
}

/// Gram-Schmidt step used when the entity follows the surface: projects `east`
/// off `up`, renormalizes it, and returns `(east, north)` with `north = east x up`.
///
/// Returns `None` if `east` is parallel to `up`.
pub fn surface_basis(
    east: &Vector3<f64>,
    up: &Vector3<f64>,
) -> Option<(Vector3<f64>, Vector3<f64>)> {
    let east = project_off_axis(east, up).try_normalize(DEGENERATE_NORM_SQUARED.sqrt())?;
    let north = east.cross(up);
    Some((east, north))
}

/// Re-orthonormalizes a local orientation so that its up column equals the
/// normalized `up`. East keeps as much of its old direction as possible and
/// north completes a right-handed frame (`east x north = up`).
pub fn reorthonormalize(frame: &Matrix3<f64>, up: &Vector3<f64>) -> Option<Matrix3<f64>> {
    let up = up.try_normalize(DEGENERATE_NORM_SQUARED.sqrt())?;
    let east = project_off_axis(&frame.east(), &up).try_normalize(DEGENERATE_NORM_SQUARED.sqrt())?;
    let north = up.cross(&east);
    Some(enu_frame(&east, &north, &up))
}

/// Converts the basis triple into the frame rotation of a composed pose.
///
/// The rows of the row-vector matrix are `(east, up, north)`, i.e. the entity's
/// local X, Y and Z axes land on east, up and north. In nalgebra's column-vector
/// convention that is the matrix with those vectors as columns.
///
/// When the triple is not perfectly orthonormal (the fixed-frame branch on a
/// slope) the quaternion is extracted from the raw matrix and then normalized.
pub fn frame_rotation(
    east: &Vector3<f64>,
    up: &Vector3<f64>,
    north: &Vector3<f64>,
) -> UnitQuaternion<f64> {
    let row_layout = Matrix3::from_rows(&[east.transpose(), up.transpose(), north.transpose()]);
    let rot = Rotation3::from_matrix_unchecked(row_layout.transpose());
    UnitQuaternion::new_normalize(*UnitQuaternion::from_rotation_matrix(&rot).quaternion())
}

/// Yaw about Y, then pitch about X, then roll about Z, composed as `yaw * pitch * roll`.
pub fn yaw_pitch_roll(yaw: f64, pitch: f64, roll: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw)
        * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), pitch)
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), roll)
}

/// Signed angle from `from` to `to` about `axis` (right-handed), in `(-pi, pi]`.
pub fn signed_angle(from: &Vector3<f64>, to: &Vector3<f64>, axis: &Vector3<f64>) -> f64 {
    let det = axis.dot(&from.cross(to));
    let dot = to.dot(from);
    det.atan2(dot)
}

/// True if the columns of `m` are unit length and pairwise orthogonal within `eps`.
pub fn is_orthonormal(m: &Matrix3<f64>, eps: f64) -> bool {
    let c = [m.column(0), m.column(1), m.column(2)];
    let unit = c.iter().all(|v| (v.norm() - 1.0).abs() < eps);
    let ortho = c[0].dot(&c[1]).abs() < eps
        && c[1].dot(&c[2]).abs() < eps
        && c[0].dot(&c[2]).abs() < eps;
    unit && ortho
}

/// Entity-intrinsic rotation layered on top of the tangent frame, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngles {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl EulerAngles {
    pub fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn to_quaternion(&self) -> UnitQuaternion<f64> {
        yaw_pitch_roll(self.yaw, self.pitch, self.roll)
    }

    pub fn with_yaw(mut self, yaw: f64) -> Self {
        self.yaw = yaw;
        self
    }
}
