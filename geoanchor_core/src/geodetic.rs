// geoanchor_core/src/geodetic.rs

use nalgebra::{Matrix3, Vector3};
use std::fmt::Debug;

use crate::frames::enu_frame;

// --- Geodetic Conversion Contract ---
/// Conversion between geodetic coordinates and the cartesian world frame.
/// Implementations are shared by every entity and must tolerate concurrent queries.
pub trait GeodeticService: Debug + Send + Sync {
    /// Latitude and longitude in degrees, altitude in metres above the ellipsoid.
    fn to_cartesian(&self, lat_deg: f64, lon_deg: f64, alt: f64) -> Vector3<f64>;

    /// Inverse of `to_cartesian`, returning `(lat_deg, lon_deg, alt)`.
    fn to_geodetic(&self, cartesian: &Vector3<f64>) -> (f64, f64, f64);

    /// The tangent frame at a cartesian point: columns are the east, north and up
    /// unit vectors expressed in the world frame.
    fn orientation_matrix_at(&self, cartesian: &Vector3<f64>) -> Matrix3<f64>;
}

/// The WGS84 reference ellipsoid, with ECEF as the cartesian world frame.
#[derive(Debug, Clone, Copy)]
pub struct Wgs84 {
    /// Semi-major axis in metres.
    pub a: f64,
    /// Flattening.
    pub f: f64,
}

impl Default for Wgs84 {
    fn default() -> Self {
        Self {
            a: 6_378_137.0,
            f: 1.0 / 298.257_223_563,
        }
    }
}

impl Wgs84 {
    /// First eccentricity squared.
    fn e2(&self) -> f64 {
        self.f * (2.0 - self.f)
    }

    /// Prime vertical radius of curvature at a geodetic latitude.
    fn prime_vertical_radius(&self, sin_lat: f64) -> f64 {
        self.a / (1.0 - self.e2() * sin_lat * sin_lat).sqrt()
    }

    fn enu_at(lat_rad: f64, lon_rad: f64) -> Matrix3<f64> {
        let (sin_lat, cos_lat) = lat_rad.sin_cos();
        let (sin_lon, cos_lon) = lon_rad.sin_cos();

        let east = Vector3::new(-sin_lon, cos_lon, 0.0);
        let north = Vector3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
        let up = Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);
        enu_frame(&east, &north, &up)
    }
}

impl GeodeticService for Wgs84 {
    fn to_cartesian(&self, lat_deg: f64, lon_deg: f64, alt: f64) -> Vector3<f64> {
        let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();
        let (sin_lon, cos_lon) = lon_deg.to_radians().sin_cos();
        let n = self.prime_vertical_radius(sin_lat);

        Vector3::new(
            (n + alt) * cos_lat * cos_lon,
            (n + alt) * cos_lat * sin_lon,
            (n * (1.0 - self.e2()) + alt) * sin_lat,
        )
    }

    fn to_geodetic(&self, cartesian: &Vector3<f64>) -> (f64, f64, f64) {
        let e2 = self.e2();
        let p = (cartesian.x * cartesian.x + cartesian.y * cartesian.y).sqrt();
        let lon = cartesian.y.atan2(cartesian.x);

        // Fixed-point iteration on latitude; converges to sub-millimetre in a few rounds
        // everywhere except exactly on the polar axis, handled separately.
        if p < 1e-9 {
            let b = self.a * (1.0 - self.f);
            let lat = if cartesian.z >= 0.0 { 90.0 } else { -90.0 };
            return (lat, lon.to_degrees(), cartesian.z.abs() - b);
        }

        let mut lat = cartesian.z.atan2(p * (1.0 - e2));
        let mut alt = 0.0;
        for _ in 0..8 {
            let sin_lat = lat.sin();
            let n = self.prime_vertical_radius(sin_lat);
            alt = p / lat.cos() - n;
            lat = cartesian.z.atan2(p * (1.0 - e2 * n / (n + alt)));
        }

        (lat.to_degrees(), lon.to_degrees(), alt)
    }

    fn orientation_matrix_at(&self, cartesian: &Vector3<f64>) -> Matrix3<f64> {
        let (lat, lon, _) = self.to_geodetic(cartesian);
        Self::enu_at(lat.to_radians(), lon.to_radians())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{is_orthonormal, TangentFrame};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_equator_prime_meridian() {
        let wgs = Wgs84::default();
        let p = wgs.to_cartesian(0.0, 0.0, 0.0);
        assert_abs_diff_eq!(p, Vector3::new(6_378_137.0, 0.0, 0.0), epsilon = 1e-6);

        let m = wgs.orientation_matrix_at(&p);
        assert_abs_diff_eq!(m.east(), Vector3::y(), epsilon = 1e-9);
        assert_abs_diff_eq!(m.north(), Vector3::z(), epsilon = 1e-9);
        assert_abs_diff_eq!(m.up(), Vector3::x(), epsilon = 1e-9);
    }

    #[test]
    fn test_geodetic_round_trip_mid_latitude() {
        let wgs = Wgs84::default();
        let p = wgs.to_cartesian(57.7, 11.97, 120.0);
        let (lat, lon, alt) = wgs.to_geodetic(&p);
        assert_abs_diff_eq!(lat, 57.7, epsilon = 1e-9);
        assert_abs_diff_eq!(lon, 11.97, epsilon = 1e-9);
        assert_abs_diff_eq!(alt, 120.0, epsilon = 1e-4);
    }

    #[test]
    fn test_north_pole() {
        let wgs = Wgs84::default();
        let p = wgs.to_cartesian(90.0, 0.0, 10.0);
        let (lat, _, alt) = wgs.to_geodetic(&p);
        assert_abs_diff_eq!(lat, 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(alt, 10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_orientation_matrix_is_rotation() {
        let wgs = Wgs84::default();
        let p = wgs.to_cartesian(-33.9, 151.2, 0.0);
        let m = wgs.orientation_matrix_at(&p);
        assert!(is_orthonormal(&m, 1e-12));
        assert_abs_diff_eq!(m.determinant(), 1.0, epsilon = 1e-12);
    }
}
