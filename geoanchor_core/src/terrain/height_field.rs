// geoanchor_core/src/terrain/height_field.rs

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::RwLock;
use tracing::{debug, trace};

use crate::error::MapError;
use crate::frames::{reorthonormalize, TangentFrame};
use crate::terrain::{ClampMode, ClampQuery, ClampSample, TerrainProvider};
use crate::types::ContextHandle;

/// Grid posts skipped by the coarse level-of-detail used for `Standard` quality.
const COARSE_STRIDE: usize = 2;

/// Largest number of height posts a single field may hold.
const MAX_POSTS: usize = 1 << 26;

/// Identifies one square tile of grid posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub col: usize,
    pub row: usize,
}

/// Pages a tile in. Called from inside a blocking clamp; returns `false` if the
/// data could not be produced.
pub type TileLoader = Box<dyn Fn(TileId) -> bool + Send + Sync>;

/// Layout of the height grid in its anchor context. Posts run along +X
/// (columns) and +Z (rows); heights are along +Y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSpec {
    pub origin_x: f64,
    pub origin_z: f64,
    /// Distance between neighbouring posts in metres.
    pub spacing: f64,
    pub columns: usize,
    pub rows: usize,
    /// Posts per tile side.
    pub tile_size: usize,
}

impl GridSpec {
    /// Total number of posts, checked against overflow and `MAX_POSTS`.
    pub fn post_count(&self) -> Result<usize, MapError> {
        self.columns
            .checked_mul(self.rows)
            .filter(|n| *n <= MAX_POSTS)
            .ok_or_else(|| {
                MapError::InvalidInput(format!(
                    "grid of {} x {} posts exceeds {MAX_POSTS}",
                    self.columns, self.rows
                ))
            })
    }

    fn validate(&self) -> Result<(), MapError> {
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            return Err(MapError::InvalidInput(format!(
                "grid spacing must be positive, got {}",
                self.spacing
            )));
        }
        // The coarse level-of-detail needs every COARSE_STRIDE-th post to land on the edge.
        for (name, n) in [("columns", self.columns), ("rows", self.rows)] {
            if n < COARSE_STRIDE + 1 || (n - 1) % COARSE_STRIDE != 0 {
                return Err(MapError::InvalidInput(format!(
                    "grid {name} must be odd and at least 3, got {n}"
                )));
            }
        }
        if self.tile_size == 0 {
            return Err(MapError::InvalidInput("tile size must be non-zero".into()));
        }
        self.post_count().map(|_| ())
    }
}

/// Local height gradient and elevation at a point.
#[derive(Debug, Clone, Copy)]
struct SurfacePoint {
    height: f64,
    dh_dx: f64,
    dh_dz: f64,
}

impl SurfacePoint {
    fn normal(&self) -> Vector3<f64> {
        Vector3::new(-self.dh_dx, 1.0, -self.dh_dz).normalize()
    }
}

/// A tiled, paged height field authored in a single anchor context.
///
/// Tiles start out non-resident unless marked otherwise. A non-blocking clamp
/// against a missing tile fails; a blocking clamp pages it in through the
/// loader first.
pub struct HeightFieldTerrain {
    context: ContextHandle,
    spec: GridSpec,
    heights: Vec<f64>,
    resident: RwLock<HashSet<TileId>>,
    loader: Option<TileLoader>,
}

impl fmt::Debug for HeightFieldTerrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeightFieldTerrain")
            .field("context", &self.context)
            .field("spec", &self.spec)
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

impl HeightFieldTerrain {
    /// Creates a height field from row-major heights (`rows * columns` values).
    pub fn new(context: ContextHandle, spec: GridSpec, heights: Vec<f64>) -> Result<Self, MapError> {
        spec.validate()?;
        let expected = spec.post_count()?;
        if heights.len() != expected {
            return Err(MapError::InvalidInput(format!(
                "expected {expected} heights, got {}",
                heights.len()
            )));
        }
        if let Some(h) = heights.iter().find(|h| !h.is_finite()) {
            return Err(MapError::InvalidInput(format!("non-finite height {h}")));
        }

        Ok(Self {
            context,
            spec,
            heights,
            resident: RwLock::new(HashSet::new()),
            loader: None,
        })
    }

    /// Samples `height(x, z)` at every post.
    pub fn from_fn(
        context: ContextHandle,
        spec: GridSpec,
        height: impl Fn(f64, f64) -> f64,
    ) -> Result<Self, MapError> {
        spec.validate()?;
        let mut heights = Vec::with_capacity(spec.post_count()?);
        for row in 0..spec.rows {
            for col in 0..spec.columns {
                let x = spec.origin_x + col as f64 * spec.spacing;
                let z = spec.origin_z + row as f64 * spec.spacing;
                heights.push(height(x, z));
            }
        }
        Self::new(context, spec, heights)
    }

    pub fn with_loader(mut self, loader: TileLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn context(&self) -> ContextHandle {
        self.context
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn tile_count(&self) -> (usize, usize) {
        (
            (self.spec.columns + self.spec.tile_size - 1) / self.spec.tile_size,
            (self.spec.rows + self.spec.tile_size - 1) / self.spec.tile_size,
        )
    }

    pub fn mark_resident(&self, tile: TileId) {
        self.resident_mut().insert(tile);
    }

    pub fn make_all_resident(&self) {
        let (cols, rows) = self.tile_count();
        let mut resident = self.resident_mut();
        for row in 0..rows {
            for col in 0..cols {
                resident.insert(TileId { col, row });
            }
        }
    }

    pub fn evict(&self, tile: TileId) -> bool {
        self.resident_mut().remove(&tile)
    }

    pub fn is_resident(&self, tile: TileId) -> bool {
        self.resident
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&tile)
    }

    fn resident_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashSet<TileId>> {
        self.resident
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn post(&self, col: usize, row: usize) -> f64 {
        self.heights[row * self.spec.columns + col]
    }

    fn tile_of(&self, col: usize, row: usize) -> TileId {
        TileId {
            col: col / self.spec.tile_size,
            row: row / self.spec.tile_size,
        }
    }

    /// Fractional grid coordinates of a context-space point, or an error if it lies outside.
    fn grid_coords(&self, x: f64, z: f64) -> Result<(f64, f64), MapError> {
        let u = (x - self.spec.origin_x) / self.spec.spacing;
        let v = (z - self.spec.origin_z) / self.spec.spacing;
        let max_u = (self.spec.columns - 1) as f64;
        let max_v = (self.spec.rows - 1) as f64;
        if !(0.0..=max_u).contains(&u) || !(0.0..=max_v).contains(&v) {
            return Err(MapError::OutsideCoverage { x, z });
        }
        Ok((u, v))
    }

    /// Lower-left post and fractional offsets of the cell containing `(u, v)` on a
    /// grid that only uses every `stride`-th post.
    fn cell(&self, u: f64, v: f64, stride: usize) -> (usize, usize, f64, f64) {
        let last_col = (self.spec.columns - 1) / stride - 1;
        let last_row = (self.spec.rows - 1) / stride - 1;
        let ci = ((u / stride as f64).floor() as usize).min(last_col);
        let cj = ((v / stride as f64).floor() as usize).min(last_row);
        let fu = u / stride as f64 - ci as f64;
        let fv = v / stride as f64 - cj as f64;
        (ci * stride, cj * stride, fu, fv)
    }

    /// Makes sure every tile holding one of `posts` is resident, paging in if allowed.
    fn ensure_resident(
        &self,
        posts: &[(usize, usize)],
        wait_for_data: bool,
        x: f64,
        z: f64,
    ) -> Result<(), MapError> {
        for &(col, row) in posts {
            let tile = self.tile_of(col, row);
            if self.is_resident(tile) {
                continue;
            }
            if !wait_for_data {
                trace!(?tile, "Tile not resident, non-blocking clamp misses");
                return Err(MapError::DataNotResident { x, z });
            }
            let loaded = self.loader.as_ref().map_or(false, |load| load(tile));
            if !loaded {
                debug!(?tile, "Tile could not be paged in");
                return Err(MapError::DataNotResident { x, z });
            }
            debug!(?tile, "Tile paged in");
            self.mark_resident(tile);
        }
        Ok(())
    }

    /// Full-resolution intersection: the triangle of the grid cell containing the point.
    fn sample_exact(&self, u: f64, v: f64) -> ([(usize, usize); 4], SurfacePoint) {
        let (i, j, fu, fv) = self.cell(u, v, 1);
        let s = self.spec.spacing;
        let posts = [(i, j), (i + 1, j), (i, j + 1), (i + 1, j + 1)];
        let (h00, h10, h01, h11) = (
            self.post(i, j),
            self.post(i + 1, j),
            self.post(i, j + 1),
            self.post(i + 1, j + 1),
        );

        // Cells are split along the (i+1, j) - (i, j+1) diagonal.
        let point = if fu + fv <= 1.0 {
            SurfacePoint {
                height: h00 + fu * (h10 - h00) + fv * (h01 - h00),
                dh_dx: (h10 - h00) / s,
                dh_dz: (h01 - h00) / s,
            }
        } else {
            SurfacePoint {
                height: h11 + (1.0 - fu) * (h01 - h11) + (1.0 - fv) * (h10 - h11),
                dh_dx: (h11 - h01) / s,
                dh_dz: (h11 - h10) / s,
            }
        };
        (posts, point)
    }

    /// Coarse intersection: bilinear patch over every `COARSE_STRIDE`-th post.
    fn sample_coarse(&self, u: f64, v: f64) -> ([(usize, usize); 4], SurfacePoint) {
        let (i, j, fu, fv) = self.cell(u, v, COARSE_STRIDE);
        let k = COARSE_STRIDE;
        let span = self.spec.spacing * k as f64;
        let posts = [(i, j), (i + k, j), (i, j + k), (i + k, j + k)];
        let (h00, h10, h01, h11) = (
            self.post(i, j),
            self.post(i + k, j),
            self.post(i, j + k),
            self.post(i + k, j + k),
        );

        let point = SurfacePoint {
            height: h00 * (1.0 - fu) * (1.0 - fv)
                + h10 * fu * (1.0 - fv)
                + h01 * (1.0 - fu) * fv
                + h11 * fu * fv,
            dh_dx: ((h10 - h00) * (1.0 - fv) + (h11 - h01) * fv) / span,
            dh_dz: ((h01 - h00) * (1.0 - fu) + (h11 - h10) * fu) / span,
        };
        (posts, point)
    }
}

impl TerrainProvider for HeightFieldTerrain {
    fn clamp(&self, query: &ClampQuery) -> Result<ClampSample, MapError> {
        if query.context != self.context {
            return Err(MapError::ContextMismatch {
                expected: self.context,
                actual: query.context,
            });
        }

        let frame = query.local_orientation;
        if query.request.mode == ClampMode::None {
            let up = frame.up();
            return Ok(ClampSample {
                position: query.position,
                normal: Vector3::new(up.x as f32, up.y as f32, up.z as f32),
                local_orientation: frame,
            });
        }

        let (x, z) = (query.position.x, query.position.z);
        let (u, v) = self.grid_coords(x, z)?;
        let (posts, point) = if query.request.flags.highest_quality {
            self.sample_exact(u, v)
        } else {
            self.sample_coarse(u, v)
        };
        self.ensure_resident(&posts, query.request.flags.wait_for_data, x, z)?;

        let normal = point.normal();
        let local_orientation = match query.request.mode {
            ClampMode::GroundNormalToSurface => reorthonormalize(&frame, &normal).unwrap_or(frame),
            _ => frame,
        };

        Ok(ClampSample {
            position: Vector3::new(x, point.height, z),
            normal: Vector3::new(normal.x as f32, normal.y as f32, normal.z as f32),
            local_orientation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{enu_frame, is_orthonormal};
    use crate::terrain::{ClampFlags, ClampRequest};
    use approx::assert_abs_diff_eq;
    use nalgebra::Matrix3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn spec() -> GridSpec {
        GridSpec {
            origin_x: -8.0,
            origin_z: -8.0,
            spacing: 1.0,
            columns: 17,
            rows: 17,
            tile_size: 8,
        }
    }

    fn flat_frame() -> Matrix3<f64> {
        enu_frame(
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(0.0, 0.0, -1.0),
            &Vector3::new(0.0, 1.0, 0.0),
        )
    }

    fn query(position: Vector3<f64>, mode: ClampMode, flags: ClampFlags) -> ClampQuery {
        ClampQuery {
            context: ContextHandle::default(),
            position,
            local_orientation: flat_frame(),
            request: ClampRequest { mode, flags },
        }
    }

    fn waiting() -> ClampFlags {
        ClampFlags {
            wait_for_data: true,
            highest_quality: false,
        }
    }

    #[test]
    fn test_rejects_bad_grid() {
        let mut bad = spec();
        bad.columns = 16;
        assert!(HeightFieldTerrain::from_fn(ContextHandle::default(), bad, |_, _| 0.0).is_err());

        let res = HeightFieldTerrain::new(ContextHandle::default(), spec(), vec![0.0; 3]);
        assert!(matches!(res, Err(MapError::InvalidInput(_))));
    }

    #[test]
    fn test_huge_grid_is_rejected_before_sampling() {
        let calls = AtomicUsize::new(0);
        let sample = |_: f64, _: f64| {
            calls.fetch_add(1, Ordering::Relaxed);
            0.0
        };

        let absurd = GridSpec {
            origin_x: 0.0,
            origin_z: 0.0,
            spacing: 0.0,
            columns: 1 << 33,
            rows: 1 << 33,
            tile_size: 0,
        };
        let res = HeightFieldTerrain::from_fn(ContextHandle::default(), absurd, sample);
        assert!(matches!(res, Err(MapError::InvalidInput(_))));

        // Well-formed otherwise, but the post count overflows.
        let overflowing = GridSpec {
            columns: (1 << 33) + 1,
            rows: (1 << 33) + 1,
            ..spec()
        };
        let res = HeightFieldTerrain::from_fn(ContextHandle::default(), overflowing, sample);
        assert!(matches!(res, Err(MapError::InvalidInput(_))));
        assert!(overflowing.post_count().is_err());

        // Fits in usize but is far too large to allocate.
        let oversized = GridSpec {
            columns: (1 << 20) + 1,
            rows: (1 << 20) + 1,
            ..spec()
        };
        let res = HeightFieldTerrain::from_fn(ContextHandle::default(), oversized, sample);
        assert!(matches!(res, Err(MapError::InvalidInput(_))));

        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert_eq!(spec().post_count().unwrap(), 17 * 17);
    }

    #[test]
    fn test_no_wait_misses_on_cold_tile() {
        let terrain = HeightFieldTerrain::from_fn(ContextHandle::default(), spec(), |_, _| 5.0).unwrap();
        let q = query(Vector3::new(1.0, 100.0, 1.0), ClampMode::Ground, ClampFlags::default());
        assert!(matches!(
            terrain.clamp(&q),
            Err(MapError::DataNotResident { .. })
        ));
    }

    #[test]
    fn test_wait_for_data_pages_in_through_loader() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let terrain = HeightFieldTerrain::from_fn(ContextHandle::default(), spec(), |_, _| 5.0)
            .unwrap()
            .with_loader(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }));

        let q = query(Vector3::new(1.5, 100.0, 1.5), ClampMode::Ground, waiting());
        let sample = terrain.clamp(&q).unwrap();
        assert_abs_diff_eq!(sample.position, Vector3::new(1.5, 5.0, 1.5), epsilon = 1e-12);
        assert!(terrain.is_resident(TileId { col: 1, row: 1 }));
        let after_first = calls.load(Ordering::SeqCst);
        assert!(after_first >= 1);

        // Now resident: a non-blocking query succeeds without touching the loader.
        let q = query(Vector3::new(1.5, 100.0, 1.5), ClampMode::Ground, ClampFlags::default());
        assert!(terrain.clamp(&q).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), after_first);
    }

    #[test]
    fn test_wait_for_data_without_loader_fails() {
        let terrain = HeightFieldTerrain::from_fn(ContextHandle::default(), spec(), |_, _| 0.0).unwrap();
        let q = query(Vector3::new(0.0, 0.0, 0.0), ClampMode::Ground, waiting());
        assert!(terrain.clamp(&q).is_err());
    }

    #[test]
    fn test_outside_coverage() {
        let terrain = HeightFieldTerrain::from_fn(ContextHandle::default(), spec(), |_, _| 0.0).unwrap();
        terrain.make_all_resident();
        let q = query(Vector3::new(50.0, 0.0, 0.0), ClampMode::Ground, ClampFlags::default());
        assert!(matches!(terrain.clamp(&q), Err(MapError::OutsideCoverage { .. })));
    }

    #[test]
    fn test_context_mismatch() {
        let terrain = HeightFieldTerrain::from_fn(ContextHandle::new(4, 0), spec(), |_, _| 0.0).unwrap();
        let q = query(Vector3::zeros(), ClampMode::Ground, ClampFlags::default());
        assert!(matches!(terrain.clamp(&q), Err(MapError::ContextMismatch { .. })));
    }

    #[test]
    fn test_slope_height_and_normal() {
        // A plane rising 0.5 m per metre towards +X.
        let terrain =
            HeightFieldTerrain::from_fn(ContextHandle::default(), spec(), |x, _| 0.5 * x).unwrap();
        terrain.make_all_resident();
        let expected_normal = Vector3::new(-0.5, 1.0, 0.0).normalize();

        for highest_quality in [false, true] {
            let flags = ClampFlags {
                wait_for_data: false,
                highest_quality,
            };
            let q = query(Vector3::new(2.25, 0.0, -3.75), ClampMode::Ground, flags);
            let sample = terrain.clamp(&q).unwrap();
            assert_abs_diff_eq!(sample.position.y, 1.125, epsilon = 1e-12);
            let n = sample.normal.cast::<f64>();
            assert_abs_diff_eq!(n, expected_normal, epsilon = 1e-6);
            // Plain ground clamp leaves the frame alone.
            assert_eq!(sample.local_orientation, flat_frame());
        }
    }

    #[test]
    fn test_quality_levels_differ_on_curved_ground() {
        let terrain =
            HeightFieldTerrain::from_fn(ContextHandle::default(), spec(), |x, z| 0.1 * (x * x + z * z))
                .unwrap();
        terrain.make_all_resident();

        let at = Vector3::new(0.5, 0.0, 0.5);
        let coarse = terrain
            .clamp(&query(at, ClampMode::Ground, ClampFlags::default()))
            .unwrap();
        let exact = terrain
            .clamp(&query(
                at,
                ClampMode::Ground,
                ClampFlags {
                    wait_for_data: false,
                    highest_quality: true,
                },
            ))
            .unwrap();

        // True height is 0.05; the full-resolution triangle gets much closer.
        assert!((exact.position.y - 0.05).abs() < (coarse.position.y - 0.05).abs());
    }

    #[test]
    fn test_normal_to_surface_reorients_frame() {
        let terrain =
            HeightFieldTerrain::from_fn(ContextHandle::default(), spec(), |x, _| 0.5 * x).unwrap();
        terrain.make_all_resident();

        let q = query(
            Vector3::new(0.0, 0.0, 0.0),
            ClampMode::GroundNormalToSurface,
            ClampFlags::default(),
        );
        let sample = terrain.clamp(&q).unwrap();
        assert!(is_orthonormal(&sample.local_orientation, 1e-9));
        assert_abs_diff_eq!(
            sample.local_orientation.up(),
            Vector3::new(-0.5, 1.0, 0.0).normalize(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_mode_none_leaves_position() {
        let terrain = HeightFieldTerrain::from_fn(ContextHandle::default(), spec(), |_, _| 3.0).unwrap();
        // Works even with nothing resident: no ground data is needed.
        let at = Vector3::new(1.0, 42.0, 1.0);
        let sample = terrain
            .clamp(&query(at, ClampMode::None, ClampFlags::default()))
            .unwrap();
        assert_eq!(sample.position, at);
        assert_eq!(sample.normal, Vector3::new(0.0f32, 1.0, 0.0));
    }

    #[test]
    fn test_evict_makes_tile_cold_again() {
        let terrain = HeightFieldTerrain::from_fn(ContextHandle::default(), spec(), |_, _| 0.0).unwrap();
        terrain.make_all_resident();
        assert_eq!(terrain.tile_count(), (3, 3));
        assert!(terrain.evict(TileId { col: 0, row: 0 }));
        assert!(!terrain.is_resident(TileId { col: 0, row: 0 }));
        assert!(terrain.is_resident(TileId { col: 2, row: 2 }));
    }
}
