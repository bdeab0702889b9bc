//! Density grid accumulator.
//!
//! The frame is covered by a coarse grid of `cell_size × cell_size` pixel
//! cells. Every frame the grid decays by a constant factor and each person
//! centroid adds a unit impulse to its cell plus a small Gaussian spread over
//! the neighborhood. The result is a "recent activity" surface: with the
//! default 0.95 decay, a detection fades out over roughly 15-20 frames.
//!
//! Per-point cost is bounded by the kernel size, not by the grid size.

use serde::{Deserialize, Serialize};

use crate::error::{HeatmapError, Result};
use crate::frame::PointSample;

pub const DEFAULT_CELL_SIZE: u32 = 50;
pub const DEFAULT_DECAY_FACTOR: f32 = 0.95;
pub const DEFAULT_SPREAD_RADIUS: u32 = 2;
/// Fraction of a point's own mass distributed by the spreading kernel.
pub const DEFAULT_SPREAD_MASS: f32 = 0.5;
/// Largest accepted spread radius, in cells.
pub const MAX_SPREAD_RADIUS: u32 = 64;

/// Fixed shape parameters of a grid. They cannot change during a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridParams {
    pub cell_size: u32,
    pub spread_radius: u32,
    pub spread_mass: f32,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            spread_radius: DEFAULT_SPREAD_RADIUS,
            spread_mass: DEFAULT_SPREAD_MASS,
        }
    }
}

impl GridParams {
    pub fn validate(&self) -> Result<()> {
        if self.cell_size == 0 {
            return Err(HeatmapError::Configuration(
                "cell_size must be greater than zero".to_string(),
            ));
        }
        if self.spread_radius > MAX_SPREAD_RADIUS {
            return Err(HeatmapError::Configuration(format!(
                "spread_radius must be at most {}, got {}",
                MAX_SPREAD_RADIUS, self.spread_radius
            )));
        }
        if !self.spread_mass.is_finite() || !(0.0..=1.0).contains(&self.spread_mass) {
            return Err(HeatmapError::Configuration(format!(
                "spread_mass must be within [0, 1], got {}",
                self.spread_mass
            )));
        }
        Ok(())
    }
}

/// Square Gaussian weight matrix normalized to `mass`, built once per grid.
#[derive(Clone, Debug)]
struct SpreadKernel {
    radius: i64,
    /// Row-major, `(2 * radius + 1)^2` entries.
    weights: Vec<f32>,
}

impl SpreadKernel {
    fn gaussian(radius: u32, mass: f32) -> Self {
        if radius == 0 {
            return Self {
                radius: 0,
                weights: vec![mass],
            };
        }

        let r = radius as i64;
        let sigma = radius as f64 / 3.0;
        let two_sigma_sq = 2.0 * sigma * sigma;
        let raw: Vec<f64> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .map(|(dx, dy)| (-((dx * dx + dy * dy) as f64) / two_sigma_sq).exp())
            .collect();
        let total: f64 = raw.iter().sum();
        let weights = raw
            .iter()
            .map(|w| (w / total * mass as f64) as f32)
            .collect();

        Self { radius: r, weights }
    }

    fn side(&self) -> i64 {
        2 * self.radius + 1
    }
}

/// Summary over every cell of a grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DensityStats {
    pub max_density: f64,
    pub avg_density: f64,
    pub total_activity: f64,
}

/// Immutable copy of a grid, handed to the renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct GridSnapshot {
    width: usize,
    height: usize,
    cells: Vec<f32>,
}

impl GridSnapshot {
    pub fn new(width: usize, height: usize, cells: Vec<f32>) -> Option<Self> {
        if width == 0 || height == 0 || cells.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.cells[row * self.width + col])
    }

    pub fn max(&self) -> f32 {
        self.cells.iter().copied().fold(0.0, f32::max)
    }
}

/// Spatial accumulator sized once from the first frame of a run.
#[derive(Clone, Debug)]
pub struct DensityGrid {
    cells: Vec<f32>,
    grid_width: usize,
    grid_height: usize,
    params: GridParams,
    kernel: SpreadKernel,
}

impl DensityGrid {
    /// Allocates a zero-filled grid with the default spreading kernel.
    pub fn initialize(frame_height: u32, frame_width: u32, cell_size: u32) -> Result<Self> {
        Self::with_params(
            frame_height,
            frame_width,
            GridParams {
                cell_size,
                ..GridParams::default()
            },
        )
    }

    pub fn with_params(frame_height: u32, frame_width: u32, params: GridParams) -> Result<Self> {
        params.validate()?;
        if frame_height == 0 || frame_width == 0 {
            return Err(HeatmapError::Configuration(format!(
                "frame dimensions must be non-zero, got {}x{}",
                frame_width, frame_height
            )));
        }

        let grid_height = frame_height.div_ceil(params.cell_size) as usize;
        let grid_width = frame_width.div_ceil(params.cell_size) as usize;
        log::debug!(
            "density grid initialized: {}x{} cells for {}x{} frames (cell {}px)",
            grid_width,
            grid_height,
            frame_width,
            frame_height,
            params.cell_size
        );

        Ok(Self {
            cells: vec![0.0; grid_width * grid_height],
            grid_width,
            grid_height,
            params,
            kernel: SpreadKernel::gaussian(params.spread_radius, params.spread_mass),
        })
    }

    pub fn width(&self) -> usize {
        self.grid_width
    }

    pub fn height(&self) -> usize {
        self.grid_height
    }

    pub fn params(&self) -> GridParams {
        self.params
    }

    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    pub fn value(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.grid_width || row >= self.grid_height {
            return None;
        }
        Some(self.cells[row * self.grid_width + col])
    }

    /// Multiplies every cell by `factor`.
    ///
    /// Factors outside `[0, 1]` are clamped so cells stay non-negative.
    pub fn decay(&mut self, factor: f32) {
        let factor = factor.max(0.0).min(1.0);
        for cell in &mut self.cells {
            *cell *= factor;
        }
    }

    /// Maps a pixel coordinate to its (clamped) cell and deposits one impulse
    /// plus the spreading kernel. Returns the `(col, row)` that was hit.
    pub fn add_point(&mut self, x: i64, y: i64) -> (usize, usize) {
        let (col, row) = self.cell_for(x, y);
        let idx = row * self.grid_width + col;
        self.cells[idx] += 1.0;
        self.spread(col as i64, row as i64);
        (col, row)
    }

    /// One frame step: decay once, then add every sample in order.
    pub fn update(&mut self, decay_factor: f32, points: &[PointSample]) {
        self.decay(decay_factor);
        for point in points {
            self.add_point(point.x, point.y);
        }
    }

    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            width: self.grid_width,
            height: self.grid_height,
            cells: self.cells.clone(),
        }
    }

    pub fn stats(&self) -> DensityStats {
        let (max, sum) = self
            .cells
            .iter()
            .fold((0.0f64, 0.0f64), |(max, sum), &v| {
                (max.max(v as f64), sum + v as f64)
            });
        DensityStats {
            max_density: max,
            avg_density: sum / self.cells.len() as f64,
            total_activity: sum,
        }
    }

    /// Zero-fills in place, keeping the allocation and the kernel.
    pub fn reset(&mut self) {
        self.cells.fill(0.0);
    }

    fn cell_for(&self, x: i64, y: i64) -> (usize, usize) {
        let cell = self.params.cell_size as i64;
        let col = x.div_euclid(cell).clamp(0, self.grid_width as i64 - 1);
        let row = y.div_euclid(cell).clamp(0, self.grid_height as i64 - 1);
        (col as usize, row as usize)
    }

    fn spread(&mut self, col: i64, row: i64) {
        let side = self.kernel.side();
        let r = self.kernel.radius;
        for ky in 0..side {
            let target_row = row + ky - r;
            if target_row < 0 || target_row >= self.grid_height as i64 {
                continue;
            }
            for kx in 0..side {
                let target_col = col + kx - r;
                if target_col < 0 || target_col >= self.grid_width as i64 {
                    continue;
                }
                let weight = self.kernel.weights[(ky * side + kx) as usize];
                let idx = target_row as usize * self.grid_width + target_col as usize;
                self.cells[idx] += weight;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(h: u32, w: u32, cell: u32) -> DensityGrid {
        DensityGrid::initialize(h, w, cell).expect("grid")
    }

    fn sum(grid: &DensityGrid) -> f64 {
        grid.cells().iter().map(|&v| v as f64).sum()
    }

    #[test]
    fn dimensions_round_up() {
        let g = grid(480, 640, 50);
        assert_eq!(g.width(), 13);
        assert_eq!(g.height(), 10);
        assert!(g.cells().iter().all(|&v| v == 0.0));

        let exact = grid(100, 100, 50);
        assert_eq!((exact.width(), exact.height()), (2, 2));
    }

    #[test]
    fn zero_cell_size_is_a_configuration_error() {
        let err = DensityGrid::initialize(480, 640, 0).unwrap_err();
        assert!(matches!(err, HeatmapError::Configuration(_)));
    }

    #[test]
    fn zero_frame_dimension_is_rejected() {
        assert!(DensityGrid::initialize(0, 640, 50).is_err());
        assert!(DensityGrid::initialize(480, 0, 50).is_err());
    }

    #[test]
    fn kernel_sums_to_spread_mass() {
        let kernel = SpreadKernel::gaussian(2, 0.5);
        assert_eq!(kernel.weights.len(), 25);
        let total: f32 = kernel.weights.iter().sum();
        assert!((total - 0.5).abs() < 1e-6);
        let center = kernel.weights[12];
        assert!(kernel.weights.iter().all(|&w| w <= center));
    }

    #[test]
    fn add_point_in_interior_adds_exactly_one_and_a_half() {
        let mut g = grid(500, 500, 50);
        let (col, row) = g.add_point(260, 240);
        assert_eq!((col, row), (5, 4));
        assert!(g.value(5, 4).unwrap() >= 1.0);
        assert!((sum(&g) - 1.5).abs() < 1e-5);
    }

    #[test]
    fn add_point_in_corner_clips_spread() {
        let mut g = grid(500, 500, 50);
        g.add_point(0, 0);
        let total = sum(&g);
        assert!(g.value(0, 0).unwrap() >= 1.0);
        assert!(total > 1.0 && total < 1.5);
    }

    #[test]
    fn far_out_of_frame_points_are_clamped() {
        let mut g = grid(480, 640, 50);
        assert_eq!(g.add_point(i64::MAX, i64::MAX), (12, 9));
        assert_eq!(g.add_point(i64::MIN, -5), (0, 0));
        assert_eq!(g.add_point(-1, 10_000), (0, 9));
        assert!(g.cells().iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn decay_scales_every_cell() {
        let mut g = grid(300, 300, 50);
        g.add_point(10, 10);
        g.add_point(160, 200);
        let before = g.cells().to_vec();
        g.decay(0.5);
        for (after, prior) in g.cells().iter().zip(before.iter()) {
            assert_eq!(*after, prior * 0.5);
        }
    }

    #[test]
    fn repeated_decay_converges_without_going_negative() {
        let mut g = grid(300, 300, 50);
        g.add_point(150, 150);
        for _ in 0..2_000 {
            g.decay(0.95);
        }
        assert!(g.cells().iter().all(|&v| (0.0..1e-6).contains(&v)));
    }

    #[test]
    fn negative_decay_factor_is_clamped() {
        let mut g = grid(100, 100, 50);
        g.add_point(10, 10);
        g.decay(-3.0);
        assert!(g.cells().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn stats_report_max_mean_and_sum() {
        let mut g = grid(100, 200, 50);
        assert_eq!(g.stats().max_density, 0.0);
        g.add_point(25, 25);
        let stats = g.stats();
        assert!(stats.max_density >= 1.0);
        assert!((stats.total_activity - sum(&g)).abs() < 1e-9);
        assert!((stats.avg_density - stats.total_activity / 8.0).abs() < 1e-9);
    }

    #[test]
    fn reset_then_replay_is_deterministic() {
        let points = [
            PointSample { x: 30, y: 40 },
            PointSample { x: 320, y: 100 },
            PointSample { x: 900, y: -4 },
        ];
        let mut g = grid(480, 640, 50);
        for _ in 0..5 {
            g.update(0.95, &points);
        }
        let first = g.snapshot();

        g.reset();
        assert!(g.cells().iter().all(|&v| v == 0.0));
        for _ in 0..5 {
            g.update(0.95, &points);
        }
        assert_eq!(g.snapshot(), first);
    }

    #[test]
    fn snapshot_is_detached_from_later_updates() {
        let mut g = grid(100, 100, 50);
        g.add_point(0, 0);
        let snap = g.snapshot();
        g.add_point(0, 0);
        assert!(snap.get(0, 0).unwrap() < g.value(0, 0).unwrap());
    }

    #[test]
    fn zero_radius_keeps_spread_on_the_target_cell() {
        let params = GridParams {
            cell_size: 10,
            spread_radius: 0,
            spread_mass: 0.5,
        };
        let mut g = DensityGrid::with_params(30, 30, params).unwrap();
        g.add_point(15, 15);
        assert!((g.value(1, 1).unwrap() - 1.5).abs() < 1e-6);
        assert!((sum(&g) - 1.5).abs() < 1e-6);
        assert_eq!(g.params(), params);
    }

    #[test]
    fn oversized_spread_radius_is_a_configuration_error() {
        for spread_radius in [MAX_SPREAD_RADIUS + 1, 100_000, u32::MAX] {
            let params = GridParams {
                spread_radius,
                ..GridParams::default()
            };
            let err = DensityGrid::with_params(100, 100, params).unwrap_err();
            assert!(matches!(err, HeatmapError::Configuration(_)));
        }
        let widest = GridParams {
            spread_radius: MAX_SPREAD_RADIUS,
            ..GridParams::default()
        };
        assert!(DensityGrid::with_params(100, 100, widest).is_ok());
    }
}
