//! Density accumulation and overlay rendering.

pub mod grid;
pub mod overlay;

pub use grid::{
    DensityGrid, DensityStats, GridParams, GridSnapshot, DEFAULT_CELL_SIZE, DEFAULT_DECAY_FACTOR,
    DEFAULT_SPREAD_MASS, DEFAULT_SPREAD_RADIUS, MAX_SPREAD_RADIUS,
};
pub use overlay::{OverlayRenderer, DEFAULT_OVERLAY_ALPHA};
