//! Heatmap overlay rendering.
//!
//! A grid snapshot is resampled to frame resolution, normalized by its own
//! peak, colored through the "hot" scale and alpha-blended over the frame.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::grid::GridSnapshot;
use crate::detect::Detection;
use crate::frame::Frame;

pub const DEFAULT_OVERLAY_ALPHA: f32 = 0.3;

const LUT_SIZE: usize = 256;
const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i32 = 2;

type DensityImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Piecewise-linear "hot" scale: black, red, yellow, white.
///
/// Anchors follow the classic `hot` colormap so output matches the usual
/// plotting tools.
fn hot(t: f64) -> [f64; 3] {
    const R: &[(f64, f64)] = &[(0.0, 0.0416), (0.365079, 1.0), (1.0, 1.0)];
    const G: &[(f64, f64)] = &[(0.0, 0.0), (0.365079, 0.0), (0.746032, 1.0), (1.0, 1.0)];
    const B: &[(f64, f64)] = &[(0.0, 0.0), (0.746032, 0.0), (1.0, 1.0)];
    [segment(R, t), segment(G, t), segment(B, t)]
}

fn segment(anchors: &[(f64, f64)], t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    for pair in anchors.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if t <= x1 {
            let span = x1 - x0;
            if span <= 0.0 {
                return y1;
            }
            return y0 + (y1 - y0) * (t - x0) / span;
        }
    }
    anchors.last().map(|&(_, y)| y).unwrap_or(0.0)
}

/// Renders grid snapshots onto frames.
#[derive(Clone, Debug)]
pub struct OverlayRenderer {
    lut: Vec<[u8; 3]>,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayRenderer {
    pub fn new() -> Self {
        let lut = (0..LUT_SIZE)
            .map(|i| {
                let rgb = hot(i as f64 / (LUT_SIZE - 1) as f64);
                // Truncation, matching float-to-byte conversion of colormap output.
                rgb.map(|c| (c * 255.0) as u8)
            })
            .collect();
        Self { lut }
    }

    /// Color for a normalized density in `[0, 1]`.
    pub fn color(&self, t: f32) -> Rgb<u8> {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let idx = ((t * LUT_SIZE as f32) as usize).min(LUT_SIZE - 1);
        Rgb(self.lut[idx])
    }

    /// Blends the colored snapshot over a copy of `frame` with opacity `alpha`.
    ///
    /// An all-zero snapshot carries no signal; the frame comes back unchanged.
    pub fn composite(&self, frame: &Frame, snapshot: &GridSnapshot, alpha: f32) -> Frame {
        let alpha = alpha.clamp(0.0, 1.0);
        let Some(density) = normalized_density(snapshot, frame.width(), frame.height()) else {
            return frame.clone();
        };

        let keep = 1.0 - alpha;
        let mut out = frame.clone();
        for (pixel, value) in out.pixels_mut().zip(density.pixels()) {
            let color = self.color(value[0]);
            for (channel, overlay) in pixel.0.iter_mut().zip(color.0) {
                let blended = *channel as f32 * keep + overlay as f32 * alpha;
                *channel = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
        out
    }

    /// Draws detection boxes onto a copy of `frame`.
    ///
    /// Corners are inclusive. Boxes are clipped to the frame; a box with
    /// nothing left inside it is skipped.
    pub fn draw_detections(&self, frame: &Frame, detections: &[Detection]) -> Frame {
        let mut out = frame.clone();
        if out.width() == 0 || out.height() == 0 {
            return out;
        }
        let max_x = (out.width() - 1) as f32;
        let max_y = (out.height() - 1) as f32;
        for detection in detections {
            let bbox = &detection.bbox;
            let x1 = bbox.x1.min(bbox.x2).clamp(0.0, max_x).round();
            let x2 = bbox.x1.max(bbox.x2).clamp(0.0, max_x).round();
            let y1 = bbox.y1.min(bbox.y2).clamp(0.0, max_y).round();
            let y2 = bbox.y1.max(bbox.y2).clamp(0.0, max_y).round();
            // Also true for NaN coordinates.
            if !(x2 > x1 && y2 > y1) {
                continue;
            }
            let (x, y) = (x1 as i32, y1 as i32);
            let (w, h) = ((x2 - x1) as i32 + 1, (y2 - y1) as i32 + 1);
            for inset in 0..BOX_THICKNESS {
                let rw = w - 2 * inset;
                let rh = h - 2 * inset;
                if rw <= 0 || rh <= 0 {
                    break;
                }
                let rect = Rect::at(x.saturating_add(inset), y.saturating_add(inset))
                    .of_size(rw as u32, rh as u32);
                draw_hollow_rect_mut(&mut out, rect, BOX_COLOR);
            }
        }
        out
    }

    /// Renders the grid on its own, `scale` pixels per cell.
    pub fn render_heatmap(&self, snapshot: &GridSnapshot, scale: u32) -> RgbImage {
        let scale = scale.max(1);
        let width = snapshot.width() as u32 * scale;
        let height = snapshot.height() as u32 * scale;
        match normalized_density(snapshot, width, height) {
            Some(density) => {
                RgbImage::from_fn(width, height, |x, y| self.color(density.get_pixel(x, y)[0]))
            }
            None => RgbImage::from_pixel(width, height, self.color(0.0)),
        }
    }
}

/// Resamples `snapshot` to `width × height` and scales it so its peak is 1.
///
/// Returns `None` for an all-zero snapshot. Values are brought into `[0, 1]`
/// before resampling because float image buffers saturate at 1.0.
fn normalized_density(snapshot: &GridSnapshot, width: u32, height: u32) -> Option<DensityImage> {
    let peak = snapshot.max();
    if peak <= 0.0 || width == 0 || height == 0 {
        return None;
    }

    let cells = snapshot.cells().iter().map(|v| v / peak).collect();
    let grid = DensityImage::from_raw(snapshot.width() as u32, snapshot.height() as u32, cells)?;
    let mut resized = imageops::resize(&grid, width, height, FilterType::Triangle);

    let resized_peak = resized.pixels().map(|p| p[0]).fold(0.0f32, f32::max);
    if resized_peak <= 0.0 {
        return None;
    }
    for pixel in resized.pixels_mut() {
        pixel[0] /= resized_peak;
    }
    Some(resized)
}
