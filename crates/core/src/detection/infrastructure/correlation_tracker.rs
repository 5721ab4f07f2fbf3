//! Single-target correlation tracker.
//!
//! Keeps a luma template of the target and, on each update, slides it over a
//! search window around the last position using normalized cross-correlation.
//! The reported quality is the peak-to-sidelobe ratio (PSR) of the response
//! map: a sharp, unique peak scores high, a flat or ambiguous response scores
//! near zero. Large targets are box-downsampled so the template's longer side
//! stays within `max_template_side`.

use ndarray::{s, Array2, ArrayView2, Axis};

use crate::detection::domain::face_tracker::FaceTracker;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

pub const DEFAULT_MAX_TEMPLATE_SIDE: usize = 48;

/// Search margin on each side, as a fraction of the template size.
const SEARCH_MARGIN: f64 = 0.5;

/// Template blend weight given to the newest match.
const DEFAULT_LEARNING_RATE: f32 = 0.15;

const MIN_TEMPLATE_SIDE: usize = 4;

/// Returned when every sidelobe is identical but the peak stands out.
const MAX_QUALITY: f64 = 100.0;

const EPS: f64 = 1e-9;

/// Per-pixel luma variance below which a patch counts as flat.
const FLAT_VARIANCE: f64 = 1e-4;

pub struct CorrelationTracker {
    template: Option<Array2<f32>>,
    downsample: usize,
    position: Region,
    max_template_side: usize,
    learning_rate: f32,
}

impl CorrelationTracker {
    pub fn new() -> Self {
        Self::with_params(DEFAULT_MAX_TEMPLATE_SIDE, DEFAULT_LEARNING_RATE)
    }

    pub fn with_params(max_template_side: usize, learning_rate: f32) -> Self {
        Self {
            template: None,
            downsample: 1,
            position: Region::new(0, 0, 0, 0),
            max_template_side: max_template_side.max(MIN_TEMPLATE_SIDE),
            learning_rate: learning_rate.clamp(0.0, 1.0),
        }
    }

    pub fn is_started(&self) -> bool {
        self.template.is_some()
    }
}

impl Default for CorrelationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceTracker for CorrelationTracker {
    fn start(&mut self, frame: &Frame, region: &Region) -> Result<(), Box<dyn std::error::Error>> {
        let region = region
            .clamp_to(frame.width(), frame.height())
            .ok_or("Region lies outside the frame")?;

        let longest = region.width.max(region.height) as usize;
        let ds = longest.div_ceil(self.max_template_side).max(1);
        let cols = region.width as usize / ds;
        let rows = region.height as usize / ds;
        if cols < MIN_TEMPLATE_SIDE || rows < MIN_TEMPLATE_SIDE {
            return Err(format!(
                "Region {}x{} is too small to track",
                region.width, region.height
            )
            .into());
        }

        self.template = Some(luma_patch(
            frame,
            region.x as usize,
            region.y as usize,
            cols,
            rows,
            ds,
        ));
        self.downsample = ds;
        self.position = Region {
            score: None,
            ..region
        };
        Ok(())
    }

    fn update(&mut self, frame: &Frame) -> f64 {
        let Some(template) = self.template.as_ref() else {
            return 0.0;
        };
        let ds = self.downsample;
        let (th, tw) = template.dim();
        let margin_x = (tw as f64 * SEARCH_MARGIN).ceil() as i32;
        let margin_y = (th as f64 * SEARCH_MARGIN).ceil() as i32;

        let sx = (self.position.x - margin_x * ds as i32).max(0);
        let sy = (self.position.y - margin_y * ds as i32).max(0);
        let max_cols = (frame.width() as i32 - sx).max(0) as usize / ds;
        let max_rows = (frame.height() as i32 - sy).max(0) as usize / ds;
        let cols = (tw + 2 * margin_x as usize).min(max_cols);
        let rows = (th + 2 * margin_y as usize).min(max_rows);
        if cols < tw || rows < th {
            return 0.0;
        }

        let window = luma_patch(frame, sx as usize, sy as usize, cols, rows, ds);
        let response = ncc_map(template.view(), window.view());
        let (pr, pc, peak) = argmax(&response);
        let exclusion = (th.min(tw) / 6).max(1);
        let quality = peak_to_sidelobe(&response, pr, pc, peak, exclusion);

        if quality > 0.0 {
            self.position.x = sx + (pc * ds) as i32;
            self.position.y = sy + (pr * ds) as i32;
            let matched = window.slice(s![pr..pr + th, pc..pc + tw]);
            let lr = self.learning_rate;
            if let Some(t) = self.template.as_mut() {
                t.zip_mut_with(&matched, |old, &new| *old = (1.0 - lr) * *old + lr * new);
            }
        }
        quality
    }

    fn position(&self) -> Region {
        self.position.clone()
    }
}

/// Box-averaged luma of a `rows x cols` grid of `ds x ds` cells starting at
/// pixel `(x0, y0)`. Callers guarantee the grid lies inside the frame.
fn luma_patch(
    frame: &Frame,
    x0: usize,
    y0: usize,
    cols: usize,
    rows: usize,
    ds: usize,
) -> Array2<f32> {
    let pixels = frame.as_ndarray();
    let norm = (ds * ds) as f32;
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let cell = pixels.slice(s![
            y0 + r * ds..y0 + (r + 1) * ds,
            x0 + c * ds..x0 + (c + 1) * ds,
            ..
        ]);
        let sum: f32 = cell
            .lanes(Axis(2))
            .into_iter()
            .map(|px| 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32)
            .sum();
        sum / norm
    })
}

/// Zero-mean normalized cross-correlation of `template` at every offset
/// inside `window`. Offsets where either side has no variance score 0.
fn ncc_map(template: ArrayView2<f32>, window: ArrayView2<f32>) -> Array2<f32> {
    let (th, tw) = template.dim();
    let (wh, ww) = window.dim();
    let n = (th * tw) as f64;

    let t_mean = template.iter().map(|&v| v as f64).sum::<f64>() / n;
    let centered: Vec<f64> = template.iter().map(|&v| v as f64 - t_mean).collect();
    let t_energy = centered.iter().map(|v| v * v).sum::<f64>();
    let t_norm = t_energy.sqrt();
    let flat = FLAT_VARIANCE * n;

    Array2::from_shape_fn((wh - th + 1, ww - tw + 1), |(r, c)| {
        if t_energy < flat {
            return 0.0;
        }
        let patch = window.slice(s![r..r + th, c..c + tw]);
        let (mut dot, mut sum, mut sum_sq) = (0.0f64, 0.0f64, 0.0f64);
        for (&w, &t) in patch.iter().zip(centered.iter()) {
            let w = w as f64;
            dot += w * t;
            sum += w;
            sum_sq += w * w;
        }
        let energy = sum_sq - sum * sum / n;
        if energy < flat {
            return 0.0;
        }
        (dot / (t_norm * energy.sqrt())).clamp(-1.0, 1.0) as f32
    })
}

fn argmax(response: &Array2<f32>) -> (usize, usize, f32) {
    response
        .indexed_iter()
        .fold((0, 0, f32::MIN), |best, ((r, c), &v)| {
            if v > best.2 {
                (r, c, v)
            } else {
                best
            }
        })
}

/// `(peak - mean) / std` over the response outside a `(2*exclusion+1)^2`
/// window around the peak.
fn peak_to_sidelobe(
    response: &Array2<f32>,
    pr: usize,
    pc: usize,
    peak: f32,
    exclusion: usize,
) -> f64 {
    let sidelobe: Vec<f64> = response
        .indexed_iter()
        .filter(|((r, c), _)| r.abs_diff(pr) > exclusion || c.abs_diff(pc) > exclusion)
        .map(|(_, &v)| v as f64)
        .collect();
    if sidelobe.len() < 2 {
        return 0.0;
    }

    let mean = sidelobe.iter().sum::<f64>() / sidelobe.len() as f64;
    let var = sidelobe.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / sidelobe.len() as f64;
    let lift = peak as f64 - mean;
    if var.sqrt() < EPS {
        return if lift > EPS { MAX_QUALITY } else { 0.0 };
    }
    (lift / var.sqrt()).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::DEFAULT_TRACKING_QUALITY_THRESHOLD;

    const BACKGROUND: u8 = 128;

    /// Deterministic noise texture; `cell` > 1 repeats each value in
    /// `cell x cell` blocks so downsampled templates stay exact.
    fn textured_frame(w: u32, h: u32, target: &Region, cell: usize, seed: u32) -> Frame {
        let mut data = vec![BACKGROUND; (w * h * 3) as usize];
        let tex_cols = target.width as usize / cell + 1;
        let tex_rows = target.height as usize / cell + 1;
        let mut state = seed;
        let texture: Vec<u8> = (0..tex_cols * tex_rows)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (state >> 16) as u8
            })
            .collect();
        for ty in 0..target.height as usize {
            for tx in 0..target.width as usize {
                let (fx, fy) = (target.x as usize + tx, target.y as usize + ty);
                if fx >= w as usize || fy >= h as usize {
                    continue;
                }
                let v = texture[(ty / cell) * tex_cols + tx / cell];
                let idx = (fy * w as usize + fx) * 3;
                data[idx..idx + 3].fill(v);
            }
        }
        Frame::new(data, w, h, 0)
    }

    fn flat_frame(w: u32, h: u32) -> Frame {
        Frame::new(vec![BACKGROUND; (w * h * 3) as usize], w, h, 0)
    }

    #[test]
    fn test_follows_translated_target() {
        let start = Region::new(38, 38, 24, 24);
        let moved = Region::new(43, 41, 24, 24);

        let mut tracker = CorrelationTracker::new();
        tracker
            .start(&textured_frame(100, 100, &start, 1, 7), &start)
            .unwrap();
        let quality = tracker.update(&textured_frame(100, 100, &moved, 1, 7));

        assert!(
            quality >= DEFAULT_TRACKING_QUALITY_THRESHOLD,
            "quality {quality}"
        );
        let pos = tracker.position();
        assert_eq!((pos.x, pos.y, pos.width, pos.height), (43, 41, 24, 24));
    }

    #[test]
    fn test_stationary_target_keeps_position() {
        let target = Region::new(20, 30, 24, 24);
        let frame = textured_frame(100, 100, &target, 1, 99);

        let mut tracker = CorrelationTracker::new();
        tracker.start(&frame, &target).unwrap();
        for _ in 0..3 {
            assert!(tracker.update(&frame) >= DEFAULT_TRACKING_QUALITY_THRESHOLD);
        }
        assert_eq!(tracker.position(), target);
    }

    #[test]
    fn test_vanished_target_scores_zero() {
        let target = Region::new(38, 38, 24, 24);
        let mut tracker = CorrelationTracker::new();
        tracker
            .start(&textured_frame(100, 100, &target, 1, 3), &target)
            .unwrap();

        let quality = tracker.update(&flat_frame(100, 100));
        assert_eq!(quality, 0.0);
        assert_eq!(tracker.position(), target, "position must not jump on loss");
    }

    #[test]
    fn test_large_target_is_downsampled() {
        let start = Region::new(60, 60, 120, 120);
        let moved = Region::new(66, 57, 120, 120);

        let mut tracker = CorrelationTracker::new();
        tracker
            .start(&textured_frame(300, 300, &start, 3, 11), &start)
            .unwrap();
        assert_eq!(tracker.downsample, 3);
        assert_eq!(tracker.template.as_ref().unwrap().dim(), (40, 40));

        let quality = tracker.update(&textured_frame(300, 300, &moved, 3, 11));
        assert!(quality >= DEFAULT_TRACKING_QUALITY_THRESHOLD, "quality {quality}");
        let pos = tracker.position();
        assert_eq!((pos.x, pos.y), (66, 57));
    }

    #[test]
    fn test_start_outside_frame_errors() {
        let mut tracker = CorrelationTracker::new();
        let result = tracker.start(&flat_frame(50, 50), &Region::new(60, 60, 20, 20));
        assert!(result.is_err());
        assert!(!tracker.is_started());
    }

    #[test]
    fn test_start_tiny_region_errors() {
        let mut tracker = CorrelationTracker::new();
        let result = tracker.start(&flat_frame(50, 50), &Region::new(10, 10, 3, 3));
        assert!(result.is_err());
    }

    #[test]
    fn test_start_clamps_partially_visible_region() {
        let mut tracker = CorrelationTracker::new();
        tracker
            .start(&flat_frame(50, 50), &Region::new(-10, 30, 30, 30))
            .unwrap();
        assert_eq!(tracker.position(), Region::new(0, 30, 20, 20));
    }

    #[test]
    fn test_update_before_start_scores_zero() {
        let mut tracker = CorrelationTracker::new();
        assert_eq!(tracker.update(&flat_frame(20, 20)), 0.0);
    }

    #[test]
    fn test_ncc_identical_patch_is_one() {
        let t = Array2::from_shape_fn((3, 3), |(r, c)| (r * 3 + c) as f32);
        let map = ncc_map(t.view(), t.view());
        assert_eq!(map.dim(), (1, 1));
        assert!((map[[0, 0]] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_ncc_inverted_patch_is_minus_one() {
        let t = Array2::from_shape_fn((3, 3), |(r, c)| (r * 3 + c) as f32);
        let inv = t.mapv(|v| 10.0 - v);
        let map = ncc_map(t.view(), inv.view());
        assert!((map[[0, 0]] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_psr_flat_response_is_zero() {
        let response = Array2::<f32>::zeros((9, 9));
        assert_eq!(peak_to_sidelobe(&response, 4, 4, 0.0, 1), 0.0);
    }

    #[test]
    fn test_psr_isolated_peak_is_capped() {
        let mut response = Array2::<f32>::zeros((9, 9));
        response[[4, 4]] = 1.0;
        assert_eq!(peak_to_sidelobe(&response, 4, 4, 1.0, 1), MAX_QUALITY);
    }
}
