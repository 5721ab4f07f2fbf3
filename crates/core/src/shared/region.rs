/// An axis-aligned face box in frame pixel coordinates.
///
/// Detectors and trackers may report boxes that spill past the frame edge;
/// `clamp_to` produces the visible part before annotation.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Detector confidence, when the producer has one.
    pub score: Option<f64>,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersection with the `[0, width) x [0, height)` frame rectangle.
    /// Returns `None` when nothing of the region is visible.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Region> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(width as i32);
        let y2 = self.bottom().min(height as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Region {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            score: self.score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // ── Clamping ─────────────────────────────────────────────────────

    #[test]
    fn test_clamp_inside_is_identity() {
        let r = Region::new(10, 20, 30, 40).with_score(0.9);
        assert_eq!(r.clamp_to(100, 100), Some(r));
    }

    #[test]
    fn test_clamp_crops_left_and_top() {
        let r = Region::new(-10, -5, 30, 20);
        assert_eq!(r.clamp_to(100, 100), Some(Region::new(0, 0, 20, 15)));
    }

    #[test]
    fn test_clamp_crops_right_and_bottom() {
        let r = Region::new(90, 80, 30, 40);
        assert_eq!(r.clamp_to(100, 100), Some(Region::new(90, 80, 10, 20)));
    }

    #[rstest]
    #[case::left_of_frame(Region::new(-50, 10, 40, 40))]
    #[case::below_frame(Region::new(10, 100, 40, 40))]
    #[case::empty(Region::new(10, 10, 0, 0))]
    fn test_clamp_invisible_is_none(#[case] r: Region) {
        assert!(r.clamp_to(100, 100).is_none());
    }

    // ── Geometry helpers ─────────────────────────────────────────────

    #[test]
    fn test_edges() {
        let r = Region::new(10, 20, 30, 40);
        assert_eq!(r.right(), 40);
        assert_eq!(r.bottom(), 60);
    }

    #[test]
    fn test_is_empty() {
        assert!(Region::new(0, 0, 0, 5).is_empty());
        assert!(!Region::new(0, 0, 1, 1).is_empty());
    }
}
