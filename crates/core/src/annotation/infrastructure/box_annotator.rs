use ndarray::{s, Axis};

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

pub const DEFAULT_BOX_COLOR: [u8; 3] = [0, 0, 255];
pub const DEFAULT_BOX_THICKNESS: u32 = 2;

/// Draws a hollow rectangle around each region.
///
/// The stroke sits on the inside of the box and is clipped to the frame, so
/// a face partly outside the picture still gets the visible edges drawn.
pub struct BoxAnnotator {
    color: [u8; 3],
    thickness: u32,
}

impl BoxAnnotator {
    pub fn new(color: [u8; 3], thickness: u32) -> Self {
        Self {
            color,
            thickness: thickness.max(1),
        }
    }

    pub fn color(&self) -> [u8; 3] {
        self.color
    }

    pub fn thickness(&self) -> u32 {
        self.thickness
    }

    fn fill(&self, frame: &mut Frame, x0: i32, y0: i32, x1: i32, y1: i32) {
        let (x0, y0) = (x0.max(0) as usize, y0.max(0) as usize);
        let x1 = (x1.max(0) as usize).min(frame.width() as usize);
        let y1 = (y1.max(0) as usize).min(frame.height() as usize);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let mut view = frame.as_ndarray_mut();
        let mut band = view.slice_mut(s![y0..y1, x0..x1, ..]);
        for mut px in band.lanes_mut(Axis(2)) {
            px[0] = self.color[0];
            px[1] = self.color[1];
            px[2] = self.color[2];
        }
    }
}

impl Default for BoxAnnotator {
    fn default() -> Self {
        Self::new(DEFAULT_BOX_COLOR, DEFAULT_BOX_THICKNESS)
    }
}

impl FrameAnnotator for BoxAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        regions: &[Region],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let t = self.thickness as i32;
        for r in regions {
            if r.is_empty() {
                continue;
            }
            if r.clamp_to(frame.width(), frame.height()).is_none() {
                continue;
            }
            let (left, top, right, bottom) = (r.x, r.y, r.right(), r.bottom());
            let tw = t.min(r.width);
            let th = t.min(r.height);

            self.fill(frame, left, top, right, top + th);
            self.fill(frame, left, bottom - th, right, bottom);
            self.fill(frame, left, top, left + tw, bottom);
            self.fill(frame, right - tw, top, right, bottom);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const BLUE: [u8; 3] = [0, 0, 255];

    fn make_frame(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(vec![value; (width * height * 3) as usize], width, height, 0)
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
        let i = ((y * frame.width() + x) * 3) as usize;
        let d = frame.data();
        [d[i], d[i + 1], d[i + 2]]
    }

    #[test]
    fn test_default_is_blue_two_pixels() {
        let a = BoxAnnotator::default();
        assert_eq!(a.color(), BLUE);
        assert_eq!(a.thickness(), 2);
    }

    #[test]
    fn test_zero_thickness_becomes_one() {
        assert_eq!(BoxAnnotator::new(BLUE, 0).thickness(), 1);
    }

    #[test]
    fn test_draws_outline_only() {
        let mut frame = make_frame(40, 40, 0);
        BoxAnnotator::default()
            .annotate(&mut frame, &[Region::new(10, 10, 20, 20)])
            .unwrap();

        // Edges, both stroke rows.
        assert_eq!(pixel(&frame, 10, 10), BLUE);
        assert_eq!(pixel(&frame, 11, 11), BLUE);
        assert_eq!(pixel(&frame, 29, 29), BLUE);
        assert_eq!(pixel(&frame, 28, 20), BLUE);
        assert_eq!(pixel(&frame, 20, 10), BLUE);
        assert_eq!(pixel(&frame, 20, 29), BLUE);
        // Interior and exterior untouched.
        assert_eq!(pixel(&frame, 12, 12), [0, 0, 0]);
        assert_eq!(pixel(&frame, 20, 20), [0, 0, 0]);
        assert_eq!(pixel(&frame, 9, 9), [0, 0, 0]);
        assert_eq!(pixel(&frame, 30, 30), [0, 0, 0]);
    }

    #[test]
    fn test_no_regions_leaves_frame_unchanged() {
        let mut frame = make_frame(16, 16, 77);
        let before = frame.data().to_vec();
        BoxAnnotator::default().annotate(&mut frame, &[]).unwrap();
        assert_eq!(frame.data(), &before[..]);
    }

    #[test]
    fn test_partially_outside_is_clipped() {
        let mut frame = make_frame(20, 20, 0);
        BoxAnnotator::default()
            .annotate(&mut frame, &[Region::new(-5, -5, 15, 15)])
            .unwrap();

        // Only the right and bottom edges are visible.
        assert_eq!(pixel(&frame, 9, 0), BLUE);
        assert_eq!(pixel(&frame, 0, 9), BLUE);
        assert_eq!(pixel(&frame, 0, 0), [0, 0, 0]);
        assert_eq!(pixel(&frame, 10, 10), [0, 0, 0]);
    }

    #[rstest]
    #[case::fully_outside(Region::new(100, 100, 10, 10))]
    #[case::negative(Region::new(-50, -50, 10, 10))]
    #[case::empty(Region::new(5, 5, 0, 8))]
    fn test_invisible_regions_are_ignored(#[case] region: Region) {
        let mut frame = make_frame(20, 20, 9);
        let before = frame.data().to_vec();
        BoxAnnotator::default().annotate(&mut frame, &[region]).unwrap();
        assert_eq!(frame.data(), &before[..]);
    }

    #[test]
    fn test_thin_region_is_filled() {
        let mut frame = make_frame(10, 10, 0);
        BoxAnnotator::new([255, 0, 0], 3)
            .annotate(&mut frame, &[Region::new(2, 2, 2, 5)])
            .unwrap();
        for y in 2..7 {
            assert_eq!(pixel(&frame, 2, y), [255, 0, 0]);
            assert_eq!(pixel(&frame, 3, y), [255, 0, 0]);
        }
        assert_eq!(pixel(&frame, 4, 4), [0, 0, 0]);
    }

    #[test]
    fn test_multiple_regions() {
        let mut frame = make_frame(50, 20, 0);
        BoxAnnotator::default()
            .annotate(
                &mut frame,
                &[Region::new(0, 0, 10, 10), Region::new(30, 5, 10, 10)],
            )
            .unwrap();
        assert_eq!(pixel(&frame, 0, 0), BLUE);
        assert_eq!(pixel(&frame, 30, 5), BLUE);
        assert_eq!(pixel(&frame, 20, 5), [0, 0, 0]);
    }
}
