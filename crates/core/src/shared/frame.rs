use image::imageops::FilterType;
use image::{GrayImage, ImageBuffer, Rgb, RgbImage};
use ndarray::{ArrayView3, ArrayViewMut3};

const RGB_CHANNELS: u8 = 3;

/// A single camera frame: contiguous RGB bytes in row-major order.
///
/// Decoding and encoding happen at the stream boundary only; detection,
/// tracking and annotation all work on this type.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (RGB_CHANNELS as usize),
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    pub fn from_rgb_image(image: RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, index)
    }

    pub fn into_rgb_image(self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        RGB_CHANNELS
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Bilinear resize by a uniform factor. A factor that rounds to the
    /// current size yields a plain copy.
    pub fn resized(&self, factor: f64) -> Self {
        let new_w = ((self.width as f64) * factor) as u32;
        let new_h = ((self.height as f64) * factor) as u32;
        if new_w == 0 || new_h == 0 || (new_w == self.width && new_h == self.height) {
            return self.clone();
        }
        let view =
            ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(self.width, self.height, self.data.as_slice())
                .expect("Frame data length must match dimensions");
        Self::from_rgb_image(
            image::imageops::resize(&view, new_w, new_h, FilterType::Triangle),
            self.index,
        )
    }

    /// Luminance plane (Rec. 601 weights) used by detectors and trackers.
    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let idx = ((y * self.width + x) * RGB_CHANNELS as u32) as usize;
            let r = self.data[idx] as u32;
            let g = self.data[idx + 1] as u32;
            let b = self.data[idx + 2] as u32;
            image::Luma([((r * 299 + g * 587 + b * 114) / 1000) as u8])
        })
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            RGB_CHANNELS as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    fn test_data_mut_allows_modification() {
        let mut frame = Frame::new(vec![0u8; 6], 2, 1, 0);
        frame.data_mut()[0] = 255;
        assert_eq!(frame.data()[0], 255);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * 3")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 0);
    }

    #[test]
    fn test_as_ndarray_pixel_access() {
        let mut data = vec![0u8; 12];
        data[6] = 255; // row=1, col=0, R
        let frame = Frame::new(data, 2, 2, 0);
        let arr = frame.as_ndarray();
        assert_eq!(arr.shape(), &[2, 2, 3]);
        assert_eq!(arr[[1, 0, 0]], 255);
        assert_eq!(arr[[1, 0, 1]], 0);
    }

    #[test]
    fn test_as_ndarray_mut_modification() {
        let mut frame = Frame::new(vec![0u8; 12], 2, 2, 0);
        frame.as_ndarray_mut()[[0, 1, 2]] = 128;
        assert_eq!(frame.as_ndarray()[[0, 1, 2]], 128);
    }

    #[test]
    fn test_rgb_image_roundtrip_keeps_index() {
        let img = RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]));
        let frame = Frame::from_rgb_image(img, 7);
        assert_eq!((frame.width(), frame.height(), frame.index()), (4, 3, 7));
        let back = frame.into_rgb_image().unwrap();
        assert_eq!(back.get_pixel(3, 2).0, [10, 20, 30]);
    }

    #[test]
    fn test_resized_scales_dimensions() {
        let frame = Frame::new(vec![100u8; 40 * 30 * 3], 40, 30, 3);
        let scaled = frame.resized(1.5);
        assert_eq!(scaled.width(), 60);
        assert_eq!(scaled.height(), 45);
        assert_eq!(scaled.index(), 3);
        assert_eq!(scaled.data().len(), 60 * 45 * 3);
        // Uniform input stays uniform after interpolation.
        assert!(scaled.data().iter().all(|&v| v == 100));
    }

    #[test]
    fn test_resized_identity_factor_is_noop() {
        let frame = Frame::new(vec![1u8; 12], 2, 2, 0);
        let same = frame.resized(1.0);
        assert_eq!(same.data(), frame.data());
    }

    #[test]
    fn test_to_luma_weights() {
        let frame = Frame::new(vec![255, 0, 0, 0, 255, 0, 0, 0, 255], 3, 1, 0);
        let luma = frame.to_luma();
        assert_eq!(luma.get_pixel(0, 0).0[0], 76);
        assert_eq!(luma.get_pixel(1, 0).0[0], 149);
        assert_eq!(luma.get_pixel(2, 0).0[0], 29);
    }
}
