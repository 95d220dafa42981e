use derive_more::{Deref, DerefMut};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use log::*;

type GrayImageBuffer = ImageBuffer<Luma<f32>, Vec<f32>>;

/// The image type we use in this crate.
///
/// A wrapper around a contiguous f32 buffer with pixel values between 0 and 1.
/// The float representation keeps the Lucas-Kanade error terms and gradients
/// in one value domain across pyramid levels. We continue to use the image
/// crate for loading images and imageproc for the separable filters.
#[derive(Debug, Clone, Deref, DerefMut)]
pub struct GrayFloatImage(pub GrayImageBuffer);

impl GrayFloatImage {
    /// Create a unit float image from the image crate's `DynamicImage` type.
    pub fn from_dynamic(input_image: &DynamicImage) -> Self {
        let gray = input_image.to_luma8();
        info!("loaded a {} x {} image", gray.width(), gray.height());
        Self(ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
            Luma([f32::from(gray[(x, y)][0]) / 255f32])
        }))
    }

    /// Create an image from a raw unit float buffer in row-major order.
    pub fn from_raw(width: usize, height: usize, data: Vec<f32>) -> Self {
        Self(
            ImageBuffer::from_raw(width as u32, height as u32, data)
                .expect("raw vector didn't have enough pixels for the image"),
        )
    }

    pub fn new(width: usize, height: usize) -> Self {
        Self(ImageBuffer::from_pixel(
            width as u32,
            height as u32,
            Luma([0.0]),
        ))
    }

    pub fn width(&self) -> usize {
        self.0.width() as usize
    }

    pub fn height(&self) -> usize {
        self.0.height() as usize
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.get_pixel(x as u32, y as u32)[0]
    }

    pub fn put(&mut self, x: usize, y: usize, pixel_value: f32) {
        self.put_pixel(x as u32, y as u32, Luma([pixel_value]));
    }

    /// Quantizes the image back to 8 bits for consumers that operate on
    /// integer images (such as the FAST detector).
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.0.width(), self.0.height(), |x, y| {
            Luma([(self.get_pixel(x, y)[0] * 255.0).clamp(0.0, 255.0) as u8])
        })
    }

    /// Bilinear sample at a sub-pixel location. Coordinates are clamped to
    /// the image borders, so sampling outside the image degrades to the edge
    /// value rather than failing.
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let max_x = (self.width() - 1) as f32;
        let max_y = (self.height() - 1) as f32;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width() - 1);
        let y1 = (y0 + 1).min(self.height() - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let top = self.get(x0, y0) * (1.0 - fx) + self.get(x1, y0) * fx;
        let bottom = self.get(x0, y1) * (1.0 - fx) + self.get(x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Downsample to half resolution by averaging 2x2 tiles. Odd trailing
    /// rows and columns are folded into the last tile.
    pub fn half_size(&self) -> Self {
        let width = self.width() / 2;
        let height = self.height() / 2;
        let mut half = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let x1 = (2 * x + 1).min(self.width() - 1);
                let y1 = (2 * y + 1).min(self.height() - 1);
                let sum = self.get(2 * x, 2 * y)
                    + self.get(x1, 2 * y)
                    + self.get(2 * x, y1)
                    + self.get(x1, y1);
                half.put(x, y, sum * 0.25);
            }
        }
        half
    }
}

/// The Gaussian function at offset `x` with standard deviation `r`.
fn gaussian(x: f32, r: f32) -> f32 {
    ((2.0 * core::f32::consts::PI).sqrt() * r).recip() * (-x.powi(2) / (2.0 * r.powi(2))).exp()
}

/// Generate a normalized Gaussian kernel of the given size.
pub fn gaussian_kernel(r: f32, kernel_size: usize) -> Vec<f32> {
    assert!(kernel_size % 2 == 1, "kernel_size must be odd");
    let mut kernel = vec![0f32; kernel_size];
    let half_width = (kernel_size / 2) as i32;
    let mut sum = 0f32;
    for i in -half_width..=half_width {
        let val = gaussian(i as f32, r);
        kernel[(i + half_width) as usize] = val;
        sum += val;
    }
    for val in kernel.iter_mut() {
        *val /= sum;
    }
    kernel
}

/// Perform Gaussian blur on an image with imageproc's separable filters.
pub fn gaussian_blur(image: &GrayFloatImage, r: f32) -> GrayFloatImage {
    assert!(r > 0.0, "sigma must be > 0.0");
    let kernel_radius = (2.0 * r).ceil() as usize;
    let kernel = gaussian_kernel(r, kernel_radius * 2 + 1);
    let horizontal = imageproc::filter::horizontal_filter(&image.0, &kernel);
    GrayFloatImage(imageproc::filter::vertical_filter(&horizontal, &kernel))
}
