use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use std::path::Path;
use vo_core::WorldPose;

/// Top-down render of the accumulated trajectory on the x/z plane.
/// Non-essential to correctness; purely a visual aid.
pub struct TrajectoryPlot {
    canvas: RgbImage,
}

/// Canvas offsets keep a KITTI-scale trajectory inside the image.
const WIDTH: u32 = 600;
const HEIGHT: u32 = 600;
const X_OFFSET: i32 = 300;
const Z_OFFSET: i32 = 100;

impl TrajectoryPlot {
    pub fn new() -> Self {
        Self {
            canvas: RgbImage::new(WIDTH, HEIGHT),
        }
    }

    /// Marks the camera position of one pose snapshot.
    pub fn mark(&mut self, pose: &WorldPose) {
        let x = pose.translation.x as i32 + X_OFFSET;
        let y = pose.translation.z as i32 + Z_OFFSET;
        draw_filled_circle_mut(&mut self.canvas, (x, y), 1, Rgb([255, 0, 0]));
    }

    pub fn save(&self, path: impl AsRef<Path>) -> image::ImageResult<()> {
        self.canvas.save(path)
    }
}

impl Default for TrajectoryPlot {
    fn default() -> Self {
        Self::new()
    }
}
