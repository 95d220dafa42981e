//! # klt
//!
//! Sparse feature detection and frame-to-frame tracking for visual odometry.
//!
//! Detection finds FAST-9 corners (via `imageproc`) with non-maximum
//! suppression. Tracking follows each point from one frame into the next
//! with pyramidal forward-additive
//! [Lucas-Kanade](https://en.wikipedia.org/wiki/Lucas%E2%80%93Kanade_method)
//! optical flow and removes every point whose flow is invalid or whose
//! tracked location leaves the image, from both point sets, so the surviving
//! sets stay index-aligned.

mod flow;
mod image;
mod pyramid;

pub use crate::image::{gaussian_blur, gaussian_kernel, GrayFloatImage};
pub use crate::pyramid::Pyramid;

use crate::flow::Flow;
use imageproc::corners::corners_fast9;
use imageproc::suppress::suppress_non_maximum;
use log::*;
use vo_core::{FeatureDetector, FeatureTracker, KeyPoint, TrackedPoints};

/// Contains the configuration parameters for detection and tracking.
///
/// The defaults mirror a common monocular odometry frontend: a FAST
/// threshold of 20 with non-maximum suppression, a 21x21 tracking window,
/// up to 30 solver iterations per pyramid level with a 0.01 pixel
/// convergence threshold, and 4 pyramid levels.
#[derive(Debug, Copy, Clone)]
pub struct Klt {
    /// Intensity difference threshold for the FAST detector.
    pub fast_threshold: u8,

    /// Radius in pixels for non-maximum suppression of detected corners.
    pub nms_radius: u32,

    /// Tracking window half-size. The actual window is (2 * half_window + 1)
    /// pixels square.
    pub half_window: usize,

    /// Maximum solver iterations per pyramid level.
    pub max_iterations: usize,

    /// Convergence threshold in pixels. Iteration stops early once the
    /// update falls below this length.
    pub epsilon: f32,

    /// Number of pyramid levels used for tracking.
    pub pyramid_levels: usize,

    /// Determinant floor for the 2x2 normal matrix. Below this the patch is
    /// considered textureless and the point is dropped.
    pub min_determinant: f32,
}

impl Klt {
    /// This convenience constructor is provided for the very common case
    /// that the detector threshold needs to be modified.
    pub fn new(fast_threshold: u8) -> Self {
        Self {
            fast_threshold,
            ..Default::default()
        }
    }

    /// Detect FAST corners in the image.
    ///
    /// The points come back in detector output order. An image without
    /// qualifying corners produces an empty set, which is a valid result.
    pub fn detect(&self, image: &GrayFloatImage) -> Vec<KeyPoint> {
        let corners = corners_fast9(&image.to_gray(), self.fast_threshold);
        let corners = suppress_non_maximum(&corners, self.nms_radius);
        debug!("detected {} corners", corners.len());
        corners
            .into_iter()
            .map(|corner| KeyPoint::new(corner.x as f64, corner.y as f64))
            .collect()
    }

    /// Track points from the previous frame into the current frame.
    ///
    /// Points whose flow is invalid or which land outside the image are
    /// removed from both returned sets, preserving index alignment between
    /// them. The input frames are not modified.
    pub fn track(
        &self,
        previous: &GrayFloatImage,
        current: &GrayFloatImage,
        points: &[KeyPoint],
    ) -> TrackedPoints {
        let prev_pyramid = Pyramid::build(previous, self.pyramid_levels);
        let curr_pyramid = Pyramid::build(current, self.pyramid_levels);

        let mut tracked = TrackedPoints::default();
        for &point in points {
            if let Flow::Tracked(new_point) =
                self.track_single(&prev_pyramid, &curr_pyramid, point)
            {
                tracked.previous.push(point);
                tracked.current.push(new_point);
            }
        }
        debug!("tracked {} of {} points", tracked.len(), points.len());
        tracked
    }
}

impl Default for Klt {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            nms_radius: 3,
            half_window: 10,
            max_iterations: 30,
            epsilon: 0.01,
            pyramid_levels: 4,
            min_determinant: 1e-6,
        }
    }
}

impl FeatureDetector<GrayFloatImage> for Klt {
    fn detect(&self, frame: &GrayFloatImage) -> Vec<KeyPoint> {
        // Call the inherent method explicitly to avoid recursion.
        Klt::detect(self, frame)
    }
}

impl FeatureTracker<GrayFloatImage> for Klt {
    fn track(&self, previous: &GrayFloatImage, current: &GrayFloatImage, points: &[KeyPoint]) -> TrackedPoints {
        Klt::track(self, previous, current, points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_image(w: usize, h: usize, sq_x: usize, sq_y: usize, sq_size: usize) -> GrayFloatImage {
        let mut image = GrayFloatImage::from_raw(w, h, vec![0.12; w * h]);
        for y in sq_y..(sq_y + sq_size).min(h) {
            for x in sq_x..(sq_x + sq_size).min(w) {
                image.put(x, y, 0.78);
            }
        }
        image
    }

    #[test]
    fn detects_corners_of_square() {
        let image = square_image(120, 120, 40, 40, 30);
        let klt = Klt::default();
        let points = klt.detect(&image);
        assert!(!points.is_empty());
        // Every corner must be near the square's border region.
        for point in &points {
            assert!(point.x >= 35.0 && point.x <= 75.0, "x was {}", point.x);
            assert!(point.y >= 35.0 && point.y <= 75.0, "y was {}", point.y);
        }
    }

    #[test]
    fn flat_image_detects_nothing() {
        let image = GrayFloatImage::from_raw(64, 64, vec![0.5; 64 * 64]);
        let klt = Klt::default();
        assert!(klt.detect(&image).is_empty());
    }

    #[test]
    fn track_filters_both_sets_in_lockstep() {
        let prev = square_image(120, 120, 40, 40, 30);
        let curr = square_image(120, 120, 42, 40, 30);
        let klt = Klt::default();
        let points = vec![
            KeyPoint::new(41.0, 41.0),
            // A point in the flat background cannot be followed and must be
            // dropped from both sets.
            KeyPoint::new(100.0, 15.0),
            KeyPoint::new(41.0, 69.0),
        ];
        let tracked = klt.track(&prev, &curr, &points);
        assert_eq!(tracked.previous.len(), tracked.current.len());
        assert_eq!(tracked.len(), 2);
        assert_eq!(tracked.previous[0], points[0]);
        assert_eq!(tracked.previous[1], points[2]);
        for (previous, current) in tracked.pairs() {
            assert!((current.x - previous.x - 2.0).abs() < 1.5);
        }
    }
}
