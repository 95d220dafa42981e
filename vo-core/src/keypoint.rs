use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::Point2;

/// Allows the retrieval of the point on the image the feature came from.
pub trait ImagePoint {
    /// Retrieves the point on the image.
    fn image_point(&self) -> Point2<f64>;
}

/// A point on an image frame in pixel coordinates. The keypoint is neither
/// undistorted nor normalized; for calibrated coordinates use
/// [`NormalizedKeyPoint`](crate::NormalizedKeyPoint), which a camera model
/// produces from this type.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
pub struct KeyPoint(pub Point2<f64>);

impl KeyPoint {
    /// Creates a keypoint from pixel coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self(Point2::new(x, y))
    }
}

impl ImagePoint for KeyPoint {
    fn image_point(&self) -> Point2<f64> {
        self.0
    }
}
