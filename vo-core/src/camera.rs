use crate::{ImagePoint, KeyPoint};
use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Matrix3, Point2, Point3, UnitVector3, Vector2, Vector3};

/// A point in normalized image coordinates. The keypoint has been normalized
/// by the camera intrinsic matrix, so it is the position on the virtual image
/// plane one focal length in front of the optical center. Appending a `1.0`
/// component gives the direction the light arrived from, which makes this
/// type interchangeable with a bearing.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
pub struct NormalizedKeyPoint(pub Point2<f64>);

impl NormalizedKeyPoint {
    /// The homogeneous form of the keypoint: the point formed on the virtual
    /// image plane at depth 1.0 in front of the camera.
    pub fn virtual_image_point(self) -> Point3<f64> {
        self.coords.push(1.0).into()
    }

    /// The unit direction out of the optical center towards the light source
    /// that produced this keypoint.
    pub fn bearing(self) -> UnitVector3<f64> {
        UnitVector3::new_normalize(self.bearing_unnormalized())
    }

    /// The unnormalized bearing of the keypoint. Use this when the consumer
    /// does not require unit length.
    pub fn bearing_unnormalized(self) -> Vector3<f64> {
        self.coords.push(1.0)
    }
}

/// Converts between points on an image and their normalized projections.
pub trait CameraModel {
    /// Converts a pixel-space point to a [`NormalizedKeyPoint`].
    fn calibrate<P>(&self, point: P) -> NormalizedKeyPoint
    where
        P: ImagePoint;

    /// Converts a [`NormalizedKeyPoint`] back into pixel coordinates.
    fn uncalibrate(&self, projection: NormalizedKeyPoint) -> KeyPoint;
}

/// Intrinsic parameters of a pinhole camera as per
/// [this Wikipedia page](https://en.wikipedia.org/wiki/Camera_resectioning#Intrinsic_parameters).
///
/// For a rectified image stream (such as the KITTI odometry sequences) this
/// is sufficient to normalize image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct CameraIntrinsics {
    pub focals: Vector2<f64>,
    pub principal_point: Point2<f64>,
    pub skew: f64,
}

impl CameraIntrinsics {
    /// Creates camera intrinsics that would create an identity intrinsic
    /// matrix: the pixel distance unit is the focal length, pixels are
    /// square, and there is no skew.
    pub fn identity() -> Self {
        Self {
            focals: Vector2::new(1.0, 1.0),
            principal_point: Point2::new(0.0, 0.0),
            skew: 0.0,
        }
    }

    pub fn focals(self, focals: Vector2<f64>) -> Self {
        Self { focals, ..self }
    }

    /// Sets both focal lengths to the same value (square pixels).
    pub fn focal(self, focal: f64) -> Self {
        Self {
            focals: Vector2::new(focal, focal),
            ..self
        }
    }

    pub fn principal_point(self, principal_point: Point2<f64>) -> Self {
        Self {
            principal_point,
            ..self
        }
    }

    pub fn skew(self, skew: f64) -> Self {
        Self { skew, ..self }
    }

    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focals.x,  self.skew,      self.principal_point.x,
            0.0,            self.focals.y,  self.principal_point.y,
            0.0,            0.0,            1.0,
        )
    }
}

impl CameraModel for CameraIntrinsics {
    /// Takes in a point from an image in pixel coordinates and
    /// converts it to a [`NormalizedKeyPoint`].
    ///
    /// ```
    /// use vo_core::{CameraIntrinsics, CameraModel, KeyPoint};
    /// use vo_core::nalgebra::Point2;
    /// // KITTI odometry sequence 00, camera 2.
    /// let intrinsics = CameraIntrinsics::identity()
    ///     .focal(718.8560)
    ///     .principal_point(Point2::new(607.1928, 185.2157));
    /// let kp = KeyPoint::new(471.0, 322.0);
    /// let nkp = intrinsics.calibrate(kp);
    /// let distance = (kp.to_homogeneous() - intrinsics.matrix() * nkp.to_homogeneous()).norm();
    /// assert!(distance < 1e-9);
    /// ```
    fn calibrate<P>(&self, point: P) -> NormalizedKeyPoint
    where
        P: ImagePoint,
    {
        let centered = point.image_point() - self.principal_point;
        let y = centered.y / self.focals.y;
        let x = (centered.x - self.skew * y) / self.focals.x;
        NormalizedKeyPoint(Point2::new(x, y))
    }

    /// Converts a [`NormalizedKeyPoint`] back into pixel coordinates.
    ///
    /// ```
    /// use vo_core::{CameraIntrinsics, CameraModel, KeyPoint};
    /// use vo_core::nalgebra::Point2;
    /// let intrinsics = CameraIntrinsics::identity()
    ///     .focal(718.8560)
    ///     .principal_point(Point2::new(607.1928, 185.2157));
    /// let kp = KeyPoint::new(471.0, 322.0);
    /// let ukp = intrinsics.uncalibrate(intrinsics.calibrate(kp));
    /// assert!((kp.0 - ukp.0).norm() < 1e-9);
    /// ```
    fn uncalibrate(&self, projection: NormalizedKeyPoint) -> KeyPoint {
        let y = projection.y * self.focals.y;
        let x = projection.x * self.focals.x + self.skew * projection.y;
        let centered = Point2::new(x, y);
        KeyPoint(centered + self.principal_point.coords)
    }
}
