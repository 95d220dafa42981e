use crate::{CameraPoint, Projective};
use derive_more::{AsMut, AsRef, From, Into};
use nalgebra::{IsometryMatrix3, Matrix4, Point3, Rotation3, Vector3};

/// The relative pose between two consecutive camera frames. This transforms
/// the [`CameraPoint`] of the current frame into the corresponding
/// [`CameraPoint`] of the previous frame.
///
/// Camera space for a given frame is defined as thus:
///
/// * Origin is the optical center
/// * Positive z axis is forwards
/// * Positive y axis is down
/// * Positive x axis is right
///
/// With this convention the translation component is the motion of the
/// camera expressed in the previous frame's camera space, so a camera that
/// drove forwards between the two frames has a translation with a dominant
/// positive z component.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, From, Into)]
pub struct CameraToCamera(pub IsometryMatrix3<f64>);

impl CameraToCamera {
    /// Creates a pose with no change in position or orientation.
    pub fn identity() -> Self {
        Self(IsometryMatrix3::identity())
    }

    /// Create the pose from rotation and translation.
    pub fn from_parts(translation: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        Self(IsometryMatrix3::from_parts(translation.into(), rotation))
    }

    /// Retrieve the isometry.
    pub fn isometry(self) -> IsometryMatrix3<f64> {
        self.0
    }

    /// The rotation component of the pose.
    pub fn rotation(self) -> Rotation3<f64> {
        self.0.rotation
    }

    /// The translation component of the pose. For a pose recovered from an
    /// essential matrix this is a unit bearing; the true magnitude is not
    /// observable from a single camera.
    pub fn translation(self) -> Vector3<f64> {
        self.0.translation.vector
    }

    /// Takes the inverse of the pose.
    pub fn inverse(self) -> Self {
        Self(self.0.inverse())
    }

    /// Applies a scale factor to the pose (scales the translation component).
    #[must_use]
    pub fn scale(self, scale: f64) -> Self {
        let mut isometry = self.0;
        isometry.translation.vector *= scale;
        Self(isometry)
    }

    /// Retrieve the homogeneous matrix.
    pub fn homogeneous(self) -> Matrix4<f64> {
        self.0.to_homogeneous()
    }

    /// Transform a point in the current frame's camera space into the
    /// previous frame's camera space.
    pub fn transform(self, point: CameraPoint) -> CameraPoint {
        CameraPoint::from_homogeneous(self.homogeneous() * point.homogeneous())
    }
}

/// The accumulated pose of the camera in the world frame: the orientation
/// and position reached after integrating every accepted relative motion
/// since the start of the run.
///
/// This is an immutable snapshot. [`WorldPose::integrate`] does not mutate;
/// it returns the next snapshot, so the caller decides whether a frame's
/// motion is applied or discarded, and intermediate snapshots can be stored
/// or inspected freely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPose {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
}

impl WorldPose {
    /// The pose at the world origin with no rotation.
    pub fn identity() -> Self {
        Self {
            rotation: Rotation3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Seeds the world pose from the first recovered relative pose. The
    /// translation is taken unscaled, so the first inter-frame distance
    /// defines the unit of the trajectory until scaled updates arrive.
    pub fn from_relative(relative: CameraToCamera) -> Self {
        Self {
            rotation: relative.rotation(),
            translation: relative.translation(),
        }
    }

    /// Integrates one accepted relative motion into the trajectory,
    /// returning the next snapshot:
    ///
    /// * `translation' = translation + scale * (rotation * t_rel)`
    /// * `rotation' = R_rel * rotation`
    ///
    /// The translation is rotated by the accumulated rotation *before* the
    /// rotation update, and the relative rotation is composed on the left.
    /// The ordering matters and deliberately matches the trajectory
    /// integration used with KITTI ground-truth scale.
    #[must_use]
    pub fn integrate(self, relative: CameraToCamera, scale: f64) -> Self {
        Self {
            rotation: relative.rotation() * self.rotation,
            translation: self.translation + scale * (self.rotation * relative.translation()),
        }
    }

    /// The camera position in the world frame.
    pub fn position(&self) -> Point3<f64> {
        self.translation.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_motion_accumulates_along_z() {
        let forward = CameraToCamera::from_parts(Vector3::z(), Rotation3::identity());
        let mut pose = WorldPose::identity();
        for _ in 0..4 {
            pose = pose.integrate(forward, 1.5);
        }
        assert!((pose.translation - Vector3::new(0.0, 0.0, 6.0)).norm() < 1e-12);
        assert!(pose.rotation.angle() < 1e-12);
    }

    #[test]
    fn rotation_stays_orthonormal_after_many_updates() {
        let relative = CameraToCamera::from_parts(
            Vector3::new(0.01, -0.02, 0.9),
            Rotation3::from_euler_angles(0.001, 0.02, -0.003),
        );
        let mut pose = WorldPose::identity();
        for _ in 0..1000 {
            pose = pose.integrate(relative, 1.0);
        }
        let should_identity = pose.rotation.matrix() * pose.rotation.matrix().transpose();
        assert!((should_identity - nalgebra::Matrix3::identity()).norm() < 1e-9);
        assert!((pose.rotation.matrix().determinant() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn translation_rotated_by_accumulated_rotation() {
        // After a 90 degree yaw, forward motion in camera space must move
        // the world position along the rotated axis.
        let yaw = Rotation3::from_euler_angles(0.0, core::f64::consts::FRAC_PI_2, 0.0);
        let turned = WorldPose {
            rotation: yaw,
            translation: Vector3::zeros(),
        };
        let forward = CameraToCamera::from_parts(Vector3::z(), Rotation3::identity());
        let next = turned.integrate(forward, 2.0);
        let expected = 2.0 * (yaw * Vector3::z());
        assert!((next.translation - expected).norm() < 1e-12);
    }
}
