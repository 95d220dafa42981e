use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use num_traits::Float;
use sample_consensus::Model;
use vo_core::{
    nalgebra::{Matrix3, Rotation3, Vector3, SVD},
    CameraToCamera, FeatureMatch,
};

/// This stores an essential matrix, which is satisfied by the following
/// constraint:
///
/// transpose(x') * E * x = 0
///
/// Where `x'` and `x` are homogeneous normalized image coordinates. You can
/// get a homogeneous normalized image coordinate by appending `1.0` to a
/// [`vo_core::NormalizedKeyPoint`].
///
/// The essential matrix embodies the epipolar constraint between two images:
/// for any point observed in one view, the matching point in the other view
/// must lie on a line (the epipolar line) determined by the relative pose of
/// the two cameras. `E * x` produces a vector perpendicular to every bearing
/// on that line, which is why the dot product with the corresponding
/// coordinate of the other image is zero for a correct correspondence.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
pub struct EssentialMatrix(pub Matrix3<f64>);

impl EssentialMatrix {
    /// Can be used to enforce the constraints of an essential matrix to fix it.
    ///
    /// This finds the closest essential matrix in frobenius form: the two
    /// large singular values are averaged and the null singular value is
    /// forced to zero.
    pub fn recondition(self, epsilon: f64, max_iterations: usize) -> Option<Self> {
        let mut svd = self.try_svd(true, true, epsilon, max_iterations)?;
        svd.singular_values[2] = 0.0;
        let new_singular = (svd.singular_values[0] + svd.singular_values[1]) / 2.0;
        svd.singular_values[0] = new_singular;
        svd.singular_values[1] = new_singular;
        // Cannot fail because we asked for both U and V* on decomp.
        let mat = svd.recompose().unwrap();
        Some(Self(mat))
    }

    /// Returns the two possible rotations for the essential matrix along with
    /// a unit translation bearing. The translation's sign is unknown and must
    /// be solved for with a cheirality check (see
    /// [`recover_pose`](crate::recover_pose)).
    ///
    /// `epsilon` is the threshold by which the singular value decomposition is
    /// considered complete. `max_iterations` caps the SVD iteration count; a
    /// value of `0` may execute indefinitely and is not recommended.
    ///
    /// ```
    /// use vo_core::CameraToCamera;
    /// use vo_core::nalgebra::{Rotation3, Vector3};
    /// use epipolar::EssentialMatrix;
    /// let pose = CameraToCamera::from_parts(
    ///     Vector3::new(-0.8, 0.4, 0.5),
    ///     Rotation3::from_euler_angles(0.2, 0.3, 0.4),
    /// );
    /// let (rot_a, rot_b, t) = EssentialMatrix::from(pose)
    ///     .possible_rotations_unscaled_translation(1e-6, 50)
    ///     .unwrap();
    /// // At least one rotation is correct.
    /// let a_res = rot_a.rotation_to(&pose.rotation()).angle();
    /// let b_res = rot_b.rotation_to(&pose.rotation()).angle();
    /// assert!(a_res < 1e-4 || b_res < 1e-4);
    /// // The translation points in the same (or reverse) direction.
    /// let t_res = 1.0 - t.normalize().dot(&pose.translation().normalize()).abs();
    /// assert!(t_res < 1e-4);
    /// ```
    pub fn possible_rotations_unscaled_translation(
        &self,
        epsilon: f64,
        max_iterations: usize,
    ) -> Option<(Rotation3<f64>, Rotation3<f64>, Vector3<f64>)> {
        let Self(essential) = *self;

        // `W` from https://en.wikipedia.org/wiki/Essential_matrix#Finding_one_solution.
        let w = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let wt = w.transpose();

        let svd = SVD::try_new(essential, true, true, epsilon, max_iterations)?;
        let (mut u, mut v_t) = (
            svd.u.expect("Didn't get U and V matrix in SVD"),
            svd.v_t.expect("Didn't get U and V matrix in SVD"),
        );
        // Force the determinants to be positive to keep the handedness of the
        // rotation matrices correct.
        // Last column of U is undetermined since d = (a a 0).
        if u.determinant() < 0.0 {
            for n in u.column_mut(2).iter_mut() {
                *n *= -1.0;
            }
        }
        // Last row of Vt is undetermined since d = (a a 0).
        if v_t.determinant() < 0.0 {
            for n in v_t.row_mut(2).iter_mut() {
                *n *= -1.0;
            }
        }
        // The translation is the last column of U, which is unit length.
        Some((
            Rotation3::from_matrix_unchecked(u * w * v_t),
            Rotation3::from_matrix_unchecked(u * wt * v_t),
            u.column(2).into_owned(),
        ))
    }

    /// See [`EssentialMatrix::possible_rotations_unscaled_translation`].
    ///
    /// This returns the four candidate pose decompositions (two rotations,
    /// each with both translation signs). Exactly one of them places observed
    /// points in front of both cameras for non-degenerate input.
    pub fn possible_unscaled_poses(
        &self,
        epsilon: f64,
        max_iterations: usize,
    ) -> Option<[CameraToCamera; 4]> {
        self.possible_rotations_unscaled_translation(epsilon, max_iterations)
            .map(|(rot_a, rot_b, t)| {
                [
                    CameraToCamera::from_parts(t, rot_a),
                    CameraToCamera::from_parts(t, rot_b),
                    CameraToCamera::from_parts(-t, rot_a),
                    CameraToCamera::from_parts(-t, rot_b),
                ]
            })
    }
}

/// Generates the essential matrix corresponding to this relative camera pose.
///
/// If a point `a` is transformed with [`CameraToCamera::transform`] into a
/// point `b`, then the matrix returned by this method gives a residual of
/// approximately `0.0` for `FeatureMatch(a, b)` projections.
impl From<CameraToCamera> for EssentialMatrix {
    fn from(pose: CameraToCamera) -> Self {
        Self(pose.translation().cross_matrix() * *pose.rotation().matrix())
    }
}

impl Model<FeatureMatch> for EssentialMatrix {
    fn residual(&self, data: &FeatureMatch) -> f64 {
        let Self(mat) = *self;
        let &FeatureMatch(a, b) = data;
        let (a, b) = (a.bearing_unnormalized(), b.bearing_unnormalized());

        // The result is a 1x1 matrix which we must get element 0 from.
        Float::abs((b.transpose() * mat * a)[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vo_core::nalgebra::Point2;
    use vo_core::NormalizedKeyPoint;

    #[test]
    fn residual_is_zero_for_consistent_matches() {
        let pose = CameraToCamera::from_parts(
            Vector3::new(0.3, -0.1, 0.5),
            Rotation3::from_euler_angles(0.1, -0.2, 0.05),
        );
        let essential = EssentialMatrix::from(pose);
        for &(x, y, z) in &[(0.5, -0.3, 3.0), (-0.2, 0.4, 2.0), (0.0, 0.1, 4.5)] {
            let point_a = Vector3::new(x, y, z);
            let point_b = pose.rotation() * point_a + pose.translation();
            let a = NormalizedKeyPoint(Point2::new(point_a.x / point_a.z, point_a.y / point_a.z));
            let b = NormalizedKeyPoint(Point2::new(point_b.x / point_b.z, point_b.y / point_b.z));
            let residual = essential.residual(&FeatureMatch(a, b));
            assert!(residual < 1e-9, "residual {} too large", residual);
        }
    }

    #[test]
    fn recondition_produces_rank_two_matrix() {
        let essential = EssentialMatrix(Matrix3::new(
            1.0, 0.3, -0.2, 0.4, 0.9, 0.1, -0.3, 0.2, 1.1,
        ))
        .recondition(1e-12, 1000)
        .unwrap();
        let svd = essential.0.try_svd(false, false, 1e-12, 1000).unwrap();
        assert!(svd.singular_values[2].abs() < 1e-9);
        assert!((svd.singular_values[0] - svd.singular_values[1]).abs() < 1e-9);
    }
}
