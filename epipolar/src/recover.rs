use crate::EssentialMatrix;
use vo_core::{
    nalgebra::{Matrix4, RowVector4, UnitVector3},
    CameraPoint, CameraToCamera, FeatureMatch, Projective,
};

const SVD_CONVERGENCE: f64 = 1e-12;
const SVD_ITERATIONS: usize = 1000;

/// Triangulates a point in the first camera's space from a relative pose and
/// a bearing out of each camera. Based on algorithm 12 from "Multiple View
/// Geometry in Computer Vision, Second Edition".
fn triangulate_relative(
    relative_pose: CameraToCamera,
    a: UnitVector3<f64>,
    b: UnitVector3<f64>,
) -> Option<CameraPoint> {
    let pose = relative_pose.homogeneous();
    let mut design = Matrix4::zeros();
    design
        .row_mut(0)
        .copy_from(&RowVector4::new(-a.z, 0.0, a.x, 0.0));
    design
        .row_mut(1)
        .copy_from(&RowVector4::new(0.0, -a.z, a.y, 0.0));
    design
        .row_mut(2)
        .copy_from(&(b.x * pose.row(2) - b.z * pose.row(0)));
    design
        .row_mut(3)
        .copy_from(&(b.y * pose.row(2) - b.z * pose.row(1)));

    let svd = design.try_svd(false, true, SVD_CONVERGENCE, SVD_ITERATIONS)?;

    // The null-space vector of the design matrix corresponds to the smallest
    // singular value and is the homogeneous coordinate of the output.
    Some(CameraPoint::from_homogeneous(
        svd.v_t.unwrap().row(3).transpose(),
    ))
    .filter(|point| point.homogeneous().iter().all(|n| n.is_finite()))
}

/// Whether the match triangulates to a point with positive depth in both
/// views under the candidate pose.
fn in_front_of_both(pose: CameraToCamera, m: FeatureMatch) -> bool {
    let FeatureMatch(a, b) = m;
    let (a, b) = (a.bearing(), b.bearing());
    let point = match triangulate_relative(pose, a, b).and_then(|p| p.point()) {
        Some(point) => point,
        None => return false,
    };
    point.coords.dot(&a) > 0.0 && (pose.isometry() * point).coords.dot(&b) > 0.0
}

/// Disambiguates the four candidate decompositions of an essential matrix by
/// a cheirality vote: each match is triangulated under each candidate pose
/// and the candidate that places the most points in front of both cameras
/// wins.
///
/// The rotation of the returned pose is orthonormal with determinant +1 and
/// the translation has unit norm; the true translation magnitude is not
/// observable from a single camera.
///
/// Returns `None` when the decomposition fails or no candidate places any
/// point in front of both cameras (fully degenerate correspondences).
pub fn recover_pose<I>(
    essential: EssentialMatrix,
    matches: I,
    epsilon: f64,
    max_iterations: usize,
) -> Option<CameraToCamera>
where
    I: Iterator<Item = FeatureMatch> + Clone,
{
    let poses = essential.possible_unscaled_poses(epsilon, max_iterations)?;
    poses
        .iter()
        .map(|&pose| {
            let support = matches.clone().filter(|&m| in_front_of_both(pose, m)).count();
            (pose, support)
        })
        .max_by_key(|&(_, support)| support)
        .filter(|&(_, support)| support > 0)
        .map(|(pose, _)| pose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vo_core::nalgebra::{Point3, Rotation3, Vector3};

    #[test]
    fn triangulation_roundtrip() {
        let point = CameraPoint::from_point(Point3::new(0.3, 0.1, 2.0));
        let pose = CameraToCamera::from_parts(
            Vector3::new(0.1, 0.1, 0.1),
            Rotation3::new(Vector3::new(0.1, 0.1, 0.1)),
        );
        let bearing_a = point.bearing();
        let bearing_b = pose.transform(point).bearing();
        let triangulated = triangulate_relative(pose, bearing_a, bearing_b).unwrap();
        let distance = (point.point().unwrap().coords - triangulated.point().unwrap().coords).norm();
        assert!(distance < 1e-6);
    }

    #[test]
    fn cheirality_vote_rejects_behind_camera() {
        let point = CameraPoint::from_point(Point3::new(0.3, 0.1, 2.0));
        let pose = CameraToCamera::from_parts(
            Vector3::new(0.1, -0.05, 0.2),
            Rotation3::new(Vector3::new(0.02, -0.01, 0.03)),
        );
        let a = point.bearing();
        let b = pose.transform(point).bearing();
        let m = FeatureMatch(
            vo_core::NormalizedKeyPoint((a.xy() / a.z).into()),
            vo_core::NormalizedKeyPoint((b.xy() / b.z).into()),
        );
        assert!(in_front_of_both(pose, m));
        // The mirrored pose must fail the positive-depth check.
        let mirrored = CameraToCamera::from_parts(-pose.translation(), pose.rotation());
        assert!(!in_front_of_both(mirrored, m));
    }
}
