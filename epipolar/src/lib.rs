//! Epipolar geometry for monocular odometry.
//!
//! This crate estimates the [`EssentialMatrix`] relating two calibrated views
//! from normalized keypoint correspondences using the
//! [eight-point algorithm](https://en.wikipedia.org/wiki/Eight-point_algorithm)
//! by Richard Hartley and Andrew Zisserman, and recovers the physically
//! consistent relative pose from it with a cheirality vote.
//!
//! [`EightPoint`] implements [`sample_consensus::Estimator`], so it can be
//! driven by any consensus process (such as ARRSAC) to reject outlier
//! correspondences, and [`EssentialMatrix`] implements
//! [`sample_consensus::Model`] with the epipolar constraint residual.

#![no_std]

mod essential;
mod recover;

pub use essential::*;
pub use recover::*;

use float_ord::FloatOrd;
use sample_consensus::Estimator;
use vo_core::{
    nalgebra::{self, Matrix3, OMatrix, OVector, U8, U9},
    FeatureMatch,
};

fn encode_epipolar_equation(matches: impl Iterator<Item = FeatureMatch>) -> OMatrix<f64, U8, U9> {
    let mut out: OMatrix<f64, U8, U9> = nalgebra::zero();
    for (i, FeatureMatch(a, b)) in (0..8).zip(matches) {
        let mut row = OVector::<f64, U9>::zeros();
        let ap = a.bearing_unnormalized();
        let bp = b.bearing_unnormalized();
        for j in 0..3 {
            let v = ap[j] * bp;
            row.fixed_rows_mut::<3>(3 * j).copy_from(&v);
        }
        out.row_mut(i).copy_from(&row.transpose());
    }
    out
}

/// Performs the eight-point algorithm on normalized keypoint matches,
/// producing a reconditioned essential matrix.
///
/// The estimator consumes the first eight matches it is given; driving it
/// with a consensus process samples different subsets to find the model with
/// the most inlier support.
#[derive(Copy, Clone, Debug)]
pub struct EightPoint {
    pub epsilon: f64,
    pub iterations: usize,
}

impl EightPoint {
    pub fn new() -> Self {
        Default::default()
    }

    /// Computes the essential matrix whose epipolar constraint best agrees
    /// with the given matches. Returns `None` when fewer than eight matches
    /// are provided or the eigendecomposition fails to converge.
    pub fn from_matches<I>(&self, data: I) -> Option<EssentialMatrix>
    where
        I: Iterator<Item = FeatureMatch> + Clone,
    {
        if data.clone().count() < 8 {
            return None;
        }
        let epipolar_constraint = encode_epipolar_equation(data);
        let eet = epipolar_constraint.transpose() * epipolar_constraint;
        let eigens = eet.try_symmetric_eigen(self.epsilon, self.iterations)?;
        let eigenvector = eigens
            .eigenvalues
            .iter()
            .enumerate()
            .min_by_key(|&(_, &n)| FloatOrd(n))
            .map(|(ix, _)| eigens.eigenvectors.column(ix).into_owned())?;
        let mat = Matrix3::from_iterator(eigenvector.iter().copied());
        EssentialMatrix(mat).recondition(self.epsilon, self.iterations)
    }
}

impl Default for EightPoint {
    fn default() -> Self {
        Self {
            epsilon: 1e-12,
            iterations: 1000,
        }
    }
}

impl Estimator<FeatureMatch> for EightPoint {
    type Model = EssentialMatrix;
    type ModelIter = Option<EssentialMatrix>;
    const MIN_SAMPLES: usize = 8;

    fn estimate<I>(&self, data: I) -> Self::ModelIter
    where
        I: Iterator<Item = FeatureMatch> + Clone,
    {
        self.from_matches(data)
    }
}
