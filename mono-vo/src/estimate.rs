use epipolar::{recover_pose, EightPoint};
use log::*;
use sample_consensus::{Consensus, Estimator};
use vo_core::{CameraToCamera, FeatureMatch, RelativePoseEstimator};

/// Relative pose estimation backend: a consensus process over the
/// eight-point estimator rejects outlier correspondences, and the winning
/// essential matrix is decomposed and disambiguated over the consensus
/// inliers with a cheirality vote.
pub struct PoseSolver<C> {
    consensus: C,
    estimator: EightPoint,
}

impl<C> PoseSolver<C>
where
    C: Consensus<EightPoint, FeatureMatch>,
{
    pub fn new(consensus: C) -> Self {
        Self {
            consensus,
            estimator: EightPoint::new(),
        }
    }
}

impl<C> RelativePoseEstimator for PoseSolver<C>
where
    C: Consensus<EightPoint, FeatureMatch>,
{
    fn estimate(&mut self, matches: &[FeatureMatch]) -> Option<CameraToCamera> {
        if matches.len() < <EightPoint as Estimator<FeatureMatch>>::MIN_SAMPLES {
            debug!(
                "only {} matches; below the minimal model size",
                matches.len()
            );
            return None;
        }
        let (essential, inliers) = self
            .consensus
            .model_inliers(&self.estimator, matches.iter().copied())?;
        let inliers: Vec<FeatureMatch> = inliers.into_iter().map(|ix| matches[ix]).collect();
        debug!("consensus kept {} of {} matches", inliers.len(), matches.len());
        recover_pose(
            essential,
            inliers.iter().copied(),
            self.estimator.epsilon,
            self.estimator.iterations,
        )
    }
}
