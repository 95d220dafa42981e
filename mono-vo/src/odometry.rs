use crate::truth::{GroundTruth, Scale};
use log::*;
use std::path::PathBuf;
use thiserror::Error;
use vo_core::{
    CameraIntrinsics, CameraModel, FeatureDetector, FeatureMatch, FeatureTracker, KeyPoint,
    RelativePoseEstimator, TrackedPoints, WorldPose,
};

/// Fatal conditions. Everything that can go wrong after bootstrap is a
/// degraded or self-correcting state handled inside the frame loop, not an
/// error.
#[derive(Debug, Error)]
pub enum OdometryError {
    #[error("unable to read bootstrap frame {}", .0.display())]
    BootstrapFrame(PathBuf),
    #[error("bootstrap frames produced no usable relative pose")]
    DegenerateBootstrap,
}

/// Tunable limits of the trajectory accumulator.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// The frame budget of a run.
    pub max_frames: usize,
    /// Re-detection floor: when the surviving tracked point count falls
    /// below this, detection re-runs on the previous frame.
    pub min_features: usize,
    /// Scale floor of the motion validity gate.
    pub min_scale: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_frames: 1000,
            min_features: 2000,
            min_scale: 0.1,
        }
    }
}

/// What happened to the world pose on one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionUpdate {
    /// The motion gate passed and the scaled relative motion was integrated.
    Applied { scale: f64 },
    /// The gate rejected the motion: the scale was at or below the floor
    /// (zero when the ground truth was unavailable) or the translation was
    /// not forward-dominant. The pose is unchanged.
    Rejected { scale: f64 },
    /// Tracking or estimation was degenerate for this frame; the pose is
    /// unchanged.
    Degenerate,
}

/// One frame's outcome: the pose snapshot after the frame and what led to it.
#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    pub frame: usize,
    pub pose: WorldPose,
    /// Surviving tracked point count carried into the next frame.
    pub tracked: usize,
    pub update: MotionUpdate,
    pub redetected: bool,
}

/// The trajectory accumulator. Drives the detector, tracker and pose
/// estimator once per frame and integrates accepted relative motion into a
/// [`WorldPose`] snapshot.
///
/// The lifecycle is bootstrap (construction from the first two frames),
/// then one [`Odometry::advance`] per frame until the driver exhausts its
/// frame budget or the frame source.
pub struct Odometry<D, T, P, F> {
    detector: D,
    tracker: T,
    estimator: P,
    intrinsics: CameraIntrinsics,
    ground_truth: GroundTruth,
    settings: Settings,
    prev_frame: F,
    prev_points: Vec<KeyPoint>,
    pose: WorldPose,
    frame: usize,
}

impl<D, T, P, F> Odometry<D, T, P, F>
where
    D: FeatureDetector<F>,
    T: FeatureTracker<F>,
    P: RelativePoseEstimator,
{
    /// Seeds the pipeline from the first two frames: detect on the first,
    /// track into the second, and take the recovered relative pose as the
    /// initial world pose (unscaled; the first inter-frame distance defines
    /// the trajectory unit until scaled updates arrive).
    #[allow(clippy::too_many_arguments)]
    pub fn bootstrap(
        detector: D,
        tracker: T,
        mut estimator: P,
        intrinsics: CameraIntrinsics,
        ground_truth: GroundTruth,
        settings: Settings,
        first: F,
        second: F,
    ) -> Result<Self, OdometryError> {
        let points = detector.detect(&first);
        let tracked = tracker.track(&first, &second, &points);
        info!(
            "bootstrap detected {} features, tracked {}",
            points.len(),
            tracked.len()
        );
        let matches = calibrated_matches(&intrinsics, &tracked);
        let relative = estimator
            .estimate(&matches)
            .ok_or(OdometryError::DegenerateBootstrap)?;
        Ok(Self {
            detector,
            tracker,
            estimator,
            intrinsics,
            ground_truth,
            settings,
            prev_frame: second,
            prev_points: tracked.current,
            pose: WorldPose::from_relative(relative),
            frame: 1,
        })
    }

    /// The latest pose snapshot.
    pub fn pose(&self) -> WorldPose {
        self.pose
    }

    /// The index of the last processed frame.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// The working tracked point count.
    pub fn tracked_points(&self) -> usize {
        self.prev_points.len()
    }

    /// Processes one frame: track, estimate, resolve scale, gate, integrate,
    /// and re-detect when the tracked point count falls below the floor.
    /// Returns the snapshot for the frame; degraded conditions never
    /// propagate as errors out of the steady-state loop.
    pub fn advance(&mut self, frame: F) -> StepReport {
        self.frame += 1;
        let tracked = self.tracker.track(&self.prev_frame, &frame, &self.prev_points);
        let update = self.motion_update(&tracked);

        let mut redetected = false;
        let mut working = tracked;
        if working.len() < self.settings.min_features {
            info!(
                "tracked features fell to {} (floor {}); re-detecting",
                working.len(),
                self.settings.min_features
            );
            let fresh = self.detector.detect(&self.prev_frame);
            working = self.tracker.track(&self.prev_frame, &frame, &fresh);
            redetected = true;
        }

        let tracked_count = working.len();
        self.prev_frame = frame;
        self.prev_points = working.current;
        StepReport {
            frame: self.frame,
            pose: self.pose,
            tracked: tracked_count,
            update,
            redetected,
        }
    }

    /// Estimates the relative motion for the current frame and applies it to
    /// the pose snapshot if it passes the motion validity gate.
    fn motion_update(&mut self, tracked: &TrackedPoints) -> MotionUpdate {
        if tracked.is_empty() {
            warn!(
                "no correspondences survived tracking on frame {}; skipping pose update",
                self.frame
            );
            return MotionUpdate::Degenerate;
        }
        let matches = calibrated_matches(&self.intrinsics, tracked);
        let relative = match self.estimator.estimate(&matches) {
            Some(relative) => relative,
            None => {
                warn!(
                    "pose estimation failed on frame {}; skipping pose update",
                    self.frame
                );
                return MotionUpdate::Degenerate;
            }
        };

        let scale = match self.ground_truth.resolve(self.frame) {
            Scale::Resolved(scale) => scale,
            Scale::Unavailable => {
                debug!("no ground truth for frame {}; scale degraded to zero", self.frame);
                0.0
            }
        };

        // The gate assumes forward-dominant motion: the z component of the
        // relative translation must exceed both the x and y components.
        let translation = relative.translation();
        let forward_dominant = translation.z > translation.x && translation.z > translation.y;
        if scale > self.settings.min_scale && forward_dominant {
            self.pose = self.pose.integrate(relative, scale);
            MotionUpdate::Applied { scale }
        } else {
            debug!(
                "frame {}: scale {} below floor or translation not forward-dominant; pose not updated",
                self.frame, scale
            );
            MotionUpdate::Rejected { scale }
        }
    }
}

fn calibrated_matches(intrinsics: &CameraIntrinsics, tracked: &TrackedPoints) -> Vec<FeatureMatch> {
    tracked
        .current
        .iter()
        .zip(tracked.previous.iter())
        .map(|(&current, &previous)| {
            FeatureMatch(intrinsics.calibrate(current), intrinsics.calibrate(previous))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use vo_core::nalgebra::{Point3, Rotation3, Vector3};
    use vo_core::CameraToCamera;

    /// Hands out the same points every call and counts invocations.
    struct FakeDetector {
        points: usize,
        calls: Cell<usize>,
    }

    impl FeatureDetector<()> for FakeDetector {
        fn detect(&self, _frame: &()) -> Vec<KeyPoint> {
            self.calls.set(self.calls.get() + 1);
            (0..self.points)
                .map(|i| KeyPoint::new(i as f64, i as f64))
                .collect()
        }
    }

    /// Keeps the first `survivors` points, shifting each by one pixel.
    struct FakeTracker {
        survivors: usize,
    }

    impl FeatureTracker<()> for FakeTracker {
        fn track(&self, _previous: &(), _current: &(), points: &[KeyPoint]) -> TrackedPoints {
            let kept = points.iter().take(self.survivors);
            TrackedPoints {
                previous: kept.clone().copied().collect(),
                current: kept.map(|p| KeyPoint::new(p.x + 1.0, p.y)).collect(),
            }
        }
    }

    /// Always reports the same relative pose.
    struct FakeEstimator {
        relative: CameraToCamera,
        calls: Cell<usize>,
    }

    impl FakeEstimator {
        fn forward() -> Self {
            Self {
                relative: CameraToCamera::from_parts(Vector3::z(), Rotation3::identity()),
                calls: Cell::new(0),
            }
        }

        fn with_translation(translation: Vector3<f64>) -> Self {
            Self {
                relative: CameraToCamera::from_parts(translation, Rotation3::identity()),
                calls: Cell::new(0),
            }
        }
    }

    impl RelativePoseEstimator for FakeEstimator {
        fn estimate(&mut self, matches: &[FeatureMatch]) -> Option<CameraToCamera> {
            self.calls.set(self.calls.get() + 1);
            (!matches.is_empty()).then(|| self.relative)
        }
    }

    /// Ground truth moving along z in uniform steps.
    fn uniform_truth(step: f64, frames: usize) -> GroundTruth {
        GroundTruth::from_positions(
            (0..frames)
                .map(|i| Point3::new(0.0, 0.0, i as f64 * step))
                .collect(),
        )
    }

    fn settings(min_features: usize) -> Settings {
        Settings {
            min_features,
            ..Default::default()
        }
    }

    fn bootstrap(
        survivors: usize,
        estimator: FakeEstimator,
        truth: GroundTruth,
        settings: Settings,
    ) -> Odometry<FakeDetector, FakeTracker, FakeEstimator, ()> {
        Odometry::bootstrap(
            FakeDetector {
                points: 3000,
                calls: Cell::new(0),
            },
            FakeTracker { survivors },
            estimator,
            CameraIntrinsics::identity(),
            truth,
            settings,
            (),
            (),
        )
        .unwrap()
    }

    #[test]
    fn bootstrap_seeds_pose_from_relative() {
        let odometry = bootstrap(2500, FakeEstimator::forward(), GroundTruth::empty(), settings(0));
        assert_eq!(odometry.pose().translation, Vector3::z());
        assert_eq!(odometry.frame(), 1);
    }

    #[test]
    fn forward_motion_integrates_with_scale() {
        let mut odometry = bootstrap(2500, FakeEstimator::forward(), uniform_truth(2.0, 10), settings(0));
        let report = odometry.advance(());
        assert_eq!(report.update, MotionUpdate::Applied { scale: 2.0 });
        // Bootstrap translation (0, 0, 1) plus 2.0 * (0, 0, 1).
        assert_eq!(report.pose.translation, Vector3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn gate_rejects_scale_below_floor() {
        // 0.05 is below the 0.1 floor: the pose must be carried unchanged no
        // matter what the estimator produced.
        let mut odometry = bootstrap(2500, FakeEstimator::forward(), uniform_truth(0.05, 10), settings(0));
        let before = odometry.pose();
        let report = odometry.advance(());
        assert_eq!(report.update, MotionUpdate::Rejected { scale: 0.05 });
        assert_eq!(report.pose, before);
        assert_eq!(odometry.pose(), before);
    }

    #[test]
    fn gate_rejects_sideways_motion() {
        let estimator = FakeEstimator::with_translation(Vector3::new(0.9, 0.1, 0.4));
        let mut odometry = bootstrap(2500, estimator, uniform_truth(2.0, 10), settings(0));
        let before = odometry.pose();
        let report = odometry.advance(());
        assert_eq!(report.update, MotionUpdate::Rejected { scale: 2.0 });
        assert_eq!(odometry.pose(), before);
    }

    #[test]
    fn missing_ground_truth_degrades_to_gate_rejection() {
        let mut odometry = bootstrap(2500, FakeEstimator::forward(), GroundTruth::empty(), settings(0));
        let before = odometry.pose();
        let report = odometry.advance(());
        assert_eq!(report.update, MotionUpdate::Rejected { scale: 0.0 });
        assert_eq!(odometry.pose(), before);
    }

    #[test]
    fn zero_survivors_skip_the_frame() {
        let estimator = FakeEstimator::forward();
        let mut odometry = bootstrap(2500, estimator, uniform_truth(2.0, 10), settings(0));
        let calls_after_bootstrap = odometry.estimator.calls.get();
        let before = odometry.pose();
        odometry.tracker.survivors = 0;
        let report = odometry.advance(());
        assert_eq!(report.update, MotionUpdate::Degenerate);
        assert_eq!(odometry.pose(), before);
        // The estimator must not run on an empty match set.
        assert_eq!(odometry.estimator.calls.get(), calls_after_bootstrap);
    }

    #[test]
    fn redetection_triggers_below_the_floor() {
        // 2500 -> 1800 survivors with a floor of 2000 must re-detect before
        // the next estimation.
        let mut odometry = bootstrap(1800, FakeEstimator::forward(), uniform_truth(2.0, 10), settings(2000));
        let detect_calls = odometry.detector.calls.get();
        let report = odometry.advance(());
        assert!(report.redetected);
        assert_eq!(odometry.detector.calls.get(), detect_calls + 1);
        // Recovery is monotonic: the replenished set is never smaller than
        // the set that triggered it.
        assert!(report.tracked >= 1800);
    }

    #[test]
    fn no_redetection_at_the_floor() {
        let mut odometry = bootstrap(2000, FakeEstimator::forward(), uniform_truth(2.0, 10), settings(2000));
        let detect_calls = odometry.detector.calls.get();
        let report = odometry.advance(());
        assert!(!report.redetected);
        assert_eq!(odometry.detector.calls.get(), detect_calls);
    }

    #[test]
    fn rotation_stays_orthonormal_over_a_run() {
        let estimator = FakeEstimator {
            relative: CameraToCamera::from_parts(
                Vector3::new(0.01, -0.02, 0.95),
                Rotation3::from_euler_angles(0.002, 0.015, -0.001),
            ),
            calls: Cell::new(0),
        };
        let mut odometry = bootstrap(2500, estimator, uniform_truth(1.0, 200), settings(0));
        for _ in 0..150 {
            odometry.advance(());
        }
        let rotation = odometry.pose().rotation;
        let should_identity = rotation.matrix() * rotation.matrix().transpose();
        assert!((should_identity - vo_core::nalgebra::Matrix3::identity()).norm() < 1e-9);
    }
}
