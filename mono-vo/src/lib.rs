//! Monocular visual odometry over a KITTI-style image sequence.
//!
//! The pipeline tracks FAST corners between consecutive frames with
//! pyramidal Lucas-Kanade optical flow, estimates the relative camera pose
//! from the surviving correspondences with a consensus-driven eight-point
//! solver, recovers the metric scale from a ground-truth trajectory file,
//! and integrates the scaled relative motion into a world pose, one frame at
//! a time. The accumulated translation is written out as plain-text `x y z`
//! lines and optionally rendered as a top-down trajectory image.
//!
//! Monocular pose estimation only observes the translation *direction*;
//! without the ground-truth scale the motion gate rejects every update and
//! the trajectory stays at its bootstrap pose.

pub mod estimate;
pub mod frames;
pub mod odometry;
pub mod plot;
pub mod truth;

pub use estimate::PoseSolver;
pub use frames::ImageSequence;
pub use odometry::{MotionUpdate, Odometry, OdometryError, Settings, StepReport};
pub use plot::TrajectoryPlot;
pub use truth::{GroundTruth, Scale};
