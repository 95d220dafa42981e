use crate::NormalizedKeyPoint;

/// A normalized keypoint correspondence between two consecutive frames, in
/// `(current, previous)` order. A relative pose estimated from these matches
/// transforms the current frame's camera space into the previous frame's
/// camera space.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct FeatureMatch(pub NormalizedKeyPoint, pub NormalizedKeyPoint);
