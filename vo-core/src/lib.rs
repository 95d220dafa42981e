//! # vo-core
//!
//! Common abstractions and types for the monocular visual odometry crates in
//! this workspace. Everything that two or more crates need to agree on lives
//! here: pixel keypoints, normalized image coordinates, the pinhole camera
//! model, projective camera points, relative and accumulated poses, and the
//! capability traits the odometry pipeline is generic over.
//!
//! The crate is `#![no_std]`. The capability traits need `Vec` and are gated
//! behind the `alloc` feature, which the tracking and application crates
//! enable.
//!
//! ## Coordinate conventions
//!
//! Image coordinates have +x right and +y down. Camera space has its origin
//! at the optical center, +z forwards, +y down, +x right (right-handed). A
//! [`NormalizedKeyPoint`] is a position on the virtual image plane at depth
//! 1.0, so its homogeneous form `(x, y, 1)` is also a bearing out of the
//! camera.

#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

mod camera;
#[cfg(feature = "alloc")]
mod features;
mod keypoint;
mod matches;
mod point;
mod pose;

pub use camera::*;
#[cfg(feature = "alloc")]
pub use features::*;
pub use keypoint::*;
pub use matches::*;
pub use nalgebra;
pub use point::*;
pub use pose::*;
