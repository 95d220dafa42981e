use crate::odometry::OdometryError;
use klt::GrayFloatImage;
use log::*;
use std::path::{Path, PathBuf};

/// A directory of sequentially numbered image files in the KITTI layout
/// (`000000.png`, `000001.png`, ...). Frames are converted to unit-range
/// grayscale on load.
pub struct ImageSequence {
    directory: PathBuf,
}

impl ImageSequence {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    /// The path of the numbered frame inside the sequence directory.
    pub fn path(&self, index: usize) -> PathBuf {
        self.directory.join(format!("{:06}.png", index))
    }

    /// Loads one frame. A missing or unreadable file means the sequence has
    /// ended and is not an error.
    pub fn frame(&self, index: usize) -> Option<GrayFloatImage> {
        let path = self.path(index);
        match image::open(&path) {
            Ok(image) => Some(GrayFloatImage::from_dynamic(&image)),
            Err(error) => {
                debug!(
                    "frame {} unavailable ({}); treating as end of sequence",
                    index, error
                );
                None
            }
        }
    }

    /// The first two frames, which seed the pipeline. Unlike the steady-state
    /// loop, failing to read either of these aborts the run.
    pub fn bootstrap_pair(&self) -> Result<(GrayFloatImage, GrayFloatImage), OdometryError> {
        let first = self
            .frame(0)
            .ok_or_else(|| OdometryError::BootstrapFrame(self.path(0)))?;
        let second = self
            .frame(1)
            .ok_or_else(|| OdometryError::BootstrapFrame(self.path(1)))?;
        Ok((first, second))
    }
}
