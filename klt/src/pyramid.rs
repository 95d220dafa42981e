use crate::image::{gaussian_blur, GrayFloatImage};

/// Smallest dimension a pyramid level may have. Below this there is not
/// enough support left for a tracking window.
const MIN_LEVEL_SIZE: usize = 16;

/// A coarse-to-fine image stack. Level 0 is the full-resolution image and
/// every following level is Gaussian-smoothed and half the size of its
/// predecessor.
#[derive(Debug, Clone)]
pub struct Pyramid {
    pub levels: Vec<GrayFloatImage>,
}

impl Pyramid {
    /// Builds a pyramid with up to `levels` levels. Fewer levels are produced
    /// when the image becomes too small to halve further.
    pub fn build(image: &GrayFloatImage, levels: usize) -> Self {
        assert!(levels >= 1, "a pyramid needs at least the base level");
        let mut stack = Vec::with_capacity(levels);
        stack.push(image.clone());
        for _ in 1..levels {
            let last = stack.last().unwrap();
            if last.width() / 2 < MIN_LEVEL_SIZE || last.height() / 2 < MIN_LEVEL_SIZE {
                break;
            }
            stack.push(gaussian_blur(last, 1.0).half_size());
        }
        Self { levels: stack }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_halve_in_size() {
        let image = GrayFloatImage::new(256, 128);
        let pyramid = Pyramid::build(&image, 4);
        assert_eq!(pyramid.num_levels(), 4);
        assert_eq!(pyramid.levels[1].width(), 128);
        assert_eq!(pyramid.levels[1].height(), 64);
        assert_eq!(pyramid.levels[3].width(), 32);
        assert_eq!(pyramid.levels[3].height(), 16);
    }

    #[test]
    fn small_images_stop_early() {
        let image = GrayFloatImage::new(40, 40);
        let pyramid = Pyramid::build(&image, 4);
        // 40 -> 20 -> stop (10 would be below the minimum level size).
        assert_eq!(pyramid.num_levels(), 2);
    }
}
