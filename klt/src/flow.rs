use crate::image::GrayFloatImage;
use crate::pyramid::Pyramid;
use crate::Klt;
use vo_core::KeyPoint;

/// Outcome of tracking a single point between two frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Flow {
    /// Successfully tracked to a new position.
    Tracked(KeyPoint),
    /// The iterative solver hit a singular normal matrix; the flow is
    /// invalid.
    Lost,
    /// The tracked position fell outside the image bounds.
    OutOfBounds,
}

impl Klt {
    /// Tracks one point coarse-to-fine through the pyramids. The displacement
    /// found at each level seeds the next finer level, doubled to account for
    /// the resolution change.
    pub(crate) fn track_single(&self, prev: &Pyramid, curr: &Pyramid, point: KeyPoint) -> Flow {
        let levels = prev.num_levels().min(curr.num_levels());
        let (px, py) = (point.x as f32, point.y as f32);
        let mut dx = 0.0f32;
        let mut dy = 0.0f32;

        for level in (0..levels).rev() {
            let scale = (1u32 << level) as f32;
            let result = self.iterate_level(
                &prev.levels[level],
                &curr.levels[level],
                px / scale,
                py / scale,
                dx,
                dy,
            );
            match result {
                Some((new_dx, new_dy)) => {
                    dx = new_dx;
                    dy = new_dy;
                }
                None => return Flow::Lost,
            }
            if level > 0 {
                dx *= 2.0;
                dy *= 2.0;
            }
        }

        let new_x = px + dx;
        let new_y = py + dy;
        let width = curr.levels[0].width() as f32;
        let height = curr.levels[0].height() as f32;
        if new_x < 0.0 || new_y < 0.0 || new_x >= width || new_y >= height {
            Flow::OutOfBounds
        } else {
            Flow::Tracked(KeyPoint::new(new_x as f64, new_y as f64))
        }
    }

    /// Iterative forward-additive Lucas-Kanade at a single pyramid level.
    ///
    /// Gradients are evaluated at the warped position in the current frame,
    /// so the 2x2 normal matrix is rebuilt every iteration. Returns the
    /// refined displacement, or `None` when the normal matrix is singular
    /// (textureless patch, flow invalid).
    fn iterate_level(
        &self,
        prev_img: &GrayFloatImage,
        curr_img: &GrayFloatImage,
        feat_x: f32,
        feat_y: f32,
        mut dx: f32,
        mut dy: f32,
    ) -> Option<(f32, f32)> {
        let half = self.half_window as isize;

        for _ in 0..self.max_iterations {
            let mut h00 = 0.0f32;
            let mut h01 = 0.0f32;
            let mut h11 = 0.0f32;
            let mut b0 = 0.0f32;
            let mut b1 = 0.0f32;
            for py in -half..=half {
                for px in -half..=half {
                    let px_f = px as f32;
                    let py_f = py as f32;

                    // Template pixel from the previous frame at the original
                    // feature position.
                    let t_val = prev_img.sample(feat_x + px_f, feat_y + py_f);

                    // Warped pixel from the current frame at feature +
                    // displacement.
                    let wx = feat_x + dx + px_f;
                    let wy = feat_y + dy + py_f;
                    let i_val = curr_img.sample(wx, wy);

                    let error = t_val - i_val;

                    // Central differences at the warped position.
                    let gx = 0.5 * (curr_img.sample(wx + 1.0, wy) - curr_img.sample(wx - 1.0, wy));
                    let gy = 0.5 * (curr_img.sample(wx, wy + 1.0) - curr_img.sample(wx, wy - 1.0));

                    h00 += gx * gx;
                    h01 += gx * gy;
                    h11 += gy * gy;
                    b0 += gx * error;
                    b1 += gy * error;
                }
            }

            // Solve the 2x2 system H * delta = b.
            let det = h00 * h11 - h01 * h01;
            if det.abs() < self.min_determinant {
                return None;
            }
            let inv_det = det.recip();
            let delta_x = inv_det * (h11 * b0 - h01 * b1);
            let delta_y = inv_det * (h00 * b1 - h01 * b0);

            dx += delta_x;
            dy += delta_y;

            if delta_x * delta_x + delta_y * delta_y < self.epsilon * self.epsilon {
                break;
            }
        }

        Some((dx, dy))
    }
}
