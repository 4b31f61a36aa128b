/// Resampling of ray columns into the output image.
/// Every pixel reads the nearest ray of the segment that owns it.
use super::framebuffer::{FrameSlice, Framebuffer};
use super::ray_buffer::RayBuffer;
use super::segment::SegmentPlan;
use rayon::prelude::*;

pub struct ScreenCompositor {
    stripes: usize,
}

impl Default for ScreenCompositor {
    fn default() -> Self {
        Self::new(rayon::current_num_threads() * 4)
    }
}

impl ScreenCompositor {
    pub fn new(stripes: usize) -> Self {
        Self { stripes: stripes.max(1) }
    }

    /// Fill `framebuffer` from `buffer`. Pixels no ray covers (only the one
    /// at the vanishing point itself) get `background`.
    pub fn composite(&self, plan: &SegmentPlan, buffer: &RayBuffer, framebuffer: &mut Framebuffer, background: u32) {
        framebuffer
            .split_into_stripes(self.stripes)
            .into_par_iter()
            .for_each(|mut slice| composite_stripe(plan, buffer, &mut slice, background));
    }
}

fn composite_stripe(plan: &SegmentPlan, buffer: &RayBuffer, slice: &mut FrameSlice<'_>, background: u32) {
    let y0 = slice.y0;
    for y_local in 0..slice.height {
        let py = (y0 + y_local) as u32;
        let row = slice.row_mut(y_local);
        for (px, pixel) in row.iter_mut().enumerate() {
            *pixel = plan
                .locate(px as u32, py)
                .and_then(|(kind, ray, k)| buffer.sample(kind, ray, k))
                .unwrap_or(background);
        }
    }
}
