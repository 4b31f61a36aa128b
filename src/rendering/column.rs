/// Column compositing: turns the RLE runs of each visited cell into rows of
/// one ray column, front to back, writing every row at most once.
///
/// A ray lives in the vertical plane through the eye along its horizontal
/// direction. A camera-relative point at horizontal distance `t` and relative
/// height `h` has clip coordinates `(m, w) = t * r + h * c`, where `m` is the
/// clip component along the segment's major screen axis. The continuous row
/// coordinate of that point is `q = q_a + q_b * m / w`; row `k` covers
/// `[k, k + 1)`.
use super::occlusion::RayOcclusion;
use super::ray_walker::RayWalker;
#[cfg(feature = "profiling")]
use crate::perf::FUNCTION_COUNTERS;
use crate::perf::RayStats;
use crate::world::lod::LodPyramid;
use crate::world::store::{ColumnRef, RunSpan};
use crate::{count_add, count_call};
use glam::Vec2;

const SLOPE_EPSILON: f32 = 1e-6;

/// Destination of one ray column.
pub trait ColumnTarget {
    fn write(&mut self, row: usize, color: u32);
}

impl ColumnTarget for [u32] {
    #[inline]
    fn write(&mut self, row: usize, color: u32) {
        self[row] = color;
    }
}

impl ColumnTarget for Vec<u32> {
    #[inline]
    fn write(&mut self, row: usize, color: u32) {
        self[row] = color;
    }
}

/// Per-ray projection from the ray's vertical plane to its pixel column.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RayProjection {
    /// Clip `(m, w)` of one unit of horizontal distance along the ray.
    pub r: Vec2,
    /// Clip `(m, w)` of one unit of height.
    pub c: Vec2,
    pub eye_height: f32,
    pub q_a: f32,
    pub q_b: f32,
    pub near: f32,
    pub world_height: f32,
}

impl RayProjection {
    #[inline]
    pub fn clip(&self, t: f32, h: f32) -> Vec2 {
        self.r * t + self.c * h
    }

    #[inline]
    pub fn row(&self, clip: Vec2) -> f32 {
        self.q_a + self.q_b * clip.x / clip.y
    }

    /// Height gained per unit of distance along the line of sight through
    /// row coordinate `q`.
    #[inline]
    pub fn slope(&self, q: f32) -> f32 {
        let n = (q - self.q_a) / self.q_b;
        let mut denom = self.c.x - n * self.c.y;
        if denom.abs() < SLOPE_EPSILON {
            denom = if denom < 0.0 { -SLOPE_EPSILON } else { SLOPE_EPSILON };
        }
        (n * self.r.y - self.r.x) / denom
    }

    /// Row coordinate of the vertical lines of sight, where `slope` has its pole.
    #[inline]
    pub fn pole(&self) -> Option<f32> {
        if self.c.y.abs() < SLOPE_EPSILON {
            return None;
        }
        let q = self.q_a + self.q_b * self.c.x / self.c.y;
        q.is_finite().then_some(q)
    }

    /// Range of slopes of the lines of sight through rows `[q0, q1]`.
    ///
    /// Rows beyond the pole (towards `q1`) run from a vertical line of sight
    /// to `slope(q1)`, so that side of the range is unbounded. Rows on the
    /// near side of the pole belong to the opposite half-plane and add no
    /// further bound.
    pub fn slope_range(&self, q0: f32, q1: f32) -> (f32, f32) {
        let s1 = self.slope(q1);
        match self.pole() {
            Some(pole) if pole >= q0 && pole < q1 => {
                let n = (pole - self.q_a) / self.q_b;
                let numer = n * self.r.y - self.r.x;
                // Sign of `c.x - n * c.y` just past the pole.
                let denom = -self.c.y / self.q_b;
                if numer * denom < 0.0 {
                    (f32::NEG_INFINITY, s1)
                } else {
                    (s1, f32::INFINITY)
                }
            }
            _ => {
                let s0 = self.slope(q0);
                (s0.min(s1), s0.max(s1))
            }
        }
    }

    /// Project the segment `a -> b` (clip space), clipped to the near plane.
    /// Returns the row coordinates of both clipped ends and the parameters
    /// along `a -> b` they were taken at.
    pub fn project_segment(&self, a: Vec2, b: Vec2) -> Option<ProjectedSpan> {
        let (wa, wb) = (a.y, b.y);
        if wa < self.near && wb < self.near {
            return None;
        }
        let (mut s0, mut s1) = (0.0, 1.0);
        if wa < self.near {
            s0 = (self.near - wa) / (wb - wa);
        } else if wb < self.near {
            s1 = (self.near - wa) / (wb - wa);
        }
        let p0 = a + (b - a) * s0;
        let p1 = a + (b - a) * s1;
        Some(ProjectedSpan {
            q0: self.row(p0),
            q1: self.row(p1),
            s0,
            s1,
        })
    }
}

/// A projected, near-clipped segment. `q0`/`q1` belong to parameters `s0`/`s1`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ProjectedSpan {
    pub q0: f32,
    pub q1: f32,
    pub s0: f32,
    pub s1: f32,
}

impl ProjectedSpan {
    /// Rows touched by the span, rounded outward, as an inclusive range.
    #[inline]
    pub fn rows(&self, limit: f32) -> (i64, i64) {
        let lo = self.q0.min(self.q1).clamp(-1.0, limit);
        let hi = self.q0.max(self.q1).clamp(-1.0, limit);
        (lo.floor() as i64, hi.ceil() as i64 - 1)
    }

    /// Segment parameter at the centre of `row`, by affine interpolation.
    #[inline]
    pub fn param_at_row(&self, row: usize) -> f32 {
        let span = self.q1 - self.q0;
        if span.abs() < 1e-6 {
            return (self.s0 + self.s1) * 0.5;
        }
        let f = ((row as f32 + 0.5 - self.q0) / span).clamp(0.0, 1.0);
        self.s0 + (self.s1 - self.s0) * f
    }
}

/// What the ray should do after a cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CellOutcome {
    Continue,
    /// Every row of the window is written.
    Resolved,
    /// No remaining line of sight can reach the world's height range.
    Exhausted,
}

/// Compositor state for one ray.
pub struct ColumnCompositor<'a, T: ColumnTarget + ?Sized> {
    projection: &'a RayProjection,
    occlusion: &'a mut RayOcclusion,
    target: &'a mut T,
    background: u32,
    /// Visit runs above the eye before runs below it.
    above_first: bool,
    pub stats: RayStats,
}

impl<'a, T: ColumnTarget + ?Sized> ColumnCompositor<'a, T> {
    pub fn new(
        projection: &'a RayProjection,
        occlusion: &'a mut RayOcclusion,
        target: &'a mut T,
        background: u32,
        above_first: bool,
    ) -> Self {
        Self {
            projection,
            occlusion,
            target,
            background,
            above_first,
            stats: RayStats::default(),
        }
    }

    /// Composite one column entered at `t_enter` and left at `t_exit`.
    pub fn composite_cell(&mut self, column: ColumnRef<'_>, t_enter: f32, t_exit: f32) -> CellOutcome {
        count_call!(FUNCTION_COUNTERS.columns_composited);
        let Some((free_min, free_max)) = self.occlusion.free_interval() else {
            return CellOutcome::Resolved;
        };

        let proj = self.projection;
        let (s_min, s_max) = proj.slope_range(free_min as f32, free_max as f32 + 1.0);
        let eye = proj.eye_height;

        // Every free line of sight climbs above the world or sinks below it.
        if s_min >= 0.0 && eye + s_min * t_enter >= proj.world_height {
            return CellOutcome::Exhausted;
        }
        if s_max <= 0.0 && eye + s_max * t_enter <= 0.0 {
            return CellOutcome::Exhausted;
        }

        let y_lo = if s_min.is_finite() {
            eye + (s_min * t_enter).min(s_min * t_exit)
        } else {
            f32::NEG_INFINITY
        };
        let y_hi = if s_max.is_finite() {
            eye + (s_max * t_enter).max(s_max * t_exit)
        } else {
            f32::INFINITY
        };

        let above = column.runs().rev().filter(|r| r.solid && r.bottom as f32 >= eye);
        let below = column.runs().filter(|r| r.solid && (r.bottom as f32) < eye);
        if self.above_first {
            for run in above.chain(below) {
                if self.draw_run(&column, run, t_enter, t_exit, y_lo, y_hi) {
                    return CellOutcome::Resolved;
                }
            }
        } else {
            for run in below.chain(above) {
                if self.draw_run(&column, run, t_enter, t_exit, y_lo, y_hi) {
                    return CellOutcome::Resolved;
                }
            }
        }
        CellOutcome::Continue
    }

    /// Draw the front face and the visible cap of one solid run.
    /// Returns true once the ray is fully resolved.
    fn draw_run(&mut self, column: &ColumnRef<'_>, run: RunSpan, t_enter: f32, t_exit: f32, y_lo: f32, y_hi: f32) -> bool {
        if run.is_empty() {
            return false;
        }
        if (run.top as f32) < y_lo || (run.bottom as f32) > y_hi {
            self.stats.runs_rejected += 1;
            count_call!(FUNCTION_COUNTERS.runs_rejected);
            return false;
        }
        self.stats.runs_drawn += 1;
        count_call!(FUNCTION_COUNTERS.runs_drawn);

        let proj = self.projection;
        let eye = proj.eye_height;
        let h_top = run.top as f32 - eye;
        let h_bottom = run.bottom as f32 - eye;
        let limit = self.occlusion.window().map_or(0.0, |(_, hi)| hi as f32 + 2.0);
        let len = run.len();

        // Front face, top to bottom.
        let face = proj.project_segment(proj.clip(t_enter, h_top), proj.clip(t_enter, h_bottom));
        if let Some(span) = face {
            let (lo, hi) = span.rows(limit);
            let target = &mut *self.target;
            let background = self.background;
            let written = self.occlusion.claim(lo, hi, |row| {
                // Parameter 0 is the run top, 1 its bottom.
                let s = span.param_at_row(row);
                let index = ((s * len as f32) as u32).min(len - 1);
                let color = column.color(run.color_start + index).unwrap_or(background);
                target.write(row, color);
            });
            self.stats.rows_written += written as u64;
        }

        // Cap facing the eye.
        let cap = if h_bottom >= 0.0 {
            Some((h_bottom, run.color_start + len - 1))
        } else if h_top <= 0.0 {
            Some((h_top, run.color_start))
        } else {
            None
        };
        if let Some((h, color_index)) = cap {
            if let Some(span) = proj.project_segment(proj.clip(t_enter, h), proj.clip(t_exit, h)) {
                let (lo, hi) = span.rows(limit);
                let color = column.color(color_index).unwrap_or(self.background);
                let target = &mut *self.target;
                let written = self.occlusion.claim(lo, hi, |row| target.write(row, color));
                self.stats.rows_written += written as u64;
            }
        }

        self.occlusion.is_resolved()
    }

    /// Fill every unwritten row of the window with the background.
    pub fn finish(self) -> RayStats {
        let background = self.background;
        let target = self.target;
        let written = self.occlusion.fill_unseen(|row| target.write(row, background));
        let mut stats = self.stats;
        stats.rows_written += written as u64;
        count_add!(FUNCTION_COUNTERS.rows_written, stats.rows_written);
        stats
    }
}

/// Trace one ray: walk the grid, composite every visited column, then fill
/// the remaining rows with `background`.
pub fn trace_ray<T: ColumnTarget + ?Sized>(
    world: &LodPyramid,
    mut walker: RayWalker<'_>,
    projection: &RayProjection,
    occlusion: &mut RayOcclusion,
    target: &mut T,
    background: u32,
    above_first: bool,
) -> RayStats {
    count_call!(FUNCTION_COUNTERS.trace_ray_calls);
    let mut compositor = ColumnCompositor::new(projection, occlusion, target, background, above_first);
    let mut early = false;

    if !compositor.occlusion.is_resolved() {
        for step in walker.by_ref() {
            let Some(column) = world
                .level(step.level)
                .and_then(|level| level.get_column(step.cell.x, step.cell.y))
            else {
                break;
            };
            match compositor.composite_cell(column, step.t_enter, step.t_exit) {
                CellOutcome::Continue => {}
                CellOutcome::Resolved | CellOutcome::Exhausted => {
                    early = true;
                    break;
                }
            }
        }
    }

    let mut stats = compositor.finish();
    stats.rays = 1;
    stats.dda_steps = walker.steps() as u64;
    stats.lod_switches = walker.lod_switches() as u64;
    stats.early_terminations = early as u64;
    count_add!(FUNCTION_COUNTERS.dda_steps, stats.dda_steps);
    count_add!(FUNCTION_COUNTERS.lod_switches, stats.lod_switches);
    count_add!(FUNCTION_COUNTERS.early_terminations, stats.early_terminations);
    stats
}
