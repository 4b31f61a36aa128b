/// 2D DDA over the world's XZ grid with level-of-detail transitions.
///
/// Distances are horizontal world units along a unit direction, so they stay
/// comparable across levels. A switch to a coarser level reseeds the walker
/// from the original origin and direction at the current distance; the
/// coarse cell always contains the point the fine walk had reached.
use crate::world::lod::{level_size, LodPyramid};
use glam::{IVec2, Vec2};

/// Direction components smaller than this are replaced by it.
pub const DIRECTION_EPSILON: f32 = 1e-6;

/// One visited cell and the distances at which the ray enters and leaves it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DdaStep {
    /// Cell coordinates in the grid of `level` (x, z).
    pub cell: IVec2,
    pub level: usize,
    pub t_enter: f32,
    pub t_exit: f32,
}

/// Lazy, finite cell sequence for one ray. Not restartable.
pub struct RayWalker<'a> {
    origin: Vec2,
    dir: Vec2,
    lod_distances: &'a [f32],
    level_count: usize,
    base_size: (u32, u32),
    repeating: bool,

    level: usize,
    cell: IVec2,
    step: IVec2,
    t_max: Vec2,
    t_delta: Vec2,
    t: f32,
    t_end: f32,
    finished: bool,

    steps: u32,
    lod_switches: u32,
}

#[inline]
fn substitute_epsilon(v: f32) -> f32 {
    if v.abs() < DIRECTION_EPSILON {
        if v < 0.0 {
            -DIRECTION_EPSILON
        } else {
            DIRECTION_EPSILON
        }
    } else {
        v
    }
}

impl<'a> RayWalker<'a> {
    /// Walk from `origin` (world XZ) along `dir` up to `far` units.
    /// Non-repeating worlds clip the ray to their footprint first; a ray that
    /// misses the footprint yields nothing.
    pub fn new(world: &LodPyramid, origin: Vec2, dir: Vec2, far: f32, lod_distances: &'a [f32]) -> Self {
        let dir = Vec2::new(substitute_epsilon(dir.x), substitute_epsilon(dir.y));
        let dir = dir.normalize_or_zero();
        let dir = Vec2::new(substitute_epsilon(dir.x), substitute_epsilon(dir.y));
        let size = world.size();

        let mut walker = Self {
            origin,
            dir,
            lod_distances,
            level_count: world.level_count(),
            base_size: (size.x, size.z),
            repeating: world.is_repeating(),
            level: 0,
            cell: IVec2::ZERO,
            step: IVec2::new(if dir.x < 0.0 { -1 } else { 1 }, if dir.y < 0.0 { -1 } else { 1 }),
            t_max: Vec2::ZERO,
            t_delta: Vec2::ZERO,
            t: 0.0,
            t_end: far,
            finished: false,
            steps: 0,
            lod_switches: 0,
        };

        if !walker.repeating {
            match walker.clip_to_footprint() {
                Some((t_in, t_out)) => {
                    walker.t = t_in.max(0.0);
                    walker.t_end = far.min(t_out);
                }
                None => walker.finished = true,
            }
        }
        if walker.t >= walker.t_end {
            walker.finished = true;
        }
        walker.seed();
        walker
    }

    /// Slab test against the level-0 footprint.
    fn clip_to_footprint(&self) -> Option<(f32, f32)> {
        let max = Vec2::new(self.base_size.0 as f32, self.base_size.1 as f32);
        let inv = self.dir.recip();
        let t0 = (Vec2::ZERO - self.origin) * inv;
        let t1 = (max - self.origin) * inv;
        let t_in = t0.min(t1).max_element();
        let t_out = t0.max(t1).min_element();
        if t_out <= t_in.max(0.0) {
            None
        } else {
            Some((t_in, t_out))
        }
    }

    /// Recompute the DDA state for the current level at the current distance.
    fn seed(&mut self) {
        let cell_size = LodPyramid::voxel_size(self.level);
        let p = self.origin + self.dir * self.t;
        let scaled = p / cell_size;
        let mut cell = scaled.floor().as_ivec2();
        // On a boundary while moving negatively the ray is already leaving the floor cell.
        if self.step.x < 0 && scaled.x == scaled.x.floor() {
            cell.x -= 1;
        }
        if self.step.y < 0 && scaled.y == scaled.y.floor() {
            cell.y -= 1;
        }

        let next_boundary = Vec2::new(
            (cell.x + (self.step.x > 0) as i32) as f32 * cell_size,
            (cell.y + (self.step.y > 0) as i32) as f32 * cell_size,
        );
        self.cell = cell;
        self.t_max = Vec2::splat(self.t) + (next_boundary - p) / self.dir;
        self.t_delta = Vec2::splat(cell_size) / self.dir.abs();
    }

    #[inline]
    fn in_footprint(&self) -> bool {
        if self.repeating {
            return true;
        }
        let size = level_size(glam::UVec3::new(self.base_size.0, 1, self.base_size.1), self.level);
        self.cell.x >= 0 && self.cell.y >= 0 && (self.cell.x as u32) < size.x && (self.cell.y as u32) < size.z
    }

    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    #[inline]
    pub fn direction(&self) -> Vec2 {
        self.dir
    }

    /// Cells yielded so far.
    #[inline]
    pub fn steps(&self) -> u32 {
        self.steps
    }

    #[inline]
    pub fn lod_switches(&self) -> u32 {
        self.lod_switches
    }

    /// Distance at which the walk ends (far clip or footprint exit).
    #[inline]
    pub fn t_end(&self) -> f32 {
        self.t_end
    }
}

impl<'a> Iterator for RayWalker<'a> {
    type Item = DdaStep;

    fn next(&mut self) -> Option<DdaStep> {
        if self.finished {
            return None;
        }

        let mut t_exit = self.t_max.min_element().min(self.t_end);
        while self.level + 1 < self.level_count
            && self.level < self.lod_distances.len()
            && t_exit > self.lod_distances[self.level]
        {
            self.level += 1;
            self.lod_switches += 1;
            self.seed();
            t_exit = self.t_max.min_element().min(self.t_end);
        }

        if self.t >= self.t_end || !self.in_footprint() {
            self.finished = true;
            return None;
        }

        let step = DdaStep {
            cell: self.cell,
            level: self.level,
            t_enter: self.t,
            t_exit,
        };

        // Ties step Z.
        if self.t_max.x < self.t_max.y {
            self.cell.x += self.step.x;
            self.t = self.t_max.x;
            self.t_max.x += self.t_delta.x;
        } else {
            self.cell.y += self.step.y;
            self.t = self.t_max.y;
            self.t_max.y += self.t_delta.y;
        }
        if t_exit >= self.t_end {
            self.finished = true;
        }
        self.steps += 1;
        Some(step)
    }
}
