/// Screen decomposition into four radial ray fans around the vanishing point.
///
/// Each segment is the 90 degree cone of pixels around one screen axis as
/// seen from the vanishing point. Its rays are parameterised by the minor
/// coordinate `m` where they cross the segment's far screen edge; pixels
/// along a ray are indexed by `k`, the number of pixel steps from the first
/// sampled row (or column) nearest the vanishing point.
///
/// A frame always traces `W + 2H` rays. They are shared between the segments
/// in proportion to the far-edge span each one covers, which keeps the far-edge
/// spacing below two pixels for any vanishing point.
use super::column::RayProjection;
use crate::camera::CameraFrame;
use glam::{Vec2, Vec3};

/// Keeps float-to-int conversions of far-away vanishing points finite.
const COORD_LIMIT: f32 = 1.0e7;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Top,
    Bottom,
    Left,
    Right,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; 4] = [SegmentKind::Top, SegmentKind::Bottom, SegmentKind::Left, SegmentKind::Right];

    /// True when the major axis is screen Y.
    #[inline]
    pub const fn is_vertical(self) -> bool {
        matches!(self, SegmentKind::Top | SegmentKind::Bottom)
    }

    /// Direction of travel along the major axis, away from the vanishing point.
    #[inline]
    pub const fn sign(self) -> i32 {
        match self {
            SegmentKind::Bottom | SegmentKind::Right => 1,
            SegmentKind::Top | SegmentKind::Left => -1,
        }
    }

    /// Segment owning a pixel centre at offset `(dx, dy)` from the vanishing point.
    #[inline]
    pub fn owning(dx: f32, dy: f32) -> Self {
        if dy > 0.0 && dx.abs() <= dy {
            SegmentKind::Bottom
        } else if dy < 0.0 && dx.abs() <= -dy {
            SegmentKind::Top
        } else if dx > 0.0 && dy.abs() < dx {
            SegmentKind::Right
        } else {
            SegmentKind::Left
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Pixel rectangle a segment writes, `x1`/`y1` exclusive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelWindow {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub ray_count: usize,
    /// Pixels per ray column.
    pub column_len: usize,
    /// First sampled pixel row (or column) on the major axis.
    pub near_index: i32,
    /// Index of this segment's first ray in the frame's global ray order.
    pub ray_base: usize,
    /// Far-edge minor coordinate of the first and last ray.
    pub lo: f32,
    pub hi: f32,
    pub vp_major: f32,
    pub vp_minor: f32,
    /// Major coordinate of the far screen edge.
    pub far_edge: f32,
    pub minor_extent: f32,
    /// Major distance from the vanishing point to the far edge.
    pub far_distance: f32,
    /// Major distance from the vanishing point to the first sampled pixel centre.
    pub first_distance: f32,
    /// World directions of the extreme rays, relative to the eye.
    pub dir_lo: Vec3,
    pub dir_hi: Vec3,
    pub window: PixelWindow,
}

impl Segment {
    fn degenerate(kind: SegmentKind) -> Self {
        Self {
            kind,
            ray_count: 0,
            column_len: 0,
            near_index: 0,
            ray_base: 0,
            lo: 0.0,
            hi: 0.0,
            vp_major: 0.0,
            vp_minor: 0.0,
            far_edge: 0.0,
            minor_extent: 0.0,
            far_distance: 0.0,
            first_distance: 0.0,
            dir_lo: Vec3::ZERO,
            dir_hi: Vec3::ZERO,
            window: PixelWindow::default(),
        }
    }

    /// Plan one segment for the frame's vanishing point.
    pub fn plan(kind: SegmentKind, frame: &CameraFrame) -> Self {
        let vp = frame.vanishing_point.clamp(Vec2::splat(-COORD_LIMIT), Vec2::splat(COORD_LIMIT));
        let (v_major, v_minor, major_extent, minor_extent) = if kind.is_vertical() {
            (vp.y, vp.x, frame.height, frame.width)
        } else {
            (vp.x, vp.y, frame.width, frame.height)
        };
        let extent = major_extent as i32;
        let sign = kind.sign();

        let near_index = if sign > 0 {
            ((v_major + 0.5).floor() as i32).max(0)
        } else {
            ((v_major - 1.5).ceil() as i32).min(extent - 1)
        };
        let column_len = if sign > 0 { extent - near_index } else { near_index + 1 };
        if column_len <= 0 {
            return Self::degenerate(kind);
        }

        let far_edge = if sign > 0 { major_extent } else { 0.0 };
        let far_distance = (far_edge - v_major).abs();
        let first_distance = (near_index as f32 + 0.5 - v_major).abs();
        if !(far_distance > 0.0 && first_distance > 0.0) {
            return Self::degenerate(kind);
        }

        // Far-edge reach of rays through the screen's minor extremes at the
        // first sampled row. Inside the span the 45 degree bound alone applies.
        let corner = 1.0 - far_distance / first_distance;
        let lo = (v_minor - far_distance).max((v_minor * corner).min(0.0));
        let hi = (v_minor + far_distance).min(minor_extent - ((minor_extent - v_minor) * corner).min(0.0));
        if !(lo <= hi) {
            return Self::degenerate(kind);
        }
        // Final count is assigned by the plan's ray budget.
        let ray_count = 1;

        let (w, h) = (frame.width as u32, frame.height as u32);
        let window = match kind {
            SegmentKind::Bottom => PixelWindow { x0: 0, y0: near_index as u32, x1: w, y1: h },
            SegmentKind::Top => PixelWindow { x0: 0, y0: 0, x1: w, y1: near_index as u32 + 1 },
            SegmentKind::Right => PixelWindow { x0: near_index as u32, y0: 0, x1: w, y1: h },
            SegmentKind::Left => PixelWindow { x0: 0, y0: 0, x1: near_index as u32 + 1, y1: h },
        };

        let mut segment = Self {
            kind,
            ray_count,
            column_len: column_len as usize,
            near_index,
            ray_base: 0,
            lo,
            hi,
            vp_major: v_major,
            vp_minor: v_minor,
            far_edge,
            minor_extent,
            far_distance,
            first_distance,
            dir_lo: Vec3::ZERO,
            dir_hi: Vec3::ZERO,
            window,
        };
        segment.dir_lo = frame.unproject_dir(segment.screen_point(far_edge, lo));
        segment.dir_hi = frame.unproject_dir(segment.screen_point(far_edge, hi));
        segment
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.ray_count == 0
    }

    /// Far-edge span covered by the rays.
    #[inline]
    pub fn spread(&self) -> f32 {
        if self.is_degenerate() {
            0.0
        } else {
            self.hi - self.lo
        }
    }

    /// Ray buffer cells used by this segment.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.ray_count * self.column_len
    }

    #[inline]
    fn screen_point(&self, major: f32, minor: f32) -> Vec2 {
        if self.kind.is_vertical() {
            Vec2::new(minor, major)
        } else {
            Vec2::new(major, minor)
        }
    }

    /// Far-edge minor coordinate of ray `i`.
    #[inline]
    pub fn ray_minor(&self, i: usize) -> f32 {
        if self.ray_count <= 1 {
            return self.lo;
        }
        self.lo + (self.hi - self.lo) * i as f32 / (self.ray_count - 1) as f32
    }

    /// Screen point where ray `i` meets the far edge.
    #[inline]
    pub fn far_point(&self, i: usize) -> Vec2 {
        self.screen_point(self.far_edge, self.ray_minor(i))
    }

    /// Screen pixel of row `k` of ray `i`.
    pub fn pixel(&self, i: usize, k: usize) -> (i64, i64) {
        let major = self.near_index as i64 + self.kind.sign() as i64 * k as i64;
        let u = self.first_distance + k as f32;
        let minor = self.vp_minor + (self.ray_minor(i) - self.vp_minor) * u / self.far_distance;
        let minor = minor.floor() as i64;
        if self.kind.is_vertical() {
            (minor, major)
        } else {
            (major, minor)
        }
    }

    /// Rows of ray `i` whose pixels can lie on screen, inclusive.
    pub fn row_window(&self, i: usize) -> Option<(usize, usize)> {
        if self.is_degenerate() {
            return None;
        }
        let last = self.column_len as f32 - 1.0;
        let slope = (self.ray_minor(i) - self.vp_minor) / self.far_distance;
        let (k_lo, k_hi) = if slope.abs() < 1e-9 {
            if self.vp_minor < -0.5 || self.vp_minor > self.minor_extent + 0.5 {
                return None;
            }
            (0.0, last)
        } else {
            let u1 = (-0.5 - self.vp_minor) / slope;
            let u2 = (self.minor_extent + 0.5 - self.vp_minor) / slope;
            let (u_lo, u_hi) = (u1.min(u2), u1.max(u2));
            (
                (u_lo - self.first_distance).ceil().max(0.0),
                (u_hi - self.first_distance).floor().min(last),
            )
        };
        if k_lo > k_hi {
            None
        } else {
            Some((k_lo as usize, k_hi as usize))
        }
    }

    /// Horizontal world direction of ray `i`.
    pub fn ray_direction(&self, frame: &CameraFrame, i: usize) -> Vec2 {
        let dir = frame.unproject_dir(self.far_point(i));
        let horizontal = Vec2::new(dir.x, dir.z);
        horizontal.try_normalize().unwrap_or(Vec2::new(1.0, 0.0))
    }

    /// Projection of ray `i`'s vertical plane onto its pixel column.
    pub fn projection(&self, frame: &CameraFrame, dir: Vec2, world_height: f32) -> RayProjection {
        let r4 = frame.horizontal_clip(dir);
        let c4 = frame.up_clip;
        let (r, c) = if self.kind.is_vertical() {
            (Vec2::new(r4.y, r4.w), Vec2::new(c4.y, c4.w))
        } else {
            (Vec2::new(r4.x, r4.w), Vec2::new(c4.x, c4.w))
        };
        // Screen coordinate s = alpha + beta * ndc on the major axis.
        let (alpha, beta) = if self.kind.is_vertical() {
            (frame.height * 0.5, -frame.height * 0.5)
        } else {
            (frame.width * 0.5, frame.width * 0.5)
        };
        let near = self.near_index as f32;
        let (q_a, q_b) = if self.kind.sign() > 0 {
            (alpha - near, beta)
        } else {
            (near + 1.0 - alpha, -beta)
        };
        RayProjection {
            r,
            c,
            eye_height: frame.eye.y,
            q_a,
            q_b,
            near: frame.near,
            world_height,
        }
    }

    /// Ray and row of the pixel centre `(px, py)`, or `None` outside this
    /// segment's columns. The ray index is the nearest one, clamped.
    pub fn ray_for_pixel(&self, px: u32, py: u32) -> Option<(usize, usize)> {
        if self.is_degenerate() {
            return None;
        }
        let (major_index, minor_centre) = if self.kind.is_vertical() {
            (py as i32, px as f32 + 0.5)
        } else {
            (px as i32, py as f32 + 0.5)
        };
        let k = self.kind.sign() * (major_index - self.near_index);
        if k < 0 || k as usize >= self.column_len {
            return None;
        }
        let major_centre = major_index as f32 + 0.5;
        let du = major_centre - self.vp_major;
        if du == 0.0 {
            return None;
        }
        let m = self.vp_minor + (minor_centre - self.vp_minor) * (self.far_edge - self.vp_major) / du;
        let ray = if self.ray_count <= 1 {
            0
        } else {
            let f = (m - self.lo) / (self.hi - self.lo) * (self.ray_count - 1) as f32;
            (f.round().max(0.0) as usize).min(self.ray_count - 1)
        };
        Some((ray, k as usize))
    }
}

/// The four segments of one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentPlan {
    pub segments: [Segment; 4],
    pub vanishing_point: Vec2,
    pub total_rays: usize,
}

impl SegmentPlan {
    pub fn compute(frame: &CameraFrame) -> Self {
        let mut segments = SegmentKind::ALL.map(|kind| Segment::plan(kind, frame));
        let budget = Self::ray_budget(frame.width as u32, frame.height as u32);
        let active = segments.iter().filter(|s| !s.is_degenerate()).count();
        let spread: f32 = segments.iter().map(Segment::spread).sum();
        if spread > 0.0 {
            // Each segment's first ray is free; the rest split the far-edge
            // spread evenly, so spacing never exceeds `spread / gaps`.
            let gaps = budget.saturating_sub(active) as f32;
            for segment in segments.iter_mut().filter(|s| !s.is_degenerate()) {
                let share = segment.spread() / spread * gaps;
                segment.ray_count = (share - 1e-3).ceil().max(0.0) as usize + 1;
            }
        }
        let mut base = 0;
        for segment in &mut segments {
            segment.ray_base = base;
            base += segment.ray_count;
        }
        Self {
            segments,
            vanishing_point: frame.vanishing_point,
            total_rays: base,
        }
    }

    #[inline]
    pub fn segment(&self, kind: SegmentKind) -> &Segment {
        &self.segments[kind.index()]
    }

    /// Ray buffer cells needed for this plan.
    pub fn cell_count(&self) -> usize {
        self.segments.iter().map(Segment::cell_count).sum()
    }

    /// Segment, ray and row feeding pixel `(px, py)`.
    pub fn locate(&self, px: u32, py: u32) -> Option<(SegmentKind, usize, usize)> {
        let dx = px as f32 + 0.5 - self.vanishing_point.x;
        let dy = py as f32 + 0.5 - self.vanishing_point.y;
        let kind = SegmentKind::owning(dx, dy);
        match self.segment(kind).ray_for_pixel(px, py) {
            Some((ray, k)) => Some((kind, ray, k)),
            // No segment samples the pixel centred on the vanishing point;
            // it borrows a vertical neighbour's ray.
            None if dx == 0.0 && dy == 0.0 => self
                .locate(px, py + 1)
                .or_else(|| py.checked_sub(1).and_then(|y| self.locate(px, y))),
            None => None,
        }
    }

    /// Rays traced per frame at this resolution, summed over all segments.
    #[inline]
    pub fn ray_budget(width: u32, height: u32) -> usize {
        width as usize + 2 * height as usize
    }

    /// Upper bound on the cells any plan can use at this resolution.
    /// Per-segment rounding adds at most three rays to the budget.
    pub fn max_cell_count(width: u32, height: u32) -> usize {
        (Self::ray_budget(width, height) + 4) * width.max(height) as usize
    }
}
