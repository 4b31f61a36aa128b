/// Per-ray occlusion horizon.
/// Tracks which rows of a ray column are already resolved, so every row is
/// written at most once without a depth buffer. The seen bitmap covers the
/// whole column; `[free_min, free_max]` is the tightest interval known to
/// still contain unwritten rows and collapses once the ray is resolved.
use bitvec::vec::BitVec;

pub struct RayOcclusion {
    seen: BitVec,
    window_min: i32,
    window_max: i32,
    free_min: i32,
    free_max: i32,
}

impl Default for RayOcclusion {
    fn default() -> Self {
        Self::new()
    }
}

impl RayOcclusion {
    pub fn new() -> Self {
        Self {
            seen: BitVec::new(),
            window_min: 0,
            window_max: -1,
            free_min: 0,
            free_max: -1,
        }
    }

    /// Prepare for a new ray with `column_len` rows of which only
    /// `window` (inclusive) may be written. Keeps the bitmap allocation.
    pub fn reset(&mut self, column_len: usize, window: Option<(usize, usize)>) {
        self.seen.clear();
        self.seen.resize(column_len, false);
        let (lo, hi) = match window {
            Some((lo, hi)) if lo <= hi && hi < column_len => (lo as i32, hi as i32),
            _ => (0, -1),
        };
        self.window_min = lo;
        self.window_max = hi;
        self.free_min = lo;
        self.free_max = hi;
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.free_min > self.free_max
    }

    /// Rows that may still receive a write, inclusive.
    #[inline]
    pub fn free_interval(&self) -> Option<(usize, usize)> {
        if self.is_resolved() {
            None
        } else {
            Some((self.free_min as usize, self.free_max as usize))
        }
    }

    #[inline]
    pub fn window(&self) -> Option<(usize, usize)> {
        if self.window_min > self.window_max {
            None
        } else {
            Some((self.window_min as usize, self.window_max as usize))
        }
    }

    #[inline]
    pub fn is_seen(&self, row: usize) -> bool {
        self.seen.get(row).map_or(false, |bit| *bit)
    }

    /// Claim rows `lo..=hi` (clamped to the free interval). `write` is called
    /// once for every row not seen before. Returns the number of rows written.
    pub fn claim(&mut self, lo: i64, hi: i64, mut write: impl FnMut(usize)) -> usize {
        let lo = lo.max(self.free_min as i64);
        let hi = hi.min(self.free_max as i64);
        if lo > hi {
            return 0;
        }
        let mut written = 0;
        for row in lo as usize..=hi as usize {
            if !self.seen[row] {
                self.seen.set(row, true);
                write(row);
                written += 1;
            }
        }
        if written > 0 {
            self.shrink();
        }
        written
    }

    /// Resolve every row of the window still unseen. Returns rows written.
    pub fn fill_unseen(&mut self, mut write: impl FnMut(usize)) -> usize {
        if self.is_resolved() {
            return 0;
        }
        let mut written = 0;
        for row in self.free_min as usize..=self.free_max as usize {
            if !self.seen[row] {
                self.seen.set(row, true);
                write(row);
                written += 1;
            }
        }
        self.free_min = self.free_max + 1;
        written
    }

    #[inline]
    fn shrink(&mut self) {
        while self.free_min <= self.free_max && self.seen[self.free_min as usize] {
            self.free_min += 1;
        }
        while self.free_max >= self.free_min && self.seen[self.free_max as usize] {
            self.free_max -= 1;
        }
    }
}
