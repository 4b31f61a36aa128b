/// Intermediate storage for ray columns
/// Segment regions sit back to back; within a region ray `i` owns the
/// `column_len` cells starting at `i * column_len`, row `k` at offset `k`.
use super::framebuffer::fill_u32;
use super::segment::{SegmentKind, SegmentPlan};
use log::debug;

/// Location of one segment's region.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionLayout {
    pub offset: usize,
    pub ray_count: usize,
    pub column_len: usize,
}

impl RegionLayout {
    #[inline]
    pub fn len(&self) -> usize {
        self.ray_count * self.column_len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One segment's cells, borrowed mutably and disjointly from the others.
pub struct SegmentRegion<'a> {
    pub kind: SegmentKind,
    pub column_len: usize,
    pub cells: &'a mut [u32],
}

#[derive(Clone, Debug, Default)]
pub struct RayBuffer {
    cells: Vec<u32>,
    regions: [RegionLayout; 4],
    used: usize,
}

impl RayBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer pre-sized for the common layouts at `width x height`.
    pub fn with_resolution(width: u32, height: u32) -> Self {
        let mut buffer = Self::new();
        buffer.reserve_for(width, height);
        buffer
    }

    /// Cells of the largest plan at a resolution, so frames never grow the
    /// buffer after a resolution change.
    pub fn presize_cells(width: u32, height: u32) -> usize {
        SegmentPlan::max_cell_count(width, height)
    }

    /// Grow storage ahead of a resolution change.
    pub fn reserve_for(&mut self, width: u32, height: u32) {
        self.grow_to(Self::presize_cells(width, height));
    }

    fn grow_to(&mut self, cells: usize) {
        if cells > self.cells.len() {
            debug!("ray buffer grows {} -> {} cells", self.cells.len(), cells);
            self.cells.resize(cells, 0);
        }
    }

    /// Lay out `plan`'s regions, growing if needed, and clear the used cells
    /// to `background`. Must run before any ray writes.
    pub fn prepare(&mut self, plan: &SegmentPlan, background: u32) {
        let mut offset = 0;
        for segment in &plan.segments {
            self.regions[segment.kind.index()] = RegionLayout {
                offset,
                ray_count: segment.ray_count,
                column_len: segment.column_len,
            };
            offset += segment.cell_count();
        }
        self.grow_to(offset);
        self.used = offset;
        fill_u32(&mut self.cells[..offset], background);
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Cells used by the current layout.
    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    #[inline]
    pub fn region(&self, kind: SegmentKind) -> RegionLayout {
        self.regions[kind.index()]
    }

    /// Column of ray `ray` in segment `kind`.
    pub fn column(&self, kind: SegmentKind, ray: usize) -> Option<&[u32]> {
        let region = self.region(kind);
        if ray >= region.ray_count {
            return None;
        }
        let start = region.offset + ray * region.column_len;
        self.cells.get(start..start + region.column_len)
    }

    pub fn column_mut(&mut self, kind: SegmentKind, ray: usize) -> Option<&mut [u32]> {
        let region = self.region(kind);
        if ray >= region.ray_count {
            return None;
        }
        let start = region.offset + ray * region.column_len;
        self.cells.get_mut(start..start + region.column_len)
    }

    /// Column of the frame-global ray index `global` (segment order top,
    /// bottom, left, right).
    pub fn read_column(&self, global: usize) -> Option<&[u32]> {
        let (kind, ray) = self.split_global(global)?;
        self.column(kind, ray)
    }

    /// Copy `colors` into the column of global ray `global`. Returns false
    /// for an unknown ray or a length mismatch.
    pub fn write_column(&mut self, global: usize, colors: &[u32]) -> bool {
        let Some((kind, ray)) = self.split_global(global) else {
            return false;
        };
        match self.column_mut(kind, ray) {
            Some(column) if column.len() == colors.len() => {
                column.copy_from_slice(colors);
                true
            }
            _ => false,
        }
    }

    fn split_global(&self, global: usize) -> Option<(SegmentKind, usize)> {
        let mut base = 0;
        for kind in SegmentKind::ALL {
            let count = self.region(kind).ray_count;
            if global < base + count {
                return Some((kind, global - base));
            }
            base += count;
        }
        None
    }

    /// Cell at row `k` of ray `ray` in segment `kind`.
    #[inline]
    pub fn sample(&self, kind: SegmentKind, ray: usize, k: usize) -> Option<u32> {
        let region = self.region(kind);
        if ray >= region.ray_count || k >= region.column_len {
            return None;
        }
        self.cells.get(region.offset + ray * region.column_len + k).copied()
    }

    /// All four regions as disjoint mutable slices, in segment order.
    pub fn segment_regions_mut(&mut self) -> Vec<SegmentRegion<'_>> {
        let mut regions = Vec::with_capacity(4);
        let mut rest: &mut [u32] = &mut self.cells[..self.used];
        for kind in SegmentKind::ALL {
            let layout = self.regions[kind.index()];
            let (head, tail) = rest.split_at_mut(layout.len());
            regions.push(SegmentRegion {
                kind,
                column_len: layout.column_len,
                cells: head,
            });
            rest = tail;
        }
        regions
    }

    /// Raw used cells.
    pub fn as_slice(&self) -> &[u32] {
        &self.cells[..self.used]
    }
}
