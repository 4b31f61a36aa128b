/// Run-length encoded voxel column storage.
/// Every column lives in two per-level arenas (runs and per-voxel colors),
/// addressed by offset/count pairs instead of pointers.
use crate::error::{Axis, WorldError, WorldResult};
use bytemuck::{Pod, Zeroable};
use glam::UVec3;

/// One uniform run of a column, stored top to bottom.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct RleElement {
    pub length: u16,
    pub flags: u16,
}

impl RleElement {
    pub const SOLID: u16 = 1;

    #[inline]
    pub const fn air(length: u16) -> Self {
        Self { length, flags: 0 }
    }

    #[inline]
    pub const fn solid(length: u16) -> Self {
        Self {
            length,
            flags: Self::SOLID,
        }
    }

    #[inline]
    pub const fn is_solid(self) -> bool {
        self.flags & Self::SOLID != 0
    }
}

/// Offsets of one column into its level's arenas.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct RleColumn {
    pub elements_offset: u32,
    pub elements_count: u32,
    pub colors_offset: u32,
    pub colors_count: u32,
}

/// A run resolved to world heights. `top` is exclusive, `bottom` inclusive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RunSpan {
    pub top: u32,
    pub bottom: u32,
    pub solid: bool,
    /// Palette index of the run's top voxel (solid runs only).
    pub color_start: u32,
}

impl RunSpan {
    #[inline]
    pub fn len(&self) -> u32 {
        self.top - self.bottom
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.top == self.bottom
    }
}

/// Borrowed view of a single column.
#[derive(Copy, Clone, Debug)]
pub struct ColumnRef<'a> {
    elements: &'a [RleElement],
    colors: &'a [u32],
    height: u32,
}

impl<'a> ColumnRef<'a> {
    #[inline]
    pub fn elements(&self) -> &'a [RleElement] {
        self.elements
    }

    #[inline]
    pub fn colors(&self) -> &'a [u32] {
        self.colors
    }

    /// Color of the `index`-th solid voxel counted from the top of the column.
    #[inline]
    pub fn color(&self, index: u32) -> Option<u32> {
        self.colors.get(index as usize).copied()
    }

    /// Runs with resolved heights, top to bottom. Reversible.
    pub fn runs(&self) -> RunIter<'a> {
        RunIter {
            elements: self.elements,
            front: 0,
            back: self.elements.len(),
            top: self.height,
            bottom: 0,
            color_front: 0,
            color_back: self.colors.len() as u32,
        }
    }

    /// Topmost and bottommost solid heights as `(bottom, top)`, top exclusive.
    pub fn solid_span(&self) -> Option<(u32, u32)> {
        let mut span: Option<(u32, u32)> = None;
        for run in self.runs().filter(|r| r.solid && !r.is_empty()) {
            span = Some(match span {
                None => (run.bottom, run.top),
                Some((_, top)) => (run.bottom, top),
            });
        }
        span
    }

    /// Checks the column height invariant and the palette size.
    pub fn validate(&self, x: u32, z: u32) -> WorldResult<()> {
        let total: u32 = self.elements.iter().map(|e| e.length as u32).sum();
        if total != self.height {
            return Err(WorldError::ColumnHeightMismatch {
                x,
                z,
                total,
                expected: self.height,
            });
        }
        let solid: u32 = self
            .elements
            .iter()
            .filter(|e| e.is_solid())
            .map(|e| e.length as u32)
            .sum();
        if solid != self.colors.len() as u32 {
            return Err(WorldError::PaletteMismatch {
                x,
                z,
                colors: self.colors.len() as u32,
                solid,
            });
        }
        Ok(())
    }
}

/// Iterator over a column's runs with resolved heights.
pub struct RunIter<'a> {
    elements: &'a [RleElement],
    front: usize,
    back: usize,
    top: u32,
    bottom: u32,
    color_front: u32,
    color_back: u32,
}

impl<'a> Iterator for RunIter<'a> {
    type Item = RunSpan;

    #[inline]
    fn next(&mut self) -> Option<RunSpan> {
        if self.front >= self.back {
            return None;
        }
        let element = self.elements[self.front];
        self.front += 1;
        let length = element.length as u32;
        let bottom = self.top.saturating_sub(length);
        let span = RunSpan {
            top: self.top,
            bottom,
            solid: element.is_solid(),
            color_start: self.color_front,
        };
        if span.solid {
            self.color_front += length;
        }
        self.top = bottom;
        Some(span)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<'a> DoubleEndedIterator for RunIter<'a> {
    #[inline]
    fn next_back(&mut self) -> Option<RunSpan> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        let element = self.elements[self.back];
        let length = element.length as u32;
        let solid = element.is_solid();
        if solid {
            self.color_back = self.color_back.saturating_sub(length);
        }
        let span = RunSpan {
            top: self.bottom + length,
            bottom: self.bottom,
            solid,
            color_start: self.color_back,
        };
        self.bottom = span.top;
        Some(span)
    }
}

impl<'a> ExactSizeIterator for RunIter<'a> {}

/// One LOD level: footprint, arenas and per-column descriptors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldStore {
    size: UVec3,
    repeating: bool,
    columns: Vec<RleColumn>,
    elements: Vec<RleElement>,
    colors: Vec<u32>,
}

impl WorldStore {
    /// Assemble a level from prepared arenas. Dimensions and every column
    /// are validated before the store is handed out.
    pub fn from_parts(
        size: UVec3,
        repeating: bool,
        columns: Vec<RleColumn>,
        elements: Vec<RleElement>,
        colors: Vec<u32>,
    ) -> WorldResult<Self> {
        validate_dimensions(size)?;
        let expected = column_count(size);
        if columns.len() != expected {
            return Err(WorldError::ColumnCountMismatch {
                expected,
                actual: columns.len(),
            });
        }
        let store = Self {
            size,
            repeating,
            columns,
            elements,
            colors,
        };
        store.validate()?;
        Ok(store)
    }

    #[inline]
    pub fn size(&self) -> UVec3 {
        self.size
    }

    #[inline]
    pub fn size_y(&self) -> u32 {
        self.size.y
    }

    #[inline]
    pub fn is_repeating(&self) -> bool {
        self.repeating
    }

    #[inline]
    pub fn columns(&self) -> &[RleColumn] {
        &self.columns
    }

    #[inline]
    pub fn elements(&self) -> &[RleElement] {
        &self.elements
    }

    #[inline]
    pub fn colors(&self) -> &[u32] {
        &self.colors
    }

    /// Column at `(x, z)`. Non-repeating worlds return `None` outside the
    /// footprint; repeating worlds wrap and always succeed.
    #[inline]
    pub fn get_column(&self, x: i32, z: i32) -> Option<ColumnRef<'_>> {
        let (x, z) = if self.repeating {
            (
                (x as u32) & (self.size.x - 1),
                (z as u32) & (self.size.z - 1),
            )
        } else {
            if x < 0 || z < 0 || x as u32 >= self.size.x || z as u32 >= self.size.z {
                return None;
            }
            (x as u32, z as u32)
        };
        self.column_at(x, z)
    }

    /// Column at in-range coordinates, bounds-checked against the arenas.
    #[inline]
    pub fn column_at(&self, x: u32, z: u32) -> Option<ColumnRef<'_>> {
        let descriptor = self.columns.get(column_index(self.size, x, z))?;
        let e0 = descriptor.elements_offset as usize;
        let c0 = descriptor.colors_offset as usize;
        let elements = self
            .elements
            .get(e0..e0 + descriptor.elements_count as usize)?;
        let colors = self.colors.get(c0..c0 + descriptor.colors_count as usize)?;
        Some(ColumnRef {
            elements,
            colors,
            height: self.size.y,
        })
    }

    /// Check every column against the height invariant.
    pub fn validate(&self) -> WorldResult<()> {
        for z in 0..self.size.z {
            for x in 0..self.size.x {
                let column = self
                    .column_at(x, z)
                    .ok_or(WorldError::ColumnOutOfArena { x, z })?;
                column.validate(x, z)?;
            }
        }
        Ok(())
    }

    /// Number of solid voxels in the level.
    pub fn solid_voxel_count(&self) -> usize {
        self.colors.len()
    }
}

/// XZ must be powers of two; all axes positive; height fits a run length.
pub fn validate_dimensions(size: UVec3) -> WorldResult<()> {
    for (axis, value) in [(Axis::X, size.x), (Axis::Y, size.y), (Axis::Z, size.z)] {
        if value == 0 {
            return Err(WorldError::ZeroDimension { axis });
        }
    }
    for (axis, value) in [(Axis::X, size.x), (Axis::Z, size.z)] {
        if !value.is_power_of_two() {
            return Err(WorldError::NotPowerOfTwo { axis, value });
        }
    }
    if size.y > u16::MAX as u32 {
        return Err(WorldError::HeightTooLarge(size.y));
    }
    Ok(())
}

/// Row-major index of column `(x, z)`, computed in `usize` so footprints of
/// 2^32 columns and more do not wrap.
#[inline]
pub(crate) fn column_index(size: UVec3, x: u32, z: u32) -> usize {
    z as usize * size.x as usize + x as usize
}

/// Number of columns in a footprint.
#[inline]
pub(crate) fn column_count(size: UVec3) -> usize {
    size.x as usize * size.z as usize
}
