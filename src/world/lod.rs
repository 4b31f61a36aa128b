/// Level-of-detail pyramid over a base world.
/// Level k halves the footprint of level k-1 and keeps the full height.
use super::builder::{Voxel, WorldBuilder};
use super::store::WorldStore;
use crate::error::{WorldError, WorldResult};
use glam::UVec3;
use log::info;
use std::time::Instant;

/// Immutable stack of progressively coarser worlds. Rebuilt wholesale only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LodPyramid {
    levels: Vec<WorldStore>,
}

impl LodPyramid {
    /// Downsample `base` into up to `level_count` levels. The count is
    /// clamped so the coarsest footprint is at least 1x1.
    pub fn build(base: WorldStore, level_count: usize) -> WorldResult<Self> {
        let start = Instant::now();
        let size = base.size();
        let max_levels = (size.x.max(size.z).trailing_zeros() + 1) as usize;
        let level_count = level_count.clamp(1, max_levels);

        let mut levels = Vec::with_capacity(level_count);
        levels.push(base);
        for _ in 1..level_count {
            let coarse = match levels.last() {
                Some(finer) => downsample(finer)?,
                None => return Err(WorldError::EmptyPyramid),
            };
            levels.push(coarse);
        }

        info!(
            "built LOD pyramid: {} levels over {}x{}x{}, {} solid voxels at level 0 in {:.2}ms",
            levels.len(),
            size.x,
            size.y,
            size.z,
            levels[0].solid_voxel_count(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self { levels })
    }

    /// Wrap already-built levels, checking that they form a pyramid.
    pub fn from_levels(levels: Vec<WorldStore>) -> WorldResult<Self> {
        let base = levels.first().ok_or(WorldError::EmptyPyramid)?;
        let base_size = base.size();
        for (k, level) in levels.iter().enumerate().skip(1) {
            let expected = level_size(base_size, k);
            let actual = level.size();
            if actual != expected || level.is_repeating() != base.is_repeating() {
                return Err(WorldError::LevelSizeMismatch {
                    level: k,
                    actual: actual.into(),
                    expected: expected.into(),
                });
            }
        }
        Ok(Self { levels })
    }

    #[inline]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn level(&self, level: usize) -> Option<&WorldStore> {
        self.levels.get(level)
    }

    #[inline]
    pub fn levels(&self) -> &[WorldStore] {
        &self.levels
    }

    #[inline]
    pub fn base(&self) -> &WorldStore {
        &self.levels[0]
    }

    /// Dimensions of level 0.
    #[inline]
    pub fn size(&self) -> UVec3 {
        self.base().size()
    }

    #[inline]
    pub fn is_repeating(&self) -> bool {
        self.base().is_repeating()
    }

    /// Edge length of one cell at `level`, in level-0 voxels.
    #[inline]
    pub fn voxel_size(level: usize) -> f32 {
        (1u32 << level) as f32
    }
}

/// Footprint of level `k` for a given base size.
pub fn level_size(base: UVec3, k: usize) -> UVec3 {
    UVec3::new((base.x >> k).max(1), base.y, (base.z >> k).max(1))
}

/// Box-downsample one level: a coarse voxel is solid when any of its source
/// voxels is, colored by the average of the solid ones.
fn downsample(finer: &WorldStore) -> WorldResult<WorldStore> {
    let fine = finer.size();
    let size = UVec3::new((fine.x / 2).max(1), fine.y, (fine.z / 2).max(1));
    let span_x = if fine.x > 1 { 2 } else { 1 };
    let span_z = if fine.z > 1 { 2 } else { 1 };

    WorldBuilder::from_fn(size, finer.is_repeating(), |x, z, out: &mut Vec<Voxel>| {
        for dz in 0..span_z {
            for dx in 0..span_x {
                let Some(column) = finer.column_at(x * span_x + dx, z * span_z + dz) else {
                    continue;
                };
                for run in column.runs().filter(|r| r.solid) {
                    for (i, height) in (run.bottom..run.top).rev().enumerate() {
                        if let Some(color) = column.color(run.color_start + i as u32) {
                            out.push(Voxel::new(height as u16, color));
                        }
                    }
                }
            }
        }
    })
}
