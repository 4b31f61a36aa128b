/// Column construction from loose colored voxels.
///
/// This is the import side of the world: voxelizers hand over per-column
/// voxel lists and get back a validated, immutable `WorldStore`.
use super::store::{column_count, column_index, validate_dimensions, RleColumn, RleElement, WorldStore};
use crate::error::{WorldError, WorldResult};
use glam::UVec3;
use rayon::prelude::*;

/// A solid voxel at `height` within its column.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Voxel {
    pub height: u16,
    pub color: u32,
}

impl Voxel {
    #[inline]
    pub const fn new(height: u16, color: u32) -> Self {
        Self { height, color }
    }
}

/// Average ARGB colors channel by channel.
pub fn average_colors(colors: impl IntoIterator<Item = u32>) -> Option<u32> {
    let mut sums = [0u32; 4];
    let mut count = 0u32;
    for color in colors {
        for (channel, sum) in sums.iter_mut().enumerate() {
            *sum += (color >> (channel * 8)) & 0xFF;
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let mut packed = 0u32;
    for (channel, sum) in sums.iter().enumerate() {
        packed |= ((sum + count / 2) / count).min(255) << (channel * 8);
    }
    Some(packed)
}

/// Encode one column. `voxels` is sorted in place (height descending);
/// voxels sharing a height are merged by averaging their colors, heights at
/// or above `size_y` are dropped. Runs are appended to `elements` and
/// per-voxel colors to `colors`; the appended runs always sum to `size_y`.
pub fn build_column(
    voxels: &mut [Voxel],
    size_y: u32,
    elements: &mut Vec<RleElement>,
    colors: &mut Vec<u32>,
) {
    voxels.sort_unstable_by(|a, b| b.height.cmp(&a.height));

    let first_element = elements.len();
    let mut cursor = size_y;
    let mut i = 0;
    while i < voxels.len() {
        let height = voxels[i].height as u32;
        let mut j = i + 1;
        while j < voxels.len() && voxels[j].height as u32 == height {
            j += 1;
        }
        if height >= size_y {
            i = j;
            continue;
        }
        let color = if j - i == 1 {
            voxels[i].color
        } else {
            average_colors(voxels[i..j].iter().map(|v| v.color)).unwrap_or(voxels[i].color)
        };

        let gap = cursor - (height + 1);
        if gap > 0 {
            elements.push(RleElement::air(gap as u16));
        }
        // Only extend runs appended for this column.
        let extend = gap == 0
            && elements.len() > first_element
            && elements.last().map_or(false, |e| e.is_solid());
        if extend {
            if let Some(last) = elements.last_mut() {
                last.length += 1;
            }
        } else {
            elements.push(RleElement::solid(1));
        }
        colors.push(color);
        cursor = height;
        i = j;
    }
    if cursor > 0 {
        elements.push(RleElement::air(cursor as u16));
    }
}

/// Per-band output of a parallel build, merged in order afterwards.
#[derive(Default)]
struct Band {
    columns: Vec<RleColumn>,
    elements: Vec<RleElement>,
    colors: Vec<u32>,
}

/// Incremental builder for a single LOD-0 world.
#[derive(Debug)]
pub struct WorldBuilder {
    size: UVec3,
    repeating: bool,
    columns: Vec<Option<RleColumn>>,
    elements: Vec<RleElement>,
    colors: Vec<u32>,
    scratch: Vec<Voxel>,
}

impl WorldBuilder {
    pub fn new(size: UVec3, repeating: bool) -> WorldResult<Self> {
        validate_dimensions(size)?;
        Ok(Self {
            size,
            repeating,
            columns: vec![None; column_count(size)],
            elements: Vec::new(),
            colors: Vec::new(),
            scratch: Vec::new(),
        })
    }

    #[inline]
    pub fn size(&self) -> UVec3 {
        self.size
    }

    /// Replace column `(x, z)` with the given voxels.
    pub fn set_column(&mut self, x: u32, z: u32, voxels: &[Voxel]) -> WorldResult<()> {
        if x >= self.size.x || z >= self.size.z {
            return Err(WorldError::ColumnOutOfRange {
                x,
                z,
                size_x: self.size.x,
                size_z: self.size.z,
            });
        }
        self.scratch.clear();
        self.scratch.extend_from_slice(voxels);
        let elements_offset = self.elements.len() as u32;
        let colors_offset = self.colors.len() as u32;
        build_column(&mut self.scratch, self.size.y, &mut self.elements, &mut self.colors);
        self.columns[column_index(self.size, x, z)] = Some(RleColumn {
            elements_offset,
            elements_count: self.elements.len() as u32 - elements_offset,
            colors_offset,
            colors_count: self.colors.len() as u32 - colors_offset,
        });
        Ok(())
    }

    /// Compact the arenas into column order and validate. Columns that were
    /// never set are all air.
    pub fn build(self) -> WorldResult<WorldStore> {
        let mut columns = Vec::with_capacity(self.columns.len());
        let mut elements = Vec::with_capacity(self.elements.len());
        let mut colors = Vec::with_capacity(self.colors.len());
        for slot in &self.columns {
            let elements_offset = elements.len() as u32;
            let colors_offset = colors.len() as u32;
            match slot {
                Some(column) => {
                    let e0 = column.elements_offset as usize;
                    let c0 = column.colors_offset as usize;
                    elements.extend_from_slice(&self.elements[e0..e0 + column.elements_count as usize]);
                    colors.extend_from_slice(&self.colors[c0..c0 + column.colors_count as usize]);
                }
                None => elements.push(RleElement::air(self.size.y as u16)),
            }
            columns.push(RleColumn {
                elements_offset,
                elements_count: elements.len() as u32 - elements_offset,
                colors_offset,
                colors_count: colors.len() as u32 - colors_offset,
            });
        }
        WorldStore::from_parts(self.size, self.repeating, columns, elements, colors)
    }

    /// Build a world by evaluating `fill(x, z, out)` for every column in
    /// parallel. Each worker encodes a band of rows into its own arenas; the
    /// bands are concatenated in row order once all workers finish.
    pub fn from_fn<F>(size: UVec3, repeating: bool, fill: F) -> WorldResult<WorldStore>
    where
        F: Fn(u32, u32, &mut Vec<Voxel>) + Sync,
    {
        validate_dimensions(size)?;

        let bands: Vec<Band> = (0..size.z)
            .into_par_iter()
            .map_init(Vec::new, |scratch: &mut Vec<Voxel>, z| {
                let mut band = Band::default();
                band.columns.reserve(size.x as usize);
                for x in 0..size.x {
                    scratch.clear();
                    fill(x, z, scratch);
                    let elements_offset = band.elements.len() as u32;
                    let colors_offset = band.colors.len() as u32;
                    build_column(scratch, size.y, &mut band.elements, &mut band.colors);
                    band.columns.push(RleColumn {
                        elements_offset,
                        elements_count: band.elements.len() as u32 - elements_offset,
                        colors_offset,
                        colors_count: band.colors.len() as u32 - colors_offset,
                    });
                }
                band
            })
            .collect();

        let total_elements: usize = bands.iter().map(|b| b.elements.len()).sum();
        let total_colors: usize = bands.iter().map(|b| b.colors.len()).sum();
        let mut columns = Vec::with_capacity(column_count(size));
        let mut elements = Vec::with_capacity(total_elements);
        let mut colors = Vec::with_capacity(total_colors);
        for band in bands {
            let element_base = elements.len() as u32;
            let color_base = colors.len() as u32;
            columns.extend(band.columns.iter().map(|c| RleColumn {
                elements_offset: c.elements_offset + element_base,
                colors_offset: c.colors_offset + color_base,
                ..*c
            }));
            elements.extend_from_slice(&band.elements);
            colors.extend_from_slice(&band.colors);
        }

        WorldStore::from_parts(size, repeating, columns, elements, colors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(voxels: &[Voxel], size_y: u32) -> (Vec<RleElement>, Vec<u32>) {
        let mut voxels = voxels.to_vec();
        let mut elements = Vec::new();
        let mut colors = Vec::new();
        build_column(&mut voxels, size_y, &mut elements, &mut colors);
        (elements, colors)
    }

    #[test]
    fn empty_column_is_single_air_run() {
        let (elements, colors) = encode(&[], 16);
        assert_eq!(elements, vec![RleElement::air(16)]);
        assert!(colors.is_empty());
    }

    #[test]
    fn runs_alternate_top_to_bottom() {
        let voxels = [
            Voxel::new(0, 0xFF000001),
            Voxel::new(1, 0xFF000002),
            Voxel::new(5, 0xFF000003),
            Voxel::new(15, 0xFF000004),
        ];
        let (elements, colors) = encode(&voxels, 16);
        assert_eq!(
            elements,
            vec![
                RleElement::solid(1),
                RleElement::air(9),
                RleElement::solid(1),
                RleElement::air(3),
                RleElement::solid(2),
            ]
        );
        assert_eq!(colors, vec![0xFF000004, 0xFF000003, 0xFF000002, 0xFF000001]);
        let total: u32 = elements.iter().map(|e| e.length as u32).sum();
        assert_eq!(total, 16);
    }

    #[test]
    fn duplicate_heights_average_their_colors() {
        let voxels = [Voxel::new(3, 0xFF0000FF), Voxel::new(3, 0xFF00FF00)];
        let (elements, colors) = encode(&voxels, 8);
        assert_eq!(elements, vec![RleElement::air(4), RleElement::solid(1), RleElement::air(3)]);
        assert_eq!(colors, vec![0xFF008080]);
    }

    #[test]
    fn voxels_above_world_top_are_dropped() {
        let voxels = [Voxel::new(20, 0xFFFFFFFF), Voxel::new(7, 0xFF111111)];
        let (elements, colors) = encode(&voxels, 8);
        assert_eq!(elements, vec![RleElement::solid(1), RleElement::air(7)]);
        assert_eq!(colors, vec![0xFF111111]);
    }

    #[test]
    fn parallel_build_matches_incremental_build() {
        let size = UVec3::new(8, 32, 4);
        let fill = |x: u32, z: u32, out: &mut Vec<Voxel>| {
            let height = (x * 3 + z * 5) % 20;
            for y in 0..=height {
                out.push(Voxel::new(y as u16, 0xFF000000 | (x << 8) | z));
            }
            out.push(Voxel::new(28, 0xFFFF0000));
        };

        let parallel = WorldBuilder::from_fn(size, false, fill).unwrap();

        let mut builder = WorldBuilder::new(size, false).unwrap();
        let mut voxels = Vec::new();
        for z in (0..size.z).rev() {
            for x in 0..size.x {
                voxels.clear();
                fill(x, z, &mut voxels);
                builder.set_column(x, z, &voxels).unwrap();
            }
        }
        let incremental = builder.build().unwrap();

        assert_eq!(parallel, incremental);
    }

    #[test]
    fn unset_columns_are_air() {
        let builder = WorldBuilder::new(UVec3::new(2, 10, 2), true).unwrap();
        let world = builder.build().unwrap();
        let column = world.get_column(-1, 5).unwrap();
        assert_eq!(column.elements(), &[RleElement::air(10)]);
    }
}
