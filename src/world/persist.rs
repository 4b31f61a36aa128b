//! On-disk format for LOD pyramids.
//!
//! ```text
//! FileHeader                         32 bytes
//! LevelEntry × level_count           16 bytes each: byte_offset, byte_length
//! per level:
//!   LevelHeader                      32 bytes
//!   [RleColumn;  column_count]
//!   [RleElement; element_count]
//!   [u32;        color_count]
//! ```
//!
//! Every section is plain-old-data in native byte order and 4-byte aligned,
//! so a mapped file is reloaded with bulk slice copies instead of per-column
//! parsing.
use super::lod::LodPyramid;
use super::store::{RleColumn, RleElement, WorldStore};
use crate::error::{PersistError, PersistResult};
use bytemuck::{Pod, Zeroable};
use glam::UVec3;
use log::debug;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::mem::size_of;
use std::path::Path;

pub const MAGIC: [u8; 4] = *b"VXRL";
pub const VERSION: u32 = 1;
const FLAG_REPEATING: u32 = 1;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct FileHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub size_x: u32,
    pub size_y: u32,
    pub size_z: u32,
    pub level_count: u32,
    pub flags: u32,
    pub reserved: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct LevelEntry {
    pub byte_offset: u64,
    pub byte_length: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct LevelHeader {
    pub size_x: u32,
    pub size_z: u32,
    pub column_count: u32,
    pub element_count: u32,
    pub color_count: u32,
    pub reserved: [u32; 3],
}

fn level_byte_length(level: &WorldStore) -> usize {
    size_of::<LevelHeader>()
        + level.columns().len() * size_of::<RleColumn>()
        + level.elements().len() * size_of::<RleElement>()
        + level.colors().len() * size_of::<u32>()
}

/// Serialize every level of `pyramid` into `out`.
pub fn write_pyramid<W: Write>(pyramid: &LodPyramid, out: &mut W) -> PersistResult<()> {
    let size = pyramid.size();
    let header = FileHeader {
        magic: MAGIC,
        version: VERSION,
        size_x: size.x,
        size_y: size.y,
        size_z: size.z,
        level_count: pyramid.level_count() as u32,
        flags: if pyramid.is_repeating() { FLAG_REPEATING } else { 0 },
        reserved: 0,
    };
    out.write_all(bytemuck::bytes_of(&header))?;

    let mut offset = (size_of::<FileHeader>() + pyramid.level_count() * size_of::<LevelEntry>()) as u64;
    for level in pyramid.levels() {
        let byte_length = level_byte_length(level) as u64;
        let entry = LevelEntry {
            byte_offset: offset,
            byte_length,
        };
        out.write_all(bytemuck::bytes_of(&entry))?;
        offset += byte_length;
    }

    for level in pyramid.levels() {
        let level_header = LevelHeader {
            size_x: level.size().x,
            size_z: level.size().z,
            column_count: level.columns().len() as u32,
            element_count: level.elements().len() as u32,
            color_count: level.colors().len() as u32,
            reserved: [0; 3],
        };
        out.write_all(bytemuck::bytes_of(&level_header))?;
        out.write_all(bytemuck::cast_slice(level.columns()))?;
        out.write_all(bytemuck::cast_slice(level.elements()))?;
        out.write_all(bytemuck::cast_slice(level.colors()))?;
    }
    Ok(())
}

/// Serialize into a fresh byte vector.
pub fn to_bytes(pyramid: &LodPyramid) -> PersistResult<Vec<u8>> {
    let total = size_of::<FileHeader>()
        + pyramid.level_count() * size_of::<LevelEntry>()
        + pyramid.levels().iter().map(level_byte_length).sum::<usize>();
    let mut bytes = Vec::with_capacity(total);
    write_pyramid(pyramid, &mut bytes)?;
    Ok(bytes)
}

/// Write the pyramid to `path`.
pub fn save(pyramid: &LodPyramid, path: impl AsRef<Path>) -> PersistResult<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_pyramid(pyramid, &mut writer)?;
    writer.flush()?;
    debug!("saved {} LOD levels to {}", pyramid.level_count(), path.display());
    Ok(())
}

/// Memory-map `path` and rebuild the pyramid from it.
pub fn load(path: impl AsRef<Path>) -> PersistResult<LodPyramid> {
    let path = path.as_ref();
    let file = File::open(path)?;
    // Safety: the map is only read for the duration of this call and the
    // contents are copied out; concurrent truncation surfaces as an error
    // from the bounds checks rather than undefined reads of stale lengths.
    let map = unsafe { Mmap::map(&file)? };
    let pyramid = read_pyramid(&map)?;
    debug!("loaded {} LOD levels from {}", pyramid.level_count(), path.display());
    Ok(pyramid)
}

/// Rebuild a pyramid from serialized bytes. Every level is validated.
pub fn read_pyramid(bytes: &[u8]) -> PersistResult<LodPyramid> {
    let header: FileHeader = read_pod(bytes, 0)?;
    if header.magic != MAGIC {
        return Err(PersistError::BadMagic(header.magic));
    }
    if header.version != VERSION {
        return Err(PersistError::UnsupportedVersion(header.version));
    }
    let repeating = header.flags & FLAG_REPEATING != 0;
    let level_count = header.level_count as usize;

    let mut levels = Vec::with_capacity(level_count);
    for k in 0..level_count {
        let entry: LevelEntry = read_pod(bytes, size_of::<FileHeader>() + k * size_of::<LevelEntry>())?;
        let start = usize::try_from(entry.byte_offset).map_err(|_| PersistError::BadLevelEntry {
            level: k,
            reason: "offset does not fit in memory",
        })?;
        let length = usize::try_from(entry.byte_length).map_err(|_| PersistError::BadLevelEntry {
            level: k,
            reason: "length does not fit in memory",
        })?;
        if start % 4 != 0 {
            return Err(PersistError::BadLevelEntry {
                level: k,
                reason: "offset is not 4-byte aligned",
            });
        }
        let end = start.checked_add(length).ok_or(PersistError::BadLevelEntry {
            level: k,
            reason: "offset overflows",
        })?;
        let blob = bytes.get(start..end).ok_or(PersistError::Truncated {
            offset: start,
            needed: length,
            available: bytes.len().saturating_sub(start),
        })?;
        levels.push(read_level(blob, k, UVec3::new(0, header.size_y, 0), repeating)?);
    }

    let pyramid = LodPyramid::from_levels(levels)?;
    let base = pyramid.size();
    if base != UVec3::new(header.size_x, header.size_y, header.size_z) {
        return Err(PersistError::BadLevelEntry {
            level: 0,
            reason: "level 0 size differs from the file header",
        });
    }
    Ok(pyramid)
}

fn read_level(blob: &[u8], level: usize, size: UVec3, repeating: bool) -> PersistResult<WorldStore> {
    let header: LevelHeader = read_pod(blob, 0)?;
    let mut offset = size_of::<LevelHeader>();
    let columns: Vec<RleColumn> = read_slice(blob, &mut offset, header.column_count as usize)?;
    let elements: Vec<RleElement> = read_slice(blob, &mut offset, header.element_count as usize)?;
    let colors: Vec<u32> = read_slice(blob, &mut offset, header.color_count as usize)?;
    if offset != blob.len() {
        return Err(PersistError::BadLevelEntry {
            level,
            reason: "byte length does not match the level contents",
        });
    }
    let size = UVec3::new(header.size_x, size.y, header.size_z);
    Ok(WorldStore::from_parts(size, repeating, columns, elements, colors)?)
}

fn read_pod<T: Pod>(bytes: &[u8], offset: usize) -> PersistResult<T> {
    let needed = size_of::<T>();
    let slice = bytes.get(offset..offset + needed).ok_or(PersistError::Truncated {
        offset,
        needed,
        available: bytes.len().saturating_sub(offset),
    })?;
    Ok(bytemuck::pod_read_unaligned(slice))
}

/// Bulk-copy `count` values starting at `*offset`, advancing it. Aligned
/// input is cast in place and copied once; misaligned input is copied byte
/// by byte into zeroed storage.
fn read_slice<T: Pod>(bytes: &[u8], offset: &mut usize, count: usize) -> PersistResult<Vec<T>> {
    let needed = count
        .checked_mul(size_of::<T>())
        .ok_or(PersistError::Truncated {
            offset: *offset,
            needed: usize::MAX,
            available: bytes.len(),
        })?;
    let source = bytes.get(*offset..*offset + needed).ok_or(PersistError::Truncated {
        offset: *offset,
        needed,
        available: bytes.len().saturating_sub(*offset),
    })?;
    let values = match bytemuck::try_cast_slice::<u8, T>(source) {
        Ok(aligned) => aligned.to_vec(),
        Err(_) => {
            let mut values = vec![T::zeroed(); count];
            bytemuck::cast_slice_mut::<T, u8>(&mut values).copy_from_slice(source);
            values
        }
    };
    *offset += needed;
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::builder::{Voxel, WorldBuilder};

    fn small_pyramid() -> LodPyramid {
        let base = WorldBuilder::from_fn(UVec3::new(8, 16, 8), true, |x, z, out| {
            for y in 0..(x + z) {
                out.push(Voxel::new(y as u16, 0xFF000000 | (y << 16) | (x << 8) | z));
            }
        })
        .unwrap();
        LodPyramid::build(base, 3).unwrap()
    }

    #[test]
    fn header_layout_is_stable() {
        assert_eq!(size_of::<FileHeader>(), 32);
        assert_eq!(size_of::<LevelEntry>(), 16);
        assert_eq!(size_of::<LevelHeader>(), 32);
        assert_eq!(size_of::<RleColumn>(), 16);
        assert_eq!(size_of::<RleElement>(), 4);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = to_bytes(&small_pyramid()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(read_pyramid(&bytes), Err(PersistError::BadMagic(_))));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let bytes = to_bytes(&small_pyramid()).unwrap();
        let cut = &bytes[..bytes.len() - 3];
        assert!(matches!(read_pyramid(cut), Err(PersistError::Truncated { .. })));
    }

    #[test]
    fn sections_read_from_aligned_and_misaligned_bytes_agree() {
        let colors: Vec<u32> = (0..37).map(|i| 0xFF000000 | i * 7919).collect();
        let bytes: &[u8] = bytemuck::cast_slice(&colors);
        let mut offset = 0;
        let aligned: Vec<u32> = read_slice(bytes, &mut offset, colors.len()).unwrap();
        assert_eq!(offset, bytes.len());
        assert_eq!(aligned, colors);

        let mut shifted = vec![0u8; bytes.len() + 1];
        shifted[1..].copy_from_slice(bytes);
        let mut offset = 1;
        let copied: Vec<u32> = read_slice(&shifted, &mut offset, colors.len()).unwrap();
        assert_eq!(offset, shifted.len());
        assert_eq!(copied, colors);
    }

    #[test]
    fn misaligned_input_still_loads() {
        let pyramid = small_pyramid();
        let bytes = to_bytes(&pyramid).unwrap();
        let mut shifted = vec![0u8; bytes.len() + 1];
        shifted[1..].copy_from_slice(&bytes);
        let loaded = read_pyramid(&shifted[1..]).unwrap();
        assert_eq!(loaded, pyramid);
    }
}
