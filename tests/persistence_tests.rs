/// Persistence round trips through files and byte buffers.
use glam::UVec3;
use std::path::PathBuf;
use voxel_raycaster::error::PersistError;
use voxel_raycaster::world::{persist, terrain, LodPyramid, TerrainConfig};

fn pyramid(repeating: bool) -> LodPyramid {
    let config = TerrainConfig {
        size: UVec3::new(64, 40, 32),
        repeating,
        base_height: 16.0,
        amplitude: 8.0,
        scale: 0.05,
        overhangs: true,
        ..TerrainConfig::default()
    };
    LodPyramid::build(terrain::generate(&config).unwrap(), 4).unwrap()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("voxel_raycaster_{}_{}.vxl", name, std::process::id()))
}

#[test]
fn multi_level_pyramid_survives_file_round_trip() {
    let original = pyramid(true);
    let path = temp_path("round_trip");
    persist::save(&original, &path).unwrap();
    let loaded = persist::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.level_count(), original.level_count());
    assert!(loaded.is_repeating());
    for (k, (a, b)) in original.levels().iter().zip(loaded.levels()).enumerate() {
        assert_eq!(a.size(), b.size(), "level {k} size");
        let size = a.size();
        for z in 0..size.z {
            for x in 0..size.x {
                let (ca, cb) = (a.column_at(x, z).unwrap(), b.column_at(x, z).unwrap());
                assert_eq!(ca.elements(), cb.elements(), "level {k} column ({x}, {z}) runs");
                assert_eq!(ca.colors(), cb.colors(), "level {k} column ({x}, {z}) colors");
            }
        }
    }
    assert_eq!(loaded, original);
}

#[test]
fn byte_round_trip_keeps_bounded_flag() {
    let original = pyramid(false);
    let bytes = persist::to_bytes(&original).unwrap();
    let loaded = persist::read_pyramid(&bytes).unwrap();
    assert!(!loaded.is_repeating());
    assert_eq!(loaded, original);
}

#[test]
fn missing_file_is_an_io_error() {
    let err = persist::load(temp_path("does_not_exist")).unwrap_err();
    assert!(matches!(err, PersistError::Io(_)), "got {err:?}");
}

#[test]
fn corrupted_level_table_is_rejected() {
    let original = pyramid(true);
    let mut bytes = persist::to_bytes(&original).unwrap();
    // First level entry follows the 32-byte header; push its offset past the end.
    let bogus = (bytes.len() as u64 + 64).to_ne_bytes();
    bytes[32..40].copy_from_slice(&bogus);
    assert!(persist::read_pyramid(&bytes).is_err());
}
