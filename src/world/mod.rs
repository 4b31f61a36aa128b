/// Voxel world storage: RLE columns, LOD pyramid, import and persistence.
pub mod builder;
pub mod lod;
pub mod persist;
pub mod store;
pub mod terrain;

pub use builder::{build_column, Voxel, WorldBuilder};
pub use lod::LodPyramid;
pub use store::{ColumnRef, RleColumn, RleElement, RunSpan, WorldStore};
pub use terrain::{Material, TerrainConfig};
