/// Voxel Ray-caster - segmented software ray-casting of RLE voxel worlds
/// Built with compartmentalized benchmarkable components
pub mod camera;
pub mod config;
pub mod error;
pub mod perf;
pub mod rendering;
pub mod world;

pub use camera::{Camera, CameraFrame};
pub use config::RenderConfig;
pub use error::{ConfigError, PersistError, RenderError, WorldError};
pub use perf::{CounterSnapshot, FrameStats, FunctionCounters, RayStats, FUNCTION_COUNTERS};
pub use rendering::{Framebuffer, RayBuffer, Renderer, SegmentKind, SegmentPlan};
pub use world::{LodPyramid, TerrainConfig, WorldBuilder, WorldStore};
