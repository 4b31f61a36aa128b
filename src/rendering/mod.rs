/// Segmented ray-casting pipeline
/// Rays fan out from the vertical vanishing point; each one walks the world
/// grid front to back and fills a single column of the ray buffer.
pub mod column;
pub mod framebuffer;
pub mod occlusion;
pub mod ray_buffer;
pub mod ray_walker;
pub mod renderer;
pub mod screen;
pub mod segment;

pub use column::{trace_ray, CellOutcome, ColumnCompositor, ColumnTarget, ProjectedSpan, RayProjection};
pub use framebuffer::{rgb_to_u32, u32_to_rgb, FrameSlice, Framebuffer};
pub use occlusion::RayOcclusion;
pub use ray_buffer::{RayBuffer, RegionLayout, SegmentRegion};
pub use ray_walker::{DdaStep, RayWalker};
pub use renderer::Renderer;
pub use screen::ScreenCompositor;
pub use segment::{PixelWindow, Segment, SegmentKind, SegmentPlan};
