/// Frame driver
///
/// One frame runs in three stages:
/// 1. Project the camera and plan the four ray segments
/// 2. Trace every ray in parallel into its own ray buffer column
/// 3. Resample the ray buffer into the output image in parallel row stripes
///
/// A panic in stage 2 or 3 abandons the frame; the previous image stays.
use super::column::trace_ray;
use super::framebuffer::Framebuffer;
use super::occlusion::RayOcclusion;
use super::ray_buffer::{RayBuffer, SegmentRegion};
use super::ray_walker::RayWalker;
use super::screen::ScreenCompositor;
use super::segment::{Segment, SegmentPlan};
use crate::camera::{Camera, CameraFrame};
use crate::config::RenderConfig;
use crate::error::{RenderError, RenderResult};
#[cfg(feature = "profiling")]
use crate::perf::FUNCTION_COUNTERS;
use crate::perf::{FrameStats, RayStats};
use crate::{count_call, perf_scope};
use crate::world::lod::LodPyramid;
use log::{debug, error, warn};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared, read-only inputs of every ray in a frame.
struct TraceContext<'a> {
    world: &'a LodPyramid,
    frame: &'a CameraFrame,
    background: u32,
    world_height: f32,
}

impl TraceContext<'_> {
    fn trace(&self, segment: &Segment, ray: usize, column: &mut [u32], occlusion: &mut RayOcclusion) -> RayStats {
        let dir = segment.ray_direction(self.frame, ray);
        let projection = segment.projection(self.frame, dir, self.world_height);
        occlusion.reset(column.len(), segment.row_window(ray));
        let walker = RayWalker::new(
            self.world,
            self.frame.eye_xz(),
            dir,
            self.frame.far_clip,
            &self.frame.lod_distances,
        );
        trace_ray(
            self.world,
            walker,
            &projection,
            occlusion,
            column,
            self.background,
            self.frame.vp_is_up,
        )
    }
}

/// Trace all rays of `plan` into `buffer`. One task per ray; each worker
/// reuses its own occlusion scratch.
fn trace_rays(ctx: &TraceContext<'_>, plan: &SegmentPlan, buffer: &mut RayBuffer) -> RayStats {
    buffer
        .segment_regions_mut()
        .into_par_iter()
        .filter(|region| region.column_len > 0)
        .flat_map(|region| {
            let SegmentRegion { kind, column_len, cells } = region;
            let segment = plan.segment(kind);
            cells
                .par_chunks_mut(column_len)
                .enumerate()
                .map(move |(ray, column)| (segment, ray, column))
        })
        .map_init(RayOcclusion::new, |occlusion, (segment, ray, column)| {
            ctx.trace(segment, ray, column, occlusion)
        })
        .reduce(RayStats::default, RayStats::merge)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Rendering context: owns everything a frame needs, so no state is global.
pub struct Renderer {
    config: RenderConfig,
    world: Arc<LodPyramid>,
    ray_buffer: RayBuffer,
    pool: Option<rayon::ThreadPool>,
    screen: ScreenCompositor,
    image: Framebuffer,
    scratch: Framebuffer,
    plan: Option<SegmentPlan>,
}

impl Renderer {
    pub fn new(config: RenderConfig, world: Arc<LodPyramid>) -> RenderResult<Self> {
        config.validate()?;
        let pool = if config.threads > 0 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.threads)
                    .thread_name(|i| format!("raycast-{i}"))
                    .build()?,
            )
        } else {
            None
        };
        let workers = pool
            .as_ref()
            .map_or_else(rayon::current_num_threads, |pool| pool.current_num_threads());

        let (width, height) = (config.width as usize, config.height as usize);
        let mut image = Framebuffer::new(width, height);
        image.clear(config.background);
        debug!(
            "renderer {}x{}, {} workers, {} lod levels",
            width,
            height,
            workers,
            world.level_count()
        );

        Ok(Self {
            ray_buffer: RayBuffer::with_resolution(config.width, config.height),
            screen: ScreenCompositor::new(workers * 4),
            scratch: Framebuffer::new(width, height),
            image,
            pool,
            world,
            config,
            plan: None,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn world(&self) -> &Arc<LodPyramid> {
        &self.world
    }

    pub fn set_world(&mut self, world: Arc<LodPyramid>) {
        self.world = world;
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Change the output size. The ray buffer is grown here, before any ray
    /// of the next frame is planned.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        if (width, height) == self.resolution() {
            return;
        }
        debug!(
            "resolution {}x{} -> {}x{}",
            self.config.width, self.config.height, width, height
        );
        self.config.width = width;
        self.config.height = height;
        self.ray_buffer.reserve_for(width, height);
        self.image.resize(width as usize, height as usize);
        self.image.clear(self.config.background);
        self.scratch.resize(width as usize, height as usize);
        self.plan = None;
    }

    /// Last successfully rendered image.
    pub fn image(&self) -> &Framebuffer {
        &self.image
    }

    /// Raw ray columns of the last traced frame.
    pub fn ray_buffer(&self) -> &RayBuffer {
        &self.ray_buffer
    }

    /// Segment plan of the last successful frame.
    pub fn plan(&self) -> Option<&SegmentPlan> {
        self.plan.as_ref()
    }

    /// Render the view from `camera`'s pose. Field of view and near plane
    /// come from the config.
    pub fn render_frame(&mut self, camera: &Camera) -> RenderResult<FrameStats> {
        self.render_frame_with(camera, |_, _| {})
    }

    /// Render a frame, handing the traced ray buffer to `inspect` before it
    /// is resampled.
    pub fn render_frame_with<F>(&mut self, camera: &Camera, inspect: F) -> RenderResult<FrameStats>
    where
        F: FnOnce(&SegmentPlan, &RayBuffer) + Send,
    {
        let (width, height) = self.resolution();
        if width == 0 || height == 0 {
            return Err(RenderError::ZeroResolution);
        }
        let frame_start = Instant::now();
        let mut stats = FrameStats {
            width,
            height,
            ..FrameStats::default()
        };

        let plan_start = Instant::now();
        let camera = self.config.apply_projection(camera);
        let frame = CameraFrame::compute(&camera, (width, height), self.config.far_clip, &self.config.lod_distances);
        let plan = {
            perf_scope!("plan");
            let plan = SegmentPlan::compute(&frame);
            self.ray_buffer.prepare(&plan, self.config.background);
            plan
        };
        stats.plan_time = plan_start.elapsed();
        for segment in &plan.segments {
            stats.segment_rays[segment.kind.index()] = segment.ray_count;
        }

        let ctx = TraceContext {
            world: &*self.world,
            frame: &frame,
            background: self.config.background,
            world_height: self.world.size().y as f32,
        };
        let buffer = &mut self.ray_buffer;
        let scratch = &mut self.scratch;
        let screen = &self.screen;
        let pool = self.pool.as_ref();
        let plan_ref = &plan;

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let work = move || -> (RayStats, Duration, Duration) {
                let trace_start = Instant::now();
                let totals = {
                    perf_scope!("trace");
                    trace_rays(&ctx, plan_ref, buffer)
                };
                let trace_time = trace_start.elapsed();
                inspect(plan_ref, buffer);

                let composite_start = Instant::now();
                {
                    perf_scope!("composite");
                    screen.composite(plan_ref, buffer, scratch, ctx.background);
                }
                (totals, trace_time, composite_start.elapsed())
            };
            match pool {
                Some(pool) => pool.install(work),
                None => work(),
            }
        }));

        match outcome {
            Ok((totals, trace_time, composite_time)) => {
                std::mem::swap(&mut self.image, &mut self.scratch);
                self.plan = Some(plan);
                stats.totals = totals;
                stats.trace_time = trace_time;
                stats.composite_time = composite_time;
                stats.total_time = frame_start.elapsed();
                count_call!(FUNCTION_COUNTERS.frames_rendered);
                stats.log_summary();

                let total_ms = stats.total_time.as_secs_f64() * 1000.0;
                if total_ms > self.config.frame_budget_ms {
                    warn!(
                        "frame took {:.2}ms, over the {:.2}ms budget",
                        total_ms, self.config.frame_budget_ms
                    );
                }
                Ok(stats)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                count_call!(FUNCTION_COUNTERS.frames_faulted);
                error!("frame abandoned, keeping previous image: {message}");
                Err(RenderError::FrameFault(message))
            }
        }
    }
}
