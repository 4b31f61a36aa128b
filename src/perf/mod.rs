/// Performance measurement utilities
/// Each rendering stage is timed and logged for optimization analysis
pub mod profiling;

pub use profiling::{CounterSnapshot, FunctionCounters, FUNCTION_COUNTERS};

use log::debug;
use std::time::{Duration, Instant};

pub struct PerfTimer {
    name: &'static str,
    start: Instant,
}

impl PerfTimer {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        debug!("[PERF] {}: {}μs", self.name, self.elapsed().as_micros());
    }
}

/// Macro for easy performance measurement
#[macro_export]
macro_rules! perf_scope {
    ($name:expr) => {
        let _timer = $crate::perf::PerfTimer::new($name);
    };
}

/// Work done by one ray, or summed over many.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RayStats {
    pub rays: u64,
    pub dda_steps: u64,
    pub lod_switches: u64,
    pub runs_drawn: u64,
    pub runs_rejected: u64,
    pub rows_written: u64,
    /// Rays that stopped because every row was resolved or nothing further
    /// could become visible.
    pub early_terminations: u64,
}

impl RayStats {
    #[inline]
    pub fn merge(self, other: Self) -> Self {
        Self {
            rays: self.rays + other.rays,
            dda_steps: self.dda_steps + other.dda_steps,
            lod_switches: self.lod_switches + other.lod_switches,
            runs_drawn: self.runs_drawn + other.runs_drawn,
            runs_rejected: self.runs_rejected + other.runs_rejected,
            rows_written: self.rows_written + other.rows_written,
            early_terminations: self.early_terminations + other.early_terminations,
        }
    }
}

/// Per-frame statistics returned by the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub width: u32,
    pub height: u32,
    /// Ray count of each segment (top, bottom, left, right).
    pub segment_rays: [usize; 4],
    pub totals: RayStats,
    pub plan_time: Duration,
    pub trace_time: Duration,
    pub composite_time: Duration,
    pub total_time: Duration,
}

impl FrameStats {
    pub fn total_rays(&self) -> usize {
        self.segment_rays.iter().sum()
    }

    pub fn log_summary(&self) {
        debug!(
            "frame {}x{}: {} rays {:?}, {} dda steps, {} lod switches, {} runs drawn, {} rejected, {} early exits; plan {}μs trace {}μs composite {}μs total {:.2}ms",
            self.width,
            self.height,
            self.total_rays(),
            self.segment_rays,
            self.totals.dda_steps,
            self.totals.lod_switches,
            self.totals.runs_drawn,
            self.totals.runs_rejected,
            self.totals.early_terminations,
            self.plan_time.as_micros(),
            self.trace_time.as_micros(),
            self.composite_time.as_micros(),
            self.total_time.as_secs_f64() * 1000.0
        );
    }
}
