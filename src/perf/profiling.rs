/// Instrumentation for microoptimization
/// Process-wide call counters, compiled in only with the `profiling` feature
use log::info;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe performance counters for hot-path call tracking
pub struct FunctionCounters {
    // Traversal counters
    pub trace_ray_calls: AtomicU64,
    pub dda_steps: AtomicU64,
    pub lod_switches: AtomicU64,

    // Compositing counters
    pub columns_composited: AtomicU64,
    pub runs_drawn: AtomicU64,
    pub runs_rejected: AtomicU64,
    pub rows_written: AtomicU64,
    pub early_terminations: AtomicU64,

    // Frame counters
    pub frames_rendered: AtomicU64,
    pub frames_faulted: AtomicU64,
}

impl FunctionCounters {
    pub const fn new() -> Self {
        Self {
            trace_ray_calls: AtomicU64::new(0),
            dda_steps: AtomicU64::new(0),
            lod_switches: AtomicU64::new(0),
            columns_composited: AtomicU64::new(0),
            runs_drawn: AtomicU64::new(0),
            runs_rejected: AtomicU64::new(0),
            rows_written: AtomicU64::new(0),
            early_terminations: AtomicU64::new(0),
            frames_rendered: AtomicU64::new(0),
            frames_faulted: AtomicU64::new(0),
        }
    }

    fn all(&self) -> [&AtomicU64; 10] {
        [
            &self.trace_ray_calls,
            &self.dda_steps,
            &self.lod_switches,
            &self.columns_composited,
            &self.runs_drawn,
            &self.runs_rejected,
            &self.rows_written,
            &self.early_terminations,
            &self.frames_rendered,
            &self.frames_faulted,
        ]
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        for counter in self.all() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            trace_ray_calls: self.trace_ray_calls.load(Ordering::Relaxed),
            dda_steps: self.dda_steps.load(Ordering::Relaxed),
            lod_switches: self.lod_switches.load(Ordering::Relaxed),
            columns_composited: self.columns_composited.load(Ordering::Relaxed),
            runs_drawn: self.runs_drawn.load(Ordering::Relaxed),
            runs_rejected: self.runs_rejected.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            early_terminations: self.early_terminations.load(Ordering::Relaxed),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            frames_faulted: self.frames_faulted.load(Ordering::Relaxed),
        }
    }
}

impl Default for FunctionCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of counter values at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub trace_ray_calls: u64,
    pub dda_steps: u64,
    pub lod_switches: u64,
    pub columns_composited: u64,
    pub runs_drawn: u64,
    pub runs_rejected: u64,
    pub rows_written: u64,
    pub early_terminations: u64,
    pub frames_rendered: u64,
    pub frames_faulted: u64,
}

impl CounterSnapshot {
    /// Log the formatted report at info level
    pub fn log_report(&self) {
        info!("{self}");
    }
}

impl fmt::Display for CounterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Performance Counters Report ===")?;
        writeln!(f, "Traversal:")?;
        writeln!(f, "  trace_ray calls:            {:12}", self.trace_ray_calls)?;
        writeln!(f, "  dda steps:                  {:12}", self.dda_steps)?;
        writeln!(f, "  lod switches:               {:12}", self.lod_switches)?;
        if self.trace_ray_calls > 0 {
            let per_ray = self.dda_steps as f64 / self.trace_ray_calls as f64;
            writeln!(f, "  steps per ray:              {:12.2}", per_ray)?;
        }
        writeln!(f, "Compositing:")?;
        writeln!(f, "  columns composited:         {:12}", self.columns_composited)?;
        writeln!(f, "  runs drawn:                 {:12}", self.runs_drawn)?;
        writeln!(f, "  runs rejected:              {:12}", self.runs_rejected)?;
        writeln!(f, "  rows written:               {:12}", self.rows_written)?;
        writeln!(f, "  early terminations:         {:12}", self.early_terminations)?;
        writeln!(f, "Frames:")?;
        writeln!(f, "  rendered:                   {:12}", self.frames_rendered)?;
        write!(f, "  faulted:                    {:12}", self.frames_faulted)
    }
}

/// Global function counters instance
pub static FUNCTION_COUNTERS: FunctionCounters = FunctionCounters::new();

/// Macro for incrementing a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_call {
    ($counter:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Macro for adding to a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_add {
    ($counter:expr, $value:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add($value, std::sync::atomic::Ordering::Relaxed);
        }
    };
}
