//! Error types for world construction, persistence, configuration and frames.
//!
//! Degenerate geometry is never an error here: the projector and walker
//! substitute epsilons instead. Rays leaving a non-repeating world are a
//! defined outcome (background fill), not a failure.
use thiserror::Error;

/// Horizontal or vertical world axis, used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(name)
    }
}

/// Invalid world dimensions or malformed column data. Fatal at construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    #[error("world size on axis {axis} must be a power of two, got {value}")]
    NotPowerOfTwo { axis: Axis, value: u32 },

    #[error("world size on axis {axis} must be positive")]
    ZeroDimension { axis: Axis },

    #[error("world height {0} exceeds the maximum run length of 65535")]
    HeightTooLarge(u32),

    #[error("column ({x}, {z}) is outside a {size_x}x{size_z} footprint")]
    ColumnOutOfRange {
        x: u32,
        z: u32,
        size_x: u32,
        size_z: u32,
    },

    #[error("expected {expected} column descriptors, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("column ({x}, {z}) runs sum to {total}, expected {expected}")]
    ColumnHeightMismatch {
        x: u32,
        z: u32,
        total: u32,
        expected: u32,
    },

    #[error("column ({x}, {z}) references storage outside its level arena")]
    ColumnOutOfArena { x: u32, z: u32 },

    #[error("column ({x}, {z}) has {colors} colors for {solid} solid voxels")]
    PaletteMismatch {
        x: u32,
        z: u32,
        colors: u32,
        solid: u32,
    },

    #[error("LOD level {level} has size {actual:?}, expected {expected:?}")]
    LevelSizeMismatch {
        level: usize,
        actual: (u32, u32, u32),
        expected: (u32, u32, u32),
    },

    #[error("a LOD pyramid needs at least one level")]
    EmptyPyramid,
}

/// Result type for world construction.
pub type WorldResult<T> = Result<T, WorldError>;

/// Failures while reading or writing a serialized LOD pyramid.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a voxel world file (bad magic {0:?})")]
    BadMagic([u8; 4]),

    #[error("unsupported world file version {0}")]
    UnsupportedVersion(u32),

    #[error("world file truncated: needed {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("level table entry {level} is invalid: {reason}")]
    BadLevelEntry { level: usize, reason: &'static str },

    #[error(transparent)]
    World(#[from] WorldError),
}

/// Result type for persistence.
pub type PersistResult<T> = Result<T, PersistError>;

/// Invalid or unreadable render configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Renderer construction and per-frame failures.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("cannot render at zero resolution")]
    ZeroResolution,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("frame abandoned: {0}")]
    FrameFault(String),
}

/// Result type for frame rendering.
pub type RenderResult<T> = Result<T, RenderError>;
