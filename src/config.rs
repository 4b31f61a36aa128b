//! Renderer configuration, loaded once at startup.
use crate::camera::Camera;
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sky blue, matching the clear color of the interactive viewer.
pub const DEFAULT_BACKGROUND: u32 = 0xFF87CEEB;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub fov_y_degrees: f32,
    pub near: f32,
    /// Rays stop at this horizontal distance (world units).
    pub far_clip: f32,
    /// Ascending distances at which rays switch to the next coarser LOD level.
    pub lod_distances: Vec<f32>,
    /// ARGB color of rows no voxel covers.
    pub background: u32,
    /// Worker threads; 0 uses the global rayon pool.
    pub threads: usize,
    /// Frames slower than this are logged as warnings.
    pub frame_budget_ms: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fov_y_degrees: 70.0,
            near: 0.1,
            far_clip: 2048.0,
            lod_distances: vec![96.0, 192.0, 384.0, 768.0],
            background: DEFAULT_BACKGROUND,
            threads: 0,
            frame_budget_ms: 33.0,
        }
    }
}

impl RenderConfig {
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "resolution must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.fov_y_degrees > 0.0 && self.fov_y_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "fov_y_degrees must be in (0, 180), got {}",
                self.fov_y_degrees
            )));
        }
        if !(self.near > 0.0) {
            return Err(ConfigError::Invalid(format!("near must be positive, got {}", self.near)));
        }
        if !(self.far_clip > self.near) {
            return Err(ConfigError::Invalid(format!(
                "far_clip {} must exceed near {}",
                self.far_clip, self.near
            )));
        }
        if self.lod_distances.iter().any(|d| !(*d > 0.0)) {
            return Err(ConfigError::Invalid("lod_distances must be positive".into()));
        }
        if self.lod_distances.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::Invalid(format!(
                "lod_distances must be strictly ascending, got {:?}",
                self.lod_distances
            )));
        }
        Ok(())
    }

    /// `camera`'s pose with this config's field of view and near plane.
    pub fn apply_projection(&self, camera: &Camera) -> Camera {
        Camera {
            fov: self.fov_y_degrees.to_radians(),
            near: self.near,
            ..*camera
        }
    }
}
