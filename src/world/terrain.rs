/// Procedural heightmap importer.
/// Layered materials over Perlin noise, emitted through `WorldBuilder`.
use super::builder::{Voxel, WorldBuilder};
use super::store::WorldStore;
use crate::error::WorldResult;
use crate::rendering::framebuffer::rgb_to_u32;
use glam::UVec3;
use noise::{NoiseFn, Perlin};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Material {
    Grass = 0,
    Dirt = 1,
    Stone = 2,
}

pub const MATERIAL_COUNT: usize = 3;

const MATERIAL_COLORS_LUT: [[u8; 3]; MATERIAL_COUNT] = [
    [34, 139, 34],   // Grass
    [139, 69, 19],   // Dirt
    [128, 128, 128], // Stone
];

impl Material {
    pub const ALL: [Material; MATERIAL_COUNT] = [Material::Grass, Material::Dirt, Material::Stone];

    #[inline]
    pub const fn rgb(self) -> [u8; 3] {
        MATERIAL_COLORS_LUT[self as usize]
    }

    #[inline]
    pub const fn color(self) -> u32 {
        let [r, g, b] = self.rgb();
        rgb_to_u32(r, g, b)
    }

    /// Material at `depth` voxels below the surface.
    #[inline]
    pub const fn at_depth(depth: u32) -> Self {
        match depth {
            0 => Material::Grass,
            1..=2 => Material::Dirt,
            _ => Material::Stone,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TerrainConfig {
    pub size: UVec3,
    pub repeating: bool,
    pub seed: u32,
    /// Mean surface height in voxels.
    pub base_height: f64,
    /// Peak deviation from `base_height`.
    pub amplitude: f64,
    /// Noise frequency per voxel.
    pub scale: f64,
    /// Add a layer of floating stone slabs above the surface.
    pub overhangs: bool,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            size: UVec3::new(256, 128, 256),
            repeating: true,
            seed: 12345,
            base_height: 48.0,
            amplitude: 20.0,
            scale: 0.01,
            overhangs: false,
        }
    }
}

impl TerrainConfig {
    /// Surface height of column `(x, z)`, clamped into the world.
    #[inline]
    pub fn surface_height(&self, perlin: &Perlin, x: u32, z: u32) -> u32 {
        let noise_value = perlin.get([x as f64 * self.scale, z as f64 * self.scale]);
        let height = self.base_height + noise_value * self.amplitude;
        (height.max(0.0) as u32).min(self.size.y.saturating_sub(1))
    }
}

/// Generate a terrain world. Deterministic for a given config.
pub fn generate(config: &TerrainConfig) -> WorldResult<WorldStore> {
    let perlin = Perlin::new(config.seed);
    let slabs = Perlin::new(config.seed.wrapping_add(1));
    let slab_base = (config.base_height + config.amplitude) as u32 + 12;

    WorldBuilder::from_fn(config.size, config.repeating, |x, z, out| {
        let surface = config.surface_height(&perlin, x, z);
        out.extend((0..=surface).map(|y| Voxel::new(y as u16, Material::at_depth(surface - y).color())));

        if config.overhangs {
            let n = slabs.get([x as f64 * config.scale * 3.0, z as f64 * config.scale * 3.0]);
            if n > 0.35 {
                let thickness = 1 + ((n - 0.35) * 10.0) as u32;
                for y in slab_base..slab_base + thickness {
                    if y > surface && y < config.size.y {
                        out.push(Voxel::new(y as u16, Material::Stone.color()));
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> TerrainConfig {
        TerrainConfig {
            size: UVec3::new(32, 64, 32),
            base_height: 24.0,
            amplitude: 8.0,
            scale: 0.05,
            ..TerrainConfig::default()
        }
    }

    #[test]
    fn material_lut_matches_variants() {
        for material in Material::ALL {
            let [r, g, b] = material.rgb();
            assert_eq!(material.color(), 0xFF000000 | (r as u32) << 16 | (g as u32) << 8 | b as u32);
        }
        assert_eq!(Material::at_depth(0), Material::Grass);
        assert_eq!(Material::at_depth(2), Material::Dirt);
        assert_eq!(Material::at_depth(3), Material::Stone);
    }

    #[test]
    fn columns_are_solid_from_bottom_to_surface() {
        let config = small_config();
        let world = generate(&config).unwrap();
        let perlin = Perlin::new(config.seed);
        for (x, z) in [(0, 0), (5, 17), (31, 31)] {
            let column = world.get_column(x, z).unwrap();
            let surface = config.surface_height(&perlin, x as u32, z as u32);
            assert_eq!(column.solid_span(), Some((0, surface + 1)), "column ({x}, {z})");
            assert_eq!(column.color(0), Some(Material::Grass.color()));
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let config = TerrainConfig {
            overhangs: true,
            ..small_config()
        };
        assert_eq!(generate(&config).unwrap(), generate(&config).unwrap());
    }
}
