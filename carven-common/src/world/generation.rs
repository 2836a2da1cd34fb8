use nalgebra::Point3;
use noise::{NoiseFn, OpenSimplex, Seedable};
use rayon::prelude::*;
use std::sync::Arc;

use super::{
    chunk::{Block, Chunk},
    debug, BlockPos, VoxelWorld,
};
use crate::{debug::send_debug_event, util};

// the density field is fbm of 3D simplex noise pushed through a smoothstep
// window; a sample is solid once the field climbs past the window midpoint.
const DENSITY_OCTAVES: u32 = 5;
const DENSITY_SCALE: f64 = 0.0125;
const DENSITY_THRESHOLD: f32 = 0.05;
const DENSITY_WINDOW: f32 = 0.4;

// hue wanders with a second, lower-frequency fbm
const COLOR_OCTAVES: u32 = 3;
const COLOR_SCALE: f64 = 0.004;
const COLOR_SATURATION: f32 = 0.8;
const COLOR_VALUE: f32 = 1.0;

const LACUNARITY: f64 = 2.0;
const GAIN: f64 = 0.5;

struct FbmSampler<F> {
    noise_fn: F,
    octaves: u32,
    scale: f64,
}

impl<F> FbmSampler<F> {
    fn new(noise_fn: F, octaves: u32, scale: f64) -> Self {
        Self {
            noise_fn,
            octaves,
            scale,
        }
    }

    /// Octave-summed noise, normalized back into the base octave's range.
    fn sample(&self, p: Point3<f64>) -> f32
    where
        F: NoiseFn<[f64; 3]>,
    {
        let mut frequency = self.scale;
        let mut amplitude = 1.0;
        let mut sum = 0.0;
        let mut norm = 0.0;

        for _ in 0..self.octaves {
            sum += amplitude
                * self
                    .noise_fn
                    .get([p.x * frequency, p.y * frequency, p.z * frequency]);
            norm += amplitude;
            amplitude *= GAIN;
            frequency *= LACUNARITY;
        }

        (sum / norm) as f32
    }
}

pub struct TerrainGenerator {
    density_noise: FbmSampler<OpenSimplex>,
    color_noise: FbmSampler<OpenSimplex>,
}

impl TerrainGenerator {
    pub fn new(seed: i32) -> Self {
        let density_seed = seed as u32;
        // decorrelate the hue field from the density field
        let color_seed = density_seed.wrapping_mul(0x9e3779b9).wrapping_add(1);

        Self {
            density_noise: FbmSampler::new(
                OpenSimplex::new().set_seed(density_seed),
                DENSITY_OCTAVES,
                DENSITY_SCALE,
            ),
            color_noise: FbmSampler::new(
                OpenSimplex::new().set_seed(color_seed),
                COLOR_OCTAVES,
                COLOR_SCALE,
            ),
        }
    }

    pub fn block_at(&self, pos: BlockPos) -> Block {
        let p = Point3::new(pos.x as f64, pos.y as f64, pos.z as f64);

        let field = self.density_noise.sample(p);
        let density01 = util::smoothstep(
            DENSITY_THRESHOLD - DENSITY_WINDOW,
            DENSITY_THRESHOLD,
            field,
        );
        let density = (255.0 * density01).round() as u8;
        if density == 0 {
            return Block::EMPTY;
        }

        let hue01 = 0.5 * self.color_noise.sample(p) + 0.5;
        let color = hsv_to_srgb(360.0 * hue01, COLOR_SATURATION, COLOR_VALUE);
        Block::new(density, color)
    }

    pub fn generate_chunk(&self, chunk: &Chunk) {
        let origin = chunk.pos().origin();
        {
            let mut guard = chunk.write();
            guard.data_mut().fill_from(|x, y, z| {
                self.block_at(origin.offset([x as i32, y as i32, z as i32]))
            });
        }

        // all-air chunks mesh to nothing; don't waste a mesh job on them
        let nonempty = !chunk.snapshot().data().is_empty();
        if nonempty {
            chunk.mark_dirty();
        }
        send_debug_event(debug::WorldLoadEvent::Generated(chunk.pos()));
    }
}

/// Populate every chunk of a bounded world from the terrain field. Chunks
/// are independent, so generation fans out across the rayon pool.
pub fn generate_world(world: &Arc<VoxelWorld>, seed: i32) {
    let bounds = match world.bounds() {
        Some(bounds) => bounds,
        None => return,
    };

    let generator = TerrainGenerator::new(seed);
    let chunks: Vec<_> = bounds.iter().filter_map(|pos| world.chunk(pos)).collect();
    chunks
        .par_iter()
        .for_each(|chunk| generator.generate_chunk(chunk));
}

/// `h` in degrees, `s` and `v` in `[0, 1]`; result is 8-bit sRGB.
pub fn hsv_to_srgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let h = crate::util::modulo(h, 360.0) / 60.0;
    let c = v * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    [
        (255.0 * (r + m)).round() as u8,
        (255.0 * (g + m)).round() as u8,
        (255.0 * (b + m)).round() as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{chunk::CHUNK_VOLUME, WorldBounds};

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv_to_srgb(0.0, 1.0, 1.0), [255, 0, 0]);
        assert_eq!(hsv_to_srgb(120.0, 1.0, 1.0), [0, 255, 0]);
        assert_eq!(hsv_to_srgb(240.0, 1.0, 1.0), [0, 0, 255]);
        assert_eq!(hsv_to_srgb(360.0, 1.0, 1.0), [255, 0, 0]);
        assert_eq!(hsv_to_srgb(0.0, 0.0, 1.0), [255, 255, 255]);
    }

    #[test]
    fn same_seed_generates_identical_chunks() {
        let a = TerrainGenerator::new(12345);
        let b = TerrainGenerator::new(12345);
        for pos in [[0, 0, 0], [100, -32, 7], [-500, 20, 9000]] {
            assert_eq!(a.block_at(BlockPos::new(pos)), b.block_at(BlockPos::new(pos)));
        }
    }

    #[test]
    fn different_seeds_disagree_somewhere() {
        let a = TerrainGenerator::new(1);
        let b = TerrainGenerator::new(2);
        let disagrees = (0..64).any(|i| {
            let pos = BlockPos::new([i * 13, i * 7 - 100, i * 3]);
            a.block_at(pos) != b.block_at(pos)
        });
        assert!(disagrees);
    }

    #[test]
    fn generated_world_has_both_solid_and_air() {
        let world = VoxelWorld::with_bounds(WorldBounds::new([-2, -2, -2], [1, 1, 1]));
        generate_world(&world, 7);

        let mut solid = 0usize;
        let mut total = 0usize;
        for pos in world.bounds().unwrap().iter() {
            let snapshot = world.chunk(pos).unwrap().snapshot();
            solid += snapshot
                .data()
                .densities()
                .iter()
                .filter(|&&d| d >= crate::world::chunk::ISOLEVEL)
                .count();
            total += CHUNK_VOLUME;
        }

        assert!(solid > 0, "terrain should contain some solid voxels");
        assert!(solid < total, "terrain should contain some air");
    }

    #[test]
    fn empty_blocks_have_no_color() {
        let generator = TerrainGenerator::new(99);
        for i in 0..256 {
            let block = generator.block_at(BlockPos::new([i * 11, i, -i * 5]));
            if block.density == 0 {
                assert_eq!(block, Block::EMPTY);
            }
        }
    }

    #[test]
    fn generation_marks_nonempty_chunks_dirty() {
        let world = VoxelWorld::with_bounds(WorldBounds::new([-2, -2, -2], [1, 1, 1]));
        generate_world(&world, 7);

        let mut dirty = Vec::new();
        world.poll_dirty(|pos| dirty.push(pos));
        for pos in &dirty {
            assert!(!world.chunk(*pos).unwrap().snapshot().data().is_empty());
        }
        assert!(!dirty.is_empty());
    }
}
