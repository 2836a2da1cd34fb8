//! the smooth mesher: classic marching cubes over the chunk's density field.
//!
//! a `(CHUNK_LENGTH + 1)^3` grid is pre-sampled through the chunk's
//! neighborhood so the +1 boundary row reads from adjacent chunks, then every
//! 16^3 cell is marched against the standard tables. output is a flat-shaded
//! triangle soup; see [`crate::MeshBuffers`] for the format contract.

use nalgebra::{vector, Point3, Vector3};

use carven_common::{
    util,
    world::chunk::{Block, CHUNK_LENGTH, ISOLEVEL},
};

use crate::{
    tables::{CORNER_OFFSETS, EDGE_CONNECTIONS, EDGE_TABLE, SRGB_TO_LINEAR, TRI_TABLE},
    ChunkNeighbors, MeshBuffers,
};

pub const SAMPLE_LENGTH: usize = CHUNK_LENGTH + 1;
pub const SAMPLE_VOLUME: usize = SAMPLE_LENGTH * SAMPLE_LENGTH * SAMPLE_LENGTH;

/// Worst-case output of one chunk: 5 triangles per cell, 3 vertices each.
pub const MAX_MESH_VERTICES: usize = 5 * 3 * CHUNK_LENGTH * CHUNK_LENGTH * CHUNK_LENGTH;

// triangles with less area than this get an arbitrary up-facing normal
const DEGENERATE_NORMAL_EPSILON: f32 = 1e-8;

#[inline(always)]
fn sample_index(x: usize, y: usize, z: usize) -> usize {
    x + SAMPLE_LENGTH * z + SAMPLE_LENGTH * SAMPLE_LENGTH * y
}

fn linear_color(color: [u8; 3]) -> Vector3<f32> {
    vector![
        SRGB_TO_LINEAR[color[0] as usize],
        SRGB_TO_LINEAR[color[1] as usize],
        SRGB_TO_LINEAR[color[2] as usize]
    ]
}

/// Per-worker marching-cubes state: the pre-sample grid lives here and is
/// reused across jobs, so meshing allocates nothing after construction.
pub struct MarchingCubesMesher {
    samples: Vec<Block>,
}

impl Default for MarchingCubesMesher {
    fn default() -> Self {
        Self::new()
    }
}

impl MarchingCubesMesher {
    pub fn new() -> Self {
        Self {
            samples: vec![Block::EMPTY; SAMPLE_VOLUME],
        }
    }

    fn presample(&mut self, chunks: &ChunkNeighbors) {
        for y in 0..SAMPLE_LENGTH {
            for z in 0..SAMPLE_LENGTH {
                for x in 0..SAMPLE_LENGTH {
                    self.samples[sample_index(x, y, z)] =
                        chunks.lookup([x as i16, y as i16, z as i16]);
                }
            }
        }
    }

    /// Mesh one chunk into `mesh` (cleared first). Vertex positions are in
    /// chunk-local coordinates.
    pub fn mesh(&mut self, chunks: &ChunkNeighbors, mesh: &mut MeshBuffers) {
        mesh.clear();
        self.presample(chunks);

        for y in 0..CHUNK_LENGTH {
            for z in 0..CHUNK_LENGTH {
                for x in 0..CHUNK_LENGTH {
                    self.march_cell(x, y, z, mesh);
                }
            }
        }
    }

    fn march_cell(&self, x: usize, y: usize, z: usize, mesh: &mut MeshBuffers) {
        let mut corners = [Block::EMPTY; 8];
        let mut case_index = 0usize;
        for (bit, offset) in CORNER_OFFSETS.iter().enumerate() {
            let sample = self.samples[sample_index(x + offset[0], y + offset[1], z + offset[2])];
            corners[bit] = sample;
            if sample.density >= ISOLEVEL {
                case_index |= 1 << bit;
            }
        }

        let edge_mask = EDGE_TABLE[case_index];
        if edge_mask == 0 {
            return;
        }

        let mut edge_positions = [Point3::origin(); 12];
        let mut edge_colors = [vector![0.0, 0.0, 0.0]; 12];
        for edge in 0..12 {
            if edge_mask & (1 << edge) == 0 {
                continue;
            }
            let (ca, cb) = EDGE_CONNECTIONS[edge];
            let a = corners[ca];
            let b = corners[cb];

            let t = match b.density as f32 - a.density as f32 {
                denom if denom == 0.0 => 0.5,
                denom => ((ISOLEVEL as f32 - a.density as f32) / denom).clamp(0.0, 1.0),
            };

            let pa = cell_corner(x, y, z, CORNER_OFFSETS[ca]);
            let pb = cell_corner(x, y, z, CORNER_OFFSETS[cb]);
            edge_positions[edge] = pa + t * (pb - pa);

            let la = linear_color(a.color);
            let lb = linear_color(b.color);
            edge_colors[edge] = vector![
                util::lerp(la.x, lb.x, t),
                util::lerp(la.y, lb.y, t),
                util::lerp(la.z, lb.z, t)
            ];
        }

        let tri_list = &TRI_TABLE[case_index];
        let mut i = 0;
        while tri_list[i] != -1 {
            let e0 = tri_list[i] as usize;
            let e1 = tri_list[i + 1] as usize;
            let e2 = tri_list[i + 2] as usize;
            i += 3;

            let a = edge_positions[e0];
            let b = edge_positions[e1];
            let c = edge_positions[e2];

            let normal = {
                let n = (c - b).cross(&(a - b));
                if n.magnitude_squared() < DEGENERATE_NORMAL_EPSILON {
                    vector![0.0, 1.0, 0.0]
                } else {
                    n.normalize()
                }
            };

            for (position, color) in [
                (a, edge_colors[e0]),
                (b, edge_colors[e1]),
                (c, edge_colors[e2]),
            ] {
                mesh.positions.push([position.x, position.y, position.z]);
                mesh.normals.push([normal.x, normal.y, normal.z]);
                mesh.colors.push([color.x, color.y, color.z]);
                mesh.ambient_occlusion.push(1.0);
            }
        }
    }
}

fn cell_corner(x: usize, y: usize, z: usize, offset: [usize; 3]) -> Point3<f32> {
    nalgebra::point![
        (x + offset[0]) as f32,
        (y + offset[1]) as f32,
        (z + offset[2]) as f32
    ]
}
