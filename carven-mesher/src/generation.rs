//! the blocky mesher: one quad per voxel face that touches a non-solid
//! neighbor, with per-vertex ambient occlusion from the 3x3 footprint in
//! front of the face and anisotropic quad splitting to keep AO gradients
//! from smearing across the wrong diagonal.

use carven_common::world::chunk::CHUNK_LENGTH;

use crate::{
    tables::{QuadFace, QUAD_FACES, SRGB_TO_LINEAR},
    ChunkAxisOffset, ChunkNeighbors, MeshBuffers,
};

// quad corners are pushed anchor, +u, +u+v, +v; these split along the a-c or
// b-d diagonal respectively, both winding counter-clockwise
const QUAD_SPLIT_AC: [u32; 6] = [0, 1, 2, 0, 2, 3];
const QUAD_SPLIT_BD: [u32; 6] = [0, 1, 3, 1, 2, 3];

fn ao_value(side1: bool, corner: bool, side2: bool) -> f32 {
    if side1 && side2 {
        0.0
    } else {
        (3 - (side1 as u8 + corner as u8 + side2 as u8)) as f32 / 3.0
    }
}

/// Mesh one chunk into `mesh` (cleared first). Output is indexed quads:
/// four vertices and six indices per visible face, positions in chunk-local
/// coordinates.
pub fn mesh_culled(chunks: &ChunkNeighbors, mesh: &mut MeshBuffers) {
    mesh.clear();

    for x in 0..CHUNK_LENGTH as ChunkAxisOffset {
        for z in 0..CHUNK_LENGTH as ChunkAxisOffset {
            for y in 0..CHUNK_LENGTH as ChunkAxisOffset {
                let pos = [x, y, z];
                let block = chunks.lookup(pos);
                if !block.is_solid() {
                    continue;
                }

                for face in &QUAD_FACES {
                    let neighbor = chunks.lookup(offset(pos, face.normal, 1));
                    if neighbor.is_solid() {
                        continue;
                    }
                    emit_face(chunks, mesh, face, pos, block.color);
                }
            }
        }
    }
}

fn offset(pos: [ChunkAxisOffset; 3], dir: [i32; 3], scale: i32) -> [ChunkAxisOffset; 3] {
    [
        pos[0] + (scale * dir[0]) as ChunkAxisOffset,
        pos[1] + (scale * dir[1]) as ChunkAxisOffset,
        pos[2] + (scale * dir[2]) as ChunkAxisOffset,
    ]
}

fn emit_face(
    chunks: &ChunkNeighbors,
    mesh: &mut MeshBuffers,
    face: &QuadFace,
    pos: [ChunkAxisOffset; 3],
    color: [u8; 3],
) {
    // the AO footprint sits one step out along the face normal
    let cell = offset(pos, face.normal, 1);
    let solid_at = |du: i32, dv: i32| {
        let sample = offset(offset(cell, face.u, du), face.v, dv);
        chunks.lookup(sample).is_solid()
    };

    // corner parameters in (u, v) space, in emit order a, b, c, d
    const CORNER_PARAMS: [(i32, i32); 4] = [(0, 0), (1, 0), (1, 1), (0, 1)];

    let mut ao = [0.0f32; 4];
    for (k, &(pu, pv)) in CORNER_PARAMS.iter().enumerate() {
        let su = if pu == 0 { -1 } else { 1 };
        let sv = if pv == 0 { -1 } else { 1 };
        ao[k] = ao_value(solid_at(su, 0), solid_at(su, sv), solid_at(0, sv));
    }

    // split along whichever diagonal carries more light, so the dimmer
    // corner is isolated in a single triangle
    let split = if ao[0] + ao[2] > ao[1] + ao[3] {
        &QUAD_SPLIT_AC
    } else {
        &QUAD_SPLIT_BD
    };

    let base = mesh.positions.len() as u32;
    mesh.indices.extend(split.iter().map(|i| base + i));

    let linear = [
        SRGB_TO_LINEAR[color[0] as usize],
        SRGB_TO_LINEAR[color[1] as usize],
        SRGB_TO_LINEAR[color[2] as usize],
    ];
    let normal = [
        face.normal[0] as f32,
        face.normal[1] as f32,
        face.normal[2] as f32,
    ];

    for (k, &(pu, pv)) in CORNER_PARAMS.iter().enumerate() {
        let corner = [
            pos[0] as i32 + face.anchor[0] + pu * face.u[0] + pv * face.v[0],
            pos[1] as i32 + face.anchor[1] + pu * face.u[1] + pv * face.v[1],
            pos[2] as i32 + face.anchor[2] + pu * face.u[2] + pv * face.v[2],
        ];
        mesh.positions
            .push([corner[0] as f32, corner[1] as f32, corner[2] as f32]);
        mesh.normals.push(normal);
        mesh.colors.push(linear);
        mesh.ambient_occlusion.push(ao[k]);
    }
}
