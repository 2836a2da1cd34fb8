//! carve a colored density sphere into an empty world, drive every dirty
//! chunk through the scheduler, and print what the meshers produced. this is
//! the whole engine loop minus a renderer.

use std::time::Duration;

use carven_common::world::{chunk::Block, generation::hsv_to_srgb, BlockPos, Ray3, VoxelWorld};
use carven_mesher::{
    pool::CompletedMesh, tracker::MeshTracker, MeshStore, MesherConfig, MesherContext, MesherMode,
};
use nalgebra::{point, vector};

fn main() {
    let world = VoxelWorld::new();

    // a soft-edged ball: density falls off linearly through the last two
    // blocks before the radius, so marching cubes has gradients to work with
    let radius = 14.0f32;
    for z in -16..=16 {
        for y in -16..=16 {
            for x in -16..=16 {
                let r = ((x * x + y * y + z * z) as f32).sqrt();
                let density = ((radius - r) / 2.0).clamp(0.0, 1.0);
                let density = (255.0 * density).round() as u8;
                if density == 0 {
                    continue;
                }
                let hue = 360.0 * (0.5 + 0.5 * (y as f32 / radius));
                world.set_block(
                    BlockPos::new([x, y, z]),
                    Block::new(density, hsv_to_srgb(hue, 0.8, 1.0)),
                );
            }
        }
    }

    let config = MesherConfig {
        mode: MesherMode::MarchingCubes,
        ..Default::default()
    };
    let mut tracker = MeshTracker::new(config.view_radius);
    let mut ctx = MesherContext::new(&world, &config);
    let mut store = MeshStore::default();

    world.poll_dirty(|pos| tracker.mark_dirty(pos));
    println!("{} chunks to mesh", tracker.dirty_count());

    loop {
        for pos in tracker.take_closest(config.max_meshes_per_tick) {
            ctx.dispatch(pos);
        }
        if ctx.in_flight_count() == 0 {
            break;
        }
        while let Some(result) = ctx.recv_result(Duration::from_secs(5)) {
            if let CompletedMesh::Completed { pos, mesh } = result {
                store.ingest(pos, &mesh);
            }
            if ctx.in_flight_count() == 0 {
                break;
            }
        }
    }

    let mut triangles = 0;
    for (pos, mesh) in store.iter() {
        println!(
            "chunk {:>3} {:>3} {:>3}: {} triangles",
            pos.x,
            pos.y,
            pos.z,
            mesh.triangle_count()
        );
        triangles += mesh.triangle_count();
    }
    println!("total: {} triangles in {} chunks", triangles, store.len());

    let hit = world
        .raycast(
            Ray3 {
                origin: point![40.0, 0.0, 0.0],
                direction: vector![-1.0, 0.0, 0.0],
            },
            100.0,
        )
        .expect("the sphere is in the way");
    println!(
        "ray from +x hits block ({}, {}, {}) at distance {:.2}, density {}",
        hit.pos.x, hit.pos.y, hit.pos.z, hit.distance, hit.block.density
    );
}
