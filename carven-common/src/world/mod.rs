use nalgebra::{Point3, Scalar, Vector3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use self::chunk::{
    chunks_sharing_voxel, Block, Chunk, ChunkArrays, ChunkIndex, ChunkSnapshot, CHUNK_LENGTH,
    CHUNK_LENGTH_BITS, CHUNK_MASK,
};
use crate::{aabb::Aabb, debug::send_debug_event, prelude::*, util::ChannelPair, Axis, Side};

pub mod chunk;
pub mod generation;
pub mod orphan;

pub mod debug {
    use super::ChunkPos;
    use crate::debug_events;

    pub enum WorldLoadEvent {
        Created(ChunkPos),
        Modified(ChunkPos),
        Generated(ChunkPos),
    }

    debug_events! {
        WorldLoadEvent => "world-load",
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl From<BlockPos> for Point3<i32> {
    fn from(BlockPos { x, y, z }: BlockPos) -> Self {
        nalgebra::point![x, y, z]
    }
}

#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<WorldPos> for Point3<f32> {
    fn from(WorldPos { x, y, z }: WorldPos) -> Self {
        nalgebra::point![x, y, z]
    }
}

impl From<WorldPos> for BlockPos {
    fn from(pos: WorldPos) -> Self {
        BlockPos {
            x: pos.x.floor() as i32,
            y: pos.y.floor() as i32,
            z: pos.z.floor() as i32,
        }
    }
}

impl From<BlockPos> for ChunkPos {
    fn from(pos: BlockPos) -> Self {
        ChunkPos {
            x: pos.x >> CHUNK_LENGTH_BITS,
            y: pos.y >> CHUNK_LENGTH_BITS,
            z: pos.z >> CHUNK_LENGTH_BITS,
        }
    }
}

impl From<WorldPos> for ChunkPos {
    fn from(pos: WorldPos) -> Self {
        BlockPos::from(pos).into()
    }
}

impl BlockPos {
    pub fn new<I: Into<[i32; 3]>>(pos: I) -> Self {
        let [x, y, z] = pos.into();
        Self { x, y, z }
    }

    pub fn offset<I: Into<[i32; 3]>>(self, offset: I) -> Self {
        let [dx, dy, dz] = offset.into();
        Self {
            x: dx + self.x,
            y: dy + self.y,
            z: dz + self.z,
        }
    }

    pub fn origin(self) -> WorldPos {
        WorldPos {
            x: self.x as f32,
            y: self.y as f32,
            z: self.z as f32,
        }
    }

    pub fn chunk_and_offset(self) -> (ChunkPos, ChunkIndex) {
        let chunk_pos = ChunkPos::from(self);
        let offset = [
            (self.x & CHUNK_MASK) as usize,
            (self.y & CHUNK_MASK) as usize,
            (self.z & CHUNK_MASK) as usize,
        ];

        (chunk_pos, offset)
    }
}

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new<I: Into<[i32; 3]>>(pos: I) -> Self {
        let [x, y, z] = pos.into();
        Self { x, y, z }
    }

    pub fn offset<I: Into<[i32; 3]>>(self, offset: I) -> Self {
        let [dx, dy, dz] = offset.into();
        Self {
            x: dx + self.x,
            y: dy + self.y,
            z: dz + self.z,
        }
    }

    pub fn origin(self) -> BlockPos {
        BlockPos {
            x: CHUNK_LENGTH as i32 * self.x,
            y: CHUNK_LENGTH as i32 * self.y,
            z: CHUNK_LENGTH as i32 * self.z,
        }
    }
}

impl From<ChunkPos> for Point3<i32> {
    fn from(ChunkPos { x, y, z }: ChunkPos) -> Self {
        nalgebra::point![x, y, z]
    }
}

pub fn chunk_aabb(pos: ChunkPos) -> Aabb {
    let len = CHUNK_LENGTH as f32;
    let pos = len * nalgebra::point![pos.x as f32, pos.y as f32, pos.z as f32];
    Aabb {
        min: pos,
        max: pos + len * nalgebra::vector![1.0, 1.0, 1.0],
    }
}

/// An inclusive rectangular region of chunk coordinates. Worlds constructed
/// with bounds materialize every chunk in the region up front and silently
/// ignore writes outside it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct WorldBounds {
    pub min: ChunkPos,
    pub max: ChunkPos,
}

impl WorldBounds {
    pub fn new<I: Into<[i32; 3]>>(min: I, max: I) -> Self {
        Self {
            min: ChunkPos::new(min),
            max: ChunkPos::new(max),
        }
    }

    #[rustfmt::skip]
    pub fn contains(&self, pos: ChunkPos) -> bool {
        pos.x >= self.min.x && pos.x <= self.max.x &&
        pos.y >= self.min.y && pos.y <= self.max.y &&
        pos.z >= self.min.z && pos.z <= self.max.z
    }

    pub fn iter(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        let min = self.min;
        let max = self.max;
        (min.x..=max.x).flat_map(move |x| {
            (min.y..=max.y)
                .flat_map(move |y| (min.z..=max.z).map(move |z| ChunkPos { x, y, z }))
        })
    }
}

type ConcurrentHashMap<K, V> = flurry::HashMap<K, V>;

/// The authoritative store of chunks. Writes go through [`VoxelWorld::set_block`]
/// on the game loop; mesh workers read through [`ChunkSnapshot`]s.
pub struct VoxelWorld {
    bounds: Option<WorldBounds>,
    chunks: ConcurrentHashMap<ChunkPos, Arc<Chunk>>,
    dirty_channel: ChannelPair<ChunkPos>,
}

impl VoxelWorld {
    /// An unbounded world: chunks materialize lazily on first write.
    pub fn new() -> Arc<Self> {
        Arc::new(VoxelWorld {
            bounds: None,
            chunks: Default::default(),
            dirty_channel: Default::default(),
        })
    }

    /// A bounded world: every chunk in `bounds` is created (empty) up front,
    /// and writes outside the bounds are ignored.
    pub fn with_bounds(bounds: WorldBounds) -> Arc<Self> {
        let world = Arc::new(VoxelWorld {
            bounds: Some(bounds),
            chunks: Default::default(),
            dirty_channel: Default::default(),
        });
        for pos in bounds.iter() {
            world.create_chunk(pos);
        }
        world
    }

    pub fn bounds(&self) -> Option<WorldBounds> {
        self.bounds
    }

    pub fn is_loaded(&self, pos: ChunkPos) -> bool {
        self.chunks.pin().contains_key(&pos)
    }

    pub fn chunk(&self, pos: ChunkPos) -> Option<Arc<Chunk>> {
        self.chunks.pin().get(&pos).map(Arc::clone)
    }

    pub fn chunk_at_block(&self, pos: BlockPos) -> Option<Arc<Chunk>> {
        self.chunk(pos.into())
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.pin().len()
    }

    /// Materialize the chunk at `pos`, or return `None` when `pos` falls
    /// outside a bounded world.
    pub fn create_chunk(&self, pos: ChunkPos) -> Option<Arc<Chunk>> {
        if let Some(bounds) = &self.bounds {
            if !bounds.contains(pos) {
                return None;
            }
        }

        let chunks = self.chunks.pin();
        if let Some(chunk) = chunks.get(&pos) {
            return Some(Arc::clone(chunk));
        }

        let chunk = Arc::new(Chunk::new(&self.dirty_channel.tx, pos, ChunkArrays::empty()));
        send_debug_event(debug::WorldLoadEvent::Created(pos));
        match chunks.try_insert(pos, Arc::clone(&chunk)) {
            Ok(_) => Some(chunk),
            // lost the race; somebody else made it first
            Err(err) => Some(Arc::clone(err.current)),
        }
    }

    /// Write one voxel. Returns `false` when the write was ignored because
    /// the position is outside a bounded world. The owning chunk and every
    /// chunk whose sampling footprint includes the voxel are marked dirty.
    pub fn set_block(&self, pos: BlockPos, block: Block) -> bool {
        let (chunk_pos, index) = pos.chunk_and_offset();
        let chunk = match self.create_chunk(chunk_pos) {
            Some(chunk) => chunk,
            None => return false,
        };

        let old = chunk.write().data_mut().set(index, block);
        if old != block {
            send_debug_event(debug::WorldLoadEvent::Modified(chunk_pos));
            chunks_sharing_voxel(index, |offset| {
                if offset == [0, 0, 0] {
                    chunk.mark_dirty();
                } else if let Some(neighbor) = self.chunk(chunk_pos.offset(offset)) {
                    neighbor.mark_dirty();
                }
            });
        }
        true
    }

    /// Read one voxel; positions outside the store read as [`Block::EMPTY`].
    pub fn block(&self, pos: BlockPos) -> Block {
        let (chunk_pos, index) = pos.chunk_and_offset();
        match self.chunk(chunk_pos) {
            Some(chunk) => chunk.snapshot().data().get(index),
            None => Block::EMPTY,
        }
    }

    pub fn solid(&self, pos: BlockPos) -> bool {
        self.block(pos).is_solid()
    }

    /// Drain the dirty announcements accumulated since the last call. Chunk
    /// positions may repeat across calls but not within one.
    pub fn poll_dirty<F>(&self, mut func: F)
    where
        F: FnMut(ChunkPos),
    {
        for pos in self.dirty_channel.rx.try_iter() {
            if let Some(chunk) = self.chunk(pos) {
                chunk.clear_dirty();
            }
            func(pos);
        }
    }

    pub fn raycast(self: &Arc<Self>, ray: Ray3<f32>, max_distance: f32) -> Option<RaycastHit> {
        let mut cache = ChunkSnapshotCache::new(self);
        trace_ray(&mut cache, ray, max_distance)
    }
}

/// a cache for multiple unaligned world accesses over a short period of time.
pub struct ChunkSnapshotCache {
    pub world: Arc<VoxelWorld>,
    chunks: HashMap<ChunkPos, ChunkSnapshot>,
}

impl ChunkSnapshotCache {
    pub fn new(world: &Arc<VoxelWorld>) -> Self {
        Self {
            world: Arc::clone(world),
            chunks: Default::default(),
        }
    }

    pub fn chunk(&mut self, pos: ChunkPos) -> Option<&ChunkSnapshot> {
        Some(match self.chunks.entry(pos) {
            Entry::Occupied(entry) => &*entry.into_mut(),
            Entry::Vacant(entry) => &*entry.insert(self.world.chunk(pos)?.snapshot()),
        })
    }

    pub fn block(&mut self, pos: BlockPos) -> Block {
        let (chunk_pos, chunk_index) = pos.chunk_and_offset();
        match self.chunk(chunk_pos) {
            Some(chunk) => chunk.data().get(chunk_index),
            None => Block::EMPTY,
        }
    }

    pub fn solid(&mut self, pos: BlockPos) -> bool {
        self.block(pos).is_solid()
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Ray3<T: Scalar> {
    pub direction: Vector3<T>,
    pub origin: Point3<T>,
}

#[derive(Copy, Clone, Debug)]
pub struct RaycastHit {
    pub pos: BlockPos,
    // a `None` side means the block we started in was an immediate hit
    pub side: Option<Side>,
    /// Euclidean distance along the ray to the hit.
    pub distance: f32,
    /// The point where the ray enters the hit block, in world coordinates
    /// (block centers sit on the integer lattice).
    pub position: Point3<f32>,
    pub block: Block,
}

impl RaycastHit {
    pub fn normal(&self) -> Vector3<f32> {
        self.side
            .map(|side| side.normal())
            .unwrap_or_else(|| nalgebra::vector![0.0, 0.0, 0.0])
    }
}

fn f32_checked_div(num: f32, denom: f32) -> Option<f32> {
    if denom == 0.0 {
        None
    } else {
        Some(num / denom)
    }
}

// advancing to a chunk exit lands exactly on the boundary; nudge past it so
// the next voxel snap falls inside the neighboring chunk.
const CHUNK_EXIT_EPSILON: f32 = 1e-4;

/// March a ray through the grid, skipping all-air chunks in one step.
///
/// The traversal works in a `+0.5`-biased frame where flooring a ray point
/// yields the voxel whose center it is nearest, so block `(x, y, z)` occupies
/// `[x - 0.5, x + 0.5)` in world space on each axis.
#[must_use]
pub fn trace_ray(
    cache: &mut ChunkSnapshotCache,
    ray: Ray3<f32>,
    max_distance: f32,
) -> Option<RaycastHit> {
    if ray.direction.magnitude_squared() == 0.0 {
        return None;
    }

    // init phase
    let direction = ray.direction.normalize();
    let start = ray.origin + nalgebra::vector![0.5, 0.5, 0.5];

    let mut current = BlockPos {
        x: start.x.floor() as i32,
        y: start.y.floor() as i32,
        z: start.z.floor() as i32,
    };

    let step_x = direction.x.signum() as i32;
    let step_y = direction.y.signum() as i32;
    let step_z = direction.z.signum() as i32;

    // the distance along the ray from `start` where each axis crosses into
    // the next voxel. if the ray is parallel with an axis, it never crosses,
    // so we use f32::MAX there and everything else compares smaller.
    let boundary = |n: i32, step: i32| n as f32 + if step < 0 { 0.0 } else { 1.0 };
    let mut t_max_x =
        f32_checked_div(boundary(current.x, step_x) - start.x, direction.x).unwrap_or(f32::MAX);
    let mut t_max_y =
        f32_checked_div(boundary(current.y, step_y) - start.y, direction.y).unwrap_or(f32::MAX);
    let mut t_max_z =
        f32_checked_div(boundary(current.z, step_z) - start.z, direction.z).unwrap_or(f32::MAX);

    let t_delta_x = f32_checked_div(1.0, direction.x.abs()).unwrap_or(f32::MAX);
    let t_delta_y = f32_checked_div(1.0, direction.y.abs()).unwrap_or(f32::MAX);
    let t_delta_z = f32_checked_div(1.0, direction.z.abs()).unwrap_or(f32::MAX);

    let mut t = 0.0f32;
    let mut hit_axis: Option<Axis> = None;

    // incremental phase
    loop {
        let chunk_pos = ChunkPos::from(current);
        let occupied = cache
            .chunk(chunk_pos)
            .map_or(false, |chunk| !chunk.data().is_empty());

        if !occupied {
            // the whole chunk reads as air; jump straight to where the ray
            // leaves its box. chunk boxes line up with the biased frame, so
            // the aabb is usable as-is.
            let aabb = chunk_aabb(chunk_pos);
            let exit_for = |min: f32, max: f32, s: f32, d: f32| -> f32 {
                if d == 0.0 {
                    return f32::MAX;
                }
                let bound = if d > 0.0 { max } else { min };
                (bound - s) / d
            };
            let exit_x = exit_for(aabb.min.x, aabb.max.x, start.x, direction.x);
            let exit_y = exit_for(aabb.min.y, aabb.max.y, start.y, direction.y);
            let exit_z = exit_for(aabb.min.z, aabb.max.z, start.z, direction.z);

            // smallest exit strictly ahead of where we are now
            let mut exit_t = f32::MAX;
            let mut exit_axis = Axis::X;
            for (axis, te) in [(Axis::X, exit_x), (Axis::Y, exit_y), (Axis::Z, exit_z)] {
                if te > t && te < exit_t {
                    exit_t = te;
                    exit_axis = axis;
                }
            }
            if exit_t == f32::MAX {
                // degenerate; shouldn't happen with a nonzero direction
                return None;
            }

            t = exit_t + CHUNK_EXIT_EPSILON;
            if t > max_distance {
                return None;
            }

            let reentry = start + t * direction;
            current = BlockPos {
                x: reentry.x.floor() as i32,
                y: reentry.y.floor() as i32,
                z: reentry.z.floor() as i32,
            };
            hit_axis = Some(exit_axis);

            t_max_x = f32_checked_div(boundary(current.x, step_x) - start.x, direction.x)
                .unwrap_or(f32::MAX);
            t_max_y = f32_checked_div(boundary(current.y, step_y) - start.y, direction.y)
                .unwrap_or(f32::MAX);
            t_max_z = f32_checked_div(boundary(current.z, step_z) - start.z, direction.z)
                .unwrap_or(f32::MAX);
            continue;
        }

        let block = cache.block(current);
        if block.is_solid() {
            let side = hit_axis.map(|axis| {
                let step = match axis {
                    Axis::X => step_x,
                    Axis::Y => step_y,
                    Axis::Z => step_z,
                };
                Side::entered_through(axis, step)
            });
            return Some(RaycastHit {
                pos: current,
                side,
                distance: t,
                position: ray.origin + t * direction,
                block,
            });
        }

        // find the smallest step along the ray that we can take and still
        // remain inside the current voxel, which puts us on the boundary of
        // the next.
        if t_max_x < t_max_y && t_max_x < t_max_z {
            t = t_max_x;
            current.x += step_x;
            t_max_x += t_delta_x;
            hit_axis = Some(Axis::X);
        } else if t_max_y < t_max_z {
            t = t_max_y;
            current.y += step_y;
            t_max_y += t_delta_y;
            hit_axis = Some(Axis::Y);
        } else {
            t = t_max_z;
            current.z += step_z;
            t_max_z += t_delta_z;
            hit_axis = Some(Axis::Z);
        }

        if t > max_distance {
            return None;
        }
    }
}

#[derive(Debug, Default)]
pub struct WorldPlugin {
    bounds: Option<WorldBounds>,
    seed: Option<i32>,
}

impl WorldPlugin {
    pub fn with_bounds(mut self, bounds: WorldBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_seed(mut self, seed: i32) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut AppBuilder) {
        let world = match self.bounds {
            Some(bounds) => {
                let world = VoxelWorld::with_bounds(bounds);
                let seed = self
                    .seed
                    .unwrap_or_else(|| rand::thread_rng().gen());
                log::info!(
                    "generating {} chunks with seed {}",
                    world.chunk_count(),
                    seed
                );
                generation::generate_world(&world, seed);
                world
            }
            None => VoxelWorld::new(),
        };

        app.insert_resource(world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn drain_dirty(world: &Arc<VoxelWorld>) -> HashSet<ChunkPos> {
        let mut set = HashSet::new();
        world.poll_dirty(|pos| {
            set.insert(pos);
        });
        set
    }

    #[test]
    fn set_then_get_roundtrips() {
        let world = VoxelWorld::new();
        let block = Block::new(200, [12, 34, 56]);
        assert!(world.set_block(BlockPos::new([3, -17, 100]), block));
        assert_eq!(world.block(BlockPos::new([3, -17, 100])), block);
        assert!(world.solid(BlockPos::new([3, -17, 100])));

        let soft = Block::new(127, [1, 1, 1]);
        world.set_block(BlockPos::new([3, -17, 101]), soft);
        assert!(!world.solid(BlockPos::new([3, -17, 101])));
    }

    #[test]
    fn out_of_store_reads_are_empty() {
        let world = VoxelWorld::new();
        assert_eq!(world.block(BlockPos::new([1000, 1000, 1000])), Block::EMPTY);
        assert!(!world.solid(BlockPos::new([1000, 1000, 1000])));
    }

    #[test]
    fn bounded_world_ignores_outside_writes() {
        let world = VoxelWorld::with_bounds(WorldBounds::new([0, 0, 0], [1, 1, 1]));
        assert_eq!(world.chunk_count(), 8);

        assert!(!world.set_block(BlockPos::new([-1, 0, 0]), Block::new(255, [0; 3])));
        assert_eq!(world.chunk_count(), 8);
        assert_eq!(world.block(BlockPos::new([-1, 0, 0])), Block::EMPTY);

        assert!(world.set_block(BlockPos::new([31, 31, 31]), Block::new(255, [0; 3])));
        assert!(world.solid(BlockPos::new([31, 31, 31])));
    }

    #[test]
    fn density_sum_matches_contents_after_edits() {
        let world = VoxelWorld::new();
        let positions = [
            [0, 0, 0],
            [15, 0, 0],
            [15, 15, 15],
            [0, 0, 0],
            [7, 3, 9],
            [7, 3, 9],
        ];
        for (i, &pos) in positions.iter().enumerate() {
            world.set_block(BlockPos::new(pos), Block::new((i * 40) as u8, [1, 2, 3]));
        }

        let snapshot = world.chunk(ChunkPos::new([0, 0, 0])).unwrap().snapshot();
        let expected: i32 = snapshot.data().densities().iter().map(|&d| d as i32).sum();
        assert_eq!(snapshot.data().density_sum(), expected);
    }

    #[test]
    fn interior_edit_dirties_only_its_chunk() {
        let world = VoxelWorld::with_bounds(WorldBounds::new([-1, -1, -1], [1, 1, 1]));
        world.set_block(BlockPos::new([5, 9, 1]), Block::new(255, [0; 3]));
        assert_eq!(drain_dirty(&world), HashSet::from([ChunkPos::new([0, 0, 0])]));
    }

    #[test]
    fn face_edit_dirties_the_face_neighbor() {
        let world = VoxelWorld::with_bounds(WorldBounds::new([-1, -1, -1], [1, 1, 1]));
        world.set_block(BlockPos::new([0, 9, 4]), Block::new(255, [0; 3]));
        assert_eq!(
            drain_dirty(&world),
            HashSet::from([ChunkPos::new([0, 0, 0]), ChunkPos::new([-1, 0, 0])])
        );
    }

    #[test]
    fn edge_edit_dirties_three_neighbors() {
        let world = VoxelWorld::with_bounds(WorldBounds::new([-1, -1, -1], [1, 1, 1]));
        world.set_block(BlockPos::new([0, 15, 4]), Block::new(255, [0; 3]));
        assert_eq!(
            drain_dirty(&world),
            HashSet::from([
                ChunkPos::new([0, 0, 0]),
                ChunkPos::new([-1, 0, 0]),
                ChunkPos::new([0, 1, 0]),
                ChunkPos::new([-1, 1, 0]),
            ])
        );
    }

    #[test]
    fn corner_edit_dirties_seven_neighbors() {
        let world = VoxelWorld::with_bounds(WorldBounds::new([-1, -1, -1], [1, 1, 1]));
        world.set_block(BlockPos::new([15, 15, 15]), Block::new(255, [0; 3]));
        assert_eq!(drain_dirty(&world).len(), 8);
    }

    #[test]
    fn cross_chunk_edits_dirty_exactly_the_touched_chunks() {
        // S4: in an empty unbounded world only the two materialized chunks
        // can become dirty, even though the edits sit on a shared boundary.
        let world = VoxelWorld::new();
        world.set_block(BlockPos::new([-1, 0, 0]), Block::new(255, [0; 3]));
        world.set_block(BlockPos::new([0, 0, 0]), Block::new(255, [0; 3]));
        assert_eq!(
            drain_dirty(&world),
            HashSet::from([ChunkPos::new([-1, 0, 0]), ChunkPos::new([0, 0, 0])])
        );
    }

    #[test]
    fn redundant_write_dirties_nothing() {
        let world = VoxelWorld::new();
        let block = Block::new(255, [5, 5, 5]);
        world.set_block(BlockPos::new([0, 0, 0]), block);
        drain_dirty(&world);

        world.set_block(BlockPos::new([0, 0, 0]), block);
        assert!(drain_dirty(&world).is_empty());
    }

    #[test]
    fn raycast_down_through_empty_chunks_hits_slab() {
        // S3: a 16x1x16 slab at y=0 under a hundred blocks of air.
        let world = VoxelWorld::new();
        for z in 0..16 {
            for x in 0..16 {
                world.set_block(BlockPos::new([x, 0, z]), Block::new(255, [9, 9, 9]));
            }
        }

        let hit = world
            .raycast(
                Ray3 {
                    origin: point![8.0, 100.0, 8.0],
                    direction: vector![0.0, -1.0, 0.0],
                },
                1000.0,
            )
            .expect("ray should hit the slab");

        assert_eq!(hit.pos, BlockPos::new([8, 0, 8]));
        assert_eq!(hit.side, Some(crate::Side::Top));
        assert_eq!(hit.normal(), vector![0.0, 1.0, 0.0]);
        assert_relative_eq!(hit.distance, 99.5, epsilon = 1e-3);
        assert_eq!(hit.block.density, 255);
    }

    #[test]
    fn raycast_from_inside_solid_hits_immediately() {
        let world = VoxelWorld::new();
        world.set_block(BlockPos::new([0, 0, 0]), Block::new(255, [0; 3]));

        let hit = world
            .raycast(
                Ray3 {
                    origin: point![0.0, 0.0, 0.0],
                    direction: vector![1.0, 0.0, 0.0],
                },
                10.0,
            )
            .unwrap();

        assert_eq!(hit.pos, BlockPos::new([0, 0, 0]));
        assert_eq!(hit.side, None);
        assert_eq!(hit.normal(), vector![0.0, 0.0, 0.0]);
        assert_eq!(hit.distance, 0.0);
    }

    #[test]
    fn raycast_reports_the_entered_face() {
        let world = VoxelWorld::new();
        world.set_block(BlockPos::new([0, 0, 0]), Block::new(255, [0; 3]));

        let hit = world
            .raycast(
                Ray3 {
                    origin: point![3.0, 0.0, 0.0],
                    direction: vector![-1.0, 0.0, 0.0],
                },
                10.0,
            )
            .unwrap();

        assert_eq!(hit.pos, BlockPos::new([0, 0, 0]));
        assert_eq!(hit.side, Some(crate::Side::Right));
        assert_relative_eq!(hit.distance, 2.5, epsilon = 1e-6);
        assert_relative_eq!(hit.position.x, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_ray_misses() {
        let world = VoxelWorld::new();
        world.set_block(BlockPos::new([0, 0, 0]), Block::new(255, [0; 3]));
        assert!(world
            .raycast(
                Ray3 {
                    origin: point![0.0, 0.0, 0.0],
                    direction: vector![0.0, 0.0, 0.0],
                },
                10.0,
            )
            .is_none());
    }

    #[test]
    fn raycast_misses_in_an_empty_world() {
        let world = VoxelWorld::new();
        assert!(world
            .raycast(
                Ray3 {
                    origin: point![0.3, 4.7, -2.0],
                    direction: vector![1.0, 0.2, 0.4],
                },
                500.0,
            )
            .is_none());
    }
}
