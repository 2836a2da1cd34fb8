use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{
    orphan::{Orphan, OrphanSnapshot, OrphanWriteGuard},
    ChunkPos,
};

// The width of the chunk is `2 ^ CHUNK_LENGTH_BITS`
pub const CHUNK_LENGTH_BITS: usize = 4;

pub const CHUNK_LENGTH: usize = 1 << CHUNK_LENGTH_BITS;
pub const CHUNK_MASK: i32 = CHUNK_LENGTH as i32 - 1;
pub const CHUNK_AREA: usize = CHUNK_LENGTH * CHUNK_LENGTH;
pub const CHUNK_VOLUME: usize = CHUNK_LENGTH * CHUNK_LENGTH * CHUNK_LENGTH;

/// Density at or above which a voxel counts as solid. This is both the
/// marching-cubes isosurface threshold and the occupancy predicate used by
/// the culled mesher, the raycast, and collision.
pub const ISOLEVEL: u8 = 128;

/// One voxel sample: a density and an sRGB color. The color is meaningless
/// where `density == 0`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct Block {
    pub density: u8,
    pub color: [u8; 3],
}

impl Block {
    pub const EMPTY: Block = Block {
        density: 0,
        color: [0; 3],
    };

    pub const fn new(density: u8, color: [u8; 3]) -> Block {
        Block {
            density,
            color,
        }
    }

    pub fn is_solid(&self) -> bool {
        self.density >= ISOLEVEL
    }
}

pub type ChunkIndex = [usize; 3];

// data order is XZY: X varies fastest, then Z, then Y. meshing and sampling
// depend on this layout exactly.
#[inline(always)]
pub const fn voxel_index(x: usize, y: usize, z: usize) -> usize {
    x + CHUNK_LENGTH * z + CHUNK_AREA * y
}

pub fn is_in_chunk_bounds(x: usize, y: usize, z: usize) -> bool {
    x < CHUNK_LENGTH && y < CHUNK_LENGTH && z < CHUNK_LENGTH
}

/// The voxel payload of one chunk: a density buffer, an sRGB color buffer
/// (3 bytes per voxel), and the running sum of all densities. `sum == 0`
/// means the chunk is all air, which the raycast uses to step over the whole
/// chunk at once.
#[derive(Clone)]
pub struct ChunkArrays {
    density: Box<[u8]>,
    color: Box<[u8]>,
    sum: i32,
}

impl ChunkArrays {
    pub fn empty() -> Self {
        Self {
            density: vec![0; CHUNK_VOLUME].into_boxed_slice(),
            color: vec![0; 3 * CHUNK_VOLUME].into_boxed_slice(),
            sum: 0,
        }
    }

    pub fn get(&self, index: ChunkIndex) -> Block {
        let [x, y, z] = index;
        assert!(
            is_in_chunk_bounds(x, y, z),
            "chunk index out of bounds: the size is {} but the index is ({}, {}, {})",
            CHUNK_LENGTH,
            x,
            y,
            z
        );
        let i = voxel_index(x, y, z);
        Block {
            density: self.density[i],
            color: [self.color[3 * i], self.color[3 * i + 1], self.color[3 * i + 2]],
        }
    }

    /// Write one voxel, maintaining the density sum. Returns the previous
    /// value.
    pub fn set(&mut self, index: ChunkIndex, block: Block) -> Block {
        let [x, y, z] = index;
        assert!(
            is_in_chunk_bounds(x, y, z),
            "chunk index out of bounds: the size is {} but the index is ({}, {}, {})",
            CHUNK_LENGTH,
            x,
            y,
            z
        );
        let i = voxel_index(x, y, z);
        let old = Block {
            density: self.density[i],
            color: [self.color[3 * i], self.color[3 * i + 1], self.color[3 * i + 2]],
        };
        self.density[i] = block.density;
        self.color[3 * i] = block.color[0];
        self.color[3 * i + 1] = block.color[1];
        self.color[3 * i + 2] = block.color[2];
        self.sum += block.density as i32 - old.density as i32;
        old
    }

    /// Bulk-overwrite both buffers; used by the terrain generator. The sum is
    /// recomputed from scratch.
    pub fn fill_from<F>(&mut self, mut sample: F)
    where
        F: FnMut(usize, usize, usize) -> Block,
    {
        let mut sum = 0i32;
        for y in 0..CHUNK_LENGTH {
            for z in 0..CHUNK_LENGTH {
                for x in 0..CHUNK_LENGTH {
                    let block = sample(x, y, z);
                    let i = voxel_index(x, y, z);
                    self.density[i] = block.density;
                    self.color[3 * i] = block.color[0];
                    self.color[3 * i + 1] = block.color[1];
                    self.color[3 * i + 2] = block.color[2];
                    sum += block.density as i32;
                }
            }
        }
        self.sum = sum;
    }

    pub fn density_sum(&self) -> i32 {
        self.sum
    }

    /// `true` when every voxel is air; such chunks mesh to nothing and are
    /// skipped whole by the raycast.
    pub fn is_empty(&self) -> bool {
        self.sum == 0
    }

    pub fn densities(&self) -> &[u8] {
        &self.density
    }
}

#[derive(Clone)]
pub(crate) struct ChunkInner {
    pos: ChunkPos,
    data: ChunkArrays,
}

/// A consistent read-only view of one chunk's buffers, as of the moment it
/// was taken. Holding a snapshot never blocks the writer; see
/// [`super::orphan`].
#[derive(Clone)]
pub struct ChunkSnapshot {
    inner: OrphanSnapshot<ChunkInner>,
}

impl ChunkSnapshot {
    pub fn pos(&self) -> ChunkPos {
        self.inner.pos
    }

    pub fn data(&self) -> &ChunkArrays {
        &self.inner.data
    }

    /// See [`super::orphan::OrphanSnapshot::is_orphaned`]
    pub fn is_orphaned(&self) -> bool {
        self.inner.is_orphaned()
    }
}

pub struct Chunk {
    pos: ChunkPos,
    inner: Orphan<ChunkInner>,
    dirty: AtomicBool,
    dirty_sender: Sender<ChunkPos>,
}

impl Chunk {
    pub(crate) fn new(dirty_sender: &Sender<ChunkPos>, pos: ChunkPos, data: ChunkArrays) -> Self {
        Self {
            pos,
            inner: Orphan::new(ChunkInner { pos, data }),
            dirty: AtomicBool::new(false),
            dirty_sender: dirty_sender.clone(),
        }
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn snapshot(&self) -> ChunkSnapshot {
        ChunkSnapshot {
            inner: self.inner.snapshot(),
        }
    }

    pub(crate) fn write(&self) -> OrphanWriteGuard<'_, ChunkInner> {
        self.inner.orphan_readers()
    }

    /// Announce over the dirty channel that this chunk needs remeshing. The
    /// atomic flag dedups announcements between drains of the channel.
    pub fn mark_dirty(&self) {
        if !self.dirty.swap(true, Ordering::Relaxed) {
            let _ = self.dirty_sender.send(self.pos);
        }
    }

    pub(crate) fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Relaxed);
    }
}

impl ChunkInner {
    pub(crate) fn data_mut(&mut self) -> &mut ChunkArrays {
        &mut self.data
    }
}

/// Calls `mark` for every chunk offset whose sampling footprint contains the
/// voxel at local `index`: always `[0, 0, 0]` (the owning chunk), plus the
/// face neighbor for each axis where the voxel sits on a chunk boundary, plus
/// the edge/corner neighbors where two or three axes do.
pub fn chunks_sharing_voxel<F>(index: ChunkIndex, mut mark: F)
where
    F: FnMut([i32; 3]),
{
    fn spread(n: usize) -> &'static [i32] {
        const MAX_AXIS_INDEX: usize = CHUNK_LENGTH - 1;
        if n == 0 {
            &[0, -1]
        } else if n == MAX_AXIS_INDEX {
            &[0, 1]
        } else {
            &[0]
        }
    }

    for &dx in spread(index[0]) {
        for &dy in spread(index[1]) {
            for &dz in spread(index[2]) {
                mark([dx, dy, dz]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn index_layout_is_x_then_z_then_y() {
        assert_eq!(voxel_index(0, 0, 0), 0);
        assert_eq!(voxel_index(1, 0, 0), 1);
        assert_eq!(voxel_index(0, 0, 1), CHUNK_LENGTH);
        assert_eq!(voxel_index(0, 1, 0), CHUNK_AREA);
        assert_eq!(voxel_index(15, 15, 15), CHUNK_VOLUME - 1);
    }

    #[test]
    fn set_maintains_density_sum() {
        let mut data = ChunkArrays::empty();
        assert!(data.is_empty());

        data.set([1, 2, 3], Block::new(200, [10, 20, 30]));
        data.set([0, 0, 0], Block::new(55, [1, 2, 3]));
        assert_eq!(data.density_sum(), 255);

        data.set([1, 2, 3], Block::new(100, [10, 20, 30]));
        assert_eq!(data.density_sum(), 155);

        data.set([1, 2, 3], Block::EMPTY);
        data.set([0, 0, 0], Block::EMPTY);
        assert!(data.is_empty());

        let expected: i32 = data.densities().iter().map(|&d| d as i32).sum();
        assert_eq!(data.density_sum(), expected);
    }

    #[test]
    fn get_returns_what_set_stored() {
        let mut data = ChunkArrays::empty();
        let block = Block::new(222, [7, 8, 9]);
        data.set([15, 0, 8], block);
        assert_eq!(data.get([15, 0, 8]), block);
        assert_eq!(data.get([14, 0, 8]), Block::EMPTY);
    }

    fn collect_offsets(index: ChunkIndex) -> HashSet<[i32; 3]> {
        let mut set = HashSet::new();
        chunks_sharing_voxel(index, |offset| {
            set.insert(offset);
        });
        set
    }

    #[test]
    fn interior_voxel_touches_only_the_owning_chunk() {
        let set = collect_offsets([5, 9, 1]);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&[0, 0, 0]));
    }

    #[test]
    fn face_voxel_touches_one_neighbor() {
        let set = collect_offsets([0, 9, 4]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&[-1, 0, 0]));
    }

    #[test]
    fn edge_voxel_touches_three_neighbors() {
        let set = collect_offsets([0, 15, 4]);
        assert_eq!(set.len(), 4);
        assert!(set.contains(&[-1, 0, 0]));
        assert!(set.contains(&[0, 1, 0]));
        assert!(set.contains(&[-1, 1, 0]));
    }

    #[test]
    fn corner_voxel_touches_seven_neighbors() {
        let set = collect_offsets([15, 15, 15]);
        assert_eq!(set.len(), 8);
        assert!(set.contains(&[1, 1, 1]));
        assert!(set.contains(&[1, 0, 1]));
    }
}
