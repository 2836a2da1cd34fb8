//! this module tracks which chunks need remeshing and in what order.
//!
//! the world announces dirty chunks over a channel; the tracker gates them
//! by a view radius around the actor and hands the scheduler closest-first
//! batches. a chunk dirtied outside the radius is not forgotten: it parks in
//! a side set and re-enters the queue when the actor comes near enough.

use nalgebra::Point3;
use std::collections::HashSet;

use carven_common::world::{chunk::CHUNK_LENGTH, ChunkPos, WorldPos};

#[derive(Debug)]
pub struct MeshTracker {
    view_radius: i32,
    actor: Point3<f32>,
    center: ChunkPos,

    // INVARIANT: `dirty` and `parked` are disjoint; `dirty` holds only
    // chunks inside the view box, `parked` only chunks outside it.
    dirty: HashSet<ChunkPos>,
    parked: HashSet<ChunkPos>,
}

impl MeshTracker {
    pub fn new(view_radius: i32) -> Self {
        Self {
            view_radius,
            actor: Point3::origin(),
            center: ChunkPos::new([0, 0, 0]),
            dirty: Default::default(),
            parked: Default::default(),
        }
    }

    #[rustfmt::skip]
    fn in_view(&self, pos: ChunkPos) -> bool {
        (pos.x - self.center.x).abs() <= self.view_radius &&
        (pos.y - self.center.y).abs() <= self.view_radius &&
        (pos.z - self.center.z).abs() <= self.view_radius
    }

    /// Move the priority/visibility center. Crossing a chunk border re-gates
    /// both sets: chunks that left the view park, chunks that entered it are
    /// re-admitted.
    pub fn set_actor(&mut self, actor: Point3<f32>) {
        self.actor = actor;
        let center = ChunkPos::from(WorldPos {
            x: actor.x,
            y: actor.y,
            z: actor.z,
        });
        if center == self.center {
            return;
        }
        self.center = center;

        let leaving: Vec<_> = self
            .dirty
            .iter()
            .copied()
            .filter(|&pos| !self.in_view(pos))
            .collect();
        for pos in leaving {
            self.dirty.remove(&pos);
            self.parked.insert(pos);
        }

        let entering: Vec<_> = self
            .parked
            .iter()
            .copied()
            .filter(|&pos| self.in_view(pos))
            .collect();
        for pos in entering {
            self.parked.remove(&pos);
            self.dirty.insert(pos);
        }
    }

    pub fn mark_dirty(&mut self, pos: ChunkPos) {
        if self.in_view(pos) {
            self.dirty.insert(pos);
        } else {
            self.parked.insert(pos);
        }
    }

    pub fn is_dirty(&self, pos: ChunkPos) -> bool {
        self.dirty.contains(&pos)
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    fn distance_sq(&self, pos: ChunkPos) -> f32 {
        let half = CHUNK_LENGTH as f32 / 2.0;
        let origin = pos.origin();
        let dx = origin.x as f32 + half - self.actor.x;
        let dy = origin.y as f32 + half - self.actor.y;
        let dz = origin.z as f32 + half - self.actor.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Remove and return up to `count` dirty chunks, closest to the actor
    /// first. The caller owns getting them meshed; a chunk edited again
    /// after this simply re-enters the set.
    pub fn take_closest(&mut self, count: usize) -> Vec<ChunkPos> {
        let mut chunks: Vec<_> = self.dirty.iter().copied().collect();
        chunks.sort_unstable_by(|&a, &b| {
            self.distance_sq(a)
                .partial_cmp(&self.distance_sq(b))
                .unwrap()
        });
        chunks.truncate(count);
        for pos in &chunks {
            self.dirty.remove(pos);
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::point;

    #[test]
    fn batches_come_out_closest_first() {
        let mut tracker = MeshTracker::new(8);
        tracker.set_actor(point![0.0, 0.0, 0.0]);

        tracker.mark_dirty(ChunkPos::new([3, 0, 0]));
        tracker.mark_dirty(ChunkPos::new([0, 0, 0]));
        tracker.mark_dirty(ChunkPos::new([2, 0, 0]));
        tracker.mark_dirty(ChunkPos::new([0, 1, 0]));

        let batch = tracker.take_closest(4);
        assert_eq!(batch[0], ChunkPos::new([0, 0, 0]));
        assert_eq!(batch[1], ChunkPos::new([0, 1, 0]));
        assert_eq!(batch[2], ChunkPos::new([2, 0, 0]));
        assert_eq!(batch[3], ChunkPos::new([3, 0, 0]));
        assert_eq!(tracker.dirty_count(), 0);
    }

    #[test]
    fn take_is_bounded_and_removes_only_what_it_returns() {
        let mut tracker = MeshTracker::new(8);
        for x in 0..5 {
            tracker.mark_dirty(ChunkPos::new([x, 0, 0]));
        }

        let batch = tracker.take_closest(2);
        assert_eq!(batch.len(), 2);
        assert_eq!(tracker.dirty_count(), 3);
    }

    #[test]
    fn chunks_outside_the_view_radius_park() {
        let mut tracker = MeshTracker::new(2);
        tracker.mark_dirty(ChunkPos::new([0, 0, 0]));
        tracker.mark_dirty(ChunkPos::new([10, 0, 0]));

        assert_eq!(tracker.dirty_count(), 1);
        assert_eq!(tracker.parked_count(), 1);
        assert!(tracker.take_closest(10).len() == 1);
    }

    #[test]
    fn parked_chunks_readmit_when_the_actor_approaches() {
        let mut tracker = MeshTracker::new(2);
        tracker.mark_dirty(ChunkPos::new([10, 0, 0]));
        assert_eq!(tracker.dirty_count(), 0);

        tracker.set_actor(point![160.0, 0.0, 0.0]);
        assert_eq!(tracker.dirty_count(), 1);
        assert_eq!(tracker.parked_count(), 0);

        // and the chunk near the old center is now out of view
        tracker.mark_dirty(ChunkPos::new([0, 0, 0]));
        assert_eq!(tracker.parked_count(), 1);
    }

    #[test]
    fn dirty_chunks_park_when_the_actor_leaves() {
        let mut tracker = MeshTracker::new(2);
        tracker.mark_dirty(ChunkPos::new([0, 0, 0]));
        assert_eq!(tracker.dirty_count(), 1);

        tracker.set_actor(point![300.0, 0.0, 0.0]);
        assert_eq!(tracker.dirty_count(), 0);
        assert_eq!(tracker.parked_count(), 1);
    }

    #[test]
    fn remarking_a_taken_chunk_requeues_it() {
        let mut tracker = MeshTracker::new(8);
        let pos = ChunkPos::new([1, 0, 0]);
        tracker.mark_dirty(pos);
        assert_eq!(tracker.take_closest(1), vec![pos]);
        assert!(!tracker.is_dirty(pos));

        tracker.mark_dirty(pos);
        assert!(tracker.is_dirty(pos));
    }
}
