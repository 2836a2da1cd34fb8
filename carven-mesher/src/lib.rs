//! chunk meshing for the voxel engine: a smooth marching-cubes mesher and a
//! blocky culled-faces mesher over the same chunk snapshots, a dirty tracker
//! gated by a view radius, and a fixed worker pool scheduled closest-first
//! from the actor.
//!
//! data flow: `VoxelWorld::set_block` announces dirty chunks over a channel;
//! [`update_tracker`] drains it into the [`MeshTracker`]; [`queue_mesh_jobs`]
//! dispatches the closest dirty chunks to the [`pool`]; workers mesh from
//! chunk snapshots and send [`pool::CompletedMesh`] records back;
//! [`update_completed_meshes`] writes them into the renderer-facing
//! [`MeshStore`] slots.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, str::FromStr, sync::Arc};

use carven_common::{
    debug::send_debug_event,
    prelude::*,
    transform::Transform,
    world::{
        chunk::{Block, ChunkSnapshot, CHUNK_LENGTH},
        ChunkPos, VoxelWorld,
    },
};

use self::{
    pool::{CompletedMesh, MeshJob, MeshWorkerPool},
    tracker::MeshTracker,
};

pub mod generation;
pub mod marching;
pub mod pool;
pub mod tables;
pub mod tracker;

pub mod debug {
    use carven_common::{debug_events, world::ChunkPos};

    pub enum MesherEvent {
        Meshed(ChunkPos),
        Failed(ChunkPos),
    }

    debug_events! {
        MesherEvent => "mesher",
    }
}

/// The output of one mesh job, in the shape the renderer consumes.
///
/// Both meshers fill the same record. The culled mesher produces indexed
/// quads with per-vertex ambient occlusion; marching cubes produces a
/// non-indexed triangle soup, leaving `indices` empty and
/// `ambient_occlusion` at 1.0. The per-vertex arrays always agree in length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffers {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 3]>,
    pub ambient_occlusion: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    /// Buffers sized so that no chunk, however pathological, can outgrow
    /// them mid-mesh.
    pub fn with_worst_case_capacity() -> Self {
        let vertices = marching::MAX_MESH_VERTICES;
        Self {
            positions: Vec::with_capacity(vertices),
            normals: Vec::with_capacity(vertices),
            colors: Vec::with_capacity(vertices),
            ambient_occlusion: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(vertices / 2 * 3),
        }
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.colors.clear();
        self.ambient_occlusion.clear();
        self.indices.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        if self.indices.is_empty() {
            self.positions.len() / 3
        } else {
            self.indices.len() / 3
        }
    }

    /// Take over another mesh's contents without giving up this slot's
    /// allocations.
    pub fn copy_from(&mut self, other: &MeshBuffers) {
        self.clear();
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.colors.extend_from_slice(&other.colors);
        self.ambient_occlusion
            .extend_from_slice(&other.ambient_occlusion);
        self.indices.extend_from_slice(&other.indices);
    }
}

pub type ChunkAxisOffset = i16;

/// Snapshots of a chunk and its 26 neighbors, taken once at the start of a
/// mesh job. Lookups may step up to one chunk outside the center chunk;
/// positions in missing chunks read as air.
pub struct ChunkNeighbors {
    chunks: Vec<Option<ChunkSnapshot>>,
}

impl ChunkNeighbors {
    pub fn capture(world: &Arc<VoxelWorld>, pos: ChunkPos) -> Self {
        let mut chunks = Vec::with_capacity(27);

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    chunks.push(
                        world
                            .chunk(pos.offset([dx, dy, dz]))
                            .map(|chunk| chunk.snapshot()),
                    );
                }
            }
        }

        Self { chunks }
    }

    pub fn lookup(&self, pos: [ChunkAxisOffset; 3]) -> Block {
        let (cx, mx) = chunks_index_and_offset(pos[0]);
        let (cy, my) = chunks_index_and_offset(pos[1]);
        let (cz, mz) = chunks_index_and_offset(pos[2]);

        match &self.chunks[9 * cx + 3 * cy + cz] {
            Some(snapshot) => snapshot.data().get([mx, my, mz]),
            None => Block::EMPTY,
        }
    }
}

fn chunks_index_and_offset(n: ChunkAxisOffset) -> (usize, usize) {
    const LEN: ChunkAxisOffset = CHUNK_LENGTH as ChunkAxisOffset;
    match n {
        _ if n < 0 => (0, (n + LEN) as usize),
        _ if n >= LEN => (2, (n - LEN) as usize),
        _ => (1, n as usize),
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MesherMode {
    MarchingCubes,
    Culled,
}

impl FromStr for MesherMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "marching-cubes" => Self::MarchingCubes,
            "culled" => Self::Culled,
            other => bail!("unknown mesher mode '{}'", other),
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MesherConfig {
    pub mode: MesherMode,
    pub pool_size: usize,
    pub max_meshes_per_tick: usize,
    /// In chunks, centered on the actor.
    pub view_radius: i32,
}

impl Default for MesherConfig {
    fn default() -> Self {
        Self {
            mode: MesherMode::MarchingCubes,
            pool_size: 3,
            max_meshes_per_tick: 3,
            view_radius: 8,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    worker: usize,
    pending: usize,
}

/// Scheduler state: the worker pool plus the in-flight bookkeeping that
/// keeps each chunk's jobs on a single worker.
pub struct MesherContext {
    pool: MeshWorkerPool,
    in_flight: HashMap<ChunkPos, InFlight>,
    next_worker: usize,
}

impl MesherContext {
    pub fn new(world: &Arc<VoxelWorld>, config: &MesherConfig) -> Self {
        Self {
            pool: MeshWorkerPool::new(world, config.mode, config.pool_size),
            in_flight: Default::default(),
            next_worker: 0,
        }
    }

    /// Route a mesh job. A chunk with a job already in flight goes back to
    /// the worker holding it, so that chunk's meshes apply in order; fresh
    /// chunks rotate round-robin through the pool.
    pub fn dispatch(&mut self, pos: ChunkPos) -> usize {
        let worker = match self.in_flight.get_mut(&pos) {
            Some(entry) => {
                entry.pending += 1;
                entry.worker
            }
            None => {
                let worker = self.next_worker;
                self.next_worker = (self.next_worker + 1) % self.pool.worker_count();
                self.in_flight.insert(pos, InFlight { worker, pending: 1 });
                worker
            }
        };

        self.pool.submit(worker, MeshJob { pos });
        worker
    }

    fn job_finished(&mut self, pos: ChunkPos) {
        if let Some(entry) = self.in_flight.get_mut(&pos) {
            entry.pending -= 1;
            if entry.pending == 0 {
                self.in_flight.remove(&pos);
            }
        }
    }

    /// Drain every result the pool has finished so far, releasing each
    /// chunk's in-flight claim before handing the result over.
    pub fn poll_results<F>(&mut self, mut func: F)
    where
        F: FnMut(CompletedMesh),
    {
        let results: Vec<_> = self.pool.try_results().collect();
        for result in results {
            self.job_finished(result.pos());
            func(result);
        }
    }

    /// Block up to `timeout` for one result.
    pub fn recv_result(&mut self, timeout: std::time::Duration) -> Option<CompletedMesh> {
        let result = self.pool.recv_result(timeout)?;
        self.job_finished(result.pos());
        Some(result)
    }

    pub fn assigned_worker(&self, pos: ChunkPos) -> Option<usize> {
        self.in_flight.get(&pos).map(|entry| entry.worker)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

/// Renderer-facing mesh slots, one per meshed chunk. A slot is re-populated
/// in place on every remesh; its allocations persist for the life of the
/// chunk's mesh.
#[derive(Default)]
pub struct MeshStore {
    meshes: HashMap<ChunkPos, MeshBuffers>,
}

impl MeshStore {
    pub fn mesh(&self, pos: ChunkPos) -> Option<&MeshBuffers> {
        self.meshes.get(&pos)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChunkPos, &MeshBuffers)> {
        self.meshes.iter()
    }

    pub fn ingest(&mut self, pos: ChunkPos, mesh: &MeshBuffers) {
        self.meshes.entry(pos).or_default().copy_from(mesh);
    }
}

/// Fired after a chunk's mesh slot is updated.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MeshUpdated(pub ChunkPos);

/// Marks the entity whose position drives mesh priority and the view
/// radius; typically the camera.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct MeshActor;

pub fn update_tracker(
    world: Res<Arc<VoxelWorld>>,
    mut tracker: ResMut<MeshTracker>,
    query: Query<&Transform, With<MeshActor>>,
) {
    if let Some(transform) = query.iter().next() {
        tracker.set_actor(transform.pos());
    }
    world.poll_dirty(|pos| tracker.mark_dirty(pos));
}

pub fn queue_mesh_jobs(
    config: Res<MesherConfig>,
    mut tracker: ResMut<MeshTracker>,
    mut ctx: ResMut<MesherContext>,
) {
    for pos in tracker.take_closest(config.max_meshes_per_tick) {
        ctx.dispatch(pos);
    }
}

pub fn update_completed_meshes(
    mut ctx: ResMut<MesherContext>,
    mut tracker: ResMut<MeshTracker>,
    mut store: ResMut<MeshStore>,
    mut events: EventWriter<MeshUpdated>,
) {
    ctx.poll_results(|result| match result {
        CompletedMesh::Completed { pos, mesh } => {
            // a chunk re-dirtied since dispatch keeps this mesh; it is stale
            // by at most one edit and gets replaced when its next job
            // completes
            store.ingest(pos, &mesh);
            events.send(MeshUpdated(pos));
            send_debug_event(debug::MesherEvent::Meshed(pos));
        }
        CompletedMesh::Failed { pos } => {
            tracker.mark_dirty(pos);
            send_debug_event(debug::MesherEvent::Failed(pos));
        }
    });
}

fn init_mesher(mut cmd: Commands, world: Res<Arc<VoxelWorld>>, config: Res<MesherConfig>) {
    cmd.insert_resource(MeshTracker::new(config.view_radius));
    cmd.insert_resource(MesherContext::new(&world, &config));
}

#[derive(Debug, Default)]
pub struct ChunkMesherPlugin {
    pub config: MesherConfig,
}

impl ChunkMesherPlugin {
    pub fn with_config(mut self, config: MesherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_mode(mut self, mode: MesherMode) -> Self {
        self.config.mode = mode;
        self
    }
}

impl Plugin for ChunkMesherPlugin {
    fn build(&self, app: &mut AppBuilder) {
        app.insert_resource(self.config);
        app.insert_resource(MeshStore::default());
        app.add_event::<MeshUpdated>();
        app.add_startup_system(init_mesher.system());
        app.add_system(update_tracker.system());
        app.add_system(queue_mesh_jobs.system());
        app.add_system(update_completed_meshes.system());
    }
}
