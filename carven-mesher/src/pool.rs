//! the fixed pool of mesh workers.
//!
//! each worker owns its own job queue so the scheduler can keep routing a
//! chunk's follow-up jobs to the worker already holding it; a shared rayon
//! pool cannot address a specific thread. workers are long-lived, consume
//! jobs FIFO, and keep their sampling scratch across jobs.

use crossbeam_channel::{Receiver, Sender};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    thread,
    time::Duration,
};

use carven_common::{
    util::ChannelPair,
    world::{ChunkPos, VoxelWorld},
};

use crate::{
    generation::mesh_culled, marching::MarchingCubesMesher, ChunkNeighbors, MeshBuffers,
    MesherMode,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MeshJob {
    pub pos: ChunkPos,
}

#[derive(Debug)]
pub enum CompletedMesh {
    Completed { pos: ChunkPos, mesh: MeshBuffers },
    Failed { pos: ChunkPos },
}

impl CompletedMesh {
    pub fn pos(&self) -> ChunkPos {
        match self {
            CompletedMesh::Completed { pos, .. } => *pos,
            CompletedMesh::Failed { pos } => *pos,
        }
    }
}

struct WorkerHandle {
    jobs: Sender<MeshJob>,
}

pub struct MeshWorkerPool {
    workers: Vec<WorkerHandle>,
    results: ChannelPair<CompletedMesh>,
}

impl MeshWorkerPool {
    pub fn new(world: &Arc<VoxelWorld>, mode: MesherMode, size: usize) -> Self {
        assert!(size > 0, "mesh pool needs at least one worker");

        let results = ChannelPair::new();
        let workers = (0..size)
            .map(|index| {
                let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded();
                let world = Arc::clone(world);
                let results_tx = results.sender();
                thread::Builder::new()
                    .name(format!("mesh-worker-{}", index))
                    .spawn(move || worker_loop(world, mode, jobs_rx, results_tx))
                    .unwrap();
                WorkerHandle { jobs: jobs_tx }
            })
            .collect();

        Self { workers, results }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job on a specific worker. A dead worker drops the job
    /// silently; the chunk stays dirty and is retried on a later pass.
    pub fn submit(&self, worker: usize, job: MeshJob) {
        let _ = self.workers[worker].jobs.send(job);
    }

    pub fn try_results(&self) -> impl Iterator<Item = CompletedMesh> + '_ {
        self.results.rx.try_iter()
    }

    pub fn recv_result(&self, timeout: Duration) -> Option<CompletedMesh> {
        self.results.rx.recv_timeout(timeout).ok()
    }
}

fn worker_loop(
    world: Arc<VoxelWorld>,
    mode: MesherMode,
    jobs: Receiver<MeshJob>,
    results: Sender<CompletedMesh>,
) {
    // scratch lives for the whole worker; meshing allocates nothing per job
    // beyond the result copy
    let mut marching = MarchingCubesMesher::new();
    let mut scratch = MeshBuffers::with_worst_case_capacity();

    while let Ok(job) = jobs.recv() {
        let pos = job.pos;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let chunks = ChunkNeighbors::capture(&world, pos);
            match mode {
                MesherMode::MarchingCubes => marching.mesh(&chunks, &mut scratch),
                MesherMode::Culled => mesh_culled(&chunks, &mut scratch),
            }
        }));

        let message = match outcome {
            Ok(()) => CompletedMesh::Completed {
                pos,
                mesh: scratch.clone(),
            },
            Err(_) => {
                log::error!("mesh job for chunk {:?} panicked; requeueing", pos);
                CompletedMesh::Failed { pos }
            }
        };

        if results.send(message).is_err() {
            // the pool is gone; nobody wants results anymore
            break;
        }
    }
}
