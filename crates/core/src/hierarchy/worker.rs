//! Background hierarchy computation.
//!
//! At most one build is in flight. Submitting a request supersedes the
//! previous one: its cancel flag is raised and its result channel dropped,
//! so a stale tree can never be handed back. Every output also carries the
//! generation it was submitted under, and anything but the latest
//! generation is discarded.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use callwheel_protocol::{HierarchyNode, HierarchyRequest};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError, bounded};
use thiserror::Error;
use tracing::{debug, warn};

use super::builder::{BuildError, HierarchyBuilder};
use super::cache::RequestKey;
use crate::model::StatsTable;

/// Stack reserved for each build thread. Builds are bounded by
/// [`MAX_LEVELS`](super::builder::MAX_LEVELS), which this leaves ample room for.
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("hierarchy computation failed: {0}")]
    Computation(#[from] BuildError),
    #[error("hierarchy worker terminated without a result")]
    Terminated,
    #[error("could not start hierarchy worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A finished (or failed) request, tagged with the key it answers.
#[derive(Debug)]
pub struct WorkerOutput {
    pub key: RequestKey,
    pub generation: u64,
    pub result: Result<HierarchyNode, WorkerError>,
}

/// Where a session sends hierarchy requests.
pub trait HierarchyBackend {
    /// Start computing `request`, superseding anything in flight.
    fn submit(&mut self, request: HierarchyRequest) -> Result<(), WorkerError>;

    /// Non-blocking: the latest request's output, if it is ready.
    fn try_recv(&mut self) -> Option<WorkerOutput>;

    /// Block up to `timeout` for the latest request's output.
    fn recv_timeout(&mut self, timeout: Duration) -> Option<WorkerOutput>;

    /// Abandon whatever is in flight and start from a clean slate.
    fn cycle(&mut self);

    fn is_busy(&self) -> bool;
}

struct Job {
    key: RequestKey,
    generation: u64,
    cancel: Arc<AtomicBool>,
    results: Receiver<Result<HierarchyNode, BuildError>>,
}

/// Runs each build on its own named thread.
pub struct HierarchyWorker {
    stats: Arc<StatsTable>,
    generation: u64,
    job: Option<Job>,
}

impl HierarchyWorker {
    pub fn new(stats: Arc<StatsTable>) -> Self {
        Self {
            stats,
            generation: 0,
            job: None,
        }
    }
}

fn finish(job: Job, result: Result<HierarchyNode, WorkerError>) -> WorkerOutput {
    if let Err(err) = &result {
        warn!(key = %job.key, generation = job.generation, error = %err, "hierarchy build failed");
    }
    WorkerOutput {
        key: job.key,
        generation: job.generation,
        result,
    }
}

impl HierarchyBackend for HierarchyWorker {
    fn submit(&mut self, request: HierarchyRequest) -> Result<(), WorkerError> {
        self.cycle();
        self.generation += 1;

        let key = RequestKey::from(&request);
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = bounded(1);
        let stats = Arc::clone(&self.stats);
        let flag = Arc::clone(&cancel);

        thread::Builder::new()
            .name(format!("hierarchy-{}", self.generation))
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                let result = HierarchyBuilder::new(&stats)
                    .with_cancel(&flag)
                    .build_request(&request);
                // The receiver is gone if this request was superseded.
                let _ = tx.send(result);
            })?;

        debug!(%key, generation = self.generation, "hierarchy request submitted");
        self.job = Some(Job {
            key,
            generation: self.generation,
            cancel,
            results: rx,
        });
        Ok(())
    }

    fn try_recv(&mut self) -> Option<WorkerOutput> {
        let job = self.job.take()?;
        match job.results.try_recv() {
            Ok(result) => Some(finish(job, result.map_err(WorkerError::from))),
            Err(TryRecvError::Empty) => {
                self.job = Some(job);
                None
            }
            Err(TryRecvError::Disconnected) => Some(finish(job, Err(WorkerError::Terminated))),
        }
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Option<WorkerOutput> {
        let job = self.job.take()?;
        match job.results.recv_timeout(timeout) {
            Ok(result) => Some(finish(job, result.map_err(WorkerError::from))),
            Err(RecvTimeoutError::Timeout) => {
                self.job = Some(job);
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                Some(finish(job, Err(WorkerError::Terminated)))
            }
        }
    }

    fn cycle(&mut self) {
        if let Some(job) = self.job.take() {
            job.cancel.store(true, Ordering::Relaxed);
            debug!(key = %job.key, generation = job.generation, "hierarchy request superseded");
        }
    }

    fn is_busy(&self) -> bool {
        self.job.is_some()
    }
}

/// Builds synchronously on `submit`. For hosts without threads (wasm) and
/// for deterministic tests.
pub struct InlineBackend {
    stats: Arc<StatsTable>,
    generation: u64,
    ready: VecDeque<WorkerOutput>,
    builds: usize,
}

impl InlineBackend {
    pub fn new(stats: Arc<StatsTable>) -> Self {
        Self {
            stats,
            generation: 0,
            ready: VecDeque::new(),
            builds: 0,
        }
    }

    /// How many hierarchies have been built so far.
    pub fn builds(&self) -> usize {
        self.builds
    }
}

impl HierarchyBackend for InlineBackend {
    fn submit(&mut self, request: HierarchyRequest) -> Result<(), WorkerError> {
        self.cycle();
        self.generation += 1;
        self.builds += 1;
        let result = HierarchyBuilder::new(&self.stats)
            .build_request(&request)
            .map_err(WorkerError::from);
        self.ready.push_back(WorkerOutput {
            key: RequestKey::from(&request),
            generation: self.generation,
            result,
        });
        Ok(())
    }

    fn try_recv(&mut self) -> Option<WorkerOutput> {
        self.ready.pop_front()
    }

    fn recv_timeout(&mut self, _timeout: Duration) -> Option<WorkerOutput> {
        self.ready.pop_front()
    }

    fn cycle(&mut self) {
        self.ready.clear();
    }

    fn is_busy(&self) -> bool {
        !self.ready.is_empty()
    }
}
