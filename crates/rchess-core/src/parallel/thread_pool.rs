//! Resident worker threads for parallel root splitting
//!
//! Workers are named `rchess-worker-{id}` and live until `shutdown` (or drop).
//! Each one owns a [`WorkerLocal`] that survives between tasks, so its
//! position copy and search heuristics are reused across iterations of the
//! same request.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, warn};

use super::worker::{RootTask, WorkerLocal, WorkerReport};
use crate::error::SearchError;

pub(crate) enum WorkerCommand {
    Run(Box<RootTask>),
    Shutdown,
}

struct Worker {
    ctrl: Sender<WorkerCommand>,
    handle: Option<JoinHandle<()>>,
}

/// Fixed set of search worker threads
pub struct ThreadPool {
    workers: Vec<Worker>,
    closed: bool,
}

impl ThreadPool {
    /// Spawn `size` workers
    pub fn new(size: usize) -> Result<Self, SearchError> {
        let mut pool = Self {
            workers: Vec::with_capacity(size),
            closed: false,
        };
        pool.resize(size)?;
        Ok(pool)
    }

    /// Grow or shrink to `desired` workers. Reopens a closed pool.
    pub fn resize(&mut self, desired: usize) -> Result<(), SearchError> {
        self.closed = false;
        while self.workers.len() < desired {
            let id = self.workers.len() + 1;
            let (ctrl_tx, ctrl_rx) = channel::unbounded();
            let handle = thread::Builder::new()
                .name(format!("rchess-worker-{id}"))
                .spawn(move || worker_loop(ctrl_rx, id))?;
            self.workers.push(Worker {
                ctrl: ctrl_tx,
                handle: Some(handle),
            });
        }

        while self.workers.len() > desired {
            if let Some(mut worker) = self.workers.pop() {
                stop_worker(&mut worker);
            }
        }
        debug!("thread pool resized to {desired} workers");
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Hand a task to worker `index` (0-based)
    pub(crate) fn dispatch(&self, index: usize, task: RootTask) -> Result<(), SearchError> {
        let worker = self
            .workers
            .get(index)
            .filter(|_| !self.closed)
            .ok_or(SearchError::PoolClosed)?;
        worker
            .ctrl
            .send(WorkerCommand::Run(Box::new(task)))
            .map_err(|_| SearchError::WorkerFailed { worker: index + 1 })
    }

    /// Stop and join every worker. Idempotent.
    pub fn shutdown(&mut self) {
        if self.closed && self.workers.is_empty() {
            return;
        }
        for worker in self.workers.iter_mut() {
            stop_worker(worker);
        }
        self.workers.clear();
        self.closed = true;
        debug!("thread pool shut down");
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn stop_worker(worker: &mut Worker) {
    let _ = worker.ctrl.send(WorkerCommand::Shutdown);
    if let Some(handle) = worker.handle.take() {
        if handle.join().is_err() {
            warn!("search worker exited by panic");
        }
    }
}

fn worker_loop(ctrl_rx: Receiver<WorkerCommand>, worker_id: usize) {
    let mut local = WorkerLocal::new();
    while let Ok(command) = ctrl_rx.recv() {
        let task = match command {
            WorkerCommand::Run(task) => task,
            WorkerCommand::Shutdown => break,
        };

        let report_tx = task.report_tx.clone();
        let report = match panic::catch_unwind(AssertUnwindSafe(|| local.run(worker_id, *task))) {
            Ok(report) => report,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                warn!("worker {worker_id} panicked: {reason}");
                // State touched by the panicking search is not trusted again
                local = WorkerLocal::new();
                WorkerReport::Failed {
                    worker: worker_id,
                    reason,
                }
            }
        };
        let _ = report_tx.send(report);
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
