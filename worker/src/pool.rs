use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    sync::Arc,
};

use log::{debug, error, info, warn};
use tokio::{sync::mpsc, task::JoinSet};

use crate::{DecodedImage, ImageDecoder, PoolConfig, Task, partition::chunk_ranges};

/// The outcome of a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Decoded(DecodedImage),
    Failed { path: PathBuf, detail: String },
}

/// A per-task result message, tagged with the worker that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub worker_id: usize,
    pub outcome: Outcome,
}

/// The lifecycle of a worker as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    /// Every assigned task was reported.
    Retired,
    /// The executor itself died, its unreported tasks are lost.
    Crashed,
}

/// The coordinator's accounting for a single worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub worker_id: usize,
    pub assigned: usize,
    pub completed: usize,
    pub lost: usize,
    pub state: WorkerState,
}

/// The accounting for every started worker, returned by the join barrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSummary {
    pub workers: Vec<WorkerSummary>,
}

impl PoolSummary {
    pub fn assigned(&self) -> usize {
        self.workers.iter().map(|w| w.assigned).sum()
    }

    pub fn completed(&self) -> usize {
        self.workers.iter().map(|w| w.completed).sum()
    }

    pub fn lost(&self) -> usize {
        self.workers.iter().map(|w| w.lost).sum()
    }

    /// Returns the amount of workers that crashed.
    pub fn crashed(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.state == WorkerState::Crashed)
            .count()
    }
}

enum WorkerMsg {
    Report(TaskReport),
    Crashed { worker_id: usize, detail: String },
}

/// A fixed set of independent decode workers. Each worker owns a contiguous chunk of the task
/// list and processes it sequentially on a blocking thread, sending one `TaskReport` per task
/// through a bounded channel. Results of different workers interleave arbitrarily, the results
/// of a single worker arrive in task order.
pub struct WorkerPool {
    rx: mpsc::Receiver<WorkerMsg>,
    join_set: JoinSet<()>,
    ledger: Vec<WorkerSummary>,
    active: usize,
}

impl WorkerPool {
    /// Partitions `tasks` and starts one worker per non-empty chunk.
    ///
    /// # Arguments
    /// * `tasks` - The task list, in order.
    /// * `decoder` - The decoder every worker uses.
    /// * `config` - The pool's execution bounds.
    ///
    /// # Returns
    /// The running pool. Must be called from within a tokio runtime.
    pub fn spawn(tasks: Vec<Task>, decoder: Arc<dyn ImageDecoder>, config: &PoolConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_capacity());
        let ranges = chunk_ranges(tasks.len(), config.workers());
        let mut join_set = JoinSet::new();
        let mut ledger = Vec::with_capacity(ranges.len());
        let mut tasks = tasks.into_iter();

        for (worker_id, range) in ranges.into_iter().enumerate() {
            let chunk: Vec<Task> = tasks.by_ref().take(range.len()).collect();

            ledger.push(WorkerSummary {
                worker_id,
                assigned: chunk.len(),
                completed: 0,
                lost: 0,
                state: WorkerState::Running,
            });

            let tx = tx.clone();
            let decoder = Arc::clone(&decoder);
            join_set.spawn_blocking(move || run_worker(worker_id, chunk, decoder, tx));
        }

        let active = ledger.len();
        info!(workers = active; "decode pool started");

        Self {
            rx,
            join_set,
            ledger,
            active,
        }
    }

    /// Returns the amount of workers that are neither retired nor crashed.
    pub fn active(&self) -> usize {
        self.active
    }

    /// Waits for the next task report.
    ///
    /// # Returns
    /// The next report, or `None` once every worker is accounted for.
    pub async fn next(&mut self) -> Option<TaskReport> {
        loop {
            match self.rx.recv().await {
                Some(WorkerMsg::Report(report)) => {
                    self.record(&report);
                    return Some(report);
                }
                Some(WorkerMsg::Crashed { worker_id, detail }) => {
                    self.crash(worker_id, &detail);
                }
                None => {
                    self.settle();
                    return None;
                }
            }
        }
    }

    /// The join barrier: discards any report not yet consumed, waits for every worker thread
    /// to exit and returns the final accounting. It always returns, crashed workers included.
    pub async fn join(mut self) -> PoolSummary {
        let mut discarded = 0;
        while self.next().await.is_some() {
            discarded += 1;
        }

        if discarded > 0 {
            warn!(discarded = discarded; "reports discarded at join");
        }

        while let Some(res) = self.join_set.join_next().await {
            if let Err(e) = res {
                error!("worker thread failed: {e}");
            }
        }

        self.settle();

        PoolSummary {
            workers: self.ledger,
        }
    }

    fn record(&mut self, report: &TaskReport) {
        let Some(worker) = self.ledger.get_mut(report.worker_id) else {
            return;
        };

        worker.completed += 1;

        if worker.completed == worker.assigned {
            worker.state = WorkerState::Retired;
            self.active -= 1;

            debug!(
                worker_id = worker.worker_id,
                completed = worker.completed;
                "worker retired"
            );

            if self.active == 0 {
                info!("every decode worker is accounted for");
            }
        }
    }

    fn crash(&mut self, worker_id: usize, detail: &str) {
        let Some(worker) = self.ledger.get_mut(worker_id) else {
            return;
        };

        if worker.state != WorkerState::Running {
            return;
        }

        worker.lost = worker.assigned - worker.completed;
        worker.state = WorkerState::Crashed;
        self.active -= 1;

        error!(
            worker_id = worker_id,
            lost = worker.lost;
            "worker crashed: {detail}"
        );
    }

    /// Marks any worker that went away without a word as crashed.
    fn settle(&mut self) {
        let silent: Vec<_> = self
            .ledger
            .iter()
            .filter(|w| w.state == WorkerState::Running)
            .map(|w| w.worker_id)
            .collect();

        for worker_id in silent {
            self.crash(worker_id, "exited before reporting every task");
        }
    }
}

fn run_worker(
    worker_id: usize,
    tasks: Vec<Task>,
    decoder: Arc<dyn ImageDecoder>,
    tx: mpsc::Sender<WorkerMsg>,
) {
    debug!(worker_id = worker_id, tasks = tasks.len(); "worker started");

    let run = panic::catch_unwind(AssertUnwindSafe(|| {
        for task in tasks {
            let outcome = match decoder.decode(&task.path) {
                Ok(raw) => Outcome::Decoded(DecodedImage {
                    pixels: raw.pixels,
                    width: raw.width,
                    height: raw.height,
                    label: task.label,
                    path: task.path,
                }),
                Err(e) => Outcome::Failed {
                    path: task.path,
                    detail: e.to_string(),
                },
            };

            let msg = WorkerMsg::Report(TaskReport { worker_id, outcome });
            if tx.blocking_send(msg).is_err() {
                debug!(worker_id = worker_id; "coordinator gone, stopping");
                return;
            }
        }
    }));

    if let Err(panic) = run {
        let detail = panic_detail(panic);
        let _ = tx.blocking_send(WorkerMsg::Crashed { worker_id, detail });
    }
}

fn panic_detail(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        return s.to_string();
    }

    if let Some(s) = panic.downcast_ref::<String>() {
        return s.clone();
    }

    "unknown panic".to_string()
}
