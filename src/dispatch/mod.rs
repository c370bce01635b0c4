//! Hand-off between capture and reduction
//!
//! Capture pushes the ids it inserted through a [`Dispatcher`]; a pool of
//! [`ReductionWorkers`] pulls them off and runs one reduction per id. Ids may
//! arrive twice or out of order, which is harmless because reduction is
//! idempotent. Anything that never makes it through the queue is picked up
//! by [`SemanticReducer::process_unprocessed`], which [`CaptureLoop`] runs on
//! every tick.

use crate::capture::EventCapture;
use crate::error::{PipelineError, PipelineResult};
use crate::event::{SourceSystem, SourceType};
use crate::reducer::{BackfillReport, ReductionOutcome, SemanticReducer};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Accepts reduction jobs, one per raw event id.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, raw_event_id: i64) -> PipelineResult<()>;
}

/// Bounded in-process queue. Dispatch waits while the queue is full.
#[derive(Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::Sender<i64>,
}

impl ChannelDispatcher {
    /// Create a dispatcher and the receiving end to hand to [`ReductionWorkers::run`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<i64>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Dispatcher for ChannelDispatcher {
    async fn dispatch(&self, raw_event_id: i64) -> PipelineResult<()> {
        self.tx
            .send(raw_event_id)
            .await
            .map_err(|_| PipelineError::Dispatch(format!("reduction queue closed, dropped raw event {}", raw_event_id)))
    }
}

/// Tally of everything a worker pool reduced before its queue closed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub created: usize,
    pub already_existed: usize,
    pub skipped: usize,
    pub failed: Vec<(i64, String)>,
}

impl WorkerReport {
    pub fn total(&self) -> usize {
        self.created + self.already_existed + self.skipped + self.failed.len()
    }

    fn record(&mut self, raw_event_id: i64, result: PipelineResult<ReductionOutcome>) {
        match result {
            Ok(ReductionOutcome::Created { .. }) => self.created += 1,
            Ok(ReductionOutcome::AlreadyExists { .. }) => self.already_existed += 1,
            Ok(ReductionOutcome::Skipped { .. }) => self.skipped += 1,
            Err(e) => self.failed.push((raw_event_id, e.to_string())),
        }
    }

    fn merge(&mut self, other: WorkerReport) {
        self.created += other.created;
        self.already_existed += other.already_existed;
        self.skipped += other.skipped;
        self.failed.extend(other.failed);
    }
}

/// N workers draining a dispatch queue.
pub struct ReductionWorkers {
    reducer: Arc<SemanticReducer>,
    workers: usize,
}

impl ReductionWorkers {
    pub fn new(reducer: Arc<SemanticReducer>, workers: usize) -> Self {
        Self {
            reducer,
            workers: workers.max(1),
        }
    }

    /// Run until every sender for `rx` is dropped and the queue is empty.
    ///
    /// Each reduction runs on the blocking pool since storage access is
    /// synchronous. Failed reductions are logged and counted; the raw event
    /// stays unprocessed for the next backfill.
    pub async fn run(self, rx: mpsc::Receiver<i64>) -> WorkerReport {
        let rx = Arc::new(Mutex::new(rx));
        let mut workers = JoinSet::new();

        for worker in 0..self.workers {
            let rx = rx.clone();
            let reducer = self.reducer.clone();
            workers.spawn(async move {
                let mut report = WorkerReport::default();
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(raw_event_id) = next else { break };

                    let reducer = reducer.clone();
                    let result = tokio::task::spawn_blocking(move || reducer.process_event(raw_event_id))
                        .await
                        .unwrap_or_else(|e| Err(PipelineError::Worker(e.to_string())));

                    if let Err(e) = &result {
                        warn!(worker, raw_event_id, "reduction failed, left for backfill: {}", e);
                    }
                    report.record(raw_event_id, result);
                }
                debug!(worker, handled = report.total(), "reduction worker stopped");
                report
            });
        }

        let mut report = WorkerReport::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(worker_report) => report.merge(worker_report),
                Err(e) => error!("reduction worker aborted: {}", e),
            }
        }

        info!(
            created = report.created,
            already_existed = report.already_existed,
            skipped = report.skipped,
            failed = report.failed.len(),
            "reduction workers drained"
        );
        report
    }
}

/// What one [`CaptureLoop::tick`] did. `None` marks a stage that failed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub backfill: Option<BackfillReport>,
    pub captured: Option<usize>,
}

/// One step of the long-running loop: a backfill pass, then a capture cycle
/// whose new ids go to the dispatcher.
///
/// The backfill comes first so it sweeps up what earlier ticks left behind
/// (failed reductions, dropped dispatches) rather than racing the workers
/// for the ids this tick is about to enqueue.
pub struct CaptureLoop {
    capture: EventCapture,
    reducer: Arc<SemanticReducer>,
    source: (SourceType, SourceSystem),
    backfill_limit: usize,
}

impl CaptureLoop {
    pub fn new(
        capture: EventCapture,
        reducer: Arc<SemanticReducer>,
        source_type: SourceType,
        source_system: SourceSystem,
        backfill_limit: usize,
    ) -> Self {
        Self {
            capture,
            reducer,
            source: (source_type, source_system),
            backfill_limit,
        }
    }

    /// Run one tick. Neither stage's failure stops the other; both are
    /// logged and retried on the next tick.
    pub async fn tick(&self, dispatcher: &dyn Dispatcher) -> TickReport {
        let reducer = self.reducer.clone();
        let limit = self.backfill_limit;
        let backfill = tokio::task::spawn_blocking(move || reducer.process_unprocessed(limit))
            .await
            .unwrap_or_else(|e| Err(PipelineError::Worker(e.to_string())));

        let backfill = match backfill {
            Ok(report) => {
                if !report.is_clean() {
                    warn!(failed = report.failed.len(), "backfill left raw events unprocessed");
                }
                Some(report)
            }
            Err(e) => {
                error!("backfill pass failed: {}", e);
                None
            }
        };

        let (source_type, source_system) = self.source;
        let captured = match self.capture.capture_and_dispatch(source_type, source_system, dispatcher).await {
            Ok(inserted) => Some(inserted.len()),
            Err(e) => {
                error!(%source_type, %source_system, "capture cycle failed: {}", e);
                None
            }
        };

        TickReport { backfill, captured }
    }
}
