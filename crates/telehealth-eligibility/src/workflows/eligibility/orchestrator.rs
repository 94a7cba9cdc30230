use super::domain::Postcode;
use super::report::{AnalysisReport, PartialAggregate};
use super::{resolver, risk};
use crate::config::AnalysisConfig;
use crate::workflows::clock::Clock;
use crate::workflows::reference::{ReferenceDataError, ReferenceSnapshot};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

/// Population submitted by a clinic. Entries are not de-duplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub clinic_name: String,
    pub postcodes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no postcodes were supplied")]
    Empty,
    #[error("{submitted} postcodes were supplied but the limit is {max}")]
    TooMany { submitted: usize, max: usize },
}

/// Terminal failure of an analysis run. No partial report accompanies any of these.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("reference data unavailable: {0}")]
    SnapshotUnavailable(#[from] ReferenceDataError),
    #[error("analysis was cancelled")]
    Cancelled,
    #[error("analysis exceeded its {}s time limit", .0.as_secs_f32())]
    TimedOut(Duration),
    #[error("analysis worker failed: {0}")]
    Worker(String),
}

impl From<JoinError> for AnalysisError {
    fn from(err: JoinError) -> Self {
        Self::Worker(err.to_string())
    }
}

/// Cooperative cancellation shared between a caller and a running analysis.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Cancels when the returned guard is dropped, e.g. when an HTTP client goes away.
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

#[derive(Debug)]
pub struct CancelOnDrop(CancellationHandle);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Emitted once per finished chunk when the caller asks for progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkCompleted {
    pub chunk_index: usize,
    pub postcodes: usize,
    pub completed_chunks: usize,
    pub total_chunks: usize,
}

/// Caller-side controls for one run.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    pub cancellation: CancellationHandle,
    pub progress: Option<mpsc::UnboundedSender<ChunkCompleted>>,
}

impl RunControl {
    pub fn with_progress(progress: mpsc::UnboundedSender<ChunkCompleted>) -> Self {
        Self {
            cancellation: CancellationHandle::new(),
            progress: Some(progress),
        }
    }
}

#[derive(Clone)]
struct StopSignal {
    caller: CancellationHandle,
    deadline: CancellationHandle,
}

impl StopSignal {
    fn is_set(&self) -> bool {
        self.caller.is_cancelled() || self.deadline.is_cancelled()
    }
}

/// Batch orchestrator: validates, partitions, fans out over a bounded pool and merges.
pub struct PopulationAnalyzer {
    config: AnalysisConfig,
    clock: Arc<dyn Clock>,
}

impl PopulationAnalyzer {
    pub fn new(config: AnalysisConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn validate(&self, request: &AnalysisRequest) -> Result<(), ValidationError> {
        let submitted = request.postcodes.len();
        if submitted == 0 {
            return Err(ValidationError::Empty);
        }
        if submitted > self.config.max_postcodes {
            return Err(ValidationError::TooMany {
                submitted,
                max: self.config.max_postcodes,
            });
        }
        Ok(())
    }

    pub async fn analyze(
        &self,
        request: AnalysisRequest,
        snapshot: Arc<ReferenceSnapshot>,
    ) -> Result<AnalysisReport, AnalysisError> {
        self.analyze_with(request, snapshot, RunControl::default())
            .await
    }

    /// Runs the analysis against the snapshot handle it is given for the whole run.
    pub async fn analyze_with(
        &self,
        request: AnalysisRequest,
        snapshot: Arc<ReferenceSnapshot>,
        control: RunControl,
    ) -> Result<AnalysisReport, AnalysisError> {
        self.validate(&request)?;

        let AnalysisRequest {
            clinic_name,
            postcodes,
        } = request;
        let total = postcodes.len();
        let analyzed_at = self.clock.now();
        let chunk_size = self.config.effective_chunk_size(total);
        let limit = self.config.effective_timeout(total);
        let started = Instant::now();

        info!(
            clinic = clinic_name.as_str(),
            postcodes = total,
            chunk_size,
            workers = self.config.worker_count,
            "population analysis started"
        );

        let stop = StopSignal {
            caller: control.cancellation.clone(),
            deadline: CancellationHandle::new(),
        };
        let run = self.run_chunks(
            Arc::new(postcodes),
            snapshot,
            analyzed_at.date_naive(),
            chunk_size,
            &control,
            &stop,
        );

        let merged = match tokio::time::timeout(limit, run).await {
            Ok(result) => result?,
            Err(_) => {
                stop.deadline.cancel();
                warn!(
                    clinic = clinic_name.as_str(),
                    postcodes = total,
                    limit_secs = limit.as_secs_f32(),
                    "population analysis timed out"
                );
                return Err(AnalysisError::TimedOut(limit));
            }
        };

        info!(
            clinic = clinic_name.as_str(),
            total = merged.total,
            eligible = merged.eligible,
            unresolved = merged.unresolved,
            malformed = merged.malformed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "population analysis finished"
        );

        Ok(merged.finish(clinic_name, analyzed_at))
    }

    async fn run_chunks(
        &self,
        postcodes: Arc<Vec<String>>,
        snapshot: Arc<ReferenceSnapshot>,
        today: NaiveDate,
        chunk_size: usize,
        control: &RunControl,
        stop: &StopSignal,
    ) -> Result<PartialAggregate, AnalysisError> {
        let total = postcodes.len();
        let total_chunks = total.div_ceil(chunk_size);
        let permits = Arc::new(Semaphore::new(self.config.worker_count.max(1)));
        let mut workers: JoinSet<(usize, Option<PartialAggregate>)> = JoinSet::new();
        let mut partials: Vec<Option<PartialAggregate>> = vec![None; total_chunks];
        let mut completed = 0;
        let mut next_chunk = 0;

        while !stop.is_set() {
            if next_chunk < total_chunks {
                tokio::select! {
                    permit = permits.clone().acquire_owned() => {
                        let permit = permit.map_err(|err| AnalysisError::Worker(err.to_string()))?;
                        let range = chunk_range(next_chunk, chunk_size, total);
                        let chunk_index = next_chunk;
                        let postcodes = postcodes.clone();
                        let snapshot = snapshot.clone();
                        let stop = stop.clone();
                        workers.spawn_blocking(move || {
                            let _permit = permit;
                            let partial = process_chunk(&postcodes[range], &snapshot, today, &stop);
                            (chunk_index, partial)
                        });
                        next_chunk += 1;
                    }
                    Some(joined) = workers.join_next(), if !workers.is_empty() => {
                        let joined = settle(joined, stop)?;
                        completed += absorb(joined, &mut partials, completed, chunk_size, total, control);
                    }
                }
            } else {
                match workers.join_next().await {
                    Some(joined) => {
                        let joined = settle(joined, stop)?;
                        completed += absorb(joined, &mut partials, completed, chunk_size, total, control);
                    }
                    None => break,
                }
            }
        }

        if stop.is_set() {
            // In-flight workers stop before their next postcode; their output is discarded.
            while workers.join_next().await.is_some() {}
            return Err(AnalysisError::Cancelled);
        }

        let mut merged = PartialAggregate::default();
        for partial in partials {
            match partial {
                Some(partial) => merged.merge(partial),
                None => return Err(AnalysisError::Cancelled),
            }
        }
        Ok(merged)
    }
}

fn chunk_range(index: usize, chunk_size: usize, total: usize) -> Range<usize> {
    let start = index * chunk_size;
    start..(start + chunk_size).min(total)
}

/// A failed worker stops the rest of the pool before the error is returned.
fn settle<T>(joined: Result<T, JoinError>, stop: &StopSignal) -> Result<T, AnalysisError> {
    joined.map_err(|err| {
        stop.deadline.cancel();
        AnalysisError::from(err)
    })
}

fn absorb(
    (chunk_index, partial): (usize, Option<PartialAggregate>),
    partials: &mut [Option<PartialAggregate>],
    completed: usize,
    chunk_size: usize,
    total: usize,
    control: &RunControl,
) -> usize {
    let Some(partial) = partial else {
        return 0;
    };

    debug!(chunk_index, postcodes = partial.total, "chunk analysed");
    partials[chunk_index] = Some(partial);

    if let Some(progress) = &control.progress {
        let event = ChunkCompleted {
            chunk_index,
            postcodes: chunk_range(chunk_index, chunk_size, total).len(),
            completed_chunks: completed + 1,
            total_chunks: partials.len(),
        };
        // A caller that stopped listening does not affect the run.
        let _ = progress.send(event);
    }
    1
}

fn process_chunk(
    postcodes: &[String],
    snapshot: &ReferenceSnapshot,
    today: NaiveDate,
    stop: &StopSignal,
) -> Option<PartialAggregate> {
    let mut partial = PartialAggregate::default();

    for raw in postcodes {
        if stop.is_set() {
            return None;
        }

        match Postcode::parse(raw) {
            Ok(postcode) => {
                let outcome = resolver::resolve(&postcode, snapshot, today);
                let bucket = risk::classify(&outcome, today);
                partial.record(&outcome, bucket);
            }
            Err(_) => partial.record_malformed(),
        }
    }

    Some(partial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ranges_cover_input_exactly_once() {
        let total: usize = 2_501;
        let size: usize = 1_000;
        let ranges: Vec<Range<usize>> = (0..total.div_ceil(size))
            .map(|idx| chunk_range(idx, size, total))
            .collect();
        assert_eq!(ranges, vec![0..1_000, 1_000..2_000, 2_000..2_501]);
    }

    #[test]
    fn cancellation_handles_share_state() {
        let handle = CancellationHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_cancelled());
        handle.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn failed_worker_stops_the_remaining_chunks() {
        let mut workers = JoinSet::new();
        workers.spawn(async { panic!("chunk worker panicked") });
        let joined: Result<(), JoinError> = workers.join_next().await.expect("one task");

        let stop = StopSignal {
            caller: CancellationHandle::new(),
            deadline: CancellationHandle::new(),
        };
        assert!(matches!(settle(joined, &stop), Err(AnalysisError::Worker(_))));
        assert!(stop.is_set());
        assert!(!stop.caller.is_cancelled(), "caller handle is left untouched");
    }

    #[test]
    fn successful_join_leaves_the_pool_running() {
        let stop = StopSignal {
            caller: CancellationHandle::new(),
            deadline: CancellationHandle::new(),
        };
        assert_eq!(settle(Ok::<_, JoinError>(3), &stop).expect("joined"), 3);
        assert!(!stop.is_set());
    }

    #[test]
    fn drop_guard_cancels_on_scope_exit() {
        let handle = CancellationHandle::new();
        {
            let _guard = handle.drop_guard();
            assert!(!handle.is_cancelled());
        }
        assert!(handle.is_cancelled());
    }
}
