//! Batch validation over a dataset directory.
//!
//! [`BatchCoordinator::start`] loads the model, enumerates the dataset,
//! fills a fresh [`TaskQueue`] and starts the workers plus one coordination
//! thread. The coordination thread turns worker messages into
//! [`BatchEvent`]s, aggregates results, and emits `Completed` or `Stopped`
//! once the last worker has exited.

use super::events::{BatchEvent, BatchState, WorkerMessage};
use super::stats::{BatchStats, StatsManager};
use super::task_queue::TaskQueue;
use super::worker::Worker;
use crate::core::{BatchConfig, ConfigValidator, DefectError, ProcessingStage};
use crate::domain::PredictionResult;
use crate::models::ClassifierModel;
use crate::predictor::DefectDetector;
use crate::utils::enumerate_images;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug)]
struct Shared {
    state: Mutex<BatchState>,
    queue: Mutex<Option<Arc<TaskQueue>>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: BatchState) {
        *self.state() = state;
    }

    fn queue(&self) -> MutexGuard<'_, Option<Arc<TaskQueue>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs the detection pipeline over whole datasets with a pool of workers.
#[derive(Debug)]
pub struct BatchCoordinator {
    config: BatchConfig,
    model: Arc<ClassifierModel>,
    shared: Arc<Shared>,
}

impl BatchCoordinator {
    /// Creates an idle coordinator that loads models into `model`.
    pub fn new(model: Arc<ClassifierModel>) -> Self {
        Self::with_config(model, BatchConfig::default())
    }

    /// Creates an idle coordinator with a custom configuration.
    pub fn with_config(model: Arc<ClassifierModel>, config: BatchConfig) -> Self {
        Self {
            config,
            model,
            shared: Arc::new(Shared {
                state: Mutex::new(BatchState::Idle),
                queue: Mutex::new(None),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BatchState {
        *self.shared.state()
    }

    /// The model handle shared with the workers.
    pub fn model(&self) -> &Arc<ClassifierModel> {
        &self.model
    }

    /// The run configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Starts a batch run over `dataset_dir` with the model at `model_path`.
    ///
    /// # Errors
    ///
    /// * `DefectError::BatchInProgress` if a run is preparing or running.
    /// * `DefectError::ConfigError` if the configuration is invalid.
    /// * `DefectError::ModelLoad` if the model cannot be loaded.
    /// * `DefectError::EmptyDataset` / `DatasetStructure` if there is nothing to process.
    ///
    /// No worker is started when an error is returned.
    pub fn start(
        &self,
        dataset_dir: impl AsRef<Path>,
        model_path: impl AsRef<Path>,
    ) -> Result<BatchRun, DefectError> {
        {
            let mut state = self.shared.state();
            if state.is_active() {
                warn!("Batch start rejected: a run is already {}", *state);
                return Err(DefectError::BatchInProgress);
            }
            *state = BatchState::Preparing;
        }

        match self.prepare_and_launch(dataset_dir.as_ref(), model_path.as_ref()) {
            Ok(run) => Ok(run),
            Err(e) => {
                error!("Batch run failed to start: {}", e);
                self.shared.set_state(BatchState::Failed);
                Err(e)
            }
        }
    }

    /// Requests cancellation of the active run, if any.
    pub fn stop(&self) {
        if let Some(queue) = self.shared.queue().as_ref() {
            info!("Stop requested for the active batch run");
            queue.set_stop_request();
        }
    }

    fn prepare_and_launch(
        &self,
        dataset_dir: &Path,
        model_path: &Path,
    ) -> Result<BatchRun, DefectError> {
        self.config.validate()?;

        info!("Loading model {}", model_path.display());
        self.model.load(model_path)?;

        let images = enumerate_images(dataset_dir, &self.config)?;
        let total = images.len();
        info!(
            "Starting batch validation of {} images from {}",
            total,
            dataset_dir.display()
        );

        let queue = Arc::new(TaskQueue::new());
        for path in images {
            queue.enqueue(path);
        }
        queue.set_finished();

        // Published before any worker runs so `stop` reaches every dequeue.
        *self.shared.queue() = Some(Arc::clone(&queue));

        let worker_count = self.config.effective_worker_count().clamp(1, total);
        let (worker_tx, worker_rx) = mpsc::channel();
        let workers = match self.spawn_workers(worker_count, &queue, worker_tx) {
            Ok(workers) => workers,
            Err(e) => {
                self.shared.queue().take();
                return Err(e);
            }
        };

        let (event_tx, event_rx) = mpsc::channel();
        let results = Arc::new(Mutex::new(Vec::with_capacity(total)));
        let stats = Arc::new(StatsManager::new());
        self.shared.set_state(BatchState::Running);

        let aggregator = Aggregator {
            shared: Arc::clone(&self.shared),
            queue: Arc::clone(&queue),
            results: Arc::clone(&results),
            stats: Arc::clone(&stats),
            events: event_tx,
            total,
            live_workers: worker_count,
            started: Instant::now(),
        };
        let coordination = thread::Builder::new()
            .name("batch-coordinator".to_string())
            .spawn(move || aggregator.run(worker_rx, workers));

        let coordination = match coordination {
            Ok(handle) => handle,
            Err(e) => {
                queue.set_stop_request();
                self.shared.queue().take();
                return Err(DefectError::stage_failure(
                    ProcessingStage::BatchProcessing,
                    format!("cannot spawn coordination thread: {}", e),
                ));
            }
        };

        Ok(BatchRun {
            events: event_rx,
            queue,
            results,
            stats,
            shared: Arc::clone(&self.shared),
            total,
            coordination,
        })
    }

    fn spawn_workers(
        &self,
        count: usize,
        queue: &Arc<TaskQueue>,
        messages: Sender<WorkerMessage>,
    ) -> Result<Vec<JoinHandle<()>>, DefectError> {
        let detector = DefectDetector::new(Arc::clone(&self.model))
            .with_parallel_threshold(self.config.parallel_threshold);
        let mut handles = Vec::with_capacity(count);

        for id in 0..count {
            let worker = Worker::new(id, Arc::clone(queue), detector.clone(), messages.clone());
            let spawned = thread::Builder::new()
                .name(format!("batch-worker-{}", id))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    queue.set_stop_request();
                    drop(messages);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(DefectError::stage_failure(
                        ProcessingStage::BatchProcessing,
                        format!("cannot spawn worker {}: {}", id, e),
                    ));
                }
            }
        }
        Ok(handles)
    }
}

/// State owned by the coordination thread.
struct Aggregator {
    shared: Arc<Shared>,
    queue: Arc<TaskQueue>,
    results: Arc<Mutex<Vec<PredictionResult>>>,
    stats: Arc<StatsManager>,
    events: Sender<BatchEvent>,
    total: usize,
    live_workers: usize,
    started: Instant,
}

impl Aggregator {
    fn run(mut self, messages: Receiver<WorkerMessage>, workers: Vec<JoinHandle<()>>) {
        let mut progress = 0usize;
        let mut lost_workers = false;

        while self.live_workers > 0 {
            let Ok(message) = messages.recv() else {
                warn!(
                    "Worker channel closed with {} workers unaccounted for",
                    self.live_workers
                );
                lost_workers = true;
                break;
            };
            match message {
                WorkerMessage::Started { path, .. } => {
                    progress += 1;
                    self.emit(BatchEvent::Progress {
                        current: progress,
                        total: self.total,
                        path,
                    });
                }
                WorkerMessage::Finished { result, .. } => {
                    self.stats.record(&result);
                    self.results
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((*result).clone());
                    self.emit(BatchEvent::Result(result));
                }
                WorkerMessage::Exited { worker } => {
                    self.live_workers -= 1;
                    debug!(
                        "Worker {} exited, {} still running",
                        worker,
                        self.live_workers
                    );
                }
            }
        }

        for handle in workers {
            if handle.join().is_err() {
                error!("A batch worker thread panicked");
            }
        }

        let results = self
            .results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let final_state = final_state(
            lost_workers,
            self.queue.is_stop_requested(),
            results.len(),
            self.total,
        );
        let stopped = final_state == BatchState::Stopped;
        let stats = self.stats.get_stats();
        info!(
            "Batch validation {} after {:.2} s: {} of {} images processed, {} failed, accuracy {:.2}%",
            if stopped { "stopped" } else { "completed" },
            self.started.elapsed().as_secs_f64(),
            stats.total_processed,
            self.total,
            stats.failed,
            stats.accuracy()
        );

        self.shared.queue().take();
        self.shared.set_state(final_state);
        match final_state {
            BatchState::Failed => self.emit(BatchEvent::Error(format!(
                "{} workers exited without reporting",
                self.live_workers
            ))),
            BatchState::Stopped => self.emit(BatchEvent::Stopped(results)),
            _ => self.emit(BatchEvent::Completed(results)),
        }
    }

    fn emit(&self, event: BatchEvent) {
        // Nobody listening is fine: results are also kept in `results`.
        let _ = self.events.send(event);
    }
}

/// Terminal state of a run once every worker is gone.
///
/// A stop request only counts when it left images unprocessed.
fn final_state(
    lost_workers: bool,
    stop_requested: bool,
    processed: usize,
    total: usize,
) -> BatchState {
    if lost_workers {
        BatchState::Failed
    } else if stop_requested && processed < total {
        BatchState::Stopped
    } else {
        BatchState::Completed
    }
}

/// Final state and results of a finished run.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub state: BatchState,
    pub results: Vec<PredictionResult>,
    pub stats: BatchStats,
}

/// Handle to a running batch.
#[derive(Debug)]
pub struct BatchRun {
    events: Receiver<BatchEvent>,
    queue: Arc<TaskQueue>,
    results: Arc<Mutex<Vec<PredictionResult>>>,
    stats: Arc<StatsManager>,
    shared: Arc<Shared>,
    total: usize,
    coordination: JoinHandle<()>,
}

impl BatchRun {
    /// Receiver of the run's events, in emission order.
    pub fn events(&self) -> &Receiver<BatchEvent> {
        &self.events
    }

    /// Waits up to `timeout` for the next event.
    pub fn next_event(&self, timeout: Duration) -> Option<BatchEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Number of images in the run.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Requests cancellation; workers finish their current image and exit.
    pub fn stop(&self) {
        info!("Stop requested for batch run of {} images", self.total);
        self.queue.set_stop_request();
    }

    /// Snapshot of the statistics so far.
    pub fn stats(&self) -> BatchStats {
        self.stats.get_stats()
    }

    /// Snapshot of the results so far.
    pub fn results(&self) -> Vec<PredictionResult> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True once the coordination thread has finished.
    pub fn is_finished(&self) -> bool {
        self.coordination.is_finished()
    }

    /// Blocks until every worker has exited and returns the outcome.
    ///
    /// Events not yet received stay in [`events`](Self::events) until the
    /// handle is dropped.
    pub fn wait(self) -> BatchOutcome {
        if self.coordination.join().is_err() {
            error!("Batch coordination thread panicked");
            self.shared.set_state(BatchState::Failed);
            self.shared.queue().take();
        }
        BatchOutcome {
            state: *self.shared.state(),
            results: self
                .results
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            stats: self.stats.get_stats(),
        }
    }
}
