//! Messages exchanged during a batch run.

use crate::domain::PredictionResult;
use std::fmt;
use std::path::PathBuf;

/// Lifecycle state of a [`BatchCoordinator`](super::BatchCoordinator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Preparing,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl BatchState {
    /// True while a run is being prepared or executed.
    pub fn is_active(self) -> bool {
        matches!(self, BatchState::Preparing | BatchState::Running)
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchState::Idle => "idle",
            BatchState::Preparing => "preparing",
            BatchState::Running => "running",
            BatchState::Completed => "completed",
            BatchState::Stopped => "stopped",
            BatchState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Event emitted to the consumer of a batch run.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// A worker picked up an image. `current` counts pickups in arrival order.
    Progress {
        current: usize,
        total: usize,
        path: PathBuf,
    },
    /// One image finished, successfully or not.
    Result(Box<PredictionResult>),
    /// Every worker exited after draining the queue.
    Completed(Vec<PredictionResult>),
    /// Every worker exited after a stop request; holds the results produced so far.
    Stopped(Vec<PredictionResult>),
    /// The run could not start or the coordination failed.
    Error(String),
}

impl BatchEvent {
    /// True for the events that end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchEvent::Completed(_) | BatchEvent::Stopped(_) | BatchEvent::Error(_)
        )
    }
}

/// Message sent by a worker to the coordination thread.
#[derive(Debug)]
pub enum WorkerMessage {
    /// The worker dequeued `path` and is about to process it.
    Started { worker: usize, path: PathBuf },
    /// The worker finished an image.
    Finished {
        worker: usize,
        result: Box<PredictionResult>,
    },
    /// The worker left its loop.
    Exited { worker: usize },
}
