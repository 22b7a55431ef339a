//! Worker loop of the batch engine.

use super::events::WorkerMessage;
use super::task_queue::TaskQueue;
use crate::domain::{FailureKind, PredictionResult};
use crate::predictor::DefectDetector;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use tracing::{debug, error};

/// Pulls paths from a shared queue and classifies them one at a time.
#[derive(Debug)]
pub struct Worker {
    id: usize,
    queue: Arc<TaskQueue>,
    detector: DefectDetector,
    messages: Sender<WorkerMessage>,
}

impl Worker {
    pub fn new(
        id: usize,
        queue: Arc<TaskQueue>,
        detector: DefectDetector,
        messages: Sender<WorkerMessage>,
    ) -> Self {
        Self {
            id,
            queue,
            detector,
            messages,
        }
    }

    /// Runs until the queue is drained or stopped.
    ///
    /// A failing image never ends the loop; an in-flight image always
    /// finishes before a stop takes effect.
    pub fn run(self) {
        debug!("Worker {} started", self.id);
        let mut processed = 0usize;

        loop {
            let Some(path) = self.queue.dequeue() else {
                if self.queue.is_finished() || self.queue.is_stop_requested() {
                    break;
                }
                continue;
            };

            self.send(WorkerMessage::Started {
                worker: self.id,
                path: path.clone(),
            });
            let result = self.process(&path);
            processed += 1;
            self.send(WorkerMessage::Finished {
                worker: self.id,
                result: Box::new(result),
            });
        }

        debug!("Worker {} exiting after {} images", self.id, processed);
        self.send(WorkerMessage::Exited { worker: self.id });
    }

    fn process(&self, path: &Path) -> PredictionResult {
        match panic::catch_unwind(AssertUnwindSafe(|| self.detector.detect_path(path))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    "Worker {} panicked on {}: {}",
                    self.id,
                    path.display(),
                    message
                );
                let mut result = PredictionResult::new(path);
                result.mark_failed(
                    FailureKind::PipelineRuntime,
                    format!("pipeline panicked: {}", message),
                );
                result
            }
        }
    }

    fn send(&self, message: WorkerMessage) {
        // The receiver only goes away if the coordination thread died; the
        // queue is then drained without anyone listening.
        if self.messages.send(message).is_err() {
            debug!("Worker {}: coordinator is gone", self.id);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassifierModel;
    use std::sync::mpsc;

    #[test]
    fn worker_reports_every_item_then_exits() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(TaskQueue::new());
        for i in 0..3 {
            let path = dir.path().join(format!("missing_{i}.bmp"));
            queue.enqueue(path);
        }
        queue.set_finished();

        let (tx, rx) = mpsc::channel();
        let detector = DefectDetector::new(Arc::new(ClassifierModel::new()));
        Worker::new(7, Arc::clone(&queue), detector, tx).run();

        let messages: Vec<_> = rx.iter().collect();
        assert_eq!(messages.len(), 7);
        let failures = messages
            .iter()
            .filter(|m| {
                matches!(m, WorkerMessage::Finished { result, .. }
                    if result.failure == Some(FailureKind::ImageLoad))
            })
            .count();
        assert_eq!(failures, 3);
        assert!(matches!(
            messages.last(),
            Some(WorkerMessage::Exited { worker: 7 })
        ));
    }

    #[test]
    fn stopped_queue_ends_worker_immediately() {
        let queue = Arc::new(TaskQueue::new());
        queue.enqueue("never.bmp");
        queue.set_stop_request();

        let (tx, rx) = mpsc::channel();
        let detector = DefectDetector::new(Arc::new(ClassifierModel::new()));
        Worker::new(0, queue, detector, tx).run();

        let messages: Vec<_> = rx.iter().collect();
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], WorkerMessage::Exited { worker: 0 }));
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
