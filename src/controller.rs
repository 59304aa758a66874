//! Per-message classification state machine.
//!
//! Each controller owns the status of exactly one message. `trigger` is only
//! honoured while the status is `Unknown`, so a message never has more than
//! one request chain in flight.

use crate::backend::{BackendError, Label, PredictionBackend, PredictionRequest};
use crate::message::Message;
use crate::status::ClassificationStatus;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct ClassificationController {
    request: PredictionRequest,
    backend: Arc<dyn PredictionBackend>,
    status: Arc<watch::Sender<ClassificationStatus>>,
}

impl ClassificationController {
    pub fn new(message: &Message, backend: Arc<dyn PredictionBackend>) -> Self {
        Self::for_request(PredictionRequest::from_message(message), backend)
    }

    pub fn for_request(request: PredictionRequest, backend: Arc<dyn PredictionBackend>) -> Self {
        let (status, _) = watch::channel(ClassificationStatus::Unknown);
        Self {
            request,
            backend,
            status: Arc::new(status),
        }
    }

    pub fn message_id(&self) -> &str {
        &self.request.message_id
    }

    pub fn status(&self) -> ClassificationStatus {
        *self.status.borrow()
    }

    /// Receiver that sees every status change, for re-rendering.
    pub fn subscribe(&self) -> watch::Receiver<ClassificationStatus> {
        self.status.subscribe()
    }

    /// Start classification in the background.
    ///
    /// The status is `Pending` when this returns. Returns `None` when a
    /// request was already issued, or when no tokio runtime is available to
    /// run it (the status then stays `Unknown`). The task resolves to the
    /// final status, or `None` if the controller was dropped before the
    /// backend answered.
    pub fn trigger(&self) -> Option<JoinHandle<Option<ClassificationStatus>>> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                log::warn!(
                    "Cannot classify SMS {} outside a runtime: {}",
                    self.request.message_id,
                    e
                );
                return None;
            }
        };
        if !self.begin() {
            return None;
        }

        let backend = Arc::clone(&self.backend);
        let request = self.request.clone();
        let status: Weak<watch::Sender<ClassificationStatus>> = Arc::downgrade(&self.status);

        Some(runtime.spawn(async move {
            let outcome = backend.classify(&request).await;
            match status.upgrade() {
                Some(status) => Some(settle(&status, &request, outcome)),
                None => {
                    log::debug!(
                        "SMS {} was discarded before its prediction arrived",
                        request.message_id
                    );
                    None
                }
            }
        }))
    }

    /// Classify inline and return the resulting status. When a request was
    /// already issued this only reports the current status.
    pub async fn classify(&self) -> ClassificationStatus {
        if !self.begin() {
            return self.status();
        }
        let outcome = self.backend.classify(&self.request).await;
        settle(&self.status, &self.request, outcome)
    }

    fn begin(&self) -> bool {
        let started = self.status.send_if_modified(|status| {
            if *status == ClassificationStatus::Unknown {
                *status = ClassificationStatus::Pending;
                true
            } else {
                false
            }
        });

        if started {
            log::debug!("SMS {}: unknown -> pending", self.request.message_id);
        } else {
            log::debug!(
                "SMS {}: ignoring trigger while {}",
                self.request.message_id,
                self.status()
            );
        }
        started
    }
}

fn settle(
    status: &watch::Sender<ClassificationStatus>,
    request: &PredictionRequest,
    outcome: Result<Label, BackendError>,
) -> ClassificationStatus {
    let next = ClassificationStatus::from_outcome(&outcome);
    match &outcome {
        Ok(label) => log::debug!(
            "SMS {}: pending -> {} (label '{}')",
            request.message_id,
            next,
            label
        ),
        Err(e) => log::warn!("Classification of SMS {} failed: {}", request.message_id, e),
    }
    status.send_replace(next);
    next
}
