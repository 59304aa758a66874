//! Inbox list glue: one controller per listed message.

use crate::backend::PredictionBackend;
use crate::controller::ClassificationController;
use crate::inbox::InboxSource;
use crate::message::Message;
use crate::status::{ClassificationStatus, StatusPresenter};
use anyhow::Result;
use std::sync::Arc;

pub struct InboxEntry {
    pub message: Message,
    pub controller: ClassificationController,
}

pub struct InboxView {
    user_id: String,
    source: Arc<dyn InboxSource>,
    backend: Arc<dyn PredictionBackend>,
    presenter: StatusPresenter,
    entries: Vec<InboxEntry>,
}

impl InboxView {
    pub fn new(
        user_id: impl Into<String>,
        source: Arc<dyn InboxSource>,
        backend: Arc<dyn PredictionBackend>,
        presenter: StatusPresenter,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            source,
            backend,
            presenter,
            entries: Vec::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Re-fetch the inbox. Every message gets a fresh controller, so all
    /// statuses start over at `Unknown`. On failure the current list is kept.
    pub async fn refresh(&mut self) -> Result<usize> {
        let messages = self.source.get_messages(&self.user_id).await?;
        self.entries = messages
            .into_iter()
            .map(|message| {
                let controller = ClassificationController::new(&message, self.backend.clone());
                InboxEntry {
                    message,
                    controller,
                }
            })
            .collect();
        Ok(self.entries.len())
    }

    pub fn entries(&self) -> &[InboxEntry] {
        &self.entries
    }

    pub fn entry(&self, sms_id: &str) -> Option<&InboxEntry> {
        self.entries.iter().find(|e| e.controller.message_id() == sms_id)
    }

    /// Classify one listed message inline.
    pub async fn classify(&self, sms_id: &str) -> Option<ClassificationStatus> {
        let entry = self.entry(sms_id)?;
        Some(entry.controller.classify().await)
    }

    /// Trigger every message that has not been classified yet and wait for
    /// all of them. Requests run concurrently.
    pub async fn classify_all(&self) -> Vec<ClassificationStatus> {
        let handles: Vec<_> = self
            .entries
            .iter()
            .filter_map(|e| e.controller.trigger())
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                log::warn!("Classification task failed: {}", e);
            }
        }

        self.entries.iter().map(|e| e.controller.status()).collect()
    }

    pub fn render_entry(&self, entry: &InboxEntry) -> String {
        format!(
            "{} [{}, {}] {}",
            self.presenter.icon(entry.controller.status()),
            entry.message.display_date(),
            entry.message.sender,
            entry.message.text
        )
    }

    pub fn render_lines(&self) -> Vec<String> {
        if self.entries.is_empty() {
            return vec!["Your inbox is empty :|".to_string()];
        }
        self.entries.iter().map(|e| self.render_entry(e)).collect()
    }
}
