use crate::backend::{transport, BackendError, JsonTransport};
use crate::message::Message;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Where a user's messages come from.
#[async_trait]
pub trait InboxSource: Send + Sync {
    async fn get_messages(&self, user_id: &str) -> Result<Vec<Message>>;

    async fn get_message(&self, user_id: &str, sms_id: &str) -> Result<Option<Message>>;
}

/// Client for the user-data API (`/sms/{user_id}`).
pub struct InboxClient {
    base: Url,
    transport: Arc<dyn JsonTransport>,
}

impl InboxClient {
    pub fn new(base: Url, transport: Arc<dyn JsonTransport>) -> Self {
        Self { base, transport }
    }
}

#[async_trait]
impl InboxSource for InboxClient {
    async fn get_messages(&self, user_id: &str) -> Result<Vec<Message>> {
        let url = transport::endpoint(&self.base, &["sms", user_id])?;
        let body = self
            .transport
            .get_json(&url)
            .await
            .with_context(|| format!("Failed to fetch inbox of {user_id}"))?;

        let messages: Vec<Message> = serde_json::from_value(body)
            .with_context(|| format!("Unexpected inbox payload for {user_id}"))?;
        log::info!("Fetched {} messages for {}", messages.len(), user_id);
        Ok(messages)
    }

    async fn get_message(&self, user_id: &str, sms_id: &str) -> Result<Option<Message>> {
        let url = transport::endpoint(&self.base, &["sms", user_id, sms_id])?;
        match self.transport.get_json(&url).await {
            Ok(body) => {
                let message = serde_json::from_value(body)
                    .with_context(|| format!("Unexpected payload for SMS {sms_id}"))?;
                Ok(Some(message))
            }
            Err(BackendError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to fetch SMS {sms_id}")),
        }
    }
}
