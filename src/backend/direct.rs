use super::{
    top_label, BackendError, BackendMode, JsonTransport, Label, ModelServing, PredictionBackend,
    PredictionRequest,
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct TextInput<'a> {
    text: &'a str,
}

/// Text goes straight to `text_to_prediction`.
pub struct DirectBackend {
    model: ModelServing,
    transport: Arc<dyn JsonTransport>,
}

impl DirectBackend {
    pub fn new(model: ModelServing, transport: Arc<dyn JsonTransport>) -> Self {
        Self { model, transport }
    }
}

#[async_trait]
impl PredictionBackend for DirectBackend {
    async fn classify(&self, request: &PredictionRequest) -> Result<Label, BackendError> {
        let url = self.model.text_to_prediction()?;
        let payload = serde_json::to_value(TextInput {
            text: &request.text,
        })
        .map_err(|e| BackendError::Protocol(e.to_string()))?;

        log::debug!(
            "Requesting text prediction for SMS {} from model {}",
            request.message_id,
            self.model.model_version()
        );
        let body = self.transport.post_json(&url, &payload).await?;
        top_label(body)
    }

    fn mode(&self) -> BackendMode {
        BackendMode::Direct
    }
}
