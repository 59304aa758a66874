//! Two-hop prediction through the feature store.
//!
//! The online store is asked for the feature vector stored under the message
//! id, then that vector is sent to `features_to_prediction`. The message text
//! is never used.

use super::{
    top_label, transport, BackendError, BackendMode, JsonTransport, Label, ModelServing,
    PredictionBackend, PredictionRequest,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

pub const DEFAULT_FEATURE_SERVICE: &str = "labeled_sms_2";

const FEATURE_VECTOR_NAME: &str = "features";

#[derive(Debug, Serialize)]
struct OnlineFeaturesRequest<'a> {
    feature_service: &'a str,
    entities: Entities<'a>,
}

#[derive(Debug, Serialize)]
struct Entities<'a> {
    sms_id: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct OnlineFeaturesResponse {
    metadata: FeatureMetadata,
    #[serde(default)]
    results: Vec<FeatureResult>,
}

#[derive(Debug, Deserialize)]
struct FeatureMetadata {
    #[serde(default)]
    feature_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FeatureResult {
    #[serde(default)]
    values: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct FeatureInput<'a> {
    features: &'a [f64],
}

pub struct FeatureStoreBackend {
    feature_server: Url,
    feature_service: String,
    model: ModelServing,
    transport: Arc<dyn JsonTransport>,
}

impl FeatureStoreBackend {
    pub fn new(
        feature_server: Url,
        feature_service: impl Into<String>,
        model: ModelServing,
        transport: Arc<dyn JsonTransport>,
    ) -> Self {
        Self {
            feature_server,
            feature_service: feature_service.into(),
            model,
            transport,
        }
    }

    async fn fetch_features(&self, message_id: &str) -> Result<Vec<f64>, BackendError> {
        let url = transport::endpoint(&self.feature_server, &["get-online-features"])?;
        let payload = serde_json::to_value(OnlineFeaturesRequest {
            feature_service: &self.feature_service,
            entities: Entities {
                sms_id: [message_id],
            },
        })
        .map_err(|e| BackendError::Protocol(e.to_string()))?;

        log::debug!(
            "Fetching online features '{}' for SMS {}",
            self.feature_service,
            message_id
        );
        let body = self.transport.post_json(&url, &payload).await?;
        extract_feature_vector(body)
    }
}

/// Locate `"features"` in the metadata names and read the value of the
/// single requested entity from the parallel results list.
fn extract_feature_vector(body: Value) -> Result<Vec<f64>, BackendError> {
    let response: OnlineFeaturesResponse = serde_json::from_value(body)
        .map_err(|e| BackendError::Protocol(format!("online features body: {e}")))?;

    let index = response
        .metadata
        .feature_names
        .iter()
        .position(|name| name == FEATURE_VECTOR_NAME)
        .ok_or_else(|| {
            BackendError::Protocol(format!(
                "no '{FEATURE_VECTOR_NAME}' among feature names {:?}",
                response.metadata.feature_names
            ))
        })?;

    let value = response
        .results
        .into_iter()
        .nth(index)
        .and_then(|result| result.values.into_iter().next())
        .ok_or_else(|| {
            BackendError::Protocol(format!("no values at feature position {index}"))
        })?;

    // A missing entity comes back as null
    serde_json::from_value(value)
        .map_err(|e| BackendError::Protocol(format!("feature vector: {e}")))
}

#[async_trait]
impl PredictionBackend for FeatureStoreBackend {
    async fn classify(&self, request: &PredictionRequest) -> Result<Label, BackendError> {
        if request.message_id.is_empty() {
            return Err(BackendError::Protocol(
                "feature lookup needs a message id".to_string(),
            ));
        }

        let features = self.fetch_features(&request.message_id).await?;

        let url = self.model.features_to_prediction()?;
        let payload = serde_json::to_value(FeatureInput {
            features: &features,
        })
        .map_err(|e| BackendError::Protocol(e.to_string()))?;

        log::debug!(
            "Requesting feature prediction for SMS {} ({} features) from model {}",
            request.message_id,
            features.len(),
            self.model.model_version()
        );
        let body = self.transport.post_json(&url, &payload).await?;
        top_label(body)
    }

    fn mode(&self) -> BackendMode {
        BackendMode::FeatureStoreMediated
    }
}
