//! Prediction backends
//!
//! A backend turns one message into a label by talking to the model-serving
//! API, either directly from the text or through the feature store.

pub mod direct;
pub mod feature_store;
pub mod transport;

#[cfg(test)]
pub mod mock;

use crate::config::Config;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

pub use direct::DirectBackend;
pub use feature_store::FeatureStoreBackend;
pub use transport::{HttpTransport, JsonTransport};

/// Failure of a prediction request chain.
///
/// `Transport` and `Status` are transport failures, `Protocol` covers
/// responses that arrived but could not be used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("unusable response: {0}")]
    Protocol(String),
}

impl BackendError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Status { .. })
    }
}

/// Label returned by the model server. Only `"ham"` is special.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label(String);

impl Label {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_ham(&self) -> bool {
        self.0 == "ham"
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
    pub message_id: String,
    pub text: String,
}

impl PredictionRequest {
    pub fn new(message_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            text: text.into(),
        }
    }

    pub fn from_message(message: &Message) -> Self {
        Self::new(message.id.clone(), message.text.clone())
    }
}

/// Which strategy answers `classify`. Chosen once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendMode {
    #[default]
    Direct,
    FeatureStoreMediated,
}

impl BackendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::FeatureStoreMediated => "feature-store",
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // "I" and "II" are the ARCHITECTURE_VERSION values used by deployments
        match value.trim().to_ascii_lowercase().as_str() {
            "direct" | "i" => Ok(Self::Direct),
            "feature-store" | "feature_store" | "feature-store-mediated" | "ii" => {
                Ok(Self::FeatureStoreMediated)
            }
            other => Err(format!("unknown backend mode '{other}'")),
        }
    }
}

impl TryFrom<String> for BackendMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackendMode> for String {
    fn from(mode: BackendMode) -> Self {
        mode.as_str().to_string()
    }
}

#[async_trait]
pub trait PredictionBackend: Send + Sync {
    async fn classify(&self, request: &PredictionRequest) -> Result<Label, BackendError>;

    fn mode(&self) -> BackendMode;
}

/// Model-serving API location shared by both strategies.
#[derive(Debug, Clone)]
pub struct ModelServing {
    base: Url,
    model_version: String,
}

impl ModelServing {
    pub fn new(base: Url, model_version: impl Into<String>) -> Self {
        Self {
            base,
            model_version: model_version.into(),
        }
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn text_to_prediction(&self) -> Result<Url, BackendError> {
        transport::endpoint(
            &self.base,
            &["model", &self.model_version, "text_to_prediction"],
        )
    }

    pub fn features_to_prediction(&self) -> Result<Url, BackendError> {
        transport::endpoint(
            &self.base,
            &["model", &self.model_version, "features_to_prediction"],
        )
    }
}

/// Only `top.label` is binding; the other fields are read for logging.
#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    top: Option<PredictionTop>,
    #[serde(default)]
    prediction: Option<Value>,
    #[serde(default)]
    from_cache: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PredictionTop {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    value: Option<Value>,
}

/// Pull `top.label` out of a model-serving response body.
pub(crate) fn top_label(body: Value) -> Result<Label, BackendError> {
    let response: PredictionResponse = serde_json::from_value(body)
        .map_err(|e| BackendError::Protocol(format!("prediction body: {e}")))?;

    let top = response
        .top
        .ok_or_else(|| BackendError::Protocol("prediction has no 'top' entry".to_string()))?;

    match top.label {
        Some(label) if !label.is_empty() => {
            log::debug!(
                "Top label '{}' (score {:?}, {:?} classes, cached: {})",
                label,
                top.value.as_ref().and_then(Value::as_f64),
                response
                    .prediction
                    .as_ref()
                    .and_then(Value::as_object)
                    .map(|classes| classes.len()),
                response
                    .from_cache
                    .as_ref()
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            );
            Ok(Label::new(label))
        }
        _ => Err(BackendError::Protocol(
            "prediction 'top' carries no label".to_string(),
        )),
    }
}

/// Build the backend selected by `config.backend_mode`.
pub fn build_backend(
    config: &Config,
    transport: Arc<dyn JsonTransport>,
) -> anyhow::Result<Arc<dyn PredictionBackend>> {
    let model = ModelServing::new(config.model_serving_base()?, config.model_version.clone());

    let backend: Arc<dyn PredictionBackend> = match config.backend_mode {
        BackendMode::Direct => Arc::new(DirectBackend::new(model, transport)),
        BackendMode::FeatureStoreMediated => Arc::new(FeatureStoreBackend::new(
            config.feature_server_base()?,
            config.feature_service.clone(),
            model,
            transport,
        )),
    };

    log::info!(
        "Prediction backend: {} (model version {})",
        backend.mode(),
        config.model_version
    );
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockTransport;
    use serde_json::json;

    #[test]
    fn test_backend_mode_parsing() {
        assert_eq!("direct".parse::<BackendMode>(), Ok(BackendMode::Direct));
        assert_eq!("I".parse::<BackendMode>(), Ok(BackendMode::Direct));
        assert_eq!("II".parse::<BackendMode>(), Ok(BackendMode::FeatureStoreMediated));
        assert_eq!(
            "Feature_Store".parse::<BackendMode>(),
            Ok(BackendMode::FeatureStoreMediated)
        );
        assert!("cloud".parse::<BackendMode>().is_err());
    }

    #[test]
    fn test_top_label_extraction() {
        let label = top_label(json!({"top": {"label": "spam", "value": 0.93}})).unwrap();
        assert_eq!(label.as_str(), "spam");
        assert!(!label.is_ham());

        assert!(top_label(json!({"top": {"label": "ham"}})).unwrap().is_ham());
    }

    #[test]
    fn test_top_label_ignores_odd_side_fields() {
        let label = top_label(json!({
            "top": {"label": "ham", "value": "0.9"},
            "prediction": null,
            "from_cache": null
        }))
        .unwrap();
        assert!(label.is_ham());

        let label = top_label(json!({
            "top": {"label": "spam", "value": null},
            "prediction": ["ham", "spam"],
            "from_cache": "yes",
            "input": 12
        }))
        .unwrap();
        assert_eq!(label.as_str(), "spam");
    }

    #[test]
    fn test_top_label_rejects_incomplete_bodies() {
        for body in [
            json!({}),
            json!({"top": null}),
            json!({"top": {}}),
            json!({"top": {"label": ""}}),
            json!(["ham"]),
        ] {
            match top_label(body.clone()) {
                Err(BackendError::Protocol(_)) => {}
                other => panic!("Expected protocol failure for {body}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_model_serving_endpoints() {
        let model = ModelServing::new(Url::parse("http://localhost:8000").unwrap(), "v2");
        assert_eq!(
            model.text_to_prediction().unwrap().as_str(),
            "http://localhost:8000/model/v2/text_to_prediction"
        );

        let nested = ModelServing::new(Url::parse("http://models.local/api/").unwrap(), "v1");
        assert_eq!(
            nested.features_to_prediction().unwrap().as_str(),
            "http://models.local/api/model/v1/features_to_prediction"
        );
    }

    #[test]
    fn test_build_backend_follows_mode() {
        let transport: Arc<dyn JsonTransport> = Arc::new(MockTransport::new());

        let config = Config::default();
        let backend = build_backend(&config, transport.clone()).unwrap();
        assert_eq!(backend.mode(), BackendMode::Direct);

        let config = Config {
            backend_mode: BackendMode::FeatureStoreMediated,
            ..Default::default()
        };
        let backend = build_backend(&config, transport).unwrap();
        assert_eq!(backend.mode(), BackendMode::FeatureStoreMediated);
    }
}
