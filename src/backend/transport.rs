use super::BackendError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// One JSON request, one decoded JSON body.
#[async_trait]
pub trait JsonTransport: Send + Sync {
    async fn post_json(&self, url: &Url, body: &Value) -> Result<Value, BackendError>;

    async fn get_json(&self, url: &Url) -> Result<Value, BackendError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// `timeout` of `None` leaves requests unbounded.
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder =
            Client::builder().user_agent(concat!("sms-spam-inbox/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn decode(url: &Url, response: Response) -> Result<Value, BackendError> {
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_decode() {
                BackendError::Protocol(format!("{url} returned a non-JSON body: {e}"))
            } else {
                transport_error(url, &e)
            }
        })
    }
}

#[async_trait]
impl JsonTransport for HttpTransport {
    async fn post_json(&self, url: &Url, body: &Value) -> Result<Value, BackendError> {
        log::debug!("POST {}", url);
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;

        Self::decode(url, response).await
    }

    async fn get_json(&self, url: &Url) -> Result<Value, BackendError> {
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;

        Self::decode(url, response).await
    }
}

fn transport_error(url: &Url, error: &reqwest::Error) -> BackendError {
    BackendError::Transport {
        url: url.to_string(),
        reason: error.to_string(),
    }
}

/// Append path segments to a base URL, percent-encoding each one.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, BackendError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| BackendError::Protocol(format!("'{base}' cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept a single connection, answer it with `status` and `body`, and
    /// hand back the raw request text.
    async fn serve_once(status: &'static str, body: &'static str) -> (Url, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).into_owned()
        });

        (Url::parse(&format!("http://{addr}/")).unwrap(), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(split) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..split]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= split + 4 + content_length
    }

    fn local_transport() -> HttpTransport {
        HttpTransport::with_client(Client::builder().no_proxy().build().unwrap())
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let base = Url::parse("http://localhost:8111").unwrap();
        let url = endpoint(&base, &["sms", "jane doe"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8111/sms/jane%20doe");

        let opaque = Url::parse("mailto:someone@example.com").unwrap();
        assert!(endpoint(&opaque, &["sms"]).is_err());
    }

    #[tokio::test]
    async fn test_post_json_round_trip() {
        let (base, server) = serve_once("200 OK", r#"{"top":{"label":"ham"}}"#).await;
        let url = endpoint(&base, &["model", "v1", "text_to_prediction"]).unwrap();

        let body = local_transport()
            .post_json(&url, &json!({"text": "see you at 6"}))
            .await
            .unwrap();
        assert_eq!(body, json!({"top": {"label": "ham"}}));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /model/v1/text_to_prediction HTTP/1.1"));
        assert!(request.ends_with(r#"{"text":"see you at 6"}"#));
    }

    #[tokio::test]
    async fn test_non_success_status_is_transport_failure() {
        let (base, server) = serve_once("500 Internal Server Error", r#"{"detail":"boom"}"#).await;

        let err = local_transport()
            .post_json(&base, &json!({"text": "hi"}))
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(matches!(err, BackendError::Status { status: 500, .. }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_body_is_protocol_failure() {
        let (base, server) = serve_once("200 OK", "<html>not json</html>").await;

        let err = local_transport().get_json(&base).await.unwrap_err();
        assert!(matches!(err, BackendError::Protocol(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_failure() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/get-online-features")).unwrap();
        let err = local_transport()
            .post_json(&url, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport { .. }));
    }
}
