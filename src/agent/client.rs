//! HTTP client for the agent query endpoint.

use tracing::{debug, warn};
use url::Url;

use crate::agent::config::AgentClientConfig;
use crate::agent::error::{AgentError, AgentResult};
use crate::agent::types::{AgentRequest, AgentResponse};

/// Sends questions to the agent server, retrying transient server errors.
#[derive(Clone, Debug)]
pub struct AgentClient {
    client: reqwest::Client,
    endpoint: Url,
    config: AgentClientConfig,
}

impl AgentClient {
    /// Create a client for the given configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: AgentClientConfig) -> AgentResult<Self> {
        config.validate()?;
        let endpoint = config.endpoint()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    /// Client configured from the environment.
    ///
    /// # Errors
    /// Returns an error if the configured base URL is invalid.
    pub fn from_env() -> AgentResult<Self> {
        Self::new(AgentClientConfig::from_env())
    }

    /// Endpoint the client posts to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send a question. Server errors listed in the configuration are
    /// retried with linear backoff.
    ///
    /// # Errors
    /// Returns the last error once retries are exhausted, or immediately for
    /// errors that are not retried.
    pub async fn query(&self, request: &AgentRequest) -> AgentResult<AgentResponse> {
        let mut attempt = 0;
        loop {
            match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.config.max_retries && self.config.should_retry(&err) => {
                    attempt += 1;
                    let delay = self.config.retry_delay_for(attempt);
                    warn!(attempt, ?delay, error = %err, "agent query failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(&self, request: &AgentRequest) -> AgentResult<AgentResponse> {
        debug!(
            agent_type = %request.agent_type,
            session_id = %request.session_id,
            "sending agent query"
        );
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Serve `responses` in order, one connection each. Returns the base URL
    /// and a hit counter.
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        std::thread::spawn(move || {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                read_request(&mut stream);
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = format!(
                    "HTTP/1.1 {status} Test\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes());
            }
        });

        (format!("http://{addr}"), hits)
    }

    fn read_request(stream: &mut std::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0_u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return;
            }
        }
    }

    fn client(base_url: &str) -> AgentClient {
        let config = AgentClientConfig::default()
            .with_base_url(base_url)
            .with_retries(2, Duration::from_millis(1));
        AgentClient::new(config).unwrap()
    }

    fn request() -> AgentRequest {
        AgentRequest {
            question: "BPM-123 상태 알려줘".to_string(),
            agent_type: "summary".to_string(),
            issue_key: Some("BPM-123".to_string()),
            session_id: "session_1".to_string(),
        }
    }

    const OK_BODY: &str = r#"{"agent":"summary","issue_key":"BPM-123","meta_data":[],"result":"done","status":"success"}"#;

    #[tokio::test]
    async fn test_retries_server_errors() {
        let (url, hits) = serve(vec![(503, "{}"), (502, "{}"), (200, OK_BODY)]);
        let response = client(&url).query(&request()).await.unwrap();
        assert_eq!(response.result, "done");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let (url, hits) = serve(vec![(500, "{}"), (500, "{}"), (500, "{}")]);
        let err = client(&url).query(&request()).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let (url, hits) = serve(vec![(404, "{}")]);
        let err = client(&url).query(&request()).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (url, _) = serve(vec![(200, r#"{"unexpected": true}"#)]);
        let err = client(&url).query(&request()).await.unwrap_err();
        assert!(matches!(err, AgentError::Json(_)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = AgentClientConfig::default().with_base_url("nope");
        assert!(AgentClient::new(config).is_err());
    }
}
