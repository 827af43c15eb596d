use std::time::Duration;

use async_trait::async_trait;
use endercom_core::{AgentOptions, Cursor, EndercomError, RawMessage, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{FetchBatch, Transport};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport backed by the Endercom HTTP API.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    request_timeout: Duration,
}

#[derive(Deserialize)]
struct PollResponse {
    #[serde(default = "default_true")]
    success: bool,
    #[serde(default)]
    data: Option<PollData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Default)]
struct PollData {
    #[serde(default)]
    messages: Vec<RawMessage>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_agent: Option<&'a str>,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default = "default_true")]
    success: bool,
}

fn default_true() -> bool {
    true
}

impl HttpTransport {
    pub fn new(options: &AgentOptions) -> Result<Self> {
        Self::with_timeout(options, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(options: &AgentOptions, request_timeout: Duration) -> Result<Self> {
        options.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(request_timeout))
            .timeout(request_timeout)
            .pool_idle_timeout(Duration::from_secs(60))
            .user_agent(concat!("endercom-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EndercomError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            api_key: options.api_key.clone(),
            request_timeout,
        })
    }

    fn api_url(&self, frequency_id: &str, action: &str) -> String {
        format!(
            "{}/api/{}/messages/{}",
            self.base_url, frequency_id, action
        )
    }

    fn map_request_error(&self, e: reqwest::Error) -> EndercomError {
        if e.is_timeout() {
            EndercomError::Timeout(self.request_timeout)
        } else if e.is_decode() {
            EndercomError::MalformedResponse(e.to_string())
        } else {
            EndercomError::Unavailable(e.to_string())
        }
    }

    /// Turn a non-success response into a typed error.
    async fn error_for(&self, frequency_id: &str, resp: reqwest::Response) -> EndercomError {
        let status = resp.status();
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = resp.text().await.unwrap_or_default();
        classify_status(status, frequency_id, &body, retry_after)
    }
}

/// Map an HTTP status to the runtime's error taxonomy.
pub(crate) fn classify_status(
    status: StatusCode,
    frequency_id: &str,
    body: &str,
    retry_after: Option<u64>,
) -> EndercomError {
    let reason: String = body.chars().take(200).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            EndercomError::Unauthorized(format!("frequency API rejected credential ({status})"))
        }
        StatusCode::NOT_FOUND => EndercomError::InvalidFrequency(format!(
            "frequency '{frequency_id}' not found"
        )),
        StatusCode::TOO_MANY_REQUESTS => EndercomError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(5),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            EndercomError::Unavailable(format!("{status}: {reason}"))
        }
        s if s.is_server_error() => EndercomError::Unavailable(format!("{status}: {reason}")),
        s => EndercomError::Transport {
            status: s.as_u16(),
            reason,
        },
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, frequency_id: &str, cursor: &Cursor) -> Result<FetchBatch> {
        let mut req = self
            .client
            .get(self.api_url(frequency_id, "poll"))
            .bearer_auth(&self.api_key);
        if let Some(since) = cursor.as_str() {
            req = req.query(&[("since", since)]);
        }

        let resp = req.send().await.map_err(|e| self.map_request_error(e))?;
        if !resp.status().is_success() {
            return Err(self.error_for(frequency_id, resp).await);
        }

        let body: PollResponse = resp.json().await.map_err(|e| self.map_request_error(e))?;
        if !body.success {
            return Err(EndercomError::MalformedResponse(
                body.error.unwrap_or_else(|| "poll reported failure".into()),
            ));
        }

        let data = body.data.unwrap_or_default();
        debug!(
            frequency_id,
            count = data.messages.len(),
            cursor = %cursor,
            "fetched messages"
        );
        Ok(FetchBatch {
            messages: data.messages,
            next_cursor: data.cursor.map(Cursor::after),
        })
    }

    async fn publish(
        &self,
        frequency_id: &str,
        content: &str,
        target: Option<&str>,
    ) -> Result<bool> {
        let resp = self
            .client
            .post(self.api_url(frequency_id, "send"))
            .bearer_auth(&self.api_key)
            .json(&SendRequest {
                content,
                target_agent: target,
            })
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        if !resp.status().is_success() {
            return Err(self.error_for(frequency_id, resp).await);
        }

        // An empty 2xx body counts as accepted.
        let text = resp.text().await.map_err(|e| self.map_request_error(e))?;
        if text.trim().is_empty() {
            return Ok(true);
        }
        let body: SendResponse = serde_json::from_str(&text)
            .map_err(|e| EndercomError::MalformedResponse(e.to_string()))?;
        debug!(frequency_id, to = ?target, success = body.success, "published message");
        Ok(body.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_fatal() {
        let err = classify_status(StatusCode::UNAUTHORIZED, "f", "", None);
        assert!(err.is_fatal());
        let err = classify_status(StatusCode::FORBIDDEN, "f", "", None);
        assert!(matches!(err, EndercomError::Unauthorized(_)));
    }

    #[test]
    fn missing_frequency_is_fatal() {
        let err = classify_status(StatusCode::NOT_FOUND, "freq-1", "", None);
        assert!(err.is_fatal());
        assert!(err.to_string().contains("freq-1"));
    }

    #[test]
    fn server_errors_are_transient() {
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::REQUEST_TIMEOUT,
        ] {
            let err = classify_status(status, "f", "oops", None);
            assert!(err.is_transient(), "{status} should be transient");
        }
    }

    #[test]
    fn rate_limit_carries_retry_after() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, "f", "", Some(12));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        match classify_status(StatusCode::BAD_REQUEST, "f", &body, None) {
            EndercomError::Transport { status, reason } => {
                assert_eq!(status, 400);
                assert_eq!(reason.len(), 200);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_options() {
        assert!(HttpTransport::new(&AgentOptions::new("", "f")).is_err());
    }

    #[test]
    fn api_url_strips_trailing_slash() {
        let t = HttpTransport::new(
            &AgentOptions::new("k", "freq").with_base_url("http://localhost:9000/"),
        )
        .unwrap();
        assert_eq!(
            t.api_url("freq", "poll"),
            "http://localhost:9000/api/freq/messages/poll"
        );
    }
}
