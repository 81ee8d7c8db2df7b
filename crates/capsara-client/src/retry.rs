//! Exponential-backoff-with-jitter retry loop, generic over [`CapsaTransport`].

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use tracing::{debug, instrument};

use crate::config::RetryConfig;
use crate::error::{ClientError, Result};
use crate::transport::{CapsaTransport, TransportResponse};

/// A caller-observed cancellation signal, checked before each request and
/// inside each retry delay.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(std::sync::atomic::Ordering::SeqCst)
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 503 || status == 429
}

/// Parse a JSON error envelope's `error.retryAfter` field, in seconds.
fn retry_after_from_body(body: &Bytes) -> Option<Duration> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let seconds = value.get("error")?.get("retryAfter")?.as_f64()?;
    Some(Duration::from_secs_f64(seconds.max(0.0)))
}

/// Parse a `Retry-After` header, supporting the delta-seconds form only
/// (HTTP-date is accepted verbatim by servers this client talks to but is
/// rare enough in practice that it falls through to the backoff branch).
fn retry_after_from_header(response: &TransportResponse) -> Option<Duration> {
    response
        .header("Retry-After")
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Parse a non-retryable error response's JSON envelope (`{"error": {"code",
/// "message"}}`) into a [`ClientError::ServerError`], falling back to a bare
/// transport error if the body isn't a recognizable envelope.
fn server_error_from_response(response: &TransportResponse) -> ClientError {
    let envelope = serde_json::from_slice::<serde_json::Value>(&response.body)
        .ok()
        .and_then(|value| {
            let error = value.get("error")?;
            let code = error.get("code")?.as_str()?.to_string();
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or_default()
                .to_string();
            Some((code, message))
        });

    match envelope {
        Some((code, message)) => ClientError::from_envelope(&code, &message),
        None => ClientError::Transport(format!("server returned status {}", response.status)),
    }
}

fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.base_delay.as_secs_f64() * 2f64.powi(attempt as i32 - 1);
    let jitter = rand::thread_rng().gen_range(0.0..(0.3 * base));
    Duration::from_secs_f64(base + jitter)
}

fn select_delay(config: &RetryConfig, attempt: u32, response: Option<&TransportResponse>) -> Duration {
    let delay = response
        .and_then(|r| retry_after_from_body(&r.body))
        .or_else(|| response.and_then(retry_after_from_header))
        .unwrap_or_else(|| backoff_delay(config, attempt));
    delay.min(config.max_delay)
}

/// Execute one logical request, retrying transient failures per `config`.
#[instrument(skip(transport, headers, body, cancellation), fields(method, path))]
pub async fn send_with_retry(
    transport: &dyn CapsaTransport,
    config: &RetryConfig,
    method: &str,
    path: &str,
    headers: &HashMap<String, String>,
    body: Option<Bytes>,
    cancellation: &CancellationToken,
) -> Result<TransportResponse> {
    let mut attempt = 0u32;
    loop {
        if cancellation.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let outcome = transport.send(method, path, headers, body.clone()).await;

        let retryable_response = match &outcome {
            Ok(response) => is_retryable_status(response.status),
            Err(_) => true,
        };

        if !retryable_response {
            return match outcome {
                Ok(response) if response.status < 400 => Ok(response),
                Ok(response) => Err(server_error_from_response(&response)),
                Err(e) => Err(ClientError::Transport(e.0)),
            };
        }

        if attempt >= config.max_retries {
            return match outcome {
                Ok(response) => Err(server_error_from_response(&response)),
                Err(e) => Err(ClientError::Transport(e.0)),
            };
        }

        attempt += 1;
        let delay = select_delay(config, attempt, outcome.as_ref().ok());
        debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying request");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = wait_for_cancellation(cancellation) => {
                return Err(ClientError::Cancelled);
            }
        }
    }
}

async fn wait_for_cancellation(token: &CancellationToken) {
    loop {
        if token.is_cancelled() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{response, response_with_body, response_with_header, ScriptedTransport};

    fn config() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn succeeds_after_two_retryable_responses() {
        let transport = ScriptedTransport::new(vec![
            Ok(response(503)),
            Ok(response(503)),
            Ok(response(200)),
        ]);
        let result = send_with_retry(
            &transport,
            &config(),
            "GET",
            "/capsas/1",
            &HashMap::new(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(result.status, 200);
    }

    #[tokio::test]
    async fn exhausts_retries_and_surfaces_the_last_error() {
        let transport = ScriptedTransport::new(vec![
            Ok(response(503)),
            Ok(response(503)),
            Ok(response(503)),
            Ok(response(503)),
        ]);
        let result = send_with_retry(
            &transport,
            &config(),
            "GET",
            "/capsas/1",
            &HashMap::new(),
            None,
            &CancellationToken::new(),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn non_retryable_status_surfaces_immediately() {
        let transport = ScriptedTransport::new(vec![Ok(response(404))]);
        let result = send_with_retry(
            &transport,
            &config(),
            "GET",
            "/capsas/1",
            &HashMap::new(),
            None,
            &CancellationToken::new(),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn transport_error_is_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(crate::transport::TransportError("connection reset".to_string())),
            Ok(response(200)),
        ]);
        let result = send_with_retry(
            &transport,
            &config(),
            "GET",
            "/capsas/1",
            &HashMap::new(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(result.status, 200);
    }

    #[tokio::test]
    async fn retry_after_header_is_honored() {
        let transport = ScriptedTransport::new(vec![
            Ok(response_with_header(503, "Retry-After", "0")),
            Ok(response(200)),
        ]);
        let result = send_with_retry(
            &transport,
            &config(),
            "GET",
            "/capsas/1",
            &HashMap::new(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(result.status, 200);
    }

    #[tokio::test]
    async fn cancellation_aborts_before_a_retry_sleep() {
        let transport = ScriptedTransport::new(vec![Ok(response(503)), Ok(response(200))]);
        let token = CancellationToken::new();
        token.cancel();
        let result = send_with_retry(
            &transport,
            &config(),
            "GET",
            "/capsas/1",
            &HashMap::new(),
            None,
            &token,
        )
        .await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }

    #[tokio::test]
    async fn non_retryable_status_parses_the_error_envelope() {
        let body = r#"{"error":{"code":"CAPSA_ACCESS_DENIED","message":"not yours"}}"#;
        let transport = ScriptedTransport::new(vec![Ok(response_with_body(403, body))]);
        let result = send_with_retry(
            &transport,
            &config(),
            "GET",
            "/capsas/1",
            &HashMap::new(),
            None,
            &CancellationToken::new(),
        )
        .await;
        match result {
            Err(ClientError::ServerError { code, message, .. }) => {
                assert_eq!(code, "CAPSA_ACCESS_DENIED");
                assert_eq!(message, "not yours");
            }
            other => panic!("expected ServerError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_status_without_an_envelope_falls_back_to_transport_error() {
        let transport = ScriptedTransport::new(vec![Ok(response(404))]);
        let result = send_with_retry(
            &transport,
            &config(),
            "GET",
            "/capsas/1",
            &HashMap::new(),
            None,
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(ClientError::Transport(_))));
    }

    #[test]
    fn delay_is_clamped_to_max_delay() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay: Duration::from_secs(100),
            max_delay: Duration::from_secs(5),
        };
        let delay = select_delay(&config, 5, None);
        assert!(delay <= Duration::from_secs(5));
    }
}
