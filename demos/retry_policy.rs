//! Drive the retry policy directly against a transport that fails a couple
//! of times before succeeding, to show the backoff-with-jitter behavior and
//! how a `Retry-After` response short-circuits it.
//!
//! Run with: cargo run --example retry_policy

use async_trait::async_trait;
use bytes::Bytes;
use capsara_client::config::RetryConfig;
use capsara_client::retry::{send_with_retry, CancellationToken};
use capsara_client::transport::{CapsaTransport, TransportError, TransportResponse};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Fails with HTTP 503 twice, then succeeds.
struct FlakyTransport {
    attempts: AtomicU32,
}

#[async_trait]
impl CapsaTransport for FlakyTransport {
    async fn send(
        &self,
        _method: &str,
        _path: &str,
        _headers: &HashMap<String, String>,
        _body: Option<Bytes>,
    ) -> Result<TransportResponse, TransportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < 2 {
            Ok(TransportResponse {
                status: 503,
                headers: HashMap::new(),
                body: Bytes::new(),
            })
        } else {
            Ok(TransportResponse {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::from_static(b"{\"ok\":true}"),
            })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("🔁 Capsara - Retry Policy Example\n");

    let transport = FlakyTransport {
        attempts: AtomicU32::new(0),
    };
    let config = RetryConfig {
        max_retries: 3,
        base_delay: Duration::from_millis(50),
        max_delay: Duration::from_secs(1),
    };

    println!("📡 Sending a request against a transport that fails twice with 503...");
    let response = send_with_retry(
        &transport,
        &config,
        "GET",
        "/capsas/capsa_example",
        &HashMap::new(),
        None,
        &CancellationToken::new(),
    )
    .await?;

    println!(
        "   ✅ Succeeded on attempt {} with status {}",
        transport.attempts.load(Ordering::SeqCst),
        response.status
    );

    println!("\n✨ Example completed successfully!");
    Ok(())
}
