//! The HTTP transport collaborator and its retry-exercisable fake.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

/// An HTTP-shaped response, deliberately minimal: just enough for the retry
/// loop and error-envelope parsing to operate on.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A transport-level failure: connection reset, DNS, timeout. Distinct from
/// a successful response carrying an error status.
#[derive(Clone, Debug, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Stands in for the REST/multipart/blob/JWT plumbing this crate does not
/// otherwise model. The retry loop in [`crate::retry`] drives any
/// implementation identically.
#[async_trait]
pub trait CapsaTransport: Send + Sync {
    async fn send(
        &self,
        method: &str,
        path: &str,
        headers: &HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Result<TransportResponse, TransportError>;
}

/// A thin `reqwest::Client` wrapper carrying the User-Agent/SDK-version
/// headers and bearer-token injection described in the external interfaces.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
    access_token: Option<String>,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>, timeout: std::time::Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            user_agent: user_agent.into(),
            access_token: None,
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

#[async_trait]
impl CapsaTransport for ReqwestTransport {
    async fn send(
        &self,
        method: &str,
        path: &str,
        headers: &HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Result<TransportResponse, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = match method {
            "GET" => self.client.get(&url),
            "PUT" => self.client.put(&url),
            "POST" => self.client.post(&url),
            "DELETE" => self.client.delete(&url),
            "HEAD" => self.client.head(&url),
            other => return Err(TransportError(format!("unsupported method {other}"))),
        };

        request = request.header("User-Agent", &self.user_agent);
        if let Some(token) = &self.access_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        for (k, v) in headers {
            request = request.header(k, v);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// An in-memory fake used by retry-policy tests to script an exact response
/// sequence without a real network.
#[cfg(test)]
pub struct ScriptedTransport {
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<TransportResponse, TransportError>>>,
}

#[cfg(test)]
impl ScriptedTransport {
    pub fn new(responses: Vec<Result<TransportResponse, TransportError>>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(responses.into()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl CapsaTransport for ScriptedTransport {
    async fn send(
        &self,
        _method: &str,
        _path: &str,
        _headers: &HashMap<String, String>,
        _body: Option<Bytes>,
    ) -> Result<TransportResponse, TransportError> {
        self.responses
            .lock()
            .pop_front()
            .expect("scripted transport ran out of responses")
    }
}

#[cfg(test)]
pub fn response(status: u16) -> TransportResponse {
    TransportResponse {
        status,
        headers: HashMap::new(),
        body: Bytes::new(),
    }
}

#[cfg(test)]
pub fn response_with_header(status: u16, name: &str, value: &str) -> TransportResponse {
    let mut headers = HashMap::new();
    headers.insert(name.to_string(), value.to_string());
    TransportResponse {
        status,
        headers,
        body: Bytes::new(),
    }
}

#[cfg(test)]
pub fn response_with_body(status: u16, body: &str) -> TransportResponse {
    TransportResponse {
        status,
        headers: HashMap::new(),
        body: Bytes::copy_from_slice(body.as_bytes()),
    }
}

#[cfg(test)]
mod reqwest_transport_tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_bearer_token_and_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/capsas/capsa_1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"{\"ok\":true}".to_vec()))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(server.uri(), "capsara-client/test", std::time::Duration::from_secs(5))
            .unwrap()
            .with_access_token("token-123");

        let response = transport
            .send("GET", "/capsas/capsa_1", &HashMap::new(), None)
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body.as_ref(), b"{\"ok\":true}");
    }

    #[tokio::test]
    async fn unsupported_method_is_rejected_locally() {
        let server = MockServer::start().await;
        let transport = ReqwestTransport::new(server.uri(), "capsara-client/test", std::time::Duration::from_secs(5)).unwrap();

        let result = transport.send("PATCH", "/capsas/capsa_1", &HashMap::new(), None).await;
        assert!(result.is_err());
    }
}
