// ABOUTME: HTTP connection to the web server SC:R exposes on localhost.
// ABOUTME: Defines the Fetch seam that the cache decorator and typed API are layered on.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::ClientError;

/// Fetches a JSON document for an endpoint path relative to the web server root.
pub trait Fetch: Send + Sync {
    fn get_json(&self, endpoint: &str) -> impl Future<Output = Result<Value, ClientError>> + Send;
}

/// Plain connection to a running SC:R web server.
#[derive(Debug, Clone)]
pub struct BroodWarConnection {
    base_url: reqwest::Url,
    http: reqwest::Client,
}

impl BroodWarConnection {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        // Url::join drops the last path segment unless the base ends with a slash.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = reqwest::Url::parse(&normalized).map_err(|e| ClientError::Build(format!("{base_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;
        Ok(Self { base_url, http })
    }

    /// Connection to `http://<host>:<port>`.
    pub fn local(host: &str, port: u16, timeout: Duration) -> Result<Self, ClientError> {
        Self::new(&format!("http://{host}:{port}"), timeout)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn url(&self, endpoint: &str) -> Result<reqwest::Url, ClientError> {
        self.base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| ClientError::Build(format!("{endpoint}: {e}")))
    }
}

impl Fetch for BroodWarConnection {
    async fn get_json(&self, endpoint: &str) -> Result<Value, ClientError> {
        let url = self.url(endpoint)?;
        tracing::debug!("GET {url}");

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ClientError::Unreachable {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.json::<Value>().await.map_err(|e| ClientError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;

    #[test]
    fn base_url_gets_trailing_slash() {
        let conn = BroodWarConnection::local("localhost", 57421, Duration::from_secs(1)).unwrap();
        assert_eq!(conn.base_url(), "http://localhost:57421/");
    }

    #[test]
    fn endpoint_joins_under_base() {
        let conn = BroodWarConnection::new("http://localhost:7000/", Duration::from_secs(1)).unwrap();
        let url = conn.url("/web-api/v1/gateway").unwrap();
        assert_eq!(url.as_str(), "http://localhost:7000/web-api/v1/gateway");
    }

    #[test]
    fn rejects_garbage_base_url() {
        let err = BroodWarConnection::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ClientError::Build(_)));
    }

    #[tokio::test]
    async fn get_json_decodes_body() {
        let port = test_server::serve_once("200 OK", r#"{"ok":true}"#).await;
        let conn = BroodWarConnection::local("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        let value = conn.get_json("web-api/v1/gateway").await.unwrap();
        assert_eq!(value["ok"], Value::Bool(true));
    }

    #[tokio::test]
    async fn get_json_reports_error_status() {
        let port = test_server::serve_once("503 Service Unavailable", "busy").await;
        let conn = BroodWarConnection::local("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        let err = conn.get_json("web-api/v1/gateway").await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn get_json_reports_closed_port_as_unreachable() {
        let port = test_server::closed_port().await;
        let conn = BroodWarConnection::local("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        let err = conn.get_json("web-api/v1/gateway").await.unwrap_err();
        assert!(err.is_unreachable());
    }
}
