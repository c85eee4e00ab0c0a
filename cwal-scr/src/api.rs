// ABOUTME: Typed calls against the SC:R web API on top of any Fetch implementation.
// ABOUTME: `connect` fetches the gateway list so a dead port fails at construction time.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{BroodWarConnection, CachedFetch, ClientError, Fetch};

pub const GATEWAY_ENDPOINT: &str = "web-api/v1/gateway";

/// A battle.net gateway as advertised by the game client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
    pub id: u16,
    pub name: String,
}

#[derive(Deserialize)]
struct GatewayEntry {
    name: String,
}

/// The client the rest of the application talks to.
pub type CachedScrApi = ScrApi<CachedFetch<BroodWarConnection>>;

pub struct ScrApi<F> {
    fetch: F,
}

impl<F: Fetch> ScrApi<F> {
    pub fn new(fetch: F) -> Self {
        Self { fetch }
    }

    /// Wrap `fetch` and verify the web server answers before handing the client out.
    pub async fn connect(fetch: F) -> Result<Self, ClientError> {
        let api = Self::new(fetch);
        let gateways = api.gateways().await?;
        tracing::info!("SC:R web API answered with {} gateways", gateways.len());
        Ok(api)
    }

    pub fn fetch(&self) -> &F {
        &self.fetch
    }

    /// Gateways keyed by their numeric id, sorted by id.
    pub async fn gateways(&self) -> Result<Vec<Gateway>, ClientError> {
        let value = self.fetch.get_json(GATEWAY_ENDPOINT).await?;
        parse_gateways(&value).ok_or_else(|| ClientError::Decode {
            url: GATEWAY_ENDPOINT.to_string(),
            message: "expected an object keyed by gateway id".to_string(),
        })
    }

    /// Raw ladder profile for a player.
    pub async fn aurora_profile_by_toon(&self, toon: &str, gateway: u16) -> Result<Value, ClientError> {
        let endpoint = profile_endpoint(toon, gateway);
        self.fetch.get_json(&endpoint).await
    }
}

impl CachedScrApi {
    /// Build the caching client for a local port and check that the server answers.
    pub async fn connect_local(host: &str, port: u16, timeout: Duration, cache_ttl: Duration) -> Result<Self, ClientError> {
        let connection = BroodWarConnection::local(host, port, timeout)?;
        tracing::info!("Connecting to SC:R web API at {}", connection.base_url());
        Self::connect(CachedFetch::new(connection, cache_ttl)).await
    }
}

fn profile_endpoint(toon: &str, gateway: u16) -> String {
    let toon = urlencoding::encode(toon);
    format!("web-api/v2/aurora-profile-by-toon/{toon}/{gateway}?request_flags=scr_profile")
}

fn parse_gateways(value: &Value) -> Option<Vec<Gateway>> {
    let object = value.as_object()?;
    let mut gateways: Vec<Gateway> = object
        .iter()
        .filter_map(|(id, entry)| {
            let id = id.parse().ok()?;
            let entry: GatewayEntry = serde_json::from_value(entry.clone()).ok()?;
            Some(Gateway { id, name: entry.name })
        })
        .collect();
    gateways.sort_by_key(|g| g.id);
    Some(gateways)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    struct StaticFetch(HashMap<String, Value>);

    impl Fetch for StaticFetch {
        async fn get_json(&self, endpoint: &str) -> Result<Value, ClientError> {
            self.0.get(endpoint).cloned().ok_or_else(|| ClientError::Status {
                url: endpoint.to_string(),
                status: 404,
                body: String::new(),
            })
        }
    }

    fn gateway_fixture() -> StaticFetch {
        let mut routes = HashMap::new();
        routes.insert(
            GATEWAY_ENDPOINT.to_string(),
            json!({
                "30": { "name": "Korea", "region": "kr" },
                "10": { "name": "U.S. West", "region": "usw" },
                "bogus": { "name": "ignored" }
            }),
        );
        StaticFetch(routes)
    }

    #[tokio::test]
    async fn gateways_are_sorted_and_skip_bad_ids() {
        let api = ScrApi::new(gateway_fixture());
        let gateways = api.gateways().await.unwrap();
        assert_eq!(
            gateways,
            vec![
                Gateway { id: 10, name: "U.S. West".to_string() },
                Gateway { id: 30, name: "Korea".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn gateways_rejects_non_object_body() {
        let mut routes = HashMap::new();
        routes.insert(GATEWAY_ENDPOINT.to_string(), json!([1, 2, 3]));
        let api = ScrApi::new(StaticFetch(routes));
        assert!(matches!(api.gateways().await, Err(ClientError::Decode { .. })));
    }

    #[tokio::test]
    async fn connect_fails_when_gateway_check_fails() {
        let result = ScrApi::connect(StaticFetch(HashMap::new())).await;
        assert!(matches!(result, Err(ClientError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn connect_succeeds_when_gateways_answer() {
        assert!(ScrApi::connect(gateway_fixture()).await.is_ok());
    }

    #[test]
    fn profile_endpoint_includes_flags() {
        assert_eq!(
            profile_endpoint("Flash", 30),
            "web-api/v2/aurora-profile-by-toon/Flash/30?request_flags=scr_profile"
        );
    }

    #[test]
    fn profile_endpoint_escapes_reserved_characters_in_toon() {
        let endpoint = profile_endpoint("Na#me/x?y", 30);
        assert_eq!(
            endpoint,
            "web-api/v2/aurora-profile-by-toon/Na%23me%2Fx%3Fy/30?request_flags=scr_profile"
        );

        let base = reqwest::Url::parse("http://localhost:57421/").unwrap();
        let url = base.join(&endpoint).unwrap();
        assert_eq!(url.path(), "/web-api/v2/aurora-profile-by-toon/Na%23me%2Fx%3Fy/30");
        assert_eq!(url.query(), Some("request_flags=scr_profile"));
        assert_eq!(url.fragment(), None);
    }

    #[tokio::test]
    async fn aurora_profile_requests_the_escaped_endpoint() {
        let mut routes = HashMap::new();
        routes.insert(profile_endpoint("Sea Rain", 10), json!({ "toon": "Sea Rain" }));
        let api = ScrApi::new(StaticFetch(routes));
        let profile = api.aurora_profile_by_toon("Sea Rain", 10).await.unwrap();
        assert_eq!(profile["toon"], "Sea Rain");
        assert!(profile_endpoint("Sea Rain", 10).contains("Sea%20Rain"));
    }

    #[tokio::test]
    async fn connect_local_reports_dead_port() {
        let port = crate::test_server::closed_port().await;
        let result = CachedScrApi::connect_local("127.0.0.1", port, Duration::from_secs(2), Duration::from_secs(30)).await;
        assert!(result.err().is_some_and(|e| e.is_unreachable()));
    }
}
