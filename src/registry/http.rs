//! Registry client that queries a remote discovery service over HTTP

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use super::{Registry, RegistryError, ServiceInstance};

/// HTTP registry client
///
/// Expects `GET {url}/v1/services/{name}` to answer with a JSON array of
/// [`ServiceInstance`], and `404` when the service is unknown. The service name
/// is sent as a single percent-encoded path segment.
pub struct HttpRegistry {
    base_url: Url,
    http_client: reqwest::Client,
}

impl HttpRegistry {
    pub fn new(url: &str, timeout_seconds: u64) -> Result<Self, RegistryError> {
        let base_url = Url::parse(url)
            .map_err(|e| RegistryError::Transport(format!("invalid registry url '{}': {}", url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RegistryError::Transport(format!(
                "registry url '{}' cannot carry a path",
                url
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| RegistryError::Transport(e.to_string()))?;

        Ok(Self { base_url, http_client })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn service_url(&self, name: &str) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["v1", "services", name]);
        }
        url
    }
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn get_service(&self, name: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
        let url = self.service_url(name);
        tracing::trace!(url = %url, "Querying registry");

        let resp = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RegistryError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        if !status.is_success() {
            return Err(RegistryError::Unavailable(format!("{} returned {}", url, status)));
        }

        resp.json::<Vec<ServiceInstance>>().await.map_err(|e| {
            if e.is_decode() {
                RegistryError::Malformed(e.to_string())
            } else {
                RegistryError::Transport(e.to_string())
            }
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode, response::IntoResponse, routing::get, Router};
    use tokio::net::TcpListener;

    async fn handle_service(Path(name): Path<String>) -> axum::response::Response {
        match name.as_str() {
            "orders" => (
                StatusCode::OK,
                [("Content-Type", "application/json")],
                r#"[{"name":"orders","version":"v1","nodes":[{"id":"n1","address":"10.0.0.1:9000"},{"id":"n2","address":"10.0.0.2:9000"}]}]"#,
            )
                .into_response(),
            "broken" => (StatusCode::OK, "not json").into_response(),
            "flaky" => StatusCode::SERVICE_UNAVAILABLE.into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    /// Start a mock registry on an ephemeral port, returning its base URL
    async fn start_mock_registry() -> String {
        let app = Router::new().route("/v1/services/:name", get(handle_service));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn test_service_url() {
        let registry = HttpRegistry::new("http://localhost:8500/", 5).unwrap();
        assert_eq!(registry.base_url(), "http://localhost:8500/");
        assert_eq!(
            registry.service_url("orders").as_str(),
            "http://localhost:8500/v1/services/orders"
        );

        let registry = HttpRegistry::new("http://gateway:8080/discovery/", 5).unwrap();
        assert_eq!(
            registry.service_url("orders").as_str(),
            "http://gateway:8080/discovery/v1/services/orders"
        );
    }

    #[test]
    fn test_service_url_encodes_name() {
        let registry = HttpRegistry::new("http://localhost:8500", 5).unwrap();
        let url = registry.service_url("orders/extra?x=1#frag");
        assert_eq!(url.as_str(), "http://localhost:8500/v1/services/orders%2Fextra%3Fx=1%23frag");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());

        assert_eq!(
            registry.service_url("team orders").as_str(),
            "http://localhost:8500/v1/services/team%20orders"
        );
    }

    #[test]
    fn test_new_rejects_bad_url() {
        assert!(HttpRegistry::new("not a url", 5).is_err());
        assert!(HttpRegistry::new("mailto:registry@example.com", 5).is_err());
    }

    #[tokio::test]
    async fn test_get_service_ok() {
        let url = start_mock_registry().await;
        let registry = HttpRegistry::new(&url, 5).unwrap();

        let instances = registry.get_service("orders").await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].nodes.len(), 2);
        assert_eq!(instances[0].nodes[1].address, "10.0.0.2:9000");
    }

    #[tokio::test]
    async fn test_get_service_not_found() {
        let url = start_mock_registry().await;
        let registry = HttpRegistry::new(&url, 5).unwrap();

        let err = registry.get_service("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_service_name_cannot_alter_request() {
        let url = start_mock_registry().await;
        let registry = HttpRegistry::new(&url, 5).unwrap();

        // The whole name is one path segment, never a query, fragment or subpath
        for name in ["orders?x=1", "orders#frag", "orders/extra"] {
            let err = registry.get_service(name).await.unwrap_err();
            assert_eq!(err, RegistryError::NotFound(name.to_string()), "name: {}", name);
        }
    }

    #[tokio::test]
    async fn test_get_service_malformed() {
        let url = start_mock_registry().await;
        let registry = HttpRegistry::new(&url, 5).unwrap();

        let err = registry.get_service("broken").await.unwrap_err();
        assert!(matches!(err, RegistryError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_get_service_unavailable() {
        let url = start_mock_registry().await;
        let registry = HttpRegistry::new(&url, 5).unwrap();

        let err = registry.get_service("flaky").await.unwrap_err();
        assert!(matches!(err, RegistryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_get_service_connection_refused() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let registry = HttpRegistry::new(&format!("http://{}", addr), 1).unwrap();
        let err = registry.get_service("orders").await.unwrap_err();
        assert!(matches!(err, RegistryError::Transport(_)));
    }
}
