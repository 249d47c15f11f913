//! Generic HTTP product provider.
//!
//! Expects `GET {base_url}/products/{asin}` to return a JSON product body.
//! Field aliases and string-encoded numbers are handled by
//! [`ProviderPayload`]'s deserializer.

use crate::ProductProvider;
use async_trait::async_trait;
use pulse_core::{Asin, ProviderError, ProviderPayload};
use reqwest::{Client, StatusCode};

const PROVIDER: &str = "http";

/// Longest error body kept in a `RequestFailed` message.
const MAX_ERROR_BODY: usize = 512;

pub struct HttpProductProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpProductProvider {
    /// Create a provider for `base_url`. A trailing slash is ignored.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ProviderError::NotConfigured);
        }
        let client = Client::builder()
            .user_agent(concat!("pulse-provider/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    fn product_url(&self, asin: &Asin) -> String {
        format!("{}/products/{}", self.base_url, asin)
    }
}

fn transport(reason: String) -> ProviderError {
    ProviderError::Transport {
        provider: PROVIDER.to_string(),
        reason,
    }
}

fn truncate(mut text: String) -> String {
    if text.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

#[async_trait]
impl ProductProvider for HttpProductProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_product(&self, asin: &Asin) -> Result<ProviderPayload, ProviderError> {
        let mut request = self
            .client
            .get(self.product_url(asin))
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport(format!("Failed to read response body: {}", e)))?;

        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::ProductNotFound {
                provider: PROVIDER.to_string(),
                asin: asin.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ProviderError::RequestFailed {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                message: truncate(body),
            });
        }

        let mut payload: ProviderPayload =
            serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to parse response: {}", e),
            })?;
        payload.asin = Some(asin.to_string());
        Ok(payload)
    }
}

impl std::fmt::Debug for HttpProductProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProductProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn asin() -> Asin {
        Asin::parse("B07XJWD7Z3").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_maps_aliases_and_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/B07XJWD7Z3"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Silicone Spatula",
                "manufacturer": "Kitchenly",
                "currentPrice": "14.99",
                "rank": 2100
            })))
            .mount(&server)
            .await;

        let provider =
            HttpProductProvider::new(format!("{}/", server.uri()), Some("secret".to_string()))
                .unwrap();
        let payload = provider.fetch_product(&asin()).await.unwrap();

        assert_eq!(payload.asin.as_deref(), Some("B07XJWD7Z3"));
        assert_eq!(payload.name.as_deref(), Some("Silicone Spatula"));
        assert_eq!(payload.manufacturer.as_deref(), Some("Kitchenly"));
        assert_eq!(payload.current_price, Some(14.99));
        assert_eq!(payload.rank, Some(2100.0));
    }

    #[tokio::test]
    async fn test_mixed_spellings_and_off_type_fields_decode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Spatula",
                "name": "Spatula Pro",
                "price": 9.5,
                "currentPrice": 9.75,
                "isHazmat": 0,
                "weight": 1.2
            })))
            .mount(&server)
            .await;

        let provider = HttpProductProvider::new(server.uri(), None).unwrap();
        let payload = provider.fetch_product(&asin()).await.unwrap();

        assert_eq!(payload.title.as_deref(), Some("Spatula"));
        assert_eq!(payload.price, Some(9.5));
        assert_eq!(payload.is_hazmat, Some(false));
        assert_eq!(payload.weight.as_deref(), Some("1.2"));
    }

    #[tokio::test]
    async fn test_404_is_product_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = HttpProductProvider::new(server.uri(), None).unwrap();
        let err = provider.fetch_product(&asin()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_server_error_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream busy"))
            .mount(&server)
            .await;

        let provider = HttpProductProvider::new(server.uri(), None).unwrap();
        match provider.fetch_product(&asin()).await.unwrap_err() {
            ProviderError::RequestFailed { status, message, .. } => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream busy");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let provider = HttpProductProvider::new(server.uri(), None).unwrap();
        let err = provider.fetch_product(&asin()).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }

    #[test]
    fn test_empty_base_url_is_not_configured() {
        let err = HttpProductProvider::new("/", None).unwrap_err();
        assert_eq!(err, ProviderError::NotConfigured);
    }

    #[test]
    fn test_error_body_is_truncated_on_char_boundary() {
        let text = "é".repeat(MAX_ERROR_BODY);
        let cut = truncate(text);
        assert!(cut.len() <= MAX_ERROR_BODY);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}
