use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::{Client, Url};
use rust_decimal::Decimal;
use scout_core::{normalize, ActivityRecord, FacetKind, Offer, TokenHolding};
use serde_json::Value;

use crate::config::MarketplaceConfig;
use crate::error::{AppError, AppResult};

// ============================================================================
// Facet results
// ============================================================================

/// Why a facet fell back to its default. Never propagated past the gateway.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid request url: {0}")]
    Url(String),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// One facet's value, fetched or substituted with its default.
#[derive(Debug)]
pub enum Facet<T> {
    Fetched(T),
    Degraded { value: T, error: UpstreamError },
}

impl<T: Default> Facet<T> {
    pub fn from_result(result: Result<T, UpstreamError>) -> Self {
        match result {
            Ok(value) => Facet::Fetched(value),
            Err(error) => Facet::Degraded {
                value: T::default(),
                error,
            },
        }
    }
}

impl<T> Facet<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Facet::Degraded { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            Facet::Fetched(value) | Facet::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Facet::Fetched(value) | Facet::Degraded { value, .. } => value,
        }
    }
}

// ============================================================================
// Magic Eden Gateway
// ============================================================================

#[derive(Clone)]
pub struct MarketplaceGateway {
    client: Client,
    base_url: Url,
    api_key: String,
    activity_page_size: u32,
}

impl MarketplaceGateway {
    pub fn new(config: &MarketplaceConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("eden-scout/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            AppError::Config(format!("Invalid marketplace base url {}: {}", config.base_url, e))
        })?;

        tracing::debug!(base_url = %base_url, "Creating Magic Eden gateway");

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            activity_page_size: config.activity_page_size,
        })
    }

    pub async fn fetch_activity(&self, address: &str) -> Facet<Vec<ActivityRecord>> {
        let limit = self.activity_page_size.to_string();
        let query = [("offset", "0"), ("limit", limit.as_str())];
        self.facet(FacetKind::Activity, address, async {
            let payload = self.get_json(address, "activities", &query).await?;
            Ok::<_, UpstreamError>(normalize::activity_records(&payload))
        })
        .await
    }

    pub async fn fetch_tokens(&self, address: &str) -> Facet<Vec<TokenHolding>> {
        self.facet(FacetKind::Tokens, address, async {
            let payload = self.get_json(address, "tokens", &[]).await?;
            Ok::<_, UpstreamError>(normalize::token_holdings(&payload))
        })
        .await
    }

    pub async fn fetch_escrow_balance(&self, address: &str) -> Facet<Decimal> {
        self.facet(FacetKind::Escrow, address, async {
            let payload = self.get_json(address, "escrow_balance", &[]).await?;
            Ok::<_, UpstreamError>(normalize::escrow_balance(&payload))
        })
        .await
    }

    pub async fn fetch_offers_made(&self, address: &str) -> Facet<Vec<Offer>> {
        self.facet(FacetKind::OffersMade, address, async {
            let payload = self.get_json(address, "offers_made", &[]).await?;
            Ok::<_, UpstreamError>(normalize::offers(&payload))
        })
        .await
    }

    pub async fn fetch_offers_received(&self, address: &str) -> Facet<Vec<Offer>> {
        self.facet(FacetKind::OffersReceived, address, async {
            let payload = self.get_json(address, "offers_received", &[]).await?;
            Ok::<_, UpstreamError>(normalize::offers(&payload))
        })
        .await
    }

    /// Run one facet request, logging and containing any failure.
    async fn facet<T, F>(&self, kind: FacetKind, address: &str, request: F) -> Facet<T>
    where
        T: Default,
        F: Future<Output = Result<T, UpstreamError>>,
    {
        let start = Instant::now();
        let facet = Facet::from_result(request.await);

        match &facet {
            Facet::Fetched(_) => tracing::debug!(
                wallet = %address,
                facet = %kind,
                duration_ms = %start.elapsed().as_millis(),
                "Fetched facet"
            ),
            Facet::Degraded { error, .. } => tracing::warn!(
                wallet = %address,
                facet = %kind,
                error = %error,
                duration_ms = %start.elapsed().as_millis(),
                "Facet degraded to default"
            ),
        }

        facet
    }

    fn wallet_url(&self, address: &str, resource: &str) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::Url(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["wallets", address, resource]);
        Ok(url)
    }

    /// The only place raw upstream JSON exists.
    async fn get_json(
        &self,
        address: &str,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, UpstreamError> {
        let url = self.wallet_url(address, resource)?;

        tracing::trace!(url = %url, "Requesting Magic Eden");

        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<Value>().await.map_err(UpstreamError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WALLET: &str = "9sBtLtMHWT1Srg1Q2wQMifuY6jrt14fPv7CTpyB6aHQE";

    fn gateway(server: &MockServer) -> MarketplaceGateway {
        MarketplaceGateway::new(&MarketplaceConfig {
            api_key: "test-key".to_string(),
            base_url: format!("{}/v2", server.uri()),
            request_timeout_secs: 5,
            activity_page_size: 20,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_activity_uses_bearer_and_page_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/wallets/{WALLET}/activities")))
            .and(query_param("offset", "0"))
            .and(query_param("limit", "20"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"type": "buyNow", "price": 1, "tokenMint": "M1"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let facet = gateway(&server).fetch_activity(WALLET).await;
        assert!(!facet.is_degraded());
        assert_eq!(facet.value().len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_degrades_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/wallets/{WALLET}/tokens")))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let facet = gateway(&server).fetch_tokens(WALLET).await;
        assert!(facet.is_degraded());
        assert!(matches!(
            facet,
            Facet::Degraded { error: UpstreamError::Status { status: 500, .. }, .. }
        ));
    }

    #[tokio::test]
    async fn test_bad_json_degrades_to_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/wallets/{WALLET}/escrow_balance")))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let facet = gateway(&server).fetch_escrow_balance(WALLET).await;
        assert!(matches!(facet, Facet::Degraded { error: UpstreamError::Decode(_), .. }));
        assert_eq!(facet.into_value(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_escrow_object_in_lamports() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/wallets/{WALLET}/escrow_balance")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"amount": 2_500_000_000u64})))
            .mount(&server)
            .await;

        let facet = gateway(&server).fetch_escrow_balance(WALLET).await;
        assert_eq!(facet.into_value(), dec!(2.5));
    }

    #[tokio::test]
    async fn test_unreachable_host_degrades() {
        let gateway = MarketplaceGateway::new(&MarketplaceConfig {
            api_key: "k".to_string(),
            base_url: "http://127.0.0.1:9/v2".to_string(),
            request_timeout_secs: 2,
            activity_page_size: 20,
        })
        .unwrap();

        let facet = gateway.fetch_offers_made(WALLET).await;
        assert!(matches!(facet, Facet::Degraded { error: UpstreamError::Transport(_), .. }));
        assert!(facet.value().is_empty());
    }

    #[tokio::test]
    async fn test_address_is_a_single_path_segment() {
        let server = MockServer::start().await;
        let gateway = gateway(&server);
        let url = gateway.wallet_url("a/b?c", "tokens").unwrap();
        assert!(url.path().ends_with("/wallets/a%2Fb%3Fc/tokens"));
    }
}
