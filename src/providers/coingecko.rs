//! CoinGecko market-data source implementation

use crate::{
    config::CoinGeckoConfig,
    constants::{
        COINGECKO_API_KEY_HEADER, COINGECKO_COIN_LIST_ENDPOINT, COINGECKO_MARKETS_ENDPOINT,
        USER_AGENT,
    },
    error::ProviderError,
    provider::MarketDataSource,
    types::{CoinListing, CoinMarketData},
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// CoinGecko market-data source
pub struct CoinGeckoSource {
    client: Client,
    config: CoinGeckoConfig,
}

impl CoinGeckoSource {
    /// Creates a new CoinGecko source
    pub fn new(config: CoinGeckoConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::NetworkError)?;

        Ok(Self { client, config })
    }

    /// Creates a source configured from `COINGECKO_*` environment variables
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(CoinGeckoConfig::from_env())
    }

    fn coin_list_url(&self) -> String {
        format!("{}{}", self.config.base_url, COINGECKO_COIN_LIST_ENDPOINT)
    }

    /// Builds the market request for a batch of ids
    fn markets_request(&self, ids: &[String], vs_currency: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.base_url, COINGECKO_MARKETS_ENDPOINT);
        self.client
            .get(url)
            .query(&[("ids", ids.join(",").as_str()), ("vs_currency", vs_currency)])
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header(COINGECKO_API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(ProviderError::NetworkError)?;

        if response.status().as_u16() == 429 {
            return Err(ProviderError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let response_text = response.text().await.map_err(ProviderError::NetworkError)?;
        parse_body(&response_text)
    }

    /// Fetches the coin catalog, surfacing transport and decode errors
    pub async fn try_list_coins(&self) -> Result<Vec<CoinListing>, ProviderError> {
        let url = self.coin_list_url();
        tracing::debug!(url = %url, "Fetching coin list from CoinGecko");
        self.fetch_json(self.client.get(url)).await
    }

    /// Fetches market data for `ids`, surfacing transport and decode errors
    pub async fn try_get_market(
        &self,
        ids: &[String],
        vs_currency: &str,
    ) -> Result<Vec<CoinMarketData>, ProviderError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(ids = ids.len(), vs_currency, "Fetching market data from CoinGecko");
        self.fetch_json(self.markets_request(ids, vs_currency)).await
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| {
        ProviderError::InvalidResponse(format!(
            "Failed to parse CoinGecko response: {}. Response: {}",
            e, body
        ))
    })
}

#[async_trait]
impl MarketDataSource for CoinGeckoSource {
    async fn list_coins(&self) -> Vec<CoinListing> {
        match self.try_list_coins().await {
            Ok(coins) => {
                tracing::debug!(count = coins.len(), "Fetched CoinGecko coin list");
                coins
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to retrieve coin list from CoinGecko");
                Vec::new()
            }
        }
    }

    async fn get_market(&self, ids: &[String], vs_currency: &str) -> Vec<CoinMarketData> {
        match self.try_get_market(ids, vs_currency).await {
            Ok(market) => market,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    ids = ids.len(),
                    vs_currency,
                    "Failed to retrieve market data from CoinGecko"
                );
                Vec::new()
            }
        }
    }

    fn source_name(&self) -> &'static str {
        "coingecko"
    }
}
