//! Slow-changing reference data for the snapshot
//!
//! Per-instrument metadata (rank, market cap, all-time high, supply,
//! weekly price history) fetched once per session from a CoinGecko-style
//! REST endpoint and merged into the shared [`PriceSnapshot`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::snapshot::{Enrichment, PriceSnapshot};

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("json parse error: {0}")]
    JsonParse(String),

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),
}

/// Reference endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub base_url: String,
    /// Sent as `x-rapidapi-key` when the base URL is a RapidAPI proxy.
    pub api_key: Option<String>,
    /// Requests in flight at once.
    pub concurrency: usize,
    pub timeout: Duration,
    /// Display symbol to canonical coin id.
    pub instruments: BTreeMap<String, String>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            api_key: None,
            concurrency: 4,
            timeout: Duration::from_secs(10),
            instruments: default_instruments(),
        }
    }
}

/// Crypto pairs listed on the oracle with their CoinGecko ids.
pub fn default_instruments() -> BTreeMap<String, String> {
    [
        ("BCH/USD", "bitcoin-cash"),
        ("LTC/USD", "litecoin"),
        ("BTC/USD", "bitcoin"),
        ("ETH/USD", "ethereum"),
        ("SOL/USD", "solana"),
        ("SRM/USD", "serum"),
        ("USDC/USD", "usd-coin"),
        ("BNB/USD", "binancecoin"),
        ("DOGE/USD", "dogecoin"),
        ("USDT/USD", "tether"),
        ("LUNA/USD", "terra-luna"),
    ]
    .into_iter()
    .map(|(symbol, id)| (symbol.to_string(), id.to_string()))
    .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UsdAmount {
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Localized {
    pub en: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PriceSeries {
    #[serde(default)]
    pub price: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarketData {
    pub market_cap: Option<UsdAmount>,
    pub ath: Option<UsdAmount>,
    pub ath_change_percentage: Option<UsdAmount>,
    pub max_supply: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub sparkline_7d: Option<PriceSeries>,
}

/// Subset of the `/coins/{id}` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CoinInfo {
    pub id: Option<String>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub description: Option<Localized>,
    pub market_cap_rank: Option<u32>,
    pub market_data: Option<MarketData>,
}

impl CoinInfo {
    pub fn into_enrichment(self) -> Enrichment {
        let market = self.market_data.unwrap_or_default();
        let usd = |amount: Option<UsdAmount>| amount.and_then(|a| a.usd);
        Enrichment {
            asset_class: Some("Crypto".to_string()),
            description: self
                .description
                .and_then(|d| d.en)
                .filter(|text| !text.is_empty()),
            rank: self.market_cap_rank,
            market_cap: usd(market.market_cap),
            ath_price: usd(market.ath),
            ath_change_pct: usd(market.ath_change_percentage),
            max_supply: market.max_supply,
            circulating_supply: market.circulating_supply,
            sparkline_7d: market
                .sparkline_7d
                .map(|s| s.price)
                .filter(|p| !p.is_empty()),
        }
    }
}

/// Keyed reference lookup. Failures are per item.
#[async_trait]
pub trait ReferenceSource: Send + Sync + 'static {
    async fn coin(&self, id: &str) -> Result<CoinInfo, ReferenceError>;
}

/// HTTP client for the CoinGecko coins endpoint.
pub struct CoinGeckoClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    pub fn new(config: &ReferenceConfig) -> Result<Self, ReferenceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ReferenceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn coin_url(&self, id: &str) -> String {
        format!(
            "{}/coins/{}?localization=false&tickers=false&market_data=true\
             &community_data=false&developer_data=false&sparkline=true",
            self.base_url, id
        )
    }
}

#[async_trait]
impl ReferenceSource for CoinGeckoClient {
    async fn coin(&self, id: &str) -> Result<CoinInfo, ReferenceError> {
        let mut request = self.client.get(self.coin_url(id));
        if let Some(key) = &self.api_key {
            request = request.header("x-rapidapi-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ReferenceError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(ReferenceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ReferenceError::JsonParse(e.to_string()))
    }
}

/// Fetch every instrument with at most `concurrency` requests in flight
/// and merge the results into `snapshot`. Returns how many loaded.
pub async fn load_reference<S: ReferenceSource + ?Sized>(
    source: &S,
    snapshot: &PriceSnapshot,
    instruments: &BTreeMap<String, String>,
    concurrency: usize,
) -> usize {
    let start = Instant::now();
    let pairs: Vec<(String, String)> = instruments
        .iter()
        .map(|(symbol, id)| (symbol.clone(), id.clone()))
        .collect();
    let results: Vec<(String, Result<CoinInfo, ReferenceError>)> = stream::iter(pairs)
        .map(|(symbol, id)| async move {
            let result = source.coin(&id).await;
            (symbol, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut loaded = 0;
    for (symbol, result) in results {
        match result {
            Ok(info) => {
                snapshot.apply_enrichment(&symbol, info.into_enrichment());
                loaded += 1;
            }
            Err(err) => warn!(symbol = %symbol, error = %err, "Reference load failed"),
        }
    }

    info!(
        loaded,
        requested = instruments.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Reference data loaded"
    );
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const BTC_JSON: &str = r#"{
        "id": "bitcoin",
        "symbol": "btc",
        "name": "Bitcoin",
        "description": {"en": "Bitcoin is a cryptocurrency."},
        "market_cap_rank": 1,
        "market_data": {
            "market_cap": {"usd": 1.2e12, "eur": 1.1e12},
            "ath": {"usd": 69045.0},
            "ath_change_percentage": {"usd": -12.5},
            "max_supply": 21000000.0,
            "circulating_supply": 19500000.0,
            "sparkline_7d": {"price": [60000.0, 61000.0, 60500.0]}
        }
    }"#;

    struct Fixed;

    #[async_trait]
    impl ReferenceSource for Fixed {
        async fn coin(&self, id: &str) -> Result<CoinInfo, ReferenceError> {
            match id {
                "bitcoin" => serde_json::from_str(BTC_JSON)
                    .map_err(|e| ReferenceError::JsonParse(e.to_string())),
                other => Err(ReferenceError::UnknownInstrument(other.to_string())),
            }
        }
    }

    #[test]
    fn test_coin_info_to_enrichment() {
        let info: CoinInfo = serde_json::from_str(BTC_JSON).unwrap();
        let enrichment = info.into_enrichment();
        assert_eq!(enrichment.rank, Some(1));
        assert_eq!(enrichment.market_cap, Some(1.2e12));
        assert_eq!(enrichment.ath_price, Some(69045.0));
        assert_eq!(enrichment.ath_change_pct, Some(-12.5));
        assert_eq!(enrichment.max_supply, Some(21_000_000.0));
        assert_eq!(enrichment.sparkline_7d.map(|s| s.len()), Some(3));
        assert_eq!(enrichment.asset_class.as_deref(), Some("Crypto"));
    }

    #[test]
    fn test_sparse_coin_info() {
        let info: CoinInfo = serde_json::from_str(r#"{"id":"x","description":{"en":""}}"#).unwrap();
        let enrichment = info.into_enrichment();
        assert_eq!(enrichment.description, None);
        assert_eq!(enrichment.market_cap, None);
        assert_eq!(enrichment.sparkline_7d, None);
    }

    #[test]
    fn test_default_instruments() {
        let instruments = default_instruments();
        assert_eq!(instruments.len(), 11);
        assert_eq!(instruments["BTC/USD"], "bitcoin");
        assert_eq!(instruments["LUNA/USD"], "terra-luna");
    }

    #[tokio::test]
    async fn test_load_reference_skips_failures() {
        let snapshot = PriceSnapshot::new();
        let instruments: BTreeMap<String, String> = [
            ("BTC/USD".to_string(), "bitcoin".to_string()),
            ("XYZ/USD".to_string(), "nope".to_string()),
        ]
        .into_iter()
        .collect();

        let loaded = load_reference(&Fixed, &snapshot, &instruments, 2).await;
        assert_eq!(loaded, 1);
        assert_eq!(snapshot.len(), 1);
        let entry = snapshot.get("BTC/USD").unwrap();
        assert_eq!(entry.rank, Some(1));
        assert_eq!(snapshot.sparklines()["BTC/USD"].len(), 3);
    }

    #[tokio::test]
    async fn test_load_reference_from_spawned_task() {
        let snapshot = PriceSnapshot::new();
        let source: Arc<dyn ReferenceSource> = Arc::new(Fixed);
        let instruments = default_instruments();

        let task = {
            let snapshot = snapshot.clone();
            tokio::spawn(async move {
                load_reference(source.as_ref(), &snapshot, &instruments, 4).await
            })
        };

        assert_eq!(task.await.unwrap(), 1);
        assert_eq!(snapshot.get("BTC/USD").unwrap().rank, Some(1));
    }

    #[test]
    fn test_coin_url_query() {
        let client = CoinGeckoClient::new(&ReferenceConfig {
            base_url: "https://example.test/api/".to_string(),
            ..ReferenceConfig::default()
        })
        .unwrap();
        let url = client.coin_url("bitcoin");
        assert!(url.starts_with("https://example.test/api/coins/bitcoin?"));
        assert!(url.contains("market_data=true"));
        assert!(url.contains("sparkline=true"));
    }
}
