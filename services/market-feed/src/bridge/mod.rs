//! Live price bridge
//!
//! Builds and maintains a [`PriceSnapshot`] from the oracle accounts on a
//! remote ledger:
//!
//! ```text
//! Uninitialized
//!      │ first ensure_initialized()
//! ┌────▼─────────┐
//! │Bootstrapping │  mapping account(s) → product keys
//! └────┬─────────┘
//! ┌────▼─────────────┐
//! │FetchingProducts  │  chunked fetch, parse, drop unparseable
//! └────┬─────────────┘
//! ┌────▼─────────────┐
//! │FetchingPrices    │  chunked fetch, initial merge
//! └────┬─────────────┘
//! ┌────▼─────────────┐
//! │Subscribed        │  account-change callbacks re-merge
//! └──────────────────┘
//! ```
//!
//! Bootstrap runs at most once at a time. Concurrent callers share one
//! in-flight attempt; a failed attempt clears the guard so the next poll
//! tries again. The attempt runs in its own task, so it still completes
//! when every caller has gone away. The timeout covers the fetch phases
//! only. An attempt in which no price account could be subscribed counts
//! as failed. Reference enrichment is started on the first call and runs
//! independently of the price path.

pub mod layout;
pub mod ledger;
pub mod memory;
pub mod reconnect;
pub mod reference;
pub mod rpc;
pub mod snapshot;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::frame::now_millis;
use layout::{parse_mapping, parse_price, parse_product, LayoutError, Product};
use ledger::{fetch_accounts_chunked, AccountCallback, AccountKey, LedgerClient, MAX_CHUNK_SIZE};
use reconnect::ReconnectConfig;
use reference::{load_reference, ReferenceConfig, ReferenceSource};
use snapshot::{Listing, PriceSnapshot, PriceUpdate};

/// Mapping pages followed before giving up on a chain.
const MAX_MAPPING_PAGES: usize = 16;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("account not found: {0}")]
    MissingAccount(AccountKey),

    #[error("invalid account key {0}")]
    InvalidKey(String),

    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("unexpected payload: {0}")]
    Payload(String),

    #[error("bootstrap timed out after {0:?}")]
    Timeout(Duration),

    #[error("no price account could be subscribed ({attempted} attempted)")]
    NoSubscriptions { attempted: usize },

    #[error("subscription channel closed")]
    ChannelClosed,
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::Transport(err.to_string())
    }
}

/// Ledger endpoints and bootstrap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub rpc_url: String,
    pub ws_url: String,
    /// Base58 key of the first mapping account.
    pub mapping_account: String,
    /// Keys per `getMultipleAccounts` request, at most 99.
    pub chunk_size: usize,
    pub commitment: String,
    /// Bounds the fetch phases. Subscribing is never cut short, so a
    /// retry cannot leave half-registered callbacks behind. `None` waits
    /// on the transport indefinitely.
    pub bootstrap_timeout: Option<Duration>,
    /// Backoff for the subscription socket.
    pub reconnect: ReconnectConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.devnet.solana.com".to_string(),
            ws_url: "wss://api.devnet.solana.com".to_string(),
            mapping_account: "ArppEFcsybCLE8CRtQJLQ9tLv2peGmQoKWFuiUWm4KBP".to_string(),
            chunk_size: MAX_CHUNK_SIZE,
            commitment: "confirmed".to_string(),
            bootstrap_timeout: Some(Duration::from_secs(30)),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Bootstrap progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    Bootstrapping,
    FetchingProducts,
    FetchingPrices,
    Subscribed { instruments: usize },
    Failed { reason: String },
}

type Bootstrap = Shared<BoxFuture<'static, Option<usize>>>;

struct Inner<L> {
    client: Arc<L>,
    config: BridgeConfig,
    mapping: AccountKey,
    snapshot: PriceSnapshot,
    state: Mutex<BridgeState>,
    /// Price accounts with a confirmed subscription.
    subscribed: Mutex<BTreeSet<AccountKey>>,
}

/// Bridge from ledger oracle accounts to the shared snapshot.
pub struct PriceBridge<L: LedgerClient> {
    inner: Arc<Inner<L>>,
    pending: Mutex<Option<Bootstrap>>,
    reference: Option<(Arc<dyn ReferenceSource>, ReferenceConfig)>,
    enrichment_started: AtomicBool,
}

impl<L: LedgerClient> PriceBridge<L> {
    pub fn new(client: Arc<L>, config: BridgeConfig) -> Result<Self, BridgeError> {
        let mapping: AccountKey = config.mapping_account.parse()?;
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                config,
                mapping,
                snapshot: PriceSnapshot::new(),
                state: Mutex::new(BridgeState::Uninitialized),
                subscribed: Mutex::new(BTreeSet::new()),
            }),
            pending: Mutex::new(None),
            reference: None,
            enrichment_started: AtomicBool::new(false),
        })
    }

    /// Enrich the snapshot from `source` once, on the first initialization.
    pub fn with_reference(
        mut self,
        source: Arc<dyn ReferenceSource>,
        config: ReferenceConfig,
    ) -> Self {
        self.reference = Some((source, config));
        self
    }

    /// Handle to the shared snapshot.
    pub fn snapshot(&self) -> PriceSnapshot {
        self.inner.snapshot.clone()
    }

    pub fn state(&self) -> BridgeState {
        self.inner.state.lock().clone()
    }

    pub fn client(&self) -> &Arc<L> {
        &self.inner.client
    }

    /// Bootstrap unless already done or in flight, then wait for it.
    ///
    /// Returns `true` once subscribed. Never fails: errors are logged, the
    /// snapshot stays as it is and a later call retries.
    pub async fn ensure_initialized(&self) -> bool {
        self.start_enrichment();

        let bootstrap = {
            let mut slot = self.pending.lock();
            match slot.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    // Spawned so the attempt outlives a cancelled caller.
                    let task = tokio::spawn(self.inner.clone().run_bootstrap());
                    let fut = async move { task.await.ok().flatten() }.boxed().shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };

        let result = bootstrap.clone().await;
        if result.is_none() {
            let mut slot = self.pending.lock();
            if slot.as_ref().is_some_and(|current| current.ptr_eq(&bootstrap)) {
                *slot = None;
            }
        }
        result.is_some()
    }

    fn start_enrichment(&self) {
        let Some((source, config)) = &self.reference else {
            return;
        };
        if self.enrichment_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let source = source.clone();
        let config = config.clone();
        let snapshot = self.inner.snapshot.clone();
        tokio::spawn(async move {
            load_reference(
                source.as_ref(),
                &snapshot,
                &config.instruments,
                config.concurrency,
            )
            .await;
        });
    }
}

impl<L: LedgerClient> Inner<L> {
    fn set_state(&self, state: BridgeState) {
        debug!(state = ?state, "Bridge state");
        *self.state.lock() = state;
    }

    async fn run_bootstrap(self: Arc<Self>) -> Option<usize> {
        info!(mapping = %self.mapping, "Bridge initializing");
        let start = Instant::now();
        let fetch = self.fetch(start);
        let fetched = match self.config.bootstrap_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .unwrap_or(Err(BridgeError::Timeout(limit))),
            None => fetch.await,
        };
        let result = match fetched {
            Ok(appliers) => self.subscribe_all(appliers, start).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(instruments) => {
                self.set_state(BridgeState::Subscribed { instruments });
                Some(instruments)
            }
            Err(err) => {
                error!(error = %err, "Bridge bootstrap failed");
                self.set_state(BridgeState::Failed {
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    /// Fetch and merge every listed price. Returns one callback per price
    /// account, ready to subscribe.
    async fn fetch(
        &self,
        start: Instant,
    ) -> Result<Vec<(AccountKey, AccountCallback)>, BridgeError> {
        let elapsed_ms = || start.elapsed().as_millis() as u64;

        self.set_state(BridgeState::Bootstrapping);
        let product_keys = self.load_mapping().await?;
        info!(products = product_keys.len(), elapsed_ms = elapsed_ms(), "Loaded mapping accounts");

        self.set_state(BridgeState::FetchingProducts);
        let accounts =
            fetch_accounts_chunked(self.client.as_ref(), &product_keys, self.config.chunk_size)
                .await?;
        info!(accounts = accounts.len(), elapsed_ms = elapsed_ms(), "Loaded product accounts");

        let products: Vec<Product> = accounts
            .iter()
            .filter_map(|(key, data)| match parse_product(data) {
                Ok(product) if product.display_symbol().is_some() => Some(product),
                Ok(_) => {
                    warn!(account = %key, "Product without symbol, skipping");
                    None
                }
                Err(err) => {
                    warn!(account = %key, error = %err, "Product parse failed, skipping");
                    None
                }
            })
            .collect();
        info!(products = products.len(), elapsed_ms = elapsed_ms(), "Parsed products");

        self.set_state(BridgeState::FetchingPrices);
        let by_price: BTreeMap<AccountKey, &Product> =
            products.iter().map(|p| (p.price_account, p)).collect();
        let price_keys: Vec<AccountKey> = by_price.keys().copied().collect();
        let prices =
            fetch_accounts_chunked(self.client.as_ref(), &price_keys, self.config.chunk_size)
                .await?;
        info!(accounts = prices.len(), elapsed_ms = elapsed_ms(), "Loaded price accounts");

        let mut appliers = Vec::with_capacity(prices.len());
        for (key, data) in &prices {
            let Some(product) = by_price.get(key) else {
                continue;
            };
            let apply = price_applier(self.snapshot.clone(), product, *key);
            apply(data);
            appliers.push((*key, apply));
        }
        Ok(appliers)
    }

    /// Subscribe every price account not already subscribed. Fails when
    /// there were accounts and none of them is subscribed.
    async fn subscribe_all(
        &self,
        appliers: Vec<(AccountKey, AccountCallback)>,
        start: Instant,
    ) -> Result<usize, BridgeError> {
        let attempted = appliers.len();
        let fresh: Vec<(AccountKey, AccountCallback)> = {
            let subscribed = self.subscribed.lock();
            appliers
                .into_iter()
                .filter(|(key, _)| !subscribed.contains(key))
                .collect()
        };

        let results = join_all(fresh.into_iter().map(|(key, apply)| async move {
            (key, self.client.subscribe(key, apply).await)
        }))
        .await;

        for (key, result) in results {
            match result {
                Ok(_) => {
                    self.subscribed.lock().insert(key);
                }
                Err(err) => warn!(account = %key, error = %err, "Price subscription failed"),
            }
        }

        let subscribed = self.subscribed.lock().len();
        if attempted > 0 && subscribed == 0 {
            return Err(BridgeError::NoSubscriptions { attempted });
        }
        info!(
            instruments = subscribed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Subscribed to instruments"
        );
        Ok(subscribed)
    }

    /// Product keys from the mapping chain.
    async fn load_mapping(&self) -> Result<Vec<AccountKey>, BridgeError> {
        let mut keys = Vec::new();
        let mut seen = BTreeSet::new();
        let mut next = Some(self.mapping);

        while let Some(key) = next {
            if !seen.insert(key) || seen.len() > MAX_MAPPING_PAGES {
                warn!(account = %key, pages = seen.len(), "Mapping chain cut short");
                break;
            }
            let data = self
                .client
                .get_account(&key)
                .await?
                .ok_or(BridgeError::MissingAccount(key))?;
            let mapping = parse_mapping(&data)?;
            debug!(account = %key, products = mapping.products.len(), "Loaded mapping page");
            keys.extend(mapping.products);
            next = mapping.next;
        }
        Ok(keys)
    }
}

/// Callback that parses a price account and merges it under the
/// product's display symbol.
fn price_applier(snapshot: PriceSnapshot, product: &Product, account: AccountKey) -> AccountCallback {
    let symbol = product.display_symbol().unwrap_or_default().to_string();
    let listing = Listing {
        asset_class: product.asset_type().map(str::to_string),
        description: product.description().map(str::to_string),
    };

    Arc::new(move |data: &[u8]| match parse_price(data) {
        Ok(price) => {
            snapshot.apply_listed_price(
                &symbol,
                &listing,
                PriceUpdate {
                    price: Some(price.price),
                    confidence: Some(price.confidence),
                    time: Some(now_millis()),
                },
            );
        }
        Err(err) => warn!(account = %account, symbol = %symbol, error = %err, "Price parse failed"),
    })
}
