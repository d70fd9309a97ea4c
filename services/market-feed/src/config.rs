//! Service configuration
//!
//! Every setting has a default. `FEED_*` environment variables override
//! them; a value that fails to parse is logged and the default kept.
//!
//! | Variable              | Setting                          |
//! |-----------------------|----------------------------------|
//! | `FEED_POLL_MS`        | poll interval in milliseconds    |
//! | `FEED_SEED`           | RNG seed for the synthetic feeds |
//! | `FEED_LIVE`           | enable the ledger-backed feeds   |
//! | `FEED_RPC_URL`        | ledger JSON-RPC endpoint         |
//! | `FEED_WS_URL`         | ledger WebSocket endpoint        |
//! | `FEED_MAPPING_ACCOUNT`| first oracle mapping account     |
//! | `FEED_REFERENCE_URL`  | reference data base URL          |
//! | `FEED_REFERENCE_KEY`  | reference data API key           |

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::blocks::BlockTapeConfig;
use crate::bridge::reference::ReferenceConfig;
use crate::bridge::BridgeConfig;
use crate::order_book::OrderBookConfig;
use crate::trades::TradeTapeConfig;

/// Complete service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Sleep between the end of one poll and the start of the next.
    pub poll_interval: Duration,
    /// Run the ledger price board and block tape alongside the synthetic feeds.
    pub live: bool,
    pub order_book: OrderBookConfig,
    pub trades: TradeTapeConfig,
    pub blocks: BlockTapeConfig,
    pub bridge: BridgeConfig,
    pub reference: ReferenceConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            live: false,
            order_book: OrderBookConfig::default(),
            trades: TradeTapeConfig::default(),
            blocks: BlockTapeConfig::default(),
            bridge: BridgeConfig::default(),
            reference: ReferenceConfig::default(),
        }
    }
}

impl FeedConfig {
    /// Defaults overridden from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parsed::<u64>(&lookup, "FEED_POLL_MS") {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(seed) = parsed::<u64>(&lookup, "FEED_SEED") {
            config.order_book.seed = Some(seed);
            // Offset so the two synthetic streams do not move in lockstep.
            config.trades.seed = Some(seed.wrapping_add(1));
        }
        if let Some(live) = lookup("FEED_LIVE") {
            config.live = parse_flag(&live);
        }

        if let Some(url) = lookup("FEED_RPC_URL") {
            config.bridge.rpc_url = url;
        }
        if let Some(url) = lookup("FEED_WS_URL") {
            config.bridge.ws_url = url;
        }
        if let Some(key) = lookup("FEED_MAPPING_ACCOUNT") {
            config.bridge.mapping_account = key;
        }

        if let Some(url) = lookup("FEED_REFERENCE_URL") {
            config.reference.base_url = url;
        }
        config.reference.api_key = lookup("FEED_REFERENCE_KEY").filter(|k| !k.is_empty());

        config
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
