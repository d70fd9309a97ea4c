//! In-memory ledger for tests and offline runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::layout::{encode_mapping, encode_price, encode_product};
use super::ledger::{AccountCallback, AccountKey, EpochInfo, LedgerClient};
use super::BridgeError;

/// Ledger backed by a map, counting every call it serves.
#[derive(Default)]
pub struct MemoryLedger {
    accounts: Mutex<BTreeMap<AccountKey, Vec<u8>>>,
    subscriptions: Mutex<Vec<(AccountKey, AccountCallback)>>,
    epoch: Mutex<Option<EpochInfo>>,
    latency: Mutex<Option<Duration>>,
    subscribe_latency: Mutex<Option<Duration>>,
    fail_reads: AtomicUsize,
    fail_subscribes: AtomicUsize,
    next_subscription: AtomicU64,
    account_calls: AtomicUsize,
    multiple_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
    epoch_calls: AtomicUsize,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_account(&self, key: AccountKey, data: Vec<u8>) {
        self.accounts.lock().insert(key, data);
    }

    /// Replace an account and notify its subscribers.
    pub fn push_update(&self, key: AccountKey, data: Vec<u8>) {
        self.accounts.lock().insert(key, data.clone());
        let callbacks: Vec<AccountCallback> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(&data);
        }
    }

    pub fn set_epoch(&self, info: EpochInfo) {
        *self.epoch.lock() = Some(info);
    }

    /// Sleep this long inside every read.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Fail the next `n` account reads with a transport error.
    pub fn fail_next_reads(&self, n: usize) {
        self.fail_reads.store(n, Ordering::SeqCst);
    }

    /// Sleep this long inside every subscribe.
    pub fn set_subscribe_latency(&self, latency: Duration) {
        *self.subscribe_latency.lock() = Some(latency);
    }

    /// Reject the next `n` subscribe calls with a socket error.
    pub fn fail_next_subscribes(&self, n: usize) {
        self.fail_subscribes.store(n, Ordering::SeqCst);
    }

    pub fn account_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }

    pub fn multiple_calls(&self) -> usize {
        self.multiple_calls.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn epoch_calls(&self) -> usize {
        self.epoch_calls.load(Ordering::SeqCst)
    }

    pub fn subscribed_keys(&self) -> Vec<AccountKey> {
        self.subscriptions.lock().iter().map(|(k, _)| *k).collect()
    }

    /// Populate a mapping with one product and price account per
    /// `(symbol, asset_type, price in cents)`. Returns the price keys.
    pub fn seed_oracle(
        &self,
        mapping: AccountKey,
        instruments: &[(&str, &str, i64)],
    ) -> Vec<AccountKey> {
        let mut products = Vec::with_capacity(instruments.len());
        let mut prices = Vec::with_capacity(instruments.len());
        for (i, &(symbol, asset_type, cents)) in instruments.iter().enumerate() {
            let product_key = derived_key(mapping, 1, i);
            let price_key = derived_key(mapping, 2, i);
            self.insert_account(
                product_key,
                encode_product(price_key, &[("symbol", symbol), ("asset_type", asset_type)]),
            );
            self.insert_account(price_key, encode_price(-2, cents, 1, 1));
            products.push(product_key);
            prices.push(price_key);
        }
        self.insert_account(mapping, encode_mapping(&products, None));
        prices
    }

    async fn before_read(&self) -> Result<(), BridgeError> {
        let latency = *self.latency.lock();
        match latency {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        let failed = self
            .fail_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(BridgeError::Transport("injected failure".to_string()));
        }
        Ok(())
    }
}

/// Deterministic key for fixtures.
pub fn derived_key(base: AccountKey, kind: u8, index: usize) -> AccountKey {
    let mut bytes = *base.as_bytes();
    bytes[0] ^= kind;
    bytes[24..32].copy_from_slice(&(index as u64).to_le_bytes());
    AccountKey::new(bytes)
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn get_account(&self, key: &AccountKey) -> Result<Option<Vec<u8>>, BridgeError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        self.before_read().await?;
        Ok(self.accounts.lock().get(key).cloned())
    }

    async fn get_multiple_accounts(
        &self,
        keys: &[AccountKey],
    ) -> Result<Vec<Option<Vec<u8>>>, BridgeError> {
        self.multiple_calls.fetch_add(1, Ordering::SeqCst);
        self.before_read().await?;
        let accounts = self.accounts.lock();
        Ok(keys.iter().map(|k| accounts.get(k).cloned()).collect())
    }

    async fn subscribe(&self, key: AccountKey, callback: AccountCallback) -> Result<u64, BridgeError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.subscribe_latency.lock();
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        let failed = self
            .fail_subscribes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(BridgeError::WebSocket("injected failure".to_string()));
        }
        self.subscriptions.lock().push((key, callback));
        Ok(self.next_subscription.fetch_add(1, Ordering::SeqCst))
    }

    async fn epoch_info(&self) -> Result<EpochInfo, BridgeError> {
        self.epoch_calls.fetch_add(1, Ordering::SeqCst);
        self.before_read().await?;
        (*self.epoch.lock()).ok_or_else(|| BridgeError::Payload("epoch info not set".to_string()))
    }
}
