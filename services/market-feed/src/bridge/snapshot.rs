//! Shared price snapshot
//!
//! Append-only map from display symbol to [`PriceEntry`]. Two writers feed
//! it: oracle price updates and reference-data enrichment. Each owns its
//! own fields and a merge only overwrites the fields the update carries,
//! so the two can arrive in either order. Price updates own price,
//! confidence and time. Reference data owns everything else; the oracle
//! listing may only fill asset class and description while they are unset.
//!
//! A single mutex guards the map; every merge is one critical section.
//! Each write stamps the entry with a fresh revision so readers can ask
//! for "everything changed since revision N".

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Current state of one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub symbol: String,
    pub price: Option<f64>,
    pub confidence: Option<f64>,
    /// Last price update, epoch milliseconds.
    pub time: Option<i64>,
    pub asset_class: Option<String>,
    pub description: Option<String>,
    pub rank: Option<u32>,
    pub market_cap: Option<f64>,
    pub ath_price: Option<f64>,
    pub ath_change_pct: Option<f64>,
    pub max_supply: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub sparkline_7d: Option<Vec<f64>>,
    /// Revision of the last write to this entry.
    pub revision: u64,
}

/// Fields carried by an oracle price update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceUpdate {
    pub price: Option<f64>,
    pub confidence: Option<f64>,
    pub time: Option<i64>,
}

/// Product attributes from the oracle listing. Defaults only: they fill
/// fields nobody has set and never replace reference data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub asset_class: Option<String>,
    pub description: Option<String>,
}

/// Fields carried by reference data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub asset_class: Option<String>,
    pub description: Option<String>,
    pub rank: Option<u32>,
    pub market_cap: Option<f64>,
    pub ath_price: Option<f64>,
    pub ath_change_pct: Option<f64>,
    pub max_supply: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub sparkline_7d: Option<Vec<f64>>,
}

/// Overwrite `slot` only when the update carries a value.
fn merge<T>(slot: &mut Option<T>, update: Option<T>) {
    if update.is_some() {
        *slot = update;
    }
}

impl PriceEntry {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn merge_price(&mut self, update: PriceUpdate) {
        merge(&mut self.price, update.price);
        merge(&mut self.confidence, update.confidence);
        merge(&mut self.time, update.time);
    }

    /// Fill listing fields that are still unset.
    pub fn fill_listing(&mut self, listing: &Listing) {
        if self.asset_class.is_none() {
            self.asset_class = listing.asset_class.clone();
        }
        if self.description.is_none() {
            self.description = listing.description.clone();
        }
    }

    pub fn merge_enrichment(&mut self, update: Enrichment) {
        merge(&mut self.asset_class, update.asset_class);
        merge(&mut self.description, update.description);
        merge(&mut self.rank, update.rank);
        merge(&mut self.market_cap, update.market_cap);
        merge(&mut self.ath_price, update.ath_price);
        merge(&mut self.ath_change_pct, update.ath_change_pct);
        merge(&mut self.max_supply, update.max_supply);
        merge(&mut self.circulating_supply, update.circulating_supply);
        merge(&mut self.sparkline_7d, update.sparkline_7d);
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, PriceEntry>,
    revision: u64,
}

impl Inner {
    fn upsert(&mut self, symbol: &str, apply: impl FnOnce(&mut PriceEntry)) -> u64 {
        self.revision += 1;
        let revision = self.revision;
        let entry = self
            .entries
            .entry(symbol.to_string())
            .or_insert_with(|| PriceEntry::new(symbol));
        apply(entry);
        entry.revision = revision;
        revision
    }
}

/// Cloneable handle to the shared map.
#[derive(Debug, Clone, Default)]
pub struct PriceSnapshot {
    inner: Arc<Mutex<Inner>>,
}

impl PriceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a price update, creating the entry on first sight. Returns
    /// the new revision.
    pub fn apply_price(&self, symbol: &str, update: PriceUpdate) -> u64 {
        self.inner
            .lock()
            .upsert(symbol, |entry| entry.merge_price(update))
    }

    /// Merge a price update for a listed product. Listing attributes only
    /// fill fields still unset, so reference data always wins.
    pub fn apply_listed_price(&self, symbol: &str, listing: &Listing, update: PriceUpdate) -> u64 {
        self.inner.lock().upsert(symbol, |entry| {
            entry.fill_listing(listing);
            entry.merge_price(update);
        })
    }

    /// Merge reference data, creating a placeholder entry if no price has
    /// arrived yet.
    pub fn apply_enrichment(&self, symbol: &str, update: Enrichment) -> u64 {
        self.inner
            .lock()
            .upsert(symbol, |entry| entry.merge_enrichment(update))
    }

    pub fn get(&self, symbol: &str) -> Option<PriceEntry> {
        self.inner.lock().entries.get(symbol).cloned()
    }

    /// All entries, ordered by symbol.
    pub fn entries(&self) -> Vec<PriceEntry> {
        self.inner.lock().entries.values().cloned().collect()
    }

    /// Entries written after `revision`.
    pub fn updated_since(&self, revision: u64) -> Vec<PriceEntry> {
        self.inner
            .lock()
            .entries
            .values()
            .filter(|e| e.revision > revision)
            .cloned()
            .collect()
    }

    /// Latest revision handed out.
    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Weekly price series by symbol, for sparkline lookups.
    pub fn sparklines(&self) -> BTreeMap<String, Vec<f64>> {
        self.inner
            .lock()
            .entries
            .values()
            .filter_map(|e| Some((e.symbol.clone(), e.sparkline_7d.clone()?)))
            .collect()
    }
}
