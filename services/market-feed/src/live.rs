//! Snapshot consumer: turns the live price snapshot into encoded rows
//!
//! Each poll makes sure the bridge is initialized, reads the snapshot and
//! encodes it sorted by asset class then symbol, both case-insensitive.
//! Supply figures are emitted in millions. The sparkline column carries
//! the symbol as a lookup key into [`PriceSnapshot::sparklines`].
//!
//! In incremental mode only entries written since the previous poll are
//! re-read; the rest come from the adapter's own cache.

use std::collections::BTreeMap;

use async_trait::async_trait;
use feed_types::column::Column;
use feed_types::errors::SchemaError;
use feed_types::schema::Schema;
use feed_types::value::Value;
use row_codec::{EncodeError, Record, RowBuffer, TypedRecord};
use tracing::error;

use crate::bridge::ledger::LedgerClient;
use crate::bridge::snapshot::{PriceEntry, PriceSnapshot};
use crate::bridge::PriceBridge;
use crate::frame::{Feed, Frame, FrameSink};

const MILLION: f64 = 1_000_000.0;

impl Record for PriceEntry {
    fn value(&self, column: &Column) -> Value<'_> {
        match column.id.as_str() {
            "symbol" | "spark" => Value::from(self.symbol.as_str()),
            "asset" => Value::from(self.asset_class.as_deref()),
            "description" => Value::from(self.description.as_deref()),
            "price" => Value::from(self.price),
            "confidence" => Value::from(self.confidence),
            "time" => Value::from(self.time),
            "rank" => Value::from(self.rank.map(f64::from)),
            "market_cap" => Value::from(self.market_cap),
            "ath" => Value::from(self.ath_price),
            "ath_change" => Value::from(self.ath_change_pct),
            "max_supply" => Value::from(self.max_supply.map(|v| v / MILLION)),
            "circulating_supply" => Value::from(self.circulating_supply.map(|v| v / MILLION)),
            _ => Value::Empty,
        }
    }
}

impl TypedRecord for PriceEntry {
    const FIELDS: &'static [&'static str] = &[
        "symbol",
        "asset",
        "description",
        "price",
        "confidence",
        "time",
        "rank",
        "market_cap",
        "ath",
        "ath_change",
        "max_supply",
        "circulating_supply",
        "spark",
    ];
}

/// Market board layout.
pub fn price_schema() -> Result<Schema, SchemaError> {
    PriceEntry::schema(vec![
        Column::text("symbol", "Symbol", 16).highlighted(),
        Column::text("asset", "Asset", 8),
        Column::number("price", "Price").with_precision(5),
        Column::number("confidence", "Confidence").with_precision(5),
        Column::timestamp("time", "Time"),
        Column::number("rank", "Rank").with_precision(0),
        Column::number("market_cap", "Market Cap").with_precision(0),
        Column::number("ath", "ATH").with_precision(2),
        Column::number("ath_change", "ATH %").with_precision(2),
        Column::number("max_supply", "Max Supply (M)").with_precision(2),
        Column::number("circulating_supply", "Circulating (M)").with_precision(2),
        Column::sparkline("spark", "7d", 16),
        Column::text("description", "Description", 64).hidden(),
    ])
}

/// Deterministic board order.
fn sort_key(entry: &PriceEntry) -> (String, String) {
    (
        entry.asset_class.as_deref().unwrap_or_default().to_lowercase(),
        entry.symbol.to_lowercase(),
    )
}

/// Encodes the bridge snapshot on every poll.
pub struct PriceFeed<L: LedgerClient> {
    bridge: PriceBridge<L>,
    snapshot: PriceSnapshot,
    schema: Schema,
    buffer: RowBuffer,
    rows: Vec<PriceEntry>,
    incremental: bool,
    cache: BTreeMap<String, PriceEntry>,
    last_revision: u64,
}

impl<L: LedgerClient> PriceFeed<L> {
    pub fn new(bridge: PriceBridge<L>) -> Result<Self, SchemaError> {
        let snapshot = bridge.snapshot();
        Ok(Self {
            bridge,
            snapshot,
            schema: price_schema()?,
            buffer: RowBuffer::new(),
            rows: Vec::new(),
            incremental: false,
            cache: BTreeMap::new(),
            last_revision: 0,
        })
    }

    /// Only re-read entries changed since the previous poll.
    pub fn incremental(mut self, enabled: bool) -> Self {
        self.incremental = enabled;
        self
    }

    pub fn bridge(&self) -> &PriceBridge<L> {
        &self.bridge
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Refresh rows from the snapshot and encode them.
    pub async fn tick(&mut self) -> Result<Frame<'_>, EncodeError> {
        self.bridge.ensure_initialized().await;

        if self.incremental {
            let revision = self.snapshot.revision();
            for entry in self.snapshot.updated_since(self.last_revision) {
                self.cache.insert(entry.symbol.clone(), entry);
            }
            self.last_revision = revision;
            self.rows.clear();
            self.rows.extend(self.cache.values().cloned());
        } else {
            self.rows = self.snapshot.entries();
        }
        self.rows.sort_by_cached_key(sort_key);

        let data = self.buffer.encode_records(&self.rows, &self.schema)?;
        Ok(Frame {
            stream: "prices",
            schema: &self.schema,
            data,
            row_count: self.rows.len(),
        })
    }
}

#[async_trait]
impl<L: LedgerClient> Feed for PriceFeed<L> {
    fn name(&self) -> &'static str {
        "prices"
    }

    async fn poll(&mut self, sink: &mut (dyn FrameSink + Send)) {
        match self.tick().await {
            Ok(frame) => sink.accept(frame),
            Err(err) => error!(error = %err, "Price feed tick failed"),
        }
    }
}
