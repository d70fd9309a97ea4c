//! Block tape: recent slots with their cumulative transaction counts
//!
//! Every tick asks the ledger for the current epoch info. A repeat of the
//! head slot refreshes that row in place; a new slot is prepended. The
//! tape is capped at `max_rows`.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use feed_types::column::Column;
use feed_types::errors::SchemaError;
use feed_types::schema::Schema;
use feed_types::value::Value;
use row_codec::{EncodeError, Record, RowBuffer, TypedRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bridge::ledger::{EpochInfo, LedgerClient};
use crate::frame::{now_millis, Feed, Frame, FrameSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub slot: u64,
    pub transactions: u64,
    /// Last refresh, epoch milliseconds.
    pub time: i64,
}

impl Record for Block {
    fn value(&self, column: &Column) -> Value<'_> {
        match column.id.as_str() {
            "slot" => Value::from(self.slot),
            "transactions" => Value::from(self.transactions),
            "time" => Value::from(self.time),
            _ => Value::Empty,
        }
    }
}

impl TypedRecord for Block {
    const FIELDS: &'static [&'static str] = &["slot", "transactions", "time"];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockTapeConfig {
    pub max_rows: usize,
}

impl Default for BlockTapeConfig {
    fn default() -> Self {
        Self { max_rows: 50 }
    }
}

pub fn block_schema() -> Result<Schema, SchemaError> {
    Block::schema(vec![
        Column::number("slot", "Slot").with_precision(0),
        Column::number("transactions", "Transactions").with_precision(0),
        Column::timestamp("time", "Time"),
    ])
}

pub struct BlockTapeFeed<L: LedgerClient> {
    client: Arc<L>,
    config: BlockTapeConfig,
    schema: Schema,
    tape: VecDeque<Block>,
    buffer: RowBuffer,
}

impl<L: LedgerClient> BlockTapeFeed<L> {
    pub fn new(client: Arc<L>, config: BlockTapeConfig) -> Result<Self, SchemaError> {
        let schema = block_schema()?;
        let buffer = RowBuffer::with_rows(config.max_rows, schema.row_width());
        Ok(Self {
            client,
            schema,
            tape: VecDeque::with_capacity(config.max_rows),
            buffer,
            config,
        })
    }

    /// Fold one epoch reading into the tape.
    pub fn record(&mut self, epoch: EpochInfo) {
        let transactions = epoch.transaction_count.unwrap_or_default();
        let now = now_millis();
        match self.tape.front_mut() {
            Some(head) if head.slot == epoch.absolute_slot => {
                head.transactions = transactions;
                head.time = now;
            }
            _ => {
                self.tape.push_front(Block {
                    slot: epoch.absolute_slot,
                    transactions,
                    time: now,
                });
                self.tape.truncate(self.config.max_rows);
            }
        }
    }

    /// Encode the current tape.
    pub fn encode(&mut self) -> Result<Frame<'_>, EncodeError> {
        let Self {
            schema,
            tape,
            buffer,
            ..
        } = self;
        let blocks = tape.make_contiguous();
        let data = buffer.encode_records(blocks, schema)?;
        Ok(Frame {
            stream: "blocks",
            schema,
            data,
            row_count: blocks.len(),
        })
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.tape.iter()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[async_trait]
impl<L: LedgerClient> Feed for BlockTapeFeed<L> {
    fn name(&self) -> &'static str {
        "blocks"
    }

    async fn poll(&mut self, sink: &mut (dyn FrameSink + Send)) {
        match self.client.epoch_info().await {
            Ok(epoch) => {
                debug!(slot = epoch.absolute_slot, "Epoch info");
                self.record(epoch);
            }
            // Stale tape is still emitted.
            Err(err) => warn!(error = %err, "Epoch info fetch failed"),
        }

        match self.encode() {
            Ok(frame) => sink.accept(frame),
            Err(err) => warn!(error = %err, "Block tape encode failed"),
        }
    }
}
