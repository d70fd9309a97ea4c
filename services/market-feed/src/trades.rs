//! Synthetic trade tape
//!
//! A capped, time-ordered list of trades, most recent first. Every tick
//! prepends a small random batch, truncates back to `max_rows` and
//! re-encodes the whole list.

use std::collections::VecDeque;

use async_trait::async_trait;
use feed_types::column::Column;
use feed_types::errors::SchemaError;
use feed_types::schema::{calc_row_width, Schema};
use feed_types::value::Value;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use row_codec::{EncodeError, Record, RowBuffer, TypedRecord};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::frame::{now_millis, Feed, Frame, FrameSink};
use crate::order_book::below;

/// One executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Rounded to 3 decimals.
    pub price: f64,
    /// Whole units.
    pub size: f64,
    /// Epoch milliseconds.
    pub time: i64,
}

impl Record for Trade {
    fn value(&self, column: &Column) -> Value<'_> {
        match column.id.as_str() {
            "price" => Value::Number(self.price),
            "size" => Value::Number(self.size),
            "time" => Value::from(self.time),
            _ => Value::Empty,
        }
    }
}

impl TypedRecord for Trade {
    const FIELDS: &'static [&'static str] = &["price", "size", "time"];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeTapeConfig {
    /// Lower bound on the initial tape length.
    pub min_rows: usize,
    /// The tape never holds more than this many trades.
    pub max_rows: usize,
    /// Exclusive upper bound on trades added per tick.
    pub max_batch: usize,
    pub max_price: f64,
    pub max_size: u32,
    pub seed: Option<u64>,
}

impl Default for TradeTapeConfig {
    fn default() -> Self {
        Self {
            min_rows: 30,
            max_rows: 50,
            max_batch: 5,
            max_price: 5.0,
            max_size: 500,
            seed: None,
        }
    }
}

pub fn tape_schema() -> Result<Schema, SchemaError> {
    Trade::schema(vec![
        Column::number("price", "Price").with_precision(3),
        Column::number("size", "Size").with_precision(0),
        Column::timestamp("time", "Time"),
    ])
}

/// Encoded tape produced by one tick.
#[derive(Debug)]
pub struct TapeFrame<'a> {
    pub schema: &'a Schema,
    pub data: &'a [u8],
    pub row_count: usize,
}

/// Trade tape generator.
pub struct TradeTapeFeed {
    config: TradeTapeConfig,
    schema: Schema,
    tape: VecDeque<Trade>,
    buffer: RowBuffer,
    rng: ChaCha8Rng,
}

impl TradeTapeFeed {
    pub fn new(config: TradeTapeConfig) -> Result<Self, SchemaError> {
        let schema = tape_schema()?;
        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let now = now_millis();
        let count = config
            .min_rows
            .max(below(&mut rng, config.max_rows))
            .min(config.max_rows);
        let mut initial: Vec<Trade> = (0..count)
            .map(|_| {
                let age = below(&mut rng, 60_000) as i64;
                random_trade(&mut rng, &config, now - age)
            })
            .collect();
        initial.sort_by(|a, b| b.time.cmp(&a.time));

        let row_width = calc_row_width(&schema);
        info!(trades = initial.len(), row_width, "TradeTapeFeed initialized");

        Ok(Self {
            buffer: RowBuffer::with_rows(config.max_rows, row_width),
            tape: initial.into(),
            schema,
            config,
            rng,
        })
    }

    /// Add a batch of new trades and encode the tape.
    pub fn tick(&mut self) -> Result<TapeFrame<'_>, EncodeError> {
        let batch = below(&mut self.rng, self.config.max_batch);
        let now = now_millis();
        for _ in 0..batch {
            // Keep the head the most recent even if the clock steps back.
            let time = self.tape.front().map_or(now, |head| now.max(head.time));
            let trade = random_trade(&mut self.rng, &self.config, time);
            self.tape.push_front(trade);
        }
        self.tape.truncate(self.config.max_rows);

        let Self {
            schema,
            tape,
            buffer,
            ..
        } = self;
        let trades = tape.make_contiguous();
        let data = buffer.encode_records(trades, schema)?;
        Ok(TapeFrame {
            schema,
            data,
            row_count: trades.len(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Current tape, most recent first.
    pub fn trades(&self) -> impl Iterator<Item = &Trade> {
        self.tape.iter()
    }

    pub fn len(&self) -> usize {
        self.tape.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tape.is_empty()
    }
}

#[async_trait]
impl Feed for TradeTapeFeed {
    fn name(&self) -> &'static str {
        "trade_tape"
    }

    async fn poll(&mut self, sink: &mut (dyn FrameSink + Send)) {
        match self.tick() {
            Ok(frame) => sink.accept(Frame {
                stream: "trades",
                schema: frame.schema,
                data: frame.data,
                row_count: frame.row_count,
            }),
            Err(err) => error!(error = %err, "Trade tape tick failed"),
        }
    }
}

fn random_trade(rng: &mut ChaCha8Rng, config: &TradeTapeConfig, time: i64) -> Trade {
    let price = (rng.gen::<f64>() * config.max_price * 1000.0).round() / 1000.0;
    let size = (rng.gen::<f64>() * f64::from(config.max_size)).floor();
    Trade { price, size, time }
}
