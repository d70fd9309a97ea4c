//! Synthetic depth-of-book feed
//!
//! Maintains a bounded working set of quotes, generated once and then
//! perturbed every tick:
//! - a random handful of quotes is replaced at random positions
//! - the whole set is sorted by price ascending and split at the midpoint
//! - the lower half becomes bids, best (highest) first
//! - the upper half becomes asks, best (lowest) first
//!
//! Each side carries a running cumulative size that is not stored on the
//! quote; it is summed while the side is encoded and restarts per side.

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

/// A single resting quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub size: f64,
    /// Creation time, epoch milliseconds.
    pub time: i64,
}

impl Record for Quote {
    fn value(&self, column: &Column) -> Value<'_> {
        match column.id.as_str() {
            "price" => Value::Number(self.price),
            "size" => Value::Number(self.size),
            "time" => Value::from(self.time),
            _ => Value::Empty,
        }
    }
}

impl TypedRecord for Quote {
    // `total` is derived per side at encode time.
    const FIELDS: &'static [&'static str] = &["price", "size", "total", "time"];
}

/// Configuration for the depth-of-book generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookConfig {
    /// Lower bound on rows per side.
    pub min_rows: usize,
    /// Upper bound on rows per side.
    pub max_rows: usize,
    /// Exclusive upper bound on quotes replaced per tick.
    pub max_churn: usize,
    /// Prices are drawn from `[0, max_price)`.
    pub max_price: f64,
    /// Sizes are drawn from `[0, max_size)`.
    pub max_size: f64,
    /// Fixed seed for reproducible runs. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for OrderBookConfig {
    fn default() -> Self {
        Self {
            min_rows: 30,
            max_rows: 50,
            max_churn: 10,
            max_price: 20.0,
            max_size: 5.0,
            seed: None,
        }
    }
}

/// Bid and ask views produced by one tick.
#[derive(Debug)]
pub struct BookFrame<'a> {
    pub schema: &'a Schema,
    pub bids: &'a [u8],
    pub asks: &'a [u8],
    pub bid_rows: usize,
    pub ask_rows: usize,
}

/// Depth-of-book generator with its own working set and buffers.
pub struct OrderBookFeed {
    config: OrderBookConfig,
    schema: Schema,
    working: Vec<Quote>,
    bid_scratch: Vec<Quote>,
    bid_buffer: RowBuffer,
    ask_buffer: RowBuffer,
    rng: ChaCha8Rng,
    ticks: u64,
}

/// Default book layout: price, size, cumulative size, time.
pub fn book_schema() -> Result<Schema, SchemaError> {
    Quote::schema(vec![
        Column::number("price", "Price").with_precision(5),
        Column::number("size", "Size").with_precision(3),
        Column::number("total", "Total").with_precision(3),
        Column::timestamp("time", "Time").hidden(),
    ])
}

impl OrderBookFeed {
    pub fn new(config: OrderBookConfig) -> Result<Self, SchemaError> {
        Self::with_schema(config, book_schema()?)
    }

    /// Use a custom schema. Column ids must be a subset of [`Quote::FIELDS`].
    pub fn with_schema(config: OrderBookConfig, schema: Schema) -> Result<Self, SchemaError> {
        Schema::for_fields(schema.columns().to_vec(), Quote::FIELDS)?;

        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let row_width = calc_row_width(&schema);
        let count = (config.min_rows * 2).max(below(&mut rng, 2 * config.max_rows));
        let now = now_millis();
        let working: Vec<Quote> = (0..count)
            .map(|_| random_quote(&mut rng, &config, now))
            .collect();

        info!(
            quotes = working.len(),
            row_width,
            max_rows = config.max_rows,
            "OrderBookFeed initialized"
        );

        Ok(Self {
            bid_scratch: Vec::with_capacity(working.len()),
            bid_buffer: RowBuffer::with_rows(config.max_rows, row_width),
            ask_buffer: RowBuffer::with_rows(config.max_rows, row_width),
            working,
            schema,
            config,
            rng,
            ticks: 0,
        })
    }

    /// Perturb the working set and encode both sides.
    pub fn tick(&mut self) -> Result<BookFrame<'_>, EncodeError> {
        self.ticks += 1;

        // Quote churn
        let now = now_millis();
        let churn = below(&mut self.rng, self.config.max_churn);
        for _ in 0..churn {
            let index = below(&mut self.rng, self.working.len());
            if let Some(slot) = self.working.get_mut(index) {
                *slot = random_quote(&mut self.rng, &self.config, now);
            }
        }

        self.working.sort_by(|a, b| a.price.total_cmp(&b.price));
        let bid_count = self.working.len() / 2;

        // Best bid first
        self.bid_scratch.clear();
        self.bid_scratch
            .extend(self.working[..bid_count].iter().rev().copied());

        let Self {
            schema,
            working,
            bid_scratch,
            bid_buffer,
            ask_buffer,
            ..
        } = self;

        let bids = encode_side(bid_buffer, bid_scratch, schema)?;
        let asks = encode_side(ask_buffer, &working[bid_count..], schema)?;

        Ok(BookFrame {
            schema,
            bid_rows: bid_scratch.len(),
            ask_rows: working.len() - bid_count,
            bids,
            asks,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of quotes in the working set.
    pub fn working_len(&self) -> usize {
        self.working.len()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[async_trait]
impl Feed for OrderBookFeed {
    fn name(&self) -> &'static str {
        "order_book"
    }

    async fn poll(&mut self, sink: &mut (dyn FrameSink + Send)) {
        match self.tick() {
            Ok(frame) => {
                sink.accept(Frame {
                    stream: "bids",
                    schema: frame.schema,
                    data: frame.bids,
                    row_count: frame.bid_rows,
                });
                sink.accept(Frame {
                    stream: "asks",
                    schema: frame.schema,
                    data: frame.asks,
                    row_count: frame.ask_rows,
                });
            }
            Err(err) => error!(error = %err, "Order book tick failed"),
        }
    }
}

/// Encode one side with a cumulative size that restarts at zero.
fn encode_side<'b>(
    buffer: &'b mut RowBuffer,
    quotes: &[Quote],
    schema: &Schema,
) -> Result<&'b [u8], EncodeError> {
    let mut total = 0.0;
    buffer.encode_with(quotes, schema, |quote, column| {
        Ok(match column.id.as_str() {
            "total" => {
                total += quote.size;
                Value::Number(total)
            }
            _ => quote.value(column),
        })
    })
}

fn random_quote(rng: &mut ChaCha8Rng, config: &OrderBookConfig, now: i64) -> Quote {
    Quote {
        price: rng.gen::<f64>() * config.max_price,
        size: rng.gen::<f64>() * config.max_size,
        time: now,
    }
}

/// Uniform integer in `[0, bound)`, or 0 for an empty range.
pub(crate) fn below(rng: &mut ChaCha8Rng, bound: usize) -> usize {
    if bound == 0 {
        0
    } else {
        rng.gen_range(0..bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use row_codec::RowReader;

    fn seeded(seed: u64) -> OrderBookFeed {
        OrderBookFeed::new(OrderBookConfig {
            seed: Some(seed),
            ..OrderBookConfig::default()
        })
        .unwrap()
    }

    fn prices(data: &[u8], schema: &Schema) -> Vec<f64> {
        let reader = RowReader::new(data, schema).unwrap();
        (0..reader.row_count())
            .map(|r| reader.number(r, "price").unwrap())
            .collect()
    }

    #[test]
    fn test_initial_working_set_bounds() {
        let feed = seeded(7);
        assert!(feed.working_len() >= 60);
        assert!(feed.working_len() < 100);
    }

    #[test]
    fn test_sides_split_working_set() {
        let mut feed = seeded(11);
        let len = feed.working_len();
        let frame = feed.tick().unwrap();
        assert_eq!(frame.bid_rows, len / 2);
        assert_eq!(frame.bid_rows + frame.ask_rows, len);
        assert!(frame.ask_rows <= 50);
    }

    #[test]
    fn test_bids_descending_asks_ascending() {
        let mut feed = seeded(3);
        for _ in 0..20 {
            let frame = feed.tick().unwrap();
            let bids = prices(frame.bids, frame.schema);
            let asks = prices(frame.asks, frame.schema);
            assert!(bids.windows(2).all(|w| w[0] >= w[1]));
            assert!(asks.windows(2).all(|w| w[0] <= w[1]));
            // the book never crosses
            if let (Some(best_bid), Some(best_ask)) = (bids.first(), asks.first()) {
                assert!(best_bid <= best_ask);
            }
        }
    }

    #[test]
    fn test_cumulative_size_restarts_per_side() {
        let mut feed = seeded(5);
        let frame = feed.tick().unwrap();
        for data in [frame.bids, frame.asks] {
            let reader = RowReader::new(data, frame.schema).unwrap();
            let mut running = 0.0;
            for row in 0..reader.row_count() {
                running += reader.number(row, "size").unwrap();
                let total = reader.number(row, "total").unwrap();
                assert!((total - running).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_same_seed_same_book() {
        let mut a = seeded(42);
        let mut b = seeded(42);
        let pa = {
            let f = a.tick().unwrap();
            prices(f.bids, f.schema)
        };
        let pb = {
            let f = b.tick().unwrap();
            prices(f.bids, f.schema)
        };
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_custom_schema_rejects_unknown_column() {
        let schema = Schema::new(vec![Column::number("volume", "Volume")]).unwrap();
        let result = OrderBookFeed::with_schema(OrderBookConfig::default(), schema);
        assert!(matches!(result, Err(SchemaError::UnknownField { .. })));
    }

    #[test]
    fn test_zero_churn_config() {
        let mut feed = OrderBookFeed::new(OrderBookConfig {
            max_churn: 0,
            seed: Some(1),
            ..OrderBookConfig::default()
        })
        .unwrap();
        let first = {
            let f = feed.tick().unwrap();
            prices(f.asks, f.schema)
        };
        let second = {
            let f = feed.tick().unwrap();
            prices(f.asks, f.schema)
        };
        assert_eq!(first, second);
        assert_eq!(feed.ticks(), 2);
    }
}
