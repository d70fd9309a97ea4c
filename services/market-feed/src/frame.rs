//! Frames and the seams between feeds and whoever consumes them
//!
//! A feed produces one or more frames per poll. A frame is a borrowed
//! view into the feed's own reusable buffer, valid until the next poll.

use async_trait::async_trait;
use feed_types::schema::{calc_row_width, Schema};
use tracing::debug;

/// One encoded batch of rows.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Stream name, e.g. `bids`, `asks`, `trades`.
    pub stream: &'a str,
    /// Layout of every row in `data`.
    pub schema: &'a Schema,
    /// Exactly `row_count × row_width` bytes.
    pub data: &'a [u8],
    pub row_count: usize,
}

impl Frame<'_> {
    pub fn row_width(&self) -> usize {
        calc_row_width(self.schema)
    }
}

/// Consumer of encoded frames.
pub trait FrameSink {
    fn accept(&mut self, frame: Frame<'_>);
}

/// A source of frames driven by the poll loop.
#[async_trait]
pub trait Feed: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Produce the next frame(s) into `sink`.
    ///
    /// Never fails: errors are logged and the poll yields fewer or
    /// stale rows.
    async fn poll(&mut self, sink: &mut (dyn FrameSink + Send));
}

/// Sink that logs frame shapes and keeps running totals.
#[derive(Debug, Default)]
pub struct LoggingSink {
    frames: u64,
    rows: u64,
    bytes: u64,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl FrameSink for LoggingSink {
    fn accept(&mut self, frame: Frame<'_>) {
        self.frames += 1;
        self.rows += frame.row_count as u64;
        self.bytes += frame.data.len() as u64;
        debug!(
            stream = frame.stream,
            rows = frame.row_count,
            row_width = frame.row_width(),
            bytes = frame.data.len(),
            total_frames = self.frames,
            "Frame encoded"
        );
    }
}

/// A frame copied out of the feed's buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedFrame {
    pub stream: String,
    pub schema: Schema,
    pub data: Vec<u8>,
    pub row_count: usize,
}

/// Sink that keeps a copy of every frame it sees.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub frames: Vec<OwnedFrame>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent frame for `stream`.
    pub fn last(&self, stream: &str) -> Option<&OwnedFrame> {
        self.frames.iter().rev().find(|f| f.stream == stream)
    }
}

impl FrameSink for RecordingSink {
    fn accept(&mut self, frame: Frame<'_>) {
        self.frames.push(OwnedFrame {
            stream: frame.stream.to_string(),
            schema: frame.schema.clone(),
            data: frame.data.to_vec(),
            row_count: frame.row_count,
        });
    }
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_types::column::Column;

    #[test]
    fn test_logging_sink_totals() {
        let schema = Schema::new(vec![Column::number("price", "Price")]).unwrap();
        let data = [0u8; 24];
        let mut sink = LoggingSink::new();
        sink.accept(Frame {
            stream: "trades",
            schema: &schema,
            data: &data,
            row_count: 3,
        });
        sink.accept(Frame {
            stream: "trades",
            schema: &schema,
            data: &data[..8],
            row_count: 1,
        });
        assert_eq!(sink.frames(), 2);
        assert_eq!(sink.rows(), 4);
        assert_eq!(sink.bytes(), 32);
    }

    #[test]
    fn test_recording_sink_last() {
        let schema = Schema::new(vec![Column::number("price", "Price")]).unwrap();
        let mut sink = RecordingSink::new();
        for rows in 1..=3usize {
            let data = vec![0u8; rows * 8];
            sink.accept(Frame {
                stream: if rows == 2 { "asks" } else { "bids" },
                schema: &schema,
                data: &data,
                row_count: rows,
            });
        }
        assert_eq!(sink.last("bids").unwrap().row_count, 3);
        assert_eq!(sink.last("asks").unwrap().row_count, 2);
        assert!(sink.last("trades").is_none());
    }

    #[test]
    fn test_now_millis_is_epoch_ms() {
        // 2020-01-01 in ms
        assert!(now_millis() > 1_577_836_800_000);
    }
}
