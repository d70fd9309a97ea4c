//! Market Feed Service
//!
//! Produces tabular market data as fixed-width binary rows for a
//! high-frequency grid renderer:
//! - Synthetic depth of book (bids and asks with cumulative totals)
//! - Synthetic trade tape
//! - Live oracle price board bridged from an on-chain ledger
//! - Live block tape of recent slots
//!
//! # Architecture
//!
//! ```text
//!  ChaCha8 RNG          Ledger RPC / WS        Reference REST
//!      │                      │                      │
//! ┌────▼─────┐         ┌──────▼──────┐               │
//! │Book/Tape │         │ PriceBridge │◄──────────────┘
//! └────┬─────┘         └──────┬──────┘
//!      │                      │ PriceSnapshot
//!      │               ┌──────▼──────┐  ┌──────────┐
//!      │               │  PriceFeed  │  │BlockTape │
//!      │               └──────┬──────┘  └────┬─────┘
//!      │                      │              │
//! ┌────▼──────────────────────▼──────────────▼──┐
//! │      RowBuffer (row-codec) → FrameSink      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Each feed runs in its own [`poll::PollLoop`]; ticks of one feed never
//! overlap.

pub mod blocks;
pub mod bridge;
pub mod config;
pub mod frame;
pub mod live;
pub mod order_book;
pub mod poll;
pub mod trades;

pub use config::FeedConfig;
pub use frame::{Feed, Frame, FrameSink};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
