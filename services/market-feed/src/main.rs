use std::sync::Arc;

use market_feed::blocks::BlockTapeFeed;
use market_feed::bridge::reference::CoinGeckoClient;
use market_feed::bridge::rpc::RpcLedgerClient;
use market_feed::bridge::PriceBridge;
use market_feed::frame::LoggingSink;
use market_feed::live::PriceFeed;
use market_feed::order_book::OrderBookFeed;
use market_feed::poll::{PollHandle, PollLoop};
use market_feed::trades::TradeTapeFeed;
use market_feed::{FeedConfig, SERVICE_VERSION};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = FeedConfig::from_env();
    tracing::info!(
        version = SERVICE_VERSION,
        poll_ms = config.poll_interval.as_millis() as u64,
        live = config.live,
        "Starting market feed service"
    );

    let interval = config.poll_interval;
    let mut loops: Vec<PollHandle> = vec![
        PollLoop::spawn(
            OrderBookFeed::new(config.order_book.clone())?,
            LoggingSink::new(),
            interval,
        ),
        PollLoop::spawn(
            TradeTapeFeed::new(config.trades.clone())?,
            LoggingSink::new(),
            interval,
        ),
    ];

    if config.live {
        let client = Arc::new(RpcLedgerClient::new(&config.bridge)?);
        let reference = Arc::new(CoinGeckoClient::new(&config.reference)?);
        let bridge = PriceBridge::new(client.clone(), config.bridge.clone())?
            .with_reference(reference, config.reference.clone());

        loops.push(PollLoop::spawn(
            PriceFeed::new(bridge)?.incremental(true),
            LoggingSink::new(),
            interval,
        ));
        loops.push(PollLoop::spawn(
            BlockTapeFeed::new(client, config.blocks.clone())?,
            LoggingSink::new(),
            interval,
        ));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!(feeds = loops.len(), "Shutting down");
    for handle in loops {
        handle.stop();
    }

    Ok(())
}
