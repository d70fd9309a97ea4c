//! Timer-driven poll loop
//!
//! Each loop owns one feed and one sink. A tick runs `feed.poll(sink)` to
//! completion, then sleeps for the interval, so ticks never overlap. A
//! slow tick delays the next one instead of queueing it.
//!
//! Dropping the [`PollHandle`] (or calling [`PollHandle::stop`]) aborts
//! the task. Work already spawned by the feed, such as bridge fetches,
//! keeps running and lands in the shared snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::frame::{Feed, FrameSink};

pub struct PollLoop;

impl PollLoop {
    /// Start polling `feed` into `sink` every `interval`.
    pub fn spawn<F, S>(mut feed: F, mut sink: S, interval: Duration) -> PollHandle
    where
        F: Feed + 'static,
        S: FrameSink + Send + 'static,
    {
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = ticks.clone();
        let name = feed.name();

        info!(feed = name, interval_ms = interval.as_millis() as u64, "Poll loop started");
        let task = tokio::spawn(async move {
            loop {
                feed.poll(&mut sink).await;
                let tick = counter.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(feed = name, tick, "Poll tick complete");
                tokio::time::sleep(interval).await;
            }
        });

        PollHandle {
            name,
            ticks,
            task: Some(task),
        }
    }
}

/// Owner of a running poll loop.
pub struct PollHandle {
    name: &'static str,
    ticks: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Completed ticks so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop scheduling further ticks.
    pub fn stop(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!(feed = self.name, ticks = self.ticks(), "Poll loop stopped");
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, RecordingSink};
    use async_trait::async_trait;
    use feed_types::column::Column;
    use feed_types::schema::Schema;
    use parking_lot::Mutex;

    /// Counts polls and notes whether two ever overlapped.
    struct SlowFeed {
        schema: Schema,
        busy: Arc<Mutex<bool>>,
        overlapped: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl Feed for SlowFeed {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn poll(&mut self, sink: &mut (dyn FrameSink + Send)) {
            {
                let mut busy = self.busy.lock();
                if *busy {
                    *self.overlapped.lock() = true;
                }
                *busy = true;
            }
            tokio::time::sleep(Duration::from_millis(30)).await;
            sink.accept(Frame {
                stream: "slow",
                schema: &self.schema,
                data: &[],
                row_count: 0,
            });
            *self.busy.lock() = false;
        }
    }

    struct SharedSink(Arc<Mutex<RecordingSink>>);

    impl FrameSink for SharedSink {
        fn accept(&mut self, frame: Frame<'_>) {
            self.0.lock().accept(frame);
        }
    }

    fn slow_feed() -> (SlowFeed, Arc<Mutex<bool>>) {
        let overlapped = Arc::new(Mutex::new(false));
        let feed = SlowFeed {
            schema: Schema::new(vec![Column::number("n", "N")]).unwrap(),
            busy: Arc::new(Mutex::new(false)),
            overlapped: overlapped.clone(),
        };
        (feed, overlapped)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_are_sequential() {
        let (feed, overlapped) = slow_feed();
        let recorded = Arc::new(Mutex::new(RecordingSink::new()));
        let handle = PollLoop::spawn(feed, SharedSink(recorded.clone()), Duration::from_millis(10));

        // 40ms per tick: 30ms of work then 10ms of sleep
        tokio::time::sleep(Duration::from_millis(405)).await;
        assert_eq!(handle.ticks(), 10);
        assert_eq!(recorded.lock().frames.len(), 10);
        assert!(!*overlapped.lock());
        assert!(handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_scheduling() {
        let (feed, _) = slow_feed();
        let recorded = Arc::new(Mutex::new(RecordingSink::new()));
        let handle = PollLoop::spawn(feed, SharedSink(recorded.clone()), Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(85)).await;
        handle.stop();
        let frames = recorded.lock().frames.len();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(recorded.lock().frames.len(), frames);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_halts_scheduling() {
        let (feed, _) = slow_feed();
        let recorded = Arc::new(Mutex::new(RecordingSink::new()));
        {
            let _handle =
                PollLoop::spawn(feed, SharedSink(recorded.clone()), Duration::from_millis(10));
            tokio::time::sleep(Duration::from_millis(45)).await;
        }
        let frames = recorded.lock().frames.len();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(recorded.lock().frames.len(), frames);
    }
}
