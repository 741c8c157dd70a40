//! Frame Scheduler Implementation

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use video_source::{FrameSource, SourceError, SourceKind, VideoFrame};

/// Configuration for the frame scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Display refresh period in milliseconds (default: 16, ~60 Hz)
    pub refresh_interval_ms: u64,
    /// Minimum time between two processed ticks (default: 100, ~10 Hz)
    pub tick_budget_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 16,
            tick_budget_ms: 100,
        }
    }
}

impl SchedulerConfig {
    fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }

    fn tick_budget(&self) -> Duration {
        Duration::from_millis(self.tick_budget_ms)
    }
}

/// Receives frames from the scheduler loop.
///
/// All calls happen on the scheduler task, one at a time.
pub trait FrameSink: Send {
    /// Called for every refresh that had a frame, processed or not
    fn present(&mut self, _frame: &VideoFrame) {}

    /// Called at most once per tick budget with the latest frame
    fn process(&mut self, frame: &VideoFrame, now: std::time::Instant);

    /// The active source ended; the loop keeps running with no source
    fn source_lost(&mut self, _kind: &SourceKind, _error: &SourceError) {}
}

/// Decides whether a refresh gets the processing path
#[derive(Debug, Clone)]
pub struct TickGate {
    budget: Duration,
    last_processed: Option<Instant>,
}

impl TickGate {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            last_processed: None,
        }
    }

    /// Returns true and records `now` if the budget has elapsed
    pub fn should_process(&mut self, now: Instant) -> bool {
        match self.last_processed {
            Some(last) if now.saturating_duration_since(last) < self.budget => false,
            _ => {
                self.last_processed = Some(now);
                true
            }
        }
    }
}

/// Loop counters, readable while the scheduler runs
#[derive(Debug, Default)]
pub struct SchedulerStats {
    processed: AtomicU64,
    throttled: AtomicU64,
    not_ready: AtomicU64,
    idle: AtomicU64,
}

impl SchedulerStats {
    /// Refreshes that ran the processing path
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Refreshes that presented a frame but were inside the tick budget
    pub fn throttled(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }

    /// Refreshes skipped because the source was not decoding
    pub fn not_ready(&self) -> u64 {
        self.not_ready.load(Ordering::Relaxed)
    }

    /// Refreshes with no active source at all
    pub fn idle(&self) -> u64 {
        self.idle.load(Ordering::Relaxed)
    }
}

/// Frame scheduler factory
#[derive(Debug, Clone, Default)]
pub struct FrameScheduler {
    config: SchedulerConfig,
}

impl FrameScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Spawn the refresh loop on the current runtime
    pub fn start<S, K>(&self, source: S, sink: K) -> SchedulerHandle
    where
        S: FrameSource + 'static,
        K: FrameSink + 'static,
    {
        let (source_tx, source_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(SchedulerStats::default());

        info!(
            "Starting frame scheduler: source={}, refresh={}ms, budget={}ms",
            source.kind(),
            self.config.refresh_interval_ms,
            self.config.tick_budget_ms
        );

        let source: Box<dyn FrameSource> = Box::new(source);
        let task = tokio::spawn(run_loop(
            self.config.clone(),
            Some(source),
            source_rx,
            sink,
            stats.clone(),
        ));

        SchedulerHandle {
            task,
            source_tx,
            stats,
        }
    }
}

/// Handle to a running scheduler loop
pub struct SchedulerHandle {
    task: JoinHandle<()>,
    source_tx: mpsc::UnboundedSender<Box<dyn FrameSource>>,
    stats: Arc<SchedulerStats>,
}

impl SchedulerHandle {
    /// Cancel the pending refresh. No further ticks fire. Safe to call twice.
    pub fn stop(&self) {
        if !self.task.is_finished() {
            info!("Stopping frame scheduler");
        }
        self.task.abort();
    }

    /// Whether the loop is still scheduled
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Swap in a new source, e.g. after a phone reconnects
    pub fn replace_source<S>(&self, source: S)
    where
        S: FrameSource + 'static,
    {
        if self.source_tx.send(Box::new(source)).is_err() {
            warn!("Source replacement ignored: scheduler already stopped");
        }
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_loop<K: FrameSink>(
    config: SchedulerConfig,
    mut source: Option<Box<dyn FrameSource>>,
    mut source_rx: mpsc::UnboundedReceiver<Box<dyn FrameSource>>,
    mut sink: K,
    stats: Arc<SchedulerStats>,
) {
    let mut refresh = tokio::time::interval(config.refresh_interval());
    refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut gate = TickGate::new(config.tick_budget());

    loop {
        refresh.tick().await;

        while let Ok(next) = source_rx.try_recv() {
            info!("Frame source switched to {}", next.kind());
            source = Some(next);
        }

        let Some(active) = source.as_mut() else {
            stats.idle.fetch_add(1, Ordering::Relaxed);
            continue;
        };

        match active.latest_frame() {
            Ok(Some(frame)) => {
                sink.present(&frame);
                let now = Instant::now();
                if gate.should_process(now) {
                    sink.process(&frame, now.into_std());
                    stats.processed.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("frame_scheduler_ticks_processed_total").increment(1);
                } else {
                    stats.throttled.fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok(None) => {
                stats.not_ready.fetch_add(1, Ordering::Relaxed);
                debug!("Source {} not ready, skipping tick", active.kind());
            }
            Err(e) => {
                let kind = active.kind().clone();
                warn!("Frame source {} lost: {}", kind, e);
                metrics::counter!("frame_scheduler_sources_lost_total").increment(1);
                sink.source_lost(&kind, &e);
                source = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use video_source::frame_channel;

    #[derive(Clone, Default)]
    struct CountingSink {
        presented: Arc<AtomicUsize>,
        processed: Arc<AtomicUsize>,
        lost: Arc<AtomicUsize>,
    }

    impl FrameSink for CountingSink {
        fn present(&mut self, _frame: &VideoFrame) {
            self.presented.fetch_add(1, Ordering::SeqCst);
        }

        fn process(&mut self, _frame: &VideoFrame, _now: std::time::Instant) {
            self.processed.fetch_add(1, Ordering::SeqCst);
        }

        fn source_lost(&mut self, _kind: &SourceKind, _error: &SourceError) {
            self.lost.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            refresh_interval_ms: 10,
            tick_budget_ms: 100,
        }
    }

    #[test]
    fn test_tick_gate_budget() {
        let mut gate = TickGate::new(Duration::from_millis(100));
        let t0 = Instant::now();

        assert!(gate.should_process(t0));
        assert!(!gate.should_process(t0 + Duration::from_millis(50)));
        assert!(!gate.should_process(t0 + Duration::from_millis(99)));
        assert!(gate.should_process(t0 + Duration::from_millis(100)));
        assert!(!gate.should_process(t0 + Duration::from_millis(150)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_processing_bounded_to_budget() {
        let (feed, source) = frame_channel(SourceKind::Local);
        feed.push(VideoFrame::blank(4, 4, 0)).unwrap();

        let sink = CountingSink::default();
        let handle = FrameScheduler::new(test_config()).start(source, sink.clone());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        handle.stop();

        let processed = sink.processed.load(Ordering::SeqCst);
        let presented = sink.presented.load(Ordering::SeqCst);
        assert!((9..=11).contains(&processed), "processed {}", processed);
        assert!(presented > processed * 5, "presented {}", presented);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_source_skips_ticks() {
        let (_feed, source) = frame_channel(SourceKind::Local);
        let sink = CountingSink::default();
        let handle = FrameScheduler::new(test_config()).start(source, sink.clone());

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(sink.processed.load(Ordering::SeqCst), 0);
        assert!(handle.stats().not_ready() > 0);
        assert!(handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_final() {
        let (feed, source) = frame_channel(SourceKind::Local);
        feed.push(VideoFrame::blank(4, 4, 0)).unwrap();
        let sink = CountingSink::default();
        let handle = FrameScheduler::new(test_config()).start(source, sink.clone());

        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.stop();
        handle.stop();
        tokio::task::yield_now().await;

        let frozen = sink.processed.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(sink.processed.load(Ordering::SeqCst), frozen);
        assert!(!handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_source_falls_back_then_resumes() {
        let (feed, source) = frame_channel(SourceKind::Peer {
            room_id: "room-1".to_string(),
        });
        feed.push(VideoFrame::blank(4, 4, 0)).unwrap();
        let sink = CountingSink::default();
        let handle = FrameScheduler::new(test_config()).start(source, sink.clone());

        tokio::time::sleep(Duration::from_millis(150)).await;
        drop(feed);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(sink.lost.load(Ordering::SeqCst), 1);
        assert!(handle.stats().idle() > 0);
        let before = sink.processed.load(Ordering::SeqCst);

        let (feed, source) = frame_channel(SourceKind::Local);
        feed.push(VideoFrame::blank(4, 4, 1)).unwrap();
        handle.replace_source(source);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(sink.processed.load(Ordering::SeqCst) > before);
    }
}
