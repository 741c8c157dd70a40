//! Monitoring session
//!
//! A session owns one scheduler loop. Each processed frame runs extraction,
//! scoring, and aggregation serially; every emitted sample is persisted and
//! handed to the session's alert engine.

use crate::PipelineError;
use aggregation::{AggregatorConfig, EngagementSample, MetricsAggregator};
use alerting::{AlertChannel, AlertConfig, AlertEngine, AlertEvent, AlertState, DeliveryReport};
use engagement::{detect_subjects, EngagementScorer, FeatureExtractor, ScoringConfig};
use frame_scheduler::{FrameScheduler, FrameSink, SchedulerConfig, SchedulerHandle, SchedulerStats};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use storage::Persistence;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use video_source::{FrameSource, SourceError, SourceKind, VideoFrame};

/// Per-session configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub scheduler: SchedulerConfig,
    pub scoring: ScoringConfig,
    pub aggregator: AggregatorConfig,
    /// Used when no settings were persisted for the session
    pub alerts: AlertConfig,
}

/// What a running session reports to its observers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Sample(EngagementSample),
    Alert {
        alert: AlertEvent,
        report: DeliveryReport,
    },
    SourceLost {
        source: SourceKind,
        reason: String,
    },
}

type SharedEngine = Arc<Mutex<AlertEngine>>;

fn lock_engine(engine: &Mutex<AlertEngine>) -> Result<MutexGuard<'_, AlertEngine>, PipelineError> {
    engine
        .lock()
        .map_err(|e| PipelineError::State(format!("Alert engine lock error: {}", e)))
}

/// Frame sink doing the per-tick work for one session
struct MonitoringSink<E> {
    session_id: String,
    extractor: E,
    scorer: EngagementScorer,
    aggregator: MetricsAggregator,
    engine: SharedEngine,
    persistence: Arc<dyn Persistence>,
    events: broadcast::Sender<SessionEvent>,
}

impl<E: FeatureExtractor> MonitoringSink<E> {
    fn publish(&self, event: SessionEvent) {
        // Observers are optional
        let _ = self.events.send(event);
    }

    fn handle_sample(&self, sample: EngagementSample, now: Instant) {
        if let Err(e) = self.persistence.record_sample(&self.session_id, &sample) {
            error!("Failed to persist sample for session {}: {}", self.session_id, e);
        }
        self.publish(SessionEvent::Sample(sample.clone()));

        let (alert, report) = {
            let mut engine = match lock_engine(&self.engine) {
                Ok(engine) => engine,
                Err(e) => {
                    error!("Skipping alert evaluation: {}", e);
                    return;
                }
            };
            let Some(alert) = engine.evaluate(&sample, now) else {
                return;
            };
            if let Err(e) = self.persistence.record_alert(&self.session_id, &alert) {
                error!("Failed to persist alert {}: {}", alert.id, e);
            }
            let report = engine.dispatch(&alert);
            (alert, report)
        };

        if let Err(e) = self.persistence.record_delivery(&report) {
            error!("Failed to persist delivery report for {}: {}", alert.id, e);
        }
        if report.delivered() {
            if let Err(e) = self.persistence.mark_alert_delivered(alert.id) {
                error!("Failed to mark alert {} delivered: {}", alert.id, e);
            }
        } else {
            warn!("Alert {} reached no channel", alert.id);
        }

        self.publish(SessionEvent::Alert { alert, report });
    }
}

impl<E: FeatureExtractor> FrameSink for MonitoringSink<E> {
    fn process(&mut self, frame: &VideoFrame, now: Instant) {
        let observations = detect_subjects(&mut self.extractor, frame);
        let scored = self.scorer.score_all(observations);
        let tick = self.aggregator.on_tick(&scored);
        debug!(
            "Frame #{}: {} subjects, {:.0}% bored",
            frame.sequence, tick.total_subjects, tick.boredom_percentage
        );

        if let Some(sample) = self.aggregator.emit_if_due(now) {
            self.handle_sample(sample, now);
        }
    }

    fn source_lost(&mut self, kind: &SourceKind, error: &SourceError) {
        warn!("Session {} lost its frame source {}: {}", self.session_id, kind, error);
        self.publish(SessionEvent::SourceLost {
            source: kind.clone(),
            reason: error.to_string(),
        });
    }
}

/// A running monitoring session
pub struct MonitoringSession {
    session_id: String,
    handle: SchedulerHandle,
    engine: SharedEngine,
    persistence: Arc<dyn Persistence>,
    events: broadcast::Sender<SessionEvent>,
}

impl MonitoringSession {
    /// Start monitoring `source` on the current runtime.
    ///
    /// Alert settings persisted for `session_id` take precedence over
    /// `config.alerts`.
    pub fn start<S, E>(
        session_id: impl Into<String>,
        config: SessionConfig,
        source: S,
        extractor: E,
        channels: Vec<Box<dyn AlertChannel>>,
        persistence: Arc<dyn Persistence>,
    ) -> Result<Self, PipelineError>
    where
        S: FrameSource + 'static,
        E: FeatureExtractor + 'static,
    {
        let session_id = session_id.into();

        let alert_config = match persistence.load_alert_settings(&session_id) {
            Ok(Some(saved)) => {
                info!("Using persisted alert settings for session {}", session_id);
                saved
            }
            Ok(None) => config.alerts.clone(),
            Err(e) => {
                warn!("Could not load alert settings for {}: {}", session_id, e);
                config.alerts.clone()
            }
        };

        let mut engine = AlertEngine::new(session_id.clone(), alert_config)?;
        for channel in channels {
            engine.add_channel(channel);
        }
        let engine = Arc::new(Mutex::new(engine));
        let (events, _) = broadcast::channel(64);

        let sink = MonitoringSink {
            session_id: session_id.clone(),
            extractor,
            scorer: EngagementScorer::new(config.scoring.clone()),
            aggregator: MetricsAggregator::new(
                &config.aggregator,
                tokio::time::Instant::now().into_std(),
            ),
            engine: engine.clone(),
            persistence: persistence.clone(),
            events: events.clone(),
        };

        info!("Starting monitoring session {}", session_id);
        metrics::counter!("pipeline_sessions_started_total").increment(1);
        let handle = FrameScheduler::new(config.scheduler).start(source, sink);

        Ok(Self {
            session_id,
            handle,
            engine,
            persistence,
            events,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Attach a new source, e.g. when a phone reconnects
    pub fn replace_source<S: FrameSource + 'static>(&self, source: S) {
        self.handle.replace_source(source);
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    pub fn stats(&self) -> &SchedulerStats {
        self.handle.stats()
    }

    pub fn alert_state(&self) -> Result<AlertState, PipelineError> {
        Ok(lock_engine(&self.engine)?.state().clone())
    }

    /// Acknowledge the current alert; false if `alert_id` is not current
    pub fn acknowledge(&self, alert_id: Uuid) -> Result<bool, PipelineError> {
        Ok(lock_engine(&self.engine)?.acknowledge(alert_id))
    }

    /// Validate, apply, and persist new alert thresholds
    pub fn update_alert_config(&self, config: AlertConfig) -> Result<(), PipelineError> {
        lock_engine(&self.engine)?.update_config(config.clone())?;
        self.persistence.save_alert_settings(&self.session_id, &config)?;
        Ok(())
    }

    /// Stop monitoring. The pending tick is cancelled and both the partial
    /// aggregate and the alert state are discarded.
    pub fn stop(self) {
        self.handle.stop();
        match lock_engine(&self.engine) {
            Ok(mut engine) => engine.reset(),
            Err(e) => error!("Could not reset alert state: {}", e),
        }
        info!("Monitoring session {} stopped", self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::{ChannelKind, ChannelOutput, Severity, ToneChannel, VisualChannel};
    use engagement::{ExtractionError, Expressions, FaceBox, SubjectObservation};
    use std::time::Duration;
    use storage::Repository;
    use video_source::frame_channel;

    /// Returns the same subjects for every frame
    struct FixedExtractor(Vec<SubjectObservation>);

    impl FeatureExtractor for FixedExtractor {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<Vec<SubjectObservation>, ExtractionError> {
            Ok(self.0.clone())
        }
    }

    struct FailingExtractor;

    impl FeatureExtractor for FailingExtractor {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<Vec<SubjectObservation>, ExtractionError> {
            Err(ExtractionError::Inference("model crashed".to_string()))
        }
    }

    fn face() -> FaceBox {
        FaceBox {
            x: 10.0,
            y: 10.0,
            width: 120.0,
            height: 120.0,
        }
    }

    /// Yawning, looking down, mostly neutral
    fn drowsy() -> SubjectObservation {
        SubjectObservation::from_measurements(
            face(),
            0.8,
            0.1,
            Expressions::neutral(0.65),
            &ScoringConfig::default(),
        )
    }

    fn attentive() -> SubjectObservation {
        SubjectObservation::from_measurements(
            face(),
            0.1,
            0.4,
            Expressions {
                happy: 0.7,
                neutral: 0.3,
                ..Default::default()
            },
            &ScoringConfig::default(),
        )
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            scheduler: SchedulerConfig {
                refresh_interval_ms: 10,
                tick_budget_ms: 100,
            },
            ..Default::default()
        }
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_drowsy_room_raises_critical_alert() {
        let repo = Arc::new(Repository::new());
        let (outputs, mut listener) = broadcast::channel(16);
        let (feed, source) = frame_channel(SourceKind::Local);
        feed.push(VideoFrame::blank(8, 8, 1)).unwrap();

        let session = MonitoringSession::start(
            "s-1",
            test_config(),
            source,
            FixedExtractor(vec![drowsy(), drowsy(), drowsy(), drowsy()]),
            vec![Box::new(ToneChannel::new(outputs.clone())) as Box<dyn AlertChannel>],
            repo.clone(),
        )
        .unwrap();
        let mut events = session.subscribe();

        tokio::time::sleep(Duration::from_millis(5_100)).await;

        let events = drain(&mut events);
        let sample = match &events[0] {
            SessionEvent::Sample(sample) => sample.clone(),
            other => panic!("expected sample, got {:?}", other),
        };
        assert_eq!(sample.total_subjects, 4);
        assert_eq!(sample.bored_count, 4);
        assert!((sample.boredom_percentage - 100.0).abs() < 1e-3);
        assert!((sample.average_engagement_score - 25.0).abs() < 1e-3);

        let (alert, report) = match &events[1] {
            SessionEvent::Alert { alert, report } => (alert.clone(), report.clone()),
            other => panic!("expected alert, got {:?}", other),
        };
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(report.confirmed, vec![ChannelKind::Tone]);
        assert!(matches!(
            listener.try_recv().unwrap(),
            ChannelOutput::Tone { frequency_hz: 880, .. }
        ));

        assert_eq!(repo.get_samples("s-1", 10).unwrap().len(), 1);
        let stored = repo.get_alert(alert.id).unwrap();
        assert!(stored.delivered);
        assert_eq!(stored.delivery, Some(report));

        session.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_follow_emit_cadence_and_cooldown_holds() {
        let repo = Arc::new(Repository::new());
        let (feed, source) = frame_channel(SourceKind::Local);
        feed.push(VideoFrame::blank(8, 8, 1)).unwrap();

        let session = MonitoringSession::start(
            "s-1",
            test_config(),
            source,
            FixedExtractor(vec![drowsy(), attentive()]),
            Vec::new(),
            repo.clone(),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(20_100)).await;

        let samples = repo.get_samples("s-1", 100).unwrap();
        assert_eq!(samples.len(), 4);
        // Newest first, strictly increasing in time
        for pair in samples.windows(2) {
            assert!(pair[0].sample.timestamp > pair[1].sample.timestamp);
        }
        // 30s cooldown: only the first breaching sample alerts
        assert_eq!(repo.alert_count(), 1);
        assert!(!repo.get_alerts("s-1", None, 1).unwrap()[0].delivered);

        session.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_extraction_failures_emit_nothing() {
        let repo = Arc::new(Repository::new());
        let (feed, source) = frame_channel(SourceKind::Local);
        feed.push(VideoFrame::blank(8, 8, 1)).unwrap();

        let session = MonitoringSession::start(
            "s-1",
            test_config(),
            source,
            FailingExtractor,
            Vec::new(),
            repo.clone(),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(6_000)).await;

        assert!(session.is_running());
        assert!(session.stats().processed() > 0);
        assert_eq!(repo.sample_count(), 0);
        assert_eq!(repo.alert_count(), 0);
        session.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_persisted_alert_settings_take_precedence() {
        let repo = Arc::new(Repository::new());
        let saved = AlertConfig {
            cooldown_ms: 90_000,
            ..AlertConfig::default()
        };
        repo.save_alert_settings("s-1", &saved).unwrap();

        let (_feed, source) = frame_channel(SourceKind::Local);
        let session = MonitoringSession::start(
            "s-1",
            test_config(),
            source,
            FixedExtractor(Vec::new()),
            Vec::new(),
            repo.clone(),
        )
        .unwrap();

        assert_eq!(session.engine.lock().unwrap().config(), &saved);

        let updated = AlertConfig::strict();
        session.update_alert_config(updated.clone()).unwrap();
        assert_eq!(repo.load_alert_settings("s-1").unwrap(), Some(updated));

        let inverted = AlertConfig {
            warning_boredom_percentage: 80.0,
            critical_boredom_percentage: 50.0,
            ..AlertConfig::default()
        };
        assert!(matches!(
            session.update_alert_config(inverted),
            Err(PipelineError::Alert(_))
        ));
        session.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_acknowledge_and_stop_clear_state() {
        let repo = Arc::new(Repository::new());
        let (outputs, _listener) = broadcast::channel(16);
        let visual = VisualChannel::new(outputs);
        let indicator = visual.subscribe();
        let (feed, source) = frame_channel(SourceKind::Local);
        feed.push(VideoFrame::blank(8, 8, 1)).unwrap();

        let session = MonitoringSession::start(
            "s-1",
            test_config(),
            source,
            FixedExtractor(vec![drowsy()]),
            vec![Box::new(visual) as Box<dyn AlertChannel>],
            repo.clone(),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        let state = session.alert_state().unwrap();
        let alert_id = state.current_alert_id.unwrap();
        assert!(indicator.borrow().active);

        assert!(!session.acknowledge(Uuid::new_v4()).unwrap());
        assert!(session.acknowledge(alert_id).unwrap());
        assert!(!indicator.borrow().active);

        let engine = session.engine.clone();
        session.stop();
        assert!(engine.lock().unwrap().state().last_alert_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_source_reported_and_replaced() {
        let repo = Arc::new(Repository::new());
        let (feed, source) = frame_channel(SourceKind::Local);
        feed.push(VideoFrame::blank(8, 8, 1)).unwrap();

        let session = MonitoringSession::start(
            "s-1",
            test_config(),
            source,
            FixedExtractor(vec![attentive()]),
            Vec::new(),
            repo.clone(),
        )
        .unwrap();
        let mut events = session.subscribe();

        drop(feed);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(drain(&mut events)
            .iter()
            .any(|e| matches!(e, SessionEvent::SourceLost { .. })));

        let (feed, source) = frame_channel(SourceKind::Local);
        feed.push(VideoFrame::blank(8, 8, 2)).unwrap();
        session.replace_source(source);
        tokio::time::sleep(Duration::from_millis(5_100)).await;

        assert_eq!(repo.sample_count(), 1);
        assert_eq!(repo.alert_count(), 0);
        session.stop();
    }
}
