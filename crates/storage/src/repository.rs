//! Repository Implementation

use crate::StorageError;
use aggregation::EngagementSample;
use alerting::{AlertConfig, AlertEvent, DeliveryReport, Severity};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// Where the pipeline hands samples, alerts, and settings
pub trait Persistence: Send + Sync {
    fn record_sample(&self, session_id: &str, sample: &EngagementSample) -> Result<(), StorageError>;

    fn record_alert(&self, session_id: &str, alert: &AlertEvent) -> Result<(), StorageError>;

    /// Attach the per-channel outcome to a stored alert
    fn record_delivery(&self, report: &DeliveryReport) -> Result<(), StorageError>;

    fn mark_alert_delivered(&self, alert_id: Uuid) -> Result<(), StorageError>;

    fn save_alert_settings(&self, session_id: &str, config: &AlertConfig) -> Result<(), StorageError>;

    fn load_alert_settings(&self, session_id: &str) -> Result<Option<AlertConfig>, StorageError>;
}

/// Stored engagement sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRecord {
    pub session_id: String,
    #[serde(flatten)]
    pub sample: EngagementSample,
}

/// Stored alert with its delivery outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub session_id: String,
    pub alert: AlertEvent,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryReport>,
}

/// Repository for data access (in-memory implementation)
pub struct Repository {
    /// Engagement samples, oldest first
    samples: Mutex<VecDeque<SampleRecord>>,
    /// Alerts, oldest first
    alerts: Mutex<VecDeque<AlertRecord>>,
    /// Alert settings by session
    settings: Mutex<HashMap<String, AlertConfig>>,
    /// Max sample records (a 2h session at one sample per 5s is 1440)
    max_sample_records: usize,
    /// Max alert records
    max_alert_records: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        Self::with_retention(100_000, 10_000)
    }

    pub fn with_retention(max_sample_records: usize, max_alert_records: usize) -> Self {
        info!(
            "Creating in-memory repository (samples: {}, alerts: {})",
            max_sample_records, max_alert_records
        );
        Self {
            samples: Mutex::new(VecDeque::with_capacity(max_sample_records.min(10_000))),
            alerts: Mutex::new(VecDeque::with_capacity(max_alert_records.min(1_000))),
            settings: Mutex::new(HashMap::new()),
            max_sample_records,
            max_alert_records,
        }
    }

    /// Most recent samples for a session, newest first
    pub fn get_samples(&self, session_id: &str, limit: usize) -> Result<Vec<SampleRecord>, StorageError> {
        let samples = lock(&self.samples)?;
        Ok(samples
            .iter()
            .rev()
            .filter(|r| r.session_id == session_id)
            .take(limit)
            .cloned()
            .collect())
    }

    /// Most recent alerts for a session, newest first
    pub fn get_alerts(
        &self,
        session_id: &str,
        severity: Option<Severity>,
        limit: usize,
    ) -> Result<Vec<AlertRecord>, StorageError> {
        let alerts = lock(&self.alerts)?;
        Ok(alerts
            .iter()
            .rev()
            .filter(|r| r.session_id == session_id)
            .filter(|r| severity.map_or(true, |s| r.alert.severity == s))
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn get_alert(&self, alert_id: Uuid) -> Result<AlertRecord, StorageError> {
        let alerts = lock(&self.alerts)?;
        alerts
            .iter()
            .find(|r| r.alert.id == alert_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    /// Get total sample count
    pub fn sample_count(&self) -> usize {
        self.samples.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Get total alert count
    pub fn alert_count(&self) -> usize {
        self.alerts.lock().map(|a| a.len()).unwrap_or(0)
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        if let Ok(mut samples) = self.samples.lock() {
            samples.clear();
        }
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.clear();
        }
    }

    fn with_alert<F>(&self, alert_id: Uuid, update: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut AlertRecord),
    {
        let mut alerts = lock(&self.alerts)?;
        let record = alerts
            .iter_mut()
            .find(|r| r.alert.id == alert_id)
            .ok_or(StorageError::NotFound)?;
        update(record);
        Ok(())
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

impl Persistence for Repository {
    fn record_sample(&self, session_id: &str, sample: &EngagementSample) -> Result<(), StorageError> {
        let mut samples = lock(&self.samples)?;

        // Enforce retention
        while !samples.is_empty() && samples.len() >= self.max_sample_records {
            samples.pop_front();
        }

        samples.push_back(SampleRecord {
            session_id: session_id.to_string(),
            sample: sample.clone(),
        });
        Ok(())
    }

    fn record_alert(&self, session_id: &str, alert: &AlertEvent) -> Result<(), StorageError> {
        let mut alerts = lock(&self.alerts)?;

        while !alerts.is_empty() && alerts.len() >= self.max_alert_records {
            alerts.pop_front();
        }

        alerts.push_back(AlertRecord {
            session_id: session_id.to_string(),
            alert: alert.clone(),
            delivered: false,
            delivery: None,
        });
        debug!("Stored alert {}", alert.id);
        Ok(())
    }

    fn record_delivery(&self, report: &DeliveryReport) -> Result<(), StorageError> {
        self.with_alert(report.alert_id, |record| {
            record.delivery = Some(report.clone());
        })
    }

    fn mark_alert_delivered(&self, alert_id: Uuid) -> Result<(), StorageError> {
        self.with_alert(alert_id, |record| record.delivered = true)
    }

    fn save_alert_settings(&self, session_id: &str, config: &AlertConfig) -> Result<(), StorageError> {
        lock(&self.settings)?.insert(session_id.to_string(), config.clone());
        Ok(())
    }

    fn load_alert_settings(&self, session_id: &str) -> Result<Option<AlertConfig>, StorageError> {
        Ok(lock(&self.settings)?.get(session_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::ChannelKind;
    use chrono::Utc;

    fn sample(total: usize) -> EngagementSample {
        EngagementSample {
            total_subjects: total,
            engaged_count: total,
            neutral_count: 0,
            bored_count: 0,
            boredom_percentage: 0.0,
            average_engagement_score: 75.0,
            timestamp: Utc::now(),
        }
    }

    fn alert(severity: Severity) -> AlertEvent {
        AlertEvent {
            id: Uuid::new_v4(),
            session_id: "s-1".to_string(),
            severity,
            boredom_percentage: 50.0,
            average_score: 45.0,
            total_subjects: 8,
            message: "Engagement dropping".to_string(),
            channels_attempted: vec![ChannelKind::Tone, ChannelKind::Visual],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_sample_insert_and_retrieve() {
        let repo = Repository::new();
        repo.record_sample("s-1", &sample(3)).unwrap();
        repo.record_sample("s-2", &sample(5)).unwrap();
        repo.record_sample("s-1", &sample(4)).unwrap();

        let samples = repo.get_samples("s-1", 10).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].sample.total_subjects, 4);
    }

    #[test]
    fn test_alert_delivery_tracked_separately() {
        let repo = Repository::new();
        let event = alert(Severity::Warning);
        repo.record_alert("s-1", &event).unwrap();
        assert!(!repo.get_alert(event.id).unwrap().delivered);

        let report = DeliveryReport {
            alert_id: event.id,
            attempted: vec![ChannelKind::Tone, ChannelKind::Visual],
            confirmed: vec![ChannelKind::Visual],
            failures: vec![(ChannelKind::Tone, "No listener attached".to_string())],
        };
        repo.record_delivery(&report).unwrap();
        repo.mark_alert_delivered(event.id).unwrap();

        let stored = repo.get_alert(event.id).unwrap();
        assert!(stored.delivered);
        assert_eq!(stored.alert, event);
        assert_eq!(stored.delivery.unwrap().confirmed, vec![ChannelKind::Visual]);
    }

    #[test]
    fn test_mark_unknown_alert_fails() {
        let repo = Repository::new();
        assert!(matches!(
            repo.mark_alert_delivered(Uuid::new_v4()),
            Err(StorageError::NotFound)
        ));
    }

    #[test]
    fn test_alert_severity_filter() {
        let repo = Repository::new();
        repo.record_alert("s-1", &alert(Severity::Warning)).unwrap();
        repo.record_alert("s-1", &alert(Severity::Critical)).unwrap();

        let critical = repo.get_alerts("s-1", Some(Severity::Critical), 10).unwrap();
        assert_eq!(critical.len(), 1);
        assert_eq!(repo.get_alerts("s-1", None, 10).unwrap().len(), 2);
        assert!(repo.get_alerts("other", None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_retention_limit() {
        let repo = Repository::with_retention(5, 5);
        for i in 0..10 {
            repo.record_sample("s-1", &sample(i)).unwrap();
        }
        assert_eq!(repo.sample_count(), 5);
        assert_eq!(repo.get_samples("s-1", 1).unwrap()[0].sample.total_subjects, 9);
    }

    #[test]
    fn test_alert_settings_round_trip() {
        let repo = Repository::new();
        assert!(repo.load_alert_settings("s-1").unwrap().is_none());

        repo.save_alert_settings("s-1", &AlertConfig::strict()).unwrap();
        assert_eq!(repo.load_alert_settings("s-1").unwrap(), Some(AlertConfig::strict()));
    }
}
