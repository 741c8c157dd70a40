//! MQTT push channel
//!
//! Publishes `{title, message, priority}` to `{topic_prefix}/{session_id}/alerts`.
//! Publishing is non-blocking: the request is queued for the MQTT event loop
//! and the pipeline never waits on the broker. One client is connected per
//! process; sessions share it through clones of the channel.

use crate::{AlertChannel, AlertEvent, ChannelError, ChannelKind, Severity};
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

/// Push channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// MQTT broker host
    pub broker_host: String,
    /// MQTT port
    pub broker_port: u16,
    /// Client identifier prefix
    pub client_id: String,
    /// Topic prefix for alert messages
    pub topic_prefix: String,
    pub keep_alive_secs: u64,
    /// Outgoing request queue capacity
    pub queue_capacity: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "engagement-monitor".to_string(),
            topic_prefix: "sessions".to_string(),
            keep_alive_secs: 30,
            queue_capacity: 10,
        }
    }
}

/// Push notification priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushPriority {
    Default,
    High,
}

/// Push message body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub message: String,
    pub priority: PushPriority,
}

impl PushPayload {
    pub fn from_alert(alert: &AlertEvent) -> Self {
        let (title, priority) = match alert.severity {
            Severity::Critical => ("Critical: engagement dropped", PushPriority::High),
            Severity::Warning => ("Warning: engagement falling", PushPriority::Default),
        };
        Self {
            title: title.to_string(),
            message: alert.message.clone(),
            priority,
        }
    }
}

/// Alert channel publishing to an MQTT broker
#[derive(Clone)]
pub struct MqttPushChannel {
    client: AsyncClient,
    topic_prefix: String,
}

impl MqttPushChannel {
    /// Create the client and spawn its event loop on the current runtime.
    /// The loop ends once every clone of the channel has been dropped.
    pub fn connect(config: &PushConfig) -> Self {
        let (channel, mut eventloop) = Self::new(config);
        let broker = config.broker_host.clone();

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(incoming)) => {
                        debug!("MQTT incoming: {:?}", incoming);
                    }
                    Err(ConnectionError::RequestsDone) => {
                        info!("Push channel closed, stopping MQTT event loop");
                        break;
                    }
                    Err(e) => {
                        error!("MQTT error: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    _ => {}
                }
            }
        });

        info!("Push channel targeting MQTT broker {}", broker);
        channel
    }

    /// Create the client without driving its event loop
    pub fn new(config: &PushConfig) -> (Self, EventLoop) {
        let mut options = MqttOptions::new(
            format!("{}-{}", config.client_id, uuid::Uuid::new_v4().simple()),
            &config.broker_host,
            config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        let (client, eventloop) = AsyncClient::new(options, config.queue_capacity);
        (
            Self {
                client,
                topic_prefix: config.topic_prefix.clone(),
            },
            eventloop,
        )
    }

    pub fn topic_for(&self, session_id: &str) -> String {
        format!("{}/{}/alerts", self.topic_prefix, session_id)
    }
}

impl AlertChannel for MqttPushChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    fn attempt(&self, alert: &AlertEvent) -> Result<(), ChannelError> {
        let payload = serde_json::to_vec(&PushPayload::from_alert(alert))
            .map_err(|e| ChannelError::Serialization(e.to_string()))?;

        self.client
            .try_publish(self.topic_for(&alert.session_id), QoS::AtLeastOnce, false, payload)
            .map_err(|e| ChannelError::Publish(e.to_string()))
    }
}
