//! Events for the postprocessing worker
//!
//! Maintenance commands don't do postprocessing themselves; they publish
//!  an event and the worker picks it up. Delivery is at least once and
//!  nothing waits for a reply.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Step name used when resuming without an upload id
pub const DEFAULT_RESUME_STEP: &str = "finished";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Start postprocessing of an upload over from the first step
    RestartPostprocessing {
        upload_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Continue postprocessing of one upload, or of every upload
    ///  waiting in `step`
    ResumePostprocessing {
        upload_id: Option<String>,
        step: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// Delete trash items past their retention period
    PurgeTrashBin { execution_time: DateTime<Utc> },
}

impl Event {
    pub fn restart(upload_id: impl Into<String>) -> Self {
        Event::RestartPostprocessing {
            upload_id: upload_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Resume a single upload if given, otherwise every upload in `step`
    pub fn resume(upload_id: Option<String>, step: Option<String>) -> Self {
        let upload_id = upload_id.filter(|id| !id.is_empty());
        let step = match upload_id {
            Some(_) => None,
            None => Some(
                step.filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_RESUME_STEP.to_string()),
            ),
        };
        Event::ResumePostprocessing {
            upload_id,
            step,
            timestamp: Utc::now(),
        }
    }

    pub fn purge_trash_bin() -> Self {
        Event::PurgeTrashBin {
            execution_time: Utc::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::RestartPostprocessing { .. } => "RestartPostprocessing",
            Event::ResumePostprocessing { .. } => "ResumePostprocessing",
            Event::PurgeTrashBin { .. } => "PurgeTrashBin",
        }
    }
}

/// An event with the id it is published under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub event: Event,
}

impl Envelope {
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("event receiver has been dropped")]
    Closed,
    #[error("event bus rejected {event}: {reason}")]
    Rejected { event: String, reason: String },
    #[error("event bus unreachable: {0}")]
    Transport(String),
}

/// Fire-and-forget event publishing
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event, returning the id it was published under
    async fn publish(&self, event: Event) -> Result<Uuid, PublishError>;
}

/// In-process publisher backed by a channel
///
/// This is a lightweight handle that can be cloned freely; the matching
///  [`EventReceiver`] is handed to whatever consumes the events.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: flume::Sender<Envelope>,
}

impl ChannelPublisher {
    /// Create a publisher and receiver pair
    pub fn new() -> (Self, EventReceiver) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, EventReceiver { rx })
    }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, event: Event) -> Result<Uuid, PublishError> {
        let envelope = Envelope::new(event);
        let id = envelope.id;
        tracing::debug!(id = %id, event = envelope.event.name(), "publishing event");
        self.tx
            .send_async(envelope)
            .await
            .map_err(|_| PublishError::Closed)?;
        Ok(id)
    }
}

/// Receiving end of a [`ChannelPublisher`]
#[derive(Debug)]
pub struct EventReceiver {
    rx: flume::Receiver<Envelope>,
}

impl EventReceiver {
    /// Returns None once every publisher has been dropped
    pub async fn recv(&self) -> Option<Envelope> {
        self.rx.recv_async().await.ok()
    }

    pub fn try_recv(&self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_defaults_to_finished_step() {
        match Event::resume(None, None) {
            Event::ResumePostprocessing { upload_id, step, .. } => {
                assert_eq!(upload_id, None);
                assert_eq!(step.as_deref(), Some(DEFAULT_RESUME_STEP));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_resume_upload_ignores_step() {
        match Event::resume(Some("upload-1".into()), Some("virusscan".into())) {
            Event::ResumePostprocessing { upload_id, step, .. } => {
                assert_eq!(upload_id.as_deref(), Some("upload-1"));
                assert_eq!(step, None);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_envelope_json() {
        let envelope = Envelope::new(Event::restart("upload-1"));
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["event"]["type"], "RestartPostprocessing");
        assert_eq!(json["event"]["upload_id"], "upload-1");
        assert!(json["id"].is_string());

        let back: Envelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[tokio::test]
    async fn test_channel_publisher() {
        let (publisher, receiver) = ChannelPublisher::new();
        let id = publisher.publish(Event::purge_trash_bin()).await.unwrap();

        let envelope = receiver.recv().await.unwrap();
        assert_eq!(envelope.id, id);
        assert_eq!(envelope.event.name(), "PurgeTrashBin");

        drop(receiver);
        assert_eq!(
            publisher.publish(Event::purge_trash_bin()).await,
            Err(PublishError::Closed)
        );
    }
}
