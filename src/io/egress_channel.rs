//! Typed channel for score egress messages
//!
//! Provides a non-blocking way to publish score updates to downstream
//! consumers. Uses bounded mpsc channels to prevent unbounded memory growth.

use crate::domain::score::ScoreUpdate;
use crate::domain::types::ContestantId;
use serde::Serialize;
use tokio::sync::mpsc;

/// Messages published to the collaborator layer
#[derive(Debug)]
pub enum EgressMessage {
    /// Updated score snapshot for one contestant
    Score(ScoreUpdate),
    /// Track lifecycle event (created, finished, session_ended)
    Track(TrackEventPayload),
}

/// Payload for track lifecycle events
#[derive(Debug, Clone, Serialize)]
pub struct TrackEventPayload {
    /// Contest identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contest: Option<String>,
    /// Timestamp (epoch ms)
    pub ts: i64,
    /// Event type: created, finished, session_ended
    pub t: String,
    pub contestant_id: ContestantId,
    /// Flight session ID (UUIDv7)
    pub session: String,
}

/// Sender handle for egress messages
///
/// Clone this to share across multiple producers.
/// Non-blocking - if the channel is full, messages are dropped.
#[derive(Clone)]
pub struct EgressSender {
    tx: mpsc::Sender<EgressMessage>,
    contest_id: String,
}

impl EgressSender {
    pub fn new(tx: mpsc::Sender<EgressMessage>, contest_id: String) -> Self {
        Self { tx, contest_id }
    }

    /// Publish an updated score snapshot
    pub fn send_score_update(&self, update: ScoreUpdate) {
        // Use try_send to avoid blocking - drop if channel full
        let _ = self.tx.try_send(EgressMessage::Score(update));
    }

    /// Publish a track lifecycle event
    /// Injects the contest id into the payload
    pub fn send_track_event(&self, mut payload: TrackEventPayload) {
        payload.contest = Some(self.contest_id.clone());
        let _ = self.tx.try_send(EgressMessage::Track(payload));
    }
}

/// Create a new egress channel pair
///
/// Returns (sender, receiver) where sender can be cloned and shared.
/// Buffer size determines how many messages can be queued.
pub fn create_egress_channel(
    buffer_size: usize,
    contest_id: String,
) -> (EgressSender, mpsc::Receiver<EgressMessage>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (EgressSender::new(tx, contest_id), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_event_carries_contest_id() {
        let (sender, mut rx) = create_egress_channel(8, "nationals".to_string());

        sender.send_track_event(TrackEventPayload {
            contest: None,
            ts: 1717232401000,
            t: "created".to_string(),
            contestant_id: ContestantId::from("dev-1"),
            session: "s".to_string(),
        });

        match rx.try_recv().unwrap() {
            EgressMessage::Track(payload) => {
                assert_eq!(payload.contest.as_deref(), Some("nationals"));
                assert_eq!(payload.t, "created");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_full_channel_drops_instead_of_blocking() {
        let (sender, _rx) = create_egress_channel(1, "c".to_string());
        for i in 0..10 {
            sender.send_track_event(TrackEventPayload {
                contest: None,
                ts: i,
                t: "created".to_string(),
                contestant_id: ContestantId::from("dev-1"),
                session: "s".to_string(),
            });
        }
        // No panic, no deadlock; only the buffered message survives
    }
}
