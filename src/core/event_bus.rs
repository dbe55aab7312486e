use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::acquisition::RunState;
use crate::strategy::VoteResults;

#[derive(Debug, Clone, Serialize)]
pub enum VotingEvent {
    TickVoted {
        tick: u64,
        valid_readings: usize,
        results: VoteResults,
        timestamp: DateTime<Utc>,
    },
    TickRejected {
        reason: String,
        timestamp: DateTime<Utc>,
    },
    SensorQuarantined {
        sensor: usize,
        timestamp: DateTime<Utc>,
    },
    SensorRecovered {
        sensor: usize,
        timestamp: DateTime<Utc>,
    },
    VoterReset {
        session_id: uuid::Uuid,
        timestamp: DateTime<Utc>,
    },
    AcquisitionStateChanged {
        state: RunState,
        timestamp: DateTime<Utc>,
    },
}

impl VotingEvent {
    pub fn acquisition_state_changed(state: RunState) -> Self {
        VotingEvent::AcquisitionStateChanged {
            state,
            timestamp: Utc::now(),
        }
    }
}

pub struct EventBus {
    sender: broadcast::Sender<VotingEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: VotingEvent) {
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::trace!("Event published to {} receivers", receivers);
            }
            Err(e) => {
                tracing::debug!("No subscribers for event: {:?}", e.0);
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VotingEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(VotingEvent::SensorQuarantined {
            sensor: 2,
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            VotingEvent::SensorQuarantined { sensor, .. } => assert_eq!(sensor, 2),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_does_not_fail() {
        let bus = EventBus::new(0);
        bus.publish(VotingEvent::acquisition_state_changed(RunState::Paused));
    }
}
