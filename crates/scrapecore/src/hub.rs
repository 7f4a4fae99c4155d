use crate::{LogEntry, PhaseId};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// In-process log fan-out keyed by phase id.
///
/// This is a live tap, not a durable log store: publishing to a phase with
/// no subscribers is a no-op and nothing is buffered for late arrivals.
/// Durable logs are written to the execution store on a separate path.
/// Constructed once at startup and injected wherever it is needed.
pub struct LogHub {
    channels: RwLock<HashMap<PhaseId, broadcast::Sender<LogEntry>>>,
    capacity: usize,
}

impl LogHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Subscribe to live logs for a phase, creating the channel on first
    /// use. Dropping the receiver unsubscribes.
    pub async fn subscribe(&self, phase: PhaseId) -> broadcast::Receiver<LogEntry> {
        let mut channels = self.channels.write().await;
        channels
            .entry(phase)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Best-effort, at-most-once delivery to current subscribers. A phase
    /// whose last subscriber disconnected is pruned rather than retried.
    pub async fn publish(&self, phase: PhaseId, entry: LogEntry) {
        let dead = {
            let channels = self.channels.read().await;
            match channels.get(&phase) {
                Some(sender) => sender.send(entry).is_err(),
                None => return,
            }
        };
        if dead {
            self.channels.write().await.remove(&phase);
        }
    }

    pub async fn subscriber_count(&self, phase: PhaseId) -> usize {
        self.channels
            .read()
            .await
            .get(&phase)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Number of phases currently holding a channel.
    pub async fn tracked_phases(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Drop the channel for a finished phase if nobody is listening.
    /// Transports call this when a subscriber disconnects so phases that
    /// will never publish again do not pin a sender forever.
    pub async fn prune(&self, phase: PhaseId) {
        let mut channels = self.channels.write().await;
        if let Some(sender) = channels.get(&phase) {
            if sender.receiver_count() == 0 {
                channels.remove(&phase);
            }
        }
    }
}
