//! Change notification for store observers.

use tokio::sync::broadcast;
use tracing::trace;

use super::types::ChangeEvent;

/// Slow subscribers lag (and are told so) once this many events queue up.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Fan-out of change events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Changes touching no rows are not published.
    pub fn publish(&self, event: ChangeEvent) {
        if event.count == 0 {
            return;
        }
        trace!(table = %event.table, kind = ?event.kind, count = event.count, "change published");
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
