//! Process-wide application events
//!
//! Components announce check-in activity here so anything presenting state
//! (today the session loops, eventually a UI) can react without polling.

use tokio::sync::broadcast;

/// Application events
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A check-in performed against this device's store
    ManualCheckIn {
        guest_uuid: String,
        used_entries: u32,
        total_entries: u32,
    },
    /// A check-in observed via a session broadcast
    BroadcastCheckIn {
        guest_uuid: String,
        used_entries: u32,
        total_entries: u32,
    },
    /// The cached guest catalog was replaced wholesale
    RefreshGuestList { event_id: i64 },
}

/// Broadcast bus for application events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Silently dropped when nobody is listening.
    pub fn emit(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        EventBus::new().emit(AppEvent::RefreshGuestList { event_id: 1 });
    }

    #[test]
    fn test_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(AppEvent::ManualCheckIn {
            guest_uuid: "g-1".into(),
            used_entries: 1,
            total_entries: 2,
        });

        match rx.try_recv().unwrap() {
            AppEvent::ManualCheckIn {
                guest_uuid,
                used_entries,
                ..
            } => {
                assert_eq!(guest_uuid, "g-1");
                assert_eq!(used_entries, 1);
            }
            other => panic!("Unexpected event: {other:?}"),
        }
    }
}
