use crate::idx::{ColonyId, DimensionId};
use ahash::AHashSet;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Colony wide notifications broadcast to external listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColonyEvent {
    ManagerLoaded { dimension: DimensionId },
    ManagerUnloaded { dimension: DimensionId },
    ColonyDeleted { colony_id: ColonyId, dimension: DimensionId },
    ViewUpdated { colony_id: ColonyId, dimension: DimensionId },
}

/// Fire and forget broadcast bus.
///
/// Listeners that dropped their receiver are pruned on the next emit.
/// Emitting never fails past a debug line.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<ColonyEvent>>,
    /// Colonies currently registered for event dispatch.
    handlers: AHashSet<ColonyId>,
}
impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<ColonyEvent> {
        let (sender, receiver) = unbounded();
        self.subscribers.push(sender);
        receiver
    }

    pub fn emit(&mut self, event: ColonyEvent) {
        self.subscribers.retain(|sender| {
            if sender.send(event).is_err() {
                debug!("Pruned a disconnected event listener.");
                false
            } else {
                true
            }
        });
    }

    pub fn register_handler(&mut self, colony_id: ColonyId) {
        self.handlers.insert(colony_id);
    }

    /// Returns false when the handler was already detached.
    pub fn unregister_handler(&mut self, colony_id: ColonyId) -> bool {
        self.handlers.remove(&colony_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_after_listener_dropped() {
        let mut bus = EventBus::default();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        let event = ColonyEvent::ColonyDeleted {
            colony_id: ColonyId(1),
            dimension: DimensionId::OVERWORLD,
        };
        bus.emit(event);
        bus.emit(event);

        assert_eq!(kept.try_iter().count(), 2);
    }

    #[test]
    fn test_double_detach() {
        let mut bus = EventBus::default();
        bus.register_handler(ColonyId(1));
        assert!(bus.unregister_handler(ColonyId(1)));
        assert!(!bus.unregister_handler(ColonyId(1)));
    }
}
