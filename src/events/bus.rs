use super::{EventSubscriber, ItemEvent};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::trace;

/// In-process event bus.
///
/// Subscribers only see the kinds they list in
/// [`EventSubscriber::subscribed_kinds`].
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// Deliver `event`, returning how many subscribers received it
    pub fn publish(&self, event: &ItemEvent) -> usize {
        let subscribers: Vec<Arc<dyn EventSubscriber>> = self.subscribers.read().clone();
        let mut delivered = 0;
        for subscriber in subscribers {
            if subscriber.subscribed_kinds().contains(&event.kind) {
                subscriber.receive(event);
                delivered += 1;
            }
        }
        trace!("{} event for {} delivered to {}", event.kind, event.item, delivered);
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::value::ItemValue;
    use parking_lot::Mutex;

    struct Recorder {
        kinds: Vec<EventKind>,
        seen: Mutex<Vec<String>>,
    }

    impl EventSubscriber for Recorder {
        fn subscribed_kinds(&self) -> &[EventKind] {
            &self.kinds
        }

        fn receive(&self, event: &ItemEvent) {
            self.seen.lock().push(event.item.clone());
        }
    }

    #[test]
    fn filters_by_kind_before_delivery() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder {
            kinds: EventKind::STATE_KINDS.to_vec(),
            seen: Mutex::new(Vec::new()),
        });
        bus.subscribe(recorder.clone());

        let value = ItemValue::Decimal(1.0);
        assert_eq!(bus.publish(&ItemEvent::new("a", EventKind::ItemState, value.clone())), 1);
        assert_eq!(bus.publish(&ItemEvent::new("b", EventKind::ItemCommand, value.clone())), 0);
        assert_eq!(bus.publish(&ItemEvent::new("c", EventKind::GroupStateUpdated, value.clone())), 0);
        assert_eq!(bus.publish(&ItemEvent::new("d", EventKind::ItemTimeSeries, value)), 0);

        assert_eq!(*recorder.seen.lock(), vec!["a".to_string()]);
    }
}
