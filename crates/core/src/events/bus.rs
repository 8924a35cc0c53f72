//! The in-process event bus.
//!
//! Sinks are delivered to synchronously, in attachment order, and receive
//! each event mutably so they can claim queries and request actions. The bus
//! holds weak references; a dropped sink is pruned on the next publish.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

use super::BusEvent;

/// A participant on the event bus.
pub trait EventSink: Send + Sync {
    /// Sink name for log correlation.
    fn name(&self) -> &'static str;

    /// Handle one event. The event is shared with every other sink in the
    /// same dispatch, so handlers must not block on external work.
    fn on_event(&self, event: &mut BusEvent);
}

/// Handle identifying an attached sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

/// Ordered broadcast bus with synchronous delivery.
#[derive(Default)]
pub struct EventBus {
    sinks: Mutex<Vec<(SinkId, Weak<dyn EventSink>)>>,
    next_id: AtomicU64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a sink. Delivery order follows attachment order.
    pub fn attach<S: EventSink + 'static>(&self, sink: Weak<S>) -> SinkId {
        let sink: Weak<dyn EventSink> = sink;
        let id = SinkId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut sinks = self.sinks.lock();
        sinks.push((id, sink));
        debug!(total_sinks = sinks.len(), "attached event sink");
        id
    }

    /// Detach a previously attached sink. Returns whether it was present.
    pub fn detach(&self, id: SinkId) -> bool {
        let mut sinks = self.sinks.lock();
        let before = sinks.len();
        sinks.retain(|(sink_id, _)| *sink_id != id);
        let removed = sinks.len() != before;
        if removed {
            debug!(total_sinks = sinks.len(), "detached event sink");
        }
        removed
    }

    /// Number of live sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks
            .lock()
            .iter()
            .filter(|(_, sink)| sink.strong_count() > 0)
            .count()
    }

    /// Deliver `event` to every live sink in attachment order.
    ///
    /// The registry lock is released before delivery, so handlers may publish
    /// follow-up events from within `on_event`.
    pub fn publish(&self, event: &mut BusEvent) {
        let recipients: Vec<Arc<dyn EventSink>> = {
            let mut sinks = self.sinks.lock();
            sinks.retain(|(_, sink)| sink.strong_count() > 0);
            sinks
                .iter()
                .filter_map(|(_, sink)| sink.upgrade())
                .collect()
        };
        trace!(
            event = event.name(),
            recipients = recipients.len(),
            "publishing event"
        );
        for sink in recipients {
            sink.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CurrentEnvironment, InstanceId};
    use std::sync::Arc;

    struct Recorder {
        seen: Mutex<Vec<&'static str>>,
        label: &'static str,
    }

    impl Recorder {
        fn new(label: &'static str) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                label,
            })
        }
    }

    impl EventSink for Recorder {
        fn name(&self) -> &'static str {
            self.label
        }

        fn on_event(&self, event: &mut BusEvent) {
            self.seen.lock().push(event.name());
        }
    }

    struct Claimer {
        environment: &'static str,
    }

    impl EventSink for Claimer {
        fn name(&self) -> &'static str {
            "claimer"
        }

        fn on_event(&self, event: &mut BusEvent) {
            if let BusEvent::EnvironmentCurrent { answer, .. } = event {
                if answer.is_none() {
                    *answer = Some(CurrentEnvironment {
                        environment: self.environment.to_string(),
                        variables: Vec::new(),
                        in_memory: Vec::new(),
                    });
                }
            }
        }
    }

    #[test]
    fn delivers_in_attachment_order() {
        let bus = EventBus::new();
        let first = Arc::new(Claimer {
            environment: "first",
        });
        let second = Arc::new(Claimer {
            environment: "second",
        });
        bus.attach(Arc::downgrade(&first));
        bus.attach(Arc::downgrade(&second));

        let mut event = BusEvent::EnvironmentCurrent {
            origin: InstanceId::new(),
            answer: None,
        };
        bus.publish(&mut event);

        // First qualifying responder wins; the second must leave the answer alone.
        match event {
            BusEvent::EnvironmentCurrent { answer, .. } => {
                assert_eq!(answer.unwrap().environment, "first");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn attach_accepts_any_concrete_sink_type() {
        let bus = EventBus::new();
        let recorder = Recorder::new("typed");
        let claimer = Arc::new(Claimer { environment: "x" });
        bus.attach(Arc::downgrade(&recorder));
        bus.attach(Arc::downgrade(&claimer));
        assert_eq!(bus.sink_count(), 2);

        bus.publish(&mut BusEvent::DataImported);
        assert_eq!(recorder.seen.lock().as_slice(), &["data-imported"]);
    }

    #[test]
    fn dropped_sinks_are_pruned() {
        let bus = EventBus::new();
        let recorder = Recorder::new("short-lived");
        bus.attach(Arc::downgrade(&recorder));
        assert_eq!(bus.sink_count(), 1);

        drop(recorder);
        assert_eq!(bus.sink_count(), 0);

        // Publishing to a bus of dead sinks is a no-op, not a panic.
        bus.publish(&mut BusEvent::DataImported);
    }

    #[test]
    fn detach_stops_delivery() {
        let bus = EventBus::new();
        let recorder = Recorder::new("detached");
        let id = bus.attach(Arc::downgrade(&recorder));

        bus.publish(&mut BusEvent::DataImported);
        assert!(bus.detach(id));
        assert!(!bus.detach(id));
        bus.publish(&mut BusEvent::DataImported);

        assert_eq!(recorder.seen.lock().as_slice(), &["data-imported"]);
    }

    #[test]
    fn reentrant_publish_does_not_deadlock() {
        struct Chained {
            bus: Arc<EventBus>,
        }

        impl EventSink for Chained {
            fn name(&self) -> &'static str {
                "chained"
            }

            fn on_event(&self, event: &mut BusEvent) {
                if matches!(event, BusEvent::DataImported) {
                    self.bus.publish(&mut BusEvent::DatastoreDestroyed {
                        datastore: "variables".into(),
                    });
                }
            }
        }

        let bus = Arc::new(EventBus::new());
        let chained = Arc::new(Chained { bus: bus.clone() });
        let recorder = Recorder::new("observer");
        bus.attach(Arc::downgrade(&chained));
        bus.attach(Arc::downgrade(&recorder));

        bus.publish(&mut BusEvent::DataImported);

        let seen = recorder.seen.lock();
        assert!(seen.contains(&"data-imported"));
        assert!(seen.contains(&"datastore-destroyed"));
    }
}
