//! Local partition event bus.
//!
//! Handlers are invoked synchronously, in registration order, with the event
//! and a read-only view of the registry after the change was applied.

use crate::error::Result;
use crate::event::{EventCategory, PartitionEvent};
use crate::registry::Registry;

/// Callback invoked for each raised event.
type EventHandler = Box<dyn FnMut(&PartitionEvent, &Registry) -> Result<()>>;

/// Handle returned by [`PartitionEventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Which events a subscriber receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    /// Every event
    #[default]
    All,
    /// Only events of one category
    Category(EventCategory),
}

impl EventFilter {
    fn accepts(self, event: &PartitionEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Category(category) => event.change.category() == category,
        }
    }
}

struct Subscriber {
    id: SubscriptionId,
    filter: EventFilter,
    handler: EventHandler,
}

/// Ordered list of event subscribers.
#[derive(Default)]
pub struct PartitionEventBus {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

impl PartitionEventBus {
    /// Create a bus without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; it runs after all earlier registered handlers.
    pub fn subscribe<F>(&mut self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: FnMut(&PartitionEvent, &Registry) -> Result<()> + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            filter,
            handler: Box::new(handler),
        });
        id
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        self.subscribers.len() != before
    }

    /// Deliver an event to every matching handler.
    ///
    /// # Errors
    ///
    /// Returns the first handler error; later handlers are not invoked.
    pub fn raise(&mut self, event: &PartitionEvent, registry: &Registry) -> Result<()> {
        for subscriber in &mut self.subscribers {
            if subscriber.filter.accepts(event) {
                (subscriber.handler)(event, registry)?;
            }
        }
        Ok(())
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Check if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl std::fmt::Debug for PartitionEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionEventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeltaError;
    use crate::event::Change;
    use crate::ids::{EventId, NodeId};
    use crate::test_support::Library;
    use crate::value::PropertyValue;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn property_event(lib: &Library) -> PartitionEvent {
        PartitionEvent::new(
            EventId::Local(0),
            Change::PropertyAdded {
                node: NodeId::from("a"),
                property: lib.pages,
                new_value: PropertyValue::Integer(12),
            },
        )
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let lib = Library::new();
        let registry = lib.registry_with_books(&["a"]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = PartitionEventBus::new();

        for name in ["first", "second"] {
            let seen = Rc::clone(&seen);
            bus.subscribe(
                EventFilter::All,
                move |_, _| {
                    seen.borrow_mut().push(name);
                    Ok(())
                },
            );
        }
        bus.raise(&property_event(&lib), &registry).unwrap();

        assert_eq!(*seen.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn category_filter_and_unsubscribe() {
        let lib = Library::new();
        let registry = lib.registry_with_books(&["a"]);
        let count = Rc::new(RefCell::new(0));
        let mut bus = PartitionEventBus::new();

        let counter = Rc::clone(&count);
        let id = bus.subscribe(
            EventFilter::Category(EventCategory::Property),
            move |_, _| {
                *counter.borrow_mut() += 1;
                Ok(())
            },
        );
        bus.subscribe(EventFilter::Category(EventCategory::Reference), |_, _| {
            panic!("reference handler must not see property events")
        });

        bus.raise(&property_event(&lib), &registry).unwrap();
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.raise(&property_event(&lib), &registry).unwrap();

        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn first_error_stops_delivery() {
        let lib = Library::new();
        let registry = lib.registry_with_books(&["a"]);
        let reached = Rc::new(RefCell::new(false));
        let mut bus = PartitionEventBus::new();

        bus.subscribe(
            EventFilter::All,
            |_, _| Err(DeltaError::Unmapped { kind: "test".to_string() }),
        );
        let flag = Rc::clone(&reached);
        bus.subscribe(
            EventFilter::All,
            move |_, _| {
                *flag.borrow_mut() = true;
                Ok(())
            },
        );

        assert!(bus.raise(&property_event(&lib), &registry).is_err());
        assert!(!*reached.borrow());
    }
}
