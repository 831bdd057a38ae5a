//! Receivers: map inbound messages, apply them to a forest, raise them.
//!
//! Each message is handled all-or-nothing. Composite messages are mapped
//! and applied part by part against the evolving forest; if any part fails
//! the forest is restored and nothing is raised. Events are raised only
//! after every part was applied.

use crate::apply::ApplyMapper;
use crate::replicate_down::ReplicateDownMapper;
use crate::sequence::{Admission, SequenceTracker};
use lionsync_core::{
    ChunkCodec, DeltaError, Forest, ParticipationId, PartitionEvent, Registry, Result, SubtreeCodec,
};
use lionsync_proto::{DeltaCommand, DeltaMessage, SequencedEvent};
use std::slice;

/// Applies commands received from participants.
#[derive(Debug, Clone, Default)]
pub struct CommandReceiver<C = ChunkCodec> {
    mapper: ApplyMapper<C>,
}

impl<C: SubtreeCodec> CommandReceiver<C> {
    /// Create a receiver that materializes chunks with `codec`.
    #[must_use]
    pub fn new(codec: C) -> Self {
        Self {
            mapper: ApplyMapper::new(codec),
        }
    }

    /// Map, apply and raise a command issued by `participation`.
    ///
    /// Returns the raised events in order.
    ///
    /// # Errors
    ///
    /// Fails if any part cannot be mapped or applied, leaving the forest
    /// unchanged, or with the first bus handler error.
    pub fn receive(
        &self,
        forest: &mut Forest,
        participation: &ParticipationId,
        command: &DeltaCommand,
    ) -> Result<Vec<PartitionEvent>> {
        let parts = match command {
            DeltaCommand::Single(single) => slice::from_ref(single),
            DeltaCommand::Composite(composite) => composite.parts.as_slice(),
        };

        let events = apply_all(forest, parts, |registry, part| {
            self.mapper.map(registry, participation, part)
        })
        .map_err(|error| {
            tracing::warn!(
                participation = %participation,
                kind = command.kind(),
                code = error.code(),
                %error,
                "Rejected command"
            );
            error
        })?;
        emit_all(forest, &events)?;
        Ok(events)
    }

    /// Receive an enveloped message; only commands are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::Unmapped`] for any other category, otherwise
    /// fails like [`CommandReceiver::receive`].
    pub fn receive_message(
        &self,
        forest: &mut Forest,
        participation: &ParticipationId,
        message: &DeltaMessage,
    ) -> Result<Vec<PartitionEvent>> {
        match message {
            DeltaMessage::Command(command) => self.receive(forest, participation, command),
            other => Err(unmapped(other)),
        }
    }
}

/// Event receiver settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventReceiverConfig {
    /// Drop duplicate sequence numbers and reject gaps
    pub enforce_sequence: bool,
}

impl Default for EventReceiverConfig {
    fn default() -> Self {
        Self {
            enforce_sequence: true,
        }
    }
}

/// Applies sequenced events replicated from the repository.
#[derive(Debug, Clone, Default)]
pub struct EventReceiver<C = ChunkCodec> {
    mapper: ReplicateDownMapper<C>,
    tracker: Option<SequenceTracker>,
}

impl<C: SubtreeCodec> EventReceiver<C> {
    /// Create a receiver; with `enforce_sequence` the first received number
    /// starts the stream.
    #[must_use]
    pub fn new(config: EventReceiverConfig, codec: C) -> Self {
        Self {
            mapper: ReplicateDownMapper::new(codec),
            tracker: config.enforce_sequence.then(SequenceTracker::new),
        }
    }

    /// Replace the sequence tracker, e.g. to resume after a reconnect.
    #[must_use]
    pub fn with_tracker(mut self, tracker: SequenceTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// The sequence tracker, if ordering is enforced.
    #[must_use]
    pub fn tracker(&self) -> Option<&SequenceTracker> {
        self.tracker.as_ref()
    }

    /// Map, apply and raise a sequenced event.
    ///
    /// Returns the raised events in order; empty if the event was a
    /// duplicate.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::SequenceGap`] if numbers were skipped, if
    /// any part cannot be mapped or applied, leaving the forest unchanged,
    /// or with the first bus handler error.
    pub fn receive(
        &mut self,
        forest: &mut Forest,
        event: &SequencedEvent,
    ) -> Result<Vec<PartitionEvent>> {
        let sequence = event.sequence_number;
        if let Some(tracker) = &self.tracker {
            if tracker.check(sequence)? == Admission::Duplicate {
                tracing::debug!(sequence, "Dropped duplicate event");
                return Ok(Vec::new());
            }
        }

        let events = apply_all(forest, event.event.parts(), |registry, part| {
            self.mapper.map(registry, part)
        })
        .map_err(|error| {
            tracing::warn!(
                sequence,
                kind = event.event.kind(),
                code = error.code(),
                %error,
                "Rejected event"
            );
            error
        })?;
        if let Some(tracker) = &mut self.tracker {
            tracker.record(sequence);
        }
        emit_all(forest, &events)?;
        Ok(events)
    }

    /// Receive an enveloped message; only events are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::Unmapped`] for any other category, otherwise
    /// fails like [`EventReceiver::receive`].
    pub fn receive_message(
        &mut self,
        forest: &mut Forest,
        message: &DeltaMessage,
    ) -> Result<Vec<PartitionEvent>> {
        match message {
            DeltaMessage::Event(event) => self.receive(forest, event),
            other => Err(unmapped(other)),
        }
    }
}

fn unmapped(message: &DeltaMessage) -> DeltaError {
    DeltaError::Unmapped {
        kind: format!("{}/{}", message.category(), message.kind()),
    }
}

/// Map and apply every part in order, restoring the forest if one fails.
fn apply_all<T>(
    forest: &mut Forest,
    parts: &[T],
    mut map: impl FnMut(&Registry, &T) -> Result<PartitionEvent>,
) -> Result<Vec<PartitionEvent>> {
    let mut checkpoint = (parts.len() > 1).then(|| forest.checkpoint());
    let mut applied = Vec::with_capacity(parts.len());

    for part in parts {
        let outcome =
            map(forest.registry(), part).and_then(|event| forest.apply(&event).map(|()| event));
        match outcome {
            Ok(event) => applied.push(event),
            Err(error) => {
                if let Some(checkpoint) = checkpoint.take() {
                    forest.restore(checkpoint);
                }
                return Err(error);
            }
        }
    }
    Ok(applied)
}

fn emit_all(forest: &mut Forest, events: &[PartitionEvent]) -> Result<()> {
    for event in events {
        forest.emit(event)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lionsync_core::test_support::{pointer, Library};
    use lionsync_core::{CommandSource, EventFilter, EventId, NodeId};
    use lionsync_proto::{
        CommandKind, CommandResponse, CompositeCommand, CompositeEvent, DeltaEvent, EventKind,
        SingleCommand, SingleEvent,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    fn add_pages(id: &str, node: &str, pages: &str) -> SingleCommand {
        SingleCommand::new(
            id,
            CommandKind::AddProperty {
                node: node.into(),
                property: pointer("Book-pages"),
                new_value: pages.into(),
            },
        )
    }

    fn add_book(id: &str, book: &str, index: usize) -> SingleCommand {
        let lib = Library::new();
        SingleCommand::new(
            id,
            CommandKind::AddChild {
                parent: "lib".into(),
                new_child: lib.chunk(&lib.book(book, book)),
                containment: pointer("Library-books"),
                index,
            },
        )
    }

    fn raised(forest: &mut Forest) -> Rc<RefCell<Vec<String>>> {
        let kinds = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&kinds);
        forest.subscribe(EventFilter::All, move |event, _| {
            sink.borrow_mut().push(event.change.kind().to_string());
            Ok(())
        });
        kinds
    }

    #[test]
    fn composite_parts_apply_in_order_against_evolving_state() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&["a"]);
        let kinds = raised(&mut forest);
        let composite = DeltaCommand::from(CompositeCommand::new(vec![
            add_book("c1", "n", 1),
            add_pages("c2", "n", "99"),
        ]));

        let events = CommandReceiver::new(ChunkCodec)
            .receive(&mut forest, &ParticipationId::from("p"), &composite)
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].id, EventId::command(CommandSource::new("p", "c2")));
        assert_eq!(*kinds.borrow(), vec!["ChildAdded", "PropertyAdded"]);
        assert!(forest.node(&NodeId::from("n")).unwrap().property(lib.pages).is_some());
    }

    #[test]
    fn failing_part_restores_forest_and_raises_nothing() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&["a"]);
        let kinds = raised(&mut forest);
        let nodes_before = forest.registry().nodes().len();
        let composite = DeltaCommand::from(CompositeCommand::new(vec![
            add_book("c1", "n", 1),
            add_pages("c2", "ghost", "1"),
        ]));

        let result = CommandReceiver::new(ChunkCodec).receive(
            &mut forest,
            &ParticipationId::from("p"),
            &composite,
        );

        assert_eq!(result, Err(DeltaError::UnknownNode("ghost".into())));
        assert!(kinds.borrow().is_empty());
        assert_eq!(forest.registry().nodes().len(), nodes_before);
        assert!(!forest.registry().nodes().contains(&NodeId::from("n")));
    }

    #[test]
    fn non_command_messages_are_unmapped() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&[]);

        let result = CommandReceiver::new(ChunkCodec).receive_message(
            &mut forest,
            &ParticipationId::from("p"),
            &DeltaMessage::from(CommandResponse::new("c")),
        );

        assert!(matches!(
            result,
            Err(DeltaError::Unmapped { ref kind }) if kind.starts_with("commandResponse")
        ));
    }

    fn pages_event(sequence: u64, pages: &str) -> SequencedEvent {
        SequencedEvent::new(
            sequence,
            SingleEvent::new(
                vec![CommandSource::new("other", format!("c{sequence}"))],
                EventKind::PropertyAdded {
                    node: "a".into(),
                    property: pointer("Book-pages"),
                    new_value: pages.into(),
                },
            ),
        )
    }

    #[test]
    fn event_receiver_drops_duplicates_and_rejects_gaps() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&["a"]);
        let mut receiver = EventReceiver::new(EventReceiverConfig::default(), ChunkCodec)
            .with_tracker(SequenceTracker::expecting(0));

        assert_eq!(receiver.receive(&mut forest, &pages_event(0, "10")).unwrap().len(), 1);
        assert!(receiver.receive(&mut forest, &pages_event(0, "10")).unwrap().is_empty());
        assert_eq!(
            receiver.receive(&mut forest, &pages_event(2, "10")),
            Err(DeltaError::SequenceGap {
                expected: 1,
                received: 2
            })
        );
        assert_eq!(receiver.tracker().and_then(SequenceTracker::expected), Some(1));
    }

    #[test]
    fn unenforced_receiver_accepts_any_order() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&["a"]);
        let mut receiver = EventReceiver::new(
            EventReceiverConfig {
                enforce_sequence: false,
            },
            ChunkCodec,
        );

        assert_eq!(receiver.receive(&mut forest, &pages_event(9, "10")).unwrap().len(), 1);
        assert!(receiver.tracker().is_none());
    }

    #[test]
    fn composite_event_is_atomic() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&["a"]);
        let mut receiver = EventReceiver::new(EventReceiverConfig::default(), ChunkCodec);
        let DeltaEvent::Single(good) = pages_event(0, "10").event else {
            unreachable!()
        };
        let delete_title = SingleEvent::new(
            vec![],
            EventKind::PropertyDeleted {
                node: "a".into(),
                property: pointer("Book-title"),
                old_value: "a".into(),
            },
        );
        let composite = SequencedEvent::new(
            0,
            DeltaEvent::Composite(CompositeEvent {
                parts: vec![good, delete_title.clone(), delete_title],
                message: None,
            }),
        );

        let result = receiver.receive(&mut forest, &composite);

        assert!(result.is_err());
        let book = forest.node(&NodeId::from("a")).unwrap();
        assert!(book.property(lib.pages).is_none());
        assert!(book.property(lib.title).is_some());
        assert_eq!(receiver.tracker().and_then(SequenceTracker::expected), None);
    }
}
