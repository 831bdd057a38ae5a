//! Senders: bus handlers that turn partition events into outbound messages.
//!
//! A sender subscribes to a forest's bus, maps each raised event and hands
//! the result to its listeners in registration order. The transport is
//! whatever the listeners do with it.

use crate::publish::PublishMapper;
use crate::replicate_up::ReplicateUpMapper;
use lionsync_core::{
    CommandIdProvider, EventFilter, Forest, ParticipationIdProvider, Result, SequenceNumberProvider,
    SubscriptionId, SubtreeCodec,
};
use lionsync_proto::{SequencedEvent, SingleCommand};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type Listener<T> = Box<dyn FnMut(&T) -> Result<()>>;
type Listeners<T> = Rc<RefCell<Vec<Listener<T>>>>;

fn deliver<T>(listeners: &RefCell<Vec<Listener<T>>>, message: &T) -> Result<()> {
    for listener in listeners.borrow_mut().iter_mut() {
        listener(message)?;
    }
    Ok(())
}

/// Publishes locally originated changes as commands.
///
/// Events carrying command origins were received from elsewhere and are
/// not sent back.
pub struct CommandSender {
    subscription: SubscriptionId,
    listeners: Listeners<SingleCommand>,
}

impl CommandSender {
    /// Subscribe to `forest`, drawing command ids from `ids`.
    pub fn attach<I, C>(forest: &mut Forest, ids: I, codec: C) -> Self
    where
        I: CommandIdProvider + 'static,
        C: SubtreeCodec + 'static,
    {
        let mapper = PublishMapper::new(ids, codec);
        let listeners: Listeners<SingleCommand> = Rc::default();
        let sink = Rc::clone(&listeners);
        let subscription = forest.subscribe(EventFilter::All, move |event, registry| {
            if !event.id.is_local() {
                return Ok(());
            }
            let command = mapper.map(registry.types(), event)?;
            deliver(&sink, &command)
        });
        Self {
            subscription,
            listeners,
        }
    }

    /// Register a listener for published commands.
    pub fn on_command<F>(&self, listener: F)
    where
        F: FnMut(&SingleCommand) -> Result<()> + 'static,
    {
        self.listeners.borrow_mut().push(Box::new(listener));
    }

    /// Unsubscribe from `forest`. Returns `false` if already detached.
    pub fn detach(self, forest: &mut Forest) -> bool {
        forest.unsubscribe(self.subscription)
    }
}

impl fmt::Debug for CommandSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSender")
            .field("subscription", &self.subscription)
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

/// Replicates every raised change as a sequenced event.
pub struct EventSender {
    subscription: SubscriptionId,
    listeners: Listeners<SequencedEvent>,
}

impl EventSender {
    /// Subscribe to `forest`. Local changes are attributed to
    /// `participation` with ids from `ids`; `sequence` numbers the stream.
    pub fn attach<P, S, I, C>(
        forest: &mut Forest,
        participation: P,
        sequence: S,
        ids: I,
        codec: C,
    ) -> Self
    where
        P: ParticipationIdProvider + 'static,
        S: SequenceNumberProvider + 'static,
        I: CommandIdProvider + 'static,
        C: SubtreeCodec + 'static,
    {
        let mapper = ReplicateUpMapper::new(participation, sequence, ids, codec);
        let listeners: Listeners<SequencedEvent> = Rc::default();
        let sink = Rc::clone(&listeners);
        let subscription = forest.subscribe(EventFilter::All, move |event, registry| {
            let sequenced = mapper.map(registry.types(), event)?;
            deliver(&sink, &sequenced)
        });
        Self {
            subscription,
            listeners,
        }
    }

    /// Register a listener for replicated events.
    pub fn on_event<F>(&self, listener: F)
    where
        F: FnMut(&SequencedEvent) -> Result<()> + 'static,
    {
        self.listeners.borrow_mut().push(Box::new(listener));
    }

    /// Unsubscribe from `forest`. Returns `false` if already detached.
    pub fn detach(self, forest: &mut Forest) -> bool {
        forest.unsubscribe(self.subscription)
    }
}

impl fmt::Debug for EventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender")
            .field("subscription", &self.subscription)
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::CommandReceiver;
    use lionsync_core::test_support::{pointer, Library};
    use lionsync_core::{
        ChunkCodec, DeltaError, FixedParticipation, NodeId, PrefixedCommandIds, SequenceCounter,
    };
    use lionsync_proto::{CommandKind, DeltaCommand, EventKind};

    fn collect<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl FnMut(&T) -> Result<()>) {
        let outbox = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&outbox);
        (outbox, move |message: &T| {
            sink.borrow_mut().push(message.clone());
            Ok(())
        })
    }

    #[test]
    fn local_changes_are_published_and_received_ones_are_not() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&["a"]);
        let sender = CommandSender::attach(&mut forest, PrefixedCommandIds::new("out"), ChunkCodec);
        let (outbox, listener) = collect::<SingleCommand>();
        sender.on_command(listener);

        forest.set_property(&NodeId::from("a"), lib.pages, 12_i64).unwrap();
        let remote = DeltaCommand::from(SingleCommand::new(
            "remote-1",
            CommandKind::ChangeProperty {
                node: "a".into(),
                property: pointer("Book-pages"),
                new_value: "13".into(),
            },
        ));
        CommandReceiver::new(ChunkCodec)
            .receive(&mut forest, &"other".into(), &remote)
            .unwrap();

        let sent = outbox.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].command_id.as_str(), "out-0");
        assert!(matches!(
            sent[0].kind,
            CommandKind::AddProperty { ref new_value, .. } if new_value == "12"
        ));
    }

    #[test]
    fn event_sender_numbers_every_event() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&["a"]);
        let sender = EventSender::attach(
            &mut forest,
            FixedParticipation::new("repo"),
            SequenceCounter::new(),
            PrefixedCommandIds::new("synthetic"),
            ChunkCodec,
        );
        let (outbox, listener) = collect::<SequencedEvent>();
        sender.on_event(listener);

        forest.set_property(&NodeId::from("a"), lib.pages, 12_i64).unwrap();
        forest.delete_property(&NodeId::from("a"), lib.pages).unwrap();

        let sent = outbox.borrow();
        let numbers: Vec<u64> = sent.iter().map(|event| event.sequence_number).collect();
        assert_eq!(numbers, vec![0, 1]);
        let parts = sent[1].event.parts();
        assert_eq!(parts[0].origin_commands[0].to_string(), "repo/synthetic-1");
        assert!(matches!(
            parts[0].kind,
            EventKind::PropertyDeleted { ref old_value, .. } if old_value == "12"
        ));
    }

    #[test]
    fn listener_errors_reach_the_committer() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&["a"]);
        let sender = CommandSender::attach(&mut forest, PrefixedCommandIds::new("out"), ChunkCodec);
        sender.on_command(|_| Err(DeltaError::MissingValue("transport")));

        let result = forest.set_property(&NodeId::from("a"), lib.pages, 1_i64);

        assert_eq!(result, Err(DeltaError::MissingValue("transport")));
    }

    #[test]
    fn detached_sender_stops_publishing() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&["a"]);
        let sender = CommandSender::attach(&mut forest, PrefixedCommandIds::new("out"), ChunkCodec);
        let (outbox, listener) = collect::<SingleCommand>();
        sender.on_command(listener);

        assert!(sender.detach(&mut forest));
        forest.set_property(&NodeId::from("a"), lib.pages, 1_i64).unwrap();

        assert!(outbox.borrow().is_empty());
    }
}
