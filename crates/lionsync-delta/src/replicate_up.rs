//! Replicate-up mapper: semantic partition event to sequenced wire event.
//!
//! Wire events carry old and new state, both taken from the change itself.
//! Removed subtrees are announced as the root id plus all descendant ids.

use crate::resolve::Encoder;
use lionsync_core::{
    Change, ChunkCodec, CommandIdProvider, CommandSource, EventId, ParticipationIdProvider,
    PartitionEvent, Result, SequenceNumberProvider, SubtreeCodec, TypeRegistry, UuidCommandIds,
};
use lionsync_proto::{EventKind, SequencedEvent, SingleEvent};

/// Maps partition events to sequenced wire events.
#[derive(Debug)]
pub struct ReplicateUpMapper<P, S, I = UuidCommandIds, C = ChunkCodec> {
    participation: P,
    sequence: S,
    ids: I,
    codec: C,
}

impl<P, S, I, C> ReplicateUpMapper<P, S, I, C>
where
    P: ParticipationIdProvider,
    S: SequenceNumberProvider,
    I: CommandIdProvider,
    C: SubtreeCodec,
{
    /// Create a mapper for one event stream.
    ///
    /// Local events get one synthetic origin built from `participation` and
    /// `ids`; `sequence` numbers the stream.
    #[must_use]
    pub fn new(participation: P, sequence: S, ids: I, codec: C) -> Self {
        Self {
            participation,
            sequence,
            ids,
            codec,
        }
    }

    /// Map one event and stamp it with the next sequence number.
    ///
    /// No sequence number is consumed if mapping fails.
    ///
    /// # Errors
    ///
    /// Fails if a subtree cannot be serialized.
    pub fn map(&self, types: &TypeRegistry, event: &PartitionEvent) -> Result<SequencedEvent> {
        let kind = self.map_change(types, &event.change)?;
        let origin_commands = match &event.id {
            EventId::Commands(sources) => sources.clone(),
            EventId::Local(_) => vec![CommandSource::new(
                self.participation.participation_id(),
                self.ids.next_command_id(),
            )],
        };
        let sequenced = SequencedEvent::new(
            self.sequence.next_sequence_number(),
            SingleEvent::new(origin_commands, kind),
        );
        tracing::debug!(
            sequence = sequenced.sequence_number,
            kind = event.change.kind(),
            "Replicated change as event"
        );
        Ok(sequenced)
    }

    /// Map a change to the payload of the matching wire event.
    ///
    /// # Errors
    ///
    /// See [`ReplicateUpMapper::map`].
    #[allow(clippy::too_many_lines)]
    pub fn map_change(&self, types: &TypeRegistry, change: &Change) -> Result<EventKind> {
        let wire = Encoder::new(types, &self.codec);

        Ok(match change {
            Change::PartitionAdded { new_partition } => EventKind::PartitionAdded {
                new_partition: wire.chunk(new_partition)?,
            },
            Change::PartitionDeleted { deleted_partition } => EventKind::PartitionDeleted {
                deleted_partition: deleted_partition.root().clone(),
                deleted_descendants: deleted_partition.descendant_ids(),
            },
            Change::ClassifierChanged {
                node,
                new_classifier,
                old_classifier,
            } => EventKind::ClassifierChanged {
                node: node.clone(),
                new_classifier: wire.pointer(*new_classifier),
                old_classifier: wire.pointer(*old_classifier),
            },
            Change::PropertyAdded {
                node,
                property,
                new_value,
            } => EventKind::PropertyAdded {
                node: node.clone(),
                property: wire.pointer(*property),
                new_value: new_value.to_wire(),
            },
            Change::PropertyDeleted {
                node,
                property,
                old_value,
            } => EventKind::PropertyDeleted {
                node: node.clone(),
                property: wire.pointer(*property),
                old_value: old_value.to_wire(),
            },
            Change::PropertyChanged {
                node,
                property,
                new_value,
                old_value,
            } => EventKind::PropertyChanged {
                node: node.clone(),
                property: wire.pointer(*property),
                new_value: new_value.to_wire(),
                old_value: old_value.to_wire(),
            },
            Change::ChildAdded {
                parent,
                containment,
                index,
                new_child,
            } => EventKind::ChildAdded {
                parent: parent.clone(),
                new_child: wire.chunk(new_child)?,
                containment: wire.pointer(*containment),
                index: *index,
            },
            Change::ChildDeleted {
                parent,
                containment,
                index,
                deleted_child,
            } => EventKind::ChildDeleted {
                deleted_child: deleted_child.root().clone(),
                deleted_descendants: deleted_child.descendant_ids(),
                parent: parent.clone(),
                containment: wire.pointer(*containment),
                index: *index,
            },
            Change::ChildReplaced {
                parent,
                containment,
                index,
                new_child,
                replaced_child,
            } => EventKind::ChildReplaced {
                new_child: wire.chunk(new_child)?,
                replaced_child: replaced_child.root().clone(),
                replaced_descendants: replaced_child.descendant_ids(),
                parent: parent.clone(),
                containment: wire.pointer(*containment),
                index: *index,
            },
            Change::ChildMovedFromOtherContainment {
                new_parent,
                new_containment,
                new_index,
                moved_child,
                old_parent,
                old_containment,
                old_index,
            } => EventKind::ChildMovedFromOtherContainment {
                new_parent: new_parent.clone(),
                new_containment: wire.pointer(*new_containment),
                new_index: *new_index,
                moved_child: moved_child.clone(),
                old_parent: old_parent.clone(),
                old_containment: wire.pointer(*old_containment),
                old_index: *old_index,
            },
            Change::ChildMovedFromOtherContainmentInSameParent {
                parent,
                new_containment,
                new_index,
                moved_child,
                old_containment,
                old_index,
            } => EventKind::ChildMovedFromOtherContainmentInSameParent {
                parent: parent.clone(),
                new_containment: wire.pointer(*new_containment),
                new_index: *new_index,
                moved_child: moved_child.clone(),
                old_containment: wire.pointer(*old_containment),
                old_index: *old_index,
            },
            Change::ChildMovedInSameContainment {
                parent,
                containment,
                new_index,
                moved_child,
                old_index,
            } => EventKind::ChildMovedInSameContainment {
                parent: parent.clone(),
                containment: wire.pointer(*containment),
                new_index: *new_index,
                moved_child: moved_child.clone(),
                old_index: *old_index,
            },
            Change::ChildMovedAndReplacedFromOtherContainment {
                new_parent,
                new_containment,
                new_index,
                moved_child,
                old_parent,
                old_containment,
                old_index,
                replaced_child,
            } => EventKind::ChildMovedAndReplacedFromOtherContainment {
                new_parent: new_parent.clone(),
                new_containment: wire.pointer(*new_containment),
                new_index: *new_index,
                moved_child: moved_child.clone(),
                old_parent: old_parent.clone(),
                old_containment: wire.pointer(*old_containment),
                old_index: *old_index,
                replaced_child: replaced_child.root().clone(),
                replaced_descendants: replaced_child.descendant_ids(),
            },
            Change::ChildMovedAndReplacedFromOtherContainmentInSameParent {
                parent,
                new_containment,
                new_index,
                moved_child,
                old_containment,
                old_index,
                replaced_child,
            } => EventKind::ChildMovedAndReplacedFromOtherContainmentInSameParent {
                parent: parent.clone(),
                new_containment: wire.pointer(*new_containment),
                new_index: *new_index,
                moved_child: moved_child.clone(),
                old_containment: wire.pointer(*old_containment),
                old_index: *old_index,
                replaced_child: replaced_child.root().clone(),
                replaced_descendants: replaced_child.descendant_ids(),
            },
            Change::ChildMovedAndReplacedInSameContainment {
                parent,
                containment,
                new_index,
                moved_child,
                old_index,
                replaced_child,
            } => EventKind::ChildMovedAndReplacedInSameContainment {
                parent: parent.clone(),
                containment: wire.pointer(*containment),
                new_index: *new_index,
                moved_child: moved_child.clone(),
                old_index: *old_index,
                replaced_child: replaced_child.root().clone(),
                replaced_descendants: replaced_child.descendant_ids(),
            },
            Change::AnnotationAdded {
                parent,
                index,
                new_annotation,
            } => EventKind::AnnotationAdded {
                parent: parent.clone(),
                new_annotation: wire.chunk(new_annotation)?,
                index: *index,
            },
            Change::AnnotationDeleted {
                parent,
                index,
                deleted_annotation,
            } => EventKind::AnnotationDeleted {
                deleted_annotation: deleted_annotation.root().clone(),
                deleted_descendants: deleted_annotation.descendant_ids(),
                parent: parent.clone(),
                index: *index,
            },
            Change::AnnotationReplaced {
                parent,
                index,
                new_annotation,
                replaced_annotation,
            } => EventKind::AnnotationReplaced {
                new_annotation: wire.chunk(new_annotation)?,
                replaced_annotation: replaced_annotation.root().clone(),
                replaced_descendants: replaced_annotation.descendant_ids(),
                parent: parent.clone(),
                index: *index,
            },
            Change::AnnotationMovedFromOtherParent {
                new_parent,
                new_index,
                moved_annotation,
                old_parent,
                old_index,
            } => EventKind::AnnotationMovedFromOtherParent {
                new_parent: new_parent.clone(),
                new_index: *new_index,
                moved_annotation: moved_annotation.clone(),
                old_parent: old_parent.clone(),
                old_index: *old_index,
            },
            Change::AnnotationMovedInSameParent {
                parent,
                new_index,
                moved_annotation,
                old_index,
            } => EventKind::AnnotationMovedInSameParent {
                parent: parent.clone(),
                new_index: *new_index,
                moved_annotation: moved_annotation.clone(),
                old_index: *old_index,
            },
            Change::AnnotationMovedAndReplacedFromOtherParent {
                new_parent,
                new_index,
                moved_annotation,
                old_parent,
                old_index,
                replaced_annotation,
            } => EventKind::AnnotationMovedAndReplacedFromOtherParent {
                new_parent: new_parent.clone(),
                new_index: *new_index,
                moved_annotation: moved_annotation.clone(),
                old_parent: old_parent.clone(),
                old_index: *old_index,
                replaced_annotation: replaced_annotation.root().clone(),
                replaced_descendants: replaced_annotation.descendant_ids(),
            },
            Change::AnnotationMovedAndReplacedInSameParent {
                parent,
                new_index,
                moved_annotation,
                old_index,
                replaced_annotation,
            } => EventKind::AnnotationMovedAndReplacedInSameParent {
                parent: parent.clone(),
                new_index: *new_index,
                moved_annotation: moved_annotation.clone(),
                old_index: *old_index,
                replaced_annotation: replaced_annotation.root().clone(),
                replaced_descendants: replaced_annotation.descendant_ids(),
            },
            Change::ReferenceAdded {
                parent,
                reference,
                index,
                new_entry,
            } => EventKind::ReferenceAdded {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
                new_target: new_entry.target.clone(),
                new_resolve_info: new_entry.resolve_info.clone(),
            },
            Change::ReferenceDeleted {
                parent,
                reference,
                index,
                deleted_entry,
            } => EventKind::ReferenceDeleted {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
                deleted_target: deleted_entry.target.clone(),
                deleted_resolve_info: deleted_entry.resolve_info.clone(),
            },
            Change::ReferenceChanged {
                parent,
                reference,
                index,
                new_entry,
                old_entry,
            } => EventKind::ReferenceChanged {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
                new_target: new_entry.target.clone(),
                new_resolve_info: new_entry.resolve_info.clone(),
                old_target: old_entry.target.clone(),
                old_resolve_info: old_entry.resolve_info.clone(),
            },
            Change::EntryMovedFromOtherReference {
                new_parent,
                new_reference,
                new_index,
                old_parent,
                old_reference,
                old_index,
                moved_entry,
            } => EventKind::EntryMovedFromOtherReference {
                new_parent: new_parent.clone(),
                new_reference: wire.pointer(*new_reference),
                new_index: *new_index,
                old_parent: old_parent.clone(),
                old_reference: wire.pointer(*old_reference),
                old_index: *old_index,
                moved_target: moved_entry.target.clone(),
                moved_resolve_info: moved_entry.resolve_info.clone(),
            },
            Change::EntryMovedFromOtherReferenceInSameParent {
                parent,
                new_reference,
                new_index,
                old_reference,
                old_index,
                moved_entry,
            } => EventKind::EntryMovedFromOtherReferenceInSameParent {
                parent: parent.clone(),
                new_reference: wire.pointer(*new_reference),
                new_index: *new_index,
                old_reference: wire.pointer(*old_reference),
                old_index: *old_index,
                moved_target: moved_entry.target.clone(),
                moved_resolve_info: moved_entry.resolve_info.clone(),
            },
            Change::EntryMovedInSameReference {
                parent,
                reference,
                new_index,
                old_index,
                moved_entry,
            } => EventKind::EntryMovedInSameReference {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                new_index: *new_index,
                old_index: *old_index,
                moved_target: moved_entry.target.clone(),
                moved_resolve_info: moved_entry.resolve_info.clone(),
            },
            Change::EntryMovedAndReplacedFromOtherReference {
                new_parent,
                new_reference,
                new_index,
                old_parent,
                old_reference,
                old_index,
                moved_entry,
                replaced_entry,
            } => EventKind::EntryMovedAndReplacedFromOtherReference {
                new_parent: new_parent.clone(),
                new_reference: wire.pointer(*new_reference),
                new_index: *new_index,
                old_parent: old_parent.clone(),
                old_reference: wire.pointer(*old_reference),
                old_index: *old_index,
                moved_target: moved_entry.target.clone(),
                moved_resolve_info: moved_entry.resolve_info.clone(),
                replaced_target: replaced_entry.target.clone(),
                replaced_resolve_info: replaced_entry.resolve_info.clone(),
            },
            Change::EntryMovedAndReplacedFromOtherReferenceInSameParent {
                parent,
                new_reference,
                new_index,
                old_reference,
                old_index,
                moved_entry,
                replaced_entry,
            } => EventKind::EntryMovedAndReplacedFromOtherReferenceInSameParent {
                parent: parent.clone(),
                new_reference: wire.pointer(*new_reference),
                new_index: *new_index,
                old_reference: wire.pointer(*old_reference),
                old_index: *old_index,
                moved_target: moved_entry.target.clone(),
                moved_resolve_info: moved_entry.resolve_info.clone(),
                replaced_target: replaced_entry.target.clone(),
                replaced_resolve_info: replaced_entry.resolve_info.clone(),
            },
            Change::EntryMovedAndReplacedInSameReference {
                parent,
                reference,
                new_index,
                old_index,
                moved_entry,
                replaced_entry,
            } => EventKind::EntryMovedAndReplacedInSameReference {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                new_index: *new_index,
                old_index: *old_index,
                moved_target: moved_entry.target.clone(),
                moved_resolve_info: moved_entry.resolve_info.clone(),
                replaced_target: replaced_entry.target.clone(),
                replaced_resolve_info: replaced_entry.resolve_info.clone(),
            },
            Change::ReferenceResolveInfoAdded {
                parent,
                reference,
                index,
                new_resolve_info,
                target,
            } => EventKind::ReferenceResolveInfoAdded {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
                new_resolve_info: new_resolve_info.clone(),
                target: target.clone(),
            },
            Change::ReferenceResolveInfoDeleted {
                parent,
                reference,
                index,
                target,
                deleted_resolve_info,
            } => EventKind::ReferenceResolveInfoDeleted {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
                target: target.clone(),
                deleted_resolve_info: deleted_resolve_info.clone(),
            },
            Change::ReferenceResolveInfoChanged {
                parent,
                reference,
                index,
                new_resolve_info,
                target,
                old_resolve_info,
            } => EventKind::ReferenceResolveInfoChanged {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
                new_resolve_info: new_resolve_info.clone(),
                target: target.clone(),
                old_resolve_info: old_resolve_info.clone(),
            },
            Change::ReferenceTargetAdded {
                parent,
                reference,
                index,
                new_target,
                resolve_info,
            } => EventKind::ReferenceTargetAdded {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
                new_target: new_target.clone(),
                resolve_info: resolve_info.clone(),
            },
            Change::ReferenceTargetDeleted {
                parent,
                reference,
                index,
                resolve_info,
                deleted_target,
            } => EventKind::ReferenceTargetDeleted {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
                resolve_info: resolve_info.clone(),
                deleted_target: deleted_target.clone(),
            },
            Change::ReferenceTargetChanged {
                parent,
                reference,
                index,
                new_target,
                resolve_info,
                old_target,
            } => EventKind::ReferenceTargetChanged {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
                new_target: new_target.clone(),
                resolve_info: resolve_info.clone(),
                old_target: old_target.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lionsync_core::test_support::{pointer, Library};
    use lionsync_core::{FixedParticipation, NodeId, PrefixedCommandIds, SequenceCounter};
    use lionsync_proto::DeltaEvent;

    fn mapper() -> ReplicateUpMapper<FixedParticipation, SequenceCounter, PrefixedCommandIds> {
        ReplicateUpMapper::new(
            FixedParticipation::new("server"),
            SequenceCounter::starting_at(10),
            PrefixedCommandIds::new("synthetic"),
            ChunkCodec,
        )
    }

    fn single(event: &SequencedEvent) -> &SingleEvent {
        match &event.event {
            DeltaEvent::Single(single) => single,
            DeltaEvent::Composite(_) => panic!("expected a single event"),
        }
    }

    #[test]
    fn local_events_get_a_synthetic_origin() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&["a", "b", "c"]);
        let event = forest
            .move_child(&NodeId::from("lib"), lib.books, 0, &NodeId::from("c"))
            .unwrap();

        let wire = mapper().map(forest.types(), &event).unwrap();

        assert_eq!(wire.sequence_number, 10);
        let single = single(&wire);
        assert_eq!(single.origin_commands, vec![CommandSource::new("server", "synthetic-0")]);
        assert_eq!(
            single.kind,
            EventKind::ChildMovedInSameContainment {
                parent: "lib".into(),
                containment: pointer("Library-books"),
                new_index: 0,
                moved_child: "c".into(),
                old_index: 2,
            }
        );
    }

    #[test]
    fn command_origins_are_kept_and_sequence_is_gap_free() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&["a"]);
        let mapper = mapper();
        let sources = vec![CommandSource::new("p1", "s1"), CommandSource::new("p2", "s2")];

        let mut numbers = Vec::new();
        for pages in 1..=3_i64 {
            let local = forest.set_property(&NodeId::from("a"), lib.pages, pages).unwrap();
            let event = PartitionEvent::new(EventId::Commands(sources.clone()), local.change);
            let wire = mapper.map(forest.types(), &event).unwrap();
            assert_eq!(single(&wire).origin_commands, sources);
            numbers.push(wire.sequence_number);
        }

        assert_eq!(numbers, vec![10, 11, 12]);
    }

    #[test]
    fn removals_list_all_descendants() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&[]);
        forest
            .add_child(
                &NodeId::from("lib"),
                lib.books,
                0,
                lib.book_with_chapters("b", &["c1", "c2"]),
            )
            .unwrap();
        let event = forest.delete_child(&NodeId::from("b")).unwrap();

        let kind = mapper().map_change(forest.types(), &event.change).unwrap();

        assert_eq!(
            kind,
            EventKind::ChildDeleted {
                deleted_child: "b".into(),
                deleted_descendants: vec!["c1".into(), "c2".into()],
                parent: "lib".into(),
                containment: pointer("Library-books"),
                index: 0,
            }
        );
    }
}
