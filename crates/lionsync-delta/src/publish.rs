//! Publish mapper: semantic partition event to wire command.
//!
//! Commands carry the new state only. One event yields one command.

use crate::resolve::Encoder;
use lionsync_core::{
    Change, ChunkCodec, CommandIdProvider, PartitionEvent, Result, SubtreeCodec, TypeRegistry,
    UuidCommandIds,
};
use lionsync_proto::{CommandKind, SingleCommand};

/// Maps local partition events to commands.
#[derive(Debug, Clone, Default)]
pub struct PublishMapper<I = UuidCommandIds, C = ChunkCodec> {
    ids: I,
    codec: C,
}

impl<I: CommandIdProvider, C: SubtreeCodec> PublishMapper<I, C> {
    /// Create a mapper drawing command ids from `ids`.
    #[must_use]
    pub fn new(ids: I, codec: C) -> Self {
        Self { ids, codec }
    }

    /// Map one event to a command with a fresh command id.
    ///
    /// # Errors
    ///
    /// Fails if a subtree cannot be serialized.
    pub fn map(&self, types: &TypeRegistry, event: &PartitionEvent) -> Result<SingleCommand> {
        let kind = self.map_change(types, &event.change)?;
        let command = SingleCommand::new(self.ids.next_command_id(), kind);
        tracing::debug!(
            command = %command.command_id,
            kind = command.kind.kind(),
            event = ?event.id,
            "Published change as command"
        );
        Ok(command)
    }

    /// Map a change to the payload of the matching command.
    ///
    /// # Errors
    ///
    /// See [`PublishMapper::map`].
    #[allow(clippy::too_many_lines)]
    pub fn map_change(&self, types: &TypeRegistry, change: &Change) -> Result<CommandKind> {
        let wire = Encoder::new(types, &self.codec);

        Ok(match change {
            Change::PartitionAdded { new_partition } => CommandKind::AddPartition {
                new_partition: wire.chunk(new_partition)?,
            },
            Change::PartitionDeleted { deleted_partition } => CommandKind::DeletePartition {
                deleted_partition: deleted_partition.root().clone(),
            },
            Change::ClassifierChanged {
                node, new_classifier, ..
            } => CommandKind::ChangeClassifier {
                node: node.clone(),
                new_classifier: wire.pointer(*new_classifier),
            },
            Change::PropertyAdded {
                node,
                property,
                new_value,
            } => CommandKind::AddProperty {
                node: node.clone(),
                property: wire.pointer(*property),
                new_value: new_value.to_wire(),
            },
            Change::PropertyDeleted { node, property, .. } => CommandKind::DeleteProperty {
                node: node.clone(),
                property: wire.pointer(*property),
            },
            Change::PropertyChanged {
                node,
                property,
                new_value,
                ..
            } => CommandKind::ChangeProperty {
                node: node.clone(),
                property: wire.pointer(*property),
                new_value: new_value.to_wire(),
            },
            Change::ChildAdded {
                parent,
                containment,
                index,
                new_child,
            } => CommandKind::AddChild {
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
            } => CommandKind::DeleteChild {
                parent: parent.clone(),
                containment: wire.pointer(*containment),
                index: *index,
                deleted_child: deleted_child.root().clone(),
            },
            Change::ChildReplaced {
                parent,
                containment,
                index,
                new_child,
                replaced_child,
            } => CommandKind::ReplaceChild {
                new_child: wire.chunk(new_child)?,
                parent: parent.clone(),
                containment: wire.pointer(*containment),
                index: *index,
                replaced_child: replaced_child.root().clone(),
            },
            Change::ChildMovedFromOtherContainment {
                new_parent,
                new_containment,
                new_index,
                moved_child,
                ..
            } => CommandKind::MoveChildFromOtherContainment {
                new_parent: new_parent.clone(),
                new_containment: wire.pointer(*new_containment),
                new_index: *new_index,
                moved_child: moved_child.clone(),
            },
            Change::ChildMovedFromOtherContainmentInSameParent {
                new_containment,
                new_index,
                moved_child,
                ..
            } => CommandKind::MoveChildFromOtherContainmentInSameParent {
                new_containment: wire.pointer(*new_containment),
                new_index: *new_index,
                moved_child: moved_child.clone(),
            },
            Change::ChildMovedInSameContainment {
                new_index, moved_child, ..
            } => CommandKind::MoveChildInSameContainment {
                new_index: *new_index,
                moved_child: moved_child.clone(),
            },
            Change::ChildMovedAndReplacedFromOtherContainment {
                new_parent,
                new_containment,
                new_index,
                moved_child,
                replaced_child,
                ..
            } => CommandKind::MoveAndReplaceChildFromOtherContainment {
                new_parent: new_parent.clone(),
                new_containment: wire.pointer(*new_containment),
                new_index: *new_index,
                replaced_child: replaced_child.root().clone(),
                moved_child: moved_child.clone(),
            },
            Change::ChildMovedAndReplacedFromOtherContainmentInSameParent {
                new_containment,
                new_index,
                moved_child,
                replaced_child,
                ..
            } => CommandKind::MoveAndReplaceChildFromOtherContainmentInSameParent {
                new_containment: wire.pointer(*new_containment),
                new_index: *new_index,
                replaced_child: replaced_child.root().clone(),
                moved_child: moved_child.clone(),
            },
            Change::ChildMovedAndReplacedInSameContainment {
                new_index,
                moved_child,
                replaced_child,
                ..
            } => CommandKind::MoveAndReplaceChildInSameContainment {
                new_index: *new_index,
                replaced_child: replaced_child.root().clone(),
                moved_child: moved_child.clone(),
            },
            Change::AnnotationAdded {
                parent,
                index,
                new_annotation,
            } => CommandKind::AddAnnotation {
                parent: parent.clone(),
                new_annotation: wire.chunk(new_annotation)?,
                index: *index,
            },
            Change::AnnotationDeleted {
                parent,
                index,
                deleted_annotation,
            } => CommandKind::DeleteAnnotation {
                parent: parent.clone(),
                index: *index,
                deleted_annotation: deleted_annotation.root().clone(),
            },
            Change::AnnotationReplaced {
                parent,
                index,
                new_annotation,
                replaced_annotation,
            } => CommandKind::ReplaceAnnotation {
                new_annotation: wire.chunk(new_annotation)?,
                parent: parent.clone(),
                index: *index,
                replaced_annotation: replaced_annotation.root().clone(),
            },
            Change::AnnotationMovedFromOtherParent {
                new_parent,
                new_index,
                moved_annotation,
                ..
            } => CommandKind::MoveAnnotationFromOtherParent {
                new_parent: new_parent.clone(),
                new_index: *new_index,
                moved_annotation: moved_annotation.clone(),
            },
            Change::AnnotationMovedInSameParent {
                new_index,
                moved_annotation,
                ..
            } => CommandKind::MoveAnnotationInSameParent {
                new_index: *new_index,
                moved_annotation: moved_annotation.clone(),
            },
            Change::AnnotationMovedAndReplacedFromOtherParent {
                new_parent,
                new_index,
                moved_annotation,
                replaced_annotation,
                ..
            } => CommandKind::MoveAndReplaceAnnotationFromOtherParent {
                new_parent: new_parent.clone(),
                new_index: *new_index,
                replaced_annotation: replaced_annotation.root().clone(),
                moved_annotation: moved_annotation.clone(),
            },
            Change::AnnotationMovedAndReplacedInSameParent {
                new_index,
                moved_annotation,
                replaced_annotation,
                ..
            } => CommandKind::MoveAndReplaceAnnotationInSameParent {
                new_index: *new_index,
                replaced_annotation: replaced_annotation.root().clone(),
                moved_annotation: moved_annotation.clone(),
            },
            Change::ReferenceAdded {
                parent,
                reference,
                index,
                new_entry,
            } => CommandKind::AddReference {
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
                ..
            } => CommandKind::DeleteReference {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
            },
            Change::ReferenceChanged {
                parent,
                reference,
                index,
                new_entry,
                ..
            } => CommandKind::ChangeReference {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
                new_target: new_entry.target.clone(),
                new_resolve_info: new_entry.resolve_info.clone(),
            },
            Change::EntryMovedFromOtherReference {
                new_parent,
                new_reference,
                new_index,
                old_parent,
                old_reference,
                old_index,
                ..
            } => CommandKind::MoveEntryFromOtherReference {
                new_parent: new_parent.clone(),
                new_reference: wire.pointer(*new_reference),
                new_index: *new_index,
                old_parent: old_parent.clone(),
                old_reference: wire.pointer(*old_reference),
                old_index: *old_index,
            },
            Change::EntryMovedFromOtherReferenceInSameParent {
                parent,
                new_reference,
                new_index,
                old_reference,
                old_index,
                ..
            } => CommandKind::MoveEntryFromOtherReferenceInSameParent {
                parent: parent.clone(),
                new_reference: wire.pointer(*new_reference),
                new_index: *new_index,
                old_reference: wire.pointer(*old_reference),
                old_index: *old_index,
            },
            Change::EntryMovedInSameReference {
                parent,
                reference,
                new_index,
                old_index,
                ..
            } => CommandKind::MoveEntryInSameReference {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                new_index: *new_index,
                old_index: *old_index,
            },
            Change::EntryMovedAndReplacedFromOtherReference {
                new_parent,
                new_reference,
                new_index,
                old_parent,
                old_reference,
                old_index,
                ..
            } => CommandKind::MoveAndReplaceEntryFromOtherReference {
                new_parent: new_parent.clone(),
                new_reference: wire.pointer(*new_reference),
                new_index: *new_index,
                old_parent: old_parent.clone(),
                old_reference: wire.pointer(*old_reference),
                old_index: *old_index,
            },
            Change::EntryMovedAndReplacedFromOtherReferenceInSameParent {
                parent,
                new_reference,
                new_index,
                old_reference,
                old_index,
                ..
            } => CommandKind::MoveAndReplaceEntryFromOtherReferenceInSameParent {
                parent: parent.clone(),
                new_reference: wire.pointer(*new_reference),
                new_index: *new_index,
                old_reference: wire.pointer(*old_reference),
                old_index: *old_index,
            },
            Change::EntryMovedAndReplacedInSameReference {
                parent,
                reference,
                new_index,
                old_index,
                ..
            } => CommandKind::MoveAndReplaceEntryInSameReference {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                new_index: *new_index,
                old_index: *old_index,
            },
            Change::ReferenceResolveInfoAdded {
                parent,
                reference,
                index,
                new_resolve_info,
                ..
            } => CommandKind::AddReferenceResolveInfo {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
                new_resolve_info: new_resolve_info.clone(),
            },
            Change::ReferenceResolveInfoDeleted {
                parent,
                reference,
                index,
                ..
            } => CommandKind::DeleteReferenceResolveInfo {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
            },
            Change::ReferenceResolveInfoChanged {
                parent,
                reference,
                index,
                new_resolve_info,
                ..
            } => CommandKind::ChangeReferenceResolveInfo {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
                new_resolve_info: new_resolve_info.clone(),
            },
            Change::ReferenceTargetAdded {
                parent,
                reference,
                index,
                new_target,
                ..
            } => CommandKind::AddReferenceTarget {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
                new_target: new_target.clone(),
            },
            Change::ReferenceTargetDeleted {
                parent,
                reference,
                index,
                ..
            } => CommandKind::DeleteReferenceTarget {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
            },
            Change::ReferenceTargetChanged {
                parent,
                reference,
                index,
                new_target,
                ..
            } => CommandKind::ChangeReferenceTarget {
                parent: parent.clone(),
                reference: wire.pointer(*reference),
                index: *index,
                new_target: new_target.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lionsync_core::test_support::{pointer, Library};
    use lionsync_core::{NodeId, PrefixedCommandIds, ReferenceTarget};

    fn mapper() -> PublishMapper<PrefixedCommandIds> {
        PublishMapper::new(PrefixedCommandIds::new("local"), ChunkCodec)
    }

    #[test]
    fn commands_carry_new_state_and_fresh_ids() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&["a"]);
        let mapper = mapper();

        let first = forest.set_property(&NodeId::from("a"), lib.pages, 320_i64).unwrap();
        let second = forest.set_property(&NodeId::from("a"), lib.pages, 321_i64).unwrap();

        let first = mapper.map(forest.types(), &first).unwrap();
        let second = mapper.map(forest.types(), &second).unwrap();

        assert_eq!(first.command_id.as_str(), "local-0");
        assert_eq!(second.command_id.as_str(), "local-1");
        assert_eq!(
            first.kind,
            CommandKind::AddProperty {
                node: "a".into(),
                property: pointer("Book-pages"),
                new_value: "320".into(),
            }
        );
        assert_eq!(
            second.kind,
            CommandKind::ChangeProperty {
                node: "a".into(),
                property: pointer("Book-pages"),
                new_value: "321".into(),
            }
        );
    }

    #[test]
    fn deletes_name_the_removed_root() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&[]);
        forest
            .add_child(&NodeId::from("lib"), lib.books, 0, lib.book_with_chapters("b", &["c1"]))
            .unwrap();

        let event = forest.delete_child(&NodeId::from("b")).unwrap();
        let command = mapper().map(forest.types(), &event).unwrap();

        assert_eq!(
            command.kind,
            CommandKind::DeleteChild {
                parent: "lib".into(),
                containment: pointer("Library-books"),
                index: 0,
                deleted_child: "b".into(),
            }
        );
    }

    #[test]
    fn added_subtrees_are_serialized_with_descendants() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&[]);
        let event = forest
            .add_child(
                &NodeId::from("lib"),
                lib.books,
                0,
                lib.book_with_chapters("b", &["c1", "c2"]),
            )
            .unwrap();

        let kind = mapper().map(forest.types(), &event).unwrap().kind;
        let CommandKind::AddChild { new_child, .. } = kind else {
            panic!("expected AddChild");
        };
        let ids: Vec<&str> = new_child.nodes.iter().map(|node| node.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&"c1") && ids.contains(&"c2"));
    }

    #[test]
    fn reference_entries_keep_both_halves() {
        let lib = Library::new();
        let forest = lib.forest_with_books(&["a"]);
        let change = forest
            .registry()
            .plan_add_reference(
                &NodeId::from("a"),
                lib.author,
                0,
                ReferenceTarget::to("lib-w1").with_resolve_info("Ursula"),
            )
            .unwrap();

        let kind = mapper().map_change(forest.types(), &change).unwrap();
        assert_eq!(
            kind,
            CommandKind::AddReference {
                parent: "a".into(),
                reference: pointer("Book-author"),
                index: 0,
                new_target: Some("lib-w1".into()),
                new_resolve_info: Some("Ursula".into()),
            }
        );
    }
}
