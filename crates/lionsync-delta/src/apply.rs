//! Apply mapper: wire command to semantic partition event.
//!
//! Every node id and meta pointer in the command is resolved against the
//! current registry, and the prior state the event records is read from it.
//! Mapping never mutates; new nodes enter the registry only when the forest
//! applies the resulting event.

use crate::resolve::{entry, expect_kind, Resolver};
use lionsync_core::{
    Change, ChunkCodec, CommandSource, EventId, ParticipationId, PartitionEvent, Registry, Result,
    SubtreeCodec,
};
use lionsync_proto::{CommandKind, SingleCommand};

/// Maps received commands to partition events.
#[derive(Debug, Clone, Default)]
pub struct ApplyMapper<C = ChunkCodec> {
    codec: C,
}

impl<C: SubtreeCodec> ApplyMapper<C> {
    /// Create a mapper that materializes chunks with `codec`.
    #[must_use]
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    /// Map one command issued by `participation`.
    ///
    /// The event id is the single command source `participation/command_id`.
    ///
    /// # Errors
    ///
    /// Fails if an id, pointer or value cannot be resolved, or if the
    /// command does not fit the current state.
    pub fn map(
        &self,
        registry: &Registry,
        participation: &ParticipationId,
        command: &SingleCommand,
    ) -> Result<PartitionEvent> {
        let change = self.map_kind(registry, &command.kind)?;
        tracing::debug!(
            command = %command.command_id,
            kind = command.kind.kind(),
            "Mapped command to change"
        );
        let source = CommandSource::new(participation.clone(), command.command_id.clone());
        Ok(PartitionEvent::new(EventId::command(source), change))
    }

    /// Map the payload of a command to a change.
    ///
    /// # Errors
    ///
    /// See [`ApplyMapper::map`].
    #[allow(clippy::too_many_lines)]
    pub fn map_kind(&self, registry: &Registry, command: &CommandKind) -> Result<Change> {
        let resolve = Resolver::new(registry, &self.codec);

        match command {
            CommandKind::AddPartition { new_partition } => {
                registry.plan_add_partition(resolve.subtree(new_partition)?)
            }
            CommandKind::DeletePartition { deleted_partition } => {
                registry.plan_delete_partition(deleted_partition)
            }
            CommandKind::ChangeClassifier { node, new_classifier } => {
                registry.plan_change_classifier(node, resolve.classifier(new_classifier)?)
            }
            CommandKind::AddProperty {
                node,
                property,
                new_value,
            } => {
                let (property, value) = resolve.value(property, new_value)?;
                registry.plan_add_property(node, property, value)
            }
            CommandKind::DeleteProperty { node, property } => {
                registry.plan_delete_property(node, resolve.property(property)?)
            }
            CommandKind::ChangeProperty {
                node,
                property,
                new_value,
            } => {
                let (property, value) = resolve.value(property, new_value)?;
                registry.plan_change_property(node, property, value)
            }
            CommandKind::AddChild {
                parent,
                new_child,
                containment,
                index,
            } => registry.plan_add_child(
                parent,
                resolve.containment(containment)?,
                *index,
                resolve.subtree(new_child)?,
            ),
            CommandKind::DeleteChild {
                parent,
                containment,
                index,
                deleted_child,
            } => registry.plan_delete_child(
                parent,
                resolve.containment(containment)?,
                *index,
                deleted_child,
            ),
            CommandKind::ReplaceChild {
                new_child,
                parent,
                containment,
                index,
                replaced_child,
            } => registry.plan_replace_child(
                parent,
                resolve.containment(containment)?,
                *index,
                replaced_child,
                resolve.subtree(new_child)?,
            ),
            CommandKind::MoveChildFromOtherContainment {
                new_parent,
                new_containment,
                new_index,
                moved_child,
            } => expect_kind(
                registry.plan_move_child(
                    new_parent,
                    resolve.containment(new_containment)?,
                    *new_index,
                    moved_child,
                )?,
                "ChildMovedFromOtherContainment",
            ),
            CommandKind::MoveChildFromOtherContainmentInSameParent {
                new_containment,
                new_index,
                moved_child,
            } => {
                let old = registry.locate_child(moved_child)?;
                expect_kind(
                    registry.plan_move_child(
                        &old.parent,
                        resolve.containment(new_containment)?,
                        *new_index,
                        moved_child,
                    )?,
                    "ChildMovedFromOtherContainmentInSameParent",
                )
            }
            CommandKind::MoveChildInSameContainment { new_index, moved_child } => {
                let old = registry.locate_child(moved_child)?;
                registry.plan_move_child(&old.parent, old.containment, *new_index, moved_child)
            }
            CommandKind::MoveAndReplaceChildFromOtherContainment {
                new_parent,
                new_containment,
                new_index,
                replaced_child,
                moved_child,
            } => expect_kind(
                registry.plan_move_and_replace_child(
                    new_parent,
                    resolve.containment(new_containment)?,
                    *new_index,
                    moved_child,
                    replaced_child,
                )?,
                "ChildMovedAndReplacedFromOtherContainment",
            ),
            CommandKind::MoveAndReplaceChildFromOtherContainmentInSameParent {
                new_containment,
                new_index,
                replaced_child,
                moved_child,
            } => {
                let old = registry.locate_child(moved_child)?;
                expect_kind(
                    registry.plan_move_and_replace_child(
                        &old.parent,
                        resolve.containment(new_containment)?,
                        *new_index,
                        moved_child,
                        replaced_child,
                    )?,
                    "ChildMovedAndReplacedFromOtherContainmentInSameParent",
                )
            }
            CommandKind::MoveAndReplaceChildInSameContainment {
                new_index,
                replaced_child,
                moved_child,
            } => {
                let old = registry.locate_child(moved_child)?;
                registry.plan_move_and_replace_child(
                    &old.parent,
                    old.containment,
                    *new_index,
                    moved_child,
                    replaced_child,
                )
            }
            CommandKind::AddAnnotation {
                parent,
                new_annotation,
                index,
            } => registry.plan_add_annotation(parent, *index, resolve.subtree(new_annotation)?),
            CommandKind::DeleteAnnotation {
                parent,
                index,
                deleted_annotation,
            } => registry.plan_delete_annotation(parent, *index, deleted_annotation),
            CommandKind::ReplaceAnnotation {
                new_annotation,
                parent,
                index,
                replaced_annotation,
            } => registry.plan_replace_annotation(
                parent,
                *index,
                replaced_annotation,
                resolve.subtree(new_annotation)?,
            ),
            CommandKind::MoveAnnotationFromOtherParent {
                new_parent,
                new_index,
                moved_annotation,
            } => expect_kind(
                registry.plan_move_annotation(new_parent, *new_index, moved_annotation)?,
                "AnnotationMovedFromOtherParent",
            ),
            CommandKind::MoveAnnotationInSameParent {
                new_index,
                moved_annotation,
            } => {
                let old = registry.locate_annotation(moved_annotation)?;
                registry.plan_move_annotation(&old.parent, *new_index, moved_annotation)
            }
            CommandKind::MoveAndReplaceAnnotationFromOtherParent {
                new_parent,
                new_index,
                replaced_annotation,
                moved_annotation,
            } => expect_kind(
                registry.plan_move_and_replace_annotation(
                    new_parent,
                    *new_index,
                    moved_annotation,
                    replaced_annotation,
                )?,
                "AnnotationMovedAndReplacedFromOtherParent",
            ),
            CommandKind::MoveAndReplaceAnnotationInSameParent {
                new_index,
                replaced_annotation,
                moved_annotation,
            } => {
                let old = registry.locate_annotation(moved_annotation)?;
                registry.plan_move_and_replace_annotation(
                    &old.parent,
                    *new_index,
                    moved_annotation,
                    replaced_annotation,
                )
            }
            CommandKind::AddReference {
                parent,
                reference,
                index,
                new_target,
                new_resolve_info,
            } => registry.plan_add_reference(
                parent,
                resolve.reference(reference)?,
                *index,
                entry(new_target.as_ref(), new_resolve_info.as_ref())?,
            ),
            CommandKind::DeleteReference {
                parent,
                reference,
                index,
            } => registry.plan_delete_reference(parent, resolve.reference(reference)?, *index),
            CommandKind::ChangeReference {
                parent,
                reference,
                index,
                new_target,
                new_resolve_info,
            } => registry.plan_change_reference(
                parent,
                resolve.reference(reference)?,
                *index,
                entry(new_target.as_ref(), new_resolve_info.as_ref())?,
            ),
            CommandKind::MoveEntryFromOtherReference {
                new_parent,
                new_reference,
                new_index,
                old_parent,
                old_reference,
                old_index,
            } => expect_kind(
                registry.plan_move_entry(
                    new_parent,
                    resolve.reference(new_reference)?,
                    *new_index,
                    old_parent,
                    resolve.reference(old_reference)?,
                    *old_index,
                )?,
                "EntryMovedFromOtherReference",
            ),
            CommandKind::MoveEntryFromOtherReferenceInSameParent {
                parent,
                new_reference,
                new_index,
                old_reference,
                old_index,
            } => expect_kind(
                registry.plan_move_entry(
                    parent,
                    resolve.reference(new_reference)?,
                    *new_index,
                    parent,
                    resolve.reference(old_reference)?,
                    *old_index,
                )?,
                "EntryMovedFromOtherReferenceInSameParent",
            ),
            CommandKind::MoveEntryInSameReference {
                parent,
                reference,
                new_index,
                old_index,
            } => {
                let reference = resolve.reference(reference)?;
                registry.plan_move_entry(
                    parent,
                    reference,
                    *new_index,
                    parent,
                    reference,
                    *old_index,
                )
            }
            CommandKind::MoveAndReplaceEntryFromOtherReference {
                new_parent,
                new_reference,
                new_index,
                old_parent,
                old_reference,
                old_index,
            } => expect_kind(
                registry.plan_move_and_replace_entry(
                    new_parent,
                    resolve.reference(new_reference)?,
                    *new_index,
                    old_parent,
                    resolve.reference(old_reference)?,
                    *old_index,
                )?,
                "EntryMovedAndReplacedFromOtherReference",
            ),
            CommandKind::MoveAndReplaceEntryFromOtherReferenceInSameParent {
                parent,
                new_reference,
                new_index,
                old_reference,
                old_index,
            } => expect_kind(
                registry.plan_move_and_replace_entry(
                    parent,
                    resolve.reference(new_reference)?,
                    *new_index,
                    parent,
                    resolve.reference(old_reference)?,
                    *old_index,
                )?,
                "EntryMovedAndReplacedFromOtherReferenceInSameParent",
            ),
            CommandKind::MoveAndReplaceEntryInSameReference {
                parent,
                reference,
                new_index,
                old_index,
            } => {
                let reference = resolve.reference(reference)?;
                registry.plan_move_and_replace_entry(
                    parent,
                    reference,
                    *new_index,
                    parent,
                    reference,
                    *old_index,
                )
            }
            CommandKind::AddReferenceResolveInfo {
                parent,
                reference,
                index,
                new_resolve_info,
            } => registry.plan_add_resolve_info(
                parent,
                resolve.reference(reference)?,
                *index,
                new_resolve_info.clone(),
            ),
            CommandKind::DeleteReferenceResolveInfo {
                parent,
                reference,
                index,
            } => registry.plan_delete_resolve_info(parent, resolve.reference(reference)?, *index),
            CommandKind::ChangeReferenceResolveInfo {
                parent,
                reference,
                index,
                new_resolve_info,
            } => registry.plan_change_resolve_info(
                parent,
                resolve.reference(reference)?,
                *index,
                new_resolve_info.clone(),
            ),
            CommandKind::AddReferenceTarget {
                parent,
                reference,
                index,
                new_target,
            } => {
                registry.plan_add_target(parent, resolve.reference(reference)?, *index, new_target)
            }
            CommandKind::DeleteReferenceTarget {
                parent,
                reference,
                index,
            } => registry.plan_delete_target(parent, resolve.reference(reference)?, *index),
            CommandKind::ChangeReferenceTarget {
                parent,
                reference,
                index,
                new_target,
            } => registry.plan_change_target(
                parent,
                resolve.reference(reference)?,
                *index,
                new_target,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lionsync_core::test_support::{pointer, Library};
    use lionsync_core::{DeltaError, NodeId, PropertyValue};

    fn participation() -> ParticipationId {
        ParticipationId::from("p-1")
    }

    fn command(kind: CommandKind) -> SingleCommand {
        SingleCommand::new("c-1", kind)
    }

    #[test]
    fn change_property_reads_old_value_and_correlates_command() {
        let lib = Library::new();
        let forest = lib.forest_with_books(&["b1"]);

        let event = ApplyMapper::new(ChunkCodec)
            .map(
                forest.registry(),
                &participation(),
                &command(CommandKind::ChangeProperty {
                    node: "b1".into(),
                    property: pointer("Book-title"),
                    new_value: "Dune".into(),
                }),
            )
            .unwrap();

        assert_eq!(event.id, EventId::command(CommandSource::new("p-1", "c-1")));
        assert_eq!(
            event.change,
            Change::PropertyChanged {
                node: "b1".into(),
                property: lib.title,
                new_value: PropertyValue::from("Dune"),
                old_value: PropertyValue::from("b1"),
            }
        );
    }

    #[test]
    fn move_in_same_containment_scans_for_old_index() {
        let lib = Library::new();
        let forest = lib.forest_with_books(&["a", "b", "c"]);

        let change = ApplyMapper::new(ChunkCodec)
            .map_kind(
                forest.registry(),
                &CommandKind::MoveChildInSameContainment {
                    new_index: 0,
                    moved_child: "c".into(),
                },
            )
            .unwrap();

        assert_eq!(
            change,
            Change::ChildMovedInSameContainment {
                parent: "lib".into(),
                containment: lib.books,
                new_index: 0,
                moved_child: "c".into(),
                old_index: 2,
            }
        );
    }

    #[test]
    fn add_child_materializes_chunk_without_registering_it() {
        let lib = Library::new();
        let forest = lib.forest_with_books(&["a"]);
        let nodes_before = forest.registry().nodes().len();

        let change = ApplyMapper::new(ChunkCodec)
            .map_kind(
                forest.registry(),
                &CommandKind::AddChild {
                    parent: "lib".into(),
                    new_child: lib.chunk(&lib.book_with_chapters("n", &["n1", "n2"])),
                    containment: pointer("Library-books"),
                    index: 1,
                },
            )
            .unwrap();

        let Change::ChildAdded { new_child, index, .. } = change else {
            panic!("expected ChildAdded, got {change:?}");
        };
        assert_eq!(index, 1);
        assert_eq!(new_child.len(), 3);
        assert_eq!(forest.registry().nodes().len(), nodes_before);
        assert!(!forest.registry().nodes().contains(&NodeId::from("n")));
    }

    #[test]
    fn unresolvable_ids_and_pointers_are_rejected() {
        let lib = Library::new();
        let forest = lib.forest_with_books(&["a"]);
        let mapper = ApplyMapper::new(ChunkCodec);

        let unknown_node = mapper.map_kind(
            forest.registry(),
            &CommandKind::DeleteProperty {
                node: "ghost".into(),
                property: pointer("Book-title"),
            },
        );
        assert_eq!(unknown_node, Err(DeltaError::UnknownNode("ghost".into())));

        let unknown_feature = mapper.map_kind(
            forest.registry(),
            &CommandKind::DeleteProperty {
                node: "a".into(),
                property: pointer("Book-isbn"),
            },
        );
        assert!(matches!(unknown_feature, Err(DeltaError::UnknownFeature(_))));

        let wrong_kind = mapper.map_kind(
            forest.registry(),
            &CommandKind::DeleteProperty {
                node: "a".into(),
                property: pointer("Book-chapters"),
            },
        );
        assert!(matches!(wrong_kind, Err(DeltaError::FeatureKindMismatch { .. })));

        let bad_value = mapper.map_kind(
            forest.registry(),
            &CommandKind::AddProperty {
                node: "a".into(),
                property: pointer("Book-pages"),
                new_value: "many".into(),
            },
        );
        assert!(matches!(bad_value, Err(DeltaError::InvalidValue { .. })));
    }

    #[test]
    fn reference_target_in_chunk_must_be_known() {
        let lib = Library::new();
        let forest = lib.forest_with_books(&["a"]);
        let mut chunk = lib.chunk(&lib.book("n", "New"));
        chunk.nodes[0].references.push(lionsync_core::SerializedReference {
            reference: pointer("Book-author"),
            targets: vec![lionsync_core::SerializedReferenceTarget {
                resolve_info: None,
                reference: Some("nobody".into()),
            }],
        });

        let result = ApplyMapper::new(ChunkCodec).map_kind(
            forest.registry(),
            &CommandKind::AddChild {
                parent: "lib".into(),
                new_child: chunk,
                containment: pointer("Library-books"),
                index: 0,
            },
        );

        assert_eq!(result, Err(DeltaError::UnknownNode("nobody".into())));
    }

    #[test]
    fn move_variant_must_match_current_location() {
        let lib = Library::new();
        let forest = lib.forest_with_books(&["a", "b"]);

        let result = ApplyMapper::new(ChunkCodec).map_kind(
            forest.registry(),
            &CommandKind::MoveChildFromOtherContainment {
                new_parent: "lib".into(),
                new_containment: pointer("Library-books"),
                new_index: 0,
                moved_child: "b".into(),
            },
        );

        assert!(matches!(result, Err(DeltaError::InvalidMove(_))));
    }

    #[test]
    fn empty_reference_entry_is_missing_a_value() {
        let lib = Library::new();
        let forest = lib.forest_with_books(&["a"]);

        let result = ApplyMapper::new(ChunkCodec).map_kind(
            forest.registry(),
            &CommandKind::AddReference {
                parent: "a".into(),
                reference: pointer("Book-related"),
                index: 0,
                new_target: None,
                new_resolve_info: None,
            },
        );

        assert!(matches!(result, Err(DeltaError::MissingValue(_))));
    }
}
