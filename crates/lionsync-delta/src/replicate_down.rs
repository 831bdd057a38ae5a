//! Replicate-down mapper: wire event to semantic partition event.
//!
//! Resolution works like the apply mapper, keyed off the ids the wire event
//! carries in its own fields. Prior state is re-read from the local registry
//! rather than trusted from the wire.

use crate::resolve::{entry, expect_kind, Resolver};
use lionsync_core::{Change, ChunkCodec, EventId, PartitionEvent, Registry, Result, SubtreeCodec};
use lionsync_proto::{EventKind, SingleEvent};

/// Maps received wire events to partition events.
#[derive(Debug, Clone, Default)]
pub struct ReplicateDownMapper<C = ChunkCodec> {
    codec: C,
}

impl<C: SubtreeCodec> ReplicateDownMapper<C> {
    /// Create a mapper that materializes chunks with `codec`.
    #[must_use]
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    /// Map one wire event. The event id keeps the event's origin commands.
    ///
    /// # Errors
    ///
    /// Fails if an id, pointer or value cannot be resolved, or if the event
    /// does not fit the local state.
    pub fn map(&self, registry: &Registry, event: &SingleEvent) -> Result<PartitionEvent> {
        let change = self.map_kind(registry, &event.kind)?;
        tracing::debug!(
            kind = event.kind.kind(),
            origins = event.origin_commands.len(),
            "Mapped event to change"
        );
        Ok(PartitionEvent::new(EventId::Commands(event.origin_commands.clone()), change))
    }

    /// Map the payload of a wire event to a change.
    ///
    /// # Errors
    ///
    /// See [`ReplicateDownMapper::map`].
    #[allow(clippy::too_many_lines)]
    pub fn map_kind(&self, registry: &Registry, event: &EventKind) -> Result<Change> {
        let resolve = Resolver::new(registry, &self.codec);

        match event {
            EventKind::PartitionAdded { new_partition } => {
                registry.plan_add_partition(resolve.subtree(new_partition)?)
            }
            EventKind::PartitionDeleted { deleted_partition, .. } => {
                registry.plan_delete_partition(deleted_partition)
            }
            EventKind::ClassifierChanged {
                node, new_classifier, ..
            } => registry.plan_change_classifier(node, resolve.classifier(new_classifier)?),
            EventKind::PropertyAdded {
                node,
                property,
                new_value,
            } => {
                let (property, value) = resolve.value(property, new_value)?;
                registry.plan_add_property(node, property, value)
            }
            EventKind::PropertyDeleted { node, property, .. } => {
                registry.plan_delete_property(node, resolve.property(property)?)
            }
            EventKind::PropertyChanged {
                node,
                property,
                new_value,
                ..
            } => {
                let (property, value) = resolve.value(property, new_value)?;
                registry.plan_change_property(node, property, value)
            }
            EventKind::ChildAdded {
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
            EventKind::ChildDeleted {
                deleted_child,
                parent,
                containment,
                index,
                ..
            } => registry.plan_delete_child(
                parent,
                resolve.containment(containment)?,
                *index,
                deleted_child,
            ),
            EventKind::ChildReplaced {
                new_child,
                replaced_child,
                parent,
                containment,
                index,
                ..
            } => registry.plan_replace_child(
                parent,
                resolve.containment(containment)?,
                *index,
                replaced_child,
                resolve.subtree(new_child)?,
            ),
            EventKind::ChildMovedFromOtherContainment {
                new_parent,
                new_containment,
                new_index,
                moved_child,
                ..
            } => expect_kind(
                registry.plan_move_child(
                    new_parent,
                    resolve.containment(new_containment)?,
                    *new_index,
                    moved_child,
                )?,
                event.kind(),
            ),
            EventKind::ChildMovedFromOtherContainmentInSameParent {
                parent,
                new_containment,
                new_index,
                moved_child,
                ..
            } => expect_kind(
                registry.plan_move_child(
                    parent,
                    resolve.containment(new_containment)?,
                    *new_index,
                    moved_child,
                )?,
                event.kind(),
            ),
            EventKind::ChildMovedInSameContainment {
                parent,
                containment,
                new_index,
                moved_child,
                ..
            } => expect_kind(
                registry.plan_move_child(
                    parent,
                    resolve.containment(containment)?,
                    *new_index,
                    moved_child,
                )?,
                event.kind(),
            ),
            EventKind::ChildMovedAndReplacedFromOtherContainment {
                new_parent,
                new_containment,
                new_index,
                moved_child,
                replaced_child,
                ..
            } => expect_kind(
                registry.plan_move_and_replace_child(
                    new_parent,
                    resolve.containment(new_containment)?,
                    *new_index,
                    moved_child,
                    replaced_child,
                )?,
                event.kind(),
            ),
            EventKind::ChildMovedAndReplacedFromOtherContainmentInSameParent {
                parent,
                new_containment,
                new_index,
                moved_child,
                replaced_child,
                ..
            } => expect_kind(
                registry.plan_move_and_replace_child(
                    parent,
                    resolve.containment(new_containment)?,
                    *new_index,
                    moved_child,
                    replaced_child,
                )?,
                event.kind(),
            ),
            EventKind::ChildMovedAndReplacedInSameContainment {
                parent,
                containment,
                new_index,
                moved_child,
                replaced_child,
                ..
            } => expect_kind(
                registry.plan_move_and_replace_child(
                    parent,
                    resolve.containment(containment)?,
                    *new_index,
                    moved_child,
                    replaced_child,
                )?,
                event.kind(),
            ),
            EventKind::AnnotationAdded {
                parent,
                new_annotation,
                index,
            } => registry.plan_add_annotation(parent, *index, resolve.subtree(new_annotation)?),
            EventKind::AnnotationDeleted {
                deleted_annotation,
                parent,
                index,
                ..
            } => registry.plan_delete_annotation(parent, *index, deleted_annotation),
            EventKind::AnnotationReplaced {
                new_annotation,
                replaced_annotation,
                parent,
                index,
                ..
            } => registry.plan_replace_annotation(
                parent,
                *index,
                replaced_annotation,
                resolve.subtree(new_annotation)?,
            ),
            EventKind::AnnotationMovedFromOtherParent {
                new_parent,
                new_index,
                moved_annotation,
                ..
            }
            | EventKind::AnnotationMovedInSameParent {
                parent: new_parent,
                new_index,
                moved_annotation,
                ..
            } => expect_kind(
                registry.plan_move_annotation(new_parent, *new_index, moved_annotation)?,
                event.kind(),
            ),
            EventKind::AnnotationMovedAndReplacedFromOtherParent {
                new_parent,
                new_index,
                moved_annotation,
                replaced_annotation,
                ..
            }
            | EventKind::AnnotationMovedAndReplacedInSameParent {
                parent: new_parent,
                new_index,
                moved_annotation,
                replaced_annotation,
                ..
            } => expect_kind(
                registry.plan_move_and_replace_annotation(
                    new_parent,
                    *new_index,
                    moved_annotation,
                    replaced_annotation,
                )?,
                event.kind(),
            ),
            EventKind::ReferenceAdded {
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
            EventKind::ReferenceDeleted {
                parent,
                reference,
                index,
                ..
            } => registry.plan_delete_reference(parent, resolve.reference(reference)?, *index),
            EventKind::ReferenceChanged {
                parent,
                reference,
                index,
                new_target,
                new_resolve_info,
                ..
            } => registry.plan_change_reference(
                parent,
                resolve.reference(reference)?,
                *index,
                entry(new_target.as_ref(), new_resolve_info.as_ref())?,
            ),
            EventKind::EntryMovedFromOtherReference {
                new_parent,
                new_reference,
                new_index,
                old_parent,
                old_reference,
                old_index,
                ..
            } => expect_kind(
                registry.plan_move_entry(
                    new_parent,
                    resolve.reference(new_reference)?,
                    *new_index,
                    old_parent,
                    resolve.reference(old_reference)?,
                    *old_index,
                )?,
                event.kind(),
            ),
            EventKind::EntryMovedFromOtherReferenceInSameParent {
                parent,
                new_reference,
                new_index,
                old_reference,
                old_index,
                ..
            } => expect_kind(
                registry.plan_move_entry(
                    parent,
                    resolve.reference(new_reference)?,
                    *new_index,
                    parent,
                    resolve.reference(old_reference)?,
                    *old_index,
                )?,
                event.kind(),
            ),
            EventKind::EntryMovedInSameReference {
                parent,
                reference,
                new_index,
                old_index,
                ..
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
            EventKind::EntryMovedAndReplacedFromOtherReference {
                new_parent,
                new_reference,
                new_index,
                old_parent,
                old_reference,
                old_index,
                ..
            } => expect_kind(
                registry.plan_move_and_replace_entry(
                    new_parent,
                    resolve.reference(new_reference)?,
                    *new_index,
                    old_parent,
                    resolve.reference(old_reference)?,
                    *old_index,
                )?,
                event.kind(),
            ),
            EventKind::EntryMovedAndReplacedFromOtherReferenceInSameParent {
                parent,
                new_reference,
                new_index,
                old_reference,
                old_index,
                ..
            } => expect_kind(
                registry.plan_move_and_replace_entry(
                    parent,
                    resolve.reference(new_reference)?,
                    *new_index,
                    parent,
                    resolve.reference(old_reference)?,
                    *old_index,
                )?,
                event.kind(),
            ),
            EventKind::EntryMovedAndReplacedInSameReference {
                parent,
                reference,
                new_index,
                old_index,
                ..
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
            EventKind::ReferenceResolveInfoAdded {
                parent,
                reference,
                index,
                new_resolve_info,
                ..
            } => registry.plan_add_resolve_info(
                parent,
                resolve.reference(reference)?,
                *index,
                new_resolve_info.clone(),
            ),
            EventKind::ReferenceResolveInfoDeleted {
                parent,
                reference,
                index,
                ..
            } => registry.plan_delete_resolve_info(parent, resolve.reference(reference)?, *index),
            EventKind::ReferenceResolveInfoChanged {
                parent,
                reference,
                index,
                new_resolve_info,
                ..
            } => registry.plan_change_resolve_info(
                parent,
                resolve.reference(reference)?,
                *index,
                new_resolve_info.clone(),
            ),
            EventKind::ReferenceTargetAdded {
                parent,
                reference,
                index,
                new_target,
                ..
            } => {
                registry.plan_add_target(parent, resolve.reference(reference)?, *index, new_target)
            }
            EventKind::ReferenceTargetDeleted {
                parent,
                reference,
                index,
                ..
            } => registry.plan_delete_target(parent, resolve.reference(reference)?, *index),
            EventKind::ReferenceTargetChanged {
                parent,
                reference,
                index,
                new_target,
                ..
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
    use lionsync_core::{CommandSource, DeltaError, NodeId, ReferenceTarget};

    #[test]
    fn correlation_keeps_every_origin() {
        let lib = Library::new();
        let forest = lib.forest_with_books(&["a"]);
        let origins = vec![CommandSource::new("p", "s1"), CommandSource::new("p", "s2")];
        let wire = SingleEvent::new(
            origins.clone(),
            EventKind::PropertyAdded {
                node: "a".into(),
                property: pointer("Book-pages"),
                new_value: "12".into(),
            },
        );

        let event = ReplicateDownMapper::new(ChunkCodec).map(forest.registry(), &wire).unwrap();

        assert_eq!(event.id, EventId::Commands(origins));
        assert!(matches!(event.change, Change::PropertyAdded { .. }));
    }

    #[test]
    fn old_values_come_from_local_state() {
        let lib = Library::new();
        let forest = lib.forest_with_books(&["a"]);
        let wire = EventKind::PropertyChanged {
            node: "a".into(),
            property: pointer("Book-title"),
            new_value: "Solaris".into(),
            old_value: "whatever the sender believed".into(),
        };

        let change = ReplicateDownMapper::new(ChunkCodec)
            .map_kind(forest.registry(), &wire)
            .unwrap();

        assert!(matches!(
            change,
            Change::PropertyChanged { ref old_value, .. } if old_value.to_wire() == "a"
        ));
    }

    #[test]
    fn entry_moves_resolve_the_source_location() {
        let lib = Library::new();
        let mut forest = lib.forest_with_books(&["a", "b"]);
        let a = NodeId::from("a");
        forest.add_reference(&a, lib.related, 0, ReferenceTarget::to("b")).unwrap();
        forest
            .add_reference(&a, lib.related, 1, ReferenceTarget::to("lib-w1").with_resolve_info("W"))
            .unwrap();

        let change = ReplicateDownMapper::new(ChunkCodec)
            .map_kind(
                forest.registry(),
                &EventKind::EntryMovedInSameReference {
                    parent: "a".into(),
                    reference: pointer("Book-related"),
                    new_index: 0,
                    old_index: 1,
                    moved_target: Some("lib-w1".into()),
                    moved_resolve_info: Some("W".into()),
                },
            )
            .unwrap();

        assert_eq!(
            change,
            Change::EntryMovedInSameReference {
                parent: a,
                reference: lib.related,
                new_index: 0,
                old_index: 1,
                moved_entry: ReferenceTarget::to("lib-w1").with_resolve_info("W"),
            }
        );
    }

    #[test]
    fn unknown_moved_child_is_rejected() {
        let lib = Library::new();
        let forest = lib.forest_with_books(&["a"]);

        let result = ReplicateDownMapper::new(ChunkCodec).map_kind(
            forest.registry(),
            &EventKind::ChildMovedInSameContainment {
                parent: "lib".into(),
                containment: pointer("Library-books"),
                new_index: 0,
                moved_child: "ghost".into(),
                old_index: 3,
            },
        );

        assert_eq!(result, Err(DeltaError::UnknownNode("ghost".into())));
    }
}
