//! The local model: a forest of partitions over one node arena.
//!
//! All mutation goes through [`Forest::apply`], which re-plans a change
//! against the current state before touching it. A change whose recorded
//! prior state is stale is rejected and nothing is mutated.

use crate::bus::{EventFilter, PartitionEventBus, SubscriptionId};
use crate::error::{DeltaError, Result};
use crate::event::{Change, PartitionEvent};
use crate::ids::{EventId, NodeId};
use crate::node::{Node, ReferenceTarget, Subtree};
use crate::registry::{NodeRegistry, Registry};
use crate::types::{CompressedMetaPointer, TypeRegistry};
use crate::value::PropertyValue;
use std::sync::Arc;

/// Snapshot of the forest's nodes and partitions.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    nodes: NodeRegistry,
    partitions: Vec<NodeId>,
}

/// Partitions, the registry resolving their nodes, and the event bus.
#[derive(Debug)]
pub struct Forest {
    registry: Registry,
    partitions: Vec<NodeId>,
    bus: PartitionEventBus,
    next_local: u64,
}

impl Forest {
    /// Create an empty forest for the given types.
    #[must_use]
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self {
            registry: Registry::new(types),
            partitions: Vec::new(),
            bus: PartitionEventBus::new(),
            next_local: 0,
        }
    }

    /// The resolution registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The type registry.
    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        self.registry.types()
    }

    /// Root ids of all partitions, in the order they were added.
    #[must_use]
    pub fn partitions(&self) -> &[NodeId] {
        &self.partitions
    }

    /// Resolve a node id.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::UnknownNode`] if the id is not registered.
    pub fn node(&self, id: &NodeId) -> Result<&Node> {
        self.registry.node(id)
    }

    /// Register an event handler on the bus.
    pub fn subscribe<F>(&mut self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: FnMut(&PartitionEvent, &Registry) -> Result<()> + 'static,
    {
        self.bus.subscribe(filter, handler)
    }

    /// Remove an event handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Apply a change without raising it.
    ///
    /// # Errors
    ///
    /// Fails with the planner's error if the change is invalid, and with
    /// [`DeltaError::StaleChange`] if its recorded prior state differs from
    /// the current state. Nothing is mutated on failure.
    pub fn apply(&mut self, event: &PartitionEvent) -> Result<()> {
        let change = &event.change;
        let planned = self.registry.replan(change)?;
        if planned != *change {
            return Err(DeltaError::StaleChange(change.kind()));
        }
        self.perform(change)?;
        tracing::debug!(kind = change.kind(), id = ?event.id, "Applied change");
        Ok(())
    }

    /// Raise an already applied event on the bus.
    ///
    /// # Errors
    ///
    /// Returns the first handler error.
    pub fn emit(&mut self, event: &PartitionEvent) -> Result<()> {
        self.bus.raise(event, &self.registry)
    }

    /// Apply a local change and raise it under a fresh local event id.
    ///
    /// The change stays applied if a handler fails.
    ///
    /// # Errors
    ///
    /// Fails like [`Forest::apply`] and [`Forest::emit`].
    pub fn commit(&mut self, change: Change) -> Result<PartitionEvent> {
        let event = PartitionEvent::new(EventId::Local(self.next_local), change);
        self.apply(&event)?;
        self.next_local += 1;
        self.emit(&event)?;
        Ok(event)
    }

    /// Snapshot nodes and partitions.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            nodes: self.registry.nodes().clone(),
            partitions: self.partitions.clone(),
        }
    }

    /// Roll back to a snapshot taken from this forest.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.registry.replace_nodes(checkpoint.nodes);
        self.partitions = checkpoint.partitions;
        tracing::debug!(partitions = self.partitions.len(), "Restored checkpoint");
    }

    /// Add a new partition.
    ///
    /// # Errors
    ///
    /// Fails like [`Registry::plan_add_partition`].
    pub fn add_partition(&mut self, partition: Subtree) -> Result<PartitionEvent> {
        let change = self.registry.plan_add_partition(partition)?;
        self.commit(change)
    }

    /// Delete a partition with all its nodes.
    ///
    /// # Errors
    ///
    /// Fails like [`Registry::plan_delete_partition`].
    pub fn delete_partition(&mut self, partition: &NodeId) -> Result<PartitionEvent> {
        let change = self.registry.plan_delete_partition(partition)?;
        self.commit(change)
    }

    /// Change the classifier of a node.
    ///
    /// # Errors
    ///
    /// Fails like [`Registry::plan_change_classifier`].
    pub fn change_classifier(
        &mut self,
        node: &NodeId,
        classifier: CompressedMetaPointer,
    ) -> Result<PartitionEvent> {
        let change = self.registry.plan_change_classifier(node, classifier)?;
        self.commit(change)
    }

    /// Set a property, adding or changing its value.
    ///
    /// # Errors
    ///
    /// Fails like [`Registry::plan_set_property`].
    pub fn set_property(
        &mut self,
        node: &NodeId,
        property: CompressedMetaPointer,
        value: impl Into<PropertyValue>,
    ) -> Result<PartitionEvent> {
        let change = self.registry.plan_set_property(node, property, value.into())?;
        self.commit(change)
    }

    /// Unset a property.
    ///
    /// # Errors
    ///
    /// Fails like [`Registry::plan_delete_property`].
    pub fn delete_property(
        &mut self,
        node: &NodeId,
        property: CompressedMetaPointer,
    ) -> Result<PartitionEvent> {
        let change = self.registry.plan_delete_property(node, property)?;
        self.commit(change)
    }

    /// Insert a new subtree into a containment.
    ///
    /// # Errors
    ///
    /// Fails like [`Registry::plan_add_child`].
    pub fn add_child(
        &mut self,
        parent: &NodeId,
        containment: CompressedMetaPointer,
        index: usize,
        child: Subtree,
    ) -> Result<PartitionEvent> {
        let change = self.registry.plan_add_child(parent, containment, index, child)?;
        self.commit(change)
    }

    /// Delete a child, wherever it currently sits.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::NotContained`] if the node is not a
    /// containment child.
    pub fn delete_child(&mut self, child: &NodeId) -> Result<PartitionEvent> {
        let location = self.registry.locate_child(child)?;
        let change = self.registry.plan_delete_child(
            &location.parent,
            location.containment,
            location.index,
            child,
        )?;
        self.commit(change)
    }

    /// Move an existing child to a new location.
    ///
    /// # Errors
    ///
    /// Fails like [`Registry::plan_move_child`].
    pub fn move_child(
        &mut self,
        new_parent: &NodeId,
        containment: CompressedMetaPointer,
        index: usize,
        child: &NodeId,
    ) -> Result<PartitionEvent> {
        let change = self.registry.plan_move_child(new_parent, containment, index, child)?;
        self.commit(change)
    }

    /// Attach a new annotation subtree.
    ///
    /// # Errors
    ///
    /// Fails like [`Registry::plan_add_annotation`].
    pub fn add_annotation(
        &mut self,
        parent: &NodeId,
        index: usize,
        annotation: Subtree,
    ) -> Result<PartitionEvent> {
        let change = self.registry.plan_add_annotation(parent, index, annotation)?;
        self.commit(change)
    }

    /// Insert a reference entry.
    ///
    /// # Errors
    ///
    /// Fails like [`Registry::plan_add_reference`].
    pub fn add_reference(
        &mut self,
        parent: &NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        entry: ReferenceTarget,
    ) -> Result<PartitionEvent> {
        let change = self.registry.plan_add_reference(parent, reference, index, entry)?;
        self.commit(change)
    }

    /// Point an existing reference entry at a node.
    ///
    /// # Errors
    ///
    /// Fails like [`Registry::plan_set_target`].
    pub fn set_reference_target(
        &mut self,
        parent: &NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        target: &NodeId,
    ) -> Result<PartitionEvent> {
        let change = self.registry.plan_set_target(parent, reference, index, target)?;
        self.commit(change)
    }

    fn perform(&mut self, change: &Change) -> Result<()> {
        let mut edit = Mutation {
            nodes: self.registry.nodes_mut(),
            kind: change.kind(),
        };

        match change {
            Change::PartitionAdded { new_partition } => {
                edit.nodes.insert_subtree(new_partition.clone(), None)?;
                self.partitions.push(new_partition.root().clone());
            }
            Change::PartitionDeleted { deleted_partition } => {
                let root = deleted_partition.root();
                edit.nodes.remove_subtree(root)?;
                self.partitions.retain(|id| id != root);
            }
            Change::ClassifierChanged {
                node,
                new_classifier,
                ..
            } => edit.node(node, |n| {
                n.classifier = *new_classifier;
                Some(())
            })?,

            Change::PropertyAdded {
                node,
                property,
                new_value,
            }
            | Change::PropertyChanged {
                node,
                property,
                new_value,
                ..
            } => edit.node(node, |n| {
                n.properties.insert(*property, new_value.clone());
                Some(())
            })?,
            Change::PropertyDeleted { node, property, .. } => {
                edit.node(node, |n| n.properties.remove(property).map(|_| ()))?;
            }

            Change::ChildAdded {
                parent,
                containment,
                index,
                new_child,
            } => {
                edit.nodes.insert_subtree(new_child.clone(), Some(parent.clone()))?;
                let root = new_child.root().clone();
                edit.node(parent, |n| insert_at(n.children_mut(*containment), *index, root))?;
            }
            Change::ChildDeleted {
                parent,
                containment,
                index,
                deleted_child,
            } => {
                edit.node(parent, |n| remove_at(n.children_mut(*containment), *index))?;
                edit.nodes.remove_subtree(deleted_child.root())?;
            }
            Change::ChildReplaced {
                parent,
                containment,
                index,
                new_child,
                replaced_child,
            } => {
                let root = new_child.root().clone();
                edit.node(parent, |n| replace_at(n.children_mut(*containment), *index, root))?;
                edit.nodes.remove_subtree(replaced_child.root())?;
                edit.nodes.insert_subtree(new_child.clone(), Some(parent.clone()))?;
            }
            Change::ChildMovedFromOtherContainment {
                new_parent,
                new_containment,
                new_index,
                moved_child,
                old_parent,
                old_containment,
                old_index,
            } => edit.move_child(
                (old_parent, *old_containment, *old_index),
                (new_parent, *new_containment, *new_index),
                moved_child,
            )?,
            Change::ChildMovedFromOtherContainmentInSameParent {
                parent,
                new_containment,
                new_index,
                moved_child,
                old_containment,
                old_index,
            } => edit.move_child(
                (parent, *old_containment, *old_index),
                (parent, *new_containment, *new_index),
                moved_child,
            )?,
            Change::ChildMovedInSameContainment {
                parent,
                containment,
                new_index,
                moved_child,
                old_index,
            } => edit.move_child(
                (parent, *containment, *old_index),
                (parent, *containment, *new_index),
                moved_child,
            )?,
            Change::ChildMovedAndReplacedFromOtherContainment {
                new_parent,
                new_containment,
                new_index,
                moved_child,
                old_parent,
                old_containment,
                old_index,
                replaced_child,
            } => edit.move_and_replace_child(
                (old_parent, *old_containment, *old_index),
                (new_parent, *new_containment, *new_index),
                moved_child,
                replaced_child.root(),
            )?,
            Change::ChildMovedAndReplacedFromOtherContainmentInSameParent {
                parent,
                new_containment,
                new_index,
                moved_child,
                old_containment,
                old_index,
                replaced_child,
            } => edit.move_and_replace_child(
                (parent, *old_containment, *old_index),
                (parent, *new_containment, *new_index),
                moved_child,
                replaced_child.root(),
            )?,
            Change::ChildMovedAndReplacedInSameContainment {
                parent,
                containment,
                new_index,
                moved_child,
                old_index,
                replaced_child,
            } => edit.move_and_replace_child(
                (parent, *containment, *old_index),
                (parent, *containment, *new_index),
                moved_child,
                replaced_child.root(),
            )?,

            Change::AnnotationAdded {
                parent,
                index,
                new_annotation,
            } => {
                edit.nodes.insert_subtree(new_annotation.clone(), Some(parent.clone()))?;
                let root = new_annotation.root().clone();
                edit.node(parent, |n| insert_at(&mut n.annotations, *index, root))?;
            }
            Change::AnnotationDeleted {
                parent,
                index,
                deleted_annotation,
            } => {
                edit.node(parent, |n| remove_at(&mut n.annotations, *index))?;
                edit.nodes.remove_subtree(deleted_annotation.root())?;
            }
            Change::AnnotationReplaced {
                parent,
                index,
                new_annotation,
                replaced_annotation,
            } => {
                let root = new_annotation.root().clone();
                edit.node(parent, |n| replace_at(&mut n.annotations, *index, root))?;
                edit.nodes.remove_subtree(replaced_annotation.root())?;
                edit.nodes.insert_subtree(new_annotation.clone(), Some(parent.clone()))?;
            }
            Change::AnnotationMovedFromOtherParent {
                new_parent,
                new_index,
                moved_annotation,
                old_parent,
                old_index,
            } => edit.move_annotation(
                (old_parent, *old_index),
                (new_parent, *new_index),
                moved_annotation,
            )?,
            Change::AnnotationMovedInSameParent {
                parent,
                new_index,
                moved_annotation,
                old_index,
            } => {
                edit.move_annotation((parent, *old_index), (parent, *new_index), moved_annotation)?
            }
            Change::AnnotationMovedAndReplacedFromOtherParent {
                new_parent,
                new_index,
                moved_annotation,
                old_parent,
                old_index,
                replaced_annotation,
            } => edit.move_and_replace_annotation(
                (old_parent, *old_index),
                (new_parent, *new_index),
                moved_annotation,
                replaced_annotation.root(),
            )?,
            Change::AnnotationMovedAndReplacedInSameParent {
                parent,
                new_index,
                moved_annotation,
                old_index,
                replaced_annotation,
            } => edit.move_and_replace_annotation(
                (parent, *old_index),
                (parent, *new_index),
                moved_annotation,
                replaced_annotation.root(),
            )?,

            Change::ReferenceAdded {
                parent,
                reference,
                index,
                new_entry,
            } => edit.node(parent, |n| {
                insert_at(n.entries_mut(*reference), *index, new_entry.clone())
            })?,
            Change::ReferenceDeleted {
                parent,
                reference,
                index,
                ..
            } => {
                edit.node(parent, |n| remove_at(n.entries_mut(*reference), *index))?;
            }
            Change::ReferenceChanged {
                parent,
                reference,
                index,
                new_entry,
                ..
            } => {
                edit.node(parent, |n| {
                    replace_at(n.entries_mut(*reference), *index, new_entry.clone())
                })?;
            }
            Change::EntryMovedFromOtherReference {
                new_parent,
                new_reference,
                new_index,
                old_parent,
                old_reference,
                old_index,
                ..
            } => edit.move_entry(
                (old_parent, *old_reference, *old_index),
                (new_parent, *new_reference, *new_index),
            )?,
            Change::EntryMovedFromOtherReferenceInSameParent {
                parent,
                new_reference,
                new_index,
                old_reference,
                old_index,
                ..
            } => edit.move_entry(
                (parent, *old_reference, *old_index),
                (parent, *new_reference, *new_index),
            )?,
            Change::EntryMovedInSameReference {
                parent,
                reference,
                new_index,
                old_index,
                ..
            } => {
                edit.move_entry((parent, *reference, *old_index), (parent, *reference, *new_index))?
            }
            Change::EntryMovedAndReplacedFromOtherReference {
                new_parent,
                new_reference,
                new_index,
                old_parent,
                old_reference,
                old_index,
                ..
            } => edit.move_and_replace_entry(
                (old_parent, *old_reference, *old_index),
                (new_parent, *new_reference, *new_index),
            )?,
            Change::EntryMovedAndReplacedFromOtherReferenceInSameParent {
                parent,
                new_reference,
                new_index,
                old_reference,
                old_index,
                ..
            } => edit.move_and_replace_entry(
                (parent, *old_reference, *old_index),
                (parent, *new_reference, *new_index),
            )?,
            Change::EntryMovedAndReplacedInSameReference {
                parent,
                reference,
                new_index,
                old_index,
                ..
            } => edit.move_and_replace_entry(
                (parent, *reference, *old_index),
                (parent, *reference, *new_index),
            )?,
            Change::ReferenceResolveInfoAdded {
                parent,
                reference,
                index,
                new_resolve_info,
                ..
            }
            | Change::ReferenceResolveInfoChanged {
                parent,
                reference,
                index,
                new_resolve_info,
                ..
            } => edit.entry(parent, *reference, *index, |entry| {
                entry.resolve_info = Some(new_resolve_info.clone());
            })?,
            Change::ReferenceResolveInfoDeleted {
                parent,
                reference,
                index,
                ..
            } => edit.entry(parent, *reference, *index, |entry| entry.resolve_info = None)?,
            Change::ReferenceTargetAdded {
                parent,
                reference,
                index,
                new_target,
                ..
            }
            | Change::ReferenceTargetChanged {
                parent,
                reference,
                index,
                new_target,
                ..
            } => edit.entry(parent, *reference, *index, |entry| {
                entry.target = Some(new_target.clone());
            })?,
            Change::ReferenceTargetDeleted {
                parent,
                reference,
                index,
                ..
            } => edit.entry(parent, *reference, *index, |entry| entry.target = None)?,
        }
        Ok(())
    }
}

/// A position in a containment or reference: owner, feature, index.
type Slot<'a> = (&'a NodeId, CompressedMetaPointer, usize);

/// Raw arena edits for one validated change.
struct Mutation<'a> {
    nodes: &'a mut NodeRegistry,
    kind: &'static str,
}

impl Mutation<'_> {
    fn node<R>(&mut self, id: &NodeId, edit: impl FnOnce(&mut Node) -> Option<R>) -> Result<R> {
        let node = self.nodes.get_mut(id)?;
        let result = edit(node);
        node.prune();
        result.ok_or(DeltaError::StaleChange(self.kind))
    }

    fn entry(
        &mut self,
        parent: &NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        edit: impl FnOnce(&mut ReferenceTarget),
    ) -> Result<()> {
        self.node(parent, |n| n.entries_mut(reference).get_mut(index).map(edit))
    }

    fn reparent(&mut self, id: &NodeId, parent: &NodeId) -> Result<()> {
        self.nodes.get_mut(id)?.parent = Some(parent.clone());
        Ok(())
    }

    fn move_child(&mut self, from: Slot<'_>, to: Slot<'_>, moved: &NodeId) -> Result<()> {
        self.node(from.0, |n| remove_at(n.children_mut(from.1), from.2))?;
        self.node(to.0, |n| insert_at(n.children_mut(to.1), to.2, moved.clone()))?;
        self.reparent(moved, to.0)
    }

    fn move_and_replace_child(
        &mut self,
        from: Slot<'_>,
        to: Slot<'_>,
        moved: &NodeId,
        replaced: &NodeId,
    ) -> Result<()> {
        self.node(to.0, |n| replace_at(n.children_mut(to.1), to.2, moved.clone()))?;
        self.node(from.0, |n| remove_at(n.children_mut(from.1), from.2))?;
        self.nodes.remove_subtree(replaced)?;
        self.reparent(moved, to.0)
    }

    fn move_annotation(
        &mut self,
        from: (&NodeId, usize),
        to: (&NodeId, usize),
        moved: &NodeId,
    ) -> Result<()> {
        self.node(from.0, |n| remove_at(&mut n.annotations, from.1))?;
        self.node(to.0, |n| insert_at(&mut n.annotations, to.1, moved.clone()))?;
        self.reparent(moved, to.0)
    }

    fn move_and_replace_annotation(
        &mut self,
        from: (&NodeId, usize),
        to: (&NodeId, usize),
        moved: &NodeId,
        replaced: &NodeId,
    ) -> Result<()> {
        self.node(to.0, |n| replace_at(&mut n.annotations, to.1, moved.clone()))?;
        self.node(from.0, |n| remove_at(&mut n.annotations, from.1))?;
        self.nodes.remove_subtree(replaced)?;
        self.reparent(moved, to.0)
    }

    fn move_entry(&mut self, from: Slot<'_>, to: Slot<'_>) -> Result<()> {
        let entry = self.node(from.0, |n| remove_at(n.entries_mut(from.1), from.2))?;
        self.node(to.0, |n| insert_at(n.entries_mut(to.1), to.2, entry))
    }

    fn move_and_replace_entry(&mut self, from: Slot<'_>, to: Slot<'_>) -> Result<()> {
        let entry = self.node(from.0, |n| n.entries(from.1).get(from.2).cloned())?;
        self.node(to.0, |n| replace_at(n.entries_mut(to.1), to.2, entry))?;
        self.node(from.0, |n| remove_at(n.entries_mut(from.1), from.2))?;
        Ok(())
    }
}

fn insert_at<T>(list: &mut Vec<T>, index: usize, item: T) -> Option<()> {
    (index <= list.len()).then(|| list.insert(index, item))
}

fn remove_at<T>(list: &mut Vec<T>, index: usize) -> Option<T> {
    (index < list.len()).then(|| list.remove(index))
}

fn replace_at<T>(list: &mut [T], index: usize, item: T) -> Option<()> {
    list.get_mut(index).map(|slot| *slot = item)
}
