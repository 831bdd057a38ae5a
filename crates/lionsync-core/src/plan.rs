//! Change planning.
//!
//! A planner turns an intended mutation into a [`Change`], reading every
//! prior value, location and removed subtree from the registry before
//! anything is mutated. Planners never mutate; [`Forest::apply`] performs
//! the change and re-plans it first to verify the recorded prior state.
//!
//! [`Forest::apply`]: crate::forest::Forest::apply

use crate::error::{DeltaError, Result};
use crate::event::Change;
use crate::ids::NodeId;
use crate::language::ClassifierKind;
use crate::node::{Node, ReferenceTarget, Subtree};
use crate::registry::Registry;
use crate::types::{CompressedMetaPointer, FeatureInfo};
use crate::value::PropertyValue;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;

const ANNOTATIONS: &str = "annotations";

impl Registry {
    /// Plan adding a new partition.
    ///
    /// # Errors
    ///
    /// Fails if the root's classifier is not a partition classifier, if any
    /// node id is taken, or if the subtree is not valid for the registered types.
    pub fn plan_add_partition(&self, partition: Subtree) -> Result<Change> {
        let root = partition.root_node();
        if !self.classifier(root.classifier)?.partition {
            return Err(DeltaError::NotAPartition(root.id.clone()));
        }
        self.check_new_subtree(&partition)?;
        Ok(Change::PartitionAdded {
            new_partition: partition,
        })
    }

    /// Plan deleting a partition with all its nodes.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::NotAPartition`] if the node has a parent.
    pub fn plan_delete_partition(&self, partition: &NodeId) -> Result<Change> {
        if self.node(partition)?.parent.is_some() {
            return Err(DeltaError::NotAPartition(partition.clone()));
        }
        Ok(Change::PartitionDeleted {
            deleted_partition: self.removed_subtree(partition)?,
        })
    }

    /// Plan changing the classifier of a node.
    ///
    /// # Errors
    ///
    /// Fails if the node is unknown or the handle is not a classifier, and
    /// with [`DeltaError::FeatureNotApplicable`] if the node holds a value
    /// for a feature the new classifier does not declare.
    pub fn plan_change_classifier(
        &self,
        node: &NodeId,
        new_classifier: CompressedMetaPointer,
    ) -> Result<Change> {
        self.classifier(new_classifier)?;
        let target = self.node(node)?;
        let set_features = target
            .properties
            .keys()
            .chain(
                target
                    .containments
                    .iter()
                    .filter(|(_, children)| !children.is_empty())
                    .map(|(k, _)| k),
            )
            .chain(
                target
                    .references
                    .iter()
                    .filter(|(_, entries)| !entries.is_empty())
                    .map(|(k, _)| k),
            );
        for &feature in set_features {
            if !self.types().declares(new_classifier, feature) {
                return Err(DeltaError::FeatureNotApplicable {
                    node: node.clone(),
                    feature: self.types().pointer(feature).clone(),
                });
            }
        }
        Ok(Change::ClassifierChanged {
            node: node.clone(),
            new_classifier,
            old_classifier: target.classifier,
        })
    }

    /// Plan giving an unset property its first value.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::FeatureAlreadySet`] if the property has a value.
    pub fn plan_add_property(
        &self,
        node: &NodeId,
        property: CompressedMetaPointer,
        new_value: PropertyValue,
    ) -> Result<Change> {
        let (target, info) = self.property_slot(node, property)?;
        check_value(info, &new_value)?;
        if target.property(property).is_some() {
            return Err(DeltaError::FeatureAlreadySet {
                node: node.clone(),
                feature: info.pointer.clone(),
            });
        }
        Ok(Change::PropertyAdded {
            node: node.clone(),
            property,
            new_value,
        })
    }

    /// Plan removing a property value.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::UnsetFeature`] if the property has no value.
    pub fn plan_delete_property(
        &self,
        node: &NodeId,
        property: CompressedMetaPointer,
    ) -> Result<Change> {
        let old_value = self.current_value(node, property)?;
        Ok(Change::PropertyDeleted {
            node: node.clone(),
            property,
            old_value,
        })
    }

    /// Plan replacing a property value.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::UnsetFeature`] if the property has no value.
    pub fn plan_change_property(
        &self,
        node: &NodeId,
        property: CompressedMetaPointer,
        new_value: PropertyValue,
    ) -> Result<Change> {
        let (_, info) = self.property_slot(node, property)?;
        check_value(info, &new_value)?;
        let old_value = self.current_value(node, property)?;
        Ok(Change::PropertyChanged {
            node: node.clone(),
            property,
            new_value,
            old_value,
        })
    }

    /// Plan setting a property, adding or changing as the current state requires.
    ///
    /// # Errors
    ///
    /// Fails like [`Registry::plan_add_property`].
    pub fn plan_set_property(
        &self,
        node: &NodeId,
        property: CompressedMetaPointer,
        value: PropertyValue,
    ) -> Result<Change> {
        let (target, _) = self.property_slot(node, property)?;
        if target.property(property).is_some() {
            self.plan_change_property(node, property, value)
        } else {
            self.plan_add_property(node, property, value)
        }
    }

    /// Plan inserting a new subtree into a containment.
    ///
    /// # Errors
    ///
    /// Fails if the index is beyond the end, a single-valued containment is
    /// occupied, or the subtree is not valid for the registered types.
    pub fn plan_add_child(
        &self,
        parent: &NodeId,
        containment: CompressedMetaPointer,
        index: usize,
        new_child: Subtree,
    ) -> Result<Change> {
        let (node, info) = self.containment_slot(parent, containment)?;
        let len = node.children(containment).len();
        check_insert(len, index, parent, &info.pointer)?;
        check_room(node, info, len)?;
        self.check_new_subtree(&new_child)?;
        Ok(Change::ChildAdded {
            parent: parent.clone(),
            containment,
            index,
            new_child,
        })
    }

    /// Plan deleting the child at a position.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::UnexpectedNode`] if a different node sits at
    /// the position.
    pub fn plan_delete_child(
        &self,
        parent: &NodeId,
        containment: CompressedMetaPointer,
        index: usize,
        deleted_child: &NodeId,
    ) -> Result<Change> {
        let (node, info) = self.containment_slot(parent, containment)?;
        let current = at(node.children(containment), index, parent, &info.pointer)?;
        expect_node(deleted_child, current)?;
        Ok(Change::ChildDeleted {
            parent: parent.clone(),
            containment,
            index,
            deleted_child: self.removed_subtree(current)?,
        })
    }

    /// Plan replacing the child at a position by a new subtree.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::UnexpectedNode`] if a different node sits at
    /// the position, or if the new subtree is not valid.
    pub fn plan_replace_child(
        &self,
        parent: &NodeId,
        containment: CompressedMetaPointer,
        index: usize,
        replaced_child: &NodeId,
        new_child: Subtree,
    ) -> Result<Change> {
        let (node, info) = self.containment_slot(parent, containment)?;
        let current = at(node.children(containment), index, parent, &info.pointer)?;
        expect_node(replaced_child, current)?;
        self.check_new_subtree(&new_child)?;
        Ok(Change::ChildReplaced {
            parent: parent.clone(),
            containment,
            index,
            new_child,
            replaced_child: self.removed_subtree(current)?,
        })
    }

    /// Plan moving an existing child to a new location.
    ///
    /// The variant is chosen from the child's current location: same
    /// containment, other containment of the same parent, or another parent.
    /// Within the same containment `new_index` is the final position.
    ///
    /// # Errors
    ///
    /// Fails if the child is not held by a containment, if the move would
    /// create a cycle, or if the target position is invalid.
    pub fn plan_move_child(
        &self,
        new_parent: &NodeId,
        new_containment: CompressedMetaPointer,
        new_index: usize,
        moved_child: &NodeId,
    ) -> Result<Change> {
        let (target, info) = self.containment_slot(new_parent, new_containment)?;
        let old = self.locate_child(moved_child)?;
        self.check_not_below(moved_child, new_parent)?;
        let children = target.children(new_containment);
        let moved_child = moved_child.clone();

        if old.parent == *new_parent && old.containment == new_containment {
            at(children, new_index, new_parent, &info.pointer)?;
            return Ok(Change::ChildMovedInSameContainment {
                parent: old.parent,
                containment: new_containment,
                new_index,
                moved_child,
                old_index: old.index,
            });
        }

        check_insert(children.len(), new_index, new_parent, &info.pointer)?;
        check_room(target, info, children.len())?;
        if old.parent == *new_parent {
            Ok(Change::ChildMovedFromOtherContainmentInSameParent {
                parent: old.parent,
                new_containment,
                new_index,
                moved_child,
                old_containment: old.containment,
                old_index: old.index,
            })
        } else {
            Ok(Change::ChildMovedFromOtherContainment {
                new_parent: new_parent.clone(),
                new_containment,
                new_index,
                moved_child,
                old_parent: old.parent,
                old_containment: old.containment,
                old_index: old.index,
            })
        }
    }

    /// Plan moving an existing child onto the position of another child,
    /// which is deleted together with its descendants.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::UnexpectedNode`] if `replaced_child` is not at
    /// the position and [`DeltaError::InvalidMove`] if it is the moved child
    /// or one of its ancestors.
    pub fn plan_move_and_replace_child(
        &self,
        new_parent: &NodeId,
        new_containment: CompressedMetaPointer,
        new_index: usize,
        moved_child: &NodeId,
        replaced_child: &NodeId,
    ) -> Result<Change> {
        let (target, info) = self.containment_slot(new_parent, new_containment)?;
        let current = at(target.children(new_containment), new_index, new_parent, &info.pointer)?;
        expect_node(replaced_child, current)?;
        let old = self.locate_child(moved_child)?;
        self.check_not_below(moved_child, new_parent)?;
        self.check_not_replacing_self(moved_child, replaced_child)?;
        let replaced_child = self.removed_subtree(replaced_child)?;
        let moved_child = moved_child.clone();

        Ok(if old.parent == *new_parent && old.containment == new_containment {
            Change::ChildMovedAndReplacedInSameContainment {
                parent: old.parent,
                containment: new_containment,
                new_index,
                moved_child,
                old_index: old.index,
                replaced_child,
            }
        } else if old.parent == *new_parent {
            Change::ChildMovedAndReplacedFromOtherContainmentInSameParent {
                parent: old.parent,
                new_containment,
                new_index,
                moved_child,
                old_containment: old.containment,
                old_index: old.index,
                replaced_child,
            }
        } else {
            Change::ChildMovedAndReplacedFromOtherContainment {
                new_parent: new_parent.clone(),
                new_containment,
                new_index,
                moved_child,
                old_parent: old.parent,
                old_containment: old.containment,
                old_index: old.index,
                replaced_child,
            }
        })
    }

    /// Plan attaching a new annotation subtree.
    ///
    /// # Errors
    ///
    /// Fails if the index is beyond the end, the root is not an annotation,
    /// or the subtree is not valid.
    pub fn plan_add_annotation(
        &self,
        parent: &NodeId,
        index: usize,
        new_annotation: Subtree,
    ) -> Result<Change> {
        let node = self.node(parent)?;
        check_insert(node.annotations.len(), index, parent, &ANNOTATIONS)?;
        self.check_annotation(new_annotation.root_node())?;
        self.check_new_subtree(&new_annotation)?;
        Ok(Change::AnnotationAdded {
            parent: parent.clone(),
            index,
            new_annotation,
        })
    }

    /// Plan deleting the annotation at a position.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::UnexpectedNode`] if a different annotation
    /// sits at the position.
    pub fn plan_delete_annotation(
        &self,
        parent: &NodeId,
        index: usize,
        deleted_annotation: &NodeId,
    ) -> Result<Change> {
        let current = at(self.node(parent)?.annotations.as_slice(), index, parent, &ANNOTATIONS)?;
        expect_node(deleted_annotation, current)?;
        Ok(Change::AnnotationDeleted {
            parent: parent.clone(),
            index,
            deleted_annotation: self.removed_subtree(current)?,
        })
    }

    /// Plan replacing the annotation at a position by a new subtree.
    ///
    /// # Errors
    ///
    /// Fails like [`Registry::plan_delete_annotation`] and
    /// [`Registry::plan_add_annotation`].
    pub fn plan_replace_annotation(
        &self,
        parent: &NodeId,
        index: usize,
        replaced_annotation: &NodeId,
        new_annotation: Subtree,
    ) -> Result<Change> {
        let current = at(self.node(parent)?.annotations.as_slice(), index, parent, &ANNOTATIONS)?;
        expect_node(replaced_annotation, current)?;
        self.check_annotation(new_annotation.root_node())?;
        self.check_new_subtree(&new_annotation)?;
        Ok(Change::AnnotationReplaced {
            parent: parent.clone(),
            index,
            new_annotation,
            replaced_annotation: self.removed_subtree(current)?,
        })
    }

    /// Plan moving an existing annotation to a new position.
    ///
    /// # Errors
    ///
    /// Fails if the node is not attached as an annotation, if the move would
    /// create a cycle, or if the target position is invalid.
    pub fn plan_move_annotation(
        &self,
        new_parent: &NodeId,
        new_index: usize,
        moved_annotation: &NodeId,
    ) -> Result<Change> {
        let target = self.node(new_parent)?;
        let old = self.locate_annotation(moved_annotation)?;
        self.check_not_below(moved_annotation, new_parent)?;
        let moved_annotation = moved_annotation.clone();

        if old.parent == *new_parent {
            at(target.annotations.as_slice(), new_index, new_parent, &ANNOTATIONS)?;
            Ok(Change::AnnotationMovedInSameParent {
                parent: old.parent,
                new_index,
                moved_annotation,
                old_index: old.index,
            })
        } else {
            check_insert(target.annotations.len(), new_index, new_parent, &ANNOTATIONS)?;
            Ok(Change::AnnotationMovedFromOtherParent {
                new_parent: new_parent.clone(),
                new_index,
                moved_annotation,
                old_parent: old.parent,
                old_index: old.index,
            })
        }
    }

    /// Plan moving an existing annotation onto the position of another one.
    ///
    /// # Errors
    ///
    /// Fails like [`Registry::plan_move_and_replace_child`].
    pub fn plan_move_and_replace_annotation(
        &self,
        new_parent: &NodeId,
        new_index: usize,
        moved_annotation: &NodeId,
        replaced_annotation: &NodeId,
    ) -> Result<Change> {
        let current = at(
            self.node(new_parent)?.annotations.as_slice(),
            new_index,
            new_parent,
            &ANNOTATIONS,
        )?;
        expect_node(replaced_annotation, current)?;
        let old = self.locate_annotation(moved_annotation)?;
        self.check_not_below(moved_annotation, new_parent)?;
        self.check_not_replacing_self(moved_annotation, replaced_annotation)?;
        let replaced_annotation = self.removed_subtree(replaced_annotation)?;
        let moved_annotation = moved_annotation.clone();

        Ok(if old.parent == *new_parent {
            Change::AnnotationMovedAndReplacedInSameParent {
                parent: old.parent,
                new_index,
                moved_annotation,
                old_index: old.index,
                replaced_annotation,
            }
        } else {
            Change::AnnotationMovedAndReplacedFromOtherParent {
                new_parent: new_parent.clone(),
                new_index,
                moved_annotation,
                old_parent: old.parent,
                old_index: old.index,
                replaced_annotation,
            }
        })
    }

    /// Plan inserting a reference entry.
    ///
    /// # Errors
    ///
    /// Fails if the entry is empty or targets an unknown node, the index is
    /// beyond the end, or a single-valued reference is occupied.
    pub fn plan_add_reference(
        &self,
        parent: &NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        new_entry: ReferenceTarget,
    ) -> Result<Change> {
        let (node, info) = self.reference_slot(parent, reference)?;
        let len = node.entries(reference).len();
        check_insert(len, index, parent, &info.pointer)?;
        check_room(node, info, len)?;
        self.check_entry(&new_entry)?;
        Ok(Change::ReferenceAdded {
            parent: parent.clone(),
            reference,
            index,
            new_entry,
        })
    }

    /// Plan removing a reference entry.
    ///
    /// # Errors
    ///
    /// Fails if no entry exists at the index.
    pub fn plan_delete_reference(
        &self,
        parent: &NodeId,
        reference: CompressedMetaPointer,
        index: usize,
    ) -> Result<Change> {
        let deleted_entry = self.entry(parent, reference, index)?.clone();
        Ok(Change::ReferenceDeleted {
            parent: parent.clone(),
            reference,
            index,
            deleted_entry,
        })
    }

    /// Plan replacing a reference entry.
    ///
    /// # Errors
    ///
    /// Fails if no entry exists at the index or the new entry is invalid.
    pub fn plan_change_reference(
        &self,
        parent: &NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        new_entry: ReferenceTarget,
    ) -> Result<Change> {
        let old_entry = self.entry(parent, reference, index)?.clone();
        self.check_entry(&new_entry)?;
        Ok(Change::ReferenceChanged {
            parent: parent.clone(),
            reference,
            index,
            new_entry,
            old_entry,
        })
    }

    /// Plan moving a reference entry, identified by its current location.
    ///
    /// # Errors
    ///
    /// Fails if no entry exists at the source location or the target
    /// position is invalid.
    pub fn plan_move_entry(
        &self,
        new_parent: &NodeId,
        new_reference: CompressedMetaPointer,
        new_index: usize,
        old_parent: &NodeId,
        old_reference: CompressedMetaPointer,
        old_index: usize,
    ) -> Result<Change> {
        let moved_entry = self.entry(old_parent, old_reference, old_index)?.clone();
        let (target, info) = self.reference_slot(new_parent, new_reference)?;
        let entries = target.entries(new_reference);

        if old_parent == new_parent && old_reference == new_reference {
            at(entries, new_index, new_parent, &info.pointer)?;
            return Ok(Change::EntryMovedInSameReference {
                parent: new_parent.clone(),
                reference: new_reference,
                new_index,
                old_index,
                moved_entry,
            });
        }

        check_insert(entries.len(), new_index, new_parent, &info.pointer)?;
        check_room(target, info, entries.len())?;
        if old_parent == new_parent {
            Ok(Change::EntryMovedFromOtherReferenceInSameParent {
                parent: new_parent.clone(),
                new_reference,
                new_index,
                old_reference,
                old_index,
                moved_entry,
            })
        } else {
            Ok(Change::EntryMovedFromOtherReference {
                new_parent: new_parent.clone(),
                new_reference,
                new_index,
                old_parent: old_parent.clone(),
                old_reference,
                old_index,
                moved_entry,
            })
        }
    }

    /// Plan moving a reference entry onto the position of another entry,
    /// which is dropped.
    ///
    /// # Errors
    ///
    /// Fails if either location holds no entry, or with
    /// [`DeltaError::InvalidMove`] if both locations are the same.
    pub fn plan_move_and_replace_entry(
        &self,
        new_parent: &NodeId,
        new_reference: CompressedMetaPointer,
        new_index: usize,
        old_parent: &NodeId,
        old_reference: CompressedMetaPointer,
        old_index: usize,
    ) -> Result<Change> {
        let moved_entry = self.entry(old_parent, old_reference, old_index)?.clone();
        let replaced_entry = self.entry(new_parent, new_reference, new_index)?.clone();
        let same_reference = old_parent == new_parent && old_reference == new_reference;
        if same_reference && old_index == new_index {
            return Err(DeltaError::InvalidMove(format!(
                "entry {old_index} of {old_parent} cannot replace itself"
            )));
        }

        Ok(if same_reference {
            Change::EntryMovedAndReplacedInSameReference {
                parent: new_parent.clone(),
                reference: new_reference,
                new_index,
                old_index,
                moved_entry,
                replaced_entry,
            }
        } else if old_parent == new_parent {
            Change::EntryMovedAndReplacedFromOtherReferenceInSameParent {
                parent: new_parent.clone(),
                new_reference,
                new_index,
                old_reference,
                old_index,
                moved_entry,
                replaced_entry,
            }
        } else {
            Change::EntryMovedAndReplacedFromOtherReference {
                new_parent: new_parent.clone(),
                new_reference,
                new_index,
                old_parent: old_parent.clone(),
                old_reference,
                old_index,
                moved_entry,
                replaced_entry,
            }
        })
    }

    /// Plan adding resolve info to an entry that has none.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::FeatureAlreadySet`] if the entry has resolve info.
    pub fn plan_add_resolve_info(
        &self,
        parent: &NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        new_resolve_info: String,
    ) -> Result<Change> {
        let entry = self.entry(parent, reference, index)?;
        if entry.resolve_info.is_some() {
            return Err(self.already_set(parent, reference));
        }
        Ok(Change::ReferenceResolveInfoAdded {
            parent: parent.clone(),
            reference,
            index,
            new_resolve_info,
            target: entry.target.clone(),
        })
    }

    /// Plan removing the resolve info of an entry.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::UnsetFeature`] if the entry has no resolve
    /// info and [`DeltaError::MissingValue`] if it has no target either.
    pub fn plan_delete_resolve_info(
        &self,
        parent: &NodeId,
        reference: CompressedMetaPointer,
        index: usize,
    ) -> Result<Change> {
        let entry = self.entry(parent, reference, index)?;
        let deleted_resolve_info = entry
            .resolve_info
            .clone()
            .ok_or_else(|| self.unset(parent, reference))?;
        if entry.target.is_none() {
            return Err(DeltaError::MissingValue("reference target"));
        }
        Ok(Change::ReferenceResolveInfoDeleted {
            parent: parent.clone(),
            reference,
            index,
            target: entry.target.clone(),
            deleted_resolve_info,
        })
    }

    /// Plan replacing the resolve info of an entry.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::UnsetFeature`] if the entry has no resolve info.
    pub fn plan_change_resolve_info(
        &self,
        parent: &NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        new_resolve_info: String,
    ) -> Result<Change> {
        let entry = self.entry(parent, reference, index)?;
        let old_resolve_info = entry
            .resolve_info
            .clone()
            .ok_or_else(|| self.unset(parent, reference))?;
        Ok(Change::ReferenceResolveInfoChanged {
            parent: parent.clone(),
            reference,
            index,
            new_resolve_info,
            target: entry.target.clone(),
            old_resolve_info,
        })
    }

    /// Plan adding a target to an entry that has only resolve info.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::FeatureAlreadySet`] if the entry has a target
    /// and [`DeltaError::UnknownNode`] if the target is not registered.
    pub fn plan_add_target(
        &self,
        parent: &NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        new_target: &NodeId,
    ) -> Result<Change> {
        let entry = self.entry(parent, reference, index)?;
        if entry.target.is_some() {
            return Err(self.already_set(parent, reference));
        }
        self.node(new_target)?;
        Ok(Change::ReferenceTargetAdded {
            parent: parent.clone(),
            reference,
            index,
            new_target: new_target.clone(),
            resolve_info: entry.resolve_info.clone(),
        })
    }

    /// Plan removing the target of an entry.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::UnsetFeature`] if the entry has no target and
    /// [`DeltaError::MissingValue`] if it has no resolve info either.
    pub fn plan_delete_target(
        &self,
        parent: &NodeId,
        reference: CompressedMetaPointer,
        index: usize,
    ) -> Result<Change> {
        let entry = self.entry(parent, reference, index)?;
        let deleted_target = entry
            .target
            .clone()
            .ok_or_else(|| self.unset(parent, reference))?;
        if entry.resolve_info.is_none() {
            return Err(DeltaError::MissingValue("reference resolve info"));
        }
        Ok(Change::ReferenceTargetDeleted {
            parent: parent.clone(),
            reference,
            index,
            resolve_info: entry.resolve_info.clone(),
            deleted_target,
        })
    }

    /// Plan pointing an entry at a different node.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::UnsetFeature`] if the entry has no target and
    /// [`DeltaError::UnknownNode`] if the new target is not registered.
    pub fn plan_change_target(
        &self,
        parent: &NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        new_target: &NodeId,
    ) -> Result<Change> {
        let entry = self.entry(parent, reference, index)?;
        let old_target = entry
            .target
            .clone()
            .ok_or_else(|| self.unset(parent, reference))?;
        self.node(new_target)?;
        Ok(Change::ReferenceTargetChanged {
            parent: parent.clone(),
            reference,
            index,
            new_target: new_target.clone(),
            resolve_info: entry.resolve_info.clone(),
            old_target,
        })
    }

    /// Plan setting the target of an entry, adding or changing as needed.
    ///
    /// # Errors
    ///
    /// Fails like [`Registry::plan_add_target`].
    pub fn plan_set_target(
        &self,
        parent: &NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        target: &NodeId,
    ) -> Result<Change> {
        if self.entry(parent, reference, index)?.target.is_some() {
            self.plan_change_target(parent, reference, index, target)
        } else {
            self.plan_add_target(parent, reference, index, target)
        }
    }

    /// Plan a change again from its new state against the current registry.
    ///
    /// The result equals `change` exactly when the prior state recorded in
    /// `change` is the current state.
    ///
    /// # Errors
    ///
    /// Fails like the planner for the change's variant.
    pub fn replan(&self, change: &Change) -> Result<Change> {
        match change {
            Change::PartitionAdded { new_partition } => {
                self.plan_add_partition(new_partition.clone())
            }
            Change::PartitionDeleted { deleted_partition } => {
                self.plan_delete_partition(deleted_partition.root())
            }
            Change::ClassifierChanged {
                node,
                new_classifier,
                ..
            } => self.plan_change_classifier(node, *new_classifier),
            Change::PropertyAdded {
                node,
                property,
                new_value,
            } => self.plan_add_property(node, *property, new_value.clone()),
            Change::PropertyDeleted { node, property, .. } => {
                self.plan_delete_property(node, *property)
            }
            Change::PropertyChanged {
                node,
                property,
                new_value,
                ..
            } => self.plan_change_property(node, *property, new_value.clone()),
            Change::ChildAdded {
                parent,
                containment,
                index,
                new_child,
            } => self.plan_add_child(parent, *containment, *index, new_child.clone()),
            Change::ChildDeleted {
                parent,
                containment,
                index,
                deleted_child,
            } => self.plan_delete_child(parent, *containment, *index, deleted_child.root()),
            Change::ChildReplaced {
                parent,
                containment,
                index,
                new_child,
                replaced_child,
            } => self.plan_replace_child(
                parent,
                *containment,
                *index,
                replaced_child.root(),
                new_child.clone(),
            ),
            Change::ChildMovedFromOtherContainment {
                new_parent,
                new_containment,
                new_index,
                moved_child,
                ..
            } => self.plan_move_child(new_parent, *new_containment, *new_index, moved_child),
            Change::ChildMovedFromOtherContainmentInSameParent {
                parent,
                new_containment,
                new_index,
                moved_child,
                ..
            } => self.plan_move_child(parent, *new_containment, *new_index, moved_child),
            Change::ChildMovedInSameContainment {
                parent,
                containment,
                new_index,
                moved_child,
                ..
            } => self.plan_move_child(parent, *containment, *new_index, moved_child),
            Change::ChildMovedAndReplacedFromOtherContainment {
                new_parent,
                new_containment,
                new_index,
                moved_child,
                replaced_child,
                ..
            } => self.plan_move_and_replace_child(
                new_parent,
                *new_containment,
                *new_index,
                moved_child,
                replaced_child.root(),
            ),
            Change::ChildMovedAndReplacedFromOtherContainmentInSameParent {
                parent,
                new_containment,
                new_index,
                moved_child,
                replaced_child,
                ..
            } => self.plan_move_and_replace_child(
                parent,
                *new_containment,
                *new_index,
                moved_child,
                replaced_child.root(),
            ),
            Change::ChildMovedAndReplacedInSameContainment {
                parent,
                containment,
                new_index,
                moved_child,
                replaced_child,
                ..
            } => self.plan_move_and_replace_child(
                parent,
                *containment,
                *new_index,
                moved_child,
                replaced_child.root(),
            ),
            Change::AnnotationAdded {
                parent,
                index,
                new_annotation,
            } => self.plan_add_annotation(parent, *index, new_annotation.clone()),
            Change::AnnotationDeleted {
                parent,
                index,
                deleted_annotation,
            } => self.plan_delete_annotation(parent, *index, deleted_annotation.root()),
            Change::AnnotationReplaced {
                parent,
                index,
                new_annotation,
                replaced_annotation,
            } => self.plan_replace_annotation(
                parent,
                *index,
                replaced_annotation.root(),
                new_annotation.clone(),
            ),
            Change::AnnotationMovedFromOtherParent {
                new_parent,
                new_index,
                moved_annotation,
                ..
            } => self.plan_move_annotation(new_parent, *new_index, moved_annotation),
            Change::AnnotationMovedInSameParent {
                parent,
                new_index,
                moved_annotation,
                ..
            } => self.plan_move_annotation(parent, *new_index, moved_annotation),
            Change::AnnotationMovedAndReplacedFromOtherParent {
                new_parent,
                new_index,
                moved_annotation,
                replaced_annotation,
                ..
            } => self.plan_move_and_replace_annotation(
                new_parent,
                *new_index,
                moved_annotation,
                replaced_annotation.root(),
            ),
            Change::AnnotationMovedAndReplacedInSameParent {
                parent,
                new_index,
                moved_annotation,
                replaced_annotation,
                ..
            } => self.plan_move_and_replace_annotation(
                parent,
                *new_index,
                moved_annotation,
                replaced_annotation.root(),
            ),
            Change::ReferenceAdded {
                parent,
                reference,
                index,
                new_entry,
            } => self.plan_add_reference(parent, *reference, *index, new_entry.clone()),
            Change::ReferenceDeleted {
                parent,
                reference,
                index,
                ..
            } => self.plan_delete_reference(parent, *reference, *index),
            Change::ReferenceChanged {
                parent,
                reference,
                index,
                new_entry,
                ..
            } => self.plan_change_reference(parent, *reference, *index, new_entry.clone()),
            Change::EntryMovedFromOtherReference {
                new_parent,
                new_reference,
                new_index,
                old_parent,
                old_reference,
                old_index,
                ..
            } => self.plan_move_entry(
                new_parent,
                *new_reference,
                *new_index,
                old_parent,
                *old_reference,
                *old_index,
            ),
            Change::EntryMovedFromOtherReferenceInSameParent {
                parent,
                new_reference,
                new_index,
                old_reference,
                old_index,
                ..
            } => self.plan_move_entry(
                parent,
                *new_reference,
                *new_index,
                parent,
                *old_reference,
                *old_index,
            ),
            Change::EntryMovedInSameReference {
                parent,
                reference,
                new_index,
                old_index,
                ..
            } => {
                self.plan_move_entry(parent, *reference, *new_index, parent, *reference, *old_index)
            }
            Change::EntryMovedAndReplacedFromOtherReference {
                new_parent,
                new_reference,
                new_index,
                old_parent,
                old_reference,
                old_index,
                ..
            } => self.plan_move_and_replace_entry(
                new_parent,
                *new_reference,
                *new_index,
                old_parent,
                *old_reference,
                *old_index,
            ),
            Change::EntryMovedAndReplacedFromOtherReferenceInSameParent {
                parent,
                new_reference,
                new_index,
                old_reference,
                old_index,
                ..
            } => self.plan_move_and_replace_entry(
                parent,
                *new_reference,
                *new_index,
                parent,
                *old_reference,
                *old_index,
            ),
            Change::EntryMovedAndReplacedInSameReference {
                parent,
                reference,
                new_index,
                old_index,
                ..
            } => self.plan_move_and_replace_entry(
                parent,
                *reference,
                *new_index,
                parent,
                *reference,
                *old_index,
            ),
            Change::ReferenceResolveInfoAdded {
                parent,
                reference,
                index,
                new_resolve_info,
                ..
            } => self.plan_add_resolve_info(parent, *reference, *index, new_resolve_info.clone()),
            Change::ReferenceResolveInfoDeleted {
                parent,
                reference,
                index,
                ..
            } => self.plan_delete_resolve_info(parent, *reference, *index),
            Change::ReferenceResolveInfoChanged {
                parent,
                reference,
                index,
                new_resolve_info,
                ..
            } => {
                self.plan_change_resolve_info(parent, *reference, *index, new_resolve_info.clone())
            }
            Change::ReferenceTargetAdded {
                parent,
                reference,
                index,
                new_target,
                ..
            } => self.plan_add_target(parent, *reference, *index, new_target),
            Change::ReferenceTargetDeleted {
                parent,
                reference,
                index,
                ..
            } => self.plan_delete_target(parent, *reference, *index),
            Change::ReferenceTargetChanged {
                parent,
                reference,
                index,
                new_target,
                ..
            } => self.plan_change_target(parent, *reference, *index, new_target),
        }
    }

    /// Validate a detached subtree about to enter the model.
    ///
    /// Every feature must be declared by its node's classifier, values must
    /// conform, annotations must be annotation instances, and reference
    /// targets must resolve within the subtree or among the known nodes.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn check_new_subtree(&self, subtree: &Subtree) -> Result<()> {
        self.nodes().check_vacant(subtree)?;
        let local: HashMap<&NodeId, &Node> =
            subtree.nodes().iter().map(|node| (&node.id, node)).collect();

        for node in subtree.nodes() {
            self.classifier(node.classifier)?;
            for (&property, value) in &node.properties {
                let info = self.property(property)?;
                self.check_applicable(node, info)?;
                check_value(info, value)?;
            }
            for (&containment, children) in &node.containments {
                let info = self.containment(containment)?;
                self.check_applicable(node, info)?;
                if children.len() > 1 {
                    check_room(node, info, 1)?;
                }
            }
            for (&reference, entries) in &node.references {
                let info = self.reference(reference)?;
                self.check_applicable(node, info)?;
                if entries.len() > 1 {
                    check_room(node, info, 1)?;
                }
                for entry in entries {
                    if entry.is_empty() {
                        return Err(DeltaError::MissingValue("reference target or resolve info"));
                    }
                    if let Some(target) = &entry.target {
                        if !local.contains_key(target) && !self.nodes().contains(target) {
                            return Err(DeltaError::UnknownNode(target.clone()));
                        }
                    }
                }
            }
            for annotation in &node.annotations {
                if let Some(annotation) = local.get(annotation) {
                    self.check_annotation(annotation)?;
                }
            }
        }
        Ok(())
    }

    fn property_slot(
        &self,
        node: &NodeId,
        property: CompressedMetaPointer,
    ) -> Result<(&Node, &FeatureInfo)> {
        let info = self.property(property)?;
        let target = self.node(node)?;
        self.check_applicable(target, info)?;
        Ok((target, info))
    }

    fn containment_slot(
        &self,
        node: &NodeId,
        containment: CompressedMetaPointer,
    ) -> Result<(&Node, &FeatureInfo)> {
        let info = self.containment(containment)?;
        let target = self.node(node)?;
        self.check_applicable(target, info)?;
        Ok((target, info))
    }

    fn reference_slot(
        &self,
        node: &NodeId,
        reference: CompressedMetaPointer,
    ) -> Result<(&Node, &FeatureInfo)> {
        let info = self.reference(reference)?;
        let target = self.node(node)?;
        self.check_applicable(target, info)?;
        Ok((target, info))
    }

    fn current_value(
        &self,
        node: &NodeId,
        property: CompressedMetaPointer,
    ) -> Result<PropertyValue> {
        let (target, info) = self.property_slot(node, property)?;
        target
            .property(property)
            .cloned()
            .ok_or_else(|| DeltaError::UnsetFeature {
                node: node.clone(),
                feature: info.pointer.clone(),
            })
    }

    fn entry(
        &self,
        parent: &NodeId,
        reference: CompressedMetaPointer,
        index: usize,
    ) -> Result<&ReferenceTarget> {
        let (node, info) = self.reference_slot(parent, reference)?;
        at(node.entries(reference), index, parent, &info.pointer)
    }

    fn check_entry(&self, entry: &ReferenceTarget) -> Result<()> {
        if entry.is_empty() {
            return Err(DeltaError::MissingValue("reference target or resolve info"));
        }
        if let Some(target) = &entry.target {
            self.node(target)?;
        }
        Ok(())
    }

    fn check_annotation(&self, node: &Node) -> Result<()> {
        let info = self.classifier(node.classifier)?;
        if info.kind == ClassifierKind::Annotation {
            Ok(())
        } else {
            Err(DeltaError::FeatureKindMismatch {
                pointer: info.pointer.clone(),
                expected: "annotation",
            })
        }
    }

    fn check_not_below(&self, moved: &NodeId, new_parent: &NodeId) -> Result<()> {
        if self.nodes().is_ancestor_or_self(moved, new_parent) {
            Err(DeltaError::ContainmentCycle {
                moved: moved.clone(),
                target: new_parent.clone(),
            })
        } else {
            Ok(())
        }
    }

    fn check_not_replacing_self(&self, moved: &NodeId, replaced: &NodeId) -> Result<()> {
        if self.nodes().is_ancestor_or_self(replaced, moved) {
            Err(DeltaError::InvalidMove(format!(
                "{moved} cannot replace {replaced}, which contains it"
            )))
        } else {
            Ok(())
        }
    }

    /// Collect a subtree about to leave the forest, failing with
    /// [`DeltaError::StillReferenced`] while a node outside it targets one of
    /// its nodes.
    fn removed_subtree(&self, root: &NodeId) -> Result<Subtree> {
        let subtree = self.nodes().collect_subtree(root)?;
        let removed: HashSet<&NodeId> = subtree.nodes().iter().map(|node| &node.id).collect();
        for referrer in self.nodes().iter().filter(|node| !removed.contains(&node.id)) {
            let target = referrer
                .references
                .values()
                .flatten()
                .find_map(|entry| entry.target.as_ref().filter(|target| removed.contains(target)));
            if let Some(target) = target {
                return Err(DeltaError::StillReferenced {
                    node: target.clone(),
                    referrer: referrer.id.clone(),
                });
            }
        }
        Ok(subtree)
    }

    fn already_set(&self, node: &NodeId, feature: CompressedMetaPointer) -> DeltaError {
        DeltaError::FeatureAlreadySet {
            node: node.clone(),
            feature: self.types().pointer(feature).clone(),
        }
    }

    fn unset(&self, node: &NodeId, feature: CompressedMetaPointer) -> DeltaError {
        DeltaError::UnsetFeature {
            node: node.clone(),
            feature: self.types().pointer(feature).clone(),
        }
    }
}

fn at<'a, T>(items: &'a [T], index: usize, owner: &NodeId, feature: &dyn Display) -> Result<&'a T> {
    items.get(index).ok_or_else(|| DeltaError::IndexOutOfBounds {
        node: owner.clone(),
        feature: feature.to_string(),
        index,
        len: items.len(),
    })
}

fn check_insert(len: usize, index: usize, owner: &NodeId, feature: &dyn Display) -> Result<()> {
    if index <= len {
        Ok(())
    } else {
        Err(DeltaError::IndexOutOfBounds {
            node: owner.clone(),
            feature: feature.to_string(),
            index,
            len,
        })
    }
}

fn check_room(node: &Node, info: &FeatureInfo, len: usize) -> Result<()> {
    if info.is_multiple() || len == 0 {
        Ok(())
    } else {
        Err(DeltaError::MultiplicityViolation {
            node: node.id.clone(),
            feature: info.pointer.clone(),
        })
    }
}

fn check_value(info: &FeatureInfo, value: &PropertyValue) -> Result<()> {
    match info.data_type() {
        Some(data_type) if value.conforms_to(data_type) => Ok(()),
        data_type => Err(DeltaError::InvalidValue {
            feature: info.pointer.clone(),
            value: value.to_wire(),
            expected: data_type.map_or_else(|| "a property".to_string(), |t| format!("{t:?}")),
        }),
    }
}

fn expect_node(expected: &NodeId, found: &NodeId) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(DeltaError::UnexpectedNode {
            expected: expected.clone(),
            found: Some(found.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Library;

    #[test]
    fn same_containment_move_reports_scanned_old_index() {
        let lib = Library::new();
        let registry = lib.registry_with_books(&["a", "b", "c"]);

        let change = registry
            .plan_move_child(&NodeId::from("lib"), lib.books, 0, &NodeId::from("c"))
            .unwrap();

        assert_eq!(
            change,
            Change::ChildMovedInSameContainment {
                parent: NodeId::from("lib"),
                containment: lib.books,
                new_index: 0,
                moved_child: NodeId::from("c"),
                old_index: 2,
            }
        );
    }

    #[test]
    fn move_variant_follows_current_location() {
        let lib = Library::new();
        let registry = lib.registry_with_books(&["a", "b"]);

        let to_archive = registry
            .plan_move_child(&NodeId::from("lib"), lib.archive, 0, &NodeId::from("b"))
            .unwrap();
        assert!(matches!(
            to_archive,
            Change::ChildMovedFromOtherContainmentInSameParent { old_index: 1, .. }
        ));

        let into_book = registry
            .plan_move_and_replace_child(
                &NodeId::from("lib"),
                lib.books,
                0,
                &NodeId::from("b"),
                &NodeId::from("a"),
            )
            .unwrap();
        assert!(matches!(
            into_book,
            Change::ChildMovedAndReplacedInSameContainment { old_index: 1, new_index: 0, .. }
        ));
    }

    #[test]
    fn moving_below_itself_is_a_cycle() {
        let lib = Library::new();
        let mut registry = lib.registry_with_books(&[]);
        registry
            .nodes_mut()
            .insert_subtree(lib.book_with_chapters("b1", &["c1"]), Some(NodeId::from("lib")))
            .unwrap();
        registry
            .nodes_mut()
            .get_mut(&NodeId::from("lib"))
            .unwrap()
            .children_mut(lib.books)
            .push(NodeId::from("b1"));

        let err = registry
            .plan_move_child(&NodeId::from("c1"), lib.sections, 0, &NodeId::from("b1"))
            .unwrap_err();
        assert!(matches!(err, DeltaError::ContainmentCycle { .. }));
    }

    #[test]
    fn property_variants_are_strict() {
        let lib = Library::new();
        let registry = lib.registry_with_books(&["a"]);
        let a = NodeId::from("a");

        assert!(matches!(
            registry.plan_add_property(&a, lib.title, "A".into()).unwrap_err(),
            DeltaError::FeatureAlreadySet { .. }
        ));
        assert!(matches!(
            registry.plan_delete_property(&a, lib.pages).unwrap_err(),
            DeltaError::UnsetFeature { .. }
        ));
        assert_eq!(
            registry.plan_set_property(&a, lib.title, "B".into()).unwrap(),
            Change::PropertyChanged {
                node: a.clone(),
                property: lib.title,
                new_value: "B".into(),
                old_value: "a".into(),
            }
        );
        assert!(matches!(
            registry.plan_add_property(&a, lib.pages, PropertyValue::Boolean(true)).unwrap_err(),
            DeltaError::InvalidValue { .. }
        ));
    }

    #[test]
    fn features_must_fit_the_node() {
        let lib = Library::new();
        let registry = lib.registry_with_books(&["a"]);

        let err = registry
            .plan_add_property(&NodeId::from("lib"), lib.title, "x".into())
            .unwrap_err();
        assert!(matches!(err, DeltaError::FeatureNotApplicable { .. }));

        let err = registry
            .plan_add_property(&NodeId::from("a"), lib.books, "x".into())
            .unwrap_err();
        assert!(matches!(err, DeltaError::FeatureKindMismatch { expected: "property", .. }));
    }

    #[test]
    fn delete_names_the_removed_node() {
        let lib = Library::new();
        let registry = lib.registry_with_books(&["a", "b"]);

        let err = registry
            .plan_delete_child(&NodeId::from("lib"), lib.books, 0, &NodeId::from("b"))
            .unwrap_err();
        assert_eq!(
            err,
            DeltaError::UnexpectedNode {
                expected: NodeId::from("b"),
                found: Some(NodeId::from("a")),
            }
        );
    }

    #[test]
    fn reference_targets_must_resolve() {
        let lib = Library::new();
        let registry = lib.registry_with_books(&["a"]);

        let err = registry
            .plan_add_reference(&NodeId::from("a"), lib.related, 0, ReferenceTarget::to("ghost"))
            .unwrap_err();
        assert_eq!(err, DeltaError::UnknownNode(NodeId::from("ghost")));

        let err = registry
            .plan_add_reference(&NodeId::from("a"), lib.related, 0, ReferenceTarget::default())
            .unwrap_err();
        assert!(matches!(err, DeltaError::MissingValue(_)));
    }

    #[test]
    fn single_valued_reference_holds_one_entry() {
        let lib = Library::new();
        let mut registry = lib.registry_with_books(&["a", "b"]);
        registry
            .nodes_mut()
            .get_mut(&NodeId::from("a"))
            .unwrap()
            .entries_mut(lib.author)
            .push(ReferenceTarget::to("b"));

        let err = registry
            .plan_add_reference(&NodeId::from("a"), lib.author, 1, ReferenceTarget::to("lib"))
            .unwrap_err();
        assert!(matches!(err, DeltaError::MultiplicityViolation { .. }));
    }

    #[test]
    fn entry_moves_are_identified_by_location() {
        let lib = Library::new();
        let mut registry = lib.registry_with_books(&["a", "b", "c"]);
        let entries = registry
            .nodes_mut()
            .get_mut(&NodeId::from("a"))
            .unwrap()
            .entries_mut(lib.related);
        entries.push(ReferenceTarget::to("b"));
        entries.push(ReferenceTarget::to("c").with_resolve_info("C"));

        let change = registry
            .plan_move_entry(&NodeId::from("a"), lib.cited, 0, &NodeId::from("a"), lib.related, 1)
            .unwrap();
        assert_eq!(
            change,
            Change::EntryMovedFromOtherReferenceInSameParent {
                parent: NodeId::from("a"),
                new_reference: lib.cited,
                new_index: 0,
                old_reference: lib.related,
                old_index: 1,
                moved_entry: ReferenceTarget::to("c").with_resolve_info("C"),
            }
        );

        let err = registry
            .plan_move_and_replace_entry(
                &NodeId::from("a"),
                lib.related,
                1,
                &NodeId::from("a"),
                lib.related,
                1,
            )
            .unwrap_err();
        assert!(matches!(err, DeltaError::InvalidMove(_)));
    }

    #[test]
    fn replan_detects_stale_prior_state() {
        let lib = Library::new();
        let registry = lib.registry_with_books(&["a", "b", "c"]);
        let stale = Change::ChildMovedInSameContainment {
            parent: NodeId::from("lib"),
            containment: lib.books,
            new_index: 0,
            moved_child: NodeId::from("c"),
            old_index: 1,
        };

        assert_ne!(registry.replan(&stale).unwrap(), stale);
    }

    #[test]
    fn annotations_need_annotation_classifiers() {
        let lib = Library::new();
        let registry = lib.registry_with_books(&["a"]);

        let err = registry
            .plan_add_annotation(&NodeId::from("a"), 0, lib.book("x", "X"))
            .unwrap_err();
        assert!(matches!(err, DeltaError::FeatureKindMismatch { expected: "annotation", .. }));
        assert!(registry
            .plan_add_annotation(&NodeId::from("a"), 0, lib.comment("n", "note"))
            .is_ok());
    }
}
