//! Semantic partition events.
//!
//! A [`PartitionEvent`] records one mutation of the forest: what changed
//! (the [`Change`]) and which commands caused it (the [`EventId`]). Each change
//! carries the prior state next to the new one: old values, old locations,
//! and the full subtree of any node that left the model.
//!
//! Field naming follows one convention throughout: `parent`/`containment`/
//! `reference`/`index` locate the change, `new_*` is the resulting state,
//! `old_*`, `deleted_*` and `replaced_*` the prior state, and `moved_*` the
//! element that changed place.

use crate::ids::{EventId, NodeId};
use crate::node::{ReferenceTarget, Subtree};
use crate::types::CompressedMetaPointer;
use crate::value::PropertyValue;

/// One mutation of the forest together with its correlation key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEvent {
    /// Correlation key
    pub id: EventId,
    /// What changed
    pub change: Change,
}

impl PartitionEvent {
    /// Create a new event.
    #[must_use]
    pub fn new(id: EventId, change: Change) -> Self {
        Self { id, change }
    }
}

/// Coarse grouping of changes, used for filtered bus subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Partitions added or deleted
    Partition,
    /// Classifier of a node changed
    Classifier,
    /// Property values
    Property,
    /// Containment children
    Containment,
    /// Annotations
    Annotation,
    /// Reference entries
    Reference,
}

/// Everything that can happen to a forest.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    PartitionAdded {
        new_partition: Subtree,
    },
    PartitionDeleted {
        deleted_partition: Subtree,
    },
    ClassifierChanged {
        node: NodeId,
        new_classifier: CompressedMetaPointer,
        old_classifier: CompressedMetaPointer,
    },

    PropertyAdded {
        node: NodeId,
        property: CompressedMetaPointer,
        new_value: PropertyValue,
    },
    PropertyDeleted {
        node: NodeId,
        property: CompressedMetaPointer,
        old_value: PropertyValue,
    },
    PropertyChanged {
        node: NodeId,
        property: CompressedMetaPointer,
        new_value: PropertyValue,
        old_value: PropertyValue,
    },

    ChildAdded {
        parent: NodeId,
        containment: CompressedMetaPointer,
        index: usize,
        new_child: Subtree,
    },
    ChildDeleted {
        parent: NodeId,
        containment: CompressedMetaPointer,
        index: usize,
        deleted_child: Subtree,
    },
    ChildReplaced {
        parent: NodeId,
        containment: CompressedMetaPointer,
        index: usize,
        new_child: Subtree,
        replaced_child: Subtree,
    },
    ChildMovedFromOtherContainment {
        new_parent: NodeId,
        new_containment: CompressedMetaPointer,
        new_index: usize,
        moved_child: NodeId,
        old_parent: NodeId,
        old_containment: CompressedMetaPointer,
        old_index: usize,
    },
    ChildMovedFromOtherContainmentInSameParent {
        parent: NodeId,
        new_containment: CompressedMetaPointer,
        new_index: usize,
        moved_child: NodeId,
        old_containment: CompressedMetaPointer,
        old_index: usize,
    },
    ChildMovedInSameContainment {
        parent: NodeId,
        containment: CompressedMetaPointer,
        new_index: usize,
        moved_child: NodeId,
        old_index: usize,
    },
    ChildMovedAndReplacedFromOtherContainment {
        new_parent: NodeId,
        new_containment: CompressedMetaPointer,
        new_index: usize,
        moved_child: NodeId,
        old_parent: NodeId,
        old_containment: CompressedMetaPointer,
        old_index: usize,
        replaced_child: Subtree,
    },
    ChildMovedAndReplacedFromOtherContainmentInSameParent {
        parent: NodeId,
        new_containment: CompressedMetaPointer,
        new_index: usize,
        moved_child: NodeId,
        old_containment: CompressedMetaPointer,
        old_index: usize,
        replaced_child: Subtree,
    },
    ChildMovedAndReplacedInSameContainment {
        parent: NodeId,
        containment: CompressedMetaPointer,
        new_index: usize,
        moved_child: NodeId,
        old_index: usize,
        replaced_child: Subtree,
    },

    AnnotationAdded {
        parent: NodeId,
        index: usize,
        new_annotation: Subtree,
    },
    AnnotationDeleted {
        parent: NodeId,
        index: usize,
        deleted_annotation: Subtree,
    },
    AnnotationReplaced {
        parent: NodeId,
        index: usize,
        new_annotation: Subtree,
        replaced_annotation: Subtree,
    },
    AnnotationMovedFromOtherParent {
        new_parent: NodeId,
        new_index: usize,
        moved_annotation: NodeId,
        old_parent: NodeId,
        old_index: usize,
    },
    AnnotationMovedInSameParent {
        parent: NodeId,
        new_index: usize,
        moved_annotation: NodeId,
        old_index: usize,
    },
    AnnotationMovedAndReplacedFromOtherParent {
        new_parent: NodeId,
        new_index: usize,
        moved_annotation: NodeId,
        old_parent: NodeId,
        old_index: usize,
        replaced_annotation: Subtree,
    },
    AnnotationMovedAndReplacedInSameParent {
        parent: NodeId,
        new_index: usize,
        moved_annotation: NodeId,
        old_index: usize,
        replaced_annotation: Subtree,
    },

    ReferenceAdded {
        parent: NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        new_entry: ReferenceTarget,
    },
    ReferenceDeleted {
        parent: NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        deleted_entry: ReferenceTarget,
    },
    ReferenceChanged {
        parent: NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        new_entry: ReferenceTarget,
        old_entry: ReferenceTarget,
    },
    EntryMovedFromOtherReference {
        new_parent: NodeId,
        new_reference: CompressedMetaPointer,
        new_index: usize,
        old_parent: NodeId,
        old_reference: CompressedMetaPointer,
        old_index: usize,
        moved_entry: ReferenceTarget,
    },
    EntryMovedFromOtherReferenceInSameParent {
        parent: NodeId,
        new_reference: CompressedMetaPointer,
        new_index: usize,
        old_reference: CompressedMetaPointer,
        old_index: usize,
        moved_entry: ReferenceTarget,
    },
    EntryMovedInSameReference {
        parent: NodeId,
        reference: CompressedMetaPointer,
        new_index: usize,
        old_index: usize,
        moved_entry: ReferenceTarget,
    },
    EntryMovedAndReplacedFromOtherReference {
        new_parent: NodeId,
        new_reference: CompressedMetaPointer,
        new_index: usize,
        old_parent: NodeId,
        old_reference: CompressedMetaPointer,
        old_index: usize,
        moved_entry: ReferenceTarget,
        replaced_entry: ReferenceTarget,
    },
    EntryMovedAndReplacedFromOtherReferenceInSameParent {
        parent: NodeId,
        new_reference: CompressedMetaPointer,
        new_index: usize,
        old_reference: CompressedMetaPointer,
        old_index: usize,
        moved_entry: ReferenceTarget,
        replaced_entry: ReferenceTarget,
    },
    EntryMovedAndReplacedInSameReference {
        parent: NodeId,
        reference: CompressedMetaPointer,
        new_index: usize,
        old_index: usize,
        moved_entry: ReferenceTarget,
        replaced_entry: ReferenceTarget,
    },
    ReferenceResolveInfoAdded {
        parent: NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        new_resolve_info: String,
        target: Option<NodeId>,
    },
    ReferenceResolveInfoDeleted {
        parent: NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        target: Option<NodeId>,
        deleted_resolve_info: String,
    },
    ReferenceResolveInfoChanged {
        parent: NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        new_resolve_info: String,
        target: Option<NodeId>,
        old_resolve_info: String,
    },
    ReferenceTargetAdded {
        parent: NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        new_target: NodeId,
        resolve_info: Option<String>,
    },
    ReferenceTargetDeleted {
        parent: NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        resolve_info: Option<String>,
        deleted_target: NodeId,
    },
    ReferenceTargetChanged {
        parent: NodeId,
        reference: CompressedMetaPointer,
        index: usize,
        new_target: NodeId,
        resolve_info: Option<String>,
        old_target: NodeId,
    },
}

impl Change {
    /// Stable name of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Change::PartitionAdded { .. } => "PartitionAdded",
            Change::PartitionDeleted { .. } => "PartitionDeleted",
            Change::ClassifierChanged { .. } => "ClassifierChanged",
            Change::PropertyAdded { .. } => "PropertyAdded",
            Change::PropertyDeleted { .. } => "PropertyDeleted",
            Change::PropertyChanged { .. } => "PropertyChanged",
            Change::ChildAdded { .. } => "ChildAdded",
            Change::ChildDeleted { .. } => "ChildDeleted",
            Change::ChildReplaced { .. } => "ChildReplaced",
            Change::ChildMovedFromOtherContainment { .. } => "ChildMovedFromOtherContainment",
            Change::ChildMovedFromOtherContainmentInSameParent { .. } => {
                "ChildMovedFromOtherContainmentInSameParent"
            }
            Change::ChildMovedInSameContainment { .. } => "ChildMovedInSameContainment",
            Change::ChildMovedAndReplacedFromOtherContainment { .. } => {
                "ChildMovedAndReplacedFromOtherContainment"
            }
            Change::ChildMovedAndReplacedFromOtherContainmentInSameParent { .. } => {
                "ChildMovedAndReplacedFromOtherContainmentInSameParent"
            }
            Change::ChildMovedAndReplacedInSameContainment { .. } => {
                "ChildMovedAndReplacedInSameContainment"
            }
            Change::AnnotationAdded { .. } => "AnnotationAdded",
            Change::AnnotationDeleted { .. } => "AnnotationDeleted",
            Change::AnnotationReplaced { .. } => "AnnotationReplaced",
            Change::AnnotationMovedFromOtherParent { .. } => "AnnotationMovedFromOtherParent",
            Change::AnnotationMovedInSameParent { .. } => "AnnotationMovedInSameParent",
            Change::AnnotationMovedAndReplacedFromOtherParent { .. } => {
                "AnnotationMovedAndReplacedFromOtherParent"
            }
            Change::AnnotationMovedAndReplacedInSameParent { .. } => {
                "AnnotationMovedAndReplacedInSameParent"
            }
            Change::ReferenceAdded { .. } => "ReferenceAdded",
            Change::ReferenceDeleted { .. } => "ReferenceDeleted",
            Change::ReferenceChanged { .. } => "ReferenceChanged",
            Change::EntryMovedFromOtherReference { .. } => "EntryMovedFromOtherReference",
            Change::EntryMovedFromOtherReferenceInSameParent { .. } => {
                "EntryMovedFromOtherReferenceInSameParent"
            }
            Change::EntryMovedInSameReference { .. } => "EntryMovedInSameReference",
            Change::EntryMovedAndReplacedFromOtherReference { .. } => {
                "EntryMovedAndReplacedFromOtherReference"
            }
            Change::EntryMovedAndReplacedFromOtherReferenceInSameParent { .. } => {
                "EntryMovedAndReplacedFromOtherReferenceInSameParent"
            }
            Change::EntryMovedAndReplacedInSameReference { .. } => {
                "EntryMovedAndReplacedInSameReference"
            }
            Change::ReferenceResolveInfoAdded { .. } => "ReferenceResolveInfoAdded",
            Change::ReferenceResolveInfoDeleted { .. } => "ReferenceResolveInfoDeleted",
            Change::ReferenceResolveInfoChanged { .. } => "ReferenceResolveInfoChanged",
            Change::ReferenceTargetAdded { .. } => "ReferenceTargetAdded",
            Change::ReferenceTargetDeleted { .. } => "ReferenceTargetDeleted",
            Change::ReferenceTargetChanged { .. } => "ReferenceTargetChanged",
        }
    }

    /// Category for filtered subscriptions.
    #[must_use]
    pub fn category(&self) -> EventCategory {
        match self {
            Change::PartitionAdded { .. } | Change::PartitionDeleted { .. } => {
                EventCategory::Partition
            }
            Change::ClassifierChanged { .. } => EventCategory::Classifier,
            Change::PropertyAdded { .. }
            | Change::PropertyDeleted { .. }
            | Change::PropertyChanged { .. } => EventCategory::Property,
            Change::ChildAdded { .. }
            | Change::ChildDeleted { .. }
            | Change::ChildReplaced { .. }
            | Change::ChildMovedFromOtherContainment { .. }
            | Change::ChildMovedFromOtherContainmentInSameParent { .. }
            | Change::ChildMovedInSameContainment { .. }
            | Change::ChildMovedAndReplacedFromOtherContainment { .. }
            | Change::ChildMovedAndReplacedFromOtherContainmentInSameParent { .. }
            | Change::ChildMovedAndReplacedInSameContainment { .. } => EventCategory::Containment,
            Change::AnnotationAdded { .. }
            | Change::AnnotationDeleted { .. }
            | Change::AnnotationReplaced { .. }
            | Change::AnnotationMovedFromOtherParent { .. }
            | Change::AnnotationMovedInSameParent { .. }
            | Change::AnnotationMovedAndReplacedFromOtherParent { .. }
            | Change::AnnotationMovedAndReplacedInSameParent { .. } => EventCategory::Annotation,
            Change::ReferenceAdded { .. }
            | Change::ReferenceDeleted { .. }
            | Change::ReferenceChanged { .. }
            | Change::EntryMovedFromOtherReference { .. }
            | Change::EntryMovedFromOtherReferenceInSameParent { .. }
            | Change::EntryMovedInSameReference { .. }
            | Change::EntryMovedAndReplacedFromOtherReference { .. }
            | Change::EntryMovedAndReplacedFromOtherReferenceInSameParent { .. }
            | Change::EntryMovedAndReplacedInSameReference { .. }
            | Change::ReferenceResolveInfoAdded { .. }
            | Change::ReferenceResolveInfoDeleted { .. }
            | Change::ReferenceResolveInfoChanged { .. }
            | Change::ReferenceTargetAdded { .. }
            | Change::ReferenceTargetDeleted { .. }
            | Change::ReferenceTargetChanged { .. } => EventCategory::Reference,
        }
    }
}
