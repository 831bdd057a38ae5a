//! Events: agreed facts, carrying old and new state.
//!
//! Events mirror commands one-for-one. Events that remove a subtree list the
//! removed root and all of its descendants.

use crate::kind::message_kinds;
use crate::message::ProtocolMessage;
use lionsync_core::{CommandSource, DeltaSerializationChunk, MetaPointer, NodeId};
use serde::{Deserialize, Serialize};

message_kinds! {
    /// The catalogue of single events.
    #[allow(missing_docs)]
    pub enum EventKind {
        /// A partition was added.
        PartitionAdded { new_partition: DeltaSerializationChunk },
        /// A partition was deleted.
        PartitionDeleted { deleted_partition: NodeId, deleted_descendants: Vec<NodeId> },
        /// A node changed classifier.
        ClassifierChanged {
            node: NodeId,
            new_classifier: MetaPointer,
            old_classifier: MetaPointer,
        },
        /// A property got a value.
        PropertyAdded { node: NodeId, property: MetaPointer, new_value: String },
        /// A property lost its value.
        PropertyDeleted { node: NodeId, property: MetaPointer, old_value: String },
        /// A property value changed.
        PropertyChanged {
            node: NodeId,
            property: MetaPointer,
            new_value: String,
            old_value: String,
        },
        /// A child subtree was inserted.
        ChildAdded {
            parent: NodeId,
            new_child: DeltaSerializationChunk,
            containment: MetaPointer,
            index: usize,
        },
        /// A child subtree was removed.
        ChildDeleted {
            deleted_child: NodeId,
            deleted_descendants: Vec<NodeId>,
            parent: NodeId,
            containment: MetaPointer,
            index: usize,
        },
        /// A child subtree was replaced.
        ChildReplaced {
            new_child: DeltaSerializationChunk,
            replaced_child: NodeId,
            replaced_descendants: Vec<NodeId>,
            parent: NodeId,
            containment: MetaPointer,
            index: usize,
        },
        /// A child moved to another parent.
        ChildMovedFromOtherContainment {
            new_parent: NodeId,
            new_containment: MetaPointer,
            new_index: usize,
            moved_child: NodeId,
            old_parent: NodeId,
            old_containment: MetaPointer,
            old_index: usize,
        },
        /// A child moved between containments of one parent.
        ChildMovedFromOtherContainmentInSameParent {
            parent: NodeId,
            new_containment: MetaPointer,
            new_index: usize,
            moved_child: NodeId,
            old_containment: MetaPointer,
            old_index: usize,
        },
        /// A child was reordered.
        ChildMovedInSameContainment {
            parent: NodeId,
            containment: MetaPointer,
            new_index: usize,
            moved_child: NodeId,
            old_index: usize,
        },
        /// A child moved to another parent, replacing the child there.
        ChildMovedAndReplacedFromOtherContainment {
            new_parent: NodeId,
            new_containment: MetaPointer,
            new_index: usize,
            moved_child: NodeId,
            old_parent: NodeId,
            old_containment: MetaPointer,
            old_index: usize,
            replaced_child: NodeId,
            replaced_descendants: Vec<NodeId>,
        },
        /// A child moved between containments of one parent, replacing a child.
        ChildMovedAndReplacedFromOtherContainmentInSameParent {
            parent: NodeId,
            new_containment: MetaPointer,
            new_index: usize,
            moved_child: NodeId,
            old_containment: MetaPointer,
            old_index: usize,
            replaced_child: NodeId,
            replaced_descendants: Vec<NodeId>,
        },
        /// A child replaced a sibling.
        ChildMovedAndReplacedInSameContainment {
            parent: NodeId,
            containment: MetaPointer,
            new_index: usize,
            moved_child: NodeId,
            old_index: usize,
            replaced_child: NodeId,
            replaced_descendants: Vec<NodeId>,
        },
        /// An annotation subtree was attached.
        AnnotationAdded { parent: NodeId, new_annotation: DeltaSerializationChunk, index: usize },
        /// An annotation subtree was removed.
        AnnotationDeleted {
            deleted_annotation: NodeId,
            deleted_descendants: Vec<NodeId>,
            parent: NodeId,
            index: usize,
        },
        /// An annotation subtree was replaced.
        AnnotationReplaced {
            new_annotation: DeltaSerializationChunk,
            replaced_annotation: NodeId,
            replaced_descendants: Vec<NodeId>,
            parent: NodeId,
            index: usize,
        },
        /// An annotation moved to another parent.
        AnnotationMovedFromOtherParent {
            new_parent: NodeId,
            new_index: usize,
            moved_annotation: NodeId,
            old_parent: NodeId,
            old_index: usize,
        },
        /// An annotation was reordered.
        AnnotationMovedInSameParent {
            parent: NodeId,
            new_index: usize,
            moved_annotation: NodeId,
            old_index: usize,
        },
        /// An annotation moved to another parent, replacing one there.
        AnnotationMovedAndReplacedFromOtherParent {
            new_parent: NodeId,
            new_index: usize,
            moved_annotation: NodeId,
            old_parent: NodeId,
            old_index: usize,
            replaced_annotation: NodeId,
            replaced_descendants: Vec<NodeId>,
        },
        /// An annotation replaced a sibling annotation.
        AnnotationMovedAndReplacedInSameParent {
            parent: NodeId,
            new_index: usize,
            moved_annotation: NodeId,
            old_index: usize,
            replaced_annotation: NodeId,
            replaced_descendants: Vec<NodeId>,
        },
        /// A reference entry was inserted.
        ReferenceAdded {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            new_target: Option<NodeId>,
            new_resolve_info: Option<String>,
        },
        /// A reference entry was removed.
        ReferenceDeleted {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            deleted_target: Option<NodeId>,
            deleted_resolve_info: Option<String>,
        },
        /// A reference entry was overwritten.
        ReferenceChanged {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            new_target: Option<NodeId>,
            new_resolve_info: Option<String>,
            old_target: Option<NodeId>,
            old_resolve_info: Option<String>,
        },
        /// An entry moved to a reference of another parent.
        EntryMovedFromOtherReference {
            new_parent: NodeId,
            new_reference: MetaPointer,
            new_index: usize,
            old_parent: NodeId,
            old_reference: MetaPointer,
            old_index: usize,
            moved_target: Option<NodeId>,
            moved_resolve_info: Option<String>,
        },
        /// An entry moved between references of one parent.
        EntryMovedFromOtherReferenceInSameParent {
            parent: NodeId,
            new_reference: MetaPointer,
            new_index: usize,
            old_reference: MetaPointer,
            old_index: usize,
            moved_target: Option<NodeId>,
            moved_resolve_info: Option<String>,
        },
        /// An entry was reordered.
        EntryMovedInSameReference {
            parent: NodeId,
            reference: MetaPointer,
            new_index: usize,
            old_index: usize,
            moved_target: Option<NodeId>,
            moved_resolve_info: Option<String>,
        },
        /// An entry moved to another parent, replacing the entry there.
        EntryMovedAndReplacedFromOtherReference {
            new_parent: NodeId,
            new_reference: MetaPointer,
            new_index: usize,
            old_parent: NodeId,
            old_reference: MetaPointer,
            old_index: usize,
            moved_target: Option<NodeId>,
            moved_resolve_info: Option<String>,
            replaced_target: Option<NodeId>,
            replaced_resolve_info: Option<String>,
        },
        /// An entry moved between references of one parent, replacing an entry.
        EntryMovedAndReplacedFromOtherReferenceInSameParent {
            parent: NodeId,
            new_reference: MetaPointer,
            new_index: usize,
            old_reference: MetaPointer,
            old_index: usize,
            moved_target: Option<NodeId>,
            moved_resolve_info: Option<String>,
            replaced_target: Option<NodeId>,
            replaced_resolve_info: Option<String>,
        },
        /// An entry replaced a sibling entry.
        EntryMovedAndReplacedInSameReference {
            parent: NodeId,
            reference: MetaPointer,
            new_index: usize,
            old_index: usize,
            moved_target: Option<NodeId>,
            moved_resolve_info: Option<String>,
            replaced_target: Option<NodeId>,
            replaced_resolve_info: Option<String>,
        },
        /// An entry got resolve info.
        ReferenceResolveInfoAdded {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            new_resolve_info: String,
            target: Option<NodeId>,
        },
        /// An entry lost its resolve info.
        ReferenceResolveInfoDeleted {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            target: Option<NodeId>,
            deleted_resolve_info: String,
        },
        /// An entry's resolve info changed.
        ReferenceResolveInfoChanged {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            new_resolve_info: String,
            target: Option<NodeId>,
            old_resolve_info: String,
        },
        /// An entry got a target.
        ReferenceTargetAdded {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            new_target: NodeId,
            resolve_info: Option<String>,
        },
        /// An entry lost its target.
        ReferenceTargetDeleted {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            resolve_info: Option<String>,
            deleted_target: NodeId,
        },
        /// An entry's target changed.
        ReferenceTargetChanged {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            new_target: NodeId,
            resolve_info: Option<String>,
            old_target: NodeId,
        },
    }
}

/// One event with the commands that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleEvent {
    /// Non-empty for events resulting from commands
    pub origin_commands: Vec<CommandSource>,
    /// What changed
    #[serde(flatten)]
    pub kind: EventKind,
    /// Free-form annotation for humans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ProtocolMessage>,
}

impl SingleEvent {
    /// Create an event without a message.
    #[must_use]
    pub fn new(origin_commands: Vec<CommandSource>, kind: EventKind) -> Self {
        Self {
            origin_commands,
            kind,
            message: None,
        }
    }
}

/// Several events that belong together.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompositeEvent {
    /// The bundled events
    pub parts: Vec<SingleEvent>,
    /// Free-form annotation for humans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ProtocolMessage>,
}

/// A single or composite event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum DeltaEvent {
    /// One event
    Single(SingleEvent),
    /// A bundle of events
    Composite(CompositeEvent),
}

impl DeltaEvent {
    /// `messageKind` of a single event, `"CompositeEvent"` otherwise.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DeltaEvent::Single(event) => event.kind.kind(),
            DeltaEvent::Composite(_) => "CompositeEvent",
        }
    }

    /// The single events, in order.
    #[must_use]
    pub fn parts(&self) -> &[SingleEvent] {
        match self {
            DeltaEvent::Single(event) => std::slice::from_ref(event),
            DeltaEvent::Composite(composite) => &composite.parts,
        }
    }
}

impl From<SingleEvent> for DeltaEvent {
    fn from(event: SingleEvent) -> Self {
        DeltaEvent::Single(event)
    }
}

/// An event stamped with its position in the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencedEvent {
    /// Unique, strictly increasing per stream
    pub sequence_number: u64,
    /// The event itself
    pub event: DeltaEvent,
}

impl SequencedEvent {
    /// Stamp an event.
    #[must_use]
    pub fn new(sequence_number: u64, event: impl Into<DeltaEvent>) -> Self {
        Self {
            sequence_number,
            event: event.into(),
        }
    }
}
