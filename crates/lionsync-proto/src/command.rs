//! Commands: requests to mutate shared state.
//!
//! Commands carry intent only. They never hold a sequence number or a
//! previous value; deletes and replaces name the removed node so the
//! receiver can verify it.

use crate::kind::message_kinds;
use crate::message::ProtocolMessage;
use lionsync_core::{CommandId, DeltaSerializationChunk, MetaPointer, NodeId};
use serde::{Deserialize, Serialize};

message_kinds! {
    /// The catalogue of single commands.
    #[allow(missing_docs)]
    pub enum CommandKind {
        /// Add a new partition root with its descendants.
        AddPartition { new_partition: DeltaSerializationChunk },
        /// Delete a partition root with its descendants.
        DeletePartition { deleted_partition: NodeId },
        /// Change the classifier of a node.
        ChangeClassifier { node: NodeId, new_classifier: MetaPointer },
        /// Set a property that had no value.
        AddProperty { node: NodeId, property: MetaPointer, new_value: String },
        /// Unset a property.
        DeleteProperty { node: NodeId, property: MetaPointer },
        /// Overwrite a set property.
        ChangeProperty { node: NodeId, property: MetaPointer, new_value: String },
        /// Insert a new subtree into a containment.
        AddChild {
            parent: NodeId,
            new_child: DeltaSerializationChunk,
            containment: MetaPointer,
            index: usize,
        },
        /// Remove a child and its descendants.
        DeleteChild {
            parent: NodeId,
            containment: MetaPointer,
            index: usize,
            deleted_child: NodeId,
        },
        /// Replace a child with a new subtree.
        ReplaceChild {
            new_child: DeltaSerializationChunk,
            parent: NodeId,
            containment: MetaPointer,
            index: usize,
            replaced_child: NodeId,
        },
        /// Move a child to a containment of another parent.
        MoveChildFromOtherContainment {
            new_parent: NodeId,
            new_containment: MetaPointer,
            new_index: usize,
            moved_child: NodeId,
        },
        /// Move a child to another containment of the same parent.
        MoveChildFromOtherContainmentInSameParent {
            new_containment: MetaPointer,
            new_index: usize,
            moved_child: NodeId,
        },
        /// Reorder a child within its containment.
        MoveChildInSameContainment { new_index: usize, moved_child: NodeId },
        /// Move a child onto the slot of another parent's child, deleting it.
        MoveAndReplaceChildFromOtherContainment {
            new_parent: NodeId,
            new_containment: MetaPointer,
            new_index: usize,
            replaced_child: NodeId,
            moved_child: NodeId,
        },
        /// Move a child onto a slot in another containment of its parent.
        MoveAndReplaceChildFromOtherContainmentInSameParent {
            new_containment: MetaPointer,
            new_index: usize,
            replaced_child: NodeId,
            moved_child: NodeId,
        },
        /// Move a child onto a sibling's slot, deleting the sibling.
        MoveAndReplaceChildInSameContainment {
            new_index: usize,
            replaced_child: NodeId,
            moved_child: NodeId,
        },
        /// Attach a new annotation subtree.
        AddAnnotation {
            parent: NodeId,
            new_annotation: DeltaSerializationChunk,
            index: usize,
        },
        /// Remove an annotation and its descendants.
        DeleteAnnotation {
            parent: NodeId,
            index: usize,
            deleted_annotation: NodeId,
        },
        /// Replace an annotation with a new subtree.
        ReplaceAnnotation {
            new_annotation: DeltaSerializationChunk,
            parent: NodeId,
            index: usize,
            replaced_annotation: NodeId,
        },
        /// Move an annotation to another parent.
        MoveAnnotationFromOtherParent {
            new_parent: NodeId,
            new_index: usize,
            moved_annotation: NodeId,
        },
        /// Reorder an annotation within its parent.
        MoveAnnotationInSameParent { new_index: usize, moved_annotation: NodeId },
        /// Move an annotation onto another parent's annotation slot.
        MoveAndReplaceAnnotationFromOtherParent {
            new_parent: NodeId,
            new_index: usize,
            replaced_annotation: NodeId,
            moved_annotation: NodeId,
        },
        /// Move an annotation onto a sibling annotation's slot.
        MoveAndReplaceAnnotationInSameParent {
            new_index: usize,
            replaced_annotation: NodeId,
            moved_annotation: NodeId,
        },
        /// Insert a reference entry.
        AddReference {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            new_target: Option<NodeId>,
            new_resolve_info: Option<String>,
        },
        /// Remove a reference entry.
        DeleteReference { parent: NodeId, reference: MetaPointer, index: usize },
        /// Overwrite a reference entry.
        ChangeReference {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            new_target: Option<NodeId>,
            new_resolve_info: Option<String>,
        },
        /// Move an entry to a reference of another parent.
        MoveEntryFromOtherReference {
            new_parent: NodeId,
            new_reference: MetaPointer,
            new_index: usize,
            old_parent: NodeId,
            old_reference: MetaPointer,
            old_index: usize,
        },
        /// Move an entry to another reference of the same parent.
        MoveEntryFromOtherReferenceInSameParent {
            parent: NodeId,
            new_reference: MetaPointer,
            new_index: usize,
            old_reference: MetaPointer,
            old_index: usize,
        },
        /// Reorder an entry within its reference.
        MoveEntryInSameReference {
            parent: NodeId,
            reference: MetaPointer,
            new_index: usize,
            old_index: usize,
        },
        /// Move an entry onto the entry at `new_index` of another parent.
        MoveAndReplaceEntryFromOtherReference {
            new_parent: NodeId,
            new_reference: MetaPointer,
            new_index: usize,
            old_parent: NodeId,
            old_reference: MetaPointer,
            old_index: usize,
        },
        /// Move an entry onto an entry of another reference of the same parent.
        MoveAndReplaceEntryFromOtherReferenceInSameParent {
            parent: NodeId,
            new_reference: MetaPointer,
            new_index: usize,
            old_reference: MetaPointer,
            old_index: usize,
        },
        /// Move an entry onto a sibling entry.
        MoveAndReplaceEntryInSameReference {
            parent: NodeId,
            reference: MetaPointer,
            new_index: usize,
            old_index: usize,
        },
        /// Give an entry resolve info it lacked.
        AddReferenceResolveInfo {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            new_resolve_info: String,
        },
        /// Strip the resolve info of an entry.
        DeleteReferenceResolveInfo { parent: NodeId, reference: MetaPointer, index: usize },
        /// Overwrite the resolve info of an entry.
        ChangeReferenceResolveInfo {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            new_resolve_info: String,
        },
        /// Give an entry a target it lacked.
        AddReferenceTarget {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            new_target: NodeId,
        },
        /// Strip the target of an entry.
        DeleteReferenceTarget { parent: NodeId, reference: MetaPointer, index: usize },
        /// Overwrite the target of an entry.
        ChangeReferenceTarget {
            parent: NodeId,
            reference: MetaPointer,
            index: usize,
            new_target: NodeId,
        },
    }
}

/// One command with its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleCommand {
    /// Unique per participation
    pub command_id: CommandId,
    /// What to change
    #[serde(flatten)]
    pub kind: CommandKind,
    /// Free-form annotation for humans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ProtocolMessage>,
}

impl SingleCommand {
    /// Create a command without a message.
    #[must_use]
    pub fn new(command_id: impl Into<CommandId>, kind: CommandKind) -> Self {
        Self {
            command_id: command_id.into(),
            kind,
            message: None,
        }
    }

    /// Attach a protocol message.
    #[must_use]
    pub fn with_message(mut self, message: ProtocolMessage) -> Self {
        self.message = Some(message);
        self
    }
}

/// Several commands applied all-or-nothing, in order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompositeCommand {
    /// The bundled commands
    pub parts: Vec<SingleCommand>,
    /// Free-form annotation for humans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ProtocolMessage>,
}

impl CompositeCommand {
    /// Bundle the given commands.
    #[must_use]
    pub fn new(parts: Vec<SingleCommand>) -> Self {
        Self { parts, message: None }
    }
}

/// A single or composite command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum DeltaCommand {
    /// One command
    Single(SingleCommand),
    /// A bundle of commands
    Composite(CompositeCommand),
}

impl DeltaCommand {
    /// `messageKind` of a single command, `"CompositeCommand"` otherwise.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DeltaCommand::Single(command) => command.kind.kind(),
            DeltaCommand::Composite(_) => "CompositeCommand",
        }
    }

    /// Ids of every command in this message, in order.
    #[must_use]
    pub fn command_ids(&self) -> Vec<&CommandId> {
        match self {
            DeltaCommand::Single(command) => vec![&command.command_id],
            DeltaCommand::Composite(composite) => {
                composite.parts.iter().map(|part| &part.command_id).collect()
            }
        }
    }
}

impl From<SingleCommand> for DeltaCommand {
    fn from(command: SingleCommand) -> Self {
        DeltaCommand::Single(command)
    }
}

impl From<CompositeCommand> for DeltaCommand {
    fn from(command: CompositeCommand) -> Self {
        DeltaCommand::Composite(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn title() -> MetaPointer {
        MetaPointer::new("library", "1", "Book-title")
    }

    #[test]
    fn single_command_json_is_flat_and_camel_case() {
        let command = SingleCommand::new(
            "c-1",
            CommandKind::ChangeProperty {
                node: NodeId::from("b1"),
                property: title(),
                new_value: "Dune".into(),
            },
        );

        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(
            value,
            json!({
                "commandId": "c-1",
                "messageKind": "ChangeProperty",
                "node": "b1",
                "property": {"language": "library", "version": "1", "key": "Book-title"},
                "newValue": "Dune",
            })
        );
        assert_eq!(command.kind.kind(), "ChangeProperty");
    }

    #[test]
    fn missing_optional_entry_fields_decode_as_none() {
        let command: SingleCommand = serde_json::from_value(json!({
            "commandId": "c-2",
            "messageKind": "AddReference",
            "parent": "b1",
            "reference": {"language": "library", "version": "1", "key": "Book-author"},
            "index": 0,
            "newResolveInfo": "Herbert",
        }))
        .unwrap();

        assert!(matches!(
            command.kind,
            CommandKind::AddReference { new_target: None, ref new_resolve_info, .. }
                if new_resolve_info.as_deref() == Some("Herbert")
        ));
    }

    #[test]
    fn composite_lists_command_ids_in_order() {
        let composite = DeltaCommand::from(CompositeCommand::new(vec![
            SingleCommand::new(
                "a",
                CommandKind::DeletePartition {
                    deleted_partition: "p".into(),
                },
            ),
            SingleCommand::new(
                "b",
                CommandKind::MoveChildInSameContainment {
                    new_index: 0,
                    moved_child: "x".into(),
                },
            ),
        ]));

        assert_eq!(composite.kind(), "CompositeCommand");
        let ids: Vec<&str> = composite.command_ids().into_iter().map(CommandId::as_str).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
