//! The message envelope, protocol messages, acknowledgements and errors.

use crate::command::DeltaCommand;
use crate::event::SequencedEvent;
use crate::kind::MessageCategory;
use crate::query::{QueryRequest, QueryResponse};
use lionsync_core::{CommandId, CommandSource, DeltaError};
use serde::{Deserialize, Serialize};

/// One key/value entry of a [`ProtocolMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMessageData {
    /// Entry key
    pub key: String,
    /// Entry value
    pub value: String,
}

/// Human-oriented annotation attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    /// Machine-readable category, e.g. an error code
    pub kind: String,
    /// Human-readable text
    pub message: String,
    /// Additional structured data
    #[serde(default)]
    pub data: Vec<ProtocolMessageData>,
}

impl ProtocolMessage {
    /// Create a message without data entries.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            data: Vec::new(),
        }
    }

    /// Append a data entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.push(ProtocolMessageData {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Value of the first data entry with the given key.
    #[must_use]
    pub fn data_value(&self, key: &str) -> Option<&str> {
        self.data.iter().find(|entry| entry.key == key).map(|entry| entry.value.as_str())
    }
}

/// Acknowledges that a command was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    /// The acknowledged command
    pub command_id: CommandId,
    /// Free-form annotation for humans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ProtocolMessage>,
}

impl CommandResponse {
    /// Acknowledge a command.
    #[must_use]
    pub fn new(command_id: impl Into<CommandId>) -> Self {
        Self {
            command_id: command_id.into(),
            message: None,
        }
    }
}

/// Reports that commands were rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    /// Stable error code
    pub error_code: String,
    /// The rejected commands
    pub origin_commands: Vec<CommandSource>,
    /// Description of the failure
    pub message: ProtocolMessage,
}

impl ErrorEvent {
    /// Describe a failure of the given commands.
    #[must_use]
    pub fn from_failure(error: &DeltaError, origin_commands: Vec<CommandSource>) -> Self {
        let code = error.code();
        let mut message = ProtocolMessage::new(code, error.to_string());
        for source in &origin_commands {
            message = message.with_data("command", source.to_string());
        }
        Self {
            error_code: code.to_string(),
            origin_commands,
            message,
        }
    }
}

/// Every message exchanged between participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum DeltaMessage {
    /// Request to mutate
    Command(DeltaCommand),
    /// Agreed fact
    Event(SequencedEvent),
    /// Session or subscription request
    QueryRequest(QueryRequest),
    /// Answer to a query
    QueryResponse(QueryResponse),
    /// Acknowledgement of a command
    CommandResponse(CommandResponse),
    /// Rejection of commands
    Error(ErrorEvent),
}

impl DeltaMessage {
    /// The category this message is dispatched under.
    #[must_use]
    pub fn category(&self) -> MessageCategory {
        match self {
            DeltaMessage::Command(_) => MessageCategory::Command,
            DeltaMessage::Event(_) => MessageCategory::Event,
            DeltaMessage::QueryRequest(_) => MessageCategory::QueryRequest,
            DeltaMessage::QueryResponse(_) => MessageCategory::QueryResponse,
            DeltaMessage::CommandResponse(_) => MessageCategory::CommandResponse,
            DeltaMessage::Error(_) => MessageCategory::Error,
        }
    }

    /// The stable kind of the payload.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DeltaMessage::Command(command) => command.kind(),
            DeltaMessage::Event(event) => event.event.kind(),
            DeltaMessage::QueryRequest(request) => request.kind.kind(),
            DeltaMessage::QueryResponse(response) => response.kind.kind(),
            DeltaMessage::CommandResponse(_) => "CommandResponse",
            DeltaMessage::Error(_) => "Error",
        }
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(|e| MessageError::Serialize(e.to_string()))
    }

    /// Deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a valid message.
    pub fn from_json(text: &str) -> Result<Self, MessageError> {
        serde_json::from_str(text).map_err(|e| MessageError::Deserialize(e.to_string()))
    }

    /// Serialize to CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_cbor(&self) -> Result<Vec<u8>, MessageError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| MessageError::Serialize(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize from CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, MessageError> {
        ciborium::from_reader(bytes).map_err(|e| MessageError::Deserialize(e.to_string()))
    }
}

impl From<DeltaCommand> for DeltaMessage {
    fn from(command: DeltaCommand) -> Self {
        DeltaMessage::Command(command)
    }
}

impl From<SequencedEvent> for DeltaMessage {
    fn from(event: SequencedEvent) -> Self {
        DeltaMessage::Event(event)
    }
}

impl From<QueryRequest> for DeltaMessage {
    fn from(request: QueryRequest) -> Self {
        DeltaMessage::QueryRequest(request)
    }
}

impl From<QueryResponse> for DeltaMessage {
    fn from(response: QueryResponse) -> Self {
        DeltaMessage::QueryResponse(response)
    }
}

impl From<CommandResponse> for DeltaMessage {
    fn from(response: CommandResponse) -> Self {
        DeltaMessage::CommandResponse(response)
    }
}

impl From<ErrorEvent> for DeltaMessage {
    fn from(error: ErrorEvent) -> Self {
        DeltaMessage::Error(error)
    }
}

/// Message encoding errors.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// Serialization failed
    #[error("serialization error: {0}")]
    Serialize(String),
    /// Deserialization failed
    #[error("deserialization error: {0}")]
    Deserialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandKind, CompositeCommand, SingleCommand};
    use crate::event::{EventKind, SingleEvent};
    use crate::query::QueryResponseKind;
    use lionsync_core::{
        DeltaSerializationChunk, MetaPointer, NodeId, SerializedNode, SerializedProperty,
    };

    fn chunk() -> DeltaSerializationChunk {
        DeltaSerializationChunk {
            nodes: vec![SerializedNode {
                id: NodeId::from("b1"),
                classifier: MetaPointer::new("library", "1", "Book"),
                properties: vec![SerializedProperty {
                    property: MetaPointer::new("library", "1", "Book-title"),
                    value: Some("Dune".into()),
                }],
                containments: vec![],
                references: vec![],
                annotations: vec![],
                parent: Some(NodeId::from("lib")),
            }],
        }
    }

    fn samples() -> Vec<DeltaMessage> {
        let add_child = SingleCommand::new(
            "c-1",
            CommandKind::AddChild {
                parent: "lib".into(),
                new_child: chunk(),
                containment: MetaPointer::new("library", "1", "Library-books"),
                index: 0,
            },
        );
        let delete = SingleCommand::new(
            "c-2",
            CommandKind::DeleteProperty {
                node: "b1".into(),
                property: MetaPointer::new("library", "1", "Book-title"),
            },
        )
        .with_message(ProtocolMessage::new("note", "cleanup").with_data("reason", "typo"));

        vec![
            DeltaCommand::from(add_child.clone()).into(),
            DeltaCommand::from(CompositeCommand::new(vec![add_child, delete])).into(),
            SequencedEvent::new(
                3,
                SingleEvent::new(
                    vec![CommandSource::new("p", "c-1")],
                    EventKind::ReferenceTargetChanged {
                        parent: "b1".into(),
                        reference: MetaPointer::new("library", "1", "Book-author"),
                        index: 0,
                        new_target: "w2".into(),
                        resolve_info: None,
                        old_target: "w1".into(),
                    },
                ),
            )
            .into(),
            QueryResponse::new(
                "q",
                QueryResponseKind::SignOnResponse {
                    participation_id: "p".into(),
                },
            )
            .into(),
            CommandResponse::new("c-1").into(),
            ErrorEvent::from_failure(
                &DeltaError::UnknownNode("ghost".into()),
                vec![CommandSource::new("p", "c-9")],
            )
            .into(),
        ]
    }

    #[test]
    fn json_and_cbor_preserve_messages() {
        for message in samples() {
            let json = message.to_json().unwrap();
            assert_eq!(DeltaMessage::from_json(&json).unwrap(), message, "json: {json}");

            let cbor = message.to_cbor().unwrap();
            assert_eq!(DeltaMessage::from_cbor(&cbor).unwrap(), message);
        }
    }

    #[test]
    fn envelope_reports_category_and_kind() {
        let kinds: Vec<(MessageCategory, &str)> =
            samples().iter().map(|m| (m.category(), m.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                (MessageCategory::Command, "AddChild"),
                (MessageCategory::Command, "CompositeCommand"),
                (MessageCategory::Event, "ReferenceTargetChanged"),
                (MessageCategory::QueryResponse, "SignOnResponse"),
                (MessageCategory::CommandResponse, "CommandResponse"),
                (MessageCategory::Error, "Error"),
            ]
        );
    }

    #[test]
    fn error_event_uses_stable_code() {
        let error = ErrorEvent::from_failure(
            &DeltaError::UnknownNode("ghost".into()),
            vec![CommandSource::new("p", "c")],
        );

        assert_eq!(error.error_code, DeltaError::UnknownNode("ghost".into()).code());
        assert_eq!(error.message.kind, error.error_code);
        assert_eq!(error.message.data_value("command"), Some("p/c"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            DeltaMessage::from_json("{\"type\":\"nope\"}"),
            Err(MessageError::Deserialize(_))
        ));
        assert!(matches!(
            DeltaMessage::from_cbor(&[0xff, 0x00]),
            Err(MessageError::Deserialize(_))
        ));
    }
}
