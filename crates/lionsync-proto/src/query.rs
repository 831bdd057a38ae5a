//! Session and subscription queries.

use crate::kind::{message_kinds, DELTA_PROTOCOL_VERSION};
use crate::message::ProtocolMessage;
use lionsync_core::{DeltaSerializationChunk, NodeId, ParticipationId, QueryId};
use serde::{Deserialize, Serialize};

message_kinds! {
    /// Requests a client sends to the repository.
    #[allow(missing_docs)]
    pub enum QueryRequestKind {
        /// Open a participation.
        SignOn { delta_protocol_version: String, client_id: String, repository_id: String },
        /// Close the current participation.
        SignOff,
        /// Resume a participation after a dropped connection.
        Reconnect { participation_id: ParticipationId, last_received_sequence_number: u64 },
        /// Choose which partition lifecycle events to receive.
        SubscribeToChangingPartitions { creation: bool, deletion: bool, partitions: bool },
        /// Start receiving events for one partition.
        SubscribeToPartitionContents { partition: NodeId },
        /// Stop receiving events for one partition.
        UnsubscribeFromPartitionContents { partition: NodeId },
        /// Reserve free node ids.
        GetAvailableIds { count: u32 },
        /// List the partition roots.
        ListPartitions,
    }
}

message_kinds! {
    /// Answers to [`QueryRequestKind`], one per request kind.
    #[allow(missing_docs)]
    pub enum QueryResponseKind {
        /// Participation opened.
        SignOnResponse { participation_id: ParticipationId },
        /// Participation closed.
        SignOffResponse,
        /// Participation resumed; events after this number follow.
        ReconnectResponse { last_sent_sequence_number: u64 },
        /// Lifecycle subscription updated.
        SubscribeToChangingPartitionsResponse,
        /// Subscribed; the partition's current contents.
        SubscribeToPartitionContentsResponse { contents: DeltaSerializationChunk },
        /// Unsubscribed.
        UnsubscribeFromPartitionContentsResponse,
        /// Reserved ids.
        GetAvailableIdsResponse { ids: Vec<NodeId> },
        /// Partition roots without descendants.
        ListPartitionsResponse { partitions: DeltaSerializationChunk },
    }
}

impl QueryRequestKind {
    /// The response kind that answers this request.
    #[must_use]
    pub fn response_kind(&self) -> &'static str {
        match self {
            QueryRequestKind::SignOn { .. } => "SignOnResponse",
            QueryRequestKind::SignOff => "SignOffResponse",
            QueryRequestKind::Reconnect { .. } => "ReconnectResponse",
            QueryRequestKind::SubscribeToChangingPartitions { .. } => {
                "SubscribeToChangingPartitionsResponse"
            }
            QueryRequestKind::SubscribeToPartitionContents { .. } => {
                "SubscribeToPartitionContentsResponse"
            }
            QueryRequestKind::UnsubscribeFromPartitionContents { .. } => {
                "UnsubscribeFromPartitionContentsResponse"
            }
            QueryRequestKind::GetAvailableIds { .. } => "GetAvailableIdsResponse",
            QueryRequestKind::ListPartitions => "ListPartitionsResponse",
        }
    }
}

/// A query request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Correlates the response
    pub query_id: QueryId,
    /// What is asked
    #[serde(flatten)]
    pub kind: QueryRequestKind,
    /// Free-form annotation for humans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ProtocolMessage>,
}

impl QueryRequest {
    /// Create a request without a message.
    #[must_use]
    pub fn new(query_id: impl Into<QueryId>, kind: QueryRequestKind) -> Self {
        Self {
            query_id: query_id.into(),
            kind,
            message: None,
        }
    }

    /// A `SignOn` request for the current protocol version.
    #[must_use]
    pub fn sign_on(
        query_id: impl Into<QueryId>,
        client_id: impl Into<String>,
        repository_id: impl Into<String>,
    ) -> Self {
        Self::new(
            query_id,
            QueryRequestKind::SignOn {
                delta_protocol_version: DELTA_PROTOCOL_VERSION.to_string(),
                client_id: client_id.into(),
                repository_id: repository_id.into(),
            },
        )
    }

    /// Whether `response` answers this request.
    #[must_use]
    pub fn is_answered_by(&self, response: &QueryResponse) -> bool {
        self.query_id == response.query_id && self.kind.response_kind() == response.kind.kind()
    }
}

/// A query response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Copied from the request
    pub query_id: QueryId,
    /// The answer
    #[serde(flatten)]
    pub kind: QueryResponseKind,
    /// Free-form annotation for humans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ProtocolMessage>,
}

impl QueryResponse {
    /// Create a response without a message.
    #[must_use]
    pub fn new(query_id: impl Into<QueryId>, kind: QueryResponseKind) -> Self {
        Self {
            query_id: query_id.into(),
            kind,
            message: None,
        }
    }
}
