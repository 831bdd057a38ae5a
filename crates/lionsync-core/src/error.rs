//! Failures raised while resolving, planning, or applying deltas.

use crate::ids::NodeId;
use crate::language::MetaPointer;

/// Errors raised while turning delta messages into partition changes and back.
///
/// Every error aborts processing of the message that caused it; no partial
/// mutation of the registry or forest is left behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaError {
    /// A node id is not known to the registry
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// A feature pointer is not known to the type registry
    #[error("unknown feature: {0}")]
    UnknownFeature(MetaPointer),

    /// A classifier pointer is not known to the type registry
    #[error("unknown classifier: {0}")]
    UnknownClassifier(MetaPointer),

    /// A pointer resolved, but to the wrong kind of entity
    #[error("{pointer} is not a {expected}")]
    FeatureKindMismatch {
        /// The pointer that was resolved
        pointer: MetaPointer,
        /// The kind of entity the caller needed
        expected: &'static str,
    },

    /// A feature is not declared by the node's classifier
    #[error("feature {feature} does not apply to node {node}")]
    FeatureNotApplicable {
        /// The node
        node: NodeId,
        /// The feature
        feature: MetaPointer,
    },

    /// A wire value cannot be converted to the property's type
    #[error("invalid value {value:?} for {feature}: expected {expected}")]
    InvalidValue {
        /// The property
        feature: MetaPointer,
        /// The offending wire value
        value: String,
        /// Description of the accepted values
        expected: String,
    },

    /// A field required by the message shape is absent
    #[error("missing value: {0}")]
    MissingValue(&'static str),

    /// A serialized subtree chunk is not self-consistent
    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    /// An index lies outside the addressed collection
    #[error("index {index} out of bounds for {feature} of {node} (len {len})")]
    IndexOutOfBounds {
        /// Owner of the collection
        node: NodeId,
        /// The addressed feature, or `annotations`
        feature: String,
        /// Requested index
        index: usize,
        /// Current collection length
        len: usize,
    },

    /// The node found at a location differs from the one named
    #[error("expected node {expected} but found {found:?}")]
    UnexpectedNode {
        /// Node named by the message
        expected: NodeId,
        /// Node actually present, if any
        found: Option<NodeId>,
    },

    /// A node is not held by a containment or annotation slot
    #[error("node {0} is not contained by any parent")]
    NotContained(NodeId),

    /// A single-valued feature already holds a value
    #[error("{feature} of {node} holds at most one value")]
    MultiplicityViolation {
        /// Owner of the feature
        node: NodeId,
        /// The single-valued feature
        feature: MetaPointer,
    },

    /// A move would place a node below itself
    #[error("cannot move {moved} below its own descendant {target}")]
    ContainmentCycle {
        /// The node being moved
        moved: NodeId,
        /// The requested new parent
        target: NodeId,
    },

    /// A move or move-and-replace would detach the moved element itself
    #[error("invalid move: {0}")]
    InvalidMove(String),

    /// A change's recorded prior state differs from the current state
    #[error("{0} does not match the current state")]
    StaleChange(&'static str),

    /// A node id is already taken
    #[error("duplicate node: {0}")]
    DuplicateNode(NodeId),

    /// A node is not a partition root, or cannot become one
    #[error("not a partition: {0}")]
    NotAPartition(NodeId),

    /// A feature that must be unset already has a value
    #[error("{feature} of {node} is already set")]
    FeatureAlreadySet {
        /// Owner of the feature
        node: NodeId,
        /// The feature
        feature: MetaPointer,
    },

    /// An old value was needed but the feature has none locally
    #[error("{feature} of {node} is unset")]
    UnsetFeature {
        /// Owner of the feature
        node: NodeId,
        /// The feature
        feature: MetaPointer,
    },

    /// A node to be removed is still the target of a reference outside the removed subtree
    #[error("node {node} is still referenced by {referrer}")]
    StillReferenced {
        /// The node that would be removed
        node: NodeId,
        /// A node whose reference entry targets it
        referrer: NodeId,
    },

    /// A language element is registered twice
    #[error("duplicate meta pointer: {0}")]
    DuplicateMetaPointer(MetaPointer),

    /// A receiver was handed a message category it does not map
    #[error("unmapped message kind: {kind}")]
    Unmapped {
        /// Kind of the rejected message
        kind: String,
    },

    /// A sequenced event arrived out of order
    #[error("sequence gap: expected {expected}, received {received}")]
    SequenceGap {
        /// Next sequence number the receiver expected
        expected: u64,
        /// Sequence number actually received
        received: u64,
    },
}

impl DeltaError {
    /// Stable error code for protocol error messages.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            DeltaError::UnknownNode(_) => "unknownNode",
            DeltaError::UnknownFeature(_) => "unknownFeature",
            DeltaError::UnknownClassifier(_) => "unknownClassifier",
            DeltaError::FeatureKindMismatch { .. } => "featureKindMismatch",
            DeltaError::FeatureNotApplicable { .. } => "featureNotApplicable",
            DeltaError::InvalidValue { .. } => "invalidValue",
            DeltaError::MissingValue(_) => "missingValue",
            DeltaError::InvalidChunk(_) => "invalidChunk",
            DeltaError::IndexOutOfBounds { .. } => "indexOutOfBounds",
            DeltaError::UnexpectedNode { .. } => "unexpectedNode",
            DeltaError::NotContained(_) => "notContained",
            DeltaError::MultiplicityViolation { .. } => "multiplicityViolation",
            DeltaError::ContainmentCycle { .. } => "containmentCycle",
            DeltaError::InvalidMove(_) => "invalidMove",
            DeltaError::StaleChange(_) => "staleChange",
            DeltaError::DuplicateNode(_) => "duplicateNode",
            DeltaError::NotAPartition(_) => "notAPartition",
            DeltaError::FeatureAlreadySet { .. } => "featureAlreadySet",
            DeltaError::UnsetFeature { .. } => "unsetFeature",
            DeltaError::StillReferenced { .. } => "stillReferenced",
            DeltaError::DuplicateMetaPointer(_) => "duplicateMetaPointer",
            DeltaError::Unmapped { .. } => "unmapped",
            DeltaError::SequenceGap { .. } => "sequenceGap",
        }
    }

    /// Whether the message could succeed later, once more nodes are known.
    ///
    /// Transports use this to decide between buffering and rejecting.
    #[must_use]
    pub fn is_unresolved_reference(&self) -> bool {
        matches!(self, DeltaError::UnknownNode(_))
    }
}

/// Result type for delta operations.
pub type Result<T> = std::result::Result<T, DeltaError>;
