//! # lionsync core
//!
//! Node model, type registry, and semantic partition events for lionsync.
//!
//! This crate provides:
//! - Opaque identifiers and correlation keys for commands and events
//! - Languages, the type registry, and compressed meta pointers
//! - The node arena and resolution registry
//! - Semantic partition events and the planners that produce them
//! - A forest of partitions with an all-or-nothing apply engine and event bus
//! - Command id, participation id, and sequence number providers
//! - The subtree chunk codec

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bus;
pub mod error;
pub mod event;
pub mod forest;
pub mod ids;
pub mod language;
pub mod node;
pub mod plan;
pub mod provider;
pub mod registry;
pub mod serialization;
pub mod types;
pub mod value;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use bus::{EventFilter, PartitionEventBus, SubscriptionId};
pub use error::{DeltaError, Result};
pub use event::{Change, EventCategory, PartitionEvent};
pub use forest::{Checkpoint, Forest};
pub use ids::{CommandId, CommandSource, EventId, NodeId, ParticipationId, QueryId};
pub use language::{
    Classifier, ClassifierKind, DataType, Feature, FeatureKind, Language, MetaPointer,
};
pub use node::{Node, ReferenceTarget, Subtree};
pub use provider::{
    CommandIdProvider, FixedParticipation, ParticipationIdProvider, PrefixedCommandIds,
    SequenceCounter, SequenceNumberProvider, UuidCommandIds,
};
pub use registry::{AnnotationLocation, ChildLocation, NodeRegistry, Registry};
pub use serialization::{
    ChunkCodec, DeltaSerializationChunk, SerializedContainment, SerializedNode, SerializedProperty,
    SerializedReference, SerializedReferenceTarget, SubtreeCodec,
};
pub use types::{ClassifierInfo, CompressedMetaPointer, FeatureInfo, TypeRegistry};
pub use value::PropertyValue;
