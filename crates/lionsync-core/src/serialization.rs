//! Subtree chunks: the wire form of nodes entering or leaving the model.
//!
//! A chunk is a flat, order-independent list of serialized nodes. Ownership
//! is expressed by child and annotation id lists; the root is the one node
//! no other node of the chunk owns.

use crate::error::{DeltaError, Result};
use crate::ids::NodeId;
use crate::language::MetaPointer;
use crate::node::{Node, ReferenceTarget, Subtree};
use crate::registry::{NodeRegistry, Registry};
use crate::types::{FeatureInfo, TypeRegistry};
use crate::value::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A flat list of serialized nodes forming one subtree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeltaSerializationChunk {
    /// Serialized nodes, in no particular order
    pub nodes: Vec<SerializedNode>,
}

/// One node in wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode {
    /// Node id
    pub id: NodeId,
    /// Classifier pointer
    pub classifier: MetaPointer,
    /// Property values
    #[serde(default)]
    pub properties: Vec<SerializedProperty>,
    /// Children per containment
    #[serde(default)]
    pub containments: Vec<SerializedContainment>,
    /// Entries per reference
    #[serde(default)]
    pub references: Vec<SerializedReference>,
    /// Annotation ids
    #[serde(default)]
    pub annotations: Vec<NodeId>,
    /// Containing node
    #[serde(default)]
    pub parent: Option<NodeId>,
}

/// A property value in wire form; `None` means unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedProperty {
    /// Property pointer
    pub property: MetaPointer,
    /// Wire value
    pub value: Option<String>,
}

/// Children of one containment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedContainment {
    /// Containment pointer
    pub containment: MetaPointer,
    /// Child ids, in order
    pub children: Vec<NodeId>,
}

/// Entries of one reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedReference {
    /// Reference pointer
    pub reference: MetaPointer,
    /// Entries, in order
    pub targets: Vec<SerializedReferenceTarget>,
}

/// One reference entry in wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedReferenceTarget {
    /// Textual hint
    pub resolve_info: Option<String>,
    /// Target node id
    pub reference: Option<NodeId>,
}

impl From<&ReferenceTarget> for SerializedReferenceTarget {
    fn from(entry: &ReferenceTarget) -> Self {
        Self {
            resolve_info: entry.resolve_info.clone(),
            reference: entry.target.clone(),
        }
    }
}

/// Converts between detached subtrees and chunks.
pub trait SubtreeCodec {
    /// Serialize a subtree.
    ///
    /// # Errors
    ///
    /// Implementations may fail if the subtree holds handles unknown to `types`.
    fn serialize(&self, types: &TypeRegistry, subtree: &Subtree) -> Result<DeltaSerializationChunk>;

    /// Materialize a chunk as a detached subtree.
    ///
    /// Reference targets may point into the chunk, forward references
    /// included, or at nodes in `known`.
    ///
    /// # Errors
    ///
    /// Fails if a pointer or value cannot be resolved, a reference target is
    /// unknown, a node id is already known, or the chunk is not a single tree.
    fn deserialize(
        &self,
        types: &TypeRegistry,
        chunk: &DeltaSerializationChunk,
        known: &NodeRegistry,
    ) -> Result<Subtree>;
}

/// The chunk codec used throughout the workspace.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkCodec;

impl ChunkCodec {
    /// Serialize a live node together with its descendants.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::UnknownNode`] if the node is not registered.
    pub fn serialize_node(
        &self,
        registry: &Registry,
        id: &NodeId,
    ) -> Result<DeltaSerializationChunk> {
        let subtree = registry.nodes().collect_subtree(id)?;
        self.serialize(registry.types(), &subtree)
    }

    fn decode_node(types: &TypeRegistry, serialized: &SerializedNode) -> Result<Node> {
        let classifier = types.classifier(&serialized.classifier)?.id;
        let mut node = Node::new(serialized.id.clone(), classifier);
        let applicable = |feature: &FeatureInfo| {
            if types.declares(classifier, feature.id) {
                Ok(())
            } else {
                Err(DeltaError::FeatureNotApplicable {
                    node: serialized.id.clone(),
                    feature: feature.pointer.clone(),
                })
            }
        };

        for property in &serialized.properties {
            let info = types.property(&property.property)?;
            applicable(info)?;
            let (Some(raw), Some(data_type)) = (&property.value, info.data_type()) else {
                continue;
            };
            let value = PropertyValue::from_wire(&info.pointer, data_type, raw)?;
            node.properties.insert(info.id, value);
        }

        for containment in &serialized.containments {
            let info = types.containment(&containment.containment)?;
            applicable(info)?;
            if !containment.children.is_empty() {
                node.containments
                    .insert(info.id, containment.children.clone());
            }
        }

        for reference in &serialized.references {
            let info = types.reference(&reference.reference)?;
            applicable(info)?;
            let entries: Vec<ReferenceTarget> = reference
                .targets
                .iter()
                .map(|target| {
                    ReferenceTarget::new(target.reference.clone(), target.resolve_info.clone())
                })
                .collect();
            if entries.iter().any(ReferenceTarget::is_empty) {
                return Err(DeltaError::MissingValue("reference target or resolve info"));
            }
            if !entries.is_empty() {
                node.references.insert(info.id, entries);
            }
        }

        node.annotations = serialized.annotations.clone();
        Ok(node)
    }
}

impl SubtreeCodec for ChunkCodec {
    fn serialize(
        &self,
        types: &TypeRegistry,
        subtree: &Subtree,
    ) -> Result<DeltaSerializationChunk> {
        let nodes = subtree
            .nodes()
            .iter()
            .map(|node| SerializedNode {
                id: node.id.clone(),
                classifier: types.pointer(node.classifier).clone(),
                properties: node
                    .properties
                    .iter()
                    .map(|(property, value)| SerializedProperty {
                        property: types.pointer(*property).clone(),
                        value: Some(value.to_wire()),
                    })
                    .collect(),
                containments: node
                    .containments
                    .iter()
                    .map(|(containment, children)| SerializedContainment {
                        containment: types.pointer(*containment).clone(),
                        children: children.clone(),
                    })
                    .collect(),
                references: node
                    .references
                    .iter()
                    .map(|(reference, entries)| SerializedReference {
                        reference: types.pointer(*reference).clone(),
                        targets: entries.iter().map(SerializedReferenceTarget::from).collect(),
                    })
                    .collect(),
                annotations: node.annotations.clone(),
                parent: node.parent.clone(),
            })
            .collect();
        Ok(DeltaSerializationChunk { nodes })
    }

    fn deserialize(
        &self,
        types: &TypeRegistry,
        chunk: &DeltaSerializationChunk,
        known: &NodeRegistry,
    ) -> Result<Subtree> {
        if chunk.nodes.is_empty() {
            return Err(DeltaError::InvalidChunk("chunk holds no nodes".to_string()));
        }

        let nodes = chunk
            .nodes
            .iter()
            .map(|serialized| Self::decode_node(types, serialized))
            .collect::<Result<Vec<_>>>()?;

        if let Some(taken) = nodes.iter().find(|node| known.contains(&node.id)) {
            return Err(DeltaError::DuplicateNode(taken.id.clone()));
        }

        let local: HashSet<&NodeId> = nodes.iter().map(|node| &node.id).collect();
        let unresolved = nodes
            .iter()
            .flat_map(|node| node.references.values().flatten())
            .filter_map(|entry| entry.target.as_ref())
            .find(|target| !local.contains(target) && !known.contains(target));
        if let Some(target) = unresolved {
            return Err(DeltaError::UnknownNode(target.clone()));
        }

        let subtree = Subtree::from_nodes(nodes)?;
        tracing::debug!(root = %subtree.root(), nodes = subtree.len(), "Decoded chunk");
        Ok(subtree)
    }
}
