//! Nodes, reference entries, and detached subtrees.

use crate::error::{DeltaError, Result};
use crate::ids::NodeId;
use crate::types::CompressedMetaPointer;
use crate::value::PropertyValue;
use std::collections::{BTreeMap, HashMap, HashSet};

/// A model node.
///
/// Features are keyed by interned pointers; containment children and
/// annotations are stored by id, the nodes themselves live in the
/// [`NodeRegistry`](crate::registry::NodeRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Node identifier
    pub id: NodeId,
    /// Classifier of the node
    pub classifier: CompressedMetaPointer,
    /// Containing node, `None` for partition roots and detached nodes
    pub parent: Option<NodeId>,
    /// Property values
    pub properties: BTreeMap<CompressedMetaPointer, PropertyValue>,
    /// Children per containment, in order
    pub containments: BTreeMap<CompressedMetaPointer, Vec<NodeId>>,
    /// Entries per reference, in order
    pub references: BTreeMap<CompressedMetaPointer, Vec<ReferenceTarget>>,
    /// Attached annotations, in order
    pub annotations: Vec<NodeId>,
}

impl Node {
    /// Create a node without any feature values.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, classifier: CompressedMetaPointer) -> Self {
        Self {
            id: id.into(),
            classifier,
            parent: None,
            properties: BTreeMap::new(),
            containments: BTreeMap::new(),
            references: BTreeMap::new(),
            annotations: Vec::new(),
        }
    }

    /// Set a property value.
    #[must_use]
    pub fn with_property(
        mut self,
        property: CompressedMetaPointer,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.properties.insert(property, value.into());
        self
    }

    /// Append a child id to a containment.
    #[must_use]
    pub fn with_child(
        mut self,
        containment: CompressedMetaPointer,
        child: impl Into<NodeId>,
    ) -> Self {
        self.containments
            .entry(containment)
            .or_default()
            .push(child.into());
        self
    }

    /// Append an entry to a reference.
    #[must_use]
    pub fn with_reference(
        mut self,
        reference: CompressedMetaPointer,
        entry: ReferenceTarget,
    ) -> Self {
        self.references.entry(reference).or_default().push(entry);
        self
    }

    /// Append an annotation id.
    #[must_use]
    pub fn with_annotation(mut self, annotation: impl Into<NodeId>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    /// Current value of a property.
    #[must_use]
    pub fn property(&self, property: CompressedMetaPointer) -> Option<&PropertyValue> {
        self.properties.get(&property)
    }

    /// Children of a containment; empty if unset.
    #[must_use]
    pub fn children(&self, containment: CompressedMetaPointer) -> &[NodeId] {
        self.containments
            .get(&containment)
            .map_or(&[], Vec::as_slice)
    }

    /// Entries of a reference; empty if unset.
    #[must_use]
    pub fn entries(&self, reference: CompressedMetaPointer) -> &[ReferenceTarget] {
        self.references.get(&reference).map_or(&[], Vec::as_slice)
    }

    /// Ids of all directly owned nodes: containment children, then annotations.
    pub fn owned(&self) -> impl Iterator<Item = &NodeId> {
        self.containments
            .values()
            .flatten()
            .chain(self.annotations.iter())
    }

    /// Position of a child within a containment.
    #[must_use]
    pub fn child_index(&self, containment: CompressedMetaPointer, child: &NodeId) -> Option<usize> {
        self.children(containment).iter().position(|id| id == child)
    }

    /// Containment holding a child, with the child's position.
    #[must_use]
    pub fn find_child(&self, child: &NodeId) -> Option<(CompressedMetaPointer, usize)> {
        self.containments.iter().find_map(|(containment, children)| {
            children
                .iter()
                .position(|id| id == child)
                .map(|index| (*containment, index))
        })
    }

    /// Position of an annotation.
    #[must_use]
    pub fn annotation_index(&self, annotation: &NodeId) -> Option<usize> {
        self.annotations.iter().position(|id| id == annotation)
    }

    pub(crate) fn children_mut(&mut self, containment: CompressedMetaPointer) -> &mut Vec<NodeId> {
        self.containments.entry(containment).or_default()
    }

    pub(crate) fn entries_mut(
        &mut self,
        reference: CompressedMetaPointer,
    ) -> &mut Vec<ReferenceTarget> {
        self.references.entry(reference).or_default()
    }

    /// Drop empty containment and reference lists so equal states compare equal.
    pub(crate) fn prune(&mut self) {
        self.containments.retain(|_, children| !children.is_empty());
        self.references.retain(|_, entries| !entries.is_empty());
    }
}

/// One entry of a reference: a target node, a textual hint, or both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ReferenceTarget {
    /// Human readable hint for resolving the target
    pub resolve_info: Option<String>,
    /// Referenced node
    pub target: Option<NodeId>,
}

impl ReferenceTarget {
    /// An entry pointing at a node.
    #[must_use]
    pub fn to(target: impl Into<NodeId>) -> Self {
        Self {
            resolve_info: None,
            target: Some(target.into()),
        }
    }

    /// Create an entry from its parts.
    #[must_use]
    pub fn new(target: Option<NodeId>, resolve_info: Option<String>) -> Self {
        Self {
            resolve_info,
            target,
        }
    }

    /// Add resolve info.
    #[must_use]
    pub fn with_resolve_info(mut self, resolve_info: impl Into<String>) -> Self {
        self.resolve_info = Some(resolve_info.into());
        self
    }

    /// An entry carries neither target nor resolve info.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.target.is_none() && self.resolve_info.is_none()
    }
}

/// A detached node together with all its descendants.
///
/// Nodes are kept in depth-first order, root first. Used for nodes entering
/// the model (added children, annotations, partitions) and for nodes leaving
/// it (deleted or replaced ones).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtree {
    nodes: Vec<Node>,
}

impl Subtree {
    /// A subtree consisting of a single node without descendants.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::InvalidChunk`] if the node owns children or
    /// annotations, which would be missing from the subtree.
    pub fn single(node: Node) -> Result<Self> {
        Self::from_nodes(vec![node])
    }

    /// Assemble a subtree from an unordered set of nodes.
    ///
    /// The root is the one node not owned by any other node of the set.
    /// Parent links of all descendants are set from ownership.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::InvalidChunk`] if the set has no unique root,
    /// owns a node that is missing, or owns a node twice, and
    /// [`DeltaError::DuplicateNode`] if an id occurs twice.
    pub fn from_nodes(nodes: Vec<Node>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(nodes.len());
        for node in nodes {
            let id = node.id.clone();
            if by_id.insert(id.clone(), node).is_some() {
                return Err(DeltaError::DuplicateNode(id));
            }
        }

        let mut owned = HashSet::new();
        for node in by_id.values() {
            for child in node.owned() {
                if !by_id.contains_key(child) {
                    return Err(DeltaError::InvalidChunk(format!(
                        "node {} owns {child}, which is not part of the subtree",
                        node.id
                    )));
                }
                if !owned.insert(child.clone()) {
                    return Err(DeltaError::InvalidChunk(format!(
                        "node {child} is owned more than once"
                    )));
                }
            }
        }

        let mut roots = by_id.keys().filter(|id| !owned.contains(*id));
        let root = match (roots.next(), roots.next()) {
            (Some(root), None) => root.clone(),
            (None, _) => {
                return Err(DeltaError::InvalidChunk(
                    "subtree has no root".to_string(),
                ))
            }
            (Some(a), Some(b)) => {
                return Err(DeltaError::InvalidChunk(format!(
                    "subtree has more than one root: {a}, {b}"
                )))
            }
        };

        let ordered = depth_first(&root, |id| by_id.get(id));
        if ordered.len() != by_id.len() {
            return Err(DeltaError::InvalidChunk(
                "subtree contains an ownership cycle".to_string(),
            ));
        }

        let mut parents: HashMap<NodeId, NodeId> = HashMap::new();
        for node in by_id.values() {
            for child in node.owned() {
                parents.insert(child.clone(), node.id.clone());
            }
        }

        let nodes = ordered
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .map(|mut node| {
                if let Some(parent) = parents.remove(&node.id) {
                    node.parent = Some(parent);
                }
                node
            })
            .collect();

        Ok(Self { nodes })
    }

    pub(crate) fn from_ordered(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Id of the root node.
    #[must_use]
    pub fn root(&self) -> &NodeId {
        &self.nodes[0].id
    }

    /// The root node.
    #[must_use]
    pub fn root_node(&self) -> &Node {
        &self.nodes[0]
    }

    /// All nodes, root first.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Ids of all nodes except the root, in depth-first order.
    #[must_use]
    pub fn descendant_ids(&self) -> Vec<NodeId> {
        self.nodes[1..].iter().map(|node| node.id.clone()).collect()
    }

    /// Number of nodes including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a subtree has at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Take the nodes, root first.
    #[must_use]
    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}

/// Ids reachable from `root` via ownership, depth-first, root first.
pub(crate) fn depth_first<'a>(
    root: &NodeId,
    lookup: impl Fn(&NodeId) -> Option<&'a Node>,
) -> Vec<NodeId> {
    let mut ordered = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![root.clone()];

    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        if let Some(node) = lookup(&id) {
            let owned: Vec<_> = node.owned().cloned().collect();
            stack.extend(owned.into_iter().rev());
        }
        ordered.push(id);
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{Classifier, DataType, Feature, Language, MetaPointer};
    use crate::types::TypeRegistry;

    fn handles() -> (CompressedMetaPointer, CompressedMetaPointer, CompressedMetaPointer) {
        let language = Language::new("t", "1", "T").with_classifier(
            Classifier::concept("Box", "Box")
                .with_feature(Feature::property("Box-label", "label", DataType::String))
                .with_feature(Feature::containment("Box-items", "items", true)),
        );
        let types = TypeRegistry::new().with_language(&language).unwrap();
        let compress = |key: &str| types.compress(&MetaPointer::new("t", "1", key)).unwrap();
        (compress("Box"), compress("Box-label"), compress("Box-items"))
    }

    #[test]
    fn subtree_orders_root_first_and_links_parents() {
        let (class, label, items) = handles();
        let leaf = Node::new("leaf", class).with_property(label, "leaf");
        let middle = Node::new("middle", class).with_child(items, "leaf");
        let root = Node::new("root", class).with_child(items, "middle");

        let subtree = Subtree::from_nodes(vec![leaf, root, middle]).unwrap();

        assert_eq!(subtree.root(), &NodeId::from("root"));
        assert_eq!(
            subtree.descendant_ids(),
            vec![NodeId::from("middle"), NodeId::from("leaf")]
        );
        assert_eq!(subtree.nodes()[2].parent, Some(NodeId::from("middle")));
    }

    #[test]
    fn subtree_rejects_missing_child() {
        let (class, _, items) = handles();
        let root = Node::new("root", class).with_child(items, "ghost");

        assert!(matches!(
            Subtree::single(root),
            Err(DeltaError::InvalidChunk(_))
        ));
    }

    #[test]
    fn subtree_rejects_two_roots() {
        let (class, _, _) = handles();
        let err =
            Subtree::from_nodes(vec![Node::new("a", class), Node::new("b", class)]).unwrap_err();
        assert!(matches!(err, DeltaError::InvalidChunk(_)));
    }

    #[test]
    fn finds_child_positions() {
        let (class, _, items) = handles();
        let node = Node::new("p", class)
            .with_child(items, "a")
            .with_child(items, "b")
            .with_child(items, "c");

        assert_eq!(node.find_child(&NodeId::from("c")), Some((items, 2)));
        assert_eq!(node.child_index(items, &NodeId::from("x")), None);
    }
}
