//! Resolution registry: node ids to live nodes, meta pointers to types.

use crate::error::{DeltaError, Result};
use crate::ids::NodeId;
use crate::node::{depth_first, Node, Subtree};
use crate::types::{ClassifierInfo, CompressedMetaPointer, FeatureInfo, TypeRegistry};
use std::collections::HashMap;
use std::sync::Arc;

/// Arena of all nodes known to a forest, keyed by id.
///
/// Grows as subtrees are attached and shrinks only when the forest removes
/// a subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRegistry {
    nodes: HashMap<NodeId, Node>,
}

impl NodeRegistry {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a node id.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::UnknownNode`] if the id is not registered.
    pub fn get(&self, id: &NodeId) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| DeltaError::UnknownNode(id.clone()))
    }

    /// Look up a node id without failing.
    #[must_use]
    pub fn find(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Whether a node id is registered.
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of registered nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if no node is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Copy a node and all its descendants out of the arena.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::UnknownNode`] if the root or any owned node is
    /// not registered.
    pub fn collect_subtree(&self, root: &NodeId) -> Result<Subtree> {
        let ids = depth_first(root, |id| self.nodes.get(id));
        let nodes = ids
            .iter()
            .map(|id| self.get(id).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(Subtree::from_ordered(nodes))
    }

    /// Whether `ancestor` is `node` itself or one of its ancestors.
    #[must_use]
    pub fn is_ancestor_or_self(&self, ancestor: &NodeId, node: &NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id).and_then(|n| n.parent.as_ref());
        }
        false
    }

    pub(crate) fn get_mut(&mut self, id: &NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| DeltaError::UnknownNode(id.clone()))
    }

    /// Fail if any node of the subtree is already registered.
    pub(crate) fn check_vacant(&self, subtree: &Subtree) -> Result<()> {
        match subtree.nodes().iter().find(|node| self.contains(&node.id)) {
            Some(node) => Err(DeltaError::DuplicateNode(node.id.clone())),
            None => Ok(()),
        }
    }

    /// Register a detached subtree under `parent`.
    pub(crate) fn insert_subtree(
        &mut self,
        subtree: Subtree,
        parent: Option<NodeId>,
    ) -> Result<()> {
        self.check_vacant(&subtree)?;
        let mut nodes = subtree.into_nodes().into_iter();
        if let Some(mut root) = nodes.next() {
            root.parent = parent;
            self.nodes.insert(root.id.clone(), root);
        }
        for node in nodes {
            self.nodes.insert(node.id.clone(), node);
        }
        Ok(())
    }

    /// Unregister a node and all its descendants.
    ///
    /// The caller detaches the root from its parent.
    pub(crate) fn remove_subtree(&mut self, root: &NodeId) -> Result<Subtree> {
        self.get(root)?;
        let ids = depth_first(root, |id| self.nodes.get(id));
        let nodes = ids
            .iter()
            .filter_map(|id| self.nodes.remove(id))
            .collect();
        Ok(Subtree::from_ordered(nodes))
    }
}

/// Where a child sits within its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildLocation {
    /// Containing node
    pub parent: NodeId,
    /// Containment holding the child
    pub containment: CompressedMetaPointer,
    /// Position within the containment
    pub index: usize,
}

/// Where an annotation sits within its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationLocation {
    /// Annotated node
    pub parent: NodeId,
    /// Position among the parent's annotations
    pub index: usize,
}

/// The resolution registry consulted by every mapper.
///
/// Combines the node arena with the shared, immutable type registry.
#[derive(Debug, Clone)]
pub struct Registry {
    types: Arc<TypeRegistry>,
    nodes: NodeRegistry,
}

impl Registry {
    /// Create a registry without nodes.
    #[must_use]
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self {
            types,
            nodes: NodeRegistry::new(),
        }
    }

    /// The type registry.
    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Shared handle to the type registry.
    #[must_use]
    pub fn shared_types(&self) -> Arc<TypeRegistry> {
        Arc::clone(&self.types)
    }

    /// The node arena.
    #[must_use]
    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut NodeRegistry {
        &mut self.nodes
    }

    pub(crate) fn replace_nodes(&mut self, nodes: NodeRegistry) {
        self.nodes = nodes;
    }

    /// Resolve a node id.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::UnknownNode`] if the id is not registered.
    pub fn node(&self, id: &NodeId) -> Result<&Node> {
        self.nodes.get(id)
    }

    /// Classifier behind a handle.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::FeatureKindMismatch`] if the handle names a feature.
    ///
    /// # Panics
    ///
    /// Panics if the handle was issued by a different type registry.
    pub fn classifier(&self, id: CompressedMetaPointer) -> Result<&ClassifierInfo> {
        self.types
            .classifier_info(id)
            .ok_or_else(|| DeltaError::FeatureKindMismatch {
                pointer: self.types.pointer(id).clone(),
                expected: "classifier",
            })
    }

    /// Property behind a handle.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::FeatureKindMismatch`] if the handle names
    /// anything but a property.
    ///
    /// # Panics
    ///
    /// Panics if the handle was issued by a different type registry.
    pub fn property(&self, id: CompressedMetaPointer) -> Result<&FeatureInfo> {
        self.feature_of_kind(id, "property")
    }

    /// Containment behind a handle.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::FeatureKindMismatch`] if the handle names
    /// anything but a containment.
    ///
    /// # Panics
    ///
    /// Panics if the handle was issued by a different type registry.
    pub fn containment(&self, id: CompressedMetaPointer) -> Result<&FeatureInfo> {
        self.feature_of_kind(id, "containment")
    }

    /// Reference behind a handle.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::FeatureKindMismatch`] if the handle names
    /// anything but a reference.
    ///
    /// # Panics
    ///
    /// Panics if the handle was issued by a different type registry.
    pub fn reference(&self, id: CompressedMetaPointer) -> Result<&FeatureInfo> {
        self.feature_of_kind(id, "reference")
    }

    fn feature_of_kind(
        &self,
        id: CompressedMetaPointer,
        expected: &'static str,
    ) -> Result<&FeatureInfo> {
        self.types
            .feature_info(id)
            .filter(|info| info.kind.name() == expected)
            .ok_or_else(|| DeltaError::FeatureKindMismatch {
                pointer: self.types.pointer(id).clone(),
                expected,
            })
    }

    /// Fail unless the node's classifier declares the feature.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::FeatureNotApplicable`].
    pub fn check_applicable(&self, node: &Node, feature: &FeatureInfo) -> Result<()> {
        if self.types.declares(node.classifier, feature.id) {
            Ok(())
        } else {
            Err(DeltaError::FeatureNotApplicable {
                node: node.id.clone(),
                feature: feature.pointer.clone(),
            })
        }
    }

    /// Find the containment and position of a child by scanning its parent.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::UnknownNode`] if the child or its parent is not
    /// registered and [`DeltaError::NotContained`] if the child is a root or
    /// an annotation.
    pub fn locate_child(&self, child: &NodeId) -> Result<ChildLocation> {
        let node = self.node(child)?;
        let parent_id = node
            .parent
            .as_ref()
            .ok_or_else(|| DeltaError::NotContained(child.clone()))?;
        let parent = self.node(parent_id)?;
        let (containment, index) = parent
            .find_child(child)
            .ok_or_else(|| DeltaError::NotContained(child.clone()))?;
        Ok(ChildLocation {
            parent: parent_id.clone(),
            containment,
            index,
        })
    }

    /// Find the parent and position of an annotation by scanning its parent.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::UnknownNode`] if the annotation or its parent is
    /// not registered and [`DeltaError::NotContained`] if it is not attached
    /// as an annotation.
    pub fn locate_annotation(&self, annotation: &NodeId) -> Result<AnnotationLocation> {
        let node = self.node(annotation)?;
        let parent_id = node
            .parent
            .as_ref()
            .ok_or_else(|| DeltaError::NotContained(annotation.clone()))?;
        let index = self
            .node(parent_id)?
            .annotation_index(annotation)
            .ok_or_else(|| DeltaError::NotContained(annotation.clone()))?;
        Ok(AnnotationLocation {
            parent: parent_id.clone(),
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Library;

    #[test]
    fn locates_children_by_scanning() {
        let lib = Library::new();
        let registry = lib.registry_with_books(&["a", "b", "c"]);

        let location = registry.locate_child(&NodeId::from("c")).unwrap();

        assert_eq!(location.parent, NodeId::from("lib"));
        assert_eq!(location.containment, lib.books);
        assert_eq!(location.index, 2);
    }

    #[test]
    fn roots_are_not_contained() {
        let lib = Library::new();
        let registry = lib.registry_with_books(&["a"]);

        assert_eq!(
            registry.locate_child(&NodeId::from("lib")).unwrap_err(),
            DeltaError::NotContained(NodeId::from("lib"))
        );
        assert_eq!(
            registry.locate_child(&NodeId::from("zz")).unwrap_err(),
            DeltaError::UnknownNode(NodeId::from("zz"))
        );
    }

    #[test]
    fn ancestry_follows_parent_links() {
        let lib = Library::new();
        let registry = lib.registry_with_books(&["a"]);
        let nodes = registry.nodes();

        assert!(nodes.is_ancestor_or_self(&NodeId::from("lib"), &NodeId::from("a")));
        assert!(nodes.is_ancestor_or_self(&NodeId::from("a"), &NodeId::from("a")));
        assert!(!nodes.is_ancestor_or_self(&NodeId::from("a"), &NodeId::from("lib")));
    }

    #[test]
    fn subtree_insert_and_remove_are_symmetric() {
        let lib = Library::new();
        let mut registry = lib.registry_with_books(&[]);
        let subtree = lib.book_with_chapters("b1", &["c1", "c2"]);

        registry
            .nodes_mut()
            .insert_subtree(subtree.clone(), Some(NodeId::from("lib")))
            .unwrap();
        assert_eq!(registry.nodes().len(), 6);

        let removed = registry.nodes_mut().remove_subtree(&NodeId::from("b1")).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(removed.descendant_ids(), subtree.descendant_ids());
        assert_eq!(registry.nodes().len(), 3);
    }

    #[test]
    fn insert_rejects_taken_ids() {
        let lib = Library::new();
        let mut registry = lib.registry_with_books(&["b1"]);
        let err = registry
            .nodes_mut()
            .insert_subtree(lib.book_with_chapters("b1", &[]), None)
            .unwrap_err();
        assert_eq!(err, DeltaError::DuplicateNode(NodeId::from("b1")));
    }
}
