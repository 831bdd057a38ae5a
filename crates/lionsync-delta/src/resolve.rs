//! Conversions between wire and local forms shared by the mappers.

use lionsync_core::{
    Change, CompressedMetaPointer, DeltaError, DeltaSerializationChunk, MetaPointer, NodeId,
    PropertyValue, ReferenceTarget, Registry, Result, Subtree, SubtreeCodec, TypeRegistry,
};

/// Resolves meta pointers, values and chunks against one registry.
pub(crate) struct Resolver<'a, C: ?Sized> {
    registry: &'a Registry,
    codec: &'a C,
}

impl<'a, C: SubtreeCodec + ?Sized> Resolver<'a, C> {
    pub(crate) fn new(registry: &'a Registry, codec: &'a C) -> Self {
        Self { registry, codec }
    }

    pub(crate) fn classifier(&self, pointer: &MetaPointer) -> Result<CompressedMetaPointer> {
        Ok(self.registry.types().classifier(pointer)?.id)
    }

    pub(crate) fn property(&self, pointer: &MetaPointer) -> Result<CompressedMetaPointer> {
        Ok(self.registry.types().property(pointer)?.id)
    }

    pub(crate) fn containment(&self, pointer: &MetaPointer) -> Result<CompressedMetaPointer> {
        Ok(self.registry.types().containment(pointer)?.id)
    }

    pub(crate) fn reference(&self, pointer: &MetaPointer) -> Result<CompressedMetaPointer> {
        Ok(self.registry.types().reference(pointer)?.id)
    }

    /// Resolve a property pointer and convert a wire value for it.
    pub(crate) fn value(
        &self,
        property: &MetaPointer,
        raw: &str,
    ) -> Result<(CompressedMetaPointer, PropertyValue)> {
        let info = self.registry.types().property(property)?;
        let data_type = info.data_type().ok_or_else(|| DeltaError::FeatureKindMismatch {
            pointer: property.clone(),
            expected: "property",
        })?;
        Ok((info.id, PropertyValue::from_wire(property, data_type, raw)?))
    }

    /// Materialize a chunk against the nodes known so far.
    pub(crate) fn subtree(&self, chunk: &DeltaSerializationChunk) -> Result<Subtree> {
        self.codec.deserialize(self.registry.types(), chunk, self.registry.nodes())
    }
}

/// A wire entry as a reference target; at least one half must be present.
pub(crate) fn entry(
    target: Option<&NodeId>,
    resolve_info: Option<&String>,
) -> Result<ReferenceTarget> {
    let entry = ReferenceTarget::new(target.cloned(), resolve_info.cloned());
    if entry.is_empty() {
        return Err(DeltaError::MissingValue("reference target or resolve info"));
    }
    Ok(entry)
}

/// Reject a planned change whose variant differs from the one the message named.
pub(crate) fn expect_kind(change: Change, expected: &'static str) -> Result<Change> {
    if change.kind() == expected {
        Ok(change)
    } else {
        Err(DeltaError::InvalidMove(format!(
            "message names {expected} but the current state calls for {}",
            change.kind()
        )))
    }
}

/// Turns local handles and subtrees back into wire form.
pub(crate) struct Encoder<'a, C: ?Sized> {
    types: &'a TypeRegistry,
    codec: &'a C,
}

impl<'a, C: SubtreeCodec + ?Sized> Encoder<'a, C> {
    pub(crate) fn new(types: &'a TypeRegistry, codec: &'a C) -> Self {
        Self { types, codec }
    }

    pub(crate) fn pointer(&self, handle: CompressedMetaPointer) -> MetaPointer {
        self.types.pointer(handle).clone()
    }

    pub(crate) fn chunk(&self, subtree: &Subtree) -> Result<DeltaSerializationChunk> {
        self.codec.serialize(self.types, subtree)
    }
}
