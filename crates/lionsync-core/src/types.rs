//! Type registry: interns meta pointers and resolves them to classifiers and features.
//!
//! Wire messages identify types only by [`MetaPointer`]. The registry hands out
//! a [`CompressedMetaPointer`] for each registered classifier and feature;
//! nodes and partition events hold those handles and the registry turns them
//! back into wire pointers when serializing.

use crate::error::{DeltaError, Result};
use crate::language::{ClassifierKind, DataType, FeatureKind, Language, MetaPointer};
use std::collections::HashMap;
use std::fmt;

/// Interned handle of a registered classifier or feature.
///
/// Handles are only meaningful for the registry that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompressedMetaPointer(u32);

impl fmt::Display for CompressedMetaPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered classifier.
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Interned handle
    pub id: CompressedMetaPointer,
    /// Wire pointer
    pub pointer: MetaPointer,
    /// Human readable name
    pub name: String,
    /// Concept, annotation or interface
    pub kind: ClassifierKind,
    /// Whether instances may be partition roots
    pub partition: bool,
    /// Features declared by this classifier
    pub features: Vec<CompressedMetaPointer>,
}

/// A registered feature.
#[derive(Debug, Clone)]
pub struct FeatureInfo {
    /// Interned handle
    pub id: CompressedMetaPointer,
    /// Wire pointer
    pub pointer: MetaPointer,
    /// Human readable name
    pub name: String,
    /// Declaring classifier
    pub owner: CompressedMetaPointer,
    /// Property, containment or reference
    pub kind: FeatureKind,
}

impl FeatureInfo {
    /// Data type, if this is a property.
    #[must_use]
    pub fn data_type(&self) -> Option<&DataType> {
        match &self.kind {
            FeatureKind::Property { data_type } => Some(data_type),
            FeatureKind::Containment { .. } | FeatureKind::Reference { .. } => None,
        }
    }

    /// Whether a containment or reference accepts more than one entry.
    #[must_use]
    pub fn is_multiple(&self) -> bool {
        match self.kind {
            FeatureKind::Containment { multiple } | FeatureKind::Reference { multiple } => {
                multiple
            }
            FeatureKind::Property { .. } => false,
        }
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Classifier(ClassifierInfo),
    Feature(FeatureInfo),
}

/// Resolves meta pointers to classifiers and features of registered languages.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    entries: Vec<Entry>,
    index: HashMap<MetaPointer, CompressedMetaPointer>,
    languages: Vec<(String, String)>,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a language, returning the registry for chaining.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::DuplicateMetaPointer`] if any element of the
    /// language is already registered.
    pub fn with_language(mut self, language: &Language) -> Result<Self> {
        self.register(language)?;
        Ok(self)
    }

    /// Register all classifiers and features of a language.
    ///
    /// Registration is all-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::DuplicateMetaPointer`] if any element of the
    /// language is already registered or declared twice.
    pub fn register(&mut self, language: &Language) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for classifier in &language.classifiers {
            let keys = std::iter::once(&classifier.key)
                .chain(classifier.features.iter().map(|feature| &feature.key));
            for key in keys {
                let pointer = language.pointer(key);
                if self.index.contains_key(&pointer) || !seen.insert(pointer.clone()) {
                    return Err(DeltaError::DuplicateMetaPointer(pointer));
                }
            }
        }

        for classifier in &language.classifiers {
            let classifier_id = self.next_id();
            let mut features = Vec::with_capacity(classifier.features.len());
            self.push(Entry::Classifier(ClassifierInfo {
                id: classifier_id,
                pointer: language.pointer(&classifier.key),
                name: classifier.name.clone(),
                kind: classifier.kind,
                partition: classifier.partition,
                features: Vec::new(),
            }));

            for feature in &classifier.features {
                let feature_id = self.next_id();
                features.push(feature_id);
                self.push(Entry::Feature(FeatureInfo {
                    id: feature_id,
                    pointer: language.pointer(&feature.key),
                    name: feature.name.clone(),
                    owner: classifier_id,
                    kind: feature.kind.clone(),
                }));
            }

            if let Some(Entry::Classifier(info)) = self.entries.get_mut(slot(classifier_id)) {
                info.features = features;
            }
        }

        self.languages
            .push((language.key.clone(), language.version.clone()));
        tracing::debug!(
            language = %language.key,
            version = %language.version,
            classifiers = language.classifiers.len(),
            "Registered language"
        );
        Ok(())
    }

    /// Whether a language version is registered.
    #[must_use]
    pub fn knows_language(&self, key: &str, version: &str) -> bool {
        self.languages
            .iter()
            .any(|(k, v)| k == key && v == version)
    }

    /// Look up the handle of a registered pointer.
    #[must_use]
    pub fn compress(&self, pointer: &MetaPointer) -> Option<CompressedMetaPointer> {
        self.index.get(pointer).copied()
    }

    /// Recover the wire pointer of a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle was issued by a different registry.
    #[must_use]
    pub fn pointer(&self, id: CompressedMetaPointer) -> &MetaPointer {
        match &self.entries[slot(id)] {
            Entry::Classifier(info) => &info.pointer,
            Entry::Feature(info) => &info.pointer,
        }
    }

    /// Classifier behind a handle, if the handle names a classifier.
    #[must_use]
    pub fn classifier_info(&self, id: CompressedMetaPointer) -> Option<&ClassifierInfo> {
        match self.entries.get(slot(id)) {
            Some(Entry::Classifier(info)) => Some(info),
            _ => None,
        }
    }

    /// Feature behind a handle, if the handle names a feature.
    #[must_use]
    pub fn feature_info(&self, id: CompressedMetaPointer) -> Option<&FeatureInfo> {
        match self.entries.get(slot(id)) {
            Some(Entry::Feature(info)) => Some(info),
            _ => None,
        }
    }

    /// Resolve a classifier pointer.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::UnknownClassifier`] if the pointer is not
    /// registered and [`DeltaError::FeatureKindMismatch`] if it names a feature.
    pub fn classifier(&self, pointer: &MetaPointer) -> Result<&ClassifierInfo> {
        let id = self
            .compress(pointer)
            .ok_or_else(|| DeltaError::UnknownClassifier(pointer.clone()))?;
        self.classifier_info(id)
            .ok_or_else(|| DeltaError::FeatureKindMismatch {
                pointer: pointer.clone(),
                expected: "classifier",
            })
    }

    /// Resolve a property pointer.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::UnknownFeature`] if the pointer is not registered
    /// and [`DeltaError::FeatureKindMismatch`] if it is not a property.
    pub fn property(&self, pointer: &MetaPointer) -> Result<&FeatureInfo> {
        self.feature_of_kind(pointer, "property")
    }

    /// Resolve a containment pointer.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::UnknownFeature`] if the pointer is not registered
    /// and [`DeltaError::FeatureKindMismatch`] if it is not a containment.
    pub fn containment(&self, pointer: &MetaPointer) -> Result<&FeatureInfo> {
        self.feature_of_kind(pointer, "containment")
    }

    /// Resolve a reference pointer.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::UnknownFeature`] if the pointer is not registered
    /// and [`DeltaError::FeatureKindMismatch`] if it is not a reference.
    pub fn reference(&self, pointer: &MetaPointer) -> Result<&FeatureInfo> {
        self.feature_of_kind(pointer, "reference")
    }

    /// Whether a classifier declares a feature.
    #[must_use]
    pub fn declares(
        &self,
        classifier: CompressedMetaPointer,
        feature: CompressedMetaPointer,
    ) -> bool {
        self.classifier_info(classifier)
            .is_some_and(|info| info.features.contains(&feature))
    }

    /// Number of registered classifiers and features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn feature_of_kind(
        &self,
        pointer: &MetaPointer,
        expected: &'static str,
    ) -> Result<&FeatureInfo> {
        let id = self
            .compress(pointer)
            .ok_or_else(|| DeltaError::UnknownFeature(pointer.clone()))?;
        self.feature_info(id)
            .filter(|info| info.kind.name() == expected)
            .ok_or_else(|| DeltaError::FeatureKindMismatch {
                pointer: pointer.clone(),
                expected,
            })
    }

    fn next_id(&self) -> CompressedMetaPointer {
        CompressedMetaPointer(u32::try_from(self.entries.len()).unwrap_or(u32::MAX))
    }

    fn push(&mut self, entry: Entry) {
        let (id, pointer) = match &entry {
            Entry::Classifier(info) => (info.id, info.pointer.clone()),
            Entry::Feature(info) => (info.id, info.pointer.clone()),
        };
        self.index.insert(pointer, id);
        self.entries.push(entry);
    }
}

fn slot(id: CompressedMetaPointer) -> usize {
    id.0 as usize
}
