//! Language definitions: classifiers and their features.
//!
//! A language is plain data. It becomes usable for resolution once it is
//! registered with a [`TypeRegistry`](crate::types::TypeRegistry), which
//! interns every classifier and feature pointer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire identity of a classifier or feature: `(language, version, key)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetaPointer {
    /// Key of the defining language
    pub language: String,
    /// Version of the defining language
    pub version: String,
    /// Key of the classifier or feature within the language
    pub key: String,
}

impl MetaPointer {
    /// Create a new meta pointer.
    #[must_use]
    pub fn new(
        language: impl Into<String>,
        version: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into(),
            version: version.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for MetaPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.language, self.version, self.key)
    }
}

/// A language: a versioned, named set of classifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    /// Language key
    pub key: String,
    /// Language version
    pub version: String,
    /// Human readable name
    pub name: String,
    /// Classifiers defined by this language
    #[serde(default)]
    pub classifiers: Vec<Classifier>,
}

impl Language {
    /// Create an empty language.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        version: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            version: version.into(),
            name: name.into(),
            classifiers: Vec::new(),
        }
    }

    /// Add a classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifiers.push(classifier);
        self
    }

    /// Meta pointer for an element of this language.
    #[must_use]
    pub fn pointer(&self, key: &str) -> MetaPointer {
        MetaPointer::new(&self.key, &self.version, key)
    }
}

/// What kind of classifier an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClassifierKind {
    /// Instantiable node type
    Concept,
    /// Node type that can only be attached as an annotation
    Annotation,
    /// Abstract type, never instantiated
    Interface,
}

/// A node type and the features its instances carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classifier {
    /// Classifier key
    pub key: String,
    /// Human readable name
    pub name: String,
    /// Concept, annotation or interface
    pub kind: ClassifierKind,
    /// Whether instances may be partition roots
    #[serde(default)]
    pub partition: bool,
    /// Features declared by this classifier
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl Classifier {
    fn new(key: impl Into<String>, name: impl Into<String>, kind: ClassifierKind) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            kind,
            partition: false,
            features: Vec::new(),
        }
    }

    /// A concept.
    #[must_use]
    pub fn concept(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(key, name, ClassifierKind::Concept)
    }

    /// An annotation.
    #[must_use]
    pub fn annotation(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(key, name, ClassifierKind::Annotation)
    }

    /// An interface.
    #[must_use]
    pub fn interface(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(key, name, ClassifierKind::Interface)
    }

    /// Mark instances of this classifier as partition roots.
    #[must_use]
    pub fn partition(mut self) -> Self {
        self.partition = true;
        self
    }

    /// Add a feature.
    #[must_use]
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }
}

/// Primitive type of a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum DataType {
    /// `true` / `false`
    Boolean,
    /// Signed 64-bit integer
    Integer,
    /// Arbitrary text
    String,
    /// One of a fixed set of literal keys
    Enumeration {
        /// Keys of the allowed literals
        literals: Vec<String>,
    },
}

/// The three feature shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum FeatureKind {
    /// Primitive value slot
    #[serde(rename_all = "camelCase")]
    Property {
        /// Type of the value
        data_type: DataType,
    },
    /// Owned children
    Containment {
        /// Whether more than one child is allowed
        multiple: bool,
    },
    /// Non-owning links to other nodes
    Reference {
        /// Whether more than one entry is allowed
        multiple: bool,
    },
}

impl FeatureKind {
    /// Short name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            FeatureKind::Property { .. } => "property",
            FeatureKind::Containment { .. } => "containment",
            FeatureKind::Reference { .. } => "reference",
        }
    }
}

/// A property, containment or reference declared by a classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    /// Feature key
    pub key: String,
    /// Human readable name
    pub name: String,
    /// Property, containment or reference
    #[serde(flatten)]
    pub kind: FeatureKind,
}

impl Feature {
    /// A property of the given type.
    #[must_use]
    pub fn property(key: impl Into<String>, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            kind: FeatureKind::Property { data_type },
        }
    }

    /// A containment.
    #[must_use]
    pub fn containment(key: impl Into<String>, name: impl Into<String>, multiple: bool) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            kind: FeatureKind::Containment { multiple },
        }
    }

    /// A reference.
    #[must_use]
    pub fn reference(key: impl Into<String>, name: impl Into<String>, multiple: bool) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            kind: FeatureKind::Reference { multiple },
        }
    }
}
