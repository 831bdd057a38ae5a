//! Library fixture shared by unit and integration tests: a small language
//! and forests built from it.
#![allow(missing_docs, clippy::missing_panics_doc, clippy::must_use_candidate)]

use crate::forest::Forest;
use crate::language::{Classifier, DataType, Feature, Language, MetaPointer};
use crate::node::{Node, ReferenceTarget, Subtree};
use crate::registry::Registry;
use crate::serialization::{ChunkCodec, DeltaSerializationChunk, SubtreeCodec};
use crate::types::{CompressedMetaPointer, TypeRegistry};
use std::sync::Arc;

/// Wire pointer of a library language element.
pub fn pointer(key: &str) -> MetaPointer {
    MetaPointer::new("library", "1", key)
}

pub struct Library {
    pub types: Arc<TypeRegistry>,
    pub library: CompressedMetaPointer,
    pub book: CompressedMetaPointer,
    pub chapter: CompressedMetaPointer,
    pub writer: CompressedMetaPointer,
    pub comment: CompressedMetaPointer,
    pub name: CompressedMetaPointer,
    pub books: CompressedMetaPointer,
    pub archive: CompressedMetaPointer,
    pub authors: CompressedMetaPointer,
    pub title: CompressedMetaPointer,
    pub pages: CompressedMetaPointer,
    pub available: CompressedMetaPointer,
    pub chapters: CompressedMetaPointer,
    pub author: CompressedMetaPointer,
    pub related: CompressedMetaPointer,
    pub cited: CompressedMetaPointer,
    pub heading: CompressedMetaPointer,
    pub sections: CompressedMetaPointer,
    pub text: CompressedMetaPointer,
}

impl Library {
    pub fn language() -> Language {
        Language::new("library", "1", "Library")
            .with_classifier(
                Classifier::concept("Library", "Library")
                    .partition()
                    .with_feature(Feature::property("Library-name", "name", DataType::String))
                    .with_feature(Feature::containment("Library-books", "books", true))
                    .with_feature(Feature::containment("Library-archive", "archive", true))
                    .with_feature(Feature::containment("Library-authors", "authors", true)),
            )
            .with_classifier(
                Classifier::concept("Book", "Book")
                    .with_feature(Feature::property("Book-title", "title", DataType::String))
                    .with_feature(Feature::property("Book-pages", "pages", DataType::Integer))
                    .with_feature(Feature::property(
                        "Book-available",
                        "available",
                        DataType::Boolean,
                    ))
                    .with_feature(Feature::containment("Book-chapters", "chapters", true))
                    .with_feature(Feature::reference("Book-author", "author", false))
                    .with_feature(Feature::reference("Book-related", "related", true))
                    .with_feature(Feature::reference("Book-cited", "cited", true)),
            )
            .with_classifier(
                Classifier::concept("Chapter", "Chapter")
                    .with_feature(Feature::property("Chapter-heading", "heading", DataType::String))
                    .with_feature(Feature::containment("Chapter-sections", "sections", true)),
            )
            .with_classifier(Classifier::concept("Writer", "Writer"))
            .with_classifier(
                Classifier::annotation("Comment", "Comment")
                    .with_feature(Feature::property("Comment-text", "text", DataType::String)),
            )
    }

    pub fn new() -> Self {
        let types = TypeRegistry::new()
            .with_language(&Self::language())
            .expect("library language registers");
        let handle =
            |key: &str| types.compress(&pointer(key)).expect("declared in the library language");

        Self {
            library: handle("Library"),
            book: handle("Book"),
            chapter: handle("Chapter"),
            writer: handle("Writer"),
            comment: handle("Comment"),
            name: handle("Library-name"),
            books: handle("Library-books"),
            archive: handle("Library-archive"),
            authors: handle("Library-authors"),
            title: handle("Book-title"),
            pages: handle("Book-pages"),
            available: handle("Book-available"),
            chapters: handle("Book-chapters"),
            author: handle("Book-author"),
            related: handle("Book-related"),
            cited: handle("Book-cited"),
            heading: handle("Chapter-heading"),
            sections: handle("Chapter-sections"),
            text: handle("Comment-text"),
            types: Arc::new(types),
        }
    }

    pub fn book(&self, id: &str, title: &str) -> Subtree {
        Subtree::single(Node::new(id, self.book).with_property(self.title, title))
            .expect("single node")
    }

    /// A book titled after its id with the given chapters.
    pub fn book_with_chapters(&self, id: &str, chapters: &[&str]) -> Subtree {
        let mut book = Node::new(id, self.book).with_property(self.title, id);
        let mut nodes = Vec::new();
        for chapter in chapters {
            book = book.with_child(self.chapters, *chapter);
            nodes.push(Node::new(*chapter, self.chapter).with_property(self.heading, *chapter));
        }
        nodes.insert(0, book);
        Subtree::from_nodes(nodes).expect("well-formed book")
    }

    pub fn writer(&self, id: &str) -> Subtree {
        Subtree::single(Node::new(id, self.writer)).expect("single node")
    }

    pub fn comment(&self, id: &str, text: &str) -> Subtree {
        Subtree::single(Node::new(id, self.comment).with_property(self.text, text))
            .expect("single node")
    }

    /// Partition `id` named "City Library", holding one book per id, each
    /// titled after its id, and the writers `{id}-w1` and `{id}-w2`.
    pub fn partition_with_books(&self, id: &str, books: &[&str]) -> Subtree {
        let mut root = Node::new(id, self.library)
            .with_property(self.name, "City Library")
            .with_child(self.authors, format!("{id}-w1"))
            .with_child(self.authors, format!("{id}-w2"));
        let mut nodes = vec![
            Node::new(format!("{id}-w1"), self.writer),
            Node::new(format!("{id}-w2"), self.writer),
        ];
        for book in books {
            root = root.with_child(self.books, *book);
            nodes.push(Node::new(*book, self.book).with_property(self.title, *book));
        }
        nodes.insert(0, root);
        Subtree::from_nodes(nodes).expect("well-formed partition")
    }

    /// Registry holding the partition `lib`, see [`Library::partition_with_books`].
    pub fn registry_with_books(&self, books: &[&str]) -> Registry {
        let mut registry = Registry::new(Arc::clone(&self.types));
        registry
            .nodes_mut()
            .insert_subtree(self.partition_with_books("lib", books), None)
            .expect("partition ids are fresh");
        registry
    }

    /// Forest with the single partition `lib`, see [`Library::partition_with_books`].
    pub fn forest_with_books(&self, books: &[&str]) -> Forest {
        let mut forest = Forest::new(Arc::clone(&self.types));
        forest
            .add_partition(self.partition_with_books("lib", books))
            .expect("partition is valid");
        forest
    }

    /// Serialize a detached subtree.
    pub fn chunk(&self, subtree: &Subtree) -> DeltaSerializationChunk {
        ChunkCodec
            .serialize(&self.types, subtree)
            .expect("fixture subtrees serialize")
    }

    pub fn entry(&self, target: &str) -> ReferenceTarget {
        ReferenceTarget::to(target)
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}
