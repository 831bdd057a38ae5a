//! Every command, applied to a forest and published back, comes out as the
//! command that went in.

use lionsync_core::test_support::{pointer, Library};
use lionsync_core::{
    ChunkCodec, Forest, NodeId, ParticipationId, PrefixedCommandIds, ReferenceTarget,
};
use lionsync_delta::{ApplyMapper, PublishMapper};
use lionsync_proto::{CommandKind, SingleCommand};
use std::collections::BTreeSet;

/// Library with
/// - books `[a, b, c, d]`, `d` holding chapters `[d1, d2, d3]`
/// - archive `[x, e]`, `e` holding chapters `[e1, e2]`
/// - annotations `a: [n1, n2, n3]`, `b: [m1]`
/// - references `a.related: [lib-w1, lib-w2, b]`, `a.cited: [c]`, `b.related: [d]`,
///   `c.related: [d1 "first", "elsewhere"]`
/// - a second partition `other`
fn repository(lib: &Library) -> Forest {
    let id = NodeId::from;
    let mut forest = lib.forest_with_books(&["a", "b", "c"]);
    forest
        .add_child(&id("lib"), lib.books, 3, lib.book_with_chapters("d", &["d1", "d2", "d3"]))
        .unwrap();
    forest.add_child(&id("lib"), lib.archive, 0, lib.book("x", "x")).unwrap();
    forest
        .add_child(&id("lib"), lib.archive, 1, lib.book_with_chapters("e", &["e1", "e2"]))
        .unwrap();
    for (index, note) in ["n1", "n2", "n3"].into_iter().enumerate() {
        forest.add_annotation(&id("a"), index, lib.comment(note, note)).unwrap();
    }
    forest.add_annotation(&id("b"), 0, lib.comment("m1", "m1")).unwrap();
    for (index, target) in ["lib-w1", "lib-w2", "b"].into_iter().enumerate() {
        forest.add_reference(&id("a"), lib.related, index, lib.entry(target)).unwrap();
    }
    forest.add_reference(&id("a"), lib.cited, 0, lib.entry("c")).unwrap();
    forest.add_reference(&id("b"), lib.related, 0, lib.entry("d")).unwrap();
    forest
        .add_reference(
            &id("c"),
            lib.related,
            0,
            ReferenceTarget::to("d1").with_resolve_info("first"),
        )
        .unwrap();
    forest
        .add_reference(
            &id("c"),
            lib.related,
            1,
            ReferenceTarget::new(None, Some("elsewhere".into())),
        )
        .unwrap();
    forest.add_partition(lib.partition_with_books("other", &[])).unwrap();
    forest
}

#[allow(clippy::too_many_lines)]
fn commands(lib: &Library) -> Vec<CommandKind> {
    let related = || pointer("Book-related");
    let cited = || pointer("Book-cited");
    vec![
        CommandKind::AddPartition {
            new_partition: lib.chunk(&lib.partition_with_books("fresh", &[])),
        },
        CommandKind::DeletePartition {
            deleted_partition: "other".into(),
        },
        CommandKind::ChangeClassifier {
            node: "lib-w1".into(),
            new_classifier: pointer("Book"),
        },
        CommandKind::AddProperty {
            node: "a".into(),
            property: pointer("Book-pages"),
            new_value: "12".into(),
        },
        CommandKind::DeleteProperty {
            node: "a".into(),
            property: pointer("Book-title"),
        },
        CommandKind::ChangeProperty {
            node: "a".into(),
            property: pointer("Book-title"),
            new_value: "Emma".into(),
        },
        CommandKind::AddChild {
            parent: "lib".into(),
            new_child: lib.chunk(&lib.book("f", "F")),
            containment: pointer("Library-books"),
            index: 1,
        },
        CommandKind::DeleteChild {
            parent: "lib".into(),
            containment: pointer("Library-archive"),
            index: 0,
            deleted_child: "x".into(),
        },
        CommandKind::ReplaceChild {
            new_child: lib.chunk(&lib.book_with_chapters("g", &["g1"])),
            parent: "lib".into(),
            containment: pointer("Library-archive"),
            index: 0,
            replaced_child: "x".into(),
        },
        CommandKind::MoveChildFromOtherContainment {
            new_parent: "a".into(),
            new_containment: pointer("Book-chapters"),
            new_index: 0,
            moved_child: "d3".into(),
        },
        CommandKind::MoveChildFromOtherContainmentInSameParent {
            new_containment: pointer("Library-archive"),
            new_index: 0,
            moved_child: "c".into(),
        },
        CommandKind::MoveChildInSameContainment {
            new_index: 0,
            moved_child: "c".into(),
        },
        CommandKind::MoveAndReplaceChildFromOtherContainment {
            new_parent: "e".into(),
            new_containment: pointer("Book-chapters"),
            new_index: 0,
            replaced_child: "e1".into(),
            moved_child: "d3".into(),
        },
        CommandKind::MoveAndReplaceChildFromOtherContainmentInSameParent {
            new_containment: pointer("Library-archive"),
            new_index: 0,
            replaced_child: "x".into(),
            moved_child: "c".into(),
        },
        CommandKind::MoveAndReplaceChildInSameContainment {
            new_index: 0,
            replaced_child: "a".into(),
            moved_child: "c".into(),
        },
        CommandKind::AddAnnotation {
            parent: "c".into(),
            new_annotation: lib.chunk(&lib.comment("k", "kept")),
            index: 0,
        },
        CommandKind::DeleteAnnotation {
            parent: "a".into(),
            index: 1,
            deleted_annotation: "n2".into(),
        },
        CommandKind::ReplaceAnnotation {
            new_annotation: lib.chunk(&lib.comment("k", "kept")),
            parent: "a".into(),
            index: 0,
            replaced_annotation: "n1".into(),
        },
        CommandKind::MoveAnnotationFromOtherParent {
            new_parent: "b".into(),
            new_index: 0,
            moved_annotation: "n3".into(),
        },
        CommandKind::MoveAnnotationInSameParent {
            new_index: 0,
            moved_annotation: "n3".into(),
        },
        CommandKind::MoveAndReplaceAnnotationFromOtherParent {
            new_parent: "b".into(),
            new_index: 0,
            replaced_annotation: "m1".into(),
            moved_annotation: "n3".into(),
        },
        CommandKind::MoveAndReplaceAnnotationInSameParent {
            new_index: 0,
            replaced_annotation: "n1".into(),
            moved_annotation: "n3".into(),
        },
        CommandKind::AddReference {
            parent: "c".into(),
            reference: cited(),
            index: 0,
            new_target: Some("b".into()),
            new_resolve_info: Some("B".into()),
        },
        CommandKind::DeleteReference {
            parent: "a".into(),
            reference: related(),
            index: 0,
        },
        CommandKind::ChangeReference {
            parent: "a".into(),
            reference: related(),
            index: 0,
            new_target: Some("c".into()),
            new_resolve_info: None,
        },
        CommandKind::MoveEntryFromOtherReference {
            new_parent: "b".into(),
            new_reference: related(),
            new_index: 0,
            old_parent: "a".into(),
            old_reference: related(),
            old_index: 2,
        },
        CommandKind::MoveEntryFromOtherReferenceInSameParent {
            parent: "a".into(),
            new_reference: cited(),
            new_index: 0,
            old_reference: related(),
            old_index: 2,
        },
        CommandKind::MoveEntryInSameReference {
            parent: "a".into(),
            reference: related(),
            new_index: 0,
            old_index: 2,
        },
        CommandKind::MoveAndReplaceEntryFromOtherReference {
            new_parent: "b".into(),
            new_reference: related(),
            new_index: 0,
            old_parent: "a".into(),
            old_reference: related(),
            old_index: 2,
        },
        CommandKind::MoveAndReplaceEntryFromOtherReferenceInSameParent {
            parent: "a".into(),
            new_reference: cited(),
            new_index: 0,
            old_reference: related(),
            old_index: 2,
        },
        CommandKind::MoveAndReplaceEntryInSameReference {
            parent: "a".into(),
            reference: related(),
            new_index: 0,
            old_index: 2,
        },
        CommandKind::AddReferenceResolveInfo {
            parent: "a".into(),
            reference: related(),
            index: 0,
            new_resolve_info: "first writer".into(),
        },
        CommandKind::DeleteReferenceResolveInfo {
            parent: "c".into(),
            reference: related(),
            index: 0,
        },
        CommandKind::ChangeReferenceResolveInfo {
            parent: "c".into(),
            reference: related(),
            index: 0,
            new_resolve_info: "renamed".into(),
        },
        CommandKind::AddReferenceTarget {
            parent: "c".into(),
            reference: related(),
            index: 1,
            new_target: "d2".into(),
        },
        CommandKind::DeleteReferenceTarget {
            parent: "c".into(),
            reference: related(),
            index: 0,
        },
        CommandKind::ChangeReferenceTarget {
            parent: "c".into(),
            reference: related(),
            index: 0,
            new_target: "d2".into(),
        },
    ]
}

#[test]
fn every_command_publishes_back_unchanged() {
    let lib = Library::new();
    let apply = ApplyMapper::new(ChunkCodec);
    let publish = PublishMapper::new(PrefixedCommandIds::new("echo"), ChunkCodec);
    let participation = ParticipationId::from("client");
    let mut kinds = BTreeSet::new();

    for command in commands(&lib) {
        let name = command.kind();
        let mut forest = repository(&lib);

        let event = apply
            .map(forest.registry(), &participation, &SingleCommand::new("c1", command.clone()))
            .unwrap_or_else(|error| panic!("{name} was rejected: {error}"));
        forest
            .apply(&event)
            .unwrap_or_else(|error| panic!("{name} did not apply: {error}"));
        let published = publish.map(forest.types(), &event).unwrap();

        assert_eq!(published.kind, command, "{name}");
        kinds.insert(name);
    }

    assert_eq!(kinds.len(), 37, "one case per command variant");
}

#[test]
fn removing_a_referenced_node_is_rejected_before_mapping_succeeds() {
    let lib = Library::new();
    let forest = repository(&lib);

    let result = ApplyMapper::new(ChunkCodec).map(
        forest.registry(),
        &ParticipationId::from("client"),
        &SingleCommand::new(
            "c1",
            CommandKind::DeleteChild {
                parent: "d".into(),
                containment: pointer("Book-chapters"),
                index: 0,
                deleted_child: "d1".into(),
            },
        ),
    );

    assert_eq!(
        result.unwrap_err(),
        lionsync_core::DeltaError::StillReferenced {
            node: "d1".into(),
            referrer: "c".into(),
        }
    );
}
