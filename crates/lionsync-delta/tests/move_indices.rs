//! Every move variant, received as a command and replicated as an event,
//! reports the position the moved item actually had.

use lionsync_core::test_support::{pointer, Library};
use lionsync_core::{
    ChunkCodec, FixedParticipation, Forest, NodeId, PrefixedCommandIds, SequenceCounter,
};
use lionsync_delta::{CommandReceiver, EventSender};
use lionsync_proto::{CommandKind, DeltaCommand, EventKind, SingleCommand};
use std::cell::RefCell;
use std::rc::Rc;

/// Library with
/// - books `[a, b, c, d]`, `d` holding chapters `[d1, d2, d3]`
/// - archive `[x, e]`, `e` holding chapters `[e1, e2]`
/// - annotations `a: [n1, n2, n3]`, `b: [m1]`
/// - references `a.related: [lib-w1, lib-w2, b]`, `a.cited: [c]`, `b.related: [d]`
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
}

/// Receive `command` on a fresh repository and return the replicated event.
fn replicate(command: CommandKind) -> EventKind {
    let lib = Library::new();
    let mut forest = repository(&lib);
    let sender = EventSender::attach(
        &mut forest,
        FixedParticipation::new("repository"),
        SequenceCounter::new(),
        PrefixedCommandIds::new("repo"),
        ChunkCodec,
    );
    let sent = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&sent);
    sender.on_event(move |event| {
        sink.borrow_mut().push(event.event.parts()[0].kind.clone());
        Ok(())
    });

    CommandReceiver::new(ChunkCodec)
        .receive(
            &mut forest,
            &"client".into(),
            &DeltaCommand::from(SingleCommand::new("c1", command)),
        )
        .unwrap();

    let mut sent = sent.borrow_mut();
    assert_eq!(sent.len(), 1);
    sent.remove(0)
}

fn is(id: &NodeId, expected: &str) -> bool {
    id.as_str() == expected
}

#[test]
fn child_moved_in_same_containment() {
    let event = replicate(CommandKind::MoveChildInSameContainment {
        new_index: 0,
        moved_child: "c".into(),
    });
    assert!(
        matches!(event, EventKind::ChildMovedInSameContainment { old_index: 2, new_index: 0, .. }),
        "{event:?}"
    );
}

#[test]
fn child_moved_from_other_containment_in_same_parent() {
    let event = replicate(CommandKind::MoveChildFromOtherContainmentInSameParent {
        new_containment: pointer("Library-archive"),
        new_index: 0,
        moved_child: "c".into(),
    });
    assert!(
        matches!(
            event,
            EventKind::ChildMovedFromOtherContainmentInSameParent {
                old_index: 2,
                ref old_containment,
                ..
            } if *old_containment == pointer("Library-books")
        ),
        "{event:?}"
    );
}

#[test]
fn child_moved_from_other_containment() {
    let event = replicate(CommandKind::MoveChildFromOtherContainment {
        new_parent: "a".into(),
        new_containment: pointer("Book-chapters"),
        new_index: 0,
        moved_child: "d3".into(),
    });
    assert!(
        matches!(
            event,
            EventKind::ChildMovedFromOtherContainment {
                old_index: 2,
                ref old_parent,
                ..
            } if is(old_parent, "d")
        ),
        "{event:?}"
    );
}

#[test]
fn child_moved_and_replaced_in_same_containment() {
    let event = replicate(CommandKind::MoveAndReplaceChildInSameContainment {
        new_index: 0,
        replaced_child: "a".into(),
        moved_child: "c".into(),
    });
    assert!(
        matches!(
            event,
            EventKind::ChildMovedAndReplacedInSameContainment {
                old_index: 2,
                ref replaced_child,
                ..
            } if is(replaced_child, "a")
        ),
        "{event:?}"
    );
}

#[test]
fn child_moved_and_replaced_from_other_containment_in_same_parent() {
    let event = replicate(CommandKind::MoveAndReplaceChildFromOtherContainmentInSameParent {
        new_containment: pointer("Library-archive"),
        new_index: 0,
        replaced_child: "x".into(),
        moved_child: "c".into(),
    });
    assert!(
        matches!(
            event,
            EventKind::ChildMovedAndReplacedFromOtherContainmentInSameParent { old_index: 2, .. }
        ),
        "{event:?}"
    );
}

#[test]
fn child_moved_and_replaced_from_other_containment() {
    let event = replicate(CommandKind::MoveAndReplaceChildFromOtherContainment {
        new_parent: "e".into(),
        new_containment: pointer("Book-chapters"),
        new_index: 0,
        replaced_child: "e1".into(),
        moved_child: "d3".into(),
    });
    assert!(
        matches!(
            event,
            EventKind::ChildMovedAndReplacedFromOtherContainment {
                old_index: 2,
                ref old_parent,
                ..
            } if is(old_parent, "d")
        ),
        "{event:?}"
    );
}

#[test]
fn annotation_moved_in_same_parent() {
    let event = replicate(CommandKind::MoveAnnotationInSameParent {
        new_index: 0,
        moved_annotation: "n3".into(),
    });
    assert!(
        matches!(event, EventKind::AnnotationMovedInSameParent { old_index: 2, new_index: 0, .. }),
        "{event:?}"
    );
}

#[test]
fn annotation_moved_from_other_parent() {
    let event = replicate(CommandKind::MoveAnnotationFromOtherParent {
        new_parent: "b".into(),
        new_index: 0,
        moved_annotation: "n3".into(),
    });
    assert!(
        matches!(
            event,
            EventKind::AnnotationMovedFromOtherParent {
                old_index: 2,
                ref old_parent,
                ..
            } if is(old_parent, "a")
        ),
        "{event:?}"
    );
}

#[test]
fn annotation_moved_and_replaced_in_same_parent() {
    let event = replicate(CommandKind::MoveAndReplaceAnnotationInSameParent {
        new_index: 0,
        replaced_annotation: "n1".into(),
        moved_annotation: "n3".into(),
    });
    assert!(
        matches!(event, EventKind::AnnotationMovedAndReplacedInSameParent { old_index: 2, .. }),
        "{event:?}"
    );
}

#[test]
fn annotation_moved_and_replaced_from_other_parent() {
    let event = replicate(CommandKind::MoveAndReplaceAnnotationFromOtherParent {
        new_parent: "b".into(),
        new_index: 0,
        replaced_annotation: "m1".into(),
        moved_annotation: "n3".into(),
    });
    assert!(
        matches!(
            event,
            EventKind::AnnotationMovedAndReplacedFromOtherParent {
                old_index: 2,
                ref old_parent,
                ..
            } if is(old_parent, "a")
        ),
        "{event:?}"
    );
}

#[test]
fn entry_moved_in_same_reference() {
    let event = replicate(CommandKind::MoveEntryInSameReference {
        parent: "a".into(),
        reference: pointer("Book-related"),
        new_index: 0,
        old_index: 2,
    });
    assert!(
        matches!(
            event,
            EventKind::EntryMovedInSameReference {
                old_index: 2,
                moved_target: Some(ref target),
                ..
            } if is(target, "b")
        ),
        "{event:?}"
    );
}

#[test]
fn entry_moved_from_other_reference_in_same_parent() {
    let event = replicate(CommandKind::MoveEntryFromOtherReferenceInSameParent {
        parent: "a".into(),
        new_reference: pointer("Book-cited"),
        new_index: 0,
        old_reference: pointer("Book-related"),
        old_index: 2,
    });
    assert!(
        matches!(
            event,
            EventKind::EntryMovedFromOtherReferenceInSameParent {
                old_index: 2,
                moved_target: Some(ref target),
                ..
            } if is(target, "b")
        ),
        "{event:?}"
    );
}

#[test]
fn entry_moved_from_other_reference() {
    let event = replicate(CommandKind::MoveEntryFromOtherReference {
        new_parent: "b".into(),
        new_reference: pointer("Book-related"),
        new_index: 0,
        old_parent: "a".into(),
        old_reference: pointer("Book-related"),
        old_index: 2,
    });
    assert!(
        matches!(
            event,
            EventKind::EntryMovedFromOtherReference {
                old_index: 2,
                ref old_parent,
                ..
            } if is(old_parent, "a")
        ),
        "{event:?}"
    );
}

#[test]
fn entry_moved_and_replaced_in_same_reference() {
    let event = replicate(CommandKind::MoveAndReplaceEntryInSameReference {
        parent: "a".into(),
        reference: pointer("Book-related"),
        new_index: 0,
        old_index: 2,
    });
    assert!(
        matches!(
            event,
            EventKind::EntryMovedAndReplacedInSameReference {
                old_index: 2,
                replaced_target: Some(ref replaced),
                ..
            } if is(replaced, "lib-w1")
        ),
        "{event:?}"
    );
}

#[test]
fn entry_moved_and_replaced_from_other_reference_in_same_parent() {
    let event = replicate(CommandKind::MoveAndReplaceEntryFromOtherReferenceInSameParent {
        parent: "a".into(),
        new_reference: pointer("Book-cited"),
        new_index: 0,
        old_reference: pointer("Book-related"),
        old_index: 2,
    });
    assert!(
        matches!(
            event,
            EventKind::EntryMovedAndReplacedFromOtherReferenceInSameParent {
                old_index: 2,
                replaced_target: Some(ref replaced),
                ..
            } if is(replaced, "c")
        ),
        "{event:?}"
    );
}

#[test]
fn entry_moved_and_replaced_from_other_reference() {
    let event = replicate(CommandKind::MoveAndReplaceEntryFromOtherReference {
        new_parent: "b".into(),
        new_reference: pointer("Book-related"),
        new_index: 0,
        old_parent: "a".into(),
        old_reference: pointer("Book-related"),
        old_index: 2,
    });
    assert!(
        matches!(
            event,
            EventKind::EntryMovedAndReplacedFromOtherReference {
                old_index: 2,
                replaced_target: Some(ref replaced),
                ..
            } if is(replaced, "d")
        ),
        "{event:?}"
    );
}
