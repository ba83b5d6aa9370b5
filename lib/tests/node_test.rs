mod common;

use std::collections::HashSet;

use rstest::rstest;
use sitter::grammars::arithmetic;
use sitter::{Point, Range};

use common::parse;

#[test]
fn root_node() {
    let tree = parse("1 + 2");
    let root = tree.root_node();
    assert_eq!(root.kind(), "expression");
    assert_eq!(root.kind_id(), arithmetic::EXPRESSION);
    assert_eq!(root.language(), arithmetic::language());
    assert!(root.is_named());
    assert!(!root.is_missing());
    assert!(!root.is_extra());
    assert!(!root.has_changes());
    assert_eq!(root.child_count(), 1);
    assert_eq!(root.named_child_count(), 1);
    assert_eq!(root.descendant_count(), 7);
    assert_eq!(root.parent(), None);
    assert_eq!(root.next_sibling(), None);
    assert_eq!(root.prev_sibling(), None);
    assert_eq!(
        root.range(),
        Range {
            start_byte: 0,
            end_byte: 5,
            start_point: Point::new(0, 0),
            end_point: Point::new(0, 5),
        }
    );
}

#[test]
fn retrieving_a_node_twice_yields_the_same_node() {
    let tree = parse("1 + 2");
    let first = tree.root_node();
    let second = tree.root_node();
    assert_eq!(first, second);
    assert_eq!(first.id(), second.id());

    let sum = first.child(0).unwrap();
    assert_eq!(sum, second.child(0).unwrap());
    assert_eq!(sum.child(0).unwrap().parent().unwrap(), sum);
    assert_ne!(sum, first);
    assert_ne!(sum.id(), first.id());

    let set: HashSet<_> = [first, second, sum.clone(), sum].into_iter().collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn nodes_of_different_trees_differ() {
    let a = parse("1 + 2").root_node();
    let b = parse("1 + 2").root_node();
    assert_ne!(a, b);
    assert_eq!(a.to_sexp(), b.to_sexp());
}

#[test]
fn children_and_fields() {
    let tree = parse("1 + 2");
    let sum = tree.root_node().child(0).unwrap();
    assert_eq!(sum.kind(), "sum");
    assert_eq!(sum.child_count(), 3);
    assert_eq!(sum.named_child_count(), 2);

    let kinds: Vec<_> = sum.children().iter().map(|child| child.kind()).collect();
    assert_eq!(kinds, ["expression", "+", "expression"]);
    assert_eq!(sum.named_children().len(), 2);
    assert_eq!(sum.child(3), None);
    assert_eq!(sum.named_child(2), None);

    let plus = sum.child(1).unwrap();
    assert!(!plus.is_named());
    assert_eq!(plus.child_count(), 0);
    assert_eq!(sum.named_child(1).unwrap(), sum.child(2).unwrap());

    assert_eq!(sum.field_name_for_child(0), Some("left"));
    assert_eq!(sum.field_name_for_child(1), None);
    assert_eq!(sum.field_name_for_child(2), Some("right"));
    assert_eq!(sum.field_name_for_child(3), None);

    let source = tree.source();
    let left = sum.child_by_field_name("left").unwrap();
    assert_eq!(left.utf8_text(source).unwrap(), "1");
    assert_eq!(left, sum.child(0).unwrap());
    let right = sum.child_by_field_id(arithmetic::FIELD_RIGHT).unwrap();
    assert_eq!(right.utf8_text(source).unwrap(), "2");
    assert_eq!(sum.child_by_field_name("middle"), None);
    assert_eq!(plus.child_by_field_name("left"), None);
}

#[test]
fn fields_pass_through_parentheses() {
    let tree = parse("(1) + 2");
    let sum = tree.root_node().child(0).unwrap();
    let left = sum.child_by_field_name("left").unwrap();
    assert_eq!(left.content(tree.source()), "(1)");
    assert_eq!(left.child_count(), 3);
    assert_eq!(left.named_child(0).unwrap().kind(), "expression");
}

#[test]
fn siblings_and_parents() {
    let tree = parse("1 + 2");
    let root = tree.root_node();
    let sum = root.child(0).unwrap();
    let left = sum.child(0).unwrap();
    let plus = sum.child(1).unwrap();
    let right = sum.child(2).unwrap();

    assert_eq!(left.next_sibling().unwrap(), plus);
    assert_eq!(plus.next_sibling().unwrap(), right);
    assert_eq!(right.next_sibling(), None);
    assert_eq!(right.prev_sibling().unwrap(), plus);
    assert_eq!(left.prev_sibling(), None);

    assert_eq!(left.next_named_sibling().unwrap(), right);
    assert_eq!(right.prev_named_sibling().unwrap(), left);
    assert_eq!(plus.prev_named_sibling().unwrap(), left);

    assert_eq!(plus.parent().unwrap(), sum);
    assert_eq!(sum.parent().unwrap(), root);
    assert_eq!(left.child(0).unwrap().parent().unwrap(), left);
}

#[rstest]
#[case(2, 3, "+", "sum")]
#[case(4, 5, "number", "number")]
#[case(0, 5, "sum", "sum")]
#[case(1, 3, "sum", "sum")]
fn descendants_for_byte_ranges(
    #[case] start: u32,
    #[case] end: u32,
    #[case] kind: &str,
    #[case] named_kind: &str,
) {
    let root = parse("1 + 2").root_node();
    assert_eq!(root.descendant_for_byte_range(start, end).unwrap().kind(), kind);
    assert_eq!(
        root.named_descendant_for_byte_range(start, end).unwrap().kind(),
        named_kind
    );
}

#[test]
fn descendant_outside_the_node_is_none() {
    let root = parse("1 + 2").root_node();
    assert_eq!(root.descendant_for_byte_range(3, 10), None);
    let left = root.child(0).unwrap().child(0).unwrap();
    assert_eq!(left.descendant_for_byte_range(4, 5), None);
}

#[test]
fn node_text() {
    let source = "x + 12";
    let tree = parse(source);
    let right = tree.root_node().child(0).unwrap().child(2).unwrap();
    assert_eq!(right.byte_range(), 4..6);
    assert_eq!(right.utf8_text(source.as_bytes()).unwrap(), "12");
    assert_eq!(right.content(source.as_bytes()), "12");
    assert!(right.utf8_text(b"x + \xff\xfe").is_err());
    assert_eq!(right.content(b"x + \xff\xfe"), "\u{fffd}\u{fffd}");
    assert_eq!(right.content(b"x"), "");
}

#[test]
#[should_panic(expected = "out of range")]
fn utf8_text_of_a_shorter_source_panics() {
    let tree = parse("x + 12");
    let right = tree.root_node().child(0).unwrap().child(2).unwrap();
    let _ = right.utf8_text(b"x + ");
}

#[test]
fn debug_format() {
    let tree = parse("1 +\n2");
    let sum = tree.root_node().child(0).unwrap();
    assert_eq!(format!("{sum:?}"), "{Node sum (0, 0) - (1, 1)}");
    assert_eq!(sum.end_position(), Point::new(1, 1));
}
