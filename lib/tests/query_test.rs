mod common;

use indoc::indoc;
use rstest::rstest;
use sitter::abi::{LanguageDefinition, Lexer, ParseContext, SymbolMetadata};
use sitter::grammars::arithmetic;
use sitter::{
    Language, LANGUAGE_VERSION, Point, Query, QueryCursor, QueryErrorKind, QueryPredicate, QueryPredicateArg,
    StreamingIterator, Tree,
};

use common::parse;

fn query(source: &str) -> Query {
    Query::new(&arithmetic::language(), source).unwrap()
}

/// Texts of all captures, match by match, ignoring text predicates.
fn structural_captures(tree: &Tree, source: &str) -> Vec<String> {
    let query = query(source);
    let mut cursor = QueryCursor::new();
    cursor.exec(&query, &tree.root_node());
    let mut texts = Vec::new();
    while let Some(query_match) = cursor.next_match() {
        for capture in &query_match.captures {
            texts.push(capture.node.content(tree.source()).into_owned());
        }
    }
    texts
}

/// Texts of the first capture of every match that passes its predicates.
fn filtered_captures(text: &str, source: &str) -> Vec<String> {
    let tree = parse(text);
    let query = query(source);
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, &tree.root_node(), text.as_bytes());
    let mut texts = Vec::new();
    while let Some(query_match) = matches.next() {
        texts.push(query_match.captures[0].node.content(text.as_bytes()).into_owned());
    }
    texts
}

#[rstest]
#[case::single("(sum left: (expression) @left)", &["1"])]
#[case::multiple("(sum left: * @left right: * @right)", &["1", "2"])]
#[case::anonymous("\"+\" @op", &["+"])]
#[case::wildcard("(sum (_) @operand)", &["1", "2"])]
#[case::alternation("[(number) (variable)] @leaf", &["1", "2"])]
fn captures_in_matches(#[case] source: &str, #[case] expected: &[&str]) {
    let tree = parse("1 + 2");
    assert_eq!(structural_captures(&tree, source), expected);
}

#[test]
fn counts_matches_of_each_pattern() {
    let tree = parse("1 + 2");
    let query = query("(sum) (number)");
    assert_eq!(query.pattern_count(), 2);
    assert_eq!(query.capture_count(), 0);

    let mut cursor = QueryCursor::new();
    cursor.exec(&query, &tree.root_node());
    let mut patterns = Vec::new();
    while let Some(query_match) = cursor.next_match() {
        assert!(query_match.captures.is_empty());
        patterns.push(query_match.pattern_index);
    }
    assert_eq!(patterns, [0, 1, 1]);
}

#[test]
fn missing_nodes_can_be_queried() {
    let tree = parse("1 +");
    assert_eq!(structural_captures(&tree, "(MISSING) @m"), [""]);
    assert_eq!(structural_captures(&tree, "(MISSING number) @m"), [""]);
    assert!(structural_captures(&tree, "(MISSING \")\") @m").is_empty());
}

#[test]
fn error_nodes_can_be_queried() {
    let tree = parse("1 $");
    let errors = structural_captures(&tree, "(ERROR) @e");
    assert!(!errors.is_empty());
    assert!(errors.iter().all(|text| text == "$"));
}

#[test]
fn query_error_reports_offset_and_kind() {
    let err = Query::new(&arithmetic::language(), "((unknown) name: (identifier))").unwrap_err();
    assert_eq!(err.offset, 2);
    assert_eq!(err.kind, QueryErrorKind::NodeType);
    assert_eq!((err.row, err.column), (0, 2));
    assert!(err.to_string().starts_with("Invalid node type at 1:3"));

    let err = Query::new(&arithmetic::language(), "(sum left: (expression)").unwrap_err();
    assert_eq!(err.kind, QueryErrorKind::Syntax);
}

#[rstest]
#[case::unknown_field("(sum middle: (expression))", QueryErrorKind::Field, 5)]
#[case::impossible_child("(sum (number))", QueryErrorKind::Structure, 5)]
#[case::unknown_string("\"-\" @op", QueryErrorKind::NodeType, 1)]
#[case::unknown_capture("((number) @n (#eq? @m \"1\"))", QueryErrorKind::Capture, 19)]
#[case::bad_regex("((number) @n (#match? @n \"(\"))", QueryErrorKind::Predicate, 26)]
#[case::wrong_arity("((number) @n (#eq? @n))", QueryErrorKind::Predicate, 13)]
fn query_errors(#[case] source: &str, #[case] kind: QueryErrorKind, #[case] offset: usize) {
    let err = Query::new(&arithmetic::language(), source).unwrap_err();
    assert_eq!((err.kind, err.offset), (kind, offset), "{err}");
}

#[test]
fn query_metadata() {
    let query = query(indoc! {r#"
        (sum left: * @left) @sum
        ((number) @n (#set! kind "int"))
    "#});
    assert_eq!(query.language(), arithmetic::language());
    assert_eq!(query.pattern_count(), 2);
    assert_eq!(query.capture_names(), ["left", "sum", "n"]);
    assert_eq!(query.capture_index_for_name("n"), Some(2));
    assert_eq!(query.capture_index_for_name("x"), None);
    assert_eq!(query.start_byte_for_pattern(0), 0);
    assert_eq!(query.start_byte_for_pattern(1), 25);
    assert_eq!(query.string_count(), 2);
    assert_eq!(query.string_value(0), Some("kind"));
    assert_eq!(query.string_value(2), None);
    assert!(query.general_predicates(0).is_empty());
    assert_eq!(
        query.general_predicates(1),
        [QueryPredicate {
            operator: "set!".into(),
            args: vec![
                QueryPredicateArg::String("kind".into()),
                QueryPredicateArg::String("int".into()),
            ]
            .into(),
        }]
    );
}

#[rstest]
#[case::eq_string("((number) @n (#eq? @n \"2\"))", &["2"])]
#[case::not_eq_string("((number) @n (#not-eq? @n \"2\"))", &["1", "3"])]
#[case::match_regex("((variable) @v (#match? @v \"^[a-z]$\"))", &["x"])]
#[case::not_match_regex("((variable) @v (#not-match? @v \"^[a-z]$\"))", &["total"])]
#[case::any_of("((variable) @v (#any-of? @v \"total\" \"y\"))", &["total"])]
#[case::eq_capture("((sum left: * @l right: * @r) (#eq? @l @r))", &[])]
fn text_predicates_filter_matches(#[case] source: &str, #[case] expected: &[&str]) {
    let text = "1 + 2 + x + 3 + total";
    assert_eq!(filtered_captures(text, source), expected);
}

#[test]
fn capture_equality_predicate() {
    let source = "((sum left: * @l right: * @r) (#eq? @l @r))";
    assert_eq!(filtered_captures("1 + 1", source), ["1"]);
    assert!(filtered_captures("1 + 2", source).is_empty());
}

#[test]
fn structural_execution_ignores_text_predicates() {
    let tree = parse("1 + 2");
    let query = query("((number) @n (#eq? @n \"2\"))");
    let mut cursor = QueryCursor::new();
    cursor.exec(&query, &tree.root_node());

    let first = cursor.next_match().unwrap();
    assert!(!cursor.filter_predicates(&first, tree.source()));
    assert!(!query.satisfies_text_predicates(&first, tree.source()));
    let second = cursor.next_match().unwrap();
    assert!(cursor.filter_predicates(&second, tree.source()));
    assert!(cursor.next_match().is_none());
}

#[test]
fn captures_come_in_document_order() {
    let tree = parse("1 + 2");
    let query = query("(sum left: * @l right: * @r) \"+\" @op");
    let mut cursor = QueryCursor::new();
    let mut captures = cursor.captures(&query, &tree.root_node(), tree.source());

    let mut seen = Vec::new();
    while let Some((query_match, index)) = captures.next() {
        let capture = &query_match.captures[*index];
        seen.push((
            query.capture_names()[capture.index as usize].clone(),
            capture.node.content(tree.source()).into_owned(),
        ));
    }
    assert_eq!(
        seen,
        [
            ("l".to_owned(), "1".to_owned()),
            ("op".to_owned(), "+".to_owned()),
            ("r".to_owned(), "2".to_owned()),
        ]
    );
}

#[test]
fn byte_and_point_ranges_restrict_matches() {
    let tree = parse("1 + 2");
    let query = query("(number) @n");
    let texts = |cursor: &mut QueryCursor| {
        let mut matches = cursor.matches(&query, &tree.root_node(), tree.source());
        let mut texts = Vec::new();
        while let Some(query_match) = matches.next() {
            texts.push(query_match.captures[0].node.content(tree.source()).into_owned());
        }
        texts
    };

    let mut cursor = QueryCursor::new();
    cursor.set_byte_range(3..5);
    assert_eq!(texts(&mut cursor), ["2"]);

    let mut cursor = QueryCursor::new();
    cursor.set_point_range(Point::new(0, 0)..Point::new(0, 1));
    assert_eq!(texts(&mut cursor), ["1"]);
}

#[test]
fn running_on_a_subtree() {
    let tree = parse("1 + 2");
    let right = tree.root_node().child(0).unwrap().child(2).unwrap();
    let query = query("(expression) @e");
    let mut cursor = QueryCursor::default();
    cursor.exec(&query, &right);
    let first = cursor.next_match().unwrap();
    assert_eq!(first.captures[0].node, right);
    assert_eq!(first.nodes_for_capture_index(0).count(), 1);
    assert!(cursor.next_match().is_none());
}

#[test]
fn cursor_without_execution_is_empty() {
    let mut cursor = QueryCursor::new();
    assert!(cursor.next_match().is_none());
    assert!(cursor.next_capture().is_none());
}

fn lex_nothing(_: &mut Lexer<'_>) -> bool {
    false
}

fn parse_nothing(_: &mut ParseContext<'_>) {}

static NUMBERS: LanguageDefinition = LanguageDefinition {
    abi_version: LANGUAGE_VERSION,
    name: "numbers",
    symbol_names: &["end", "number"],
    symbol_metadata: &[SymbolMetadata::AUXILIARY, SymbolMetadata::REGULAR],
    field_names: &[""],
    extras: &[],
    node_types: &[],
    lex_fn: lex_nothing,
    parse_fn: parse_nothing,
};

#[test]
#[should_panic(expected = "Query for language numbers cannot run on a tree of language arithmetic")]
fn queries_only_run_on_their_own_language() {
    let query = Query::new(&Language::new(&NUMBERS), "(number) @n").unwrap();
    let tree = parse("1 + 2");
    QueryCursor::new().exec(&query, &tree.root_node());
}
