use rstest::rstest;
use sitter::abi::{LanguageDefinition, Lexer, ParseContext, BUILTIN_SYM_ERROR};
use sitter::grammars::arithmetic;
use sitter::{Language, Parser, SymbolType, LANGUAGE_VERSION};

fn lex_nothing(_: &mut Lexer<'_>) -> bool {
    false
}

fn parse_nothing(_: &mut ParseContext<'_>) {}

static ANCIENT: LanguageDefinition = LanguageDefinition {
    abi_version: 12,
    name: "ancient",
    symbol_names: &["end"],
    symbol_metadata: &[],
    field_names: &[""],
    extras: &[],
    node_types: &[],
    lex_fn: lex_nothing,
    parse_fn: parse_nothing,
};

#[test]
fn symbol_tables() {
    let language = arithmetic::language();
    assert_eq!(language.name(), "arithmetic");
    assert_eq!(language.abi_version(), LANGUAGE_VERSION);
    assert_eq!(language.symbol_count(), 9);
    assert_eq!(language.symbol_name(BUILTIN_SYM_ERROR), "ERROR");
}

#[rstest]
#[case(arithmetic::END, "end", SymbolType::Auxiliary)]
#[case(arithmetic::PLUS, "+", SymbolType::Anonymous)]
#[case(arithmetic::NUMBER, "number", SymbolType::Regular)]
#[case(arithmetic::SUM, "sum", SymbolType::Regular)]
fn symbol_names_and_types(#[case] id: u16, #[case] name: &str, #[case] symbol_type: SymbolType) {
    let language = arithmetic::language();
    assert_eq!(language.symbol_name(id), name);
    assert_eq!(language.symbol_type(id), symbol_type);
}

#[test]
fn symbol_type_display() {
    assert_eq!(SymbolType::Regular.to_string(), "Regular");
    assert_eq!(SymbolType::Anonymous.to_string(), "Anonymous");
    assert_eq!(SymbolType::Auxiliary.to_string(), "Auxiliary");
}

#[test]
fn node_kind_lookups() {
    let language = arithmetic::language();
    assert_eq!(language.id_for_node_kind("sum", true), arithmetic::SUM);
    assert_eq!(language.id_for_node_kind("+", false), arithmetic::PLUS);
    assert_eq!(language.id_for_node_kind("+", true), 0);
    assert_eq!(language.id_for_node_kind("end", true), 0);
    assert!(language.node_kind_is_named(arithmetic::NUMBER));
    assert!(!language.node_kind_is_named(arithmetic::LPAREN));
    assert!(!language.node_kind_is_visible(arithmetic::END));
}

#[test]
fn field_lookups() {
    let language = arithmetic::language();
    assert_eq!(language.field_count(), 2);
    assert_eq!(language.field_id_for_name("left"), Some(arithmetic::FIELD_LEFT));
    assert_eq!(language.field_id_for_name("right"), Some(arithmetic::FIELD_RIGHT));
    assert_eq!(language.field_id_for_name("middle"), None);
    assert_eq!(language.field_id_for_name(""), None);
    assert_eq!(language.field_name_for_id(arithmetic::FIELD_RIGHT), Some("right"));
    assert_eq!(language.field_name_for_id(0), None);
    assert_eq!(language.field_name_for_id(3), None);
}

#[test]
#[should_panic(expected = "out of range")]
fn symbol_name_out_of_range_panics() {
    arithmetic::language().symbol_name(9);
}

#[test]
fn languages_compare_by_definition() {
    assert_eq!(arithmetic::language(), Language::new(&arithmetic::DEFINITION));
    assert_ne!(arithmetic::language(), Language::new(&ANCIENT));
}

#[test]
fn incompatible_language_is_rejected() {
    let mut parser = Parser::new();
    let err = parser.set_language(&Language::new(&ANCIENT)).unwrap_err();
    assert_eq!(err.version, 12);
    assert!(err.to_string().starts_with("Incompatible language version 12"));
    assert!(parser.language().is_none());

    parser.set_language(&arithmetic::language()).unwrap();
    assert_eq!(parser.language(), Some(arithmetic::language()));
}
