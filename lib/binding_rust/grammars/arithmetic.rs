//! A small expression grammar: numbers, variables, parentheses, and
//! left-associative `+`, with `//` line comments as extras.
//!
//! ```text
//! expression := operand ('+' operand)*
//! operand    := number | variable | '(' expression ')'
//! ```
//!
//! Every operand and every sum is wrapped in an `expression` node, so
//! `1 + 2` parses as
//! `(expression (sum left: (expression (number)) right: (expression (number))))`.

use crate::abi::{
    CompletedMarker, FieldId, LanguageDefinition, Lexer, NodeTypeInfo, ParseContext, StateId,
    Symbol, SymbolMetadata, LANGUAGE_VERSION,
};
use crate::Language;

pub const END: Symbol = 0;
pub const LPAREN: Symbol = 1;
pub const RPAREN: Symbol = 2;
pub const PLUS: Symbol = 3;
pub const NUMBER: Symbol = 4;
pub const VARIABLE: Symbol = 5;
pub const COMMENT: Symbol = 6;
pub const EXPRESSION: Symbol = 7;
pub const SUM: Symbol = 8;

pub const FIELD_LEFT: FieldId = 1;
pub const FIELD_RIGHT: FieldId = 2;

/// Operands do not depend on what follows them, so they can be reused.
const STATE_OPERAND: StateId = 1;

pub static DEFINITION: LanguageDefinition = LanguageDefinition {
    abi_version: LANGUAGE_VERSION,
    name: "arithmetic",
    symbol_names: &[
        "end",
        "(",
        ")",
        "+",
        "number",
        "variable",
        "comment",
        "expression",
        "sum",
    ],
    symbol_metadata: &[
        SymbolMetadata::AUXILIARY,
        SymbolMetadata::ANONYMOUS,
        SymbolMetadata::ANONYMOUS,
        SymbolMetadata::ANONYMOUS,
        SymbolMetadata::REGULAR,
        SymbolMetadata::REGULAR,
        SymbolMetadata::REGULAR,
        SymbolMetadata::REGULAR,
        SymbolMetadata::REGULAR,
    ],
    field_names: &["", "left", "right"],
    extras: &[COMMENT],
    node_types: &[
        NodeTypeInfo {
            symbol: EXPRESSION,
            fields: &[],
            children: &[LPAREN, RPAREN, NUMBER, VARIABLE, EXPRESSION, SUM],
        },
        NodeTypeInfo {
            symbol: SUM,
            fields: &[(FIELD_LEFT, &[EXPRESSION]), (FIELD_RIGHT, &[EXPRESSION])],
            children: &[PLUS],
        },
    ],
    lex_fn: lex,
    parse_fn: parse,
};

pub fn language() -> Language {
    Language::new(&DEFINITION)
}

fn lex(lexer: &mut Lexer<'_>) -> bool {
    while !lexer.eof() && lexer.lookahead().is_whitespace() {
        lexer.advance(true);
    }
    if lexer.eof() {
        return false;
    }

    match lexer.lookahead() {
        '(' => {
            lexer.advance(false);
            lexer.accept_token(LPAREN)
        }
        ')' => {
            lexer.advance(false);
            lexer.accept_token(RPAREN)
        }
        '+' => {
            lexer.advance(false);
            lexer.accept_token(PLUS)
        }
        '0'..='9' => {
            while lexer.lookahead().is_ascii_digit() {
                lexer.advance(false);
            }
            lexer.accept_token(NUMBER)
        }
        c if c.is_ascii_alphabetic() || c == '_' => {
            while lexer.lookahead().is_ascii_alphanumeric() || lexer.lookahead() == '_' {
                lexer.advance(false);
            }
            lexer.accept_token(VARIABLE)
        }
        '/' => {
            lexer.advance(false);
            if lexer.lookahead() != '/' {
                return false;
            }
            while !lexer.eof() && lexer.lookahead() != '\n' {
                lexer.advance(false);
            }
            lexer.accept_token(COMMENT)
        }
        _ => false,
    }
}

fn parse(p: &mut ParseContext<'_>) {
    while !p.at_eof() {
        if expression(p).is_none() {
            p.skip_token();
        }
    }
}

fn expression(p: &mut ParseContext<'_>) -> Option<CompletedMarker> {
    let mut lhs = operand(p)?;
    while p.at(PLUS) {
        lhs.set_field(p, FIELD_LEFT);
        let sum = lhs.precede(p);
        p.bump();
        let rhs = operand(p).unwrap_or_else(|| {
            let m = p.start();
            p.missing(NUMBER);
            m.complete(p, EXPRESSION)
        });
        rhs.set_field(p, FIELD_RIGHT);
        let sum = sum.complete(p, SUM);
        lhs = sum.precede(p).complete(p, EXPRESSION);
    }
    Some(lhs)
}

fn operand(p: &mut ParseContext<'_>) -> Option<CompletedMarker> {
    if let Some(reused) = p.reuse(STATE_OPERAND) {
        return Some(reused);
    }

    // Peek first so that leading extras stay outside the operand.
    let kind = p.peek();
    let m = p.start();
    match kind {
        NUMBER | VARIABLE => p.bump(),
        LPAREN => {
            p.bump();
            if expression(p).is_none() {
                let inner = p.start();
                p.missing(NUMBER);
                inner.complete(p, EXPRESSION);
            }
            p.expect(RPAREN);
        }
        _ => {
            m.abandon(p);
            return None;
        }
    }
    let operand = m.complete(p, EXPRESSION);
    operand.set_state(p, STATE_OPERAND);
    Some(operand)
}
