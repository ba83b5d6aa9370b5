//! Structural queries: a compiler for S-expression patterns and a
//! backtracking matcher that runs them over a tree.
//!
//! A compiled pattern is a tree of [`PatternNode`]s. Matching a pattern
//! against a node yields every consistent assignment of captures, so one
//! node can produce several matches for the same pattern.

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::ops::Range as Span;
use std::sync::Arc;

use regex::bytes::Regex;
use thiserror::Error;
use tracing::trace;

use crate::Point;

use super::language::{FieldId, LanguageDefinition, Symbol, BUILTIN_SYM_ERROR};
use super::node::NodeRef;
use super::point::{POINT_MAX, POINT_ZERO};
use super::tree_cursor::TreeCursor;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryErrorKind {
    Syntax,
    NodeType,
    Field,
    Capture,
    Predicate,
    Structure,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Syntax => "Invalid syntax",
            Self::NodeType => "Invalid node type",
            Self::Field => "Invalid field name",
            Self::Capture => "Invalid capture name",
            Self::Predicate => "Invalid predicate",
            Self::Structure => "Impossible pattern",
        })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind} at {}:{}: {message}", .row + 1, .column + 1)]
pub struct QueryError {
    pub row: usize,
    pub column: usize,
    pub offset: usize,
    pub message: String,
    pub kind: QueryErrorKind,
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryPredicateArg {
    Capture(u32),
    String(Box<str>),
}

/// A predicate the query engine does not interpret itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryPredicate {
    pub operator: Box<str>,
    pub args: Box<[QueryPredicateArg]>,
}

/// Predicates on captured text. The flags are `is_positive` and, where
/// present, `match_all_nodes`.
#[derive(Debug)]
enum TextPredicate {
    EqString(u32, Box<str>, bool, bool),
    EqCapture(u32, u32, bool, bool),
    MatchString(u32, Regex, bool, bool),
    AnyString(u32, Box<[Box<str>]>, bool),
}

// ---------------------------------------------------------------------------
// Compiled patterns
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeMatcher {
    /// `_` or `*`
    Any,
    /// `(_)`
    AnyNamed,
    Symbol(Symbol),
    Missing(Option<Symbol>),
}

impl NodeMatcher {
    fn accepts(self, node: &NodeRef) -> bool {
        match self {
            Self::Any => true,
            Self::AnyNamed => node.is_named(),
            Self::Symbol(symbol) => node.symbol() == symbol,
            Self::Missing(None) => node.subtree.is_missing,
            Self::Missing(Some(symbol)) => node.subtree.is_missing && node.symbol() == symbol,
        }
    }
}

#[derive(Debug)]
enum Step {
    Node {
        matcher: NodeMatcher,
        children: Vec<PatternNode>,
        negated_fields: Vec<FieldId>,
    },
    Alternation(Vec<PatternNode>),
}

#[derive(Debug)]
struct PatternNode {
    step: Step,
    /// The field the matched node must be attached under, or 0.
    field: FieldId,
    captures: Vec<u32>,
}

#[derive(Debug)]
struct QueryPattern {
    start_byte: usize,
    /// Consecutive siblings; most patterns have exactly one.
    sequence: Vec<PatternNode>,
    text_predicates: Vec<TextPredicate>,
    general_predicates: Vec<QueryPredicate>,
}

#[derive(Debug)]
pub struct QueryData {
    language: &'static LanguageDefinition,
    patterns: Vec<QueryPattern>,
    capture_names: Vec<String>,
    strings: Vec<String>,
}

impl QueryData {
    pub fn new(language: &'static LanguageDefinition, source: &str) -> Result<Self, QueryError> {
        Compiler {
            language,
            source,
            pos: 0,
            capture_names: Vec::new(),
            strings: Vec::new(),
            text_predicates: Vec::new(),
            general_predicates: Vec::new(),
        }
        .compile()
    }

    #[inline]
    pub fn language(&self) -> &'static LanguageDefinition {
        self.language
    }

    #[inline]
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    #[inline]
    pub fn capture_names(&self) -> &[String] {
        &self.capture_names
    }

    pub fn capture_index_for_name(&self, name: &str) -> Option<u32> {
        self.capture_names
            .iter()
            .position(|capture| capture == name)
            .map(|i| i as u32)
    }

    pub fn start_byte_for_pattern(&self, pattern_index: usize) -> usize {
        assert!(
            pattern_index < self.patterns.len(),
            "Pattern index is {pattern_index} but the pattern count is {}",
            self.patterns.len(),
        );
        self.patterns[pattern_index].start_byte
    }

    pub fn general_predicates(&self, pattern_index: usize) -> &[QueryPredicate] {
        self.patterns
            .get(pattern_index)
            .map(|pattern| pattern.general_predicates.as_slice())
            .unwrap_or_default()
    }

    #[inline]
    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    pub fn string_value(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    /// Check the text predicates of `pattern_index` against the byte spans
    /// of a match's captures.
    pub fn satisfies_text_predicates(
        &self,
        pattern_index: usize,
        captures: &[(u32, Span<usize>)],
        source: &[u8],
    ) -> bool {
        let Some(pattern) = self.patterns.get(pattern_index) else {
            return true;
        };
        let texts = |index: u32| capture_texts(captures, source, index);

        pattern.text_predicates.iter().all(|predicate| match predicate {
            TextPredicate::EqString(index, value, is_positive, match_all_nodes) => {
                let value = value.as_bytes();
                any_or_all(texts(*index), *match_all_nodes, |text| {
                    (text == value) == *is_positive
                })
            }
            TextPredicate::EqCapture(left, right, is_positive, match_all_nodes) => {
                let pairs = texts(*left).zip(texts(*right));
                any_or_all(pairs, *match_all_nodes, |(left, right)| {
                    (left == right) == *is_positive
                })
            }
            TextPredicate::MatchString(index, regex, is_positive, match_all_nodes) => {
                any_or_all(texts(*index), *match_all_nodes, |text| {
                    regex.is_match(text) == *is_positive
                })
            }
            TextPredicate::AnyString(index, values, is_positive) => texts(*index).all(|text| {
                values.iter().any(|value| value.as_bytes() == text) == *is_positive
            }),
        })
    }
}

fn capture_texts<'a>(
    captures: &'a [(u32, Span<usize>)],
    source: &'a [u8],
    index: u32,
) -> impl Iterator<Item = &'a [u8]> + 'a {
    captures
        .iter()
        .filter(move |(capture, _)| *capture == index)
        .map(move |(_, span)| source.get(span.clone()).unwrap_or_default())
}

fn any_or_all<T>(items: impl Iterator<Item = T>, match_all: bool, mut f: impl FnMut(T) -> bool) -> bool {
    if match_all {
        let mut items = items;
        items.all(f)
    } else {
        let mut items = items.peekable();
        items.peek().is_none() || items.any(&mut f)
    }
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

struct Compiler<'a> {
    language: &'static LanguageDefinition,
    source: &'a str,
    pos: usize,
    capture_names: Vec<String>,
    strings: Vec<String>,
    // Predicates of the pattern being compiled.
    text_predicates: Vec<TextPredicate>,
    general_predicates: Vec<QueryPredicate>,
}

/// Where a pattern appears. `parent` is the node type whose children are
/// being described, if it can be checked.
#[derive(Clone, Copy)]
struct Context {
    parent: Option<Symbol>,
    field: FieldId,
}

const TOP_LEVEL: Context = Context {
    parent: None,
    field: 0,
};

enum Item {
    Pattern(PatternNode),
    Group(Vec<PatternNode>),
    NegatedField(FieldId),
    Predicate,
}

fn is_identifier_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.')
}

impl Compiler<'_> {
    fn compile(mut self) -> Result<QueryData, QueryError> {
        let mut patterns = Vec::new();
        loop {
            self.skip_trivia();
            if self.pos >= self.source.len() {
                break;
            }
            let start_byte = self.pos;
            let sequence = match self.parse_item(TOP_LEVEL)? {
                Item::Pattern(pattern) => vec![pattern],
                Item::Group(sequence) => sequence,
                Item::NegatedField(_) | Item::Predicate => return Err(self.syntax_error(start_byte)),
            };
            patterns.push(QueryPattern {
                start_byte,
                sequence,
                text_predicates: mem::take(&mut self.text_predicates),
                general_predicates: mem::take(&mut self.general_predicates),
            });
        }

        trace!(
            patterns = patterns.len(),
            captures = self.capture_names.len(),
            "compiled query"
        );
        Ok(QueryData {
            language: self.language,
            patterns,
            capture_names: self.capture_names,
            strings: self.strings,
        })
    }

    // -----------------------------------------------------------------------
    // Scanning
    // -----------------------------------------------------------------------

    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(byte) = self.peek() {
            if byte.is_ascii_whitespace() {
                self.pos += 1;
            } else if byte == b';' {
                while self.peek().is_some_and(|byte| byte != b'\n') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn read_while(&mut self, f: impl Fn(u8) -> bool) -> &str {
        let start = self.pos;
        while self.peek().is_some_and(&f) {
            self.pos += 1;
        }
        &self.source[start..self.pos]
    }

    fn read_identifier(&mut self) -> String {
        self.read_while(is_identifier_byte).to_owned()
    }

    /// A double-quoted string with `\` escapes. `self.pos` is at the
    /// opening quote.
    fn read_string(&mut self) -> Result<String, QueryError> {
        let start = self.pos;
        self.pos += 1;
        let source = self.source;
        let mut value = String::new();
        let mut chars = source[self.pos..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(value);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, '0')) => value.push('\0'),
                    Some((_, c)) => value.push(c),
                    None => break,
                },
                c => value.push(c),
            }
        }
        Err(self.syntax_error(start))
    }

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    fn line_start(&self, offset: usize) -> usize {
        self.source.as_bytes()[..offset]
            .iter()
            .rposition(|&byte| byte == b'\n')
            .map_or(0, |i| i + 1)
    }

    fn error(&self, kind: QueryErrorKind, offset: usize, message: impl Into<String>) -> QueryError {
        let offset = offset.min(self.source.len());
        let line_start = self.line_start(offset);
        QueryError {
            row: self.source.as_bytes()[..offset]
                .iter()
                .filter(|&&byte| byte == b'\n')
                .count(),
            column: offset - line_start,
            offset,
            message: message.into(),
            kind,
        }
    }

    /// Errors that point into the query text render the offending line
    /// with a caret under the offset.
    fn located_error(&self, kind: QueryErrorKind, offset: usize) -> QueryError {
        let offset = offset.min(self.source.len());
        let line_start = self.line_start(offset);
        let line_end = self.source[line_start..]
            .find('\n')
            .map_or(self.source.len(), |i| line_start + i);
        let message = format!(
            "{}\n{}^",
            &self.source[line_start..line_end],
            " ".repeat(offset - line_start)
        );
        self.error(kind, offset, message)
    }

    fn syntax_error(&self, offset: usize) -> QueryError {
        self.located_error(QueryErrorKind::Syntax, offset)
    }

    fn structure_error(&self, offset: usize) -> QueryError {
        self.located_error(QueryErrorKind::Structure, offset)
    }

    // -----------------------------------------------------------------------
    // Structure checks
    // -----------------------------------------------------------------------

    fn check_field(&self, parent: Option<Symbol>, field: FieldId, offset: usize) -> Result<(), QueryError> {
        let Some(parent) = parent else {
            return Ok(());
        };
        let allowed = self
            .language
            .node_type(parent)
            .is_some_and(|info| info.fields.iter().any(|(id, _)| *id == field));
        if allowed {
            Ok(())
        } else {
            Err(self.structure_error(offset))
        }
    }

    /// `symbol` is `None` for wildcards, which only require the parent to
    /// have children at all.
    fn check_child(&self, ctx: Context, symbol: Option<Symbol>, offset: usize) -> Result<(), QueryError> {
        let Some(parent) = ctx.parent else {
            return Ok(());
        };
        let Some(info) = self.language.node_type(parent) else {
            return Err(self.structure_error(offset));
        };
        let Some(symbol) = symbol else {
            return Ok(());
        };
        if symbol == BUILTIN_SYM_ERROR || self.language.is_extra(symbol) {
            return Ok(());
        }
        let allowed = if ctx.field == 0 {
            info.children.contains(&symbol)
                || info.fields.iter().any(|(_, symbols)| symbols.contains(&symbol))
        } else {
            info.fields
                .iter()
                .any(|(id, symbols)| *id == ctx.field && symbols.contains(&symbol))
        };
        if allowed {
            Ok(())
        } else {
            Err(self.structure_error(offset))
        }
    }

    // -----------------------------------------------------------------------
    // Patterns
    // -----------------------------------------------------------------------

    fn parse_item(&mut self, ctx: Context) -> Result<Item, QueryError> {
        self.skip_trivia();
        let start = self.pos;
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                self.skip_trivia();
                match self.peek() {
                    Some(b'#') => {
                        self.parse_predicate(start)?;
                        Ok(Item::Predicate)
                    }
                    Some(b'(' | b'[' | b'"') => self.parse_group(ctx, start),
                    _ => self.parse_node(ctx, start).map(Item::Pattern),
                }
            }
            Some(b'[') => {
                self.pos += 1;
                self.parse_alternation(ctx, start).map(Item::Pattern)
            }
            Some(b'"') => {
                let value = self.read_string()?;
                let symbol = self.language.symbol_for_name(&value, false);
                if symbol == 0 {
                    return Err(self.error(QueryErrorKind::NodeType, start + 1, value));
                }
                self.check_child(ctx, Some(symbol), start)?;
                self.finish_node(NodeMatcher::Symbol(symbol), Vec::new(), Vec::new())
                    .map(Item::Pattern)
            }
            Some(b'*') => {
                self.pos += 1;
                self.check_child(ctx, None, start)?;
                self.finish_node(NodeMatcher::Any, Vec::new(), Vec::new()).map(Item::Pattern)
            }
            Some(b'!') => {
                self.pos += 1;
                let name_start = self.pos;
                let name = self.read_identifier();
                let field = self.language.field_id_for_name(&name);
                if field == 0 {
                    return Err(self.error(QueryErrorKind::Field, name_start, name));
                }
                self.check_field(ctx.parent, field, name_start)?;
                Ok(Item::NegatedField(field))
            }
            Some(byte) if is_identifier_byte(byte) => {
                let name = self.read_identifier();
                if name == "_" {
                    self.check_child(ctx, None, start)?;
                    return self
                        .finish_node(NodeMatcher::Any, Vec::new(), Vec::new())
                        .map(Item::Pattern);
                }
                self.parse_field(ctx, name, start)
            }
            _ => Err(self.syntax_error(start)),
        }
    }

    /// `name: pattern`. `self.pos` is just past the name.
    fn parse_field(&mut self, ctx: Context, name: String, name_start: usize) -> Result<Item, QueryError> {
        self.skip_trivia();
        if self.peek() != Some(b':') {
            return Err(self.syntax_error(name_start));
        }
        self.pos += 1;

        let field = self.language.field_id_for_name(&name);
        if field == 0 {
            return Err(self.error(QueryErrorKind::Field, name_start, name));
        }
        self.check_field(ctx.parent, field, name_start)?;

        self.skip_trivia();
        let value_start = self.pos;
        let field_ctx = Context { field, ..ctx };
        match self.parse_item(field_ctx)? {
            Item::Pattern(mut pattern) => {
                pattern.field = field;
                Ok(Item::Pattern(pattern))
            }
            Item::Group(_) | Item::NegatedField(_) | Item::Predicate => Err(self.syntax_error(value_start)),
        }
    }

    /// `(name child...)`. `self.pos` is at the name.
    fn parse_node(&mut self, ctx: Context, start: usize) -> Result<PatternNode, QueryError> {
        let name_start = self.pos;
        let name = self.read_identifier();
        if name.is_empty() {
            return Err(self.syntax_error(name_start));
        }

        let matcher = match name.as_str() {
            "_" => NodeMatcher::AnyNamed,
            "MISSING" => return self.parse_missing(ctx, start),
            _ => {
                let symbol = self.language.symbol_for_name(&name, true);
                if symbol == 0 {
                    return Err(self.error(QueryErrorKind::NodeType, name_start, name));
                }
                NodeMatcher::Symbol(symbol)
            }
        };
        let checked = match matcher {
            NodeMatcher::Symbol(symbol) => Some(symbol),
            _ => None,
        };
        self.check_child(ctx, checked, start)?;

        let child_ctx = Context {
            parent: checked.filter(|&symbol| symbol != BUILTIN_SYM_ERROR),
            field: 0,
        };
        let mut children = Vec::new();
        let mut negated_fields = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                None => return Err(self.syntax_error(self.pos)),
                Some(_) => {}
            }
            match self.parse_item(child_ctx)? {
                Item::Pattern(pattern) => children.push(pattern),
                Item::Group(sequence) => children.extend(sequence),
                Item::NegatedField(field) => negated_fields.push(field),
                Item::Predicate => {}
            }
        }

        self.finish_node(matcher, children, negated_fields)
    }

    /// `(MISSING)`, `(MISSING name)` or `(MISSING "token")`. `self.pos` is
    /// just past the `MISSING` keyword.
    fn parse_missing(&mut self, ctx: Context, start: usize) -> Result<PatternNode, QueryError> {
        self.skip_trivia();
        let name_start = self.pos;
        let symbol = match self.peek() {
            Some(b'"') => {
                let value = self.read_string()?;
                let symbol = self.language.symbol_for_name(&value, false);
                if symbol == 0 {
                    return Err(self.error(QueryErrorKind::NodeType, name_start + 1, value));
                }
                Some(symbol)
            }
            Some(byte) if is_identifier_byte(byte) => {
                let name = self.read_identifier();
                let symbol = self.language.symbol_for_name(&name, true);
                if symbol == 0 {
                    return Err(self.error(QueryErrorKind::NodeType, name_start, name));
                }
                Some(symbol)
            }
            _ => None,
        };
        self.check_child(ctx, symbol, start)?;

        self.skip_trivia();
        if self.peek() != Some(b')') {
            return Err(self.syntax_error(self.pos));
        }
        self.pos += 1;
        self.finish_node(NodeMatcher::Missing(symbol), Vec::new(), Vec::new())
    }

    /// `((a) (b) ...)`. `self.pos` is at the first element.
    fn parse_group(&mut self, ctx: Context, start: usize) -> Result<Item, QueryError> {
        let group_ctx = Context { field: 0, ..ctx };
        let mut elements = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                None => return Err(self.syntax_error(self.pos)),
                Some(_) => {}
            }
            let item_start = self.pos;
            match self.parse_item(group_ctx)? {
                Item::Pattern(pattern) => elements.push(pattern),
                Item::Group(sequence) => elements.extend(sequence),
                Item::Predicate => {}
                Item::NegatedField(_) => return Err(self.syntax_error(item_start)),
            }
        }

        let mut captures = Vec::new();
        self.parse_captures(&mut captures)?;
        let Some(first) = elements.first_mut() else {
            return Err(self.syntax_error(start));
        };
        first.captures.extend(captures);

        if elements.len() == 1 {
            if let Some(pattern) = elements.pop() {
                return Ok(Item::Pattern(pattern));
            }
        }
        Ok(Item::Group(elements))
    }

    /// `[a b ...]`. `self.pos` is just past the bracket.
    fn parse_alternation(&mut self, ctx: Context, start: usize) -> Result<PatternNode, QueryError> {
        let mut alternatives = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                None => return Err(self.syntax_error(self.pos)),
                Some(_) => {}
            }
            let item_start = self.pos;
            match self.parse_item(ctx)? {
                Item::Pattern(pattern) => alternatives.push(pattern),
                Item::Group(_) | Item::NegatedField(_) | Item::Predicate => {
                    return Err(self.syntax_error(item_start));
                }
            }
        }
        if alternatives.is_empty() {
            return Err(self.syntax_error(start));
        }

        let mut captures = Vec::new();
        self.parse_captures(&mut captures)?;
        Ok(PatternNode {
            step: Step::Alternation(alternatives),
            field: 0,
            captures,
        })
    }

    fn finish_node(
        &mut self,
        matcher: NodeMatcher,
        children: Vec<PatternNode>,
        negated_fields: Vec<FieldId>,
    ) -> Result<PatternNode, QueryError> {
        let mut captures = Vec::new();
        self.parse_captures(&mut captures)?;
        Ok(PatternNode {
            step: Step::Node {
                matcher,
                children,
                negated_fields,
            },
            field: 0,
            captures,
        })
    }

    fn parse_captures(&mut self, captures: &mut Vec<u32>) -> Result<(), QueryError> {
        loop {
            self.skip_trivia();
            if self.peek() != Some(b'@') {
                return Ok(());
            }
            let start = self.pos;
            self.pos += 1;
            let name = self.read_identifier();
            if name.is_empty() {
                return Err(self.syntax_error(start));
            }
            let id = match self.capture_names.iter().position(|capture| *capture == name) {
                Some(id) => id,
                None => {
                    self.capture_names.push(name);
                    self.capture_names.len() - 1
                }
            };
            captures.push(id as u32);
        }
    }

    // -----------------------------------------------------------------------
    // Predicates
    // -----------------------------------------------------------------------

    fn intern_string(&mut self, value: &str) {
        if !self.strings.iter().any(|string| string == value) {
            self.strings.push(value.to_owned());
        }
    }

    /// `(#name? arg...)`. `self.pos` is at the `#`.
    fn parse_predicate(&mut self, start: usize) -> Result<(), QueryError> {
        self.pos += 1;
        let operator = self
            .read_while(|byte| is_identifier_byte(byte) || matches!(byte, b'?' | b'!'))
            .to_owned();
        if operator.is_empty() {
            return Err(self.syntax_error(self.pos));
        }

        let mut args = Vec::new();
        loop {
            self.skip_trivia();
            let arg_start = self.pos;
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(b'@') => {
                    self.pos += 1;
                    let name = self.read_identifier();
                    let Some(id) = self.capture_names.iter().position(|capture| *capture == name) else {
                        return Err(self.error(QueryErrorKind::Capture, arg_start, name));
                    };
                    args.push((QueryPredicateArg::Capture(id as u32), arg_start));
                }
                Some(b'"') => {
                    let value = self.read_string()?;
                    self.intern_string(&value);
                    args.push((QueryPredicateArg::String(value.into()), arg_start));
                }
                Some(byte) if is_identifier_byte(byte) => {
                    let value = self.read_identifier();
                    self.intern_string(&value);
                    args.push((QueryPredicateArg::String(value.into()), arg_start));
                }
                _ => return Err(self.syntax_error(arg_start)),
            }
        }

        self.add_predicate(&operator, args, start)
    }

    fn add_predicate(
        &mut self,
        operator: &str,
        args: Vec<(QueryPredicateArg, usize)>,
        start: usize,
    ) -> Result<(), QueryError> {
        let predicate_error = |compiler: &Self, message: String| {
            compiler.error(QueryErrorKind::Predicate, start, message)
        };

        match operator {
            "eq?" | "not-eq?" | "any-eq?" | "any-not-eq?" => {
                let is_positive = operator == "eq?" || operator == "any-eq?";
                let match_all_nodes = !operator.starts_with("any-");
                if args.len() != 2 {
                    return Err(predicate_error(
                        self,
                        format!(
                            "Wrong number of arguments to #{operator} predicate. Expected 2, got {}.",
                            args.len()
                        ),
                    ));
                }
                let QueryPredicateArg::Capture(capture) = args[0].0 else {
                    return Err(predicate_error(
                        self,
                        format!("First argument to #{operator} predicate must be a capture name."),
                    ));
                };
                let predicate = match &args[1].0 {
                    QueryPredicateArg::Capture(other) => {
                        TextPredicate::EqCapture(capture, *other, is_positive, match_all_nodes)
                    }
                    QueryPredicateArg::String(value) => {
                        TextPredicate::EqString(capture, value.clone(), is_positive, match_all_nodes)
                    }
                };
                self.text_predicates.push(predicate);
            }

            "match?" | "not-match?" | "any-match?" | "any-not-match?" => {
                let is_positive = operator == "match?" || operator == "any-match?";
                let match_all_nodes = !operator.starts_with("any-");
                if args.len() != 2 {
                    return Err(predicate_error(
                        self,
                        format!(
                            "Wrong number of arguments to #{operator} predicate. Expected 2, got {}.",
                            args.len()
                        ),
                    ));
                }
                let QueryPredicateArg::Capture(capture) = args[0].0 else {
                    return Err(predicate_error(
                        self,
                        format!("First argument to #{operator} predicate must be a capture name."),
                    ));
                };
                let (QueryPredicateArg::String(pattern), pattern_start) = &args[1] else {
                    return Err(predicate_error(
                        self,
                        format!("Second argument to #{operator} predicate must be a literal."),
                    ));
                };
                let regex = self.compile_regex(pattern, *pattern_start)?;
                self.text_predicates.push(TextPredicate::MatchString(
                    capture,
                    regex,
                    is_positive,
                    match_all_nodes,
                ));
            }

            "any-of?" | "not-any-of?" => {
                let is_positive = operator == "any-of?";
                if args.len() < 2 {
                    return Err(predicate_error(
                        self,
                        format!("Wrong number of arguments to #{operator} predicate. Expected at least 1."),
                    ));
                }
                let QueryPredicateArg::Capture(capture) = args[0].0 else {
                    return Err(predicate_error(
                        self,
                        format!("First argument to #{operator} predicate must be a capture name."),
                    ));
                };
                let mut values = Vec::with_capacity(args.len() - 1);
                for (arg, _) in &args[1..] {
                    match arg {
                        QueryPredicateArg::String(value) => values.push(value.clone()),
                        QueryPredicateArg::Capture(_) => {
                            return Err(predicate_error(
                                self,
                                format!("Arguments to #{operator} predicate must be literals."),
                            ));
                        }
                    }
                }
                self.text_predicates
                    .push(TextPredicate::AnyString(capture, values.into(), is_positive));
            }

            _ => self.general_predicates.push(QueryPredicate {
                operator: operator.into(),
                args: args.into_iter().map(|(arg, _)| arg).collect(),
            }),
        }
        Ok(())
    }

    /// `string_start` is the offset of the opening quote.
    fn compile_regex(&self, pattern: &str, string_start: usize) -> Result<Regex, QueryError> {
        if let Err(err) = regex_syntax::ast::parse::Parser::new().parse(pattern) {
            let offset = string_start + 1 + err.span().start.offset;
            return Err(self.error(QueryErrorKind::Predicate, offset, err.kind().to_string()));
        }
        Regex::new(pattern).map_err(|err| self.error(QueryErrorKind::Predicate, string_start, err.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

type Captures = Vec<(u32, NodeRef)>;

/// Every capture assignment under which `pattern` matches `node`, which
/// is attached to its parent under `field`.
fn match_node(pattern: &PatternNode, node: &NodeRef, field: FieldId) -> Vec<Captures> {
    if pattern.field != 0 && pattern.field != field {
        return Vec::new();
    }

    let mut solutions = match &pattern.step {
        Step::Alternation(alternatives) => alternatives
            .iter()
            .flat_map(|alternative| match_node(alternative, node, field))
            .collect(),
        Step::Node {
            matcher,
            children,
            negated_fields,
        } => {
            if !matcher.accepts(node) {
                return Vec::new();
            }
            if negated_fields
                .iter()
                .any(|&field| node.child_by_field_id(field).is_some())
            {
                return Vec::new();
            }
            if children.is_empty() {
                vec![Vec::new()]
            } else {
                match_sequence(children, &node.children(), 0)
            }
        }
    };

    if !pattern.captures.is_empty() {
        for solution in &mut solutions {
            let mut captures: Captures = pattern
                .captures
                .iter()
                .map(|&capture| (capture, node.clone()))
                .collect();
            captures.append(solution);
            *solution = captures;
        }
    }
    solutions
}

/// Match `patterns` in order against `siblings[start..]`. Siblings that no
/// pattern accounts for may appear between the matched ones.
fn match_sequence(patterns: &[PatternNode], siblings: &[(NodeRef, FieldId)], start: usize) -> Vec<Captures> {
    let Some((first, rest)) = patterns.split_first() else {
        return vec![Vec::new()];
    };

    let mut solutions = Vec::new();
    for (i, (sibling, field)) in siblings.iter().enumerate().skip(start) {
        let heads = match_node(first, sibling, *field);
        if heads.is_empty() {
            continue;
        }
        let tails = match_sequence(rest, siblings, i + 1);
        for head in &heads {
            for tail in &tails {
                let mut solution = head.clone();
                solution.extend(tail.iter().cloned());
                solutions.push(solution);
            }
        }
    }
    solutions
}

fn overlaps<T: Ord + Copy>(start: T, end: T, range: &Span<T>) -> bool {
    if start == end {
        range.start <= start && start < range.end
    } else {
        start < range.end && end > range.start
    }
}

#[derive(Clone, Debug)]
pub struct RawMatch {
    pub pattern_index: usize,
    pub captures: Captures,
}

struct PendingCapture {
    start_byte: u32,
    order: u64,
    raw_match: RawMatch,
    capture_index: usize,
}

/// Lazy execution of a query below one node, in document order.
pub struct QueryExec {
    query: Arc<QueryData>,
    tree_root: NodeRef,
    cursor: TreeCursor,
    start_depth: usize,
    byte_range: Span<u32>,
    point_range: Span<Point>,
    started: bool,
    finished: bool,
    in_range: bool,
    /// Start of the node visited last. Nothing found later starts before it.
    frontier: u32,
    matches: VecDeque<RawMatch>,
    captures: Vec<PendingCapture>,
    capture_order: u64,
}

pub const FULL_BYTE_RANGE: Span<u32> = 0..u32::MAX;
pub const FULL_POINT_RANGE: Span<Point> = POINT_ZERO..POINT_MAX;

impl QueryExec {
    pub fn new(query: Arc<QueryData>, tree_root: NodeRef, node: &NodeRef) -> Self {
        Self {
            query,
            tree_root,
            cursor: TreeCursor::new(node),
            start_depth: node.path.len(),
            byte_range: FULL_BYTE_RANGE,
            point_range: FULL_POINT_RANGE,
            started: false,
            finished: false,
            in_range: false,
            frontier: 0,
            matches: VecDeque::new(),
            captures: Vec::new(),
            capture_order: 0,
        }
    }

    #[inline]
    pub fn query(&self) -> &Arc<QueryData> {
        &self.query
    }

    pub fn set_byte_range(&mut self, range: Span<u32>) {
        self.byte_range = range;
    }

    pub fn set_point_range(&mut self, range: Span<Point>) {
        self.point_range = range;
    }

    fn next_node(&mut self) -> Option<(NodeRef, FieldId)> {
        if self.finished {
            return None;
        }
        if !self.started {
            self.started = true;
        } else if !(self.in_range && self.cursor.goto_first_child()) {
            while !self.cursor.goto_next_sibling() {
                if !self.cursor.goto_parent() {
                    self.finished = true;
                    return None;
                }
            }
        }

        let node = self.cursor.current_node();
        self.in_range = overlaps(node.start_byte(), node.end_byte(), &self.byte_range)
            && overlaps(node.start_point(), node.end_point(), &self.point_range);
        self.frontier = node.start_byte();
        Some((node, self.cursor.current_field_id()))
    }

    fn visit(&self, node: &NodeRef, field: FieldId) -> Vec<RawMatch> {
        let mut found = Vec::new();
        let mut siblings = None;
        for (pattern_index, pattern) in self.query.patterns.iter().enumerate() {
            let Some((first, rest)) = pattern.sequence.split_first() else {
                continue;
            };
            let heads = match_node(first, node, field);
            if heads.is_empty() {
                continue;
            }
            let tails = if rest.is_empty() {
                vec![Vec::new()]
            } else {
                let (list, index) = siblings.get_or_insert_with(|| self.siblings_of(node));
                match_sequence(rest, list, *index + 1)
            };
            for head in &heads {
                for tail in &tails {
                    let mut captures = head.clone();
                    captures.extend(tail.iter().cloned());
                    found.push(RawMatch {
                        pattern_index,
                        captures,
                    });
                }
            }
        }
        found
    }

    /// Siblings available to sibling patterns. The node the query runs on
    /// has none.
    fn siblings_of(&self, node: &NodeRef) -> (Vec<(NodeRef, FieldId)>, usize) {
        if node.path.len() <= self.start_depth {
            return (Vec::new(), 0);
        }
        node.siblings(&self.tree_root).unwrap_or_default()
    }

    pub fn next_match(&mut self) -> Option<RawMatch> {
        loop {
            if let Some(raw_match) = self.matches.pop_front() {
                return Some(raw_match);
            }
            let (node, field) = self.next_node()?;
            if self.in_range {
                let found = self.visit(&node, field);
                self.matches.extend(found);
            }
        }
    }

    /// The next capture in document order, with the match it belongs to.
    pub fn next_capture(&mut self) -> Option<(RawMatch, usize)> {
        loop {
            if let Some(index) = self.ready_capture() {
                let pending = self.captures.remove(index);
                return Some((pending.raw_match, pending.capture_index));
            }
            if self.finished {
                return None;
            }
            let Some((node, field)) = self.next_node() else {
                continue;
            };
            if !self.in_range {
                continue;
            }
            for raw_match in self.visit(&node, field) {
                for (capture_index, (_, captured)) in raw_match.captures.iter().enumerate() {
                    self.captures.push(PendingCapture {
                        start_byte: captured.start_byte(),
                        order: self.capture_order,
                        raw_match: raw_match.clone(),
                        capture_index,
                    });
                    self.capture_order += 1;
                }
            }
        }
    }

    fn ready_capture(&self) -> Option<usize> {
        let (index, pending) = self
            .captures
            .iter()
            .enumerate()
            .min_by_key(|(_, pending)| (pending.start_byte, pending.order))?;
        (self.finished || pending.start_byte < self.frontier).then_some(index)
    }
}
