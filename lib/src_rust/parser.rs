//! The parse driver.
//!
//! A grammar's parse function runs against a [`ParseContext`]. It looks at
//! tokens with `peek`/`at`, consumes them with `bump`, and brackets nodes
//! with [`Marker`]s. The context records a flat list of events; once the
//! grammar returns, the events are folded into a [`Subtree`]. Previously
//! parsed subtrees can be spliced in whole through [`ParseContext::reuse`].

use std::mem;

use drop_bomb::DropBomb;

use crate::{LogType, Logger, Range};

use super::language::{
    FieldId, LanguageDefinition, StateId, Symbol, BUILTIN_SYM_END, BUILTIN_SYM_ERROR, STATE_NONE,
};
use super::length::{length_zero, Length};
use super::lexer::{Lexer, DEFAULT_RANGE};
use super::reusable_node::ReusableNode;
use super::subtree::Subtree;

macro_rules! log {
    ($self:ident, $($arg:tt)*) => {
        if $self.lexer.has_logger() {
            $self.lexer.log_with_type(LogType::Parse, format_args!($($arg)*));
        }
    };
}

pub struct ParseOptions<'a> {
    pub included_ranges: &'a [Range],
    pub operation_limit: usize,
    pub logger: Option<&'a mut Logger>,
}

/// Parse `input` with `language`. `old_root` is an edited tree whose
/// unchanged subtrees may be reused.
pub fn parse(
    language: &'static LanguageDefinition,
    input: &[u8],
    old_root: Option<&Subtree>,
    options: ParseOptions<'_>,
) -> Subtree {
    let included_ranges = if options.included_ranges.is_empty() {
        std::slice::from_ref(&DEFAULT_RANGE)
    } else {
        options.included_ranges
    };

    let mut p = ParseContext {
        language,
        lexer: Lexer::new(input, included_ranges, options.logger),
        events: Vec::new(),
        lookahead: None,
        position: length_zero(),
        reusable: old_root.map(|root| ReusableNode::new(root.clone(), input.len() as u32)),
        operation_count: 0,
        operation_limit: options.operation_limit,
        halted: false,
    };

    log!(p, "new_parse");
    (language.parse_fn)(&mut p);
    p.finish()
}

#[derive(Debug)]
enum Event {
    Start {
        symbol: Option<Symbol>,
        forward_parent: Option<u32>,
        field: FieldId,
        state: StateId,
    },
    Leaf {
        subtree: Subtree,
        forward_parent: Option<u32>,
        field: FieldId,
    },
    Finish,
}

impl Event {
    const TOMBSTONE: Self = Self::Start {
        symbol: None,
        forward_parent: None,
        field: 0,
        state: STATE_NONE,
    };
}

pub struct ParseContext<'a> {
    language: &'static LanguageDefinition,
    lexer: Lexer<'a>,
    events: Vec<Event>,
    /// A token that has been lexed but not consumed yet.
    lookahead: Option<Subtree>,
    /// The end of everything consumed so far.
    position: Length,
    reusable: Option<ReusableNode>,
    operation_count: usize,
    operation_limit: usize,
    halted: bool,
}

// ===========================================================================
// Grammar API
// ===========================================================================

impl ParseContext<'_> {
    #[inline]
    pub fn language(&self) -> &'static LanguageDefinition {
        self.language
    }

    /// The kind of the next non-extra token. Extras met on the way are
    /// attached to the tree where they appear.
    pub fn peek(&mut self) -> Symbol {
        loop {
            if self.halted {
                return BUILTIN_SYM_END;
            }
            if let Some(token) = &self.lookahead {
                return token.symbol;
            }
            let token = self.lex();
            if self.halted {
                return BUILTIN_SYM_END;
            }
            if token.extra {
                self.consume(token);
            } else {
                self.lookahead = Some(token);
            }
        }
    }

    #[inline]
    pub fn at(&mut self, symbol: Symbol) -> bool {
        self.peek() == symbol
    }

    #[inline]
    pub fn at_eof(&mut self) -> bool {
        self.peek() == BUILTIN_SYM_END
    }

    /// Consume the next token. The end-of-input token is never consumed.
    pub fn bump(&mut self) {
        if self.peek() == BUILTIN_SYM_END {
            return;
        }
        if let Some(token) = self.lookahead.take() {
            let name = self.symbol_name(token.symbol);
            log!(self, "shift sym:{name}");
            self.consume(token);
        }
    }

    pub fn eat(&mut self, symbol: Symbol) -> bool {
        if self.at(symbol) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume `symbol`, or insert a missing `symbol` in its place.
    pub fn expect(&mut self, symbol: Symbol) -> bool {
        if self.eat(symbol) {
            true
        } else {
            self.missing(symbol);
            false
        }
    }

    /// Insert a zero-width missing `symbol` at the current position.
    pub fn missing(&mut self, symbol: Symbol) {
        let name = self.symbol_name(symbol);
        log!(self, "recover_with_missing symbol:{name}");
        let metadata = self.language.symbol_metadata(symbol);
        let subtree = Subtree::new_missing_leaf(symbol, length_zero(), 0, metadata);
        self.events.push(Event::Leaf {
            subtree,
            forward_parent: None,
            field: 0,
        });
    }

    /// Wrap the next token in an `ERROR` node.
    pub fn skip_token(&mut self) {
        let symbol = self.peek();
        if symbol == BUILTIN_SYM_END {
            return;
        }
        let name = self.symbol_name(symbol);
        log!(self, "skip_token symbol:{name}");
        let m = self.start();
        self.bump();
        m.complete(self, BUILTIN_SYM_ERROR);
    }

    pub fn start(&mut self) -> Marker {
        let pos = self.events.len() as u32;
        self.events.push(Event::TOMBSTONE);
        Marker::new(pos)
    }

    /// Splice in a subtree of the previous tree that starts exactly here and
    /// was completed in `state`. A buffered lookahead always starts here, so
    /// it is dropped and lexed again after the reused subtree.
    pub fn reuse(&mut self, state: StateId) -> Option<CompletedMarker> {
        if self.halted {
            return None;
        }
        let subtree = self.reusable.as_ref()?.find(self.position.bytes, state)?;
        if self.lookahead.take().is_some() {
            log!(self, "discard_lookahead");
        }

        let name = self.symbol_name(subtree.symbol);
        log!(self, "reuse_node symbol:{name}");
        self.position = self.position + subtree.total_size();
        self.lexer.reset(self.position);

        let pos = self.events.len() as u32;
        self.events.push(Event::Leaf {
            subtree,
            forward_parent: None,
            field: 0,
        });
        self.tick();
        Some(CompletedMarker::new(pos))
    }

    /// Whether the operation limit stopped the parse. Once halted, the
    /// context reports end of input and consumes nothing.
    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }
}

// ===========================================================================
// Internals
// ===========================================================================

impl ParseContext<'_> {
    fn symbol_name(&self, symbol: Symbol) -> &'static str {
        self.language.symbol_name(symbol).unwrap_or("")
    }

    fn tick(&mut self) {
        self.operation_count += 1;
        if self.operation_limit > 0 && self.operation_count > self.operation_limit && !self.halted {
            self.halted = true;
            let limit = self.operation_limit;
            log!(self, "halt operation_limit:{limit}");
        }
    }

    fn consume(&mut self, token: Subtree) {
        self.position = self.position + token.total_size();
        self.events.push(Event::Leaf {
            subtree: token,
            forward_parent: None,
            field: 0,
        });
    }

    fn lex(&mut self) -> Subtree {
        let start_position = self.position;
        self.lexer.reset(start_position);
        self.lexer.start();

        let found = (self.language.lex_fn)(&mut self.lexer);
        let skipped_to = self.lexer.token_start_position();

        let token = if found {
            let lookahead_end_byte = self.lexer.finish();
            let token_start = self.lexer.token_start_position();
            let token_end = self.lexer.token_end_position();
            let symbol = self.lexer.result_symbol;
            Subtree::new_leaf(
                symbol,
                token_start - start_position,
                token_end - token_start,
                lookahead_end_byte.saturating_sub(token_end.bytes),
                self.language.symbol_metadata(symbol),
                self.language.is_extra(symbol),
            )
        } else if self.lexer.eof() && self.lexer.current_position().bytes == skipped_to.bytes {
            let lookahead_end_byte = self.lexer.finish();
            Subtree::new_leaf(
                BUILTIN_SYM_END,
                skipped_to - start_position,
                length_zero(),
                lookahead_end_byte.saturating_sub(skipped_to.bytes),
                self.language.symbol_metadata(BUILTIN_SYM_END),
                false,
            )
        } else {
            // Nothing matched: consume one character as an unexpected leaf.
            self.lexer.reset(skipped_to);
            self.lexer.start();
            let character = self.lexer.lookahead();
            log!(self, "skip_unrecognized_character");
            self.lexer.advance(false);
            self.lexer.mark_end();
            let lookahead_end_byte = self.lexer.finish();
            let token_end = self.lexer.token_end_position();
            Subtree::new_error(
                Some(character),
                skipped_to - start_position,
                token_end - skipped_to,
                lookahead_end_byte.saturating_sub(token_end.bytes),
            )
        };

        let end = start_position + token.total_size();
        self.lexer.reset(end);

        let name = self.symbol_name(token.symbol);
        let size = token.size.bytes;
        log!(self, "lexed_lookahead sym:{name}, size:{size}");
        self.tick();
        token
    }

    fn finish(mut self) -> Subtree {
        // Anything the grammar left behind becomes an error.
        while !self.at_eof() {
            self.skip_token();
        }

        let eof = match self.lookahead.take() {
            Some(token) if !self.halted => token,
            _ => {
                self.lexer.reset(self.position);
                let end = self.lexer.skip_to_end();
                if end.bytes > self.position.bytes {
                    let rest = Subtree::new_error(None, length_zero(), end - self.position, 0);
                    self.consume(rest);
                }
                Subtree::new_leaf(
                    BUILTIN_SYM_END,
                    length_zero(),
                    length_zero(),
                    0,
                    self.language.symbol_metadata(BUILTIN_SYM_END),
                    false,
                )
            }
        };

        let language = self.language;
        let mut items = build_tree(language, mem::take(&mut self.events));
        items.push((eof, 0));
        let root = assemble_root(language, items);
        log!(self, "done");
        root
    }
}

/// Fold the event list into the top-level subtrees it describes.
fn build_tree(language: &LanguageDefinition, mut events: Vec<Event>) -> Vec<(Subtree, FieldId)> {
    struct Frame {
        symbol: Symbol,
        field: FieldId,
        state: StateId,
        children: Vec<Subtree>,
        field_ids: Vec<FieldId>,
    }

    let mut stack = vec![Frame {
        symbol: BUILTIN_SYM_END,
        field: 0,
        state: STATE_NONE,
        children: Vec::new(),
        field_ids: Vec::new(),
    }];
    let mut forward_parents = Vec::new();

    for i in 0..events.len() {
        let (start, mut fp) = match mem::replace(&mut events[i], Event::TOMBSTONE) {
            Event::Start {
                symbol,
                forward_parent,
                field,
                state,
            } => {
                if symbol.is_none() && forward_parent.is_none() {
                    continue;
                }
                forward_parents.push((symbol, field, state));
                (None, forward_parent)
            }
            Event::Leaf {
                subtree,
                forward_parent,
                field,
            } => (Some((subtree, field)), forward_parent),
            Event::Finish => {
                if let Some(frame) = stack.pop() {
                    let node = if frame.symbol == BUILTIN_SYM_ERROR {
                        Subtree::new_error_node(frame.children)
                    } else {
                        Subtree::new_node(
                            frame.symbol,
                            frame.children,
                            frame.field_ids,
                            language.symbol_metadata(frame.symbol),
                            frame.state,
                        )
                    };
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(node);
                        parent.field_ids.push(frame.field);
                    }
                }
                continue;
            }
        };

        let mut idx = i;
        while let Some(fwd) = fp {
            idx += fwd as usize;
            fp = match mem::replace(&mut events[idx], Event::TOMBSTONE) {
                Event::Start {
                    symbol,
                    forward_parent,
                    field,
                    state,
                } => {
                    forward_parents.push((symbol, field, state));
                    forward_parent
                }
                _ => unreachable!(),
            };
        }

        for (symbol, field, state) in forward_parents.drain(..).rev() {
            if let Some(symbol) = symbol {
                stack.push(Frame {
                    symbol,
                    field,
                    state,
                    children: Vec::new(),
                    field_ids: Vec::new(),
                });
            }
        }

        if let (Some((subtree, field)), Some(frame)) = (start, stack.last_mut()) {
            frame.children.push(subtree);
            frame.field_ids.push(field);
        }
    }

    let Some(root) = stack.into_iter().next() else {
        return Vec::new();
    };
    root.children.into_iter().zip(root.field_ids).collect()
}

/// The single non-extra, error-free top-level node becomes the root and
/// absorbs the surrounding extras, errors, and the end-of-input token.
/// Anything else is wrapped in an `ERROR` root.
fn assemble_root(language: &LanguageDefinition, items: Vec<(Subtree, FieldId)>) -> Subtree {
    let mut principals = items
        .iter()
        .enumerate()
        .filter(|(_, (subtree, _))| !subtree.extra && !subtree.is_error() && !subtree.is_eof());
    let principal = match (principals.next(), principals.next()) {
        (Some((index, (subtree, _))), None) if !subtree.children.is_empty() => Some(index),
        _ => None,
    };

    let Some(principal) = principal else {
        return Subtree::new_error_node(items.into_iter().map(|(subtree, _)| subtree).collect());
    };

    let symbol = items[principal].0.symbol;
    let mut children = Vec::new();
    let mut field_ids = Vec::new();
    for (i, (subtree, _)) in items.into_iter().enumerate() {
        if i == principal {
            children.extend(subtree.children.iter().cloned());
            field_ids.extend(subtree.field_ids.iter().copied());
        } else {
            children.push(subtree);
            field_ids.push(0);
        }
    }
    Subtree::new_node(
        symbol,
        children,
        field_ids,
        language.symbol_metadata(symbol),
        STATE_NONE,
    )
}

// ===========================================================================
// Markers
// ===========================================================================

pub struct Marker {
    pos: u32,
    bomb: DropBomb,
}

impl Marker {
    fn new(pos: u32) -> Self {
        Self {
            pos,
            bomb: DropBomb::new("Marker must be either completed or abandoned"),
        }
    }

    pub fn complete(mut self, p: &mut ParseContext<'_>, symbol: Symbol) -> CompletedMarker {
        self.bomb.defuse();

        match &mut p.events[self.pos as usize] {
            Event::Start { symbol: slot, .. } => *slot = Some(symbol),
            _ => unreachable!(),
        }
        p.events.push(Event::Finish);

        let name = p.symbol_name(symbol);
        log!(p, "reduce sym:{name}");
        p.tick();
        CompletedMarker::new(self.pos)
    }

    pub fn abandon(mut self, p: &mut ParseContext<'_>) {
        self.bomb.defuse();
        if self.pos as usize == p.events.len() - 1 {
            p.events.pop();
        }
    }
}

pub struct CompletedMarker {
    pos: u32,
}

impl CompletedMarker {
    fn new(pos: u32) -> Self {
        Self { pos }
    }

    /// Start a node that will become the parent of this one.
    pub fn precede(self, p: &mut ParseContext<'_>) -> Marker {
        let new_pos = p.start();

        match &mut p.events[self.pos as usize] {
            Event::Start { forward_parent, .. } | Event::Leaf { forward_parent, .. } => {
                *forward_parent = Some(new_pos.pos - self.pos);
            }
            Event::Finish => unreachable!(),
        }

        new_pos
    }

    /// Attach this node to its parent under `field`.
    pub fn set_field(&self, p: &mut ParseContext<'_>, field: FieldId) {
        match &mut p.events[self.pos as usize] {
            Event::Start { field: slot, .. } | Event::Leaf { field: slot, .. } => *slot = field,
            Event::Finish => unreachable!(),
        }
    }

    /// Tag this node with the grammar state it can later be reused in.
    /// Reused subtrees keep the state they already carry.
    pub fn set_state(&self, p: &mut ParseContext<'_>, state: StateId) {
        if let Event::Start { state: slot, .. } = &mut p.events[self.pos as usize] {
            *slot = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::language::{SymbolMetadata, LANGUAGE_VERSION};
    use crate::grammars::arithmetic;

    const DIGIT: Symbol = 1;
    const NUMBER: Symbol = 2;

    static DIGITS: LanguageDefinition = LanguageDefinition {
        abi_version: LANGUAGE_VERSION,
        name: "digits",
        symbol_names: &["end", "digit", "number"],
        symbol_metadata: &[
            SymbolMetadata::AUXILIARY,
            SymbolMetadata::REGULAR,
            SymbolMetadata::REGULAR,
        ],
        field_names: &[""],
        extras: &[],
        node_types: &[],
        lex_fn: lex_digit,
        parse_fn: parse_digits,
    };

    fn lex_digit(lexer: &mut Lexer<'_>) -> bool {
        if !lexer.lookahead().is_ascii_digit() {
            return false;
        }
        lexer.advance(false);
        lexer.accept_token(DIGIT)
    }

    fn parse_digits(p: &mut ParseContext<'_>) {
        let m = p.start();
        while !p.at_eof() {
            p.bump();
        }
        let symbol = if p.is_halted() { BUILTIN_SYM_ERROR } else { NUMBER };
        m.complete(p, symbol);
    }

    fn options(operation_limit: usize) -> ParseOptions<'static> {
        ParseOptions {
            included_ranges: &[],
            operation_limit,
            logger: None,
        }
    }

    #[test]
    fn preceded_nodes_become_parents() {
        let root = parse(&arithmetic::DEFINITION, b"1 + 2 + 3", None, options(0));
        assert_eq!(
            root.string(&arithmetic::DEFINITION, false),
            "(expression (sum left: (expression (sum left: (expression (number)) right: (expression (number)))) right: (expression (number))))"
        );
        assert_eq!(root.total_bytes(), 9);
    }

    #[test]
    fn operation_limit_halts_the_grammar() {
        let root = parse(&DIGITS, b"123", None, options(0));
        assert_eq!(root.string(&DIGITS, false), "(number (digit) (digit) (digit))");

        let root = parse(&DIGITS, b"12345", None, options(2));
        assert!(root.is_error());
        assert!(root.has_error());
        assert_eq!(root.total_bytes(), 5);
    }
}
