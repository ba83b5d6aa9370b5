#![doc = "Incremental parsing with editable syntax trees, tree cursors and structural queries."]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[path = "../src_rust/mod.rs"]
mod engine;
pub mod grammars;
mod query;

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops;
use std::str::Utf8Error;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use engine::language::{LanguageDefinition, BUILTIN_SYM_ERROR};
use engine::lexer::{validate_included_ranges, DEFAULT_RANGE};
use engine::node::NodeRef;
use engine::parser::{parse, ParseOptions};
use engine::subtree::Subtree;
use engine::tree::TreeData;

pub use engine::language::{SymbolType, LANGUAGE_VERSION, MIN_COMPATIBLE_LANGUAGE_VERSION};
pub use query::{
    Query, QueryCapture, QueryCaptures, QueryCursor, QueryError, QueryErrorKind, QueryMatch,
    QueryMatches, QueryPredicate, QueryPredicateArg,
};
pub use streaming_iterator::{StreamingIterator, StreamingIteratorMut};

/// The interface between grammars and the parsing engine.
///
/// A grammar is a `static` [`LanguageDefinition`]: symbol and field tables,
/// a lex function driven through [`Lexer`](abi::Lexer), and a parse
/// function that builds nodes through [`ParseContext`](abi::ParseContext).
pub mod abi {
    pub use crate::engine::language::{
        FieldId, LanguageDefinition, LexFn, NodeTypeInfo, ParseFn, StateId, Symbol,
        SymbolMetadata, BUILTIN_SYM_END, BUILTIN_SYM_ERROR, LANGUAGE_VERSION,
        MIN_COMPATIBLE_LANGUAGE_VERSION, STATE_NONE,
    };
    pub use crate::engine::lexer::Lexer;
    pub use crate::engine::parser::{CompletedMarker, Marker, ParseContext};
}

/// A position in a multi-line text document, in terms of rows and columns.
///
/// Rows and columns are zero-based. Columns count bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

/// A range of positions in a multi-line text document, both in terms of
/// bytes and of rows and columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Range {
    pub start_byte: u32,
    pub end_byte: u32,
    pub start_point: Point,
    pub end_point: Point,
}

/// A summary of a change to a text document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputEdit {
    pub start_byte: u32,
    pub old_end_byte: u32,
    pub new_end_byte: u32,
    pub start_position: Point,
    pub old_end_position: Point,
    pub new_end_position: Point,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogType {
    Parse,
    Lex,
}

/// A callback that receives log messages produced while parsing.
pub type Logger = Box<dyn FnMut(LogType, &str) + Send>;

/// An error that occurred when trying to assign an incompatible [`Language`]
/// to a [`Parser`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error(
    "Incompatible language version {version}. Expected a version between {MIN_COMPATIBLE_LANGUAGE_VERSION} and {LANGUAGE_VERSION}"
)]
pub struct LanguageError {
    pub version: u32,
}

/// An error that occurred in [`Parser::set_included_ranges`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("Incorrect range by index: {0}")]
pub struct IncludedRangesError(pub usize);

impl Point {
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// An opaque handle to a grammar. Cheap to copy; equal when both handles
/// refer to the same definition.
#[derive(Clone, Copy)]
pub struct Language(&'static LanguageDefinition);

impl Language {
    pub const fn new(definition: &'static LanguageDefinition) -> Self {
        Self(definition)
    }

    #[inline]
    pub(crate) fn definition(&self) -> &'static LanguageDefinition {
        self.0
    }

    pub fn name(&self) -> &'static str {
        self.0.name
    }

    /// The ABI version the grammar was written against.
    pub fn abi_version(&self) -> u32 {
        self.0.abi_version
    }

    /// The number of distinct node kinds, the builtin `ERROR` not included.
    pub fn symbol_count(&self) -> u32 {
        self.0.symbol_count()
    }

    fn check_symbol(&self, id: u16) {
        assert!(
            id == BUILTIN_SYM_ERROR || u32::from(id) < self.symbol_count(),
            "Symbol id {id} is out of range for language {} with {} symbols",
            self.0.name,
            self.symbol_count(),
        );
    }

    /// The name of a node kind.
    ///
    /// # Panics
    ///
    /// Panics if `id` is neither a symbol of this language nor the builtin
    /// `ERROR` symbol.
    pub fn symbol_name(&self, id: u16) -> &'static str {
        self.check_symbol(id);
        self.0.symbol_name(id).unwrap_or_default()
    }

    /// # Panics
    ///
    /// Panics under the same conditions as [`Language::symbol_name`].
    pub fn symbol_type(&self, id: u16) -> SymbolType {
        self.check_symbol(id);
        self.0.symbol_type(id)
    }

    /// The id of the visible node kind with this name, or 0.
    pub fn id_for_node_kind(&self, kind: &str, named: bool) -> u16 {
        self.0.symbol_for_name(kind, named)
    }

    pub fn node_kind_is_named(&self, id: u16) -> bool {
        self.0.symbol_metadata(id).named
    }

    pub fn node_kind_is_visible(&self, id: u16) -> bool {
        self.0.symbol_metadata(id).visible
    }

    pub fn field_count(&self) -> usize {
        self.0.field_count() as usize
    }

    pub fn field_name_for_id(&self, field_id: u16) -> Option<&'static str> {
        self.0.field_name_for_id(field_id)
    }

    pub fn field_id_for_name(&self, field_name: &str) -> Option<u16> {
        match self.0.field_id_for_name(field_name) {
            0 => None,
            id => Some(id),
        }
    }
}

impl PartialEq for Language {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for Language {}

impl Hash for Language {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.0, state);
    }
}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Language").field(&self.0.name).finish()
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// A stateful object that produces a [`Tree`] from source code.
pub struct Parser {
    language: Option<Language>,
    included_ranges: Vec<Range>,
    operation_limit: usize,
    logger: Option<Logger>,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            language: None,
            included_ranges: Vec::new(),
            operation_limit: 0,
            logger: None,
        }
    }

    /// Set the language that the parser should use for parsing.
    ///
    /// Returns an error if the grammar's ABI version is not supported.
    pub fn set_language(&mut self, language: &Language) -> Result<(), LanguageError> {
        let version = language.abi_version();
        if !(MIN_COMPATIBLE_LANGUAGE_VERSION..=LANGUAGE_VERSION).contains(&version) {
            return Err(LanguageError { version });
        }
        self.language = Some(*language);
        Ok(())
    }

    pub fn language(&self) -> Option<Language> {
        self.language
    }

    /// Restrict parsing to the union of `ranges`. An empty slice means the
    /// whole document.
    ///
    /// The ranges must be ordered and must not overlap. On failure the
    /// parser keeps its previous ranges and the error carries the index of
    /// the first offending range.
    pub fn set_included_ranges(&mut self, ranges: &[Range]) -> Result<(), IncludedRangesError> {
        validate_included_ranges(ranges).map_err(IncludedRangesError)?;
        self.included_ranges = ranges.to_vec();
        Ok(())
    }

    pub fn included_ranges(&self) -> &[Range] {
        &self.included_ranges
    }

    /// Set the maximum number of operations a parse may perform. Zero
    /// means no limit.
    pub fn set_operation_limit(&mut self, limit: usize) {
        self.operation_limit = limit;
    }

    pub fn operation_limit(&self) -> usize {
        self.operation_limit
    }

    pub fn set_logger(&mut self, logger: Option<Logger>) {
        self.logger = logger;
    }

    pub fn logger(&self) -> Option<&Logger> {
        self.logger.as_ref()
    }

    /// Forward every parse and lex message to `tracing` at debug level.
    pub fn debug(&mut self) {
        self.set_logger(Some(Box::new(|log_type, message| match log_type {
            LogType::Parse => debug!(target: "sitter::parse", "{message}"),
            LogType::Lex => debug!(target: "sitter::lex", "{message}"),
        })));
    }

    /// Parse `text`.
    ///
    /// If `old_tree` is an edited version of a previous parse, subtrees
    /// untouched by the edits are reused. Reuse only happens when the old
    /// tree was parsed with the same language and included ranges.
    ///
    /// # Panics
    ///
    /// Panics if no language has been set.
    pub fn parse(&mut self, text: impl AsRef<[u8]>, old_tree: Option<&Tree>) -> Tree {
        let Some(language) = self.language else {
            panic!("Parser::parse called before a language was set");
        };
        let text = text.as_ref();

        let effective_ranges = if self.included_ranges.is_empty() {
            std::slice::from_ref(&DEFAULT_RANGE)
        } else {
            self.included_ranges.as_slice()
        };
        let old_root = old_tree.and_then(|tree| {
            let state = tree.shared.state.read();
            let compatible = tree.shared.language == language
                && state.included_ranges.as_slice() == effective_ranges;
            compatible.then(|| state.root.clone())
        });

        let options = ParseOptions {
            included_ranges: &self.included_ranges,
            operation_limit: self.operation_limit,
            logger: self.logger.as_mut(),
        };
        let root = parse(language.definition(), text, old_root.as_ref(), options);
        let data = TreeData::new(root, &self.included_ranges);
        Tree::new(data, language, Arc::from(text))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("language", &self.language)
            .field("included_ranges", &self.included_ranges)
            .field("operation_limit", &self.operation_limit)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// Canonical records for the nodes handed out so far, keyed by the raw
/// child path from the root.
#[derive(Default)]
struct NodeArena {
    records: Vec<NodeRef>,
    ids: FxHashMap<Vec<u32>, u32>,
}

impl NodeArena {
    fn intern(&mut self, node: NodeRef) -> u32 {
        if let Some(&id) = self.ids.get(node.path.as_slice()) {
            return id;
        }
        let id = self.records.len() as u32;
        self.ids.insert(node.path.clone(), id);
        self.records.push(node);
        id
    }

    /// Re-read every record from `root` after an edit.
    fn refresh(&mut self, root: &Subtree) {
        for record in &mut self.records {
            if let Some(node) = NodeRef::resolve(root, &record.path) {
                *record = node;
            }
        }
    }
}

pub(crate) struct TreeShared {
    language: Language,
    source: Arc<[u8]>,
    state: RwLock<TreeData>,
    nodes: Mutex<NodeArena>,
}

impl TreeShared {
    pub(crate) fn root_ref(&self) -> NodeRef {
        self.state.read().root_node()
    }
}

/// A syntax tree. Nodes borrow nothing from it: each [`Node`] keeps the
/// tree's data alive on its own.
pub struct Tree {
    shared: Arc<TreeShared>,
}

impl Tree {
    fn new(data: TreeData, language: Language, source: Arc<[u8]>) -> Self {
        Self {
            shared: Arc::new(TreeShared {
                language,
                source,
                state: RwLock::new(data),
                nodes: Mutex::new(NodeArena::default()),
            }),
        }
    }

    pub fn root_node(&self) -> Node {
        Node::from_ref(&self.shared, self.shared.root_ref())
    }

    pub fn language(&self) -> Language {
        self.shared.language
    }

    /// The exact bytes this tree was parsed from.
    pub fn source(&self) -> &[u8] {
        &self.shared.source
    }

    pub fn included_ranges(&self) -> Vec<Range> {
        self.shared.state.read().included_ranges.clone()
    }

    /// Edit the syntax tree to keep it in sync with source code that has
    /// been edited.
    ///
    /// Nodes already handed out observe the new positions and the
    /// `has_changes` flags.
    pub fn edit(&mut self, edit: &InputEdit) {
        let mut state = self.shared.state.write();
        state.edit(edit);
        self.shared.nodes.lock().refresh(&state.root);
    }

    pub fn walk(&self) -> TreeCursor {
        self.root_node().walk()
    }

    /// Compare this old edited tree to `other`, a reparse of it, and list
    /// the ranges whose syntactic structure changed.
    pub fn changed_ranges(&self, other: &Tree) -> Vec<Range> {
        if Arc::ptr_eq(&self.shared, &other.shared) {
            return Vec::new();
        }
        let old = self.shared.state.read();
        let new = other.shared.state.read();
        old.changed_ranges(&new)
    }
}

impl Clone for Tree {
    fn clone(&self) -> Self {
        let data = self.shared.state.read().clone();
        Self::new(data, self.shared.language, Arc::clone(&self.shared.source))
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Tree {:?}}}", self.root_node())
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single node within a syntax [`Tree`].
///
/// Handing out the same element twice yields equal nodes that share one
/// record, so flags and positions stay consistent across edits.
#[derive(Clone)]
pub struct Node {
    tree: Arc<TreeShared>,
    id: u32,
}

impl Node {
    pub(crate) fn from_ref(tree: &Arc<TreeShared>, node: NodeRef) -> Self {
        let id = tree.nodes.lock().intern(node);
        Self {
            tree: Arc::clone(tree),
            id,
        }
    }

    pub(crate) fn tree(&self) -> &Arc<TreeShared> {
        &self.tree
    }

    fn with_ref<R>(&self, f: impl FnOnce(&NodeRef) -> R) -> R {
        let nodes = self.tree.nodes.lock();
        f(&nodes.records[self.id as usize])
    }

    pub(crate) fn node_ref(&self) -> NodeRef {
        self.with_ref(Clone::clone)
    }

    fn wrap(&self, node: Option<NodeRef>) -> Option<Node> {
        node.map(|node| Self::from_ref(&self.tree, node))
    }

    /// A number that identifies this node among the nodes of its tree.
    pub fn id(&self) -> usize {
        self.id as usize
    }

    pub fn kind_id(&self) -> u16 {
        self.with_ref(NodeRef::symbol)
    }

    pub fn kind(&self) -> &'static str {
        self.tree.language.symbol_name(self.kind_id())
    }

    pub fn language(&self) -> Language {
        self.tree.language
    }

    /// Named nodes correspond to named rules in the grammar, whereas
    /// anonymous nodes correspond to string literals.
    pub fn is_named(&self) -> bool {
        self.with_ref(NodeRef::is_named)
    }

    /// Missing nodes are inserted by the parser to recover from certain
    /// kinds of syntax errors.
    pub fn is_missing(&self) -> bool {
        self.with_ref(|node| node.subtree.is_missing)
    }

    /// Extra nodes, such as comments, are not required by the grammar but
    /// can appear anywhere.
    pub fn is_extra(&self) -> bool {
        self.with_ref(|node| node.subtree.extra)
    }

    pub fn is_error(&self) -> bool {
        self.with_ref(|node| node.subtree.is_error())
    }

    /// Whether the node has been edited since it was parsed.
    pub fn has_changes(&self) -> bool {
        self.with_ref(|node| node.subtree.has_changes)
    }

    /// Whether the node is a syntax error or contains any.
    pub fn has_error(&self) -> bool {
        self.with_ref(|node| node.subtree.has_error())
    }

    pub fn start_byte(&self) -> u32 {
        self.with_ref(NodeRef::start_byte)
    }

    pub fn end_byte(&self) -> u32 {
        self.with_ref(NodeRef::end_byte)
    }

    /// The byte range of the node, ready for slicing the source.
    pub fn byte_range(&self) -> ops::Range<usize> {
        self.with_ref(|node| node.start_byte() as usize..node.end_byte() as usize)
    }

    pub fn start_position(&self) -> Point {
        self.with_ref(NodeRef::start_point)
    }

    pub fn end_position(&self) -> Point {
        self.with_ref(NodeRef::end_point)
    }

    pub fn range(&self) -> Range {
        self.with_ref(|node| Range {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_point: node.start_point(),
            end_point: node.end_point(),
        })
    }

    pub fn child_count(&self) -> u32 {
        self.with_ref(|node| node.subtree.visible_child_count)
    }

    pub fn named_child_count(&self) -> u32 {
        self.with_ref(|node| node.subtree.named_child_count)
    }

    /// The number of visible nodes in this node's subtree, itself included.
    pub fn descendant_count(&self) -> usize {
        self.with_ref(|node| node.subtree.visible_descendant_count as usize + 1)
    }

    pub fn child(&self, index: u32) -> Option<Node> {
        let child = self.with_ref(|node| node.child(index, false));
        self.wrap(child.map(|(child, _)| child))
    }

    pub fn named_child(&self, index: u32) -> Option<Node> {
        let child = self.with_ref(|node| node.child(index, true));
        self.wrap(child.map(|(child, _)| child))
    }

    pub fn children(&self) -> Vec<Node> {
        let children = self.with_ref(NodeRef::children);
        children
            .into_iter()
            .map(|(child, _)| Self::from_ref(&self.tree, child))
            .collect()
    }

    pub fn named_children(&self) -> Vec<Node> {
        let children = self.with_ref(NodeRef::children);
        children
            .into_iter()
            .filter(|(child, _)| child.subtree.named)
            .map(|(child, _)| Self::from_ref(&self.tree, child))
            .collect()
    }

    pub fn child_by_field_name(&self, field_name: &str) -> Option<Node> {
        let field_id = self.tree.language.field_id_for_name(field_name)?;
        self.child_by_field_id(field_id)
    }

    pub fn child_by_field_id(&self, field_id: u16) -> Option<Node> {
        let child = self.with_ref(|node| node.child_by_field_id(field_id));
        self.wrap(child)
    }

    /// The field name of the child at `child_index`, if it has one.
    pub fn field_name_for_child(&self, child_index: u32) -> Option<&'static str> {
        let (_, field_id) = self.with_ref(|node| node.child(child_index, false))?;
        self.tree.language.field_name_for_id(field_id)
    }

    pub fn parent(&self) -> Option<Node> {
        let root = self.tree.root_ref();
        let parent = self.with_ref(|node| node.parent(&root));
        self.wrap(parent)
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let root = self.tree.root_ref();
        let sibling = self.with_ref(|node| node.next_sibling(&root, false));
        self.wrap(sibling)
    }

    pub fn prev_sibling(&self) -> Option<Node> {
        let root = self.tree.root_ref();
        let sibling = self.with_ref(|node| node.prev_sibling(&root, false));
        self.wrap(sibling)
    }

    pub fn next_named_sibling(&self) -> Option<Node> {
        let root = self.tree.root_ref();
        let sibling = self.with_ref(|node| node.next_sibling(&root, true));
        self.wrap(sibling)
    }

    pub fn prev_named_sibling(&self) -> Option<Node> {
        let root = self.tree.root_ref();
        let sibling = self.with_ref(|node| node.prev_sibling(&root, true));
        self.wrap(sibling)
    }

    fn descendant_for_range(&self, start: u32, end: u32, include_anonymous: bool) -> Option<Node> {
        let descendant = self.with_ref(|node| {
            (node.start_byte() <= start && start <= end && end <= node.end_byte())
                .then(|| node.descendant_for_byte_range(start, end, include_anonymous))
        });
        self.wrap(descendant)
    }

    /// The smallest node within this node that spans `start..end`, or
    /// `None` if the range is not inside this node.
    pub fn descendant_for_byte_range(&self, start: u32, end: u32) -> Option<Node> {
        self.descendant_for_range(start, end, true)
    }

    /// Like [`Node::descendant_for_byte_range`], skipping anonymous nodes.
    pub fn named_descendant_for_byte_range(&self, start: u32, end: u32) -> Option<Node> {
        self.descendant_for_range(start, end, false)
    }

    pub fn walk(&self) -> TreeCursor {
        TreeCursor::new(self)
    }

    /// The node's text, decoded lossily from `source`.
    pub fn content<'a>(&self, source: &'a [u8]) -> Cow<'a, str> {
        String::from_utf8_lossy(source.get(self.byte_range()).unwrap_or_default())
    }

    /// The node's text in `source`.
    ///
    /// # Panics
    ///
    /// Panics if `source` is shorter than the node's end. Use
    /// [`Node::content`] for text that may no longer match the tree.
    pub fn utf8_text<'a>(&self, source: &'a [u8]) -> Result<&'a str, Utf8Error> {
        std::str::from_utf8(&source[self.byte_range()])
    }

    /// An S-expression of the named nodes below and including this one.
    pub fn to_sexp(&self) -> String {
        let language = self.tree.language.definition();
        self.with_ref(|node| node.subtree.string(language, false))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree) && self.id == other.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.tree), state);
        self.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{Node {} {} - {}}}",
            self.kind(),
            self.start_position(),
            self.end_position()
        )
    }
}

// ---------------------------------------------------------------------------
// TreeCursor
// ---------------------------------------------------------------------------

/// A stateful object for walking a syntax [`Tree`] efficiently.
///
/// The node the cursor was created from is the top of its walk: the cursor
/// never moves to its parent or siblings.
#[derive(Clone)]
pub struct TreeCursor {
    tree: Arc<TreeShared>,
    inner: engine::tree_cursor::TreeCursor,
}

impl TreeCursor {
    pub fn new(node: &Node) -> Self {
        Self {
            tree: Arc::clone(&node.tree),
            inner: engine::tree_cursor::TreeCursor::new(&node.node_ref()),
        }
    }

    pub fn current_node(&self) -> Node {
        Node::from_ref(&self.tree, self.inner.current_node())
    }

    pub fn current_field_id(&self) -> Option<u16> {
        match self.inner.current_field_id() {
            0 => None,
            id => Some(id),
        }
    }

    pub fn current_field_name(&self) -> Option<&'static str> {
        self.tree.language.field_name_for_id(self.inner.current_field_id())
    }

    /// The number of visible steps between the starting node and the
    /// current one.
    pub fn depth(&self) -> u32 {
        self.inner.depth()
    }

    pub fn goto_first_child(&mut self) -> bool {
        self.inner.goto_first_child()
    }

    pub fn goto_last_child(&mut self) -> bool {
        self.inner.goto_last_child()
    }

    pub fn goto_parent(&mut self) -> bool {
        self.inner.goto_parent()
    }

    pub fn goto_next_sibling(&mut self) -> bool {
        self.inner.goto_next_sibling()
    }

    pub fn goto_previous_sibling(&mut self) -> bool {
        self.inner.goto_previous_sibling()
    }

    /// Move to the child whose range contains `byte` and return its index,
    /// or `None` if `byte` is past the last child. A child's range starts
    /// at the whitespace before it, so offsets between tokens select the
    /// following child.
    pub fn goto_first_child_for_byte(&mut self, byte: u32) -> Option<u32> {
        self.inner.goto_first_child_for_byte(byte)
    }

    pub fn goto_first_child_for_point(&mut self, point: Point) -> Option<u32> {
        self.inner.goto_first_child_for_point(point)
    }

    /// Re-initialize the cursor to start at `node`.
    pub fn reset(&mut self, node: &Node) {
        self.tree = Arc::clone(&node.tree);
        self.inner.reset(&node.node_ref());
    }
}

impl fmt::Debug for TreeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeCursor")
            .field("node", &self.current_node())
            .field("depth", &self.depth())
            .finish()
    }
}
