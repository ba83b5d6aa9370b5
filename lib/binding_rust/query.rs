use std::fmt;
use std::ops;
use std::sync::Arc;

use streaming_iterator::StreamingIterator;

use crate::engine::query::{QueryData, QueryExec, RawMatch, FULL_BYTE_RANGE, FULL_POINT_RANGE};
use crate::{Language, Node, Point, TreeShared};

pub use crate::engine::query::{QueryError, QueryErrorKind, QueryPredicate, QueryPredicateArg};

/// A set of patterns that match nodes in a syntax tree.
#[derive(Clone)]
pub struct Query {
    data: Arc<QueryData>,
}

/// A captured node within a [`QueryMatch`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryCapture {
    pub node: Node,
    pub index: u32,
}

/// A match of a [`Query`] to a particular set of [`Node`]s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryMatch {
    pub pattern_index: usize,
    pub captures: Vec<QueryCapture>,
}

impl QueryMatch {
    pub fn nodes_for_capture_index(&self, capture_index: u32) -> impl Iterator<Item = &Node> + '_ {
        self.captures
            .iter()
            .filter(move |capture| capture.index == capture_index)
            .map(|capture| &capture.node)
    }
}

impl Query {
    /// Compile `source` against `language`.
    ///
    /// On failure the error carries the byte offset of the offending token
    /// and the kind of problem found.
    pub fn new(language: &Language, source: &str) -> Result<Self, QueryError> {
        let data = QueryData::new(language.definition(), source)?;
        Ok(Self { data: Arc::new(data) })
    }

    pub fn language(&self) -> Language {
        Language::new(self.data.language())
    }

    pub fn pattern_count(&self) -> usize {
        self.data.pattern_count()
    }

    /// The names of the captures used in the query, indexed by capture id.
    pub fn capture_names(&self) -> &[String] {
        self.data.capture_names()
    }

    pub fn capture_count(&self) -> usize {
        self.data.capture_names().len()
    }

    pub fn capture_index_for_name(&self, name: &str) -> Option<u32> {
        self.data.capture_index_for_name(name)
    }

    /// The byte offset where the given pattern starts in the query source.
    ///
    /// # Panics
    ///
    /// Panics if `pattern_index` is out of range.
    pub fn start_byte_for_pattern(&self, pattern_index: usize) -> usize {
        self.data.start_byte_for_pattern(pattern_index)
    }

    /// The predicates of a pattern that are not text predicates.
    pub fn general_predicates(&self, pattern_index: usize) -> &[QueryPredicate] {
        self.data.general_predicates(pattern_index)
    }

    pub fn string_count(&self) -> usize {
        self.data.string_count()
    }

    pub fn string_value(&self, index: usize) -> Option<&str> {
        self.data.string_value(index)
    }

    /// Check a match against the `#eq?`, `#match?` and `#any-of?` family of
    /// predicates of its pattern.
    pub fn satisfies_text_predicates(&self, query_match: &QueryMatch, source: &[u8]) -> bool {
        satisfies_text_predicates(&self.data, query_match, source)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("language", &self.language())
            .field("pattern_count", &self.pattern_count())
            .field("capture_names", &self.capture_names())
            .finish()
    }
}

fn satisfies_text_predicates(data: &QueryData, query_match: &QueryMatch, source: &[u8]) -> bool {
    let spans: Vec<_> = query_match
        .captures
        .iter()
        .map(|capture| (capture.index, capture.node.byte_range()))
        .collect();
    data.satisfies_text_predicates(query_match.pattern_index, &spans, source)
}

fn to_match(tree: &Arc<TreeShared>, raw_match: RawMatch) -> QueryMatch {
    QueryMatch {
        pattern_index: raw_match.pattern_index,
        captures: raw_match
            .captures
            .into_iter()
            .map(|(index, node)| QueryCapture {
                node: Node::from_ref(tree, node),
                index,
            })
            .collect(),
    }
}

struct Execution {
    tree: Arc<TreeShared>,
    exec: QueryExec,
}

/// A stateful object for executing a [`Query`] on a syntax tree.
///
/// Structural execution through [`QueryCursor::next_match`] and
/// [`QueryCursor::next_capture`] ignores text predicates. The
/// [`QueryCursor::matches`] and [`QueryCursor::captures`] iterators apply
/// them.
pub struct QueryCursor {
    execution: Option<Execution>,
    byte_range: ops::Range<u32>,
    point_range: ops::Range<Point>,
}

impl QueryCursor {
    pub fn new() -> Self {
        Self {
            execution: None,
            byte_range: FULL_BYTE_RANGE,
            point_range: FULL_POINT_RANGE,
        }
    }

    /// Only report matches on nodes that intersect `range`.
    pub fn set_byte_range(&mut self, range: ops::Range<u32>) -> &mut Self {
        if let Some(execution) = &mut self.execution {
            execution.exec.set_byte_range(range.clone());
        }
        self.byte_range = range;
        self
    }

    /// Only report matches on nodes that intersect `range`.
    pub fn set_point_range(&mut self, range: ops::Range<Point>) -> &mut Self {
        if let Some(execution) = &mut self.execution {
            execution.exec.set_point_range(range.clone());
        }
        self.point_range = range;
        self
    }

    /// Start running `query` on `node` and everything below it, dropping
    /// any previous execution.
    ///
    /// # Panics
    ///
    /// Panics if `query` was compiled for a different language than the
    /// node's tree.
    pub fn exec(&mut self, query: &Query, node: &Node) {
        assert!(
            query.language() == node.language(),
            "Query for language {} cannot run on a tree of language {}",
            query.language().name(),
            node.language().name(),
        );
        let tree = Arc::clone(node.tree());
        let mut exec = QueryExec::new(Arc::clone(&query.data), tree.root_ref(), &node.node_ref());
        exec.set_byte_range(self.byte_range.clone());
        exec.set_point_range(self.point_range.clone());
        self.execution = Some(Execution { tree, exec });
    }

    /// The next match in document order.
    pub fn next_match(&mut self) -> Option<QueryMatch> {
        let execution = self.execution.as_mut()?;
        let raw_match = execution.exec.next_match()?;
        Some(to_match(&execution.tree, raw_match))
    }

    /// The next capture in document order, along with its match and the
    /// index of the capture within that match.
    pub fn next_capture(&mut self) -> Option<(QueryMatch, usize)> {
        let execution = self.execution.as_mut()?;
        let (raw_match, capture_index) = execution.exec.next_capture()?;
        Some((to_match(&execution.tree, raw_match), capture_index))
    }

    /// Whether `query_match` satisfies the text predicates of the query
    /// being executed. Always true before the first [`QueryCursor::exec`].
    pub fn filter_predicates(&self, query_match: &QueryMatch, source: &[u8]) -> bool {
        self.execution.as_ref().map_or(true, |execution| {
            satisfies_text_predicates(execution.exec.query(), query_match, source)
        })
    }

    /// Iterate over the matches of `query` under `node` that satisfy its
    /// text predicates against `source`.
    pub fn matches<'cursor, 'source>(
        &'cursor mut self,
        query: &Query,
        node: &Node,
        source: &'source [u8],
    ) -> QueryMatches<'cursor, 'source> {
        self.exec(query, node);
        QueryMatches {
            cursor: self,
            source,
            current: None,
        }
    }

    /// Iterate over the captures of `query` under `node`, in document
    /// order, skipping matches that fail their text predicates.
    pub fn captures<'cursor, 'source>(
        &'cursor mut self,
        query: &Query,
        node: &Node,
        source: &'source [u8],
    ) -> QueryCaptures<'cursor, 'source> {
        self.exec(query, node);
        QueryCaptures {
            cursor: self,
            source,
            current: None,
        }
    }
}

impl Default for QueryCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// A sequence of [`QueryMatch`]es associated with a given [`QueryCursor`].
pub struct QueryMatches<'cursor, 'source> {
    cursor: &'cursor mut QueryCursor,
    source: &'source [u8],
    current: Option<QueryMatch>,
}

impl StreamingIterator for QueryMatches<'_, '_> {
    type Item = QueryMatch;

    fn advance(&mut self) {
        self.current = loop {
            let Some(query_match) = self.cursor.next_match() else {
                break None;
            };
            if self.cursor.filter_predicates(&query_match, self.source) {
                break Some(query_match);
            }
        };
    }

    fn get(&self) -> Option<&QueryMatch> {
        self.current.as_ref()
    }
}

/// A sequence of captures associated with a given [`QueryCursor`]. Each
/// item is a match and the index of the current capture within it.
pub struct QueryCaptures<'cursor, 'source> {
    cursor: &'cursor mut QueryCursor,
    source: &'source [u8],
    current: Option<(QueryMatch, usize)>,
}

impl StreamingIterator for QueryCaptures<'_, '_> {
    type Item = (QueryMatch, usize);

    fn advance(&mut self) {
        self.current = loop {
            let Some((query_match, capture_index)) = self.cursor.next_capture() else {
                break None;
            };
            if self.cursor.filter_predicates(&query_match, self.source) {
                break Some((query_match, capture_index));
            }
        };
    }

    fn get(&self) -> Option<&(QueryMatch, usize)> {
        self.current.as_ref()
    }
}
