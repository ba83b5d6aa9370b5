//! Persistent syntax subtrees.
//!
//! A `Subtree` is a reference-counted, immutable node. Trees share unchanged
//! subtrees freely; [`Subtree::make_mut`] copies a subtree on write when it
//! is shared, which is how editing one tree leaves its copies untouched.

use std::fmt::Write as _;
use std::ops::Deref;
use std::sync::Arc;

use crate::InputEdit;

use super::error_costs::{
    ERROR_COST_PER_MISSING_TREE, ERROR_COST_PER_RECOVERY, ERROR_COST_PER_SKIPPED_CHAR,
    ERROR_COST_PER_SKIPPED_LINE, ERROR_COST_PER_SKIPPED_TREE,
};
use super::language::{
    FieldId, LanguageDefinition, StateId, Symbol, SymbolMetadata, BUILTIN_SYM_END,
    BUILTIN_SYM_ERROR, STATE_NONE,
};
use super::length::{length_saturating_sub, length_zero, Length};

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct SubtreeData {
    pub symbol: Symbol,
    pub parse_state: StateId,
    pub padding: Length,
    pub size: Length,
    pub lookahead_bytes: u32,
    pub error_cost: u32,
    pub visible: bool,
    pub named: bool,
    pub extra: bool,
    pub has_changes: bool,
    pub is_missing: bool,
    /// The character an unexpected-character leaf was created for.
    pub lookahead_char: Option<char>,
    pub children: Vec<Subtree>,
    /// Field of each child, parallel to `children`. 0 means no field.
    pub field_ids: Vec<FieldId>,
    pub visible_child_count: u32,
    pub named_child_count: u32,
    pub visible_descendant_count: u32,
}

#[derive(Clone, Debug)]
pub struct Subtree(Arc<SubtreeData>);

impl Deref for Subtree {
    type Target = SubtreeData;

    #[inline]
    fn deref(&self) -> &SubtreeData {
        &self.0
    }
}

#[derive(Clone, Copy, Debug)]
struct Edit {
    start: Length,
    old_end: Length,
    new_end: Length,
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

impl SubtreeData {
    #[inline]
    pub fn total_size(&self) -> Length {
        self.padding + self.size
    }

    #[inline]
    pub fn total_bytes(&self) -> u32 {
        self.padding.bytes + self.size.bytes
    }

    #[inline]
    pub fn child_count(&self) -> u32 {
        self.children.len() as u32
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.symbol == BUILTIN_SYM_ERROR
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.symbol == BUILTIN_SYM_END
    }

    #[inline]
    pub fn has_error(&self) -> bool {
        self.error_cost > 0
    }

    #[inline]
    pub fn field_id(&self, child_index: usize) -> FieldId {
        self.field_ids.get(child_index).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Subtree {
    fn from_data(data: SubtreeData) -> Self {
        Self(Arc::new(data))
    }

    fn leaf_data(symbol: Symbol, padding: Length, size: Length, metadata: SymbolMetadata) -> SubtreeData {
        SubtreeData {
            symbol,
            parse_state: STATE_NONE,
            padding,
            size,
            lookahead_bytes: 0,
            error_cost: 0,
            visible: metadata.visible,
            named: metadata.named,
            extra: false,
            has_changes: false,
            is_missing: false,
            lookahead_char: None,
            children: Vec::new(),
            field_ids: Vec::new(),
            visible_child_count: 0,
            named_child_count: 0,
            visible_descendant_count: 0,
        }
    }

    pub fn new_leaf(
        symbol: Symbol,
        padding: Length,
        size: Length,
        lookahead_bytes: u32,
        metadata: SymbolMetadata,
        extra: bool,
    ) -> Self {
        let mut data = Self::leaf_data(symbol, padding, size, metadata);
        data.lookahead_bytes = lookahead_bytes;
        data.extra = extra;
        Self::from_data(data)
    }

    /// A leaf covering input the lexer could not tokenize. `lookahead_char`
    /// is the offending character, or `None` when the leaf stands for input
    /// that was never examined.
    pub fn new_error(
        lookahead_char: Option<char>,
        padding: Length,
        size: Length,
        lookahead_bytes: u32,
    ) -> Self {
        let metadata = SymbolMetadata {
            visible: true,
            named: true,
        };
        let mut data = Self::leaf_data(BUILTIN_SYM_ERROR, padding, size, metadata);
        data.lookahead_bytes = lookahead_bytes;
        data.lookahead_char = lookahead_char;
        data.error_cost = ERROR_COST_PER_RECOVERY
            + ERROR_COST_PER_SKIPPED_CHAR * size.bytes
            + ERROR_COST_PER_SKIPPED_LINE * size.extent.row;
        Self::from_data(data)
    }

    pub fn new_missing_leaf(
        symbol: Symbol,
        padding: Length,
        lookahead_bytes: u32,
        metadata: SymbolMetadata,
    ) -> Self {
        let mut data = Self::leaf_data(symbol, padding, length_zero(), metadata);
        data.lookahead_bytes = lookahead_bytes;
        data.is_missing = true;
        data.error_cost = ERROR_COST_PER_MISSING_TREE + ERROR_COST_PER_RECOVERY;
        Self::from_data(data)
    }

    pub fn new_node(
        symbol: Symbol,
        children: Vec<Subtree>,
        field_ids: Vec<FieldId>,
        metadata: SymbolMetadata,
        parse_state: StateId,
    ) -> Self {
        debug_assert_eq!(children.len(), field_ids.len());
        let mut data = Self::leaf_data(symbol, length_zero(), length_zero(), metadata);
        data.parse_state = parse_state;
        data.children = children;
        data.field_ids = field_ids;
        data.summarize_children();
        Self::from_data(data)
    }

    pub fn new_error_node(children: Vec<Subtree>) -> Self {
        let field_ids = vec![0; children.len()];
        let metadata = SymbolMetadata {
            visible: true,
            named: true,
        };
        Self::new_node(BUILTIN_SYM_ERROR, children, field_ids, metadata, STATE_NONE)
    }

    #[inline]
    pub fn make_mut(&mut self) -> &mut SubtreeData {
        Arc::make_mut(&mut self.0)
    }
}

impl SubtreeData {
    fn summarize_children(&mut self) {
        self.named_child_count = 0;
        self.visible_child_count = 0;
        self.error_cost = 0;
        self.visible_descendant_count = 0;

        let mut lookahead_end_byte = 0;
        let is_error = self.is_error();
        for (i, child) in self.children.iter().enumerate() {
            if i == 0 {
                self.padding = child.padding;
                self.size = child.size;
            } else {
                self.size = self.size + child.total_size();
            }

            let child_lookahead_end_byte =
                self.padding.bytes + self.size.bytes + child.lookahead_bytes;
            lookahead_end_byte = lookahead_end_byte.max(child_lookahead_end_byte);

            self.error_cost += child.error_cost;
            let grandchild_count = child.child_count();
            if is_error && !child.extra && !(child.is_error() && grandchild_count == 0) {
                if child.visible {
                    self.error_cost += ERROR_COST_PER_SKIPPED_TREE;
                } else if grandchild_count > 0 {
                    self.error_cost += ERROR_COST_PER_SKIPPED_TREE * child.visible_child_count;
                }
            }

            self.visible_descendant_count += child.visible_descendant_count;
            if child.visible {
                self.visible_descendant_count += 1;
                self.visible_child_count += 1;
                if child.named {
                    self.named_child_count += 1;
                }
            } else if grandchild_count > 0 {
                self.visible_child_count += child.visible_child_count;
                self.named_child_count += child.named_child_count;
            }
        }

        self.lookahead_bytes = lookahead_end_byte.saturating_sub(self.size.bytes + self.padding.bytes);

        if is_error {
            self.error_cost += ERROR_COST_PER_RECOVERY
                + ERROR_COST_PER_SKIPPED_CHAR * self.size.bytes
                + ERROR_COST_PER_SKIPPED_LINE * self.size.extent.row;
        }
    }
}

// ---------------------------------------------------------------------------
// Editing
// ---------------------------------------------------------------------------

impl Subtree {
    /// Resize this subtree for `input_edit` and flag every subtree whose
    /// extent, including padding and lookahead, touches the edited span.
    pub fn edit(&mut self, input_edit: &InputEdit) {
        let edit = Edit {
            start: Length::new(input_edit.start_byte, input_edit.start_position),
            old_end: Length::new(input_edit.old_end_byte, input_edit.old_end_position),
            new_end: Length::new(input_edit.new_end_byte, input_edit.new_end_position),
        };
        edit_subtree(self, edit);
    }
}

fn edit_subtree(root: &mut Subtree, edit: Edit) {
    let mut stack = vec![(root, edit)];
    while let Some((tree, mut edit)) = stack.pop() {
        let is_noop = edit.old_end.bytes == edit.start.bytes && edit.new_end.bytes == edit.start.bytes;
        let is_pure_insertion = edit.old_end.bytes == edit.start.bytes;

        let mut size = tree.size;
        let mut padding = tree.padding;
        let total_size = padding + size;
        let end_byte = total_size.bytes + tree.lookahead_bytes;
        if edit.start.bytes > end_byte || (is_noop && edit.start.bytes == end_byte) {
            continue;
        }

        // The edit is entirely within the space before this subtree: shift it.
        if edit.old_end.bytes <= padding.bytes {
            padding = edit.new_end + (padding - edit.old_end);
        }
        // The edit starts in the padding and extends into the content: shrink.
        else if edit.start.bytes < padding.bytes {
            size = length_saturating_sub(size, edit.old_end - padding);
            padding = edit.new_end;
        }
        // The edit is within the content.
        else if edit.start.bytes < total_size.bytes
            || (edit.start.bytes == total_size.bytes && is_pure_insertion)
        {
            size = (edit.new_end - padding) + length_saturating_sub(total_size, edit.old_end);
        }

        let data = tree.make_mut();
        data.padding = padding;
        data.size = size;
        data.has_changes = true;

        let mut child_right = length_zero();
        for (i, child) in data.children.iter_mut().enumerate() {
            let child_size = child.total_size();
            let child_left = child_right;
            child_right = child_left + child_size;

            // Ends before the edit.
            if child_right.bytes + child.lookahead_bytes < edit.start.bytes {
                continue;
            }

            // Starts after the edit.
            if child_left.bytes > edit.old_end.bytes
                || (child_left.bytes == edit.old_end.bytes && child_size.bytes > 0 && i > 0)
            {
                break;
            }

            let mut child_edit = Edit {
                start: length_saturating_sub(edit.start, child_left),
                old_end: length_saturating_sub(edit.old_end, child_left),
                new_end: length_saturating_sub(edit.new_end, child_left),
            };

            // Inserted text belongs to the first child that touches the edit;
            // later children only shrink.
            if child_right.bytes > edit.start.bytes
                || (child_right.bytes == edit.start.bytes && is_pure_insertion)
            {
                edit.new_end = edit.start;
            } else {
                child_edit.old_end = child_edit.start;
                child_edit.new_end = child_edit.start;
            }

            stack.push((child, child_edit));
        }
    }
}

// ---------------------------------------------------------------------------
// S-expressions
// ---------------------------------------------------------------------------

impl Subtree {
    /// Render the subtree as an S-expression. Only named nodes appear unless
    /// `include_all` is set.
    pub fn string(&self, language: &LanguageDefinition, include_all: bool) -> String {
        let mut out = String::new();
        self.write_to_string(&mut out, language, include_all, None, true);
        out
    }

    fn write_to_string(
        &self,
        out: &mut String,
        language: &LanguageDefinition,
        include_all: bool,
        field_name: Option<&str>,
        is_root: bool,
    ) {
        let visible = include_all || self.is_missing || (self.visible && self.named);

        if visible {
            if !is_root {
                out.push(' ');
            }
            if let Some(field_name) = field_name {
                out.push_str(field_name);
                out.push_str(": ");
            }
            let name = language.symbol_name(self.symbol).unwrap_or("");
            match self.lookahead_char {
                Some(c) if self.is_error() && self.children.is_empty() && self.size.bytes > 0 => {
                    out.push_str("(UNEXPECTED ");
                    write_char(out, c);
                }
                _ if self.is_missing => {
                    out.push_str("(MISSING ");
                    if self.named {
                        out.push_str(name);
                    } else {
                        out.push('"');
                        out.push_str(name);
                        out.push('"');
                    }
                }
                _ => {
                    out.push('(');
                    out.push_str(name);
                }
            }
        }

        for (i, child) in self.children.iter().enumerate() {
            let child_field_name = if child.extra {
                None
            } else {
                language
                    .field_name_for_id(self.field_id(i))
                    .or(if visible { None } else { field_name })
            };
            child.write_to_string(out, language, include_all, child_field_name, false);
        }

        if visible {
            out.push(')');
        }
    }
}

fn write_char(out: &mut String, c: char) {
    match c {
        '\0' => out.push_str("'\\0'"),
        '\n' => out.push_str("'\\n'"),
        '\t' => out.push_str("'\\t'"),
        '\r' => out.push_str("'\\r'"),
        c if c.is_ascii_graphic() || c == ' ' => {
            let _ = write!(out, "'{c}'");
        }
        c => {
            let _ = write!(out, "{}", u32::from(c));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::point::point_new;
    use crate::grammars::arithmetic;

    fn len(bytes: u32) -> Length {
        Length::new(bytes, point_new(0, bytes))
    }

    fn number(padding: u32, lookahead: u32) -> Subtree {
        Subtree::new_leaf(4, len(padding), len(1), lookahead, SymbolMetadata::REGULAR, false)
    }

    #[test]
    fn node_summarizes_children() {
        let plus = Subtree::new_leaf(3, len(1), len(1), 1, SymbolMetadata::ANONYMOUS, false);
        let sum = Subtree::new_node(
            8,
            vec![number(2, 1), plus, number(1, 1)],
            vec![1, 0, 2],
            SymbolMetadata::REGULAR,
            STATE_NONE,
        );
        assert_eq!(sum.padding, len(2));
        assert_eq!(sum.size, len(5));
        assert_eq!(sum.lookahead_bytes, 1);
        assert_eq!(sum.visible_child_count, 3);
        assert_eq!(sum.named_child_count, 2);
        assert!(!sum.has_error());
    }

    #[test]
    fn edit_copies_shared_subtrees() {
        let original = Subtree::new_node(
            7,
            vec![number(0, 1)],
            vec![0],
            SymbolMetadata::REGULAR,
            STATE_NONE,
        );
        let mut edited = original.clone();
        edited.edit(&InputEdit {
            start_byte: 0,
            old_end_byte: 1,
            new_end_byte: 3,
            start_position: point_new(0, 0),
            old_end_position: point_new(0, 1),
            new_end_position: point_new(0, 3),
        });
        assert!(edited.has_changes);
        assert_eq!(edited.size, len(3));
        assert!(!original.has_changes);
        assert_eq!(original.size, len(1));
    }

    #[test]
    fn missing_and_unexpected_leaves_render_specially() {
        let language = &arithmetic::DEFINITION;
        let missing = Subtree::new_missing_leaf(2, len(0), 0, SymbolMetadata::ANONYMOUS);
        let unexpected = Subtree::new_error(Some('$'), len(0), len(1), 1);
        let error = Subtree::new_error_node(vec![unexpected, missing]);
        assert_eq!(
            error.string(language, false),
            "(ERROR (UNEXPECTED '$') (MISSING \")\"))"
        );
        assert!(error.has_error());
    }
}
