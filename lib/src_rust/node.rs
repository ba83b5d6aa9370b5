//! Positioned views into a subtree.
//!
//! A [`NodeRef`] pairs a subtree with its absolute position and the raw
//! child indices leading to it from the root. Navigation skips hidden
//! nodes: their children are reported as children of the nearest visible
//! ancestor.

use super::language::{FieldId, Symbol};
use super::length::Length;
use super::point::point_add;
use super::subtree::Subtree;
use crate::Point;

#[derive(Clone, Debug)]
pub struct NodeRef {
    pub subtree: Subtree,
    /// Start of the node's content, after its padding.
    pub position: Length,
    /// Raw child indices from the root.
    pub path: Vec<u32>,
}

struct RawChildren<'a> {
    parent: &'a NodeRef,
    index: usize,
    position: Length,
}

impl Iterator for RawChildren<'_> {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        let child = self.parent.subtree.children.get(self.index)?;
        if self.index > 0 {
            self.position = self.position + child.padding;
        }
        let mut path = Vec::with_capacity(self.parent.path.len() + 1);
        path.extend_from_slice(&self.parent.path);
        path.push(self.index as u32);
        let node = NodeRef {
            subtree: child.clone(),
            position: self.position,
            path,
        };
        self.position = self.position + child.size;
        self.index += 1;
        Some(node)
    }
}

impl NodeRef {
    pub fn root(root: &Subtree) -> Self {
        Self {
            subtree: root.clone(),
            position: root.padding,
            path: Vec::new(),
        }
    }

    /// Follow `path` down from `root`. Returns `None` if the path no longer
    /// exists in this tree.
    pub fn resolve(root: &Subtree, path: &[u32]) -> Option<Self> {
        let mut node = Self::root(root);
        for &index in path {
            node = node.raw_child(index)?;
        }
        Some(node)
    }

    fn raw_children(&self) -> RawChildren<'_> {
        RawChildren {
            parent: self,
            index: 0,
            position: self.position,
        }
    }

    pub fn raw_child(&self, index: u32) -> Option<Self> {
        self.raw_children().nth(index as usize)
    }

    #[inline]
    pub fn symbol(&self) -> Symbol {
        self.subtree.symbol
    }

    #[inline]
    pub fn start_byte(&self) -> u32 {
        self.position.bytes
    }

    #[inline]
    pub fn end_byte(&self) -> u32 {
        self.position.bytes + self.subtree.size.bytes
    }

    #[inline]
    pub fn start_point(&self) -> Point {
        self.position.extent
    }

    #[inline]
    pub fn end_point(&self) -> Point {
        point_add(self.position.extent, self.subtree.size.extent)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn is_visible(&self) -> bool {
        self.is_root() || self.subtree.visible
    }

    pub fn is_named(&self) -> bool {
        self.is_visible() && self.subtree.named
    }

    fn is_relevant(&self, include_anonymous: bool) -> bool {
        self.is_visible() && (include_anonymous || self.subtree.named)
    }

    /// Visible children with the field each one is attached under.
    pub fn children(&self) -> Vec<(NodeRef, FieldId)> {
        let mut out = Vec::with_capacity(self.subtree.visible_child_count as usize);
        self.push_children(0, &mut out);
        out
    }

    fn push_children(&self, inherited_field: FieldId, out: &mut Vec<(NodeRef, FieldId)>) {
        for (i, child) in self.raw_children().enumerate() {
            let field = if child.subtree.extra {
                0
            } else {
                match self.subtree.field_id(i) {
                    0 => inherited_field,
                    field => field,
                }
            };
            if child.subtree.visible {
                out.push((child, field));
            } else if child.subtree.visible_child_count > 0 {
                child.push_children(field, out);
            }
        }
    }

    pub fn child(&self, index: u32, named: bool) -> Option<(NodeRef, FieldId)> {
        self.children()
            .into_iter()
            .filter(|(child, _)| !named || child.subtree.named)
            .nth(index as usize)
    }

    pub fn child_by_field_id(&self, field_id: FieldId) -> Option<NodeRef> {
        if field_id == 0 {
            return None;
        }
        self.children()
            .into_iter()
            .find_map(|(child, field)| (field == field_id).then_some(child))
    }

    /// The nearest visible ancestor. `root` must be the root this node was
    /// resolved from.
    pub fn parent(&self, root: &NodeRef) -> Option<NodeRef> {
        let (_, ancestors) = self.path.split_last()?;
        let mut node = root.clone();
        let mut visible = root.clone();
        for &index in ancestors {
            node = node.raw_child(index)?;
            if node.subtree.visible {
                visible = node.clone();
            }
        }
        Some(visible)
    }

    pub fn siblings(&self, root: &NodeRef) -> Option<(Vec<(NodeRef, FieldId)>, usize)> {
        let siblings = self.parent(root)?.children();
        let index = siblings.iter().position(|(sibling, _)| sibling.path == self.path)?;
        Some((siblings, index))
    }

    pub fn next_sibling(&self, root: &NodeRef, named: bool) -> Option<NodeRef> {
        let (siblings, index) = self.siblings(root)?;
        siblings
            .into_iter()
            .skip(index + 1)
            .map(|(sibling, _)| sibling)
            .find(|sibling| !named || sibling.subtree.named)
    }

    pub fn prev_sibling(&self, root: &NodeRef, named: bool) -> Option<NodeRef> {
        let (siblings, index) = self.siblings(root)?;
        siblings
            .into_iter()
            .take(index)
            .map(|(sibling, _)| sibling)
            .rfind(|sibling| !named || sibling.subtree.named)
    }

    /// The smallest relevant node that spans `start..end`.
    pub fn descendant_for_byte_range(&self, start: u32, end: u32, include_anonymous: bool) -> NodeRef {
        let mut node = self.clone();
        let mut last_visible = self.clone();

        'descend: loop {
            for child in node.raw_children() {
                let child_end = child.end_byte();
                // The end of this node must extend far enough forward to
                // touch the end of the range.
                if child_end < end || child_end <= start {
                    continue;
                }
                // The start of this node must extend far enough backward to
                // touch the start of the range.
                if start < child.start_byte() {
                    break;
                }
                if child.is_relevant(include_anonymous) {
                    last_visible = child.clone();
                }
                node = child;
                continue 'descend;
            }
            return last_visible;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parser::{parse, ParseOptions};
    use crate::grammars::arithmetic;

    fn parse_root(text: &str) -> NodeRef {
        let options = ParseOptions {
            included_ranges: &[],
            operation_limit: 0,
            logger: None,
        };
        let root = parse(&arithmetic::DEFINITION, text.as_bytes(), None, options);
        NodeRef::root(&root)
    }

    #[test]
    fn hidden_end_token_is_not_a_child() {
        let root = parse_root("1 + 2");
        let children = root.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].0.symbol(), arithmetic::SUM);
        assert_eq!(children[0].0.path, vec![0]);
    }

    #[test]
    fn fields_and_positions_follow_children() {
        let root = parse_root("1 +  22");
        let (sum, _) = root.child(0, false).unwrap();
        let right = sum.child_by_field_id(arithmetic::FIELD_RIGHT).unwrap();
        assert_eq!((right.start_byte(), right.end_byte()), (5, 7));
        let (plus, field) = sum.child(1, false).unwrap();
        assert_eq!(field, 0);
        assert_eq!(plus.start_byte(), 2);
        assert_eq!(sum.child(1, true).map(|(n, _)| n.start_byte()), Some(5));
    }

    #[test]
    fn parent_and_siblings_resolve_through_paths() {
        let root = parse_root("1 + 2");
        let (sum, _) = root.child(0, false).unwrap();
        let (left, _) = sum.child(0, false).unwrap();
        assert_eq!(left.parent(&root).unwrap().path, sum.path);
        let plus = left.next_sibling(&root, false).unwrap();
        assert_eq!(plus.symbol(), arithmetic::PLUS);
        let right = left.next_sibling(&root, true).unwrap();
        assert_eq!(right.start_byte(), 4);
        assert_eq!(right.prev_sibling(&root, true).unwrap().path, left.path);
        assert!(root.parent(&root).is_none());
    }

    #[test]
    fn descendant_for_byte_range_finds_smallest_node() {
        let root = parse_root("1 + 23");
        let number = root.descendant_for_byte_range(4, 5, false);
        assert_eq!(number.symbol(), arithmetic::NUMBER);
        let plus = root.descendant_for_byte_range(2, 3, true);
        assert_eq!(plus.symbol(), arithmetic::PLUS);
        let sum = root.descendant_for_byte_range(2, 3, false);
        assert_eq!(sum.symbol(), arithmetic::SUM);
    }
}
