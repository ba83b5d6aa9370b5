//! A stateful walker over visible nodes.
//!
//! The cursor keeps the full chain of raw subtrees from its starting node
//! down to the current one, hidden nodes included, so that moving to a
//! parent or sibling never has to search from the root.

use super::language::FieldId;
use super::length::Length;
use super::node::NodeRef;
use super::point::{point_gt, POINT_ZERO};
use super::subtree::Subtree;
use crate::Point;

#[derive(Clone, Debug)]
pub struct TreeCursorEntry {
    pub subtree: Subtree,
    pub position: Length,
    pub child_index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TreeCursorStep {
    None,
    Hidden,
    Visible,
}

#[derive(Clone, Debug)]
pub struct TreeCursor {
    base_path: Vec<u32>,
    stack: Vec<TreeCursorEntry>,
}

struct ChildEntries<'a> {
    parent: &'a Subtree,
    child_index: u32,
    /// End of the previous child's content.
    position: Length,
}

impl<'a> ChildEntries<'a> {
    fn new(parent: &'a TreeCursorEntry) -> Self {
        Self {
            parent: &parent.subtree,
            child_index: 0,
            position: parent.position,
        }
    }

    /// Continue with the siblings that follow `entry`.
    fn after(parent: &'a TreeCursorEntry, entry: &TreeCursorEntry) -> Self {
        Self {
            parent: &parent.subtree,
            child_index: entry.child_index + 1,
            position: entry.position + entry.subtree.size,
        }
    }
}

impl Iterator for ChildEntries<'_> {
    type Item = TreeCursorEntry;

    fn next(&mut self) -> Option<TreeCursorEntry> {
        let child = self.parent.children.get(self.child_index as usize)?;
        if self.child_index > 0 {
            self.position = self.position + child.padding;
        }
        let entry = TreeCursorEntry {
            subtree: child.clone(),
            position: self.position,
            child_index: self.child_index,
        };
        self.position = self.position + child.size;
        self.child_index += 1;
        Some(entry)
    }
}

#[inline]
fn is_reachable(entry: &TreeCursorEntry) -> bool {
    entry.subtree.visible || entry.subtree.visible_child_count > 0
}

impl TreeCursor {
    pub fn new(node: &NodeRef) -> Self {
        let mut cursor = Self {
            base_path: Vec::new(),
            stack: Vec::new(),
        };
        cursor.reset(node);
        cursor
    }

    pub fn reset(&mut self, node: &NodeRef) {
        self.base_path.clone_from(&node.path);
        self.stack.clear();
        self.stack.push(TreeCursorEntry {
            subtree: node.subtree.clone(),
            position: node.position,
            child_index: 0,
        });
    }

    fn last(&self) -> &TreeCursorEntry {
        &self.stack[self.stack.len() - 1]
    }

    #[inline]
    fn is_entry_visible(&self, index: usize) -> bool {
        index == 0 || self.stack[index].subtree.visible
    }

    pub fn current_node(&self) -> NodeRef {
        let entry = self.last();
        let mut path = self.base_path.clone();
        path.extend(self.stack[1..].iter().map(|entry| entry.child_index));
        NodeRef {
            subtree: entry.subtree.clone(),
            position: entry.position,
            path,
        }
    }

    /// Number of visible ancestors between the starting node and the
    /// current node, inclusive of the current node.
    pub fn depth(&self) -> u32 {
        self.stack[1..].iter().filter(|entry| entry.subtree.visible).count() as u32
    }

    // -----------------------------------------------------------------------
    // Descending
    // -----------------------------------------------------------------------

    fn goto_child_internal(&mut self, last: bool) -> TreeCursorStep {
        let parent = self.last().clone();
        let mut children = ChildEntries::new(&parent).filter(is_reachable);
        let child = if last { children.last() } else { children.next() };
        match child {
            Some(entry) => {
                let visible = entry.subtree.visible;
                self.stack.push(entry);
                if visible {
                    TreeCursorStep::Visible
                } else {
                    TreeCursorStep::Hidden
                }
            }
            None => TreeCursorStep::None,
        }
    }

    pub fn goto_first_child(&mut self) -> bool {
        loop {
            match self.goto_child_internal(false) {
                TreeCursorStep::Hidden => continue,
                TreeCursorStep::Visible => return true,
                TreeCursorStep::None => return false,
            }
        }
    }

    pub fn goto_last_child(&mut self) -> bool {
        loop {
            match self.goto_child_internal(true) {
                TreeCursorStep::Hidden => continue,
                TreeCursorStep::Visible => return true,
                TreeCursorStep::None => return false,
            }
        }
    }

    /// Move to the child containing the goal, leading whitespace included,
    /// and return its index among the visible children. The cursor stays put on failure.
    fn goto_first_child_for_byte_and_point(&mut self, goal_byte: u32, goal_point: Point) -> Option<u32> {
        let initial_size = self.stack.len();
        let mut visible_child_index = 0;

        'descend: loop {
            let parent = self.last().clone();
            for entry in ChildEntries::new(&parent) {
                let entry_end = entry.position + entry.subtree.size;
                let at_goal = entry_end.bytes > goal_byte && point_gt(entry_end.extent, goal_point);
                let visible_child_count = entry.subtree.visible_child_count;
                if at_goal {
                    if entry.subtree.visible {
                        self.stack.push(entry);
                        return Some(visible_child_index);
                    }
                    if visible_child_count > 0 {
                        self.stack.push(entry);
                        continue 'descend;
                    }
                } else if entry.subtree.visible {
                    visible_child_index += 1;
                } else {
                    visible_child_index += visible_child_count;
                }
            }
            break;
        }

        self.stack.truncate(initial_size);
        None
    }

    pub fn goto_first_child_for_byte(&mut self, goal_byte: u32) -> Option<u32> {
        self.goto_first_child_for_byte_and_point(goal_byte, POINT_ZERO)
    }

    pub fn goto_first_child_for_point(&mut self, goal_point: Point) -> Option<u32> {
        self.goto_first_child_for_byte_and_point(0, goal_point)
    }

    // -----------------------------------------------------------------------
    // Siblings and parents
    // -----------------------------------------------------------------------

    fn goto_sibling_internal(&mut self, forward: bool) -> TreeCursorStep {
        let initial_size = self.stack.len();
        let mut popped = Vec::new();

        while self.stack.len() > 1 {
            let Some(entry) = self.stack.pop() else {
                break;
            };
            // Climbing out of a visible node means there is no sibling at
            // the starting level.
            if entry.subtree.visible && self.stack.len() + 1 < initial_size {
                popped.push(entry);
                break;
            }

            let parent = self.last().clone();
            let candidate = if forward {
                ChildEntries::after(&parent, &entry).find(is_reachable)
            } else {
                let preceding: Vec<_> = ChildEntries::new(&parent)
                    .take(entry.child_index as usize)
                    .collect();
                preceding.into_iter().rev().find(is_reachable)
            };
            popped.push(entry);

            if let Some(candidate) = candidate {
                let visible = candidate.subtree.visible;
                self.stack.push(candidate);
                return if visible {
                    TreeCursorStep::Visible
                } else {
                    TreeCursorStep::Hidden
                };
            }
        }

        self.stack.extend(popped.into_iter().rev());
        debug_assert_eq!(self.stack.len(), initial_size);
        TreeCursorStep::None
    }

    pub fn goto_next_sibling(&mut self) -> bool {
        match self.goto_sibling_internal(true) {
            TreeCursorStep::Hidden => {
                self.goto_first_child();
                true
            }
            TreeCursorStep::Visible => true,
            TreeCursorStep::None => false,
        }
    }

    pub fn goto_previous_sibling(&mut self) -> bool {
        match self.goto_sibling_internal(false) {
            TreeCursorStep::Hidden => {
                self.goto_last_child();
                true
            }
            TreeCursorStep::Visible => true,
            TreeCursorStep::None => false,
        }
    }

    pub fn goto_parent(&mut self) -> bool {
        for i in (0..self.stack.len().saturating_sub(1)).rev() {
            if self.is_entry_visible(i) {
                self.stack.truncate(i + 1);
                return true;
            }
        }
        false
    }

    /// The field the current node is attached under. Fields may be recorded
    /// on hidden wrapper nodes, so those ancestors are searched too.
    pub fn current_field_id(&self) -> FieldId {
        let len = self.stack.len();
        for i in (1..len).rev() {
            let entry = &self.stack[i];
            if i != len - 1 && entry.subtree.visible {
                break;
            }
            if entry.subtree.extra {
                break;
            }
            let field_id = self.stack[i - 1].subtree.field_id(entry.child_index as usize);
            if field_id != 0 {
                return field_id;
            }
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parser::{parse, ParseOptions};
    use crate::grammars::arithmetic;

    fn cursor_for(text: &str) -> TreeCursor {
        let options = ParseOptions {
            included_ranges: &[],
            operation_limit: 0,
            logger: None,
        };
        let root = parse(&arithmetic::DEFINITION, text.as_bytes(), None, options);
        TreeCursor::new(&NodeRef::root(&root))
    }

    #[test]
    fn walks_visible_nodes_in_order() {
        let mut cursor = cursor_for("1 + 2");
        assert!(cursor.goto_first_child());
        assert_eq!(cursor.current_node().symbol(), arithmetic::SUM);
        assert!(!cursor.goto_next_sibling());
        assert!(cursor.goto_first_child());
        assert_eq!(cursor.current_field_id(), arithmetic::FIELD_LEFT);
        assert!(cursor.goto_next_sibling());
        assert_eq!(cursor.current_node().symbol(), arithmetic::PLUS);
        assert_eq!(cursor.current_field_id(), 0);
        assert!(cursor.goto_next_sibling());
        assert_eq!(cursor.current_field_id(), arithmetic::FIELD_RIGHT);
        assert_eq!(cursor.current_node().path, vec![0, 2]);
        assert!(!cursor.goto_next_sibling());
        assert!(cursor.goto_previous_sibling());
        assert_eq!(cursor.current_node().start_byte(), 2);
        assert_eq!(cursor.depth(), 2);
        assert!(cursor.goto_parent());
        assert!(cursor.goto_parent());
        assert!(!cursor.goto_parent());
        assert_eq!(cursor.depth(), 0);
    }

    #[test]
    fn last_child_and_child_for_byte() {
        let mut cursor = cursor_for("1 + 2");
        assert_eq!(cursor.goto_first_child_for_byte(100), None);
        assert!(cursor.goto_first_child());
        assert_eq!(cursor.goto_first_child_for_byte(3), Some(2));
        assert_eq!(cursor.current_node().start_byte(), 4);
        assert!(cursor.goto_parent());
        assert!(cursor.goto_last_child());
        assert_eq!(cursor.current_node().start_byte(), 4);
    }
}
