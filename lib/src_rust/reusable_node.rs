// Lookup of subtrees from a previous parse that can be reused verbatim.

use super::language::{StateId, STATE_NONE};
use super::subtree::Subtree;

pub struct ReusableNode {
    root: Subtree,
    input_len: u32,
}

impl ReusableNode {
    pub fn new(root: Subtree, input_len: u32) -> Self {
        Self { root, input_len }
    }

    /// The outermost subtree that starts (padding included) at `position`,
    /// was completed in `state`, and is untouched by edits.
    pub fn find(&self, position: u32, state: StateId) -> Option<Subtree> {
        if state == STATE_NONE {
            return None;
        }

        let mut node = &self.root;
        let mut offset = 0;
        'descend: loop {
            let mut child_start = offset;
            for child in &node.children {
                if child_start > position {
                    return None;
                }
                let child_end = child_start + child.total_bytes();
                if child_start == position && self.can_reuse(child, state, child_end) {
                    return Some(child.clone());
                }
                if position < child_end {
                    node = child;
                    offset = child_start;
                    continue 'descend;
                }
                child_start = child_end;
            }
            return None;
        }
    }

    fn can_reuse(&self, subtree: &Subtree, state: StateId, end: u32) -> bool {
        subtree.parse_state == state
            && !subtree.has_changes
            && !subtree.has_error()
            && !subtree.extra
            && !subtree.is_missing
            && subtree.size.bytes > 0
            && end <= self.input_len
    }
}
