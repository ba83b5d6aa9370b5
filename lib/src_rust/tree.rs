use tracing::trace;

use crate::{InputEdit, Range};

use super::get_changed_ranges::{range_array_get_changed_ranges, range_edit, subtree_get_changed_ranges};
use super::lexer::DEFAULT_RANGE;
use super::node::NodeRef;
use super::subtree::Subtree;

/// The result of one parse: the root subtree plus what it was parsed with.
#[derive(Clone, Debug)]
pub struct TreeData {
    pub root: Subtree,
    pub included_ranges: Vec<Range>,
}

impl TreeData {
    pub fn new(root: Subtree, included_ranges: &[Range]) -> Self {
        let included_ranges = if included_ranges.is_empty() {
            vec![DEFAULT_RANGE]
        } else {
            included_ranges.to_vec()
        };
        Self {
            root,
            included_ranges,
        }
    }

    #[inline]
    pub fn root_node(&self) -> NodeRef {
        NodeRef::root(&self.root)
    }

    pub fn edit(&mut self, edit: &InputEdit) {
        trace!(
            start_byte = edit.start_byte,
            old_end_byte = edit.old_end_byte,
            new_end_byte = edit.new_end_byte,
            "edit tree"
        );
        for range in &mut self.included_ranges {
            range_edit(range, edit);
        }
        self.root.edit(edit);
    }

    /// Spans where `new_tree`, a reparse of this edited tree, differs.
    pub fn changed_ranges(&self, new_tree: &TreeData) -> Vec<Range> {
        let included_range_differences =
            range_array_get_changed_ranges(&self.included_ranges, &new_tree.included_ranges);
        subtree_get_changed_ranges(&self.root, &new_tree.root, &included_range_differences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parser::{parse, ParseOptions};
    use crate::engine::point::point_new;
    use crate::grammars::arithmetic;

    fn parse_tree(text: &str, old: Option<&TreeData>) -> TreeData {
        let options = ParseOptions {
            included_ranges: &[],
            operation_limit: 0,
            logger: None,
        };
        let root = parse(&arithmetic::DEFINITION, text.as_bytes(), old.map(|tree| &tree.root), options);
        TreeData::new(root, &[])
    }

    #[test]
    fn edit_marks_changes_and_reparse_reports_them() {
        let mut tree = parse_tree("1 + 2", None);
        tree.edit(&InputEdit {
            start_byte: 4,
            old_end_byte: 5,
            new_end_byte: 11,
            start_position: point_new(0, 4),
            old_end_position: point_new(0, 5),
            new_end_position: point_new(0, 11),
        });
        assert!(tree.root.has_changes);
        assert_eq!(tree.included_ranges, vec![DEFAULT_RANGE]);

        let new_tree = parse_tree("1 + (3 + 3)", Some(&tree));
        let changed = tree.changed_ranges(&new_tree);
        assert_eq!(changed.len(), 1);
        assert!(changed[0].start_byte <= 4);
        assert_eq!(changed[0].end_byte, 11);
    }

    #[test]
    fn identical_trees_have_no_changed_ranges() {
        let tree = parse_tree("1 + 2", None);
        let copy = tree.clone();
        assert!(tree.changed_ranges(&copy).is_empty());
    }
}
