//! Diffing two trees for the spans whose structure differs.
//!
//! Both trees are walked in lockstep. Subtrees that were reused verbatim
//! compare equal and are skipped whole; anything else is descended into
//! until the two sides either line up again or are known to differ.

use crate::{InputEdit, Range};

use super::language::STATE_NONE;
use super::length::{length_min, length_zero, Length, LENGTH_MAX};
use super::point::{point_add, point_sub, POINT_MAX};
use super::subtree::Subtree;

// ---------------------------------------------------------------------------
// Range arrays
// ---------------------------------------------------------------------------

fn range_array_add(ranges: &mut Vec<Range>, start: Length, end: Length) {
    if let Some(last_range) = ranges.last_mut() {
        if start.bytes <= last_range.end_byte {
            last_range.end_byte = end.bytes;
            last_range.end_point = end.extent;
            return;
        }
    }

    if start.bytes < end.bytes {
        ranges.push(Range {
            start_byte: start.bytes,
            end_byte: end.bytes,
            start_point: start.extent,
            end_point: end.extent,
        });
    }
}

fn range_array_intersects(ranges: &[Range], start_index: usize, start_byte: u32, end_byte: u32) -> bool {
    for range in ranges.iter().skip(start_index) {
        if range.end_byte > start_byte {
            return range.start_byte < end_byte;
        }
    }
    false
}

/// The spans covered by exactly one of the two range lists.
pub fn range_array_get_changed_ranges(old_ranges: &[Range], new_ranges: &[Range]) -> Vec<Range> {
    let mut differences = Vec::new();
    let mut old_index = 0;
    let mut new_index = 0;
    let mut current_position = length_zero();
    let mut in_old_range = false;
    let mut in_new_range = false;

    while old_index < old_ranges.len() || new_index < new_ranges.len() {
        let next_old_position = match old_ranges.get(old_index) {
            Some(range) if in_old_range => Length::new(range.end_byte, range.end_point),
            Some(range) => Length::new(range.start_byte, range.start_point),
            None => LENGTH_MAX,
        };
        let next_new_position = match new_ranges.get(new_index) {
            Some(range) if in_new_range => Length::new(range.end_byte, range.end_point),
            Some(range) => Length::new(range.start_byte, range.start_point),
            None => LENGTH_MAX,
        };

        if next_old_position.bytes < next_new_position.bytes {
            if in_old_range != in_new_range {
                range_array_add(&mut differences, current_position, next_old_position);
            }
            if in_old_range {
                old_index += 1;
            }
            current_position = next_old_position;
            in_old_range = !in_old_range;
        } else if next_new_position.bytes < next_old_position.bytes {
            if in_old_range != in_new_range {
                range_array_add(&mut differences, current_position, next_new_position);
            }
            if in_new_range {
                new_index += 1;
            }
            current_position = next_new_position;
            in_new_range = !in_new_range;
        } else {
            if in_old_range != in_new_range {
                range_array_add(&mut differences, current_position, next_new_position);
            }
            if in_old_range {
                old_index += 1;
            }
            if in_new_range {
                new_index += 1;
            }
            in_old_range = !in_old_range;
            in_new_range = !in_new_range;
            current_position = next_new_position;
        }
    }

    differences
}

/// Shift an included range through an edit. Ranges that would end up
/// inverted are pushed out to the end of the document.
pub fn range_edit(range: &mut Range, edit: &InputEdit) {
    if range.end_byte >= edit.old_end_byte {
        if range.end_byte != u32::MAX {
            range.end_byte = edit.new_end_byte + (range.end_byte - edit.old_end_byte);
            range.end_point = point_add(
                edit.new_end_position,
                point_sub(range.end_point, edit.old_end_position),
            );
            if range.end_byte < edit.new_end_byte {
                range.end_byte = u32::MAX;
                range.end_point = POINT_MAX;
            }
        }
    } else if range.end_byte > edit.start_byte {
        range.end_byte = edit.start_byte;
        range.end_point = edit.start_position;
    }

    if range.start_byte >= edit.old_end_byte {
        range.start_byte = edit.new_end_byte + (range.start_byte - edit.old_end_byte);
        range.start_point = point_add(
            edit.new_end_position,
            point_sub(range.start_point, edit.old_end_position),
        );
        if range.start_byte < edit.new_end_byte {
            range.start_byte = u32::MAX;
            range.start_point = POINT_MAX;
        }
    } else if range.start_byte > edit.start_byte {
        range.start_byte = edit.start_byte;
        range.start_point = edit.start_position;
    }
}

// ---------------------------------------------------------------------------
// Tree iterator
// ---------------------------------------------------------------------------

struct Entry {
    subtree: Subtree,
    /// Start of the subtree, padding included.
    position: Length,
    child_index: u32,
}

struct TreeIterator {
    stack: Vec<Entry>,
    visible_depth: u32,
    in_padding: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Comparison {
    Matches,
    MayDiffer,
    Differs,
}

impl TreeIterator {
    fn new(tree: &Subtree) -> Self {
        Self {
            stack: vec![Entry {
                subtree: tree.clone(),
                position: length_zero(),
                child_index: 0,
            }],
            visible_depth: 1,
            in_padding: false,
        }
    }

    #[inline]
    fn done(&self) -> bool {
        self.stack.is_empty()
    }

    fn start_position(&self) -> Length {
        match self.stack.last() {
            Some(entry) if self.in_padding => entry.position,
            Some(entry) => entry.position + entry.subtree.padding,
            None => length_zero(),
        }
    }

    fn end_position(&self) -> Length {
        match self.stack.last() {
            Some(entry) if self.in_padding => entry.position + entry.subtree.padding,
            Some(entry) => entry.position + entry.subtree.total_size(),
            None => length_zero(),
        }
    }

    fn tree_is_visible(&self) -> bool {
        self.stack.last().is_some_and(|entry| entry.subtree.visible)
    }

    /// The innermost visible subtree covering the current position, with
    /// its start byte.
    fn visible_state(&self) -> Option<(&Subtree, u32)> {
        let mut entries = self.stack.iter().rev();
        if self.in_padding {
            entries.next();
            if self.stack.len() == 1 {
                return None;
            }
        }
        entries
            .find(|entry| entry.subtree.visible)
            .map(|entry| (&entry.subtree, entry.position.bytes))
    }

    fn ascend(&mut self) {
        if self.done() {
            return;
        }
        if self.tree_is_visible() && !self.in_padding {
            self.visible_depth -= 1;
        }
        if let Some(entry) = self.stack.pop() {
            if entry.child_index > 0 {
                self.in_padding = false;
            }
        }
    }

    fn descend(&mut self, goal_position: u32) -> bool {
        if self.in_padding {
            return false;
        }

        'descend: loop {
            let Some(entry) = self.stack.last() else {
                return false;
            };
            let parent = entry.subtree.clone();
            let mut position = entry.position;
            for (i, child) in parent.children.iter().enumerate() {
                let child_left = position + child.padding;
                let child_right = child_left + child.size;

                if child_right.bytes > goal_position {
                    self.stack.push(Entry {
                        subtree: child.clone(),
                        position,
                        child_index: i as u32,
                    });

                    if self.tree_is_visible() {
                        if child_left.bytes > goal_position {
                            self.in_padding = true;
                        } else {
                            self.visible_depth += 1;
                        }
                        return true;
                    }
                    continue 'descend;
                }

                position = child_right;
            }
            return false;
        }
    }

    fn advance(&mut self) {
        if self.in_padding {
            self.in_padding = false;
            if self.tree_is_visible() {
                self.visible_depth += 1;
            } else {
                self.descend(0);
            }
            return;
        }

        loop {
            if self.tree_is_visible() {
                self.visible_depth -= 1;
            }
            let Some(entry) = self.stack.pop() else {
                return;
            };
            let Some(parent) = self.stack.last() else {
                return;
            };

            let child_index = entry.child_index + 1;
            if let Some(next_child) = parent.subtree.children.get(child_index as usize) {
                let next_child = next_child.clone();
                let has_padding = next_child.padding.bytes > 0;
                self.stack.push(Entry {
                    subtree: next_child,
                    position: entry.position + entry.subtree.total_size(),
                    child_index,
                });

                if self.tree_is_visible() {
                    if has_padding {
                        self.in_padding = true;
                    } else {
                        self.visible_depth += 1;
                    }
                } else {
                    self.descend(0);
                }
                break;
            }
        }
    }

    fn compare(old_iter: &Self, new_iter: &Self) -> Comparison {
        let (old_tree, old_start, new_tree, new_start) =
            match (old_iter.visible_state(), new_iter.visible_state()) {
                (None, None) => return Comparison::Matches,
                (Some((old_tree, old_start)), Some((new_tree, new_start))) => {
                    (old_tree, old_start, new_tree, new_start)
                }
                _ => return Comparison::Differs,
            };

        if old_tree.symbol != new_tree.symbol {
            return Comparison::Differs;
        }

        if old_start != new_start
            || old_tree.is_error()
            || old_tree.size.bytes != new_tree.size.bytes
            || old_tree.parse_state == STATE_NONE
            || new_tree.parse_state == STATE_NONE
            || old_tree.error_cost != new_tree.error_cost
            || old_tree.has_changes
        {
            return Comparison::MayDiffer;
        }

        Comparison::Matches
    }
}

/// Spans of `new_tree` whose structure differs from the edited `old_tree`.
pub fn subtree_get_changed_ranges(
    old_tree: &Subtree,
    new_tree: &Subtree,
    included_range_differences: &[Range],
) -> Vec<Range> {
    let mut results = Vec::new();
    let mut old_iter = TreeIterator::new(old_tree);
    let mut new_iter = TreeIterator::new(new_tree);
    let mut included_range_difference_index = 0;

    let mut position = old_iter.start_position();
    let mut next_position = new_iter.start_position();
    if position.bytes < next_position.bytes {
        range_array_add(&mut results, position, next_position);
        position = next_position;
    } else if position.bytes > next_position.bytes {
        range_array_add(&mut results, next_position, position);
        next_position = position;
    }

    loop {
        let mut comparison = TreeIterator::compare(&old_iter, &new_iter);

        // Identical subtrees can still differ inside text that moved in or
        // out of the included ranges.
        if comparison == Comparison::Matches
            && range_array_intersects(
                included_range_differences,
                included_range_difference_index,
                position.bytes,
                old_iter.end_position().bytes,
            )
        {
            comparison = Comparison::MayDiffer;
        }

        let mut is_changed = false;
        match comparison {
            Comparison::Matches => {
                next_position = old_iter.end_position();
            }
            Comparison::MayDiffer => {
                if old_iter.descend(position.bytes) {
                    if !new_iter.descend(position.bytes) {
                        is_changed = true;
                        next_position = old_iter.end_position();
                    }
                } else if new_iter.descend(position.bytes) {
                    is_changed = true;
                    next_position = new_iter.end_position();
                } else {
                    next_position = length_min(old_iter.end_position(), new_iter.end_position());
                }
            }
            Comparison::Differs => {
                is_changed = true;
                next_position = length_min(old_iter.end_position(), new_iter.end_position());
            }
        }

        while !old_iter.done() && old_iter.end_position().bytes <= next_position.bytes {
            old_iter.advance();
        }
        while !new_iter.done() && new_iter.end_position().bytes <= next_position.bytes {
            new_iter.advance();
        }

        while old_iter.visible_depth > new_iter.visible_depth {
            old_iter.ascend();
        }
        while new_iter.visible_depth > old_iter.visible_depth {
            new_iter.ascend();
        }

        if is_changed {
            range_array_add(&mut results, position, next_position);
        }

        position = next_position;

        while included_range_differences
            .get(included_range_difference_index)
            .is_some_and(|range| range.end_byte <= position.bytes)
        {
            included_range_difference_index += 1;
        }

        if old_iter.done() || new_iter.done() {
            break;
        }
    }

    let old_size = old_tree.total_size();
    let new_size = new_tree.total_size();
    if old_size.bytes < new_size.bytes {
        range_array_add(&mut results, old_size, new_size);
    } else if new_size.bytes < old_size.bytes {
        range_array_add(&mut results, new_size, old_size);
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::point::point_new;

    fn range(start: u32, end: u32) -> Range {
        Range {
            start_byte: start,
            end_byte: end,
            start_point: point_new(0, start),
            end_point: point_new(0, end),
        }
    }

    #[test]
    fn included_range_differences_are_symmetric() {
        let old = [range(0, 10)];
        let new = [range(0, 4), range(6, 12)];
        let differences = range_array_get_changed_ranges(&old, &new);
        assert_eq!(differences, vec![range(4, 6), range(10, 12)]);
        assert_eq!(range_array_get_changed_ranges(&new, &old), differences);
    }

    #[test]
    fn range_edit_shifts_and_clamps() {
        let edit = InputEdit {
            start_byte: 2,
            old_end_byte: 4,
            new_end_byte: 7,
            start_position: point_new(0, 2),
            old_end_position: point_new(0, 4),
            new_end_position: point_new(0, 7),
        };
        let mut after = range(5, 9);
        range_edit(&mut after, &edit);
        assert_eq!(after, range(8, 12));

        let mut overlapping = range(3, 9);
        range_edit(&mut overlapping, &edit);
        assert_eq!(overlapping, range(2, 12));
    }
}
