use crate::Point;

pub const POINT_ZERO: Point = Point { row: 0, column: 0 };
pub const POINT_MAX: Point = Point {
    row: u32::MAX,
    column: u32::MAX,
};

#[inline]
pub fn point_new(row: u32, column: u32) -> Point {
    Point { row, column }
}

/// Appends the extent `b` to the position `a`.
#[inline]
pub fn point_add(a: Point, b: Point) -> Point {
    if b.row > 0 {
        point_new(a.row + b.row, b.column)
    } else {
        point_new(a.row, a.column + b.column)
    }
}

/// The extent that takes `b` to `a`, saturating at zero.
#[inline]
pub fn point_sub(a: Point, b: Point) -> Point {
    if a.row > b.row {
        point_new(a.row - b.row, a.column)
    } else {
        point_new(0, a.column.saturating_sub(b.column))
    }
}

#[inline]
pub fn point_gt(a: Point, b: Point) -> bool {
    (a.row > b.row) || (a.row == b.row && a.column > b.column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_sub_follow_rows() {
        let a = point_new(2, 5);
        assert_eq!(point_add(a, point_new(0, 3)), point_new(2, 8));
        assert_eq!(point_add(a, point_new(1, 3)), point_new(3, 3));
        assert_eq!(point_sub(point_new(3, 3), a), point_new(1, 3));
        assert_eq!(point_sub(point_new(2, 1), a), point_new(0, 0));
    }
}
