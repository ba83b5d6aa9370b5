use std::ops::{Add, Sub};

use crate::Point;

use super::point::{point_add, point_sub, POINT_ZERO};

/// A byte count paired with the row/column extent it covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Length {
    pub bytes: u32,
    pub extent: Point,
}

pub const LENGTH_MAX: Length = Length {
    bytes: u32::MAX,
    extent: Point {
        row: u32::MAX,
        column: u32::MAX,
    },
};

impl Length {
    #[inline]
    pub const fn new(bytes: u32, extent: Point) -> Self {
        Self { bytes, extent }
    }
}

#[inline]
pub fn length_min(len1: Length, len2: Length) -> Length {
    if len1.bytes < len2.bytes {
        len1
    } else {
        len2
    }
}

#[inline]
pub fn length_add(len1: Length, len2: Length) -> Length {
    Length {
        bytes: len1.bytes + len2.bytes,
        extent: point_add(len1.extent, len2.extent),
    }
}

#[inline]
pub fn length_sub(len1: Length, len2: Length) -> Length {
    Length {
        bytes: len1.bytes.saturating_sub(len2.bytes),
        extent: point_sub(len1.extent, len2.extent),
    }
}

#[inline]
pub fn length_zero() -> Length {
    Length {
        bytes: 0,
        extent: POINT_ZERO,
    }
}

#[inline]
pub fn length_saturating_sub(len1: Length, len2: Length) -> Length {
    if len1.bytes > len2.bytes {
        length_sub(len1, len2)
    } else {
        length_zero()
    }
}

impl Add for Length {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        length_add(self, rhs)
    }
}

impl Sub for Length {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        length_sub(self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::point::point_new;

    #[test]
    fn saturating_sub_clamps_to_zero() {
        let a = Length::new(3, point_new(0, 3));
        let b = Length::new(5, point_new(0, 5));
        assert_eq!(length_saturating_sub(a, b), length_zero());
        assert_eq!(length_saturating_sub(b, a), Length::new(2, point_new(0, 2)));
    }

    #[test]
    fn add_resets_column_after_newline() {
        let a = Length::new(4, point_new(0, 4));
        let b = Length::new(3, point_new(1, 2));
        assert_eq!(a + b, Length::new(7, point_new(1, 2)));
    }
}
