//! Canvas geometry: Point, Size, Rect.
//!
//! Coordinates are in canvas pixels (`f64`), with the origin at the top-left
//! and `y` growing downward.

use std::ops::{Add, Sub};

// ---------------------------------------------------------------------------
// Point
// ---------------------------------------------------------------------------

/// A position on the canvas.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// The origin.
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;
    #[inline]
    fn add(self, rhs: Point) -> Point {
        Point { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl Sub for Point {
    type Output = Point;
    #[inline]
    fn sub(self, rhs: Point) -> Point {
        Point { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

// ---------------------------------------------------------------------------
// Size
// ---------------------------------------------------------------------------

/// Width and height in canvas pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Size = Size { width: 0.0, height: 0.0 };

    #[inline]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero or negative.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

/// An axis-aligned rectangle.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    /// The right edge (exclusive).
    #[inline]
    pub fn right(self) -> f64 {
        self.origin.x + self.size.width
    }

    /// The bottom edge (exclusive).
    #[inline]
    pub fn bottom(self) -> f64 {
        self.origin.y + self.size.height
    }

    /// Whether `point` lies inside the rectangle. Left/top edges are
    /// inclusive, right/bottom edges exclusive.
    #[inline]
    pub fn contains(self, point: Point) -> bool {
        point.x >= self.origin.x
            && point.x < self.right()
            && point.y >= self.origin.y
            && point.y < self.bottom()
    }

    /// Whether the two rectangles share a non-zero area.
    #[inline]
    pub fn overlaps(self, other: Rect) -> bool {
        self.origin.x < other.right()
            && other.origin.x < self.right()
            && self.origin.y < other.bottom()
            && other.origin.y < self.bottom()
    }

    /// Move the rectangle by `delta`.
    #[inline]
    pub fn translate(self, delta: Point) -> Rect {
        Rect {
            origin: self.origin + delta,
            size: self.size,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_arithmetic() {
        let a = Point::new(3.0, 4.0);
        let b = Point::new(1.0, 1.5);
        assert_eq!(a + b, Point::new(4.0, 5.5));
        assert_eq!(a - b, Point::new(2.0, 2.5));
    }

    #[test]
    fn size_is_empty() {
        assert!(Size::ZERO.is_empty());
        assert!(Size::new(10.0, 0.0).is_empty());
        assert!(!Size::new(1.0, 1.0).is_empty());
    }

    #[test]
    fn rect_contains_edges() {
        let r = Rect::new(10.0, 10.0, 20.0, 10.0);
        assert!(r.contains(Point::new(10.0, 10.0)));
        assert!(r.contains(Point::new(29.9, 19.9)));
        assert!(!r.contains(Point::new(30.0, 15.0)));
        assert!(!r.contains(Point::new(15.0, 20.0)));
        assert!(!r.contains(Point::new(9.9, 15.0)));
    }

    #[test]
    fn rect_overlaps() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.overlaps(Rect::new(5.0, 5.0, 10.0, 10.0)));
        assert!(!a.overlaps(Rect::new(10.0, 0.0, 5.0, 5.0)));
    }

    #[test]
    fn rect_translate() {
        let r = Rect::new(1.0, 2.0, 3.0, 4.0).translate(Point::new(10.0, 20.0));
        assert_eq!(r, Rect::new(11.0, 22.0, 3.0, 4.0));
    }
}
