use super::Dim;
use super::interval::Interval;
use super::point::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Database unit, the integer length unit of all layout geometry.
pub type Dbu = i64;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[Dbu; 4]", into = "[Dbu; 4]")]
pub struct Rect {
    pub x: Interval<Dbu>,
    pub y: Interval<Dbu>,
}

impl From<[Dbu; 4]> for Rect {
    fn from(c: [Dbu; 4]) -> Self {
        Rect::new(c[0], c[1], c[2], c[3])
    }
}

impl From<Rect> for [Dbu; 4] {
    fn from(r: Rect) -> Self {
        [r.x.low, r.y.low, r.x.high, r.y.high]
    }
}

impl Rect {
    pub fn new(lx: Dbu, ly: Dbu, hx: Dbu, hy: Dbu) -> Self {
        Self {
            x: Interval::new(lx, hx),
            y: Interval::new(ly, hy),
        }
    }

    pub fn from_intervals(x: Interval<Dbu>, y: Interval<Dbu>) -> Self {
        Self { x, y }
    }

    pub fn from_point(p: Point<Dbu>) -> Self {
        Self::new(p.x, p.y, p.x, p.y)
    }

    pub fn empty() -> Self {
        Self {
            x: Interval::empty(),
            y: Interval::empty(),
        }
    }

    pub fn width(&self) -> Dbu {
        self.x.range()
    }
    pub fn height(&self) -> Dbu {
        self.y.range()
    }
    pub fn min_dim(&self) -> Dbu {
        self.width().min(self.height())
    }
    pub fn area(&self) -> Dbu {
        self.width() * self.height()
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_valid() && self.y.is_valid()
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect::from_intervals(self.x.intersect(&other.x), self.y.intersect(&other.y))
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_intervals(self.x.union(&other.x), self.y.union(&other.y))
    }

    /// Closed-box intersection, touching edges included.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.intersect(other).is_valid()
    }

    /// Intersection with a strictly positive area.
    pub fn overlaps_area(&self, other: &Rect) -> bool {
        let ovlp = self.intersect(other);
        ovlp.is_valid() && ovlp.area() > 0
    }

    pub fn contains_point(&self, p: Point<Dbu>) -> bool {
        self.x.contains(p.x) && self.y.contains(p.y)
    }

    pub fn contains(&self, other: &Rect) -> bool {
        self.x.contains_interval(&other.x) && self.y.contains_interval(&other.y)
    }

    pub fn expand(&self, margin: Dbu) -> Rect {
        Rect::from_intervals(self.x.expand(margin), self.y.expand(margin))
    }

    pub fn shift(&self, p: Point<Dbu>) -> Rect {
        Rect::from_intervals(self.x.shift(p.x), self.y.shift(p.y))
    }

    pub fn center(&self) -> Point<Dbu> {
        Point::new((self.x.low + self.x.high) / 2, (self.y.low + self.y.high) / 2)
    }

    pub fn gap(&self, other: &Rect, dim: Dim) -> Dbu {
        self[dim].gap(&other[dim])
    }

    /// Manhattan distance between two boxes (zero when overlapping).
    pub fn dist(&self, other: &Rect) -> Dbu {
        self.x.gap(&other.x) + self.y.gap(&other.y)
    }

    pub fn dist_to_point(&self, p: Point<Dbu>) -> Dbu {
        self.dist(&Rect::from_point(p))
    }

    pub fn l2_dist(&self, other: &Rect) -> f64 {
        let dx = self.x.gap(&other.x) as f64;
        let dy = self.y.gap(&other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Index<Dim> for Rect {
    type Output = Interval<Dbu>;
    fn index(&self, dim: Dim) -> &Interval<Dbu> {
        match dim {
            Dim::X => &self.x,
            Dim::Y => &self.y,
        }
    }
}

impl IndexMut<Dim> for Rect {
    fn index_mut(&mut self, dim: Dim) -> &mut Interval<Dbu> {
        match dim {
            Dim::X => &mut self.x,
            Dim::Y => &mut self.y,
        }
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{:?} y{:?}", self.x, self.y)
    }
}

/// A rectangle on a metal layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoxOnLayer {
    pub layer: usize,
    pub rect: Rect,
}

impl BoxOnLayer {
    pub fn new(layer: usize, rect: Rect) -> Self {
        Self { layer, rect }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_reads_from_corner_array() {
        let r: Rect = [0, 10, 40, 30].into();
        assert_eq!(r.width(), 40);
        assert_eq!(r.height(), 20);
        assert_eq!(r.min_dim(), 20);
        let back: [Dbu; 4] = r.into();
        assert_eq!(back, [0, 10, 40, 30]);
    }

    #[test]
    fn distances_between_boxes() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(13, 14, 20, 20);
        assert_eq!(a.dist(&b), 7);
        assert!((a.l2_dist(&b) - 5.0).abs() < 1e-9);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&Rect::new(10, 10, 12, 12)));
        assert!(!a.overlaps_area(&Rect::new(10, 10, 12, 12)));
    }
}
