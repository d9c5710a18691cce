use super::Dim;
use super::interval::Coord;
use std::ops::{Index, IndexMut};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point<T> {
    pub x: T,
    pub y: T,
}

impl<T> Point<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T: Coord> Point<T> {
    pub fn manhattan(&self, other: &Self) -> T {
        let dx = self.x.max(other.x) - self.x.min(other.x);
        let dy = self.y.max(other.y) - self.y.min(other.y);
        dx + dy
    }
}

impl<T> Index<Dim> for Point<T> {
    type Output = T;
    fn index(&self, dim: Dim) -> &T {
        match dim {
            Dim::X => &self.x,
            Dim::Y => &self.y,
        }
    }
}

impl<T> IndexMut<Dim> for Point<T> {
    fn index_mut(&mut self, dim: Dim) -> &mut T {
        match dim {
            Dim::X => &mut self.x,
            Dim::Y => &mut self.y,
        }
    }
}
