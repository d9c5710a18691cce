pub mod grid;
pub mod interval;
pub mod point;
pub mod rect;
pub mod rtree;

pub use grid::{slice_grid_boxes, EdgeKind, GridBoxOnLayer, GridEdge, GridPoint, TrackSegment, ViaBox, WrongWaySegment};
pub use interval::{Coord, Interval};
pub use point::Point;
pub use rect::{BoxOnLayer, Dbu, Rect};
pub use rtree::SpatialIndex;

/// Axis selector for points, rectangles and layer directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dim {
    X,
    Y,
}

impl Dim {
    #[inline(always)]
    pub fn other(self) -> Dim {
        match self {
            Dim::X => Dim::Y,
            Dim::Y => Dim::X,
        }
    }

    pub const ALL: [Dim; 2] = [Dim::X, Dim::Y];
}
