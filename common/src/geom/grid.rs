use super::interval::Interval;
use std::fmt;

/// An addressable routing location: metal layer, track index and cross-point index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GridPoint {
    pub layer: usize,
    pub track: i32,
    pub cp: i32,
}

impl GridPoint {
    #[inline(always)]
    pub fn new(layer: usize, track: i32, cp: i32) -> Self {
        Self { layer, track, cp }
    }
}

impl fmt::Debug for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.layer, self.track, self.cp)
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.layer, self.track, self.cp)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    Via,
    Track,
    WrongWay,
    Invalid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridEdge {
    pub u: GridPoint,
    pub v: GridPoint,
}

impl GridEdge {
    pub fn new(u: GridPoint, v: GridPoint) -> Self {
        Self { u, v }
    }

    pub fn kind(&self) -> EdgeKind {
        let (u, v) = (self.u, self.v);
        if u.layer + 1 == v.layer || v.layer + 1 == u.layer {
            EdgeKind::Via
        } else if u.layer != v.layer {
            EdgeKind::Invalid
        } else if u.track == v.track {
            EdgeKind::Track
        } else if u.cp == v.cp {
            EdgeKind::WrongWay
        } else {
            EdgeKind::Invalid
        }
    }

    pub fn lower(&self) -> GridPoint {
        if self.u.layer <= self.v.layer { self.u } else { self.v }
    }

    pub fn upper(&self) -> GridPoint {
        if self.u.layer <= self.v.layer { self.v } else { self.u }
    }

    pub fn track_segment(&self) -> Option<TrackSegment> {
        (self.kind() == EdgeKind::Track).then(|| TrackSegment {
            layer: self.u.layer,
            track: self.u.track,
            cps: Interval::new(self.u.cp.min(self.v.cp), self.u.cp.max(self.v.cp)),
        })
    }

    pub fn wrong_way_segment(&self) -> Option<WrongWaySegment> {
        (self.kind() == EdgeKind::WrongWay).then(|| WrongWaySegment {
            layer: self.u.layer,
            tracks: Interval::new(self.u.track.min(self.v.track), self.u.track.max(self.v.track)),
            cp: self.u.cp,
        })
    }
}

/// A run of cross-points on one track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackSegment {
    pub layer: usize,
    pub track: i32,
    pub cps: Interval<i32>,
}

impl TrackSegment {
    pub fn new(layer: usize, track: i32, cps: Interval<i32>) -> Self {
        Self { layer, track, cps }
    }
}

/// A jog across consecutive tracks at a single cross-point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WrongWaySegment {
    pub layer: usize,
    pub tracks: Interval<i32>,
    pub cp: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridBoxOnLayer {
    pub layer: usize,
    pub tracks: Interval<i32>,
    pub cps: Interval<i32>,
}

impl GridBoxOnLayer {
    pub fn new(layer: usize, tracks: Interval<i32>, cps: Interval<i32>) -> Self {
        Self { layer, tracks, cps }
    }

    pub fn contains(&self, gp: &GridPoint) -> bool {
        gp.layer == self.layer && self.tracks.contains(gp.track) && self.cps.contains(gp.cp)
    }

    pub fn num_points(&self) -> i64 {
        if !self.tracks.is_valid() || !self.cps.is_valid() {
            return 0;
        }
        (self.tracks.range() as i64 + 1) * (self.cps.range() as i64 + 1)
    }
}

/// Slices same-layer boxes at every track boundary, merges overlapping cross-point
/// ranges within a track slab, then stitches neighbouring slabs with equal cp ranges.
/// The result covers the same grid points with pairwise disjoint boxes.
pub fn slice_grid_boxes(boxes: &mut Vec<GridBoxOnLayer>) {
    if boxes.len() <= 1 {
        return;
    }
    let mut locs: Vec<i32> = boxes.iter().flat_map(|b| [b.tracks.low, b.tracks.high]).collect();
    locs.sort_unstable();
    locs.dedup();

    let mut sliced = Vec::new();
    for b in boxes.iter() {
        let start = locs.partition_point(|&l| l < b.tracks.low);
        let end = locs.partition_point(|&l| l <= b.tracks.high);
        let mut piece = *b;
        piece.tracks = Interval::point(locs[start]);
        sliced.push(piece);
        for w in locs[start..end].windows(2) {
            let (left, right) = (w[0], w[1]);
            if right - left > 1 {
                piece.tracks = Interval::new(left + 1, right - 1);
                sliced.push(piece);
            }
            piece.tracks = Interval::point(right);
            sliced.push(piece);
        }
    }

    merge_along(&mut sliced, |b| (b.tracks, b.cps), |b, r| b.cps = r, false);
    merge_along(&mut sliced, |b| (b.cps, b.tracks), |b, r| b.tracks = r, true);
    *boxes = sliced;
}

/// Merges boxes sharing the same `key().0` whose `key().1` ranges overlap
/// (or touch, when `stitch`).
fn merge_along(
    boxes: &mut Vec<GridBoxOnLayer>,
    key: impl Fn(&GridBoxOnLayer) -> (Interval<i32>, Interval<i32>),
    set: impl Fn(&mut GridBoxOnLayer, Interval<i32>),
    stitch: bool,
) {
    boxes.sort_by_key(|b| {
        let (fixed, merged) = key(b);
        (fixed.low, fixed.high, merged.low, merged.high)
    });
    let mut out: Vec<GridBoxOnLayer> = Vec::with_capacity(boxes.len());
    for b in boxes.drain(..) {
        if let Some(last) = out.last_mut() {
            let (lf, lm) = key(last);
            let (bf, bm) = key(&b);
            let reach = if stitch { lm.high + 1 } else { lm.high };
            if lf == bf && bm.low <= reach {
                set(last, lm.union(&bm));
                continue;
            }
        }
        out.push(b);
    }
    *boxes = out;
}

/// The matching grid boxes on the two metal layers of a cut layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViaBox {
    pub lower: GridBoxOnLayer,
    pub upper: GridBoxOnLayer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_kinds() {
        let a = GridPoint::new(1, 3, 4);
        assert_eq!(GridEdge::new(a, GridPoint::new(2, 0, 0)).kind(), EdgeKind::Via);
        assert_eq!(GridEdge::new(a, GridPoint::new(1, 3, 9)).kind(), EdgeKind::Track);
        assert_eq!(GridEdge::new(a, GridPoint::new(1, 5, 4)).kind(), EdgeKind::WrongWay);
        assert_eq!(GridEdge::new(a, GridPoint::new(1, 5, 5)).kind(), EdgeKind::Invalid);
        assert_eq!(GridEdge::new(a, GridPoint::new(3, 3, 4)).kind(), EdgeKind::Invalid);
        let ts = GridEdge::new(GridPoint::new(1, 3, 9), a).track_segment();
        assert_eq!(ts, Some(TrackSegment::new(1, 3, Interval::new(4, 9))));
    }

    #[test]
    fn sliced_boxes_are_disjoint_and_cover_input() {
        let a = GridBoxOnLayer::new(0, Interval::new(0, 4), Interval::new(0, 3));
        let b = GridBoxOnLayer::new(0, Interval::new(2, 6), Interval::new(2, 8));
        let mut boxes = vec![a, b];
        slice_grid_boxes(&mut boxes);
        for t in 0..=6 {
            for c in 0..=8 {
                let gp = GridPoint::new(0, t, c);
                let hits = boxes.iter().filter(|g| g.contains(&gp)).count();
                let expected = usize::from(a.contains(&gp) || b.contains(&gp));
                assert_eq!(hits, expected, "{:?}", gp);
            }
        }
    }
}
