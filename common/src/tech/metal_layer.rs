use super::{EolRule, MetalLayerDescription, TechError};
use crate::geom::{Dbu, Dim, GridBoxOnLayer, GridPoint, Interval, Point, Rect};

#[derive(Clone, Copy, Debug)]
pub struct Track {
    pub location: Dbu,
    pub lower_cp: Option<i32>,
    pub upper_cp: Option<i32>,
}

#[derive(Clone, Copy, Debug)]
pub struct CrossPoint {
    pub location: Dbu,
    pub lower_track: Option<i32>,
    pub upper_track: Option<i32>,
}

/// Parallel-run spacing indexed by wire width and parallel run length.
#[derive(Clone, Debug)]
pub struct SpacingTable {
    widths: Vec<Dbu>,
    lengths: Vec<Dbu>,
    table: Vec<Vec<Dbu>>,
}

impl SpacingTable {
    pub fn single(space: Dbu) -> Self {
        Self {
            widths: vec![0],
            lengths: vec![0],
            table: vec![vec![space]],
        }
    }

    /// Picks the last row/column whose bound is strictly below the query.
    pub fn space(&self, width: Dbu, length: Dbu) -> Dbu {
        let mut i_width = self.widths.len() - 1;
        while i_width > 0 && self.widths[i_width] >= width {
            i_width -= 1;
        }
        let row = &self.table[i_width];
        if length == 0 {
            return row[0];
        }
        let mut i_length = self.lengths.len().min(row.len()) - 1;
        while i_length > 0 && self.lengths[i_length] >= length {
            i_length -= 1;
        }
        row[i_length]
    }

    fn larger_width_space(&self) -> Option<Dbu> {
        self.table.get(1).map(|row| row[0])
    }
}

pub struct MetalLayer {
    pub name: String,
    pub idx: usize,
    /// Axis along which track coordinates are spaced; wires run along the other axis.
    pub direction: Dim,
    pub width: Dbu,
    pub pitch: Dbu,
    pub min_area: Dbu,
    pub tracks: Vec<Track>,
    pub cross_points: Vec<CrossPoint>,

    pub spacing: SpacingTable,
    pub eol_rules: Vec<EolRule>,
    pub default_space: Dbu,
    pub para_space_larger_width: Dbu,
    pub max_eol_space: Dbu,
    pub max_eol_width: Dbu,
    pub max_eol_within: Dbu,

    pub min_len_raw: Dbu,
    pub min_len_one_via: Dbu,
    pub min_len_two_via: Dbu,
    pub via_ovlp_dist: Dbu,
    pub min_area_margin: Dbu,
    pub safe_margin: Dbu,

    acc_cp_dist_cost: Vec<Dbu>,
    pub wire_range: Vec<Interval<i32>>,
}

impl MetalLayer {
    pub fn from_description(idx: usize, desc: &MetalLayerDescription) -> Result<Self, TechError> {
        if desc.width <= 0 {
            return Err(TechError::NonPositive(desc.name.clone(), "width"));
        }
        if desc.pitch <= 0 {
            return Err(TechError::NonPositive(desc.name.clone(), "pitch"));
        }
        if desc.num_tracks == 0 {
            return Err(TechError::NoTracks(desc.name.clone()));
        }

        let spacing = match &desc.spacing {
            Some(t) if !t.table.is_empty() && t.table.iter().all(|row| !row.is_empty()) => {
                let mut widths = t.widths.clone();
                widths.resize(t.table.len(), widths.last().copied().unwrap_or(0));
                let mut lengths = t.lengths.clone();
                if lengths.is_empty() {
                    lengths.push(0);
                }
                SpacingTable {
                    widths,
                    lengths,
                    table: t.table.clone(),
                }
            }
            _ => {
                let space = (desc.pitch - desc.width).max(1);
                log::warn!(
                    "Layer {}: no parallel run spacing table, assuming spacing {}",
                    desc.name,
                    space
                );
                SpacingTable::single(space)
            }
        };
        if desc.eol.is_empty() {
            log::warn!("Layer {}: no end-of-line spacing rules", desc.name);
        }
        let min_area = desc.min_area.unwrap_or_else(|| {
            log::warn!("Layer {}: no minimum area rule, assuming 0", desc.name);
            0
        });

        let default_space = spacing.space(desc.width, 0);
        let para_space_larger_width = spacing.larger_width_space().unwrap_or(default_space);
        let max_eol_space = desc.eol.iter().map(|r| r.space).max().unwrap_or(0);
        let max_eol_width = desc.eol.iter().map(|r| r.width).max().unwrap_or(0);
        let max_eol_within = desc.eol.iter().map(|r| r.within).max().unwrap_or(0);

        let tracks = (0..desc.num_tracks)
            .map(|i| Track {
                location: desc.track_start + i as Dbu * desc.pitch,
                lower_cp: None,
                upper_cp: None,
            })
            .collect();

        let min_area_margin = {
            let len = min_area / desc.width + desc.width;
            ((len + desc.pitch - 1) / desc.pitch) * desc.pitch * 2
        };

        let layer = Self {
            name: desc.name.clone(),
            idx,
            direction: desc.direction.track_dim(),
            width: desc.width,
            pitch: desc.pitch,
            min_area,
            tracks,
            cross_points: Vec::new(),
            spacing,
            eol_rules: desc.eol.clone(),
            default_space,
            para_space_larger_width,
            max_eol_space,
            max_eol_width,
            max_eol_within,
            min_len_raw: min_area / desc.width - desc.width,
            min_len_one_via: 0,
            min_len_two_via: 0,
            via_ovlp_dist: 0,
            min_area_margin,
            safe_margin: 0,
            acc_cp_dist_cost: Vec::new(),
            wire_range: Vec::new(),
        };
        layer.check();
        Ok(layer)
    }

    fn check(&self) {
        if self.width + self.default_space > self.pitch {
            log::warn!(
                "Layer {}: width + spacing = {} exceeds pitch {}",
                self.name,
                self.width + self.default_space,
                self.pitch
            );
        }
        if !self.eol_rules.is_empty() && self.width > self.max_eol_width {
            log::warn!(
                "Layer {}: width {} exceeds the widest end-of-line rule {}",
                self.name,
                self.width,
                self.max_eol_width
            );
        }
    }

    #[inline(always)]
    pub fn num_tracks(&self) -> i32 {
        self.tracks.len() as i32
    }

    #[inline(always)]
    pub fn num_cps(&self) -> i32 {
        self.cross_points.len() as i32
    }

    pub fn is_track_range_valid(&self, tracks: &Interval<i32>) -> bool {
        tracks.low >= 0 && tracks.high < self.num_tracks() && tracks.is_valid()
    }

    pub fn is_cp_range_valid(&self, cps: &Interval<i32>) -> bool {
        cps.low >= 0 && cps.high < self.num_cps() && cps.is_valid()
    }

    pub fn is_valid(&self, gp: &GridPoint) -> bool {
        gp.track >= 0 && gp.track < self.num_tracks() && gp.cp >= 0 && gp.cp < self.num_cps()
    }

    pub fn is_valid_box(&self, gb: &GridBoxOnLayer) -> bool {
        self.is_track_range_valid(&gb.tracks) && self.is_cp_range_valid(&gb.cps)
    }

    #[inline(always)]
    pub fn track_loc(&self, track: i32) -> Dbu {
        self.tracks[track as usize].location
    }

    #[inline(always)]
    pub fn cp_loc(&self, cp: i32) -> Dbu {
        self.cross_points[cp as usize].location
    }

    pub fn loc(&self, gp: &GridPoint) -> Point<Dbu> {
        let mut p = Point::default();
        p[self.direction] = self.track_loc(gp.track);
        p[self.direction.other()] = self.cp_loc(gp.cp);
        p
    }

    pub fn box_loc(&self, gb: &GridBoxOnLayer) -> Rect {
        let mut r = Rect::default();
        r[self.direction] = Interval::new(self.track_loc(gb.tracks.low), self.track_loc(gb.tracks.high));
        r[self.direction.other()] = Interval::new(self.cp_loc(gb.cps.low), self.cp_loc(gb.cps.high));
        r
    }

    /// Indices of locations inside `range`; invalid when none.
    fn range_search(locs: impl Fn(usize) -> Dbu, n: usize, range: &Interval<Dbu>, include_bound: bool) -> Interval<i32> {
        let partition = |pred: &dyn Fn(Dbu) -> bool| {
            let (mut lo, mut hi) = (0usize, n);
            while lo < hi {
                let mid = (lo + hi) / 2;
                if pred(locs(mid)) {
                    lo = mid + 1;
                } else {
                    hi = mid;
                }
            }
            lo
        };
        let (low, high) = if include_bound {
            (partition(&|l: Dbu| l < range.low), partition(&|l: Dbu| l <= range.high))
        } else {
            (partition(&|l: Dbu| l <= range.low), partition(&|l: Dbu| l < range.high))
        };
        Interval::new(low as i32, high as i32 - 1)
    }

    pub fn range_search_track(&self, range: &Interval<Dbu>, include_bound: bool) -> Interval<i32> {
        Self::range_search(|i| self.tracks[i].location, self.tracks.len(), range, include_bound)
    }

    pub fn range_search_cp(&self, range: &Interval<Dbu>, include_bound: bool) -> Interval<i32> {
        Self::range_search(|i| self.cross_points[i].location, self.cross_points.len(), range, include_bound)
    }

    pub fn upper_cp_range(&self, tracks: &Interval<i32>) -> Interval<i32> {
        match (self.tracks[tracks.low as usize].upper_cp, self.tracks[tracks.high as usize].upper_cp) {
            (Some(lo), Some(hi)) => Interval::new(lo, hi),
            _ => Interval::empty(),
        }
    }

    pub fn lower_cp_range(&self, tracks: &Interval<i32>) -> Interval<i32> {
        match (self.tracks[tracks.low as usize].lower_cp, self.tracks[tracks.high as usize].lower_cp) {
            (Some(lo), Some(hi)) => Interval::new(lo, hi),
            _ => Interval::empty(),
        }
    }

    pub fn upper(&self, gp: &GridPoint) -> Option<GridPoint> {
        let track = self.cross_points[gp.cp as usize].upper_track?;
        let cp = self.tracks[gp.track as usize].upper_cp?;
        Some(GridPoint::new(gp.layer + 1, track, cp))
    }

    pub fn lower(&self, gp: &GridPoint) -> Option<GridPoint> {
        let track = self.cross_points[gp.cp as usize].lower_track?;
        let cp = self.tracks[gp.track as usize].lower_cp?;
        Some(GridPoint::new(gp.layer - 1, track, cp))
    }

    pub fn para_run_space(&self, width: Dbu, length: Dbu) -> Dbu {
        self.spacing.space(width, length)
    }

    pub fn para_run_space_of(&self, metal: &Rect) -> Dbu {
        self.para_run_space(metal.min_dim(), 0)
    }

    pub fn eol_space(&self, width: Dbu) -> Dbu {
        if width < self.max_eol_width { self.max_eol_space } else { 0 }
    }

    /// Spacing required on the `dim` sides of `metal`.
    pub fn space(&self, metal: &Rect, dim: Dim, aggressive: bool) -> Dbu {
        let mut space = self.eol_space(metal[dim.other()].range());
        if space == 0 {
            space = self.para_run_space_of(metal);
        }
        if aggressive && self.para_space_larger_width > space {
            space = self.para_space_larger_width;
        }
        space
    }

    pub fn is_eol_dominated(&self, metal: &Rect) -> bool {
        metal.width().max(metal.height()) < self.max_eol_width
    }

    /// Largest distance at which two shapes on this layer can still interact.
    pub fn max_interaction(&self) -> Dbu {
        self.para_space_larger_width
            .max(self.default_space)
            .max(self.max_eol_space)
            .max(self.max_eol_within)
    }

    /// Symmetric spacing check between two shapes of different nets.
    pub fn is_spacing_violation(&self, a: &Rect, b: &Rect, consider_eol: bool) -> bool {
        let gap = [a.x.gap(&b.x), a.y.gap(&b.y)];
        if gap[0] == 0 && gap[1] == 0 {
            return true;
        }
        let width = a.min_dim().min(b.min_dim());
        if consider_eol {
            for (d, dim) in Dim::ALL.into_iter().enumerate() {
                let edge = a[dim.other()].range().min(b[dim.other()].range());
                let facing = gap[d];
                let within = gap[1 - d];
                if facing > 0
                    && self
                        .eol_rules
                        .iter()
                        .any(|r| edge < r.width && facing < r.space && within < r.within)
                {
                    return true;
                }
            }
        }
        if gap[0] > 0 && gap[1] > 0 {
            let space = self.para_run_space(width, 0);
            return gap[0] * gap[0] + gap[1] * gap[1] < space * space;
        }
        let (facing, run) = if gap[0] > 0 {
            (gap[0], a.y.intersect(&b.y).range())
        } else {
            (gap[1], a.x.intersect(&b.x).range())
        };
        facing < self.para_run_space(width, run)
    }

    /// Square of wire centred on a grid location.
    pub fn wire_piece(&self, center: Point<Dbu>) -> Rect {
        Rect::from_point(center).expand(self.width / 2)
    }

    pub(super) fn init_acc_cp_dist_cost(&mut self) {
        let n = self.cross_points.len();
        self.acc_cp_dist_cost = vec![0; n + 1];
        for i in 0..n {
            let delta = if i + 1 < n {
                (self.cross_points[i + 1].location - self.cross_points[i].location) / 2
            } else {
                0
            };
            self.acc_cp_dist_cost[i + 1] = self.cross_points[i].location - self.cross_points[0].location + delta;
        }
    }

    /// Wirelength charged for covering a cross-point range, half gaps to neighbours included.
    pub fn cp_range_dist_cost(&self, cps: &Interval<i32>) -> Dbu {
        self.acc_cp_dist_cost[cps.high as usize + 1] - self.acc_cp_dist_cost[cps.low as usize]
    }

    pub fn cp_range_dist(&self, cps: &Interval<i32>) -> Dbu {
        self.cp_loc(cps.high) - self.cp_loc(cps.low)
    }

    pub(super) fn init_wire_range(&mut self) {
        let eol = self.eol_space(self.width);
        let end_space = if eol > 0 { eol } else { self.default_space } + self.width;
        let n = self.num_cps();
        self.wire_range = (0..n)
            .map(|cp| {
                let loc = self.cp_loc(cp);
                let mut i = 0;
                while cp + i >= 0 && loc - self.cp_loc(cp + i) < end_space {
                    i -= 1;
                }
                let mut j = 0;
                while cp + j < n && self.cp_loc(cp + j) - loc < end_space {
                    j += 1;
                }
                Interval::new(i + 1, j - 1)
            })
            .collect();
    }

    pub fn min_len(&self) -> Dbu {
        self.min_len_raw
    }

    /// Minimum length still required given the running length of a same-track wire.
    pub fn min_len_acc(&self, len: Dbu) -> Dbu {
        if len < self.via_ovlp_dist {
            self.min_len_one_via
        } else {
            self.min_len_two_via
        }
    }

    pub fn has_min_len_vio(&self, len: Dbu) -> bool {
        len < self.min_len()
    }

    pub fn has_min_len_vio_acc(&self, len: Dbu) -> bool {
        len < self.min_len_acc(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spacing_table_picks_strictly_smaller_bounds() {
        let t = SpacingTable {
            widths: vec![0, 100, 300],
            lengths: vec![0, 200],
            table: vec![vec![50, 60], vec![70, 80], vec![90, 120]],
        };
        assert_eq!(t.space(50, 0), 50);
        assert_eq!(t.space(100, 0), 50);
        assert_eq!(t.space(101, 0), 70);
        assert_eq!(t.space(101, 200), 70);
        assert_eq!(t.space(101, 201), 80);
        assert_eq!(t.space(400, 1000), 120);
    }
}
