use super::fixed::ViaPoorness;
use super::route_grid::{RouteGrid, ViaSlots};
use dr_common::db::NetId;
use dr_common::geom::{EdgeKind, GridEdge, GridPoint, Interval, TrackSegment, WrongWaySegment};
use dr_common::tech::ViaLut;
use std::sync::Mutex;

/// Via-on-via conflicts of one via, split by where the other via sits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViaViaUsage {
    pub same_layer: usize,
    pub bot_layer: usize,
    pub top_layer: usize,
}

impl ViaViaUsage {
    pub fn total(&self) -> usize {
        self.same_layer + self.bot_layer + self.top_layer
    }
}

impl<'a> RouteGrid<'a> {
    #[inline(always)]
    fn dist_cost(&self, layer: usize, cps: Interval<i32>) -> f64 {
        self.layers.layers[layer].cp_range_dist_cost(&cps) as f64
    }

    /// Full cost of using `edge` for `net`: base length or via unit plus every violation term.
    pub fn edge_cost(&self, edge: &GridEdge, net: NetId) -> f64 {
        match edge.kind() {
            EdgeKind::Via => self.via_cost(&edge.lower(), net),
            EdgeKind::Track => edge.track_segment().map_or(0.0, |ts| self.wire_segment_cost(&ts, net)),
            EdgeKind::WrongWay => edge.wrong_way_segment().map_or(0.0, |ww| {
                let layer = &self.layers.layers[ww.layer];
                let len = layer.track_loc(ww.tracks.high) - layer.track_loc(ww.tracks.low);
                len as f64 + self.wrong_way_vio_cost(&ww, net, true)
            }),
            EdgeKind::Invalid => {
                log::warn!("Cost of invalid edge {:?} -> {:?}", edge.u, edge.v);
                0.0
            }
        }
    }

    pub fn edge_vio_cost(&self, edge: &GridEdge, net: NetId, hist: bool) -> f64 {
        match edge.kind() {
            EdgeKind::Via => self.via_vio_cost(&edge.lower(), net, hist),
            EdgeKind::Track => edge.track_segment().map_or(0.0, |ts| self.wire_vio_cost(&ts, net, hist)),
            EdgeKind::WrongWay => edge
                .wrong_way_segment()
                .map_or(0.0, |ww| self.wrong_way_vio_cost(&ww, net, hist)),
            EdgeKind::Invalid => 0.0,
        }
    }

    pub fn via_cost(&self, via: &GridPoint, net: NetId) -> f64 {
        self.unit.via + self.via_vio_cost(via, net, true)
    }

    pub fn via_vio_cost(&self, via: &GridPoint, net: NetId, hist: bool) -> f64 {
        let usage = self.via_usage_on_vias(via, net).total() + self.via_usage_on_wires(via, net);
        let mut cost = usage as f64 * self.unit.space_discounted;
        if hist {
            cost += self.via_hist(via) * self.unit.space_discounted;
        }
        let penalty = match self.via_poorness(via, net) {
            ViaPoorness::Poor => self.poor_via_coeff,
            ViaPoorness::Nondefault if hist => self.nondefault_via_coeff,
            _ => 0.0,
        };
        cost + penalty * self.unit.space
    }

    pub fn via_hist(&self, via: &GridPoint) -> f64 {
        self.via_hist[via.layer][via.track as usize].get(&via.cp).copied().unwrap_or(0.0)
    }

    /// Conflicts of a default via at `via` with routed vias of other nets.
    pub fn via_usage_on_vias(&self, via: &GridPoint, net: NetId) -> ViaViaUsage {
        let Some(upper) = self.layers.upper(via) else {
            return ViaViaUsage::default();
        };
        let n = self.layers.num_layers();
        let cut = &self.layers.cuts[via.layer];
        let default = cut.default_via();
        let mut usage = ViaViaUsage::default();

        // Same cut layer: table indexed by (lower track offset, upper track offset).
        let lut = cut.default_via_metal();
        let upper_layer = &self.layers.layers[upper.layer];
        let nt = upper_layer.num_tracks();
        let first = upper_layer.tracks[(upper.track - lut.y_size()).max(0) as usize].lower_cp.unwrap_or(0);
        let last = upper_layer.tracks[(upper.track + lut.y_size()).min(nt - 1) as usize]
            .lower_cp
            .unwrap_or(self.layers.layers[via.layer].num_cps() - 1);
        let cps = Interval::new(first.min(last), first.max(last));
        for t in via.track - lut.x_size()..=via.track + lut.x_size() {
            self.scan_vias(&self.vias_up, via.layer, t, cps, |cp, owners| {
                let others = owners.iter().filter(|&&o| o != net).count();
                if others == 0 {
                    return;
                }
                if let Some(other_upper) = self.layers.upper(&GridPoint::new(via.layer, t, cp)) {
                    if lut.get(t - via.track, other_upper.track - upper.track) {
                        usage.same_layer += others;
                    }
                }
            });
        }

        if via.layer > 0 {
            if let Some(lut) = default.via_bot_via.get(via.cp as usize) {
                usage.bot_layer = self.count_diff_layer_vias(&self.vias_down, via, lut, net);
            }
        }
        if via.layer + 2 < n {
            if let Some(lut) = default.via_top_via.get(upper.cp as usize) {
                usage.top_layer = self.count_diff_layer_vias(&self.vias_up, &upper, lut, net);
            }
        }
        usage
    }

    fn count_diff_layer_vias(
        &self,
        map: &[Vec<Mutex<ViaSlots>>],
        gp: &GridPoint,
        lut: &ViaLut,
        net: NetId,
    ) -> usize {
        let mut count = 0;
        let cps = Interval::new(gp.cp - lut.y_size(), gp.cp + lut.y_size());
        for t in gp.track - lut.x_size()..=gp.track + lut.x_size() {
            self.scan_vias(map, gp.layer, t, cps, |cp, owners| {
                if lut.get(t - gp.track, cp - gp.cp) {
                    count += owners.iter().filter(|&&o| o != net).count();
                }
            });
        }
        count
    }

    /// Conflicts of a default via at `via` with routed wires of other nets, bottom
    /// layer first; the top layer is only looked at when the bottom is clean.
    pub fn via_usage_on_wires(&self, via: &GridPoint, net: NetId) -> usize {
        let bot = self.via_usage_on_bot_wires(via, net);
        if bot > 0 { bot } else { self.via_usage_on_top_wires(via, net) }
    }

    pub fn via_usage_on_bot_wires(&self, via: &GridPoint, net: NetId) -> usize {
        self.layers.cuts[via.layer]
            .default_via()
            .via_bot_wire
            .get(via.cp as usize)
            .map_or(0, |lut| self.via_usage_on_wires_around(via, lut, net))
    }

    pub fn via_usage_on_top_wires(&self, via: &GridPoint, net: NetId) -> usize {
        let Some(upper) = self.layers.upper(via) else {
            return 0;
        };
        self.layers.cuts[via.layer]
            .default_via()
            .via_top_wire
            .get(upper.cp as usize)
            .map_or(0, |lut| self.via_usage_on_wires_around(&upper, lut, net))
    }

    /// Number of tracks near `gp` whose conflicting cross-points hold a wire of another net.
    fn via_usage_on_wires_around(&self, gp: &GridPoint, lut: &ViaLut, net: NetId) -> usize {
        let layer = &self.layers.layers[gp.layer];
        let mut count = 0;
        for t in gp.track - lut.x_size()..=gp.track + lut.x_size() {
            if t < 0 || t >= layer.num_tracks() {
                continue;
            }
            let mut span: Option<Interval<i32>> = None;
            for c in gp.cp - lut.y_size()..=gp.cp + lut.y_size() {
                if c >= 0 && c < layer.num_cps() && lut.get(t - gp.track, c - gp.cp) {
                    match span.as_mut() {
                        Some(s) => s.extend(c),
                        None => span = Some(Interval::point(c)),
                    }
                }
            }
            let Some(span) = span else { continue };
            let used = self.with_wires(gp.layer, t, |wires| {
                wires.overlapping(span).any(|(_, nets)| nets.iter().any(|&n| n != net))
            });
            count += usize::from(used);
        }
        count
    }

    pub fn wire_segment_cost(&self, ts: &TrackSegment, net: NetId) -> f64 {
        self.wire_vio_cost(ts, net, true) + self.dist_cost(ts.layer, ts.cps)
    }

    pub fn wire_vio_cost(&self, ts: &TrackSegment, net: NetId, hist: bool) -> f64 {
        let l = ts.layer;
        let mut cost = 0.0;
        self.with_wires(l, ts.track, |wires| {
            for (seg, nets) in wires.overlapping(ts.cps) {
                let usage = nets.len() - usize::from(nets.binary_search(&net).is_ok());
                if usage > 0 {
                    cost += self.unit.short_discounted[l] * usage as f64 * self.dist_cost(l, seg.intersect(&ts.cps));
                }
            }
        });
        cost += self.unit.space_discounted * self.wire_space_vios(ts, net).len() as f64;
        for (seg, owner) in self.poor_wires[l][ts.track as usize].overlapping(ts.cps) {
            if *owner != Some(net) {
                cost += self.unit.short[l] * self.dist_cost(l, seg.intersect(&ts.cps)) * self.poor_wire_coeff;
            }
        }
        cost += self.unit.space_discounted * self.wire_usage_on_vias(ts, net).len() as f64;
        if hist {
            for (seg, h) in self.hist_wires[l][ts.track as usize].overlapping(ts.cps) {
                cost += self.unit.short_discounted[l] * h * self.dist_cost(l, seg.intersect(&ts.cps));
            }
        }
        cost
    }

    pub fn wrong_way_vio_cost(&self, ww: &WrongWaySegment, net: NetId, hist: bool) -> f64 {
        (ww.tracks.low..=ww.tracks.high)
            .map(|t| self.wire_vio_cost(&TrackSegment::new(ww.layer, t, Interval::point(ww.cp)), net, hist))
            .sum()
    }

    /// Cross-points of `ts` too close to the end of a neighbouring wire of another net.
    pub fn wire_space_vios(&self, ts: &TrackSegment, net: NetId) -> Vec<i32> {
        let wr = &self.layers.layers[ts.layer].wire_range;
        let (low, high) = (ts.cps.low, ts.cps.high);
        let mut vios = Vec::new();
        self.with_wires(ts.layer, ts.track, |wires| {
            if wr[low as usize].low < 0 {
                let left = Interval::new(low + wr[low as usize].low, low - 1);
                if let Some((seg, nets)) = wires.overlapping(left).last() {
                    let prev_end = seg.high;
                    if prev_end < low && nets.binary_search(&net).is_err() {
                        let reach = (prev_end + wr[prev_end as usize].high).min(high);
                        vios.extend(low..=reach);
                    }
                }
            }
            if wr[high as usize].high > 0 {
                let right = Interval::new(high + 1, high + wr[high as usize].high);
                if let Some((seg, nets)) = wires.overlapping(right).next() {
                    let next_end = seg.low;
                    if next_end > high && nets.binary_search(&net).is_err() {
                        let reach = (next_end + wr[next_end as usize].low).max(low);
                        vios.extend(reach..=high);
                    }
                }
            }
        });
        vios
    }

    /// Cross-points of `ts` within end spacing of any wire end of another net.
    fn short_wire_space_vios(&self, ts: &TrackSegment, net: NetId) -> Vec<i32> {
        let wr = &self.layers.layers[ts.layer].wire_range;
        let (low, high) = (ts.cps.low, ts.cps.high);
        let window = Interval::new(low + wr[low as usize].low, high + wr[high as usize].high);
        let mut vios = Vec::new();
        self.with_wires(ts.layer, ts.track, |wires| {
            for (seg, nets) in wires.overlapping(window) {
                if nets.binary_search(&net).is_ok() {
                    continue;
                }
                let before = Interval::new(seg.low + wr[seg.low as usize].low, seg.low - 1);
                let after = Interval::new(seg.high + 1, seg.high + wr[seg.high as usize].high);
                for side in [before, after] {
                    let clipped = side.intersect(&ts.cps);
                    if clipped.is_valid() {
                        vios.extend(clipped.low..=clipped.high);
                    }
                }
            }
        });
        vios
    }

    /// Cross-points of `ts` conflicting with routed vias of other nets, clamped to `ts`.
    pub fn wire_usage_on_vias(&self, ts: &TrackSegment, net: NetId) -> Vec<i32> {
        let n = self.layers.num_layers();
        let l = ts.layer;
        let mut cps = Vec::new();
        // Vias whose lower point sits on this layer.
        if l + 1 < n {
            let cut = &self.layers.cuts[l];
            self.collect_wire_via_cps(ts, net, &self.vias_up, cut.bot_wire_window, |cp| {
                cut.default_via().via_bot_wire.get(cp as usize)
            }, &mut cps);
        }
        // Vias whose upper point sits on this layer.
        if l > 0 {
            let cut = &self.layers.cuts[l - 1];
            self.collect_wire_via_cps(ts, net, &self.vias_down, cut.top_wire_window, |cp| {
                cut.default_via().via_top_wire.get(cp as usize)
            }, &mut cps);
        }
        cps
    }

    fn collect_wire_via_cps<'l>(
        &self,
        ts: &TrackSegment,
        net: NetId,
        map: &[Vec<Mutex<ViaSlots>>],
        (x, y): (i32, i32),
        lut_at: impl Fn(i32) -> Option<&'l ViaLut>,
        out: &mut Vec<i32>,
    ) {
        let window = Interval::new(ts.cps.low - y, ts.cps.high + y);
        for t in ts.track - x..=ts.track + x {
            let off_x = ts.track - t;
            self.scan_vias(map, ts.layer, t, window, |via_cp, owners| {
                if owners.iter().all(|&o| o == net) {
                    return;
                }
                let Some(lut) = lut_at(via_cp) else { return };
                if off_x.abs() > lut.x_size() {
                    return;
                }
                let lo = ts.cps.low.max(via_cp - lut.y_size());
                let hi = ts.cps.high.min(via_cp + lut.y_size());
                out.extend((lo..=hi).filter(|&c| lut.get(off_x, c - via_cp)));
            });
        }
    }

    /// Violation cost of every cross-point of `ts` taken as a single-point wire.
    pub fn short_wire_segment_vio_cost(&self, ts: &TrackSegment, net: NetId, hist: bool) -> Vec<f64> {
        let l = ts.layer;
        let base = ts.cps.low;
        let len = (ts.cps.range() + 1) as usize;
        let mut usage = vec![0usize; len];
        let mut poor = vec![false; len];
        self.with_wires(l, ts.track, |wires| {
            for (seg, nets) in wires.overlapping(ts.cps) {
                let others = nets.len() - usize::from(nets.binary_search(&net).is_ok());
                let clipped = seg.intersect(&ts.cps);
                for c in clipped.low..=clipped.high {
                    usage[(c - base) as usize] += others;
                }
            }
        });
        for (seg, owner) in self.poor_wires[l][ts.track as usize].overlapping(ts.cps) {
            if *owner != Some(net) {
                let clipped = seg.intersect(&ts.cps);
                for c in clipped.low..=clipped.high {
                    poor[(c - base) as usize] = true;
                }
            }
        }

        let dist: Vec<f64> = (ts.cps.low..=ts.cps.high).map(|c| self.dist_cost(l, Interval::point(c))).collect();
        let mut costs: Vec<f64> = (0..len)
            .map(|i| {
                let poor_cost = if poor[i] { self.unit.short[l] * self.poor_wire_coeff } else { 0.0 };
                (self.unit.short_discounted[l] * usage[i] as f64 + poor_cost) * dist[i]
            })
            .collect();
        for c in self.short_wire_space_vios(ts, net).into_iter().chain(self.wire_usage_on_vias(ts, net)) {
            if ts.cps.contains(c) {
                costs[(c - base) as usize] += self.unit.space_discounted;
            }
        }
        if hist {
            for (seg, h) in self.hist_wires[l][ts.track as usize].overlapping(ts.cps) {
                let clipped = seg.intersect(&ts.cps);
                for c in clipped.low..=clipped.high {
                    let i = (c - base) as usize;
                    costs[i] += h * self.unit.short_discounted[l] * dist[i];
                }
            }
        }
        costs
    }

    /// Per cross-point cost including the wire length each point stands for.
    pub fn short_wire_segment_cost(&self, ts: &TrackSegment, net: NetId) -> Vec<f64> {
        let mut costs = self.short_wire_segment_vio_cost(ts, net, true);
        for (i, c) in (ts.cps.low..=ts.cps.high).enumerate() {
            costs[i] += self.dist_cost(ts.layer, Interval::point(c));
        }
        costs
    }

    /// Maximal runs of cross-points in `ts` where `net` can place wire without any violation.
    pub fn empty_intervals(&self, ts: &TrackSegment, net: NetId) -> Vec<Interval<i32>> {
        let costs = self.short_wire_segment_vio_cost(ts, net, false);
        let mut runs: Vec<Interval<i32>> = Vec::new();
        for (i, cost) in costs.iter().enumerate() {
            if *cost != 0.0 {
                continue;
            }
            let c = ts.cps.low + i as i32;
            match runs.last_mut() {
                Some(run) if run.high + 1 == c => run.high = c,
                _ => runs.push(Interval::point(c)),
            }
        }
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_common::tech::LayerList;
    use dr_common::util::config::DetailedRoutingConfig;
    use dr_common::util::generator::demo_tech;

    fn stack() -> LayerList {
        LayerList::from_description(&demo_tech(3, 12)).unwrap()
    }

    #[test]
    fn clean_wire_costs_its_length() {
        let layers = stack();
        let grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        let ts = TrackSegment::new(1, 3, Interval::new(2, 6));
        let net = NetId::new(0);
        assert_eq!(grid.wire_vio_cost(&ts, net, true), 0.0);
        let expected = layers.layers[1].cp_range_dist_cost(&ts.cps) as f64;
        assert_eq!(grid.wire_segment_cost(&ts, net), expected);
        assert_eq!(grid.empty_intervals(&ts, net), vec![ts.cps]);
    }

    #[test]
    fn shared_wire_is_a_short_for_others_only() {
        let layers = stack();
        let mut grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        grid.set_unit_vio_cost(1.0);
        let (a, b) = (NetId::new(0), NetId::new(1));
        grid.use_wire(&TrackSegment::new(1, 3, Interval::new(0, 8)), a);
        let probe = TrackSegment::new(1, 3, Interval::new(4, 5));
        assert_eq!(grid.wire_vio_cost(&probe, a, false), 0.0);
        let short = grid.wire_vio_cost(&probe, b, false);
        let expected = grid.unit().short[1] * layers.layers[1].cp_range_dist_cost(&probe.cps) as f64;
        assert!(short >= expected - 1e-9);
        let per_cp = grid.short_wire_segment_vio_cost(&probe, b, false);
        assert!(per_cp.iter().all(|&c| c > 0.0));
        assert!(grid.empty_intervals(&TrackSegment::new(1, 3, Interval::new(0, 11)), b).iter().all(|r| r.low > 8));
    }

    #[test]
    fn wire_end_spacing_is_reported_near_the_gap() {
        let layers = stack();
        let grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        let (a, b) = (NetId::new(0), NetId::new(1));
        grid.use_wire(&TrackSegment::new(1, 3, Interval::new(0, 3)), a);
        // Abutting cross-point 4 sits one pitch from the end of the other wire.
        let probe = TrackSegment::new(1, 3, Interval::new(4, 7));
        let vios = grid.wire_space_vios(&probe, b);
        assert!(vios.contains(&4));
        assert!(grid.wire_space_vios(&probe, a).is_empty());
    }

    #[test]
    fn stacked_vias_of_other_nets_conflict() {
        let layers = stack();
        let mut grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        grid.set_unit_vio_cost(1.0);
        let via = GridPoint::new(0, 5, 5);
        grid.use_via(&via, NetId::new(2));
        let usage = grid.via_usage_on_vias(&via, NetId::new(3));
        assert!(usage.same_layer >= 1);
        assert_eq!(grid.via_usage_on_vias(&via, NetId::new(2)).total(), 0);
        assert!(grid.via_vio_cost(&via, NetId::new(3), false) > 0.0);
        assert_eq!(grid.via_vio_cost(&via, NetId::new(2), false), 0.0);
        let edge = GridEdge::new(via, layers.upper(&via).unwrap());
        assert_eq!(grid.edge_cost(&edge, NetId::new(2)), grid.unit().via);
    }
}
