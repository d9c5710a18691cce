use super::fixed::ViaData;
use super::interval_map::{IntervalMap, NetSet, set_insert, set_remove};
use dashmap::DashMap;
use dr_common::db::NetId;
use dr_common::geom::{Dbu, EdgeKind, GridEdge, GridPoint, Interval, SpatialIndex, TrackSegment};
use dr_common::tech::LayerList;
use dr_common::util::config::DetailedRoutingConfig;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Nets sharing a run of cross-points on one track.
pub type WireUsage = NetSet<NetId>;
/// Via owners keyed by cross-point; a net appears once per via it placed there.
pub type ViaSlots = BTreeMap<i32, Vec<NetId>>;

#[inline(always)]
pub(super) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cost units, all normalised so that one DBU of wire costs 1.
#[derive(Clone, Debug)]
pub struct UnitCosts {
    /// Score per DBU of wire.
    pub wire_raw: f64,
    pub via: f64,
    pub short: Vec<f64>,
    pub space: f64,
    pub min_area: f64,
    pub short_discounted: Vec<f64>,
    pub space_discounted: f64,
}

impl UnitCosts {
    fn new(layers: &LayerList, config: &DetailedRoutingConfig) -> Self {
        let m2_pitch = layers.layers.get(1).unwrap_or(&layers.layers[0]).pitch as f64;
        let wire_raw = config.weight_wirelength / m2_pitch;
        let short: Vec<f64> = layers
            .layers
            .iter()
            .map(|l| config.weight_short * l.width as f64 / m2_pitch / m2_pitch / wire_raw)
            .collect();
        let space = config.weight_space / wire_raw;
        Self {
            wire_raw,
            via: config.weight_via / wire_raw,
            short_discounted: short.clone(),
            short,
            space,
            min_area: config.weight_min_area / wire_raw,
            space_discounted: space,
        }
    }
}

/// Process-wide occupancy and cost store.
///
/// Routed wires and vias sit behind one lock per track so nets of the same batch
/// can commit concurrently. Fixed metals, poor wires and history are only written
/// before routing starts or between iterations (through `&mut self`).
pub struct RouteGrid<'a> {
    pub(super) layers: &'a LayerList,
    pub(super) unit: UnitCosts,
    pub(super) poor_wire_coeff: f64,
    pub(super) poor_via_coeff: f64,
    pub(super) nondefault_via_coeff: f64,
    pub(super) fade_coeff: f64,

    pub(super) fixed_metals: Vec<SpatialIndex<Option<NetId>>>,
    pub(super) fixed_query_margin: Vec<Dbu>,

    pub(super) wires: Vec<Vec<Mutex<IntervalMap<WireUsage>>>>,
    /// Owner of the fixed metal making a segment poor; `None` for obstacles or shared regions.
    pub(super) poor_wires: Vec<Vec<IntervalMap<Option<NetId>>>>,
    pub(super) hist_wires: Vec<Vec<IntervalMap<f64>>>,

    /// Vias of cut layer `l`, indexed by their grid point on metal layer `l`.
    pub(super) vias_up: Vec<Vec<Mutex<ViaSlots>>>,
    /// Vias of cut layer `l - 1`, indexed by their grid point on metal layer `l`.
    pub(super) vias_down: Vec<Vec<Mutex<ViaSlots>>>,
    pub(super) via_hist: Vec<Vec<BTreeMap<i32, f64>>>,
    pub(super) via_data: DashMap<GridPoint, ViaData>,
}

impl<'a> RouteGrid<'a> {
    pub fn new(layers: &'a LayerList, config: &DetailedRoutingConfig) -> Self {
        let tracks = |l: usize| layers.layers[l].num_tracks() as usize;
        let n = layers.num_layers();
        let unit = UnitCosts::new(layers, config);
        log::debug!(
            "Unit costs: wire 1 (score {:.6}/DBU), via {:.1}, space {:.1}, min-area {:.1}",
            unit.wire_raw,
            unit.via,
            unit.space,
            unit.min_area
        );
        Self {
            layers,
            unit,
            poor_wire_coeff: config.poor_wire_penalty_coeff,
            poor_via_coeff: config.poor_via_penalty_coeff,
            nondefault_via_coeff: config.nondefault_via_penalty_coeff,
            fade_coeff: config.rrr_fade_coeff,
            fixed_metals: (0..n).map(|_| SpatialIndex::new()).collect(),
            fixed_query_margin: vec![0; n],
            wires: (0..n).map(|l| (0..tracks(l)).map(|_| Mutex::default()).collect()).collect(),
            poor_wires: (0..n).map(|l| vec![IntervalMap::new(); tracks(l)]).collect(),
            hist_wires: (0..n).map(|l| vec![IntervalMap::new(); tracks(l)]).collect(),
            vias_up: (0..n).map(|l| (0..tracks(l)).map(|_| Mutex::default()).collect()).collect(),
            vias_down: (0..n).map(|l| (0..tracks(l)).map(|_| Mutex::default()).collect()).collect(),
            via_hist: (0..n).map(|l| vec![BTreeMap::new(); tracks(l)]).collect(),
            via_data: DashMap::new(),
        }
    }

    #[inline(always)]
    pub fn layers(&self) -> &'a LayerList {
        self.layers
    }

    pub fn unit(&self) -> &UnitCosts {
        &self.unit
    }

    /// Scales the short and space units for the current rip-up iteration.
    pub fn set_unit_vio_cost(&mut self, discount: f64) {
        log::debug!("Set unit violation cost with discount {:.3}", discount);
        self.unit.short_discounted = self.unit.short.iter().map(|c| c * discount).collect();
        self.unit.space_discounted = self.unit.space * discount;
    }

    pub(super) fn with_wires<R>(&self, layer: usize, track: i32, f: impl FnOnce(&IntervalMap<WireUsage>) -> R) -> R {
        f(&lock(&self.wires[layer][track as usize]))
    }

    pub fn use_wire(&self, ts: &TrackSegment, net: NetId) {
        let mut map = lock(&self.wires[ts.layer][ts.track as usize]);
        map.update(ts.cps, Some(WireUsage::new()), |s| set_insert(s, net), |s| !s.is_empty());
    }

    pub fn remove_wire(&self, ts: &TrackSegment, net: NetId) {
        let mut map = lock(&self.wires[ts.layer][ts.track as usize]);
        map.update(ts.cps, None, |s| set_remove(s, net), |s| !s.is_empty());
    }

    /// Registers a via by its lower grid point.
    pub fn use_via(&self, via: &GridPoint, net: NetId) {
        let Some(upper) = self.layers.upper(via) else {
            log::warn!("Via at {:?} has no upper grid point", via);
            return;
        };
        lock(&self.vias_up[via.layer][via.track as usize]).entry(via.cp).or_default().push(net);
        lock(&self.vias_down[upper.layer][upper.track as usize]).entry(upper.cp).or_default().push(net);
    }

    pub fn remove_via(&self, via: &GridPoint, net: NetId) {
        let Some(upper) = self.layers.upper(via) else {
            return;
        };
        remove_one(&mut lock(&self.vias_up[via.layer][via.track as usize]), via.cp, net);
        remove_one(&mut lock(&self.vias_down[upper.layer][upper.track as usize]), upper.cp, net);
    }

    pub fn use_edge(&self, edge: &GridEdge, net: NetId) {
        match edge.kind() {
            EdgeKind::Via => self.use_via(&edge.lower(), net),
            EdgeKind::Track => {
                if let Some(ts) = edge.track_segment() {
                    self.use_wire(&ts, net);
                }
            }
            EdgeKind::WrongWay => {
                if let Some(ww) = edge.wrong_way_segment() {
                    for track in ww.tracks.low..=ww.tracks.high {
                        self.use_wire(&TrackSegment::new(ww.layer, track, Interval::point(ww.cp)), net);
                    }
                }
            }
            EdgeKind::Invalid => log::warn!("Ignoring invalid edge {:?} -> {:?}", edge.u, edge.v),
        }
    }

    pub fn remove_edge(&self, edge: &GridEdge, net: NetId) {
        match edge.kind() {
            EdgeKind::Via => self.remove_via(&edge.lower(), net),
            EdgeKind::Track => {
                if let Some(ts) = edge.track_segment() {
                    self.remove_wire(&ts, net);
                }
            }
            EdgeKind::WrongWay => {
                if let Some(ww) = edge.wrong_way_segment() {
                    for track in ww.tracks.low..=ww.tracks.high {
                        self.remove_wire(&TrackSegment::new(ww.layer, track, Interval::point(ww.cp)), net);
                    }
                }
            }
            EdgeKind::Invalid => log::warn!("Ignoring invalid edge {:?} -> {:?}", edge.u, edge.v),
        }
    }

    /// Every net holding a via at `via`, one entry per via.
    pub fn via_owners(&self, via: &GridPoint) -> Vec<NetId> {
        lock(&self.vias_up[via.layer][via.track as usize]).get(&via.cp).cloned().unwrap_or_default()
    }

    /// Calls `f(cp, owners)` for via slots of `map[layer][track]` within `cps`.
    pub(super) fn scan_vias(
        &self,
        map: &[Vec<Mutex<ViaSlots>>],
        layer: usize,
        track: i32,
        cps: Interval<i32>,
        mut f: impl FnMut(i32, &[NetId]),
    ) {
        if !cps.is_valid() || track < 0 || track as usize >= map[layer].len() {
            return;
        }
        let slots = lock(&map[layer][track as usize]);
        for (&cp, owners) in slots.range(cps.low..=cps.high) {
            f(cp, owners);
        }
    }
}

fn remove_one(slots: &mut ViaSlots, cp: i32, net: NetId) {
    if let Some(owners) = slots.get_mut(&cp) {
        if let Some(pos) = owners.iter().position(|&n| n == net) {
            owners.remove(pos);
        }
        if owners.is_empty() {
            slots.remove(&cp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_common::util::generator::demo_tech;

    fn stack() -> LayerList {
        LayerList::from_description(&demo_tech(3, 10)).unwrap()
    }

    fn snapshot(grid: &RouteGrid) -> (Vec<IntervalMap<WireUsage>>, Vec<ViaSlots>, Vec<ViaSlots>) {
        let wires = grid.wires.iter().flatten().map(|m| lock(m).clone()).collect();
        let up = grid.vias_up.iter().flatten().map(|m| lock(m).clone()).collect();
        let down = grid.vias_down.iter().flatten().map(|m| lock(m).clone()).collect();
        (wires, up, down)
    }

    #[test]
    fn use_then_remove_restores_occupancy() {
        let layers = stack();
        let grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        let a = NetId::new(0);
        let b = NetId::new(1);
        grid.use_wire(&TrackSegment::new(1, 2, Interval::new(0, 6)), a);
        grid.use_via(&GridPoint::new(1, 2, 3), a);
        let before = snapshot(&grid);

        let edges = [
            GridEdge::new(GridPoint::new(1, 2, 4), GridPoint::new(1, 2, 9)),
            GridEdge::new(GridPoint::new(1, 2, 3), GridPoint::new(1, 4, 3)),
            GridEdge::new(GridPoint::new(1, 2, 3), layers.upper(&GridPoint::new(1, 2, 3)).unwrap()),
        ];
        for e in &edges {
            grid.use_edge(e, b);
        }
        assert_ne!(snapshot(&grid), before);
        for e in &edges {
            grid.remove_edge(e, b);
        }
        assert_eq!(snapshot(&grid), before);
    }

    #[test]
    fn via_is_visible_from_both_layers() {
        let layers = stack();
        let grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        let via = GridPoint::new(0, 3, 4);
        let upper = layers.upper(&via).unwrap();
        grid.use_via(&via, NetId::new(7));
        grid.use_via(&via, NetId::new(7));
        assert_eq!(grid.via_owners(&via), vec![NetId::new(7), NetId::new(7)]);
        let mut seen = Vec::new();
        grid.scan_vias(&grid.vias_down, upper.layer, upper.track, Interval::point(upper.cp), |cp, o| {
            seen.push((cp, o.len()))
        });
        assert_eq!(seen, vec![(upper.cp, 2)]);
        grid.remove_via(&via, NetId::new(7));
        assert_eq!(grid.via_owners(&via).len(), 1);
    }

    #[test]
    fn discount_scales_violation_units() {
        let layers = stack();
        let mut grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        let full = grid.unit().space;
        grid.set_unit_vio_cost(0.25);
        assert!((grid.unit().space_discounted - full * 0.25).abs() < 1e-9);
        assert!((grid.unit().short_discounted[1] - grid.unit().short[1] * 0.25).abs() < 1e-9);
    }
}
