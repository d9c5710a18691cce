use super::route_grid::RouteGrid;
use dr_common::db::NetId;
use dr_common::geom::{BoxOnLayer, Dbu, GridPoint, Rect, SpatialIndex};
use dr_common::tech::ViaType;
use rayon::prelude::*;

/// Legality of one via slot against fixed metals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViaData {
    /// Some via type fits without touching any fixed metal.
    Good { nondefault_only: bool },
    /// Every via type hits an obstacle or metals of several nets.
    Poor,
    /// Only usable by the net owning the conflicting pin.
    Fix { net: NetId, nondefault_only: bool },
    /// Usable by any of the listed nets, each through a different via type.
    Flex { nets: Vec<NetId>, nondefault_only: bool },
}

impl ViaData {
    pub fn allows(&self, net: NetId) -> bool {
        match self {
            ViaData::Good { .. } => true,
            ViaData::Poor => false,
            ViaData::Fix { net: owner, .. } => *owner == net,
            ViaData::Flex { nets, .. } => nets.contains(&net),
        }
    }

    /// The default via type cannot be used by any allowed net.
    pub fn is_nondefault_only(&self) -> bool {
        match self {
            ViaData::Good { nondefault_only } => *nondefault_only,
            ViaData::Poor => true,
            ViaData::Fix { nondefault_only, .. } | ViaData::Flex { nondefault_only, .. } => *nondefault_only,
        }
    }

    /// `owners[t]` lists the owners of fixed metals conflicting with via type `t`.
    fn from_conflicts(owners: &[Vec<Option<NetId>>], default: usize) -> Self {
        let single_owner = |list: &[Option<NetId>]| match list.first() {
            Some(&Some(net)) if list.iter().all(|&o| o == Some(net)) => Some(net),
            _ => None,
        };
        let default_usable = owners
            .get(default)
            .is_some_and(|list| list.is_empty() || single_owner(list).is_some());
        let nondefault_only = !default_usable;

        if owners.iter().any(|list| list.is_empty()) {
            return ViaData::Good { nondefault_only };
        }
        let mut nets: Vec<NetId> = owners.iter().filter_map(|list| single_owner(list)).collect();
        nets.sort_unstable();
        nets.dedup();
        match nets.len() {
            0 => ViaData::Poor,
            1 => ViaData::Fix { net: nets[0], nondefault_only },
            _ => ViaData::Flex { nets, nondefault_only },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViaPoorness {
    Good,
    Nondefault,
    Poor,
}

impl<'a> RouteGrid<'a> {
    /// Indexes obstacles and unused pins, then marks the wire segments their forbid
    /// regions cover as poor. Runs once before routing.
    pub fn mark_fixed_metals(&mut self, metals: &[(BoxOnLayer, Option<NetId>)]) {
        let layers = self.layers;
        let n = layers.num_layers();
        let mut by_layer: Vec<Vec<(Rect, Option<NetId>)>> = vec![Vec::new(); n];
        for (metal, owner) in metals {
            match by_layer.get_mut(metal.layer) {
                Some(items) => items.push((metal.rect, *owner)),
                None => log::warn!("Fixed metal on unknown layer {} ignored", metal.layer),
            }
        }

        let indexed: Vec<(SpatialIndex<Option<NetId>>, Dbu)> = by_layer
            .clone()
            .into_par_iter()
            .enumerate()
            .map(|(l, items)| {
                let margin = items
                    .iter()
                    .map(|(r, _)| layers.layers[l].para_run_space_of(r))
                    .max()
                    .unwrap_or(0);
                (SpatialIndex::bulk_load(items), margin)
            })
            .collect();
        let (fixed_metals, margins): (Vec<_>, Vec<_>) = indexed.into_iter().unzip();
        self.fixed_metals = fixed_metals;
        self.fixed_query_margin = margins;

        let fixed = &self.fixed_metals;
        self.poor_wires
            .par_iter_mut()
            .zip(by_layer.par_iter())
            .enumerate()
            .for_each(|(l, (tracks, items))| {
                let layer = &layers.layers[l];
                for (rect, owner) in items {
                    let overlapping = fixed[l].query(rect).count();
                    let aggressive = !(rect.min_dim() == layer.width && overlapping == 1);
                    let region = layers.metal_rect_forbid_region(&BoxOnLayer::new(l, *rect), aggressive);
                    let gb = layers.range_search(&region, aggressive);
                    if !gb.tracks.is_valid() || !gb.cps.is_valid() {
                        continue;
                    }
                    for t in gb.tracks.low..=gb.tracks.high {
                        tracks[t as usize].update(
                            gb.cps,
                            Some(*owner),
                            |v| {
                                if v != owner {
                                    *v = None;
                                }
                            },
                            |_| true,
                        );
                    }
                }
            });
        self.via_data.clear();

        let num_poor: usize = self.poor_wires.iter().flatten().map(|m| m.len()).sum();
        log::info!(
            "Marked {} fixed metals ({} obstacles), {} poor wire segments",
            metals.len(),
            metals.iter().filter(|(_, o)| o.is_none()).count(),
            num_poor
        );
    }

    /// Owner and violation count of every fixed metal interacting with `metal`.
    fn fixed_metal_conflicts(&self, metal: &BoxOnLayer) -> Vec<(Option<NetId>, usize)> {
        let layers = self.layers;
        let layer = &layers.layers[metal.layer];
        let regions = layers.accurate_metal_rect_forbid_regions(metal);
        let query = regions
            .iter()
            .fold(metal.rect.expand(self.fixed_query_margin[metal.layer]), |acc, r| acc.union(r));

        let mut conflicts = Vec::new();
        for (neigh, owner) in self.fixed_metals[metal.layer].query(&query) {
            let mut count = regions.iter().filter(|r| r.overlaps_area(neigh)).count();
            count += layers
                .accurate_metal_rect_forbid_regions(&BoxOnLayer::new(metal.layer, *neigh))
                .iter()
                .filter(|r| r.overlaps_area(&metal.rect))
                .count();
            if !layer.is_eol_dominated(neigh) {
                let space = layer.para_run_space_of(neigh);
                count += usize::from(metal.rect.l2_dist(neigh) < space as f64);
            }
            if count > 0 {
                conflicts.push((*owner, count));
            }
        }
        conflicts
    }

    /// Spacing and short violations of `metal` against fixed metals not owned by `net`.
    pub fn fixed_metal_vio(&self, metal: &BoxOnLayer, net: NetId) -> usize {
        self.fixed_metal_conflicts(metal)
            .into_iter()
            .filter(|(owner, _)| *owner != Some(net))
            .map(|(_, n)| n)
            .sum()
    }

    fn via_type_conflicts(&self, via: &GridPoint, via_type: &ViaType) -> Vec<Option<NetId>> {
        let loc = self.layers.loc(via);
        let bot = BoxOnLayer::new(via.layer, via_type.bot.shift(loc));
        let top = BoxOnLayer::new(via.layer + 1, via_type.top.shift(loc));
        let mut owners: Vec<Option<NetId>> = self
            .fixed_metal_conflicts(&bot)
            .into_iter()
            .chain(self.fixed_metal_conflicts(&top))
            .map(|(owner, _)| owner)
            .collect();
        owners.sort_unstable();
        owners.dedup();
        owners
    }

    /// Fixed-metal legality of the via slot at lower grid point `via`, cached on first use.
    pub fn via_data(&self, via: &GridPoint) -> ViaData {
        if let Some(data) = self.via_data.get(via) {
            return data.clone();
        }
        let cut = &self.layers.cuts[via.layer];
        let owners: Vec<_> = cut.via_types.iter().map(|t| self.via_type_conflicts(via, t)).collect();
        let data = ViaData::from_conflicts(&owners, cut.default_via);
        self.via_data.insert(*via, data.clone());
        data
    }

    pub fn via_poorness(&self, via: &GridPoint, net: NetId) -> ViaPoorness {
        let data = self.via_data(via);
        if !data.allows(net) {
            ViaPoorness::Poor
        } else if data.is_nondefault_only() {
            ViaPoorness::Nondefault
        } else {
            ViaPoorness::Good
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_common::geom::TrackSegment;
    use dr_common::tech::LayerList;
    use dr_common::util::config::DetailedRoutingConfig;
    use dr_common::util::generator::demo_tech;

    fn net(i: usize) -> Option<NetId> {
        Some(NetId::new(i))
    }

    #[test]
    fn via_data_from_owners() {
        assert_eq!(ViaData::from_conflicts(&[vec![]], 0), ViaData::Good { nondefault_only: false });
        assert_eq!(
            ViaData::from_conflicts(&[vec![None], vec![]], 0),
            ViaData::Good { nondefault_only: true }
        );
        assert_eq!(
            ViaData::from_conflicts(&[vec![net(3)]], 0),
            ViaData::Fix { net: NetId::new(3), nondefault_only: false }
        );
        let flex = ViaData::from_conflicts(&[vec![net(1)], vec![net(2)]], 0);
        assert!(flex.allows(NetId::new(1)) && flex.allows(NetId::new(2)));
        assert!(!flex.allows(NetId::new(0)));
        assert_eq!(ViaData::from_conflicts(&[vec![None, net(1)]], 0), ViaData::Poor);
        assert_eq!(ViaData::from_conflicts(&[vec![net(1), net(2)]], 0), ViaData::Poor);
    }

    #[test]
    fn obstacle_marks_poor_wires_and_vias() {
        let layers = LayerList::from_description(&demo_tech(3, 10)).unwrap();
        let mut grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        let pin = NetId::new(4);
        // Track 2 of layer 1 sits at x = 500; the obstacle straddles it.
        let obstacle = BoxOnLayer::new(1, Rect::new(450, 850, 550, 950));
        let pin_box = BoxOnLayer::new(1, Rect::new(1650, 1650, 1750, 1750));
        grid.mark_fixed_metals(&[(obstacle, None), (pin_box, Some(pin))]);

        let under = layers.range_search(&obstacle, true);
        let ts = TrackSegment::new(1, under.tracks.low, under.cps);
        assert!(!grid.poor_wires[1][ts.track as usize].is_empty());
        assert!(grid.fixed_metal_vio(&obstacle, pin) > 0);
        assert_eq!(grid.fixed_metal_vio(&pin_box, pin), 0);
        assert!(grid.fixed_metal_vio(&pin_box, NetId::new(0)) > 0);

        let via = GridPoint::new(1, under.tracks.low, under.cps.low);
        assert_eq!(grid.via_poorness(&via, pin), ViaPoorness::Poor);
        let far = GridPoint::new(1, 0, 0);
        assert_eq!(grid.via_poorness(&far, pin), ViaPoorness::Good);
        assert!(grid.via_data.contains_key(&far));

        let pin_gp = layers.range_search(&pin_box, true);
        let pin_via = GridPoint::new(1, pin_gp.tracks.low, pin_gp.cps.low);
        assert!(grid.via_data(&pin_via).allows(pin));
        assert!(!grid.via_data(&pin_via).allows(NetId::new(0)));
    }
}
