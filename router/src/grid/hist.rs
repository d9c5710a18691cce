use super::route_grid::{RouteGrid, lock};
use dr_common::geom::{GridPoint, Interval, TrackSegment};
use rayon::prelude::*;

/// History increments found on one track: wire cross-point ranges and via slots.
#[derive(Default)]
struct TrackHist {
    wires: Vec<Interval<i32>>,
    vias: Vec<i32>,
}

impl<'a> RouteGrid<'a> {
    /// Charges every resource currently in violation with one more unit of history.
    pub fn add_hist_cost(&mut self) {
        let n = self.layers.num_layers();
        let found: Vec<Vec<TrackHist>> = (0..n)
            .map(|l| {
                (0..self.layers.layers[l].num_tracks())
                    .into_par_iter()
                    .map(|t| self.track_hist(l, t))
                    .collect()
            })
            .collect();

        let (mut num_wires, mut num_vias) = (0, 0);
        for (l, tracks) in found.into_iter().enumerate() {
            for (t, hist) in tracks.into_iter().enumerate() {
                num_wires += hist.wires.len();
                num_vias += hist.vias.len();
                for cps in hist.wires {
                    self.hist_wires[l][t].update(cps, Some(0.0), |h| *h += 1.0, |h| *h != 0.0);
                }
                for cp in hist.vias {
                    *self.via_hist[l][t].entry(cp).or_insert(0.0) += 1.0;
                }
            }
        }
        log::debug!("Add hist cost: {} wire pieces, {} via slots", num_wires, num_vias);
    }

    fn track_hist(&self, l: usize, t: i32) -> TrackHist {
        let mut hist = TrackHist::default();
        let segs: Vec<_> = lock(&self.wires[l][t as usize])
            .iter()
            .map(|(seg, nets)| (seg, nets.clone()))
            .collect();
        for (seg, nets) in segs {
            if nets.len() > 1 {
                hist.wires.push(seg);
            }
            let ts = TrackSegment::new(l, t, seg);
            for net in nets {
                for cp in self.wire_usage_on_vias(&ts, net) {
                    hist.wires.push(Interval::point(cp.clamp(seg.low, seg.high)));
                }
            }
        }

        if l + 1 < self.layers.num_layers() {
            let slots: Vec<_> = lock(&self.vias_up[l][t as usize])
                .iter()
                .map(|(&cp, owners)| (cp, owners.clone()))
                .collect();
            for (cp, owners) in slots {
                let via = GridPoint::new(l, t, cp);
                for net in owners {
                    if self.via_usage_on_vias(&via, net).total() > 0 {
                        hist.vias.push(cp);
                    }
                }
            }
        }
        hist
    }

    /// Decays all history by the fade coefficient.
    pub fn fade_hist_cost(&mut self) {
        let coeff = self.fade_coeff;
        log::debug!("Fade hist cost by {}", coeff);
        self.hist_wires.par_iter_mut().flatten().for_each(|map| {
            map.map_values(|h| *h *= coeff, |h| *h != 0.0);
        });
        self.via_hist.par_iter_mut().flatten().for_each(|slots| {
            slots.retain(|_, h| {
                *h *= coeff;
                *h != 0.0
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_common::db::NetId;
    use dr_common::tech::LayerList;
    use dr_common::util::config::DetailedRoutingConfig;
    use dr_common::util::generator::demo_tech;

    #[test]
    fn shorts_leave_fading_history() {
        let layers = LayerList::from_description(&demo_tech(3, 10)).unwrap();
        let mut grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        grid.set_unit_vio_cost(1.0);
        let ts = TrackSegment::new(1, 4, Interval::new(2, 5));
        grid.use_wire(&ts, NetId::new(0));
        grid.use_wire(&ts, NetId::new(1));
        let via = GridPoint::new(0, 2, 2);
        grid.use_via(&via, NetId::new(0));
        grid.use_via(&via, NetId::new(1));

        grid.add_hist_cost();
        assert_eq!(grid.hist_wires[1][4].get(3), Some(&1.0));
        assert_eq!(grid.via_hist(&via), 2.0);
        let probe = NetId::new(2);
        let before = grid.wire_vio_cost(&ts, probe, true) - grid.wire_vio_cost(&ts, probe, false);
        assert!(before > 0.0);

        grid.fade_hist_cost();
        let coeff = DetailedRoutingConfig::default().rrr_fade_coeff;
        assert!((grid.hist_wires[1][4].get(3).copied().unwrap_or(0.0) - coeff).abs() < 1e-12);
        assert!((grid.via_hist(&via) - 2.0 * coeff).abs() < 1e-12);
    }
}
