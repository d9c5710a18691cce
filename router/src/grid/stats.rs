use super::fixed::ViaPoorness;
use super::route_grid::{RouteGrid, lock};
use dr_common::db::NetId;
use dr_common::geom::{Dbu, GridPoint, TrackSegment};
use dr_common::util::config::DetailedRoutingConfig;
use rayon::prelude::*;
use std::fmt;

/// Usage histogram bucket bounds; the last bucket is open ended.
pub const USAGE_BUCKETS: [usize; 6] = [0, 1, 2, 3, 5, 10];

fn bucket_of(usage: usize) -> usize {
    USAGE_BUCKETS.iter().rposition(|&b| usage >= b).unwrap_or(0)
}

fn bucket_label(i: usize) -> String {
    match (USAGE_BUCKETS[i], USAGE_BUCKETS.get(i + 1)) {
        (lo, Some(&hi)) if hi == lo + 1 => format!("{}", lo),
        (lo, Some(&hi)) => format!("{}~{}", lo, hi - 1),
        (lo, None) => format!(">={}", lo),
    }
}

/// Per-layer usage and violation summary of the routed state.
#[derive(Clone, Debug, Default)]
pub struct GridStats {
    pub wire_grids: [usize; USAGE_BUCKETS.len()],
    pub wire_len: [Dbu; USAGE_BUCKETS.len()],
    pub via_slots: [usize; USAGE_BUCKETS.len()],
    /// Routed wire length counted once per net, in pitches of the second metal layer.
    pub wirelength: f64,
    pub num_vias: usize,

    pub short_num: Vec<usize>,
    pub short_len: Vec<Dbu>,
    pub poor_wire_num: Vec<usize>,
    pub poor_wire_len: Vec<Dbu>,
    pub wire_space: Vec<usize>,
    /// Per cut layer from here on.
    pub same_layer_via: Vec<usize>,
    pub top_layer_via: Vec<usize>,
    pub via_bot_wire: Vec<usize>,
    pub via_top_wire: Vec<usize>,
    pub poor_via: Vec<usize>,

    /// Overlapping area of shorts and poor wires, in squared pitches.
    pub short_area: f64,
}

impl GridStats {
    pub fn num_space_vios(&self) -> usize {
        let sum = |v: &Vec<usize>| v.iter().sum::<usize>();
        sum(&self.wire_space)
            + sum(&self.same_layer_via)
            + sum(&self.top_layer_via)
            + sum(&self.via_bot_wire)
            + sum(&self.via_top_wire)
            + sum(&self.poor_via)
    }

    pub fn score(&self, config: &DetailedRoutingConfig) -> f64 {
        self.wirelength * config.weight_wirelength
            + self.num_vias as f64 * config.weight_via
            + self.short_area * config.weight_short
            + self.num_space_vios() as f64 * config.weight_space
    }

    pub fn log(&self) {
        for i in 0..USAGE_BUCKETS.len() {
            if self.wire_grids[i] == 0 && self.via_slots[i] == 0 {
                continue;
            }
            log::info!(
                "  usage {:>5}: {:>8} wire grids ({:>10} DBU), {:>6} via slots",
                bucket_label(i),
                self.wire_grids[i],
                self.wire_len[i],
                self.via_slots[i]
            );
        }
        for l in 0..self.short_num.len() {
            log::info!(
                "  layer {:>2}: short {:>4} ({} DBU), poor wire {:>4} ({} DBU), wire space {:>4}",
                l,
                self.short_num[l],
                self.short_len[l],
                self.poor_wire_num[l],
                self.poor_wire_len[l],
                self.wire_space[l]
            );
        }
        for c in 0..self.same_layer_via.len() {
            log::info!(
                "  cut {:>2}: via-via {:>4}/{:>4}, via-wire {:>4}/{:>4}, poor via {:>4}",
                c,
                self.same_layer_via[c],
                self.top_layer_via[c],
                self.via_bot_wire[c],
                self.via_top_wire[c],
                self.poor_via[c]
            );
        }
    }
}

impl fmt::Display for GridStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wirelength {:.1}, #vias {}, short area {:.3}, #space vios {}",
            self.wirelength,
            self.num_vias,
            self.short_area,
            self.num_space_vios()
        )
    }
}

#[derive(Default)]
struct LayerStats {
    wire_grids: [usize; USAGE_BUCKETS.len()],
    wire_len: [Dbu; USAGE_BUCKETS.len()],
    via_slots: [usize; USAGE_BUCKETS.len()],
    routed_len: Dbu,
    num_vias: usize,
    short_num: usize,
    short_len: Dbu,
    poor_num: usize,
    poor_len: Dbu,
    wire_space: usize,
    same_layer_via: usize,
    top_layer_via: usize,
    via_bot_wire: usize,
    via_top_wire: usize,
    poor_via: usize,
}

impl<'a> RouteGrid<'a> {
    pub fn stats(&self) -> GridStats {
        let layers = self.layers;
        let n = layers.num_layers();
        let per_layer: Vec<LayerStats> = (0..n).into_par_iter().map(|l| self.layer_stats(l)).collect();
        let m2_pitch = layers.layers.get(1).unwrap_or(&layers.layers[0]).pitch as f64;

        let mut stats = GridStats::default();
        let mut routed_len = 0.0;
        for (l, s) in per_layer.iter().enumerate() {
            for i in 0..USAGE_BUCKETS.len() {
                stats.wire_grids[i] += s.wire_grids[i];
                stats.wire_len[i] += s.wire_len[i];
                stats.via_slots[i] += s.via_slots[i];
            }
            routed_len += s.routed_len as f64;
            stats.num_vias += s.num_vias;
            stats.short_num.push(s.short_num);
            stats.short_len.push(s.short_len);
            stats.poor_wire_num.push(s.poor_num);
            stats.poor_wire_len.push(s.poor_len);
            stats.wire_space.push(s.wire_space / 2);
            stats.short_area +=
                (s.short_len + s.poor_len) as f64 * layers.layers[l].width as f64 / m2_pitch / m2_pitch;
            if l + 1 < n {
                stats.same_layer_via.push(s.same_layer_via / 2);
                stats.top_layer_via.push(s.top_layer_via);
                stats.via_bot_wire.push(s.via_bot_wire);
                stats.via_top_wire.push(s.via_top_wire);
                stats.poor_via.push(s.poor_via);
            }
        }
        stats.wirelength = routed_len / m2_pitch;
        stats
    }

    fn layer_stats(&self, l: usize) -> LayerStats {
        let layer = &self.layers.layers[l];
        let mut s = LayerStats::default();
        for t in 0..layer.num_tracks() {
            let segs: Vec<_> = lock(&self.wires[l][t as usize])
                .iter()
                .map(|(seg, nets)| (seg, nets.clone()))
                .collect();
            for (seg, nets) in segs {
                let usage = nets.len();
                let dist = layer.cp_range_dist_cost(&seg);
                let b = bucket_of(usage);
                s.wire_grids[b] += (seg.range() + 1) as usize;
                s.wire_len[b] += dist;
                s.routed_len += usage as Dbu * dist;
                if usage > 1 {
                    s.short_num += usage - 1;
                    s.short_len += (usage - 1) as Dbu * dist;
                }
                let ts = TrackSegment::new(l, t, seg);
                if let Some(&first) = nets.first() {
                    for (poor, owner) in self.poor_wires[l][t as usize].overlapping(seg) {
                        if *owner != Some(first) {
                            s.poor_num += 1;
                            s.poor_len += layer.cp_range_dist_cost(&poor.intersect(&seg));
                        }
                    }
                }
                for &net in &nets {
                    s.wire_space += self.wire_space_vios(&ts, net).len();
                }
            }

            if l + 1 >= self.layers.num_layers() {
                continue;
            }
            let slots: Vec<(i32, Vec<NetId>)> = lock(&self.vias_up[l][t as usize])
                .iter()
                .map(|(&cp, owners)| (cp, owners.clone()))
                .collect();
            for (cp, owners) in slots {
                s.via_slots[bucket_of(owners.len())] += 1;
                s.num_vias += owners.len();
                let via = GridPoint::new(l, t, cp);
                for &net in &owners {
                    let usage = self.via_usage_on_vias(&via, net);
                    s.same_layer_via += usage.same_layer;
                    s.top_layer_via += usage.top_layer;
                    s.via_bot_wire += self.via_usage_on_bot_wires(&via, net);
                    s.via_top_wire += self.via_usage_on_top_wires(&via, net);
                    s.poor_via += usize::from(self.via_poorness(&via, net) == ViaPoorness::Poor);
                }
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_common::geom::Interval;
    use dr_common::tech::LayerList;
    use dr_common::util::generator::demo_tech;

    #[test]
    fn buckets() {
        assert_eq!(bucket_of(0), 0);
        assert_eq!(bucket_of(1), 1);
        assert_eq!(bucket_of(4), 3);
        assert_eq!(bucket_of(40), 5);
        assert_eq!(bucket_label(3), "3~4");
        assert_eq!(bucket_label(5), ">=10");
    }

    #[test]
    fn clean_route_scores_length_and_vias() {
        let layers = LayerList::from_description(&demo_tech(3, 10)).unwrap();
        let config = DetailedRoutingConfig::default();
        let grid = RouteGrid::new(&layers, &config);
        let net = NetId::new(0);
        grid.use_wire(&TrackSegment::new(1, 2, Interval::new(0, 4)), net);
        grid.use_via(&GridPoint::new(1, 2, 4), net);

        let stats = grid.stats();
        assert_eq!(stats.num_vias, 1);
        assert_eq!(stats.short_num.iter().sum::<usize>(), 0);
        assert_eq!(stats.num_space_vios(), 0);
        assert_eq!(stats.short_area, 0.0);
        let wl = layers.layers[1].cp_range_dist_cost(&Interval::new(0, 4)) as f64 / 200.0;
        assert!((stats.wirelength - wl).abs() < 1e-9);
        let expected = wl * config.weight_wirelength + config.weight_via;
        assert!((stats.score(&config) - expected).abs() < 1e-9);
    }

    #[test]
    fn shorts_add_area() {
        let layers = LayerList::from_description(&demo_tech(3, 10)).unwrap();
        let grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        let ts = TrackSegment::new(0, 1, Interval::new(3, 6));
        grid.use_wire(&ts, NetId::new(0));
        grid.use_wire(&ts, NetId::new(1));
        let stats = grid.stats();
        assert_eq!(stats.short_num[0], 1);
        assert!(stats.short_area > 0.0);
    }
}
