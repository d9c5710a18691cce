use super::graph::{Dir, GridGraph};
use crate::grid::RoutingGrid;
use crate::status::RouteStatus;
use dr_common::db::{GridTopo, NetId};
use dr_common::geom::{Dbu, Interval};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One partial path. Labels live in an arena and point back to their predecessor.
#[derive(Clone, Copy, Debug)]
struct Label {
    cost: f64,
    /// Same-track wire length accumulated since the last layer switch.
    len: Dbu,
    /// Cost plus the least minimum-area penalty this path may still pay.
    cost_ub: f64,
    vertex: usize,
    prev: Option<usize>,
    /// Ends the path on a pin, paying its tap cost.
    terminal: bool,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    cost: f64,
    cost_ub: f64,
    label: usize,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the max-heap pops the cheapest label first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.cost_ub.total_cmp(&self.cost_ub))
            .then_with(|| other.label.cmp(&self.label))
    }
}

struct Search<'g, G: RoutingGrid> {
    graph: &'g GridGraph,
    grid: &'g G,
    labels: Vec<Label>,
    heap: BinaryHeap<Entry>,
    /// Best upper bound seen per vertex.
    ub: Vec<f64>,
    /// Cheapest terminal label pushed per vertex.
    term_best: Vec<f64>,
    connected: Vec<bool>,
    pin_sols: Vec<Option<usize>>,
}

impl<'g, G: RoutingGrid> Search<'g, G> {
    fn new(graph: &'g GridGraph, grid: &'g G) -> Self {
        let n = graph.num_vertices();
        Self {
            graph,
            grid,
            labels: Vec::new(),
            heap: BinaryHeap::new(),
            ub: vec![f64::INFINITY; n],
            term_best: vec![f64::INFINITY; n],
            connected: vec![false; graph.num_pins()],
            pin_sols: vec![None; graph.num_pins()],
        }
    }

    #[inline(always)]
    fn min_len(&self, v: usize) -> Dbu {
        self.grid.layers().layers[self.graph.points[v].layer].min_len()
    }

    fn push_label(&mut self, label: Label) -> usize {
        let idx = self.labels.len();
        self.labels.push(label);
        self.heap.push(Entry {
            cost: label.cost,
            cost_ub: label.cost_ub,
            label: idx,
        });
        idx
    }

    /// Starts paths from every access point of `pin`.
    fn seed_pin(&mut self, pin: usize, skip: Option<usize>) {
        for &v in &self.graph.pin_vertices[pin] {
            if Some(v) == skip {
                continue;
            }
            let cost = self.graph.vertex_cost[v] + self.graph.tap_cost[v];
            if cost >= self.ub[v] {
                continue;
            }
            self.ub[v] = cost;
            let len = if self.graph.fake[v] { 0 } else { self.min_len(v) };
            self.push_label(Label {
                cost,
                len,
                cost_ub: cost,
                vertex: v,
                prev: None,
                terminal: false,
            });
        }
    }

    /// Offers a path ending at `v`; also offers its terminal twin when `v` belongs to
    /// a pin not reached yet.
    fn offer(&mut self, cost: f64, cost_ub: f64, len: Dbu, v: usize, prev: usize) {
        if cost < self.ub[v] {
            self.ub[v] = self.ub[v].min(cost_ub);
            self.push_label(Label {
                cost,
                len,
                cost_ub,
                vertex: v,
                prev: Some(prev),
                terminal: false,
            });
        }
        if let Some(pin) = self.graph.vertex_pin[v] {
            let term = cost + self.graph.tap_cost[v];
            if !self.connected[pin] && term < self.term_best[v] {
                self.term_best[v] = term;
                self.push_label(Label {
                    cost: term,
                    len,
                    cost_ub: term,
                    vertex: v,
                    prev: Some(prev),
                    terminal: true,
                });
            }
        }
    }

    fn relax(&mut self, idx: usize) {
        let label = self.labels[idx];
        let u = label.vertex;
        let from = label.prev.map(|p| self.labels[p].vertex);
        let layers = self.grid.layers();
        let unit_min_area = self.grid.unit().min_area;

        for dir in Dir::ALL {
            let Some(v) = self.graph.neighbour(u, dir) else { continue };
            if Some(v) == from {
                continue;
            }
            let (pu, pv) = (self.graph.points[u], self.graph.points[v]);
            let mut cost = label.cost + self.graph.cost(u, dir) + self.graph.vertex_cost[v];
            let new_len;
            if dir.switches_layer() {
                let layer = &layers.layers[pu.layer];
                if layer.has_min_len_vio_acc(label.len) {
                    let fixable = self.graph.min_area_fixable[u] || self.graph.vertex_pin[u].is_some();
                    cost += if fixable {
                        (layer.min_len() - label.len) as f64
                    } else {
                        unit_min_area
                    };
                }
                new_len = 0;
            } else {
                let layer = &layers.layers[pu.layer];
                let cps = Interval::new(pu.cp.min(pv.cp), pu.cp.max(pv.cp));
                let step = layer.cp_range_dist(&cps) + layer.pitch * (pu.track - pv.track).abs() as Dbu;
                new_len = (label.len + step).min(layer.min_len());
            }

            let layer_v = &layers.layers[pv.layer];
            let potential = if !layer_v.has_min_len_vio_acc(new_len) {
                0.0
            } else if self.graph.min_area_fixable[v] || self.graph.vertex_pin[v].is_some() {
                (layer_v.min_len() - new_len) as f64
            } else {
                unit_min_area
            };
            self.offer(cost, cost + potential, new_len, v, idx);
        }
    }

    /// The tree grown so far reached `pin` through `idx`: its path and the pin's other
    /// access points become free sources.
    fn settle(&mut self, pin: usize, idx: usize) {
        self.connected[pin] = true;
        self.pin_sols[pin] = Some(idx);

        let mut cur = Some(idx);
        while let Some(i) = cur {
            if self.labels[i].cost == 0.0 && i != idx {
                break;
            }
            let v = self.labels[i].vertex;
            let min_len = self.min_len(v);
            let label = &mut self.labels[i];
            label.cost = 0.0;
            label.cost_ub = 0.0;
            label.len = label.len.max(min_len);
            label.terminal = false;
            self.ub[v] = 0.0;
            self.heap.push(Entry {
                cost: 0.0,
                cost_ub: 0.0,
                label: i,
            });
            cur = self.labels[i].prev;
        }

        let reached = self.labels[idx].vertex;
        self.seed_pin(pin, Some(reached));
    }

    fn run(&mut self) -> bool {
        let num_pins = self.graph.num_pins();
        if self.graph.pin_vertices.iter().any(|vs| vs.is_empty()) {
            return false;
        }
        self.connected[0] = true;
        self.seed_pin(0, None);
        let mut remaining = num_pins - 1;
        if remaining == 0 {
            return true;
        }

        while let Some(entry) = self.heap.pop() {
            let label = self.labels[entry.label];
            if entry.cost != label.cost {
                continue;
            }
            if label.terminal {
                let Some(pin) = self.graph.vertex_pin[label.vertex] else { continue };
                if self.connected[pin] {
                    continue;
                }
                self.settle(pin, entry.label);
                remaining -= 1;
                if remaining == 0 {
                    return true;
                }
                continue;
            }
            if self.ub[label.vertex] < label.cost {
                continue;
            }
            self.relax(entry.label);
        }
        false
    }

    /// Rebuilds the routed forest from the pin solutions. Only the reached access point
    /// and the path sources carry pin tags.
    ///
    /// A path that starts from a re-seeded access point of an already connected pin
    /// becomes its own root, tagged with that pin. Each pin then owns one node per
    /// tree it touches, and the trees are joined through the pin shape. `check::run`
    /// holds the forest to that: a pin appears at most once per tree and every tree
    /// touches some pin.
    fn extract(&self) -> GridTopo {
        let mut topo = GridTopo::new();
        let mut node_of: Vec<Option<usize>> = vec![None; self.graph.num_vertices()];

        for (pin, sol) in self.pin_sols.iter().enumerate() {
            let Some(sol) = *sol else { continue };
            let mut walk: Vec<usize> = Vec::new();
            let mut graft = None;
            let mut cur = Some(sol);
            while let Some(i) = cur {
                let v = self.labels[i].vertex;
                if let Some(n) = node_of[v] {
                    graft = Some(n);
                    break;
                }
                if let Some(pos) = walk.iter().position(|&w| w == v) {
                    walk.truncate(pos + 1);
                } else {
                    walk.push(v);
                }
                cur = self.labels[i].prev;
            }

            if walk.is_empty() {
                if let Some(n) = graft {
                    topo.nodes[n].pin.get_or_insert(pin);
                }
                continue;
            }
            let last = walk.len() - 1;
            let mut parent = graft;
            for (k, &v) in walk.iter().enumerate().rev() {
                let tag = if k == 0 {
                    Some(pin)
                } else if k == last && graft.is_none() {
                    self.graph.vertex_pin[v]
                } else {
                    None
                };
                let n = topo.add_node(self.graph.points[v], tag);
                node_of[v] = Some(n);
                match parent {
                    Some(p) => topo.set_parent(n, p),
                    None => topo.roots.push(n),
                }
                parent = Some(n);
            }
        }

        topo.merge_nodes();
        topo
    }
}

/// Connects every pin of the graph with a multi-source search seeded at the first
/// pin. Reads the grid only through cost queries.
pub(super) fn route<G: RoutingGrid>(graph: &GridGraph, grid: &G, net: NetId) -> Result<GridTopo, RouteStatus> {
    let mut search = Search::new(graph, grid);
    if !search.run() {
        log::trace!("Net {:?}: search exhausted after {} labels", net, search.labels.len());
        return Err(RouteStatus::FailDisconnectedGridGraph);
    }
    Ok(search.extract())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::RouteGrid;
    use dr_common::geom::GridPoint;
    use dr_common::tech::LayerList;
    use dr_common::util::config::DetailedRoutingConfig;
    use dr_common::util::generator::demo_tech;

    /// One track of layer 1 with a vertex per cross-point, linked in a chain.
    fn line(cps: i32, pins: &[(usize, i32)]) -> GridGraph {
        let points = (0..cps).map(|c| GridPoint::new(1, 2, c)).collect();
        let num_pins = pins.iter().map(|&(p, _)| p + 1).max().unwrap_or(0);
        let mut g = GridGraph::with_vertices(points, num_pins);
        for c in 0..cps as usize - 1 {
            g.add_edge(c, c + 1, Dir::Forward, 0.0);
        }
        for c in 0..cps as usize {
            g.vertex_cost[c] = 200.0;
        }
        for &(p, c) in pins {
            g.vertex_pin[c as usize] = Some(p);
            g.pin_vertices[p].push(c as usize);
        }
        g
    }

    #[test]
    fn connects_pins_along_a_track() {
        let layers = LayerList::from_description(&demo_tech(3, 10)).unwrap();
        let grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        let graph = line(8, &[(0, 1), (1, 6)]);
        let topo = route(&graph, &grid, NetId::new(0)).unwrap();

        assert_eq!(topo.roots.len(), 1);
        assert_eq!(topo.nodes.len(), 2);
        let edges = topo.edges();
        assert_eq!(edges.len(), 1);
        let mut cps = [edges[0].u.cp, edges[0].v.cp];
        cps.sort();
        assert_eq!(cps, [1, 6]);
        let pins: Vec<usize> = topo.pin_nodes().map(|(p, _)| p).collect();
        assert!(pins.contains(&0) && pins.contains(&1));
    }

    #[test]
    fn three_pins_share_one_trunk() {
        let layers = LayerList::from_description(&demo_tech(3, 10)).unwrap();
        let grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        let graph = line(9, &[(0, 4), (1, 0), (2, 8)]);
        let topo = route(&graph, &grid, NetId::new(0)).unwrap();
        let covered: i32 = topo
            .edges()
            .iter()
            .map(|e| (e.u.cp - e.v.cp).abs())
            .sum();
        assert_eq!(covered, 8);
        assert_eq!(topo.pin_nodes().count(), 3);
    }

    /// A via from layer 1 up to layer 2.
    fn via_hop() -> GridGraph {
        let points = vec![GridPoint::new(1, 2, 3), GridPoint::new(2, 3, 2)];
        let mut g = GridGraph::with_vertices(points, 0);
        g.add_edge(0, 1, Dir::Up, 50.0);
        g.vertex_cost[1] = 7.0;
        g
    }

    fn climb(graph: &GridGraph, grid: &RouteGrid, len: Dbu) -> Label {
        let mut search = Search::new(graph, grid);
        let src = search.push_label(Label {
            cost: 10.0,
            len,
            cost_ub: 10.0,
            vertex: 0,
            prev: None,
            terminal: false,
        });
        search.relax(src);
        *search.labels.iter().find(|l| l.vertex == 1).unwrap()
    }

    #[test]
    fn short_landing_pays_min_area_penalty() {
        let layers = LayerList::from_description(&demo_tech(3, 10)).unwrap();
        let grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        let (lower, upper) = (&layers.layers[1], &layers.layers[2]);
        let unit = grid.unit().min_area;
        assert!(lower.has_min_len_vio_acc(100));
        assert!(upper.has_min_len_vio_acc(0));

        // Fixable wire: the raw length deficit. Plain landing: one unit.
        let mut graph = via_hop();
        graph.min_area_fixable[0] = true;
        let label = climb(&graph, &grid, 100);
        assert_eq!(label.cost, 10.0 + 50.0 + 7.0 + (lower.min_len() - 100) as f64);
        assert_eq!(label.len, 0);
        assert_eq!(label.cost_ub, label.cost + unit);

        graph.min_area_fixable[1] = true;
        let label = climb(&graph, &grid, 100);
        assert_eq!(label.cost_ub, label.cost + upper.min_len() as f64);

        graph.min_area_fixable[0] = false;
        let label = climb(&graph, &grid, 100);
        assert_eq!(label.cost, 10.0 + 50.0 + 7.0 + unit);

        // Long enough: no penalty at all.
        let label = climb(&graph, &grid, lower.min_len());
        assert_eq!(label.cost, 10.0 + 50.0 + 7.0);
    }

    #[test]
    fn unreachable_pin_fails_without_touching_the_grid() {
        let layers = LayerList::from_description(&demo_tech(3, 10)).unwrap();
        let grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        let mut graph = line(6, &[(0, 0), (1, 5)]);
        graph.conn[2][Dir::Forward as usize] = None;
        graph.conn[3][Dir::Backward as usize] = None;
        let err = route(&graph, &grid, NetId::new(0)).unwrap_err();
        assert_eq!(err, RouteStatus::FailDisconnectedGridGraph);
        assert!(grid.via_owners(&GridPoint::new(1, 2, 0)).is_empty());
        assert_eq!(grid.stats().wire_grids.iter().sum::<usize>(), 0);
    }
}
