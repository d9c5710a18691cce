use super::IterSetting;
use super::graph::{Dir, GridGraph};
use super::local_net::LocalNet;
use crate::grid::RoutingGrid;
use dr_common::geom::{BoxOnLayer, Dbu, GridBoxOnLayer, GridEdge, GridPoint, Interval, Rect, TrackSegment};
use dr_common::tech::LayerList;
use dr_common::util::config::DetailedRoutingConfig;

/// Evenly spread cross-points of `cps` where wrong-way jogs are allowed.
pub fn wrong_way_cps(cps: Interval<i32>, density: f64) -> Vec<i32> {
    if !cps.is_valid() {
        return Vec::new();
    }
    let span = cps.range() + 1;
    let n = ((span as f64) * density) as i32;
    match n {
        0 => Vec::new(),
        1 => vec![cps.low + cps.range() / 2],
        _ => {
            let dist = (span - n) / (n - 1);
            (0..n).map(|i| cps.low + i * (1 + dist)).filter(|&c| c <= cps.high).collect()
        }
    }
}

/// Maps the grid points of the sliced guides onto a dense vertex range.
struct VertexIndex<'l> {
    guides: &'l [GridBoxOnLayer],
    bias: Vec<usize>,
}

impl<'l> VertexIndex<'l> {
    fn new(guides: &'l [GridBoxOnLayer]) -> (Self, Vec<GridPoint>) {
        let mut bias = Vec::with_capacity(guides.len());
        let mut points = Vec::new();
        for g in guides {
            bias.push(points.len());
            for t in g.tracks.low..=g.tracks.high {
                for c in g.cps.low..=g.cps.high {
                    points.push(GridPoint::new(g.layer, t, c));
                }
            }
        }
        (Self { guides, bias }, points)
    }

    #[inline(always)]
    fn vertex(&self, g: usize, track: i32, cp: i32) -> usize {
        let b = &self.guides[g];
        self.bias[g] + ((track - b.tracks.low) * (b.cps.range() + 1) + (cp - b.cps.low)) as usize
    }
}

/// Distance from a grid point to the shapes of `pin`. Points on a neighbouring
/// layer pay one pitch for the via down or up.
pub(super) fn pin_point_dist(layers: &LayerList, local: &LocalNet, gp: &GridPoint, pin: usize) -> Dbu {
    let loc = layers.loc(gp);
    local.pins[pin]
        .iter()
        .filter_map(|shape| {
            let d = shape.rect.dist_to_point(loc);
            if shape.layer == gp.layer {
                Some(d)
            } else if shape.layer.abs_diff(gp.layer) == 1 {
                Some(d + layers.layers[gp.layer].pitch)
            } else {
                None
            }
        })
        .min()
        .unwrap_or(Dbu::MAX / 10)
}

pub(super) fn build<G: RoutingGrid>(
    local: &LocalNet,
    grid: &G,
    config: &DetailedRoutingConfig,
    setting: &IterSetting,
) -> GridGraph {
    let layers = grid.layers();
    let (index, points) = VertexIndex::new(&local.grid_guides);
    let mut graph = GridGraph::with_vertices(points, local.num_pins());

    add_pin_vertices(&mut graph, &index, local, layers);
    add_via_edges(&mut graph, &index, local, grid);
    add_wrong_way_edges(&mut graph, &index, local, grid, config, setting);
    for g in 0..local.grid_guides.len() {
        connect_guide(&mut graph, &index, local, grid, g);
    }
    mark_min_area_fixable(&mut graph, &index, local, grid);
    set_tap_costs(&mut graph, local, grid, config);

    log::trace!(
        "Net {}: {} vertices, {} edges",
        local.name,
        graph.num_vertices(),
        graph.num_edges
    );
    graph
}

fn add_pin_vertices(graph: &mut GridGraph, index: &VertexIndex, local: &LocalNet, layers: &LayerList) {
    let claim = |graph: &mut GridGraph, v: usize, pin: usize, fake: bool| match graph.vertex_pin[v] {
        None => {
            graph.vertex_pin[v] = Some(pin);
            graph.fake[v] = fake;
        }
        Some(p) if p == pin => graph.fake[v] &= fake,
        Some(p) => {
            let gp = graph.points[v];
            if pin_point_dist(layers, local, &gp, pin) < pin_point_dist(layers, local, &gp, p) {
                graph.vertex_pin[v] = Some(pin);
                graph.fake[v] = fake;
            }
        }
    };

    for (pin, access) in local.pin_access.iter().enumerate() {
        for ab in access {
            let projected = [layers.lower_box(ab), layers.upper_box(ab)];
            for (g, guide) in local.grid_guides.iter().enumerate() {
                let (target, fake) = if guide.layer == ab.layer {
                    (Some(*ab), false)
                } else if let Some(pb) = projected.iter().flatten().find(|pb| pb.layer == guide.layer) {
                    (Some(*pb), true)
                } else {
                    (None, false)
                };
                let Some(target) = target else { continue };
                let tracks = target.tracks.intersect(&guide.tracks);
                let cps = target.cps.intersect(&guide.cps);
                if !tracks.is_valid() || !cps.is_valid() {
                    continue;
                }
                for t in tracks.low..=tracks.high {
                    for c in cps.low..=cps.high {
                        claim(graph, index.vertex(g, t, c), pin, fake);
                    }
                }
            }
        }
    }

    for v in 0..graph.num_vertices() {
        if let Some(p) = graph.vertex_pin[v] {
            graph.pin_vertices[p].push(v);
        }
    }
}

fn add_via_edges<G: RoutingGrid>(graph: &mut GridGraph, index: &VertexIndex, local: &LocalNet, grid: &G) {
    let layers = grid.layers();
    for (g1, conns) in local.conn.guide_conn.iter().enumerate() {
        for &g2 in conns {
            let (lo, hi) = (&local.grid_guides[g1], &local.grid_guides[g2]);
            if lo.layer + 1 != hi.layer {
                continue;
            }
            let Some(vb) = layers.grid_via_box_between(lo, hi) else { continue };
            let (lower, upper) = (&layers.layers[lo.layer], &layers.layers[hi.layer]);
            for lt in vb.lower.tracks.low..=vb.lower.tracks.high {
                for ut in vb.upper.tracks.low..=vb.upper.tracks.high {
                    let (Some(lcp), Some(ucp)) = (upper.tracks[ut as usize].lower_cp, lower.tracks[lt as usize].upper_cp)
                    else {
                        continue;
                    };
                    let lp = GridPoint::new(lo.layer, lt, lcp);
                    let up = GridPoint::new(hi.layer, ut, ucp);
                    if !lo.contains(&lp) || !hi.contains(&up) {
                        continue;
                    }
                    let w = grid.via_cost(&lp, local.id) * (1.0 + local.via_penalty(g1, &lp, g2, &up));
                    graph.add_edge(index.vertex(g2, ut, ucp), index.vertex(g1, lt, lcp), Dir::Down, w);
                }
            }
        }
    }
}

fn add_wrong_way_edges<G: RoutingGrid>(
    graph: &mut GridGraph,
    index: &VertexIndex,
    local: &LocalNet,
    grid: &G,
    config: &DetailedRoutingConfig,
    setting: &IterSetting,
) {
    let layers = grid.layers();
    let jog = |graph: &mut GridGraph, u: usize, v: usize| {
        let edge = GridEdge::new(graph.points[u], graph.points[v]);
        let pitch = layers.layers[edge.u.layer].pitch as f64;
        let w = config.wrong_way_penalty_coeff * pitch + grid.edge_vio_cost(&edge, local.id, true);
        graph.add_edge(u, v, Dir::Right, w);
    };

    for (g, guide) in local.grid_guides.iter().enumerate() {
        if guide.tracks.range() == 0 {
            continue;
        }
        for c in wrong_way_cps(guide.cps, setting.wrong_way_density) {
            for t in guide.tracks.low..guide.tracks.high {
                jog(graph, index.vertex(g, t, c), index.vertex(g, t + 1, c));
            }
        }
        // Pins may need a short jog onto a free track.
        for t0 in guide.tracks.low..=guide.tracks.high {
            for c in guide.cps.low..=guide.cps.high {
                if graph.vertex_pin[index.vertex(g, t0, c)].is_none() {
                    continue;
                }
                let reach = Interval::new(t0 - 2, t0 + 2).intersect(&guide.tracks);
                for t in reach.low..reach.high {
                    jog(graph, index.vertex(g, t, c), index.vertex(g, t + 1, c));
                }
            }
        }
    }

    for (g1, adj) in local.conn.guide_adj.iter().enumerate() {
        for &g2 in adj {
            let (a, b) = (&local.grid_guides[g1], &local.grid_guides[g2]);
            if a.tracks.high + 1 != b.tracks.low {
                continue;
            }
            for c in wrong_way_cps(a.cps.intersect(&b.cps), setting.wrong_way_density) {
                jog(graph, index.vertex(g1, a.tracks.high, c), index.vertex(g2, b.tracks.low, c));
            }
        }
    }
}

/// Vertex costs for every point of the guide and along-track edges. Points without
/// any other kind of edge are bypassed by a single edge carrying their wire cost.
fn connect_guide<G: RoutingGrid>(graph: &mut GridGraph, index: &VertexIndex, local: &LocalNet, grid: &G, g: usize) {
    let layers = grid.layers();
    let guide = local.grid_guides[g];
    for t in guide.tracks.low..=guide.tracks.high {
        let ts = TrackSegment::new(guide.layer, t, guide.cps);
        let costs = grid.short_wire_segment_cost(&ts, local.id);
        for (i, c) in (guide.cps.low..=guide.cps.high).enumerate() {
            let v = index.vertex(g, t, c);
            graph.vertex_cost[v] = costs[i] * (1.0 + local.cp_penalty(g, t, c));
        }
        if guide.cps.range() == 0 {
            continue;
        }

        let keys: Vec<i32> = (guide.cps.low..=guide.cps.high)
            .filter(|&c| {
                let v = index.vertex(g, t, c);
                c == guide.cps.low
                    || c == guide.cps.high
                    || graph.vertex_pin[v].is_some()
                    || [Dir::Down, Dir::Up, Dir::Left, Dir::Right].iter().any(|&d| graph.has_edge(v, d))
            })
            .collect();
        for pair in keys.windows(2) {
            let (b, e) = (pair[0], pair[1]);
            let w = if e == b + 1 {
                0.0
            } else {
                let inner = TrackSegment::new(guide.layer, t, Interval::new(b + 1, e - 1));
                grid.wire_segment_cost(&inner, local.id) * (1.0 + local.wire_segment_penalty(layers, g, t, b + 1, e - 1))
            };
            graph.add_edge(index.vertex(g, t, b), index.vertex(g, t, e), Dir::Forward, w);
        }
    }
}

/// A vertex is fixable when a violation free run long enough for minimum area
/// passes through it.
fn mark_min_area_fixable<G: RoutingGrid>(graph: &mut GridGraph, index: &VertexIndex, local: &LocalNet, grid: &G) {
    let layers = grid.layers();
    for (g, guide) in local.grid_guides.iter().enumerate() {
        let layer = &layers.layers[guide.layer];
        let min_len = layer.min_len();
        let mut window = guide.cps;
        while window.low > 0 && layer.cp_range_dist(&Interval::new(window.low, guide.cps.low)) < min_len {
            window.low -= 1;
        }
        while window.high + 1 < layer.num_cps() && layer.cp_range_dist(&Interval::new(guide.cps.high, window.high)) < min_len {
            window.high += 1;
        }
        for t in guide.tracks.low..=guide.tracks.high {
            for run in grid.empty_intervals(&TrackSegment::new(guide.layer, t, window), local.id) {
                if layer.cp_range_dist(&run) < min_len {
                    continue;
                }
                let inside = run.intersect(&guide.cps);
                if !inside.is_valid() {
                    continue;
                }
                for c in inside.low..=inside.high {
                    graph.min_area_fixable[index.vertex(g, t, c)] = true;
                }
            }
        }
    }
}

fn set_tap_costs<G: RoutingGrid>(graph: &mut GridGraph, local: &LocalNet, grid: &G, config: &DetailedRoutingConfig) {
    let layers = grid.layers();
    for v in 0..graph.num_vertices() {
        let Some(pin) = graph.vertex_pin[v] else { continue };
        let gp = graph.points[v];
        let dist = pin_point_dist(layers, local, &gp, pin);
        let mut tap = dist as f64 * (config.wrong_way_penalty_coeff + 1.0);
        if dist > 0 {
            if let Some(link) = tap_link(layers, local, &gp, pin) {
                if grid.fixed_metal_vio(&link, local.id) > 0 {
                    tap += grid.unit().space;
                }
            }
        }
        graph.tap_cost[v] = tap;
    }
}

/// Wire from an off-shape access point to the nearest same-layer shape of the pin.
fn tap_link(layers: &LayerList, local: &LocalNet, gp: &GridPoint, pin: usize) -> Option<BoxOnLayer> {
    let loc = layers.loc(gp);
    let shape = local.pins[pin]
        .iter()
        .filter(|s| s.layer == gp.layer)
        .min_by_key(|s| s.rect.dist_to_point(loc))?;
    let near_x = loc.x.clamp(shape.rect.x.low, shape.rect.x.high);
    let near_y = loc.y.clamp(shape.rect.y.low, shape.rect.y.high);
    let link = Rect::new(loc.x.min(near_x), loc.y.min(near_y), loc.x.max(near_x), loc.y.max(near_y));
    Some(BoxOnLayer::new(gp.layer, link.expand(layers.layers[gp.layer].width / 2)))
}
