use super::IterSetting;
use super::local_net::LocalNet;
use crate::grid::RoutingGrid;
use crate::status::{MiscEvent, RouteStat, Stage};
use dr_common::db::GridTopo;
use dr_common::geom::{EdgeKind, GridBoxOnLayer, GridEdge, GridPoint, Interval, TrackSegment};
use dr_common::tech::LayerList;
use std::collections::HashSet;

/// Cleans up a freshly searched tree: pins land on real pin metal, detours through a
/// neighbouring layer become jogs, dangling branches go, and short wires are extended
/// for minimum area.
pub(super) fn run<G: RoutingGrid>(local: &mut LocalNet, grid: &G, setting: &IterSetting, stat: &RouteStat) {
    let layers = grid.layers();
    fix_fake_pins(local, layers);
    normalize_pins(&mut local.topo);
    remove_dangling(&mut local.topo);

    let (pin_switches, normal_switches) = remove_track_switches(local, grid);
    if pin_switches > 0 {
        stat.increment(Stage::PostMaze, MiscEvent::RemoveTrackSwitchPin, pin_switches);
    }
    if normal_switches > 0 {
        stat.increment(Stage::PostMaze, MiscEvent::RemoveTrackSwitchNormal, normal_switches);
    }

    remove_dangling(&mut local.topo);
    merge_wrong_way_chains(&mut local.topo);
    local.topo.merge_nodes();

    let (vio, shadowed) = fix_min_area(local, grid, setting);
    local.min_area_vio = vio;
    local.min_area_shadowed_vio = shadowed;
    if vio > 0 {
        stat.increment(Stage::PostMaze, MiscEvent::MinAreaVio, vio);
    }
    if shadowed > 0 {
        stat.increment(Stage::PostMaze, MiscEvent::MinAreaShadowedVio, shadowed);
    }
}

fn in_access(local: &LocalNet, pin: usize, gp: &GridPoint) -> bool {
    local.pin_access.get(pin).is_some_and(|boxes| boxes.iter().any(|b| b.contains(gp)))
}

/// A pin reached through a projected access point gets the via down (or up) onto
/// its own metal.
fn fix_fake_pins(local: &mut LocalNet, layers: &LayerList) {
    let pin_nodes: Vec<(usize, usize)> = local.topo.pin_nodes().collect();
    for (pin, n) in pin_nodes {
        let gp = local.topo.nodes[n].point;
        if in_access(local, pin, &gp) {
            continue;
        }
        let target = [layers.lower(&gp), layers.upper(&gp)]
            .into_iter()
            .flatten()
            .find(|q| in_access(local, pin, q));
        if let Some(q) = target {
            let m = local.topo.add_node(q, Some(pin));
            local.topo.nodes[n].pin = None;
            local.topo.set_parent(m, n);
        }
    }
}

/// Keeps one tag per pin in each tree.
fn normalize_pins(topo: &mut GridTopo) {
    for r in topo.roots.clone() {
        let mut seen = HashSet::new();
        for n in topo.pre_order(r) {
            if let Some(p) = topo.nodes[n].pin {
                if !seen.insert(p) {
                    topo.nodes[n].pin = None;
                }
            }
        }
    }
}

/// Drops branches that end without a pin.
fn remove_dangling(topo: &mut GridTopo) {
    for n in topo.all_post_order() {
        let node = &topo.nodes[n];
        if node.pin.is_some() || node.extension.is_some() || !node.children.is_empty() {
            continue;
        }
        if node.parent.is_some() {
            topo.reset_parent(n);
        } else {
            topo.roots.retain(|&r| r != n);
        }
    }
    topo.compact();
}

#[inline(always)]
fn edge_kind(topo: &GridTopo, a: usize, b: usize) -> EdgeKind {
    GridEdge::new(topo.nodes[a].point, topo.nodes[b].point).kind()
}

/// Finds `n -via- c -track- cc -via- ccc` where `n` and `ccc` sit on one layer. The
/// short wire on the other layer only switches track, so it is replaced by a
/// wrong-way jog, or dropped altogether when `ccc` already lies on the pin of `n`.
fn remove_track_switches<G: RoutingGrid>(local: &mut LocalNet, grid: &G) -> (usize, usize) {
    let layers = grid.layers();
    let (mut pin_count, mut normal_count) = (0, 0);
    loop {
        let mut changed = false;
        for n in local.topo.all_post_order() {
            let Some(found) = track_switch_at(&local.topo, n) else { continue };
            let [c, cc, ccc] = found;
            let topo = &local.topo;
            let (np, cccp) = (topo.nodes[n].point, topo.nodes[ccc].point);

            if let Some(pin) = topo.nodes[n].pin {
                let free = topo.nodes[n].children.is_empty() && topo.nodes[ccc].pin.is_none_or(|p| p == pin);
                if free && in_access(local, pin, &cccp) {
                    local.topo.reset_parent(cc);
                    local.topo.nodes[ccc].pin = Some(pin);
                    pin_count += 1;
                    changed = true;
                    break;
                }
            }

            let cut = &layers.cuts[np.layer.min(topo.nodes[c].point.layer)];
            let lut = cut.default_via_metal();
            let reach = lut.x_size().max(lut.y_size()).max(1);
            if np.cp != cccp.cp || np.track == cccp.track || (np.track - cccp.track).abs() > reach {
                continue;
            }
            let old = [(n, c), (c, cc), (cc, ccc)]
                .iter()
                .map(|&(a, b)| grid.edge_vio_cost(&GridEdge::new(topo.nodes[a].point, topo.nodes[b].point), local.id, false))
                .sum::<f64>();
            let new = grid.edge_vio_cost(&GridEdge::new(np, cccp), local.id, false);
            if new > old {
                continue;
            }
            local.topo.reset_parent(cc);
            local.topo.reset_parent(n);
            local.topo.set_parent(n, ccc);
            normal_count += 1;
            changed = true;
            break;
        }
        if !changed {
            break;
        }
    }
    local.topo.compact();
    (pin_count, normal_count)
}

fn track_switch_at(topo: &GridTopo, n: usize) -> Option<[usize; 3]> {
    let c = topo.nodes[n].parent?;
    let cc = topo.nodes[c].parent?;
    let ccc = topo.nodes[cc].parent?;
    let bridge = |m: usize| {
        let node = &topo.nodes[m];
        node.pin.is_none() && node.extension.is_none() && node.children.len() == 1
    };
    let shape_ok = bridge(c)
        && bridge(cc)
        && edge_kind(topo, n, c) == EdgeKind::Via
        && edge_kind(topo, c, cc) == EdgeKind::Track
        && edge_kind(topo, cc, ccc) == EdgeKind::Via
        && topo.nodes[n].point.layer == topo.nodes[ccc].point.layer;
    shape_ok.then_some([c, cc, ccc])
}

/// Splices out middle nodes of straight wrong-way runs.
fn merge_wrong_way_chains(topo: &mut GridTopo) {
    for n in topo.all_post_order() {
        let node = &topo.nodes[n];
        let Some(parent) = node.parent else { continue };
        if node.pin.is_some() || node.extension.is_some() || node.children.len() != 1 {
            continue;
        }
        let child = node.children[0];
        let (p, here, c) = (topo.nodes[parent].point, node.point, topo.nodes[child].point);
        let straight = p.layer == here.layer
            && c.layer == here.layer
            && p.cp == here.cp
            && c.cp == here.cp
            && (p.track - here.track) * (here.track - c.track) > 0;
        if straight {
            topo.reset_parent(n);
            topo.reset_parent(child);
            topo.set_parent(child, parent);
        }
    }
    topo.compact();
}

/// Same-track wire pieces joined only through vias, as (layer, track, cps, nodes).
fn track_pieces(topo: &GridTopo) -> Vec<(usize, i32, Interval<i32>, Vec<usize>)> {
    let n = topo.nodes.len();
    let mut root: Vec<usize> = (0..n).collect();
    fn find(root: &mut [usize], mut x: usize) -> usize {
        while root[x] != x {
            root[x] = root[root[x]];
            x = root[x];
        }
        x
    }

    let mut jogs = vec![false; n];
    for m in 0..n {
        let Some(p) = topo.nodes[m].parent else { continue };
        match edge_kind(topo, m, p) {
            EdgeKind::Track => {
                let (a, b) = (find(&mut root, m), find(&mut root, p));
                root[a] = b;
            }
            EdgeKind::WrongWay => {
                jogs[m] = true;
                jogs[p] = true;
            }
            _ => {}
        }
    }

    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); n];
    for r in &topo.roots {
        for m in topo.pre_order(*r) {
            let g = find(&mut root, m);
            groups[g].push(m);
        }
    }
    groups
        .into_iter()
        .filter(|g| !g.is_empty() && g.iter().all(|&m| !jogs[m]))
        .map(|g| {
            let first = topo.nodes[g[0]].point;
            let mut cps = Interval::empty();
            for &m in &g {
                cps.extend(topo.nodes[m].point.cp);
            }
            (first.layer, first.track, cps, g)
        })
        .collect()
}

/// Extends short pieces along their track, growing both ends evenly (left first on
/// ties) through violation free cross-points. Outside the last iteration a second
/// pass may run through violations, leaving them to rip-up. Returns the counts of
/// unfixed and pin-covered violations.
fn fix_min_area<G: RoutingGrid>(local: &mut LocalNet, grid: &G, setting: &IterSetting) -> (usize, usize) {
    let layers = grid.layers();
    let (mut vio, mut shadowed) = (0, 0);
    for (l, t, cps, nodes) in track_pieces(&local.topo) {
        let layer = &layers.layers[l];
        let len = layer.cp_range_dist(&cps);
        if !layer.has_min_len_vio_acc(len) {
            continue;
        }

        let metal = layers.box_loc(&GridBoxOnLayer::new(l, Interval::point(t), cps)).rect.expand(layer.width / 2);
        if local.pins.iter().flatten().any(|s| s.layer == l && s.rect.overlaps(&metal)) {
            shadowed += 1;
            continue;
        }

        let need = layer.min_len_acc(len);
        let mut window = cps;
        while window.low > 0 && layer.cp_range_dist(&Interval::new(window.low, cps.low)) < need {
            window.low -= 1;
        }
        while window.high + 1 < layer.num_cps() && layer.cp_range_dist(&Interval::new(cps.high, window.high)) < need {
            window.high += 1;
        }
        let costs = grid.short_wire_segment_vio_cost(&TrackSegment::new(l, t, window), local.id, false);
        let free = |c: i32| costs[(c - window.low) as usize] == 0.0;

        let grow = |ignore_vio: bool| -> Option<Interval<i32>> {
            let mut cur = cps;
            while layer.cp_range_dist(&cur) < need {
                let left = cur.low > window.low && (ignore_vio || free(cur.low - 1));
                let right = cur.high < window.high && (ignore_vio || free(cur.high + 1));
                let left_ext = layer.cp_loc(cps.low) - layer.cp_loc(cur.low);
                let right_ext = layer.cp_loc(cur.high) - layer.cp_loc(cps.high);
                match (left, right) {
                    (true, true) if left_ext <= right_ext => cur.low -= 1,
                    (true, true) => cur.high += 1,
                    (true, false) => cur.low -= 1,
                    (false, true) => cur.high += 1,
                    (false, false) => return None,
                }
            }
            Some(cur)
        };

        let grown = grow(false).or_else(|| if setting.last_iter { None } else { grow(true) });
        let Some(ext) = grown else {
            vio += 1;
            continue;
        };
        let anchor = nodes[0];
        let seg = TrackSegment::new(l, t, ext);
        let node = &mut local.topo.nodes[anchor];
        node.extension = Some(match node.extension {
            Some(prev) => TrackSegment::new(l, t, prev.cps.union(&ext)),
            None => seg,
        });
    }
    (vio, shadowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::RouteGrid;
    use dr_common::db::{Design, DesignDescription, NetDescription, PinDescription};
    use dr_common::geom::{BoxOnLayer, Dbu, Rect};
    use dr_common::util::config::DetailedRoutingConfig;
    use dr_common::util::generator::demo_tech;

    fn pin(layer: usize, x: Dbu, y: Dbu) -> PinDescription {
        PinDescription {
            name: String::new(),
            boxes: vec![BoxOnLayer::new(layer, Rect::new(x - 50, y - 50, x + 50, y + 50))],
        }
    }

    fn local(pins: Vec<PinDescription>) -> (Design, LocalNet) {
        let desc = DesignDescription {
            name: "post".to_string(),
            tech: demo_tech(3, 10),
            nets: vec![NetDescription {
                name: "n0".to_string(),
                pins,
                guides: vec![],
            }],
            obstacles: vec![],
        };
        let design = Design::from_description(&desc).unwrap();
        let local = LocalNet::new(&design.nets[0]);
        (design, local)
    }

    fn chain(topo: &mut GridTopo, points: &[(GridPoint, Option<usize>)]) {
        let mut parent = None;
        for &(gp, pin) in points {
            let n = topo.add_node(gp, pin);
            match parent {
                Some(p) => topo.set_parent(n, p),
                None => topo.roots.push(n),
            }
            parent = Some(n);
        }
    }

    #[test]
    fn dangling_branches_are_dropped() {
        let mut topo = GridTopo::new();
        chain(
            &mut topo,
            &[
                (GridPoint::new(1, 2, 0), Some(0)),
                (GridPoint::new(1, 2, 3), None),
                (GridPoint::new(1, 2, 5), Some(1)),
            ],
        );
        let stub = topo.add_node(GridPoint::new(2, 3, 2), None);
        topo.set_parent(stub, 1);
        remove_dangling(&mut topo);
        assert_eq!(topo.nodes.len(), 3);
        assert_eq!(topo.num_vias(), 0);
    }

    #[test]
    fn duplicate_pin_tags_are_cleared() {
        let mut topo = GridTopo::new();
        chain(
            &mut topo,
            &[
                (GridPoint::new(1, 2, 0), Some(0)),
                (GridPoint::new(1, 2, 1), Some(0)),
                (GridPoint::new(1, 2, 5), Some(1)),
            ],
        );
        normalize_pins(&mut topo);
        assert_eq!(topo.pin_nodes().count(), 2);
    }

    #[test]
    fn detour_over_upper_layer_becomes_a_jog() {
        let (design, mut local) = local(vec![pin(1, 500, 100), pin(1, 700, 1900)]);
        let grid = RouteGrid::new(&design.layers, &DetailedRoutingConfig::default());
        // Layer 1 is vertical, layer 2 horizontal; both on a 200 pitch from 100.
        chain(
            &mut local.topo,
            &[
                (GridPoint::new(1, 2, 0), Some(0)),
                (GridPoint::new(1, 2, 4), None),
                (GridPoint::new(2, 4, 2), None),
                (GridPoint::new(2, 4, 3), None),
                (GridPoint::new(1, 3, 4), None),
                (GridPoint::new(1, 3, 9), Some(1)),
            ],
        );
        let (pins, normal) = remove_track_switches(&mut local, &grid);
        assert_eq!((pins, normal), (0, 1));
        assert_eq!(local.topo.num_vias(), 0);
        let jogs = local.topo.edges().iter().filter(|e| e.kind() == EdgeKind::WrongWay).count();
        assert_eq!(jogs, 1);
    }

    #[test]
    fn short_via_landing_is_extended() {
        let (design, mut local) = local(vec![pin(0, 500, 1100), pin(2, 1700, 1100)]);
        let grid = RouteGrid::new(&design.layers, &DetailedRoutingConfig::default());
        chain(
            &mut local.topo,
            &[
                (GridPoint::new(0, 5, 2), Some(0)),
                (GridPoint::new(1, 2, 5), None),
                (GridPoint::new(2, 5, 2), None),
                (GridPoint::new(2, 5, 8), Some(1)),
            ],
        );
        let config = DetailedRoutingConfig::default();
        let setting = IterSetting::new(&config, 0);
        let (vio, shadowed) = fix_min_area(&mut local, &grid, &setting);
        assert_eq!(vio, 0);
        // The landing on layer 0 sits on the pin metal itself.
        let pin_landing = design.layers.layers[0].has_min_len_vio_acc(0);
        assert_eq!(shadowed, usize::from(pin_landing));

        let layer = &design.layers.layers[1];
        let middle = &local.topo.nodes[1];
        if layer.has_min_len_vio_acc(0) {
            let ext = middle.extension.expect("extension on the via landing");
            assert_eq!((ext.layer, ext.track), (1, 2));
            assert!(ext.cps.contains(5));
            assert!(!layer.has_min_len_vio_acc(layer.cp_range_dist(&ext.cps)));
        } else {
            assert!(middle.extension.is_none());
        }
    }
}
