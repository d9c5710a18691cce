use crate::grid::RoutingGrid;
use dr_common::db::{GridTopo, NetId};
use dr_common::geom::{GridEdge, GridPoint, TrackSegment};

fn extension_edge(ext: &TrackSegment) -> GridEdge {
    GridEdge::new(
        GridPoint::new(ext.layer, ext.track, ext.cps.low),
        GridPoint::new(ext.layer, ext.track, ext.cps.high),
    )
}

/// Every piece of metal a routed tree occupies on the grid.
fn topo_edges(topo: &GridTopo) -> Vec<GridEdge> {
    let mut edges = topo.edges();
    edges.extend(topo.extensions().map(extension_edge));
    edges
}

pub fn commit_topo<G: RoutingGrid>(grid: &G, topo: &GridTopo, net: NetId) {
    for edge in topo_edges(topo) {
        grid.use_edge(&edge, net);
    }
}

pub fn clear_topo<G: RoutingGrid>(grid: &G, topo: &GridTopo, net: NetId) {
    for edge in topo_edges(topo) {
        grid.remove_edge(&edge, net);
    }
}

/// Violation cost of a committed tree, history excluded. Zero means the net is clean.
pub fn topo_vio_cost<G: RoutingGrid>(grid: &G, topo: &GridTopo, net: NetId) -> f64 {
    topo_edges(topo)
        .iter()
        .map(|edge| grid.edge_vio_cost(edge, net, false))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::RouteGrid;
    use dr_common::geom::Interval;
    use dr_common::tech::LayerList;
    use dr_common::util::config::DetailedRoutingConfig;
    use dr_common::util::generator::demo_tech;

    fn l_shape() -> GridTopo {
        let mut topo = GridTopo::new();
        let root = topo.add_node(GridPoint::new(1, 2, 0), Some(0));
        let corner = topo.add_node(GridPoint::new(1, 2, 7), None);
        let up = topo.add_node(GridPoint::new(2, 7, 2), None);
        let end = topo.add_node(GridPoint::new(2, 7, 5), Some(1));
        topo.roots.push(root);
        topo.set_parent(corner, root);
        topo.set_parent(up, corner);
        topo.set_parent(end, up);
        topo.nodes[end].extension = Some(TrackSegment::new(2, 7, Interval::new(5, 6)));
        topo
    }

    #[test]
    fn commit_and_clear_are_inverse() {
        let layers = LayerList::from_description(&demo_tech(3, 10)).unwrap();
        let grid = RouteGrid::new(&layers, &DetailedRoutingConfig::default());
        let topo = l_shape();
        let a = NetId::new(0);
        commit_topo(&grid, &topo, a);
        assert_eq!(grid.via_owners(&GridPoint::new(1, 2, 7)), vec![a]);
        assert_eq!(topo_vio_cost(&grid, &topo, a), 0.0);

        let b = NetId::new(1);
        assert!(topo_vio_cost(&grid, &topo, b) > 0.0);

        clear_topo(&grid, &topo, a);
        assert!(grid.via_owners(&GridPoint::new(1, 2, 7)).is_empty());
        assert_eq!(grid.stats().wire_grids.iter().sum::<usize>(), 0);
    }
}
