use dr_common::db::{Design, DesignDescription, NetDescription, PinDescription};
use dr_common::geom::{BoxOnLayer, Dbu, EdgeKind, GridPoint, Rect};
use dr_common::util::check;
use dr_common::util::config::{Config, DetailedRoutingConfig};
use dr_common::util::generator::demo_tech;
use dr_router::status::RouteStatus;

// Layer 0 and 2 run horizontally, layer 1 vertically. Tracks and cross-points sit
// at 100 + 200 * index on every layer.
fn at(x: i32, y: i32) -> (Dbu, Dbu) {
    (100 + 200 * x as Dbu, 100 + 200 * y as Dbu)
}

fn pin(layer: usize, (x, y): (Dbu, Dbu)) -> PinDescription {
    PinDescription {
        name: String::new(),
        boxes: vec![BoxOnLayer::new(layer, Rect::new(x, y, x, y))],
    }
}

fn guide(layer: usize, (lx, ly): (Dbu, Dbu), (hx, hy): (Dbu, Dbu)) -> BoxOnLayer {
    BoxOnLayer::new(layer, Rect::new(lx, ly, hx, hy))
}

fn net(name: &str, pins: Vec<PinDescription>, guides: Vec<BoxOnLayer>) -> NetDescription {
    NetDescription {
        name: name.to_string(),
        pins,
        guides,
    }
}

fn design(nets: Vec<NetDescription>) -> Design {
    let desc = DesignDescription {
        name: "it".to_string(),
        tech: demo_tech(3, 12),
        nets,
        obstacles: vec![],
    };
    Design::from_description(&desc).unwrap()
}

fn config(dr: DetailedRoutingConfig) -> Config {
    Config {
        detailed_routing: dr,
        ..Config::default()
    }
}

#[test]
fn straight_net_is_one_wire() {
    let mut d = design(vec![net(
        "straight",
        vec![pin(1, at(0, 0)), pin(1, at(0, 5))],
        vec![guide(1, at(0, 0), at(0, 5))],
    )]);
    let summary = dr_router::route(&mut d, &Config::default()).unwrap();
    assert_eq!(summary.status, vec![RouteStatus::SuccNormal]);

    let topo = &d.nets[0].topo;
    let edges = topo.edges();
    assert_eq!(edges.len(), 1);
    assert_eq!(topo.num_vias(), 0);
    let edge = edges[0];
    assert_eq!(edge.kind(), EdgeKind::Track);
    let mut ends = [edge.u, edge.v];
    ends.sort();
    assert_eq!(ends, [GridPoint::new(1, 0, 0), GridPoint::new(1, 0, 5)]);

    let ts = edge.track_segment().unwrap();
    assert_eq!(d.layers.layers[1].cp_range_dist(&ts.cps), 1000);
    assert!(check::run(&d).is_ok());
}

#[test]
fn crossing_guides_give_exactly_one_via() {
    let mut d = design(vec![net(
        "corner",
        vec![pin(1, at(2, 0)), pin(2, at(9, 7))],
        vec![guide(1, at(2, 0), at(2, 7)), guide(2, at(2, 7), at(9, 7))],
    )]);
    let cfg = config(DetailedRoutingConfig {
        default_guide_expand: 0,
        ..DetailedRoutingConfig::default()
    });
    let summary = dr_router::route(&mut d, &cfg).unwrap();
    assert!(summary.status[0].is_succ());

    let topo = &d.nets[0].topo;
    let vias: Vec<_> = topo.edges().into_iter().filter(|e| e.kind() == EdgeKind::Via).collect();
    assert_eq!(vias.len(), 1);
    let mut ends = [vias[0].u, vias[0].v];
    ends.sort();
    assert_eq!(ends, [GridPoint::new(1, 2, 7), GridPoint::new(2, 7, 2)]);
    assert_eq!(topo.pin_nodes().count(), 2);
    assert!(check::run(&d).is_ok());
}

#[test]
fn unroutable_net_leaves_grid_untouched() {
    let mut d = design(vec![net(
        "detached",
        vec![pin(0, at(0, 0)), pin(2, at(8, 8))],
        vec![guide(0, at(0, 0), at(4, 0))],
    )]);
    let summary = dr_router::route(&mut d, &Config::default()).unwrap();
    assert_eq!(summary.status, vec![RouteStatus::FailDetachedPin]);
    assert_eq!(summary.num_failed(), 1);
    assert!(d.nets[0].topo.is_empty());
    assert_eq!(summary.stats.wire_grids.iter().sum::<usize>(), 0);
    assert_eq!(summary.stats.num_vias, 0);
}

#[test]
fn separated_nets_converge_after_one_iteration() {
    let nets = (0..4)
        .map(|i| {
            let x = 3 * i;
            net(
                &format!("n{}", i),
                vec![pin(1, at(x, 1)), pin(1, at(x, 9))],
                vec![guide(1, at(x, 1), at(x, 9))],
            )
        })
        .collect();
    let mut d = design(nets);
    let cfg = config(DetailedRoutingConfig {
        num_threads: 2,
        default_guide_expand: 0,
        ..DetailedRoutingConfig::default()
    });
    let summary = dr_router::route(&mut d, &cfg).unwrap();
    assert!(summary.status.iter().all(|s| s.is_succ()));
    assert_eq!(summary.iterations, 1);
    assert_eq!(summary.stats.num_space_vios(), 0);
    assert_eq!(summary.stats.short_area, 0.0);
    for n in &d.nets {
        assert_eq!(n.topo.num_vias(), 0);
    }
    assert!(check::run(&d).is_ok());
}

#[test]
fn single_pin_nets_are_left_alone() {
    let mut d = design(vec![net("lonely", vec![pin(1, at(3, 3))], vec![guide(1, at(3, 3), at(3, 6))])]);
    let summary = dr_router::route(&mut d, &Config::default()).unwrap();
    assert_eq!(summary.status, vec![RouteStatus::SuccOnePin]);
    assert!(d.nets[0].topo.is_empty());
}
