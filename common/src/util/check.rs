use crate::db::design::{Design, Net};
use crate::geom::{EdgeKind, GridEdge};
use crate::tech::LayerList;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Verifies every routed topology: grid points are valid, every edge is a legal
/// via/track/wrong-way step, every pin is attached, and the trees are acyclic
/// with consistent parent links.
pub fn run(design: &Design) -> Result<(), String> {
    log::info!("Starting Route Topology Verification...");

    let (structure, opens) = rayon::join(|| check_structure(design), || check_opens(design));

    let mut msgs = Vec::new();
    match structure {
        Err(e) => {
            log::error!("\x1b[31mFAIL\x1b[0m: Malformed Route Topology");
            log::error!("{}", e);
            msgs.push(e);
        }
        Ok(_) => log::info!("\x1b[32mPASS\x1b[0m: All topologies are well formed."),
    }
    match opens {
        Err(e) => {
            log::error!("\x1b[31mFAIL\x1b[0m: Open Net Detected");
            log::error!("{}", e);
            msgs.push(e);
        }
        Ok(_) => log::info!("\x1b[32mPASS\x1b[0m: Every multi-pin net is routed."),
    }

    if msgs.is_empty() {
        Ok(())
    } else {
        Err(msgs.join("; "))
    }
}

fn record(found: &AtomicBool, slot: &Arc<Mutex<String>>, msg: String) {
    if !found.swap(true, Ordering::Relaxed) {
        if let Ok(mut m) = slot.lock() {
            *m = msg;
        }
    }
}

fn first_error(found: &AtomicBool, slot: &Arc<Mutex<String>>) -> Result<(), String> {
    if found.load(Ordering::Relaxed) {
        Err(slot.lock().map(|m| m.clone()).unwrap_or_default())
    } else {
        Ok(())
    }
}

fn check_structure(design: &Design) -> Result<(), String> {
    let error_found = AtomicBool::new(false);
    let error_msg = Arc::new(Mutex::new(String::new()));

    design.nets.par_iter().for_each(|net| {
        if error_found.load(Ordering::Relaxed) {
            return;
        }
        if let Err(msg) = check_net(&design.layers, net) {
            record(&error_found, &error_msg, format!("Net '{}': {}", net.name, msg));
        }
    });

    first_error(&error_found, &error_msg)
}

/// Checks one net's topology. Trees of one net may only meet through a pin shape,
/// so a pin can appear in several trees but at most once in each, and every tree
/// must touch some pin.
pub fn check_net(layers: &LayerList, net: &Net) -> Result<(), String> {
    let topo = &net.topo;
    let mut seen = vec![false; topo.nodes.len()];
    let mut pin_hits = vec![0usize; net.num_pins()];

    for &root in &topo.roots {
        if topo.nodes[root].parent.is_some() {
            return Err(format!("root {:?} has a parent", topo.nodes[root].point));
        }
        let mut tree_pins = vec![false; net.num_pins()];
        for n in topo.pre_order(root) {
            if std::mem::replace(&mut seen[n], true) {
                return Err(format!("node {:?} reached twice", topo.nodes[n].point));
            }
            let node = &topo.nodes[n];
            if !layers.is_valid(&node.point) {
                return Err(format!("node {:?} is off grid", node.point));
            }
            if let Some(pin) = node.pin {
                match tree_pins.get_mut(pin) {
                    Some(true) => return Err(format!("pin {} appears twice in one tree", pin)),
                    Some(hit) => *hit = true,
                    None => return Err(format!("unknown pin index {}", pin)),
                }
                pin_hits[pin] += 1;
            }
            for &c in &node.children {
                if topo.nodes[c].parent != Some(n) {
                    return Err(format!("child {:?} does not point back", topo.nodes[c].point));
                }
                check_edge(layers, &GridEdge::new(topo.nodes[c].point, node.point))?;
            }
            if let Some(ext) = &node.extension {
                if ext.layer != node.point.layer || ext.track != node.point.track {
                    return Err(format!("extension {:?} leaves its node's track", ext));
                }
            }
        }
        if !tree_pins.contains(&true) {
            return Err(format!("tree at {:?} touches no pin", topo.nodes[root].point));
        }
    }

    if !topo.is_empty() {
        if let Some(pin) = pin_hits.iter().position(|&h| h == 0) {
            return Err(format!("pin {} is not attached", pin));
        }
    }
    Ok(())
}

fn check_edge(layers: &LayerList, edge: &GridEdge) -> Result<(), String> {
    match edge.kind() {
        EdgeKind::Via => {
            if layers.upper(&edge.lower()) == Some(edge.upper()) {
                Ok(())
            } else {
                Err(format!("via {:?} -> {:?} is misaligned", edge.lower(), edge.upper()))
            }
        }
        EdgeKind::Track | EdgeKind::WrongWay => Ok(()),
        EdgeKind::Invalid => Err(format!("illegal edge {:?} -> {:?}", edge.u, edge.v)),
    }
}

fn check_opens(design: &Design) -> Result<(), String> {
    let unrouted: Vec<&str> = design
        .nets
        .par_iter()
        .filter(|n| n.num_pins() >= 2 && n.topo.is_empty())
        .map(|n| n.name.as_str())
        .collect();
    if unrouted.is_empty() {
        Ok(())
    } else {
        let shown: Vec<&str> = unrouted.iter().take(5).copied().collect();
        Err(format!("{} unrouted nets (e.g. {})", unrouted.len(), shown.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::design::{DesignDescription, NetDescription, PinDescription};
    use crate::geom::{BoxOnLayer, GridPoint, Rect};
    use crate::util::generator::demo_tech;

    fn two_pin_design() -> Design {
        let pin = |x: i64| PinDescription {
            name: String::new(),
            boxes: vec![BoxOnLayer::new(1, Rect::new(x - 50, 50, x + 50, 150))],
        };
        let desc = DesignDescription {
            name: "check".to_string(),
            tech: demo_tech(3, 8),
            nets: vec![NetDescription {
                name: "n".to_string(),
                pins: vec![pin(100), pin(500)],
                guides: vec![],
            }],
            obstacles: vec![],
        };
        Design::from_description(&desc).unwrap()
    }

    #[test]
    fn straight_wire_passes() {
        let mut design = two_pin_design();
        let topo = &mut design.nets[0].topo;
        let a = topo.add_node(GridPoint::new(1, 0, 0), Some(0));
        let b = topo.add_node(GridPoint::new(1, 0, 5), Some(1));
        topo.roots.push(a);
        topo.set_parent(b, a);
        assert!(check_net(&design.layers, &design.nets[0]).is_ok());
    }

    #[test]
    fn missing_pin_fails() {
        let mut design = two_pin_design();
        let topo = &mut design.nets[0].topo;
        let a = topo.add_node(GridPoint::new(1, 0, 0), Some(0));
        let b = topo.add_node(GridPoint::new(1, 0, 5), None);
        topo.roots.push(a);
        topo.set_parent(b, a);
        assert!(check_net(&design.layers, &design.nets[0]).is_err());
    }

    #[test]
    fn pin_twice_in_one_tree_fails() {
        let mut design = two_pin_design();
        let topo = &mut design.nets[0].topo;
        let a = topo.add_node(GridPoint::new(1, 0, 0), Some(0));
        let b = topo.add_node(GridPoint::new(1, 0, 1), Some(0));
        let c = topo.add_node(GridPoint::new(1, 0, 5), Some(1));
        topo.roots.push(a);
        topo.set_parent(b, a);
        topo.set_parent(c, b);
        assert!(check_net(&design.layers, &design.nets[0]).is_err());
    }

    #[test]
    fn diagonal_edge_fails() {
        let mut design = two_pin_design();
        let topo = &mut design.nets[0].topo;
        let a = topo.add_node(GridPoint::new(1, 0, 0), Some(0));
        let b = topo.add_node(GridPoint::new(1, 1, 5), Some(1));
        topo.roots.push(a);
        topo.set_parent(b, a);
        assert!(check_net(&design.layers, &design.nets[0]).is_err());
    }

    #[test]
    fn unrouted_multi_pin_net_is_open() {
        let design = two_pin_design();
        assert!(run(&design).is_err());
    }
}
