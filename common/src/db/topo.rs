use crate::geom::{EdgeKind, GridEdge, GridPoint, TrackSegment};

/// One Steiner node of a routed net.
#[derive(Clone, Debug, PartialEq)]
pub struct TopoNode {
    pub point: GridPoint,
    pub pin: Option<usize>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Extra same-track wire added to satisfy minimum area.
    pub extension: Option<TrackSegment>,
}

impl TopoNode {
    pub fn new(point: GridPoint, pin: Option<usize>) -> Self {
        Self {
            point,
            pin,
            parent: None,
            children: Vec::new(),
            extension: None,
        }
    }
}

/// Routed topology of a net: a forest stored as an arena of nodes addressed by index.
#[derive(Clone, Debug, Default)]
pub struct GridTopo {
    pub nodes: Vec<TopoNode>,
    pub roots: Vec<usize>,
}

impl GridTopo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    pub fn add_node(&mut self, point: GridPoint, pin: Option<usize>) -> usize {
        self.nodes.push(TopoNode::new(point, pin));
        self.nodes.len() - 1
    }

    pub fn set_parent(&mut self, child: usize, parent: usize) {
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
    }

    /// Detaches `node` from its parent. Sibling order is not preserved.
    pub fn reset_parent(&mut self, node: usize) {
        let Some(parent) = self.nodes[node].parent.take() else {
            return;
        };
        let siblings = &mut self.nodes[parent].children;
        if let Some(pos) = siblings.iter().position(|&c| c == node) {
            siblings.swap_remove(pos);
        }
    }

    pub fn pre_order(&self, root: usize) -> Vec<usize> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(n) = stack.pop() {
            order.push(n);
            stack.extend(self.nodes[n].children.iter().rev());
        }
        order
    }

    pub fn post_order(&self, root: usize) -> Vec<usize> {
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((n, expanded)) = stack.pop() {
            if expanded {
                order.push(n);
            } else {
                stack.push((n, true));
                stack.extend(self.nodes[n].children.iter().rev().map(|&c| (c, false)));
            }
        }
        order
    }

    /// Post order over every tree.
    pub fn all_post_order(&self) -> Vec<usize> {
        self.roots.iter().flat_map(|&r| self.post_order(r)).collect()
    }

    /// Splices out non-pin nodes sitting in the middle of a straight same-track run,
    /// then drops the detached nodes from the arena.
    pub fn merge_nodes(&mut self) {
        for n in self.all_post_order() {
            let node = &self.nodes[n];
            let Some(parent) = node.parent else { continue };
            if node.pin.is_some() || node.extension.is_some() || node.children.len() != 1 {
                continue;
            }
            let child = node.children[0];
            let (p, c) = (self.nodes[parent].point, self.nodes[child].point);
            let here = node.point;
            if p.layer == here.layer && c.layer == here.layer && c.track == here.track && p.track == here.track {
                self.reset_parent(n);
                self.reset_parent(child);
                self.set_parent(child, parent);
            }
        }
        self.compact();
    }

    /// Rebuilds the arena keeping only nodes reachable from a root.
    pub fn compact(&mut self) {
        let mut remap = vec![usize::MAX; self.nodes.len()];
        let mut kept = Vec::new();
        for &r in &self.roots {
            for n in self.pre_order(r) {
                remap[n] = kept.len();
                kept.push(n);
            }
        }
        if kept.len() == self.nodes.len() {
            return;
        }
        let nodes = kept
            .iter()
            .map(|&old| {
                let mut node = self.nodes[old].clone();
                node.parent = node.parent.map(|p| remap[p]);
                node.children = node.children.iter().map(|&c| remap[c]).collect();
                node
            })
            .collect();
        self.roots = self.roots.iter().map(|&r| remap[r]).collect();
        self.nodes = nodes;
    }

    /// Every parent-child link, child first.
    pub fn edges(&self) -> Vec<GridEdge> {
        self.roots
            .iter()
            .flat_map(|&r| self.pre_order(r))
            .filter_map(|n| {
                let node = &self.nodes[n];
                node.parent.map(|p| GridEdge::new(node.point, self.nodes[p].point))
            })
            .collect()
    }

    pub fn extensions(&self) -> impl Iterator<Item = &TrackSegment> {
        self.nodes.iter().filter_map(|n| n.extension.as_ref())
    }

    pub fn num_vias(&self) -> usize {
        self.edges().iter().filter(|e| e.kind() == EdgeKind::Via).count()
    }

    /// Pin index of each pin node, paired with its node.
    pub fn pin_nodes(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.roots
            .iter()
            .flat_map(|&r| self.pre_order(r))
            .filter_map(|n| self.nodes[n].pin.map(|p| (p, n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(points: &[GridPoint]) -> GridTopo {
        let mut topo = GridTopo::new();
        let root = topo.add_node(points[0], Some(0));
        topo.roots.push(root);
        let mut prev = root;
        for (i, &p) in points.iter().enumerate().skip(1) {
            let pin = (i + 1 == points.len()).then_some(1);
            let n = topo.add_node(p, pin);
            topo.set_parent(n, prev);
            prev = n;
        }
        topo
    }

    #[test]
    fn merge_removes_straight_interior_nodes() {
        let mut topo = chain(&[
            GridPoint::new(1, 0, 0),
            GridPoint::new(1, 0, 2),
            GridPoint::new(1, 0, 5),
            GridPoint::new(2, 3, 0),
        ]);
        topo.merge_nodes();
        assert_eq!(topo.nodes.len(), 3);
        let edges = topo.edges();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].kind(), EdgeKind::Track);
        assert_eq!(topo.num_vias(), 1);
    }

    #[test]
    fn merge_keeps_corner_nodes() {
        let mut topo = chain(&[
            GridPoint::new(1, 0, 0),
            GridPoint::new(1, 0, 3),
            GridPoint::new(1, 2, 3),
        ]);
        topo.merge_nodes();
        assert_eq!(topo.nodes.len(), 3);
    }

    #[test]
    fn reset_parent_detaches_both_links() {
        let mut topo = chain(&[GridPoint::new(0, 0, 0), GridPoint::new(0, 0, 1)]);
        topo.reset_parent(1);
        assert!(topo.nodes[0].children.is_empty());
        assert_eq!(topo.nodes[1].parent, None);
        topo.compact();
        assert_eq!(topo.nodes.len(), 1);
    }

    #[test]
    fn traversal_orders() {
        let mut topo = GridTopo::new();
        let r = topo.add_node(GridPoint::new(0, 0, 0), None);
        let a = topo.add_node(GridPoint::new(0, 0, 1), None);
        let b = topo.add_node(GridPoint::new(0, 0, 2), None);
        topo.roots.push(r);
        topo.set_parent(a, r);
        topo.set_parent(b, a);
        assert_eq!(topo.pre_order(r), vec![r, a, b]);
        assert_eq!(topo.post_order(r), vec![b, a, r]);
    }
}
