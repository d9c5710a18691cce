use dr_common::geom::GridBoxOnLayer;
use dr_common::tech::LayerList;

/// Connectivity between the grid guides of a net and its pin access boxes.
#[derive(Clone, Debug, Default)]
pub struct GuideGraph {
    /// pin -> (guide, access box)
    pub pin_guide: Vec<Vec<(usize, usize)>>,
    /// guide -> (pin, access box)
    pub guide_pin: Vec<Vec<(usize, usize)>>,
    /// Guides sharing grid points or a via region.
    pub guide_conn: Vec<Vec<usize>>,
    /// Same-layer guides on neighbouring tracks with overlapping cross-points.
    pub guide_adj: Vec<Vec<usize>>,
}

impl GuideGraph {
    pub fn new(layers: &LayerList, pin_access: &[Vec<GridBoxOnLayer>], guides: &[GridBoxOnLayer]) -> Self {
        let mut graph = GuideGraph {
            pin_guide: vec![Vec::new(); pin_access.len()],
            guide_pin: vec![Vec::new(); guides.len()],
            guide_conn: vec![Vec::new(); guides.len()],
            guide_adj: vec![Vec::new(); guides.len()],
        };

        for (p, access) in pin_access.iter().enumerate() {
            for (a, ab) in access.iter().enumerate() {
                for (g, guide) in guides.iter().enumerate() {
                    if layers.is_connected(guide, ab) {
                        graph.pin_guide[p].push((g, a));
                        graph.guide_pin[g].push((p, a));
                    }
                }
            }
        }

        for g1 in 0..guides.len() {
            for g2 in g1 + 1..guides.len() {
                if layers.is_connected(&guides[g1], &guides[g2]) {
                    graph.guide_conn[g1].push(g2);
                    graph.guide_conn[g2].push(g1);
                }
                if layers.is_adjacent(&guides[g1], &guides[g2]) {
                    graph.guide_adj[g1].push(g2);
                    graph.guide_adj[g2].push(g1);
                }
            }
        }
        graph
    }

    /// Every pin touches at least one guide.
    pub fn every_pin_attached(&self) -> bool {
        self.pin_guide.iter().all(|conns| !conns.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_common::geom::Interval;
    use dr_common::util::generator::demo_tech;

    #[test]
    fn pins_and_guides_link_up() {
        let layers = LayerList::from_description(&demo_tech(3, 10)).unwrap();
        // Layer 1 is vertical: track t sits at x = 100 + 200 t.
        let m2 = GridBoxOnLayer::new(1, Interval::new(2, 2), Interval::new(0, 9));
        let m3 = GridBoxOnLayer::new(2, Interval::new(7, 7), Interval::new(0, 9));
        let m2_side = GridBoxOnLayer::new(1, Interval::new(3, 4), Interval::new(5, 6));
        let pin_a = vec![GridBoxOnLayer::new(1, Interval::new(2, 2), Interval::new(0, 0))];
        let pin_b = vec![GridBoxOnLayer::new(0, Interval::new(8, 8), Interval::new(8, 8))];

        let graph = GuideGraph::new(&layers, &[pin_a, pin_b], &[m2, m3, m2_side]);
        assert_eq!(graph.pin_guide[0], vec![(0, 0)]);
        assert!(graph.pin_guide[1].is_empty());
        assert!(!graph.every_pin_attached());
        assert_eq!(graph.guide_conn[0], vec![1]);
        assert_eq!(graph.guide_adj[0], vec![2]);
        assert!(graph.guide_adj[1].is_empty());
    }
}
