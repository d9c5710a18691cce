use super::guide_graph::GuideGraph;
use crate::status::RouteStatus;
use dr_common::db::{GridTopo, Net, NetId};
use dr_common::geom::{BoxOnLayer, Dbu, GridBoxOnLayer, GridPoint, Interval, slice_grid_boxes};
use dr_common::tech::LayerList;

/// Working copy of a net while it is being routed.
#[derive(Clone, Debug)]
pub struct LocalNet {
    pub id: NetId,
    pub name: String,
    /// Pin shapes as given in the design.
    pub pins: Vec<Vec<BoxOnLayer>>,
    pub(super) orig_guides: Vec<BoxOnLayer>,
    pub(super) orig_grid_guides: Vec<GridBoxOnLayer>,

    /// Expanded guides; sliced and grid aligned once `init_grid_boxes` ran.
    pub route_guides: Vec<BoxOnLayer>,
    pub grid_guides: Vec<GridBoxOnLayer>,
    /// Original guides overlapping each grid guide.
    pub(super) db_guide_idxes: Vec<Vec<usize>>,
    /// Grid points a wire may end on to reach each pin.
    pub pin_access: Vec<Vec<GridBoxOnLayer>>,
    pub pin_access_boxes: Vec<Vec<BoxOnLayer>>,

    pub conn: GuideGraph,
    pub est_vertices: i64,

    pub topo: GridTopo,
    pub status: RouteStatus,
    pub min_area_vio: usize,
    pub min_area_shadowed_vio: usize,
}

impl LocalNet {
    pub fn new(net: &Net) -> Self {
        Self {
            id: net.id,
            name: net.name.clone(),
            pins: net.pins.clone(),
            orig_guides: net.guides.clone(),
            orig_grid_guides: net.grid_guides.clone(),
            route_guides: net.guides.clone(),
            grid_guides: Vec::new(),
            db_guide_idxes: Vec::new(),
            pin_access: Vec::new(),
            pin_access_boxes: Vec::new(),
            conn: GuideGraph::default(),
            est_vertices: 0,
            topo: GridTopo::new(),
            status: RouteStatus::SuccNormal,
            min_area_vio: 0,
            min_area_shadowed_vio: 0,
        }
    }

    pub fn num_pins(&self) -> usize {
        self.pins.len()
    }

    /// Turns the expanded guides and the pin shapes into disjoint grid boxes.
    pub(super) fn init_grid_boxes(&mut self, layers: &LayerList) {
        let n = layers.num_layers();
        let mut by_layer: Vec<Vec<GridBoxOnLayer>> = vec![Vec::new(); n];
        for guide in &self.route_guides {
            by_layer[guide.layer].push(layers.range_search(guide, true));
        }
        self.grid_guides.clear();
        self.route_guides.clear();
        for mut boxes in by_layer {
            boxes.retain(|b| layers.is_valid_box(b));
            slice_grid_boxes(&mut boxes);
            for b in boxes {
                self.grid_guides.push(b);
                self.route_guides.push(layers.box_loc(&b));
            }
        }

        self.pin_access = self.pins.iter().map(|shapes| pin_access_boxes(layers, shapes)).collect();
        self.pin_access_boxes = self
            .pin_access
            .iter()
            .map(|boxes| boxes.iter().map(|b| layers.box_loc(b)).collect())
            .collect();

        self.db_guide_idxes = self
            .route_guides
            .iter()
            .map(|g| {
                self.orig_guides
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| o.layer == g.layer && o.rect.overlaps(&g.rect))
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();
    }

    /// Candidate via count, used to order nets from hardest to easiest.
    pub(super) fn init_est_vertices(&mut self, layers: &LayerList) {
        let mut est = 0;
        for (b1, conns) in self.conn.guide_conn.iter().enumerate() {
            for &b2 in conns {
                if b2 <= b1 {
                    continue;
                }
                let (g1, g2) = (&self.grid_guides[b1], &self.grid_guides[b2]);
                let (lower, upper) = if g1.layer < g2.layer { (g1, g2) } else { (g2, g1) };
                let Some(vb) = layers.grid_via_box_between(lower, upper) else {
                    continue;
                };
                if layers.is_valid_via_box(&vb) {
                    est += (vb.lower.tracks.range() as i64 + 1) * (vb.upper.tracks.range() as i64 + 1);
                }
            }
        }
        self.est_vertices = est;
    }

    /// Every pin keeps at least one on-grid access box.
    pub(super) fn check_pin(&self) -> bool {
        self.pin_access.iter().all(|boxes| !boxes.is_empty())
    }

    fn in_orig_guide(&self, guide: usize, track: i32, cp: i32) -> bool {
        self.db_guide_idxes[guide].iter().any(|&i| {
            let b = &self.orig_grid_guides[i];
            b.tracks.contains(track) && b.cps.contains(cp)
        })
    }

    /// 0 when both via ends lie inside the unexpanded guides, 1 otherwise.
    pub(super) fn via_penalty(&self, g1: usize, p1: &GridPoint, g2: usize, p2: &GridPoint) -> f64 {
        if self.in_orig_guide(g1, p1.track, p1.cp) && self.in_orig_guide(g2, p2.track, p2.cp) {
            0.0
        } else {
            1.0
        }
    }

    pub(super) fn cp_penalty(&self, guide: usize, track: i32, cp: i32) -> f64 {
        if self.in_orig_guide(guide, track, cp) { 0.0 } else { 1.0 }
    }

    /// Share of the wire from `c1` to `c2` lying outside the unexpanded guides.
    pub(super) fn wire_segment_penalty(&self, layers: &LayerList, guide: usize, track: i32, c1: i32, c2: i32) -> f64 {
        let layer_idx = self.grid_guides[guide].layer;
        let cp_dim = layers.layers[layer_idx].direction.other();
        let seg = layers.box_loc(&GridBoxOnLayer::new(layer_idx, Interval::point(track), Interval::new(c1, c2)));
        let segment = seg.rect[cp_dim];

        let mut covered: Vec<Interval<Dbu>> = Vec::new();
        for &i in &self.db_guide_idxes[guide] {
            let b = &self.orig_grid_guides[i];
            if !b.tracks.contains(track) {
                continue;
            }
            if b.cps.contains(c1) && b.cps.contains(c2) {
                return 0.0;
            }
            let part = self.orig_guides[i].rect[cp_dim].intersect(&segment);
            if part.is_valid() {
                covered.push(part);
            }
        }
        if covered.is_empty() || segment.range() <= 0 {
            return 1.0;
        }

        covered.sort_by_key(|iv| (iv.low, iv.high));
        let mut length = 0;
        let mut run = covered[0];
        for iv in &covered[1..] {
            if iv.low <= run.high {
                run.high = run.high.max(iv.high);
            } else {
                length += run.range();
                run = *iv;
            }
        }
        length += run.range();
        1.0 - length as f64 / segment.range() as f64
    }
}

/// Grid access of one pin: the grid points inside the spacing forbid region of each
/// shape, plus the single points within one pitch around it.
fn pin_access_boxes(layers: &LayerList, shapes: &[BoxOnLayer]) -> Vec<GridBoxOnLayer> {
    let mut by_layer: Vec<Vec<GridBoxOnLayer>> = vec![Vec::new(); layers.num_layers()];
    for shape in shapes {
        let pitch = layers.layers[shape.layer].pitch;
        let forbid = layers.range_search(&layers.metal_rect_forbid_region(shape, false), true);
        by_layer[shape.layer].push(forbid);

        let ext = layers.range_search(&BoxOnLayer::new(shape.layer, shape.rect.expand(pitch)), true);
        for t in ext.tracks.low..=ext.tracks.high {
            for c in ext.cps.low..=ext.cps.high {
                let gp = GridPoint::new(shape.layer, t, c);
                if !forbid.contains(&gp) && shape.rect.dist_to_point(layers.loc(&gp)) <= pitch {
                    by_layer[shape.layer].push(GridBoxOnLayer::new(shape.layer, Interval::point(t), Interval::point(c)));
                }
            }
        }
    }

    let mut access = Vec::new();
    for mut boxes in by_layer {
        boxes.retain(|b| layers.is_valid_box(b));
        slice_grid_boxes(&mut boxes);
        access.extend(boxes);
    }
    access
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_common::db::{Design, DesignDescription, NetDescription, PinDescription};
    use dr_common::geom::Rect;
    use dr_common::util::generator::demo_tech;

    fn design(guides: Vec<BoxOnLayer>) -> Design {
        let pin = |x: Dbu, y: Dbu| PinDescription {
            name: String::new(),
            boxes: vec![BoxOnLayer::new(1, Rect::new(x - 50, y - 50, x + 50, y + 50))],
        };
        let desc = DesignDescription {
            name: "local".to_string(),
            tech: demo_tech(3, 10),
            nets: vec![NetDescription {
                name: "n0".to_string(),
                pins: vec![pin(100, 100), pin(100, 1100)],
                guides,
            }],
            obstacles: vec![],
        };
        Design::from_description(&desc).unwrap()
    }

    #[test]
    fn pin_access_covers_pin_and_neighbours() {
        let d = design(vec![BoxOnLayer::new(1, Rect::new(100, 100, 100, 1100))]);
        let mut local = LocalNet::new(&d.nets[0]);
        local.init_grid_boxes(&d.layers);
        assert!(local.check_pin());

        let points: Vec<GridPoint> = local.pin_access[0]
            .iter()
            .flat_map(|b| {
                (b.tracks.low..=b.tracks.high)
                    .flat_map(move |t| (b.cps.low..=b.cps.high).map(move |c| GridPoint::new(b.layer, t, c)))
            })
            .collect();
        assert!(points.contains(&GridPoint::new(1, 0, 0)));
        assert!(points.contains(&GridPoint::new(1, 0, 1)));
        assert!(points.contains(&GridPoint::new(1, 1, 0)));
        assert!(!points.contains(&GridPoint::new(1, 1, 1)));
    }

    #[test]
    fn penalties_follow_original_guides() {
        let d = design(vec![BoxOnLayer::new(1, Rect::new(100, 100, 100, 1100))]);
        let mut local = LocalNet::new(&d.nets[0]);
        local.route_guides = vec![d.layers.expand_box(&local.orig_guides[0], 1)];
        local.init_grid_boxes(&d.layers);
        assert_eq!(local.grid_guides.len(), 1);

        assert_eq!(local.cp_penalty(0, 0, 3), 0.0);
        assert_eq!(local.cp_penalty(0, 1, 3), 1.0);
        let inside = GridPoint::new(1, 0, 2);
        let outside = GridPoint::new(1, 1, 2);
        assert_eq!(local.via_penalty(0, &inside, 0, &inside), 0.0);
        assert_eq!(local.via_penalty(0, &inside, 0, &outside), 1.0);

        assert_eq!(local.wire_segment_penalty(&d.layers, 0, 0, 1, 4), 0.0);
        assert_eq!(local.wire_segment_penalty(&d.layers, 0, 1, 1, 4), 1.0);
        // cp 4..6 spans y 900..1300 and the guide ends at 1100.
        let half = local.wire_segment_penalty(&d.layers, 0, 0, 4, 6);
        assert!((half - 0.5).abs() < 1e-9);
    }
}
