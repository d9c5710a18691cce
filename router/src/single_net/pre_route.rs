use super::IterSetting;
use super::graph_builder::wrong_way_cps;
use super::guide_graph::GuideGraph;
use super::local_net::LocalNet;
use crate::status::RouteStatus;
use dr_common::geom::{GridBoxOnLayer, Interval};
use dr_common::tech::LayerList;

enum Visit {
    Pin(usize),
    Guide(usize, Interval<i32>),
}

/// Projects a pin access box onto `layer`, which is the box's own layer or a neighbour.
fn project(layers: &LayerList, ab: &GridBoxOnLayer, layer: usize) -> Option<GridBoxOnLayer> {
    if ab.layer == layer {
        Some(*ab)
    } else if ab.layer + 1 == layer {
        layers.upper_box(ab)
    } else if layer + 1 == ab.layer {
        layers.lower_box(ab)
    } else {
        None
    }
}

impl LocalNet {
    /// Expands the guides by `expand` pitches, repairs detached pins and checks that
    /// every pin is reachable through the guides.
    pub(super) fn pre_route(&mut self, layers: &LayerList, expand: i32, wrong_way_density: f64) -> RouteStatus {
        self.route_guides = self.orig_guides.iter().map(|g| layers.expand_box(g, expand)).collect();
        if self.num_pins() < 2 {
            return RouteStatus::SuccOnePin;
        }

        let status = self.expand_guides_to_cover_pins();
        if !status.is_succ() {
            return status;
        }

        self.init_grid_boxes(layers);
        self.conn = GuideGraph::new(layers, &self.pin_access, &self.grid_guides);
        self.init_est_vertices(layers);

        if !self.check_pin() {
            return RouteStatus::FailPinOutOfGrid;
        }
        if !self.conn.every_pin_attached() {
            return RouteStatus::FailDetachedPin;
        }
        if !self.guides_connect_pins(layers, wrong_way_density) {
            return RouteStatus::FailDetachedGuide;
        }
        status
    }

    /// Retries with a wider expansion while the guides stay disconnected.
    pub(super) fn pre_route_iterative(&mut self, layers: &LayerList, setting: &IterSetting, limit: usize) -> RouteStatus {
        let mut expand = setting.guide_expand;
        let mut status = self.pre_route(layers, expand, setting.wrong_way_density);
        let mut iter = 0;
        while status == RouteStatus::FailDetachedGuide && iter < limit {
            iter += 1;
            expand += iter as i32;
            status = self.pre_route(layers, expand, setting.wrong_way_density);
        }
        if iter > 0 {
            log::debug!(
                "Net {}: guide expansion raised to {} pitches after {} retries, {}",
                self.name,
                expand,
                iter,
                status
            );
        }
        status
    }

    /// Grows the nearest guide over any pin no guide touches.
    fn expand_guides_to_cover_pins(&mut self) -> RouteStatus {
        let mut status = RouteStatus::SuccNormal;
        for pin in &self.pins {
            let covered = pin.iter().any(|shape| {
                self.route_guides
                    .iter()
                    .any(|g| g.layer.abs_diff(shape.layer) <= 1 && g.rect.overlaps(&shape.rect))
            });
            if covered {
                continue;
            }

            let mut best: Option<(i64, usize, usize)> = None;
            for (s, shape) in pin.iter().enumerate() {
                for (g, guide) in self.route_guides.iter().enumerate() {
                    if guide.layer.abs_diff(shape.layer) > 1 || !guide.rect.is_valid() {
                        continue;
                    }
                    let d = guide.rect.dist(&shape.rect);
                    if best.is_none_or(|(bd, _, _)| d < bd) {
                        best = Some((d, g, s));
                    }
                }
            }
            let Some((_, g, s)) = best else {
                return RouteStatus::FailDetachedPin;
            };
            let grown = self.route_guides[g].rect.union(&pin[s].rect);
            self.route_guides[g].rect = grown;
            status = RouteStatus::SuccDetachedPinFixed;
        }
        status
    }

    /// Walks the guides track by track from the first pin. A guide is entered only on
    /// the tracks a via or a wrong-way jog actually reaches, unless it holds
    /// wrong-way points and so can move between its tracks freely.
    fn guides_connect_pins(&self, layers: &LayerList, wrong_way_density: f64) -> bool {
        let guides = &self.grid_guides;
        let mut visited: Vec<Vec<bool>> = guides.iter().map(|g| vec![false; (g.tracks.range() + 1) as usize]).collect();
        let mut pin_visited = vec![false; self.num_pins()];
        let mut stack = vec![Visit::Pin(0)];
        pin_visited[0] = true;

        let reach = |visited: &mut Vec<Vec<bool>>, stack: &mut Vec<Visit>, g: usize, tracks: Interval<i32>| {
            let tracks = tracks.intersect(&guides[g].tracks);
            if !tracks.is_valid() {
                return;
            }
            let mut fresh = false;
            for t in tracks.low..=tracks.high {
                let slot = &mut visited[g][(t - guides[g].tracks.low) as usize];
                fresh |= !*slot;
                *slot = true;
            }
            if fresh {
                stack.push(Visit::Guide(g, tracks));
            }
        };

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Pin(p) => {
                    for &(g, a) in &self.conn.pin_guide[p] {
                        if let Some(proj) = project(layers, &self.pin_access[p][a], guides[g].layer) {
                            reach(&mut visited, &mut stack, g, proj.tracks);
                        }
                    }
                }
                Visit::Guide(g, tracks) => {
                    let guide = guides[g];
                    let free_moving = guide.tracks.range() > 0 && !wrong_way_cps(guide.cps, wrong_way_density).is_empty();
                    let tracks = if free_moving {
                        reach(&mut visited, &mut stack, g, guide.tracks);
                        guide.tracks
                    } else {
                        tracks
                    };
                    let sub = GridBoxOnLayer::new(guide.layer, tracks, guide.cps);

                    for &g2 in &self.conn.guide_conn[g] {
                        let other = guides[g2];
                        let vb = if guide.layer + 1 == other.layer {
                            layers.grid_via_box_between(&sub, &other).map(|vb| vb.upper)
                        } else if other.layer + 1 == guide.layer {
                            layers.grid_via_box_between(&other, &sub).map(|vb| vb.lower)
                        } else {
                            None
                        };
                        if let Some(entry) = vb {
                            reach(&mut visited, &mut stack, g2, entry.tracks);
                        }
                    }

                    for &g2 in &self.conn.guide_adj[g] {
                        let other = guides[g2];
                        if wrong_way_cps(guide.cps.intersect(&other.cps), wrong_way_density).is_empty() {
                            continue;
                        }
                        if guide.tracks.high + 1 == other.tracks.low && tracks.contains(guide.tracks.high) {
                            reach(&mut visited, &mut stack, g2, Interval::point(other.tracks.low));
                        } else if other.tracks.high + 1 == guide.tracks.low && tracks.contains(guide.tracks.low) {
                            reach(&mut visited, &mut stack, g2, Interval::point(other.tracks.high));
                        }
                    }

                    for &(p, a) in &self.conn.guide_pin[g] {
                        if pin_visited[p] {
                            continue;
                        }
                        let hit = project(layers, &self.pin_access[p][a], guide.layer)
                            .is_some_and(|proj| proj.tracks.overlaps(&tracks));
                        if hit {
                            pin_visited[p] = true;
                            stack.push(Visit::Pin(p));
                        }
                    }
                }
            }
        }
        pin_visited.iter().all(|&v| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn design(pins: Vec<PinDescription>, guides: Vec<BoxOnLayer>) -> Design {
        let desc = DesignDescription {
            name: "pre".to_string(),
            tech: demo_tech(3, 10),
            nets: vec![NetDescription {
                name: "n0".to_string(),
                pins,
                guides,
            }],
            obstacles: vec![],
        };
        Design::from_description(&desc).unwrap()
    }

    #[test]
    fn single_pin_needs_no_route() {
        let d = design(vec![pin(1, 100, 100)], vec![BoxOnLayer::new(1, Rect::new(100, 100, 100, 500))]);
        let mut local = LocalNet::new(&d.nets[0]);
        assert_eq!(local.pre_route(&d.layers, 0, 0.1), RouteStatus::SuccOnePin);
    }

    #[test]
    fn detached_pin_pulls_nearest_guide() {
        let d = design(
            vec![pin(1, 100, 100), pin(1, 100, 1100)],
            vec![BoxOnLayer::new(1, Rect::new(100, 100, 100, 700))],
        );
        let mut local = LocalNet::new(&d.nets[0]);
        assert_eq!(local.pre_route(&d.layers, 0, 0.1), RouteStatus::SuccDetachedPinFixed);
        assert_eq!(local.grid_guides.len(), 1);
        assert_eq!(local.grid_guides[0].cps, Interval::new(0, 5));
        assert!(local.conn.every_pin_attached());
    }

    #[test]
    fn pin_far_from_every_layer_fails() {
        let d = design(
            vec![pin(0, 100, 100), pin(2, 1700, 1700)],
            vec![BoxOnLayer::new(0, Rect::new(100, 100, 900, 100))],
        );
        let mut local = LocalNet::new(&d.nets[0]);
        assert_eq!(local.pre_route(&d.layers, 0, 0.1), RouteStatus::FailDetachedPin);
    }

    #[test]
    fn split_guides_reconnect_with_expansion() {
        // Two vertical runs on layer 1, two tracks apart, with no layer to bridge them.
        let d = design(
            vec![pin(1, 100, 100), pin(1, 500, 100)],
            vec![
                BoxOnLayer::new(1, Rect::new(100, 100, 100, 900)),
                BoxOnLayer::new(1, Rect::new(500, 100, 500, 900)),
            ],
        );
        let mut local = LocalNet::new(&d.nets[0]);
        assert_eq!(local.pre_route(&d.layers, 0, 0.1), RouteStatus::FailDetachedGuide);

        let config = DetailedRoutingConfig::default();
        let setting = IterSetting {
            iter: 0,
            guide_expand: 0,
            wrong_way_density: 0.5,
            last_iter: false,
        };
        let status = local.pre_route_iterative(&d.layers, &setting, config.guide_expand_iter_limit);
        assert!(status.is_succ());
        assert!(local.est_vertices >= 0);
    }
}
