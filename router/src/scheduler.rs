use crate::single_net::LocalNet;
use crate::status::RouteStatus;
use dr_common::geom::{BoxOnLayer, SpatialIndex};
use dr_common::tech::LayerList;
use dr_common::util::config::DetailedRoutingConfig;

/// Route guides grown by half the layer's safe margin. Two nets whose padded guides
/// stay apart cannot see each other's metal in any cost query.
pub fn padded_guides(layers: &LayerList, local: &LocalNet) -> Vec<BoxOnLayer> {
    local
        .route_guides
        .iter()
        .filter(|g| g.rect.is_valid())
        .map(|g| BoxOnLayer::new(g.layer, g.rect.expand(layers.layers[g.layer].safe_margin / 2)))
        .collect()
}

struct Batch {
    nets: Vec<usize>,
    index: Vec<SpatialIndex<()>>,
}

impl Batch {
    fn new(num_layers: usize) -> Self {
        Self {
            nets: Vec::new(),
            index: (0..num_layers).map(|_| SpatialIndex::new()).collect(),
        }
    }

    fn admits(&self, boxes: &[BoxOnLayer]) -> bool {
        boxes.iter().all(|b| self.index[b.layer].query(&b.rect).next().is_none())
    }

    fn admit(&mut self, net: usize, boxes: &[BoxOnLayer]) {
        for b in boxes {
            self.index[b.layer].insert(b.rect, ());
        }
        self.nets.push(net);
    }
}

/// Splits the routable nets of `locals` into batches of spatially independent nets.
/// Returned values index into `locals`; nets that failed pre-route or have a single
/// pin are left out. Without worker threads every net forms its own batch.
pub fn schedule(locals: &[LocalNet], layers: &LayerList, config: &DetailedRoutingConfig) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..locals.len())
        .filter(|&i| locals[i].status.is_succ() && locals[i].status != RouteStatus::SuccOnePin)
        .collect();
    order.sort_by_key(|&i| std::cmp::Reverse(locals[i].est_vertices));

    let mut batches: Vec<Vec<usize>> = if config.num_threads == 0 {
        order.iter().map(|&i| vec![i]).collect()
    } else {
        greedy_batches(locals, layers, config, &order)
    };

    if config.schedule_sort_within_batch {
        for batch in &mut batches {
            batch.sort_by_key(|&i| std::cmp::Reverse(locals[i].est_vertices));
        }
    }
    if config.schedule_reverse {
        batches.reverse();
    }
    batches
}

fn greedy_batches(
    locals: &[LocalNet],
    layers: &LayerList,
    config: &DetailedRoutingConfig,
    order: &[usize],
) -> Vec<Vec<usize>> {
    let boxes: Vec<Vec<BoxOnLayer>> = locals.iter().map(|l| padded_guides(layers, l)).collect();
    let mut assigned = vec![false; locals.len()];
    let mut left = order.len();
    let mut batches: Vec<Batch> = Vec::new();

    while left > 0 {
        let mut batch = Batch::new(layers.num_layers());
        for &i in order {
            if !assigned[i] && batch.admits(&boxes[i]) {
                batch.admit(i, &boxes[i]);
                assigned[i] = true;
                left -= 1;
            }
        }
        batches.push(batch);
    }

    if config.schedule_assign_back_ratio > 0.0 {
        assign_back(&mut batches, &boxes, config.schedule_assign_back_ratio);
    }

    log::debug!("Scheduled {} nets into {} batches", order.len(), batches.len());
    batches.into_iter().map(|b| b.nets).filter(|b| !b.is_empty()).collect()
}

/// Moves nets of the small trailing batches into the earliest earlier batch that
/// still admits them.
fn assign_back(batches: &mut [Batch], boxes: &[Vec<BoxOnLayer>], ratio: f64) {
    let Some(largest) = batches.iter().map(|b| b.nets.len()).max() else {
        return;
    };
    let threshold = largest as f64 * ratio;
    for b in (1..batches.len()).rev() {
        if batches[b].nets.len() as f64 >= threshold {
            break;
        }
        let nets = std::mem::take(&mut batches[b].nets);
        let mut stay = Vec::new();
        for i in nets {
            match (0..b).find(|&t| batches[t].admits(&boxes[i])) {
                Some(t) => batches[t].admit(i, &boxes[i]),
                None => stay.push(i),
            }
        }
        batches[b].nets = stay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_common::db::{Design, DesignDescription, NetDescription, PinDescription};
    use dr_common::geom::Rect;
    use dr_common::util::generator::demo_tech;

    fn locals(guides: &[Rect]) -> (Design, Vec<LocalNet>) {
        let nets = guides
            .iter()
            .enumerate()
            .map(|(i, g)| NetDescription {
                name: format!("n{}", i),
                pins: vec![
                    PinDescription {
                        name: String::new(),
                        boxes: vec![BoxOnLayer::new(1, Rect::new(g.x.low, g.y.low, g.x.low, g.y.low))],
                    },
                    PinDescription {
                        name: String::new(),
                        boxes: vec![BoxOnLayer::new(1, Rect::new(g.x.high, g.y.high, g.x.high, g.y.high))],
                    },
                ],
                guides: vec![BoxOnLayer::new(1, *g)],
            })
            .collect();
        let desc = DesignDescription {
            name: "sched".to_string(),
            tech: demo_tech(3, 40),
            nets,
            obstacles: vec![],
        };
        let design = Design::from_description(&desc).unwrap();
        let locals = design
            .nets
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let mut l = LocalNet::new(n);
                l.est_vertices = 100 - i as i64;
                l
            })
            .collect();
        (design, locals)
    }

    fn parallel() -> DetailedRoutingConfig {
        DetailedRoutingConfig {
            num_threads: 4,
            ..DetailedRoutingConfig::default()
        }
    }

    #[test]
    fn batches_never_mix_overlapping_guides() {
        let (design, locals) = locals(&[
            Rect::new(100, 100, 100, 1900),
            Rect::new(300, 100, 300, 1900),
            Rect::new(4100, 100, 4100, 1900),
            Rect::new(100, 6100, 100, 7900),
            Rect::new(4100, 6100, 4300, 7900),
        ]);
        let batches = schedule(&locals, &design.layers, &parallel());

        let mut seen: Vec<usize> = batches.iter().flatten().copied().collect();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);

        for batch in &batches {
            for (k, &a) in batch.iter().enumerate() {
                for &b in &batch[k + 1..] {
                    let ga = padded_guides(&design.layers, &locals[a]);
                    let gb = padded_guides(&design.layers, &locals[b]);
                    for x in &ga {
                        for y in &gb {
                            assert!(x.layer != y.layer || !x.rect.overlaps(&y.rect), "{} and {}", a, b);
                        }
                    }
                }
            }
        }
        // The two neighbouring runs on the left cannot share a batch.
        assert!(batches.len() >= 2);
        assert_eq!(batches[0][0], 0);
    }

    #[test]
    fn sequential_mode_schedules_one_net_at_a_time() {
        let (design, mut locals) = locals(&[Rect::new(100, 100, 100, 1900), Rect::new(4100, 100, 4100, 1900)]);
        locals[1].est_vertices = 500;
        let batches = schedule(&locals, &design.layers, &DetailedRoutingConfig::default());
        assert_eq!(batches, vec![vec![1], vec![0]]);
    }

    #[test]
    fn failed_and_single_pin_nets_are_skipped() {
        let (design, mut locals) = locals(&[
            Rect::new(100, 100, 100, 1900),
            Rect::new(4100, 100, 4100, 1900),
            Rect::new(100, 6100, 100, 7900),
        ]);
        locals[0].status = RouteStatus::FailDetachedGuide;
        locals[2].status = RouteStatus::SuccOnePin;
        let batches = schedule(&locals, &design.layers, &parallel());
        assert_eq!(batches, vec![vec![1]]);
    }

    #[test]
    fn reverse_flips_batch_order() {
        let (design, locals) = locals(&[Rect::new(100, 100, 100, 1900), Rect::new(300, 100, 300, 1900)]);
        let config = DetailedRoutingConfig {
            schedule_reverse: true,
            ..parallel()
        };
        let batches = schedule(&locals, &design.layers, &config);
        assert_eq!(batches, vec![vec![1], vec![0]]);
    }
}
