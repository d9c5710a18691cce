//! Routing of one net inside its route guides: guide repair, graph construction,
//! multi-terminal maze search, tree clean-up and commit to the shared grid.

mod commit;
mod graph;
mod graph_builder;
mod guide_graph;
mod local_net;
mod maze;
mod post_maze;
mod pre_route;

pub use commit::{clear_topo, commit_topo, topo_vio_cost};
pub use graph::{Dir, GridGraph};
pub use graph_builder::wrong_way_cps;
pub use guide_graph::GuideGraph;
pub use local_net::LocalNet;

use crate::grid::RoutingGrid;
use crate::status::{MiscEvent, RouteStat, RouteStatus, Stage};
use dr_common::db::Net;
use dr_common::util::config::DetailedRoutingConfig;

/// Knobs that change from one rip-up and reroute iteration to the next.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IterSetting {
    pub iter: usize,
    /// Guide expansion in pitches for the first pre-route attempt.
    pub guide_expand: i32,
    pub wrong_way_density: f64,
    pub last_iter: bool,
}

impl IterSetting {
    pub fn new(config: &DetailedRoutingConfig, iter: usize) -> Self {
        let mut guide_expand = config.default_guide_expand;
        for i in 1..=iter {
            guide_expand += 2 * i as i32;
        }
        Self {
            iter,
            guide_expand,
            wrong_way_density: (config.wrong_way_point_density + 0.1 * iter as f64).min(1.0),
            last_iter: iter + 1 >= config.rrr_iter_limit,
        }
    }
}

/// Routes nets one at a time against a shared grid. Holds no per-net state, so
/// one instance serves every worker of a batch.
pub struct SingleNetRouter<'a, G: RoutingGrid> {
    grid: &'a G,
    config: &'a DetailedRoutingConfig,
    setting: IterSetting,
    stat: &'a RouteStat,
}

impl<'a, G: RoutingGrid> SingleNetRouter<'a, G> {
    pub fn new(grid: &'a G, config: &'a DetailedRoutingConfig, setting: IterSetting, stat: &'a RouteStat) -> Self {
        Self {
            grid,
            config,
            setting,
            stat,
        }
    }

    pub fn setting(&self) -> &IterSetting {
        &self.setting
    }

    /// Expands and repairs the guides of `net`, retrying with wider expansion while
    /// the guides stay disconnected.
    pub fn pre_route(&self, net: &Net) -> LocalNet {
        let mut local = LocalNet::new(net);
        let status = local.pre_route_iterative(self.grid.layers(), &self.setting, self.config.guide_expand_iter_limit);
        local.status &= status;
        self.stat.record(Stage::Pre, status, &local.name);
        local
    }

    /// Maze routes a pre-routed net and cleans up the tree. Touches no grid state.
    pub fn route(&self, local: &mut LocalNet) {
        if !local.status.is_succ() || local.status == RouteStatus::SuccOnePin {
            return;
        }
        let graph = graph_builder::build(local, self.grid, self.config, &self.setting);
        let detached = graph.num_fake_only_pins();
        if detached > 0 {
            self.stat.increment(Stage::Maze, MiscEvent::FixDetachedPin, detached);
        }

        let status = match maze::route(&graph, self.grid, local.id) {
            Ok(topo) => {
                local.topo = topo;
                RouteStatus::SuccNormal
            }
            Err(status) => status,
        };
        local.status &= status;
        self.stat.record(Stage::Maze, status, &local.name);
        if !status.is_succ() {
            return;
        }

        post_maze::run(local, self.grid, &self.setting, self.stat);
        self.stat.record(Stage::PostMaze, RouteStatus::SuccNormal, &local.name);
    }

    /// Marks every edge and extension of the routed tree as used.
    pub fn commit(&self, local: &LocalNet) {
        commit_topo(self.grid, &local.topo, local.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_widens_search() {
        let config = DetailedRoutingConfig::default();
        let first = IterSetting::new(&config, 0);
        assert_eq!(first.guide_expand, config.default_guide_expand);
        assert!(!first.last_iter);

        let third = IterSetting::new(&config, 2);
        assert_eq!(third.guide_expand, config.default_guide_expand + 2 + 4);
        assert!((third.wrong_way_density - (config.wrong_way_point_density + 0.2)).abs() < 1e-12);

        let last = IterSetting::new(&config, config.rrr_iter_limit - 1);
        assert!(last.last_iter);
        assert!(IterSetting::new(&config, 40).wrong_way_density <= 1.0);
    }
}
