use crate::grid::{GridStats, RouteGrid};
use crate::scheduler;
use crate::single_net::{IterSetting, LocalNet, SingleNetRouter, clear_topo, topo_vio_cost};
use crate::status::{RouteStat, RouteStatus};
use dr_common::db::Design;
use dr_common::util::config::DetailedRoutingConfig;
use dr_common::util::profiler::{Phase, PhaseTimes, ScopedTimer};
use rayon::prelude::*;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Outcome of a detailed routing run. Topologies are written back into the design.
#[derive(Clone, Debug)]
pub struct RouteSummary {
    pub status: Vec<RouteStatus>,
    pub min_area_vio: Vec<usize>,
    pub iterations: usize,
    pub stats: GridStats,
    pub score: f64,
}

impl RouteSummary {
    pub fn num_failed(&self) -> usize {
        self.status.iter().filter(|s| !s.is_succ()).count()
    }
}

fn progress_tick(progress: &AtomicUsize, total: usize, tag: &str) {
    let p = progress.fetch_add(1, Ordering::Relaxed) + 1;
    if p.is_multiple_of(100) || p == total {
        eprint!("\r\x1b[36m[{}] {}/{}\x1b[0m\x1b[K", tag, p, total);
        let _ = std::io::stderr().flush();
    }
}

/// Violation cost discount of iteration `iter`, rising linearly to 1 at the last one.
pub fn vio_cost_discount(config: &DetailedRoutingConfig, iter: usize) -> f64 {
    let init = config.rrr_init_vio_cost_discount;
    if config.rrr_iter_limit <= 1 {
        return init;
    }
    init + (1.0 - init) / (config.rrr_iter_limit - 1) as f64 * iter as f64
}

/// Rip-up and reroute. Iteration 0 routes every net; each later one reroutes only
/// the nets still failing or in violation, after charging history on the violated
/// resources. `on_iter` sees the design after every iteration.
pub fn run(
    design: &mut Design,
    config: &DetailedRoutingConfig,
    mut on_iter: impl FnMut(usize, &Design, &[RouteStatus]),
) -> Result<RouteSummary, String> {
    log::info!("Starting Detailed Routing...");
    let _timer = ScopedTimer::new("Detailed routing");

    let fixed = design.fixed_metals();
    let mut grid = RouteGrid::new(&design.layers, config);
    grid.mark_fixed_metals(&fixed);

    let stat = RouteStat::new(config.warn_cap);
    let mut locals: Vec<LocalNet> = design
        .nets
        .iter()
        .map(|n| {
            let mut l = LocalNet::new(n);
            l.status = RouteStatus::FailUnprocessed;
            l
        })
        .collect();
    let mut iterations = 0;
    let mut times = PhaseTimes::new();

    for iter in 0..config.rrr_iter_limit {
        let start = Instant::now();
        stat.clear();

        let selected: Vec<usize> = if iter == 0 {
            (0..locals.len()).collect()
        } else {
            (0..locals.len())
                .into_par_iter()
                .filter(|&i| {
                    let l = &locals[i];
                    !l.status.is_succ() || l.min_area_vio > 0 || topo_vio_cost(&grid, &l.topo, l.id) > 0.0
                })
                .collect()
        };
        if selected.is_empty() {
            log::info!("Converged at iter {}!", iter);
            break;
        }
        iterations = iter + 1;

        times.time(Phase::History, || {
            if iter > 0 {
                grid.add_hist_cost();
                grid.fade_hist_cost();
                selected
                    .par_iter()
                    .for_each(|&i| clear_topo(&grid, &locals[i].topo, locals[i].id));
            }
            grid.set_unit_vio_cost(vio_cost_discount(config, iter));
        });

        let setting = IterSetting::new(config, iter);
        log::info!(
            "Iter {}: {} nets, guide expand {}, wrong-way density {:.2}",
            iter,
            selected.len(),
            setting.guide_expand,
            setting.wrong_way_density
        );
        let router = SingleNetRouter::new(&grid, config, setting, &stat);

        let total = selected.len();
        let progress = AtomicUsize::new(0);
        let tag = format!("DR Pre {}", iter);
        let pre: Vec<LocalNet> = times.time(Phase::PreRoute, || {
            selected
                .par_iter()
                .map(|&i| {
                    let local = router.pre_route(&design.nets[i]);
                    progress_tick(&progress, total, &tag);
                    local
                })
                .collect()
        });
        eprint!("\r\x1b[K");

        let batches = times.time(Phase::Schedule, || scheduler::schedule(&pre, &design.layers, config));
        let mut work: Vec<Option<LocalNet>> = pre.into_iter().map(Some).collect();
        log::debug!("Iter {}: {} batches", iter, batches.len());

        let routed = AtomicUsize::new(0);
        let num_routed: usize = batches.iter().map(Vec::len).sum();
        let tag = format!("DR Iter {}", iter);
        for batch in &batches {
            let mut taken: Vec<(usize, LocalNet)> = batch
                .iter()
                .filter_map(|&k| work[k].take().map(|l| (k, l)))
                .collect();
            times.time(Phase::MazeRoute, || {
                taken.par_iter_mut().for_each(|(_, local)| {
                    router.route(local);
                    progress_tick(&routed, num_routed, &tag);
                });
            });
            times.time(Phase::Commit, || {
                taken
                    .par_iter()
                    .filter(|(_, local)| local.status.is_succ())
                    .for_each(|(_, local)| router.commit(local));
            });
            for (k, local) in taken {
                work[k] = Some(local);
            }
        }
        eprint!("\r\x1b[K");

        for (k, local) in work.into_iter().enumerate() {
            if let Some(local) = local {
                let i = selected[k];
                design.nets[i].topo = local.topo.clone();
                locals[i] = local;
            }
        }

        stat.log_summary();
        let stats = grid.stats();
        stats.log();
        log::info!(
            "Iter {} done in {:.2}s: {}, score {:.1}",
            iter,
            start.elapsed().as_secs_f32(),
            stats,
            stats.score(config)
        );

        let status: Vec<RouteStatus> = locals.iter().map(|l| l.status).collect();
        on_iter(iter, design, &status);
    }

    log::info!("Time per phase over {} iterations:", iterations);
    times.log_summary();

    let stats = grid.stats();
    let score = stats.score(config);
    Ok(RouteSummary {
        status: locals.iter().map(|l| l.status).collect(),
        min_area_vio: locals.iter().map(|l| l.min_area_vio).collect(),
        iterations,
        stats,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discount_reaches_one_on_last_iteration() {
        let config = DetailedRoutingConfig::default();
        assert_eq!(vio_cost_discount(&config, 0), config.rrr_init_vio_cost_discount);
        let last = vio_cost_discount(&config, config.rrr_iter_limit - 1);
        assert!((last - 1.0).abs() < 1e-9);

        let single = DetailedRoutingConfig {
            rrr_iter_limit: 1,
            ..DetailedRoutingConfig::default()
        };
        assert_eq!(vio_cost_discount(&single, 0), single.rrr_init_vio_cost_discount);
    }
}
