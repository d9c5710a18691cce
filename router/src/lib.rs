pub mod detailed_router;
pub mod grid;
pub mod report;
pub mod scheduler;
pub mod single_net;
pub mod status;

pub use detailed_router::RouteSummary;

use dr_common::db::Design;
use dr_common::util::config::Config;
use std::path::Path;

/// Routes every net of `design` in place. With `write_each_iter` set, a report is
/// written after each iteration next to the output file.
pub fn route(design: &mut Design, config: &Config) -> Result<RouteSummary, String> {
    let dr = &config.detailed_routing;
    let output = config.input.output_file.clone();
    let write_each_iter = dr.write_each_iter;
    let on_iter = move |iter: usize, design: &Design, status: &[status::RouteStatus]| {
        if !write_each_iter {
            return;
        }
        let path = format!("{}.iter{}", output, iter);
        if let Err(e) = report::save_report(Path::new(&path), design, status, None) {
            log::warn!("Failed to write {}: {}", path, e);
        }
    };

    if dr.num_threads == 0 {
        return detailed_router::run(design, dr, on_iter);
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(dr.num_threads)
        .build()
        .map_err(|e| format!("Failed to build thread pool: {}", e))?;
    log::info!("Routing with {} threads", dr.num_threads);
    pool.install(|| detailed_router::run(design, dr, on_iter))
}
