use std::fmt;
use std::ops::{BitAnd, BitAndAssign};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Outcome of routing one net. Failures never abort the run; the net is simply
/// picked up again by the next rip-up and reroute iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouteStatus {
    SuccNormal,
    SuccOnePin,
    SuccDetachedPinFixed,
    SuccConnExtPin,
    FailUnprocessed,
    FailPinOutOfGrid,
    FailDetachedGuide,
    FailDetachedPin,
    FailDisconnectedGridGraph,
    FailConnExtPin,
}

impl RouteStatus {
    pub const ALL: [RouteStatus; 10] = [
        RouteStatus::SuccNormal,
        RouteStatus::SuccOnePin,
        RouteStatus::SuccDetachedPinFixed,
        RouteStatus::SuccConnExtPin,
        RouteStatus::FailUnprocessed,
        RouteStatus::FailPinOutOfGrid,
        RouteStatus::FailDetachedGuide,
        RouteStatus::FailDetachedPin,
        RouteStatus::FailDisconnectedGridGraph,
        RouteStatus::FailConnExtPin,
    ];

    pub fn is_succ(self) -> bool {
        matches!(
            self,
            RouteStatus::SuccNormal
                | RouteStatus::SuccOnePin
                | RouteStatus::SuccDetachedPinFixed
                | RouteStatus::SuccConnExtPin
        )
    }

    pub fn description(self) -> &'static str {
        match self {
            RouteStatus::SuccNormal => "routed",
            RouteStatus::SuccOnePin => "fewer than two pins, nothing to route",
            RouteStatus::SuccDetachedPinFixed => "a pin away from every route guide was reached by extending a guide",
            RouteStatus::SuccConnExtPin => "an off-grid pin was linked to its tap",
            RouteStatus::FailUnprocessed => "not routed yet",
            RouteStatus::FailPinOutOfGrid => "a pin covers no track/cross-point",
            RouteStatus::FailDetachedGuide => "route guides stay disconnected after the expansion limit",
            RouteStatus::FailDetachedPin => "a pin cannot be reached from any route guide",
            RouteStatus::FailDisconnectedGridGraph => "the search frontier ran out before every pin was reached",
            RouteStatus::FailConnExtPin => "an off-grid pin could not be linked to its tap",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RouteStatus::SuccNormal => "SUCC_NORMAL",
            RouteStatus::SuccOnePin => "SUCC_ONE_PIN",
            RouteStatus::SuccDetachedPinFixed => "SUCC_DETACHED_PIN_FIXED",
            RouteStatus::SuccConnExtPin => "SUCC_CONN_EXT_PIN",
            RouteStatus::FailUnprocessed => "FAIL_UNPROCESSED",
            RouteStatus::FailPinOutOfGrid => "FAIL_PIN_OUT_OF_GRID",
            RouteStatus::FailDetachedGuide => "FAIL_DETACHED_GUIDE",
            RouteStatus::FailDetachedPin => "FAIL_DETACHED_PIN",
            RouteStatus::FailDisconnectedGridGraph => "FAIL_DISCONNECTED_GRID_GRAPH",
            RouteStatus::FailConnExtPin => "FAIL_CONN_EXT_PIN",
        };
        f.write_str(name)
    }
}

/// Worst status wins: the first failure sticks, otherwise the first special success.
impl BitAnd for RouteStatus {
    type Output = RouteStatus;

    fn bitand(self, rhs: RouteStatus) -> RouteStatus {
        if !self.is_succ() {
            self
        } else if !rhs.is_succ() || self == RouteStatus::SuccNormal {
            rhs
        } else {
            self
        }
    }
}

impl BitAndAssign for RouteStatus {
    fn bitand_assign(&mut self, rhs: RouteStatus) {
        *self = *self & rhs;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Pre,
    Maze,
    PostMaze,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Pre, Stage::Maze, Stage::PostMaze];

    fn name(self) -> &'static str {
        match self {
            Stage::Pre => "PRE",
            Stage::Maze => "MAZE",
            Stage::PostMaze => "POST_MAZE",
        }
    }
}

/// Side events counted while post-processing a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MiscEvent {
    MinAreaVio,
    MinAreaShadowedVio,
    RemoveTrackSwitchPin,
    RemoveTrackSwitchNormal,
    FixDetachedPin,
}

impl MiscEvent {
    pub const ALL: [MiscEvent; 5] = [
        MiscEvent::MinAreaVio,
        MiscEvent::MinAreaShadowedVio,
        MiscEvent::RemoveTrackSwitchPin,
        MiscEvent::RemoveTrackSwitchNormal,
        MiscEvent::FixDetachedPin,
    ];

    fn name(self) -> &'static str {
        match self {
            MiscEvent::MinAreaVio => "MIN_AREA_VIO",
            MiscEvent::MinAreaShadowedVio => "MIN_AREA_SHADOWED_VIO",
            MiscEvent::RemoveTrackSwitchPin => "REMOVE_TRACK_SWITCH_PIN",
            MiscEvent::RemoveTrackSwitchNormal => "REMOVE_TRACK_SWITCH_NORMAL",
            MiscEvent::FixDetachedPin => "FIX_DETACHED_PIN",
        }
    }
}

const NUM_STATUS: usize = RouteStatus::ALL.len();
const NUM_STAGE: usize = Stage::ALL.len();
const NUM_MISC: usize = MiscEvent::ALL.len();

/// Per-iteration counters, shared by every worker.
pub struct RouteStat {
    status: [[AtomicUsize; NUM_STATUS]; NUM_STAGE],
    misc: [[AtomicUsize; NUM_MISC]; NUM_STAGE],
    warnings: [AtomicUsize; NUM_STATUS],
    warn_cap: usize,
}

impl RouteStat {
    pub fn new(warn_cap: usize) -> Self {
        Self {
            status: std::array::from_fn(|_| std::array::from_fn(|_| AtomicUsize::new(0))),
            misc: std::array::from_fn(|_| std::array::from_fn(|_| AtomicUsize::new(0))),
            warnings: std::array::from_fn(|_| AtomicUsize::new(0)),
            warn_cap,
        }
    }

    /// Resets the counters. Warning budgets are kept for the whole run.
    pub fn clear(&self) {
        for row in &self.status {
            for c in row {
                c.store(0, Ordering::Relaxed);
            }
        }
        for row in &self.misc {
            for c in row {
                c.store(0, Ordering::Relaxed);
            }
        }
    }

    pub fn record(&self, stage: Stage, status: RouteStatus, net_name: &str) {
        self.status[stage as usize][status.index()].fetch_add(1, Ordering::Relaxed);
        if matches!(status, RouteStatus::SuccNormal | RouteStatus::SuccOnePin) {
            return;
        }
        let seen = self.warnings[status.index()].fetch_add(1, Ordering::Relaxed) + 1;
        if seen <= self.warn_cap {
            log::warn!("Net {}: {} ({})", net_name, status, status.description());
        }
        if seen == self.warn_cap {
            log::warn!("More warnings on {} will be suppressed", status);
        }
    }

    pub fn increment(&self, stage: Stage, event: MiscEvent, n: usize) {
        self.misc[stage as usize][event as usize].fetch_add(n, Ordering::Relaxed);
    }

    pub fn count(&self, stage: Stage, status: RouteStatus) -> usize {
        self.status[stage as usize][status.index()].load(Ordering::Relaxed)
    }

    pub fn misc(&self, stage: Stage, event: MiscEvent) -> usize {
        self.misc[stage as usize][event as usize].load(Ordering::Relaxed)
    }

    pub fn log_summary(&self) {
        for stage in Stage::ALL {
            let mut succ = 0;
            let mut fail = 0;
            let mut details = Vec::new();
            for status in RouteStatus::ALL {
                let n = self.count(stage, status);
                if n == 0 {
                    continue;
                }
                if status.is_succ() {
                    succ += n;
                } else {
                    fail += n;
                }
                details.push(format!("{}={}", status, n));
            }
            for event in MiscEvent::ALL {
                let n = self.misc(stage, event);
                if n > 0 {
                    details.push(format!("{}={}", event.name(), n));
                }
            }
            if succ + fail == 0 && details.is_empty() {
                continue;
            }
            log::info!(
                "{:<9} #succ={} #fail={} {}",
                stage.name(),
                succ,
                fail,
                details.join(", ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_first_failure() {
        use RouteStatus::*;
        assert_eq!(SuccNormal & SuccNormal, SuccNormal);
        assert_eq!(SuccNormal & SuccDetachedPinFixed, SuccDetachedPinFixed);
        assert_eq!(SuccDetachedPinFixed & SuccOnePin, SuccDetachedPinFixed);
        assert_eq!(SuccDetachedPinFixed & FailDetachedGuide, FailDetachedGuide);
        assert_eq!(FailPinOutOfGrid & FailDetachedPin, FailPinOutOfGrid);
        assert_eq!(FailPinOutOfGrid & SuccNormal, FailPinOutOfGrid);
        let mut s = SuccNormal;
        s &= FailDisconnectedGridGraph;
        assert!(!s.is_succ());
    }

    #[test]
    fn display_uses_upper_snake_case() {
        assert_eq!(RouteStatus::FailDisconnectedGridGraph.to_string(), "FAIL_DISCONNECTED_GRID_GRAPH");
        assert_eq!(RouteStatus::SuccOnePin.to_string(), "SUCC_ONE_PIN");
    }

    #[test]
    fn counters_reset_between_iterations() {
        let stat = RouteStat::new(1);
        stat.record(Stage::Pre, RouteStatus::FailDetachedPin, "a");
        stat.record(Stage::Pre, RouteStatus::FailDetachedPin, "b");
        stat.increment(Stage::PostMaze, MiscEvent::MinAreaVio, 3);
        assert_eq!(stat.count(Stage::Pre, RouteStatus::FailDetachedPin), 2);
        assert_eq!(stat.misc(Stage::PostMaze, MiscEvent::MinAreaVio), 3);
        stat.clear();
        assert_eq!(stat.count(Stage::Pre, RouteStatus::FailDetachedPin), 0);
        assert_eq!(stat.misc(Stage::PostMaze, MiscEvent::MinAreaVio), 0);
    }
}
