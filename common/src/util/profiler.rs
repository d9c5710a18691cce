use std::time::{Duration, Instant};

/// Logs the wall time of a whole run when dropped.
pub struct ScopedTimer {
    name: &'static str,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        log::info!("{} took {:?}", self.name, self.start.elapsed());
    }
}

/// Stages of one rip-up and reroute iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    History,
    PreRoute,
    Schedule,
    MazeRoute,
    Commit,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::History,
        Phase::PreRoute,
        Phase::Schedule,
        Phase::MazeRoute,
        Phase::Commit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::History => "history",
            Phase::PreRoute => "pre-route",
            Phase::Schedule => "schedule",
            Phase::MazeRoute => "maze route",
            Phase::Commit => "commit",
        }
    }
}

/// Wall time per phase, summed over every iteration of a run.
#[derive(Clone, Debug, Default)]
pub struct PhaseTimes {
    totals: [Duration; Phase::ALL.len()],
}

impl PhaseTimes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` and charges its wall time to `phase`.
    pub fn time<T>(&mut self, phase: Phase, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.add(phase, start.elapsed());
        out
    }

    pub fn add(&mut self, phase: Phase, elapsed: Duration) {
        self.totals[phase as usize] += elapsed;
    }

    pub fn get(&self, phase: Phase) -> Duration {
        self.totals[phase as usize]
    }

    pub fn total(&self) -> Duration {
        self.totals.iter().sum()
    }

    pub fn log_summary(&self) {
        let total = self.total().as_secs_f64().max(f64::EPSILON);
        for phase in Phase::ALL {
            let secs = self.get(phase).as_secs_f64();
            log::info!(
                "  {:<10} {:>8.3}s ({:>4.1}%)",
                phase.name(),
                secs,
                100.0 * secs / total
            );
        }
    }
}
