use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::command::{write_batch, Command};
use crate::error::Result;
use crate::heuristic::{BotProfile, Heuristic};
use crate::logger;
use crate::settings::Settings;
use crate::sleep;
use crate::snapshot::{read_snapshot, Snapshot};

/// Locations of the two shared files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgePaths {
    pub snapshot: PathBuf,
    pub commands: PathBuf,
}

impl Default for BridgePaths {
    fn default() -> Self {
        Settings::default().paths()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The batch replaced the command file.
    Wrote(usize),
    /// The batch was only logged.
    DryRun(usize),
    /// The heuristic had nothing to say; the command file was left alone.
    Idle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub writes: u64,
    pub dry_runs: u64,
    pub idle: u64,
    pub skipped: u64,
    pub elapsed: Duration,
}

/// The polling driver shared by every bot: read, decide, write, sleep.
pub struct BridgeLoop {
    paths: BridgePaths,
    profile: BotProfile,
    heuristic: Box<dyn Heuristic>,
    min_confidence: f64,
    jitter: bool,
    dry_run: bool,
    stale_after: Option<Duration>,
    last_seen: Option<String>,
}

impl BridgeLoop {
    pub fn new(paths: BridgePaths, profile: BotProfile, heuristic: Box<dyn Heuristic>) -> Self {
        Self {
            paths,
            profile,
            heuristic,
            min_confidence: 0.0,
            jitter: false,
            dry_run: false,
            stale_after: None,
            last_seen: None,
        }
    }

    /// Apply the loop-level knobs from settings.
    pub fn configured(self, settings: &Settings) -> Self {
        self.min_confidence(settings.min_confidence)
            .jitter(settings.jitter)
            .dry_run(settings.dry_run)
            .stale_after(settings.stale_after_secs.map(Duration::from_secs))
    }

    pub fn min_confidence(mut self, threshold: f64) -> Self {
        self.min_confidence = threshold;
        self
    }

    pub fn jitter(mut self, on: bool) -> Self {
        self.jitter = on;
        self
    }

    pub fn dry_run(mut self, on: bool) -> Self {
        self.dry_run = on;
        self
    }

    pub fn stale_after(mut self, limit: Option<Duration>) -> Self {
        self.stale_after = limit;
        self
    }

    pub fn profile(&self) -> &BotProfile {
        &self.profile
    }

    pub fn paths(&self) -> &BridgePaths {
        &self.paths
    }

    /// One-line summary of the most recent snapshot read.
    pub fn last_seen(&self) -> Option<&str> {
        self.last_seen.as_deref()
    }

    /// Run one iteration. A failed read is returned as is and nothing is
    /// written; the caller decides whether to go on.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        let snapshot = read_snapshot(&self.paths.snapshot)?;
        let mut line = snapshot.to_string();
        if let Some(age) = self.surface(&snapshot) {
            line.push_str(&format!("  [stale {}s]", age.as_secs()));
        }
        self.last_seen = Some(line);

        let view = snapshot.discounted(self.min_confidence);
        let batch = self.heuristic.decide(&view);
        if batch.is_empty() {
            return Ok(TickOutcome::Idle);
        }

        let tag = &self.profile.name;
        if self.dry_run {
            logger::info_p(tag, &format!("dry run: {}", describe(&batch)));
            return Ok(TickOutcome::DryRun(batch.len()));
        }
        write_batch(&self.paths.commands, &batch)?;
        logger::info_p(tag, &format!("wrote {}", describe(&batch)));
        Ok(TickOutcome::Wrote(batch.len()))
    }

    /// Tick until the profile's duration runs out or `stop` is raised.
    /// Missing or half-written snapshots and failed writes only skip a
    /// tick; permission errors end the run.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<RunSummary> {
        self.run_with(stop, |_, _| {})
    }

    /// Same as [`BridgeLoop::run`], handing every tick's result and the
    /// latest snapshot line to `observe`.
    pub fn run_with<F>(&mut self, stop: &AtomicBool, mut observe: F) -> Result<RunSummary>
    where
        F: FnMut(&Result<TickOutcome>, Option<&str>),
    {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        let tag = self.profile.name.clone();
        let budget = self.profile.duration;

        logger::info_p(&tag, &format!(
            "running every {:.1}s for {}",
            self.profile.interval.as_secs_f64(),
            budget.map_or_else(|| "ever".to_string(), |d| format!("{}s", d.as_secs())),
        ));

        loop {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            if budget.is_some_and(|limit| started.elapsed() >= limit) {
                break;
            }

            summary.ticks += 1;
            let result = self.tick();
            observe(&result, self.last_seen());
            match result {
                Ok(TickOutcome::Wrote(_)) => summary.writes += 1,
                Ok(TickOutcome::DryRun(_)) => summary.dry_runs += 1,
                Ok(TickOutcome::Idle) => summary.idle += 1,
                Err(e) if e.is_fatal() => {
                    logger::error_p(&tag, &e.to_string());
                    return Err(e);
                }
                Err(e) => {
                    summary.skipped += 1;
                    logger::warn_p(&tag, &format!("skipped tick: {}", e));
                }
            }

            let mut pause = if self.jitter { sleep::jittered(self.profile.interval) } else { self.profile.interval };
            if let Some(limit) = budget {
                pause = pause.min(limit.saturating_sub(started.elapsed()));
            }
            if sleep::sleep_unless(pause, stop) {
                break;
            }
        }

        summary.elapsed = started.elapsed();
        logger::info_p(&tag, &format!(
            "finished: {} tick(s), {} write(s), {} dry run(s), {} idle, {} skipped",
            summary.ticks, summary.writes, summary.dry_runs, summary.idle, summary.skipped,
        ));
        Ok(summary)
    }

    /// Log the producer's warnings. Returns the snapshot's age when it is
    /// older than the staleness limit.
    fn surface(&self, snapshot: &Snapshot) -> Option<Duration> {
        let tag = &self.profile.name;
        for w in &snapshot.warnings {
            logger::warn_p(tag, &format!("snapshot: {}", w));
        }
        let limit = self.stale_after?;
        let age = snapshot.age(Utc::now())?.to_std().ok()?;
        if age <= limit {
            return None;
        }
        logger::warn_p(tag, &format!("snapshot is {}s old", age.as_secs()));
        Some(age)
    }
}

impl Drop for BridgeLoop {
    fn drop(&mut self) {
        self.heuristic.stop();
    }
}

fn describe(batch: &[Command]) -> String {
    let parts: Vec<String> = batch.iter().map(|c| c.to_string()).collect();
    let total: u64 = batch.iter().map(|c| u64::from(c.delay_ms())).sum();
    format!("{} command(s) over {}ms: {}", batch.len(), total, parts.join(", "))
}
