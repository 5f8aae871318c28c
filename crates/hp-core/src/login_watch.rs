//! Login watch: wait for a user to log in and react.
//!
//! The watch owns a single watermark timestamp. A login record counts as
//! new when its login time is strictly after the watermark. After a tick in
//! which at least one new login was seen, the watermark moves to the wall
//! clock time of that tick, so a session that stays logged in never fires
//! twice. The watermark never moves backwards.
//!
//! Two logins of the same user that land in one interval both fire; a login
//! stamped between the start of a tick and the clock reading it ends with
//! can be missed.

use crate::collect::{EvidenceSource, LoginRecord};
use crate::logging::event_names;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Poll interval used when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Whose logins trigger the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetUser {
    /// Any user (`*` on the command line).
    Any,
    Named(String),
}

impl TargetUser {
    pub fn parse(name: &str) -> Self {
        if name == "*" {
            TargetUser::Any
        } else {
            TargetUser::Named(name.to_string())
        }
    }

    pub fn matches(&self, user: &str) -> bool {
        match self {
            TargetUser::Any => true,
            TargetUser::Named(name) => name == user,
        }
    }
}

impl std::fmt::Display for TargetUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetUser::Any => write!(f, "*"),
            TargetUser::Named(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    /// Constructed, no tick yet.
    Idle,
    /// At least one tick processed.
    Polling,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickOutcome {
    pub matched: usize,
    pub callback_failures: usize,
    pub watermark: DateTime<Utc>,
}

/// Counters for a whole watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSummary {
    pub target: TargetUser,
    pub ticks: u64,
    pub matches: u64,
    pub callback_failures: u64,
    pub source_failures: u64,
    pub started_at: DateTime<Utc>,
    pub watermark: DateTime<Utc>,
}

/// Cooperative stop signal shared between a watch and its controller.
///
/// Cloning yields a handle to the same signal.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every waiter.
    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner()) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep up to `timeout`; returns early with `true` once cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

/// State machine for one login watch.
#[derive(Debug, Clone)]
pub struct LoginWatch {
    target: TargetUser,
    interval: Duration,
    state: WatchState,
    started_at: DateTime<Utc>,
    watermark: DateTime<Utc>,
    ticks: u64,
    matches: u64,
    callback_failures: u64,
    source_failures: u64,
}

impl LoginWatch {
    /// Watch starting now.
    pub fn new(target: TargetUser, interval: Duration) -> Self {
        Self::starting_at(target, interval, Utc::now())
    }

    /// Watch whose initial watermark is `start`.
    pub fn starting_at(target: TargetUser, interval: Duration, start: DateTime<Utc>) -> Self {
        Self {
            target,
            interval,
            state: WatchState::Idle,
            started_at: start,
            watermark: start,
            ticks: 0,
            matches: 0,
            callback_failures: 0,
            source_failures: 0,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn target(&self) -> &TargetUser {
        &self.target
    }

    /// Process one login snapshot taken at `now`.
    ///
    /// `on_match` runs once per new matching record. Callback errors are
    /// logged and counted; they neither stop the tick nor hold back the
    /// watermark.
    pub fn tick<F>(&mut self, records: &[LoginRecord], now: DateTime<Utc>, on_match: &mut F) -> TickOutcome
    where
        F: FnMut(&LoginRecord) -> hp_common::Result<()>,
    {
        self.state = WatchState::Polling;
        self.ticks += 1;

        let watermark = self.watermark;
        let mut matched = 0usize;
        let mut callback_failures = 0usize;

        for record in records
            .iter()
            .filter(|r| r.login_time > watermark && self.target.matches(&r.user))
        {
            matched += 1;
            info!(
                event = event_names::WATCH_MATCH,
                user = %record.user,
                line = %record.line,
                host = %record.host,
                login_time = %record.login_time.to_rfc3339(),
                "login observed"
            );
            if let Err(e) = on_match(record) {
                callback_failures += 1;
                warn!(
                    event = event_names::WATCH_CALLBACK_FAILED,
                    user = %record.user,
                    error = %e,
                    "login callback failed"
                );
            }
        }

        if matched > 0 && now > self.watermark {
            self.watermark = now;
        }
        self.matches += matched as u64;
        self.callback_failures += callback_failures as u64;

        debug!(
            event = event_names::WATCH_TICK,
            tick = self.ticks,
            matched,
            watermark = %self.watermark.to_rfc3339(),
            "watch tick"
        );

        TickOutcome {
            matched,
            callback_failures,
            watermark: self.watermark,
        }
    }

    /// Poll `source` every interval until `cancel` fires.
    ///
    /// Blocks the calling thread. The first poll happens one interval after
    /// the call.
    pub fn run<S, F>(&mut self, source: &S, cancel: &CancellationToken, on_match: F) -> WatchSummary
    where
        S: EvidenceSource + ?Sized,
        F: FnMut(&LoginRecord) -> hp_common::Result<()>,
    {
        self.run_with_clock(source, cancel, Utc::now, on_match)
    }

    /// [`LoginWatch::run`] with an injectable clock.
    pub fn run_with_clock<S, C, F>(
        &mut self,
        source: &S,
        cancel: &CancellationToken,
        mut clock: C,
        mut on_match: F,
    ) -> WatchSummary
    where
        S: EvidenceSource + ?Sized,
        C: FnMut() -> DateTime<Utc>,
        F: FnMut(&LoginRecord) -> hp_common::Result<()>,
    {
        info!(
            event = event_names::WATCH_STARTED,
            target = %self.target,
            interval_ms = self.interval.as_millis() as u64,
            "login watch started"
        );

        while !cancel.wait_timeout(self.interval) {
            let records = match source.list_login_records() {
                Ok(records) => records,
                Err(e) => {
                    self.source_failures += 1;
                    warn!(
                        event = event_names::SOURCE_FAILED,
                        source = "login_records",
                        error = %e,
                        "login snapshot failed; treating tick as empty"
                    );
                    Vec::new()
                }
            };
            self.tick(&records, clock(), &mut on_match);
        }

        let summary = self.summary();
        info!(
            event = event_names::WATCH_STOPPED,
            ticks = summary.ticks,
            matches = summary.matches,
            callback_failures = summary.callback_failures,
            "login watch stopped"
        );
        summary
    }

    pub fn summary(&self) -> WatchSummary {
        WatchSummary {
            target: self.target.clone(),
            ticks: self.ticks,
            matches: self.matches,
            callback_failures: self.callback_failures,
            source_failures: self.source_failures,
            started_at: self.started_at,
            watermark: self.watermark,
        }
    }
}
