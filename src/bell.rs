//! Virtual bell scheduler.
//!
//! A single-instance `Idle <-> Armed` state machine that watches the
//! calendar, fires a volatile bell event at each relevant period boundary,
//! and collects client acknowledgement latencies for telemetry. `start` and
//! `stop` are mutually exclusive; the timer handle is owned by one
//! background thread that re-arms itself after each firing.

use crate::store::ScheduleStore;
use crate::sync::SyncBroadcaster;
use crate::types::ScheduleDate;
use chrono::{DateTime, Utc};
use crossbeam_channel::{after, bounded, never, select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Bell scheduler configuration.
#[derive(Clone, Copy, Debug)]
pub struct BellConfig {
    /// How long after a firing acknowledgements are collected before the
    /// latency summary is emitted.
    pub observation_window: Duration,

    /// How many days ahead to scan for the next bell-worthy boundary.
    pub scan_horizon_days: u32,
}

impl Default for BellConfig {
    fn default() -> Self {
        Self {
            observation_window: Duration::from_secs(30),
            scan_horizon_days: 365,
        }
    }
}

/// The next boundary the scheduler would fire at.
#[derive(Clone, Debug, PartialEq)]
pub struct NextBell {
    pub at: DateTime<Utc>,
    pub is_start: bool,
    pub period: String,
}

/// Acknowledgement latency summary for one firing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencySummary {
    pub count: usize,
    pub min: Duration,
    pub max: Duration,
    pub median: Duration,
    pub p90: Duration,
    pub p99: Duration,
}

enum BellState {
    Idle,
    Armed { cancel: Sender<()>, epoch: u64 },
}

struct AckWindow {
    fired_at: Option<Instant>,
    samples: Vec<Duration>,
}

struct BellInner {
    store: Arc<ScheduleStore>,
    broadcaster: Arc<SyncBroadcaster>,
    config: BellConfig,
    state: Mutex<BellState>,
    window: Mutex<AckWindow>,
    next_epoch: AtomicU64,
}

/// Background timer firing virtual bells at period boundaries.
pub struct BellScheduler {
    inner: Arc<BellInner>,
}

impl BellScheduler {
    pub fn new(
        store: Arc<ScheduleStore>,
        broadcaster: Arc<SyncBroadcaster>,
        config: BellConfig,
    ) -> Self {
        Self {
            inner: Arc::new(BellInner {
                store,
                broadcaster,
                config,
                state: Mutex::new(BellState::Idle),
                window: Mutex::new(AckWindow {
                    fired_at: None,
                    samples: Vec::new(),
                }),
                next_epoch: AtomicU64::new(1),
            }),
        }
    }

    /// Arm the scheduler. No-op if already armed; stays idle when no
    /// bell-worthy boundary exists within the scan horizon.
    pub fn start(&self) {
        let mut state = self.inner.state.lock();
        if matches!(*state, BellState::Armed { .. }) {
            return;
        }

        let first = match next_bell(
            &self.inner.store,
            Utc::now(),
            self.inner.config.scan_horizon_days,
        ) {
            Some(next) => next,
            None => {
                tracing::warn!("no upcoming bell-worthy period; scheduler stays idle");
                return;
            }
        };

        let epoch = self.inner.next_epoch.fetch_add(1, Ordering::SeqCst);
        let (cancel_tx, cancel_rx) = bounded(1);
        *state = BellState::Armed {
            cancel: cancel_tx,
            epoch,
        };

        tracing::info!(at = %first.at, period = %first.period, "armed bell timer");
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || run_timer(inner, first, cancel_rx, epoch));
    }

    /// Cancel any pending timer. Always safe to call, armed or not.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        if let BellState::Armed { cancel, .. } = std::mem::replace(&mut *state, BellState::Idle) {
            let _ = cancel.try_send(());
            tracing::info!("bell timer cancelled");
        }
    }

    /// Record a client acknowledgement of the most recent bell.
    ///
    /// Only meaningful inside the post-fire observation window; later acks
    /// are dropped.
    pub fn receive_ack(&self) {
        let mut window = self.inner.window.lock();
        if let Some(fired_at) = window.fired_at {
            let elapsed = fired_at.elapsed();
            if elapsed <= self.inner.config.observation_window {
                window.samples.push(elapsed);
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(*self.inner.state.lock(), BellState::Armed { .. })
    }
}

fn run_timer(inner: Arc<BellInner>, first: NextBell, cancel: Receiver<()>, epoch: u64) {
    let mut next = first;
    let mut summary_deadline: Option<Instant> = None;

    loop {
        let bell_timer = after(duration_until(next.at));
        let summary_timer = match summary_deadline {
            Some(deadline) => after(deadline.saturating_duration_since(Instant::now())),
            None => never(),
        };

        select! {
            recv(cancel) -> _ => return,

            recv(bell_timer) -> _ => {
                inner.broadcaster.publish_bell(next.is_start, &next.period);
                {
                    let mut window = inner.window.lock();
                    window.fired_at = Some(Instant::now());
                    window.samples.clear();
                }
                summary_deadline = Some(Instant::now() + inner.config.observation_window);
                tracing::info!(period = %next.period, is_start = next.is_start, "bell fired");

                // Scan just past the boundary we fired so a start firing
                // advances to the matching end, not back to itself.
                match next_bell(
                    &inner.store,
                    next.at + chrono::Duration::seconds(1),
                    inner.config.scan_horizon_days,
                ) {
                    Some(following) => next = following,
                    None => {
                        disarm(&inner, epoch);
                        return;
                    }
                }
            }

            recv(summary_timer) -> _ => {
                summary_deadline = None;
                let samples = {
                    let mut window = inner.window.lock();
                    window.fired_at = None;
                    std::mem::take(&mut window.samples)
                };
                match summarize(&samples) {
                    Some(summary) => tracing::info!(
                        count = summary.count,
                        min_ms = summary.min.as_millis() as u64,
                        max_ms = summary.max.as_millis() as u64,
                        median_ms = summary.median.as_millis() as u64,
                        p90_ms = summary.p90.as_millis() as u64,
                        p99_ms = summary.p99.as_millis() as u64,
                        "bell acknowledgement latencies"
                    ),
                    None => tracing::debug!("no bell acknowledgements received"),
                }
            }
        }
    }
}

fn disarm(inner: &BellInner, epoch: u64) {
    let mut state = inner.state.lock();
    if matches!(*state, BellState::Armed { epoch: current, .. } if current == epoch) {
        *state = BellState::Idle;
    }
}

fn duration_until(at: DateTime<Utc>) -> Duration {
    (at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

/// Find the nearest future start/end of a bell-worthy period, scanning
/// forward day by day from `from`.
pub fn next_bell(store: &ScheduleStore, from: DateTime<Utc>, horizon_days: u32) -> Option<NextBell> {
    let first_day = ScheduleDate::of(from);
    for offset in 0..=i64::from(horizon_days) {
        let date = ScheduleDate(first_day.0 + chrono::Duration::days(offset));
        let schedule = match store.get(date) {
            Some(schedule) => schedule,
            None => continue,
        };
        for period in &schedule.periods {
            if !is_bell_worthy(&period.name) || period.end <= from {
                continue;
            }
            return Some(if period.start > from {
                NextBell {
                    at: period.start,
                    is_start: true,
                    period: period.name.clone(),
                }
            } else {
                NextBell {
                    at: period.end,
                    is_start: false,
                    period: period.name.clone(),
                }
            });
        }
    }
    None
}

/// Numbered periods and advisory blocks ring the bell; passing periods,
/// lunches, and the like do not.
fn is_bell_worthy(name: &str) -> bool {
    let bytes = name.as_bytes();
    let numbered = bytes.len() == 2 && bytes[0] == b'P' && (b'1'..=b'9').contains(&bytes[1]);
    numbered || name.contains("Advisory")
}

/// Summarize acknowledgement latencies with nearest-rank quantiles.
pub fn summarize(samples: &[Duration]) -> Option<LatencySummary> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort();
    let quantile = |q: f64| sorted[(q * (sorted.len() - 1) as f64).round() as usize];
    Some(LatencySummary {
        count: sorted.len(),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        median: quantile(0.5),
        p90: quantile(0.9),
        p99: quantile(0.99),
    })
}
