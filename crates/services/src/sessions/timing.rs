use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use activity_core::time::remaining_secs;

//
// ─── ITEM STOPWATCH ────────────────────────────────────────────────────────────
//

/// Measures time spent on the current item. Restarted whenever a new item is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemStopwatch {
    started_at: DateTime<Utc>,
}

impl ItemStopwatch {
    #[must_use]
    pub fn start(now: DateTime<Utc>) -> Self {
        Self { started_at: now }
    }

    pub fn restart(&mut self, now: DateTime<Utc>) {
        self.started_at = now;
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Never negative, even if the clock stepped backwards.
    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        (now - self.started_at).max(Duration::zero())
    }
}

//
// ─── EXAM COUNTDOWN ────────────────────────────────────────────────────────────
//

/// Result of recomputing the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTick {
    pub remaining_secs: u64,
    /// `true` on the first tick that observes zero, and only on that one.
    pub expired: bool,
}

/// Session-wide deadline, fixed at session start.
///
/// Remaining time is always recomputed from the deadline so late or
/// skipped ticks never drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamCountdown {
    deadline: DateTime<Utc>,
    fired: bool,
}

impl ExamCountdown {
    #[must_use]
    pub fn start(started_at: DateTime<Utc>, limit: Duration) -> Self {
        Self {
            deadline: started_at + limit,
            fired: false,
        }
    }

    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    #[must_use]
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        remaining_secs(self.deadline, now)
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> CountdownTick {
        let remaining_secs = self.remaining_secs(now);
        let expired = remaining_secs == 0 && !self.fired;
        if expired {
            self.fired = true;
        }
        CountdownTick {
            remaining_secs,
            expired,
        }
    }
}

//
// ─── TICKER ────────────────────────────────────────────────────────────────────
//

/// Events delivered to the runner by its background timers.
///
/// Each carries the generation of the session that scheduled it; the runner
/// drops events from older generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerEvent {
    CountdownTick { generation: u64 },
}

impl RunnerEvent {
    #[must_use]
    pub fn generation(&self) -> u64 {
        let RunnerEvent::CountdownTick { generation } = self;
        *generation
    }
}

/// Periodic task that pushes one event into the runner's queue.
///
/// Aborted on `cancel` or drop, so a timer never outlives its owner.
#[derive(Debug)]
pub(crate) struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Spawns on the ambient tokio runtime. Returns `None` outside a runtime,
    /// in which case the caller drives ticks by hand.
    pub(crate) fn spawn(
        period: StdDuration,
        events: UnboundedSender<RunnerEvent>,
        event: RunnerEvent,
    ) -> Option<Self> {
        let runtime = Handle::try_current().ok()?;
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if events.send(event).is_err() {
                    break;
                }
            }
        });
        Some(Self { handle })
    }

    pub(crate) fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_core::time::fixed_now;
    use tokio::sync::mpsc;

    #[test]
    fn stopwatch_never_goes_negative() {
        let now = fixed_now();
        let mut watch = ItemStopwatch::start(now);
        assert_eq!(watch.elapsed(now - Duration::seconds(5)), Duration::zero());
        assert_eq!(watch.elapsed(now + Duration::seconds(3)), Duration::seconds(3));

        watch.restart(now + Duration::seconds(10));
        assert_eq!(watch.elapsed(now + Duration::seconds(12)), Duration::seconds(2));
    }

    #[test]
    fn countdown_expires_exactly_once() {
        let start = fixed_now();
        let mut countdown = ExamCountdown::start(start, Duration::seconds(600));
        assert_eq!(countdown.deadline(), start + Duration::seconds(600));

        let early = countdown.tick(start + Duration::milliseconds(500));
        assert_eq!(early.remaining_secs, 600);
        assert!(!early.expired);

        let first = countdown.tick(start + Duration::seconds(601));
        assert_eq!(first.remaining_secs, 0);
        assert!(first.expired);

        let again = countdown.tick(start + Duration::seconds(700));
        assert_eq!(again.remaining_secs, 0);
        assert!(!again.expired);
        assert!(countdown.has_fired());
    }

    #[test]
    fn ticker_is_not_spawned_outside_a_runtime() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let ticker = Ticker::spawn(
            StdDuration::from_secs(1),
            tx,
            RunnerEvent::CountdownTick { generation: 1 },
        );
        assert!(ticker.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_delivers_events_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let event = RunnerEvent::CountdownTick { generation: 7 };
        let ticker = Ticker::spawn(StdDuration::from_secs(1), tx, event).unwrap();

        assert_eq!(rx.recv().await, Some(event));
        assert_eq!(rx.recv().await.map(|e| e.generation()), Some(7));

        ticker.cancel();
        assert_eq!(rx.recv().await, None);
    }
}
