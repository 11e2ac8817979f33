//! Optimistic progress estimation for operations of unknown duration.
//!
//! The real completion time of a remote operation is unknowable client-side,
//! so the displayed percentage is an *estimate*, not telemetry: while a call
//! is in flight the estimator interpolates toward a target on a timer, and
//! when a real milestone arrives (the response settles) it jumps so the bar
//! never appears to freeze or lie. Percentages never decrease while an
//! operation runs.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::request::ActionKind;

/// Initial percentage shown as soon as an operation starts, to signal
/// liveness before the first interpolation tick.
pub const SEED_PERCENT: u8 = 10;

/// How long a completed bar stays at 100% before the display clears.
pub const COMPLETE_HOLD: Duration = Duration::from_millis(600);

/// Point-in-time view of the estimator, delivered over a watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// 0-100. Monotonically non-decreasing within one operation.
    pub percent: u8,
    /// Human-readable description of the current sub-step.
    pub stage: String,
    /// False once the display should be cleared (after completion hold, or
    /// on cancellation).
    pub visible: bool,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            percent: 0,
            stage: String::new(),
            visible: false,
        }
    }
}

/// One step of a per-kind milestone schedule: interpolate to `target` over
/// `duration` while showing `stage`.
#[derive(Debug, Clone, Copy)]
pub struct Milestone {
    pub target: u8,
    pub stage: &'static str,
    pub duration: Duration,
}

static SCAN_SCHEDULE: &[Milestone] = &[
    Milestone {
        target: 25,
        stage: "Connecting to websites",
        duration: Duration::from_millis(1200),
    },
    Milestone {
        target: 55,
        stage: "Scanning plugins and themes",
        duration: Duration::from_millis(2600),
    },
    Milestone {
        target: 75,
        stage: "Checking for vulnerabilities",
        duration: Duration::from_millis(2400),
    },
    Milestone {
        target: 90,
        stage: "Collecting results",
        duration: Duration::from_millis(3800),
    },
];

static DELETE_SCHEDULE: &[Milestone] = &[
    Milestone {
        target: 45,
        stage: "Deleting items",
        duration: Duration::from_millis(900),
    },
    Milestone {
        target: 90,
        stage: "Cleaning up",
        duration: Duration::from_millis(2100),
    },
];

static UPDATE_SCHEDULE: &[Milestone] = &[
    Milestone {
        target: 50,
        stage: "Applying changes",
        duration: Duration::from_millis(800),
    },
    Milestone {
        target: 90,
        stage: "Saving",
        duration: Duration::from_millis(2200),
    },
];

static SCHEDULE_SCHEDULE: &[Milestone] = &[
    Milestone {
        target: 40,
        stage: "Creating scan schedules",
        duration: Duration::from_millis(1000),
    },
    Milestone {
        target: 90,
        stage: "Activating",
        duration: Duration::from_millis(2400),
    },
];

/// Milestone schedule for an action kind. Timing constants live here, in one
/// place, rather than scattered across call sites.
pub fn schedule_for(kind: ActionKind) -> &'static [Milestone] {
    match kind {
        ActionKind::Scan => SCAN_SCHEDULE,
        ActionKind::Delete => DELETE_SCHEDULE,
        ActionKind::Schedule => SCHEDULE_SCHEDULE,
        ActionKind::StatusUpdate
        | ActionKind::GroupAssign
        | ActionKind::TypeUpdate
        | ActionKind::CategoryUpdate => UPDATE_SCHEDULE,
    }
}

/// Produces a believable progress percentage and stage label for an
/// operation whose true duration is unknown. Cannot fail, only estimate.
///
/// All methods that start timers (`advance_to`, `complete`) must be called
/// from within a Tokio runtime.
#[derive(Debug)]
pub struct ProgressEstimator {
    tx: watch::Sender<ProgressSnapshot>,
    // At most one interpolation or hold timer at a time. A new instruction
    // always aborts the previous timer before taking effect, so a
    // superseded tick can never land after a jump or cancel.
    timer: Mutex<Option<JoinHandle<()>>>,
    seed: u8,
}

impl ProgressEstimator {
    pub fn new() -> Self {
        Self::with_seed(SEED_PERCENT)
    }

    pub fn with_seed(seed: u8) -> Self {
        Self {
            tx: watch::channel(ProgressSnapshot::default()).0,
            timer: Mutex::new(None),
            seed: seed.min(100),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }

    /// Resets the clock for a new operation: percent drops to the seed value
    /// and the display becomes visible.
    pub fn start(&self, stage: &str) {
        self.stop_timer();
        self.tx.send_replace(ProgressSnapshot {
            percent: self.seed,
            stage: stage.to_string(),
            visible: true,
        });
    }

    /// Interpolates from the current percentage toward `target` over
    /// `duration`, one point per tick. The stage label updates immediately,
    /// independent of the interpolation.
    pub fn advance_to(&self, target: u8, stage: &str, duration: Duration) {
        self.stop_timer();
        let target = target.min(100);
        self.tx.send_modify(|s| {
            s.stage = stage.to_string();
            s.visible = true;
        });
        let current = self.tx.borrow().percent;
        if current >= target {
            return;
        }
        let steps = u32::from(target - current);
        let step = duration / steps;
        if step.is_zero() {
            // Degenerate duration hint: nothing to interpolate over.
            self.tx.send_modify(|s| s.percent = s.percent.max(target));
            return;
        }
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + step, step);
            loop {
                tick.tick().await;
                let mut reached = false;
                tx.send_modify(|s| {
                    // The `< target` guard means a straggling tick from a
                    // superseded interpolation can never overshoot.
                    if s.percent < target {
                        s.percent += 1;
                    }
                    reached = s.percent >= target;
                });
                if reached {
                    break;
                }
            }
        });
        *self.timer.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Cancels any in-flight interpolation and sets the value immediately.
    /// Used when a real milestone is reached and the estimate must not lag.
    /// Never moves the percentage backwards.
    pub fn jump_to(&self, percent: u8, stage: &str) {
        self.stop_timer();
        let percent = percent.min(100);
        self.tx.send_modify(|s| {
            s.percent = s.percent.max(percent);
            s.stage = stage.to_string();
            s.visible = true;
        });
    }

    /// Forces 100%, holds it briefly so the user perceives completion, then
    /// clears the display.
    pub fn complete(&self) {
        self.stop_timer();
        self.tx.send_modify(|s| {
            s.percent = 100;
            s.visible = true;
        });
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(COMPLETE_HOLD).await;
            tx.send_modify(|s| s.visible = false);
        });
        *self.timer.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Stops interpolation without forcing a final value. Error path.
    pub fn cancel(&self) {
        self.stop_timer();
        self.tx.send_modify(|s| s.visible = false);
    }

    fn stop_timer(&self) {
        if let Some(handle) = self
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

impl Default for ProgressEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProgressEstimator {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test(start_paused = true)]
    async fn start_seeds_initial_percent() {
        let est = ProgressEstimator::new();
        est.start("Preparing");
        let snap = est.snapshot();
        assert_eq!(snap.percent, SEED_PERCENT);
        assert_eq!(snap.stage, "Preparing");
        assert!(snap.visible);
    }

    #[tokio::test(start_paused = true)]
    async fn advance_interpolates_one_point_per_tick() {
        let est = ProgressEstimator::new();
        est.start("Preparing");
        // 10 -> 60 over 5s: 50 steps of 100ms each.
        est.advance_to(60, "Scanning", Duration::from_secs(5));
        assert_eq!(est.snapshot().stage, "Scanning");
        assert_eq!(est.snapshot().percent, SEED_PERCENT);

        tokio::time::sleep(Duration::from_millis(1050)).await;
        let p = est.snapshot().percent;
        assert!((19..=21).contains(&p), "expected ~20, got {}", p);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(est.snapshot().percent, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn interpolation_never_overshoots_target() {
        let est = ProgressEstimator::new();
        est.start("Working");
        est.advance_to(30, "Working", Duration::from_millis(200));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(est.snapshot().percent, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn jump_wins_over_pending_advance() {
        let est = ProgressEstimator::new();
        est.start("Working");
        est.advance_to(60, "Scanning", Duration::from_secs(4));
        tokio::time::sleep(Duration::from_millis(500)).await;
        est.jump_to(80, "Processing");
        assert_eq!(est.snapshot().percent, 80);
        // The superseded interpolation must not tick again.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(est.snapshot().percent, 80);
        assert_eq!(est.snapshot().stage, "Processing");
    }

    #[tokio::test(start_paused = true)]
    async fn jump_never_decreases() {
        let est = ProgressEstimator::new();
        est.start("Working");
        est.jump_to(70, "Almost there");
        est.jump_to(40, "Lagging milestone");
        assert_eq!(est.snapshot().percent, 70);
    }

    #[tokio::test(start_paused = true)]
    async fn complete_caps_at_100_and_clears_after_hold() {
        let est = ProgressEstimator::new();
        est.start("Working");
        est.advance_to(60, "Working", Duration::from_secs(4));
        tokio::time::sleep(Duration::from_millis(700)).await;
        est.complete();
        let snap = est.snapshot();
        assert_eq!(snap.percent, 100);
        assert!(snap.visible);
        tokio::time::sleep(COMPLETE_HOLD + Duration::from_millis(50)).await;
        assert!(!est.snapshot().visible);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_interpolation_without_forcing_value() {
        let est = ProgressEstimator::new();
        est.start("Working");
        est.advance_to(90, "Working", Duration::from_secs(8));
        tokio::time::sleep(Duration::from_secs(1)).await;
        let before = est.snapshot().percent;
        est.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;
        let snap = est.snapshot();
        assert_eq!(snap.percent, before);
        assert!(!snap.visible);
    }

    #[test]
    fn every_kind_has_a_schedule_ending_below_100() {
        for kind in [
            ActionKind::Scan,
            ActionKind::Delete,
            ActionKind::StatusUpdate,
            ActionKind::GroupAssign,
            ActionKind::Schedule,
            ActionKind::TypeUpdate,
            ActionKind::CategoryUpdate,
        ] {
            let schedule = schedule_for(kind);
            assert!(!schedule.is_empty());
            // Targets strictly increase and leave headroom for the
            // settlement jump.
            let mut last = 0;
            for m in schedule {
                assert!(m.target > last, "{:?}: non-increasing target", kind);
                last = m.target;
            }
            assert!(last < 100);
        }
    }

    #[derive(Debug, Clone)]
    enum Op {
        Advance { target: u8, millis: u64 },
        Jump { percent: u8 },
        Wait { millis: u64 },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..=100, 50u64..3000).prop_map(|(target, millis)| Op::Advance { target, millis }),
            (0u8..=100).prop_map(|percent| Op::Jump { percent }),
            (10u64..2000).prop_map(|millis| Op::Wait { millis }),
        ]
    }

    proptest! {
        // P1: percent observed after each step is never less than before it,
        // for any interleaving of advances, jumps, and elapsed time.
        #[test]
        fn progress_is_monotonic_while_running(ops in proptest::collection::vec(op_strategy(), 1..25)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            rt.block_on(async move {
                let est = ProgressEstimator::new();
                est.start("Working");
                let mut last = est.snapshot().percent;
                for op in ops {
                    match op {
                        Op::Advance { target, millis } => {
                            est.advance_to(target, "step", Duration::from_millis(millis));
                        }
                        Op::Jump { percent } => est.jump_to(percent, "jump"),
                        Op::Wait { millis } => {
                            tokio::time::sleep(Duration::from_millis(millis)).await;
                        }
                    }
                    let now = est.snapshot().percent;
                    assert!(now >= last, "progress went backwards: {} -> {}", last, now);
                    last = now;
                }
            });
        }
    }
}
