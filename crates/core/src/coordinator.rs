//! Lifecycle of a single in-flight remote operation.
//!
//! An `OperationCoordinator` owns at most one running operation at a time
//! and exposes its state to observers through a watch channel. While the
//! executor's future is pending, progress is driven by a per-kind milestone
//! schedule timed to approximate, not measure, real latency; when the
//! future settles the estimate jumps near 100 and completes. Cancellation
//! does not abort the transport: a response arriving for a superseded
//! operation is discarded by a generation check before any side effect.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::OperationExecutor;
use crate::error::OperationError;
use crate::progress::{schedule_for, ProgressEstimator, ProgressSnapshot};
use crate::request::OperationRequest;

/// Where an operation is in its one-directional lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }
}

/// Snapshot of the current operation, fresh per invocation.
///
/// Invariants: `percent` is 100 in `Succeeded`; `error` and `result` are
/// mutually exclusive and only present in terminal phases; transitions are
/// one-directional and a terminal state is never resurrected.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationState {
    pub phase: Phase,
    pub percent: u8,
    pub stage: String,
    pub error: Option<OperationError>,
    pub result: Option<Value>,
}

impl OperationState {
    fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            percent: 0,
            stage: String::new(),
            error: None,
            result: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

struct Inner {
    /// Bumped on every start and cancel; a settling executor whose
    /// generation is stale applies no side effects.
    generation: u64,
    running: bool,
    driver: Option<JoinHandle<()>>,
}

/// Drives one asynchronous remote operation at a time through
/// idle -> running -> succeeded | failed.
///
/// Construct and use within a Tokio runtime; `start` spawns the milestone
/// driver and the executor supervision task.
pub struct OperationCoordinator {
    state: watch::Sender<OperationState>,
    estimator: Arc<ProgressEstimator>,
    inner: Arc<Mutex<Inner>>,
}

impl OperationCoordinator {
    pub fn new() -> Self {
        Self::with_estimator(ProgressEstimator::new())
    }

    /// Override the progress seed policy (e.g. from config).
    pub fn with_seed(seed: u8) -> Self {
        Self::with_estimator(ProgressEstimator::with_seed(seed))
    }

    fn with_estimator(estimator: ProgressEstimator) -> Self {
        let estimator = Arc::new(estimator);
        let state = watch::channel(OperationState::idle()).0;

        // Forward estimator snapshots into the operation state while it is
        // running. Ends when the estimator's channel closes on drop.
        let mut progress_rx = estimator.subscribe();
        let state_tx = state.clone();
        tokio::spawn(async move {
            while progress_rx.changed().await.is_ok() {
                let snap = progress_rx.borrow_and_update().clone();
                state_tx.send_modify(|s| {
                    if s.phase == Phase::Running {
                        s.percent = s.percent.max(snap.percent);
                        s.stage = snap.stage;
                    }
                });
            }
        });

        Self {
            state,
            estimator,
            inner: Arc::new(Mutex::new(Inner {
                generation: 0,
                running: false,
                driver: None,
            })),
        }
    }

    /// Observe operation state transitions and progress updates.
    pub fn subscribe(&self) -> watch::Receiver<OperationState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> OperationState {
        self.state.borrow().clone()
    }

    /// Raw progress feed, for consumers that render the bar separately from
    /// the state machine (e.g. a display that hides after the completion
    /// hold).
    pub fn progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.estimator.subscribe()
    }

    /// Begins `request` via `executor` and returns a subscription to the
    /// operation's state.
    ///
    /// Fails fast, with no executor invocation, when the target list is
    /// empty or another operation is already running. Every executor
    /// failure is converted into a terminal `Failed` state; nothing
    /// escapes as an unobserved task error.
    pub fn start(
        &self,
        request: OperationRequest,
        executor: Arc<dyn OperationExecutor>,
    ) -> Result<watch::Receiver<OperationState>, OperationError> {
        if request.target_ids.is_empty() {
            return Err(OperationError::Validation(
                "target list is empty".to_string(),
            ));
        }

        let generation = {
            let mut inner = self.lock_inner();
            if inner.running {
                return Err(OperationError::AlreadyRunning);
            }
            inner.running = true;
            inner.generation += 1;
            if let Some(handle) = inner.driver.take() {
                handle.abort();
            }
            inner.generation
        };

        let kind = request.kind();
        let schedule = schedule_for(kind);
        let first_stage = schedule.first().map(|m| m.stage).unwrap_or("Working");
        tracing::debug!(%kind, targets = request.target_ids.len(), "operation started");

        // Fresh state per invocation; the previous terminal state is never
        // reused.
        self.estimator.start(first_stage);
        let seed = self.estimator.snapshot().percent;
        self.state.send_replace(OperationState {
            phase: Phase::Running,
            percent: seed,
            stage: first_stage.to_string(),
            error: None,
            result: None,
        });

        // Milestone driver: walks the schedule while the call is in flight.
        let est = Arc::clone(&self.estimator);
        let driver = tokio::spawn(async move {
            for m in schedule {
                est.advance_to(m.target, m.stage, m.duration);
                tokio::time::sleep(m.duration).await;
            }
        });
        self.lock_inner().driver = Some(driver);

        // Executor supervision: settle into a terminal state, unless the
        // operation has been superseded in the meantime.
        let est = Arc::clone(&self.estimator);
        let inner = Arc::clone(&self.inner);
        let state = self.state.clone();
        tokio::spawn(async move {
            let outcome = executor.execute(&request).await;
            {
                let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
                if guard.generation != generation {
                    tracing::warn!(%kind, "discarding stale response for superseded operation");
                    return;
                }
                guard.running = false;
                if let Some(handle) = guard.driver.take() {
                    handle.abort();
                }
            }
            match outcome {
                Ok(result) => {
                    est.jump_to(95, "Finishing up");
                    est.complete();
                    state.send_modify(|s| {
                        s.phase = Phase::Succeeded;
                        s.percent = 100;
                        s.stage = "Done".to_string();
                        s.result = Some(result);
                    });
                    tracing::info!(%kind, "operation succeeded");
                }
                Err(error) => {
                    est.cancel();
                    tracing::debug!(%kind, %error, "operation failed");
                    state.send_modify(|s| {
                        s.phase = Phase::Failed;
                        s.error = Some(error);
                    });
                }
            }
        });

        Ok(self.state.subscribe())
    }

    /// Cancels the running operation, if any.
    ///
    /// The state becomes `Failed` with a `Cancelled` error immediately. The
    /// underlying remote call is not aborted; its eventual response fails
    /// the generation check and is discarded.
    pub fn cancel(&self) {
        {
            let mut inner = self.lock_inner();
            if !inner.running {
                return;
            }
            inner.running = false;
            inner.generation += 1;
            if let Some(handle) = inner.driver.take() {
                handle.abort();
            }
        }
        self.estimator.cancel();
        self.state.send_modify(|s| {
            s.phase = Phase::Failed;
            s.error = Some(OperationError::Cancelled);
        });
        tracing::debug!("operation cancelled");
    }

    pub fn is_running(&self) -> bool {
        self.lock_inner().running
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for OperationCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ActionPayload, ScanConfig};
    use crate::resource::ResourceType;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeExecutor {
        delay: Duration,
        outcome: Result<Value, OperationError>,
        calls: AtomicUsize,
    }

    impl FakeExecutor {
        fn ok_after(delay: Duration, value: Value) -> Arc<Self> {
            Arc::new(Self {
                delay,
                outcome: Ok(value),
                calls: AtomicUsize::new(0),
            })
        }

        fn err_after(delay: Duration, error: OperationError) -> Arc<Self> {
            Arc::new(Self {
                delay,
                outcome: Err(error),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OperationExecutor for FakeExecutor {
        async fn execute(&self, _request: &OperationRequest) -> Result<Value, OperationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.outcome.clone()
        }
    }

    fn scan_request(ids: &[&str]) -> OperationRequest {
        OperationRequest {
            resource: ResourceType::Websites,
            target_ids: ids.iter().map(|s| s.to_string()).collect(),
            payload: ActionPayload::Scan {
                config: ScanConfig::default(),
            },
        }
    }

    async fn wait_terminal(
        rx: &mut watch::Receiver<OperationState>,
    ) -> OperationState {
        rx.wait_for(|s| s.is_terminal()).await.unwrap().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn runs_to_success_with_result() {
        let coordinator = OperationCoordinator::new();
        let executor = FakeExecutor::ok_after(
            Duration::from_secs(3),
            json!({"plugins_found": 12}),
        );
        let mut rx = coordinator
            .start(scan_request(&["1", "2", "3"]), executor.clone())
            .unwrap();

        assert_eq!(coordinator.current().phase, Phase::Running);
        let state = wait_terminal(&mut rx).await;
        assert_eq!(state.phase, Phase::Succeeded);
        assert_eq!(state.percent, 100);
        assert_eq!(state.result, Some(json!({"plugins_found": 12})));
        assert_eq!(state.error, None);
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn executor_failure_becomes_failed_state() {
        let coordinator = OperationCoordinator::new();
        let executor = FakeExecutor::err_after(
            Duration::from_secs(1),
            OperationError::Api {
                status: 500,
                message: "boom".to_string(),
            },
        );
        let mut rx = coordinator
            .start(scan_request(&["1"]), executor)
            .unwrap();
        let state = wait_terminal(&mut rx).await;
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(
            state.error,
            Some(OperationError::Api {
                status: 500,
                message: "boom".to_string()
            })
        );
        assert_eq!(state.result, None);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_target_list_fails_fast() {
        let coordinator = OperationCoordinator::new();
        let executor = FakeExecutor::ok_after(Duration::ZERO, json!({}));
        let err = coordinator
            .start(scan_request(&[]), executor.clone())
            .unwrap_err();
        assert!(matches!(err, OperationError::Validation(_)));
        assert_eq!(executor.calls(), 0);
        assert_eq!(coordinator.current().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_rejected_while_running() {
        let coordinator = OperationCoordinator::new();
        let slow = FakeExecutor::ok_after(Duration::from_secs(30), json!({}));
        coordinator
            .start(scan_request(&["1"]), slow.clone())
            .unwrap();

        let second = FakeExecutor::ok_after(Duration::ZERO, json!({}));
        let err = coordinator
            .start(scan_request(&["2"]), second.clone())
            .unwrap_err();
        assert_eq!(err, OperationError::AlreadyRunning);
        assert_eq!(second.calls(), 0);

        // Let the supervision task get polled before checking the first
        // executor actually ran.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(slow.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_marks_failed_and_discards_late_success() {
        let coordinator = OperationCoordinator::new();
        let executor = FakeExecutor::ok_after(
            Duration::from_secs(5),
            json!({"should": "be discarded"}),
        );
        let mut rx = coordinator
            .start(scan_request(&["1", "2"]), executor)
            .unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        coordinator.cancel();
        let state = wait_terminal(&mut rx).await;
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.error, Some(OperationError::Cancelled));

        // The executor settles at t=5s; its resolved value must not
        // overwrite the failed state.
        tokio::time::sleep(Duration::from_secs(5)).await;
        let after = coordinator.current();
        assert_eq!(after.phase, Phase::Failed);
        assert_eq!(after.error, Some(OperationError::Cancelled));
        assert_eq!(after.result, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_when_idle_is_a_no_op() {
        let coordinator = OperationCoordinator::new();
        coordinator.cancel();
        assert_eq!(coordinator.current().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_state_after_terminal_run() {
        let coordinator = OperationCoordinator::new();
        let failing = FakeExecutor::err_after(
            Duration::from_millis(100),
            OperationError::Network("offline".to_string()),
        );
        let mut rx = coordinator.start(scan_request(&["1"]), failing).unwrap();
        let state = wait_terminal(&mut rx).await;
        assert_eq!(state.phase, Phase::Failed);

        // Terminal state is bypassed, not resurrected.
        let ok = FakeExecutor::ok_after(Duration::from_millis(100), json!({"n": 1}));
        let mut rx = coordinator.start(scan_request(&["2"]), ok).unwrap();
        assert_eq!(coordinator.current().phase, Phase::Running);
        assert_eq!(coordinator.current().error, None);
        let state = wait_terminal(&mut rx).await;
        assert_eq!(state.phase, Phase::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_advances_while_executor_pending() {
        let coordinator = OperationCoordinator::new();
        let executor = FakeExecutor::ok_after(Duration::from_secs(8), json!({}));
        coordinator
            .start(scan_request(&["1", "2", "3"]), executor)
            .unwrap();

        let at_start = coordinator.current().percent;
        tokio::time::sleep(Duration::from_secs(3)).await;
        let mid = coordinator.current().percent;
        assert!(mid > at_start, "progress should advance: {} -> {}", at_start, mid);
        assert!(mid < 100);
        assert_eq!(coordinator.current().phase, Phase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn observed_progress_is_monotonic_through_settlement() {
        let coordinator = OperationCoordinator::new();
        let executor = FakeExecutor::ok_after(Duration::from_secs(4), json!({}));
        let mut rx = coordinator.start(scan_request(&["1"]), executor).unwrap();

        let mut last = 0u8;
        loop {
            let (percent, terminal) = {
                let s = rx.borrow_and_update();
                (s.percent, s.is_terminal())
            };
            assert!(percent >= last, "progress went backwards: {} -> {}", last, percent);
            last = percent;
            if terminal {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
        assert_eq!(last, 100);
    }
}
