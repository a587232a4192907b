use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{InspectError, InspectorError};
use crate::field::field_model::FieldDetail;
use crate::field::store::FieldDetailStore;
use crate::messaging::channel::Messenger;
use crate::messaging::protocol::PanelRequest;
use crate::trace::logger::TraceLogger;
use crate::trace::trace::InspectEvent;

pub const DEFAULT_INSPECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status text shown when a cycle ends without a result.
pub const INSPECTION_FAILED: &str = "inspection failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectState {
    Idle,
    /// Elements are being tagged; the inspect request goes out on ack
    Tagging,
    WaitingResult,
    /// A result was reconciled and is being painted
    Rendered,
}

type Waiter = oneshot::Sender<Result<(), InspectError>>;

// The single outstanding cycle. Taken out of the orchestrator as a whole on
// the first resolution, so no waiter can be resolved twice.
struct PendingInspect {
    cycle: u64,
    deadline: Instant,
    waiters: Vec<Waiter>,
}

/// Handle returned to callers that need a fresh result before acting.
#[derive(Debug)]
pub struct InspectWait {
    rx: Option<oneshot::Receiver<Result<(), InspectError>>>,
    timeout: Duration,
}

impl InspectWait {
    fn ready(timeout: Duration) -> Self {
        Self { rx: None, timeout }
    }

    pub fn is_ready(&self) -> bool {
        self.rx.is_none()
    }

    /// Non-blocking check; `None` while the cycle is still outstanding.
    pub fn try_result(&mut self) -> Option<Result<(), InspectError>> {
        let Some(rx) = self.rx.as_mut() else {
            return Some(Ok(()));
        };
        match rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(InspectError::Abandoned)),
        }
    }

    /// Suspend until the cycle resolves. Bounded by the inspect timeout even
    /// if nobody ever expires the cycle on the orchestrator side.
    pub async fn wait(self) -> Result<(), InspectError> {
        let Some(rx) = self.rx else {
            return Ok(());
        };
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(InspectError::Abandoned),
            Err(_) => Err(InspectError::TimedOut(self.timeout)),
        }
    }
}

/// Drives tag -> inspect -> render cycles for one tab.
///
/// Only one cycle is ever outstanding. Edit-driven triggers that arrive while
/// a cycle runs are folded into a single follow-up cycle; a manual trigger
/// supersedes the running cycle, whose late answers are then ignored by cycle
/// id.
pub struct Orchestrator {
    tab_id: u64,
    state: InspectState,
    fresh: bool,
    last_cycle: u64,
    pending: Option<PendingInspect>,
    follow_up: bool,
    timeout: Duration,
    status: Option<String>,
    tracer: TraceLogger,
}

impl Orchestrator {
    pub fn new(tab_id: u64) -> Self {
        Self {
            tab_id,
            state: InspectState::Idle,
            fresh: false,
            last_cycle: 0,
            pending: None,
            follow_up: false,
            timeout: DEFAULT_INSPECT_TIMEOUT,
            status: None,
            tracer: TraceLogger::disabled(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tracer(mut self, tracer: TraceLogger) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn state(&self) -> InspectState {
        self.state
    }

    /// Whether the displayed result is current (no invalidation since it arrived).
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn current_cycle(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.cycle)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start an inspect cycle.
    ///
    /// A manual trigger resets the edit session and always starts a new
    /// cycle. An edit-driven trigger while a cycle is outstanding only queues
    /// one follow-up cycle.
    pub fn trigger_inspect(
        &mut self,
        manual: bool,
        store: &mut FieldDetailStore,
        messenger: &dyn Messenger,
    ) -> Result<u64, InspectorError> {
        if manual {
            store.reset_session();
        } else if let Some(pending) = &self.pending {
            debug!(cycle = pending.cycle, "inspect already outstanding, queueing follow-up");
            self.follow_up = true;
            return Ok(pending.cycle);
        }

        self.fresh = false;
        self.follow_up = false;
        self.status = None;
        self.last_cycle += 1;
        let cycle = self.last_cycle;

        // Callers waiting on a superseded cycle wait for this one instead.
        let waiters = match self.pending.take() {
            Some(old) => {
                info!(old = old.cycle, new = cycle, "superseding outstanding inspect");
                old.waiters
            }
            None => Vec::new(),
        };

        self.pending = Some(PendingInspect {
            cycle,
            deadline: Instant::now() + self.timeout,
            waiters,
        });
        self.state = InspectState::Tagging;
        self.tracer.log(
            &InspectEvent::now(self.tab_id, cycle, &self.state)
                .with_manual(manual)
                .with_override_count(store.overrides().len()),
        );

        let request = PanelRequest::TagElements {
            tab_id: self.tab_id,
            cycle,
        };
        if let Err(e) = messenger.send(request) {
            warn!("Failed to request tagging: {}", e);
            self.fail_pending(InspectError::Failed(e.to_string()));
            return Err(e);
        }
        Ok(cycle)
    }

    /// Return a handle that resolves once a fresh result exists, triggering a
    /// cycle if none is outstanding. Never sends a second request while one
    /// is in flight.
    pub fn await_result_or_trigger(
        &mut self,
        store: &mut FieldDetailStore,
        messenger: &dyn Messenger,
    ) -> Result<InspectWait, InspectorError> {
        if self.fresh {
            return Ok(InspectWait::ready(self.timeout));
        }
        if self.pending.is_none() {
            self.trigger_inspect(false, store, messenger)?;
        }

        let (tx, rx) = oneshot::channel();
        match self.pending.as_mut() {
            Some(pending) => pending.waiters.push(tx),
            None => return Err(InspectError::Abandoned.into()),
        }
        Ok(InspectWait {
            rx: Some(rx),
            timeout: self.timeout,
        })
    }

    /// Tagging acknowledged: send the inspect request with the overrides as
    /// they are now. Returns false for acks of a cycle that is not current.
    pub fn on_tag_complete(
        &mut self,
        cycle: u64,
        store: &FieldDetailStore,
        messenger: &dyn Messenger,
    ) -> Result<bool, InspectorError> {
        let current = self.current_cycle() == Some(cycle);
        if !current || self.state != InspectState::Tagging {
            debug!(cycle, "ignoring stale tag-complete");
            return Ok(false);
        }

        self.state = InspectState::WaitingResult;
        self.tracer.log(
            &InspectEvent::now(self.tab_id, cycle, &self.state)
                .with_override_count(store.overrides().len()),
        );

        let request = PanelRequest::Inspect {
            tab_id: self.tab_id,
            changes: store.overrides().to_vec(),
            cycle,
        };
        if let Err(e) = messenger.send(request) {
            warn!("Failed to send inspect request: {}", e);
            self.fail_pending(InspectError::Failed(e.to_string()));
            return Err(e);
        }
        Ok(true)
    }

    /// Reconcile the result of the current cycle and release its waiters.
    /// Returns false (and changes nothing) for any other cycle.
    pub fn on_inspect_complete(
        &mut self,
        cycle: u64,
        data: &[FieldDetail],
        store: &mut FieldDetailStore,
    ) -> bool {
        let pending = match self.pending.take() {
            Some(p) if p.cycle == cycle => p,
            other => {
                self.pending = other;
                debug!(cycle, "ignoring inspect result of a superseded cycle");
                return false;
            }
        };

        store.reconcile(data);
        self.fresh = true;
        self.status = None;
        self.state = InspectState::Rendered;
        self.tracer.log(
            &InspectEvent::now(self.tab_id, cycle, &self.state)
                .with_field_count(data.len())
                .with_override_count(store.overrides().len())
                .with_outcome("complete"),
        );

        for waiter in pending.waiters {
            let _ = waiter.send(Ok(()));
        }
        true
    }

    /// Called after the table was painted. Runs the queued follow-up cycle,
    /// if an edit asked for one while the last cycle was outstanding.
    pub fn finish_render(
        &mut self,
        store: &mut FieldDetailStore,
        messenger: &dyn Messenger,
    ) -> Result<(), InspectorError> {
        if self.state == InspectState::Rendered {
            self.state = InspectState::Idle;
        }
        if self.follow_up && self.pending.is_none() {
            self.follow_up = false;
            self.trigger_inspect(false, store, messenger)?;
        }
        Ok(())
    }

    pub fn on_inspect_failed(&mut self, cycle: u64, error: &str) -> bool {
        if self.current_cycle() != Some(cycle) {
            debug!(cycle, "ignoring failure of a superseded cycle");
            return false;
        }
        warn!(cycle, "inspection failed: {}", error);
        self.fail_pending(InspectError::Failed(error.to_string()));
        true
    }

    /// Fail the outstanding cycle if its deadline has passed.
    pub fn expire_overdue(&mut self, now: Instant) -> bool {
        let overdue = self.pending.as_ref().is_some_and(|p| p.deadline <= now);
        if overdue {
            warn!(timeout = ?self.timeout, "inspection timed out");
            self.fail_pending(InspectError::TimedOut(self.timeout));
        }
        overdue
    }

    fn fail_pending(&mut self, error: InspectError) {
        if let Some(pending) = self.pending.take() {
            self.tracer.log(
                &InspectEvent::now(self.tab_id, pending.cycle, &InspectState::Idle)
                    .with_outcome(&error),
            );
            for waiter in pending.waiters {
                let _ = waiter.send(Err(error.clone()));
            }
        }
        self.follow_up = false;
        self.fresh = false;
        self.status = Some(INSPECTION_FAILED.to_string());
        self.state = InspectState::Idle;
    }
}
