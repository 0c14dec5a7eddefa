//! Optimistic toggle state machine shared by the follow, vote, and
//! bookmark controls.
//!
//! Each control owns one [`ToggleController`]: a small state cell that
//! applies the user's transition to the visible state synchronously,
//! issues the remote call in a background task, and reconciles when the
//! call settles. A failed call reverts only its own delta; a toggle
//! issued while an earlier one is still in flight supersedes that
//! earlier call's eventual UI effect.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared::domain::{ActorRef, TargetRef, VoteDirection};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, warn};

/// Transition table for one toggle flavor.
///
/// Both functions are pure. `revert` implements the compensating-delta
/// rule: restore `before` only while the request's own effect (`after`)
/// is still what is visible; a later toggle's effect is never erased.
pub trait ToggleShape: Send + Sync + 'static {
    type Value: Copy + PartialEq + Send + Sync + std::fmt::Debug + 'static;
    type Intent: Copy + Send + Sync + std::fmt::Debug + 'static;

    fn transition(current: Self::Value, intent: Self::Intent) -> Self::Value;
    fn revert(current: Self::Value, before: Self::Value, after: Self::Value) -> Self::Value;
}

/// Two-state toggle: following/not-following, bookmarked/not.
pub enum BinaryToggle {}

impl ToggleShape for BinaryToggle {
    type Value = bool;
    type Intent = ();

    fn transition(current: bool, _intent: ()) -> bool {
        !current
    }

    fn revert(current: bool, before: bool, after: bool) -> bool {
        if current == after {
            before
        } else {
            current
        }
    }
}

/// Visible state of a vote control: the actor's own direction plus the
/// post's score including that direction's contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteSnapshot {
    pub direction: VoteDirection,
    pub score: i64,
}

impl VoteSnapshot {
    pub fn new(direction: VoteDirection, score: i64) -> Self {
        Self { direction, score }
    }
}

/// A vote click names a direction; retraction is expressed by clicking
/// the already-active direction, not by a separate intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteIntent {
    Up,
    Down,
}

impl VoteIntent {
    pub fn direction(self) -> VoteDirection {
        match self {
            VoteIntent::Up => VoteDirection::Up,
            VoteIntent::Down => VoteDirection::Down,
        }
    }
}

/// Tri-state vote toggle over the {up, down, none} x {up, down} matrix.
pub enum VoteToggle {}

impl ToggleShape for VoteToggle {
    type Value = VoteSnapshot;
    type Intent = VoteIntent;

    fn transition(current: VoteSnapshot, intent: VoteIntent) -> VoteSnapshot {
        let requested = intent.direction();
        // Re-clicking the active direction retracts; anything else moves
        // straight to the requested direction in a single step.
        let next = if current.direction == requested {
            VoteDirection::None
        } else {
            requested
        };
        VoteSnapshot {
            direction: next,
            score: current.score - current.direction.score_weight() + next.score_weight(),
        }
    }

    fn revert(current: VoteSnapshot, before: VoteSnapshot, after: VoteSnapshot) -> VoteSnapshot {
        if current.direction != after.direction {
            // A later toggle already replaced this request's direction and
            // its transition absorbed this request's score contribution.
            return current;
        }
        VoteSnapshot {
            direction: before.direction,
            score: current.score - current.direction.score_weight()
                + before.direction.score_weight(),
        }
    }
}

/// Remote side of a toggle: the single authoritative read plus the
/// mutation call for one transition. Implementations map `before`/`after`
/// onto the wire (create vs delete, net vote direction).
#[async_trait]
pub trait ToggleBackend<S: ToggleShape>: Send + Sync {
    async fn read(&self, target: &TargetRef) -> Result<S::Value>;
    async fn apply(&self, target: &TargetRef, before: S::Value, after: S::Value) -> Result<()>;
}

/// Fallback backend for controllers constructed without an API client.
pub struct MissingToggleBackend;

#[async_trait]
impl<S: ToggleShape> ToggleBackend<S> for MissingToggleBackend {
    async fn read(&self, target: &TargetRef) -> Result<S::Value> {
        Err(anyhow!(
            "no toggle backend configured for target {}",
            target.target_id
        ))
    }

    async fn apply(&self, target: &TargetRef, _before: S::Value, _after: S::Value) -> Result<()> {
        Err(anyhow!(
            "no toggle backend configured for target {}",
            target.target_id
        ))
    }
}

/// Presentation-facing state of a toggle control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState<V> {
    /// The initial read has not resolved; render nothing rather than a
    /// possibly-wrong default.
    Unknown,
    /// The target is the acting identity itself; the control is
    /// structurally disabled.
    Inert,
    Ready(V),
}

impl<V> ToggleState<V> {
    pub fn is_ready(&self) -> bool {
        matches!(self, ToggleState::Ready(_))
    }
}

#[derive(Debug, Clone)]
pub enum ToggleEvent<V> {
    /// Initial read resolved.
    Loaded(V),
    /// Optimistic value applied; the remote call is still in flight.
    Applied(V),
    /// The latest remote call succeeded; the optimistic value stands.
    Settled,
    /// The latest remote call failed and its delta was rolled back.
    Reverted { state: V, reason: String },
}

struct ToggleInner<V> {
    state: ToggleState<V>,
    /// Sequence number of the most recent toggle; completions of older
    /// requests are discarded rather than reconciled.
    latest_seq: u64,
    next_seq: u64,
    inflight: u32,
    detached: bool,
}

/// One optimistic toggle instance for a fixed `(actor, target)` pair.
///
/// All state transitions happen under one lock and follow user-action
/// order; network completion order never reorders the visible state.
pub struct ToggleController<S: ToggleShape> {
    target: TargetRef,
    backend: Arc<dyn ToggleBackend<S>>,
    inner: Mutex<ToggleInner<S::Value>>,
    events: broadcast::Sender<ToggleEvent<S::Value>>,
}

impl<S: ToggleShape> ToggleController<S> {
    /// The self-guard is evaluated exactly once, here. A self-targeted
    /// controller is inert for its whole lifetime: it never reads and
    /// every `toggle` is a no-op.
    pub fn new(
        actor: &ActorRef,
        target: TargetRef,
        backend: Arc<dyn ToggleBackend<S>>,
    ) -> Arc<Self> {
        let inert = target.is_actor(actor);
        if inert {
            debug!(
                target_id = %target.target_id,
                "toggle target is the acting identity; controller is inert"
            );
        }
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            target,
            backend,
            inner: Mutex::new(ToggleInner {
                state: if inert {
                    ToggleState::Inert
                } else {
                    ToggleState::Unknown
                },
                latest_seq: 0,
                next_seq: 0,
                inflight: 0,
                detached: false,
            }),
            events,
        })
    }

    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    /// Performs the single authoritative read of the remote state.
    ///
    /// On failure the controller stays `Unknown` and no retry is
    /// scheduled; the owning view recreates the controller to retry.
    pub async fn load(&self) {
        {
            let inner = self.inner.lock();
            if !matches!(inner.state, ToggleState::Unknown) {
                return;
            }
        }

        match self.backend.read(&self.target).await {
            Ok(value) => {
                {
                    let mut inner = self.inner.lock();
                    if inner.detached || !matches!(inner.state, ToggleState::Unknown) {
                        return;
                    }
                    inner.state = ToggleState::Ready(value);
                }
                let _ = self.events.send(ToggleEvent::Loaded(value));
            }
            Err(err) => {
                warn!(
                    target_id = %self.target.target_id,
                    "initial toggle state read failed: {err}"
                );
            }
        }
    }

    /// Applies the transition for `intent` to the visible state
    /// immediately and issues the matching remote call in a background
    /// task. Returns the task handle, or `None` when the toggle was
    /// ignored (inert controller, or the initial read has not resolved).
    pub fn toggle(self: &Arc<Self>, intent: S::Intent) -> Option<JoinHandle<()>> {
        let (before, after, seq) = {
            let mut inner = self.inner.lock();
            let current = match inner.state {
                ToggleState::Ready(value) => value,
                ToggleState::Inert => {
                    debug!(
                        target_id = %self.target.target_id,
                        "ignoring toggle on inert controller"
                    );
                    return None;
                }
                ToggleState::Unknown => {
                    debug!(
                        target_id = %self.target.target_id,
                        "ignoring toggle before initial state is known"
                    );
                    return None;
                }
            };
            let after = S::transition(current, intent);
            inner.state = ToggleState::Ready(after);
            inner.next_seq += 1;
            inner.latest_seq = inner.next_seq;
            inner.inflight += 1;
            (current, after, inner.next_seq)
        };
        let _ = self.events.send(ToggleEvent::Applied(after));

        let controller = Arc::clone(self);
        Some(tokio::spawn(async move {
            let result = controller
                .backend
                .apply(&controller.target, before, after)
                .await;
            controller.complete(seq, before, after, result);
        }))
    }

    fn complete(&self, seq: u64, before: S::Value, after: S::Value, result: Result<()>) {
        let mut inner = self.inner.lock();
        inner.inflight = inner.inflight.saturating_sub(1);
        if inner.detached {
            return;
        }
        if seq != inner.latest_seq {
            // A later toggle superseded this request; its state stands
            // whether this call succeeded or failed.
            debug!(
                target_id = %self.target.target_id,
                "discarding superseded toggle completion"
            );
            return;
        }

        match result {
            Ok(()) => {
                drop(inner);
                let _ = self.events.send(ToggleEvent::Settled);
            }
            Err(err) => {
                warn!(
                    target_id = %self.target.target_id,
                    "toggle mutation failed, reverting: {err}"
                );
                if let ToggleState::Ready(current) = inner.state {
                    let reverted = S::revert(current, before, after);
                    inner.state = ToggleState::Ready(reverted);
                    drop(inner);
                    let _ = self.events.send(ToggleEvent::Reverted {
                        state: reverted,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    /// Synchronous snapshot of the visible state.
    pub fn state(&self) -> ToggleState<S::Value> {
        self.inner.lock().state
    }

    /// True while any remote call is outstanding. Advisory only: the
    /// controller stays correct even when callers ignore it and keep
    /// toggling.
    pub fn is_busy(&self) -> bool {
        self.inner.lock().inflight > 0
    }

    /// Marks the owning view as unmounted. In-flight calls still settle,
    /// but their results no longer mutate state or emit events.
    pub fn detach(&self) {
        self.inner.lock().detached = true;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ToggleEvent<S::Value>> {
        self.events.subscribe()
    }
}
