//! The authentication gate.
//!
//! The gate owns the process-wide lock state and reconciles three event
//! sources into it: lifecycle transitions, the asynchronous credential
//! check, and user retry taps. Every transition runs under one mutex, so
//! the sources never interleave mid-transition; the credential check is
//! the only suspension point and runs in a spawned task that re-enters
//! the mutex to deliver its outcome.
//!
//! Overlay and settings side effects execute while the state lock is held,
//! so the overlay's observed visibility cannot reorder against lock-state
//! changes. Host callbacks (`on_success`, `on_failure`, the unlock hook)
//! fire after the lock is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use latch_domain::{
    AttemptId, AttemptState, CredentialOutcome, GateConfig, GateError, LifecycleEvent, LockPhase,
    LockState, RelockPolicy, UnavailableReason,
};

use crate::error::{ApplicationError, ApplicationResult};
use crate::ports::{
    Clock, CredentialProvider, LifecycleNotifier, OverlayPresenter, RetryAction, SettingsRouter,
};

type SuccessCallback = Box<dyn FnOnce() + Send>;
type FailureCallback = Box<dyn FnOnce(GateError) + Send>;
type UnlockHook = Arc<dyn Fn() + Send + Sync>;

/// Per-call callbacks for one `authenticate` entry.
struct AttemptCallbacks {
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
}

impl AttemptCallbacks {
    fn new(
        on_success: impl FnOnce() + Send + 'static,
        on_failure: impl FnOnce(GateError) + Send + 'static,
    ) -> Self {
        Self {
            on_success: Some(Box::new(on_success)),
            on_failure: Some(Box::new(on_failure)),
        }
    }

    /// Callbacks for gate-initiated attempts (retry taps, foreground
    /// re-prompts); the unlock hook is the only notification those emit.
    const fn none() -> Self {
        Self {
            on_success: None,
            on_failure: None,
        }
    }
}

/// Host callbacks collected under the state lock, fired after release.
struct Notifications {
    hook: Option<UnlockHook>,
    success: Option<SuccessCallback>,
    failure: Option<(FailureCallback, GateError)>,
}

impl Notifications {
    fn dispatch(self) {
        if let Some(hook) = self.hook {
            hook();
        }
        if let Some(success) = self.success {
            success();
        }
        if let Some((failure, error)) = self.failure {
            failure(error);
        }
    }
}

/// A provider result that arrived while the app was backgrounded; applied
/// on the next foreground entry.
struct Deferred {
    outcome: CredentialOutcome,
    callbacks: AttemptCallbacks,
}

/// Everything the gate mutates, guarded by one mutex.
struct GateState {
    lock: LockState,
    attempt: AttemptState,
    interrupted: bool,
    in_foreground: bool,
    background_at: Option<DateTime<Utc>>,
    rearmed: bool,
    deferred: Option<Deferred>,
}

impl GateState {
    fn new() -> Self {
        Self {
            lock: LockState::default(),
            attempt: AttemptState::Idle,
            interrupted: false,
            in_foreground: true,
            background_at: None,
            rearmed: false,
            deferred: None,
        }
    }
}

struct GateCore<P, O, R, C> {
    weak: Weak<Self>,
    state: Mutex<GateState>,
    provider: P,
    overlay: O,
    settings: R,
    clock: C,
    config: GateConfig,
    unlock_hook: Mutex<Option<UnlockHook>>,
    state_tx: watch::Sender<LockState>,
    runtime: tokio::runtime::Handle,
}

/// The authentication-gate state machine.
///
/// One instance guards one application for the process lifetime. The gate
/// starts locked and covers the content as soon as it is constructed;
/// nothing is persisted, so a process restart always starts locked again.
///
/// Construct it at the composition root with the platform adapters, bind
/// it to a lifecycle notifier, and call [`Gate::authenticate`] to prompt
/// for the device-owner credential.
pub struct Gate<P, O, R, C> {
    core: Arc<GateCore<P, O, R, C>>,
}

impl<P, O, R, C> Clone for Gate<P, O, R, C> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<P, O, R, C> Gate<P, O, R, C>
where
    P: CredentialProvider + 'static,
    O: OverlayPresenter + 'static,
    R: SettingsRouter + 'static,
    C: Clock + 'static,
{
    /// Creates a gate in the `Locked`/`NoAttempt` state and shows the
    /// overlay, so the content is covered before the first check runs.
    ///
    /// Must be called within a Tokio runtime; the gate captures the
    /// runtime handle so retry taps arriving from non-runtime threads can
    /// still start attempts.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or no runtime is
    /// available.
    pub fn new(
        provider: P,
        overlay: O,
        settings: R,
        clock: C,
        config: GateConfig,
    ) -> ApplicationResult<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|error| ApplicationError::Runtime(error.to_string()))?;
        let (state_tx, _) = watch::channel(LockState::default());
        let core = Arc::new_cyclic(|weak| GateCore {
            weak: weak.clone(),
            state: Mutex::new(GateState::new()),
            provider,
            overlay,
            settings,
            clock,
            config,
            unlock_hook: Mutex::new(None),
            state_tx,
            runtime,
        });
        core.overlay.show();
        Ok(Self { core })
    }

    /// Runs a credential check unless one is already in flight.
    ///
    /// While locked, this shows the overlay and queries the credential
    /// provider; `on_success` fires exactly once if this attempt unlocks
    /// the gate, `on_failure` fires for hard denials and unavailability.
    /// A cancelled check fires neither and surfaces the retry affordance
    /// instead. When the gate is already unlocked, `on_success` fires
    /// immediately. A call made while an attempt is in flight is absorbed
    /// and its callbacks are dropped.
    pub fn authenticate(
        &self,
        on_success: impl FnOnce() + Send + 'static,
        on_failure: impl FnOnce(GateError) + Send + 'static,
    ) {
        self.core
            .authenticate(AttemptCallbacks::new(on_success, on_failure));
    }

    /// Feeds one lifecycle event into the gate.
    ///
    /// Hosts that cannot provide a [`LifecycleNotifier`] may call this
    /// directly instead of using [`Gate::bind`].
    pub fn handle_event(&self, event: LifecycleEvent) {
        self.core.handle_event(event);
    }

    /// Subscribes to the notifier and forwards its events to the gate
    /// until the notifier closes or the gate is dropped.
    pub fn bind<L: LifecycleNotifier>(&self, notifier: &L) -> JoinHandle<()> {
        let mut events = notifier.subscribe();
        let weak = Arc::downgrade(&self.core);
        self.core.runtime.spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(core) = weak.upgrade() else { break };
                        core.handle_event(event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "lifecycle events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Installs the process-wide unlock hook, invoked once per unlock
    /// transition regardless of which call triggered it.
    pub fn on_unlock(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.core.hook_slot() = Some(Arc::new(hook));
    }

    /// Returns a receiver that observes every lock-state change.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<LockState> {
        self.core.state_tx.subscribe()
    }

    /// Current lock-state snapshot.
    #[must_use]
    pub fn state(&self) -> LockState {
        self.core.state().lock
    }

    /// Returns true while the content must stay covered.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state().is_locked()
    }
}

impl<P, O, R, C> GateCore<P, O, R, C>
where
    P: CredentialProvider + 'static,
    O: OverlayPresenter + 'static,
    R: SettingsRouter + 'static,
    C: Clock + 'static,
{
    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hook_slot(&self) -> MutexGuard<'_, Option<UnlockHook>> {
        self.unlock_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn unlock_hook(&self) -> Option<UnlockHook> {
        self.hook_slot().clone()
    }

    fn authenticate(&self, callbacks: AttemptCallbacks) {
        let success = {
            let mut state = self.state();
            if state.lock.is_unlocked() {
                callbacks.on_success
            } else if state.attempt.is_in_flight() {
                debug!("duplicate authenticate call absorbed");
                return;
            } else {
                self.begin_attempt(&mut state, callbacks);
                return;
            }
        };
        if let Some(success) = success {
            success();
        }
    }

    /// Starts a credential check. Caller holds the state lock and has
    /// already ruled out an in-flight attempt.
    fn begin_attempt(&self, state: &mut GateState, callbacks: AttemptCallbacks) {
        let id = AttemptId::new();
        state.attempt = AttemptState::InFlight { id };
        state.interrupted = false;
        self.set_lock(state, LockState::Locked(LockPhase::Attempting));
        self.overlay.show();
        debug!(%id, "credential attempt started");

        let Some(core) = self.weak.upgrade() else {
            return;
        };
        let challenge = self.config.challenge();
        self.runtime.spawn(async move {
            let outcome = core.provider.check(&challenge).await;
            core.complete(id, outcome, callbacks);
        });
    }

    /// Delivers a provider result back into the serialized state.
    fn complete(&self, id: AttemptId, outcome: CredentialOutcome, callbacks: AttemptCallbacks) {
        let notifications = {
            let mut state = self.state();
            if state.attempt.id() != Some(id) {
                debug!(%id, "stale credential result discarded");
                return;
            }
            if !state.in_foreground {
                debug!(%id, "result arrived while backgrounded; deferring");
                state.deferred = Some(Deferred { outcome, callbacks });
                return;
            }
            self.apply_outcome(&mut state, outcome, callbacks)
        };
        notifications.dispatch();
    }

    /// Applies a provider result while in the foreground. Caller holds
    /// the state lock; the returned host callbacks fire after release.
    fn apply_outcome(
        &self,
        state: &mut GateState,
        outcome: CredentialOutcome,
        mut callbacks: AttemptCallbacks,
    ) -> Notifications {
        state.attempt = AttemptState::Idle;
        state.interrupted = false;

        let mut notifications = Notifications {
            hook: None,
            success: None,
            failure: None,
        };
        match outcome {
            CredentialOutcome::Granted => {
                self.set_lock(state, LockState::Unlocked);
                self.overlay.hide();
                info!("unlocked");
                notifications.hook = self.unlock_hook();
                notifications.success = callbacks.on_success.take();
            }
            CredentialOutcome::Denied(reason) if reason.is_cancellation() => {
                self.set_lock(state, LockState::Locked(LockPhase::RetryPending));
                self.overlay
                    .show_with_retry(&self.config.retry_prompt, self.retry_action());
                debug!(%reason, "attempt cancelled, retry surfaced");
            }
            CredentialOutcome::Denied(reason) => {
                self.set_lock(state, LockState::Locked(LockPhase::NoAttempt));
                self.overlay.show();
                warn!(%reason, "credential denied");
                if let Some(failure) = callbacks.on_failure.take() {
                    notifications.failure = Some((failure, GateError::Denied(reason)));
                }
            }
            CredentialOutcome::Unavailable(reason) => {
                self.set_lock(state, LockState::Locked(LockPhase::NoAttempt));
                self.overlay.show();
                warn!(%reason, "credential check unavailable");
                if reason == UnavailableReason::NoCredentialEnrolled {
                    if let Err(error) = self.settings.open_credential_settings() {
                        warn!(%error, "settings redirect failed");
                    }
                }
                if let Some(failure) = callbacks.on_failure.take() {
                    notifications.failure = Some((failure, GateError::Unavailable(reason)));
                }
            }
        }
        notifications
    }

    fn handle_event(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::EnteredBackground => self.entered_background(),
            LifecycleEvent::WillEnterForeground => self.will_enter_foreground(),
        }
    }

    fn entered_background(&self) {
        let mut state = self.state();
        state.in_foreground = false;
        // A repeated background event keeps the original trip start.
        if state.background_at.is_none() {
            state.background_at = Some(self.clock.now());
        }
        if state.attempt.is_in_flight() {
            state.interrupted = true;
            debug!("backgrounded with attempt in flight");
        }
        if state.lock.is_unlocked() && self.config.relock == RelockPolicy::OnBackground {
            self.set_lock(&mut state, LockState::Locked(LockPhase::NoAttempt));
            state.rearmed = true;
            self.overlay.show();
            debug!("re-armed on background");
        }
    }

    fn will_enter_foreground(&self) {
        let notifications = {
            let mut state = self.state();
            state.in_foreground = true;
            let backgrounded_for = state
                .background_at
                .take()
                .map(|at| (self.clock.now() - at).to_std().unwrap_or(Duration::ZERO));

            if let Some(deferred) = state.deferred.take() {
                // The user proved presence while backgrounded; apply the
                // stored result and skip the relock check for this cycle.
                state.rearmed = false;
                Some(self.apply_outcome(&mut state, deferred.outcome, deferred.callbacks))
            } else {
                // A foreground event without a background trip (e.g. at
                // launch) never re-arms an unlocked gate.
                if let Some(elapsed) = backgrounded_for {
                    if state.lock.is_unlocked() && self.config.relock.rearms_after(elapsed) {
                        self.set_lock(&mut state, LockState::Locked(LockPhase::NoAttempt));
                        state.rearmed = true;
                        self.overlay.show();
                        debug!("re-armed on foreground entry");
                    }
                }
                match state.lock {
                    LockState::Unlocked => {}
                    LockState::Locked(LockPhase::Attempting) => {
                        if state.interrupted {
                            // The system likely tore the prompt down while
                            // backgrounded; the outstanding result will
                            // still be accepted whenever it resolves.
                            self.overlay
                                .show_with_retry(&self.config.retry_prompt, self.retry_action());
                        }
                    }
                    LockState::Locked(LockPhase::RetryPending) => {
                        self.overlay
                            .show_with_retry(&self.config.retry_prompt, self.retry_action());
                    }
                    LockState::Locked(LockPhase::NoAttempt) => {
                        let due = state.interrupted
                            || state.rearmed
                            || self.config.relock == RelockPolicy::OnBackground;
                        if due {
                            state.interrupted = false;
                            self.begin_attempt(&mut state, AttemptCallbacks::none());
                        }
                    }
                }
                state.rearmed = false;
                None
            }
        };
        if let Some(notifications) = notifications {
            notifications.dispatch();
        }
    }

    fn set_lock(&self, state: &mut GateState, lock: LockState) {
        if state.lock != lock {
            debug!(from = state.lock.describe(), to = lock.describe(), "lock state changed");
            state.lock = lock;
            self.state_tx.send_replace(lock);
        }
    }

    fn retry_action(&self) -> RetryAction {
        let weak = self.weak.clone();
        Box::new(move || {
            if let Some(core) = weak.upgrade() {
                core.authenticate(AttemptCallbacks::none());
            }
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::significant_drop_tightening
)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;
    use tokio::sync::Semaphore;

    use latch_domain::{CredentialChallenge, DenialReason, RetryPrompt};

    use super::*;

    /// Provider that replays scripted outcomes; each call consumes one
    /// semaphore permit, so tests can hold a check open.
    #[derive(Clone)]
    struct ScriptedProvider {
        inner: Arc<ProviderInner>,
    }

    struct ProviderInner {
        outcomes: Mutex<VecDeque<CredentialOutcome>>,
        calls: AtomicUsize,
        permits: Semaphore,
    }

    impl ScriptedProvider {
        /// Outcomes resolve as soon as the gate asks.
        fn immediate(outcomes: impl IntoIterator<Item = CredentialOutcome>) -> Self {
            let outcomes: VecDeque<_> = outcomes.into_iter().collect();
            let permits = Semaphore::new(outcomes.len());
            Self {
                inner: Arc::new(ProviderInner {
                    outcomes: Mutex::new(outcomes),
                    calls: AtomicUsize::new(0),
                    permits,
                }),
            }
        }

        /// Outcomes resolve only when the test calls [`Self::release`].
        fn held(outcomes: impl IntoIterator<Item = CredentialOutcome>) -> Self {
            let provider = Self::immediate(outcomes);
            provider
                .inner
                .permits
                .forget_permits(provider.inner.permits.available_permits());
            provider
        }

        fn release(&self) {
            self.inner.permits.add_permits(1);
        }

        fn calls(&self) -> usize {
            self.inner.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialProvider for ScriptedProvider {
        async fn check(&self, _challenge: &CredentialChallenge) -> CredentialOutcome {
            self.inner.calls.fetch_add(1, Ordering::SeqCst);
            let permit = self.inner.permits.acquire().await.expect("semaphore closed");
            permit.forget();
            self.inner
                .outcomes
                .lock()
                .expect("lock poisoned")
                .pop_front()
                .unwrap_or(CredentialOutcome::Granted)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum OverlayOp {
        Show,
        ShowRetry,
        Hide,
    }

    /// Presenter that records every call and keeps the latest retry action
    /// so tests can tap it.
    #[derive(Clone, Default)]
    struct RecordingOverlay {
        inner: Arc<OverlayInner>,
    }

    #[derive(Default)]
    struct OverlayInner {
        ops: Mutex<Vec<OverlayOp>>,
        retry: Mutex<Option<RetryAction>>,
    }

    impl RecordingOverlay {
        fn ops(&self) -> Vec<OverlayOp> {
            self.inner.ops.lock().expect("lock poisoned").clone()
        }

        fn hides(&self) -> usize {
            self.ops().iter().filter(|op| **op == OverlayOp::Hide).count()
        }

        fn tap_retry(&self) {
            let action = self.inner.retry.lock().expect("lock poisoned").take();
            action.expect("no retry affordance surfaced")();
        }
    }

    impl OverlayPresenter for RecordingOverlay {
        fn show(&self) {
            self.inner.ops.lock().expect("lock poisoned").push(OverlayOp::Show);
        }

        fn show_with_retry(&self, _prompt: &RetryPrompt, on_retry: RetryAction) {
            self.inner
                .ops
                .lock()
                .expect("lock poisoned")
                .push(OverlayOp::ShowRetry);
            *self.inner.retry.lock().expect("lock poisoned") = Some(on_retry);
        }

        fn hide(&self) {
            self.inner.ops.lock().expect("lock poisoned").push(OverlayOp::Hide);
        }
    }

    #[derive(Clone, Default)]
    struct RecordingRouter {
        opened: Arc<AtomicUsize>,
    }

    impl RecordingRouter {
        fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }
    }

    impl SettingsRouter for RecordingRouter {
        fn open_credential_settings(&self) -> Result<(), crate::ports::SettingsError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Clone)]
    struct ManualClock {
        now: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Arc::new(Mutex::new(Utc::now())),
            }
        }

        fn advance(&self, delta: TimeDelta) {
            let mut now = self.now.lock().expect("lock poisoned");
            *now += delta;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().expect("lock poisoned")
        }
    }

    struct Harness {
        gate: Gate<ScriptedProvider, RecordingOverlay, RecordingRouter, ManualClock>,
        provider: ScriptedProvider,
        overlay: RecordingOverlay,
        router: RecordingRouter,
        clock: ManualClock,
        unlocks: Arc<AtomicUsize>,
    }

    fn harness(provider: ScriptedProvider, config: GateConfig) -> Harness {
        let overlay = RecordingOverlay::default();
        let router = RecordingRouter::default();
        let clock = ManualClock::new();
        let gate = Gate::new(
            provider.clone(),
            overlay.clone(),
            router.clone(),
            clock.clone(),
            config,
        )
        .expect("gate construction failed");
        let unlocks = Arc::new(AtomicUsize::new(0));
        let hook_count = Arc::clone(&unlocks);
        gate.on_unlock(move || {
            hook_count.fetch_add(1, Ordering::SeqCst);
        });
        Harness {
            gate,
            provider,
            overlay,
            router,
            clock,
            unlocks,
        }
    }

    /// Lets spawned attempt tasks run to completion on the test's
    /// current-thread runtime.
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn counting_callbacks(
        successes: &Arc<AtomicUsize>,
        failures: &Arc<Mutex<Vec<GateError>>>,
    ) -> (impl FnOnce() + Send + 'static, impl FnOnce(GateError) + Send + 'static) {
        let successes = Arc::clone(successes);
        let failures = Arc::clone(failures);
        (
            move || {
                successes.fetch_add(1, Ordering::SeqCst);
            },
            move |error| {
                failures.lock().expect("lock poisoned").push(error);
            },
        )
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = Gate::new(
            ScriptedProvider::immediate([]),
            RecordingOverlay::default(),
            RecordingRouter::default(),
            ManualClock::new(),
            GateConfig::default(),
        );
        assert!(matches!(result, Err(ApplicationError::Runtime(_))));
    }

    #[tokio::test]
    async fn test_blank_retry_prompt_rejected() {
        let config = GateConfig {
            retry_prompt: RetryPrompt {
                title: String::new(),
                ..RetryPrompt::default()
            },
            ..GateConfig::default()
        };
        let result = Gate::new(
            ScriptedProvider::immediate([]),
            RecordingOverlay::default(),
            RecordingRouter::default(),
            ManualClock::new(),
            config,
        );
        assert!(matches!(result, Err(ApplicationError::Domain(_))));
    }

    #[tokio::test]
    async fn test_construction_covers_content() {
        let h = harness(ScriptedProvider::immediate([]), GateConfig::default());
        assert!(h.gate.is_locked());
        assert_eq!(h.overlay.ops(), vec![OverlayOp::Show]);
    }

    #[tokio::test]
    async fn test_grant_unlocks_and_notifies_once() {
        let h = harness(
            ScriptedProvider::immediate([CredentialOutcome::Granted]),
            GateConfig::default(),
        );
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let (on_success, on_failure) = counting_callbacks(&successes, &failures);

        h.gate.authenticate(on_success, on_failure);
        settle().await;

        assert_eq!(h.gate.state(), LockState::Unlocked);
        assert_eq!(h.overlay.hides(), 1);
        assert_eq!(h.provider.calls(), 1);
        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(h.unlocks.load(Ordering::SeqCst), 1);
        assert!(failures.lock().expect("lock poisoned").is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_calls_invoke_provider_once() {
        let h = harness(
            ScriptedProvider::held([CredentialOutcome::Granted]),
            GateConfig::default(),
        );
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(Mutex::new(Vec::new()));

        let (on_success, on_failure) = counting_callbacks(&successes, &failures);
        h.gate.authenticate(on_success, on_failure);
        settle().await;
        let (on_success, on_failure) = counting_callbacks(&successes, &failures);
        h.gate.authenticate(on_success, on_failure);
        settle().await;

        assert_eq!(h.provider.calls(), 1);

        h.provider.release();
        settle().await;

        assert_eq!(h.gate.state(), LockState::Unlocked);
        // Only the first call's callbacks survive; the duplicate was
        // absorbed without notification.
        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(h.unlocks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_surfaces_retry_without_failure() {
        let h = harness(
            ScriptedProvider::immediate([CredentialOutcome::Denied(DenialReason::UserCancelled)]),
            GateConfig::default(),
        );
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let (on_success, on_failure) = counting_callbacks(&successes, &failures);

        h.gate.authenticate(on_success, on_failure);
        settle().await;

        assert_eq!(h.gate.state(), LockState::Locked(LockPhase::RetryPending));
        assert_eq!(h.overlay.ops().last(), Some(&OverlayOp::ShowRetry));
        assert_eq!(successes.load(Ordering::SeqCst), 0);
        assert!(failures.lock().expect("lock poisoned").is_empty());
    }

    #[tokio::test]
    async fn test_cancel_then_retry_grants() {
        let h = harness(
            ScriptedProvider::immediate([
                CredentialOutcome::Denied(DenialReason::UserCancelled),
                CredentialOutcome::Granted,
            ]),
            GateConfig::default(),
        );

        h.gate.authenticate(|| {}, |_| {});
        settle().await;
        assert_eq!(h.gate.state(), LockState::Locked(LockPhase::RetryPending));

        h.overlay.tap_retry();
        settle().await;

        assert_eq!(h.gate.state(), LockState::Unlocked);
        assert_eq!(h.provider.calls(), 2);
        assert_eq!(h.unlocks.load(Ordering::SeqCst), 1);
        assert_eq!(h.overlay.hides(), 1);
    }

    #[tokio::test]
    async fn test_hard_denial_reports_failure_and_stays_locked() {
        let h = harness(
            ScriptedProvider::immediate([CredentialOutcome::Denied(DenialReason::Mismatch)]),
            GateConfig::default(),
        );
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let (on_success, on_failure) = counting_callbacks(&successes, &failures);

        h.gate.authenticate(on_success, on_failure);
        settle().await;

        assert_eq!(h.gate.state(), LockState::Locked(LockPhase::NoAttempt));
        assert_eq!(h.overlay.hides(), 0);
        assert_eq!(
            *failures.lock().expect("lock poisoned"),
            vec![GateError::Denied(DenialReason::Mismatch)]
        );
        // No automatic retry loop after a hard denial.
        assert_eq!(h.provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_enrollment_redirects_to_settings() {
        let h = harness(
            ScriptedProvider::immediate([CredentialOutcome::Unavailable(
                UnavailableReason::NoCredentialEnrolled,
            )]),
            GateConfig::default(),
        );
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let (on_success, on_failure) = counting_callbacks(&successes, &failures);

        h.gate.authenticate(on_success, on_failure);
        settle().await;

        // Never a silent grant: missing enrollment keeps the gate locked.
        assert_eq!(h.gate.state(), LockState::Locked(LockPhase::NoAttempt));
        assert_eq!(h.router.opened(), 1);
        assert_eq!(
            *failures.lock().expect("lock poisoned"),
            vec![GateError::Unavailable(UnavailableReason::NoCredentialEnrolled)]
        );
        assert_eq!(successes.load(Ordering::SeqCst), 0);
        assert_eq!(h.unlocks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hardware_unavailable_skips_settings() {
        let h = harness(
            ScriptedProvider::immediate([CredentialOutcome::Unavailable(
                UnavailableReason::HardwareUnavailable,
            )]),
            GateConfig::default(),
        );
        let failures = Arc::new(Mutex::new(Vec::new()));
        let (on_success, on_failure) = counting_callbacks(&Arc::new(AtomicUsize::new(0)), &failures);

        h.gate.authenticate(on_success, on_failure);
        settle().await;

        assert_eq!(h.router.opened(), 0);
        assert_eq!(
            *failures.lock().expect("lock poisoned"),
            vec![GateError::Unavailable(UnavailableReason::HardwareUnavailable)]
        );
        assert!(h.gate.is_locked());
    }

    #[tokio::test]
    async fn test_result_after_foreground_entry_unlocks() {
        let h = harness(
            ScriptedProvider::held([CredentialOutcome::Granted]),
            GateConfig::default(),
        );
        h.gate.authenticate(|| {}, |_| {});
        settle().await;

        h.gate.handle_event(LifecycleEvent::EnteredBackground);
        h.gate.handle_event(LifecycleEvent::WillEnterForeground);
        assert_eq!(h.gate.state(), LockState::Locked(LockPhase::Attempting));
        // Interrupted attempt re-surfaces the retry affordance on
        // foreground entry while the check is still outstanding.
        assert_eq!(h.overlay.ops().last(), Some(&OverlayOp::ShowRetry));

        h.provider.release();
        settle().await;

        assert_eq!(h.gate.state(), LockState::Unlocked);
        assert_eq!(h.overlay.hides(), 1);
        assert_eq!(h.unlocks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_result_while_backgrounded_is_deferred() {
        let h = harness(
            ScriptedProvider::held([CredentialOutcome::Granted]),
            GateConfig::default(),
        );
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let (on_success, on_failure) = counting_callbacks(&successes, &failures);
        h.gate.authenticate(on_success, on_failure);
        settle().await;

        h.gate.handle_event(LifecycleEvent::EnteredBackground);
        h.provider.release();
        settle().await;

        // The result arrived while backgrounded: stored, not applied, and
        // the overlay is untouched.
        assert_eq!(h.gate.state(), LockState::Locked(LockPhase::Attempting));
        assert_eq!(h.overlay.hides(), 0);
        assert_eq!(successes.load(Ordering::SeqCst), 0);

        h.gate.handle_event(LifecycleEvent::WillEnterForeground);

        assert_eq!(h.gate.state(), LockState::Unlocked);
        assert_eq!(h.overlay.hides(), 1);
        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(h.unlocks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_relock_on_background_cycle() {
        let h = harness(
            ScriptedProvider::immediate([CredentialOutcome::Granted, CredentialOutcome::Granted]),
            GateConfig::default(),
        );
        h.gate.authenticate(|| {}, |_| {});
        settle().await;
        assert_eq!(h.gate.state(), LockState::Unlocked);

        h.gate.handle_event(LifecycleEvent::EnteredBackground);
        assert_eq!(h.gate.state(), LockState::Locked(LockPhase::NoAttempt));
        assert_eq!(h.overlay.ops().last(), Some(&OverlayOp::Show));

        h.gate.handle_event(LifecycleEvent::WillEnterForeground);
        settle().await;

        assert_eq!(h.gate.state(), LockState::Unlocked);
        assert_eq!(h.provider.calls(), 2);
        assert_eq!(h.unlocks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_grace_window_short_trip_stays_unlocked() {
        let config = GateConfig {
            relock: RelockPolicy::AfterBackgroundFor(Duration::from_secs(30)),
            ..GateConfig::default()
        };
        let h = harness(ScriptedProvider::immediate([CredentialOutcome::Granted]), config);
        h.gate.authenticate(|| {}, |_| {});
        settle().await;

        h.gate.handle_event(LifecycleEvent::EnteredBackground);
        assert_eq!(h.gate.state(), LockState::Unlocked);
        h.clock.advance(TimeDelta::seconds(5));
        h.gate.handle_event(LifecycleEvent::WillEnterForeground);

        assert_eq!(h.gate.state(), LockState::Unlocked);
        assert_eq!(h.provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_grace_window_long_trip_relocks() {
        let config = GateConfig {
            relock: RelockPolicy::AfterBackgroundFor(Duration::from_secs(30)),
            ..GateConfig::default()
        };
        let provider = ScriptedProvider::held([CredentialOutcome::Granted]);
        provider.release();
        let h = harness(provider, config);
        h.gate.authenticate(|| {}, |_| {});
        settle().await;
        assert_eq!(h.gate.state(), LockState::Unlocked);

        h.gate.handle_event(LifecycleEvent::EnteredBackground);
        h.clock.advance(TimeDelta::seconds(31));
        h.gate.handle_event(LifecycleEvent::WillEnterForeground);
        settle().await;

        // Re-armed and prompting again; the second check is still open.
        assert_eq!(h.gate.state(), LockState::Locked(LockPhase::Attempting));
        assert_eq!(h.provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_never_policy_keeps_unlock() {
        let config = GateConfig {
            relock: RelockPolicy::Never,
            ..GateConfig::default()
        };
        let h = harness(ScriptedProvider::immediate([CredentialOutcome::Granted]), config);
        h.gate.authenticate(|| {}, |_| {});
        settle().await;

        h.gate.handle_event(LifecycleEvent::EnteredBackground);
        h.gate.handle_event(LifecycleEvent::WillEnterForeground);

        assert_eq!(h.gate.state(), LockState::Unlocked);
        assert_eq!(h.provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_foreground_without_background_keeps_unlock() {
        let h = harness(
            ScriptedProvider::immediate([CredentialOutcome::Granted]),
            GateConfig::default(),
        );
        h.gate.authenticate(|| {}, |_| {});
        settle().await;

        h.gate.handle_event(LifecycleEvent::WillEnterForeground);

        assert_eq!(h.gate.state(), LockState::Unlocked);
        assert_eq!(h.provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_authenticate_while_unlocked_short_circuits() {
        let h = harness(
            ScriptedProvider::immediate([CredentialOutcome::Granted]),
            GateConfig::default(),
        );
        h.gate.authenticate(|| {}, |_| {});
        settle().await;
        let ops_before = h.overlay.ops().len();

        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let (on_success, on_failure) = counting_callbacks(&successes, &failures);
        h.gate.authenticate(on_success, on_failure);
        settle().await;

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(h.provider.calls(), 1);
        assert_eq!(h.overlay.ops().len(), ops_before);
        // The hook marks unlock transitions, not repeated calls.
        assert_eq!(h.unlocks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_affordance_reshown_on_foreground() {
        let h = harness(
            ScriptedProvider::immediate([CredentialOutcome::Denied(DenialReason::UserCancelled)]),
            GateConfig::default(),
        );
        h.gate.authenticate(|| {}, |_| {});
        settle().await;
        assert_eq!(h.gate.state(), LockState::Locked(LockPhase::RetryPending));

        h.gate.handle_event(LifecycleEvent::EnteredBackground);
        h.gate.handle_event(LifecycleEvent::WillEnterForeground);

        assert_eq!(h.gate.state(), LockState::Locked(LockPhase::RetryPending));
        assert_eq!(h.overlay.ops().last(), Some(&OverlayOp::ShowRetry));
    }

    #[tokio::test]
    async fn test_stale_result_discarded() {
        let h = harness(ScriptedProvider::immediate([]), GateConfig::default());
        h.gate.core.complete(
            AttemptId::new(),
            CredentialOutcome::Granted,
            AttemptCallbacks::none(),
        );
        assert_eq!(h.gate.state(), LockState::Locked(LockPhase::NoAttempt));
        assert_eq!(h.overlay.hides(), 0);
    }

    #[tokio::test]
    async fn test_bind_forwards_lifecycle_events() {
        struct ChannelNotifier {
            tx: broadcast::Sender<LifecycleEvent>,
        }

        impl LifecycleNotifier for ChannelNotifier {
            fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
                self.tx.subscribe()
            }
        }

        let h = harness(
            ScriptedProvider::immediate([CredentialOutcome::Granted]),
            GateConfig::default(),
        );
        let (tx, _keepalive) = broadcast::channel(8);
        let notifier = ChannelNotifier { tx };
        let forwarder = h.gate.bind(&notifier);

        h.gate.authenticate(|| {}, |_| {});
        settle().await;
        assert_eq!(h.gate.state(), LockState::Unlocked);

        notifier
            .tx
            .send(LifecycleEvent::EnteredBackground)
            .expect("send failed");
        settle().await;
        assert_eq!(h.gate.state(), LockState::Locked(LockPhase::NoAttempt));

        forwarder.abort();
    }

    #[tokio::test]
    async fn test_state_watch_publishes_transitions() {
        let h = harness(
            ScriptedProvider::immediate([CredentialOutcome::Granted]),
            GateConfig::default(),
        );
        let mut states = h.gate.subscribe_state();
        assert_eq!(*states.borrow(), LockState::Locked(LockPhase::NoAttempt));

        h.gate.authenticate(|| {}, |_| {});
        settle().await;

        assert!(states.has_changed().expect("watch closed"));
        assert_eq!(*states.borrow_and_update(), LockState::Unlocked);
    }
}
