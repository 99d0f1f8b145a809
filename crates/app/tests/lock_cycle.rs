//! End-to-end lock cycle through the public wiring: real lifecycle
//! notifier, headless overlay, scripted credential provider.

#![allow(clippy::expect_used, clippy::panic)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::{oneshot, watch};

use latch_application::Gate;
use latch_application::ports::{CredentialProvider, SettingsError, SettingsRouter};
use latch_domain::{
    CredentialChallenge, CredentialOutcome, GateConfig, GateError, LockPhase, LockState,
    UnavailableReason,
};
use latch_infrastructure::{AppLifecycle, SystemClock, TracingOverlay};

struct ScriptedProvider {
    outcomes: Mutex<VecDeque<CredentialOutcome>>,
}

impl ScriptedProvider {
    fn new(outcomes: impl IntoIterator<Item = CredentialOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
        }
    }
}

#[async_trait]
impl CredentialProvider for ScriptedProvider {
    async fn check(&self, _challenge: &CredentialChallenge) -> CredentialOutcome {
        self.outcomes
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or(CredentialOutcome::Granted)
    }
}

#[derive(Clone, Default)]
struct RecordingRouter {
    opened: Arc<AtomicUsize>,
}

impl SettingsRouter for RecordingRouter {
    fn open_credential_settings(&self) -> Result<(), SettingsError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn wait_until(states: &mut watch::Receiver<LockState>, predicate: impl Fn(LockState) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !predicate(*states.borrow_and_update()) {
            states.changed().await.expect("gate dropped");
        }
    })
    .await
    .expect("timed out waiting for lock state");
}

#[tokio::test]
async fn full_cycle_unlocks_relocks_and_unlocks_again() {
    let lifecycle = AppLifecycle::new();
    let overlay = TracingOverlay::new();
    let router = RecordingRouter::default();
    let gate = Gate::new(
        ScriptedProvider::new([CredentialOutcome::Granted, CredentialOutcome::Granted]),
        overlay.clone(),
        router.clone(),
        SystemClock::new(),
        GateConfig::default(),
    )
    .expect("gate construction failed");

    let unlocks = Arc::new(AtomicUsize::new(0));
    let hook_count = Arc::clone(&unlocks);
    gate.on_unlock(move || {
        hook_count.fetch_add(1, Ordering::SeqCst);
    });
    let forwarder = gate.bind(&lifecycle);
    let mut states = gate.subscribe_state();

    assert!(overlay.is_visible());

    let (unlocked_tx, unlocked_rx) = oneshot::channel();
    gate.authenticate(
        move || {
            let _ = unlocked_tx.send(());
        },
        |error| panic!("unexpected failure: {error}"),
    );
    wait_until(&mut states, |state| state.is_unlocked()).await;
    unlocked_rx.await.expect("success callback dropped");
    assert!(!overlay.is_visible());

    lifecycle.entered_background();
    wait_until(&mut states, |state| state.is_locked()).await;
    assert!(overlay.is_visible());

    lifecycle.will_enter_foreground();
    wait_until(&mut states, |state| state.is_unlocked()).await;
    assert!(!overlay.is_visible());

    assert_eq!(unlocks.load(Ordering::SeqCst), 2);
    assert_eq!(router.opened.load(Ordering::SeqCst), 0);
    forwarder.abort();
}

#[tokio::test]
async fn missing_enrollment_keeps_lock_and_routes_to_settings() {
    let overlay = TracingOverlay::new();
    let router = RecordingRouter::default();
    let gate = Gate::new(
        ScriptedProvider::new([CredentialOutcome::Unavailable(
            UnavailableReason::NoCredentialEnrolled,
        )]),
        overlay.clone(),
        router.clone(),
        SystemClock::new(),
        GateConfig::default(),
    )
    .expect("gate construction failed");

    let (failed_tx, failed_rx) = oneshot::channel();
    gate.authenticate(
        || panic!("a missing credential must never grant access"),
        move |error| {
            let _ = failed_tx.send(error);
        },
    );

    let error = tokio::time::timeout(Duration::from_secs(5), failed_rx)
        .await
        .expect("timed out waiting for failure")
        .expect("failure callback dropped");

    assert_eq!(
        error,
        GateError::Unavailable(UnavailableReason::NoCredentialEnrolled)
    );
    assert_eq!(gate.state(), LockState::Locked(LockPhase::NoAttempt));
    assert!(overlay.is_visible());
    assert_eq!(router.opened.load(Ordering::SeqCst), 1);
}
