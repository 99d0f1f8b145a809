//! Latch demo host.
//!
//! Wires the gate to the infrastructure adapters and walks one full
//! lock/unlock cycle with a scripted credential provider: a cancelled
//! prompt, a retry tap, a background/foreground re-lock, and the final
//! unlock. Every transition is logged.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use latch_application::Gate;
use latch_application::ports::CredentialProvider;
use latch_domain::{
    CredentialChallenge, CredentialOutcome, DenialReason, GateConfig, LockState,
};
use latch_infrastructure::{AppLifecycle, SystemClock, SystemSettingsRouter, TracingOverlay};

/// Provider that replays a scripted run of outcomes, standing in for the
/// platform credential sheet.
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
    async fn check(&self, challenge: &CredentialChallenge) -> CredentialOutcome {
        info!(reason = %challenge.reason, "credential prompt presented");
        // Pretend the user takes a moment to respond.
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.outcomes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
            .unwrap_or(CredentialOutcome::Granted)
    }
}

/// Waits until the published lock state satisfies the predicate.
async fn wait_until(
    states: &mut watch::Receiver<LockState>,
    predicate: impl Fn(LockState) -> bool,
) -> Result<(), Box<dyn std::error::Error>> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !predicate(*states.borrow_and_update()) {
            states.changed().await?;
        }
        Ok::<_, watch::error::RecvError>(())
    })
    .await??;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Latch demo v{}", env!("CARGO_PKG_VERSION"));

    let lifecycle = AppLifecycle::new();
    let overlay = TracingOverlay::new();
    let provider = ScriptedProvider::new([
        CredentialOutcome::Denied(DenialReason::UserCancelled),
        CredentialOutcome::Granted,
        CredentialOutcome::Granted,
    ]);

    let gate = Gate::new(
        provider,
        overlay.clone(),
        SystemSettingsRouter::new(),
        SystemClock::new(),
        GateConfig::default(),
    )?;
    gate.on_unlock(|| info!("host hook: application unlocked"));
    let forwarder = gate.bind(&lifecycle);
    let mut states = gate.subscribe_state();

    // First prompt: the scripted user cancels, so the retry popup shows.
    gate.authenticate(
        || info!("initial unlock succeeded"),
        |error| warn!(%error, "initial unlock failed"),
    );
    wait_until(&mut states, |state| state.is_retry_pending()).await?;
    info!("user cancelled; tapping retry");

    overlay.trigger_retry();
    wait_until(&mut states, |state| state.is_unlocked()).await?;

    // A background/foreground cycle re-arms the gate and prompts again.
    lifecycle.entered_background();
    wait_until(&mut states, |state| state.is_locked()).await?;
    lifecycle.will_enter_foreground();
    wait_until(&mut states, |state| state.is_unlocked()).await?;

    info!(covered = overlay.is_visible(), "demo finished unlocked");
    forwarder.abort();
    Ok(())
}
