//! Ephemera demo: two simulated clients sharing presence over an
//! in-memory relay.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

use ephemera_core::config::EphemeraConfig;
use ephemera_core::error::SyncError;
use ephemera_core::types::{PresenceState, UserId};
use ephemera_presence::{MemoryHub, PresenceSession, SessionContext};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<EphemeraConfig, SyncError> {
    let env = std::env::var("EPHEMERA_ENV").unwrap_or_else(|_| "development".to_string());
    EphemeraConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &EphemeraConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: EphemeraConfig) -> Result<(), SyncError> {
    tracing::info!("Starting Ephemera demo v{}", env!("CARGO_PKG_VERSION"));

    let hub = MemoryHub::default();
    let alice = PresenceSession::new(
        &config,
        UserId::from("alice"),
        SessionContext::new(Arc::new(hub.join())),
    );
    let bob = PresenceSession::new(
        &config,
        UserId::from("bob"),
        SessionContext::new(Arc::new(hub.join())),
    );

    alice.start().await?;
    bob.start().await?;

    alice
        .initialize(
            PresenceState::Online,
            Some(serde_json::json!({ "page": "intro" })),
        )
        .await?;
    bob.initialize(PresenceState::Online, None).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    bob.update(
        PresenceState::Away,
        Some(serde_json::json!({ "reason": "coffee" })),
    )
    .await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    for session in [&alice, &bob] {
        let viewer = session.tracker.user_id().clone();
        session.tracker.for_each(None, |user| {
            tracing::info!(
                viewer = %viewer,
                user_id = %user.user_id(),
                state = %user.state(),
                last_updated = user.last_updated(),
                local = user.is_local_user(),
                "Roster entry"
            );
        })?;
        tracing::info!(
            viewer = %viewer,
            online = session.tracker.count(Some(PresenceState::Online))?,
            away = session.tracker.count(Some(PresenceState::Away))?,
            metrics = ?session.metrics.snapshot(),
            "Roster summary"
        );
    }

    alice.shutdown();
    bob.shutdown();
    tracing::info!("Ephemera demo finished");
    Ok(())
}
