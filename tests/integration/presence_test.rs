//! Integration tests for presence exchange between simulated clients.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ephemera_core::config::EphemeraConfig;
use ephemera_core::error::ErrorKind;
use ephemera_core::traits::EventTransport;
use ephemera_core::types::{PresenceState, Role, UserId};
use ephemera_presence::{ChangeOrigin, StaticRoleVerifier};

use helpers::{TestWorld, settle};

#[tokio::test(start_paused = true)]
async fn test_peer_goes_offline_after_expiration() {
    let world = TestWorld::new();
    let a = world.started_client("u1").await;
    let b = world.started_client("u2").await;

    a.session
        .initialize(PresenceState::Online, None)
        .await
        .expect("initialize");
    settle().await;

    let roster = b.session.tracker.roster();
    let seen = roster.find_by_user(&UserId::from("u1")).expect("u1 merged");
    assert_eq!(seen.state(), PresenceState::Online);
    assert_eq!(roster.count(Some(PresenceState::Online)), 1);

    a.session.shutdown();
    let expiration = world.config.presence.expiration_period_ms;
    world.advance_wall_clock(expiration + 1).await;

    let mut online = 0;
    roster.for_each(Some(PresenceState::Online), |_| online += 1);
    let mut all = 0;
    roster.for_each(None, |_| all += 1);
    assert_eq!(online, 0);
    assert_eq!(all, 1);

    let gone = roster.find_by_user(&UserId::from("u1")).expect("still listed");
    assert_eq!(gone.state(), PresenceState::Offline);
    assert_eq!(gone.stored_state(), PresenceState::Online);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_keeps_peer_online() {
    let world = TestWorld::new();
    let a = world.started_client("u1").await;
    let b = world.started_client("u2").await;
    a.session
        .initialize(PresenceState::Online, None)
        .await
        .expect("initialize");
    settle().await;

    let interval = world.config.sync.update_interval_ms as i64;
    for _ in 0..4 {
        world.advance(interval).await;
    }

    let roster = b.session.tracker.roster();
    assert_eq!(roster.count(Some(PresenceState::Online)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_record_before_expiry_restores_state() {
    let world = TestWorld::new();
    let a = world.started_client("u1").await;
    let b = world.started_client("u2").await;
    a.session
        .initialize(PresenceState::Online, None)
        .await
        .expect("initialize");
    settle().await;

    let expiration = world.config.presence.expiration_period_ms;
    world.advance_wall_clock(expiration - 1_000).await;
    a.session
        .update(PresenceState::Away, Some(serde_json::json!({"reason": "lunch"})))
        .await
        .expect("update");
    settle().await;

    world.advance_wall_clock(expiration - 1_000).await;
    let seen = b
        .session
        .tracker
        .roster()
        .find_by_user(&UserId::from("u1"))
        .expect("u1");
    assert_eq!(seen.state(), PresenceState::Away);
    assert_eq!(seen.payload(), Some(&serde_json::json!({"reason": "lunch"})));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_update_is_recovered_by_next_heartbeat() {
    let world = TestWorld::new();
    let a = world.started_client("u1").await;
    let b = world.started_client("u2").await;
    a.session
        .initialize(PresenceState::Online, None)
        .await
        .expect("initialize");
    settle().await;

    let seen_by_b = |b: &helpers::TestClient| {
        b.session
            .tracker
            .roster()
            .find_by_user(&UserId::from("u1"))
            .expect("u1")
            .state()
    };

    a.transport.set_drop_outbound(true);
    a.session
        .update(PresenceState::Away, None)
        .await
        .expect("update");
    settle().await;
    assert_eq!(seen_by_b(&b), PresenceState::Online);
    assert_eq!(
        a.session.tracker.local_user().expect("local").state(),
        PresenceState::Away
    );

    a.transport.set_drop_outbound(false);
    world.advance(world.config.sync.update_interval_ms as i64).await;
    assert_eq!(seen_by_b(&b), PresenceState::Away);
}

#[tokio::test(start_paused = true)]
async fn test_loop_back_does_not_double_count() {
    let world = TestWorld::new();
    let a = world.started_client("u1").await;

    let local_events = Arc::new(AtomicUsize::new(0));
    let counter = local_events.clone();
    a.session.tracker.on_change(move |change| {
        if change.origin == ChangeOrigin::Local {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    a.session
        .initialize(PresenceState::Online, None)
        .await
        .expect("initialize");
    settle().await;

    let snapshot = a.session.metrics.snapshot();
    assert_eq!(local_events.load(Ordering::SeqCst), 1);
    assert_eq!(snapshot.local_changes, 1);
    assert_eq!(snapshot.remote_changes, 0);
    assert_eq!(snapshot.rejected_updates, 1);
    assert_eq!(a.session.tracker.count(None).expect("count"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_late_joiner_learns_existing_users() {
    let world = TestWorld::new();
    let a = world.started_client("alice").await;
    a.session
        .initialize(PresenceState::Online, None)
        .await
        .expect("initialize");
    settle().await;

    let b = world.started_client("bob").await;
    b.session
        .initialize(PresenceState::Online, None)
        .await
        .expect("initialize");
    settle().await;

    let names: Vec<String> = b
        .session
        .tracker
        .users(None)
        .expect("users")
        .iter()
        .map(|u| u.user_id().to_string())
        .collect();
    assert_eq!(names, vec!["alice", "bob"]);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_rebroadcasts_under_new_origin() {
    let world = TestWorld::new();
    let a = world.started_client("u1").await;
    let b = world.started_client("u2").await;
    a.session
        .initialize(PresenceState::Online, None)
        .await
        .expect("initialize");
    settle().await;

    let first_origin = a.transport.connection_id().expect("connected");
    a.transport.disconnect();
    settle().await;
    a.transport.connect();
    settle().await;

    let second_origin = a.transport.connection_id().expect("connected");
    assert_ne!(first_origin, second_origin);

    let roster = b.session.tracker.roster();
    let seen = roster.find_by_origin(&second_origin).expect("rebroadcast");
    assert_eq!(seen.user_id(), &UserId::from("u1"));
    assert!(roster.find_by_origin(&first_origin).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_restricted_roles_block_broadcast() {
    let mut config = EphemeraConfig::default();
    config.presence.allowed_roles = vec![Role::Organizer, Role::Presenter];
    let world = TestWorld::with_config(config);

    let guest = world.client_with_roles(
        "guest",
        Arc::new(StaticRoleVerifier::with_default_roles([Role::Attendee])),
    );
    guest.session.start().await.expect("start");
    let observer = world.started_client("observer").await;

    let err = guest
        .session
        .initialize(PresenceState::Online, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AuthorizationDenied);
    settle().await;

    assert_eq!(observer.session.tracker.roster().count(None), 0);
    assert!(!guest.session.tracker.is_initialized());
}

#[tokio::test(start_paused = true)]
async fn test_presenter_may_broadcast_when_restricted() {
    let mut config = EphemeraConfig::default();
    config.presence.allowed_roles = vec![Role::Presenter];
    let world = TestWorld::with_config(config);

    let verifier = Arc::new(StaticRoleVerifier::default());
    let presenter = world.client_with_roles("presenter", verifier.clone());
    let origin = presenter.transport.connection_id().expect("connected");
    verifier.assign(origin, [Role::Presenter]);
    presenter.session.start().await.expect("start");
    let observer = world.started_client("observer").await;

    presenter
        .session
        .initialize(PresenceState::Online, None)
        .await
        .expect("initialize");
    settle().await;

    let roster = observer.session.tracker.roster();
    assert!(roster.find_by_user(&UserId::from("presenter")).is_some());
}
