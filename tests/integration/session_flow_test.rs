//! End-to-end session lifecycle tests over the public API

use std::time::Duration;

use tokio::time::timeout;

use tessera::{Capability, IdentityProvider, Role};

use crate::test_harness::{wait_for_snapshot, wait_for_stats, PortalEnvironment};

#[tokio::test]
async fn test_member_journey_sign_in_refresh_sign_out() {
    let env = PortalEnvironment::new().await;

    // Sign in and wait for the profile to land.
    let session = env
        .sign_in_with_profile("ada@portal.test", Role::Staff)
        .await;
    assert!(
        wait_for_snapshot(&env.handle, |s| s.profile.is_some(), 2_000).await,
        "profile never reached the snapshot"
    );

    let tier = env.handle.access_tier();
    assert!(tier.allows(Capability::SubmitContent));
    assert!(tier.allows(Capability::ViewReports));
    assert!(!tier.allows(Capability::ManageBilling));
    assert!(!tier.read_only);

    // Rotate tokens; the member stays signed in and the profile is
    // refetched behind the scenes.
    let refreshed = env.provider.refresh_session().await.unwrap();
    assert!(
        wait_for_snapshot(
            &env.handle,
            |s| {
                s.session.as_ref().map(|held| held.access_token.as_str())
                    == Some(refreshed.access_token.as_str())
            },
            2_000
        )
        .await,
        "refreshed tokens never reached the snapshot"
    );
    let snapshot = env.handle.snapshot();
    assert_eq!(snapshot.user.as_ref().unwrap().id, session.user.id);
    assert!(snapshot.profile.is_some());
    assert!(wait_for_stats(&env.handle, |st| st.refreshes_applied == 2, 2_000).await);

    // Sign out through the handle; local state clears before the call
    // returns.
    env.handle.sign_out().await.unwrap();
    let snapshot = env.handle.snapshot();
    assert!(snapshot.user.is_none());
    assert!(snapshot.session.is_none());
    assert!(snapshot.profile.is_none());
    assert!(env.handle.access_tier().is_restricted());

    let stats = env.handle.stats().await;
    assert_eq!(stats.refreshes_started, 2);
    assert_eq!(stats.refreshes_applied, 2);
    assert_eq!(stats.sign_outs, 1);

    env.shutdown().await;
}

#[tokio::test]
async fn test_watcher_observes_lifecycle() {
    let env = PortalEnvironment::new().await;
    let mut watcher = env.handle.subscribe();

    env.sign_in_with_profile("grace@portal.test", Role::Member)
        .await;

    // Drive the watcher the way a UI layer would: changed() then borrow.
    let observed = timeout(Duration::from_secs(2), async {
        loop {
            if watcher.borrow().profile.is_some() {
                return watcher.borrow().clone();
            }
            watcher.changed().await.expect("state channel closed");
        }
    })
    .await
    .expect("watcher never saw the profile");

    assert!(observed.is_authenticated());
    assert_eq!(observed.profile.unwrap().role, Role::Member);

    env.shutdown().await;
}

#[tokio::test]
async fn test_churn_under_slow_store_settles_on_final_identity() {
    let env = PortalEnvironment::new().await;
    env.store
        .set_lookup_delay(Some(Duration::from_millis(100)))
        .await;

    let first = env.provider.sign_in("first@portal.test").await.unwrap();
    let second = env.provider.sign_in("second@portal.test").await.unwrap();
    env.store
        .insert(tessera::AuthorizationProfile::new(&first.user.id, Role::Admin));
    env.store
        .insert(tessera::AuthorizationProfile::new(&second.user.id, Role::Member));

    assert!(
        wait_for_stats(
            &env.handle,
            |st| st.refreshes_applied + st.refreshes_discarded == 2,
            2_000
        )
        .await,
        "both fetches should have completed"
    );

    let stats = env.handle.stats().await;
    assert_eq!(stats.refreshes_applied, 1);
    assert_eq!(stats.refreshes_discarded, 1);

    let snapshot = env.handle.snapshot();
    assert_eq!(snapshot.user.as_ref().unwrap().id, second.user.id);
    assert_eq!(snapshot.profile.as_ref().unwrap().role, Role::Member);

    env.shutdown().await;
}

#[tokio::test]
async fn test_sign_out_wins_against_hung_lookup() {
    let env = PortalEnvironment::new().await;

    // The profile lookup hangs; the member signs out while it is pending.
    let gate = env.store.hold_next_lookup().await;
    let session = env.provider.sign_in("hung@portal.test").await.unwrap();
    env.store
        .insert(tessera::AuthorizationProfile::new(&session.user.id, Role::Admin));
    assert!(wait_for_snapshot(&env.handle, |s| s.user.is_some(), 2_000).await);

    env.handle.sign_out().await.unwrap();
    assert!(env.handle.snapshot().user.is_none());

    // The lookup finally completes; its admin profile must go nowhere.
    let _ = gate.send(());
    assert!(wait_for_stats(&env.handle, |st| st.refreshes_discarded == 1, 2_000).await);
    assert!(env.handle.snapshot().profile.is_none());
    assert!(env.handle.access_tier().is_restricted());

    env.shutdown().await;
}

#[tokio::test]
async fn test_suspension_lands_on_next_token_refresh() {
    let env = PortalEnvironment::new().await;

    let session = env
        .sign_in_with_profile("lin@portal.test", Role::Staff)
        .await;
    assert!(wait_for_snapshot(&env.handle, |s| s.profile.is_some(), 2_000).await);
    assert!(env.handle.access_tier().allows(Capability::SubmitContent));

    // Suspend the account in the store. The member never signs out; the
    // next routine token rotation is what picks the change up.
    let mut suspended = tessera::AuthorizationProfile::new(&session.user.id, Role::Staff);
    suspended.account_status = tessera::AccountStatus::Suspended;
    env.store.insert(suspended);

    env.provider.refresh_session().await.unwrap();
    assert!(
        wait_for_snapshot(
            &env.handle,
            |s| s.profile.as_ref().map(|p| p.account_status)
                == Some(tessera::AccountStatus::Suspended),
            2_000
        )
        .await
    );

    let tier = env.handle.access_tier();
    assert!(tier.read_only);
    assert!(tier.allows(Capability::ViewDashboard));
    assert!(tier.allows(Capability::ViewReports));
    assert!(!tier.allows(Capability::SubmitContent));
    assert!(!tier.allows(Capability::JoinEvents));

    // The member is still signed in the whole time.
    assert!(env.handle.snapshot().session.is_some());

    env.shutdown().await;
}

#[tokio::test]
async fn test_provider_events_drive_multiple_watchers() {
    let env = PortalEnvironment::new().await;
    let handle_a = env.handle.clone();
    let handle_b = env.handle.clone();

    env.sign_in_with_profile("fanout@portal.test", Role::Member)
        .await;
    assert!(wait_for_snapshot(&handle_a, |s| s.profile.is_some(), 2_000).await);

    // Clones observe the same published state.
    assert_eq!(
        handle_a.snapshot().user.as_ref().map(|u| u.id.clone()),
        handle_b.snapshot().user.as_ref().map(|u| u.id.clone())
    );

    // A sign-out at the provider (another device) reaches every watcher.
    env.provider.sign_out().await.unwrap();
    assert!(wait_for_snapshot(&handle_b, |s| s.user.is_none(), 2_000).await);
    assert!(handle_a.snapshot().user.is_none());

    env.shutdown().await;
}

#[tokio::test]
async fn test_expiry_maintenance_rotates_through_manager() {
    use std::sync::Arc;

    use tessera::{
        AuthConfig, LocalIdentityProvider, MemoryProfileStore, ProfileStore, SessionManager,
    };

    crate::test_harness::init_tracing();

    // One-second sessions are inside the rotation threshold immediately.
    let provider = Arc::new(LocalIdentityProvider::new().with_session_ttl(1));
    let store = Arc::new(MemoryProfileStore::new());
    let handle = SessionManager::spawn(
        Arc::clone(&provider) as Arc<dyn IdentityProvider>,
        Arc::clone(&store) as Arc<dyn ProfileStore>,
        AuthConfig::default(),
    )
    .unwrap();
    assert!(wait_for_snapshot(&handle, |s| !s.is_loading, 2_000).await);

    let session = provider.sign_in("rotating@portal.test").await.unwrap();
    assert!(wait_for_snapshot(&handle, |s| s.user.is_some(), 2_000).await);

    provider
        .start_expiry_maintenance(Duration::from_millis(10))
        .await;
    assert!(
        wait_for_snapshot(
            &handle,
            |s| {
                s.session
                    .as_ref()
                    .map(|held| held.access_token.as_str() != session.access_token.as_str())
                    .unwrap_or(false)
            },
            2_000
        )
        .await,
        "rotated tokens never reached the snapshot"
    );
    provider.stop_expiry_maintenance().await;

    // Rotation kept the same member signed in throughout.
    let snapshot = handle.snapshot();
    assert!(snapshot.user.is_some());
    assert!(!snapshot.is_loading);

    handle.shutdown().await.unwrap();
}
