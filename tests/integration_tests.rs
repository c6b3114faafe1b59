//! Integration tests for the parlor-duel matchmaking flow
//!
//! These drive the public service façade end to end: join, poll through a
//! notification session, cancel and cleanup.

mod fixtures;

use chrono::{Duration as ChronoDuration, Utc};
use fixtures::{build_service, collect_until_terminal, fast_settings, FlakyStore};
use parlor_duel::config::StorageBackend;
use parlor_duel::error::is_invalid_input;
use parlor_duel::metrics::MetricsCollector;
use parlor_duel::notify::{NOT_FOUND_MESSAGE, SERVER_ERROR_MESSAGE};
use parlor_duel::service::MatchmakingService;
use parlor_duel::store::{InMemoryStore, MatchStore, QueueStore};
use parlor_duel::types::{
    JoinRequest, MatchOutcome, NotificationEvent, PlayerData, QueueEntry, QueueStatus,
};
use std::sync::Arc;
use std::time::Duration;

const BACKENDS: [StorageBackend; 2] = [StorageBackend::Memory, StorageBackend::Sharded];
const WITHIN: Duration = Duration::from_secs(2);

fn match_id_of(events: &[NotificationEvent]) -> Option<String> {
    events.iter().find_map(|event| match event {
        NotificationEvent::MatchFound { match_id, .. } => Some(match_id.clone()),
        _ => None,
    })
}

#[tokio::test]
async fn test_two_players_receive_the_same_match() {
    for backend in BACKENDS {
        let service = build_service(backend);
        service
            .join_queue(JoinRequest::new("alice", "Alice", 1000))
            .await
            .unwrap();
        service
            .join_queue(JoinRequest::new("bob", "Bob", 1100))
            .await
            .unwrap();

        let mut alice = service.open_notification_channel("alice").unwrap();
        let mut bob = service.open_notification_channel("bob").unwrap();

        let alice_events = collect_until_terminal(&mut alice, WITHIN).await;
        let bob_events = collect_until_terminal(&mut bob, WITHIN).await;

        assert!(matches!(
            alice_events.first(),
            Some(NotificationEvent::Connected { player_id }) if player_id == "alice"
        ));
        assert!(matches!(
            bob_events.first(),
            Some(NotificationEvent::Connected { player_id }) if player_id == "bob"
        ));

        let alice_match = match_id_of(&alice_events).expect("alice matched");
        let bob_match = match_id_of(&bob_events).expect("bob matched");
        assert_eq!(alice_match, bob_match);
        assert!(alice_match.starts_with("match_alice_bob_"));

        match alice_events.last() {
            Some(NotificationEvent::MatchFound { opponent, .. }) => {
                let opponent = opponent.as_ref().expect("opponent present");
                assert_eq!(opponent.player_id, "bob");
                assert_eq!(opponent.player_name, "Bob");
                assert_eq!(opponent.skill_level, 1100);
            }
            other => panic!("unexpected final event for alice: {:?}", other),
        }

        assert_eq!(service.match_store().count().await.unwrap(), 1);
        let record = service.match_store().get(&alice_match).await.unwrap().unwrap();
        assert_eq!(record.player1_id, "alice");
        assert_eq!(record.player2_id, "bob");
    }
}

#[tokio::test]
async fn test_lone_player_sees_searching_position() {
    let service = build_service(StorageBackend::Memory);
    service
        .join_queue(JoinRequest::new("carol", "Carol", 1000))
        .await
        .unwrap();

    let mut session = service.open_notification_channel("carol").unwrap();
    assert!(matches!(
        session.recv().await,
        Some(NotificationEvent::Connected { .. })
    ));

    let event = tokio::time::timeout(WITHIN, session.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        NotificationEvent::Searching { position, total, .. } => {
            assert_eq!(position, 1);
            assert_eq!(total, 1);
        }
        other => panic!("expected searching, got {:?}", other),
    }

    session.handle().cancel();
}

#[tokio::test]
async fn test_out_of_range_players_stay_searching() {
    let service = build_service(StorageBackend::Sharded);
    service
        .join_queue(JoinRequest::new("alice", "Alice", 1000))
        .await
        .unwrap();
    service
        .join_queue(JoinRequest::new("zed", "Zed", 1201))
        .await
        .unwrap();

    for _ in 0..3 {
        assert_eq!(
            service.matcher().attempt("alice").await.unwrap(),
            MatchOutcome::Searching
        );
        assert_eq!(
            service.matcher().attempt("zed").await.unwrap(),
            MatchOutcome::Searching
        );
    }
    assert_eq!(service.stats().await.unwrap().players_searching, 2);
}

#[tokio::test]
async fn test_cancel_ends_open_session_and_removes_row() {
    for backend in BACKENDS {
        let service = build_service(backend);
        service
            .join_queue(JoinRequest::new("dave", "Dave", 900))
            .await
            .unwrap();

        let mut session = service.open_notification_channel("dave").unwrap();
        assert!(matches!(
            session.recv().await,
            Some(NotificationEvent::Connected { .. })
        ));

        assert!(service.cancel_queue("dave").await.unwrap());
        let events = collect_until_terminal(&mut session, WITHIN).await;

        assert!(events.iter().all(|event| !event.is_terminal()));
        assert!(session.handle().is_closed());
        assert!(QueueStore::get(service.queue_store().as_ref(), "dave")
            .await
            .unwrap()
            .is_none());

        // A second cancel is still a success, but nothing was removed
        assert!(!service.cancel_queue("dave").await.unwrap());
    }
}

#[tokio::test]
async fn test_cancelled_player_is_not_matched() {
    let service = build_service(StorageBackend::Memory);
    service
        .join_queue(JoinRequest::new("alice", "Alice", 1000))
        .await
        .unwrap();
    service
        .join_queue(JoinRequest::new("bob", "Bob", 1000))
        .await
        .unwrap();
    service.cancel_queue("bob").await.unwrap();

    assert_eq!(
        service.matcher().attempt("alice").await.unwrap(),
        MatchOutcome::Searching
    );
    assert_eq!(
        service.matcher().attempt("bob").await.unwrap(),
        MatchOutcome::NotFound
    );
}

#[tokio::test]
async fn test_unknown_player_session_reports_not_found() {
    let service = build_service(StorageBackend::Memory);
    let mut session = service.open_notification_channel("ghost").unwrap();

    let events = collect_until_terminal(&mut session, WITHIN).await;
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1],
        NotificationEvent::Error {
            message: NOT_FOUND_MESSAGE.to_string()
        }
    );
}

#[tokio::test]
async fn test_rejoin_after_match_starts_fresh() {
    let service = build_service(StorageBackend::Memory);
    service
        .join_queue(JoinRequest::new("alice", "Alice", 1000))
        .await
        .unwrap();
    service
        .join_queue(JoinRequest::new("bob", "Bob", 1000))
        .await
        .unwrap();
    assert!(matches!(
        service.matcher().attempt("alice").await.unwrap(),
        MatchOutcome::Matched { .. }
    ));

    let entry = service
        .join_queue(JoinRequest::new("alice", "Alice", 1050))
        .await
        .unwrap();
    assert_eq!(entry.status, QueueStatus::Searching);
    assert_eq!(entry.match_id, None);
    assert_eq!(entry.skill_level, 1050);

    // bob keeps his matched row and still resolves to the old match
    assert!(matches!(
        service.matcher().attempt("bob").await.unwrap(),
        MatchOutcome::AlreadyMatched { .. }
    ));
    assert_eq!(
        service.matcher().attempt("alice").await.unwrap(),
        MatchOutcome::Searching
    );
}

#[tokio::test]
async fn test_join_validation_and_defaults() {
    let service = build_service(StorageBackend::Memory);

    let err = service
        .join_queue(JoinRequest::new("", "Nobody", 1000))
        .await
        .unwrap_err();
    assert!(is_invalid_input(&err));

    let err = service
        .join_queue(JoinRequest::new("erin", "Erin", -5))
        .await
        .unwrap_err();
    assert!(is_invalid_input(&err));

    let err = service
        .join_queue(JoinRequest {
            player_id: "erin".to_string(),
            player_data: None,
        })
        .await
        .unwrap_err();
    assert!(is_invalid_input(&err));

    let entry = service
        .join_queue(JoinRequest {
            player_id: "frank".to_string(),
            player_data: Some(PlayerData {
                player_name: "  ".to_string(),
                skill_level: None,
            }),
        })
        .await
        .unwrap();
    assert_eq!(entry.skill_level, 1000);
    assert_eq!(entry.player_name, "Anonymous");

    let entry = service
        .join_queue(JoinRequest::new("gina", "Gina", 0))
        .await
        .unwrap();
    assert_eq!(entry.skill_level, 1000);
}

#[tokio::test]
async fn test_join_purges_stale_searching_rows() {
    let store = Arc::new(InMemoryStore::new());
    let service = MatchmakingService::with_store(
        store.clone(),
        fast_settings(StorageBackend::Memory),
        Arc::new(MetricsCollector::default()),
    );

    let long_ago = Utc::now() - ChronoDuration::minutes(10);
    store
        .insert_entry(QueueEntry::searching("old", "Old", 1000, long_ago))
        .unwrap();

    let mut matched = QueueEntry::searching("done", "Done", 1000, long_ago);
    matched.status = QueueStatus::Matched;
    matched.match_id = Some("match_done_x_0_00000000".to_string());
    store.insert_entry(matched).unwrap();

    service
        .join_queue(JoinRequest::new("new", "New", 1000))
        .await
        .unwrap();

    let ids: Vec<String> = store
        .all_entries()
        .unwrap()
        .into_iter()
        .map(|entry| entry.player_id)
        .collect();
    assert!(!ids.contains(&"old".to_string()));
    assert!(ids.contains(&"done".to_string()));
    assert!(ids.contains(&"new".to_string()));
}

#[tokio::test]
async fn test_expired_candidate_is_skipped_but_not_deleted() {
    let store = Arc::new(InMemoryStore::new());
    let service = MatchmakingService::with_store(
        store.clone(),
        fast_settings(StorageBackend::Memory),
        Arc::new(MetricsCollector::default()),
    );

    let three_minutes_ago = Utc::now() - ChronoDuration::minutes(3);
    store
        .insert_entry(QueueEntry::searching("bob", "Bob", 1000, three_minutes_ago))
        .unwrap();
    service
        .join_queue(JoinRequest::new("alice", "Alice", 1000))
        .await
        .unwrap();

    assert_eq!(
        service.matcher().attempt("alice").await.unwrap(),
        MatchOutcome::Searching
    );
    assert!(QueueStore::get(store.as_ref(), "bob").await.unwrap().is_some());
}

#[tokio::test]
async fn test_storage_failure_surfaces_as_server_error() {
    let store = Arc::new(FlakyStore::new());
    let service = MatchmakingService::with_store(
        store.clone(),
        fast_settings(StorageBackend::Memory),
        Arc::new(MetricsCollector::default()),
    );
    service
        .join_queue(JoinRequest::new("alice", "Alice", 1000))
        .await
        .unwrap();

    store.set_failing(true);
    let mut session = service.open_notification_channel("alice").unwrap();
    let events = collect_until_terminal(&mut session, WITHIN).await;

    assert!(matches!(events[0], NotificationEvent::Connected { .. }));
    assert_eq!(
        events.last(),
        Some(&NotificationEvent::Error {
            message: SERVER_ERROR_MESSAGE.to_string()
        })
    );

    let err = service
        .join_queue(JoinRequest::new("bob", "Bob", 1000))
        .await
        .unwrap_err();
    assert!(!is_invalid_input(&err));
}

#[tokio::test]
async fn test_shutdown_closes_every_session() {
    let service = build_service(StorageBackend::Memory);
    for (id, skill) in [("p1", 100), ("p2", 1000), ("p3", 2000)] {
        service
            .join_queue(JoinRequest::new(id, id, skill))
            .await
            .unwrap();
    }

    let mut sessions: Vec<_> = ["p1", "p2", "p3"]
        .iter()
        .map(|id| service.open_notification_channel(id).unwrap())
        .collect();
    for session in sessions.iter_mut() {
        assert!(matches!(
            session.recv().await,
            Some(NotificationEvent::Connected { .. })
        ));
    }

    let closed = service.close_all_sessions();
    assert!(closed <= 3);

    for session in sessions.iter_mut() {
        let events = collect_until_terminal(session, WITHIN).await;
        assert!(events.iter().all(|event| !event.is_terminal()));
    }
    assert_eq!(service.active_sessions(), 0);
}

#[tokio::test]
async fn test_maximum_skill_is_matched_without_overflow() {
    for backend in BACKENDS {
        let service = build_service(backend);
        service
            .join_queue(JoinRequest::new("alice", "Alice", i64::MAX))
            .await
            .unwrap();
        assert_eq!(
            service.matcher().attempt("alice").await.unwrap(),
            MatchOutcome::Searching
        );

        let mut session = service.open_notification_channel("alice").unwrap();
        assert!(matches!(
            session.recv().await,
            Some(NotificationEvent::Connected { .. })
        ));
        let searching = tokio::time::timeout(WITHIN, session.recv())
            .await
            .unwrap();
        assert!(matches!(searching, Some(NotificationEvent::Searching { .. })));

        service
            .join_queue(JoinRequest::new("bob", "Bob", i64::MAX - 200))
            .await
            .unwrap();
        let events = collect_until_terminal(&mut session, WITHIN).await;
        assert!(match_id_of(&events).is_some());
    }
}

#[tokio::test]
async fn test_ended_sessions_do_not_accumulate() {
    let service = build_service(StorageBackend::Memory);
    let registry = service.session_registry();

    for i in 0..50 {
        let mut session = service
            .open_notification_channel(&format!("ghost_{}", i))
            .unwrap();
        let drained = async { while session.recv().await.is_some() {} };
        tokio::time::timeout(WITHIN, drained).await.unwrap();
    }
    assert_eq!(service.active_sessions(), 0);
    assert_eq!(registry.player_count(), 0);

    service
        .join_queue(JoinRequest::new("alice", "Alice", 1000))
        .await
        .unwrap();
    service
        .join_queue(JoinRequest::new("bob", "Bob", 1000))
        .await
        .unwrap();
    for id in ["alice", "bob"] {
        let mut session = service.open_notification_channel(id).unwrap();
        let drained = async { while session.recv().await.is_some() {} };
        tokio::time::timeout(WITHIN, drained).await.unwrap();
    }
    assert_eq!(service.match_store().count().await.unwrap(), 1);
    assert_eq!(registry.player_count(), 0);
}
