//! Room lifecycle, move pipeline and disconnect handling, driven through
//! the `RoomManager` with a counter game.

mod common;

use std::time::Duration;

use common::*;
use tabletop_protocol::{EndReason, JsonCodec, Outcome, RoomId, Seat, SystemMessage};
use tabletop_room::{DisconnectOutcome, Rejoin, RoomError, RoomManager, RoomOutbound, RoomStatus};
use tabletop_transport::ConnectionId;
use tokio::sync::mpsc::UnboundedReceiver;

/// Creates a two-seat counter room for p1 and seats p2. Returns the room
/// id and both players' receivers, drained.
async fn started_room(
    mgr: &RoomManager<JsonCodec>,
    config: CounterConfig,
) -> (RoomId, UnboundedReceiver<RoomOutbound>, UnboundedReceiver<RoomOutbound>) {
    let (p1, mut rx1) = player("p1", 1);
    let (p2, mut rx2) = player("p2", 2);
    let ack = mgr
        .create_room("counter", None, options(config), p1)
        .await
        .unwrap();
    mgr.join_room(&ack.room_id, p2).await.unwrap();
    drain(&mut rx1);
    drain(&mut rx2);
    (ack.room_id, rx1, rx2)
}

fn add(n: u32) -> Vec<u8> {
    encode(&CounterMove::Add(n))
}

// =========================================================================
// create_room / join_room
// =========================================================================

#[tokio::test]
async fn test_create_room_seats_creator_first_with_opaque_id() {
    let mgr = manager();
    let (p1, _rx) = player("p1", 1);

    let ack = mgr.create_room("counter", None, Vec::new(), p1).await.unwrap();

    assert_eq!(ack.seat, Seat(0));
    assert!(uuid::Uuid::parse_str(ack.room_id.as_str()).is_ok());
    let state: CounterState = decode(&ack.state);
    assert_eq!(state.target, 5);

    let info = mgr.room_info(&ack.room_id).await.unwrap();
    assert_eq!(info.status, RoomStatus::Waiting);
    assert_eq!(info.player_count, 1);
    assert_eq!(info.game, "counter");
}

#[tokio::test]
async fn test_create_room_short_code_policy_uses_four_digits() {
    let mgr = manager();
    let (p1, _rx) = player("p1", 1);

    let ack = mgr
        .create_room("coded-counter", None, Vec::new(), p1)
        .await
        .unwrap();

    let id = ack.room_id.as_str();
    assert_eq!(id.len(), 4);
    assert!(id.chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn test_create_room_duplicate_id_ignoring_case_rejected() {
    let mgr = manager();
    let (p1, _rx1) = player("p1", 1);
    let (p2, _rx2) = player("p2", 2);

    mgr.create_room("counter", Some(RoomId::new("Lobby")), Vec::new(), p1)
        .await
        .unwrap();
    let result = mgr
        .create_room("counter", Some(RoomId::new("LOBBY")), Vec::new(), p2)
        .await;

    assert!(matches!(result, Err(RoomError::AlreadyExists(_))));
    assert_eq!(mgr.room_count().await, 1);
}

#[tokio::test]
async fn test_create_room_unknown_game_rejected() {
    let mgr = manager();
    let (p1, _rx) = player("p1", 1);
    let result = mgr.create_room("chess", None, Vec::new(), p1).await;
    assert!(matches!(result, Err(RoomError::UnknownGame(g)) if g == "chess"));
}

#[tokio::test]
async fn test_create_room_bad_options_rejected() {
    let mgr = manager();
    let (p1, _rx1) = player("p1", 1);
    let (p2, _rx2) = player("p2", 2);

    let garbage = mgr.create_room("counter", None, b"{not json".to_vec(), p1).await;
    let out_of_range = mgr
        .create_room(
            "counter",
            None,
            options(CounterConfig {
                target: 0,
                ..CounterConfig::default()
            }),
            p2,
        )
        .await;

    assert!(matches!(garbage, Err(RoomError::BadRequest(_))));
    assert!(matches!(out_of_range, Err(RoomError::BadRequest(_))));
    assert_eq!(mgr.room_count().await, 0);
}

#[tokio::test]
async fn test_join_room_case_insensitive_starts_match() {
    let mgr = manager();
    let (p1, mut rx1) = player("p1", 1);
    let (p2, mut rx2) = player("p2", 2);
    mgr.create_room("counter", Some(RoomId::new("AbCd")), Vec::new(), p1)
        .await
        .unwrap();

    let ack = mgr.join_room(&RoomId::new("abcd"), p2).await.unwrap();

    assert_eq!(ack.seat, Seat(1));
    assert_eq!(ack.room_id, RoomId::new("AbCd"));
    for rx in [&mut rx1, &mut rx2] {
        let started = notices(&drain(rx));
        assert!(matches!(
            started.as_slice(),
            [SystemMessage::MatchStarted { seats, .. }] if seats.len() == 2
        ));
    }
    let info = mgr.room_info(&RoomId::new("ABCD")).await.unwrap();
    assert_eq!(info.status, RoomStatus::Playing);
}

#[tokio::test]
async fn test_join_room_unknown_id_not_found() {
    let mgr = manager();
    let (p1, _rx) = player("p1", 1);
    let result = mgr.join_room(&RoomId::new("nope"), p1).await;
    assert!(matches!(result, Err(RoomError::NotFound(_))));
}

#[tokio::test]
async fn test_join_room_full_rejected() {
    let mgr = manager();
    let (room_id, _rx1, _rx2) = started_room(&mgr, CounterConfig::default()).await;
    let (p3, _rx3) = player("p3", 3);

    let result = mgr.join_room(&room_id, p3).await;

    assert!(matches!(result, Err(RoomError::RoomFull(_))));
}

#[tokio::test]
async fn test_join_room_while_in_active_room_rejected() {
    let mgr = manager();
    let (p1, _rx1) = player("p1", 1);
    mgr.create_room("counter", None, Vec::new(), p1).await.unwrap();
    let (p1_again, _rx) = player("p1", 1);
    let (p2, _rx2) = player("p2", 2);
    let other = mgr.create_room("counter", None, Vec::new(), p2).await.unwrap();

    let result = mgr.join_room(&other.room_id, p1_again).await;

    assert!(matches!(result, Err(RoomError::AlreadyInQueueOrGame(p)) if p == pid("p1")));
}

#[tokio::test]
async fn test_list_rooms_only_waiting() {
    let mgr = manager();
    let (_started, _rx1, _rx2) = started_room(&mgr, CounterConfig::default()).await;
    let (p3, _rx3) = player("p3", 3);
    let open = mgr.create_room("counter", None, Vec::new(), p3).await.unwrap();

    let rooms = mgr.list_rooms().await;

    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].room_id, open.room_id);
}

// =========================================================================
// Move pipeline
// =========================================================================

#[tokio::test]
async fn test_submit_move_before_start_game_not_active() {
    let mgr = manager();
    let (p1, _rx) = player("p1", 1);
    let ack = mgr.create_room("counter", None, Vec::new(), p1).await.unwrap();

    let result = mgr.submit_move(&ack.room_id, pid("p1"), add(1)).await;

    assert!(matches!(result, Err(RoomError::GameNotActive)));
}

#[tokio::test]
async fn test_submit_move_accepted_passes_turn_and_broadcasts() {
    let mgr = manager();
    let (room_id, mut rx1, mut rx2) = started_room(&mgr, CounterConfig::default()).await;

    let state = mgr.submit_move(&room_id, pid("p1"), add(2)).await.unwrap();

    let state: CounterState = decode(&state);
    assert_eq!(state.count, 2);
    assert_eq!(state.turn, Seat(1));
    for rx in [&mut rx1, &mut rx2] {
        let msgs = drain(rx);
        assert_eq!(events(&msgs), vec![CounterEvent::Counted(2)]);
        assert!(matches!(
            notices(&msgs).as_slice(),
            [SystemMessage::StateUpdate { .. }]
        ));
    }
}

#[tokio::test]
async fn test_submit_move_simultaneous_any_seat_moves_turn_unchanged() {
    let mgr = manager();
    let (p1, _rx1) = player("p1", 1);
    let (p2, _rx2) = player("p2", 2);
    let ack = mgr
        .create_room("free-counter", None, options(CounterConfig::default()), p1)
        .await
        .unwrap();
    mgr.join_room(&ack.room_id, p2).await.unwrap();

    mgr.submit_move(&ack.room_id, pid("p2"), add(1)).await.unwrap();
    let state = mgr.submit_move(&ack.room_id, pid("p2"), add(1)).await.unwrap();
    let state: CounterState = decode(&state);
    assert_eq!(state.count, 2);
    assert_eq!(state.turn, Seat(0));

    let state = mgr.submit_move(&ack.room_id, pid("p1"), add(1)).await.unwrap();
    let state: CounterState = decode(&state);
    assert_eq!(state.count, 3);
    assert_eq!(state.turn, Seat(0));
}

#[tokio::test]
async fn test_submit_move_rejections_leave_state_untouched() {
    let mgr = manager();
    let (room_id, _rx1, _rx2) = started_room(&mgr, CounterConfig::default()).await;

    let out_of_turn = mgr.submit_move(&room_id, pid("p2"), add(1)).await;
    let stranger = mgr.submit_move(&room_id, pid("p9"), add(1)).await;
    let invalid = mgr.submit_move(&room_id, pid("p1"), add(0)).await;
    let malformed = mgr.submit_move(&room_id, pid("p1"), b"[1,2".to_vec()).await;

    assert!(matches!(out_of_turn, Err(RoomError::NotPlayerTurn)));
    assert!(matches!(stranger, Err(RoomError::NotInRoom(..))));
    assert!(matches!(invalid, Err(RoomError::InvalidMove(_))));
    assert!(matches!(malformed, Err(RoomError::BadRequest(_))));

    // p1 still holds the turn with a zero counter.
    let state: CounterState = decode(&mgr.submit_move(&room_id, pid("p1"), add(1)).await.unwrap());
    assert_eq!(state.count, 1);
}

#[tokio::test]
async fn test_submit_move_panicking_rule_is_isolated() {
    let mgr = manager();
    let (room_id, _rx1, _rx2) = started_room(&mgr, CounterConfig::default()).await;

    let result = mgr
        .submit_move(&room_id, pid("p1"), encode(&CounterMove::Boom))
        .await;
    assert!(matches!(result, Err(RoomError::Internal(_))));

    // The room survived and kept its previous state.
    let state: CounterState = decode(&mgr.submit_move(&room_id, pid("p1"), add(1)).await.unwrap());
    assert_eq!(state.count, 1);
}

#[tokio::test]
async fn test_query_answers_only_the_asker_out_of_turn() {
    let mgr = manager();
    let (room_id, mut rx1, mut rx2) = started_room(&mgr, CounterConfig::default()).await;

    mgr.submit_move(&room_id, pid("p2"), encode(&CounterMove::Peek))
        .await
        .unwrap();

    assert_eq!(events(&drain(&mut rx2)), vec![CounterEvent::Peeked(0)]);
    assert!(drain(&mut rx1).is_empty());
}

#[tokio::test]
async fn test_reaching_target_finishes_match() {
    let mgr = manager();
    let (room_id, mut rx1, _rx2) = started_room(
        &mgr,
        CounterConfig {
            target: 3,
            ..CounterConfig::default()
        },
    )
    .await;

    mgr.submit_move(&room_id, pid("p1"), add(3)).await.unwrap();

    let ended = notices(&drain(&mut rx1));
    assert!(ended.contains(&SystemMessage::MatchEnded {
        room_id: room_id.clone(),
        outcome: Outcome::Winner(Seat(0)),
        reason: EndReason::Completed,
    }));
    let info = mgr.room_info(&room_id).await.unwrap();
    assert_eq!(info.status, RoomStatus::Finished);

    let late = mgr.submit_move(&room_id, pid("p2"), add(1)).await;
    assert!(matches!(late, Err(RoomError::GameNotActive)));
}

// =========================================================================
// Rematch / surrender / leave
// =========================================================================

#[tokio::test]
async fn test_rematch_needs_every_seat() {
    let mgr = manager();
    let (room_id, mut rx1, mut rx2) = started_room(
        &mgr,
        CounterConfig {
            target: 1,
            ..CounterConfig::default()
        },
    )
    .await;
    mgr.submit_move(&room_id, pid("p1"), add(1)).await.unwrap();
    drain(&mut rx1);
    drain(&mut rx2);

    mgr.request_rematch(&room_id, pid("p1")).await.unwrap();
    assert_eq!(
        notices(&drain(&mut rx2)),
        vec![SystemMessage::RematchRequested {
            room_id: room_id.clone(),
            seat: Seat(0),
        }]
    );
    assert_eq!(mgr.room_info(&room_id).await.unwrap().status, RoomStatus::Finished);

    mgr.request_rematch(&room_id, pid("p2")).await.unwrap();
    let info = mgr.room_info(&room_id).await.unwrap();
    assert_eq!(info.status, RoomStatus::Playing);
    assert_eq!(info.result, None);
    assert!(matches!(
        notices(&drain(&mut rx1)).as_slice(),
        [SystemMessage::MatchStarted { .. }]
    ));
}

#[tokio::test]
async fn test_surrender_opponent_wins() {
    let mgr = manager();
    let (room_id, mut rx1, _rx2) = started_room(&mgr, CounterConfig::default()).await;

    mgr.surrender(&room_id, pid("p2")).await.unwrap();

    assert!(notices(&drain(&mut rx1)).contains(&SystemMessage::MatchEnded {
        room_id: room_id.clone(),
        outcome: Outcome::Winner(Seat(0)),
        reason: EndReason::Surrendered,
    }));
    let again = mgr.surrender(&room_id, pid("p1")).await;
    assert!(matches!(again, Err(RoomError::GameNotActive)));
}

#[tokio::test]
async fn test_surrender_three_seats_play_continues_without_loser() {
    let mgr = manager();
    let (p1, _rx1) = player("p1", 1);
    let (p2, _rx2) = player("p2", 2);
    let (p3, _rx3) = player("p3", 3);
    let config = CounterConfig {
        seats: 3,
        target: 100,
        ..CounterConfig::default()
    };
    let ack = mgr.create_room("counter", None, options(config), p1).await.unwrap();
    mgr.join_room(&ack.room_id, p2).await.unwrap();
    mgr.join_room(&ack.room_id, p3).await.unwrap();

    mgr.surrender(&ack.room_id, pid("p2")).await.unwrap();
    let state: CounterState =
        decode(&mgr.submit_move(&ack.room_id, pid("p1"), add(1)).await.unwrap());

    // Seat 1 is skipped.
    assert_eq!(state.turn, Seat(2));
    assert_eq!(
        mgr.room_info(&ack.room_id).await.unwrap().status,
        RoomStatus::Playing
    );
}

#[tokio::test]
async fn test_leave_during_match_opponent_wins() {
    let mgr = manager();
    let (room_id, mut rx1, _rx2) = started_room(&mgr, CounterConfig::default()).await;

    mgr.leave_room(&room_id, pid("p2")).await.unwrap();

    let seen = notices(&drain(&mut rx1));
    assert!(seen.contains(&SystemMessage::MatchEnded {
        room_id: room_id.clone(),
        outcome: Outcome::Winner(Seat(0)),
        reason: EndReason::OpponentLeft,
    }));
    assert_eq!(mgr.room_of(&pid("p2")).await, None);
    assert_eq!(mgr.room_of(&pid("p1")).await, Some(room_id));
}

#[tokio::test]
async fn test_leave_last_player_deletes_room_immediately() {
    let mgr = manager();
    let (p1, _rx) = player("p1", 1);
    let ack = mgr.create_room("counter", None, Vec::new(), p1).await.unwrap();

    mgr.leave_room(&ack.room_id, pid("p1")).await.unwrap();

    assert_eq!(mgr.room_count().await, 0);
    assert!(matches!(
        mgr.room_info(&ack.room_id).await,
        Err(RoomError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_join_after_finished_match_leaves_old_room() {
    let mgr = manager();
    let (room_id, _rx1, _rx2) = started_room(
        &mgr,
        CounterConfig {
            target: 1,
            ..CounterConfig::default()
        },
    )
    .await;
    mgr.submit_move(&room_id, pid("p1"), add(1)).await.unwrap();

    let (p1, _rx) = player("p1", 1);
    let fresh = mgr.create_room("counter", None, Vec::new(), p1).await.unwrap();

    assert_eq!(mgr.room_of(&pid("p1")).await, Some(fresh.room_id));
    assert_eq!(mgr.room_info(&room_id).await.unwrap().player_count, 1);
}

// =========================================================================
// Disconnects, grace periods and reconnects
// =========================================================================

#[tokio::test]
async fn test_disconnect_forfeit_policy_ends_match_and_caches_result() {
    let mgr = manager();
    let (room_id, mut rx1, _rx2) = started_room(&mgr, CounterConfig::default()).await;

    let outcome = mgr.handle_disconnect(&pid("p2"), ConnectionId::new(2)).await;

    assert_eq!(outcome, Some(DisconnectOutcome::Released));
    assert!(notices(&drain(&mut rx1)).contains(&SystemMessage::MatchEnded {
        room_id: room_id.clone(),
        outcome: Outcome::Winner(Seat(0)),
        reason: EndReason::OpponentDisconnected,
    }));

    let (p2_back, _rx) = player("p2", 22);
    let rejoin = mgr.reconnect(&room_id, p2_back).await.unwrap();
    match rejoin {
        Rejoin::Concluded(record) => {
            assert_eq!(record.seat, Seat(1));
            assert_eq!(record.outcome, Outcome::Winner(Seat(0)));
            assert_eq!(record.reason, EndReason::OpponentDisconnected);
        }
        other => panic!("expected cached result, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_from_stale_connection_ignored() {
    let mgr = manager();
    let (room_id, _rx1, _rx2) = started_room(&mgr, CounterConfig::default()).await;

    let outcome = mgr.handle_disconnect(&pid("p2"), ConnectionId::new(99)).await;

    assert_eq!(outcome, Some(DisconnectOutcome::Ignored));
    assert_eq!(
        mgr.room_info(&room_id).await.unwrap().status,
        RoomStatus::Playing
    );
}

#[tokio::test(start_paused = true)]
async fn test_empty_room_grace_join_at_thirty_seconds_rescues() {
    let mgr = manager();
    let (p1, _rx1) = player("p1", 1);
    let ack = mgr.create_room("counter", None, Vec::new(), p1).await.unwrap();
    mgr.handle_disconnect(&pid("p1"), ConnectionId::new(1)).await;

    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    let (p2, _rx2) = player("p2", 2);
    mgr.join_room(&ack.room_id, p2).await.unwrap();

    tokio::time::advance(Duration::from_secs(45)).await;
    settle().await;
    assert_eq!(mgr.room_count().await, 1);
    assert_eq!(mgr.room_info(&ack.room_id).await.unwrap().player_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_empty_room_grace_expiry_deletes_room() {
    let mgr = manager();
    let (p1, _rx1) = player("p1", 1);
    let ack = mgr.create_room("counter", None, Vec::new(), p1).await.unwrap();
    mgr.handle_disconnect(&pid("p1"), ConnectionId::new(1)).await;

    tokio::time::advance(Duration::from_secs(59)).await;
    settle().await;
    assert_eq!(mgr.room_count().await, 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(mgr.room_count().await, 0);
    let (p2, _rx2) = player("p2", 2);
    assert!(matches!(
        mgr.join_room(&ack.room_id, p2).await,
        Err(RoomError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_empty_room_grace_failed_join_keeps_deadline() {
    let mgr = manager();
    let (room_id, _rx1, _rx2) = started_room(
        &mgr,
        CounterConfig {
            target: 1,
            ..CounterConfig::default()
        },
    )
    .await;
    mgr.submit_move(&room_id, pid("p1"), add(1)).await.unwrap();
    mgr.handle_disconnect(&pid("p1"), ConnectionId::new(1)).await;
    mgr.handle_disconnect(&pid("p2"), ConnectionId::new(2)).await;

    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(15)).await;
        settle().await;
        let (p3, _rx3) = player("p3", 3);
        assert!(matches!(
            mgr.join_room(&room_id, p3).await,
            Err(RoomError::RoomFull(_))
        ));
    }

    tokio::time::advance(Duration::from_secs(16)).await;
    settle().await;
    assert_eq!(mgr.room_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_await_reconnect_holds_seat_and_rejoins() {
    let mgr = manager();
    let config = CounterConfig {
        hold_seats: true,
        ..CounterConfig::default()
    };
    let (room_id, mut rx1, _rx2) = started_room(&mgr, config).await;
    mgr.submit_move(&room_id, pid("p1"), add(2)).await.unwrap();
    drain(&mut rx1);

    let outcome = mgr.handle_disconnect(&pid("p2"), ConnectionId::new(2)).await;
    assert_eq!(outcome, Some(DisconnectOutcome::Held));
    assert_eq!(
        notices(&drain(&mut rx1)),
        vec![SystemMessage::PlayerDisconnected {
            room_id: room_id.clone(),
            seat: Seat(1),
            reconnect_within_secs: Some(60),
        }]
    );

    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    let (p2_back, _rx) = player("p2", 20);
    let Rejoin::Seated(ack) = mgr.reconnect(&room_id, p2_back).await.unwrap() else {
        panic!("seat should still be held");
    };
    assert_eq!(ack.seat, Seat(1));
    let state: CounterState = decode(&ack.state);
    assert_eq!(state.count, 2);
    assert_eq!(
        notices(&drain(&mut rx1)),
        vec![SystemMessage::PlayerRejoined {
            room_id: room_id.clone(),
            seat: Seat(1),
        }]
    );

    // The cancelled countdown never fires.
    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(
        mgr.room_info(&room_id).await.unwrap().status,
        RoomStatus::Playing
    );
}

#[tokio::test(start_paused = true)]
async fn test_await_reconnect_expiry_forfeits_seat() {
    let mgr = manager();
    let config = CounterConfig {
        hold_seats: true,
        ..CounterConfig::default()
    };
    let (room_id, mut rx1, _rx2) = started_room(&mgr, config).await;
    mgr.handle_disconnect(&pid("p2"), ConnectionId::new(2)).await;
    drain(&mut rx1);

    tokio::time::advance(Duration::from_secs(61)).await;
    settle().await;

    assert!(notices(&drain(&mut rx1)).contains(&SystemMessage::MatchEnded {
        room_id: room_id.clone(),
        outcome: Outcome::Winner(Seat(0)),
        reason: EndReason::TimeExpired,
    }));
    let (p2_back, _rx) = player("p2", 20);
    let rejoin = mgr.reconnect(&room_id, p2_back).await.unwrap();
    assert!(matches!(
        rejoin,
        Rejoin::Concluded(record) if record.reason == EndReason::TimeExpired
    ));
}

#[tokio::test]
async fn test_reconnect_unknown_room_without_result_not_found() {
    let mgr = manager();
    let (p1, _rx) = player("p1", 1);
    let result = mgr.reconnect(&RoomId::new("gone"), p1).await;
    assert!(matches!(result, Err(RoomError::NotFound(_))));
}
