#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Protocol serialization tests for the lunch roulette client.
//!
//! The server mixes naming conventions on the wire (`roomId`, `game_id`,
//! `gameStarted`), so these tests pin exact JSON shapes with raw fixtures
//! captured from real server output rather than relying on round-trips
//! alone.

use std::collections::BTreeMap;

use lunch_roulette_client::protocol::{
    ClientCommand, GameStatePayload, MealPrice, RejoinPayload, ServerEvent,
};

// ════════════════════════════════════════════════════════════════════
// Outbound commands: exact wire shapes
// ════════════════════════════════════════════════════════════════════

#[test]
fn rejoin_uses_camel_case_room_id() {
    let cmd = ClientCommand::Rejoin {
        player: "alice".into(),
        room_id: "lunch-42".into(),
    };
    let json = serde_json::to_string(&cmd).expect("serialize");
    assert_eq!(
        json,
        r#"{"type":"REJOIN","player":"alice","roomId":"lunch-42"}"#
    );
}

#[test]
fn start_game_carries_the_full_roster() {
    let cmd = ClientCommand::StartGame {
        room_id: "lunch-42".into(),
        players: vec!["alice".into(), "bob".into()],
    };
    let value = serde_json::to_value(&cmd).expect("serialize");
    assert_eq!(value["type"], "START_GAME");
    assert_eq!(value["roomId"], "lunch-42");
    assert_eq!(value["players"], serde_json::json!(["alice", "bob"]));
}

#[test]
fn submit_meal_uses_snake_case_game_id() {
    let cmd = ClientCommand::SubmitMeal {
        player: "alice".into(),
        meal: MealPrice {
            amount: 149.5,
            currency: "Kč".into(),
        },
        game_id: "g1".into(),
    };
    let value = serde_json::to_value(&cmd).expect("serialize");
    assert_eq!(value["type"], "SUBMIT_MEAL");
    assert_eq!(value["game_id"], "g1");
    assert_eq!(value["meal"]["amount"], 149.5);
    assert_eq!(value["meal"]["currency"], "Kč");
}

#[test]
fn end_game_mixes_room_and_game_id_spellings() {
    let scores: BTreeMap<String, i32> =
        [("alice".to_string(), 10), ("bob".to_string(), 3)].into();
    let cmd = ClientCommand::EndGame {
        room_id: "lunch-42".into(),
        game_id: "g1".into(),
        scores,
    };
    let value = serde_json::to_value(&cmd).expect("serialize");
    assert_eq!(value["type"], "END_GAME");
    assert_eq!(value["roomId"], "lunch-42");
    assert_eq!(value["game_id"], "g1");
    assert_eq!(value["scores"]["alice"], 10);
}

// ════════════════════════════════════════════════════════════════════
// Inbound events: raw server fixtures
// ════════════════════════════════════════════════════════════════════

#[test]
fn parses_player_list_fixture() {
    let raw = r#"{"type":"PLAYER_LIST","players":["alice","bob","carol"]}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("parse");
    assert_eq!(
        event,
        ServerEvent::PlayerList {
            players: vec!["alice".into(), "bob".into(), "carol".into()],
        }
    );
}

#[test]
fn parses_game_started_fixture() {
    let raw = r#"{"type":"GAME_STARTED","message":"Game started","game_id":"8f3c"}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("parse");
    assert!(matches!(
        event,
        ServerEvent::GameStarted { ref game_id, .. } if game_id == "8f3c"
    ));
}

#[test]
fn parses_spined_fixture() {
    let raw = r#"{"type":"SPINED","player":"bob","score":87}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("parse");
    assert_eq!(
        event,
        ServerEvent::Spined {
            player: "bob".into(),
            score: 87,
        }
    );
}

#[test]
fn parses_game_ended_fixture() {
    let raw = r#"{"type":"GAME_ENDED","message":"bob pays for lunch","loser":"bob","winners":["alice","carol"]}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("parse");
    if let ServerEvent::GameEnded { loser, winners, .. } = event {
        assert_eq!(loser, "bob");
        assert_eq!(winners, vec!["alice".to_string(), "carol".to_string()]);
    } else {
        panic!("expected GameEnded, got {event:?}");
    }
}

#[test]
fn parses_meal_submitted_with_and_without_meal() {
    let raw = r#"{"type":"MEAL_SUBMITTED","message":"ok","player":"alice","meal":{"amount":12.5,"currency":"EUR"}}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("parse");
    if let ServerEvent::MealSubmitted { player, meal, .. } = event {
        assert_eq!(player, "alice");
        assert_eq!(
            meal,
            Some(MealPrice {
                amount: 12.5,
                currency: "EUR".into()
            })
        );
    } else {
        panic!("expected MealSubmitted, got {event:?}");
    }

    // The broadcast to other members omits the meal body.
    let raw = r#"{"type":"MEAL_SUBMITTED","message":"ok","player":"alice"}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("parse");
    assert!(matches!(
        event,
        ServerEvent::MealSubmitted { meal: None, .. }
    ));
}

#[test]
fn parses_game_state_fixture_with_camel_case_fields() {
    let raw = r#"{
        "type": "GAME_STATE",
        "gameStarted": true,
        "gameEnded": false,
        "gameId": "8f3c",
        "players": ["alice", "bob"],
        "loser": null,
        "winners": [],
        "mealSubmitted": {"alice": true},
        "scores": {"alice": 10}
    }"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("parse");
    if let ServerEvent::GameState(state) = event {
        assert!(state.game_started);
        assert!(!state.game_ended);
        assert_eq!(state.game_id, "8f3c");
        assert_eq!(state.players, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(state.meal_submitted.get("alice"), Some(&true));
        assert_eq!(state.scores.get("alice"), Some(&10));
    } else {
        panic!("expected GameState, got {event:?}");
    }
}

#[test]
fn parses_own_rejoin_fixture_with_flattened_state() {
    // An own-name REJOIN carries the full game state beside `player`.
    let raw = r#"{
        "type": "REJOIN",
        "player": "alice",
        "gameStarted": true,
        "gameId": "8f3c",
        "players": ["alice", "bob"],
        "scores": {"bob": 3},
        "mealSubmitted": {}
    }"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("parse");
    if let ServerEvent::Rejoin(payload) = event {
        assert_eq!(payload.player, "alice");
        assert!(payload.state.game_started);
        assert_eq!(payload.state.scores.get("bob"), Some(&3));
    } else {
        panic!("expected Rejoin, got {event:?}");
    }
}

#[test]
fn parses_bare_rejoin_fixture_with_defaults() {
    // Another member's join carries only the name; every state field
    // defaults.
    let raw = r#"{"type":"REJOIN","player":"dana"}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("parse");
    if let ServerEvent::Rejoin(payload) = event {
        assert_eq!(payload.player, "dana");
        assert_eq!(payload.state, GameStatePayload::default());
    } else {
        panic!("expected Rejoin, got {event:?}");
    }
}

#[test]
fn parses_terminal_and_reset_fixtures() {
    let raw = r#"{"type":"ALL_MEALS_SUBMITTED","message":"All meals are in"}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("parse");
    assert!(matches!(event, ServerEvent::AllMealsSubmitted { .. }));

    let raw = r#"{"type":"GAME_RESET","message":"Game reset"}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("parse");
    assert!(matches!(event, ServerEvent::GameReset { .. }));

    let raw = r#"{"type":"USER_DISJOINED","player":"bob"}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("parse");
    assert!(matches!(
        event,
        ServerEvent::UserDisjoined { ref player } if player == "bob"
    ));
}

#[test]
fn unknown_event_type_fails_to_parse() {
    let raw = r#"{"type":"BRAND_NEW_THING","player":"alice"}"#;
    let result: Result<ServerEvent, _> = serde_json::from_str(raw);
    assert!(result.is_err());
}

// ════════════════════════════════════════════════════════════════════
// Round-trips where the shape is load-bearing
// ════════════════════════════════════════════════════════════════════

#[test]
fn rejoin_payload_round_trips_through_flatten() {
    let payload = RejoinPayload {
        player: "alice".into(),
        state: GameStatePayload {
            game_started: true,
            game_id: "g1".into(),
            players: vec!["alice".into()],
            scores: [("alice".to_string(), 42)].into(),
            ..GameStatePayload::default()
        },
    };
    let json = serde_json::to_string(&ServerEvent::Rejoin(Box::new(payload.clone())))
        .expect("serialize");
    // Flattening puts the state fields beside `player`, not nested.
    assert!(json.contains(r#""player":"alice""#));
    assert!(json.contains(r#""gameStarted":true"#));
    assert!(!json.contains(r#""state""#));

    let back: ServerEvent = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, ServerEvent::Rejoin(Box::new(payload)));
}
