use super::*;
use crate::game::types::{Cell, DeathCause, Player};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tokio::sync::mpsc::error::TryRecvError;

fn config() -> GameConfig {
    GameConfig {
        width: 20,
        height: 15,
        tick_ms: 10,
        start_length: 3,
        food_count: 3,
    }
}

fn make_room() -> (Arc<Room>, TickLoop) {
    let config = config();
    let state = GameState::with_rng(&config, StdRng::seed_from_u64(5));
    Room::with_state(config, state)
}

fn connect(room: &Room, player_id: &str, capacity: usize) -> (ConnectionId, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(capacity);
    (room.connect(player_id, tx), rx)
}

fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
    let mut messages = Vec::new();
    while let Ok(text) = rx.try_recv() {
        messages.push(serde_json::from_str(&text).expect("server frames are json"));
    }
    messages
}

fn types_of(messages: &[Value]) -> Vec<&str> {
    messages
        .iter()
        .map(|message| message["type"].as_str().unwrap_or_default())
        .collect()
}

fn direction_of(tick_loop: &TickLoop, player_id: &str) -> Direction {
    tick_loop.state.player(player_id).expect("player").direction
}

#[test]
fn connect_sends_init_then_state_then_broadcast() {
    let (room, mut tick_loop) = make_room();
    let (_, mut rx) = connect(&room, "p1", 16);

    assert!(tick_loop.state.player("p1").is_none());
    tick_loop.run_tick();

    let messages = drain(&mut rx);
    assert_eq!(types_of(&messages), ["init", "state", "state"]);
    assert_eq!(messages[0]["data"]["player_id"], "p1");
    assert_eq!(messages[0]["data"]["display_name"], "p1");
    assert_eq!(messages[0]["data"]["game_config"]["width"], 20);
    assert_eq!(messages[0]["data"]["game_config"]["height"], 15);
    assert_eq!(messages[1]["data"]["tick"], 0);
    assert_eq!(messages[1]["data"]["players"]["p1"]["alive"], true);
    assert_eq!(messages[1]["data"]["players"]["p1"]["snake_length"], 3);
    assert_eq!(messages[2]["data"]["tick"], 1);
}

#[test]
fn input_updates_direction_on_next_tick() {
    let (room, mut tick_loop) = make_room();
    let (_, _rx) = connect(&room, "p1", 64);
    tick_loop.run_tick();
    let before = tick_loop.state.player("p1").and_then(|player| player.head()).expect("head");

    room.handle_text_message("p1", r#"{"type":"input","dir":[0,1]}"#);
    tick_loop.run_tick();

    let player = tick_loop.state.player("p1").expect("player");
    assert_eq!(player.direction, Direction::DOWN);
    assert_eq!(player.head(), Some(tick_loop.state.grid().step(before, Direction::DOWN)));
}

#[test]
fn invalid_and_reversing_inputs_keep_heading() {
    let (room, mut tick_loop) = make_room();
    let (_, _rx) = connect(&room, "p1", 64);
    tick_loop.run_tick();

    for text in [
        r#"{"type":"input","dir":[0,0]}"#,
        r#"{"type":"input","dir":[1,0,0]}"#,
        r#"{"type":"input","dir":[3,1]}"#,
        r#"{"type":"input","dir":[-1,0]}"#,
    ] {
        room.handle_text_message("p1", text);
        tick_loop.run_tick();
        assert_eq!(direction_of(&tick_loop, "p1"), Direction::RIGHT, "{text}");
    }
}

#[test]
fn malformed_messages_are_ignored() {
    let (room, mut tick_loop) = make_room();
    let (_, mut rx) = connect(&room, "p1", 64);
    tick_loop.run_tick();
    drain(&mut rx);

    room.handle_text_message("p1", "definitely not json");
    room.handle_text_message("p1", r#"{"type":"teleport","x":1}"#);
    room.handle_text_message("p1", r#"{"dir":[0,1]}"#);
    tick_loop.run_tick();

    assert_eq!(types_of(&drain(&mut rx)), ["state"]);
    assert!(tick_loop.state.player("p1").is_some_and(|player| player.alive));
    assert_eq!(direction_of(&tick_loop, "p1"), Direction::RIGHT);
}

#[test]
fn respawn_is_rejected_while_alive() {
    let (room, mut tick_loop) = make_room();
    let (_, _rx) = connect(&room, "p1", 64);
    tick_loop.run_tick();
    tick_loop.run_tick();

    room.handle_text_message("p1", r#"{"type":"respawn"}"#);
    tick_loop.run_tick();

    let player = tick_loop.state.player("p1").expect("player");
    assert_eq!(player.spawn_tick, 0);
    assert!(player.alive);
}

#[test]
fn respawn_after_death_starts_fresh_incarnation() {
    let (room, mut tick_loop) = make_room();
    let (_, mut rx) = connect(&room, "p1", 64);
    tick_loop.run_tick();
    room.handle_text_message("p1", r#"{"type":"rename","name":"Viper"}"#);
    tick_loop.run_tick();
    tick_loop.state.kill_player("p1", DeathCause::SelfCollision);
    drain(&mut rx);

    room.handle_text_message("p1", r#"{"type":"respawn"}"#);
    tick_loop.run_tick();

    let player = tick_loop.state.player("p1").expect("player");
    assert!(player.alive);
    assert_eq!(player.spawn_tick, 2);
    assert_eq!(player.name, "Viper");
    assert!(tick_loop.state.death_cause("p1").is_none());

    let messages = drain(&mut rx);
    assert_eq!(types_of(&messages), ["state"]);
    assert!(messages[0]["data"]["players"]["p1"].get("death_cause").is_none());
}

#[test]
fn rename_notifies_only_when_name_is_accepted() {
    let (room, mut tick_loop) = make_room();
    let (_, mut rx) = connect(&room, "p1", 64);
    tick_loop.run_tick();
    drain(&mut rx);

    room.handle_text_message("p1", r#"{"type":"rename","name":"  Mamba  "}"#);
    tick_loop.run_tick();
    let messages = drain(&mut rx);
    assert_eq!(types_of(&messages), ["notification", "state"]);
    assert_eq!(messages[0]["data"]["message"], "Name changed to Mamba");
    assert_eq!(messages[1]["data"]["players"]["p1"]["name"], "Mamba");

    room.handle_text_message("p1", r#"{"type":"rename","name":"   "}"#);
    tick_loop.run_tick();
    let messages = drain(&mut rx);
    assert_eq!(types_of(&messages), ["state"]);
    assert_eq!(messages[0]["data"]["players"]["p1"]["name"], "Mamba");
}

#[test]
fn disconnect_removes_player() {
    let (room, mut tick_loop) = make_room();
    let (connection_id, _rx) = connect(&room, "p1", 64);
    tick_loop.run_tick();

    room.disconnect("p1", connection_id);
    assert_eq!(room.connection_count(), 0);
    tick_loop.run_tick();

    assert!(tick_loop.state.player("p1").is_none());
    assert_eq!(room.stats().players, 0);
}

#[test]
fn reconnect_supersedes_old_connection() {
    let (room, mut tick_loop) = make_room();
    let (old_id, mut old_rx) = connect(&room, "p1", 64);
    tick_loop.run_tick();

    let (_, mut new_rx) = connect(&room, "p1", 64);
    room.disconnect("p1", old_id);
    tick_loop.run_tick();

    assert!(tick_loop.state.player("p1").is_some());
    assert_eq!(room.connection_count(), 1);
    assert_eq!(types_of(&drain(&mut new_rx)), ["init", "state", "state"]);
    drain(&mut old_rx);
    assert_eq!(old_rx.try_recv(), Err(TryRecvError::Disconnected));
}

#[test]
fn dropped_receiver_is_pruned() {
    let (room, mut tick_loop) = make_room();
    let (_, mut keep_rx) = connect(&room, "p1", 64);
    let (_, gone_rx) = connect(&room, "p2", 64);
    tick_loop.run_tick();
    drop(gone_rx);

    tick_loop.run_tick();

    assert_eq!(room.connection_count(), 1);
    assert!(!drain(&mut keep_rx).is_empty());
}

#[test]
fn full_outbound_queue_drops_session() {
    let (room, mut tick_loop) = make_room();
    let (_, mut rx) = connect(&room, "p1", 1);

    tick_loop.run_tick();

    assert_eq!(room.connection_count(), 0);
    assert_eq!(types_of(&drain(&mut rx)), ["init"]);
}

#[test]
fn stats_track_each_tick() {
    let (room, mut tick_loop) = make_room();
    assert_eq!(room.stats(), RoomStats::default());
    let (_, _rx1) = connect(&room, "p1", 64);
    let (_, _rx2) = connect(&room, "p2", 64);

    tick_loop.run_tick();
    assert_eq!(room.stats().tick, 1);
    assert_eq!(room.stats().players, 2);

    tick_loop.state.kill_player("p2", DeathCause::Other);
    tick_loop.run_tick();
    assert_eq!(
        room.stats(),
        RoomStats {
            tick: 2,
            players: 2,
            alive_players: 1,
        }
    );
}

#[tokio::test]
async fn tick_loop_runs_until_shutdown() {
    let (room, tick_loop) = make_room();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tick_loop.spawn(shutdown_rx);
    let (_, mut rx) = connect(&room, "p1", 64);

    let deadline = Duration::from_secs(5);
    loop {
        let text = tokio::time::timeout(deadline, rx.recv())
            .await
            .expect("frame before deadline")
            .expect("channel open");
        let message: Value = serde_json::from_str(&text).expect("json");
        if message["type"] == "state" && message["data"]["tick"].as_u64() >= Some(1) {
            break;
        }
    }

    shutdown_tx.send_replace(true);
    tokio::time::timeout(deadline, handle)
        .await
        .expect("tick loop stops")
        .expect("tick loop task");
    assert!(room.stats().tick >= 1);
}

#[test]
fn panicking_transition_skips_the_tick_and_keeps_state() {
    let config = GameConfig {
        width: 0,
        height: 4,
        tick_ms: 10,
        start_length: 1,
        food_count: 0,
    };
    let mut state = GameState::with_rng(&config, StdRng::seed_from_u64(1));
    state.insert_player(Player {
        id: "p1".to_string(),
        name: "p1".to_string(),
        color: "hsl(0, 100%, 50%)".to_string(),
        body: [Cell::new(0, 0)].into_iter().collect(),
        direction: Direction::RIGHT,
        pending_direction: Direction::RIGHT,
        alive: true,
        score: 0,
        food_collected: 0,
        spawn_tick: 0,
        last_input_at: 0,
    });
    let (room, mut tick_loop) = Room::with_state(config, state);

    tick_loop.run_tick();
    tick_loop.run_tick();

    assert_eq!(tick_loop.state.tick(), 0);
    assert_eq!(room.stats().tick, 0);
    let player = tick_loop.state.player("p1").expect("player kept");
    assert!(player.alive);
    assert_eq!(player.head(), Some(Cell::new(0, 0)));

    tick_loop.state.remove_player("p1");
    tick_loop.run_tick();

    assert_eq!(tick_loop.state.tick(), 1);
    assert_eq!(room.stats().tick, 1);
}
