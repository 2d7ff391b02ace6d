//! End-to-end tests: console lines in, chat and console output out.

mod common;

use common::{Harness, eventually, log_line};
use craftrelay::bridge::Direction;
use craftrelay::commands::Source;
use craftrelay::identity::{ADMIN, Namespace, OPERATOR, USER};
use craftrelay::world::{JsonWorld, WorldData};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_uuid_line_registers_player() {
    let h = Harness::new();
    h.feed(&[log_line("UUID of player Steve is 1234-abcd")]).await;

    let steve = h
        .state
        .identities
        .resolve("Steve", Namespace::GameName)
        .expect("registered from the log");
    assert_eq!(steve.uuid.as_deref(), Some("1234-abcd"));
    assert!(h.users_store.save_count() >= 1);
}

#[tokio::test]
async fn test_uuid_line_fills_existing_identity() {
    let h = Harness::new();
    h.user("steve_x", Some("Steve"), USER);
    let before = h.state.identities.len();

    h.feed(&[log_line("UUID of player Steve is 1234-abcd")]).await;

    assert_eq!(h.state.identities.len(), before);
    let steve = h.state.identities.lookup("steve_x").expect("identity");
    assert_eq!(steve.uuid.as_deref(), Some("1234-abcd"));
}

#[tokio::test]
async fn test_game_chat_command_is_answered() {
    let h = Harness::new();
    h.pipeline.submit(log_line("<Steve> relay ping"));

    assert!(eventually(|| h.console.lines() == vec!["say Yes ?".to_string()]).await);
    assert!(eventually(|| h.chat.room() == vec!["Yes ?".to_string()]).await);
    h.shutdown().await;
}

#[tokio::test]
async fn test_game_command_waits_for_its_output() {
    let h = Harness::new();
    h.console
        .script("list", &["There are 1 of a max of 20 players online:", "Steve"]);

    h.pipeline.submit(log_line("<Steve> relay list"));

    let expected = vec![
        "list".to_string(),
        "say There are 1 of a max of 20 players online:".to_string(),
        "say Steve".to_string(),
    ];
    assert!(
        eventually(|| h.console.lines() == expected).await,
        "{:?}",
        h.console.lines()
    );
    assert!(h.chat.room().is_empty());
    h.shutdown().await;
}

#[tokio::test]
async fn test_mirrored_game_command_keeps_order() {
    let h = Harness::new();
    h.mirror(Direction::GameToChat, true);
    h.pipeline.submit(log_line("<Steve> relay ping"));

    assert!(
        eventually(|| h.chat.room().len() == 2).await,
        "{:?}",
        h.chat.room()
    );
    assert_eq!(
        h.chat.room(),
        vec!["<Steve> relay ping".to_string(), "Yes ?".to_string()]
    );
    h.shutdown().await;
}

#[tokio::test]
async fn test_server_start_and_stop_are_announced() {
    let h = Harness::new();
    let saves = h.settings_store.save_count();

    h.feed(&[
        log_line("Done (3.141s)! For help, type \"help\""),
        log_line("Stopping the server"),
    ])
    .await;

    assert_eq!(
        h.chat.room(),
        vec!["And we're online.".to_string(), "Server going down.".to_string()]
    );
    assert!(h.settings_store.save_count() > saves);
}

#[tokio::test]
async fn test_unrelated_lines_are_ignored() {
    let h = Harness::new();
    h.mirror(Direction::GameToChat, true);
    h.feed(&[
        "Loading libraries, please wait...".to_string(),
        "[12:00:00] [Server thread/WARN]: Can't keep up!".to_string(),
        log_line("Preparing spawn area: 42%"),
    ])
    .await;

    assert!(h.chat.room().is_empty());
    assert!(h.console.lines().is_empty());
}

#[tokio::test]
async fn test_whereis_reads_world_data() {
    let world = JsonWorld::from_value(json!({
        "players": {
            "Steve": { "Pos": [12.4, 64.0, -7.6] },
            "Alex": { "Pos": "somewhere" }
        }
    }));
    let h = Harness::with_world(Arc::new(world));
    h.user("alice", None, USER);
    h.user("olga", None, OPERATOR);

    let response = h
        .dispatch("whereis Steve", "alice", Source::GroupChat)
        .await;
    assert_eq!(response.text.as_deref(), Some("Steve is at 12 64 -8"));

    let response = h
        .dispatch("whereis Alex", "alice", Source::GroupChat)
        .await;
    assert!(response.text.unwrap().contains("something went wrong"));
    assert!(h.state.last_error().is_some());

    let response = h
        .dispatch("data players.Steve.Pos", "olga", Source::GroupChat)
        .await;
    let text = response.text.expect("reply");
    assert!(text.starts_with("(list): "), "{text}");
    h.shutdown().await;
}

#[tokio::test]
async fn test_reload_world_rereads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.json");
    std::fs::write(&path, r#"{"players": {"Steve": {"Pos": [1.0, 2.0, 3.0]}}}"#).unwrap();
    let world = Arc::new(JsonWorld::open(&path).unwrap());
    let h = Harness::with_world(world.clone());
    h.user("adam", None, ADMIN);

    std::fs::write(&path, r#"{"players": {"Steve": {"Pos": [4.0, 5.0, 6.0]}}}"#).unwrap();
    let response = h.dispatch("reload world", "adam", Source::GroupChat).await;
    assert!(response.text.unwrap().contains("done"));

    let response = h.dispatch("whereis Steve", "adam", Source::GroupChat).await;
    assert_eq!(response.text.as_deref(), Some("Steve is at 4 5 6"));
    assert!(world.fetch("players.Alex").is_err());
    h.shutdown().await;
}
