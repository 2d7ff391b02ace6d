//! Integration tests for command dispatch: authorization, matching and
//! failure classification.

mod common;

use common::Harness;
use craftrelay::bridge::Direction;
use craftrelay::commands::Source;
use craftrelay::identity::{ADMIN, OPERATOR, USER};
use craftrelay::transport::Presence;
use serde_json::json;

#[tokio::test]
async fn test_set_then_get_roundtrip() {
    let h = Harness::new();
    h.user("alice", None, ADMIN);

    let response = h
        .dispatch("set chatbot.maxlen 500", "alice", Source::GroupChat)
        .await;
    assert_eq!(response.text.as_deref(), Some("Value successfully changed"));
    assert_eq!(h.state.settings.get_i64("chatbot.maxlen"), Some(500));
    assert_eq!(h.state.max_len(), 500);
    assert!(h.settings_store.save_count() >= 1);

    let response = h
        .dispatch("get chatbot.maxlen", "alice", Source::GroupChat)
        .await;
    let text = response.text.expect("reply");
    assert!(text.contains("500"), "{text}");
    assert!(text.contains("Integer"), "{text}");
    assert_eq!(
        response.target.and_then(|t| t.nickname).as_deref(),
        Some("alice")
    );
    h.shutdown().await;
}

#[tokio::test]
async fn test_set_keeps_value_type() {
    let h = Harness::new();
    h.user("alice", None, ADMIN);

    let response = h
        .dispatch("set chatbot.maxlen lots", "alice", Source::GroupChat)
        .await;
    assert!(response.text.unwrap().contains("You messed up the syntax"));
    assert_eq!(h.state.settings.get_i64("chatbot.maxlen"), Some(1024));

    h.dispatch("set chatbot.mirror.gametochat true", "alice", Source::GroupChat)
        .await;
    assert!(h.state.mirror_enabled(Direction::GameToChat));

    h.dispatch("set language!general.unknown Eh?", "alice", Source::GroupChat)
        .await;
    let response = h.dispatch("frobnicate", "alice", Source::GroupChat).await;
    assert_eq!(response.text.as_deref(), Some("Eh?"));
    h.shutdown().await;
}

#[tokio::test]
async fn test_who_am_i_bypasses_registry() {
    let h = Harness::new();
    let response = h.dispatch("who am i", "Steve", Source::Game).await;
    let text = response.text.expect("reply");
    assert!(text.contains("Steve"), "{text}");
    assert!(text.contains("Anon"), "{text}");

    h.user("alice", None, OPERATOR);
    let response = h.dispatch("Who am I?", "alice", Source::GroupChat).await;
    assert!(response.text.unwrap().contains("Operator"));
    h.shutdown().await;
}

#[tokio::test]
async fn test_privilege_is_monotonic() {
    let h = Harness::new();
    h.user("anna", None, USER);
    h.user("olga", None, OPERATOR);
    h.user("adam", None, ADMIN);

    let response = h.dispatch("get chatbot.maxlen", "nobody", Source::GroupChat).await;
    assert!(response.text.unwrap().contains("Who even are you"));

    for issuer in ["anna", "olga"] {
        let response = h.dispatch("get chatbot.maxlen", issuer, Source::GroupChat).await;
        let text = response.text.expect("reply");
        assert!(text.contains("trying to play admin"), "{issuer}: {text}");
        assert!(response.target.is_none());
    }

    let response = h.dispatch("save all", "anna", Source::GroupChat).await;
    assert!(response.text.unwrap().contains("trying to play operator"));

    let response = h.dispatch("get chatbot.maxlen", "adam", Source::GroupChat).await;
    assert!(response.text.unwrap().contains("1024"));
    h.shutdown().await;
}

#[tokio::test]
async fn test_impersonation_is_refused() {
    let h = Harness::new();
    let bob = h.user("bob", None, ADMIN);
    h.state
        .identities
        .set_address(bob.id, Some("bob@example.org/phone"))
        .unwrap();

    h.chat.set_presence("bob@example.org", Presence::Unavailable);
    let response = h.dispatch("get chatbot.maxlen", "bob", Source::GroupChat).await;
    assert!(response.text.unwrap().contains("Nice try"));
    assert!(response.target.is_none());

    // Direct messages prove the address, the roster is not consulted.
    let response = h
        .dispatch("get chatbot.maxlen", "bob@example.org/phone", Source::DirectMessage)
        .await;
    assert!(response.text.unwrap().contains("1024"));

    h.chat.set_presence("bob@example.org", Presence::Available);
    let response = h.dispatch("get chatbot.maxlen", "bob", Source::GroupChat).await;
    assert!(response.text.unwrap().contains("1024"));
    h.shutdown().await;
}

#[tokio::test]
async fn test_syntax_error_echoes_syntax() {
    let h = Harness::new();
    h.user("alice", None, ADMIN);

    let response = h.dispatch("set onlykey", "alice", Source::GroupChat).await;
    let text = response.text.expect("reply");
    assert!(text.contains("You messed up the syntax"), "{text}");
    assert!(text.contains("set [file!]<setting name> <value>"), "{text}");
    assert!(h.state.last_error().is_none());
    h.shutdown().await;
}

#[tokio::test]
async fn test_unknown_command() {
    let h = Harness::new();
    let response = h.dispatch("make me a sandwich", "alice", Source::GroupChat).await;
    assert!(response.text.unwrap().contains("I have no idea"));
    h.shutdown().await;
}

#[tokio::test]
async fn test_internal_failure_is_recorded_and_hidden() {
    let h = Harness::new();
    h.user("alice", None, ADMIN);
    h.settings_store.fail_saves(true);

    let response = h
        .dispatch("set chatbot.maxlen 7", "alice", Source::GroupChat)
        .await;
    let text = response.text.expect("reply");
    assert!(text.contains("something went wrong"), "{text}");
    assert!(!text.contains("save disabled"), "{text}");

    let last = h.state.last_error().expect("last error recorded");
    assert_eq!(last.command, "Core.set");
    assert_eq!(last.code, "internal");

    let response = h.dispatch("what was that", "alice", Source::GroupChat).await;
    let text = response.text.expect("reply");
    assert!(text.contains("Core.set"), "{text}");
    assert!(h.state.last_error().is_none());
    h.shutdown().await;
}

#[tokio::test]
async fn test_toggle_commands_and_mirroring() {
    let h = Harness::new();
    h.user("olga", None, OPERATOR);

    let response = h.dispatch("disable Game.say", "olga", Source::GroupChat).await;
    assert_eq!(response.text.as_deref(), Some("Command Game.say disabled"));
    let response = h.dispatch("say hi", "olga", Source::GroupChat).await;
    assert!(response.text.unwrap().contains("I have no idea"));
    assert!(h.console.lines().is_empty());

    h.dispatch("enable say", "olga", Source::GroupChat).await;
    let response = h.dispatch("say hi", "olga", Source::GroupChat).await;
    assert_eq!(response.text.as_deref(), Some("[server] hi"));
    assert!(!response.echo_both_sides);
    assert_eq!(h.console.lines(), vec!["say hi".to_string()]);

    let response = h.dispatch("disable toggle", "olga", Source::GroupChat).await;
    assert!(response.text.unwrap().contains("You messed up the syntax"));

    let response = h.dispatch("enable mtx", "olga", Source::GroupChat).await;
    assert_eq!(response.text.as_deref(), Some("Game to chat mirroring enabled"));
    assert!(h.state.mirror_enabled(Direction::GameToChat));
    assert!(!h.state.mirror_enabled(Direction::ChatToGame));
    assert_eq!(
        h.settings_store
            .snapshot()
            .and_then(|doc| doc.get("chatbot.mirror.gametochat").cloned()),
        Some(json!(true))
    );
    h.shutdown().await;
}

#[tokio::test]
async fn test_link_is_commutative() {
    let h = Harness::new();
    h.user("alice", None, ADMIN);
    h.state.identities.register_from_game("Steve", None).unwrap();

    let response = h.dispatch("steve_x is Steve", "alice", Source::GroupChat).await;
    assert_eq!(
        response.text.as_deref(),
        Some("Successfully linked player Steve to steve_x")
    );
    let before = h.state.identities.len();

    h.dispatch("Steve is steve_x", "alice", Source::GroupChat).await;
    assert_eq!(h.state.identities.len(), before);
    let steve = h
        .state
        .identities
        .lookup("#Steve")
        .expect("linked identity");
    assert_eq!(steve.nickname.as_deref(), Some("steve_x"));
    h.shutdown().await;
}

#[tokio::test]
async fn test_usermod_caps_level_at_issuer() {
    let h = Harness::new();
    h.user("olga", None, OPERATOR);
    h.user("anna", None, USER);

    let response = h
        .dispatch("usermod anna level Admin", "olga", Source::GroupChat)
        .await;
    assert_eq!(
        response.text.as_deref(),
        Some("Can't set level higher than yours")
    );

    let response = h
        .dispatch("usermod anna level 2", "olga", Source::GroupChat)
        .await;
    assert_eq!(
        response.text.as_deref(),
        Some("Successfully changed user level")
    );
    assert_eq!(h.state.identities.lookup("anna").unwrap().level, 2);

    let response = h
        .dispatch("usermod nobody level 1", "olga", Source::GroupChat)
        .await;
    assert!(response.text.unwrap().contains("Can't find"));
    h.shutdown().await;
}

#[tokio::test]
async fn test_console_output_is_captured() {
    let h = Harness::new();
    h.user("olga", None, OPERATOR);
    h.console.script(
        "list",
        &["There are 1 of a max of 20 players online:", "Steve"],
    );

    let response = h.dispatch("$list", "olga", Source::GroupChat).await;
    assert_eq!(
        response.text.as_deref(),
        Some("There are 1 of a max of 20 players online:\nSteve")
    );
    assert!(!response.echo_both_sides);

    h.user("steve_x", Some("Steve"), OPERATOR);
    let response = h.dispatch("$list", "Steve", Source::Game).await;
    assert_eq!(response.text.as_deref(), Some("Successfully executed"));
    assert_eq!(h.console.lines(), vec!["list".to_string(), "list".to_string()]);
    h.shutdown().await;
}

#[tokio::test]
async fn test_help_lists_accessible_commands() {
    let h = Harness::new();
    let response = h.dispatch("help", "nobody", Source::GroupChat).await;
    let text = response.text.expect("reply");
    assert!(text.contains("ping"), "{text}");
    assert!(!text.contains("set"), "{text}");

    let response = h.dispatch("help nonexistent", "nobody", Source::GroupChat).await;
    assert!(response.text.unwrap().contains("Can't find"));
    h.shutdown().await;
}

#[tokio::test]
async fn test_linking_a_linked_pair_changes_nothing() {
    let h = Harness::new();
    h.user("alice", None, ADMIN);
    let sam = h.user("sam", Some("sam"), USER);
    let before = h.state.identities.len();

    let response = h.dispatch("sam is sam", "alice", Source::GroupChat).await;
    assert_eq!(
        response.text.as_deref(),
        Some("Successfully linked player sam to sam")
    );
    assert_eq!(h.state.identities.len(), before);
    assert_eq!(h.state.identities.lookup("sam").map(|i| i.id), Some(sam.id));
    h.shutdown().await;
}

#[tokio::test]
async fn test_who_am_i_needs_whole_words() {
    let h = Harness::new();
    h.user("alice", None, ADMIN);
    let response = h.dispatch("who am idiot", "alice", Source::GroupChat).await;
    let text = response.text.expect("reply");
    assert!(!text.starts_with("You are"), "{text}");
    h.shutdown().await;
}
