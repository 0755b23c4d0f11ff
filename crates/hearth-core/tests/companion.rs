//! Integration tests for the Companion service object.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hearth_ai::{MockLlmClient, MockStep, Role};
use hearth_core::{ChatConfig, ChatSink, Companion, HearthConfig, LinkCodeOutcome};
use tempfile::{TempDir, tempdir};
use tokio::time::sleep;
use uuid::Uuid;

/// Sink that records everything broadcast to the host.
#[derive(Default)]
struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl ChatSink for RecordingSink {
    fn broadcast_message(&self, text: &str) {
        self.lines.lock().unwrap().push(text.to_string());
    }
}

fn config_in(dir: &TempDir) -> HearthConfig {
    HearthConfig {
        data_dir: Some(dir.path().to_path_buf()),
        chat: ChatConfig::default(),
    }
}

fn companion_with(
    config: HearthConfig,
    steps: Vec<MockStep>,
) -> (Companion, MockLlmClient) {
    let client = MockLlmClient::from_steps("mock-model", steps);
    let companion = Companion::with_client(config, Arc::new(client.clone())).unwrap();
    (companion, client)
}

async fn wait_for_calls(client: &MockLlmClient, expected: usize) {
    for _ in 0..200 {
        if client.call_count().await == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {expected} completion calls, saw {}",
        client.call_count().await
    );
}

#[tokio::test]
async fn link_code_round_trip() {
    let dir = tempdir().unwrap();
    let (companion, _client) = companion_with(config_in(&dir), vec![]);
    let p1 = Uuid::new_v4();

    let LinkCodeOutcome::Pending(code) = companion.request_link_code(p1) else {
        panic!("expected a fresh code");
    };

    assert!(companion.redeem_code(&code, 555));
    assert_eq!(companion.linked_account(p1), Some(555));

    // The same code never redeems twice.
    assert!(!companion.redeem_code(&code, 556));
    assert_eq!(companion.linked_account(p1), Some(555));

    // Requesting again reports the existing link instead of a new code.
    assert_eq!(
        companion.request_link_code(p1),
        LinkCodeOutcome::AlreadyLinked(555)
    );

    assert!(companion.remove_link(p1));
    assert_eq!(companion.linked_account(p1), None);
    assert!(!companion.remove_link(p1));
}

#[tokio::test]
async fn greeting_question_invokes_completion_exactly_once() {
    let dir = tempdir().unwrap();
    let (companion, client) =
        companion_with(config_in(&dir), vec![MockStep::text("Привет, Pasha!")]);
    let p2 = Uuid::new_v4();

    // "Привет?" matches both the greeting and the question heuristics and
    // there is no prior cooldown.
    companion.on_chat_message(p2, "Pasha", "Привет?");
    wait_for_calls(&client, 1).await;

    let requests = client.received().await;
    let prompt = &requests[0].messages;
    assert_eq!(prompt[0].role, Role::System);
    let last = prompt.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert!(last.content.starts_with("Pasha: "));

    // The reply is delivered on the host tick, with the companion prefix.
    let sink = RecordingSink::default();
    companion.on_tick(&sink);
    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Привет, Pasha!"));
    assert!(lines[0].starts_with("Ember"));

    assert_eq!(client.call_count().await, 1);
}

#[tokio::test]
async fn ineligible_chatter_causes_no_calls() {
    let dir = tempdir().unwrap();
    let (companion, client) = companion_with(config_in(&dir), vec![]);
    let id = Uuid::new_v4();

    for i in 0..10 {
        companion.on_chat_message(id, "Alex", &format!("moving the sheep, round {i}"));
    }
    sleep(Duration::from_millis(150)).await;

    assert_eq!(client.call_count().await, 0);

    let sink = RecordingSink::default();
    companion.on_tick(&sink);
    assert!(sink.lines().is_empty());
}

#[tokio::test]
async fn join_greeting_opens_the_greeting_window() {
    let dir = tempdir().unwrap();
    let (companion, client) = companion_with(config_in(&dir), vec![]);
    let id = Uuid::new_v4();
    let sink = RecordingSink::default();

    companion.on_player_join(id, "Steve", &sink);
    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Steve"));

    // A bare greeting is now eligible even though it is not a question.
    companion.on_chat_message(id, "Steve", "здаров");
    wait_for_calls(&client, 1).await;
}

#[tokio::test]
async fn disabled_companion_keeps_linking_active() {
    let dir = tempdir().unwrap();
    let mut config = config_in(&dir);
    config.chat.enabled = false;
    let (companion, client) = companion_with(config, vec![]);
    let id = Uuid::new_v4();
    let sink = RecordingSink::default();

    companion.on_player_join(id, "Steve", &sink);
    companion.on_chat_message(id, "Steve", "ember, how are you?");
    companion.on_tick(&sink);
    sleep(Duration::from_millis(100)).await;

    assert!(sink.lines().is_empty());
    assert_eq!(client.call_count().await, 0);

    let LinkCodeOutcome::Pending(code) = companion.request_link_code(id) else {
        panic!("expected a fresh code");
    };
    assert!(companion.redeem_code(&code, 42));
    assert_eq!(companion.linked_account(id), Some(42));
}

#[tokio::test]
async fn shutdown_quiesces_the_relay() {
    let dir = tempdir().unwrap();
    let (companion, client) = companion_with(config_in(&dir), vec![MockStep::text("late")]);
    let id = Uuid::new_v4();

    companion.shutdown(Duration::from_millis(200)).await;

    companion.on_chat_message(id, "Alex", "anyone there?");
    sleep(Duration::from_millis(100)).await;
    assert_eq!(client.call_count().await, 0);
}
