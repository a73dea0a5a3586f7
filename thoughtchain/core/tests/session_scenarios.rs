//! Session scenarios
//!
//! Drives a full controller through the public API with an in-process
//! transport, covering reassembly, cancellation races and the renderer view.

use std::sync::Mutex;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

use thoughtchain_core::{
    ChatError, ChatRequest, ChatSessionController, ChatStatus, ChatTransport, DispatchOutcome,
    SourceKey, StreamBufferManager, TransportEvent, TransportStream, WireEvent,
};

/// Transport whose streams are fed by the test
#[derive(Default)]
struct ScriptedTransport {
    senders: Mutex<Vec<mpsc::Sender<TransportEvent>>>,
}

impl ScriptedTransport {
    fn latest(&self) -> mpsc::Sender<TransportEvent> {
        self.senders
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no stream opened")
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open(&self, _request: &ChatRequest) -> Result<TransportStream, ChatError> {
        let (tx, stream) = TransportStream::channel(64);
        self.senders.lock().unwrap().push(tx);
        Ok(stream)
    }
}

fn thought(source: &str, task_id: Option<&str>, id: u32, chunk: &str) -> TransportEvent {
    let mut event = WireEvent::thought(source, id, chunk);
    if let Some(task_id) = task_id {
        event = event.with_task_id(task_id);
    }
    TransportEvent::Message(event.to_payload())
}

// =============================================================================
// Buffer scenarios
// =============================================================================

#[test]
fn test_gap_fill_scenario() {
    let mut manager = StreamBufferManager::new();
    assert_eq!(manager.add_segment("s", 2, "B"), "");
    assert_eq!(manager.add_segment("s", 1, "A"), "AB");
}

#[test]
fn test_reset_scenario() {
    let mut manager = StreamBufferManager::new();
    manager.add_segment("s", 1, "A");
    manager.reset();
    assert_eq!(manager.display_text("s"), "");
    assert!(manager.is_empty());
}

#[test]
fn test_placeholder_then_content() {
    let mut manager = StreamBufferManager::new();
    assert_eq!(manager.add_segment("s", 0, "Thinking..."), "Thinking...");
    assert_eq!(manager.add_segment("s", 2, "world"), "");
    assert_eq!(manager.add_segment("s", 0, "Thinking..."), "");
    assert_eq!(manager.add_segment("s", 1, "hello "), "hello world");
}

// =============================================================================
// Session scenarios
// =============================================================================

#[tokio::test]
async fn test_late_event_after_cancel_is_inert() {
    let mut controller = ChatSessionController::new(ScriptedTransport::default());
    let first = controller.submit("thread", "q").await.unwrap();

    controller.dispatch(thought("X", None, 1, "a"), first);
    assert_eq!(controller.display_text("X"), "a");

    controller.cancel();
    let after_cancel = controller.display_text("X");

    assert_eq!(
        controller.dispatch(thought("X", None, 2, "b"), first),
        DispatchOutcome::StaleDropped
    );
    assert_eq!(controller.display_text("X"), after_cancel);
    assert_eq!(controller.status(), ChatStatus::Idle);
}

#[tokio::test]
async fn test_interleaved_departments_stream_end_to_end() {
    let mut controller = ChatSessionController::new(ScriptedTransport::default());
    controller.submit("thread", "compare").await.unwrap();
    let tx = controller.transport().latest();

    let script = vec![
        thought("Supervisor", None, 0, "Planning..."),
        thought("WebDepartment", Some("t1"), 2, " results"),
        thought("Supervisor", None, 1, "Split into two searches."),
        thought("WebDepartment", Some("t2"), 1, "Second"),
        thought("WebDepartment", Some("t1"), 1, "First"),
        thought("WebDepartment", Some("t1"), 1, "First"),
        TransportEvent::Message(
            r#"{"type":"thought_complete","source":"WebDepartment","task_id":"t1"}"#.to_string(),
        ),
        TransportEvent::Message(WireEvent::final_output(2, "Paris.").to_payload()),
        TransportEvent::Message(WireEvent::final_output(1, "It is ").to_payload()),
        TransportEvent::Message(r#"{"type":"final_output_complete"}"#.to_string()),
        TransportEvent::Closed,
    ];
    for event in script {
        tx.send(event).await.unwrap();
    }

    assert_eq!(controller.run_to_completion().await, ChatStatus::Done);
    assert!(!controller.is_streaming());

    assert_eq!(controller.final_answer(), "It is Paris.");
    assert_eq!(
        controller.display_text("Supervisor"),
        "Split into two searches."
    );
    assert_eq!(controller.display_text("WebDepartment::t1"), "First results");
    assert_eq!(controller.display_text("WebDepartment::t2"), "Second");

    let snapshot = controller.snapshot();
    let keys: Vec<&str> = snapshot.items.iter().map(|i| i.key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["Supervisor", "WebDepartment::t1", "WebDepartment::t2"]
    );
    assert!(snapshot.item("WebDepartment::t1").unwrap().completed);
    assert!(!snapshot.item("WebDepartment::t2").unwrap().completed);
    assert_eq!(
        controller.completed_keys(),
        &[SourceKey::from("WebDepartment::t1")]
    );

    let stats = controller.buffers().stats();
    assert_eq!(stats.duplicates_ignored, 1);
}

#[tokio::test]
async fn test_displayed_text_only_grows() {
    let mut controller = ChatSessionController::new(ScriptedTransport::default());
    let generation = controller.submit("thread", "q").await.unwrap();

    let order = [4, 2, 2, 5, 1, 3, 6];
    let mut last = String::new();
    for id in order {
        controller.dispatch(thought("S", None, id, &id.to_string()), generation);
        let now = controller.display_text("S");
        assert!(now.starts_with(&last), "{last:?} -> {now:?}");
        last = now;
    }
    assert_eq!(last, "123456");
}

#[tokio::test]
async fn test_resubmit_discards_previous_generation() {
    let mut controller = ChatSessionController::new(ScriptedTransport::default());
    controller.submit("thread", "first").await.unwrap();
    let old_tx = controller.transport().latest();
    old_tx.send(thought("Old", None, 1, "x")).await.unwrap();
    controller.poll_transport();
    assert_eq!(controller.display_text("Old"), "x");

    controller.submit("thread", "second").await.unwrap();
    assert!(old_tx.send(thought("Old", None, 2, "y")).await.is_err());
    assert_eq!(controller.display_text("Old"), "");

    let new_tx = controller.transport().latest();
    new_tx.send(thought("New", None, 1, "z")).await.unwrap();
    new_tx.send(TransportEvent::Closed).await.unwrap();
    assert_eq!(controller.run_to_completion().await, ChatStatus::Done);
    assert_eq!(controller.display_text("New"), "z");
}

#[tokio::test]
async fn test_mid_stream_error_retains_partial_text() {
    let mut controller = ChatSessionController::new(ScriptedTransport::default());
    controller.submit("thread", "q").await.unwrap();
    let tx = controller.transport().latest();

    tx.send(thought("Web", None, 1, "partial")).await.unwrap();
    tx.send(TransportEvent::Error("connection reset".to_string()))
        .await
        .unwrap();

    assert_eq!(controller.run_to_completion().await, ChatStatus::Error);
    assert_eq!(controller.display_text("Web"), "partial");
    assert_eq!(
        controller.snapshot().error,
        Some(ChatError::Transport("connection reset".to_string()))
    );
}

#[tokio::test]
async fn test_resubmit_recovers_from_error_and_done() {
    let mut controller = ChatSessionController::new(ScriptedTransport::default());
    let failed = controller.submit("thread", "first").await.unwrap();
    let tx = controller.transport().latest();
    tx.send(thought("Web", None, 1, "partial")).await.unwrap();
    tx.send(TransportEvent::Error("connection reset".to_string()))
        .await
        .unwrap();
    assert_eq!(controller.run_to_completion().await, ChatStatus::Error);

    let retried = controller.submit("thread", "first").await.unwrap();
    assert_ne!(retried, failed);
    assert_eq!(controller.status(), ChatStatus::Processing);
    assert_eq!(controller.last_error(), None);
    assert_eq!(controller.display_text("Web"), "");
    assert!(controller.is_streaming());

    let tx = controller.transport().latest();
    tx.send(TransportEvent::Message(WireEvent::final_output(1, "ok").to_payload()))
        .await
        .unwrap();
    tx.send(TransportEvent::Message(r#"{"type":"done"}"#.to_string()))
        .await
        .unwrap();
    tx.send(TransportEvent::Closed).await.unwrap();
    assert_eq!(controller.run_to_completion().await, ChatStatus::Done);
    assert_eq!(controller.final_answer(), "ok");

    let again = controller.submit("thread", "second").await.unwrap();
    assert_ne!(again, retried);
    assert_eq!(controller.status(), ChatStatus::Processing);
    assert_eq!(controller.final_answer(), "");
    assert_eq!(
        controller.dispatch(thought("Web", None, 1, "late"), retried),
        DispatchOutcome::StaleDropped
    );
    assert_eq!(controller.display_text("Web"), "");
}
