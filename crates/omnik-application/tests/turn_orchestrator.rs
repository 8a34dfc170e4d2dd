//! End-to-end turns against a scripted query client and a recording transport.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use omnik_application::{TurnDefaults, TurnOrchestrator, TurnOutcome, TurnRequest};
use omnik_core::config::OmnikConfig;
use omnik_core::{
    CancelAffordance, ChatTransport, ContainerId, ContentItem, QueryClient, QueryError,
    QueryRequest, QueryStream, Result, StreamEvent,
};
use omnik_execution::renderer::{BUSY_NOTICE, STOPPED_NOTICE};
use omnik_execution::{CancellationCoordinator, FlushPolicy, OutputRenderer};
use omnik_infrastructure::{SessionArchiver, SessionRegistry};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test doubles
// ============================================================================

enum Step {
    Event(StreamEvent),
    Fail(QueryError),
    /// Block until cancelled, like a long-running process.
    WaitForCancel,
    /// Go quiet for a while, like a slow tool run.
    Pause(Duration),
}

/// Plays back one script per `run` call.
#[derive(Default)]
struct ScriptedClient {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    requests: Mutex<Vec<QueryRequest>>,
    terminated: Arc<AtomicBool>,
}

impl ScriptedClient {
    fn with_scripts(scripts: Vec<Vec<Step>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        }
    }

    fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryClient for ScriptedClient {
    fn run(&self, request: QueryRequest, cancel: CancellationToken) -> QueryStream {
        self.requests.lock().unwrap().push(request);
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        let terminated = self.terminated.clone();

        let (event_tx, event_rx) = mpsc::channel(32);
        let (error_tx, error_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            for step in script {
                match step {
                    Step::Event(event) => {
                        if cancel.is_cancelled() || event_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Step::Fail(err) => {
                        let _ = error_tx.send(err).await;
                        break;
                    }
                    Step::WaitForCancel => {
                        cancel.cancelled().await;
                        terminated.store(true, Ordering::SeqCst);
                        break;
                    }
                    Step::Pause(duration) => tokio::time::sleep(duration).await,
                }
            }
            drop(event_tx);
        });

        QueryStream {
            events: event_rx,
            errors: error_rx,
        }
    }

    async fn health(&self) -> Result<String> {
        Ok("scripted".to_string())
    }
}

#[derive(Default)]
struct RecordingTransport {
    containers: Mutex<Vec<(String, String, CancelAffordance)>>,
}

impl RecordingTransport {
    /// `(text, affordance)` of every container, oldest first.
    fn containers(&self) -> Vec<(String, CancelAffordance)> {
        self.containers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text, cancel)| (text.clone(), *cancel))
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn create_container(
        &self,
        conversation_key: &str,
        text: &str,
        cancel: CancelAffordance,
    ) -> Result<ContainerId> {
        let mut containers = self.containers.lock().unwrap();
        containers.push((conversation_key.to_string(), text.to_string(), cancel));
        Ok(ContainerId::new((containers.len() - 1).to_string()))
    }

    async fn edit_container(
        &self,
        container: &ContainerId,
        text: &str,
        cancel: CancelAffordance,
    ) -> Result<()> {
        let index: usize = container.0.parse().unwrap();
        let mut containers = self.containers.lock().unwrap();
        containers[index].1 = text.to_string();
        containers[index].2 = cancel;
        Ok(())
    }

    async fn set_cancel_affordance(
        &self,
        container: &ContainerId,
        cancel: CancelAffordance,
    ) -> Result<()> {
        let index: usize = container.0.parse().unwrap();
        self.containers.lock().unwrap()[index].2 = cancel;
        Ok(())
    }
}

struct Harness {
    _temp_dir: TempDir,
    registry: Arc<SessionRegistry>,
    client: Arc<ScriptedClient>,
    transport: Arc<RecordingTransport>,
    orchestrator: Arc<TurnOrchestrator>,
}

async fn harness(scripts: Vec<Vec<Step>>, max_container_chars: usize) -> Harness {
    let policy = FlushPolicy {
        every_events: 1,
        ..FlushPolicy::default()
    };
    harness_with_policy(scripts, max_container_chars, policy).await
}

async fn harness_with_policy(
    scripts: Vec<Vec<Step>>,
    max_container_chars: usize,
    policy: FlushPolicy,
) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let registry = Arc::new(
        SessionRegistry::open(
            temp_dir.path().join("sessions.json"),
            SessionArchiver::new(
                temp_dir.path().join("archives"),
                temp_dir.path().join("projects"),
            ),
        )
        .await
        .unwrap(),
    );
    let client = Arc::new(ScriptedClient::with_scripts(scripts));
    let transport = Arc::new(RecordingTransport::default());
    let renderer = OutputRenderer::new(transport.clone(), max_container_chars, policy);
    let defaults = TurnDefaults::from_config(&OmnikConfig::default(), "/workspace");

    let orchestrator = Arc::new(TurnOrchestrator::new(
        registry.clone(),
        client.clone(),
        Arc::new(CancellationCoordinator::new()),
        renderer,
        defaults,
    ));

    Harness {
        _temp_dir: temp_dir,
        registry,
        client,
        transport,
        orchestrator,
    }
}

fn init(id: &str) -> Step {
    Step::Event(StreamEvent::SystemInit {
        correlation_id: id.to_string(),
    })
}

fn text(t: &str) -> Step {
    Step::Event(StreamEvent::AssistantContent {
        items: vec![ContentItem::text(t)],
    })
}

fn terminal() -> Step {
    Step::Event(StreamEvent::Terminal)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_short_reply_completes_in_one_container() {
    let h = harness(vec![vec![init("abc"), text("4"), terminal()]], 4000).await;

    let outcome = h
        .orchestrator
        .run_turn(TurnRequest::new("chat", "what is 2+2?"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Completed {
            session: "default".to_string(),
            containers: 1
        }
    );
    assert_eq!(
        h.transport.containers(),
        vec![("4".to_string(), CancelAffordance::Removed)]
    );

    let current = h.registry.current().await.unwrap();
    assert_eq!(current.name, "default");
    assert_eq!(current.correlation_id, "abc");
    assert_eq!(current.working_dir, Path::new("/workspace"));
    assert!(!h.orchestrator.coordinator().is_busy("chat").await);
}

#[tokio::test]
async fn test_tool_call_between_text_keeps_order() {
    let h = harness(
        vec![vec![
            init("abc"),
            text("Let me look."),
            Step::Event(StreamEvent::AssistantContent {
                items: vec![ContentItem::tool_use("Read", json!({"file_path": "/a/b.txt"}))],
            }),
            text("Done."),
            terminal(),
        ]],
        4000,
    )
    .await;

    h.orchestrator
        .run_turn(TurnRequest::new("chat", "read b"))
        .await
        .unwrap();

    assert_eq!(
        h.transport.containers()[0].0,
        "Let me look.\n\n📖 Read: b.txt\n\nDone."
    );
}

#[tokio::test]
async fn test_second_turn_resumes_conversation() {
    let h = harness(
        vec![
            vec![init("abc"), text("hi"), terminal()],
            vec![init("ignored"), text("again"), terminal()],
        ],
        4000,
    )
    .await;
    h.registry.create("api", "", "/workspace/api").await.unwrap();

    h.orchestrator.run_turn(TurnRequest::new("chat", "one")).await.unwrap();
    h.orchestrator
        .run_turn(TurnRequest::new("chat", "two").with_model("opus"))
        .await
        .unwrap();

    let requests = h.client.requests();
    assert_eq!(requests[0].resume_id, None);
    assert_eq!(requests[0].working_dir, Path::new("/workspace/api"));
    assert_eq!(requests[1].resume_id.as_deref(), Some("abc"));
    assert_eq!(requests[1].model.as_deref(), Some("opus"));
    assert_eq!(h.registry.get("api").await.unwrap().correlation_id, "abc");
}

#[tokio::test]
async fn test_long_output_spans_three_containers() {
    let long: String = "0123456789".repeat(900);
    let h = harness(vec![vec![text(&long), terminal()]], 4000).await;

    let outcome = h
        .orchestrator
        .run_turn(TurnRequest::new("chat", "long"))
        .await
        .unwrap();

    assert!(matches!(outcome, TurnOutcome::Completed { containers: 3, .. }));
    let containers = h.transport.containers();
    assert_eq!(containers.len(), 3);
    assert!(containers.iter().all(|(_, cancel)| *cancel == CancelAffordance::Removed));
    assert_eq!(containers[2].0, format!("(part 3)\n\n{}", &long[8000..]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_buffered_text_flushes_while_the_assistant_is_quiet() {
    let policy = FlushPolicy {
        every_events: 0,
        interval: Duration::from_millis(100),
        min_edit_interval: Duration::ZERO,
    };
    let script = vec![text("hello"), Step::Pause(Duration::from_millis(1500)), terminal()];
    let h = harness_with_policy(vec![script], 4000, policy).await;

    let orchestrator = h.orchestrator.clone();
    let turn = tokio::spawn(async move {
        orchestrator
            .run_turn(TurnRequest::new("chat", "go"))
            .await
    });

    // Shown on the interval, long before the next event arrives.
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if h.transport.containers().first().map(|(t, _)| t.as_str()) == Some("hello") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(h.transport.containers()[0].1, CancelAffordance::Attached);

    let outcome = turn.await.unwrap().unwrap();
    assert!(matches!(outcome, TurnOutcome::Completed { containers: 1, .. }));
    assert_eq!(
        h.transport.containers(),
        vec![("hello".to_string(), CancelAffordance::Removed)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_keeps_rendered_text_and_posts_notice() {
    let fifty = "y".repeat(50);
    let h = harness(vec![vec![text(&fifty), Step::WaitForCancel]], 4000).await;

    let orchestrator = h.orchestrator.clone();
    let turn = tokio::spawn(async move {
        orchestrator
            .run_turn(TurnRequest::new("chat", "go"))
            .await
    });

    // Wait until the 50 characters are on screen.
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if h.transport.containers().first().map(|(t, _)| t.as_str()) == Some(fifty.as_str()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(h.orchestrator.stop("chat").await);
    // A repeated stop may land before or after the turn releases its key.
    h.orchestrator.stop("chat").await;

    let outcome = turn.await.unwrap().unwrap();
    assert_eq!(outcome, TurnOutcome::Stopped);
    assert_eq!(
        h.transport.containers(),
        vec![
            (fifty, CancelAffordance::Removed),
            (STOPPED_NOTICE.to_string(), CancelAffordance::Removed),
        ]
    );
    assert!(h.client.terminated.load(Ordering::SeqCst));
    assert!(!h.orchestrator.stop("chat").await);
}

#[tokio::test]
async fn test_subprocess_failure_shows_summary() {
    let h = harness(
        vec![vec![text("partial"), Step::Fail(QueryError::Exited { code: Some(1) })]],
        4000,
    )
    .await;

    let outcome = h
        .orchestrator
        .run_turn(TurnRequest::new("chat", "boom"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Failed {
            summary: "assistant exited with code 1".to_string()
        }
    );
    assert_eq!(
        h.transport.containers(),
        vec![(
            "❌ Error: assistant exited with code 1".to_string(),
            CancelAffordance::Removed
        )]
    );
    assert!(!h.orchestrator.coordinator().is_busy("chat").await);
}

#[tokio::test]
async fn test_no_output_completion_notice() {
    let h = harness(vec![vec![init("abc"), terminal()]], 4000).await;

    h.orchestrator.run_turn(TurnRequest::new("chat", "quiet")).await.unwrap();
    assert_eq!(
        h.transport.containers(),
        vec![("✅ Done (no output)".to_string(), CancelAffordance::Removed)]
    );
}

#[tokio::test]
async fn test_second_turn_on_same_key_is_busy() {
    let h = harness(vec![vec![text("x"), terminal()]], 4000).await;
    let coordinator = h.orchestrator.coordinator().clone();
    assert!(!coordinator.register("chat").await.is_busy());

    let outcome = h
        .orchestrator
        .run_turn(TurnRequest::new("chat", "second"))
        .await
        .unwrap();

    assert_eq!(outcome, TurnOutcome::Busy);
    assert!(h.client.requests().is_empty());
    assert_eq!(
        h.transport.containers(),
        vec![(BUSY_NOTICE.to_string(), CancelAffordance::Removed)]
    );

    // Another key is unaffected.
    let other = h
        .orchestrator
        .run_turn(TurnRequest::new("other-chat", "hi"))
        .await
        .unwrap();
    assert!(matches!(other, TurnOutcome::Completed { .. }));
}
