//! Tabletalk integration test harness.
//!
//! Tests run fully in-process: a temp CSV becomes the dataset, and a
//! scripted completion client stands in for the model API. Each test gets
//! its own dataset directory and its own sessions; the worker pool is the
//! only shared machinery under test.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use tabletalk_core::conversation::ConversationLog;
use tabletalk_core::message::Message;
pub use tabletalk_services::{
    Completion, CompletionClient, CompletionError, Dashboard, DatasetStore, Session,
    SessionHandle, ToolContext, UiEvent, WorkerPool,
};

mod properties;
mod scenarios;

pub const MODEL: &str = "test-model";
pub const SYSTEM_PROMPT: &str = "You answer questions about the players table.";
pub const GREETING: &str = "Hi! Ask me about the players.";

// ── Dataset fixture ───────────────────────────────────────────────────────────

static DATASET_SEQ: AtomicU32 = AtomicU32::new(0);

/// Temp-dir dataset, removed on drop.
pub struct TestDataset {
    pub store: DatasetStore,
    dir: PathBuf,
}

impl Drop for TestDataset {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

pub fn nba_dataset() -> TestDataset {
    let dir = std::env::temp_dir().join(format!(
        "tabletalk-integration-{}-{}",
        std::process::id(),
        DATASET_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::create_dir_all(&dir).unwrap();
    let csv = dir.join("nba.csv");
    std::fs::write(
        &csv,
        "name,height_cm,team\n\
         Wembanyama,224,Spurs\n\
         Porzingis,221,Celtics\n\
         Curry,188,Warriors\n",
    )
    .unwrap();
    let store = DatasetStore::new(dir.join("nba.db"), "players");
    store.load_csv(&csv).unwrap();
    TestDataset { store, dir }
}

// ── Scripted completion client ────────────────────────────────────────────────

/// What the fake model does for one completion call.
#[derive(Clone)]
pub enum Script {
    /// Plain final answer, no tool use.
    Answer(&'static str),
    /// Run one query through the tool context, then answer.
    QueryThenAnswer {
        sql: &'static str,
        title: &'static str,
        answer: &'static str,
    },
    /// Fail the whole completion.
    Fail(CompletionError),
    /// Hold the call open before answering, for concurrency tests.
    SlowAnswer {
        delay_ms: u64,
        answer: &'static str,
    },
}

/// Pops one script entry per call and records what each call observed.
pub struct ScriptedClient {
    entries: Mutex<VecDeque<Script>>,
    /// Snapshot length seen by each call, in call order.
    pub seen_lens: Mutex<Vec<usize>>,
    active: AtomicUsize,
    pub peak: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(entries: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(entries.into()),
            seen_lens: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        messages: &[Message],
        _model: &str,
        tools: &mut ToolContext,
    ) -> Result<Completion, CompletionError> {
        self.seen_lens.lock().unwrap().push(messages.len());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let entry = self
            .entries
            .lock()
            .unwrap()
            .pop_front()
            .expect("script exhausted");

        let outcome = match entry {
            Script::Answer(text) => Ok(Completion {
                message: Message::assistant(text),
                intermediate: Vec::new(),
            }),
            Script::QueryThenAnswer { sql, title, answer } => match tools.run_query(sql, title) {
                Ok(rows) => {
                    let args = serde_json::json!({ "query": sql, "title": title }).to_string();
                    let intermediate = vec![
                        Message::tool_call("call_1", "run_query", &args),
                        Message::tool_result(
                            "call_1",
                            "run_query",
                            serde_json::to_string(&rows).unwrap(),
                        ),
                    ];
                    Ok(Completion {
                        message: Message::assistant(answer),
                        intermediate,
                    })
                }
                Err(e) => Err(CompletionError::Other(format!("scripted query failed: {e}"))),
            },
            Script::Fail(error) => Err(error),
            Script::SlowAnswer { delay_ms, answer } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(Completion {
                    message: Message::assistant(answer),
                    intermediate: Vec::new(),
                })
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

// ── Session fixture ───────────────────────────────────────────────────────────

pub struct TestSession {
    pub handle: SessionHandle,
    pub events: mpsc::UnboundedReceiver<UiEvent>,
    pub log: Arc<RwLock<ConversationLog>>,
    pub dashboard: Arc<Dashboard>,
}

pub fn spawn_session(pool: &WorkerPool) -> TestSession {
    let log = Arc::new(RwLock::new(ConversationLog::seeded(SYSTEM_PROMPT, GREETING)));
    let dashboard = Arc::new(Dashboard::new());
    let (handle, events) = Session::spawn(
        log.clone(),
        dashboard.clone(),
        pool.clone(),
        MODEL.to_string(),
    );
    TestSession {
        handle,
        events,
        log,
        dashboard,
    }
}

impl TestSession {
    /// Consume events until the current turn's cleanup fires. Returns every
    /// event seen on the way, ThinkingEnded included.
    pub async fn wait_turn(&mut self) -> Vec<UiEvent> {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), self.events.recv())
                .await
                .expect("timed out waiting for turn to finish")
                .expect("event channel closed mid-turn");
            let done = matches!(event, UiEvent::ThinkingEnded);
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    pub fn log_len(&self) -> usize {
        self.log.read().unwrap().len()
    }

    pub fn model_input_len(&self) -> usize {
        self.log.read().unwrap().model_input().len()
    }
}
