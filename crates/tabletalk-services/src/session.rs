//! Per-session dispatch loop.
//!
//! Each interactive session runs one controller task. User messages arrive
//! over a channel (fire-and-forget from the caller's side), and each turn
//! moves through Idle → Submitted → (Succeeded | Failed) → Idle. The loop
//! handles one turn at a time; messages sent while a turn is in flight
//! queue FIFO and can never interleave merges.
//!
//! The conversation log and dashboard are written only here. Other tasks
//! may read them, never write.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::mpsc;

use tabletalk_core::conversation::ConversationLog;
use tabletalk_core::message::Message;

use crate::completion::CompletionError;
use crate::dashboard::{Dashboard, DashboardState};
use crate::job::{Job, JobResult};
use crate::pool::WorkerPool;

/// Events emitted for the rendering layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    MessageAppended { message: Message },
    DashboardUpdated { dashboard: DashboardState },
    ThinkingStarted,
    ThinkingEnded,
}

struct UserTurn {
    text: String,
    model: Option<String>,
}

/// Cheap handle for submitting user messages to a session.
#[derive(Clone)]
pub struct SessionHandle {
    input_tx: mpsc::UnboundedSender<UserTurn>,
}

impl SessionHandle {
    /// Fire-and-forget: queues the message and returns immediately. The
    /// session processes it when it is next idle.
    pub fn on_user_message(&self, text: impl Into<String>, model: Option<String>) {
        let turn = UserTurn {
            text: text.into(),
            model,
        };
        if self.input_tx.send(turn).is_err() {
            tracing::warn!("session task is gone, dropping user message");
        }
    }
}

pub struct Session {
    log: Arc<RwLock<ConversationLog>>,
    dashboard: Arc<Dashboard>,
    pool: WorkerPool,
    default_model: String,
    events_tx: mpsc::UnboundedSender<UiEvent>,
    input_rx: mpsc::UnboundedReceiver<UserTurn>,
    next_job_id: u64,
}

impl Session {
    /// Spawn the controller task for one session. Returns the submission
    /// handle and the event stream for the rendering layer.
    pub fn spawn(
        log: Arc<RwLock<ConversationLog>>,
        dashboard: Arc<Dashboard>,
        pool: WorkerPool,
        default_model: String,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<UiEvent>) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let session = Session {
            log,
            dashboard,
            pool,
            default_model,
            events_tx,
            input_rx,
            next_job_id: 0,
        };
        tokio::spawn(session.run());

        (SessionHandle { input_tx }, events_rx)
    }

    async fn run(mut self) {
        while let Some(turn) = self.input_rx.recv().await {
            self.run_turn(turn).await;
        }
        tracing::debug!("session input closed, dispatch loop exiting");
    }

    /// One full turn: Idle → Submitted → (Succeeded | Failed) → Idle.
    async fn run_turn(&mut self, turn: UserTurn) {
        let model = turn.model.unwrap_or_else(|| self.default_model.clone());

        // Idle → Submitted: append the user message, snapshot, submit.
        self.append_and_emit(Message::user(turn.text));
        let snapshot = self.log.read().expect("log lock poisoned").model_input();

        self.next_job_id += 1;
        let job = Job {
            id: self.next_job_id,
            messages: snapshot,
            model,
        };
        let job_id = job.id;

        self.emit(UiEvent::ThinkingStarted);
        let reply_rx = self.pool.submit(job);

        // The controller awaits here, but callers never do: further user
        // messages queue in input_rx until this turn is done.
        match reply_rx.await {
            Ok(mut result) => {
                if let Some(error) = result.error.take() {
                    self.merge_failure(error);
                } else if result.completion.is_some() {
                    self.merge_success(result);
                } else {
                    // Broken JobResult invariant; a defect, not a user error.
                    tracing::error!(job_id, "job result carried neither completion nor error");
                    self.merge_failure(CompletionError::Other(
                        "internal error: empty job result".into(),
                    ));
                }
            }
            Err(_) => {
                tracing::error!(job_id, "worker dropped without delivering a result");
                self.merge_failure(CompletionError::Other(
                    "worker exited without a result".into(),
                ));
            }
        }

        // Cleanup runs on every path: Succeeded and Failed both end Idle.
        self.emit(UiEvent::ThinkingEnded);
    }

    /// Submitted → Succeeded. Order matters: intermediates first, then
    /// dashboard cells, then the final answer.
    fn merge_success(&mut self, result: JobResult) {
        for message in result.intermediate {
            self.append_and_emit(message);
        }

        let mut dashboard_touched = false;
        if let Some(query) = result.query {
            self.dashboard.set_query(query);
            dashboard_touched = true;
        }
        if let Some(title) = result.title {
            self.dashboard.set_title(title);
            dashboard_touched = true;
        }
        if dashboard_touched {
            self.emit(UiEvent::DashboardUpdated {
                dashboard: self.dashboard.current(),
            });
        }

        let answer = result.completion.expect("checked by caller");
        self.append_and_emit(answer);
    }

    /// Submitted → Failed. One sanitized assistant message describes the
    /// error; the dashboard is left untouched.
    fn merge_failure(&mut self, error: CompletionError) {
        let content = sanitize_markup(&format!("Sorry, I couldn't answer that: {error}"));
        self.append_and_emit(Message::assistant(content));
    }

    fn append_and_emit(&mut self, message: Message) {
        self.log
            .write()
            .expect("log lock poisoned")
            .append(message.clone());
        self.emit(UiEvent::MessageAppended { message });
    }

    fn emit(&self, event: UiEvent) {
        // Nobody listening is fine; the transcript is still authoritative.
        let _ = self.events_tx.send(event);
    }
}

/// Error text goes into the transcript verbatim, so strip anything the
/// rendering layer could interpret as markup.
fn sanitize_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
