//! HTTP handlers for the tabletalk API.

mod sessions;
mod status;

pub use sessions::{handle_get_dashboard, handle_get_transcript, handle_post_message};
pub use status::handle_status;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use dashmap::DashMap;

use tabletalk_core::conversation::ConversationLog;
use tabletalk_services::{Dashboard, Session, SessionHandle, UiEvent, WorkerPool};

/// One live session: submission handle plus read access to its state.
/// The conversation log and dashboard are written only by the session's
/// dispatch loop; handlers read them.
pub struct SessionEntry {
    pub handle: SessionHandle,
    pub log: Arc<RwLock<ConversationLog>>,
    pub dashboard: Arc<Dashboard>,
    pub thinking: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct ApiState {
    pub sessions: Arc<DashMap<String, Arc<SessionEntry>>>,
    pub pool: WorkerPool,
    pub system_prompt: String,
    pub greeting: String,
    pub default_model: String,
    pub table_name: String,
    pub workers: usize,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(
        pool: WorkerPool,
        system_prompt: String,
        greeting: String,
        default_model: String,
        table_name: String,
        workers: usize,
    ) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            pool,
            system_prompt,
            greeting,
            default_model,
            table_name,
            workers,
            started_at: Instant::now(),
        }
    }

    /// Fetch a session, creating it on first use. Each session owns an
    /// independent log and dashboard.
    pub fn session(&self, id: &str) -> Arc<SessionEntry> {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(session = id, "creating session");

                let log = Arc::new(RwLock::new(ConversationLog::seeded(
                    self.system_prompt.clone(),
                    self.greeting.clone(),
                )));
                let dashboard = Arc::new(Dashboard::new());
                let thinking = Arc::new(AtomicBool::new(false));

                let (handle, mut events_rx) = Session::spawn(
                    log.clone(),
                    dashboard.clone(),
                    self.pool.clone(),
                    self.default_model.clone(),
                );

                // Track the thinking indicator off the session's event stream.
                let thinking_flag = thinking.clone();
                let session_id = id.to_string();
                tokio::spawn(async move {
                    while let Some(event) = events_rx.recv().await {
                        match event {
                            UiEvent::ThinkingStarted => {
                                thinking_flag.store(true, Ordering::Relaxed)
                            }
                            UiEvent::ThinkingEnded => {
                                thinking_flag.store(false, Ordering::Relaxed)
                            }
                            other => {
                                tracing::debug!(session = %session_id, event = ?other, "ui event")
                            }
                        }
                    }
                });

                Arc::new(SessionEntry {
                    handle,
                    log,
                    dashboard,
                    thinking,
                })
            })
            .clone()
    }
}
