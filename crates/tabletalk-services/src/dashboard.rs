//! Dashboard state — the two reactive cells a completed turn may update.
//!
//! Last write wins. Written only by a session's dispatch loop; the
//! rendering layer subscribes through a watch receiver.

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardState {
    /// SQL behind the currently displayed table/chart.
    pub query: String,
    /// Title shown above it.
    pub title: String,
}

pub struct Dashboard {
    tx: watch::Sender<DashboardState>,
}

impl Dashboard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DashboardState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> DashboardState {
        self.tx.borrow().clone()
    }

    pub fn set_query(&self, query: impl Into<String>) {
        self.tx.send_modify(|state| state.query = query.into());
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.tx.send_modify(|state| state.title = title.into());
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}
