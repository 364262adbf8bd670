//! tabletalk-services — dataset store, completion client, worker pool,
//! and the per-session dispatch loop.

pub mod completion;
pub mod dashboard;
pub mod dataset;
pub mod job;
pub mod pool;
pub mod prompt;
pub mod session;

pub use completion::{Completion, CompletionClient, CompletionError, OpenAiClient, ToolContext};
pub use dashboard::{Dashboard, DashboardState};
pub use dataset::{DatasetConn, DatasetStore, QueryError, QueryRows};
pub use job::{Job, JobResult, ToolInvocation};
pub use pool::WorkerPool;
pub use session::{Session, SessionHandle, UiEvent};
