//! Job and result types for the worker pool.

use tabletalk_core::message::Message;

use crate::completion::CompletionError;

/// One chat turn's unit of work. Carries an immutable snapshot of the
/// conversation taken at submission time; appends made after submission are
/// invisible to the worker.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: u64,
    pub messages: Vec<Message>,
    pub model: String,
}

/// The most recent `run_query` tool call a job performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub sql: String,
    pub title: String,
}

/// Structured outcome of a job. Exactly one of `completion` / `error` is
/// set; the dispatch loop treats any other shape as a defect.
#[derive(Debug)]
pub struct JobResult {
    /// Final assistant message. None when the job failed.
    pub completion: Option<Message>,
    /// Tool-call and tool-result messages produced during the turn, in order.
    pub intermediate: Vec<Message>,
    /// SQL of the last successful tool invocation, if any.
    pub query: Option<String>,
    /// Title of the last successful tool invocation, if any.
    pub title: Option<String>,
    pub error: Option<CompletionError>,
}

impl JobResult {
    pub fn success(
        completion: Message,
        intermediate: Vec<Message>,
        invocation: Option<ToolInvocation>,
    ) -> Self {
        let (query, title) = match invocation {
            Some(inv) => (Some(inv.sql), Some(inv.title)),
            None => (None, None),
        };
        Self {
            completion: Some(completion),
            intermediate,
            query,
            title,
            error: None,
        }
    }

    pub fn failure(error: CompletionError) -> Self {
        Self {
            completion: None,
            intermediate: Vec::new(),
            query: None,
            title: None,
            error: Some(error),
        }
    }
}
