//! Completion client — turns a conversation snapshot into a final assistant
//! message, executing `run_query` tool calls along the way.
//!
//! The tool loop shape: call the model, detect tool calls, execute them
//! against the worker's own dataset connection, feed the results back, and
//! repeat until the model produces plain text.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use tabletalk_core::message::{Message, Role};

use crate::dataset::{DatasetConn, QueryError, QueryRows};
use crate::job::ToolInvocation;

/// Rows beyond this are elided from the tool result fed back to the model.
const MAX_RESULT_ROWS: usize = 100;

/// Tool rounds per turn before giving up on a looping model.
const MAX_TOOL_ROUNDS: usize = 8;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CompletionError {
    #[error("network error: {0}")]
    Network(String),
    #[error("rate limited: {0}")]
    RateLimit(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("{0}")]
    Other(String),
}

/// Outcome of one completion call.
#[derive(Debug)]
pub struct Completion {
    /// The model's final answer.
    pub message: Message,
    /// Tool-call and tool-result messages produced before the answer,
    /// in the order they happened.
    pub intermediate: Vec<Message>,
}

/// Tool-execution context handed to the client for the duration of one job.
///
/// Owns the worker's private dataset connection and records every
/// successful invocation; the last one becomes the job's query/title pair.
pub struct ToolContext {
    conn: DatasetConn,
    invocations: Vec<ToolInvocation>,
}

impl ToolContext {
    pub fn new(conn: DatasetConn) -> Self {
        Self {
            conn,
            invocations: Vec::new(),
        }
    }

    /// Execute SQL on the job's connection. Failed queries are not
    /// recorded, so the dashboard only ever reflects a query that ran.
    pub fn run_query(&mut self, sql: &str, title: &str) -> Result<QueryRows, QueryError> {
        let rows = self.conn.execute(sql)?;
        self.invocations.push(ToolInvocation {
            sql: sql.to_string(),
            title: title.to_string(),
        });
        Ok(rows)
    }

    /// Most recent successful invocation. Last write wins when a turn runs
    /// several queries.
    pub fn last_invocation(&self) -> Option<ToolInvocation> {
        self.invocations.last().cloned()
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        model: &str,
        tools: &mut ToolContext,
    ) -> Result<Completion, CompletionError>;
}

// ── OpenAI-compatible implementation ──────────────────────────────────────────

pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize)]
struct ToolCall {
    id: String,
    function: FunctionCall,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct RunQueryArgs {
    query: String,
    #[serde(default)]
    title: String,
}

impl OpenAiClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout_secs: u64,
    ) -> Result<Self, CompletionError> {
        let mut builder = reqwest::Client::builder();
        if request_timeout_secs > 0 {
            builder = builder.timeout(std::time::Duration::from_secs(request_timeout_secs));
        }
        let http = builder
            .build()
            .map_err(|e| CompletionError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn tool_schema() -> serde_json::Value {
        json!([{
            "type": "function",
            "function": {
                "name": "run_query",
                "description": "Run a read-only SQL query against the dataset and show the result to the user.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "SQLite SELECT statement" },
                        "title": { "type": "string", "description": "Short title describing the result" }
                    },
                    "required": ["query"]
                }
            }
        }])
    }

    fn wire_tool_call(id: &str, name: &str, arguments: &str) -> serde_json::Value {
        json!({
            "id": id,
            "type": "function",
            "function": { "name": name, "arguments": arguments }
        })
    }

    fn wire_message(message: &Message) -> serde_json::Value {
        match (&message.role, &message.tool) {
            (Role::Assistant, Some(record)) => json!({
                "role": "assistant",
                "content": serde_json::Value::Null,
                "tool_calls": [Self::wire_tool_call(
                    &record.call_id,
                    &record.name,
                    &record.arguments,
                )]
            }),
            (Role::Tool, Some(record)) => json!({
                "role": "tool",
                "tool_call_id": record.call_id,
                "content": message.content
            }),
            (role, _) => json!({ "role": role.as_str(), "content": message.content }),
        }
    }

    /// Convert a conversation snapshot to the wire shape. Consecutive
    /// assistant tool-call entries collapse into one assistant message
    /// carrying the full `tool_calls` array; the API requires each round's
    /// calls in a single message, with the tool results following it.
    fn wire_history(messages: &[Message]) -> Vec<serde_json::Value> {
        let mut wire = Vec::with_capacity(messages.len());
        let mut calls: Vec<serde_json::Value> = Vec::new();
        for message in messages {
            if let (Role::Assistant, Some(record)) = (&message.role, &message.tool) {
                calls.push(Self::wire_tool_call(
                    &record.call_id,
                    &record.name,
                    &record.arguments,
                ));
                continue;
            }
            if !calls.is_empty() {
                wire.push(json!({
                    "role": "assistant",
                    "content": serde_json::Value::Null,
                    "tool_calls": std::mem::take(&mut calls),
                }));
            }
            wire.push(Self::wire_message(message));
        }
        if !calls.is_empty() {
            wire.push(json!({
                "role": "assistant",
                "content": serde_json::Value::Null,
                "tool_calls": calls,
            }));
        }
        wire
    }

    async fn request(
        &self,
        model: &str,
        wire: &[serde_json::Value],
    ) -> Result<ChatMessage, CompletionError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": model,
                "messages": wire,
                "tools": Self::tool_schema(),
            }))
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(CompletionError::RateLimit(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Protocol(format!("HTTP {status}: {body}")));
        }

        let mut parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Protocol(format!("malformed response: {e}")))?;
        if parsed.choices.is_empty() {
            return Err(CompletionError::Protocol("response had no choices".into()));
        }
        Ok(parsed.choices.remove(0).message)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        messages: &[Message],
        model: &str,
        tools: &mut ToolContext,
    ) -> Result<Completion, CompletionError> {
        let mut wire = Self::wire_history(messages);
        let mut intermediate = Vec::new();

        for _round in 0..MAX_TOOL_ROUNDS {
            let reply = self.request(model, &wire).await?;

            if reply.tool_calls.is_empty() {
                let content = reply.content.unwrap_or_default();
                return Ok(Completion {
                    message: Message::assistant(content),
                    intermediate,
                });
            }

            // One assistant message carries the whole round's calls; the
            // tool results follow it. Validate before executing anything.
            for call in &reply.tool_calls {
                if call.function.name != "run_query" {
                    return Err(CompletionError::Protocol(format!(
                        "model requested unknown tool '{}'",
                        call.function.name
                    )));
                }
                intermediate.push(Message::tool_call(
                    &call.id,
                    &call.function.name,
                    &call.function.arguments,
                ));
            }
            let calls: Vec<serde_json::Value> = reply
                .tool_calls
                .iter()
                .map(|call| {
                    Self::wire_tool_call(&call.id, &call.function.name, &call.function.arguments)
                })
                .collect();
            wire.push(json!({
                "role": "assistant",
                "content": serde_json::Value::Null,
                "tool_calls": calls,
            }));

            for call in reply.tool_calls {
                let result_text = match serde_json::from_str::<RunQueryArgs>(&call.function.arguments)
                {
                    Ok(args) => match tools.run_query(&args.query, &args.title) {
                        Ok(rows) => render_rows(&rows),
                        Err(e) => {
                            tracing::debug!(error = %e, "run_query tool call failed");
                            format!("query failed: {e}")
                        }
                    },
                    Err(e) => format!("invalid run_query arguments: {e}"),
                };

                let result_msg = Message::tool_result(&call.id, &call.function.name, result_text);
                wire.push(Self::wire_message(&result_msg));
                intermediate.push(result_msg);
            }
        }

        Err(CompletionError::Other(format!(
            "no final answer after {MAX_TOOL_ROUNDS} tool rounds"
        )))
    }
}

/// Render query rows as compact JSON for the model, capped so a huge result
/// set cannot blow up the prompt.
fn render_rows(rows: &QueryRows) -> String {
    let total = rows.rows.len();
    let shown = total.min(MAX_RESULT_ROWS);
    let body = json!({
        "columns": rows.columns,
        "rows": &rows.rows[..shown],
        "total_rows": total,
    });
    body.to_string()
}
