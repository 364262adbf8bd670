//! tabletalk-ctl — command-line interface for the tabletalk daemon.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_PORT: u16 = 9210;
const DEFAULT_SESSION: &str = "cli";
const ANSWER_POLL_INTERVAL: Duration = Duration::from_millis(500);
const ANSWER_TIMEOUT: Duration = Duration::from_secs(180);

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    sessions: usize,
    workers: usize,
    model: String,
    table: String,
    uptime_secs: u64,
}

#[derive(Deserialize)]
struct TranscriptResponse {
    messages: Vec<MessageJson>,
    thinking: bool,
}

#[derive(Deserialize)]
struct MessageJson {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct DashboardResponse {
    query: String,
    title: String,
}

// ── HTTP helpers ──────────────────────────────────────────────────────────────

fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to tabletalkd at {} — is it running?", url))?
        .json::<T>()
        .await
        .context("failed to parse response")
}

async fn post_json(url: &str, body: serde_json::Value) -> Result<()> {
    let response = reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("failed to connect to tabletalkd at {} — is it running?", url))?;
    if !response.status().is_success() {
        anyhow::bail!(
            "daemon rejected request: {} {}",
            response.status(),
            response.text().await.unwrap_or_default()
        );
    }
    Ok(())
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

async fn cmd_ask(port: u16, session: &str, question: &str) -> Result<()> {
    let base = base_url(port);
    let transcript_url = format!("{base}/sessions/{session}/transcript");

    let before: TranscriptResponse = get_json(&transcript_url).await?;
    let seen = before.messages.len();

    post_json(
        &format!("{base}/sessions/{session}/messages"),
        serde_json::json!({ "text": question }),
    )
    .await?;

    // Poll until the turn produced its final assistant message. Tool-call
    // entries also carry the assistant role but have empty content.
    let deadline = std::time::Instant::now() + ANSWER_TIMEOUT;
    loop {
        tokio::time::sleep(ANSWER_POLL_INTERVAL).await;
        let now: TranscriptResponse = get_json(&transcript_url).await?;
        let answered = now.messages[seen.min(now.messages.len())..]
            .iter()
            .any(|m| m.role == "assistant" && !m.content.is_empty());
        if answered {
            for message in &now.messages[seen..] {
                print_message(message);
            }
            return Ok(());
        }
        if std::time::Instant::now() > deadline {
            anyhow::bail!("timed out waiting for an answer");
        }
    }
}

async fn cmd_transcript(port: u16, session: &str) -> Result<()> {
    let resp: TranscriptResponse =
        get_json(&format!("{}/sessions/{session}/transcript", base_url(port))).await?;

    if resp.messages.is_empty() {
        println!("No messages yet.");
        return Ok(());
    }
    for message in &resp.messages {
        print_message(message);
    }
    if resp.thinking {
        println!("[thinking…]");
    }
    Ok(())
}

async fn cmd_dashboard(port: u16, session: &str) -> Result<()> {
    let resp: DashboardResponse =
        get_json(&format!("{}/sessions/{session}/dashboard", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Dashboard");
    println!("═══════════════════════════════════════");
    println!("  Title : {}", if resp.title.is_empty() { "(none)" } else { &resp.title });
    println!("  Query : {}", if resp.query.is_empty() { "(none)" } else { &resp.query });
    Ok(())
}

async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Tabletalk Daemon Status");
    println!("═══════════════════════════════════════");
    println!("  Model    : {}", resp.model);
    println!("  Table    : {}", resp.table);
    println!("  Workers  : {}", resp.workers);
    println!("  Sessions : {}", resp.sessions);
    println!("  Uptime   : {}s", resp.uptime_secs);
    Ok(())
}

fn print_message(message: &MessageJson) {
    match message.role.as_str() {
        "user" => println!("you> {}", message.content),
        "assistant" if !message.content.is_empty() => println!("bot> {}", message.content),
        // tool-call and tool-result messages are noise on the CLI
        _ => {}
    }
}

fn print_usage() {
    println!("Usage: tabletalk-ctl [--port <port>] [--session <id>] <command>");
    println!();
    println!("Commands:");
    println!("  ask <question>   Ask a question and wait for the answer");
    println!("  transcript       Print the session transcript");
    println!("  dashboard        Show the current query and title");
    println!("  status           Show daemon status");
    println!();
    println!("Options:");
    println!("  --port <port>     Daemon port (default: {})", DEFAULT_PORT);
    println!("  --session <id>    Session id (default: {})", DEFAULT_SESSION);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut port = DEFAULT_PORT;
    let mut session = DEFAULT_SESSION.to_string();
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--session" => {
                i += 1;
                session = args.get(i).context("--session requires a value")?.clone();
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["ask", question @ ..] if !question.is_empty() => {
            cmd_ask(port, &session, &question.join(" ")).await
        }
        ["transcript"] => cmd_transcript(port, &session).await,
        ["dashboard"] => cmd_dashboard(port, &session).await,
        ["status"] | [] => cmd_status(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
