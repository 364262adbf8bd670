//! End-to-end turn scenarios: tool use, failure, and pool backpressure.

use crate::*;
use tabletalk_core::message::Role;

/// A tool-using turn appends [user, tool-call, tool-result, assistant] and
/// updates both dashboard cells.
#[tokio::test]
async fn tool_turn_merges_in_order_and_updates_dashboard() {
    let dataset = nba_dataset();
    let client = ScriptedClient::new(vec![Script::QueryThenAnswer {
        sql: "SELECT * FROM players WHERE height_cm > 200",
        title: "Players over 200cm",
        answer: "Here are players over 200cm.",
    }]);
    let pool = WorkerPool::start(2, dataset.store.clone(), client);
    let mut session = spawn_session(&pool);

    let before = session.log_len();
    session
        .handle
        .on_user_message("Show players over 200cm.", None);
    session.wait_turn().await;

    let transcript = session.log.read().unwrap().model_input();
    let new: Vec<_> = transcript[transcript.len() - 4..].to_vec();
    assert_eq!(session.log_len(), before + 4);
    assert_eq!(new[0].role, Role::User);
    assert_eq!(new[1].role, Role::Assistant);
    assert!(new[1].tool.is_some(), "second entry is the tool call");
    assert_eq!(new[2].role, Role::Tool);
    assert_eq!(new[3].role, Role::Assistant);
    assert_eq!(new[3].content, "Here are players over 200cm.");

    let dashboard = session.dashboard.current();
    assert_eq!(dashboard.query, "SELECT * FROM players WHERE height_cm > 200");
    assert_eq!(dashboard.title, "Players over 200cm");
}

/// A failed turn appends exactly [user, assistant-error] and leaves the
/// dashboard at its prior value.
#[tokio::test]
async fn failed_turn_preserves_dashboard() {
    let dataset = nba_dataset();
    let client = ScriptedClient::new(vec![
        Script::QueryThenAnswer {
            sql: "SELECT name FROM players",
            title: "All players",
            answer: "All players listed.",
        },
        Script::Fail(CompletionError::Network("connection reset by peer".into())),
    ]);
    let pool = WorkerPool::start(2, dataset.store.clone(), client);
    let mut session = spawn_session(&pool);

    session.handle.on_user_message("List everyone.", None);
    session.wait_turn().await;
    let dashboard_before = session.dashboard.current();
    assert_eq!(dashboard_before.title, "All players");

    let len_before = session.log_len();
    session.handle.on_user_message("Now break.", None);
    session.wait_turn().await;

    assert_eq!(session.log_len(), len_before + 2);
    let transcript = session.log.read().unwrap().transcript();
    let error_msg = transcript.last().unwrap();
    assert_eq!(error_msg.role, Role::Assistant);
    assert!(error_msg.content.contains("connection reset"));
    assert!(
        !error_msg.content.contains('<') && !error_msg.content.contains('>'),
        "error text must be markup-safe"
    );

    assert_eq!(session.dashboard.current(), dashboard_before);
}

/// The failure event stream still runs cleanup: thinking starts and ends.
#[tokio::test]
async fn failed_turn_still_clears_thinking() {
    let dataset = nba_dataset();
    let client = ScriptedClient::new(vec![Script::Fail(CompletionError::RateLimit(
        "HTTP 429".into(),
    ))]);
    let pool = WorkerPool::start(1, dataset.store.clone(), client);
    let mut session = spawn_session(&pool);

    session.handle.on_user_message("hello?", None);
    let events = session.wait_turn().await;

    assert!(events
        .iter()
        .any(|e| matches!(e, UiEvent::ThinkingStarted)));
    assert!(matches!(events.last(), Some(UiEvent::ThinkingEnded)));
    assert!(!events
        .iter()
        .any(|e| matches!(e, UiEvent::DashboardUpdated { .. })));
}

/// Pool of 2, three near-simultaneous jobs from three sessions: the third
/// waits for a free worker and nothing is dropped.
#[tokio::test]
async fn third_job_waits_for_a_free_worker() {
    let dataset = nba_dataset();
    let client = ScriptedClient::new(vec![
        Script::SlowAnswer { delay_ms: 150, answer: "done" };
        3
    ]);
    let pool = WorkerPool::start(2, dataset.store.clone(), client.clone());

    let mut sessions: Vec<_> = (0..3).map(|_| spawn_session(&pool)).collect();
    for session in &sessions {
        session.handle.on_user_message("go", None);
    }
    for session in &mut sessions {
        session.wait_turn().await;
    }

    for session in &sessions {
        let last = session.log.read().unwrap().transcript().last().unwrap().clone();
        assert_eq!(last.content, "done");
    }
    assert_eq!(
        client.peak.load(std::sync::atomic::Ordering::SeqCst),
        2,
        "third job must not run until a worker frees up"
    );
}
