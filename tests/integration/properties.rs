//! Cross-cutting properties: log accounting, snapshot isolation, and
//! single-outstanding-turn ordering.

use crate::*;
use tabletalk_core::message::Role;

/// After N turns, log length = seed(2) + Σ (user + intermediates + final).
#[tokio::test]
async fn log_length_accounts_for_every_turn() {
    let dataset = nba_dataset();
    let client = ScriptedClient::new(vec![
        Script::Answer("no query needed"),
        Script::QueryThenAnswer {
            sql: "SELECT COUNT(*) AS n FROM players",
            title: "Player count",
            answer: "There are three players.",
        },
        Script::Fail(CompletionError::Other("flaky".into())),
    ]);
    let pool = WorkerPool::start(4, dataset.store.clone(), client);
    let mut session = spawn_session(&pool);

    assert_eq!(session.log_len(), 2, "seeded with system + greeting");

    for question in ["first", "second", "third"] {
        session.handle.on_user_message(question, None);
        session.wait_turn().await;
    }

    // Turn 1: user + answer = 2. Turn 2: user + 2 intermediates + answer = 4.
    // Turn 3: user + error message = 2.
    assert_eq!(session.log_len(), 2 + 2 + 4 + 2);
}

/// Appends made after a job is submitted are invisible to that job: each
/// completion call sees exactly the snapshot taken at its own submission.
#[tokio::test]
async fn workers_see_only_their_submission_snapshot() {
    let dataset = nba_dataset();
    let client = ScriptedClient::new(vec![
        Script::SlowAnswer { delay_ms: 100, answer: "one" },
        Script::SlowAnswer { delay_ms: 10, answer: "two" },
    ]);
    let pool = WorkerPool::start(2, dataset.store.clone(), client.clone());
    let mut session = spawn_session(&pool);

    // Both messages queue immediately; the second turn starts only after
    // the first merges.
    session.handle.on_user_message("q1", None);
    session.handle.on_user_message("q2", None);
    session.wait_turn().await;
    session.wait_turn().await;

    // Model input: system + q1 = 2, then system + q1 + a1 + q2 = 4.
    let seen = client.seen_lens.lock().unwrap().clone();
    assert_eq!(seen, vec![2, 4]);
}

/// One session never has two jobs in flight, and merges never interleave.
#[tokio::test]
async fn turns_on_one_session_are_strictly_sequential() {
    let dataset = nba_dataset();
    let client = ScriptedClient::new(vec![
        Script::SlowAnswer { delay_ms: 50, answer: "a1" },
        Script::SlowAnswer { delay_ms: 50, answer: "a2" },
        Script::SlowAnswer { delay_ms: 50, answer: "a3" },
    ]);
    let pool = WorkerPool::start(4, dataset.store.clone(), client.clone());
    let mut session = spawn_session(&pool);

    for question in ["q1", "q2", "q3"] {
        session.handle.on_user_message(question, None);
    }
    for _ in 0..3 {
        session.wait_turn().await;
    }

    assert_eq!(
        client.peak.load(std::sync::atomic::Ordering::SeqCst),
        1,
        "a session runs one job at a time even with idle workers"
    );

    let contents: Vec<String> = session
        .log
        .read()
        .unwrap()
        .transcript()
        .iter()
        .skip(1) // greeting
        .map(|m| m.content.clone())
        .collect();
    assert_eq!(contents, vec!["q1", "a1", "q2", "a2", "q3", "a3"]);
}

/// Identical snapshots submitted to two workers don't interfere: each job
/// runs on its own dataset connection.
#[tokio::test]
async fn identical_jobs_run_independently() {
    let dataset = nba_dataset();
    let client = ScriptedClient::new(vec![
        Script::QueryThenAnswer {
            sql: "SELECT name FROM players ORDER BY height_cm DESC",
            title: "Tallest first",
            answer: "Wembanyama is the tallest.",
        };
        2
    ]);
    let pool = WorkerPool::start(2, dataset.store.clone(), client);

    let mut a = spawn_session(&pool);
    let mut b = spawn_session(&pool);
    a.handle.on_user_message("Who is tallest?", None);
    b.handle.on_user_message("Who is tallest?", None);
    a.wait_turn().await;
    b.wait_turn().await;

    for session in [&a, &b] {
        let transcript = session.log.read().unwrap().transcript();
        assert_eq!(
            transcript.last().unwrap().content,
            "Wembanyama is the tallest."
        );
        assert_eq!(session.dashboard.current().title, "Tallest first");
    }
}

/// The greeting stays UI-only across turns.
#[tokio::test]
async fn greeting_is_never_sent_to_the_model() {
    let dataset = nba_dataset();
    let client = ScriptedClient::new(vec![Script::Answer("ok")]);
    let pool = WorkerPool::start(1, dataset.store.clone(), client);
    let mut session = spawn_session(&pool);

    session.handle.on_user_message("hello", None);
    session.wait_turn().await;

    let input = session.log.read().unwrap().model_input();
    assert!(input.iter().all(|m| m.content != GREETING));
    assert_eq!(input[0].role, Role::System);
    assert_eq!(session.model_input_len(), session.log_len() - 1);
}
