//! End-to-end consensus scenarios against scripted providers.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_pending, assert_ready_ok};

use oracle_consensus::engine::tally::{decide, Tally};
use oracle_consensus::engine::ConsensusEngine;
use oracle_consensus::llm::prompt::UNPARSEABLE_CONFIDENCE;
use oracle_consensus::llm::OracleClient;
use oracle_consensus::types::{OracleError, OracleErrorKind, Outcome, Vote, VoteRecord};

use crate::mock_oracle::ScriptedOracle;

const QUESTION: &str = "Will BTC close above $100,000 on 2025-12-31?";

fn engine(clients: Vec<Arc<dyn OracleClient>>) -> ConsensusEngine {
    ConsensusEngine::new(clients, Duration::from_secs(5))
}

fn votes_for(outcomes: &[(Outcome, u8)]) -> Vec<Arc<dyn OracleClient>> {
    outcomes
        .iter()
        .enumerate()
        .map(|(i, (o, c))| ScriptedOracle::voting(&format!("p{i}"), *o, *c).boxed())
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unanimous_yes_reaches_consensus() {
    let e = engine(votes_for(&[
        (Outcome::Yes, 80),
        (Outcome::Yes, 81),
        (Outcome::Yes, 85),
    ]));
    let result = e.get_consensus(QUESTION, None, 0.8).await.unwrap();

    assert_eq!(result.outcome, Outcome::Yes);
    assert_eq!(result.consensus_count, 3);
    assert_eq!(result.total_models, 3);
    assert_eq!(result.confidence, 82);
}

#[tokio::test]
async fn test_two_of_three_below_threshold_is_invalid() {
    let e = engine(votes_for(&[
        (Outcome::Yes, 80),
        (Outcome::Yes, 81),
        (Outcome::No, 85),
    ]));
    let result = e.get_consensus(QUESTION, None, 0.8).await.unwrap();

    assert_eq!(result.outcome, Outcome::Invalid);
    assert_eq!(result.consensus_count, 0);
    assert_eq!(result.confidence, 0);
    assert_eq!(result.responded_models(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_provider_counts_against_ratio() {
    let mut clients = votes_for(&[
        (Outcome::Yes, 80),
        (Outcome::Yes, 81),
        (Outcome::Yes, 82),
        (Outcome::Yes, 85),
    ]);
    clients.push(ScriptedOracle::hanging("slow").boxed());

    let result = engine(clients).get_consensus(QUESTION, None, 0.8).await.unwrap();

    assert_eq!(result.outcome, Outcome::Yes);
    assert_eq!(result.consensus_count, 4);
    assert_eq!(result.total_models, 5);
    assert_eq!(result.confidence, 82);
    match &result.votes[4] {
        VoteRecord::Failed { source_id, error, .. } => {
            assert_eq!(source_id, "slow");
            assert_eq!(*error, OracleErrorKind::Timeout);
        }
        other => panic!("expected timeout record, got {other:?}"),
    }
}

#[tokio::test]
async fn test_total_outage_yields_invalid_without_error() {
    let clients: Vec<Arc<dyn OracleClient>> = ["groq", "openai", "anthropic"]
        .iter()
        .map(|n| ScriptedOracle::failing(n, OracleError::unknown("connection refused")).boxed())
        .collect();

    let result = engine(clients).get_consensus(QUESTION, None, 0.8).await.unwrap();

    assert_eq!(result.outcome, Outcome::Invalid);
    assert_eq!(result.confidence, 0);
    assert_eq!(result.consensus_count, 0);
    assert_eq!(result.total_models, 3);
    assert_eq!(result.votes.len(), 3);
    assert!(result.votes.iter().all(|v| v.vote().is_none()));
}

#[tokio::test]
async fn test_unparseable_single_answer_is_invalid() {
    let e = engine(vec![ScriptedOracle::answering(
        "groq",
        "I cannot determine this",
        80,
    )
    .boxed()]);

    for threshold in [0.5, 1.0] {
        let result = e.get_consensus(QUESTION, None, threshold).await.unwrap();
        assert_eq!(result.outcome, Outcome::Invalid);

        let vote = result.votes[0].vote().unwrap();
        assert_eq!(vote.outcome, Outcome::Invalid);
        assert_eq!(vote.confidence, UNPARSEABLE_CONFIDENCE);
        assert_eq!(vote.raw_text, "I cannot determine this");
    }
}

#[tokio::test]
async fn test_verbose_answers_are_parsed() {
    let e = engine(vec![
        ScriptedOracle::answering("groq", "YES", 80).boxed(),
        ScriptedOracle::answering("gemini", "Yes.", 81).boxed(),
        ScriptedOracle::answering("xai", "Answer: yes, the close was above.", 82).boxed(),
    ]);
    let result = e.get_consensus(QUESTION, None, 1.0).await.unwrap();
    assert_eq!(result.outcome, Outcome::Yes);
    assert_eq!(result.consensus_count, 3);
    assert_eq!(result.confidence, 81);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// Every multiset of three outcomes at several thresholds.
fn all_triples() -> Vec<[Outcome; 3]> {
    let mut out = Vec::new();
    for a in Outcome::ALL {
        for b in Outcome::ALL {
            for c in Outcome::ALL {
                out.push([a, b, c]);
            }
        }
    }
    out
}

#[tokio::test]
async fn test_threshold_law_and_conservative_default() {
    for triple in all_triples() {
        for threshold in [0.3, 0.5, 0.6, 0.8, 1.0] {
            let clients = votes_for(&triple.map(|o| (o, 80)));
            let result = engine(clients)
                .get_consensus(QUESTION, None, threshold)
                .await
                .unwrap();

            let count = |o: Outcome| triple.iter().filter(|t| **t == o).count();
            let max = Outcome::ALL.iter().map(|o| count(*o)).max().unwrap();
            let strict_leader = Outcome::ALL.into_iter().find(|o| {
                count(*o) == max && Outcome::ALL.iter().all(|p| p == o || count(*p) < max)
            });

            if max as f64 / 3.0 + 1e-9 >= threshold {
                if let Some(leader) = strict_leader {
                    assert_eq!(result.outcome, leader, "{triple:?} @ {threshold}");
                    assert_eq!(result.consensus_count, max);
                }
            } else {
                assert_eq!(result.outcome, Outcome::Invalid, "{triple:?} @ {threshold}");
                assert_eq!(result.confidence, 0);
                assert_eq!(result.consensus_count, 0);
            }
        }
    }
}

#[tokio::test]
async fn test_failure_kind_does_not_affect_decision() {
    let kinds = [
        OracleError::auth("bad key"),
        OracleError::rate_limited("slow down"),
        OracleError::model_unavailable("gone"),
        OracleError::timeout("late"),
        OracleError::unknown("boom"),
    ];

    let mut decisions = Vec::new();
    for err in kinds {
        let mut clients = votes_for(&[(Outcome::No, 85), (Outcome::No, 80), (Outcome::Yes, 82)]);
        clients.push(ScriptedOracle::failing("flaky", err).boxed());
        let r = engine(clients).get_consensus(QUESTION, None, 0.5).await.unwrap();
        decisions.push((r.outcome, r.confidence, r.consensus_count, r.total_models));
    }

    assert!(decisions.iter().all(|d| *d == (Outcome::No, 83, 2, 4)));

    // Same votes scored directly, with the failed provider still in the denominator.
    let votes = [
        Vote {
            source_id: "a".into(),
            outcome: Outcome::No,
            confidence: 85,
            raw_text: "NO".into(),
        },
        Vote {
            source_id: "b".into(),
            outcome: Outcome::No,
            confidence: 80,
            raw_text: "NO".into(),
        },
        Vote {
            source_id: "c".into(),
            outcome: Outcome::Yes,
            confidence: 82,
            raw_text: "YES".into(),
        },
    ];
    let d = decide(&Tally::from_votes(votes.iter()), 4, 0.5);
    assert_eq!((d.outcome, d.confidence, d.consensus_count), (Outcome::No, 83, 2));
}

#[tokio::test(start_paused = true)]
async fn test_completion_order_does_not_matter() {
    let ballots = [
        (Outcome::Yes, 80u8),
        (Outcome::Yes, 85),
        (Outcome::No, 81),
        (Outcome::Yes, 82),
    ];

    let mut results = Vec::new();
    for reversed in [false, true] {
        let clients: Vec<Arc<dyn OracleClient>> = ballots
            .iter()
            .enumerate()
            .map(|(i, (o, c))| {
                let delay = if reversed { 4 - i as u64 } else { i as u64 + 1 };
                ScriptedOracle::voting(&format!("p{i}"), *o, *c)
                    .with_delay(Duration::from_millis(delay * 100))
                    .boxed()
            })
            .collect();
        let r = engine(clients).get_consensus(QUESTION, None, 0.75).await.unwrap();
        results.push(r);
    }

    assert_eq!(results[0].outcome, Outcome::Yes);
    assert_eq!(results[0].outcome, results[1].outcome);
    assert_eq!(results[0].confidence, results[1].confidence);
    assert_eq!(results[0].consensus_count, results[1].consensus_count);
    // Records stay in configuration order either way.
    let ids = |r: &oracle_consensus::types::ConsensusResult| {
        r.votes.iter().map(|v| v.source_id().to_string()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&results[0]), ids(&results[1]));
}

#[tokio::test]
async fn test_confidence_ignores_dissenting_votes() {
    let e = engine(votes_for(&[
        (Outcome::No, 60),
        (Outcome::No, 70),
        (Outcome::No, 90),
        (Outcome::Yes, 100),
        (Outcome::Invalid, 10),
    ]));
    let result = e.get_consensus(QUESTION, None, 0.6).await.unwrap();
    assert_eq!(result.outcome, Outcome::No);
    assert_eq!(result.confidence, 73);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_providers_run_concurrently() {
    let clients: Vec<Arc<dyn OracleClient>> = (0..4)
        .map(|i| {
            ScriptedOracle::voting(&format!("p{i}"), Outcome::Yes, 80)
                .with_delay(Duration::from_secs(3))
                .boxed()
        })
        .collect();

    let started = tokio::time::Instant::now();
    let result = engine(clients).get_consensus(QUESTION, None, 1.0).await.unwrap();

    assert_eq!(result.outcome, Outcome::Yes);
    // Sequential calls would take 12s and trip the 5s deadline.
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_request_abandons_provider_calls() {
    let slow = ScriptedOracle::voting("slow", Outcome::Yes, 80).with_delay(Duration::from_secs(2));
    let calls = slow.calls();
    let completed = slow.completed();
    let e = engine(vec![slow.boxed()]);

    let mut task = tokio_test::task::spawn(e.get_consensus(QUESTION, None, 0.8));
    assert_pending!(task.poll());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    drop(task);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!completed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_outer_deadline_cancels_request() {
    let slow = ScriptedOracle::voting("slow", Outcome::Yes, 80).with_delay(Duration::from_secs(4));
    let completed = slow.completed();
    let e = engine(vec![slow.boxed()]);

    let outer = tokio::time::timeout(
        Duration::from_secs(1),
        e.get_consensus(QUESTION, None, 0.8),
    )
    .await;

    assert!(outer.is_err());
    assert!(!completed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_immediate_providers_resolve_on_first_poll() {
    let e = engine(votes_for(&[(Outcome::No, 80)]));
    let mut task = tokio_test::task::spawn(e.get_consensus(QUESTION, None, 1.0));
    let result = assert_ready_ok!(task.poll());
    assert_eq!(result.outcome, Outcome::No);
}
