//! Whole escrow sessions run in-process through the testkit

mod common;

use std::time::Duration;

use ::common::escrow::{AgentState, RecoveryOutcome};
use ::common::testkit::TestEscrow;

#[tokio::test]
async fn test_two_saboteurs_cannot_stop_recovery() {
    common::init_tracing();
    let escrow = TestEscrow::new(5, 3)
        .unwrap()
        .with_secret(common::scenario_secret())
        .sabotage(4)
        .unwrap()
        .sabotage(5)
        .unwrap();
    let reference = escrow.reference().clone();

    let report = escrow.run().await.unwrap();

    assert_eq!(report.outcome, RecoveryOutcome::Verified);
    assert_eq!(report.delivered, 5);
    assert_eq!(report.agents_in(AgentState::Released), vec![1, 2, 3]);
    assert_eq!(report.agents_in(AgentState::Failed), vec![4, 5]);
    assert_eq!(reference.get(), Some(common::scenario_secret()));
}

#[tokio::test]
async fn test_three_saboteurs_leave_secret_unavailable() {
    common::init_tracing();
    let report = TestEscrow::new(5, 3)
        .unwrap()
        .with_secret(common::scenario_secret())
        .sabotage(3)
        .unwrap()
        .sabotage(4)
        .unwrap()
        .sabotage(5)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        RecoveryOutcome::Unavailable {
            collected: 2,
            threshold: 3
        }
    );
    assert!(!report.is_verified());
    assert_eq!(report.agents_in(AgentState::Released), vec![1, 2]);
    assert_eq!(report.agents_in(AgentState::Failed), vec![3, 4, 5]);
}

#[tokio::test]
async fn test_random_secrets_across_parameters() {
    common::init_tracing();
    for (agents, threshold) in [(1, 1), (2, 2), (3, 1), (5, 5), (7, 4), (12, 6)] {
        let report = TestEscrow::new(agents, threshold)
            .unwrap()
            .run()
            .await
            .unwrap();
        assert!(
            report.is_verified(),
            "{}-of-{} session: {}",
            threshold,
            agents,
            report
        );
        assert_eq!(report.agents.len(), agents);
        assert!(report.agents.values().all(|state| state.is_terminal()));
    }
}

#[tokio::test]
async fn test_exactly_threshold_honest_agents() {
    common::init_tracing();
    let mut escrow = TestEscrow::new(6, 2).unwrap();
    for index in 3..=6 {
        escrow = escrow.sabotage(index).unwrap();
    }
    let report = escrow.run().await.unwrap();

    assert!(report.is_verified());
    assert_eq!(report.agents_in(AgentState::Failed), vec![3, 4, 5, 6]);
}

#[tokio::test]
async fn test_every_agent_sabotaged() {
    common::init_tracing();
    let mut escrow = TestEscrow::new(3, 2).unwrap();
    for index in 1..=3 {
        escrow = escrow.sabotage(index).unwrap();
    }
    let report = escrow.run().await.unwrap();

    assert_eq!(
        report.outcome,
        RecoveryOutcome::Unavailable {
            collected: 0,
            threshold: 2
        }
    );
}

#[tokio::test]
async fn test_release_delay_within_deadline() {
    common::init_tracing();
    let report = TestEscrow::new(4, 3)
        .unwrap()
        .with_timeout(Duration::from_secs(2))
        .with_release_delay(Duration::from_millis(100))
        .run()
        .await
        .unwrap();
    assert!(report.is_verified());
}

#[tokio::test(start_paused = true)]
async fn test_release_delay_past_agent_deadline() {
    common::init_tracing();
    // agents give up waiting for authorization before the authority sends it
    let report = TestEscrow::new(3, 2)
        .unwrap()
        .with_timeout(Duration::from_millis(200))
        .with_release_delay(Duration::from_secs(1))
        .run()
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        RecoveryOutcome::Unavailable {
            collected: 0,
            threshold: 2
        }
    );
    assert_eq!(report.agents_in(AgentState::TimedOut), vec![1, 2, 3]);
}

#[test]
fn test_sabotage_unknown_agent() {
    assert!(TestEscrow::new(3, 2).unwrap().sabotage(0).is_err());
    assert!(TestEscrow::new(3, 2).unwrap().sabotage(4).is_err());
}
