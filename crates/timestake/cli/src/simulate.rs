//! Single-goal lifecycle simulation against a manually driven clock.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Serialize;
use timestake_protocol::{
    Amount, Clock, GoalId, GoalStatus, ManualClock, Principal, ProofType, ProtocolEngine,
};
use timestake_storage::{JournalIntegrity, LedgerStore};
use tracing::{debug, info};

use crate::config::NodeConfig;

#[derive(Debug, Clone)]
pub struct Scenario {
    pub judges: usize,
    pub yes_votes: usize,
    pub stake: Option<Amount>,
    pub reward_pool: Amount,
    pub goal_id: u64,
}

#[derive(Debug, Serialize)]
pub struct JudgeReport {
    pub judge: Principal,
    pub vote: bool,
    pub reputation_score: u64,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub goal_id: GoalId,
    pub status: GoalStatus,
    pub total_votes: u64,
    pub yes_votes: u64,
    pub stake: Amount,
    pub payout: Amount,
    pub bonus_paid: Amount,
    pub bonus_shortfall: Amount,
    pub slashed: Amount,
    pub creator_balance: Amount,
    pub reward_pool: Amount,
    pub judges: Vec<JudgeReport>,
    pub events: Vec<String>,
    pub live_events_seen: usize,
    pub journal: JournalIntegrity,
}

pub async fn run(
    config: &NodeConfig,
    store: Arc<dyn LedgerStore>,
    scenario: Scenario,
) -> anyhow::Result<SimulationReport> {
    anyhow::ensure!(
        scenario.yes_votes <= scenario.judges,
        "cannot cast {} yes votes with {} judges",
        scenario.yes_votes,
        scenario.judges
    );

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let engine = ProtocolEngine::new(
        store,
        clock.clone(),
        config.protocol.clone(),
        config.engine.clone(),
    )?;
    let mut live = engine.subscribe();
    let params = engine.params().clone();
    let stake = scenario.stake.unwrap_or(params.min_goal_stake);
    let goal_id = GoalId(scenario.goal_id);

    let authority = Principal::derive("sim-authority");
    if engine.registry().await?.is_none() {
        engine.initialize(authority).await?;
    }

    if scenario.reward_pool > 0 {
        let donor = Principal::derive("sim-donor");
        engine.deposit(donor, scenario.reward_pool).await?;
        engine.fund_reward_pool(donor, scenario.reward_pool).await?;
    }

    let creator = Principal::derive("sim-creator");
    engine.deposit(creator, stake).await?;
    engine
        .create_goal(
            creator,
            goal_id,
            "Simulated commitment",
            stake,
            clock.now() + Duration::days(7),
        )
        .await
        .with_context(|| format!("creating {goal_id}"))?;
    clock.advance(Duration::days(1));
    engine
        .submit_proof(creator, goal_id, "sim://proof", ProofType::Text)
        .await?;

    let mut judges = Vec::with_capacity(scenario.judges);
    for i in 0..scenario.judges {
        let judge = Principal::derive(&format!("sim-judge-{i}"));
        engine.deposit(judge, params.min_judge_stake).await?;
        engine.register_judge(judge).await?;
        judges.push((judge, i < scenario.yes_votes));
    }
    for (judge, vote) in &judges {
        engine.vote(*judge, goal_id, *judge, *vote).await?;
    }
    info!(judges = judges.len(), yes = scenario.yes_votes, "Votes cast");

    clock.advance(
        params
            .review_window()
            .context("review window does not fit a duration")?,
    );
    let finalized = engine.finalize_goal(creator, goal_id).await?;

    let mut judge_reports = Vec::with_capacity(judges.len());
    for (judge, vote) in judges {
        let record = engine.update_judge_reputation(goal_id, judge).await?;
        judge_reports.push(JudgeReport {
            judge,
            vote,
            reputation_score: record.reputation_score,
        });
    }

    let mut live_events_seen = 0;
    while let Ok(entry) = live.try_recv() {
        debug!(sequence = entry.sequence, event = entry.event.name(), "Live event");
        live_events_seen += 1;
    }

    let events = engine
        .events_since(0, 0)
        .await?
        .into_iter()
        .map(|entry| format!("#{} {}", entry.sequence, entry.event.name()))
        .collect();
    let registry = engine
        .registry()
        .await?
        .context("registry vanished after initialization")?;

    Ok(SimulationReport {
        goal_id,
        status: finalized.goal.status,
        total_votes: finalized.goal.total_votes,
        yes_votes: finalized.goal.yes_votes,
        stake,
        payout: finalized.settlement.payout,
        bonus_paid: finalized.settlement.bonus_paid,
        bonus_shortfall: finalized.settlement.bonus_shortfall,
        slashed: finalized.settlement.slashed,
        creator_balance: engine.balance(creator).await?,
        reward_pool: registry.reward_pool,
        judges: judge_reports,
        events,
        live_events_seen,
        journal: engine.verify_journal().await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use timestake_storage::InMemoryLedgerStore;

    fn small_config() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.protocol.min_goal_stake = 1_000;
        config.protocol.min_judge_stake = 500;
        config
    }

    #[tokio::test]
    async fn majority_yes_completes() {
        let report = run(
            &small_config(),
            Arc::new(InMemoryLedgerStore::new()),
            Scenario {
                judges: 3,
                yes_votes: 2,
                stake: None,
                reward_pool: 1_000,
                goal_id: 1,
            },
        )
        .await
        .unwrap();

        assert_eq!(report.status, GoalStatus::Completed);
        assert_eq!(report.payout, 1_100);
        assert_eq!(report.creator_balance, 1_100);
        assert_eq!(report.reward_pool, 900);
        assert_eq!(
            report
                .judges
                .iter()
                .map(|j| j.reputation_score)
                .collect::<Vec<_>>(),
            vec![110, 110, 80]
        );
        assert!(report.journal.is_clean());
        assert_eq!(report.live_events_seen, report.events.len());
    }

    #[tokio::test]
    async fn minority_yes_slashes() {
        let report = run(
            &small_config(),
            Arc::new(InMemoryLedgerStore::new()),
            Scenario {
                judges: 3,
                yes_votes: 1,
                stake: Some(2_000),
                reward_pool: 0,
                goal_id: 7,
            },
        )
        .await
        .unwrap();

        assert_eq!(report.status, GoalStatus::Failed);
        assert_eq!(report.slashed, 2_000);
        assert_eq!(report.creator_balance, 0);
        assert_eq!(report.reward_pool, 2_000);
    }

    #[tokio::test]
    async fn rejects_impossible_scenarios() {
        let err = run(
            &small_config(),
            Arc::new(InMemoryLedgerStore::new()),
            Scenario {
                judges: 1,
                yes_votes: 2,
                stake: None,
                reward_pool: 0,
                goal_id: 1,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("yes votes"));
    }
}
