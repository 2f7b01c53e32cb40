#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use timestake_protocol::{
    Amount, Clock, GoalFilter, GoalId, JudgeFilter, ManualClock, Principal, ProofType,
    ProtocolEngine, ProtocolParams,
};
use timestake_storage::QueryWindow;

pub struct Harness {
    pub engine: ProtocolEngine,
    pub clock: Arc<ManualClock>,
    pub authority: Principal,
}

pub fn params() -> ProtocolParams {
    ProtocolParams {
        min_goal_stake: 100,
        min_judge_stake: 1_000,
        ..ProtocolParams::default()
    }
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_params(params()).await
    }

    pub async fn with_params(params: ProtocolParams) -> Self {
        let clock = Arc::new(ManualClock::new(start()));
        let engine = ProtocolEngine::in_memory(clock.clone(), params).unwrap();
        let authority = Principal::derive("authority");
        engine.initialize(authority).await.unwrap();
        Self {
            engine,
            clock,
            authority,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn funded(&self, name: &str, amount: Amount) -> Principal {
        let who = Principal::derive(name);
        self.engine.deposit(who, amount).await.unwrap();
        who
    }

    pub async fn judges(&self, prefix: &str, count: usize) -> Vec<Principal> {
        let stake = self.engine.params().min_judge_stake;
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let who = self.funded(&format!("{prefix}-{i}"), stake).await;
            self.engine.register_judge(who).await.unwrap();
            out.push(who);
        }
        out
    }

    /// Create a goal for `creator` due in a week and submit proof for it.
    pub async fn pending_goal(&self, creator: Principal, id: u64, stake: Amount) -> GoalId {
        let goal_id = GoalId(id);
        self.engine
            .create_goal(
                creator,
                goal_id,
                "Run a marathon",
                stake,
                self.now() + Duration::days(7),
            )
            .await
            .unwrap();
        self.engine
            .submit_proof(creator, goal_id, "https://example.org/finish.jpg", ProofType::Image)
            .await
            .unwrap();
        goal_id
    }

    /// Sum of every place value can sit: accounts, escrows, judge stakes
    /// and the reward pool.
    pub async fn total_value(&self, holders: &[Principal]) -> u128 {
        let mut total = 0u128;
        for holder in holders {
            total += u128::from(self.engine.balance(*holder).await.unwrap());
        }
        for goal in self
            .engine
            .goals(GoalFilter::default(), QueryWindow::all())
            .await
            .unwrap()
        {
            total += u128::from(goal.escrow_balance);
        }
        for judge in self
            .engine
            .judges(JudgeFilter::default(), QueryWindow::all())
            .await
            .unwrap()
        {
            total += u128::from(judge.stake_amount);
        }
        let registry = self.engine.registry().await.unwrap().unwrap();
        total + u128::from(registry.reward_pool)
    }
}
