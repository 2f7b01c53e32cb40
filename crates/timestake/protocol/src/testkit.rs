//! Shared fixture for unit tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use timestake_types::{Amount, Goal, GoalId, Principal, ProofType};

use crate::clock::{Clock, ManualClock};
use crate::engine::ProtocolEngine;
use crate::error::ProtocolResult;
use crate::params::ProtocolParams;

pub(crate) fn test_params() -> ProtocolParams {
    ProtocolParams {
        min_goal_stake: 100,
        min_judge_stake: 1_000,
        ..ProtocolParams::default()
    }
}

pub(crate) struct Fixture {
    pub engine: ProtocolEngine,
    pub clock: Arc<ManualClock>,
    pub authority: Principal,
}

impl Fixture {
    /// Initialized engine over an in-memory store.
    pub async fn new() -> Self {
        let start: DateTime<Utc> = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let engine = ProtocolEngine::in_memory(clock.clone(), test_params()).unwrap();
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

    pub async fn judge(&self, name: &str) -> Principal {
        let who = self.funded(name, self.engine.params().min_judge_stake).await;
        self.engine.register_judge(who).await.unwrap();
        who
    }

    pub async fn create_goal(
        &self,
        creator: Principal,
        id: u64,
        stake: Amount,
    ) -> ProtocolResult<Goal> {
        self.engine
            .create_goal(
                creator,
                GoalId(id),
                "ship the thing",
                stake,
                self.now() + Duration::days(7),
            )
            .await
    }

    /// A goal with proof submitted, staked at 1_000.
    pub async fn pending_goal(&self, creator: &str, id: u64) -> GoalId {
        let creator = self.funded(creator, 1_000).await;
        let goal = self.create_goal(creator, id, 1_000).await.unwrap();
        self.engine
            .submit_proof(creator, goal.goal_id, "ipfs://proof", ProofType::Link)
            .await
            .unwrap();
        goal.goal_id
    }
}
