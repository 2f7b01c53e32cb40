//! Read path.
//!
//! Queries read committed state directly from the store and never take part
//! in a transaction.

use timestake_storage::{JournalEntry, JournalIntegrity, QueryWindow};
use timestake_types::{
    Account, Amount, GlobalRegistry, Goal, GoalId, GoalStatus, Judge, LedgerRecord, Principal,
    RecordKey, RecordKind, ReputationReceipt, VoteRecord,
};

use crate::engine::ProtocolEngine;
use crate::error::ProtocolResult;

/// Goal listing filter. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoalFilter {
    pub creator: Option<Principal>,
    pub status: Option<GoalStatus>,
}

impl GoalFilter {
    pub fn by_creator(creator: Principal) -> Self {
        Self {
            creator: Some(creator),
            ..Self::default()
        }
    }

    pub fn by_status(status: GoalStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn matches(&self, goal: &Goal) -> bool {
        self.creator.map_or(true, |c| c == goal.creator)
            && self.status.map_or(true, |s| s == goal.status)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JudgeFilter {
    pub active_only: bool,
}

impl ProtocolEngine {
    async fn fetch<T: LedgerRecord>(&self, key: &RecordKey) -> ProtocolResult<Option<T>> {
        match self.store.get(key).await? {
            Some(stored) => Ok(Some(stored.decode::<T>()?)),
            None => Ok(None),
        }
    }

    async fn fetch_all<T: LedgerRecord>(&self, kind: RecordKind) -> ProtocolResult<Vec<T>> {
        self.store
            .scan(kind, QueryWindow::all())
            .await?
            .into_iter()
            .map(|stored| stored.decode::<T>().map_err(Into::into))
            .collect()
    }

    pub async fn registry(&self) -> ProtocolResult<Option<GlobalRegistry>> {
        self.fetch(&RecordKey::registry()).await
    }

    pub async fn goal(&self, goal_id: GoalId) -> ProtocolResult<Option<Goal>> {
        self.fetch(&RecordKey::goal(goal_id)).await
    }

    pub async fn judge(&self, judge: Principal) -> ProtocolResult<Option<Judge>> {
        self.fetch(&RecordKey::judge(&judge)).await
    }

    pub async fn vote_record(
        &self,
        goal_id: GoalId,
        judge: Principal,
    ) -> ProtocolResult<Option<VoteRecord>> {
        self.fetch(&RecordKey::vote(goal_id, &judge)).await
    }

    /// Present once the judge's vote on this goal has been scored.
    pub async fn reputation_receipt(
        &self,
        goal_id: GoalId,
        judge: Principal,
    ) -> ProtocolResult<Option<ReputationReceipt>> {
        self.fetch(&RecordKey::reputation_receipt(goal_id, &judge)).await
    }

    /// Spendable balance; zero for an account that was never opened.
    pub async fn balance(&self, owner: Principal) -> ProtocolResult<Amount> {
        Ok(self
            .fetch::<Account>(&RecordKey::account(&owner))
            .await?
            .map_or(0, |account| account.balance))
    }

    /// Goals matching `filter`, ordered by id.
    pub async fn goals(&self, filter: GoalFilter, window: QueryWindow) -> ProtocolResult<Vec<Goal>> {
        let mut goals: Vec<Goal> = self
            .fetch_all::<Goal>(RecordKind::Goal)
            .await?
            .into_iter()
            .filter(|goal| filter.matches(goal))
            .collect();
        goals.sort_by_key(|goal| goal.goal_id);
        Ok(window.apply(goals))
    }

    /// Judges in registration order.
    pub async fn judges(
        &self,
        filter: JudgeFilter,
        window: QueryWindow,
    ) -> ProtocolResult<Vec<Judge>> {
        let mut judges: Vec<Judge> = self
            .fetch_all::<Judge>(RecordKind::Judge)
            .await?
            .into_iter()
            .filter(|judge| !filter.active_only || judge.is_active)
            .collect();
        judges.sort_by_key(|judge| (judge.registered_at, judge.judge));
        Ok(window.apply(judges))
    }

    /// Every vote on a goal, oldest first.
    pub async fn votes_for_goal(&self, goal_id: GoalId) -> ProtocolResult<Vec<VoteRecord>> {
        self.votes_where(|vote| vote.goal_id == goal_id).await
    }

    /// Every vote a judge has cast, oldest first.
    pub async fn votes_by_judge(&self, judge: Principal) -> ProtocolResult<Vec<VoteRecord>> {
        self.votes_where(|vote| vote.judge == judge).await
    }

    async fn votes_where<F>(&self, predicate: F) -> ProtocolResult<Vec<VoteRecord>>
    where
        F: Fn(&VoteRecord) -> bool + Send,
    {
        let mut votes: Vec<VoteRecord> = self
            .fetch_all::<VoteRecord>(RecordKind::Vote)
            .await?
            .into_iter()
            .filter(|vote| predicate(vote))
            .collect();
        votes.sort_by_key(|vote| (vote.voted_at, vote.goal_id, vote.judge));
        Ok(votes)
    }

    /// Journal entries after `after_sequence`. `limit == 0` returns all.
    pub async fn events_since(
        &self,
        after_sequence: u64,
        limit: usize,
    ) -> ProtocolResult<Vec<JournalEntry>> {
        Ok(self.store.events_since(after_sequence, limit).await?)
    }

    pub async fn verify_journal(&self) -> ProtocolResult<JournalIntegrity> {
        Ok(self.store.verify_journal().await?)
    }
}
