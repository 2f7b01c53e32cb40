use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::principal::Principal;
use crate::Amount;

/// Caller-supplied goal identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoalId(pub u64);

impl std::fmt::Display for GoalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "goal#{}", self.0)
    }
}

/// Singleton configuration and counter record, created once by `initialize`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRegistry {
    /// Principal with administrative rights (goal cancellation)
    pub authority: Principal,
    pub total_goals: u64,
    pub total_judges: u64,
    /// Exact stake every active judge has locked
    pub min_judge_stake: Amount,
    /// Reserved for distributing the reward pool to judges
    pub judge_reward_rate_bps: u16,
    /// Accumulated slashed and donated value; funds success bonuses
    pub reward_pool: Amount,
    pub initialized_at: DateTime<Utc>,
}

/// Lifecycle of a goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalStatus {
    Active,
    PendingVerification,
    Completed,
    Failed,
    Cancelled,
}

impl GoalStatus {
    /// The status a goal must hold to move into `self`. `Active` is only
    /// ever entered at creation.
    pub fn entered_from(&self) -> Option<GoalStatus> {
        match self {
            GoalStatus::Active => None,
            GoalStatus::PendingVerification | GoalStatus::Cancelled => Some(GoalStatus::Active),
            GoalStatus::Completed | GoalStatus::Failed => Some(GoalStatus::PendingVerification),
        }
    }

    /// The only edges of the goal state machine.
    pub fn can_transition_to(&self, next: GoalStatus) -> bool {
        next.entered_from() == Some(*self)
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GoalStatus::Active => "active",
            GoalStatus::PendingVerification => "pending_verification",
            GoalStatus::Completed => "completed",
            GoalStatus::Failed => "failed",
            GoalStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Kind of evidence attached to a proof submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofType {
    Image,
    Document,
    Link,
    Text,
    Video,
}

/// A creator's staked, time-bounded commitment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub creator: Principal,
    pub goal_id: GoalId,
    pub description: String,
    pub stake_amount: Amount,
    /// Value currently held by the protocol for this goal.
    /// Equals `stake_amount` until the goal is settled or cancelled, then zero.
    pub escrow_balance: Amount,
    /// Proof must be submitted at or before this instant
    pub deadline: DateTime<Utc>,
    /// Set exactly once, at proof submission
    pub voting_deadline: Option<DateTime<Utc>>,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub proof_data: Option<String>,
    pub proof_type: Option<ProofType>,
    pub proof_submitted_at: Option<DateTime<Utc>>,
    pub total_votes: u64,
    pub yes_votes: u64,
}

impl Goal {
    /// `Some(true)` once Completed, `Some(false)` once Failed.
    pub fn outcome(&self) -> Option<bool> {
        match self.status {
            GoalStatus::Completed => Some(true),
            GoalStatus::Failed => Some(false),
            _ => None,
        }
    }
}

/// A staked, reputation-tracked voter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judge {
    pub judge: Principal,
    /// Full registry minimum while active, zero after withdrawal
    pub stake_amount: Amount,
    pub reputation_score: u64,
    pub total_votes: u64,
    pub correct_votes: u64,
    pub registered_at: DateTime<Utc>,
    pub is_active: bool,
}

/// One judge's vote on one goal. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub goal_id: GoalId,
    pub judge: Principal,
    pub vote: bool,
    pub voted_at: DateTime<Utc>,
}

/// Proof that one judge's vote on one finalized goal has been scored.
///
/// Lives at a key derived from the (goal, judge) pair, so a second scoring
/// attempt collides with the first instead of growing the judge record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationReceipt {
    pub goal_id: GoalId,
    pub judge: Principal,
    pub correct: bool,
    pub applied_at: DateTime<Utc>,
}

/// Native value held by a principal outside any escrow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub owner: Principal,
    pub balance: Amount,
}

impl Account {
    pub fn empty(owner: Principal) -> Self {
        Self { owner, balance: 0 }
    }
}
