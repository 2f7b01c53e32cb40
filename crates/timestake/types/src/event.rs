use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::principal::Principal;
use crate::records::{GoalId, ProofType};
use crate::Amount;

/// Domain events emitted by committed operations.
///
/// Events are the only channel through which indexers and front ends learn
/// about state changes without re-reading every record. Delivery is
/// at-least-once: consumers treat the journal as a log and deduplicate by
/// sequence number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ProtocolInitialized {
        authority: Principal,
        min_judge_stake: Amount,
        judge_reward_rate_bps: u16,
    },
    Deposited {
        owner: Principal,
        amount: Amount,
        balance: Amount,
    },
    RewardPoolFunded {
        funder: Principal,
        amount: Amount,
        reward_pool: Amount,
    },
    GoalCreated {
        goal_id: GoalId,
        creator: Principal,
        stake_amount: Amount,
        deadline: DateTime<Utc>,
    },
    ProofSubmitted {
        goal_id: GoalId,
        creator: Principal,
        proof_type: ProofType,
        voting_deadline: DateTime<Utc>,
    },
    JudgeRegistered {
        judge: Principal,
        stake_amount: Amount,
    },
    VoteCast {
        goal_id: GoalId,
        judge: Principal,
        vote: bool,
        total_votes: u64,
        yes_votes: u64,
    },
    GoalFinalized {
        goal_id: GoalId,
        successful: bool,
        total_votes: u64,
        yes_votes: u64,
        /// Value returned to the creator (stake plus bonus paid)
        payout: Amount,
        bonus_paid: Amount,
        /// Bonus owed but not covered by the reward pool
        bonus_shortfall: Amount,
        /// Value moved into the reward pool
        slashed: Amount,
    },
    GoalCancelled {
        goal_id: GoalId,
        creator: Principal,
        refunded: Amount,
    },
    JudgeReputationUpdated {
        goal_id: GoalId,
        judge: Principal,
        correct: bool,
        reputation_score: u64,
    },
    JudgeStakeWithdrawn {
        judge: Principal,
        amount: Amount,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::ProtocolInitialized { .. } => "protocol_initialized",
            DomainEvent::Deposited { .. } => "deposited",
            DomainEvent::RewardPoolFunded { .. } => "reward_pool_funded",
            DomainEvent::GoalCreated { .. } => "goal_created",
            DomainEvent::ProofSubmitted { .. } => "proof_submitted",
            DomainEvent::JudgeRegistered { .. } => "judge_registered",
            DomainEvent::VoteCast { .. } => "vote_cast",
            DomainEvent::GoalFinalized { .. } => "goal_finalized",
            DomainEvent::GoalCancelled { .. } => "goal_cancelled",
            DomainEvent::JudgeReputationUpdated { .. } => "judge_reputation_updated",
            DomainEvent::JudgeStakeWithdrawn { .. } => "judge_stake_withdrawn",
        }
    }

    /// The goal this event concerns, if any.
    pub fn goal_id(&self) -> Option<GoalId> {
        match self {
            DomainEvent::GoalCreated { goal_id, .. }
            | DomainEvent::ProofSubmitted { goal_id, .. }
            | DomainEvent::VoteCast { goal_id, .. }
            | DomainEvent::GoalFinalized { goal_id, .. }
            | DomainEvent::GoalCancelled { goal_id, .. }
            | DomainEvent::JudgeReputationUpdated { goal_id, .. } => Some(*goal_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_type_matches_name() {
        let events = vec![
            DomainEvent::JudgeRegistered {
                judge: Principal::derive("j"),
                stake_amount: 5,
            },
            DomainEvent::GoalCancelled {
                goal_id: GoalId(1),
                creator: Principal::derive("c"),
                refunded: 5,
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.name());
        }
    }

    #[test]
    fn goal_scoped_events_expose_goal_id() {
        let event = DomainEvent::VoteCast {
            goal_id: GoalId(9),
            judge: Principal::derive("j"),
            vote: false,
            total_votes: 1,
            yes_votes: 0,
        };
        assert_eq!(event.goal_id(), Some(GoalId(9)));
        let event = DomainEvent::JudgeStakeWithdrawn {
            judge: Principal::derive("j"),
            amount: 1,
        };
        assert_eq!(event.goal_id(), None);
    }
}
