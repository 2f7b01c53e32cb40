//! Goal lifecycle: creation, proof, settlement and cancellation.

use chrono::{DateTime, Utc};
use timestake_storage::StorageError;
use timestake_types::{
    Amount, DomainEvent, Goal, GoalId, GoalStatus, Principal, ProofType, RecordKey,
};
use tracing::{info, warn};

use crate::economics::{self, Settlement};
use crate::engine::ProtocolEngine;
use crate::error::{ProtocolError, ProtocolResult};
use crate::txn::Transaction;

/// A settled goal and how its escrow was distributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedGoal {
    pub goal: Goal,
    pub settlement: Settlement,
}

impl ProtocolEngine {
    /// Lock `stake_amount` from `caller`'s account behind a new goal.
    pub async fn create_goal(
        &self,
        caller: Principal,
        goal_id: GoalId,
        description: &str,
        stake_amount: Amount,
        deadline: DateTime<Utc>,
    ) -> ProtocolResult<Goal> {
        let mut attempts = 0;
        loop {
            let mut txn = self.begin();
            let now = txn.now();

            if stake_amount < self.params.min_goal_stake {
                return Err(ProtocolError::InsufficientStake {
                    required: self.params.min_goal_stake,
                    offered: stake_amount,
                });
            }
            if deadline <= now {
                return Err(ProtocolError::InvalidDeadline { deadline, now });
            }
            if description.len() > self.params.max_description_len {
                return Err(ProtocolError::DescriptionTooLong {
                    len: description.len(),
                    max: self.params.max_description_len,
                });
            }

            let mut registry = txn.registry().await?;
            if txn.load::<Goal>(&RecordKey::goal(goal_id)).await?.is_some() {
                return Err(ProtocolError::GoalAlreadyExists(goal_id));
            }
            txn.debit(caller, stake_amount).await?;

            let goal = Goal {
                creator: caller,
                goal_id,
                description: description.to_string(),
                stake_amount,
                escrow_balance: stake_amount,
                deadline,
                voting_deadline: None,
                status: GoalStatus::Active,
                created_at: now,
                finalized_at: None,
                proof_data: None,
                proof_type: None,
                proof_submitted_at: None,
                total_votes: 0,
                yes_votes: 0,
            };
            registry.total_goals = registry
                .total_goals
                .checked_add(1)
                .ok_or(ProtocolError::ArithmeticOverflow("total goals"))?;
            txn.put(goal.clone());
            txn.put(registry);
            txn.emit(DomainEvent::GoalCreated {
                goal_id,
                creator: caller,
                stake_amount,
                deadline,
            });

            if self.try_commit("create_goal", txn, &mut attempts).await?.is_some() {
                info!(
                    %goal_id,
                    creator = %caller.short_id(),
                    stake_amount,
                    %deadline,
                    "Goal created"
                );
                return Ok(goal);
            }
        }
    }

    /// Attach proof to an active goal and open its review window.
    pub async fn submit_proof(
        &self,
        caller: Principal,
        goal_id: GoalId,
        proof_data: &str,
        proof_type: ProofType,
    ) -> ProtocolResult<Goal> {
        let mut attempts = 0;
        loop {
            let mut txn = self.begin();
            let now = txn.now();
            let mut goal = load_goal(&mut txn, goal_id).await?;

            if caller != goal.creator {
                return Err(ProtocolError::Unauthorized {
                    caller,
                    action: "submit proof for another creator's goal",
                });
            }
            transition(&mut goal, GoalStatus::PendingVerification)?;
            if now > goal.deadline {
                return Err(ProtocolError::DeadlinePassed {
                    goal_id,
                    deadline: goal.deadline,
                });
            }
            if proof_data.len() > self.params.max_proof_len {
                return Err(ProtocolError::ProofTooLong {
                    len: proof_data.len(),
                    max: self.params.max_proof_len,
                });
            }

            let voting_deadline = self
                .params
                .review_window()
                .and_then(|window| now.checked_add_signed(window))
                .ok_or(ProtocolError::ArithmeticOverflow("voting deadline"))?;
            goal.proof_data = Some(proof_data.to_string());
            goal.proof_type = Some(proof_type);
            goal.proof_submitted_at = Some(now);
            goal.voting_deadline = Some(voting_deadline);
            txn.put(goal.clone());
            txn.emit(DomainEvent::ProofSubmitted {
                goal_id,
                creator: caller,
                proof_type,
                voting_deadline,
            });

            if self.try_commit("submit_proof", txn, &mut attempts).await?.is_some() {
                info!(%goal_id, ?proof_type, %voting_deadline, "Proof submitted");
                return Ok(goal);
            }
        }
    }

    /// Settle a pending goal once its review window has closed.
    ///
    /// Anyone may call this. The outcome is a strict majority of the votes
    /// recorded; a goal nobody voted on fails.
    pub async fn finalize_goal(
        &self,
        caller: Principal,
        goal_id: GoalId,
    ) -> ProtocolResult<FinalizedGoal> {
        let mut attempts = 0;
        loop {
            let mut txn = self.begin();
            let now = txn.now();
            let mut registry = txn.registry().await?;
            let mut goal = load_goal(&mut txn, goal_id).await?;

            let successful = economics::is_successful(goal.total_votes, goal.yes_votes);
            transition(
                &mut goal,
                if successful {
                    GoalStatus::Completed
                } else {
                    GoalStatus::Failed
                },
            )?;
            let voting_deadline = pending_voting_deadline(&goal)?;
            if now < voting_deadline {
                return Err(ProtocolError::VotingStillActive {
                    goal_id,
                    voting_deadline,
                });
            }

            let settlement = economics::settle(
                goal.escrow_balance,
                registry.reward_pool,
                successful,
                self.params.success_bonus_bps,
            )?;
            if settlement.payout > 0 {
                txn.credit(goal.creator, settlement.payout).await?;
            }
            registry.reward_pool = settlement.reward_pool_after;

            goal.escrow_balance = 0;
            goal.finalized_at = Some(now);
            txn.put(goal.clone());
            txn.put(registry);
            txn.emit(DomainEvent::GoalFinalized {
                goal_id,
                successful,
                total_votes: goal.total_votes,
                yes_votes: goal.yes_votes,
                payout: settlement.payout,
                bonus_paid: settlement.bonus_paid,
                bonus_shortfall: settlement.bonus_shortfall,
                slashed: settlement.slashed,
            });

            if self.try_commit("finalize_goal", txn, &mut attempts).await?.is_some() {
                info!(
                    %goal_id,
                    finalizer = %caller.short_id(),
                    successful,
                    total_votes = goal.total_votes,
                    yes_votes = goal.yes_votes,
                    payout = settlement.payout,
                    slashed = settlement.slashed,
                    "Goal finalized"
                );
                if settlement.bonus_shortfall > 0 {
                    warn!(
                        %goal_id,
                        bonus_paid = settlement.bonus_paid,
                        bonus_shortfall = settlement.bonus_shortfall,
                        "Reward pool could not cover the full success bonus"
                    );
                }
                return Ok(FinalizedGoal { goal, settlement });
            }
        }
    }

    /// Authority-only: cancel an active goal and refund its escrow.
    pub async fn cancel_goal(&self, caller: Principal, goal_id: GoalId) -> ProtocolResult<Goal> {
        let mut attempts = 0;
        loop {
            let mut txn = self.begin();
            let registry = txn.registry().await?;
            if caller != registry.authority {
                return Err(ProtocolError::Unauthorized {
                    caller,
                    action: "cancel goals",
                });
            }
            let mut goal = load_goal(&mut txn, goal_id).await?;
            transition(&mut goal, GoalStatus::Cancelled)?;

            let refunded = goal.escrow_balance;
            txn.credit(goal.creator, refunded).await?;
            goal.escrow_balance = 0;
            goal.finalized_at = Some(txn.now());
            txn.put(goal.clone());
            txn.emit(DomainEvent::GoalCancelled {
                goal_id,
                creator: goal.creator,
                refunded,
            });

            if self.try_commit("cancel_goal", txn, &mut attempts).await?.is_some() {
                info!(%goal_id, refunded, "Goal cancelled");
                return Ok(goal);
            }
        }
    }
}

pub(crate) async fn load_goal(txn: &mut Transaction<'_>, goal_id: GoalId) -> ProtocolResult<Goal> {
    txn.load::<Goal>(&RecordKey::goal(goal_id))
        .await?
        .ok_or(ProtocolError::GoalNotFound(goal_id))
}

pub(crate) fn expect_status(goal: &Goal, expected: GoalStatus) -> ProtocolResult<()> {
    if goal.status != expected {
        return Err(ProtocolError::InvalidGoalStatus {
            goal_id: goal.goal_id,
            status: goal.status,
            expected,
        });
    }
    Ok(())
}

/// Move a goal along one edge of its status machine.
///
/// Every status change goes through here; a goal that is not in the status
/// `next` is entered from fails with `InvalidGoalStatus`.
pub(crate) fn transition(goal: &mut Goal, next: GoalStatus) -> ProtocolResult<()> {
    let Some(expected) = next.entered_from() else {
        return Err(StorageError::InvariantViolation(format!(
            "{} cannot re-enter {next}",
            goal.goal_id
        ))
        .into());
    };
    if !goal.status.can_transition_to(next) {
        return Err(ProtocolError::InvalidGoalStatus {
            goal_id: goal.goal_id,
            status: goal.status,
            expected,
        });
    }
    goal.status = next;
    Ok(())
}

/// Goals past proof submission always carry a voting deadline.
pub(crate) fn pending_voting_deadline(goal: &Goal) -> ProtocolResult<DateTime<Utc>> {
    goal.voting_deadline.ok_or_else(|| {
        StorageError::InvariantViolation(format!(
            "{} has no voting deadline after proof submission",
            goal.goal_id
        ))
        .into()
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use timestake_types::{GoalId, GoalStatus, ProofType};

    use super::transition;
    use crate::testkit::Fixture;
    use crate::ProtocolError;

    #[tokio::test]
    async fn create_goal_locks_stake() {
        let fx = Fixture::new().await;
        let creator = fx.funded("creator", 5_000).await;

        let goal = fx.create_goal(creator, 1, 1_000).await.unwrap();
        assert_eq!(goal.status, GoalStatus::Active);
        assert_eq!(goal.escrow_balance, 1_000);
        assert_eq!(fx.engine.balance(creator).await.unwrap(), 4_000);
        assert_eq!(fx.engine.registry().await.unwrap().unwrap().total_goals, 1);

        let err = fx.create_goal(creator, 1, 1_000).await.unwrap_err();
        assert!(matches!(err, ProtocolError::GoalAlreadyExists(_)));
    }

    #[tokio::test]
    async fn create_goal_validation() {
        let fx = Fixture::new().await;
        let creator = fx.funded("creator", 5_000).await;
        let now = fx.now();
        let min = fx.engine.params().min_goal_stake;

        let err = fx.create_goal(creator, 1, min - 1).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InsufficientStake { .. }));

        let err = fx
            .engine
            .create_goal(creator, GoalId(1), "run", min, now)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidDeadline { .. }));

        let long = "x".repeat(501);
        let err = fx
            .engine
            .create_goal(creator, GoalId(1), &long, min, now + Duration::days(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::DescriptionTooLong { len: 501, max: 500 }
        ));

        let poor = fx.funded("poor", min - 1).await;
        let err = fx.create_goal(poor, 2, min).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InsufficientFunds { .. }));

        // Nothing landed.
        assert_eq!(fx.engine.registry().await.unwrap().unwrap().total_goals, 0);
    }

    #[tokio::test]
    async fn exactly_500_byte_description_is_accepted() {
        let fx = Fixture::new().await;
        let creator = fx.funded("creator", 5_000).await;
        let text = "y".repeat(500);
        let deadline = fx.now() + Duration::days(1);
        fx.engine
            .create_goal(creator, GoalId(9), &text, 1_000, deadline)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn submit_proof_opens_review_window() {
        let fx = Fixture::new().await;
        let creator = fx.funded("creator", 5_000).await;
        let goal = fx.create_goal(creator, 1, 1_000).await.unwrap();

        let stranger = fx.funded("stranger", 1).await;
        let err = fx
            .engine
            .submit_proof(stranger, goal.goal_id, "ipfs://x", ProofType::Link)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Unauthorized { .. }));

        let err = fx
            .engine
            .submit_proof(creator, goal.goal_id, &"p".repeat(501), ProofType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::ProofTooLong { .. }));

        let now = fx.now();
        let goal = fx
            .engine
            .submit_proof(creator, goal.goal_id, "ipfs://x", ProofType::Link)
            .await
            .unwrap();
        assert_eq!(goal.status, GoalStatus::PendingVerification);
        assert_eq!(goal.voting_deadline, Some(now + Duration::hours(48)));
        assert_eq!(goal.proof_submitted_at, Some(now));

        let err = fx
            .engine
            .submit_proof(creator, goal.goal_id, "again", ProofType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidGoalStatus { .. }));
    }

    #[tokio::test]
    async fn cancel_is_authority_only_and_refunds() {
        let fx = Fixture::new().await;
        let creator = fx.funded("creator", 5_000).await;
        let goal = fx.create_goal(creator, 1, 1_000).await.unwrap();

        let err = fx
            .engine
            .cancel_goal(creator, goal.goal_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Unauthorized { .. }));

        let cancelled = fx
            .engine
            .cancel_goal(fx.authority, goal.goal_id)
            .await
            .unwrap();
        assert_eq!(cancelled.status, GoalStatus::Cancelled);
        assert_eq!(cancelled.escrow_balance, 0);
        assert!(cancelled.finalized_at.is_some());
        assert_eq!(fx.engine.balance(creator).await.unwrap(), 5_000);

        let err = fx
            .engine
            .submit_proof(creator, goal.goal_id, "late", ProofType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidGoalStatus { .. }));
    }

    #[tokio::test]
    async fn status_changes_follow_the_state_machine() {
        let fx = Fixture::new().await;
        let creator = fx.funded("creator", 5_000).await;
        let mut goal = fx.create_goal(creator, 1, 1_000).await.unwrap();

        let err = transition(&mut goal, GoalStatus::Completed).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidGoalStatus {
                status: GoalStatus::Active,
                expected: GoalStatus::PendingVerification,
                ..
            }
        ));
        assert_eq!(goal.status, GoalStatus::Active);

        assert!(matches!(
            transition(&mut goal, GoalStatus::Active),
            Err(ProtocolError::Storage(_))
        ));

        transition(&mut goal, GoalStatus::PendingVerification).unwrap();
        let err = transition(&mut goal, GoalStatus::Cancelled).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidGoalStatus {
                status: GoalStatus::PendingVerification,
                expected: GoalStatus::Active,
                ..
            }
        ));
        transition(&mut goal, GoalStatus::Failed).unwrap();
        assert_eq!(goal.status, GoalStatus::Failed);
    }

    #[tokio::test]
    async fn pending_goals_cannot_be_cancelled() {
        let fx = Fixture::new().await;
        let goal = fx.pending_goal("creator", 1).await;
        let err = fx.engine.cancel_goal(fx.authority, goal).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidGoalStatus {
                expected: GoalStatus::Active,
                ..
            }
        ));
        let stored = fx.engine.goal(goal).await.unwrap().unwrap();
        assert_eq!(stored.status, GoalStatus::PendingVerification);
        assert_eq!(stored.escrow_balance, 1_000);
    }

    #[tokio::test]
    async fn unrepresentable_review_window_is_an_error() {
        let fx = Fixture::new().await;
        let creator = fx.funded("creator", 5_000).await;
        let goal = fx.create_goal(creator, 1, 1_000).await.unwrap();

        // Engines validate params on construction; force the bad value in.
        let mut engine = fx.engine.clone();
        engine.params.review_window_secs = i64::MAX;
        let err = engine
            .submit_proof(creator, goal.goal_id, "ipfs://x", ProofType::Link)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ArithmeticOverflow("voting deadline")
        ));
        let stored = fx.engine.goal(goal.goal_id).await.unwrap().unwrap();
        assert_eq!(stored.status, GoalStatus::Active);
        assert_eq!(stored.voting_deadline, None);
    }

    #[tokio::test]
    async fn voting_deadline_past_the_calendar_is_an_error() {
        let fx = Fixture::new().await;
        let creator = fx.funded("creator", 5_000).await;
        let end = DateTime::<Utc>::MAX_UTC;
        fx.clock.set(end - Duration::hours(1));
        fx.engine
            .create_goal(creator, GoalId(1), "outlast time", 1_000, end)
            .await
            .unwrap();

        let err = fx
            .engine
            .submit_proof(creator, GoalId(1), "ipfs://x", ProofType::Link)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ArithmeticOverflow("voting deadline")
        ));
    }
}
