//! Vote casting and tally updates.

use timestake_types::{
    DomainEvent, GoalId, GoalStatus, Judge, Principal, RecordKey, VoteRecord,
};
use tracing::info;

use crate::engine::ProtocolEngine;
use crate::error::{ProtocolError, ProtocolResult};
use crate::goals::{expect_status, load_goal, pending_voting_deadline};

impl ProtocolEngine {
    /// Record one judge's verdict on a pending goal.
    ///
    /// The vote record and the goal's tallies land together. Two concurrent
    /// votes from the same judge race on the vote record key; the loser
    /// re-reads and fails with `AlreadyVoted`.
    pub async fn vote(
        &self,
        caller: Principal,
        goal_id: GoalId,
        judge_address: Principal,
        vote: bool,
    ) -> ProtocolResult<VoteRecord> {
        if caller != judge_address {
            return Err(ProtocolError::Unauthorized {
                caller,
                action: "vote on behalf of another judge",
            });
        }

        let mut attempts = 0;
        loop {
            let mut txn = self.begin();
            let now = txn.now();
            let registry = txn.registry().await?;
            txn.load::<Judge>(&RecordKey::judge(&judge_address))
                .await?
                .filter(|judge| judge.is_active && judge.stake_amount == registry.min_judge_stake)
                .ok_or(ProtocolError::JudgeNotActive(judge_address))?;

            let mut goal = load_goal(&mut txn, goal_id).await?;
            expect_status(&goal, GoalStatus::PendingVerification)?;
            let voting_deadline = pending_voting_deadline(&goal)?;
            if now > voting_deadline {
                return Err(ProtocolError::VotingDeadlinePassed {
                    goal_id,
                    voting_deadline,
                });
            }

            let vote_key = RecordKey::vote(goal_id, &judge_address);
            if txn.load::<VoteRecord>(&vote_key).await?.is_some() {
                return Err(ProtocolError::AlreadyVoted {
                    goal_id,
                    judge: judge_address,
                });
            }

            let record = VoteRecord {
                goal_id,
                judge: judge_address,
                vote,
                voted_at: now,
            };
            goal.total_votes = goal
                .total_votes
                .checked_add(1)
                .ok_or(ProtocolError::ArithmeticOverflow("goal total votes"))?;
            if vote {
                goal.yes_votes += 1;
            }
            txn.put(record.clone());
            txn.put(goal.clone());
            txn.emit(DomainEvent::VoteCast {
                goal_id,
                judge: judge_address,
                vote,
                total_votes: goal.total_votes,
                yes_votes: goal.yes_votes,
            });

            if self.try_commit("vote", txn, &mut attempts).await?.is_some() {
                info!(
                    %goal_id,
                    judge = %judge_address.short_id(),
                    vote,
                    total_votes = goal.total_votes,
                    yes_votes = goal.yes_votes,
                    "Vote cast"
                );
                return Ok(record);
            }
        }
    }
}
