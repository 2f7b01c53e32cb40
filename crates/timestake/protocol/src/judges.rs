//! Judge registration, reputation accounting and stake withdrawal.

use timestake_types::{
    Amount, DomainEvent, GoalId, Judge, Principal, RecordKey, ReputationReceipt, VoteRecord,
};
use tracing::info;

use crate::economics;
use crate::engine::ProtocolEngine;
use crate::error::{ProtocolError, ProtocolResult};
use crate::goals::load_goal;

impl ProtocolEngine {
    /// Lock the registry's judge stake from `caller`'s account and enrol
    /// them as an active judge.
    pub async fn register_judge(&self, caller: Principal) -> ProtocolResult<Judge> {
        let mut attempts = 0;
        loop {
            let mut txn = self.begin();
            let mut registry = txn.registry().await?;
            if txn
                .load::<Judge>(&RecordKey::judge(&caller))
                .await?
                .is_some()
            {
                return Err(ProtocolError::JudgeAlreadyRegistered(caller));
            }

            let stake_amount = registry.min_judge_stake;
            txn.debit(caller, stake_amount).await?;
            let judge = Judge {
                judge: caller,
                stake_amount,
                reputation_score: self.params.reputation_baseline,
                total_votes: 0,
                correct_votes: 0,
                registered_at: txn.now(),
                is_active: true,
            };
            registry.total_judges = registry
                .total_judges
                .checked_add(1)
                .ok_or(ProtocolError::ArithmeticOverflow("total judges"))?;
            txn.put(judge.clone());
            txn.put(registry);
            txn.emit(DomainEvent::JudgeRegistered {
                judge: caller,
                stake_amount,
            });

            if self.try_commit("register_judge", txn, &mut attempts).await?.is_some() {
                info!(judge = %caller.short_id(), stake_amount, "Judge registered");
                return Ok(judge);
            }
        }
    }

    /// Score a judge's vote on a finalized goal against its outcome.
    ///
    /// Anyone may call this, at most once per (goal, judge) pair. The
    /// receipt is created in the same batch as the judge update, so a
    /// concurrent replay loses on the receipt key and re-reads into
    /// `ReputationAlreadyApplied`.
    pub async fn update_judge_reputation(
        &self,
        goal_id: GoalId,
        judge_address: Principal,
    ) -> ProtocolResult<Judge> {
        let mut attempts = 0;
        loop {
            let mut txn = self.begin();
            let goal = load_goal(&mut txn, goal_id).await?;
            let outcome = goal.outcome().ok_or(ProtocolError::GoalNotFinalized {
                goal_id,
                status: goal.status,
            })?;
            let vote = txn
                .load::<VoteRecord>(&RecordKey::vote(goal_id, &judge_address))
                .await?
                .ok_or(ProtocolError::VoteNotFound {
                    goal_id,
                    judge: judge_address,
                })?;
            let mut judge = txn
                .load::<Judge>(&RecordKey::judge(&judge_address))
                .await?
                .ok_or(ProtocolError::JudgeNotFound(judge_address))?;
            let receipt_key = RecordKey::reputation_receipt(goal_id, &judge_address);
            if txn.load::<ReputationReceipt>(&receipt_key).await?.is_some() {
                return Err(ProtocolError::ReputationAlreadyApplied {
                    goal_id,
                    judge: judge_address,
                });
            }

            let correct = vote.vote == outcome;
            judge.total_votes = judge
                .total_votes
                .checked_add(1)
                .ok_or(ProtocolError::ArithmeticOverflow("judge total votes"))?;
            if correct {
                judge.correct_votes = judge
                    .correct_votes
                    .checked_add(1)
                    .ok_or(ProtocolError::ArithmeticOverflow("judge correct votes"))?;
            }
            judge.reputation_score =
                economics::reputation_after(judge.reputation_score, correct, &self.params);
            let receipt = ReputationReceipt {
                goal_id,
                judge: judge_address,
                correct,
                applied_at: txn.now(),
            };
            txn.put(receipt);
            txn.put(judge.clone());
            txn.emit(DomainEvent::JudgeReputationUpdated {
                goal_id,
                judge: judge_address,
                correct,
                reputation_score: judge.reputation_score,
            });

            if self
                .try_commit("update_judge_reputation", txn, &mut attempts)
                .await?
                .is_some()
            {
                info!(
                    %goal_id,
                    judge = %judge_address.short_id(),
                    correct,
                    reputation_score = judge.reputation_score,
                    "Judge reputation updated"
                );
                return Ok(judge);
            }
        }
    }

    /// Return a judge's stake and deactivate them permanently.
    pub async fn withdraw_judge_stake(&self, caller: Principal) -> ProtocolResult<Amount> {
        let mut attempts = 0;
        loop {
            let mut txn = self.begin();
            let mut judge = txn
                .load::<Judge>(&RecordKey::judge(&caller))
                .await?
                .filter(|judge| judge.is_active)
                .ok_or(ProtocolError::JudgeNotActive(caller))?;

            let amount = judge.stake_amount;
            txn.credit(caller, amount).await?;
            judge.stake_amount = 0;
            judge.is_active = false;
            txn.put(judge);
            txn.emit(DomainEvent::JudgeStakeWithdrawn {
                judge: caller,
                amount,
            });

            if self
                .try_commit("withdraw_judge_stake", txn, &mut attempts)
                .await?
                .is_some()
            {
                info!(judge = %caller.short_id(), amount, "Judge stake withdrawn");
                return Ok(amount);
            }
        }
    }
}
