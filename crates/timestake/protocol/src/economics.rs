//! Settlement arithmetic.
//!
//! Pure functions over amounts and tallies. All multiplication happens in
//! `u128` and every sum is checked, so no input can wrap.

use timestake_types::{Amount, BPS_DENOMINATOR};

use crate::error::{ProtocolError, ProtocolResult};
use crate::params::ProtocolParams;

/// Strict majority of recorded votes. A goal nobody voted on fails.
pub fn is_successful(total_votes: u64, yes_votes: u64) -> bool {
    total_votes > 0 && u128::from(yes_votes) * 2 > u128::from(total_votes)
}

/// `amount * bps / 10_000`, rounded down.
pub fn apply_bps(amount: Amount, bps: u16) -> Amount {
    let scaled = u128::from(amount) * u128::from(bps) / u128::from(BPS_DENOMINATOR);
    // Only exceeds u64 when bps > 10_000.
    Amount::try_from(scaled).unwrap_or(Amount::MAX)
}

/// How a finalized goal's escrow is distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub successful: bool,
    /// Total credited to the creator
    pub payout: Amount,
    pub bonus_paid: Amount,
    pub bonus_shortfall: Amount,
    /// Escrow moved into the reward pool
    pub slashed: Amount,
    pub reward_pool_after: Amount,
}

/// Settle an escrow against the current reward pool.
///
/// Success returns the escrow plus a bonus drawn from the pool, capped at
/// what the pool holds. Failure moves the whole escrow into the pool.
pub fn settle(
    escrow: Amount,
    reward_pool: Amount,
    successful: bool,
    success_bonus_bps: u16,
) -> ProtocolResult<Settlement> {
    if successful {
        let owed = apply_bps(escrow, success_bonus_bps);
        let bonus_paid = owed.min(reward_pool);
        let payout = escrow
            .checked_add(bonus_paid)
            .ok_or(ProtocolError::ArithmeticOverflow("success payout"))?;
        Ok(Settlement {
            successful,
            payout,
            bonus_paid,
            bonus_shortfall: owed - bonus_paid,
            slashed: 0,
            reward_pool_after: reward_pool - bonus_paid,
        })
    } else {
        let reward_pool_after = reward_pool
            .checked_add(escrow)
            .ok_or(ProtocolError::ArithmeticOverflow("reward pool"))?;
        Ok(Settlement {
            successful,
            payout: 0,
            bonus_paid: 0,
            bonus_shortfall: 0,
            slashed: escrow,
            reward_pool_after,
        })
    }
}

/// Reputation after one accounted vote. Never drops below zero.
pub fn reputation_after(score: u64, correct: bool, params: &ProtocolParams) -> u64 {
    if correct {
        score.saturating_add(params.reputation_reward)
    } else {
        score.saturating_sub(params.reputation_penalty)
    }
}
