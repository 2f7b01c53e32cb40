//! Protocol parameters and engine tuning.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use timestake_types::{Amount, BPS_DENOMINATOR};

/// Economic and validation constants of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    /// Smallest stake a goal may lock
    pub min_goal_stake: Amount,

    /// Stake every judge locks at registration
    pub min_judge_stake: Amount,

    /// Reserved judge reward rate, copied into the registry
    pub judge_reward_rate_bps: u16,

    /// Maximum goal description length in bytes
    pub max_description_len: usize,

    /// Maximum proof payload length in bytes
    pub max_proof_len: usize,

    /// Time judges have to vote after proof submission
    pub review_window_secs: i64,

    /// Bonus paid on success, drawn from the reward pool
    pub success_bonus_bps: u16,

    /// Reputation every judge starts with
    pub reputation_baseline: u64,

    /// Reputation gained for a vote matching the outcome
    pub reputation_reward: u64,

    /// Reputation lost for a vote against the outcome (floored at zero)
    pub reputation_penalty: u64,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            min_goal_stake: 100_000_000,
            min_judge_stake: 1_000_000_000,
            judge_reward_rate_bps: 500,
            max_description_len: 500,
            max_proof_len: 500,
            review_window_secs: 48 * 60 * 60,
            success_bonus_bps: 1_000,
            reputation_baseline: 100,
            reputation_reward: 10,
            reputation_penalty: 20,
        }
    }
}

/// Longest review window a deployment may configure (one year).
pub const MAX_REVIEW_WINDOW_SECS: i64 = 365 * 24 * 60 * 60;

impl ProtocolParams {
    /// `None` when the configured seconds do not fit a `Duration`.
    pub fn review_window(&self) -> Option<Duration> {
        Duration::try_seconds(self.review_window_secs)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.min_goal_stake == 0 {
            return Err(ParamsError::invalid("min_goal_stake", "must be positive"));
        }
        if self.min_judge_stake == 0 {
            return Err(ParamsError::invalid("min_judge_stake", "must be positive"));
        }
        if u64::from(self.judge_reward_rate_bps) > BPS_DENOMINATOR {
            return Err(ParamsError::invalid(
                "judge_reward_rate_bps",
                "must not exceed 10000",
            ));
        }
        if u64::from(self.success_bonus_bps) > BPS_DENOMINATOR {
            return Err(ParamsError::invalid(
                "success_bonus_bps",
                "must not exceed 10000",
            ));
        }
        if self.review_window_secs <= 0 {
            return Err(ParamsError::invalid(
                "review_window_secs",
                "must be positive",
            ));
        }
        if self.review_window_secs > MAX_REVIEW_WINDOW_SECS {
            return Err(ParamsError::invalid(
                "review_window_secs",
                "must not exceed one year",
            ));
        }
        Ok(())
    }
}

/// Engine tuning knobs with no economic meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Optimistic commit attempts before giving up with `Contention`
    pub max_commit_attempts: u32,

    /// Buffer of the live event broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_commit_attempts: 64,
            event_channel_capacity: 1024,
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.max_commit_attempts == 0 {
            return Err(ParamsError::invalid(
                "max_commit_attempts",
                "must be positive",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(ParamsError::invalid(
                "event_channel_capacity",
                "must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("{field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl ParamsError {
    fn invalid(field: &'static str, reason: &'static str) -> Self {
        ParamsError::Invalid { field, reason }
    }
}
