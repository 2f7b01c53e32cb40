use chrono::{DateTime, Utc};
use thiserror::Error;
use timestake_storage::StorageError;
use timestake_types::{Amount, GoalId, GoalStatus, Principal};

use crate::params::ParamsError;

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors returned by protocol operations.
///
/// Every error aborts the operation with no state change.
#[derive(Debug, Error)]
pub enum ProtocolError {
    // --- Validation errors ---
    #[error("insufficient stake: required at least {required}, offered {offered}")]
    InsufficientStake { required: Amount, offered: Amount },

    #[error("invalid deadline: {deadline} is not after {now}")]
    InvalidDeadline {
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("description too long: {len} bytes, maximum {max}")]
    DescriptionTooLong { len: usize, max: usize },

    #[error("unauthorized: {caller} may not {action}")]
    Unauthorized {
        caller: Principal,
        action: &'static str,
    },

    #[error("invalid goal status: {goal_id} is {status}, expected {expected}")]
    InvalidGoalStatus {
        goal_id: GoalId,
        status: GoalStatus,
        expected: GoalStatus,
    },

    #[error("proof too long: {len} bytes, maximum {max}")]
    ProofTooLong { len: usize, max: usize },

    #[error("judge not active: {0}")]
    JudgeNotActive(Principal),

    #[error("goal not finalized: {goal_id} is {status}")]
    GoalNotFinalized { goal_id: GoalId, status: GoalStatus },

    // --- Time-window errors ---
    #[error("deadline passed: {goal_id} closed for proof at {deadline}")]
    DeadlinePassed {
        goal_id: GoalId,
        deadline: DateTime<Utc>,
    },

    #[error("voting deadline passed: {goal_id} closed for votes at {voting_deadline}")]
    VotingDeadlinePassed {
        goal_id: GoalId,
        voting_deadline: DateTime<Utc>,
    },

    #[error("voting still active: {goal_id} can be finalized from {voting_deadline}")]
    VotingStillActive {
        goal_id: GoalId,
        voting_deadline: DateTime<Utc>,
    },

    // --- Identity and lookup errors ---
    #[error("protocol not initialized")]
    NotInitialized,

    #[error("protocol already initialized")]
    AlreadyInitialized,

    #[error("goal already exists: {0}")]
    GoalAlreadyExists(GoalId),

    #[error("goal not found: {0}")]
    GoalNotFound(GoalId),

    #[error("judge already registered: {0}")]
    JudgeAlreadyRegistered(Principal),

    #[error("judge not found: {0}")]
    JudgeNotFound(Principal),

    #[error("judge {judge} already voted on {goal_id}")]
    AlreadyVoted { goal_id: GoalId, judge: Principal },

    #[error("no vote from {judge} on {goal_id}")]
    VoteNotFound { goal_id: GoalId, judge: Principal },

    #[error("reputation for {judge} on {goal_id} already applied")]
    ReputationAlreadyApplied { goal_id: GoalId, judge: Principal },

    // --- Value errors ---
    #[error("insufficient funds: {owner} holds {available}, needs {required}")]
    InsufficientFunds {
        owner: Principal,
        required: Amount,
        available: Amount,
    },

    #[error("invalid amount: {0}")]
    InvalidAmount(&'static str),

    #[error("arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    // --- Infrastructure ---
    #[error("{operation} gave up after {attempts} contended commit attempts")]
    Contention {
        operation: &'static str,
        attempts: u32,
    },

    #[error("invalid protocol parameters: {0}")]
    InvalidParams(#[from] ParamsError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ProtocolError {
    /// Stable error name clients surface verbatim.
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::InsufficientStake { .. } => "InsufficientStake",
            ProtocolError::InvalidDeadline { .. } => "InvalidDeadline",
            ProtocolError::DescriptionTooLong { .. } => "DescriptionTooLong",
            ProtocolError::Unauthorized { .. } => "Unauthorized",
            ProtocolError::InvalidGoalStatus { .. } => "InvalidGoalStatus",
            ProtocolError::ProofTooLong { .. } => "ProofTooLong",
            ProtocolError::JudgeNotActive(_) => "JudgeNotActive",
            ProtocolError::GoalNotFinalized { .. } => "GoalNotFinalized",
            ProtocolError::DeadlinePassed { .. } => "DeadlinePassed",
            ProtocolError::VotingDeadlinePassed { .. } => "VotingDeadlinePassed",
            ProtocolError::VotingStillActive { .. } => "VotingStillActive",
            ProtocolError::NotInitialized => "NotInitialized",
            ProtocolError::AlreadyInitialized => "AlreadyInitialized",
            ProtocolError::GoalAlreadyExists(_) => "GoalAlreadyExists",
            ProtocolError::GoalNotFound(_) => "GoalNotFound",
            ProtocolError::JudgeAlreadyRegistered(_) => "JudgeAlreadyRegistered",
            ProtocolError::JudgeNotFound(_) => "JudgeNotFound",
            ProtocolError::AlreadyVoted { .. } => "AlreadyVoted",
            ProtocolError::VoteNotFound { .. } => "VoteNotFound",
            ProtocolError::ReputationAlreadyApplied { .. } => "ReputationAlreadyApplied",
            ProtocolError::InsufficientFunds { .. } => "InsufficientFunds",
            ProtocolError::InvalidAmount(_) => "InvalidAmount",
            ProtocolError::ArithmeticOverflow(_) => "ArithmeticOverflow",
            ProtocolError::Contention { .. } => "Contention",
            ProtocolError::InvalidParams(_) => "InvalidParams",
            ProtocolError::Storage(_) => "Storage",
        }
    }

    /// Errors that say when a different operation becomes valid, rather than
    /// that the input is wrong.
    pub fn is_time_window(&self) -> bool {
        matches!(
            self,
            ProtocolError::DeadlinePassed { .. }
                | ProtocolError::VotingDeadlinePassed { .. }
                | ProtocolError::VotingStillActive { .. }
        )
    }
}
