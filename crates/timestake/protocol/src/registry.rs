//! Protocol bootstrap, native value and the reward pool.

use timestake_types::{Account, Amount, DomainEvent, GlobalRegistry, Principal, RecordKey};
use tracing::info;

use crate::engine::ProtocolEngine;
use crate::error::{ProtocolError, ProtocolResult};

impl ProtocolEngine {
    /// Create the registry singleton. `caller` becomes the authority.
    pub async fn initialize(&self, caller: Principal) -> ProtocolResult<GlobalRegistry> {
        let mut attempts = 0;
        loop {
            let mut txn = self.begin();
            if txn
                .load::<GlobalRegistry>(&RecordKey::registry())
                .await?
                .is_some()
            {
                return Err(ProtocolError::AlreadyInitialized);
            }

            let registry = GlobalRegistry {
                authority: caller,
                total_goals: 0,
                total_judges: 0,
                min_judge_stake: self.params.min_judge_stake,
                judge_reward_rate_bps: self.params.judge_reward_rate_bps,
                reward_pool: 0,
                initialized_at: txn.now(),
            };
            txn.put(registry.clone());
            txn.emit(DomainEvent::ProtocolInitialized {
                authority: caller,
                min_judge_stake: registry.min_judge_stake,
                judge_reward_rate_bps: registry.judge_reward_rate_bps,
            });

            if self.try_commit("initialize", txn, &mut attempts).await?.is_some() {
                info!(authority = %caller.short_id(), "Protocol initialized");
                return Ok(registry);
            }
        }
    }

    /// Credit native value to an account.
    ///
    /// This is the ledger's only mint; everything else moves value between
    /// accounts, escrows, judge stakes and the reward pool.
    pub async fn deposit(&self, owner: Principal, amount: Amount) -> ProtocolResult<Account> {
        if amount == 0 {
            return Err(ProtocolError::InvalidAmount("deposit must be positive"));
        }

        let mut attempts = 0;
        loop {
            let mut txn = self.begin();
            let account = txn.credit(owner, amount).await?;
            txn.emit(DomainEvent::Deposited {
                owner,
                amount,
                balance: account.balance,
            });

            if self.try_commit("deposit", txn, &mut attempts).await?.is_some() {
                info!(owner = %owner.short_id(), amount, balance = account.balance, "Deposited");
                return Ok(account);
            }
        }
    }

    /// Move value from `caller`'s account into the reward pool.
    pub async fn fund_reward_pool(
        &self,
        caller: Principal,
        amount: Amount,
    ) -> ProtocolResult<GlobalRegistry> {
        if amount == 0 {
            return Err(ProtocolError::InvalidAmount("funding must be positive"));
        }

        let mut attempts = 0;
        loop {
            let mut txn = self.begin();
            let mut registry = txn.registry().await?;
            txn.debit(caller, amount).await?;
            registry.reward_pool = registry
                .reward_pool
                .checked_add(amount)
                .ok_or(ProtocolError::ArithmeticOverflow("reward pool"))?;
            txn.put(registry.clone());
            txn.emit(DomainEvent::RewardPoolFunded {
                funder: caller,
                amount,
                reward_pool: registry.reward_pool,
            });

            if self
                .try_commit("fund_reward_pool", txn, &mut attempts)
                .await?
                .is_some()
            {
                info!(
                    funder = %caller.short_id(),
                    amount,
                    reward_pool = registry.reward_pool,
                    "Reward pool funded"
                );
                return Ok(registry);
            }
        }
    }
}
