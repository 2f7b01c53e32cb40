use std::sync::Arc;

use timestake_storage::{CommitReceipt, InMemoryLedgerStore, JournalEntry, LedgerStore};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::{ProtocolError, ProtocolResult};
use crate::params::{EngineSettings, ProtocolParams};
use crate::txn::Transaction;

/// The Timestake protocol engine.
///
/// Every mutating operation reads the records it depends on, validates,
/// and commits its writes and events as one atomic batch. Commits that lose
/// a race are retried from scratch, so preconditions are always re-checked
/// against the winner's state.
#[derive(Clone)]
pub struct ProtocolEngine {
    pub(crate) store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    pub(crate) params: ProtocolParams,
    settings: EngineSettings,
    events: broadcast::Sender<JournalEntry>,
}

impl ProtocolEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        params: ProtocolParams,
        settings: EngineSettings,
    ) -> ProtocolResult<Self> {
        params.validate()?;
        settings.validate()?;
        let (events, _) = broadcast::channel(settings.event_channel_capacity);
        Ok(Self {
            store,
            clock,
            params,
            settings,
            events,
        })
    }

    /// Engine over a fresh in-memory store with default settings.
    pub fn in_memory(clock: Arc<dyn Clock>, params: ProtocolParams) -> ProtocolResult<Self> {
        Self::new(
            Arc::new(InMemoryLedgerStore::new()),
            clock,
            params,
            EngineSettings::default(),
        )
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Live feed of journal entries committed through this engine.
    ///
    /// Slow receivers may lag; the journal itself is the durable record and
    /// can be replayed with [`ProtocolEngine::events_since`].
    pub fn subscribe(&self) -> broadcast::Receiver<JournalEntry> {
        self.events.subscribe()
    }

    pub(crate) fn begin(&self) -> Transaction<'_> {
        Transaction::new(self.store.as_ref(), self.clock.now())
    }

    /// Commit one attempt.
    ///
    /// `Ok(None)` means the attempt lost a race and the caller should
    /// re-run the operation from its reads.
    pub(crate) async fn try_commit(
        &self,
        operation: &'static str,
        txn: Transaction<'_>,
        attempts: &mut u32,
    ) -> ProtocolResult<Option<CommitReceipt>> {
        *attempts += 1;
        match self.store.commit(txn.into_batch()).await {
            Ok(receipt) => {
                for entry in &receipt.journal {
                    // No subscribers is not an error.
                    let _ = self.events.send(entry.clone());
                }
                debug!(
                    operation,
                    attempts = *attempts,
                    events = receipt.journal.len(),
                    "Operation committed"
                );
                Ok(Some(receipt))
            }
            Err(err) if err.is_retryable() => {
                if *attempts >= self.settings.max_commit_attempts {
                    warn!(operation, attempts = *attempts, error = %err, "Giving up on contended commit");
                    return Err(ProtocolError::Contention {
                        operation,
                        attempts: *attempts,
                    });
                }
                debug!(operation, attempts = *attempts, error = %err, "Commit lost a race, retrying");
                tokio::task::yield_now().await;
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::params::ParamsError;

    #[test]
    fn rejects_invalid_params() {
        let params = ProtocolParams {
            min_goal_stake: 0,
            ..ProtocolParams::default()
        };
        let err = ProtocolEngine::in_memory(Arc::new(SystemClock), params)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ProtocolError::InvalidParams(ParamsError::Invalid {
                field: "min_goal_stake",
                ..
            })
        ));
    }

    #[test]
    fn rejects_invalid_settings() {
        let settings = EngineSettings {
            event_channel_capacity: 0,
            ..EngineSettings::default()
        };
        let result = ProtocolEngine::new(
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(SystemClock),
            ProtocolParams::default(),
            settings,
        );
        assert!(result.is_err());
    }
}
