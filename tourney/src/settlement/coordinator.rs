//! Units of work: the atomicity boundary of every mutating operation.

use std::sync::Arc;

use crate::db::{Store, StoreResult, StoreTransaction};
use crate::ledger::BalanceLedger;
use crate::tournament::{ParticipationStore, TournamentRegistry};

/// Opens units of work against a shared store
#[derive(Clone)]
pub struct TransactionCoordinator {
    store: Arc<dyn Store>,
}

impl TransactionCoordinator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Open a unit of work.
    ///
    /// Waits for any locks the backend needs to take up front.
    pub async fn begin(&self) -> StoreResult<UnitOfWork> {
        let tx = self.store.begin().await?;
        Ok(UnitOfWork {
            tx,
            committed: false,
        })
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}

/// Scoped mutation context.
///
/// All ledger, tournament and participation access goes through one of the
/// accessors below. Effects become visible only through [`UnitOfWork::commit`];
/// dropping the unit on any other path (error, timeout, cancelled future)
/// discards them.
pub struct UnitOfWork {
    tx: Box<dyn StoreTransaction>,
    committed: bool,
}

impl UnitOfWork {
    pub fn ledger(&mut self) -> BalanceLedger<'_> {
        BalanceLedger::new(self.tx.as_mut())
    }

    pub fn tournaments(&mut self) -> TournamentRegistry<'_> {
        TournamentRegistry::new(self.tx.as_mut())
    }

    pub fn participations(&mut self) -> ParticipationStore<'_> {
        ParticipationStore::new(self.tx.as_mut())
    }

    /// Publish every effect of this unit.
    pub async fn commit(mut self) -> StoreResult<()> {
        self.tx.commit().await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.committed {
            log::debug!("Unit of work dropped without commit, rolling back");
        }
    }
}
