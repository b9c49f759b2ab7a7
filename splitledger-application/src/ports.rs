use crate::{error::SnapshotLoadError, model::LedgerSnapshot};
use splitledger_domain::{CurrencyContext, NetBalances, SettlementInstruction};

/// Supplies one consistent snapshot of every input collection.
///
/// Durability and synchronisation belong to the implementor; the pipeline only
/// ever sees whole snapshots.
pub trait SnapshotSource: Send + Sync {
    fn load(&self) -> Result<LedgerSnapshot, SnapshotLoadError>;
}

pub trait SettlementOptimizer: Send + Sync {
    /// Turns net balances into transfer instructions. Must be deterministic for
    /// a given input order.
    fn optimize(
        &self,
        balances: &NetBalances,
        context: CurrencyContext,
    ) -> Vec<SettlementInstruction>;
}
