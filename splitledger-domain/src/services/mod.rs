pub mod balance_aggregator;
pub mod settlement_ledger;
pub mod settlement_resolver;
pub mod split_calculator;

pub use balance_aggregator::{BalanceAggregator, ParticipantSummary};
pub use settlement_ledger::{
    AnnotatedInstruction, LedgerError, SettlementLedger, SettlementStatus, ToggleOutcome,
};
pub use settlement_resolver::SettlementResolver;
pub use split_calculator::{
    ManualOverrides, PercentageAllocation, PercentageShare, SplitCalculator, SplitError,
    SplitOutcome,
};
