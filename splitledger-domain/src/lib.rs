#![warn(clippy::uninlined_format_args)]

pub mod model;
pub mod operations;
pub mod services;

pub use model::{
    AtomicUnitConversionError, Balance, CurrencyContext, CurrencyError, Expense, ExpenseId,
    ExpenseValidationError, Group, GroupId, Money, NetBalances, Participant, ParticipantBalances,
    ParticipantId, RemainderPolicy, SettlementId, SettlementInstruction, SettlementRecord, Split,
    SplitType, net_balances,
};
pub use operations::{
    adjusted_balances, compute_balances, compute_splits, is_settlement_recorded,
    resolve_settlements, resolve_settlements_net_of_recorded,
};
pub use services::{
    BalanceAggregator, SettlementLedger, SettlementResolver, SplitCalculator, SplitError,
};
