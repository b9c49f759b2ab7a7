//! The ledger pipeline as plain functions over in-memory data.
//!
//! Every function is pure: callers re-run the whole chain
//! (splits → balances → settlements → recorded adjustments) whenever any input
//! collection changes instead of patching earlier results.
//!
//! Functions taking recorded settlements only look at the records of
//! `group_id`; records of other groups are ignored.

use crate::{
    model::{
        CurrencyContext, Expense, GroupId, Money, Participant, ParticipantBalances,
        ParticipantId, SettlementInstruction, SettlementRecord, Split, SplitType, net_balances,
    },
    services::{
        BalanceAggregator, LedgerError, ManualOverrides, SettlementLedger, SettlementResolver,
        SplitCalculator, SplitError, settlement_ledger::matching_position,
    },
};

pub fn compute_splits(
    total: Money,
    split_type: SplitType,
    participant_ids: &[ParticipantId],
    overrides: &ManualOverrides,
    context: CurrencyContext,
) -> Result<Vec<Split>, SplitError> {
    SplitCalculator::new(context)
        .compute(total, split_type, participant_ids, overrides)
        .map(|outcome| outcome.into_splits())
}

pub fn compute_balances(participants: &[Participant], expenses: &[Expense]) -> ParticipantBalances {
    BalanceAggregator::aggregate(participants, expenses)
}

pub fn resolve_settlements(
    balances: &ParticipantBalances,
    context: CurrencyContext,
) -> Vec<SettlementInstruction> {
    SettlementResolver::new(context).resolve(&net_balances(balances))
}

pub fn resolve_settlements_net_of_recorded(
    balances: &ParticipantBalances,
    records: &[SettlementRecord],
    group_id: GroupId,
    context: CurrencyContext,
) -> Result<Vec<SettlementInstruction>, LedgerError> {
    let ledger = SettlementLedger::for_group(group_id, records.iter().cloned(), context)?;
    Ok(ledger.resolve_net_of_recorded(&net_balances(balances)))
}

pub fn adjusted_balances(
    balances: &ParticipantBalances,
    records: &[SettlementRecord],
    group_id: GroupId,
    context: CurrencyContext,
) -> Result<ParticipantBalances, LedgerError> {
    let ledger = SettlementLedger::for_group(group_id, records.iter().cloned(), context)?;
    Ok(ledger.adjusted_balances(balances))
}

pub fn is_settlement_recorded(
    records: &[SettlementRecord],
    group_id: GroupId,
    from: ParticipantId,
    to: ParticipantId,
    amount: Money,
    context: CurrencyContext,
) -> bool {
    let in_group = records.iter().filter(|record| record.group_id == group_id);
    matching_position(in_group, from, to, amount, context.epsilon()).is_some()
}
