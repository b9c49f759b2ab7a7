use crate::{
    error::ReportError,
    model::{AllocationDelta, GroupReport, LedgerSnapshot, SnapshotChange},
    ports::SettlementOptimizer,
};
use chrono::{DateTime, Utc};
use splitledger_domain::{
    CurrencyContext, Expense, Group, GroupId, Participant, SettlementId, SettlementInstruction,
    net_balances,
    services::{BalanceAggregator, SettlementLedger, ToggleOutcome},
};

/// Runs the full ledger pipeline for one group of a snapshot.
///
/// Nothing is cached: every call starts again from the snapshot.
#[derive(Clone, Copy)]
pub struct LedgerProcessor<'a> {
    optimizer: &'a dyn SettlementOptimizer,
    context: CurrencyContext,
}

impl<'a> LedgerProcessor<'a> {
    pub fn new(optimizer: &'a dyn SettlementOptimizer, context: CurrencyContext) -> Self {
        Self { optimizer, context }
    }

    pub fn context(&self) -> CurrencyContext {
        self.context
    }

    pub fn report(
        &self,
        snapshot: &LedgerSnapshot,
        group_id: GroupId,
    ) -> Result<GroupReport, ReportError> {
        let group = snapshot
            .group(group_id)
            .ok_or(ReportError::UnknownGroup(group_id))?;
        let participants = Self::group_participants(snapshot, group)?;

        let expenses: Vec<&Expense> = snapshot.expenses_for(group_id).collect();
        for expense in &expenses {
            expense
                .validate(group)
                .map_err(|source| ReportError::InvalidExpense {
                    expense: expense.id,
                    source,
                })?;
        }
        let allocation_deltas = self.allocation_deltas(group_id, &expenses);

        let balances = BalanceAggregator::aggregate(&participants, expenses.iter().copied());
        let ledger = SettlementLedger::for_group(
            group_id,
            snapshot.settlements.iter().cloned(),
            self.context,
        )?;

        let nets = net_balances(&balances);
        let raw = self.optimizer.optimize(&nets, self.context);
        let recommendations = ledger.annotate(&raw);
        let residual = self
            .optimizer
            .optimize(&ledger.adjusted_net_balances(&nets), self.context);
        let adjusted = ledger.adjusted_balances(&balances);

        tracing::debug!(
            group_id = group_id.0,
            expense_count = expenses.len(),
            recorded = ledger.records().len(),
            recommended = raw.len(),
            residual = residual.len(),
            "Group report built"
        );

        Ok(GroupReport {
            group: group.clone(),
            summaries: BalanceAggregator::summarize(&participants, &balances),
            adjusted: BalanceAggregator::summarize(&participants, &adjusted),
            recommendations,
            residual,
            allocation_deltas,
        })
    }

    /// Reports every group in snapshot order, stopping at the first failure.
    pub fn report_all(&self, snapshot: &LedgerSnapshot) -> Result<Vec<GroupReport>, ReportError> {
        snapshot
            .groups
            .iter()
            .map(|group| self.report(snapshot, group.id))
            .collect()
    }

    /// Marks `instruction` as paid, or un-marks it when it already is.
    ///
    /// The snapshot's settlement collection is replaced as a whole, the same
    /// way a storage change notification would replace it.
    pub fn toggle_settlement(
        &self,
        snapshot: &mut LedgerSnapshot,
        group_id: GroupId,
        instruction: &SettlementInstruction,
        id: SettlementId,
        created_at: DateTime<Utc>,
    ) -> Result<ToggleOutcome, ReportError> {
        if snapshot.group(group_id).is_none() {
            return Err(ReportError::UnknownGroup(group_id));
        }

        let mut ledger = SettlementLedger::for_group(
            group_id,
            snapshot.settlements.iter().cloned(),
            self.context,
        )?;
        let outcome = ledger.toggle(instruction, id, created_at)?;

        let settlements = snapshot
            .settlements
            .iter()
            .filter(|record| record.group_id != group_id)
            .cloned()
            .chain(ledger.records().iter().cloned())
            .collect();
        snapshot.apply(SnapshotChange::Settlements(settlements));

        tracing::debug!(
            group_id = group_id.0,
            from = instruction.from.0,
            to = instruction.to.0,
            amount = %instruction.amount,
            recorded = matches!(outcome, ToggleOutcome::Recorded(_)),
            "Settlement toggled"
        );

        Ok(outcome)
    }

    fn group_participants(
        snapshot: &LedgerSnapshot,
        group: &Group,
    ) -> Result<Vec<Participant>, ReportError> {
        group
            .participants()
            .map(|id| {
                snapshot
                    .participants
                    .iter()
                    .find(|participant| participant.id == id)
                    .cloned()
                    .ok_or(ReportError::UnknownParticipant {
                        group: group.id,
                        participant: id,
                    })
            })
            .collect()
    }

    fn allocation_deltas(&self, group_id: GroupId, expenses: &[&Expense]) -> Vec<AllocationDelta> {
        let epsilon = self.context.epsilon();
        expenses
            .iter()
            .filter_map(|expense| {
                let allocated = expense.allocated();
                let remaining = expense.amount - allocated;
                if remaining.abs() < epsilon {
                    return None;
                }
                tracing::warn!(
                    group_id = group_id.0,
                    expense_id = expense.id.0,
                    allocated = %allocated,
                    remaining = %remaining,
                    "Expense splits do not add up to the expense amount"
                );
                Some(AllocationDelta {
                    expense: expense.id,
                    allocated,
                    remaining,
                })
            })
            .collect()
    }
}
