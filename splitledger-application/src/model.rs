use serde::{Deserialize, Serialize};
use splitledger_domain::{
    Expense, ExpenseId, Group, GroupId, Money, Participant, SettlementInstruction,
    SettlementRecord,
    services::{AnnotatedInstruction, ParticipantSummary, SettlementStatus},
};

/// Every input collection the pipeline reads, as one consistent view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub settlements: Vec<SettlementRecord>,
}

/// A change notification from the storage layer. Each variant carries the
/// complete new contents of one collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotChange {
    Participants(Vec<Participant>),
    Groups(Vec<Group>),
    Expenses(Vec<Expense>),
    Settlements(Vec<SettlementRecord>),
}

impl LedgerSnapshot {
    pub fn apply(&mut self, change: SnapshotChange) {
        match change {
            SnapshotChange::Participants(participants) => self.participants = participants,
            SnapshotChange::Groups(groups) => self.groups = groups,
            SnapshotChange::Expenses(expenses) => self.expenses = expenses,
            SnapshotChange::Settlements(settlements) => self.settlements = settlements,
        }
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|group| group.id == id)
    }

    pub fn expenses_for(&self, id: GroupId) -> impl Iterator<Item = &Expense> + '_ {
        self.expenses
            .iter()
            .filter(move |expense| expense.group_id == id)
    }
}

/// An expense whose splits do not add up to its amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocationDelta {
    pub expense: ExpenseId,
    pub allocated: Money,
    pub remaining: Money,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupReport {
    pub group: Group,
    /// Balances derived from expenses alone.
    pub summaries: Vec<ParticipantSummary>,
    /// Balances after recorded settlements are folded in.
    pub adjusted: Vec<ParticipantSummary>,
    /// Raw recommendations, each marked pending or already recorded.
    pub recommendations: Vec<AnnotatedInstruction>,
    /// What is still left to pay once recorded settlements are netted out.
    pub residual: Vec<SettlementInstruction>,
    pub allocation_deltas: Vec<AllocationDelta>,
}

impl GroupReport {
    pub fn is_settled(&self) -> bool {
        self.residual.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &SettlementInstruction> + '_ {
        self.recommendations
            .iter()
            .filter(|annotated| annotated.status == SettlementStatus::Pending)
            .map(|annotated| &annotated.instruction)
    }
}
