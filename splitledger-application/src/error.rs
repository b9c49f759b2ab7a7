use splitledger_domain::{
    ExpenseId, ExpenseValidationError, GroupId, ParticipantId, services::LedgerError,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("group {0} does not exist")]
    UnknownGroup(GroupId),
    #[error("group {group} lists participant {participant}, who is not in the participant list")]
    UnknownParticipant {
        group: GroupId,
        participant: ParticipantId,
    },
    #[error("expense {expense:?} is invalid: {source}")]
    InvalidExpense {
        expense: ExpenseId,
        #[source]
        source: ExpenseValidationError,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotLoadError {
    #[error("snapshot is unavailable: {0}")]
    Unavailable(String),
    #[error("snapshot is malformed: {0}")]
    Malformed(String),
}
