use crate::{
    model::{
        CurrencyContext, GroupId, Money, NetBalances, ParticipantBalances, ParticipantId,
        SettlementId, SettlementInstruction, SettlementRecord,
    },
    services::SettlementResolver,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("settlement amount must be positive (found {0})")]
    NonPositiveAmount(Money),
    #[error("settlement payer and payee are both {0}")]
    SelfSettlement(ParticipantId),
    #[error("settlement belongs to group {found}, ledger tracks group {expected}")]
    GroupMismatch { expected: GroupId, found: GroupId },
    #[error("settlement {0:?} is already recorded")]
    DuplicateId(SettlementId),
    #[error("no recorded settlement matches {from} -> {to} ({amount})")]
    NotRecorded {
        from: ParticipantId,
        to: ParticipantId,
        amount: Money,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettlementStatus {
    Pending,
    Settled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnnotatedInstruction {
    pub instruction: SettlementInstruction,
    pub status: SettlementStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    Recorded(SettlementRecord),
    Removed(SettlementRecord),
}

/// Recorded real-world settlements of one group.
///
/// Recorded payments are folded into balances before resolving, so a payment
/// that already happened is never recommended again.
#[derive(Clone, Debug)]
pub struct SettlementLedger {
    group_id: GroupId,
    records: Vec<SettlementRecord>,
    context: CurrencyContext,
}

impl SettlementLedger {
    /// Keeps only the records that belong to `group_id`, checking each of
    /// them the same way [`SettlementLedger::record`] does.
    pub fn for_group<I>(
        group_id: GroupId,
        records: I,
        context: CurrencyContext,
    ) -> Result<Self, LedgerError>
    where
        I: IntoIterator<Item = SettlementRecord>,
    {
        let mut ledger = Self {
            group_id,
            records: Vec::new(),
            context,
        };
        let mut skipped = 0usize;
        for record in records {
            if record.group_id != group_id {
                skipped += 1;
                continue;
            }
            ledger.check(&record)?;
            ledger.records.push(record);
        }

        tracing::debug!(
            group_id = group_id.0,
            record_count = ledger.records.len(),
            skipped,
            "Settlement ledger loaded"
        );

        Ok(ledger)
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn records(&self) -> &[SettlementRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Balances as they stand after the recorded payments.
    pub fn adjusted_balances(&self, balances: &ParticipantBalances) -> ParticipantBalances {
        for record in &self.records {
            self.warn_if_unknown(record, |id| balances.contains_key(&id));
        }
        fold_into_balances(balances, &self.records)
    }

    pub fn adjusted_net_balances(&self, balances: &NetBalances) -> NetBalances {
        for record in &self.records {
            self.warn_if_unknown(record, |id| balances.contains_key(&id));
        }
        fold_into_net_balances(balances, &self.records)
    }

    /// Recommendations for what is still outstanding after recorded payments.
    pub fn resolve_net_of_recorded(&self, balances: &NetBalances) -> Vec<SettlementInstruction> {
        SettlementResolver::new(self.context).resolve(&self.adjusted_net_balances(balances))
    }

    pub fn is_recorded(&self, from: ParticipantId, to: ParticipantId, amount: Money) -> bool {
        self.position(from, to, amount).is_some()
    }

    /// The record matching the pair whose amount is closest to `amount`.
    pub fn find_recorded(
        &self,
        from: ParticipantId,
        to: ParticipantId,
        amount: Money,
    ) -> Option<&SettlementRecord> {
        self.position(from, to, amount).map(|idx| &self.records[idx])
    }

    pub fn annotate(&self, instructions: &[SettlementInstruction]) -> Vec<AnnotatedInstruction> {
        instructions
            .iter()
            .map(|instruction| AnnotatedInstruction {
                instruction: *instruction,
                status: if self.is_recorded(instruction.from, instruction.to, instruction.amount)
                {
                    SettlementStatus::Settled
                } else {
                    SettlementStatus::Pending
                },
            })
            .collect()
    }

    pub fn record(&mut self, record: SettlementRecord) -> Result<(), LedgerError> {
        self.check(&record)?;

        tracing::debug!(
            group_id = self.group_id.0,
            settlement_id = record.id.0,
            from = record.from.0,
            to = record.to.0,
            amount = %record.amount,
            "Settlement recorded"
        );
        self.records.push(record);
        Ok(())
    }

    /// Removes exactly the record that matches, never another one between the same pair.
    pub fn unrecord(
        &mut self,
        from: ParticipantId,
        to: ParticipantId,
        amount: Money,
    ) -> Result<SettlementRecord, LedgerError> {
        let idx = self
            .position(from, to, amount)
            .ok_or(LedgerError::NotRecorded { from, to, amount })?;
        let removed = self.records.remove(idx);

        tracing::debug!(
            group_id = self.group_id.0,
            settlement_id = removed.id.0,
            "Settlement unrecorded"
        );
        Ok(removed)
    }

    /// Flips an instruction between pending and settled.
    pub fn toggle(
        &mut self,
        instruction: &SettlementInstruction,
        id: SettlementId,
        created_at: DateTime<Utc>,
    ) -> Result<ToggleOutcome, LedgerError> {
        if self.is_recorded(instruction.from, instruction.to, instruction.amount) {
            return self
                .unrecord(instruction.from, instruction.to, instruction.amount)
                .map(ToggleOutcome::Removed);
        }

        let record = SettlementRecord {
            id,
            group_id: self.group_id,
            from: instruction.from,
            to: instruction.to,
            amount: instruction.amount,
            created_at,
        };
        self.record(record.clone())?;
        Ok(ToggleOutcome::Recorded(record))
    }

    fn check(&self, record: &SettlementRecord) -> Result<(), LedgerError> {
        if record.group_id != self.group_id {
            return Err(LedgerError::GroupMismatch {
                expected: self.group_id,
                found: record.group_id,
            });
        }
        if !record.amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount(record.amount));
        }
        if record.from == record.to {
            return Err(LedgerError::SelfSettlement(record.from));
        }
        if self.records.iter().any(|existing| existing.id == record.id) {
            return Err(LedgerError::DuplicateId(record.id));
        }
        Ok(())
    }

    fn position(&self, from: ParticipantId, to: ParticipantId, amount: Money) -> Option<usize> {
        matching_position(&self.records, from, to, amount, self.context.epsilon())
    }

    fn warn_if_unknown<F>(&self, record: &SettlementRecord, known: F)
    where
        F: Fn(ParticipantId) -> bool,
    {
        for id in [record.from, record.to] {
            if !known(id) {
                tracing::warn!(
                    group_id = self.group_id.0,
                    settlement_id = record.id.0,
                    participant = id.0,
                    "Recorded settlement references a participant without a balance"
                );
            }
        }
    }
}

fn fold_into_balances<'r, I>(
    balances: &ParticipantBalances,
    records: I,
) -> ParticipantBalances
where
    I: IntoIterator<Item = &'r SettlementRecord>,
{
    let mut adjusted = balances.clone();
    for record in records {
        adjusted.entry(record.from).or_default().settled += record.amount;
        adjusted.entry(record.to).or_default().settled -= record.amount;
    }
    adjusted
}

fn fold_into_net_balances<'r, I>(balances: &NetBalances, records: I) -> NetBalances
where
    I: IntoIterator<Item = &'r SettlementRecord>,
{
    let mut adjusted = balances.clone();
    for record in records {
        *adjusted.entry(record.from).or_default() += record.amount;
        *adjusted.entry(record.to).or_default() -= record.amount;
    }
    adjusted
}

/// Index of the record between `from` and `to` whose amount is within
/// `epsilon` of `amount`; the closest amount wins, then the earliest record.
pub(crate) fn matching_position<'r, I>(
    records: I,
    from: ParticipantId,
    to: ParticipantId,
    amount: Money,
    epsilon: Money,
) -> Option<usize>
where
    I: IntoIterator<Item = &'r SettlementRecord>,
{
    records
        .into_iter()
        .enumerate()
        .filter(|(_, record)| {
            record.from == from && record.to == to && record.amount.is_within(amount, epsilon)
        })
        .min_by_key(|(_, record)| (record.amount - amount).abs())
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Balance;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    const GROUP: GroupId = GroupId(7);
    const A: ParticipantId = ParticipantId(1);
    const B: ParticipantId = ParticipantId(2);
    const C: ParticipantId = ParticipantId(3);

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0)
            .single()
            .expect("valid timestamp")
    }

    fn record(id: u64, from: ParticipantId, to: ParticipantId, amount: Money) -> SettlementRecord {
        SettlementRecord {
            id: SettlementId(id),
            group_id: GROUP,
            from,
            to,
            amount,
            created_at: at(id as u32),
        }
    }

    fn instruction(from: ParticipantId, to: ParticipantId, amount: i64) -> SettlementInstruction {
        SettlementInstruction {
            from,
            to,
            amount: Money::from_i64(amount),
        }
    }

    #[fixture]
    fn raw_balances() -> NetBalances {
        NetBalances::from_iter([
            (A, Money::from_i64(-80)),
            (B, Money::from_i64(30)),
            (C, Money::from_i64(50)),
        ])
    }

    #[fixture]
    fn empty_ledger() -> SettlementLedger {
        SettlementLedger::for_group(GROUP, [], CurrencyContext::cents()).expect("no records")
    }

    #[rstest]
    fn empty_ledger_leaves_balances_untouched(
        empty_ledger: SettlementLedger,
        raw_balances: NetBalances,
    ) {
        assert_eq!(empty_ledger.adjusted_net_balances(&raw_balances), raw_balances);
        assert_eq!(
            empty_ledger.resolve_net_of_recorded(&raw_balances),
            SettlementResolver::new(CurrencyContext::cents()).resolve(&raw_balances)
        );
    }

    #[rstest]
    #[case::fully_recorded(Money::from_i64(50), vec![instruction(A, B, 30)])]
    #[case::partially_recorded(
        Money::from_i64(20),
        vec![instruction(A, B, 30), instruction(A, C, 30)]
    )]
    fn recorded_payments_are_not_recommended_again(
        raw_balances: NetBalances,
        #[case] recorded: Money,
        #[case] expected: Vec<SettlementInstruction>,
    ) {
        let ledger = SettlementLedger::for_group(
            GROUP,
            [record(1, A, C, recorded)],
            CurrencyContext::cents(),
        )
        .expect("records are valid");

        assert_eq!(ledger.resolve_net_of_recorded(&raw_balances), expected);
    }

    #[test]
    fn adjusted_balances_fold_settlements_into_net() {
        let balances = ParticipantBalances::from_iter([
            (
                A,
                Balance {
                    paid: Money::ZERO,
                    owed: Money::from_i64(50),
                    settled: Money::ZERO,
                },
            ),
            (
                B,
                Balance {
                    paid: Money::from_i64(50),
                    owed: Money::ZERO,
                    settled: Money::ZERO,
                },
            ),
        ]);
        let ledger = SettlementLedger::for_group(
            GROUP,
            [record(1, A, B, Money::from_i64(20))],
            CurrencyContext::cents(),
        )
        .expect("records are valid");

        let adjusted = ledger.adjusted_balances(&balances);
        assert_eq!(adjusted[&A].net(), Money::from_i64(-30));
        assert_eq!(adjusted[&B].net(), Money::from_i64(30));
        assert_eq!(adjusted[&A].paid, Money::ZERO);
        assert_eq!(adjusted[&A].settled, Money::from_i64(20));
    }

    #[test]
    fn for_group_drops_foreign_records() {
        let mut foreign = record(2, A, B, Money::from_i64(10));
        foreign.group_id = GroupId(99);

        let ledger = SettlementLedger::for_group(
            GROUP,
            [record(1, A, B, Money::from_i64(5)), foreign],
            CurrencyContext::cents(),
        )
        .expect("records are valid");

        assert_eq!(ledger.records().len(), 1);
        assert!(!ledger.is_recorded(A, B, Money::from_i64(10)));
    }

    #[rstest]
    #[case::exact(A, B, Money::from_i64(50), true)]
    #[case::within_epsilon(A, B, Money::new(50_004, 3), true)]
    #[case::one_cent_off(A, B, Money::new(5_001, 2), false)]
    #[case::reversed_pair(B, A, Money::from_i64(50), false)]
    fn is_recorded_matches_pair_and_amount(
        #[case] from: ParticipantId,
        #[case] to: ParticipantId,
        #[case] amount: Money,
        #[case] expected: bool,
    ) {
        let ledger = SettlementLedger::for_group(
            GROUP,
            [record(1, A, B, Money::from_i64(50))],
            CurrencyContext::cents(),
        )
        .expect("records are valid");
        assert_eq!(ledger.is_recorded(from, to, amount), expected);
    }

    #[rstest]
    fn toggle_round_trips_without_duplicates(mut empty_ledger: SettlementLedger) {
        let pending = instruction(A, B, 30);

        let first = empty_ledger
            .toggle(&pending, SettlementId(1), at(1))
            .expect("record should succeed");
        assert!(matches!(first, ToggleOutcome::Recorded(_)));
        assert!(empty_ledger.is_recorded(A, B, Money::from_i64(30)));

        let second = empty_ledger
            .toggle(&pending, SettlementId(2), at(2))
            .expect("unrecord should succeed");
        assert_eq!(
            second,
            ToggleOutcome::Removed(record(1, A, B, Money::from_i64(30)))
        );
        assert!(empty_ledger.is_empty());
    }

    #[test]
    fn toggle_off_removes_only_the_matching_record() {
        let mut ledger = SettlementLedger::for_group(
            GROUP,
            [
                record(1, A, B, Money::from_i64(10)),
                record(2, A, B, Money::from_i64(30)),
                record(3, A, C, Money::from_i64(30)),
            ],
            CurrencyContext::cents(),
        )
        .expect("records are valid");

        let outcome = ledger
            .toggle(&instruction(A, B, 30), SettlementId(4), at(4))
            .expect("unrecord should succeed");

        assert_eq!(
            outcome,
            ToggleOutcome::Removed(record(2, A, B, Money::from_i64(30)))
        );
        let remaining: Vec<u64> = ledger.records().iter().map(|r| r.id.0).collect();
        assert_eq!(remaining, vec![1, 3]);
    }

    #[rstest]
    fn annotate_marks_settled_recommendations(raw_balances: NetBalances) {
        let raw = SettlementResolver::new(CurrencyContext::cents()).resolve(&raw_balances);
        let ledger = SettlementLedger::for_group(
            GROUP,
            [record(1, A, C, Money::from_i64(50))],
            CurrencyContext::cents(),
        )
        .expect("records are valid");

        let annotated = ledger.annotate(&raw);
        assert_eq!(
            annotated,
            vec![
                AnnotatedInstruction {
                    instruction: instruction(A, C, 50),
                    status: SettlementStatus::Settled,
                },
                AnnotatedInstruction {
                    instruction: instruction(A, B, 30),
                    status: SettlementStatus::Pending,
                },
            ]
        );
    }

    #[rstest]
    #[case::non_positive(
        record(5, A, B, Money::ZERO),
        LedgerError::NonPositiveAmount(Money::ZERO)
    )]
    #[case::self_settlement(
        record(5, A, A, Money::from_i64(5)),
        LedgerError::SelfSettlement(A)
    )]
    #[case::duplicate_id(
        record(1, B, C, Money::from_i64(5)),
        LedgerError::DuplicateId(SettlementId(1))
    )]
    #[case::foreign_group(
        SettlementRecord { group_id: GroupId(8), ..record(6, A, B, Money::from_i64(5)) },
        LedgerError::GroupMismatch { expected: GROUP, found: GroupId(8) }
    )]
    fn record_rejects_invalid_settlements(
        #[case] candidate: SettlementRecord,
        #[case] expected: LedgerError,
    ) {
        let mut ledger = SettlementLedger::for_group(
            GROUP,
            [record(1, A, B, Money::from_i64(50))],
            CurrencyContext::cents(),
        )
        .expect("records are valid");
        assert_eq!(ledger.record(candidate), Err(expected));
        assert_eq!(ledger.records().len(), 1);
    }

    #[rstest]
    #[case::negative_amount(
        vec![record(1, B, A, Money::from_i64(-50))],
        LedgerError::NonPositiveAmount(Money::from_i64(-50))
    )]
    #[case::self_settlement(
        vec![record(1, C, C, Money::from_i64(5))],
        LedgerError::SelfSettlement(C)
    )]
    #[case::duplicate_id(
        vec![record(1, A, B, Money::from_i64(5)), record(1, A, C, Money::from_i64(5))],
        LedgerError::DuplicateId(SettlementId(1))
    )]
    fn for_group_rejects_invalid_loaded_records(
        #[case] records: Vec<SettlementRecord>,
        #[case] expected: LedgerError,
    ) {
        let loaded = SettlementLedger::for_group(GROUP, records, CurrencyContext::cents());
        assert_eq!(loaded.map(|ledger| ledger.records().len()), Err(expected));
    }

    #[test]
    fn for_group_ignores_invalid_records_of_other_groups() {
        let mut foreign = record(2, A, A, Money::ZERO);
        foreign.group_id = GroupId(99);

        let ledger = SettlementLedger::for_group(
            GROUP,
            [foreign, record(1, A, B, Money::from_i64(5))],
            CurrencyContext::cents(),
        )
        .expect("foreign records are not checked");
        assert_eq!(ledger.records().len(), 1);
    }

    #[rstest]
    fn unrecord_without_match_fails(mut empty_ledger: SettlementLedger) {
        assert_eq!(
            empty_ledger.unrecord(A, B, Money::from_i64(1)),
            Err(LedgerError::NotRecorded {
                from: A,
                to: B,
                amount: Money::from_i64(1),
            })
        );
    }
}
