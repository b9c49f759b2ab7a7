use crate::model::{CurrencyContext, Money, ParticipantId, RemainderPolicy, Split, SplitType};
use fxhash::FxHashSet;
use indexmap::IndexMap;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Decimal places kept for automatically distributed percentages.
const PERCENTAGE_SCALE: u32 = 2;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("total amount must not be negative (found {0})")]
    NegativeAmount(Money),
    #[error("amount {0} is finer than the currency unit")]
    SubUnitPrecision(Money),
    #[error("participant {0} is listed more than once")]
    DuplicateParticipant(ParticipantId),
    #[error("participant {0} is not part of this split")]
    UnknownParticipant(ParticipantId),
    #[error("split participants must include the owner")]
    OwnerNotIncluded,
    #[error("share for {participant} must not be negative (found {amount})")]
    NegativeShare {
        participant: ParticipantId,
        amount: Money,
    },
    #[error("percentage for {participant} must not be negative (found {percentage})")]
    NegativePercentage {
        participant: ParticipantId,
        percentage: Decimal,
    },
}

/// Percentage of one participant, tagged with where the value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PercentageShare {
    Manual(Decimal),
    Auto(Decimal),
}

impl PercentageShare {
    pub fn value(self) -> Decimal {
        match self {
            Self::Manual(value) | Self::Auto(value) => value,
        }
    }

    pub fn is_manual(self) -> bool {
        matches!(self, Self::Manual(_))
    }
}

/// Editable percentage split state.
///
/// Every mutation re-distributes `100 - Σ manual` evenly across the `Auto`
/// entries, so absent over-allocation the shares always sum to exactly 100.
/// A manual entry only reverts to auto through [`Self::clear_manual`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PercentageAllocation {
    shares: IndexMap<ParticipantId, PercentageShare>,
}

impl PercentageAllocation {
    pub fn new<I>(participants: I) -> Self
    where
        I: IntoIterator<Item = ParticipantId>,
    {
        let mut allocation = Self {
            shares: participants
                .into_iter()
                .map(|id| (id, PercentageShare::Auto(Decimal::ZERO)))
                .collect(),
        };
        allocation.rebalance();
        allocation
    }

    pub fn with_manual<I, M>(participants: I, manual: M) -> Result<Self, SplitError>
    where
        I: IntoIterator<Item = ParticipantId>,
        M: IntoIterator<Item = (ParticipantId, Decimal)>,
    {
        let mut allocation = Self::new(participants);
        for (participant, percentage) in manual {
            allocation.set_manual(participant, percentage)?;
        }
        Ok(allocation)
    }

    pub fn set_manual(
        &mut self,
        participant: ParticipantId,
        percentage: Decimal,
    ) -> Result<(), SplitError> {
        if percentage < Decimal::ZERO {
            return Err(SplitError::NegativePercentage {
                participant,
                percentage,
            });
        }
        let share = self
            .shares
            .get_mut(&participant)
            .ok_or(SplitError::UnknownParticipant(participant))?;
        *share = PercentageShare::Manual(percentage);
        self.rebalance();
        Ok(())
    }

    pub fn clear_manual(&mut self, participant: ParticipantId) -> Result<(), SplitError> {
        let share = self
            .shares
            .get_mut(&participant)
            .ok_or(SplitError::UnknownParticipant(participant))?;
        *share = PercentageShare::Auto(Decimal::ZERO);
        self.rebalance();
        Ok(())
    }

    pub fn add_participant(&mut self, participant: ParticipantId) {
        self.shares
            .entry(participant)
            .or_insert(PercentageShare::Auto(Decimal::ZERO));
        self.rebalance();
    }

    pub fn remove_participant(&mut self, participant: ParticipantId) {
        self.shares.shift_remove(&participant);
        self.rebalance();
    }

    pub fn get(&self, participant: ParticipantId) -> Option<PercentageShare> {
        self.shares.get(&participant).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParticipantId, PercentageShare)> + '_ {
        self.shares.iter().map(|(id, share)| (*id, *share))
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn total(&self) -> Decimal {
        self.shares.values().map(|share| share.value()).sum()
    }

    /// Negative when manual entries exceed 100 %.
    pub fn remaining(&self) -> Decimal {
        Decimal::ONE_HUNDRED - self.total()
    }

    fn rebalance(&mut self) {
        let manual_total: Decimal = self
            .shares
            .values()
            .filter(|share| share.is_manual())
            .map(|share| share.value())
            .sum();
        let auto_count = self.shares.values().filter(|s| !s.is_manual()).count();
        if auto_count == 0 {
            return;
        }

        let remainder = (Decimal::ONE_HUNDRED - manual_total).max(Decimal::ZERO);
        let count = Decimal::from(auto_count);
        let base =
            (remainder / count).round_dp_with_strategy(PERCENTAGE_SCALE, RoundingStrategy::ToZero);
        let leftover = remainder - base * count;

        let mut first = true;
        for share in self.shares.values_mut() {
            if share.is_manual() {
                continue;
            }
            let value = if first { base + leftover } else { base };
            *share = PercentageShare::Auto(value.normalize());
            first = false;
        }
    }
}

/// Caller-supplied values for `Unequal` amounts and manual percentages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManualOverrides {
    amounts: IndexMap<ParticipantId, Money>,
    percentages: IndexMap<ParticipantId, Decimal>,
}

impl ManualOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_amount(mut self, participant: ParticipantId, amount: Money) -> Self {
        self.amounts.insert(participant, amount);
        self
    }

    pub fn with_percentage(mut self, participant: ParticipantId, percentage: Decimal) -> Self {
        self.percentages.insert(participant, percentage);
        self
    }

    pub fn amount(&self, participant: ParticipantId) -> Option<Money> {
        self.amounts.get(&participant).copied()
    }

    pub fn percentage(&self, participant: ParticipantId) -> Option<Decimal> {
        self.percentages.get(&participant).copied()
    }

    fn referenced(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.amounts.keys().chain(self.percentages.keys()).copied()
    }
}

/// Computed splits plus how far the allocation is from the total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitOutcome {
    total: Money,
    splits: Vec<Split>,
    allocated_percentage: Option<Decimal>,
}

impl SplitOutcome {
    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    pub fn into_splits(self) -> Vec<Split> {
        self.splits
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn allocated(&self) -> Money {
        self.splits.iter().map(|split| split.amount).sum()
    }

    /// Positive when under-allocated, negative when over-allocated.
    pub fn remaining(&self) -> Money {
        self.total - self.allocated()
    }

    pub fn allocated_percentage(&self) -> Option<Decimal> {
        self.allocated_percentage
    }

    pub fn remaining_percentage(&self) -> Option<Decimal> {
        self.allocated_percentage
            .map(|allocated| Decimal::ONE_HUNDRED - allocated)
    }

    pub fn is_fully_allocated(&self, epsilon: Money) -> bool {
        self.allocated().is_within(self.total, epsilon)
    }
}

/// Turns an expense total and split policy into per-participant shares.
#[derive(Clone, Copy, Debug, Default)]
pub struct SplitCalculator {
    context: CurrencyContext,
}

impl SplitCalculator {
    pub fn new(context: CurrencyContext) -> Self {
        Self { context }
    }

    pub fn compute(
        &self,
        total: Money,
        split_type: SplitType,
        participant_ids: &[ParticipantId],
        overrides: &ManualOverrides,
    ) -> Result<SplitOutcome, SplitError> {
        self.validate_total(total)?;
        let lookup = unique_participants(participant_ids)?;
        if !lookup.is_empty() && !lookup.contains(&ParticipantId::OWNER) {
            return Err(SplitError::OwnerNotIncluded);
        }
        if let Some(unknown) = overrides.referenced().find(|id| !lookup.contains(id)) {
            return Err(SplitError::UnknownParticipant(unknown));
        }

        match split_type {
            SplitType::Equal => self.equal(total, participant_ids),
            SplitType::Unequal => self.unequal(total, participant_ids, overrides),
            SplitType::Percentage => {
                let allocation = PercentageAllocation::with_manual(
                    participant_ids.iter().copied(),
                    participant_ids
                        .iter()
                        .filter_map(|id| overrides.percentage(*id).map(|pct| (*id, pct))),
                )?;
                Ok(self.percentage_unchecked(total, &allocation))
            }
        }
    }

    /// Splits by an allocation the caller keeps across edits.
    pub fn compute_percentage(
        &self,
        total: Money,
        allocation: &PercentageAllocation,
    ) -> Result<SplitOutcome, SplitError> {
        self.validate_total(total)?;
        if !allocation.is_empty() && allocation.get(ParticipantId::OWNER).is_none() {
            return Err(SplitError::OwnerNotIncluded);
        }
        Ok(self.percentage_unchecked(total, allocation))
    }

    fn validate_total(&self, total: Money) -> Result<(), SplitError> {
        if total.is_negative() {
            return Err(SplitError::NegativeAmount(total));
        }
        if !self.context.is_representable(total) {
            return Err(SplitError::SubUnitPrecision(total));
        }
        Ok(())
    }

    fn equal(
        &self,
        total: Money,
        participant_ids: &[ParticipantId],
    ) -> Result<SplitOutcome, SplitError> {
        let shares = total
            .split_even(participant_ids.len(), RemainderPolicy::FrontLoad, self.context)
            .map_err(|_| SplitError::SubUnitPrecision(total))?;

        let splits = participant_ids
            .iter()
            .zip(shares)
            .map(|(id, amount)| Split {
                participant_id: *id,
                amount,
                percentage: None,
            })
            .collect();

        Ok(SplitOutcome {
            total,
            splits,
            allocated_percentage: None,
        })
    }

    fn unequal(
        &self,
        total: Money,
        participant_ids: &[ParticipantId],
        overrides: &ManualOverrides,
    ) -> Result<SplitOutcome, SplitError> {
        let splits = participant_ids
            .iter()
            .map(|id| {
                let amount = overrides.amount(*id).unwrap_or(Money::ZERO);
                if amount.is_negative() {
                    return Err(SplitError::NegativeShare {
                        participant: *id,
                        amount,
                    });
                }
                if !self.context.is_representable(amount) {
                    return Err(SplitError::SubUnitPrecision(amount));
                }
                Ok(Split {
                    participant_id: *id,
                    amount,
                    percentage: None,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let outcome = SplitOutcome {
            total,
            splits,
            allocated_percentage: None,
        };
        if !outcome.is_fully_allocated(self.context.epsilon()) {
            tracing::debug!(
                total = %total,
                allocated = %outcome.allocated(),
                remaining = %outcome.remaining(),
                "Unequal split does not match expense total"
            );
        }
        Ok(outcome)
    }

    fn percentage_unchecked(
        &self,
        total: Money,
        allocation: &PercentageAllocation,
    ) -> SplitOutcome {
        let splits = allocation
            .iter()
            .map(|(id, share)| Split {
                participant_id: id,
                amount: self.context.round(total.percent(share.value())),
                percentage: Some(share.value()),
            })
            .collect();

        let allocated_percentage = allocation.total();
        if allocated_percentage != Decimal::ONE_HUNDRED {
            tracing::debug!(
                allocated_percentage = %allocated_percentage,
                participant_count = allocation.len(),
                "Percentage split does not sum to 100"
            );
        }

        SplitOutcome {
            total,
            splits,
            allocated_percentage: Some(allocated_percentage),
        }
    }
}

fn unique_participants(
    participant_ids: &[ParticipantId],
) -> Result<FxHashSet<ParticipantId>, SplitError> {
    let mut lookup = FxHashSet::default();
    for id in participant_ids {
        if !lookup.insert(*id) {
            return Err(SplitError::DuplicateParticipant(*id));
        }
    }
    Ok(lookup)
}
