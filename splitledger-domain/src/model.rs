use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use std::{
    collections::BTreeSet,
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest currency scale accepted by [`CurrencyContext`].
pub const MAX_CURRENCY_SCALE: u32 = 22;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ParticipantId(pub u64);

impl ParticipantId {
    /// The ledger owner. Implicitly a member of every group.
    pub const OWNER: Self = Self(0);

    pub fn is_owner(self) -> bool {
        self == Self::OWNER
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ExpenseId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct SettlementId(pub u64);

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CurrencyError {
    #[error("currency scale {scale} is not supported (max {max_supported})")]
    UnsupportedScale { scale: u32, max_supported: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum AtomicUnitConversionError {
    #[error("amount is finer than the currency unit")]
    NonIntegral,
    #[error("amount is out of range for the currency unit")]
    OutOfRange,
}

/// Currency-unit granularity shared by every money comparison in the ledger.
///
/// The atomic unit is `10^-scale` (one cent for scale 2) and doubles as the
/// tolerance ε used when deciding whether a balance is settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrencyContext {
    scale: u32,
}

impl CurrencyContext {
    pub fn try_new(scale: u32) -> Result<Self, CurrencyError> {
        if scale > MAX_CURRENCY_SCALE {
            return Err(CurrencyError::UnsupportedScale {
                scale,
                max_supported: MAX_CURRENCY_SCALE,
            });
        }
        Ok(Self { scale })
    }

    /// Two decimal places.
    pub fn cents() -> Self {
        Self { scale: 2 }
    }

    pub fn scale(self) -> u32 {
        self.scale
    }

    pub fn atomic_unit(self) -> Money {
        Money(Decimal::new(1, self.scale))
    }

    pub fn epsilon(self) -> Money {
        self.atomic_unit()
    }

    /// True when `amount` carries no digits below the atomic unit.
    pub fn is_representable(self, amount: Money) -> bool {
        amount.0.round_dp(self.scale) == amount.0
    }

    pub fn round(self, amount: Money) -> Money {
        Money(
            amount
                .0
                .round_dp_with_strategy(self.scale, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    pub fn to_atomic_units(self, amount: Money) -> Result<i128, AtomicUnitConversionError> {
        let factor = Decimal::from_i128_with_scale(10_i128.pow(self.scale), 0);
        let units = amount
            .0
            .checked_mul(factor)
            .ok_or(AtomicUnitConversionError::OutOfRange)?;
        if units.fract() != Decimal::ZERO {
            return Err(AtomicUnitConversionError::NonIntegral);
        }
        units.to_i128().ok_or(AtomicUnitConversionError::OutOfRange)
    }

    pub fn from_atomic_units(self, units: i128) -> Result<Money, AtomicUnitConversionError> {
        Decimal::try_from_i128_with_scale(units, self.scale)
            .map(Money)
            .map_err(|_| AtomicUnitConversionError::OutOfRange)
    }
}

impl Default for CurrencyContext {
    fn default() -> Self {
        Self::cents()
    }
}

/// Which shares absorb the atomic units left over by an even split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemainderPolicy {
    /// The first `remainder` shares each receive one extra unit.
    FrontLoad,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(num: i64, scale: u32) -> Self {
        Self(Decimal::new(num, scale))
    }

    pub fn from_i64(value: i64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn from_decimal(value: Decimal) -> Self {
        Self(value)
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Equal to `other` up to a difference strictly smaller than `epsilon`.
    pub fn is_within(self, other: Money, epsilon: Money) -> bool {
        (self - other).abs() < epsilon
    }

    /// Percentage of this amount, `percentage / 100 * self`, unrounded.
    pub fn percent(self, percentage: Decimal) -> Self {
        Self(self.0 * percentage / Decimal::ONE_HUNDRED)
    }

    /// Splits into `parts` shares that are exact in atomic units and sum back to `self`.
    pub fn split_even(
        self,
        parts: usize,
        policy: RemainderPolicy,
        context: CurrencyContext,
    ) -> Result<Vec<Money>, AtomicUnitConversionError> {
        if parts == 0 {
            return Ok(Vec::new());
        }

        let units = context.to_atomic_units(self)?;
        let divisor = i128::try_from(parts).map_err(|_| AtomicUnitConversionError::OutOfRange)?;
        let base = units.div_euclid(divisor);
        let remainder = units.rem_euclid(divisor) as usize;

        (0..parts)
            .map(|idx| {
                let extra = match policy {
                    RemainderPolicy::FrontLoad => i128::from(idx < remainder),
                };
                context.from_atomic_units(base + extra)
            })
            .collect()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
}

impl Participant {
    pub fn new(id: ParticipantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    /// Explicit members. The owner is implicit and never stored here.
    pub member_ids: BTreeSet<ParticipantId>,
}

impl Group {
    pub fn new<I>(id: GroupId, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = ParticipantId>,
    {
        Self {
            id,
            name: name.into(),
            member_ids: members.into_iter().filter(|id| !id.is_owner()).collect(),
        }
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        id.is_owner() || self.member_ids.contains(&id)
    }

    /// Owner first, then members in ascending id order.
    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        std::iter::once(ParticipantId::OWNER).chain(
            self.member_ids
                .iter()
                .copied()
                .filter(|id| !id.is_owner()),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SplitType {
    Equal,
    Unequal,
    Percentage,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Split {
    pub participant_id: ParticipantId,
    pub amount: Money,
    /// Basis of `amount`; present only for percentage splits.
    #[cfg_attr(feature = "serde", serde(default))]
    pub percentage: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Expense {
    pub id: ExpenseId,
    pub group_id: GroupId,
    pub description: String,
    pub amount: Money,
    pub paid_by: ParticipantId,
    pub split_type: SplitType,
    pub splits: Vec<Split>,
    pub date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ExpenseValidationError {
    #[error("expense belongs to group {found}, expected group {expected}")]
    GroupMismatch { expected: GroupId, found: GroupId },
    #[error("expense amount must be positive (found {0})")]
    NonPositiveAmount(Money),
    #[error("payer {0} is not a member of the group")]
    UnknownPayer(ParticipantId),
    #[error("split participant {0} is not a member of the group")]
    UnknownParticipant(ParticipantId),
    #[error("split participant {0} appears more than once")]
    DuplicateParticipant(ParticipantId),
    #[error("split share for {participant} must not be negative (found {amount})")]
    NegativeShare {
        participant: ParticipantId,
        amount: Money,
    },
    #[error("percentage split for {0} carries no percentage")]
    MissingPercentage(ParticipantId),
    #[error("expense has no participants to split between")]
    NoParticipants,
}

impl Expense {
    /// Checks the expense against the group it claims to belong to.
    pub fn validate(&self, group: &Group) -> Result<(), ExpenseValidationError> {
        if self.group_id != group.id {
            return Err(ExpenseValidationError::GroupMismatch {
                expected: group.id,
                found: self.group_id,
            });
        }
        if !self.amount.is_positive() {
            return Err(ExpenseValidationError::NonPositiveAmount(self.amount));
        }
        if !group.contains(self.paid_by) {
            return Err(ExpenseValidationError::UnknownPayer(self.paid_by));
        }
        if self.splits.is_empty() {
            return Err(ExpenseValidationError::NoParticipants);
        }

        let mut seen = BTreeSet::new();
        for split in &self.splits {
            if !group.contains(split.participant_id) {
                return Err(ExpenseValidationError::UnknownParticipant(
                    split.participant_id,
                ));
            }
            if !seen.insert(split.participant_id) {
                return Err(ExpenseValidationError::DuplicateParticipant(
                    split.participant_id,
                ));
            }
            if split.amount.is_negative() {
                return Err(ExpenseValidationError::NegativeShare {
                    participant: split.participant_id,
                    amount: split.amount,
                });
            }
            if self.split_type == SplitType::Percentage && split.percentage.is_none() {
                return Err(ExpenseValidationError::MissingPercentage(
                    split.participant_id,
                ));
            }
        }

        Ok(())
    }

    pub fn allocated(&self) -> Money {
        self.splits.iter().map(|split| split.amount).sum()
    }
}

/// A real-world payment the user confirmed as done.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SettlementRecord {
    pub id: SettlementId,
    pub group_id: GroupId,
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SettlementInstruction {
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub amount: Money,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Balance {
    pub paid: Money,
    pub owed: Money,
    /// Net flow of recorded settlements: positive when this participant paid
    /// others back, negative when they were paid.
    pub settled: Money,
}

impl Balance {
    pub fn net(&self) -> Money {
        self.paid - self.owed + self.settled
    }
}

/// Balances keyed by participant, in participant input order.
pub type ParticipantBalances = IndexMap<ParticipantId, Balance>;

/// Signed net balances; positive means others owe this participant.
pub type NetBalances = IndexMap<ParticipantId, Money>;

pub fn net_balances(balances: &ParticipantBalances) -> NetBalances {
    balances
        .iter()
        .map(|(id, balance)| (*id, balance.net()))
        .collect()
}
