use crate::model::{CurrencyContext, Money, NetBalances, ParticipantId, SettlementInstruction};
use std::{cmp::Ordering, collections::BinaryHeap};

/// One side of an open debt, ranked by outstanding magnitude.
#[derive(Debug, PartialEq, Eq)]
struct OpenPosition {
    remaining: Money,
    order: usize,
    id: ParticipantId,
}

impl Ord for OpenPosition {
    // Larger magnitude first; on equal magnitude the earlier input position wins.
    fn cmp(&self, other: &Self) -> Ordering {
        self.remaining
            .cmp(&other.remaining)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for OpenPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Greedy largest-debtor / largest-creditor settlement.
///
/// Repeatedly matches the participant owing the most with the participant
/// owed the most until one side runs out. The result zeroes every balance to
/// within one currency unit but is not guaranteed to use the fewest possible
/// transfers.
///
/// Balances whose magnitude is at most one currency unit are treated as settled.
/// Ties are broken by the iteration order of the input map.
#[derive(Clone, Copy, Debug, Default)]
pub struct SettlementResolver {
    context: CurrencyContext,
}

impl SettlementResolver {
    pub fn new(context: CurrencyContext) -> Self {
        Self { context }
    }

    pub fn resolve(&self, balances: &NetBalances) -> Vec<SettlementInstruction> {
        let epsilon = self.context.epsilon();
        let mut debtors = BinaryHeap::new();
        let mut creditors = BinaryHeap::new();

        for (order, (id, balance)) in balances.iter().enumerate() {
            if balance.abs() <= epsilon {
                continue;
            }
            let position = OpenPosition {
                remaining: balance.abs(),
                order,
                id: *id,
            };
            if balance.is_negative() {
                debtors.push(position);
            } else {
                creditors.push(position);
            }
        }

        let debtor_count = debtors.len();
        let creditor_count = creditors.len();
        let mut instructions = Vec::with_capacity(debtor_count + creditor_count);
        let mut dust = Money::ZERO;

        while !debtors.is_empty() && !creditors.is_empty() {
            let (Some(mut debtor), Some(mut creditor)) = (debtors.pop(), creditors.pop()) else {
                break;
            };

            let amount = debtor.remaining.min(creditor.remaining);
            instructions.push(SettlementInstruction {
                from: debtor.id,
                to: creditor.id,
                amount,
            });

            debtor.remaining -= amount;
            creditor.remaining -= amount;

            for (position, side) in [(debtor, &mut debtors), (creditor, &mut creditors)] {
                if position.remaining >= epsilon {
                    side.push(position);
                } else {
                    dust += position.remaining;
                }
            }
        }

        let unmatched: Money = debtors
            .iter()
            .chain(creditors.iter())
            .map(|position| position.remaining)
            .sum();
        let imbalance: Money = balances.values().sum();
        if !imbalance.is_zero() {
            tracing::warn!(
                imbalance = %imbalance,
                unmatched = %unmatched,
                "Balances do not sum to zero; part of the debt has no counterparty"
            );
        }

        tracing::debug!(
            debtor_count,
            creditor_count,
            instruction_count = instructions.len(),
            dust = %dust,
            "Settlement instructions resolved"
        );

        instructions
    }
}
