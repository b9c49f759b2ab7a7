use crate::model::{Balance, Expense, GroupId, Participant, ParticipantBalances};

/// One participant annotated with their derived balance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParticipantSummary {
    pub participant: Participant,
    pub balance: Balance,
}

/// Derives paid/owed totals from the expense set.
///
/// The result is recomputed from scratch on every call; nothing is carried
/// over between invocations.
pub struct BalanceAggregator;

impl BalanceAggregator {
    /// Every listed participant appears in the result, in input order, even
    /// when no expense references them. Ids referenced only by expenses are
    /// appended in first-seen order.
    pub fn aggregate<'e, I>(participants: &[Participant], expenses: I) -> ParticipantBalances
    where
        I: IntoIterator<Item = &'e Expense>,
    {
        let mut balances: ParticipantBalances = participants
            .iter()
            .map(|participant| (participant.id, Balance::default()))
            .collect();
        let listed = balances.len();
        let mut expense_count = 0usize;

        for expense in expenses {
            expense_count += 1;
            balances.entry(expense.paid_by).or_default().paid += expense.amount;
            for split in &expense.splits {
                balances.entry(split.participant_id).or_default().owed += split.amount;
            }
        }

        if balances.len() > listed {
            tracing::debug!(
                unlisted = balances.len() - listed,
                "Expenses reference participants missing from the participant list"
            );
        }
        tracing::debug!(
            participant_count = balances.len(),
            expense_count,
            "Balances aggregated"
        );

        balances
    }

    /// Aggregates only the expenses that belong to `group_id`.
    pub fn aggregate_group(
        group_id: GroupId,
        participants: &[Participant],
        expenses: &[Expense],
    ) -> ParticipantBalances {
        Self::aggregate(
            participants,
            expenses.iter().filter(|expense| expense.group_id == group_id),
        )
    }

    /// Pairs each participant with their balance; unknown participants stay at zero.
    pub fn summarize(
        participants: &[Participant],
        balances: &ParticipantBalances,
    ) -> Vec<ParticipantSummary> {
        participants
            .iter()
            .map(|participant| ParticipantSummary {
                participant: participant.clone(),
                balance: balances.get(&participant.id).copied().unwrap_or_default(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExpenseId, Money, ParticipantId, Split, SplitType};
    use chrono::NaiveDate;
    use rust_decimal::prelude::ToPrimitive;
    use rstest::{fixture, rstest};

    fn expense(id: u64, group: u64, paid_by: u64, amount: i64, owed: &[(u64, i64)]) -> Expense {
        Expense {
            id: ExpenseId(id),
            group_id: GroupId(group),
            description: format!("expense {id}"),
            amount: Money::from_i64(amount),
            paid_by: ParticipantId(paid_by),
            split_type: SplitType::Unequal,
            splits: owed
                .iter()
                .map(|(participant, share)| Split {
                    participant_id: ParticipantId(*participant),
                    amount: Money::from_i64(*share),
                    percentage: None,
                })
                .collect(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
        }
    }

    #[fixture]
    fn participants() -> Vec<Participant> {
        vec![
            Participant::new(ParticipantId(1), "A"),
            Participant::new(ParticipantId(2), "B"),
            Participant::new(ParticipantId(3), "C"),
            Participant::new(ParticipantId(4), "D"),
        ]
    }

    fn nets(balances: &ParticipantBalances) -> Vec<(u64, i64)> {
        balances
            .iter()
            .map(|(id, balance)| {
                let net = balance.net().as_decimal().to_i64().expect("integral balance");
                (id.0, net)
            })
            .collect()
    }

    #[rstest]
    #[case::no_expenses(vec![], &[(1, 0), (2, 0), (3, 0), (4, 0)])]
    #[case::single_equal_split(
        vec![expense(1, 1, 1, 90, &[(1, 30), (2, 30), (3, 30)])],
        &[(1, 60), (2, -30), (3, -30), (4, 0)]
    )]
    #[case::offsetting_expenses(
        vec![
            expense(1, 1, 1, 40, &[(1, 20), (2, 20)]),
            expense(2, 1, 2, 40, &[(1, 20), (2, 20)]),
        ],
        &[(1, 0), (2, 0), (3, 0), (4, 0)]
    )]
    #[case::unlisted_participant_appended(
        vec![expense(1, 1, 1, 50, &[(9, 50)])],
        &[(1, 50), (2, 0), (3, 0), (4, 0), (9, -50)]
    )]
    fn aggregates_net_balances(
        participants: Vec<Participant>,
        #[case] expenses: Vec<Expense>,
        #[case] expected: &[(u64, i64)],
    ) {
        let balances = BalanceAggregator::aggregate(&participants, &expenses);
        assert_eq!(nets(&balances), expected);
    }

    #[rstest]
    fn aggregation_is_idempotent(participants: Vec<Participant>) {
        let expenses = vec![
            expense(1, 1, 1, 90, &[(1, 30), (2, 30), (3, 30)]),
            expense(2, 1, 3, 12, &[(3, 6), (4, 6)]),
        ];

        let first = BalanceAggregator::aggregate(&participants, &expenses);
        let second = BalanceAggregator::aggregate(&participants, &expenses);
        assert_eq!(first, second);
        assert_eq!(
            first.get(&ParticipantId(3)),
            Some(&Balance {
                paid: Money::from_i64(12),
                owed: Money::from_i64(36),
                settled: Money::ZERO,
            })
        );
    }

    #[rstest]
    fn aggregate_group_ignores_other_groups(participants: Vec<Participant>) {
        let expenses = vec![
            expense(1, 1, 1, 90, &[(1, 30), (2, 30), (3, 30)]),
            expense(2, 2, 4, 100, &[(4, 50), (2, 50)]),
        ];

        let balances = BalanceAggregator::aggregate_group(GroupId(1), &participants, &expenses);
        assert_eq!(nets(&balances), &[(1, 60), (2, -30), (3, -30), (4, 0)]);
    }

    #[rstest]
    fn summarize_keeps_participant_order(participants: Vec<Participant>) {
        let expenses = vec![expense(1, 1, 2, 10, &[(1, 10)])];
        let balances = BalanceAggregator::aggregate(&participants, &expenses);

        let summaries = BalanceAggregator::summarize(&participants, &balances);
        let names: Vec<&str> = summaries
            .iter()
            .map(|summary| summary.participant.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
        assert_eq!(summaries[0].balance.net(), Money::from_i64(-10));
        assert_eq!(summaries[1].balance.net(), Money::from_i64(10));
    }
}
