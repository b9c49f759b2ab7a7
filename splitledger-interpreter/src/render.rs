use splitledger_application::GroupReport;
use splitledger_domain::{CurrencyContext, Money, ParticipantId, services::SettlementStatus};
use std::fmt::Write;

pub fn render_report(report: &GroupReport, context: CurrencyContext) -> String {
    let scale = context.scale() as usize;
    let money = |amount: Money| format!("{amount:.scale$}");
    let name = |id: ParticipantId| {
        report
            .summaries
            .iter()
            .find(|summary| summary.participant.id == id)
            .map_or_else(|| id.to_string(), |summary| summary.participant.name.clone())
    };

    let mut out = String::new();
    let _ = writeln!(out, "== {} (group {}) ==", report.group.name, report.group.id);

    out.push_str("Balances:\n");
    for summary in &report.adjusted {
        let balance = summary.balance;
        let _ = writeln!(
            out,
            "  {}: paid {}, owed {}, settled {}, net {}",
            summary.participant.name,
            money(balance.paid),
            money(balance.owed),
            money(balance.settled),
            money(balance.net()),
        );
    }

    if !report.recommendations.is_empty() {
        out.push_str("Recommended:\n");
        for annotated in &report.recommendations {
            let mark = match annotated.status {
                SettlementStatus::Settled => 'x',
                SettlementStatus::Pending => ' ',
            };
            let instruction = annotated.instruction;
            let _ = writeln!(
                out,
                "  [{mark}] {} -> {}: {}",
                name(instruction.from),
                name(instruction.to),
                money(instruction.amount),
            );
        }
    }

    if report.is_settled() {
        out.push_str("All settled up.\n");
    } else {
        out.push_str("Still to pay:\n");
        for instruction in &report.residual {
            let _ = writeln!(
                out,
                "  {} -> {}: {}",
                name(instruction.from),
                name(instruction.to),
                money(instruction.amount),
            );
        }
    }

    for delta in &report.allocation_deltas {
        let _ = writeln!(
            out,
            "Warning: expense {} has {} unallocated",
            delta.expense.0,
            money(delta.remaining),
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitledger_application::AllocationDelta;
    use splitledger_domain::{
        Balance, ExpenseId, Group, GroupId, Participant, SettlementInstruction,
        services::{AnnotatedInstruction, ParticipantSummary},
    };

    const OWNER: ParticipantId = ParticipantId::OWNER;
    const ALICE: ParticipantId = ParticipantId(1);

    fn summary(
        id: ParticipantId,
        name: &str,
        paid: i64,
        owed: i64,
        settled: i64,
    ) -> ParticipantSummary {
        ParticipantSummary {
            participant: Participant::new(id, name),
            balance: Balance {
                paid: Money::from_i64(paid),
                owed: Money::from_i64(owed),
                settled: Money::from_i64(settled),
            },
        }
    }

    fn report(settled: bool) -> GroupReport {
        let instruction = SettlementInstruction {
            from: ALICE,
            to: OWNER,
            amount: Money::new(1_050, 2),
        };
        let alice_settled = if settled { 21 } else { 0 };
        GroupReport {
            group: Group::new(GroupId(3), "Cabin", [ALICE]),
            summaries: vec![
                summary(OWNER, "You", 21, 10, 0),
                summary(ALICE, "Alice", 0, 11, 0),
            ],
            adjusted: vec![
                summary(OWNER, "You", 21, 10, -alice_settled),
                summary(ALICE, "Alice", 0, 11, alice_settled),
            ],
            recommendations: vec![AnnotatedInstruction {
                instruction,
                status: if settled {
                    SettlementStatus::Settled
                } else {
                    SettlementStatus::Pending
                },
            }],
            residual: if settled { vec![] } else { vec![instruction] },
            allocation_deltas: vec![],
        }
    }

    #[test]
    fn renders_pending_recommendations_with_names() {
        let rendered = render_report(&report(false), CurrencyContext::cents());

        assert!(rendered.starts_with("== Cabin (group 3) ==\n"));
        assert!(rendered.contains("  You: paid 21.00, owed 10.00, settled 0.00, net 11.00\n"));
        assert!(rendered.contains("  [ ] Alice -> You: 10.50\n"));
        assert!(rendered.contains("Still to pay:\n  Alice -> You: 10.50\n"));
    }

    #[test]
    fn renders_settled_groups() {
        let rendered = render_report(&report(true), CurrencyContext::cents());

        assert!(rendered.contains("  [x] Alice -> You: 10.50\n"));
        assert!(rendered.contains("All settled up.\n"));
        assert!(!rendered.contains("Still to pay"));
    }

    #[test]
    fn renders_allocation_warnings_and_unknown_names() {
        let mut report = report(false);
        report.residual = vec![SettlementInstruction {
            from: ParticipantId(9),
            to: OWNER,
            amount: Money::from_i64(1),
        }];
        report.allocation_deltas = vec![AllocationDelta {
            expense: ExpenseId(4),
            allocated: Money::from_i64(8),
            remaining: Money::from_i64(2),
        }];

        let rendered = render_report(&report, CurrencyContext::try_new(0).expect("valid scale"));
        assert!(rendered.contains("  #9 -> You: 1\n"));
        assert!(rendered.contains("Warning: expense 4 has 2 unallocated\n"));
    }
}
