use splitledger_application::SettlementOptimizer;
use splitledger_domain::{
    CurrencyContext, NetBalances, SettlementInstruction, services::SettlementResolver,
};

/// Largest-debtor / largest-creditor matching from the domain resolver.
#[derive(Default)]
pub struct GreedySettlementOptimizer;

impl SettlementOptimizer for GreedySettlementOptimizer {
    fn optimize(
        &self,
        balances: &NetBalances,
        context: CurrencyContext,
    ) -> Vec<SettlementInstruction> {
        SettlementResolver::new(context).resolve(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use splitledger_domain::{Money, ParticipantId};

    #[rstest]
    #[case::cents(2, Money::new(1_234, 2))]
    #[case::whole_units(0, Money::from_i64(12))]
    #[case::mills(3, Money::new(1_234, 3))]
    fn optimize_settles_single_debt_at_any_scale(#[case] scale: u32, #[case] amount: Money) {
        let context = CurrencyContext::try_new(scale).expect("supported scale");
        let balances = NetBalances::from_iter([
            (ParticipantId(1), -amount),
            (ParticipantId(2), amount),
        ]);

        let transfers = GreedySettlementOptimizer.optimize(&balances, context);
        assert_eq!(
            transfers,
            vec![SettlementInstruction {
                from: ParticipantId(1),
                to: ParticipantId(2),
                amount,
            }]
        );
    }

    #[test]
    fn optimize_drops_balances_below_the_currency_unit() {
        let context = CurrencyContext::try_new(0).expect("supported scale");
        let balances = NetBalances::from_iter([
            (ParticipantId(1), Money::new(-4, 1)),
            (ParticipantId(2), Money::new(4, 1)),
        ]);

        assert!(GreedySettlementOptimizer.optimize(&balances, context).is_empty());
    }
}
