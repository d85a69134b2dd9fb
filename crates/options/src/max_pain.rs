//! Max pain: the settlement price minimizing total option-writer payout.

use crate::types::{ContractAnalytics, OptionKind};

/// Finds the candidate strike where writers pay out the least, assuming
/// settlement exactly there. Returns `None` on an empty chain.
#[must_use]
pub fn max_pain(contracts: &[ContractAnalytics], underlying_price: f64) -> Option<f64> {
    let mut strikes: Vec<f64> = contracts.iter().map(|c| c.strike).collect();
    strikes.sort_by(f64::total_cmp);
    strikes.dedup();
    if strikes.is_empty() {
        return None;
    }

    let mut best_strike = underlying_price;
    let mut min_payout = f64::INFINITY;

    for &test_price in &strikes {
        let mut payout = 0.0;
        for contract in contracts {
            let itm_amount = match contract.kind {
                OptionKind::Call => test_price - contract.strike,
                OptionKind::Put => contract.strike - test_price,
            };
            if itm_amount > 0.0 {
                payout += contract.open_interest * itm_amount * 100.0;
            }
        }
        if payout < min_payout {
            min_payout = payout;
            best_strike = test_price;
        }
    }

    Some(best_strike)
}
