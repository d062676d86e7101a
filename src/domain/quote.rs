//! Quote and bookkeeping derivations
//!
//! Pure recomputation over a case's line items. Invoked after every
//! mutating operation rather than reactively, so callers always see
//! totals consistent with the current items.

use rust_decimal::prelude::*;

use super::cases::{QuoteLink, RepairCase, RepairItem, RepairType};

/// Derived quote totals (tax-inclusive grand total).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct QuoteSummary {
    pub subtotal: f64,
    pub service_fee: f64,
    pub tax: f64,
    pub total: f64,
}

/// Cost/income aggregates for the bookkeeping sidebar.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct FinancialStats {
    pub total_costs: f64,
    pub total_income: f64,
    pub net_profit: f64,
}

const FIVE_PERCENT: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

fn dec(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Round half-up to whole currency units, the way the ledger rounds.
fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute quote totals from the repair items.
///
/// Subtotal is Σ unit price × quantity; in-contract cases add a 5% service
/// fee; tax is 5% of (subtotal + fee), each rounded at its own stage. The
/// result is always defined: absent or non-numeric inputs have already
/// been read as zero.
pub fn quote_summary(items: &[RepairItem], repair_type: RepairType) -> QuoteSummary {
    let subtotal: Decimal = items
        .iter()
        .map(|i| dec(i.unit_price) * dec(i.quantity))
        .sum();

    let service_fee = match repair_type {
        RepairType::InContract => round_money(subtotal * FIVE_PERCENT),
        RepairType::OutOfContract => Decimal::ZERO,
    };
    let tax = round_money((subtotal + service_fee) * FIVE_PERCENT);
    let total = subtotal + service_fee + tax;

    QuoteSummary {
        subtotal: subtotal.to_f64().unwrap_or(0.0),
        service_fee: service_fee.to_f64().unwrap_or(0.0),
        tax: tax.to_f64().unwrap_or(0.0),
        total: total.to_f64().unwrap_or(0.0),
    }
}

/// Aggregate cost and income amounts across the bookkeeping rows.
pub fn financial_stats(case: &RepairCase) -> FinancialStats {
    let total_costs: f64 = case.cost_items.iter().map(|c| c.amount).sum();
    let total_income: f64 = case.income_items.iter().map(|i| i.amount).sum();
    FinancialStats {
        total_costs,
        total_income,
        net_profit: total_income - total_costs,
    }
}

/// Mirror the computed quote totals into the first income item when it is
/// linked; manually overridden items are left untouched.
pub fn sync_linked_income(case: &mut RepairCase) {
    let summary = quote_summary(&case.repair_items, case.repair_type);
    if let Some(first) = case.income_items.first_mut() {
        if first.quote_link == QuoteLink::Linked {
            first.subtotal = summary.subtotal;
            first.service_fee = summary.service_fee;
            first.tax = summary.tax;
            first.amount = summary.total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cases::{CostItem, IncomeItem};
    use uuid::Uuid;

    fn item(price: f64, qty: f64) -> RepairItem {
        RepairItem {
            id: Uuid::new_v4(),
            catalog_id: String::new(),
            name: "item".to_string(),
            unit_price: price,
            quantity: qty,
            unit: "式".to_string(),
            is_manual: true,
        }
    }

    #[test]
    fn in_contract_quote_adds_service_fee_then_tax() {
        let summary = quote_summary(&[item(1000.0, 2.0)], RepairType::InContract);
        assert_eq!(summary.subtotal, 2000.0);
        assert_eq!(summary.service_fee, 100.0);
        assert_eq!(summary.tax, 105.0);
        assert_eq!(summary.total, 2205.0);
    }

    #[test]
    fn out_of_contract_quote_has_no_service_fee() {
        let summary = quote_summary(&[item(1000.0, 2.0)], RepairType::OutOfContract);
        assert_eq!(summary.service_fee, 0.0);
        assert_eq!(summary.tax, 100.0);
        assert_eq!(summary.total, 2100.0);
    }

    #[test]
    fn fee_and_tax_round_half_up_per_stage() {
        // subtotal 250 -> fee 12.5 rounds to 13; tax 13.15 rounds to 13
        let summary = quote_summary(&[item(250.0, 1.0)], RepairType::InContract);
        assert_eq!(summary.service_fee, 13.0);
        assert_eq!(summary.tax, 13.0);
        assert_eq!(summary.total, 276.0);
    }

    #[test]
    fn empty_item_list_yields_zero_quote() {
        let summary = quote_summary(&[], RepairType::InContract);
        assert_eq!(summary.total, 0.0);
    }

    #[test]
    fn net_profit_is_income_minus_costs() {
        let mut case = RepairCase::new();
        case.cost_items = vec![
            CostItem {
                id: Uuid::new_v4(),
                amount: 300.0,
                ..CostItem::default()
            },
            CostItem {
                id: Uuid::new_v4(),
                amount: 0.0, // blank amount read as zero
                ..CostItem::default()
            },
        ];
        case.income_items = vec![IncomeItem {
            id: Uuid::new_v4(),
            amount: 1000.0,
            ..IncomeItem::default()
        }];

        let stats = financial_stats(&case);
        assert_eq!(stats.total_costs, 300.0);
        assert_eq!(stats.total_income, 1000.0);
        assert_eq!(stats.net_profit, 700.0);
    }

    #[test]
    fn linked_income_mirrors_quote_totals() {
        let mut case = RepairCase::new();
        case.repair_items = vec![item(1000.0, 2.0)];
        sync_linked_income(&mut case);

        let first = &case.income_items[0];
        assert_eq!(first.subtotal, 2000.0);
        assert_eq!(first.service_fee, 100.0);
        assert_eq!(first.tax, 105.0);
        assert_eq!(first.amount, 2205.0);
    }

    #[test]
    fn manual_income_is_left_alone() {
        let mut case = RepairCase::new();
        case.repair_items = vec![item(1000.0, 2.0)];
        case.income_items[0].quote_link = QuoteLink::Manual;
        case.income_items[0].amount = 42.0;
        sync_linked_income(&mut case);
        assert_eq!(case.income_items[0].amount, 42.0);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let mut case = RepairCase::new();
        case.repair_items = vec![item(750.0, 3.0), item(120.0, 1.0)];
        sync_linked_income(&mut case);
        let once = case.income_items[0].clone();
        sync_linked_income(&mut case);
        assert_eq!(case.income_items[0].amount, once.amount);
        assert_eq!(
            quote_summary(&case.repair_items, case.repair_type),
            quote_summary(&case.repair_items, case.repair_type)
        );
    }
}
