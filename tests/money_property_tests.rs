//! Property-based tests for the fee calculator and the display helpers
//!
//! Amounts are generated as whole cents so every expected value can be
//! written down exactly.

use order_ledger::{
    cart::LineItem,
    display::{Pager, mask_receipt},
    money::{self, DEFAULT_WITHDRAWAL_PERCENT},
};
use proptest::prelude::*;
use rust_decimal::Decimal;

// PROPERTY TEST STRATEGIES

/// Strategy for a non-negative amount with two decimal places
fn cents_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn line_item_strategy() -> impl Strategy<Value = LineItem> {
    (1u32..=50, cents_strategy())
        .prop_map(|(quantity, price)| LineItem::new("Item", "", "", quantity, price).unwrap())
}

proptest! {
    /// checkout_total == line_total + fees, and never below line_total
    #[test]
    fn checkout_total_adds_fees_exactly(
        items in prop::collection::vec(line_item_strategy(), 1..10),
        service_fee in cents_strategy(),
        delivery_fee in cents_strategy(),
    ) {
        let lines = money::line_total(&items).unwrap();
        let total = money::checkout_total(&items, service_fee, delivery_fee).unwrap();

        prop_assert_eq!(total, lines + service_fee + delivery_fee);
        prop_assert!(total >= lines);
        prop_assert_eq!(total.round_dp(2), total);
    }

    /// cost + net gives the total back for any non-negative total
    #[test]
    fn cost_and_net_recombine(total in cents_strategy()) {
        let cost = money::invoice_transaction_cost(total, DEFAULT_WITHDRAWAL_PERCENT).unwrap();
        let net = money::invoice_net(total, cost).unwrap();

        prop_assert_eq!(cost + net, total);
        prop_assert!(net <= total);
    }

    /// minor units are exactly amount * 100 for cent-precision amounts
    #[test]
    fn minor_units_are_cents(cents in 0i64..=10_000_000) {
        let amount = Decimal::new(cents, 2);
        prop_assert_eq!(money::to_minor_units(amount).unwrap(), cents as u64);
    }

    /// negative amounts never pass the calculator
    #[test]
    fn negative_amounts_rejected(cents in 1i64..=10_000_000) {
        let negative = Decimal::new(-cents, 2);

        prop_assert!(money::invoice_transaction_cost(negative, DEFAULT_WITHDRAWAL_PERCENT).is_err());
        prop_assert!(money::checkout_total(&[], negative, Decimal::ZERO).is_err());
        prop_assert!(money::to_minor_units(negative).is_err());
    }

    /// masking keeps the length and the last four characters
    #[test]
    fn mask_keeps_tail(receipt in "[A-Z0-9]{0,20}") {
        let masked = mask_receipt(&receipt, false);
        let len = receipt.len();

        prop_assert_eq!(masked.len(), len);
        let keep = len.min(4);
        prop_assert_eq!(&masked[len - keep..], &receipt[len - keep..]);
        prop_assert!(masked[..len - keep].chars().all(|c| c == '*'));
        prop_assert_eq!(mask_receipt(&receipt, true), receipt);
    }

    /// walking every page visits each item exactly once
    #[test]
    fn pages_cover_items_once(total in 0usize..200, page_size in 1usize..20) {
        let items: Vec<usize> = (0..total).collect();
        let mut pager = Pager::new(total, page_size);
        let mut seen = pager.page_of(&items).to_vec();

        while pager.next() {
            let page = pager.page_of(&items);
            prop_assert!(!page.is_empty() && page.len() <= page_size);
            seen.extend_from_slice(page);
        }

        prop_assert_eq!(seen, items);
        prop_assert!(!pager.has_next());
    }
}
