//! Fee and total arithmetic for checkouts and invoices
//!
//! Amounts are `rust_decimal::Decimal` so sums stay exact to the cent. Every
//! function rejects negative inputs with [`LedgerError::InvalidAmount`].
use super::cart::LineItem;
use super::error::{LedgerError, LedgerResult};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Percentage kept back when an invoice is paid out.
pub const DEFAULT_WITHDRAWAL_PERCENT: Decimal = Decimal::from_parts(3, 0, 0, false, 0);

pub fn ensure_non_negative(label: &str, amount: Decimal) -> LedgerResult<Decimal> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(LedgerError::InvalidAmount(format!(
            "{label} must not be negative, got {amount}"
        )));
    }
    Ok(amount)
}

fn checked_add(a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| LedgerError::InvalidAmount("amount overflow".into()))
}

/// Sum of quantity x unit price over the items. Empty input yields zero.
pub fn line_total(items: &[LineItem]) -> LedgerResult<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |acc, item| {
        let price = ensure_non_negative("unit price", item.unit_price)?;
        let subtotal = price
            .checked_mul(Decimal::from(item.quantity))
            .ok_or_else(|| LedgerError::InvalidAmount("amount overflow".into()))?;
        checked_add(acc, subtotal)
    })
}

pub fn checkout_total(
    items: &[LineItem],
    service_fee: Decimal,
    delivery_fee: Decimal,
) -> LedgerResult<Decimal> {
    let service_fee = ensure_non_negative("service fee", service_fee)?;
    let delivery_fee = ensure_non_negative("delivery fee", delivery_fee)?;

    checked_add(checked_add(line_total(items)?, service_fee)?, delivery_fee)
}

pub fn invoice_transaction_cost(total: Decimal, percent: Decimal) -> LedgerResult<Decimal> {
    let total = ensure_non_negative("invoice total", total)?;
    let percent = ensure_non_negative("withdrawal percent", percent)?;

    total
        .checked_mul(percent)
        .map(|v| v / Decimal::ONE_HUNDRED)
        .ok_or_else(|| LedgerError::InvalidAmount("amount overflow".into()))
}

pub fn invoice_net(total: Decimal, cost: Decimal) -> LedgerResult<Decimal> {
    let total = ensure_non_negative("invoice total", total)?;
    let cost = ensure_non_negative("transaction cost", cost)?;

    Ok(total - cost)
}

/// Converts to the gateway's minor currency unit (cents, kobo).
pub fn to_minor_units(amount: Decimal) -> LedgerResult<u64> {
    let amount = ensure_non_negative("amount", amount)?;

    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_u64()
        .ok_or_else(|| LedgerError::InvalidAmount(format!("{amount} does not fit minor units")))
}

/// Parses an operator-entered amount such as `"1,250.00"` or `"$19.50"`.
pub fn parse_amount(text: &str) -> LedgerResult<Decimal> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();

    if cleaned.is_empty() {
        return Err(LedgerError::InvalidAmount("amount is empty".into()));
    }

    let amount: Decimal = cleaned
        .parse()
        .map_err(|_| LedgerError::InvalidAmount(format!("{text:?} is not a finite amount")))?;

    ensure_non_negative("amount", amount)
}
