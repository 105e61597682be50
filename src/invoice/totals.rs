use rust_decimal::Decimal;
use serde::Serialize;

use super::line::{round_currency, InvoiceLine, LineTotals};
use crate::error::{InvoiceError, LineField, Result};

/// Invoice-level amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub total_tax: Decimal,
    pub total: Decimal,
}

impl Default for InvoiceTotals {
    fn default() -> Self {
        Self {
            subtotal: round_currency(Decimal::ZERO),
            total_tax: round_currency(Decimal::ZERO),
            total: round_currency(Decimal::ZERO),
        }
    }
}

/// Sum per-line amounts into invoice totals.
///
/// Each line is rounded on its own before summing, so every displayed line
/// reconciles with the invoice total. Any invalid line fails the whole
/// aggregation.
pub fn aggregate<'a, I>(lines: I) -> Result<InvoiceTotals>
where
    I: IntoIterator<Item = &'a InvoiceLine>,
{
    let per_line = lines
        .into_iter()
        .map(InvoiceLine::totals)
        .collect::<Result<Vec<LineTotals>>>()?;

    let mut subtotal = Decimal::ZERO;
    let mut total_tax = Decimal::ZERO;
    let mut total = Decimal::ZERO;
    for line in &per_line {
        subtotal = checked_sum(subtotal, line.subtotal)?;
        total_tax = checked_sum(total_tax, line.tax)?;
        total = checked_sum(total, line.total)?;
    }

    let totals = InvoiceTotals {
        subtotal: round_currency(subtotal),
        total_tax: round_currency(total_tax),
        total: round_currency(total),
    };

    tracing::debug!(
        lines = per_line.len(),
        subtotal = %totals.subtotal,
        total_tax = %totals.total_tax,
        total = %totals.total,
        "aggregated invoice totals"
    );

    Ok(totals)
}

fn checked_sum(acc: Decimal, amount: Decimal) -> Result<Decimal> {
    acc.checked_add(amount).ok_or_else(|| {
        InvoiceError::invalid_line(LineField::UnitPrice, amount, "invoice total overflows")
    })
}
