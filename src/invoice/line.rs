use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{InvoiceError, LineField, Result};

/// Currency precision used for every derived amount.
pub const CURRENCY_DECIMALS: u32 = 2;

/// Round half-up to currency precision, keeping a fixed scale of 2 so that
/// `30` renders as `30.00`.
pub fn round_currency(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(CURRENCY_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(CURRENCY_DECIMALS);
    rounded
}

/// A single invoice line as entered by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default)]
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate_percent: Decimal,
}

impl InvoiceLine {
    pub fn new(
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
        tax_rate_percent: Decimal,
    ) -> Self {
        Self {
            product: None,
            description: description.into(),
            quantity,
            unit_price,
            tax_rate_percent,
        }
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Validated subtotal, tax and total for this line.
    pub fn totals(&self) -> Result<LineTotals> {
        compute_line(self.quantity, self.unit_price, self.tax_rate_percent)
    }
}

/// Derived amounts for one line, each rounded to currency precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

fn validate(quantity: Decimal, unit_price: Decimal, tax_rate_percent: Decimal) -> Result<()> {
    if quantity <= Decimal::ZERO {
        return Err(InvoiceError::invalid_line(
            LineField::Quantity,
            quantity,
            "must be greater than 0",
        ));
    }
    if unit_price < Decimal::ZERO {
        return Err(InvoiceError::invalid_line(
            LineField::UnitPrice,
            unit_price,
            "must not be negative",
        ));
    }
    if tax_rate_percent < Decimal::ZERO || tax_rate_percent > Decimal::ONE_HUNDRED {
        return Err(InvoiceError::invalid_line(
            LineField::TaxRatePercent,
            tax_rate_percent,
            "must be between 0 and 100",
        ));
    }
    Ok(())
}

/// Compute subtotal, tax and total for one line.
///
/// The subtotal is rounded once from the exact product, the tax is rounded
/// once from the rounded subtotal, and the total is their sum, so
/// `subtotal + tax == total` always holds exactly.
pub fn compute_line(
    quantity: Decimal,
    unit_price: Decimal,
    tax_rate_percent: Decimal,
) -> Result<LineTotals> {
    validate(quantity, unit_price, tax_rate_percent)?;

    let subtotal = quantity
        .checked_mul(unit_price)
        .map(round_currency)
        .ok_or_else(|| {
            InvoiceError::invalid_line(LineField::UnitPrice, unit_price, "line amount overflows")
        })?;

    let tax = subtotal
        .checked_mul(tax_rate_percent)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .map(round_currency)
        .ok_or_else(|| {
            InvoiceError::invalid_line(
                LineField::TaxRatePercent,
                tax_rate_percent,
                "tax amount overflows",
            )
        })?;

    let total = subtotal.checked_add(tax).ok_or_else(|| {
        InvoiceError::invalid_line(LineField::UnitPrice, unit_price, "line total overflows")
    })?;

    Ok(LineTotals {
        subtotal,
        tax,
        total,
    })
}
