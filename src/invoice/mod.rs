mod document;
mod line;
mod totals;

pub use document::{Invoice, InvoiceStatus};
pub use line::{compute_line, round_currency, InvoiceLine, LineTotals, CURRENCY_DECIMALS};
pub use totals::{aggregate, InvoiceTotals};
