use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::line::InvoiceLine;
use super::totals::{aggregate, InvoiceTotals};
use crate::error::{InvoiceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Cancelled,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

impl FromStr for InvoiceStatus {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" | "borrador" => Ok(InvoiceStatus::Draft),
            "sent" | "enviada" => Ok(InvoiceStatus::Sent),
            "paid" | "pagada" => Ok(InvoiceStatus::Paid),
            "cancelled" | "canceled" | "cancelada" => Ok(InvoiceStatus::Cancelled),
            _ => Err(InvoiceError::UnknownStatus(s.to_string())),
        }
    }
}

/// An invoice body: ordered lines plus a caller-driven status.
///
/// Totals are not stored; [`Invoice::totals`] derives them from the current
/// lines every time, so they can never drift from the line set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(default)]
    pub status: InvoiceStatus,
    #[serde(default)]
    pub lines: Vec<InvoiceLine>,
}

impl Invoice {
    /// A new draft invoice with no lines.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines(lines: Vec<InvoiceLine>) -> Self {
        Self {
            lines,
            status: InvoiceStatus::Draft,
        }
    }

    /// Validate and append a line.
    pub fn add_line(&mut self, line: InvoiceLine) -> Result<()> {
        line.totals()?;
        self.lines.push(line);
        Ok(())
    }

    pub fn remove_line(&mut self, index: usize) -> Option<InvoiceLine> {
        if index < self.lines.len() {
            Some(self.lines.remove(index))
        } else {
            None
        }
    }

    /// Replace every line at once. Nothing changes if any new line is invalid.
    pub fn replace_lines(&mut self, lines: Vec<InvoiceLine>) -> Result<()> {
        aggregate(&lines)?;
        self.lines = lines;
        Ok(())
    }

    pub fn set_status(&mut self, status: InvoiceStatus) {
        self.status = status;
    }

    pub fn totals(&self) -> Result<InvoiceTotals> {
        aggregate(&self.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn line(qty: i64, price: i64, rate: i64) -> InvoiceLine {
        InvoiceLine::new("item", Decimal::from(qty), Decimal::from(price), Decimal::from(rate))
    }

    #[test]
    fn new_invoice_is_an_empty_draft() {
        let invoice = Invoice::new();
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.totals().unwrap(), InvoiceTotals::default());
    }

    #[test]
    fn totals_follow_line_mutations() {
        let mut invoice = Invoice::new();
        invoice.add_line(line(3, 10, 21)).unwrap();
        assert_eq!(invoice.totals().unwrap().total, Decimal::new(3630, 2));

        invoice.add_line(line(1, 100, 0)).unwrap();
        assert_eq!(invoice.totals().unwrap().total, Decimal::new(13630, 2));

        invoice.remove_line(0);
        assert_eq!(invoice.totals().unwrap().total, Decimal::new(10000, 2));
        assert!(invoice.remove_line(5).is_none());
    }

    #[test]
    fn invalid_lines_are_rejected_before_they_land() {
        let mut invoice = Invoice::with_lines(vec![line(1, 10, 0)]);
        assert!(invoice.add_line(line(0, 10, 0)).is_err());
        assert!(invoice.replace_lines(vec![line(2, 10, 0), line(1, -1, 0)]).is_err());
        assert_eq!(invoice.lines, vec![line(1, 10, 0)]);
    }

    #[test]
    fn status_changes_only_when_asked() {
        let mut invoice = Invoice::with_lines(vec![line(1, 10, 0)]);
        invoice.replace_lines(vec![line(2, 10, 0)]).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Draft);

        invoice.set_status(InvoiceStatus::Paid);
        assert_eq!(invoice.status, InvoiceStatus::Paid);
    }

    #[test]
    fn parses_status_names() {
        assert_eq!("Sent".parse::<InvoiceStatus>().unwrap(), InvoiceStatus::Sent);
        assert_eq!("pagada".parse::<InvoiceStatus>().unwrap(), InvoiceStatus::Paid);
        assert_eq!("canceled".parse::<InvoiceStatus>().unwrap(), InvoiceStatus::Cancelled);
        assert!(matches!(
            "void".parse::<InvoiceStatus>(),
            Err(InvoiceError::UnknownStatus(_))
        ));
    }
}
