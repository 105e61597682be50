use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;

use super::company::NumberingSettings;
use crate::error::Result;
use crate::invoice::{Invoice, InvoiceTotals};
use crate::numbering::NumberingState;

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct State {
    #[serde(default)]
    pub counter: Counter,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Persisted half of the numbering scope. Only ever moves forward, even when
/// invoices are deleted.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    pub next_sequence: NonZeroU64,
}

impl Default for Counter {
    fn default() -> Self {
        Self {
            next_sequence: NonZeroU64::MIN,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HistoryEntry {
    pub number: String,
    pub client: String,
    pub date: NaiveDate,
    /// Day the invoice was actually issued, independent of `date`. Missing in
    /// state files written before it existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub invoice: Invoice,
}

impl HistoryEntry {
    /// Totals recomputed from the stored lines
    pub fn totals(&self) -> Result<InvoiceTotals> {
        self.invoice.totals()
    }

    /// The day this entry counts against monthly quotas.
    pub fn counted_on(&self) -> NaiveDate {
        self.issued_on.unwrap_or(self.date)
    }
}

impl State {
    /// Combine the configured prefix and format with the persisted counter.
    pub fn numbering(&self, settings: &NumberingSettings) -> NumberingState {
        NumberingState::new(settings.prefix.clone(), settings.format.clone())
            .starting_at(self.counter.next_sequence)
    }

    /// Store an issued invoice together with the advanced numbering state.
    pub fn record_issue(&mut self, entry: HistoryEntry, numbering: &NumberingState) {
        self.counter.next_sequence = numbering.next_sequence;
        self.history.push(entry);
    }

    pub fn find(&self, number: &str) -> Option<&HistoryEntry> {
        self.history.iter().find(|e| e.number == number)
    }

    pub fn find_mut(&mut self, number: &str) -> Option<&mut HistoryEntry> {
        self.history.iter_mut().find(|e| e.number == number)
    }

    /// Remove an invoice. The counter is left alone so the number is never
    /// handed out again.
    pub fn remove(&mut self, number: &str) -> Option<HistoryEntry> {
        let idx = self.history.iter().position(|e| e.number == number)?;
        Some(self.history.remove(idx))
    }

    /// Invoices issued in the same calendar month as `day`, whatever date
    /// they carry.
    pub fn invoices_in_month(&self, day: NaiveDate) -> u64 {
        self.history
            .iter()
            .map(HistoryEntry::counted_on)
            .filter(|issued| issued.year() == day.year() && issued.month() == day.month())
            .count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{InvoiceLine, InvoiceStatus};
    use rust_decimal::Decimal;

    fn entry(number: &str, date: &str) -> HistoryEntry {
        HistoryEntry {
            number: number.to_string(),
            client: "acme".to_string(),
            date: date.parse().unwrap(),
            issued_on: None,
            notes: None,
            invoice: Invoice::with_lines(vec![InvoiceLine::new(
                "Consulting",
                Decimal::from(3),
                Decimal::from(10),
                Decimal::from(21),
            )]),
        }
    }

    #[test]
    fn round_trips_through_toml() {
        let mut state = State::default();
        state.counter.next_sequence = NonZeroU64::new(3).unwrap();
        let mut issued = entry("2025-0002", "2025-03-10");
        issued.issued_on = Some("2025-04-02".parse().unwrap());
        issued.invoice.set_status(InvoiceStatus::Paid);
        state.history.push(issued);

        let text = toml::to_string_pretty(&state).unwrap();
        let parsed: State = toml::from_str(&text).unwrap();
        assert_eq!(parsed.counter.next_sequence.get(), 3);
        assert_eq!(parsed.history[0].invoice, state.history[0].invoice);
        assert_eq!(parsed.history[0].invoice.status, InvoiceStatus::Paid);
        assert_eq!(parsed.history[0].issued_on, state.history[0].issued_on);
        assert_eq!(parsed.history[0].totals().unwrap().total, Decimal::new(3630, 2));
    }

    #[test]
    fn accepts_numeric_amounts_in_hand_written_state() {
        let parsed: State = toml::from_str(
            r#"[counter]
next_sequence = 2

[[history]]
number = "2025-0001"
client = "acme"
date = "2025-01-05"
status = "sent"

[[history.lines]]
description = "Consulting"
quantity = 3
unit_price = 10.0
tax_rate_percent = 21
"#,
        )
        .unwrap();
        assert_eq!(parsed.history[0].invoice.status, InvoiceStatus::Sent);
        assert_eq!(parsed.history[0].issued_on, None);
        assert_eq!(parsed.history[0].totals().unwrap().total_tax, Decimal::new(630, 2));
    }

    #[test]
    fn zero_sequence_is_rejected() {
        let parsed: std::result::Result<State, _> = toml::from_str("[counter]\nnext_sequence = 0\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn deleting_does_not_rewind_the_counter() {
        let settings = NumberingSettings::default();
        let mut state = State::default();

        let (number, advanced) = state.numbering(&settings).issue(2025).unwrap();
        state.record_issue(entry(&number, "2025-01-05"), &advanced);
        assert!(state.remove(&number).is_some());

        let (again, _) = state.numbering(&settings).issue(2025).unwrap();
        assert_eq!(number, "2025-0001");
        assert_eq!(again, "2025-0002");
    }

    #[test]
    fn counts_invoices_per_calendar_month() {
        let mut state = State::default();
        state.history.push(entry("a", "2025-03-01"));
        state.history.push(entry("b", "2025-03-31"));
        state.history.push(entry("c", "2025-04-01"));
        state.history.push(entry("d", "2024-03-15"));
        assert_eq!(state.invoices_in_month("2025-03-20".parse().unwrap()), 2);
        assert!(state.find("c").is_some());
        assert!(state.find("z").is_none());
    }

    #[test]
    fn back_dated_invoices_count_in_the_month_they_were_issued() {
        let mut state = State::default();
        for n in 0..3 {
            let mut back_dated = entry(&format!("old-{n}"), "2020-01-15");
            back_dated.issued_on = Some("2025-03-02".parse().unwrap());
            state.history.push(back_dated);
        }

        assert_eq!(state.invoices_in_month("2025-03-20".parse().unwrap()), 3);
        assert_eq!(state.invoices_in_month("2020-01-20".parse().unwrap()), 0);
    }
}
