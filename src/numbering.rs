use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use std::str::FromStr;

use crate::error::{InvoiceError, Result};

/// Default numbering format, e.g. `2025-0001`
pub const DEFAULT_TEMPLATE: &str = "{year}-{seq:04}";

/// Widest zero padding accepted for the sequence placeholder
pub const MAX_SEQUENCE_WIDTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Year,
    Sequence { width: usize },
}

/// A parsed invoice number template.
///
/// Supported placeholders:
/// - `{year}`: four-digit year
/// - `{seq}`: sequence without padding
/// - `{seq:04}` / `{seq:4}` / `{number:04d}`: sequence zero-padded to the width
///
/// `{{` and `}}` produce literal braces. Anything else inside braces is
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl NumberTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut token = String::new();
                    let mut closed = false;
                    for t in chars.by_ref() {
                        if t == '}' {
                            closed = true;
                            break;
                        }
                        token.push(t);
                    }
                    if !closed {
                        return Err(InvoiceError::invalid_format(
                            template,
                            "unclosed placeholder",
                        ));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(template, &token)?);
                }
                '}' => {
                    return Err(InvoiceError::invalid_format(template, "unmatched '}'"));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if !segments
            .iter()
            .any(|s| matches!(s, Segment::Sequence { .. }))
        {
            return Err(InvoiceError::invalid_format(
                template,
                "missing sequence placeholder such as {seq:04}",
            ));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// Render the template for a year and sequence number.
    pub fn render(&self, year: i32, sequence: u64) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Year => {
                    if !(0..=9999).contains(&year) {
                        return Err(InvoiceError::invalid_format(
                            &self.source,
                            format!("year {year} does not fit the 4-digit year placeholder"),
                        ));
                    }
                    out.push_str(&format!("{year:04}"));
                }
                Segment::Sequence { width } => {
                    out.push_str(&format!("{sequence:0width$}", width = *width));
                }
            }
        }
        Ok(out)
    }
}

impl FromStr for NumberTemplate {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self> {
        NumberTemplate::parse(s)
    }
}

fn parse_placeholder(template: &str, token: &str) -> Result<Segment> {
    let (name, spec) = match token.split_once(':') {
        Some((name, spec)) => (name.trim(), Some(spec.trim())),
        None => (token.trim(), None),
    };

    match (name, spec) {
        ("year", None) => Ok(Segment::Year),
        ("seq" | "number", None) => Ok(Segment::Sequence { width: 0 }),
        ("seq" | "number", Some(spec)) => {
            let digits = spec.strip_suffix('d').unwrap_or(spec);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(InvoiceError::invalid_format(
                    template,
                    format!("invalid sequence width '{spec}'"),
                ));
            }
            let width: usize = digits.parse().map_err(|_| {
                InvoiceError::invalid_format(template, format!("invalid sequence width '{spec}'"))
            })?;
            if width == 0 || width > MAX_SEQUENCE_WIDTH {
                return Err(InvoiceError::invalid_format(
                    template,
                    format!("sequence width must be between 1 and {MAX_SEQUENCE_WIDTH}"),
                ));
            }
            Ok(Segment::Sequence { width })
        }
        _ => Err(InvoiceError::invalid_format(
            template,
            format!("unsupported placeholder '{{{token}}}'"),
        )),
    }
}

/// Render `template` for the given year and sequence.
pub fn format(template: &str, year: i32, sequence: u64) -> Result<String> {
    NumberTemplate::parse(template)?.render(year, sequence)
}

/// Numbering scope for one company.
///
/// Callers must serialize read-issue-persist per scope (a row lock or an
/// atomic counter in the store); two concurrent `issue` calls on the same
/// snapshot would hand out the same number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingState {
    #[serde(default)]
    pub prefix: String,
    pub next_sequence: NonZeroU64,
    #[serde(default = "default_template")]
    pub format_template: String,
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

impl Default for NumberingState {
    fn default() -> Self {
        Self::new("", DEFAULT_TEMPLATE)
    }
}

impl NumberingState {
    /// A fresh scope starting at sequence 1.
    pub fn new(prefix: impl Into<String>, format_template: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next_sequence: NonZeroU64::MIN,
            format_template: format_template.into(),
        }
    }

    pub fn starting_at(mut self, next_sequence: NonZeroU64) -> Self {
        self.next_sequence = next_sequence;
        self
    }

    /// The number `issue` would hand out for `year`, without consuming it.
    pub fn peek(&self, year: i32) -> Result<String> {
        let template = NumberTemplate::parse(&self.format_template)?;
        let rendered = template.render(year, self.next_sequence.get())?;
        Ok(format!("{}{}", self.prefix, rendered))
    }

    /// Issue the current number for `year` and return the advanced state.
    ///
    /// The sequence advances by exactly one; `self` is left untouched so a
    /// failed persist can simply be retried from the same snapshot.
    pub fn issue(&self, year: i32) -> Result<(String, NumberingState)> {
        let number = self.peek(year)?;
        let next_sequence = self
            .next_sequence
            .checked_add(1)
            .ok_or(InvoiceError::SequenceExhausted)?;

        tracing::debug!(
            number = %number,
            sequence = self.next_sequence.get(),
            "issued invoice number"
        );

        Ok((
            number,
            NumberingState {
                next_sequence,
                ..self.clone()
            },
        ))
    }

    /// Issue using the current local year.
    pub fn next(&self) -> Result<(String, NumberingState)> {
        self.issue(chrono::Local::now().year())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn formats_year_and_padded_sequence() {
        assert_eq!(format("{year}-{seq:04}", 2025, 7).unwrap(), "2025-0007");
        assert_eq!(format("{year}-{seq:4}", 2025, 7).unwrap(), "2025-0007");
        assert_eq!(format("{year}-{number:04d}", 2025, 7).unwrap(), "2025-0007");
    }

    #[test]
    fn sequence_wider_than_padding_is_not_truncated() {
        assert_eq!(format("{seq:03}", 2025, 12345).unwrap(), "12345");
        assert_eq!(format("N{seq}", 2025, 42).unwrap(), "N42");
    }

    #[test]
    fn escaped_braces_are_literal() {
        assert_eq!(format("{{{year}}}/{seq:2}", 2024, 3).unwrap(), "{2024}/03");
    }

    #[test]
    fn rejects_unsupported_syntax() {
        for bad in [
            "{year}-{month}-{seq:04}",
            "{year}-{seq:ab}",
            "{year}-{seq:}",
            "{year}-{seq:0}",
            "{year}-{seq:99}",
            "{year}-{seq:04",
            "{year}}-{seq}",
            "INV-{year}",
            "",
        ] {
            match format(bad, 2025, 1) {
                Err(InvoiceError::InvalidNumberFormat { template, .. }) => {
                    assert_eq!(template, bad)
                }
                other => panic!("expected InvalidNumberFormat for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_year_that_is_not_four_digits() {
        assert!(format("{year}-{seq}", 10_000, 1).is_err());
        assert_eq!(format("{year}-{seq}", 999, 1).unwrap(), "0999-1");
    }

    #[test]
    fn issue_advances_by_exactly_one() {
        let state = NumberingState::new("", DEFAULT_TEMPLATE);
        let (first, state) = state.issue(2025).unwrap();
        let (second, state) = state.issue(2025).unwrap();
        assert_eq!(first, "2025-0001");
        assert_eq!(second, "2025-0002");
        assert_eq!(state.next_sequence.get(), 3);
    }

    #[test]
    fn issue_leaves_the_snapshot_untouched() {
        let state = NumberingState::new("FAC-", DEFAULT_TEMPLATE)
            .starting_at(NonZeroU64::new(7).unwrap());
        let (number, advanced) = state.issue(2025).unwrap();
        assert_eq!(number, "FAC-2025-0007");
        assert_eq!(state.next_sequence.get(), 7);
        assert_eq!(advanced.next_sequence.get(), 8);
        assert_eq!(advanced.prefix, "FAC-");
        assert_eq!(state.peek(2025).unwrap(), number);
    }

    #[test]
    fn issued_numbers_never_repeat() {
        let mut state = NumberingState::new("", "{seq:02}");
        let mut seen = HashSet::new();
        for _ in 0..250 {
            let (number, next) = state.issue(2025).unwrap();
            assert!(seen.insert(number));
            state = next;
        }
        assert_eq!(state.next_sequence.get(), 251);
    }

    #[test]
    fn bad_template_does_not_advance() {
        let state = NumberingState::new("", "{year}-{nope}");
        assert!(state.issue(2025).is_err());
        assert_eq!(state.next_sequence.get(), 1);
    }

    #[test]
    fn exhausted_sequence_is_an_error() {
        let state = NumberingState::new("", "{seq}").starting_at(NonZeroU64::MAX);
        assert!(matches!(
            state.issue(2025),
            Err(InvoiceError::SequenceExhausted)
        ));
    }
}
