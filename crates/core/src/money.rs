use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A currency amount held at two-decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::from(cents) / Decimal::from(100))
    }

    /// Constructors keep amounts within the `i64` cents range, so the
    /// conversion cannot fail.
    pub fn to_cents(self) -> i64 {
        (self.0 * Decimal::from(100)).to_i64().unwrap()
    }

    /// Parses a human-formatted amount such as `"$1,234.56"`.
    ///
    /// Every character other than an ASCII digit or a decimal point is
    /// stripped first, so currency symbols, thousands separators and stray
    /// whitespace are tolerated. Anything that still fails to parse, or is
    /// too large to express in cents, comes back as zero rather than an
    /// error; billing exports treat a garbled amount as $0.00, not as a
    /// bad row.
    pub fn parse_lenient(raw: &str) -> Self {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let value = match Decimal::from_str(&cleaned) {
            Ok(value) => value.round_dp(2),
            Err(_) => return Money::zero(),
        };
        if (value * Decimal::from(100)).to_i64().is_none() {
            return Money::zero();
        }
        Money(value)
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}
