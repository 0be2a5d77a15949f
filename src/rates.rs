use std::{collections::HashMap, fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("currency code must be exactly 3 ASCII letters, got `{0}`")]
pub struct InvalidCurrencyCode(String);

/// A 3-letter currency code, normalized to uppercase.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        // bytes are validated ASCII letters on construction
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl FromStr for CurrencyCode {
    type Err = InvalidCurrencyCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(InvalidCurrencyCode(s.to_string()));
        }
        let mut code = [0u8; 3];
        for (dst, src) in code.iter_mut().zip(bytes) {
            *dst = src.to_ascii_uppercase();
        }
        Ok(Self(code))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = InvalidCurrencyCode;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurrencyCode({})", self.as_str())
    }
}

/// Directed exchange rates, keyed by ordered `(from, to)` pair.
///
/// Lookups are exact: the reverse pair is a miss unless a reverse row was
/// separately inserted, and rates are not assumed invertible. Reference
/// data loaded once at startup, read-only afterwards.
#[derive(Debug, Default)]
pub struct RateTable {
    rates: HashMap<(CurrencyCode, CurrencyCode), Decimal>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the single rate row for the ordered pair, replacing any
    /// previous one.
    pub fn insert(&mut self, from: CurrencyCode, to: CurrencyCode, rate: Decimal) {
        self.rates.insert((from, to), rate);
    }

    pub fn lookup(&self, from: CurrencyCode, to: CurrencyCode) -> Option<Decimal> {
        self.rates.get(&(from, to)).copied()
    }

    /// Multiply `amount` by the directed rate, `None` when no row exists.
    pub fn convert(&self, amount: Decimal, from: CurrencyCode, to: CurrencyCode) -> Option<Decimal> {
        self.lookup(from, to).map(|rate| amount * rate)
    }
}
