use std::io::Write;

use csv::Writer;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::rates::CurrencyCode;

/// Serialize a balance with exactly 4 decimal places
fn serialize_decimal_4dp<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.4}"))
}

#[derive(Debug, Serialize)]
pub struct AccountRecord {
    pub account: String,
    pub owner: String,
    #[serde(serialize_with = "serialize_decimal_4dp")]
    pub balance: Decimal,
    pub currency: CurrencyCode,
    pub version: u64,
}

pub fn print_accounts<W>(
    output: &mut W,
    accounts: impl Iterator<Item = AccountRecord>,
) -> anyhow::Result<()>
where
    W: Write,
{
    let mut writer = Writer::from_writer(output);
    for acc in accounts {
        if let Err(err) = writer.serialize(acc) {
            anyhow::bail!("Failed to write to CSV: {err}")
        }
    }
    // Ensure all data is flushed to the output
    if let Err(err) = writer.flush() {
        anyhow::bail!("Failed to flush CSV writer: {err}")
    }
    Ok(())
}
