use std::io::Read;

use csv::{DeserializeRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::rates::CurrencyCode;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Create,
    Transfer,
}

/// One raw boundary request row. Which optional columns are required
/// depends on `op`; [`super::Request`] validates that.
#[derive(Debug, Deserialize)]
pub struct RequestRow {
    pub op: RequestKind,
    pub owner: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<CurrencyCode>,
}

/// Parses boundary requests in CSV format
///
/// # Panics
///
/// If a row cannot be parsed
pub struct CsvRequestParser<R> {
    iter: DeserializeRecordsIntoIter<R, RequestRow>,
}

impl<R> CsvRequestParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R> Iterator for CsvRequestParser<R>
where
    R: Read,
{
    type Item = (u64, RequestRow);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row.unwrap()))
    }
}
