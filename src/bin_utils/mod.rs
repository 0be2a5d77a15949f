//! Boundary layer wiring: seeds reference data, streams CSV requests
//! through the transfer engine and reports final account state.

use std::io::{Read, Write};

use anyhow::Result;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::{
    account::Account,
    engine::{TransferEngine, TransferError},
    rates::{CurrencyCode, RateTable},
    store::{AccountStore, StoreError, in_memory_store::InMemoryAccountStore},
};
use csv_parser::{CsvRequestParser, RequestKind, RequestRow};
use csv_printer::{AccountRecord, print_accounts};

pub mod csv_parser;
pub mod csv_printer;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("`{field}` is required for {op:?}")]
    MissingField {
        op: RequestKind,
        field: &'static str,
    },
    #[error("Initial balance must not be negative")]
    NegativeInitialBalance,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    RequestErr(#[from] RequestError),
    #[error(transparent)]
    TransferErr(#[from] TransferError),
    #[error(transparent)]
    StoreErr(#[from] StoreError),
}

/// A validated inbound request.
#[derive(Debug)]
pub enum Request {
    CreateAccount {
        owner: String,
        initial_balance: Decimal,
        currency: CurrencyCode,
    },
    Transfer {
        source: String,
        destination: String,
        amount: Decimal,
        currency: CurrencyCode,
    },
}

impl Request {
    pub fn parse_row(row: RequestRow) -> Result<Self, RequestError> {
        let op = row.op;
        let required = |field: &'static str| RequestError::MissingField { op, field };
        let currency = row.currency.ok_or(required("currency"))?;
        let amount = row.amount.ok_or(required("amount"))?;

        match op {
            RequestKind::Create => {
                if amount < Decimal::ZERO {
                    return Err(RequestError::NegativeInitialBalance);
                }
                Ok(Self::CreateAccount {
                    owner: row.owner.ok_or(required("owner"))?,
                    initial_balance: amount,
                    currency,
                })
            }
            RequestKind::Transfer => Ok(Self::Transfer {
                source: row.source.ok_or(required("source"))?,
                destination: row.destination.ok_or(required("destination"))?,
                amount,
                currency,
            }),
        }
    }
}

/// Seed data loaded once at process start: two accounts and a small fixed
/// set of directed exchange rates.
pub fn seed(store: &InMemoryAccountStore) -> Result<RateTable> {
    store.insert(Account::new(
        "1",
        "Alice",
        "1000.00".parse()?,
        "USD".parse()?,
    ))?;
    store.insert(Account::new("2", "Bob", "500.00".parse()?, "JPN".parse()?))?;

    let rate_rows = [
        ("AUD", "USD", "0.5"),
        ("USD", "JPN", "144.66"),
        ("AUD", "JPN", "93.01"),
        ("JPN", "USD", "0.0069"),
        ("USD", "CNY", "7.2"),
        ("CNY", "USD", "0.14"),
        ("CNY", "JPN", "20.02"),
    ];
    let mut rates = RateTable::new();
    for (from, to, rate) in rate_rows {
        rates.insert(from.parse()?, to.parse()?, rate.parse()?);
    }
    info!("seeded 2 accounts and {} exchange rates", rate_rows.len());
    Ok(rates)
}

/// Inbound create-account operation: assigns the next free numeric account
/// number and stores the record.
pub fn create_account(
    engine: &TransferEngine<InMemoryAccountStore>,
    owner: impl Into<String>,
    initial_balance: Decimal,
    currency: CurrencyCode,
) -> Result<Account, ServiceError> {
    let number = next_account_number(engine.store());
    let account = Account::new(number.to_string(), owner, initial_balance, currency);
    engine.store().insert(account.clone())?;
    Ok(account)
}

fn next_account_number(store: &InMemoryAccountStore) -> u64 {
    store
        .accounts()
        .iter()
        .filter_map(|a| a.account_number().parse::<u64>().ok())
        .max()
        .map_or(1, |n| n + 1)
}

pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub error_printer: Box<dyn FnMut(u64, ServiceError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    pub fn run(mut self) -> Result<()> {
        let parser = CsvRequestParser::new(self.input);

        let store = InMemoryAccountStore::new();
        let rates = seed(&store)?;
        let engine = TransferEngine::new(store, rates);

        for (line, row) in parser {
            if let Err(err) = handle_row(&engine, row) {
                (self.error_printer)(line, err);
            }
        }

        print_accounts(
            self.output,
            engine.store().accounts().into_iter().map(|acc| AccountRecord {
                account: acc.account_number().to_string(),
                owner: acc.owner_name().to_string(),
                balance: acc.balance(),
                currency: acc.currency_code(),
                version: acc.version(),
            }),
        )
    }
}

fn handle_row(
    engine: &TransferEngine<InMemoryAccountStore>,
    row: RequestRow,
) -> Result<(), ServiceError> {
    match Request::parse_row(row)? {
        Request::CreateAccount {
            owner,
            initial_balance,
            currency,
        } => {
            create_account(engine, owner, initial_balance, currency)?;
            Ok(())
        }
        Request::Transfer {
            source,
            destination,
            amount,
            currency,
        } => Ok(engine.transfer(&source, &destination, amount, currency)?),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn row(op: RequestKind) -> RequestRow {
        RequestRow {
            op,
            owner: Some("Carol".to_string()),
            source: Some("1".to_string()),
            destination: Some("2".to_string()),
            amount: Some(dec!(10)),
            currency: Some("USD".parse().unwrap()),
        }
    }

    #[test]
    fn transfer_rows_need_source_and_destination() {
        let mut r = row(RequestKind::Transfer);
        r.source = None;
        let err = Request::parse_row(r).unwrap_err();
        assert!(matches!(
            err,
            RequestError::MissingField {
                op: RequestKind::Transfer,
                field: "source"
            }
        ));
    }

    #[test]
    fn create_rows_need_an_owner_and_reject_negative_balances() {
        let mut r = row(RequestKind::Create);
        r.owner = None;
        assert!(matches!(
            Request::parse_row(r).unwrap_err(),
            RequestError::MissingField { field: "owner", .. }
        ));

        let mut r = row(RequestKind::Create);
        r.amount = Some(dec!(-1));
        assert!(matches!(
            Request::parse_row(r).unwrap_err(),
            RequestError::NegativeInitialBalance
        ));
    }

    #[test]
    fn created_accounts_continue_the_seed_numbering() {
        let store = InMemoryAccountStore::new();
        let rates = seed(&store).unwrap();
        let engine = TransferEngine::new(store, rates);

        let acc = create_account(&engine, "Carol", dec!(250.00), "USD".parse().unwrap()).unwrap();
        assert_eq!(acc.account_number(), "3");
        assert_eq!(engine.store().get("3").unwrap().balance(), dec!(250.00));
    }
}
