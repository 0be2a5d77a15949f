use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    account::{Account, AccountNumber},
    fee::FeePolicy,
    rates::{CurrencyCode, RateTable},
    retry::{RetryPolicy, Transient},
    store::{AccountStore, StoreError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTransferReason {
    SameAccount,
    NonPositiveAmount,
}

impl fmt::Display for InvalidTransferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameAccount => write!(f, "source and destination accounts cannot be the same"),
            Self::NonPositiveAmount => write!(f, "transfer amount must be positive"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("{0}")]
    InvalidTransfer(InvalidTransferReason),
    #[error("account not found: {number}")]
    AccountNotFound { number: AccountNumber },
    #[error("no exchange rate from {from} to {to}")]
    RateNotFound {
        from: CurrencyCode,
        to: CurrencyCode,
    },
    #[error("insufficient funds in account: {number}")]
    InsufficientFunds { number: AccountNumber },
    #[error("account {number} is locked by a concurrent transfer")]
    Contended { number: AccountNumber },
    #[error("transfer failed after {attempts} attempts, account locks could not be acquired")]
    RetriesExhausted { attempts: u32 },
    /// Unexpected store failure, surfaced without retry.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TransferError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { number } => Self::AccountNotFound { number },
            StoreError::Contended { number } => Self::Contended { number },
            other => Self::Store(other),
        }
    }
}

impl Transient for TransferError {
    fn is_transient(&self) -> bool {
        matches!(self, TransferError::Contended { .. })
    }
}

/// Validated debit leg of a transfer, ready to apply.
struct DebitLeg {
    total: Decimal,
    fee: Decimal,
}

/// The transfer engine: locks both accounts, converts currency, charges the
/// fee on the debit leg, validates sufficiency of funds, applies the
/// debit/credit pair, and retries the whole operation on lock contention.
///
/// Safe to share across threads; every transfer attempt is all-or-nothing,
/// so no partial state is ever visible to a concurrent caller.
pub struct TransferEngine<S> {
    store: S,
    rates: RateTable,
    fees: FeePolicy,
    retry: RetryPolicy,
}

impl<S: AccountStore> TransferEngine<S> {
    pub fn new(store: S, rates: RateTable) -> Self {
        Self::with_policies(store, rates, FeePolicy::default(), RetryPolicy::default())
    }

    pub fn with_policies(store: S, rates: RateTable, fees: FeePolicy, retry: RetryPolicy) -> Self {
        Self {
            store,
            rates,
            fees,
            retry,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Atomically move `amount`, expressed in `currency`, from `source` to
    /// `destination`. Each leg converts independently into its account's
    /// native currency; the source additionally pays the fee.
    ///
    /// Validation failures are detected before any lock is taken. Lock
    /// contention is retried per the engine's [`RetryPolicy`]; business
    /// failures propagate on first occurrence.
    pub fn transfer(
        &self,
        source: &str,
        destination: &str,
        amount: Decimal,
        currency: CurrencyCode,
    ) -> Result<(), TransferError> {
        if source == destination {
            return Err(TransferError::InvalidTransfer(
                InvalidTransferReason::SameAccount,
            ));
        }
        if amount <= Decimal::ZERO {
            return Err(TransferError::InvalidTransfer(
                InvalidTransferReason::NonPositiveAmount,
            ));
        }

        info!(source, destination, %amount, %currency, "starting transfer");
        match self
            .retry
            .run(|| self.attempt(source, destination, amount, currency))
        {
            Err(err) if err.is_transient() => {
                warn!(
                    source,
                    destination,
                    attempts = self.retry.max_attempts,
                    "transfer abandoned, lock contention persisted"
                );
                Err(TransferError::RetriesExhausted {
                    attempts: self.retry.max_attempts,
                })
            }
            other => other,
        }
    }

    /// One all-or-nothing attempt. Both legs are validated against the
    /// locked balances before either mutation is applied, so a failure on
    /// the credit leg never leaves a half-applied debit and nothing ever
    /// needs rolling back. Both row locks are held until the guards drop at
    /// the end of the scope, on success and failure alike.
    fn attempt(
        &self,
        source: &str,
        destination: &str,
        amount: Decimal,
        currency: CurrencyCode,
    ) -> Result<(), TransferError> {
        let source_row = self.store.get_for_update(source)?;
        let destination_row = self.store.get_for_update(destination)?;

        // Lock in account-number order, independent of transfer direction.
        // Opposite transfers over the same pair then contend on the same
        // first lock instead of deadlocking on each other.
        let (mut src, mut dst) = if source < destination {
            let src = source_row.lock()?;
            let dst = destination_row.lock()?;
            (src, dst)
        } else {
            let dst = destination_row.lock()?;
            let src = source_row.lock()?;
            (src, dst)
        };

        let debit = self.plan_withdrawal(&src, amount, currency)?;
        let credit = self.plan_deposit(&dst, amount, currency)?;

        src.debit(debit.total);
        src.bump_version();
        debug!(
            account = src.account_number(),
            total = %debit.total,
            fee = %debit.fee,
            balance = %src.balance(),
            "withdrew"
        );

        dst.credit(credit);
        dst.bump_version();
        debug!(
            account = dst.account_number(),
            %credit,
            balance = %dst.balance(),
            "deposited"
        );
        Ok(())
    }

    /// Validate the debit leg: convert into the source's currency, add the
    /// fee, and check sufficiency of funds. No mutation.
    fn plan_withdrawal(
        &self,
        account: &Account,
        amount: Decimal,
        currency: CurrencyCode,
    ) -> Result<DebitLeg, TransferError> {
        let converted = self.into_account_currency(account, amount, currency)?;
        let fee = self.fees.fee_for(converted);
        let total = converted + fee;

        if account.balance() < total {
            return Err(TransferError::InsufficientFunds {
                number: account.account_number().to_string(),
            });
        }
        Ok(DebitLeg { total, fee })
    }

    /// Validate the credit leg: the same directed conversion as the debit
    /// leg, no fee. No mutation.
    fn plan_deposit(
        &self,
        account: &Account,
        amount: Decimal,
        currency: CurrencyCode,
    ) -> Result<Decimal, TransferError> {
        self.into_account_currency(account, amount, currency)
    }

    fn into_account_currency(
        &self,
        account: &Account,
        amount: Decimal,
        currency: CurrencyCode,
    ) -> Result<Decimal, TransferError> {
        if currency == account.currency_code() {
            return Ok(amount);
        }
        self.rates
            .convert(amount, currency, account.currency_code())
            .ok_or(TransferError::RateNotFound {
                from: currency,
                to: account.currency_code(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use rust_decimal_macros::dec;

    use crate::store::in_memory_store::InMemoryAccountStore;

    use super::*;

    fn code(s: &str) -> CurrencyCode {
        s.parse().unwrap()
    }

    /// Alice holds 1000.00 USD on account 1, Bob 500.00 JPN on account 2,
    /// with the fixed directed rate table.
    fn engine() -> TransferEngine<InMemoryAccountStore> {
        engine_with_retry(RetryPolicy::new(1, Duration::ZERO))
    }

    fn engine_with_retry(retry: RetryPolicy) -> TransferEngine<InMemoryAccountStore> {
        let store = InMemoryAccountStore::new();
        store
            .insert(Account::new("1", "Alice", dec!(1000.00), code("USD")))
            .unwrap();
        store
            .insert(Account::new("2", "Bob", dec!(500.00), code("JPN")))
            .unwrap();

        let mut rates = RateTable::new();
        rates.insert(code("AUD"), code("USD"), dec!(0.5));
        rates.insert(code("USD"), code("JPN"), dec!(144.66));
        rates.insert(code("AUD"), code("JPN"), dec!(93.01));
        rates.insert(code("JPN"), code("USD"), dec!(0.0069));
        rates.insert(code("USD"), code("CNY"), dec!(7.2));
        rates.insert(code("CNY"), code("USD"), dec!(0.14));
        rates.insert(code("CNY"), code("JPN"), dec!(20.02));

        TransferEngine::with_policies(store, rates, FeePolicy::default(), retry)
    }

    fn balance(engine: &TransferEngine<InMemoryAccountStore>, number: &str) -> Decimal {
        engine.store().get(number).unwrap().balance()
    }

    #[test]
    fn same_currency_transfer_charges_one_percent_fee() {
        let engine = engine();
        engine.transfer("1", "2", dec!(50.00), code("USD")).unwrap();
        // 1000.00 - (50.00 + 0.50)
        assert_eq!(balance(&engine, "1"), dec!(949.50));
        // 500.00 + 50.00 * 144.66
        assert_eq!(balance(&engine, "2"), dec!(7733.00));
    }

    #[test]
    fn each_leg_converts_independently() {
        let engine = engine();
        // CNY is native to neither account: CNY->USD on the debit leg,
        // CNY->JPN on the credit leg.
        engine.transfer("1", "2", dec!(100), code("CNY")).unwrap();
        // 100 * 0.14 = 14.00 USD, fee 0.14, total 14.14
        assert_eq!(balance(&engine, "1"), dec!(985.86));
        // 100 * 20.02 = 2002.00 JPN
        assert_eq!(balance(&engine, "2"), dec!(2502.00));
    }

    #[test]
    fn fee_is_charged_on_the_converted_amount() {
        let engine = engine();
        engine.transfer("1", "2", dec!(100), code("AUD")).unwrap();
        // 100 AUD -> 50.0 USD, fee 0.50, total 50.50
        assert_eq!(balance(&engine, "1"), dec!(949.50));
        // 100 AUD -> 9301.00 JPN on the credit leg, no fee
        assert_eq!(balance(&engine, "2"), dec!(9801.00));
    }

    #[test]
    fn transfer_bumps_both_versions_once() {
        let engine = engine();
        engine.transfer("1", "2", dec!(10), code("USD")).unwrap();
        assert_eq!(engine.store().get("1").unwrap().version(), 1);
        assert_eq!(engine.store().get("2").unwrap().version(), 1);
    }

    #[test]
    fn same_account_is_rejected_before_locking() {
        let engine = engine();
        let err = engine.transfer("1", "1", dec!(10), code("USD")).unwrap_err();
        assert!(matches!(
            err,
            TransferError::InvalidTransfer(InvalidTransferReason::SameAccount)
        ));
        assert_eq!(balance(&engine, "1"), dec!(1000.00));
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let engine = engine();
        for amount in [dec!(0), dec!(-5)] {
            let err = engine.transfer("1", "2", amount, code("USD")).unwrap_err();
            assert!(matches!(
                err,
                TransferError::InvalidTransfer(InvalidTransferReason::NonPositiveAmount)
            ));
        }
        assert_eq!(balance(&engine, "1"), dec!(1000.00));
        assert_eq!(balance(&engine, "2"), dec!(500.00));
    }

    #[test]
    fn unknown_accounts_fail_without_mutation() {
        let engine = engine();
        let err = engine.transfer("9", "2", dec!(10), code("USD")).unwrap_err();
        assert!(matches!(err, TransferError::AccountNotFound { number } if number == "9"));

        let err = engine.transfer("1", "9", dec!(10), code("USD")).unwrap_err();
        assert!(matches!(err, TransferError::AccountNotFound { number } if number == "9"));

        assert_eq!(balance(&engine, "1"), dec!(1000.00));
        assert_eq!(balance(&engine, "2"), dec!(500.00));
        // no lock leaked by the failed lookups
        engine.transfer("1", "2", dec!(10), code("USD")).unwrap();
    }

    #[test]
    fn missing_rate_fails_the_transfer() {
        let engine = engine();
        let err = engine
            .transfer("1", "2", dec!(10.00), code("XYZ"))
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::RateNotFound { from, to }
                if from == code("XYZ") && to == code("USD")
        ));
        assert_eq!(balance(&engine, "1"), dec!(1000.00));
        assert_eq!(balance(&engine, "2"), dec!(500.00));
    }

    #[test]
    fn missing_rate_on_the_credit_leg_leaves_the_source_untouched() {
        // GBP->USD covers the debit leg only; the GBP->EUR credit leg misses
        let store = InMemoryAccountStore::new();
        store
            .insert(Account::new("1", "Alice", dec!(1000.00), code("USD")))
            .unwrap();
        store
            .insert(Account::new("2", "Bob", dec!(500.00), code("EUR")))
            .unwrap();
        let mut rates = RateTable::new();
        rates.insert(code("GBP"), code("USD"), dec!(1.27));
        let engine = TransferEngine::new(store, rates);

        let err = engine.transfer("1", "2", dec!(10), code("GBP")).unwrap_err();
        assert!(matches!(
            err,
            TransferError::RateNotFound { from, to }
                if from == code("GBP") && to == code("EUR")
        ));
        // the debit leg had already validated, but nothing was applied
        assert_eq!(engine.store().get("1").unwrap().balance(), dec!(1000.00));
        assert_eq!(engine.store().get("2").unwrap().balance(), dec!(500.00));
    }

    #[test]
    fn insufficient_funds_leaves_both_balances_unchanged() {
        let engine = engine();
        let err = engine
            .transfer("1", "2", dec!(2000.00), code("USD"))
            .unwrap_err();
        assert!(matches!(err, TransferError::InsufficientFunds { number } if number == "1"));
        assert_eq!(balance(&engine, "1"), dec!(1000.00));
        assert_eq!(balance(&engine, "2"), dec!(500.00));
    }

    #[test]
    fn repeated_insufficient_funds_never_mutates() {
        let engine = engine();
        for _ in 0..20 {
            let err = engine
                .transfer("1", "2", dec!(2000.00), code("USD"))
                .unwrap_err();
            assert!(matches!(err, TransferError::InsufficientFunds { .. }));
        }
        assert_eq!(balance(&engine, "1"), dec!(1000.00));
        assert_eq!(balance(&engine, "2"), dec!(500.00));
        assert_eq!(engine.store().get("1").unwrap().version(), 0);
    }

    #[test]
    fn the_fee_counts_against_sufficiency() {
        let engine = engine();
        // 990.10 + 9.9010 fee = 1000.0010 > 1000.00
        let err = engine
            .transfer("1", "2", dec!(990.10), code("USD"))
            .unwrap_err();
        assert!(matches!(err, TransferError::InsufficientFunds { .. }));

        // 990.00 + 9.90 fee = 999.90 fits
        engine.transfer("1", "2", dec!(990.00), code("USD")).unwrap();
        assert_eq!(balance(&engine, "1"), dec!(0.10));
    }

    #[test]
    fn contended_lock_exhausts_the_retry_budget() {
        let engine = engine_with_retry(RetryPolicy::new(2, Duration::from_millis(1)));

        let row = engine.store().get_for_update("1").unwrap();
        let held = row.lock().unwrap();

        let err = engine.transfer("1", "2", dec!(10), code("USD")).unwrap_err();
        assert!(matches!(err, TransferError::RetriesExhausted { attempts: 2 }));

        drop(held);
        engine.transfer("1", "2", dec!(10), code("USD")).unwrap();
    }

    #[test]
    fn retry_succeeds_once_the_lock_is_released() {
        let engine = engine_with_retry(RetryPolicy::new(3, Duration::from_millis(200)));

        let row = engine.store().get_for_update("2").unwrap();
        let holder = thread::spawn(move || {
            let guard = row.lock().unwrap();
            thread::sleep(Duration::from_millis(50));
            drop(guard);
        });
        // give the holder time to take the lock
        thread::sleep(Duration::from_millis(10));

        engine.transfer("1", "2", dec!(10), code("USD")).unwrap();
        holder.join().unwrap();
        assert_eq!(balance(&engine, "1"), dec!(989.90));
    }
}
