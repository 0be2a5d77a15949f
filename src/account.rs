use rust_decimal::{Decimal, RoundingStrategy};

use crate::rates::CurrencyCode;

pub type AccountNumber = String;

/// Number of fractional digits a stored balance carries, mirroring a
/// scale-4 decimal column.
pub const BALANCE_SCALE: u32 = 4;

/// A balance-holding record denominated in a single currency.
///
/// The balance is always expressed in `currency_code`; callers must convert
/// any foreign amount before mutating it. `version` moves only when a
/// mutation is persisted (see [`crate::store`]), never on in-place edits of
/// an unsaved snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    account_number: AccountNumber,
    owner_name: String,
    balance: Decimal,
    currency_code: CurrencyCode,
    version: u64,
}

impl Account {
    pub fn new(
        account_number: impl Into<AccountNumber>,
        owner_name: impl Into<String>,
        balance: Decimal,
        currency_code: CurrencyCode,
    ) -> Self {
        Self {
            account_number: account_number.into(),
            owner_name: owner_name.into(),
            balance: normalize(balance),
            currency_code,
            version: 0,
        }
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn currency_code(&self) -> CurrencyCode {
        self.currency_code
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Owner name is descriptive only, so it may be edited on a snapshot and
    /// written back through [`crate::store::AccountStore::save`].
    pub fn set_owner_name(&mut self, owner_name: impl Into<String>) {
        self.owner_name = owner_name.into();
    }

    /// Add `amount` (already in this account's currency) to the balance.
    pub(crate) fn credit(&mut self, amount: Decimal) {
        self.balance = normalize(self.balance + amount);
    }

    /// Subtract `amount` (already in this account's currency) from the
    /// balance. Caller must have checked sufficiency of funds.
    pub(crate) fn debit(&mut self, amount: Decimal) {
        debug_assert!(self.balance >= amount, "debit would overdraw account");
        self.balance = normalize(self.balance - amount);
    }

    /// Record that this state has been persisted.
    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }
}

fn normalize(balance: Decimal) -> Decimal {
    balance.round_dp_with_strategy(BALANCE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
