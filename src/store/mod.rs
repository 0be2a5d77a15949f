use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::account::{Account, AccountNumber};

pub mod in_memory_store;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account not found: {number}")]
    NotFound { number: AccountNumber },
    #[error("account {number} already exists")]
    DuplicateAccount { number: AccountNumber },
    #[error("account {number} is locked by another in-flight operation")]
    Contended { number: AccountNumber },
    #[error("stale version for account {number}, reload and retry")]
    VersionConflict { number: AccountNumber },
}

impl StoreError {
    /// Transient conditions the caller may retry; business failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Contended { .. } | StoreError::VersionConflict { .. }
        )
    }
}

/// Handle to one stored account row, resolved by
/// [`AccountStore::get_for_update`]. Holding the handle does not lock the
/// row; [`AccountRow::lock`] does.
#[derive(Debug)]
pub struct AccountRow {
    number: AccountNumber,
    cell: Arc<Mutex<Account>>,
}

impl AccountRow {
    pub(crate) fn new(number: AccountNumber, cell: Arc<Mutex<Account>>) -> Self {
        Self { number, cell }
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    /// Acquire the row's exclusive lock, failing fast with
    /// [`StoreError::Contended`] when another in-flight operation holds it.
    /// Mutations through the guard are the persisted state; the lock is
    /// released when the guard drops. A poisoned row is reported as
    /// contended as well.
    pub fn lock(&self) -> Result<MutexGuard<'_, Account>, StoreError> {
        self.cell.try_lock().map_err(|_| StoreError::Contended {
            number: self.number.clone(),
        })
    }
}

/// Durable lookup of account records by number, with row-level exclusive
/// locking and optimistic-versioned saves.
///
/// The transfer engine borrows records through this contract for the
/// duration of one transfer; it never owns the storage.
pub trait AccountStore {
    /// Unlocked snapshot read, for use outside a transfer.
    fn get(&self, number: &str) -> Result<Account, StoreError>;

    /// Resolve the row for exclusive locking. A missing number fails here,
    /// before any lock is taken.
    fn get_for_update(&self, number: &str) -> Result<AccountRow, StoreError>;

    /// Create a new account; the number must be unused.
    fn insert(&self, account: Account) -> Result<(), StoreError>;

    /// Optimistic write for the unlocked path: fails with
    /// [`StoreError::VersionConflict`] when the stored row has moved past
    /// the snapshot's version, otherwise stores it with the version bumped.
    fn save(&self, account: &Account) -> Result<(), StoreError>;
}
