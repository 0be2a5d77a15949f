use std::{
    collections::{HashMap, hash_map::Entry},
    sync::{Arc, Mutex, RwLock},
};

use crate::account::{Account, AccountNumber};

use super::{AccountRow, AccountStore, StoreError};

/// In-memory [`AccountStore`] where each row carries its own mutex as the
/// row-level exclusive lock. The outer map lock is held only for lookups
/// and inserts, never across a transfer.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<AccountNumber, Arc<Mutex<Account>>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All accounts ordered by number, for boundary-layer reporting.
    pub fn accounts(&self) -> Vec<Account> {
        let map = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<Account> = map
            .values()
            .map(|cell| cell.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .collect();
        all.sort_by(|a, b| a.account_number().cmp(b.account_number()));
        all
    }

    fn cell(&self, number: &str) -> Result<Arc<Mutex<Account>>, StoreError> {
        let map = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        map.get(number).cloned().ok_or_else(|| StoreError::NotFound {
            number: number.to_string(),
        })
    }
}

impl AccountStore for InMemoryAccountStore {
    fn get(&self, number: &str) -> Result<Account, StoreError> {
        let cell = self.cell(number)?;
        let guard = cell.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone())
    }

    fn get_for_update(&self, number: &str) -> Result<AccountRow, StoreError> {
        let cell = self.cell(number)?;
        Ok(AccountRow::new(number.to_string(), cell))
    }

    fn insert(&self, account: Account) -> Result<(), StoreError> {
        let mut map = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        match map.entry(account.account_number().to_string()) {
            Entry::Occupied(entry) => Err(StoreError::DuplicateAccount {
                number: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(account)));
                Ok(())
            }
        }
    }

    fn save(&self, account: &Account) -> Result<(), StoreError> {
        let cell = self.cell(account.account_number())?;
        let mut stored = cell.lock().unwrap_or_else(|e| e.into_inner());
        if stored.version() != account.version() {
            return Err(StoreError::VersionConflict {
                number: account.account_number().to_string(),
            });
        }
        *stored = account.clone();
        stored.bump_version();
        Ok(())
    }
}
