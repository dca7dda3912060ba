//! Credential store
//!
//! A flat username -> password map persisted as a JSON object. Loaded once at
//! startup and saved after every successful sign-up.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AccountFieldError, GameError};
use crate::persistence;

/// Shortest accepted username
pub const MIN_USERNAME_LEN: usize = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct AccountMap(BTreeMap<String, String>);

#[derive(Debug, Clone, Default)]
pub struct AccountStore {
    /// `None` keeps the store in memory only
    path: Option<PathBuf>,
    accounts: AccountMap,
}

impl AccountStore {
    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load accounts from `path`, starting empty when the file does not exist
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, GameError> {
        let path = path.into();
        let accounts = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            let accounts: AccountMap = serde_json::from_str(&json)?;
            log::info!("Loaded {} accounts from {}", accounts.0.len(), path.display());
            accounts
        } else {
            log::info!("No account file at {}, starting fresh", path.display());
            AccountMap::default()
        };
        Ok(Self {
            path: Some(path),
            accounts,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.accounts.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.0.is_empty()
    }

    pub fn exists(&self, username: &str) -> bool {
        self.accounts.0.contains_key(username)
    }

    /// Check a login attempt
    pub fn verify(&self, username: &str, password: &str) -> Result<(), GameError> {
        match self.accounts.0.get(username) {
            Some(stored) if stored == password => Ok(()),
            _ => Err(GameError::InvalidCredentials),
        }
    }

    /// Validate sign-up fields. When several rules fail, the most basic one wins:
    /// missing field, then length, then alphabet, then uniqueness.
    pub fn validate(&self, username: &str, password: &str) -> Result<(), AccountFieldError> {
        if username.is_empty() || password.is_empty() {
            return Err(AccountFieldError::MissingField);
        }
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(AccountFieldError::TooShort);
        }
        if !username.chars().all(char::is_alphabetic) {
            return Err(AccountFieldError::NotAlphabetic);
        }
        if self.exists(username) {
            return Err(AccountFieldError::AlreadyExists);
        }
        Ok(())
    }

    /// Register a new account and persist the store. Nothing changes in
    /// memory unless the save succeeds.
    pub fn create(&mut self, username: &str, password: &str) -> Result<(), GameError> {
        self.validate(username, password)?;
        let mut updated = self.accounts.clone();
        updated
            .0
            .insert(username.to_string(), password.to_string());
        self.save(&updated)?;
        self.accounts = updated;
        log::info!("Created account {}", username);
        Ok(())
    }

    fn save(&self, accounts: &AccountMap) -> Result<(), GameError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string(accounts)?;
        persistence::write_text_atomic(path, &json)?;
        log::debug!("Account store saved ({} entries)", accounts.0.len());
        Ok(())
    }
}
