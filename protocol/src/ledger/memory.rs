//! In-process ledger.
//!
//! Behaves like the contract (one ciphertext per account, empty until first
//! written) and records every call so tests can assert on what the engine
//! did: how many reads, whether a submission was attempted, and with what.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BalanceUpdate, ChainConfig, LedgerError, LedgerGateway};
use crate::crypto::keys::CloakKeypair;
use crate::transfer::types::Account;

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    public_key: Vec<u8>,
    balances: Mutex<HashMap<String, Vec<u8>>>,
    submissions: Mutex<Vec<BalanceUpdate>>,
    read_failure: Option<LedgerError>,
    submit_failure: Option<LedgerError>,
    reads: AtomicUsize,
    submits: AtomicUsize,
}

impl InMemoryLedger {
    /// A ledger advertising `public_key` (SEC1 bytes) with no balances.
    pub fn new(public_key: Vec<u8>) -> Self {
        Self {
            public_key,
            ..Self::default()
        }
    }

    /// Seed a stored ciphertext.
    pub fn with_balance(self, account: &str, ciphertext: Vec<u8>) -> Self {
        self.balances.lock().insert(key(account), ciphertext);
        self
    }

    /// Make every read (public key and balances) fail with `error`.
    pub fn fail_reads_with(mut self, error: LedgerError) -> Self {
        self.read_failure = Some(error);
        self
    }

    /// Make every submission fail with `error`. The attempt is still counted.
    pub fn fail_submissions_with(mut self, error: LedgerError) -> Self {
        self.submit_failure = Some(error);
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    /// Successfully applied updates, oldest first.
    pub fn submissions(&self) -> Vec<BalanceUpdate> {
        self.submissions.lock().clone()
    }

    /// Current stored ciphertext for `account` (empty if never written).
    pub fn stored_balance(&self, account: &str) -> Vec<u8> {
        self.balances.lock().get(&key(account)).cloned().unwrap_or_default()
    }

    fn check_read(&self) -> Result<(), LedgerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match &self.read_failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

fn key(account: &str) -> String {
    account.trim().to_ascii_lowercase()
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn read_encryption_public_key(&self, _chain: &ChainConfig) -> Result<Vec<u8>, LedgerError> {
        self.check_read()?;
        Ok(self.public_key.clone())
    }

    async fn read_encrypted_balance(
        &self,
        _chain: &ChainConfig,
        account: &Account,
    ) -> Result<Vec<u8>, LedgerError> {
        self.check_read()?;
        Ok(self.stored_balance(account.as_str()))
    }

    async fn submit_balance_update(
        &self,
        _chain: &ChainConfig,
        _signer: &CloakKeypair,
        update: &BalanceUpdate,
    ) -> Result<String, LedgerError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(e) = &self.submit_failure {
            return Err(e.clone());
        }

        {
            let mut balances = self.balances.lock();
            balances.insert(key(update.sender.as_str()), update.sender_ciphertext.clone());
            balances.insert(key(update.receiver.as_str()), update.receiver_ciphertext.clone());
        }
        self.submissions.lock().push(update.clone());
        Ok(format!("0x{n:064x}"))
    }
}
