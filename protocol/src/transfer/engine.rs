//! # Transfer Engine
//!
//! One invocation, start to finish:
//!
//! ```text
//!   TransferRequest
//!        │
//!        ├── resolve chain (registry, no I/O) ── UnsupportedChain
//!        ├── open amount with candidate keys ─── TooShort / Malformed / DecryptionFailure
//!        │
//!        ├── try_join! ┬─ encryptionPublicKey()
//!        │             ├─ encryptedBalanceOf(sender)     (Ledger model only)
//!        │             └─ encryptedBalanceOf(receiver)   (Ledger model only)
//!        │
//!        ├── resolve balances (BalanceResolver + UndecryptablePolicy)
//!        ├── compute_transfer
//!        ├── seal both new balances under the ledger key
//!        └── submit once ─────────────────────── SubmissionFailure
//! ```
//!
//! The amount is opened before anything touches the network, so a request
//! that can never succeed costs no RPC calls.
//!
//! The engine holds no state between invocations. Secrets arrive through
//! [`Credentials`] at construction; nothing here reads the environment.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use super::compute::{compute_transfer, parse_transfer_amount};
use super::error::EngineError;
use super::types::{LedgerSnapshot, PartyReport, TransferReceipt, TransferRequest};
use crate::balance::{
    decrypt_with_candidates, format_amount, BalanceOrigin, BalanceResolver, CandidateKey,
    ResolvedBalance, UndecryptablePolicy,
};
use crate::crypto::ecies;
use crate::crypto::keys::{CloakKeypair, CloakPublicKey, KeyError};
use crate::ledger::{BalanceUpdate, ChainConfig, ChainRegistry, LedgerError, LedgerGateway};
use crate::transfer::error::TransferError;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// The keys an invocation runs with.
///
/// The application key signs the ledger update and is a decryption
/// candidate. The optional ledger key is a second decryption candidate for
/// balances that were sealed ledger-side.
#[derive(Debug, Clone)]
pub struct Credentials {
    app: CloakKeypair,
    ledger: Option<CloakKeypair>,
}

impl Credentials {
    pub fn new(app: CloakKeypair, ledger: Option<CloakKeypair>) -> Self {
        Self { app, ledger }
    }

    /// Parse both keys from hex. A blank ledger key counts as absent.
    pub fn from_hex(app_hex: &str, ledger_hex: Option<&str>) -> Result<Self, EngineError> {
        let app = CloakKeypair::from_hex(app_hex).map_err(|e| credential_error("application", e))?;
        let ledger = match ledger_hex.map(str::trim).filter(|s| !s.is_empty()) {
            Some(hex) => Some(CloakKeypair::from_hex(hex).map_err(|e| credential_error("ledger", e))?),
            None => None,
        };
        Ok(Self { app, ledger })
    }

    pub fn app_key(&self) -> &CloakKeypair {
        &self.app
    }

    pub fn ledger_key(&self) -> Option<&CloakKeypair> {
        self.ledger.as_ref()
    }
}

fn credential_error(which: &str, e: KeyError) -> EngineError {
    EngineError::Configuration(format!("{which} key: {e}"))
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Which keys are tried, and in which order, when opening ciphertexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    AppOnly,
    LedgerOnly,
    /// Application key first, ledger key second if one was supplied.
    #[default]
    AppThenLedger,
    LedgerThenApp,
}

impl KeyStrategy {
    /// Build the ordered candidate list. Only `LedgerOnly` insists on a
    /// ledger key; the fallback strategies just skip it when absent.
    pub fn candidates(&self, credentials: &Credentials) -> Result<Vec<CandidateKey>, EngineError> {
        let app = || CandidateKey::new("app", credentials.app.clone());
        let ledger = || {
            credentials
                .ledger
                .clone()
                .map(|key| CandidateKey::new("ledger", key))
        };

        let candidates = match self {
            Self::AppOnly => vec![app()],
            Self::LedgerOnly => vec![ledger().ok_or_else(|| {
                EngineError::Configuration("ledger-only key strategy needs a ledger key".into())
            })?],
            Self::AppThenLedger => std::iter::once(app()).chain(ledger()).collect(),
            Self::LedgerThenApp => ledger().into_iter().chain(std::iter::once(app())).collect(),
        };
        Ok(candidates)
    }
}

/// Where prior balances come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceModel {
    /// Read and decrypt both stored balances.
    #[default]
    Ledger,
    /// Skip the balance reads. The sender is taken to hold exactly the
    /// amount and the receiver nothing, so the commit is a pure delta: the
    /// sender ends at zero, the receiver at the amount.
    ZeroSum,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    pub key_strategy: KeyStrategy,
    pub balance_model: BalanceModel,
    pub undecryptable_policy: UndecryptablePolicy,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct TransferEngine<L> {
    ledger: L,
    registry: ChainRegistry,
    credentials: Credentials,
    options: EngineOptions,
    candidates: Vec<CandidateKey>,
}

impl<L: LedgerGateway> TransferEngine<L> {
    /// Fails only if `options.key_strategy` can't be satisfied by
    /// `credentials`.
    pub fn new(
        ledger: L,
        registry: ChainRegistry,
        credentials: Credentials,
        options: EngineOptions,
    ) -> Result<Self, EngineError> {
        let candidates = options.key_strategy.candidates(&credentials)?;
        info!(
            signer = %credentials.app.address_hex(),
            candidates = candidates.len(),
            strategy = ?options.key_strategy,
            model = ?options.balance_model,
            policy = ?options.undecryptable_policy,
            "transfer engine ready"
        );
        Ok(Self {
            ledger,
            registry,
            credentials,
            options,
            candidates,
        })
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn candidates(&self) -> &[CandidateKey] {
        &self.candidates
    }

    /// Run one transfer on `chain_id`.
    ///
    /// At most one submission is attempted. Any error before it means
    /// nothing was written.
    pub async fn execute(
        &self,
        chain_id: u64,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, EngineError> {
        let invocation_id = Uuid::new_v4();
        let span = tracing::info_span!("transfer", %invocation_id, chain_id);
        self.run(invocation_id, chain_id, request)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        invocation_id: Uuid,
        chain_id: u64,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, EngineError> {
        info!(sender = %request.sender, receiver = %request.receiver, "transfer requested");

        if request.sender.same_as(&request.receiver) {
            return Err(TransferError::SameAccount.into());
        }

        let chain = self.registry.resolve(chain_id)?;
        info!(chain = %chain.name, contract = %chain.contract_address, "chain resolved");

        let (plaintext, key_index) =
            decrypt_with_candidates(&self.candidates, &request.encrypted_amount)
                .map_err(EngineError::AmountDecryption)?;
        let amount = parse_transfer_amount(&plaintext)?;
        info!(%amount, key = %self.candidates[key_index].label(), "transfer amount decrypted");

        let snapshot = self.read_snapshot(&chain, request).await?;
        let recipient = CloakPublicKey::from_sec1_bytes(&snapshot.encryption_public_key)
            .map_err(|e| LedgerError::InvalidResponse(format!("ledger encryption public key: {e}")))?;

        let (sender, receiver) = self.resolve_balances(request, &snapshot, amount)?;
        let outcome = compute_transfer(amount, sender.amount, receiver.amount)?;
        info!(
            sender_before = %outcome.sender_previous,
            sender_after = %outcome.sender_new,
            receiver_before = %outcome.receiver_previous,
            receiver_after = %outcome.receiver_new,
            "transfer computed"
        );

        let update = BalanceUpdate {
            sender: request.sender.clone(),
            receiver: request.receiver.clone(),
            sender_ciphertext: ecies::encrypt(&recipient, format_amount(outcome.sender_new).as_bytes())
                .map_err(EngineError::Encryption)?,
            receiver_ciphertext: ecies::encrypt(
                &recipient,
                format_amount(outcome.receiver_new).as_bytes(),
            )
            .map_err(EngineError::Encryption)?,
        };
        debug!(
            sender_bytes = update.sender_ciphertext.len(),
            receiver_bytes = update.receiver_ciphertext.len(),
            "new balances sealed"
        );

        let transaction_id = self
            .ledger
            .submit_balance_update(&chain, &self.credentials.app, &update)
            .await?;
        info!(%transaction_id, "balance update submitted");

        let anomalies = [("sender", &sender), ("receiver", &receiver)]
            .into_iter()
            .filter(|(_, resolved)| resolved.is_anomalous())
            .map(|(side, _)| format!("{side} balance could not be decrypted and was treated as 0"))
            .collect();

        Ok(TransferReceipt {
            invocation_id,
            chain_id: chain.chain_id,
            chain_name: chain.name,
            transaction_id,
            amount,
            sender: PartyReport {
                account: update.sender,
                previous_balance: outcome.sender_previous,
                new_balance: outcome.sender_new,
                origin: sender.origin,
                new_ciphertext: update.sender_ciphertext,
            },
            receiver: PartyReport {
                account: update.receiver,
                previous_balance: outcome.receiver_previous,
                new_balance: outcome.receiver_new,
                origin: receiver.origin,
                new_ciphertext: update.receiver_ciphertext,
            },
            encryption_public_key: recipient.to_hex(),
            anomalies,
            completed_at: chrono::Utc::now(),
        })
    }

    /// Fetch everything the invocation needs from the ledger, concurrently.
    /// The first failing read fails the lot.
    async fn read_snapshot(
        &self,
        chain: &ChainConfig,
        request: &TransferRequest,
    ) -> Result<LedgerSnapshot, EngineError> {
        let snapshot = match self.options.balance_model {
            BalanceModel::Ledger => {
                let (encryption_public_key, sender_balance, receiver_balance) = tokio::try_join!(
                    self.ledger.read_encryption_public_key(chain),
                    self.ledger.read_encrypted_balance(chain, &request.sender),
                    self.ledger.read_encrypted_balance(chain, &request.receiver),
                )?;
                LedgerSnapshot {
                    encryption_public_key,
                    sender_balance,
                    receiver_balance,
                }
            }
            BalanceModel::ZeroSum => LedgerSnapshot {
                encryption_public_key: self.ledger.read_encryption_public_key(chain).await?,
                ..LedgerSnapshot::default()
            },
        };
        debug!(
            public_key_bytes = snapshot.encryption_public_key.len(),
            sender_bytes = snapshot.sender_balance.len(),
            receiver_bytes = snapshot.receiver_balance.len(),
            "ledger snapshot read"
        );
        Ok(snapshot)
    }

    fn resolve_balances(
        &self,
        request: &TransferRequest,
        snapshot: &LedgerSnapshot,
        amount: Decimal,
    ) -> Result<(ResolvedBalance, ResolvedBalance), EngineError> {
        match self.options.balance_model {
            BalanceModel::Ledger => {
                let resolver =
                    BalanceResolver::new(&self.candidates, self.options.undecryptable_policy);
                let sender = resolver.resolve(&request.sender, &snapshot.sender_balance)?;
                let receiver = resolver.resolve(&request.receiver, &snapshot.receiver_balance)?;
                for (side, resolved) in [("sender", &sender), ("receiver", &receiver)] {
                    if resolved.is_anomalous() {
                        warn!(side, "continuing with a zero balance in place of an unreadable one");
                    }
                }
                Ok((sender, receiver))
            }
            BalanceModel::ZeroSum => Ok((
                ResolvedBalance {
                    amount,
                    origin: BalanceOrigin::Assumed,
                },
                ResolvedBalance {
                    amount: Decimal::ZERO,
                    origin: BalanceOrigin::Assumed,
                },
            )),
        }
    }
}
