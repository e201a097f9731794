//! # JSON-RPC Ledger Gateway
//!
//! Talks to an Ethereum-compatible node through an alloy [`Provider`]. The
//! contract surface is declared once with `sol!`; alloy generates the
//! calldata encoders, return decoders and typed call builders from it.
//!
//! ## Call Index
//!
//! | Contract call                    | Transport                          |
//! |----------------------------------|------------------------------------|
//! | `encryptionPublicKey()`          | `eth_call`                         |
//! | `encryptedBalanceOf(address)`    | `eth_call`                         |
//! | `updateBalance(...)`             | `eth_chainId` check, `eth_estimateGas`, signed `eth_sendRawTransaction` |
//!
//! Nonce, fees and chain id of the write are filled in by the provider's
//! fillers; the signer is the application key wrapped in an
//! [`EthereumWallet`]. The gas limit is the node's estimate plus
//! [`GAS_HEADROOM_PERCENT`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;

use super::{BalanceUpdate, ChainConfig, LedgerError, LedgerGateway};
use crate::config::{GAS_HEADROOM_PERCENT, RPC_REQUEST_TIMEOUT};
use crate::crypto::keys::CloakKeypair;
use crate::transfer::types::Account;

sol! {
    /// The encrypted-balance ledger contract.
    #[sol(rpc)]
    interface ICloakLedger {
        function encryptionPublicKey() external view returns (bytes memory);
        function encryptedBalanceOf(address account) external view returns (bytes memory);
        function updateBalance(
            address sender,
            address receiver,
            bytes calldata senderBalance,
            bytes calldata receiverBalance
        ) external;
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// [`LedgerGateway`] over Ethereum JSON-RPC.
///
/// Holds no connection state; a provider is built per call from the chain
/// config, so one instance serves every chain in the registry.
#[derive(Debug, Clone)]
pub struct JsonRpcLedger {
    timeout: Duration,
}

impl Default for JsonRpcLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonRpcLedger {
    pub fn new() -> Self {
        Self::with_timeout(RPC_REQUEST_TIMEOUT)
    }

    /// Upper bound on each individual node round trip.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run one node call under the timeout. Transport and contract errors
    /// both come back as `Network`.
    async fn within<T, E, F>(&self, call: &'static str, fut: F) -> Result<T, LedgerError>
    where
        E: fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(LedgerError::Network(format!("{call}: {e}"))),
            Err(_) => Err(LedgerError::Network(format!(
                "{call}: no response within {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    async fn send_update(
        &self,
        chain: &ChainConfig,
        signer: &CloakKeypair,
        update: &BalanceUpdate,
    ) -> Result<String, LedgerError> {
        let contract_address = contract_address(chain)?;
        let sender = account_address(&update.sender)?;
        let receiver = account_address(&update.receiver)?;

        let wallet_signer = PrivateKeySigner::from_signing_key(signer.signing_key());
        let from = wallet_signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(wallet_signer))
            .connect_http(endpoint(chain)?);

        let node_chain_id = self
            .within("eth_chainId", async { provider.get_chain_id().await })
            .await?;
        if node_chain_id != chain.chain_id {
            return Err(LedgerError::Submission(format!(
                "endpoint {} serves chain {node_chain_id}, expected {}",
                chain.rpc_endpoint, chain.chain_id
            )));
        }

        let contract = ICloakLedger::new(contract_address, provider);
        let call = contract
            .updateBalance(
                sender,
                receiver,
                Bytes::copy_from_slice(&update.sender_ciphertext),
                Bytes::copy_from_slice(&update.receiver_ciphertext),
            )
            .from(from);

        let estimate = self
            .within("eth_estimateGas", async { call.estimate_gas().await })
            .await?;
        let gas_limit = with_headroom(estimate);
        tracing::info!(%from, estimate, gas_limit, "submitting updateBalance");

        let pending = self
            .within("eth_sendRawTransaction", async { call.gas(gas_limit).send().await })
            .await?;
        Ok(alloy::hex::encode_prefixed(pending.tx_hash()))
    }
}

/// `estimate` plus [`GAS_HEADROOM_PERCENT`], saturating.
fn with_headroom(estimate: u64) -> u64 {
    estimate.saturating_add(estimate.saturating_mul(GAS_HEADROOM_PERCENT) / 100)
}

fn endpoint(chain: &ChainConfig) -> Result<Url, LedgerError> {
    chain.rpc_endpoint.parse::<Url>().map_err(|e| {
        LedgerError::Registry(format!(
            "invalid rpc endpoint {:?} for chain {}: {e}",
            chain.rpc_endpoint, chain.chain_id
        ))
    })
}

fn contract_address(chain: &ChainConfig) -> Result<Address, LedgerError> {
    chain.contract_address.parse::<Address>().map_err(|_| {
        LedgerError::Registry(format!(
            "invalid contract address {:?} for chain {}",
            chain.contract_address, chain.chain_id
        ))
    })
}

fn account_address(account: &Account) -> Result<Address, LedgerError> {
    account
        .as_str()
        .parse::<Address>()
        .map_err(|_| LedgerError::InvalidAccount(account.to_string()))
}

#[async_trait]
impl LedgerGateway for JsonRpcLedger {
    async fn read_encryption_public_key(&self, chain: &ChainConfig) -> Result<Vec<u8>, LedgerError> {
        let provider = ProviderBuilder::new().connect_http(endpoint(chain)?);
        let contract = ICloakLedger::new(contract_address(chain)?, provider);
        let key = self
            .within("encryptionPublicKey", async {
                contract.encryptionPublicKey().call().await
            })
            .await?;
        tracing::info!(chain_id = chain.chain_id, bytes = key.len(), "encryption public key retrieved");
        Ok(key.to_vec())
    }

    async fn read_encrypted_balance(
        &self,
        chain: &ChainConfig,
        account: &Account,
    ) -> Result<Vec<u8>, LedgerError> {
        let address = account_address(account)?;
        let provider = ProviderBuilder::new().connect_http(endpoint(chain)?);
        let contract = ICloakLedger::new(contract_address(chain)?, provider);
        let balance = self
            .within("encryptedBalanceOf", async {
                contract.encryptedBalanceOf(address).call().await
            })
            .await?;
        Ok(balance.to_vec())
    }

    async fn submit_balance_update(
        &self,
        chain: &ChainConfig,
        signer: &CloakKeypair,
        update: &BalanceUpdate,
    ) -> Result<String, LedgerError> {
        self.send_update(chain, signer, update)
            .await
            .map_err(|e| match e {
                LedgerError::Submission(_) => e,
                other => LedgerError::Submission(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::keccak256;
    use alloy::sol_types::SolCall;

    use super::*;

    const CONTRACT: &str = "0x3b3C98D7AfF91b7032d81fC25dfe8d8ECFe546CC";

    fn selector_of(signature: &str) -> [u8; 4] {
        let digest = keccak256(signature.as_bytes());
        [digest[0], digest[1], digest[2], digest[3]]
    }

    #[test]
    fn test_contract_signatures() {
        assert_eq!(
            ICloakLedger::encryptionPublicKeyCall::SIGNATURE,
            "encryptionPublicKey()"
        );
        assert_eq!(
            ICloakLedger::encryptedBalanceOfCall::SIGNATURE,
            "encryptedBalanceOf(address)"
        );
        assert_eq!(
            ICloakLedger::updateBalanceCall::SIGNATURE,
            "updateBalance(address,address,bytes,bytes)"
        );
        assert_eq!(
            ICloakLedger::encryptedBalanceOfCall::SELECTOR,
            selector_of("encryptedBalanceOf(address)")
        );
    }

    #[test]
    fn test_update_calldata_layout() {
        let call = ICloakLedger::updateBalanceCall {
            sender: Address::repeat_byte(0x11),
            receiver: Address::repeat_byte(0x22),
            senderBalance: Bytes::from_static(&[0xaa; 93]),
            receiverBalance: Bytes::from_static(&[0xbb; 94]),
        };
        let data = call.abi_encode();
        assert_eq!(data[..4], selector_of("updateBalance(address,address,bytes,bytes)"));
        // selector, 4 head words, then each `bytes` as length word + padded body
        assert_eq!(data.len(), 4 + 4 * 32 + (32 + 96) + (32 + 96));
    }

    #[test]
    fn test_gas_headroom() {
        assert_eq!(with_headroom(100_000), 120_000);
        assert_eq!(with_headroom(0), 0);
        assert_eq!(with_headroom(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_account_must_be_an_address() {
        assert!(account_address(&Account::new(CONTRACT)).is_ok());
        assert!(account_address(&Account::new("3b3c98d7aff91b7032d81fc25dfe8d8ecfe546cc")).is_ok());
        assert!(matches!(
            account_address(&Account::new("alice")),
            Err(LedgerError::InvalidAccount(_))
        ));
    }

    #[test]
    fn test_bad_endpoint_is_a_registry_error() {
        let chain = ChainConfig::new(1, "broken", CONTRACT, "not a url");
        assert!(matches!(endpoint(&chain), Err(LedgerError::Registry(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let ledger = JsonRpcLedger::new();
        let chain = ChainConfig::new(1, "nowhere", CONTRACT, "http://127.0.0.1:1");
        assert!(matches!(
            ledger.read_encryption_public_key(&chain).await,
            Err(LedgerError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_submission() {
        let ledger = JsonRpcLedger::with_timeout(Duration::from_secs(5));
        let chain = ChainConfig::new(1, "nowhere", CONTRACT, "http://127.0.0.1:1");
        let update = BalanceUpdate {
            sender: Account::new("0x1111111111111111111111111111111111111111"),
            receiver: Account::new("0x2222222222222222222222222222222222222222"),
            sender_ciphertext: vec![0xaa; 93],
            receiver_ciphertext: vec![0xbb; 93],
        };
        assert!(matches!(
            ledger
                .submit_balance_update(&chain, &CloakKeypair::generate(), &update)
                .await,
            Err(LedgerError::Submission(_))
        ));
    }
}
