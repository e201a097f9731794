//! # CLI Interface
//!
//! Defines the command-line argument structure for `cloak-agent` using
//! `clap` derive. Every secret and setting has an environment fallback,
//! because inside the enclave that's how they arrive.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use cloak_protocol::balance::UndecryptablePolicy;
use cloak_protocol::config::DEFAULT_CHAIN_ID;
use cloak_protocol::transfer::{BalanceModel, EngineOptions, KeyStrategy};

use crate::logging::LogFormat;

/// Cloak confidential transfer agent.
///
/// Runs one confidential balance transfer against an encrypted-balance
/// ledger, plus a few operator helpers for sealing and opening amounts.
#[derive(Parser, Debug)]
#[command(
    name = "cloak-agent",
    about = "Cloak confidential transfer agent",
    version,
    propagate_version = true
)]
pub struct CloakAgentCli {
    /// Log output format.
    #[arg(long, global = true, env = "CLOAK_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(flatten)]
    pub keys: KeyArgs,

    /// JSON file replacing the built-in chain registry.
    #[arg(long, global = true, env = "CLOAK_CHAIN_REGISTRY")]
    pub chain_registry: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Key material. Values are hex secrets; clap is told to keep env values
/// out of `--help`.
#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Application secret: signs the ledger update and is the first
    /// decryption candidate.
    #[arg(long, global = true, env = "IEXEC_APP_DEVELOPER_SECRET", hide_env_values = true)]
    pub app_secret: Option<String>,

    /// Optional second decryption candidate for balances sealed
    /// ledger-side.
    #[arg(long, global = true, env = "CLOAK_LEDGER_DECRYPTION_KEY", hide_env_values = true)]
    pub ledger_key: Option<String>,
}

/// Top-level subcommands for the agent binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute one confidential transfer and write the reports.
    Transfer(TransferArgs),
    /// Seal an amount under a public key (defaults to the app key's).
    Encrypt(EncryptArgs),
    /// Open a ciphertext with the candidate keys.
    Decrypt(DecryptArgs),
    /// Print the effective chain registry.
    Chains,
    /// Print the application key's public key and signer address.
    PublicKey,
    /// Print version information and exit.
    Version,
}

/// Arguments for the `transfer` subcommand.
#[derive(Args, Debug)]
pub struct TransferArgs {
    /// Hex ciphertext of the amount (`0x` optional).
    pub encrypted_amount: String,

    /// Sender account address.
    pub sender: String,

    /// Receiver account address.
    pub receiver: String,

    /// Chain to run against.
    #[arg(long, env = "CLOAK_CHAIN_ID", default_value_t = DEFAULT_CHAIN_ID)]
    pub chain_id: u64,

    /// Directory the reports are written to.
    #[arg(long, short = 'o', env = "IEXEC_OUT", default_value = ".")]
    pub output_dir: PathBuf,

    /// Fail instead of treating an undecryptable stored balance as zero.
    #[arg(long, env = "CLOAK_STRICT_BALANCES")]
    pub strict_balances: bool,

    /// Which keys are tried when opening ciphertexts, and in what order.
    #[arg(long, value_enum, default_value_t = KeyStrategyArg::AppThenLedger)]
    pub key_strategy: KeyStrategyArg,

    /// Where prior balances come from.
    #[arg(long, value_enum, default_value_t = BalanceModelArg::Ledger)]
    pub balance_model: BalanceModelArg,
}

impl TransferArgs {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            key_strategy: self.key_strategy.into(),
            balance_model: self.balance_model.into(),
            undecryptable_policy: if self.strict_balances {
                UndecryptablePolicy::Reject
            } else {
                UndecryptablePolicy::TreatAsZero
            },
        }
    }
}

/// Arguments for the `encrypt` subcommand.
#[derive(Args, Debug)]
pub struct EncryptArgs {
    /// Amount to seal, e.g. `30` or `0.25`.
    pub amount: String,

    /// Recipient public key, compressed or uncompressed SEC1 hex.
    #[arg(long)]
    pub public_key: Option<String>,
}

/// Arguments for the `decrypt` subcommand.
#[derive(Args, Debug)]
pub struct DecryptArgs {
    /// Hex ciphertext (`0x` optional).
    pub ciphertext: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyStrategyArg {
    AppOnly,
    LedgerOnly,
    AppThenLedger,
    LedgerThenApp,
}

impl From<KeyStrategyArg> for KeyStrategy {
    fn from(arg: KeyStrategyArg) -> Self {
        match arg {
            KeyStrategyArg::AppOnly => KeyStrategy::AppOnly,
            KeyStrategyArg::LedgerOnly => KeyStrategy::LedgerOnly,
            KeyStrategyArg::AppThenLedger => KeyStrategy::AppThenLedger,
            KeyStrategyArg::LedgerThenApp => KeyStrategy::LedgerThenApp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BalanceModelArg {
    Ledger,
    ZeroSum,
}

impl From<BalanceModelArg> for BalanceModel {
    fn from(arg: BalanceModelArg) -> Self {
        match arg {
            BalanceModelArg::Ledger => BalanceModel::Ledger,
            BalanceModelArg::ZeroSum => BalanceModel::ZeroSum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        CloakAgentCli::command().debug_assert();
    }

    #[test]
    fn test_transfer_defaults() {
        let cli = CloakAgentCli::try_parse_from([
            "cloak-agent",
            "transfer",
            "0xabcd",
            "0x1111111111111111111111111111111111111111",
            "0x2222222222222222222222222222222222222222",
            "--chain-id",
            "421614",
        ])
        .unwrap();
        let Commands::Transfer(args) = cli.command else {
            panic!("expected transfer subcommand");
        };
        assert_eq!(args.chain_id, 421_614);
        assert_eq!(args.engine_options(), EngineOptions::default());
    }

    #[test]
    fn test_strict_and_zero_sum_flags() {
        let cli = CloakAgentCli::try_parse_from([
            "cloak-agent",
            "transfer",
            "00",
            "a",
            "b",
            "--strict-balances",
            "--balance-model",
            "zero-sum",
            "--key-strategy",
            "ledger-then-app",
        ])
        .unwrap();
        let Commands::Transfer(args) = cli.command else {
            panic!("expected transfer subcommand");
        };
        let options = args.engine_options();
        assert_eq!(options.undecryptable_policy, UndecryptablePolicy::Reject);
        assert_eq!(options.balance_model, BalanceModel::ZeroSum);
        assert_eq!(options.key_strategy, KeyStrategy::LedgerThenApp);
    }
}
