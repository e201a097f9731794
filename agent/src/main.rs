// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Cloak Agent
//!
//! Entry point for the `cloak-agent` binary. Parses CLI arguments,
//! initializes logging, and dispatches:
//!
//! - `transfer`  : run one confidential transfer and write the reports
//! - `encrypt`   : seal an amount (operator helper)
//! - `decrypt`   : open a ciphertext with the candidate keys (operator helper)
//! - `chains`    : print the effective chain registry
//! - `public-key`: print the application key's public key and address
//! - `version`   : print build version information
//!
//! `transfer` always tries to leave reports behind: a failed transfer is a
//! successful run of the binary as long as the failure record was written.

mod cli;
mod logging;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Instrument;

use cloak_protocol::balance::{decrypt_with_candidates, format_amount, parse_decimal};
use cloak_protocol::crypto::ecies;
use cloak_protocol::crypto::encoding::{decode_hex, encode_hex_prefixed, preview};
use cloak_protocol::crypto::keys::{redact_secret, CloakKeypair, CloakPublicKey};
use cloak_protocol::ledger::{ChainRegistry, JsonRpcLedger, LedgerError};
use cloak_protocol::transfer::{
    Credentials, EngineError, KeyStrategy, TransferEngine, TransferReceipt, TransferRequest,
};

use cli::{CloakAgentCli, Commands, KeyArgs};
use output::ReportWriter;

const DEFAULT_LOG_FILTER: &str = "cloak_agent=info,cloak_protocol=info";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CloakAgentCli::parse();
    logging::init_logging(DEFAULT_LOG_FILTER, cli.log_format);

    match cli.command {
        Commands::Transfer(args) => {
            let span = logging::transfer_span(args.chain_id, &args.output_dir);
            transfer(&cli.keys, cli.chain_registry.as_deref(), args)
                .instrument(span)
                .await
        }
        Commands::Encrypt(args) => encrypt(&cli.keys, args),
        Commands::Decrypt(args) => decrypt(&cli.keys, args),
        Commands::Chains => print_chains(cli.chain_registry.as_deref()),
        Commands::PublicKey => print_public_key(&cli.keys),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// transfer
// ---------------------------------------------------------------------------

async fn transfer(
    keys: &KeyArgs,
    registry_path: Option<&std::path::Path>,
    args: cli::TransferArgs,
) -> Result<()> {
    let writer = ReportWriter::new(&args.output_dir);
    tracing::info!(
        encrypted_amount = %preview(&args.encrypted_amount, 24),
        "starting cloak-agent transfer"
    );

    match run_transfer(keys, registry_path, &args).await {
        Ok(receipt) => {
            tracing::info!(
                transaction = %receipt.transaction_id,
                amount = %receipt.amount,
                sender_balance = %format!("{} -> {}", receipt.sender.previous_balance, receipt.sender.new_balance),
                receiver_balance = %format!("{} -> {}", receipt.receiver.previous_balance, receipt.receiver.new_balance),
                "transfer complete"
            );
            writer.write_success(&receipt, &args.encrypted_amount)
        }
        Err(error) => {
            tracing::error!(kind = %error.kind(), %error, "transfer failed");
            writer.write_failure(&error)
        }
    }
}

/// Everything that can go wrong here is an [`EngineError`], so it has a
/// kind and lands in the failure report.
async fn run_transfer(
    keys: &KeyArgs,
    registry_path: Option<&std::path::Path>,
    args: &cli::TransferArgs,
) -> Result<TransferReceipt, EngineError> {
    let credentials = credentials(keys)?;
    let registry = load_registry(registry_path)?;
    let request = TransferRequest::from_hex(&args.encrypted_amount, &args.sender, &args.receiver)?;

    let engine = TransferEngine::new(
        JsonRpcLedger::new(),
        registry,
        credentials,
        args.engine_options(),
    )?;
    engine.execute(args.chain_id, &request).await
}

fn credentials(keys: &KeyArgs) -> Result<Credentials, EngineError> {
    let app = keys
        .app_secret
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| EngineError::Configuration("IEXEC_APP_DEVELOPER_SECRET is not set".into()))?;
    tracing::info!("got an app secret ({})", redact_secret(app));
    if let Some(ledger) = keys.ledger_key.as_deref().filter(|s| !s.trim().is_empty()) {
        tracing::info!("got a ledger decryption key ({})", redact_secret(ledger));
    }
    Credentials::from_hex(app, keys.ledger_key.as_deref())
}

fn load_registry(path: Option<&std::path::Path>) -> Result<ChainRegistry, LedgerError> {
    match path {
        Some(path) => {
            let registry = ChainRegistry::from_json_file(path)?;
            tracing::info!(path = %path.display(), chains = registry.len(), "chain registry loaded");
            Ok(registry)
        }
        None => Ok(ChainRegistry::with_defaults()),
    }
}

// ---------------------------------------------------------------------------
// Operator helpers
// ---------------------------------------------------------------------------

fn encrypt(keys: &KeyArgs, args: cli::EncryptArgs) -> Result<()> {
    let amount = parse_decimal(args.amount.as_bytes()).context("invalid amount")?;

    let recipient = match args.public_key.as_deref() {
        Some(hex) => {
            let bytes = decode_hex(hex.trim()).context("invalid public key hex")?;
            CloakPublicKey::from_sec1_bytes(&bytes).context("invalid public key")?
        }
        None => credentials(keys)?.app_key().public_key(),
    };

    let ciphertext = ecies::encrypt(&recipient, format_amount(amount).as_bytes())
        .context("encryption failed")?;
    tracing::info!(recipient = %recipient.to_hex(), bytes = ciphertext.len(), "amount sealed");
    println!("{}", encode_hex_prefixed(&ciphertext));
    Ok(())
}

fn decrypt(keys: &KeyArgs, args: cli::DecryptArgs) -> Result<()> {
    let credentials = credentials(keys)?;
    let candidates = KeyStrategy::AppThenLedger.candidates(&credentials)?;
    let data = decode_hex(args.ciphertext.trim()).context("invalid ciphertext hex")?;

    let (plaintext, index) = decrypt_with_candidates(&candidates, &data)?;
    tracing::info!(key = %candidates[index].label(), bytes = plaintext.len(), "ciphertext opened");
    println!("{}", String::from_utf8_lossy(&plaintext));
    Ok(())
}

fn print_chains(registry_path: Option<&std::path::Path>) -> Result<()> {
    let registry = load_registry(registry_path)?;
    println!(
        "{:<10} {:<18} {:<44} {:<9} RPC",
        "CHAIN ID", "NAME", "CONTRACT", "DEPLOYED"
    );
    for chain in registry.iter() {
        println!(
            "{:<10} {:<18} {:<44} {:<9} {}",
            chain.chain_id,
            chain.name,
            chain.contract_address,
            if chain.is_deployed() { "yes" } else { "no" },
            chain.rpc_endpoint
        );
    }
    Ok(())
}

fn print_public_key(keys: &KeyArgs) -> Result<()> {
    let credentials = credentials(keys)?;
    print_key("app", credentials.app_key());
    if let Some(ledger) = credentials.ledger_key() {
        print_key("ledger", ledger);
    }
    Ok(())
}

fn print_key(label: &str, key: &CloakKeypair) {
    println!("[{label}]");
    println!("  Public key (compressed)   : {}", encode_hex_prefixed(&key.public_key_compressed()));
    println!("  Public key (uncompressed) : {}", encode_hex_prefixed(&key.public_key_uncompressed()));
    println!("  Address                   : {}", key.address_hex());
}

/// Prints version information to stdout.
fn print_version() {
    println!("cloak-agent {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    {}", cloak_protocol::config::PROTOCOL_VERSION);
    println!(
        "cipher      ECIES/{} + HKDF-SHA256 + {}",
        cloak_protocol::config::CURVE,
        cloak_protocol::config::SYMMETRIC_ALGORITHM
    );
}
