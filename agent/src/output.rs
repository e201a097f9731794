//! # Invocation Reports
//!
//! Every `transfer` invocation leaves three files in the output directory,
//! success or not:
//!
//! | File            | Success                          | Failure                        |
//! |-----------------|----------------------------------|--------------------------------|
//! | `result.json`   | the full [`TransferReceipt`]     | `{status, error-kind, ...}`    |
//! | `result.txt`    | human-readable transfer report   | human-readable failure line    |
//! | `computed.json` | `deterministic-output-path`      | same, plus `error-message` and `error-kind` |
//!
//! `computed.json` is what the enclave runtime reads to find the result.
//! Nothing written here ever contains key material.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use cloak_protocol::transfer::{EngineError, ErrorKind, TransferReceipt};

pub const RESULT_JSON: &str = "result.json";
pub const RESULT_TXT: &str = "result.txt";
pub const COMPUTED_JSON: &str = "computed.json";

/// Contents of `computed.json`.
#[derive(Debug, Serialize)]
struct Computed {
    #[serde(rename = "deterministic-output-path")]
    deterministic_output_path: String,
    #[serde(rename = "error-message", skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(rename = "error-kind", skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
}

/// `result.json` when the invocation failed.
#[derive(Debug, Serialize)]
struct FailureRecord {
    status: &'static str,
    #[serde(rename = "error-kind")]
    error_kind: ErrorKind,
    #[serde(rename = "error-message")]
    error_message: String,
    failed_at: DateTime<Utc>,
}

/// Writes the reports for one invocation into a directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write the confirmation record. `encrypted_amount` is echoed into the
    /// text report as the requester supplied it.
    pub fn write_success(&self, receipt: &TransferReceipt, encrypted_amount: &str) -> Result<()> {
        self.ensure_dir()?;
        self.write_json(RESULT_JSON, receipt)?;
        self.write_file(RESULT_TXT, &render_receipt(receipt, encrypted_amount))?;
        self.write_json(
            COMPUTED_JSON,
            &Computed {
                deterministic_output_path: self.dir.join(RESULT_TXT).display().to_string(),
                error_message: None,
                error_kind: None,
            },
        )?;
        tracing::info!(dir = %self.dir.display(), "success reports written");
        Ok(())
    }

    /// Write the failure record.
    pub fn write_failure(&self, error: &EngineError) -> Result<()> {
        self.ensure_dir()?;
        let kind = error.kind();
        let message = error.to_string();

        self.write_json(
            RESULT_JSON,
            &FailureRecord {
                status: "failed",
                error_kind: kind,
                error_message: message.clone(),
                failed_at: Utc::now(),
            },
        )?;
        self.write_file(RESULT_TXT, &format!("Transfer failed ({kind}): {message}\n"))?;
        self.write_json(
            COMPUTED_JSON,
            &Computed {
                deterministic_output_path: self.dir.display().to_string(),
                error_message: Some(message),
                error_kind: Some(kind),
            },
        )?;
        tracing::info!(dir = %self.dir.display(), %kind, "failure reports written");
        Ok(())
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create output directory {}", self.dir.display()))
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("failed to serialize {name}"))?;
        self.write_file(name, &json)
    }

    fn write_file(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

/// The plain-text transfer report.
pub fn render_receipt(receipt: &TransferReceipt, encrypted_amount: &str) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "Transfer Details:");
    let _ = writeln!(out, "==================");
    let _ = writeln!(out, "Transfer Amount: {}", receipt.amount);
    for (role, party) in [("Sender", &receipt.sender), ("Receiver", &receipt.receiver)] {
        let _ = writeln!(out, "{role} Wallet: {}", party.account);
        let _ = writeln!(out, "  - Previous Balance: {}", party.previous_balance);
        let _ = writeln!(out, "  - New Balance: {}", party.new_balance);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Contract Interaction:");
    let _ = writeln!(out, "=====================");
    let _ = writeln!(out, "Chain: {} ({})", receipt.chain_name, receipt.chain_id);
    let _ = writeln!(out, "Transaction Hash: {}", receipt.transaction_id);
    let _ = writeln!(out, "Encryption Public Key: {}", receipt.encryption_public_key);
    let _ = writeln!(
        out,
        "Sender New Balance (encrypted): {}",
        hex_prefixed(&receipt.sender.new_ciphertext)
    );
    let _ = writeln!(
        out,
        "Receiver New Balance (encrypted): {}",
        hex_prefixed(&receipt.receiver.new_ciphertext)
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Raw Encrypted Input:");
    let _ = writeln!(out, "====================");
    let _ = writeln!(out, "Encrypted Amount: {encrypted_amount}");
    let _ = writeln!(out, "Decrypted Amount: {}", receipt.amount);
    if receipt.has_anomalies() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Warnings:");
        let _ = writeln!(out, "=========");
        for anomaly in &receipt.anomalies {
            let _ = writeln!(out, "  - {anomaly}");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Invocation: {}", receipt.invocation_id);
    let _ = writeln!(out, "Completed At: {}", receipt.completed_at.to_rfc3339());
    out
}

fn hex_prefixed(bytes: &[u8]) -> String {
    cloak_protocol::crypto::encoding::encode_hex_prefixed(bytes)
}
