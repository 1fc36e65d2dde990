//! Error types for mail-answers.

use std::path::PathBuf;

/// Top-level error type for a scan run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Scan task failed: {0}")]
    Task(String),
}

/// Configuration-related errors. Always fatal, raised before any mail access.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mail source errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Authentication failed: {reason}")]
    AuthFailed { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IMAP connection closed by server")]
    ConnectionClosed,

    #[error("IMAP command {command} failed: {response}")]
    Command { command: String, response: String },

    #[error("Malformed IMAP response: {0}")]
    Protocol(String),

    #[error("Failed to fetch message {id}: {reason}")]
    Fetch { id: String, reason: String },

    #[error("Message {id} has no usable Date header or arrival time")]
    Undated { id: String },
}

/// Snapshot persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to parse snapshot {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to back up snapshot {path} to {backup}: {source}")]
    Backup {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write snapshot {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}
