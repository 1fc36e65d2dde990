//! Configuration types, built from environment variables.
//!
//! Every required setting is checked up front so a misconfigured run fails
//! before any mailbox access is attempted.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::answers::DEFAULT_WINDOW_CHARS;
use crate::error::ConfigError;

/// What to scan for and where the ledger lives.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Subject substring the mail source filters on.
    pub subject_filter: String,
    /// Question text searched for in each body.
    pub question: String,
    /// Characters after the question searched for Yes/No.
    pub window_chars: usize,
    /// CSV snapshot file.
    pub snapshot_path: PathBuf,
    /// Folder that newly recorded or updated messages are moved to.
    pub processed_folder: Option<String>,
}

/// Service-principal credentials for the OAuth client-credentials grant.
#[derive(Debug)]
pub struct OAuthConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

/// How to authenticate the IMAP session.
#[derive(Debug)]
pub enum ImapAuth {
    /// `AUTHENTICATE XOAUTH2` with a token from the identity platform.
    OAuth(OAuthConfig),
    /// Plain `LOGIN`.
    Password(SecretString),
}

/// Mailbox connection settings.
#[derive(Debug)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    /// Mailbox owner; also the IMAP user name.
    pub email_address: String,
    /// Folder searched for matching messages.
    pub folder: String,
    pub auth: ImapAuth,
}

/// Everything a run needs.
#[derive(Debug)]
pub struct Config {
    pub scan: ScanConfig,
    pub imap: ImapConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            scan: ScanConfig::from_lookup(&lookup)?,
            imap: ImapConfig::from_lookup(&lookup)?,
        })
    }
}

impl ScanConfig {
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let subject_filter = required(lookup, "TARGET_SUBJECT")?;
        let question = required(lookup, "SEARCH_QUESTION")?;
        let snapshot_path = PathBuf::from(required(lookup, "OUTPUT_CSV_FILE")?);

        let window_chars = match optional(lookup, "ANSWER_WINDOW_CHARS") {
            None => DEFAULT_WINDOW_CHARS,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "ANSWER_WINDOW_CHARS".into(),
                        message: format!("expected a positive integer, got {raw:?}"),
                    });
                }
            },
        };

        Ok(Self {
            subject_filter,
            question,
            window_chars,
            snapshot_path,
            processed_folder: optional(lookup, "PROCESSED_FOLDER"),
        })
    }
}

impl ImapConfig {
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = required(lookup, "IMAP_SERVER")?;
        let email_address = required(lookup, "EMAIL_ADDRESS")?;

        let port = match optional(lookup, "IMAP_PORT") {
            None => 993,
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "IMAP_PORT".into(),
                message: e.to_string(),
            })?,
        };

        let folder = optional(lookup, "IMAP_FOLDER").unwrap_or_else(|| "INBOX".to_string());

        // OAuth wins when any of its variables is present; then all are required.
        let oauth_keys = ["TENANT_ID", "CLIENT_ID", "CLIENT_SECRET"];
        let auth = if oauth_keys.iter().any(|k| optional(lookup, k).is_some()) {
            ImapAuth::OAuth(OAuthConfig {
                tenant_id: required(lookup, "TENANT_ID")?,
                client_id: required(lookup, "CLIENT_ID")?,
                client_secret: SecretString::from(required(lookup, "CLIENT_SECRET")?),
            })
        } else if let Some(password) = optional(lookup, "EMAIL_PASSWORD") {
            ImapAuth::Password(SecretString::from(password))
        } else {
            return Err(ConfigError::MissingEnvVar(
                "TENANT_ID/CLIENT_ID/CLIENT_SECRET or EMAIL_PASSWORD".into(),
            ));
        };

        Ok(Self {
            host,
            port,
            email_address,
            folder,
            auth,
        })
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    optional(lookup, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("IMAP_SERVER", "outlook.office365.com"),
        ("EMAIL_ADDRESS", "survey@example.com"),
        ("TARGET_SUBJECT", "Offsite RSVP"),
        ("SEARCH_QUESTION", "Will you attend?"),
        ("OUTPUT_CSV_FILE", "answers.csv"),
    ];

    fn with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        BASE.iter().chain(extra).copied().collect()
    }

    #[test]
    fn oauth_config_with_defaults() {
        let pairs = with(&[
            ("TENANT_ID", "tenant"),
            ("CLIENT_ID", "client"),
            ("CLIENT_SECRET", "s3cret"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.scan.window_chars, DEFAULT_WINDOW_CHARS);
        assert_eq!(config.scan.processed_folder, None);
        assert_eq!(config.scan.snapshot_path, PathBuf::from("answers.csv"));
        assert_eq!(config.imap.port, 993);
        assert_eq!(config.imap.folder, "INBOX");
        let ImapAuth::OAuth(oauth) = &config.imap.auth else {
            panic!("expected OAuth credentials");
        };
        assert_eq!(oauth.tenant_id, "tenant");
        assert_eq!(oauth.client_secret.expose_secret(), "s3cret");
    }

    #[test]
    fn password_auth_when_no_oauth_vars() {
        let pairs = with(&[
            ("EMAIL_PASSWORD", "hunter2"),
            ("IMAP_PORT", "1993"),
            ("PROCESSED_FOLDER", "Processed"),
            ("ANSWER_WINDOW_CHARS", "250"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert!(matches!(config.imap.auth, ImapAuth::Password(_)));
        assert_eq!(config.imap.port, 1993);
        assert_eq!(config.scan.processed_folder.as_deref(), Some("Processed"));
        assert_eq!(config.scan.window_chars, 250);
    }

    #[test]
    fn missing_question_is_reported_by_name() {
        let pairs: Vec<_> = with(&[("EMAIL_PASSWORD", "pw")])
            .into_iter()
            .filter(|(k, _)| *k != "SEARCH_QUESTION")
            .collect();
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "SEARCH_QUESTION"));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let pairs = with(&[("EMAIL_PASSWORD", "pw"), ("TARGET_SUBJECT", "   ")]);
        // Later duplicate key wins in the map.
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "TARGET_SUBJECT"));
    }

    #[test]
    fn partial_oauth_requires_the_rest() {
        let pairs = with(&[("TENANT_ID", "tenant"), ("EMAIL_PASSWORD", "pw")]);
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "CLIENT_ID"));
    }

    #[test]
    fn no_credentials_is_an_error() {
        let err = Config::from_lookup(lookup(BASE)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let pairs = with(&[("EMAIL_PASSWORD", "pw"), ("IMAP_PORT", "imap")]);
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "IMAP_PORT"));

        let pairs = with(&[("EMAIL_PASSWORD", "pw"), ("ANSWER_WINDOW_CHARS", "0")]);
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "ANSWER_WINDOW_CHARS")
        );
    }
}
