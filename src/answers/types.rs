//! Core value types: inbound messages, extracted answers and per-sender records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};

/// Display format for the `Date Received` column.
pub const DISPLAY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A Yes/No answer found after the question.
///
/// "No answer found" is `Option::None`, never a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Answer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            v if v.eq_ignore_ascii_case("yes") => Ok(Self::Yes),
            v if v.eq_ignore_ascii_case("no") => Ok(Self::No),
            other => Err(format!("expected Yes or No, got {other:?}")),
        }
    }
}

/// Canonical sender address: the lowercased email address.
///
/// Only constructed through [`SenderKey::from_address`] so the
/// canonical form is computed once, at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SenderKey(String);

impl SenderKey {
    pub fn from_address(address: &str) -> Self {
        Self(address.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message handed over by the mail source. Read-only to the core.
#[derive(Debug, Clone)]
pub struct Message {
    /// Opaque identifier (IMAP UID for the IMAP source).
    pub id: String,
    pub sender_name: String,
    /// Address as observed; compare through [`SenderKey`].
    pub sender_address: String,
    pub received_at: DateTime<FixedOffset>,
    /// Plain-text body; empty when the message has no readable text.
    pub body: String,
}

impl Message {
    pub fn sender_key(&self) -> SenderKey {
        SenderKey::from_address(&self.sender_address)
    }
}

/// One row of the ledger: the latest answer seen from a sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub sender_name: String,
    /// Address in the case it was observed.
    pub sender_address: String,
    /// Human-readable receive time, [`DISPLAY_DATE_FORMAT`].
    pub date_received: String,
    pub answer: Answer,
    /// Ordering key: `received_at` of the message that produced `answer`.
    /// `None` means unknown and orders before every real timestamp.
    pub last_updated: Option<DateTime<FixedOffset>>,
}

impl Record {
    /// Build the candidate record for a message and its extracted answer.
    pub fn from_message(message: &Message, answer: Answer) -> Self {
        Self {
            sender_name: message.sender_name.clone(),
            sender_address: message.sender_address.clone(),
            date_received: message.received_at.format(DISPLAY_DATE_FORMAT).to_string(),
            answer,
            last_updated: Some(message.received_at),
        }
    }

    pub fn key(&self) -> SenderKey {
        SenderKey::from_address(&self.sender_address)
    }
}
