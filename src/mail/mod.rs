//! Mail source abstraction and the IMAP implementation behind it.

pub mod imap;
pub mod oauth;
pub mod parse;

pub use imap::{ImapMailbox, Login};

use crate::answers::types::Message;
use crate::error::MailError;

/// Where scanned messages come from. Pure I/O, no answer logic.
///
/// Enumeration is lazy: the scan lists ids once and fetches them one at a
/// time, so a failure part-way still leaves earlier results usable.
pub trait MailSource {
    /// Ids of messages whose subject contains `subject`, in mailbox order.
    fn list(&mut self, subject: &str) -> Result<Vec<String>, MailError>;

    /// Fetch and parse one message.
    ///
    /// [`MailError::Fetch`] and [`MailError::Undated`] mean only this message
    /// is unusable; any other error means the source itself failed.
    fn fetch(&mut self, id: &str) -> Result<Message, MailError>;

    /// Signal that a message produced a new or updated record.
    fn mark_processed(&mut self, id: &str) -> Result<(), MailError>;
}
