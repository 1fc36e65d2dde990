//! mail-answers: collect Yes/No answers from a mailbox into a per-sender CSV.

pub mod answers;
pub mod config;
pub mod error;
pub mod ledger;
pub mod mail;
pub mod scan;
