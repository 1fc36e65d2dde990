//! Answer extraction and the value types it produces.

pub mod extract;
pub mod types;

pub use extract::{DEFAULT_WINDOW_CHARS, extract, extract_with_window};
pub use types::{Answer, Message, Record, SenderKey};
