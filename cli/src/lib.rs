//! Command-line front end for the baggage policy assistant.
//!
//! The `baggage-rag` binary wires these pieces together; they live in a
//! library so the command bodies can be driven from tests.

pub mod chat;
pub mod download;
pub mod logging;

pub use chat::{ChatOutcome, chat_loop, is_quit_command};
pub use download::{DownloadSummary, download_all};
pub use logging::init_logging;
