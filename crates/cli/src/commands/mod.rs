//! Command handlers for the docqa CLI.

pub mod ask;
pub mod base;
pub mod ingest;

pub use ask::{AskCommand, SearchCommand};
pub use base::{CleanCommand, RemoveCommand, SourcesCommand, StatsCommand};
pub use ingest::IngestCommand;
