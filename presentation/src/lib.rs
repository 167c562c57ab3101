//! Presentation layer for care-council
//!
//! This crate contains the CLI definition, output formatting
//! and the line-oriented chat session.

pub mod chat;
pub mod cli;
pub mod output;

// Re-export commonly used types
pub use chat::ChatSession;
pub use cli::commands::{Cli, OutputFormat};
pub use output::console::ConsoleFormatter;
