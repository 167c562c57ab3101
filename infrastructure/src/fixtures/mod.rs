//! Test and offline fixtures.
//!
//! Nothing here talks to a real model. [`CannedLlmGateway`] backs the
//! CLI `--offline` mode and tests across the workspace.

mod canned;

pub use canned::CannedLlmGateway;
