//! HTTP API module.
//!
//! This module provides the HTTP server, its request types and the log
//! stream shared with the CLI.

pub mod server;
pub mod types;
pub mod logs;

pub use server::start_server;
pub use types::*;
pub use logs::*;
