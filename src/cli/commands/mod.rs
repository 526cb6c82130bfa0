//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod build;
pub mod init;
pub mod resolve;
pub mod watch;
