//! Subcommand implementations.

pub mod config;
pub mod device;
pub mod serve;
