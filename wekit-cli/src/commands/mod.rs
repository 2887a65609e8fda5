//! Command implementations for the `wekit` binary.

pub mod clone;
pub mod config;
pub mod push;
