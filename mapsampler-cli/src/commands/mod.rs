//! CLI command implementations.

pub mod collect;
pub mod common;
pub mod config;
pub mod tiles;
