//! Commands Module
//!
//! All CLI subcommand implementations.

pub mod benchmark;
pub mod info;
