//! # atomspace
//!
//! Command-line front end for AtomSpace snapshots: configuration loading
//! and the `init`, `inspect`, `export`, `import` and `verify` commands.

pub mod cli;
pub mod config;
