//! CLI command implementations.

pub mod common;
pub mod grid;
pub mod simulate;
