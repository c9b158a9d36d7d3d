// Library root — exposes the catalog for the binary and for integration
// tests in `tests/`. Production entry point remains `src/main.rs`.

pub mod catalog;
pub mod db;
pub mod error;
pub mod repository;

// Binary-facing modules. Public so the command layer can be exercised
// from tests without spawning the executable.
pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
