//! Command-line interface for bgcompose
//!
//! Only available with the `cli` feature.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{main, Cli, CliBackend, CliFilter, CliSource, DEFAULT_OUTPUT};
