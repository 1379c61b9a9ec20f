//! Configuration Module
//!
//! Provides per-station configuration loaded from TOML files.
//!
//! ## Loading Order
//!
//! 1. `--config` command-line flag
//! 2. `ROLLCALL_CONFIG` environment variable (path to TOML file)
//! 3. `rollcall.toml` in the current working directory
//! 4. Built-in defaults (see [`defaults`])
//!
//! The loaded config is passed by value into the components that need it;
//! there is no process-wide config handle.

mod rollcall_config;
pub mod defaults;

pub use rollcall_config::*;
