//! # Dreamhouse Library
//!
//! Internal library for the dreamhouse binary application
//!
//! This library exists to enable testing of the run internals and provide clean
//! separation between CLI dispatch (main.rs) and application logic.
//!
//! ## Architecture
//!
//! - **Entry Point**: `Dreamhouse` builder runs one sequence with resource management
//! - **Core Logic**: `core` holds the hue pool, round barrier, device workers and
//!   the run orchestrator
//! - **Devices**: `device` defines the light capability traits the core depends on
//! - **Bridge**: `bridge` implements those traits over the bridge's HTTP/JSON API,
//!   plus discovery and registration
//! - **Configuration**: `config` for TOML-based settings
//! - **Commands**: `commands` for one-shot CLI commands (lights, register, help)
//! - **Infrastructure**: signal handling, logging, and utilities

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod common;

// Public API modules
pub mod args;
pub mod bridge;
pub mod commands;
pub mod config;
pub mod core;
pub mod device;
pub mod io;

mod dreamhouse;

// Re-export for binary
pub use dreamhouse::Dreamhouse;
