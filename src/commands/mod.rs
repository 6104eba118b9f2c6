//! One-shot CLI commands.
//!
//! Each command loads what it needs, performs a single action against the
//! bridge or the config file, and exits. The oscillation run itself lives in
//! `crate::dreamhouse`.

pub mod help;
pub mod lights;
pub mod register;
