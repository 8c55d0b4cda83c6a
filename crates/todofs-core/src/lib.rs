//! Core types, configuration, and errors for todofs.
//!
//! This crate provides the foundational types shared across the workspace:
//!
//! - [`Config`] and its sections ([`StoreConfig`], [`WatchConfig`])
//! - [`ConfigError`] for configuration loading and validation
//! - Domain types: [`FileSnapshot`], [`LineEnding`], [`StoreKind`]
//!
//! # Crate Dependencies
//!
//! ```text
//! todofs-cli ──► todofs-store ──► todofs-watcher ──► todofs-core
//!                             └────────────────────►
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, StoreConfig, WatchConfig};
pub use error::ConfigError;
pub use types::{FileSnapshot, LineEnding, StoreKind, TaskLine};
