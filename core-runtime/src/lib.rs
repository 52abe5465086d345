//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the content sync core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other `core-*` crate depends on this one for its logging
//! conventions, the `CoreConfig` it is constructed from and the events it
//! publishes.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
