//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the playback crates:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate establishes the logging conventions, the validated
//! configuration object and the broadcast channel through which playback and
//! connection changes are announced.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
