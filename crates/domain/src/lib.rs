//! # MindHit Domain
//!
//! Domain types for the MindHit recorder host.
//!
//! This crate contains:
//! - Browsing events, session state and extension messages
//! - Durable retry records
//! - Domain error types and Result definitions
//! - Configuration structures and constants
//!
//! ## Architecture
//! - No dependencies on other MindHit crates
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
