//! # MindHit Host
//!
//! Native-messaging host that runs the recorder pipeline for the browser
//! extension.
//!
//! This crate contains:
//! - The native-messaging frame codec
//! - The message pump between stdin/stdout and the pipeline
//! - The host context (dependency wiring)
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Logs go to stderr; stdout carries only framed messages

pub mod bridge;
pub mod context;
pub mod protocol;

pub use bridge::{read_loop, spawn_writer, ReadEnd};
pub use context::HostContext;
pub use protocol::{HostMessage, ProtocolError};
