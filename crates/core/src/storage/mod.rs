//! Durable key-value storage

pub mod ports;
