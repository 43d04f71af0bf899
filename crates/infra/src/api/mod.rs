//! HTTP clients for the remote events API

pub mod client;

pub use client::{ApiClientConfig, EventsApiClient};
