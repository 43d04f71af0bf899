//! Batch delivery, credentials and durable retry

pub mod credentials;
pub mod engine;
pub mod ports;

pub use credentials::StoredCredentials;
pub use engine::{DeliveryEngine, ReplayReport};
