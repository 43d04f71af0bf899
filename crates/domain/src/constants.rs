//! Application constants
//!
//! Defaults mirror the values shipped with the browser extension.

use std::time::Duration;

// Event batching
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_MAX_RETRY: u32 = 3;

// Delivery
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:9000/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
pub const EVENTS_BATCH_PATH: &str = "/events/batch";
pub const HEALTH_PATH: &str = "/health";

// Storage keys
pub const AUTH_STORAGE_KEY: &str = "mindhit-auth";
pub const PENDING_EVENTS_PREFIX: &str = "mindhit-pending-events-";

// Content-script limits
pub const MAX_SELECTOR_LENGTH: usize = 500;

// Messaging
pub const DEFAULT_EXTENSION_ORIGIN: &str = "chrome-extension://mindhit";
pub const TAB_STATUS_COMPLETE: &str = "complete";
