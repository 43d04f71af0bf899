//! Recording session lifecycle

pub mod notify;
pub mod ports;
pub mod tracker;

pub use notify::broadcast;
pub use tracker::{SessionTracker, TimerAction, Transition};
