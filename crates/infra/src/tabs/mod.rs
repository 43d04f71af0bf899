//! Tab bookkeeping for outbound notifications

pub mod registry;

pub use registry::TabRegistry;
