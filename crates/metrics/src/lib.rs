//! Metrics collection and export for chanmirror.
//!
//! Crates record through the `metrics` facade re-exported here; nothing is
//! kept unless the binary installs a recorder. With the `prometheus` feature
//! the recorder renders the Prometheus text format.
//!
//! ```rust,ignore
//! use chanmirror_metrics::{counter, relay};
//!
//! counter!(relay::EVENTS_TOTAL, "kind" => "new").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
