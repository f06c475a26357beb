//! Metric name and label definitions.
//!
//! Every metric chanmirror records is named here so dashboards have one
//! place to look.

/// Relay engine metrics
pub mod relay {
    /// Normalized events handed to the engine, labelled by `kind`
    pub const EVENTS_TOTAL: &str = "chanmirror_relay_events_total";
    /// New-message events dropped as duplicates
    pub const DUPLICATES_TOTAL: &str = "chanmirror_relay_duplicates_total";
    /// Successful destination operations, labelled by `operation`
    pub const DELIVERIES_TOTAL: &str = "chanmirror_relay_deliveries_total";
    /// Failed destination operations, labelled by `operation`
    pub const FAILURES_TOTAL: &str = "chanmirror_relay_failures_total";
    /// Mappings dropped to stay within capacity
    pub const MAPPING_EVICTIONS_TOTAL: &str = "chanmirror_relay_mapping_evictions_total";
    /// Source messages currently mapped to copies
    pub const MAPPING_ENTRIES: &str = "chanmirror_relay_mapping_entries";
}

/// Telegram transport metrics
pub mod telegram {
    /// Updates received from `getUpdates`
    pub const UPDATES_RECEIVED_TOTAL: &str = "chanmirror_telegram_updates_received_total";
    /// Updates that did not normalize into a relay event
    pub const UPDATES_IGNORED_TOTAL: &str = "chanmirror_telegram_updates_ignored_total";
    /// `getUpdates` failures
    pub const POLLING_ERRORS_TOTAL: &str = "chanmirror_telegram_polling_errors_total";
    /// Bot API request duration in seconds, labelled by `method`
    pub const REQUEST_DURATION_SECONDS: &str = "chanmirror_telegram_request_duration_seconds";
}

/// Common label keys used across metrics
pub mod labels {
    pub const KIND: &str = "kind";
    pub const OPERATION: &str = "operation";
    pub const METHOD: &str = "method";
}

/// Standard histogram buckets
pub mod buckets {
    use once_cell::sync::Lazy;

    /// Bot API request duration buckets (in seconds)
    /// Covers 10ms to 60s
    pub static REQUEST_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]
    });
}
