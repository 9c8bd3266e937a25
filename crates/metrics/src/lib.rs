//! Metric names and recorder setup for yandisk.
//!
//! Library crates record through the `metrics` facade, which is a no-op
//! until a recorder is installed. With the `prometheus` feature the CLI can
//! install one and print the text exposition.
//!
//! ```rust,ignore
//! use yandisk_metrics::{counter, labels, oauth};
//!
//! counter!(oauth::CALLBACK_REQUESTS_TOTAL, labels::OUTCOME => "code").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::{labels, oauth, storage},
    metrics::{counter, histogram},
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};
