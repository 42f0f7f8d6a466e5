//! Counter declarations for the fetch pipeline.
//!
//! Counters go through the `metrics` facade and are no-ops until the
//! application installs a recorder.
//!
//! ```rust
//! use treefind_fetch::metrics::{describe_metrics, metric_defs};
//!
//! describe_metrics();
//! metrics::counter!(metric_defs::TILES_CACHED.name).increment(1);
//! ```

use ::metrics::{describe_counter, Unit};

/// A counter declaration with its metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// Metric name, e.g. `treefind.tiles.cached`.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Unit of measurement.
    pub unit: Unit,
}

impl Metric {
    /// Counter of plain occurrences.
    pub const fn counter(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            unit: Unit::Count,
        }
    }

    /// Replace the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    /// Register the description with the installed recorder.
    pub fn describe(&self) {
        describe_counter!(self.name, self.unit, self.description);
    }

    /// Add `value` to the counter.
    pub fn increment(&self, value: u64) {
        ::metrics::counter!(self.name).increment(value);
    }
}

/// All counters recorded by this crate.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Tiles found on disk and not downloaded again.
    pub const TILES_CACHED: Metric =
        Metric::counter("treefind.tiles.cached", "Tiles reused from the output directory");

    /// Tiles downloaded, converted and validated.
    pub const TILES_DOWNLOADED: Metric =
        Metric::counter("treefind.tiles.downloaded", "Tiles downloaded and validated");

    /// Tiles left out because downloading was disabled.
    pub const TILES_SKIPPED: Metric =
        Metric::counter("treefind.tiles.skipped", "Missing tiles skipped with downloads disabled");

    /// Failed attempts that were retried.
    pub const FETCH_RETRIES: Metric =
        Metric::counter("treefind.fetch.retries", "Coverage requests retried after a failure");

    /// Response bytes received.
    pub const FETCH_BYTES: Metric =
        Metric::counter("treefind.fetch.bytes", "Coverage response bytes received")
            .with_unit(Unit::Bytes);

    /// Doubt maps computed.
    pub const DOUBT_GENERATED: Metric =
        Metric::counter("treefind.doubt.generated", "Doubt maps computed");

    /// Doubt maps newer than their source and reused.
    pub const DOUBT_REUSED: Metric =
        Metric::counter("treefind.doubt.reused", "Up-to-date doubt maps reused");

    /// Every counter, for registration.
    pub const ALL: &[&Metric] = &[
        &TILES_CACHED,
        &TILES_DOWNLOADED,
        &TILES_SKIPPED,
        &FETCH_RETRIES,
        &FETCH_BYTES,
        &DOUBT_GENERATED,
        &DOUBT_REUSED,
    ];
}

/// Register descriptions of all counters. Call once at startup.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
