//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events under the root span)
//!     → metrics.rs (counters, gauges, histograms)
//!     → notifications.rs (build started / succeeded / failed)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//!     → Notification sink
//! ```

pub mod logging;
pub mod metrics;
pub mod notifications;
