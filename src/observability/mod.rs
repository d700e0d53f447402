//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! net, client, main
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout/stderr log lines
//!     → optional Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Every log event carries a connection_id field where one exists
//! - Metrics go through the `metrics` facade; recording is a no-op until an
//!   exporter is installed

pub mod logging;
pub mod metrics;
