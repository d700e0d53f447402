//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → flag set → endpoint closed → acceptor sees no more
//!     incoming connections → consults flag → Stopped
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl+C) → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - The flag is sticky: once triggered it never resets
//! - Handlers are not cancelled; they drain as their transport fails

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
