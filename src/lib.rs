//! QUIC messenger library.
//!
//! A listener that admits at most `max_connections` concurrent QUIC
//! connections and a dialer that sends console lines over one stream.

pub mod cli;
pub mod client;
pub mod config;
pub mod console;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;

pub use client::{ClientSession, SessionEnd};
pub use config::MessengerConfig;
pub use lifecycle::Shutdown;
pub use net::{AdmissionController, Listener};
