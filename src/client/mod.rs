//! Dialer role.
//!
//! # Data Flow
//! ```text
//! connect → open one bidirectional stream
//!     ├─ read side: opened stream + any server-opened uni stream
//!     │     → Text surfaced, Control::Rejected ends the session
//!     └─ write side: outbound lines → Text, "exit" → Control::Exit + close
//! ```
//!
//! # Design Decisions
//! - Write failures are fatal; there is no reconnect
//! - A server close with the pool-full code counts as a rejection even if
//!   the notice itself never arrived

pub mod session;

pub use session::{ClientError, ClientSession, SessionEnd, EXIT_TOKEN};
