//! Application protocol shared by both peer roles.
//!
//! # Data Flow
//! ```text
//! Outbound line / rejection notice
//!     → message.rs (raw text, or NUL + kind + body)
//!     → QUIC stream write
//!
//! QUIC stream read (bounded buffer)
//!     → message.rs (split at control prefixes)
//!     → Text surfaced to the console, Control acted upon
//!
//! Connection teardown
//!     → codes.rs (application close code conveys the reason)
//! ```
//!
//! # Design Decisions
//! - Control signals travel as NUL-prefixed frames, never as magic user text
//! - No length prefix: text boundaries follow read boundaries
//! - Close codes are a private convention between the two roles

pub mod codes;
pub mod message;

pub use codes::CloseCode;
pub use message::{Control, DecodeError, Message, REJECTION_NOTICE};

/// ALPN token negotiated by both roles unless overridden in config.
pub const DEFAULT_ALPN: &str = "quic-echo-example";
