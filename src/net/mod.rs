//! Network layer subsystem (listener role).
//!
//! # Data Flow
//! ```text
//! Incoming QUIC connection
//!     → listener.rs (accept loop, handshake task per connection)
//!     → admission.rs (non-blocking slot acquire)
//!         ├─ slot held  → connection.rs (accept streams for its lifetime)
//!         │                  → stream.rs (bounded reads, surface payloads)
//!         └─ pool full  → rejection notice on a uni stream → close(PoolFull)
//!
//! Connection States:
//!     Handshaking → Admitted | Rejected → Closed
//! ```
//!
//! # Design Decisions
//! - The accept loop never waits on admission; a full pool means rejection
//! - A slot is an RAII guard owned by the connection handler
//! - Per-connection stream concurrency is bounded by transport stream limits
//! - tls.rs builds the rustls/quinn crypto configs for both roles

pub mod admission;
pub mod connection;
pub mod listener;
pub mod stream;
pub mod tls;

pub use admission::{AdmissionController, AdmissionSlot};
pub use connection::{ConnectionHandler, ConnectionId};
pub use listener::{Listener, ListenerError};
pub use stream::{Received, StreamHandler};
