//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), optional
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MessengerConfig (validated, immutable)
//!     → server section to net::listener, client section to client::session
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so the binary runs with no file at all
//! - Validation separates syntactic (serde) from semantic checks
//! - Config is read once at startup; there is no hot reload

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::MessengerConfig;
pub use schema::{ClientConfig, ObservabilityConfig, ServerConfig, TransportConfig};
pub use validation::{validate_config, ValidationError};
