//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! CLI flags / env vars           gateway config file (JSON/TOML)
//!     → cli.rs                       → loader.rs (parse & deserialize)
//!     └──────────────┬───────────────┘
//!                    → validation.rs (semantic checks)
//!                    → Settings (validated, immutable)
//!                    → passed by reference to every constructor
//!
//! .env dotfile → env.rs → extra variables for the build and the child
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once built; nothing reads ambient globals
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{ProxyConfig, ProxyTarget, Settings, TlsConfig};
pub use validation::ValidationError;
