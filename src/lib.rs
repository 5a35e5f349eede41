//! # Floaty
//!
//! Rotating identifiers for HTTP request pipelines.
//!
//! Floaty keeps one or more short random identifiers, each regenerated on a
//! fixed interval, and publishes their current values into every request as
//! placeholders. All requests within one window share the same label, which
//! changes automatically without restarting the server. Typical uses are
//! cache-busting tokens, canary tags and log correlation.
//!
//! ## Features
//!
//! - **Lazy Rotation**: An identifier is regenerated by the first read after its window ends; no timer is needed
//! - **Named Entries**: Any number of independently sized and timed identifiers next to the always-present `root`
//! - **Race-Free Refresh**: Per-entry locking guarantees at most one regeneration per window, even under concurrent reads
//! - **Fail Closed**: If the randomness source fails the previous identifier keeps being served
//! - **Structured Logging**: Every rotation is reported through `tracing` with old and new values and windows
//! - **Flexible Configuration**: Text directives, JSON documents or environment variables
//!
//! ## Quick Start
//!
//! ```rust
//! use floaty::{FloatyHandler, Placeholders, Registry, parse_directive};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), floaty::FloatyError> {
//! let config = parse_directive(
//!     "floaty 8 1h {
//!         session 16 30s
//!     }",
//! )?;
//! for warning in config.validate() {
//!     eprintln!("warning: {warning}");
//! }
//!
//! let registry = Arc::new(Registry::builder().build(&config)?);
//! let handler = FloatyHandler::new(registry);
//!
//! // Once per request:
//! let mut vars = Placeholders::new();
//! handler.annotate(&mut vars);
//! assert_eq!(vars.get("floaty").map(str::len), Some(8));
//! assert_eq!(vars.get("floaty.session").map(str::len), Some(16));
//! # Ok(())
//! # }
//! ```
//!
//! ## Defaults
//!
//! | Setting | Root | Named entries |
//! |---------|------|---------------|
//! | Length | 8 (clamped to 4..=96) | 8 (clamped to 4..=96) |
//! | Duration | 90 minutes | 15 minutes |
//! | Minimum duration | 10 seconds | 10 seconds |
//!
//! ## Architecture
//!
//! - **[`IdGenerator`]**: Source of random identifiers; [`UrlSafeGenerator`] by default
//! - **[`RotatingEntry`]**: One identifier with its validity window and lock
//! - **[`Registry`]**: The fixed set of entries owned by one handler instance
//! - **[`FloatyHandler`]**: Publishes identifiers into each request's placeholders
//! - **[`FloatyError`]**: Error handling for configuration and generation failures

pub mod floaty;

// Re-export commonly used types
pub use floaty::{
    DEFAULT_DURATION, DEFAULT_LENGTH, DEFAULT_PREFIX, DEFAULT_ROOT_DURATION, EntryConfig,
    EntrySnapshot, FloatyConfig, FloatyError, FloatyHandler, IdGenerator, MAX_LENGTH,
    MIN_DURATION, MIN_LENGTH, Observation, Placeholders, ROOT, Refresh, Registry,
    RegistryBuilder, RegistryStats, Replacer, ResolvedEntry, Rotation, RotatingEntry,
    TimeProviderFn, parse_directive, parse_duration, spawn_sweeper,
};

#[cfg(feature = "default-generators")]
pub use floaty::UrlSafeGenerator;
