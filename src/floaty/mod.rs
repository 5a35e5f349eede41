// Core architecture components
mod config;
mod directive;
mod entry;
mod error;
mod generator;
mod registry;
mod time_utils;

// Request pipeline integration
pub mod adapter;
pub mod sweeper;

// Core components exports
pub use config::{
    DEFAULT_DURATION, DEFAULT_LENGTH, DEFAULT_ROOT_DURATION, EntryConfig, FloatyConfig,
    MAX_LENGTH, MIN_DURATION, MIN_LENGTH, ROOT, ResolvedEntry, parse_duration,
};
pub use directive::parse_directive;
pub use entry::{EntrySnapshot, Refresh, Rotation, RotatingEntry};
pub use error::FloatyError;
#[cfg(feature = "default-generators")]
pub use generator::UrlSafeGenerator;
pub use generator::IdGenerator;
pub use registry::{Observation, Registry, RegistryBuilder, RegistryStats, TimeProviderFn};

// Integration exports
pub use adapter::{DEFAULT_PREFIX, FloatyHandler, Placeholders, Replacer};
pub use sweeper::spawn_sweeper;
