use thiserror::Error;

/// Error types that can occur while configuring or rotating identifiers.
///
/// Configuration errors are reported before a [`Registry`](crate::Registry)
/// is handed to request traffic. Errors raised on the request path are never
/// propagated to the request: a failed refresh keeps the previous identifier
/// and is only logged.
///
/// # Error Categories
///
/// - **Configuration Errors**: `InvalidConfig`, `InvalidDuration`, `InvalidName`, `DuplicateEntry`
/// - **Runtime Errors**: `InvalidLength`, `Generation`, `Clock`
///
/// # Example
///
/// ```rust
/// use floaty::{FloatyError, parse_directive};
///
/// match parse_directive("floaty abc") {
///     Ok(config) => println!("configured: {}", config.summary()),
///     Err(FloatyError::InvalidConfig(msg)) => println!("rejected: {msg}"),
///     Err(e) => println!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum FloatyError {
    /// The configuration is malformed.
    ///
    /// Raised for non-numeric or non-positive lengths, stray arguments,
    /// unbalanced blocks, undecodable JSON, or a registry built without an
    /// identifier generator. The whole configuration is rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A duration could not be parsed.
    ///
    /// Durations are written as a sequence of `<number><unit>` pairs such
    /// as `500ms`, `30s` or `1h30m`.
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// An entry name is empty or contains characters that cannot appear in
    /// a placeholder key.
    #[error("Invalid entry name: {0:?}")]
    InvalidName(String),

    /// The same entry name was configured more than once.
    ///
    /// The name `root` is reserved for the unnamed entry and always counts
    /// as configured.
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// An identifier of length zero was requested from a generator.
    ///
    /// Lengths are clamped during configuration, so reaching this is a bug
    /// in the caller.
    #[error("Invalid identifier length: {0}")]
    InvalidLength(usize),

    /// The randomness source could not produce an identifier.
    #[error("Generation error: {0}")]
    Generation(String),

    /// The system clock could not be read.
    #[error("Clock error: {0}")]
    Clock(String),
}

impl From<serde_json::Error> for FloatyError {
    fn from(err: serde_json::Error) -> Self {
        FloatyError::InvalidConfig(err.to_string())
    }
}
