//! Identifier generation.
//!
//! A generator turns a requested length into a fresh random identifier. The
//! registry treats it as a black box: no uniqueness across regenerations is
//! assumed beyond the entropy of the source.

use crate::floaty::error::FloatyError;
#[cfg(feature = "default-generators")]
use base64::Engine;
#[cfg(feature = "default-generators")]
use rand::RngCore;

/// Source of random identifiers.
///
/// Implementations must return exactly `length` ASCII characters for any
/// `length >= 1`. Any `Fn(usize) -> Result<String, FloatyError>` closure that
/// is `Send + Sync` is a generator, which keeps tests deterministic:
///
/// ```rust
/// use floaty::{FloatyError, IdGenerator};
///
/// let fixed = |length: usize| -> Result<String, FloatyError> { Ok("x".repeat(length)) };
/// assert_eq!(fixed.generate(4)?, "xxxx");
/// # Ok::<(), FloatyError>(())
/// ```
pub trait IdGenerator: Send + Sync {
    /// Produces a new identifier of exactly `length` characters.
    ///
    /// # Errors
    ///
    /// - [`FloatyError::InvalidLength`] if `length` is zero
    /// - [`FloatyError::Generation`] if the randomness source fails
    fn generate(&self, length: usize) -> Result<String, FloatyError>;
}

impl<F> IdGenerator for F
where
    F: Fn(usize) -> Result<String, FloatyError> + Send + Sync,
{
    fn generate(&self, length: usize) -> Result<String, FloatyError> {
        self(length)
    }
}

/// The default generator: nanoid-style identifiers over the URL-safe alphabet
/// `A-Z a-z 0-9 - _`, drawn from the operating system's CSPRNG.
///
/// Random bytes are encoded in whole three-byte groups so every output
/// character carries six uniformly distributed bits.
#[cfg(feature = "default-generators")]
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlSafeGenerator;

#[cfg(feature = "default-generators")]
impl UrlSafeGenerator {
    /// Creates the generator.
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "default-generators")]
impl IdGenerator for UrlSafeGenerator {
    fn generate(&self, length: usize) -> Result<String, FloatyError> {
        if length == 0 {
            return Err(FloatyError::InvalidLength(length));
        }

        let mut raw = vec![0_u8; length.div_ceil(4) * 3];
        rand::rngs::OsRng
            .try_fill_bytes(&mut raw)
            .map_err(|e| FloatyError::Generation(format!("OS randomness unavailable: {e}")))?;

        let mut id = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&raw);
        id.truncate(length);
        Ok(id)
    }
}
