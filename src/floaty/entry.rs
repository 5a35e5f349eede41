//! Rotating entries.
//!
//! An entry owns one identifier and its validity window. Reads go through
//! [`RotatingEntry::current_value`], which checks staleness and regenerates
//! under the entry's own lock, so concurrent readers see at most one
//! regeneration per window and never a value paired with another
//! generation's timestamps.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::floaty::error::FloatyError;
use crate::floaty::generator::IdGenerator;
use crate::floaty::time_utils::{duration_ms, expiry};

/// A consistent copy of an entry's mutable state.
///
/// Timestamps are Unix milliseconds; `expires_at == issued_at + window`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySnapshot {
    /// The identifier itself
    pub value: String,
    /// When `value` was generated
    pub issued_at: u64,
    /// When `value` becomes stale
    pub expires_at: u64,
}

/// Record of one regeneration, kept for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rotation {
    /// Name of the rotated entry
    pub name: String,
    /// State before the regeneration
    pub previous: EntrySnapshot,
    /// State after the regeneration
    pub current: EntrySnapshot,
}

impl Rotation {
    /// Emits the rotation as a structured `tracing` event.
    pub(crate) fn log(&self) {
        tracing::info!(
            target: "floaty",
            entry = %self.name,
            old = %self.previous.value,
            new = %self.current.value,
            previous_issued_at = self.previous.issued_at,
            previous_expires_at = self.previous.expires_at,
            issued_at = self.current.issued_at,
            expires_at = self.current.expires_at,
            "identifier rotated"
        );
    }
}

/// What a read did to the entry.
#[derive(Debug)]
pub enum Refresh {
    /// The value was still valid.
    Fresh,
    /// The value was stale and has been regenerated.
    Rotated(Rotation),
    /// The value was stale but regeneration failed; the previous value is
    /// still served and the next read retries.
    Retained(FloatyError),
}

/// One named identifier with a time-based validity window.
pub struct RotatingEntry {
    name: String,
    length: usize,
    window_ms: u64,
    generator: Arc<dyn IdGenerator>,
    state: Mutex<EntrySnapshot>,
}

impl RotatingEntry {
    /// Creates an entry holding a freshly generated identifier issued at `now`.
    ///
    /// `length` and `duration` are used as given; clamping happens when the
    /// configuration is resolved.
    ///
    /// # Errors
    ///
    /// Returns the generator's error if the first identifier cannot be
    /// produced.
    pub fn initialize(
        name: impl Into<String>,
        length: usize,
        duration: Duration,
        now: u64,
        generator: Arc<dyn IdGenerator>,
    ) -> Result<Self, FloatyError> {
        let window_ms = duration_ms(duration);
        let value = generator.generate(length)?;

        Ok(Self {
            name: name.into(),
            length,
            window_ms,
            generator,
            state: Mutex::new(EntrySnapshot {
                value,
                issued_at: now,
                expires_at: expiry(now, window_ms),
            }),
        })
    }

    /// Returns the entry's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configured identifier length.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Returns the validity window.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Returns `true` once `now` has reached the end of the validity window.
    pub fn is_stale(&self, now: u64) -> bool {
        now >= self.lock().expires_at
    }

    /// Returns a copy of the current state without refreshing.
    pub fn snapshot(&self) -> EntrySnapshot {
        self.lock().clone()
    }

    /// Regenerates the identifier unconditionally, starting a new window at
    /// `now`.
    ///
    /// # Errors
    ///
    /// Returns the generator's error; the previous state is left untouched.
    pub fn refresh(&self, now: u64) -> Result<Rotation, FloatyError> {
        let mut state = self.lock();
        self.regenerate(&mut state, now)
    }

    /// Returns the identifier valid at `now`, regenerating it first if stale.
    ///
    /// Staleness check and regeneration happen under one lock: when several
    /// callers race past the end of a window, exactly one regenerates and
    /// all of them return the new value.
    pub fn current_value(&self, now: u64) -> (String, Refresh) {
        let mut state = self.lock();
        if now < state.expires_at {
            return (state.value.clone(), Refresh::Fresh);
        }

        let refresh = match self.regenerate(&mut state, now) {
            Ok(rotation) => Refresh::Rotated(rotation),
            Err(e) => Refresh::Retained(e),
        };
        (state.value.clone(), refresh)
    }

    fn regenerate(&self, state: &mut EntrySnapshot, now: u64) -> Result<Rotation, FloatyError> {
        let value = self.generator.generate(self.length)?;
        let current = EntrySnapshot {
            value,
            issued_at: now,
            expires_at: expiry(now, self.window_ms),
        };
        let previous = std::mem::replace(state, current.clone());

        Ok(Rotation {
            name: self.name.clone(),
            previous,
            current,
        })
    }

    // The state is only ever replaced whole, so a poisoned lock still holds
    // a consistent snapshot.
    fn lock(&self) -> MutexGuard<'_, EntrySnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for RotatingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingEntry")
            .field("name", &self.name)
            .field("length", &self.length)
            .field("window_ms", &self.window_ms)
            .field("state", &*self.lock())
            .finish()
    }
}
