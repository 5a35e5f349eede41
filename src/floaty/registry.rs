use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::floaty::config::FloatyConfig;
use crate::floaty::entry::{EntrySnapshot, Refresh, Rotation, RotatingEntry};
use crate::floaty::error::FloatyError;
use crate::floaty::generator::IdGenerator;
#[cfg(feature = "default-generators")]
use crate::floaty::generator::UrlSafeGenerator;
use crate::floaty::time_utils::{current_timestamp_ms, duration_ms};

/// A function that provides the current time in Unix milliseconds.
pub type TimeProviderFn = Arc<dyn Fn() -> Result<u64, FloatyError> + Send + Sync>;

/// Values observed in one pass over a registry.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    /// Current identifier of every entry, keyed by entry name
    pub values: BTreeMap<String, String>,
    /// Regenerations that happened during this pass
    pub rotations: Vec<Rotation>,
}

/// Statistics about a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of entries, root included
    pub entries: usize,
    /// Successful regenerations since initialization
    pub rotations: u64,
    /// Regenerations that failed and kept the previous value
    pub failed_rotations: u64,
}

/// The named collection of rotating entries owned by one handler instance.
///
/// The set of entries is fixed at initialization: a `root` entry is always
/// present, every other entry comes from configuration, and none is ever
/// added or removed afterwards. Only identifier values and their windows
/// change, and only through the lazy refresh performed on read.
///
/// `Registry` is `Send + Sync`; share it behind an `Arc` across request
/// handlers. Each entry carries its own lock, so reads of different entries
/// never contend.
///
/// # Example
///
/// ```rust
/// use floaty::{EntryConfig, FloatyConfig, Registry};
/// use std::time::Duration;
///
/// let config = FloatyConfig::default()
///     .with_entry("session", EntryConfig::new(16, Duration::from_secs(30)));
/// let registry = Registry::initialize(&config, 0)?;
///
/// let values = registry.current_values(5_000);
/// assert_eq!(values["root"].len(), 8);
/// assert_eq!(values["session"].len(), 16);
/// assert_eq!(registry.get("session", 5_000), Some(values["session"].clone()));
/// assert_eq!(registry.get("nonexistent", 5_000), None);
/// # Ok::<(), floaty::FloatyError>(())
/// ```
pub struct Registry {
    entries: BTreeMap<String, RotatingEntry>,
    clock: TimeProviderFn,
    rotations: AtomicU64,
    failed_rotations: AtomicU64,
}

impl Registry {
    /// Returns a builder for configuring the generator and clock.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Creates a registry from `config` with every entry issued at `now`,
    /// using the default generator and the system clock.
    ///
    /// # Errors
    ///
    /// - [`FloatyError::InvalidName`] / [`FloatyError::DuplicateEntry`] for
    ///   unusable entry names
    /// - the generator's error if a first identifier cannot be produced
    #[cfg(feature = "default-generators")]
    pub fn initialize(config: &FloatyConfig, now: u64) -> Result<Self, FloatyError> {
        Self::builder().build_at(config, now)
    }

    /// Reads the registry's clock.
    pub fn now(&self) -> Result<u64, FloatyError> {
        (self.clock)()
    }

    /// Returns the current identifier of every entry, regenerating stale
    /// ones, together with the regenerations that happened.
    pub fn observe(&self, now: u64) -> Observation {
        let mut observation = Observation::default();
        for (name, entry) in &self.entries {
            let (value, rotation) = self.read(entry, now);
            observation.values.insert(name.clone(), value);
            observation.rotations.extend(rotation);
        }
        observation
    }

    /// Returns the current identifier of every entry, regenerating stale
    /// ones.
    pub fn current_values(&self, now: u64) -> BTreeMap<String, String> {
        self.observe(now).values
    }

    /// Returns the current identifier of one entry, regenerating it if stale.
    ///
    /// Returns `None` if no entry of that name exists.
    pub fn get(&self, name: &str, now: u64) -> Option<String> {
        self.entries
            .get(name)
            .map(|entry| self.read(entry, now).0)
    }

    /// Returns a copy of an entry's state without refreshing it.
    pub fn snapshot(&self, name: &str) -> Option<EntrySnapshot> {
        self.entries.get(name).map(RotatingEntry::snapshot)
    }

    /// Returns the entry names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the number of entries, root included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`: the root entry exists from initialization onwards.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns statistics about the registry.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            entries: self.entries.len(),
            rotations: self.rotations.load(Ordering::Relaxed),
            failed_rotations: self.failed_rotations.load(Ordering::Relaxed),
        }
    }

    fn read(&self, entry: &RotatingEntry, now: u64) -> (String, Option<Rotation>) {
        let (value, refresh) = entry.current_value(now);
        match refresh {
            Refresh::Fresh => (value, None),
            Refresh::Rotated(rotation) => {
                self.rotations.fetch_add(1, Ordering::Relaxed);
                (value, Some(rotation))
            }
            Refresh::Retained(e) => {
                self.failed_rotations.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    target: "floaty",
                    entry = %entry.name(),
                    error = %e,
                    "identifier refresh failed, keeping previous value"
                );
                (value, None)
            }
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.entries)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A builder for creating a [`Registry`].
///
/// Defaults to the URL-safe random generator and the system clock.
///
/// # Example
///
/// ```rust
/// use floaty::{FloatyConfig, FloatyError, Registry};
///
/// let registry = Registry::builder()
///     .with_generator(|length: usize| -> Result<String, FloatyError> { Ok("z".repeat(length)) })
///     .with_clock(|| Ok(42))
///     .build(&FloatyConfig::default())?;
///
/// assert_eq!(registry.get("root", 42).as_deref(), Some("zzzzzzzz"));
/// assert_eq!(registry.snapshot("root").unwrap().issued_at, 42);
/// # Ok::<(), FloatyError>(())
/// ```
#[must_use = "The builder does nothing unless `.build()` is called."]
pub struct RegistryBuilder {
    generator: Option<Arc<dyn IdGenerator>>,
    clock: Option<TimeProviderFn>,
}

impl RegistryBuilder {
    fn new() -> Self {
        Self {
            generator: None,
            clock: None,
        }
    }

    /// Sets the identifier generator shared by all entries.
    pub fn with_generator<G>(mut self, generator: G) -> Self
    where
        G: IdGenerator + 'static,
    {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Sets the clock used by [`Registry::now`] and [`RegistryBuilder::build`].
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> Result<u64, FloatyError> + Send + Sync + 'static,
    {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Builds the registry with every entry issued at the clock's current
    /// time.
    pub fn build(self, config: &FloatyConfig) -> Result<Registry, FloatyError> {
        let clock = self.clock.clone().unwrap_or_else(system_clock);
        let now = clock()?;
        self.build_at(config, now)
    }

    /// Builds the registry with every entry issued at `now`.
    ///
    /// # Errors
    ///
    /// - [`FloatyError::InvalidConfig`] if no generator is available
    /// - [`FloatyError::InvalidName`] / [`FloatyError::DuplicateEntry`] for
    ///   unusable entry names
    /// - the generator's error if a first identifier cannot be produced
    pub fn build_at(self, config: &FloatyConfig, now: u64) -> Result<Registry, FloatyError> {
        let generator = match self.generator {
            Some(generator) => generator,
            None => default_generator()?,
        };

        let mut entries = BTreeMap::new();
        for (name, resolved) in config.entries()? {
            let entry = RotatingEntry::initialize(
                name.clone(),
                resolved.length,
                resolved.duration,
                now,
                Arc::clone(&generator),
            )?;
            tracing::debug!(
                target: "floaty",
                entry = %name,
                length = resolved.length,
                duration_ms = duration_ms(resolved.duration),
                "identifier entry initialized"
            );
            entries.insert(name, entry);
        }

        Ok(Registry {
            entries,
            clock: self.clock.unwrap_or_else(system_clock),
            rotations: AtomicU64::new(0),
            failed_rotations: AtomicU64::new(0),
        })
    }
}

fn system_clock() -> TimeProviderFn {
    Arc::new(current_timestamp_ms)
}

#[cfg(feature = "default-generators")]
fn default_generator() -> Result<Arc<dyn IdGenerator>, FloatyError> {
    Ok(Arc::new(UrlSafeGenerator::new()))
}

#[cfg(not(feature = "default-generators"))]
fn default_generator() -> Result<Arc<dyn IdGenerator>, FloatyError> {
    Err(FloatyError::InvalidConfig(
        "no identifier generator configured".to_string(),
    ))
}

#[cfg(all(test, feature = "default-generators"))]
mod tests {
    use super::*;
    use crate::floaty::config::EntryConfig;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    fn counting_builder() -> (RegistryBuilder, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let builder = Registry::builder().with_generator(
            move |length: usize| -> Result<String, FloatyError> {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Ok(format!("{n:0>length$}"))
            },
        );
        (builder, calls)
    }

    #[test]
    fn test_root_always_present() {
        let registry = Registry::initialize(&FloatyConfig::default(), 0).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
        assert_eq!(registry.names().collect::<Vec<_>>(), ["root"]);

        let root = registry.snapshot("root").unwrap();
        assert_eq!(root.value.len(), 8);
        assert_eq!(root.expires_at, 5_400_000);
    }

    #[test]
    fn test_named_entry_defaults() {
        let config = FloatyConfig::default().with_entry(
            "session",
            EntryConfig {
                length: Some(0),
                duration: Some(Duration::from_millis(500)),
            },
        );
        let registry = Registry::initialize(&config, 1_000).unwrap();

        let session = registry.snapshot("session").unwrap();
        assert_eq!(session.value.len(), 8);
        assert_eq!(session.issued_at, 1_000);
        assert_eq!(session.expires_at, 11_000);

        let plain = FloatyConfig::default().with_entry("plain", EntryConfig::default());
        let registry = Registry::initialize(&plain, 0).unwrap();
        assert_eq!(registry.snapshot("plain").unwrap().expires_at, 900_000);
    }

    #[test]
    fn test_multiple_named_entries() {
        let config = FloatyConfig {
            length: Some(8),
            duration: Some(Duration::from_secs(60)),
            ..FloatyConfig::default()
        }
        .with_entry("session", EntryConfig::new(16, Duration::from_secs(30)));
        let registry = Registry::initialize(&config, 0).unwrap();

        let values = registry.current_values(0);
        assert_eq!(values.len(), 2);
        assert_eq!(values["root"].len(), 8);
        assert_eq!(values["session"].len(), 16);
    }

    #[test]
    fn test_independent_windows() {
        let config = FloatyConfig {
            duration: Some(Duration::from_secs(60)),
            ..FloatyConfig::default()
        }
        .with_entry("session", EntryConfig::new(16, Duration::from_secs(30)));
        let (builder, _) = counting_builder();
        let registry = builder.build_at(&config, 0).unwrap();
        let before = registry.current_values(0);

        let observation = registry.observe(30_000);
        assert_eq!(observation.rotations.len(), 1);
        assert_eq!(observation.rotations[0].name, "session");
        assert_eq!(observation.values["root"], before["root"]);
        assert_ne!(observation.values["session"], before["session"]);

        assert!(registry.observe(45_000).rotations.is_empty());

        let observation = registry.observe(60_000);
        let rotated: Vec<&str> = observation.rotations.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(rotated, ["root", "session"]);
    }

    #[test]
    fn test_get_refreshes_and_misses() {
        let (builder, calls) = counting_builder();
        let config = FloatyConfig {
            duration: Some(Duration::from_secs(10)),
            ..FloatyConfig::default()
        };
        let registry = builder.build_at(&config, 0).unwrap();

        let v0 = registry.get("root", 5_000).unwrap();
        assert_eq!(registry.get("root", 5_000).unwrap(), v0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let v1 = registry.get("root", 10_001).unwrap();
        assert_ne!(v0, v1);
        assert_eq!(registry.snapshot("root").unwrap().expires_at, 20_001);

        assert_eq!(registry.get("nonexistent", 10_001), None);
        assert_eq!(registry.snapshot("nonexistent"), None);
    }

    #[test]
    fn test_stats_count_rotations_and_failures() {
        let fail = Arc::new(AtomicBool::new(false));
        let switch = Arc::clone(&fail);
        let registry = Registry::builder()
            .with_generator(move |length: usize| -> Result<String, FloatyError> {
                if switch.load(Ordering::SeqCst) {
                    Err(FloatyError::Generation("entropy exhausted".to_string()))
                } else {
                    Ok("q".repeat(length))
                }
            })
            .build_at(
                &FloatyConfig {
                    duration: Some(Duration::from_secs(10)),
                    ..FloatyConfig::default()
                },
                0,
            )
            .unwrap();

        registry.current_values(10_000);
        fail.store(true, Ordering::SeqCst);
        let values = registry.current_values(20_000);
        assert_eq!(values["root"], "qqqqqqqq");

        assert_eq!(
            registry.stats(),
            RegistryStats {
                entries: 1,
                rotations: 1,
                failed_rotations: 1,
            }
        );
    }

    #[test]
    fn test_initialization_failure_is_reported() {
        let result = Registry::builder()
            .with_generator(|_: usize| -> Result<String, FloatyError> {
                Err(FloatyError::Generation("no entropy".to_string()))
            })
            .build_at(&FloatyConfig::default(), 0);
        assert!(matches!(result, Err(FloatyError::Generation(_))));

        let conflicting = FloatyConfig::default().with_entry("root", EntryConfig::default());
        assert!(matches!(
            Registry::initialize(&conflicting, 0),
            Err(FloatyError::DuplicateEntry(_))
        ));
    }

    #[test]
    fn test_oversized_window_saturates() {
        let config = FloatyConfig::default()
            .with_entry("forever", EntryConfig::new(8, Duration::MAX));
        let registry = Registry::initialize(&config, 1_000).unwrap();

        let forever = registry.snapshot("forever").unwrap();
        assert_eq!(forever.expires_at, u64::MAX);
        assert_eq!(registry.get("forever", u64::MAX - 1).unwrap(), forever.value);
    }

    #[test]
    fn test_build_uses_clock() {
        let registry = Registry::builder()
            .with_clock(|| Ok(7_000))
            .build(&FloatyConfig::default())
            .unwrap();
        assert_eq!(registry.now().unwrap(), 7_000);
        assert_eq!(registry.snapshot("root").unwrap().issued_at, 7_000);

        let broken = Registry::builder()
            .with_clock(|| Err(FloatyError::Clock("stopped".to_string())))
            .build(&FloatyConfig::default());
        assert!(matches!(broken, Err(FloatyError::Clock(_))));
    }

    #[test]
    fn test_system_clock_default() {
        let registry = Registry::builder().build(&FloatyConfig::default()).unwrap();
        let issued_at = registry.snapshot("root").unwrap().issued_at;
        assert!(registry.now().unwrap() >= issued_at);
    }
}
