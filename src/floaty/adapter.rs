//! Per-request integration.
//!
//! [`FloatyHandler`] sits in a request pipeline: for every request it asks
//! the registry for the current identifiers, writes them into the request's
//! placeholder map and hands the request on. It never rejects a request.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;

use crate::floaty::config::ROOT;
use crate::floaty::registry::Registry;

/// Base placeholder name; named entries are published as `floaty.<name>`.
pub const DEFAULT_PREFIX: &str = "floaty";

/// A per-request variable map that identifiers are written into.
pub trait Replacer {
    /// Sets the placeholder `key` to `value`, replacing any previous value.
    fn set(&mut self, key: String, value: String);
}

impl Replacer for HashMap<String, String> {
    fn set(&mut self, key: String, value: String) {
        self.insert(key, value);
    }
}

impl Replacer for BTreeMap<String, String> {
    fn set(&mut self, key: String, value: String) {
        self.insert(key, value);
    }
}

/// A cloneable placeholder map, convenient to carry in request extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Placeholders(BTreeMap<String, String>);

impl Placeholders {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a placeholder.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns the number of placeholders.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no placeholder is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Consumes the map, returning the underlying `BTreeMap`.
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl Replacer for Placeholders {
    fn set(&mut self, key: String, value: String) {
        self.0.insert(key, value);
    }
}

/// Publishes a registry's identifiers into each request.
///
/// The root entry is published under the prefix itself, every other entry
/// under `<prefix>.<name>`. Rotations triggered by a request are logged
/// through `tracing`; failures are logged and never reach the request.
///
/// # Example
///
/// ```rust
/// use floaty::{EntryConfig, FloatyConfig, FloatyHandler, Placeholders, Registry};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), floaty::FloatyError> {
/// let config = FloatyConfig::default()
///     .with_entry("session", EntryConfig::new(16, Duration::from_secs(30)));
/// let handler = FloatyHandler::new(Arc::new(Registry::builder().build(&config)?));
///
/// let mut vars = Placeholders::new();
/// handler.annotate(&mut vars);
/// assert_eq!(vars.get("floaty").map(str::len), Some(8));
/// assert_eq!(vars.get("floaty.session").map(str::len), Some(16));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FloatyHandler {
    registry: Arc<Registry>,
    prefix: String,
}

impl FloatyHandler {
    /// Creates a handler publishing under [`DEFAULT_PREFIX`].
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Publishes under `prefix` instead, e.g. `http.floaty`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Returns the registry this handler reads from.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns the placeholder key an entry is published under.
    pub fn key_for(&self, name: &str) -> String {
        if name == ROOT {
            self.prefix.clone()
        } else {
            format!("{}.{name}", self.prefix)
        }
    }

    /// Writes the current identifiers into `vars` using the registry's
    /// clock, returning how many placeholders were set.
    ///
    /// If the clock cannot be read nothing is published.
    pub fn annotate<R>(&self, vars: &mut R) -> usize
    where
        R: Replacer + ?Sized,
    {
        match self.registry.now() {
            Ok(now) => self.annotate_at(vars, now),
            Err(e) => {
                tracing::warn!(
                    target: "floaty",
                    error = %e,
                    "clock unavailable, identifiers not published"
                );
                0
            }
        }
    }

    /// Writes the identifiers valid at `now` into `vars`, returning how many
    /// placeholders were set.
    pub fn annotate_at<R>(&self, vars: &mut R, now: u64) -> usize
    where
        R: Replacer + ?Sized,
    {
        let observation = self.registry.observe(now);
        for rotation in &observation.rotations {
            rotation.log();
        }

        let published = observation.values.len();
        for (name, value) in observation.values {
            vars.set(self.key_for(&name), value);
        }
        published
    }

    /// Resolves a single placeholder key such as `floaty` or
    /// `floaty.session`.
    ///
    /// Returns `None` for keys outside this handler's prefix and for names
    /// that are not registered.
    pub fn resolve(&self, key: &str) -> Option<String> {
        let name = if key == self.prefix {
            ROOT
        } else {
            key.strip_prefix(self.prefix.as_str())?.strip_prefix('.')?
        };
        if name == ROOT && key != self.prefix {
            return None;
        }

        let now = self.registry.now().ok()?;
        self.registry.get(name, now)
    }

    /// Annotates `vars` and passes them to the next handler.
    ///
    /// `next` is always invoked; its output is returned unchanged.
    pub async fn serve<R, N, Fut>(&self, mut vars: R, next: N) -> Fut::Output
    where
        R: Replacer,
        N: FnOnce(R) -> Fut,
        Fut: Future,
    {
        self.annotate(&mut vars);
        next(vars).await
    }
}
