use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::floaty::error::FloatyError;

/// Name of the entry that is always present in a registry.
pub const ROOT: &str = "root";
/// Shortest identifier a registry will generate.
pub const MIN_LENGTH: usize = 4;
/// Longest identifier a registry will generate.
pub const MAX_LENGTH: usize = 96;
/// Identifier length used when none (or zero) is configured.
pub const DEFAULT_LENGTH: usize = 8;
/// Shortest validity window; shorter configured windows are raised to this.
pub const MIN_DURATION: Duration = Duration::from_secs(10);
/// Validity window of named entries when none is configured.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(900);
/// Validity window of the root entry when none is configured.
pub const DEFAULT_ROOT_DURATION: Duration = Duration::from_secs(5400);

/// Configuration of a single named entry.
///
/// Both fields are optional; missing values fall back to defaults when the
/// entry is resolved. Durations deserialize from Go-style text (`"30s"`,
/// `"1h30m"`) or from an integer number of nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Identifier length in characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    /// Validity window of one identifier
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Duration>,
}

/// An entry's settings after defaults and clamping have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedEntry {
    /// Identifier length, within `[MIN_LENGTH, MAX_LENGTH]`
    pub length: usize,
    /// Validity window, at least `MIN_DURATION`
    pub duration: Duration,
}

impl EntryConfig {
    /// Creates an entry configuration with both values set.
    pub fn new(length: usize, duration: Duration) -> Self {
        Self {
            length: Some(length),
            duration: Some(duration),
        }
    }

    /// Applies defaults and clamping.
    ///
    /// A missing or zero length becomes [`DEFAULT_LENGTH`]; any other length
    /// is clamped into `[MIN_LENGTH, MAX_LENGTH]`. A missing or zero duration
    /// becomes `default_duration`; any other duration is raised to at least
    /// [`MIN_DURATION`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use floaty::{EntryConfig, DEFAULT_DURATION};
    /// use std::time::Duration;
    ///
    /// let resolved = EntryConfig::new(200, Duration::from_millis(500)).resolve(DEFAULT_DURATION);
    /// assert_eq!(resolved.length, 96);
    /// assert_eq!(resolved.duration, Duration::from_secs(10));
    /// ```
    pub fn resolve(&self, default_duration: Duration) -> ResolvedEntry {
        let length = match self.length {
            None | Some(0) => DEFAULT_LENGTH,
            Some(length) => length.clamp(MIN_LENGTH, MAX_LENGTH),
        };
        let duration = match self.duration {
            None => default_duration,
            Some(duration) if duration.is_zero() => default_duration,
            Some(duration) => duration.max(MIN_DURATION),
        };
        ResolvedEntry { length, duration }
    }
}

/// Configuration for a set of rotating identifiers.
///
/// The top-level `length` and `duration` configure the root entry; every key
/// of `additional` configures one named entry, either with an object or with
/// a bare integer length (`{"session": 16}`).
///
/// # Example
///
/// ```rust
/// use floaty::FloatyConfig;
///
/// let config = FloatyConfig::from_json(r#"{
///     "length": 8,
///     "duration": "1m",
///     "additional": { "session": { "length": 16, "duration": "30s" } }
/// }"#)?;
///
/// let entries = config.entries()?;
/// assert_eq!(entries[0].0, "root");
/// assert_eq!(entries[1].0, "session");
/// assert_eq!(entries[1].1.length, 16);
/// # Ok::<(), floaty::FloatyError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloatyConfig {
    /// Root identifier length in characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    /// Root validity window
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Duration>,
    /// Additional named entries
    #[serde(
        deserialize_with = "deserialize_entries",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub additional: BTreeMap<String, EntryConfig>,
}

impl FloatyConfig {
    /// Parses a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, FloatyError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds a root-only configuration from environment variables.
    ///
    /// Reads:
    /// - `FLOATY_LENGTH`: root identifier length
    /// - `FLOATY_DURATION`: root validity window, e.g. `90m`
    ///
    /// Unset variables leave the value unspecified so the defaults apply.
    ///
    /// # Errors
    ///
    /// - [`FloatyError::InvalidConfig`] if `FLOATY_LENGTH` is not a non-negative integer
    /// - [`FloatyError::InvalidDuration`] if `FLOATY_DURATION` cannot be parsed
    pub fn from_env() -> Result<Self, FloatyError> {
        let length = match std::env::var("FLOATY_LENGTH") {
            Ok(text) => Some(text.trim().parse().map_err(|_| {
                FloatyError::InvalidConfig(format!("FLOATY_LENGTH: invalid length {text:?}"))
            })?),
            Err(_) => None,
        };
        let duration = match std::env::var("FLOATY_DURATION") {
            Ok(text) => Some(parse_duration(&text)?),
            Err(_) => None,
        };

        Ok(Self {
            length,
            duration,
            additional: BTreeMap::new(),
        })
    }

    /// Adds a named entry, replacing any previous entry of that name.
    pub fn with_entry(mut self, name: impl Into<String>, entry: EntryConfig) -> Self {
        self.additional.insert(name.into(), entry);
        self
    }

    /// Returns the root entry's configuration.
    pub fn root(&self) -> EntryConfig {
        EntryConfig {
            length: self.length,
            duration: self.duration,
        }
    }

    /// Resolves every entry, root first, then named entries in name order.
    ///
    /// # Errors
    ///
    /// - [`FloatyError::DuplicateEntry`] if a named entry is called `root`
    /// - [`FloatyError::InvalidName`] if a name cannot form a placeholder key
    pub fn entries(&self) -> Result<Vec<(String, ResolvedEntry)>, FloatyError> {
        let mut entries = Vec::with_capacity(self.additional.len() + 1);
        entries.push((ROOT.to_string(), self.root().resolve(DEFAULT_ROOT_DURATION)));

        for (name, entry) in &self.additional {
            validate_name(name)?;
            if name == ROOT {
                return Err(FloatyError::DuplicateEntry(name.clone()));
            }
            entries.push((name.clone(), entry.resolve(DEFAULT_DURATION)));
        }

        Ok(entries)
    }

    /// Validates the configuration and returns any warnings.
    ///
    /// Warnings describe values that will be adjusted during resolution or
    /// that are likely unintended. They never prevent initialization.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let root = self.root();
        let named = self.additional.iter().map(|(name, e)| (name.as_str(), e));
        for (name, entry) in std::iter::once((ROOT, &root)).chain(named) {
            if let Some(length) = entry.length.filter(|&l| l != 0) {
                if !(MIN_LENGTH..=MAX_LENGTH).contains(&length) {
                    warnings.push(format!(
                        "Length {length} of '{name}' will be clamped to [{MIN_LENGTH}, {MAX_LENGTH}]"
                    ));
                }
            }
            if let Some(duration) = entry.duration {
                if !duration.is_zero() && duration < MIN_DURATION {
                    warnings.push(format!(
                        "Duration {} of '{name}' is below the {}s minimum and will be raised",
                        format_duration(duration),
                        MIN_DURATION.as_secs()
                    ));
                }
                if duration > Duration::from_secs(86_400) {
                    warnings.push(format!(
                        "Long duration (> 1 day) of '{name}' means identifiers rarely rotate"
                    ));
                }
            }
        }

        warnings
    }

    /// Returns a summary of the resolved configuration.
    pub fn summary(&self) -> String {
        match self.entries() {
            Ok(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(name, e)| {
                        format!("{name}: {} chars / {}", e.length, format_duration(e.duration))
                    })
                    .collect();
                format!("FloatyConfig {{ {} }}", parts.join(", "))
            }
            Err(e) => format!("FloatyConfig {{ invalid: {e} }}"),
        }
    }
}

/// Checks that `name` can be used as a placeholder suffix.
pub(crate) fn validate_name(name: &str) -> Result<(), FloatyError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(FloatyError::InvalidName(name.to_string()))
    }
}

/// Parses a Go-style duration such as `500ms`, `30s`, `1h30m` or `1.5h`.
///
/// Accepted units are `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h` and `d`.
/// A bare `0` is allowed; any other number needs a unit.
///
/// # Example
///
/// ```rust
/// use floaty::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("1h30m")?, Duration::from_secs(5400));
/// assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
/// assert!(parse_duration("10").is_err());
/// # Ok::<(), floaty::FloatyError>(())
/// ```
pub fn parse_duration(text: &str) -> Result<Duration, FloatyError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FloatyError::InvalidDuration("empty duration".to_string()));
    }
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }

    let invalid = |reason: &str| FloatyError::InvalidDuration(format!("{reason} in {trimmed:?}"));
    let mut total_ns = 0f64;
    let mut rest = trimmed;

    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        if number.is_empty() {
            return Err(invalid("expected a number"));
        }
        let value: f64 = number.parse().map_err(|_| invalid("malformed number"))?;

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3_600e9,
            "d" => 86_400e9,
            "" => return Err(invalid("missing unit")),
            _ => return Err(invalid(&format!("unknown unit {unit:?}"))),
        };

        total_ns += (value * scale).round();
        rest = tail;
    }

    if !total_ns.is_finite() || total_ns > u64::MAX as f64 {
        return Err(invalid("out of range"));
    }
    Ok(Duration::from_nanos(total_ns as u64))
}

/// Formats a duration in the compact form [`parse_duration`] accepts.
pub(crate) fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis == 0 || millis % 1000 != 0 {
        return format!("{millis}ms");
    }

    let mut secs = duration.as_secs();
    let mut out = String::new();
    for (unit, size) in [("h", 3_600), ("m", 60)] {
        if secs >= size {
            out.push_str(&format!("{}{unit}", secs / size));
            secs %= size;
        }
    }
    if secs > 0 || out.is_empty() {
        out.push_str(&format!("{secs}s"));
    }
    out
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DurationRepr {
    Nanos(u64),
    Text(String),
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<DurationRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(DurationRepr::Nanos(ns)) => Ok(Some(Duration::from_nanos(ns))),
        Some(DurationRepr::Text(text)) => parse_duration(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntryRepr {
    Length(usize),
    Full(EntryConfig),
}

impl From<EntryRepr> for EntryConfig {
    fn from(repr: EntryRepr) -> Self {
        match repr {
            EntryRepr::Length(length) => EntryConfig {
                length: Some(length),
                duration: None,
            },
            EntryRepr::Full(entry) => entry,
        }
    }
}

fn deserialize_entries<'de, D>(deserializer: D) -> Result<BTreeMap<String, EntryConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = BTreeMap::<String, EntryRepr>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .map(|(name, repr)| (name, repr.into()))
        .collect())
}

fn serialize_duration<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match duration {
        Some(d) => serializer.serialize_some(&format_duration(*d)),
        None => serializer.serialize_none(),
    }
}
