use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Configuration file consulted when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "keypurge.toml";

/// Prefix for nested environment overrides, e.g. `KEYPURGE__STORE__ADDR`.
pub const ENV_PREFIX: &str = "KEYPURGE__";

/// Flat environment names understood by earlier releases of the tool, mapped
/// onto their nested configuration keys.
const LEGACY_ENV: &[(&str, &str, LegacyKind)] = &[
    ("REDIS_ADDR", "store.addr", LegacyKind::Text),
    ("TLS", "store.tls", LegacyKind::Flag),
    ("READ_TIMEOUT", "store.read_timeout", LegacyKind::Count),
    ("ACCESS_MODE", "search.access_mode", LegacyKind::AccessMode),
    ("SIZE_THRESHOLD", "search.size_threshold", LegacyKind::Count),
    ("REQUIRED_MATCH_COUNT", "search.min_occurrences", LegacyKind::Count),
    ("DELETE_MATCHING_KEYS", "delete", LegacyKind::Flag),
    ("WAIT_AND_REDELETE", "reconcile.enabled", LegacyKind::Flag),
    ("CLEAN_DELETE_MIN", "reconcile.min_clean_passes", LegacyKind::Count),
    ("CLEAN_DELETE_WAIT_MS", "reconcile.pass_interval_ms", LegacyKind::Count),
    ("PROGRESS", "progress", LegacyKind::Flag),
];

#[derive(Clone, Copy, Debug)]
enum LegacyKind {
    Text,
    Flag,
    Count,
    AccessMode,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
enum LegacyValue {
    Text(String),
    Flag(bool),
    Count(u64),
}

/// How a key's value is read from the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// The value is an opaque byte string.
    #[serde(alias = "string", alias = "FLAT", alias = "STRING")]
    Flat,
    /// The value is a field/value mapping, collapsed to bytes by concatenating
    /// every field name and value in the order the store returns them.
    #[default]
    #[serde(alias = "hash", alias = "FIELDMAP", alias = "HASH")]
    FieldMap,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => write!(f, "flat"),
            Self::FieldMap => write!(f, "fieldmap"),
        }
    }
}

impl std::str::FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" | "string" => Ok(Self::Flat),
            "fieldmap" | "hash" => Ok(Self::FieldMap),
            other => Err(format!(
                "unknown access mode '{other}', expected one of: flat, string, fieldmap, hash"
            )),
        }
    }
}

/// Connection settings for the Redis-compatible store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `host:port` of the server.
    ///
    /// Env: KEYPURGE__STORE__ADDR (legacy: REDIS_ADDR)
    pub addr: String,
    /// Connect with TLS (`rediss://`).
    ///
    /// Env: KEYPURGE__STORE__TLS (legacy: TLS)
    #[serde(default = "default_true", deserialize_with = "flag")]
    pub tls: bool,
    /// Skip server certificate verification when TLS is on.
    ///
    /// Env: KEYPURGE__STORE__INSECURE
    #[serde(default = "default_true", deserialize_with = "flag")]
    pub insecure: bool,
    /// Upper bound on establishing the connection. A bare number is read as
    /// seconds.
    ///
    /// Env: KEYPURGE__STORE__CONNECT_TIMEOUT
    #[serde(
        serialize_with = "humantime_serde::serialize",
        deserialize_with = "seconds_or_humantime"
    )]
    pub connect_timeout: Duration,
    /// Upper bound on a single store call. A bare number is read as seconds.
    ///
    /// Env: KEYPURGE__STORE__READ_TIMEOUT (legacy: READ_TIMEOUT)
    #[serde(
        serialize_with = "humantime_serde::serialize",
        deserialize_with = "seconds_or_humantime"
    )]
    pub read_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            addr: String::from("127.0.0.1:6379"),
            tls: true,
            insecure: true,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(180),
        }
    }
}

impl StoreConfig {
    /// Connection URL in the form the Redis client expects.
    pub fn url(&self) -> String {
        if !self.tls {
            return format!("redis://{}", self.addr);
        }
        if self.insecure {
            format!("rediss://{}/#insecure", self.addr)
        } else {
            format!("rediss://{}", self.addr)
        }
    }
}

/// Which values are selected.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Env: KEYPURGE__SEARCH__ACCESS_MODE (legacy: ACCESS_MODE)
    #[serde(default)]
    pub access_mode: AccessMode,
    /// Minimum value size in bytes.
    ///
    /// Env: KEYPURGE__SEARCH__SIZE_THRESHOLD (legacy: SIZE_THRESHOLD)
    #[serde(default)]
    pub size_threshold: usize,
    /// Exact value, or substring when `min_occurrences > 0`. Empty selects
    /// every value that passes the size threshold.
    ///
    /// Env: KEYPURGE__SEARCH__PATTERN
    #[serde(default)]
    pub pattern: Option<String>,
    /// Env: KEYPURGE__SEARCH__MIN_OCCURRENCES (legacy: REQUIRED_MATCH_COUNT)
    #[serde(default)]
    pub min_occurrences: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanConfig {
    /// `COUNT` hint passed to each `SCAN` call.
    ///
    /// Env: KEYPURGE__SCAN__BATCH_SIZE
    pub batch_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { batch_size: 50 }
    }
}

/// Post-delete verification against writers that re-insert deleted keys.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Env: KEYPURGE__RECONCILE__ENABLED (legacy: WAIT_AND_REDELETE)
    #[serde(default, deserialize_with = "flag")]
    pub enabled: bool,
    /// Consecutive clean passes required before the keys count as deleted.
    ///
    /// Env: KEYPURGE__RECONCILE__MIN_CLEAN_PASSES (legacy: CLEAN_DELETE_MIN)
    pub min_clean_passes: u64,
    /// Env: KEYPURGE__RECONCILE__PASS_INTERVAL_MS (legacy: CLEAN_DELETE_WAIT_MS)
    pub pass_interval_ms: u64,
    /// Give up after this many passes. Unbounded when unset.
    ///
    /// Env: KEYPURGE__RECONCILE__MAX_PASSES
    #[serde(default)]
    pub max_passes: Option<u64>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_clean_passes: 500,
            pass_interval_ms: 150,
            max_passes: None,
        }
    }
}

impl ReconcileConfig {
    pub fn pass_interval(&self) -> Duration {
        Duration::from_millis(self.pass_interval_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Configuration {
    pub store: StoreConfig,
    pub search: SearchConfig,
    pub scan: ScanConfig,
    /// Delete matching keys instead of listing them.
    ///
    /// Env: KEYPURGE__DELETE (legacy: DELETE_MATCHING_KEYS)
    #[serde(default, deserialize_with = "flag")]
    pub delete: bool,
    pub reconcile: ReconcileConfig,
    /// Print scan progress to stderr.
    ///
    /// Env: KEYPURGE__PROGRESS (legacy: PROGRESS)
    #[serde(default = "default_true", deserialize_with = "flag")]
    pub progress: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            search: SearchConfig::default(),
            scan: ScanConfig::default(),
            delete: false,
            reconcile: ReconcileConfig::default(),
            progress: true,
        }
    }
}

impl Configuration {
    /// Load from `keypurge.toml` in the working directory (if present) and the
    /// environment.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Path::new(DEFAULT_CONFIG_FILE))
            .extract()
            .map_err(Box::new)
    }

    /// Load from an explicit configuration file and the environment.
    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        Self::figment(path).extract().map_err(Box::new)
    }

    fn figment(path: &Path) -> Figment {
        let figment =
            Figment::from(Serialized::defaults(Configuration::default())).merge(Toml::file(path));

        merge_legacy_env(figment).merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.search.pattern.is_none() {
            anyhow::bail!("a search pattern is required");
        }

        if self.scan.batch_size == 0 {
            anyhow::bail!("scan.batch_size must be positive, got 0");
        }

        if self.reconcile.min_clean_passes == 0 {
            anyhow::bail!("reconcile.min_clean_passes must be positive, got 0");
        }

        if let Some(max_passes) = self.reconcile.max_passes
            && max_passes < self.reconcile.min_clean_passes
        {
            anyhow::bail!(
                "reconcile.max_passes ({max_passes}) is below reconcile.min_clean_passes ({}), \
                 reconciliation could never converge",
                self.reconcile.min_clean_passes
            );
        }

        if self.store.addr.is_empty() {
            anyhow::bail!("store.addr cannot be empty");
        }

        Ok(())
    }
}

/// Layer the legacy flat variables onto `figment`, read as leniently as
/// earlier releases read them: an empty or non-numeric value leaves the
/// setting untouched, and any access mode other than `string`/`flat` selects
/// field maps.
fn merge_legacy_env(figment: Figment) -> Figment {
    LEGACY_ENV
        .iter()
        .fold(figment, |figment, &(name, key, kind)| {
            let Ok(raw) = std::env::var(name) else {
                return figment;
            };
            match legacy_value(name, &raw, kind) {
                Some(value) => figment.merge(Serialized::default(key, value)),
                None => figment,
            }
        })
}

fn legacy_value(name: &str, raw: &str, kind: LegacyKind) -> Option<LegacyValue> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match kind {
        LegacyKind::Text => Some(LegacyValue::Text(raw.to_string())),
        LegacyKind::Flag => Some(LegacyValue::Flag(parse_flag(raw))),
        LegacyKind::Count => match raw.parse() {
            Ok(count) => Some(LegacyValue::Count(count)),
            Err(_) => {
                tracing::warn!(variable = name, value = raw, "Ignoring non-numeric value");
                None
            }
        },
        LegacyKind::AccessMode => {
            let mode = match raw.to_ascii_lowercase().as_str() {
                "string" | "flat" => AccessMode::Flat,
                _ => AccessMode::FieldMap,
            };
            Some(LegacyValue::Text(mode.to_string()))
        }
    }
}

fn default_true() -> bool {
    true
}

/// Truthiness of the legacy environment flags: `y`, `yes`, `true`, `t` and `1`.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "true" | "t" | "1"
    )
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value == 1,
        Flag::Text(value) => parse_flag(&value),
    })
}

fn seconds_or_humantime<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timeout {
        Seconds(u64),
        Human(#[serde(with = "humantime_serde")] Duration),
    }

    Ok(match Timeout::deserialize(deserializer)? {
        Timeout::Seconds(secs) => Duration::from_secs(secs),
        Timeout::Human(duration) => duration,
    })
}
