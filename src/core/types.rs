//! PW-001: Core types. Configuration document, snapshots, verdicts, events.
//!
//! The config document derives Serialize/Deserialize for YAML roundtripping and
//! JsonSchema for `provwatch schema`. Verdict types are derived per run and never
//! persisted.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// provwatch.yaml
// ============================================================================

/// Root configuration. What to watch and how to react.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProvwatchConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-readable name for this watch
    pub name: String,

    /// Declared source-of-truth tree
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,

    /// Deployed copy that must match the source tree
    #[serde(default = "default_deployed_root")]
    pub deployed_root: PathBuf,

    /// Baseline document location
    #[serde(default = "default_baseline")]
    pub baseline: PathBuf,

    /// Digest algorithm used for baselines and comparisons
    #[serde(default)]
    pub algorithm: HashAlgorithm,

    /// Suspicious tokens (keyword → enabled)
    #[serde(default = "default_keywords")]
    pub keywords: IndexMap<String, bool>,

    /// Glob patterns (relative to each root) excluded from every walk
    #[serde(default)]
    pub exclude: Vec<String>,

    /// How files absent from the baseline are treated
    #[serde(default)]
    pub new_files: NewFilePolicy,

    /// Hashing/scanning workers (0 = available parallelism)
    #[serde(default)]
    pub workers: usize,

    /// Per-file read timeout in milliseconds
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,

    /// Append-only JSONL event log
    #[serde(default)]
    pub event_log: Option<PathBuf>,

    /// Shell hook run once per breached run
    #[serde(default)]
    pub alert_command: Option<String>,
}

fn default_source_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_deployed_root() -> PathBuf {
    PathBuf::from("deployed_code")
}

fn default_baseline() -> PathBuf {
    PathBuf::from("integrity_baseline.json")
}

/// Default suspicious tokens, all enabled.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "eval",
    "exec",
    "subprocess",
    "os.system",
    "dangerouslySetInnerHTML",
];

pub fn default_keywords() -> IndexMap<String, bool> {
    DEFAULT_KEYWORDS
        .iter()
        .map(|k| (k.to_string(), true))
        .collect()
}

impl Default for ProvwatchConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: "provwatch".to_string(),
            source_root: default_source_root(),
            deployed_root: default_deployed_root(),
            baseline: default_baseline(),
            algorithm: HashAlgorithm::default(),
            keywords: default_keywords(),
            exclude: Vec::new(),
            new_files: NewFilePolicy::default(),
            workers: 0,
            read_timeout_ms: None,
            event_log: None,
            alert_command: None,
        }
    }
}

/// Digest algorithm identifier, stored alongside every baseline.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl HashAlgorithm {
    /// Hex length of a digest produced by this algorithm.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Blake3 | Self::Sha256 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blake3 => write!(f, "blake3"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blake3" => Ok(Self::Blake3),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(format!("unknown hash algorithm '{}'", other)),
        }
    }
}

/// Treatment of files present on disk but absent from the baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NewFilePolicy {
    /// Report them, never alert
    #[default]
    Ignore,
    /// Count them as drift (allowlist model)
    Alert,
}

// ============================================================================
// Snapshots
// ============================================================================

/// Relative path → hex digest.
pub type DigestMap = BTreeMap<String, String>;

/// Digests of one tree, computed at check time. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSnapshot {
    pub digests: DigestMap,
    /// Files that were enumerated but could not be hashed (path → error).
    pub unreadable: BTreeMap<String, String>,
}

impl TreeSnapshot {
    pub fn len(&self) -> usize {
        self.digests.len() + self.unreadable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Verdicts
// ============================================================================

/// Classification of a single baselined path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStatus {
    Unchanged,
    Modified,
    Missing,
    /// On disk but not in the baseline.
    Added,
}

impl fmt::Display for PathStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::Modified => write!(f, "modified"),
            Self::Missing => write!(f, "missing"),
            Self::Added => write!(f, "added"),
        }
    }
}

/// Baseline vs snapshot comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityVerdict {
    pub unchanged: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub missing: BTreeSet<String>,
    pub added: BTreeSet<String>,
    /// Per-path detail for missing entries that exist but could not be read.
    pub unreadable: BTreeMap<String, String>,
    pub alert: bool,
}

impl IntegrityVerdict {
    pub fn status(&self, path: &str) -> Option<PathStatus> {
        if self.modified.contains(path) {
            Some(PathStatus::Modified)
        } else if self.missing.contains(path) {
            Some(PathStatus::Missing)
        } else if self.unchanged.contains(path) {
            Some(PathStatus::Unchanged)
        } else if self.added.contains(path) {
            Some(PathStatus::Added)
        } else {
            None
        }
    }
}

/// Source tree vs deployed tree comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossTreeVerdict {
    pub only_in_source: BTreeSet<String>,
    pub only_in_deployed: BTreeSet<String>,
    /// Shared paths whose digests differ, or that could not be hashed on one side.
    pub content_mismatch: BTreeSet<String>,
}

impl CrossTreeVerdict {
    pub fn is_clean(&self) -> bool {
        self.only_in_source.is_empty()
            && self.only_in_deployed.is_empty()
            && self.content_mismatch.is_empty()
    }
}

/// Why a file was flagged by the keyword scanner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum HitReason {
    Keyword(String),
    /// Content is not valid UTF-8 text.
    Undecodable,
    /// Content could not be read at all.
    Unreadable(String),
}

impl fmt::Display for HitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword(k) => write!(f, "keyword '{}'", k),
            Self::Undecodable => write!(f, "not decodable as text"),
            Self::Unreadable(e) => write!(f, "unreadable: {}", e),
        }
    }
}

/// One scanner finding. Line numbers and offsets are not tracked.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeywordHit {
    pub path: String,
    pub reason: HitReason,
}

/// Result of scanning a set of files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub files_scanned: usize,
    pub hits: Vec<KeywordHit>,
}

impl ScanReport {
    pub fn is_suspicious(&self) -> bool {
        !self.hits.is_empty()
    }

    pub fn suspicious_files(&self) -> BTreeSet<&str> {
        self.hits.iter().map(|h| h.path.as_str()).collect()
    }
}

/// Aggregate breach reasons for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreachReasons {
    pub malicious: bool,
    pub drift: bool,
    pub mismatch: bool,
}

impl BreachReasons {
    pub fn any(&self) -> bool {
        self.malicious || self.drift || self.mismatch
    }
}

impl fmt::Display for BreachReasons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.malicious {
            parts.push("malicious");
        }
        if self.drift {
            parts.push("drift");
        }
        if self.mismatch {
            parts.push("mismatch");
        }
        if parts.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", parts.join("+"))
        }
    }
}

/// Everything a monitor run found.
#[derive(Debug, Clone, Default)]
pub struct MonitorReport {
    pub run_id: String,
    /// A baseline was created during this run (trust on first use).
    pub bootstrapped: bool,
    pub scan: ScanReport,
    pub integrity: IntegrityVerdict,
    pub cross_tree: CrossTreeVerdict,
    pub reasons: BreachReasons,
    /// The alert sink was invoked.
    pub alerted: bool,
}

impl MonitorReport {
    pub fn passed(&self) -> bool {
        !self.reasons.any()
    }
}

// ============================================================================
// Event log
// ============================================================================

/// Run provenance events appended to the JSONL log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    RunStarted {
        run_id: String,
        source_root: String,
        deployed_root: String,
        provwatch_version: String,
    },
    BaselineCreated {
        run_id: String,
        path: String,
        files: usize,
        algorithm: HashAlgorithm,
    },
    BreachDetected {
        run_id: String,
        reasons: BreachReasons,
        findings: usize,
    },
    RunPassed {
        run_id: String,
        files_checked: usize,
    },
}

/// Event wrapper with timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}
