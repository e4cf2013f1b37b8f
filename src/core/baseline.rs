//! PW-013: Baseline store. Load, save (atomic), algorithm guard.
//!
//! A baseline is a flat JSON document of relative path → hex digest, plus the
//! algorithm that produced the digests. It is only ever replaced wholesale.

use super::error::MonitorError;
use super::types::{DigestMap, HashAlgorithm};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const BASELINE_SCHEMA: &str = "1.0";

/// Persisted trusted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub schema: String,
    pub algorithm: HashAlgorithm,
    pub generated_at: String,
    pub generator: String,
    pub files: DigestMap,
}

/// Create a baseline stamped with the current time.
pub fn new_baseline(algorithm: HashAlgorithm, files: DigestMap) -> Baseline {
    use crate::tripwire::eventlog::now_iso8601;
    Baseline {
        schema: BASELINE_SCHEMA.to_string(),
        algorithm,
        generated_at: now_iso8601(),
        generator: format!("provwatch {}", env!("CARGO_PKG_VERSION")),
        files,
    }
}

/// Temp sibling used for atomic replacement.
pub fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "baseline".to_string());
    path.with_file_name(format!("{}.tmp", name))
}

/// Load a baseline. Missing file is `BaselineNotFound`; anything unparseable
/// or with malformed digests is `BaselineCorrupt`.
pub fn load_baseline(path: &Path) -> Result<Baseline, MonitorError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MonitorError::BaselineNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(MonitorError::io(format!("cannot read {}", path.display()), e)),
    };

    let baseline: Baseline =
        serde_json::from_str(&content).map_err(|e| MonitorError::BaselineCorrupt {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    if baseline.schema != BASELINE_SCHEMA {
        return Err(MonitorError::BaselineCorrupt {
            path: path.to_path_buf(),
            detail: format!("unsupported schema \"{}\"", baseline.schema),
        });
    }

    let expected_len = baseline.algorithm.hex_len();
    for (file, digest) in &baseline.files {
        let well_formed = digest.len() == expected_len
            && digest.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(MonitorError::BaselineCorrupt {
                path: path.to_path_buf(),
                detail: format!("malformed {} digest for '{}'", baseline.algorithm, file),
            });
        }
    }

    Ok(baseline)
}

/// Load a baseline and require it to use `expected`.
pub fn load_checked(path: &Path, expected: HashAlgorithm) -> Result<Baseline, MonitorError> {
    let baseline = load_baseline(path)?;
    if baseline.algorithm != expected {
        return Err(MonitorError::AlgorithmMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            found: baseline.algorithm.to_string(),
        });
    }
    Ok(baseline)
}

/// Save a baseline atomically (write to temp, fsync, then rename).
pub fn save_baseline(path: &Path, baseline: &Baseline) -> Result<(), MonitorError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MonitorError::io(format!("cannot create dir {}", parent.display()), e)
            })?;
        }
    }

    let json = serde_json::to_string_pretty(baseline)
        .map_err(|e| MonitorError::Config(format!("serialize error: {}", e)))?;

    let tmp_path = temp_path(path);
    {
        let mut tmp = std::fs::File::create(&tmp_path)
            .map_err(|e| MonitorError::io(format!("cannot write {}", tmp_path.display()), e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.write_all(b"\n"))
            .and_then(|_| tmp.sync_all())
            .map_err(|e| MonitorError::io(format!("cannot write {}", tmp_path.display()), e))?;
    }
    std::fs::rename(&tmp_path, path).map_err(|e| {
        MonitorError::io(
            format!("cannot rename {} → {}", tmp_path.display(), path.display()),
            e,
        )
    })?;

    Ok(())
}
