//! PW-014: Drift detection. Compare a fresh tree snapshot to the baseline.

use crate::core::types::{DigestMap, IntegrityVerdict, NewFilePolicy, TreeSnapshot};

/// A single drift finding, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftFinding {
    pub path: String,
    pub expected_hash: String,
    pub actual_hash: String,
    pub detail: String,
}

/// Classify every baselined path as unchanged, modified or missing.
///
/// A baselined file that exists but cannot be hashed counts as missing.
/// Snapshot paths absent from the baseline are recorded as `added`; they only
/// raise the alert under `NewFilePolicy::Alert`.
pub fn check(
    baseline: &DigestMap,
    snapshot: &TreeSnapshot,
    policy: NewFilePolicy,
) -> IntegrityVerdict {
    let mut verdict = IntegrityVerdict::default();

    for (path, expected) in baseline {
        match snapshot.digests.get(path) {
            Some(actual) if actual == expected => {
                verdict.unchanged.insert(path.clone());
            }
            Some(_) => {
                verdict.modified.insert(path.clone());
            }
            None => {
                if let Some(err) = snapshot.unreadable.get(path) {
                    verdict.unreadable.insert(path.clone(), err.clone());
                }
                verdict.missing.insert(path.clone());
            }
        }
    }

    verdict.added = snapshot
        .digests
        .keys()
        .chain(snapshot.unreadable.keys())
        .filter(|p| !baseline.contains_key(*p))
        .cloned()
        .collect();

    verdict.alert = !verdict.modified.is_empty()
        || !verdict.missing.is_empty()
        || (policy == NewFilePolicy::Alert && !verdict.added.is_empty());
    verdict
}

/// Expand a verdict into per-path findings with expected/actual digests.
pub fn findings(
    baseline: &DigestMap,
    snapshot: &TreeSnapshot,
    verdict: &IntegrityVerdict,
) -> Vec<DriftFinding> {
    let mut out = Vec::new();

    for path in &verdict.modified {
        out.push(DriftFinding {
            path: path.clone(),
            expected_hash: baseline.get(path).cloned().unwrap_or_default(),
            actual_hash: snapshot.digests.get(path).cloned().unwrap_or_default(),
            detail: format!("{} content changed", path),
        });
    }

    for path in &verdict.missing {
        let detail = match verdict.unreadable.get(path) {
            Some(err) => format!("{} cannot be read: {}", path, err),
            None => format!("{} does not exist", path),
        };
        out.push(DriftFinding {
            path: path.clone(),
            expected_hash: baseline.get(path).cloned().unwrap_or_default(),
            actual_hash: "MISSING".to_string(),
            detail,
        });
    }

    out
}
