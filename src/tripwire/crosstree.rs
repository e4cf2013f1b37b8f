//! PW-016: Cross-tree comparison. Declared source tree vs deployed tree.
//!
//! Path-set asymmetry is reported without hashing. Only the intersection is
//! hashed; a shared path that cannot be hashed on either side is a mismatch.

use crate::core::error::MonitorError;
use crate::core::types::CrossTreeVerdict;
use crate::tripwire::hasher::{hash_tree, HashOptions};
use crate::tripwire::walker::{walk, WalkOptions};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Per-side walk options plus hashing options.
#[derive(Debug, Clone)]
pub struct CompareOptions {
    pub source_walk: WalkOptions,
    pub deployed_walk: WalkOptions,
    pub hash: HashOptions,
}

/// Partition two path sets into (only in source, only in deployed, shared).
pub fn partition(
    source: &BTreeSet<String>,
    deployed: &BTreeSet<String>,
) -> (BTreeSet<String>, BTreeSet<String>, BTreeSet<String>) {
    let only_source = source.difference(deployed).cloned().collect();
    let only_deployed = deployed.difference(source).cloned().collect();
    let shared = source.intersection(deployed).cloned().collect();
    (only_source, only_deployed, shared)
}

/// Compare two already-walked trees.
pub fn compare_paths(
    source_root: &Path,
    source_paths: &BTreeSet<String>,
    deployed_root: &Path,
    deployed_paths: &BTreeSet<String>,
    hash: &HashOptions,
) -> CrossTreeVerdict {
    let (only_in_source, only_in_deployed, shared) = partition(source_paths, deployed_paths);
    debug!(
        shared = shared.len(),
        only_source = only_in_source.len(),
        only_deployed = only_in_deployed.len(),
        "cross-tree partition"
    );

    let (left, right) = std::thread::scope(|scope| {
        let left = scope.spawn(|| hash_tree(source_root, &shared, hash));
        let right = hash_tree(deployed_root, &shared, hash);
        match left.join() {
            Ok(l) => (l, right),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    });

    let content_mismatch = shared
        .into_iter()
        .filter(|p| match (left.digests.get(p), right.digests.get(p)) {
            (Some(a), Some(b)) => a != b,
            _ => true,
        })
        .collect();

    CrossTreeVerdict {
        only_in_source,
        only_in_deployed,
        content_mismatch,
    }
}

/// Walk both roots and compare them. Either root being inaccessible aborts.
pub fn compare(
    source_root: &Path,
    deployed_root: &Path,
    opts: &CompareOptions,
) -> Result<CrossTreeVerdict, MonitorError> {
    let source_paths = walk(source_root, &opts.source_walk)?;
    let deployed_paths = walk(deployed_root, &opts.deployed_walk)?;
    Ok(compare_paths(
        source_root,
        &source_paths,
        deployed_root,
        &deployed_paths,
        &opts.hash,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::HashAlgorithm;

    fn opts() -> CompareOptions {
        CompareOptions {
            source_walk: WalkOptions::default(),
            deployed_walk: WalkOptions::default(),
            hash: HashOptions::new(HashAlgorithm::Blake3),
        }
    }

    fn twin_trees() -> (tempfile::TempDir, tempfile::TempDir) {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        for root in [a.path(), b.path()] {
            std::fs::create_dir_all(root.join("static")).unwrap();
            std::fs::write(root.join("index.html"), "<h1>app</h1>").unwrap();
            std::fs::write(root.join("static/app.js"), "console.log(1)").unwrap();
        }
        (a, b)
    }

    #[test]
    fn test_pw016_identical_trees_clean() {
        let (a, b) = twin_trees();
        let v = compare(a.path(), b.path(), &opts()).unwrap();
        assert!(v.is_clean());
    }

    #[test]
    fn test_pw016_extra_file_one_side() {
        let (a, b) = twin_trees();
        std::fs::write(b.path().join("backdoor.php"), "<?php ?>").unwrap();
        let v = compare(a.path(), b.path(), &opts()).unwrap();
        assert!(!v.is_clean());
        assert!(v.only_in_deployed.contains("backdoor.php"));
        assert!(v.only_in_source.is_empty());
        assert!(!v.content_mismatch.contains("backdoor.php"));
    }

    #[test]
    fn test_pw016_content_drift() {
        let (a, b) = twin_trees();
        std::fs::write(b.path().join("static/app.js"), "console.log(2)").unwrap();
        let v = compare(a.path(), b.path(), &opts()).unwrap();
        assert_eq!(v.content_mismatch.len(), 1);
        assert!(v.content_mismatch.contains("static/app.js"));
        assert!(v.only_in_source.is_empty() && v.only_in_deployed.is_empty());
    }

    #[test]
    fn test_pw016_asymmetry_and_drift_both_reported() {
        let (a, b) = twin_trees();
        std::fs::remove_file(b.path().join("index.html")).unwrap();
        std::fs::write(b.path().join("static/app.js"), "tampered").unwrap();
        let v = compare(a.path(), b.path(), &opts()).unwrap();
        assert!(v.only_in_source.contains("index.html"));
        assert!(v.content_mismatch.contains("static/app.js"));
    }

    #[test]
    fn test_pw016_missing_deployed_root() {
        let (a, _b) = twin_trees();
        let result = compare(a.path(), Path::new("/nonexistent/deployed"), &opts());
        assert!(matches!(result, Err(MonitorError::RootInaccessible { .. })));
    }

    #[test]
    fn test_pw016_partition() {
        let s: BTreeSet<String> = ["a", "b"].iter().map(|x| x.to_string()).collect();
        let d: BTreeSet<String> = ["b", "c"].iter().map(|x| x.to_string()).collect();
        let (only_s, only_d, shared) = partition(&s, &d);
        assert!(only_s.contains("a") && only_s.len() == 1);
        assert!(only_d.contains("c") && only_d.len() == 1);
        assert!(shared.contains("b") && shared.len() == 1);
    }

    #[test]
    fn test_pw016_unhashable_shared_path_is_mismatch() {
        let (a, b) = twin_trees();
        let paths: BTreeSet<String> = ["ghost.txt".to_string()].into_iter().collect();
        let v = compare_paths(a.path(), &paths, b.path(), &paths, &opts().hash);
        assert!(v.content_mismatch.contains("ghost.txt"));
    }
}
