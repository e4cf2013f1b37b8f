//! PW-020: Monitor. Single-pass orchestration.
//!
//! bootstrap baseline → walk source → {scan, verify, cross-check} in parallel
//! → aggregate → alert at most once.

use super::baseline::{self, Baseline};
use super::error::MonitorError;
use super::parser;
use super::types::*;
use crate::alert::{AlertSink, Breach};
use crate::tripwire::crosstree;
use crate::tripwire::drift;
use crate::tripwire::eventlog;
use crate::tripwire::hasher::{hash_tree, HashOptions};
use crate::tripwire::scanner::{scan_tree, KeywordSet};
use crate::tripwire::walker::{ensure_root, walk, WalkOptions};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Configured monitor. Holds no filesystem state between runs.
#[derive(Debug, Clone)]
pub struct Monitor {
    config: ProvwatchConfig,
    keywords: KeywordSet,
    globs: WalkOptions,
    hash: HashOptions,
}

/// Outcome of the integrity step.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub baseline: Baseline,
    pub snapshot: TreeSnapshot,
    pub verdict: IntegrityVerdict,
}

impl Monitor {
    /// Validate the config and compile keywords and exclude patterns.
    pub fn new(config: ProvwatchConfig) -> Result<Self, MonitorError> {
        let errors = parser::validate_config(&config);
        if !errors.is_empty() {
            let joined: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(MonitorError::Config(joined.join("; ")));
        }
        let keywords = KeywordSet::from_config(&config.keywords)?;
        let globs = WalkOptions::with_globs(&config.exclude)?;
        let mut hash = HashOptions::new(config.algorithm);
        hash.workers = config.workers;
        hash.read_timeout = config.read_timeout_ms.map(Duration::from_millis);
        Ok(Self {
            config,
            keywords,
            globs,
            hash,
        })
    }

    pub fn config(&self) -> &ProvwatchConfig {
        &self.config
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    /// Walk options for the source tree: configured globs, plus the deployed
    /// root, baseline and event log when they live inside the source root.
    pub fn source_walk_options(&self) -> WalkOptions {
        let mut opts = self.globs.clone();
        let mut candidates = vec![
            self.config.deployed_root.clone(),
            self.config.baseline.clone(),
            baseline::temp_path(&self.config.baseline),
        ];
        if let Some(log) = &self.config.event_log {
            candidates.push(log.clone());
        }
        for candidate in candidates {
            if let Some(rel) = relative_under(&self.config.source_root, &candidate) {
                opts.exclude_prefixes.push(rel);
            }
        }
        opts
    }

    /// Walk options for the deployed tree.
    pub fn deployed_walk_options(&self) -> WalkOptions {
        let mut opts = self.globs.clone();
        let mut candidates = vec![self.config.baseline.clone()];
        if let Some(log) = &self.config.event_log {
            candidates.push(log.clone());
        }
        for candidate in candidates {
            if let Some(rel) = relative_under(&self.config.deployed_root, &candidate) {
                opts.exclude_prefixes.push(rel);
            }
        }
        opts
    }

    fn walk_source(&self) -> Result<BTreeSet<String>, MonitorError> {
        walk(&self.config.source_root, &self.source_walk_options())
    }

    /// Hash the source tree and persist it as the new baseline, replacing any
    /// previous one.
    pub fn create_baseline(&self) -> Result<Baseline, MonitorError> {
        let paths = self.walk_source()?;
        let snapshot = hash_tree(&self.config.source_root, &paths, &self.hash);
        if !snapshot.unreadable.is_empty() {
            warn!(
                skipped = snapshot.unreadable.len(),
                "unreadable files left out of baseline"
            );
        }
        let b = baseline::new_baseline(self.config.algorithm, snapshot.digests);
        baseline::save_baseline(&self.config.baseline, &b)?;
        info!(
            path = %self.config.baseline.display(),
            files = b.files.len(),
            algorithm = %b.algorithm,
            "baseline written"
        );
        Ok(b)
    }

    /// Load the baseline, creating one on first use. Returns whether it was
    /// created by this call.
    pub fn load_or_bootstrap(&self) -> Result<(Baseline, bool), MonitorError> {
        match baseline::load_checked(&self.config.baseline, self.config.algorithm) {
            Ok(b) => Ok((b, false)),
            Err(MonitorError::BaselineNotFound(path)) => {
                info!(path = %path.display(), "no baseline, trusting current source tree");
                Ok((self.create_baseline()?, true))
            }
            Err(e) => Err(e),
        }
    }

    /// Keyword scan of the source tree.
    pub fn scan(&self) -> Result<ScanReport, MonitorError> {
        let paths = self.walk_source()?;
        Ok(self.scan_paths(&paths))
    }

    fn scan_paths(&self, paths: &BTreeSet<String>) -> ScanReport {
        scan_tree(
            &self.config.source_root,
            paths,
            &self.keywords,
            self.config.workers,
            self.hash.read_timeout,
        )
    }

    /// Integrity check against an existing baseline (no bootstrap).
    pub fn verify(&self) -> Result<VerifyOutcome, MonitorError> {
        let b = baseline::load_checked(&self.config.baseline, self.config.algorithm)?;
        let paths = self.walk_source()?;
        Ok(self.verify_paths(b, &paths))
    }

    fn verify_paths(&self, baseline: Baseline, paths: &BTreeSet<String>) -> VerifyOutcome {
        // Baselined paths the walk did not see are re-examined without
        // following links. Regular files get hashed (excluded or unlisted by
        // the walk); anything else at that path fails closed without being
        // opened.
        let mut targets: BTreeSet<&String> = paths.iter().collect();
        let mut not_regular = BTreeMap::new();
        for rel in baseline.files.keys().filter(|p| !paths.contains(*p)) {
            match std::fs::symlink_metadata(self.config.source_root.join(rel)) {
                Ok(meta) if meta.file_type().is_file() => {
                    targets.insert(rel);
                }
                Ok(meta) => {
                    warn!(path = %rel, "baselined path is no longer a regular file");
                    not_regular.insert(rel.clone(), describe_file_type(&meta.file_type()));
                }
                Err(_) => {}
            }
        }

        let snapshot = hash_tree(&self.config.source_root, targets, &self.hash);
        let mut unreadable: BTreeMap<String, String> = snapshot
            .unreadable
            .into_iter()
            .filter(|(p, _)| {
                paths.contains(p)
                    || std::fs::symlink_metadata(self.config.source_root.join(p)).is_ok()
            })
            .collect();
        unreadable.extend(not_regular);
        let snapshot = TreeSnapshot {
            unreadable,
            digests: snapshot.digests,
        };
        let verdict = drift::check(&baseline.files, &snapshot, self.config.new_files);
        VerifyOutcome {
            baseline,
            snapshot,
            verdict,
        }
    }

    /// Source vs deployed comparison.
    pub fn cross_check(&self) -> Result<CrossTreeVerdict, MonitorError> {
        let opts = crosstree::CompareOptions {
            source_walk: self.source_walk_options(),
            deployed_walk: self.deployed_walk_options(),
            hash: self.hash,
        };
        crosstree::compare(&self.config.source_root, &self.config.deployed_root, &opts)
    }

    fn cross_check_paths(
        &self,
        source_paths: &BTreeSet<String>,
    ) -> Result<CrossTreeVerdict, MonitorError> {
        let deployed_paths = walk(&self.config.deployed_root, &self.deployed_walk_options())?;
        Ok(crosstree::compare_paths(
            &self.config.source_root,
            source_paths,
            &self.config.deployed_root,
            &deployed_paths,
            &self.hash,
        ))
    }

    /// One full pass. Setup errors abort before any verdict; findings are
    /// returned in the report and trigger `sink` exactly once.
    pub fn run(&self, sink: &dyn AlertSink) -> Result<MonitorReport, MonitorError> {
        let start = Instant::now();
        let run_id = eventlog::generate_run_id();
        info!(run_id = %run_id, "monitor run starting");

        ensure_root(&self.config.source_root)?;
        ensure_root(&self.config.deployed_root)?;

        self.log_event(ProvenanceEvent::RunStarted {
            run_id: run_id.clone(),
            source_root: self.config.source_root.display().to_string(),
            deployed_root: self.config.deployed_root.display().to_string(),
            provwatch_version: env!("CARGO_PKG_VERSION").to_string(),
        });

        let (baseline, bootstrapped) = self.load_or_bootstrap()?;
        if bootstrapped {
            self.log_event(ProvenanceEvent::BaselineCreated {
                run_id: run_id.clone(),
                path: self.config.baseline.display().to_string(),
                files: baseline.files.len(),
                algorithm: baseline.algorithm,
            });
        }

        let source_paths = self.walk_source()?;

        let (scan, verify, cross) = std::thread::scope(|scope| {
            let scan = scope.spawn(|| self.scan_paths(&source_paths));
            let verify = scope.spawn(|| self.verify_paths(baseline, &source_paths));
            let cross = self.cross_check_paths(&source_paths);
            let scan = scan
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            let verify = verify
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            (scan, verify, cross)
        });
        let cross = cross?;

        let reasons = BreachReasons {
            malicious: scan.is_suspicious(),
            drift: verify.verdict.alert,
            mismatch: !cross.is_clean(),
        };

        let mut report = MonitorReport {
            run_id: run_id.clone(),
            bootstrapped,
            scan,
            integrity: verify.verdict,
            cross_tree: cross,
            reasons,
            alerted: false,
        };

        if reasons.any() {
            let breach = Breach {
                run_id: run_id.clone(),
                reasons,
                findings: count_findings(&report, self.config.new_files),
            };
            warn!(run_id = %run_id, reasons = %reasons, findings = breach.findings, "breach detected");
            if let Err(e) = sink.on_breach(&breach) {
                warn!(error = %e, "alert sink reported failure");
            }
            report.alerted = true;
        } else {
            self.log_event(ProvenanceEvent::RunPassed {
                run_id: run_id.clone(),
                files_checked: source_paths.len(),
            });
        }

        info!(
            run_id = %run_id,
            passed = report.passed(),
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "monitor run finished"
        );
        Ok(report)
    }

    fn log_event(&self, event: ProvenanceEvent) {
        if let Some(path) = &self.config.event_log {
            if let Err(e) = eventlog::append_event(path, event) {
                warn!(error = %e, "cannot append to event log");
            }
        }
    }
}

/// Number of individual findings carried by a report.
pub fn count_findings(report: &MonitorReport, policy: NewFilePolicy) -> usize {
    let added = match policy {
        NewFilePolicy::Alert => report.integrity.added.len(),
        NewFilePolicy::Ignore => 0,
    };
    report.scan.hits.len()
        + report.integrity.modified.len()
        + report.integrity.missing.len()
        + added
        + report.cross_tree.only_in_source.len()
        + report.cross_tree.only_in_deployed.len()
        + report.cross_tree.content_mismatch.len()
}

/// Detail recorded for a baselined path that is no longer a regular file.
fn describe_file_type(ft: &std::fs::FileType) -> String {
    let kind = if ft.is_symlink() {
        "a symlink"
    } else if ft.is_dir() {
        "a directory"
    } else {
        "a special file"
    };
    format!("not a regular file (now {})", kind)
}

/// `candidate` relative to `root`, if it lies inside it. Works for paths that
/// do not exist yet by resolving the nearest existing ancestor.
fn relative_under(root: &Path, candidate: &Path) -> Option<PathBuf> {
    let root = root.canonicalize().ok()?;
    let candidate = resolve_lenient(candidate)?;
    let rel = candidate.strip_prefix(&root).ok()?;
    if rel.as_os_str().is_empty() {
        None
    } else {
        Some(rel.to_path_buf())
    }
}

fn resolve_lenient(path: &Path) -> Option<PathBuf> {
    if let Ok(p) = path.canonicalize() {
        return Some(p);
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    let mut tail = Vec::new();
    let mut cur = absolute.as_path();
    loop {
        if let Ok(base) = cur.canonicalize() {
            let mut out = base;
            for part in tail.iter().rev() {
                out.push(part);
            }
            return Some(out);
        }
        tail.push(cur.file_name()?.to_os_string());
        cur = cur.parent()?;
    }
}
