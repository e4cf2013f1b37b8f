//! PW-015: Keyword tripwire. Whole-word, case-insensitive token matching.
//!
//! This is a heuristic, not analysis. Files that cannot be read or decoded as
//! UTF-8 text are reported as hits (fail-closed).

use crate::core::error::{FileError, MonitorError};
use crate::core::types::{HitReason, KeywordHit, ScanReport};
use crate::tripwire::{hasher, pool};
use indexmap::IndexMap;
use regex::Regex;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Compiled keyword patterns.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    patterns: Vec<(String, Regex)>,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Build a whole-word matcher. Boundaries are only asserted on sides where
/// the keyword itself starts/ends with a word character.
fn keyword_regex(keyword: &str) -> Result<Regex, MonitorError> {
    let mut pattern = String::from("(?i)");
    if keyword.chars().next().is_some_and(is_word_char) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(keyword));
    if keyword.chars().last().is_some_and(is_word_char) {
        pattern.push_str(r"\b");
    }
    Regex::new(&pattern)
        .map_err(|e| MonitorError::Config(format!("keyword '{}': {}", keyword, e)))
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Result<Self, MonitorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = Vec::new();
        for k in keywords {
            let k = k.as_ref();
            if k.is_empty() || patterns.iter().any(|(existing, _)| existing == k) {
                continue;
            }
            patterns.push((k.to_string(), keyword_regex(k)?));
        }
        Ok(Self { patterns })
    }

    /// Only keywords mapped to `true` are active.
    pub fn from_config(keywords: &IndexMap<String, bool>) -> Result<Self, MonitorError> {
        Self::new(
            keywords
                .iter()
                .filter(|(_, enabled)| **enabled)
                .map(|(k, _)| k.as_str()),
        )
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Scan raw file content. Non-UTF-8 content yields a single `Undecodable` hit.
pub fn scan_content(path: &str, content: &[u8], set: &KeywordSet) -> Vec<KeywordHit> {
    let text = match std::str::from_utf8(content) {
        Ok(t) => t,
        Err(_) => {
            return vec![KeywordHit {
                path: path.to_string(),
                reason: HitReason::Undecodable,
            }];
        }
    };

    set.patterns
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(k, _)| KeywordHit {
            path: path.to_string(),
            reason: HitReason::Keyword(k.clone()),
        })
        .collect()
}

/// Read and scan one file. Read failures yield a single `Unreadable` hit.
pub fn scan_file(
    file: &Path,
    display: &str,
    set: &KeywordSet,
    timeout: Option<Duration>,
) -> Vec<KeywordHit> {
    let read = hasher::with_timeout(file, timeout, |p| {
        std::fs::read(&p).map_err(|source| FileError::Read { path: p, source })
    });
    match read {
        Ok(bytes) => scan_content(display, &bytes, set),
        Err(e) => vec![KeywordHit {
            path: display.to_string(),
            reason: HitReason::Unreadable(e.to_string()),
        }],
    }
}

/// Scan every relative path under `root` on the worker pool.
pub fn scan_tree<'a, I>(
    root: &Path,
    paths: I,
    set: &KeywordSet,
    workers: usize,
    timeout: Option<Duration>,
) -> ScanReport
where
    I: IntoIterator<Item = &'a String>,
{
    let paths: Vec<&String> = paths.into_iter().collect();
    debug!(root = %root.display(), files = paths.len(), keywords = set.len(), "keyword scan");
    let per_file = pool::map_bounded(&paths, workers, |rel| {
        scan_file(&root.join(rel.as_str()), rel, set, timeout)
    });

    ScanReport {
        files_scanned: paths.len(),
        hits: per_file.into_iter().flatten().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_set() -> KeywordSet {
        KeywordSet::new(crate::core::types::DEFAULT_KEYWORDS).unwrap()
    }

    fn keywords_hit(hits: &[KeywordHit]) -> Vec<String> {
        hits.iter()
            .filter_map(|h| match &h.reason {
                HitReason::Keyword(k) => Some(k.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_pw015_os_system_hit() {
        let hits = scan_content("x.py", br#"os.system("rm -rf /")"#, &default_set());
        assert_eq!(keywords_hit(&hits), vec!["os.system"]);
    }

    #[test]
    fn test_pw015_no_substring_match() {
        let set = default_set();
        assert!(scan_content("x.py", b"osx.system('ls')", &set).is_empty());
        assert!(scan_content("x.py", b"result = evaluate(expr)", &set).is_empty());
        assert!(scan_content("x.py", b"my_eval_helper()", &set).is_empty());
        assert!(scan_content("x.py", b"executor.run()", &set).is_empty());
    }

    #[test]
    fn test_pw015_case_insensitive() {
        let hits = scan_content("x.js", b"window.EVAL(code)", &default_set());
        assert_eq!(keywords_hit(&hits), vec!["eval"]);
    }

    #[test]
    fn test_pw015_multiple_keywords_one_file() {
        let content = b"import subprocess\nexec(payload)\n<div dangerouslySetInnerHTML={x} />";
        let mut found = keywords_hit(&scan_content("m.py", content, &default_set()));
        found.sort();
        assert_eq!(found, vec!["dangerouslySetInnerHTML", "exec", "subprocess"]);
    }

    #[test]
    fn test_pw015_undecodable_fails_closed() {
        let hits = scan_content("blob.bin", &[0xff, 0xfe, 0x00, 0x81], &default_set());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].reason, HitReason::Undecodable);
    }

    #[test]
    fn test_pw015_unreadable_fails_closed() {
        let hits = scan_file(
            Path::new("/nonexistent/file.py"),
            "file.py",
            &default_set(),
            None,
        );
        assert_eq!(hits.len(), 1);
        assert!(matches!(hits[0].reason, HitReason::Unreadable(_)));
    }

    #[test]
    fn test_pw015_disabled_keywords_skipped() {
        let mut cfg = IndexMap::new();
        cfg.insert("eval".to_string(), false);
        cfg.insert("exec".to_string(), true);
        let set = KeywordSet::from_config(&cfg).unwrap();
        assert_eq!(set.keywords().collect::<Vec<_>>(), vec!["exec"]);
        assert!(scan_content("x.py", b"eval(x)", &set).is_empty());
    }

    #[test]
    fn test_pw015_non_word_edges() {
        let set = KeywordSet::new(["<script"]).unwrap();
        assert_eq!(scan_content("i.html", b"<SCRIPT src=x>", &set).len(), 1);
    }

    #[test]
    fn test_pw015_scan_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clean.py"), "print('hi')").unwrap();
        std::fs::write(dir.path().join("bad.py"), "eval(input())").unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0xC3u8, 0x28]).unwrap();
        let paths: Vec<String> = vec!["bad.py".into(), "blob.bin".into(), "clean.py".into()];

        let report = scan_tree(dir.path(), &paths, &default_set(), 2, None);
        assert_eq!(report.files_scanned, 3);
        assert!(report.is_suspicious());
        let flagged = report.suspicious_files();
        assert!(flagged.contains("bad.py"));
        assert!(flagged.contains("blob.bin"));
        assert!(!flagged.contains("clean.py"));
    }
}
