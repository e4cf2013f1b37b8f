//! PW-021: CLI subcommands. Init, validate, baseline, check, scan, compare, run, status.
//!
//! Exit contract (applied in `main`): `Ok(Outcome::Clean)` → 0, setup error → 1,
//! `Ok(Outcome::Findings)` → 2.

use crate::alert::command::CommandAlert;
use crate::alert::{ConsoleAlert, EventLogAlert, FanOut};
use crate::core::error::MonitorError;
use crate::core::monitor::Monitor;
use crate::core::types::{HashAlgorithm, MonitorReport, NewFilePolicy, ProvwatchConfig, ScanReport};
use crate::core::{baseline, parser};
use crate::tripwire::drift;
use crate::tripwire::scanner::{scan_file, KeywordSet};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = "provwatch.yaml";

/// Result of a command that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Clean,
    Findings,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::Findings => 2,
        }
    }

    fn from_clean(clean: bool) -> Self {
        if clean {
            Self::Clean
        } else {
            Self::Findings
        }
    }
}

/// Config file location plus per-invocation overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to provwatch.yaml (default: ./provwatch.yaml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override source root
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Override deployed root
    #[arg(long)]
    pub deployed: Option<PathBuf>,

    /// Override baseline location
    #[arg(long)]
    pub baseline: Option<PathBuf>,

    /// Override digest algorithm (blake3, sha256)
    #[arg(long)]
    pub algorithm: Option<HashAlgorithm>,

    /// Override worker count (0 = auto)
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter provwatch.yaml
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate provwatch.yaml
    Validate {
        /// Path to provwatch.yaml
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        file: PathBuf,
    },

    /// Create or replace the baseline from the current source tree
    Baseline {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Verify the source tree against the baseline
    Check {
        #[command(flatten)]
        config: ConfigArgs,

        /// Treat files missing from the baseline as drift
        #[arg(long)]
        strict: bool,
    },

    /// Scan a file or tree for suspicious keywords
    Scan {
        /// File or directory (default: configured source root)
        path: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Compare the source tree with the deployed tree
    Compare {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Full pass: bootstrap, scan, verify, cross-check, alert
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Skip the console breach banner
        #[arg(long)]
        quiet_alert: bool,
    },

    /// Show the stored baseline
    Status {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print the JSON schema of provwatch.yaml
    Schema,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<Outcome, MonitorError> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Baseline { config } => cmd_baseline(&config),
        Commands::Check { config, strict } => cmd_check(&config, strict),
        Commands::Scan { path, config } => cmd_scan(path.as_deref(), &config),
        Commands::Compare { config } => cmd_compare(&config),
        Commands::Run {
            config,
            quiet_alert,
        } => cmd_run(&config, quiet_alert),
        Commands::Status { config } => cmd_status(&config),
        Commands::Schema => cmd_schema(),
    }
}

/// Load the config file (if any) and apply overrides.
pub fn resolve_config(args: &ConfigArgs) -> Result<ProvwatchConfig, MonitorError> {
    let mut config = match &args.config {
        Some(path) => parser::parse_config_file(path).map_err(MonitorError::Config)?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            parser::parse_config_file(Path::new(DEFAULT_CONFIG)).map_err(MonitorError::Config)?
        }
        None => ProvwatchConfig::default(),
    };
    if let Some(s) = &args.source {
        config.source_root.clone_from(s);
    }
    if let Some(d) = &args.deployed {
        config.deployed_root.clone_from(d);
    }
    if let Some(b) = &args.baseline {
        config.baseline.clone_from(b);
    }
    if let Some(a) = args.algorithm {
        config.algorithm = a;
    }
    if let Some(w) = args.workers {
        config.workers = w;
    }
    Ok(config)
}

fn cmd_init(path: &Path) -> Result<Outcome, MonitorError> {
    let config_path = path.join(DEFAULT_CONFIG);
    if config_path.exists() {
        return Err(MonitorError::Config(format!(
            "{} already exists",
            config_path.display()
        )));
    }

    let state_dir = path.join("state");
    std::fs::create_dir_all(&state_dir)
        .map_err(|e| MonitorError::io("cannot create state dir", e))?;

    let template = r#"version: "1.0"
name: my-site
source_root: .
deployed_root: deployed_code
baseline: state/integrity_baseline.json
algorithm: blake3

keywords:
  eval: true
  exec: true
  subprocess: true
  os.system: true
  dangerouslySetInnerHTML: true

exclude:
  - ".git/**"
  - "state/**"

new_files: ignore
workers: 0
event_log: state/events.jsonl
"#;
    std::fs::write(&config_path, template)
        .map_err(|e| MonitorError::io(format!("cannot write {}", config_path.display()), e))?;

    println!("Initialized provwatch at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Created: {}/", state_dir.display());
    Ok(Outcome::Clean)
}

fn cmd_validate(file: &Path) -> Result<Outcome, MonitorError> {
    let config = parser::parse_config_file(file).map_err(MonitorError::Config)?;
    let errors = parser::validate_config(&config);

    if errors.is_empty() {
        println!(
            "OK: {} ({} keywords, {} excludes, {})",
            config.name,
            config.keywords.values().filter(|e| **e).count(),
            config.exclude.len(),
            config.algorithm
        );
        Ok(Outcome::Clean)
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(MonitorError::Config(format!(
            "{} validation error(s)",
            errors.len()
        )))
    }
}

fn cmd_baseline(args: &ConfigArgs) -> Result<Outcome, MonitorError> {
    let monitor = Monitor::new(resolve_config(args)?)?;
    let b = monitor.create_baseline()?;
    println!(
        "Baseline created and saved to {} ({} files, {})",
        monitor.config().baseline.display(),
        b.files.len(),
        b.algorithm
    );
    Ok(Outcome::Clean)
}

fn cmd_check(args: &ConfigArgs, strict: bool) -> Result<Outcome, MonitorError> {
    let mut config = resolve_config(args)?;
    if strict {
        config.new_files = NewFilePolicy::Alert;
    }
    let monitor = Monitor::new(config)?;
    let outcome = monitor.verify()?;
    let verdict = &outcome.verdict;

    println!(
        "Checking {} ({} baselined files)...",
        monitor.config().source_root.display(),
        outcome.baseline.files.len()
    );
    for f in drift::findings(&outcome.baseline.files, &outcome.snapshot, verdict) {
        println!("  ALERT: {}", f.detail);
        println!("    Expected: {}", f.expected_hash);
        println!("    Actual:   {}", f.actual_hash);
    }
    print_added(&verdict.added, monitor.config().new_files);

    if verdict.alert {
        println!();
        println!(
            "Integrity check failed: {} modified, {} missing, {} unchanged.",
            verdict.modified.len(),
            verdict.missing.len(),
            verdict.unchanged.len()
        );
    } else {
        println!("Integrity check passed ({} unchanged).", verdict.unchanged.len());
    }
    Ok(Outcome::from_clean(!verdict.alert))
}

fn cmd_scan(path: Option<&Path>, args: &ConfigArgs) -> Result<Outcome, MonitorError> {
    let config = resolve_config(args)?;
    let target = path.map(Path::to_path_buf);

    let report = match target {
        Some(file) if file.is_file() => {
            let keywords = KeywordSet::from_config(&config.keywords)?;
            let timeout = config.read_timeout_ms.map(std::time::Duration::from_millis);
            let display = file.display().to_string();
            ScanReport {
                files_scanned: 1,
                hits: scan_file(&file, &display, &keywords, timeout),
            }
        }
        Some(dir) if dir.is_dir() => {
            let mut config = config;
            config.source_root = dir;
            Monitor::new(config)?.scan()?
        }
        Some(missing) => {
            return Err(MonitorError::RootInaccessible {
                path: missing,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }
        None => Monitor::new(config)?.scan()?,
    };

    print_scan(&report);
    Ok(Outcome::from_clean(!report.is_suspicious()))
}

fn cmd_compare(args: &ConfigArgs) -> Result<Outcome, MonitorError> {
    let monitor = Monitor::new(resolve_config(args)?)?;
    let verdict = monitor.cross_check()?;

    for p in &verdict.only_in_source {
        println!("  ONLY IN SOURCE:   {}", p);
    }
    for p in &verdict.only_in_deployed {
        println!("  ONLY IN DEPLOYED: {}", p);
    }
    for p in &verdict.content_mismatch {
        println!("  CONTENT MISMATCH: {}", p);
    }
    if verdict.is_clean() {
        println!("Source and deployed trees match.");
    } else {
        println!();
        println!(
            "Tree mismatch: {} only in source, {} only in deployed, {} content mismatch(es)",
            verdict.only_in_source.len(),
            verdict.only_in_deployed.len(),
            verdict.content_mismatch.len()
        );
    }
    Ok(Outcome::from_clean(verdict.is_clean()))
}

/// Build the alert fan-out from configuration.
pub fn build_sink(config: &ProvwatchConfig, console: bool) -> FanOut {
    let mut sink = FanOut::new();
    if console {
        sink.push(Box::new(ConsoleAlert));
    }
    if let Some(path) = &config.event_log {
        sink.push(Box::new(EventLogAlert { path: path.clone() }));
    }
    if let Some(cmd) = &config.alert_command {
        sink.push(Box::new(CommandAlert::new(cmd.clone())));
    }
    sink
}

fn cmd_run(args: &ConfigArgs, quiet_alert: bool) -> Result<Outcome, MonitorError> {
    let monitor = Monitor::new(resolve_config(args)?)?;
    let sink = build_sink(monitor.config(), !quiet_alert);
    let report = monitor.run(&sink)?;
    print_report(&report, monitor.config());
    Ok(Outcome::from_clean(report.passed()))
}

fn cmd_status(args: &ConfigArgs) -> Result<Outcome, MonitorError> {
    let config = resolve_config(args)?;
    match baseline::load_baseline(&config.baseline) {
        Ok(b) => {
            println!("Baseline: {}", config.baseline.display());
            println!("  Generated: {}", b.generated_at);
            println!("  Generator: {}", b.generator);
            println!("  Algorithm: {}", b.algorithm);
            println!("  Files:     {}", b.files.len());
            if b.algorithm != config.algorithm {
                println!(
                    "  WARNING: configured algorithm is {}; run `provwatch baseline` to regenerate.",
                    config.algorithm
                );
            }
            Ok(Outcome::Clean)
        }
        Err(MonitorError::BaselineNotFound(_)) => {
            println!("No baseline found. Run `provwatch baseline` or `provwatch run` first.");
            Ok(Outcome::Clean)
        }
        Err(e) => Err(e),
    }
}

fn cmd_schema() -> Result<Outcome, MonitorError> {
    let schema = schemars::schema_for!(ProvwatchConfig);
    let json = serde_json::to_string_pretty(&schema)
        .map_err(|e| MonitorError::Config(format!("schema serialize error: {}", e)))?;
    println!("{}", json);
    Ok(Outcome::Clean)
}

fn print_added(added: &std::collections::BTreeSet<String>, policy: NewFilePolicy) {
    if added.is_empty() {
        return;
    }
    let label = match policy {
        NewFilePolicy::Alert => "ALERT: new file",
        NewFilePolicy::Ignore => "note: not in baseline",
    };
    for p in added {
        println!("  {}: {}", label, p);
    }
}

fn print_scan(report: &ScanReport) {
    for hit in &report.hits {
        println!("  WARNING: {} in {}", hit.reason, hit.path);
    }
    if report.is_suspicious() {
        println!(
            "Suspicious content in {} of {} file(s).",
            report.suspicious_files().len(),
            report.files_scanned
        );
    } else {
        println!(
            "No suspicious keywords found ({} file(s) scanned).",
            report.files_scanned
        );
    }
}

/// Display a full run report to stdout.
fn print_report(report: &MonitorReport, config: &ProvwatchConfig) {
    if report.bootstrapped {
        println!(
            "Baseline created and saved to {} (first run).",
            config.baseline.display()
        );
    }

    if report.passed() {
        println!(
            "All security checks passed ({} files scanned, {} unchanged).",
            report.scan.files_scanned,
            report.integrity.unchanged.len()
        );
        return;
    }

    println!("Malicious code scan:");
    print_scan(&report.scan);

    println!("Integrity check:");
    for p in &report.integrity.modified {
        println!("  ALERT: File has been modified: {}", p);
    }
    for p in &report.integrity.missing {
        match report.integrity.unreadable.get(p) {
            Some(e) => println!("  ALERT: File cannot be read: {} ({})", p, e),
            None => println!("  ALERT: File is missing: {}", p),
        }
    }
    print_added(&report.integrity.added, config.new_files);
    if !report.reasons.drift {
        println!("  Integrity check passed.");
    }

    println!("Source vs deployed:");
    for p in &report.cross_tree.only_in_source {
        println!("  ALERT: only in source: {}", p);
    }
    for p in &report.cross_tree.only_in_deployed {
        println!("  ALERT: only in deployed: {}", p);
    }
    for p in &report.cross_tree.content_mismatch {
        println!("  ALERT: content mismatch: {}", p);
    }
    if !report.reasons.mismatch {
        println!("  Source and deployed trees match.");
    }

    println!();
    println!(
        "Security checks FAILED ({}), run {}.",
        report.reasons, report.run_id
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tree(root: &Path, files: &[(&str, &str)]) {
        std::fs::create_dir_all(root).unwrap();
        for (name, content) in files {
            std::fs::write(root.join(name), content).unwrap();
        }
    }

    fn args_for(dir: &Path) -> ConfigArgs {
        ConfigArgs {
            config: None,
            source: Some(dir.join("source")),
            deployed: Some(dir.join("deployed")),
            baseline: Some(dir.join("state/baseline.json")),
            algorithm: None,
            workers: Some(2),
        }
    }

    #[test]
    fn test_pw021_init() {
        let dir = tempfile::tempdir().unwrap();
        cmd_init(dir.path()).unwrap();
        assert!(dir.path().join("provwatch.yaml").exists());
        assert!(dir.path().join("state").is_dir());
        // The template itself must validate.
        assert_eq!(
            cmd_validate(&dir.path().join("provwatch.yaml")).unwrap(),
            Outcome::Clean
        );
    }

    #[test]
    fn test_pw021_init_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("provwatch.yaml"), "exists").unwrap();
        assert!(cmd_init(dir.path()).is_err());
    }

    #[test]
    fn test_pw021_validate_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("provwatch.yaml");
        std::fs::write(&config, "version: \"2.0\"\nname: \"\"\n").unwrap();
        assert!(matches!(cmd_validate(&config), Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_pw021_resolve_config_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("pw.yaml");
        std::fs::write(
            &file,
            "version: \"1.0\"\nname: t\nsource_root: /a\ndeployed_root: /b\nalgorithm: sha256\n",
        )
        .unwrap();
        let args = ConfigArgs {
            config: Some(file),
            source: Some(PathBuf::from("/override")),
            algorithm: Some(HashAlgorithm::Blake3),
            ..Default::default()
        };
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.source_root, PathBuf::from("/override"));
        assert_eq!(cfg.deployed_root, PathBuf::from("/b"));
        assert_eq!(cfg.algorithm, HashAlgorithm::Blake3);
    }

    #[test]
    fn test_pw021_resolve_config_missing_file() {
        let args = ConfigArgs {
            config: Some(PathBuf::from("/nonexistent/pw.yaml")),
            ..Default::default()
        };
        assert!(matches!(resolve_config(&args), Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_pw021_end_to_end_modified_exit_2() {
        let dir = tempfile::tempdir().unwrap();
        let files = [("a.txt", "hello"), ("b.txt", "world")];
        write_tree(&dir.path().join("source"), &files);
        write_tree(&dir.path().join("deployed"), &files);
        let args = args_for(dir.path());

        assert_eq!(cmd_baseline(&args).unwrap(), Outcome::Clean);
        assert_eq!(cmd_check(&args, false).unwrap(), Outcome::Clean);

        std::fs::write(dir.path().join("source/b.txt"), "world!").unwrap();
        let outcome = cmd_check(&args, false).unwrap();
        assert_eq!(outcome, Outcome::Findings);
        assert_eq!(outcome.exit_code(), 2);

        let outcome = cmd_run(&args, true).unwrap();
        assert_eq!(outcome.exit_code(), 2);
    }

    #[test]
    fn test_pw021_check_strict_flags_new_files() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(&dir.path().join("source"), &[("a.txt", "hello")]);
        write_tree(&dir.path().join("deployed"), &[("a.txt", "hello")]);
        let args = args_for(dir.path());
        cmd_baseline(&args).unwrap();
        std::fs::write(dir.path().join("source/new.txt"), "new").unwrap();

        assert_eq!(cmd_check(&args, false).unwrap(), Outcome::Clean);
        assert_eq!(cmd_check(&args, true).unwrap(), Outcome::Findings);
    }

    #[test]
    fn test_pw021_run_clean_first_time() {
        let dir = tempfile::tempdir().unwrap();
        let files = [("index.html", "<h1>ok</h1>")];
        write_tree(&dir.path().join("source"), &files);
        write_tree(&dir.path().join("deployed"), &files);
        let outcome = cmd_run(&args_for(dir.path()), true).unwrap();
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn test_pw021_run_missing_deployed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(&dir.path().join("source"), &[("a.txt", "a")]);
        let result = cmd_run(&args_for(dir.path()), true);
        assert!(matches!(result, Err(MonitorError::RootInaccessible { .. })));
    }

    #[test]
    fn test_pw021_scan_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.py");
        let good = dir.path().join("good.py");
        std::fs::write(&bad, "subprocess.call(['ls'])").unwrap();
        std::fs::write(&good, "print('fine')").unwrap();
        let args = args_for(dir.path());

        assert_eq!(cmd_scan(Some(&bad), &args).unwrap(), Outcome::Findings);
        assert_eq!(cmd_scan(Some(&good), &args).unwrap(), Outcome::Clean);
        assert!(cmd_scan(Some(&dir.path().join("nope.py")), &args).is_err());
    }

    #[test]
    fn test_pw021_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        write_tree(&tree, &[("ok.js", "let a = 1;"), ("x.js", "eval(atob(s))")]);
        let args = args_for(dir.path());
        assert_eq!(cmd_scan(Some(&tree), &args).unwrap(), Outcome::Findings);
    }

    #[test]
    fn test_pw021_compare() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(&dir.path().join("source"), &[("a.txt", "a")]);
        write_tree(&dir.path().join("deployed"), &[("a.txt", "a")]);
        let args = args_for(dir.path());
        assert_eq!(cmd_compare(&args).unwrap(), Outcome::Clean);
        std::fs::write(dir.path().join("deployed/extra.txt"), "x").unwrap();
        assert_eq!(cmd_compare(&args).unwrap(), Outcome::Findings);
    }

    #[test]
    fn test_pw021_status() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(&dir.path().join("source"), &[("a.txt", "a")]);
        let args = args_for(dir.path());
        assert_eq!(cmd_status(&args).unwrap(), Outcome::Clean);
        cmd_baseline(&args).unwrap();
        assert_eq!(cmd_status(&args).unwrap(), Outcome::Clean);
    }

    #[test]
    fn test_pw021_build_sink() {
        let mut cfg = ProvwatchConfig::default();
        assert_eq!(build_sink(&cfg, true).len(), 1);
        cfg.event_log = Some(PathBuf::from("events.jsonl"));
        cfg.alert_command = Some("true".to_string());
        assert_eq!(build_sink(&cfg, false).len(), 2);
    }

    #[test]
    fn test_pw021_schema() {
        assert_eq!(cmd_schema().unwrap(), Outcome::Clean);
    }

    #[test]
    fn test_pw021_dispatch_validate() {
        let dir = tempfile::tempdir().unwrap();
        cmd_init(dir.path()).unwrap();
        let outcome = dispatch(Commands::Validate {
            file: dir.path().join("provwatch.yaml"),
        })
        .unwrap();
        assert_eq!(outcome, Outcome::Clean);
    }
}
