//! PW-002: YAML parsing and validation.
//!
//! Parses provwatch.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - Source and deployed roots must differ
//! - Keywords must be non-empty tokens
//! - Exclude entries must be valid glob patterns

use super::types::*;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a provwatch.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<ProvwatchConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse a provwatch.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<ProvwatchConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &ProvwatchConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(ValidationError {
            message: format!("version must be \"1.0\", got \"{}\"", config.version),
        });
    }

    if config.name.is_empty() {
        errors.push(ValidationError {
            message: "name must not be empty".to_string(),
        });
    }

    if config.source_root == config.deployed_root {
        errors.push(ValidationError {
            message: format!(
                "source_root and deployed_root are both '{}'",
                config.source_root.display()
            ),
        });
    }

    if config.baseline.as_os_str().is_empty() {
        errors.push(ValidationError {
            message: "baseline path must not be empty".to_string(),
        });
    }

    for keyword in config.keywords.keys() {
        if keyword.trim().is_empty() {
            errors.push(ValidationError {
                message: "keywords must not contain empty entries".to_string(),
            });
        } else if keyword.trim() != keyword {
            errors.push(ValidationError {
                message: format!("keyword '{}' has surrounding whitespace", keyword),
            });
        }
    }

    for pattern in &config.exclude {
        if let Err(e) = glob::Pattern::new(pattern) {
            errors.push(ValidationError {
                message: format!("exclude pattern '{}' is invalid: {}", pattern, e),
            });
        }
    }

    if config.read_timeout_ms == Some(0) {
        errors.push(ValidationError {
            message: "read_timeout_ms must be greater than zero".to_string(),
        });
    }

    if let Some(cmd) = &config.alert_command {
        if cmd.trim().is_empty() {
            errors.push(ValidationError {
                message: "alert_command must not be empty when set".to_string(),
            });
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_pw002_parse_full() {
        let yaml = r#"
version: "1.0"
name: storefront
source_root: ./repo
deployed_root: /srv/www
baseline: state/baseline.json
algorithm: sha256
keywords:
  eval: true
  exec: false
  os.system: true
exclude:
  - "*.log"
  - "node_modules/**"
new_files: alert
workers: 4
read_timeout_ms: 5000
event_log: state/events.jsonl
alert_command: "logger -t provwatch breach"
"#;
        let cfg = parse_config(yaml).unwrap();
        assert_eq!(cfg.name, "storefront");
        assert_eq!(cfg.deployed_root, PathBuf::from("/srv/www"));
        assert_eq!(cfg.algorithm, HashAlgorithm::Sha256);
        assert_eq!(cfg.keywords.get("exec"), Some(&false));
        assert_eq!(cfg.new_files, NewFilePolicy::Alert);
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.read_timeout_ms, Some(5000));
        assert!(validate_config(&cfg).is_empty());
    }

    #[test]
    fn test_pw002_parse_error() {
        let result = parse_config("version: [unclosed");
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("YAML parse error"));
    }

    #[test]
    fn test_pw002_unknown_algorithm_rejected() {
        let yaml = r#"
version: "1.0"
name: x
algorithm: md5
"#;
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn test_pw002_validate_bad_version_and_name() {
        let mut cfg = ProvwatchConfig::default();
        cfg.version = "2.0".to_string();
        cfg.name = String::new();
        let errors = validate_config(&cfg);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("version"));
    }

    #[test]
    fn test_pw002_validate_same_roots() {
        let mut cfg = ProvwatchConfig::default();
        cfg.deployed_root = cfg.source_root.clone();
        let errors = validate_config(&cfg);
        assert!(errors.iter().any(|e| e.message.contains("source_root")));
    }

    #[test]
    fn test_pw002_validate_bad_glob_and_keyword() {
        let mut cfg = ProvwatchConfig::default();
        cfg.exclude.push("[unterminated".to_string());
        cfg.keywords.insert(" eval".to_string(), true);
        cfg.keywords.insert(String::new(), true);
        let errors = validate_config(&cfg);
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_pw002_validate_zero_timeout() {
        let mut cfg = ProvwatchConfig::default();
        cfg.read_timeout_ms = Some(0);
        let errors = validate_config(&cfg);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_pw002_parse_config_file_missing() {
        let result = parse_config_file(Path::new("/nonexistent/provwatch.yaml"));
        assert!(result.unwrap_err().contains("failed to read"));
    }
}
