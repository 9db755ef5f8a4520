use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use detection::{DetectionConfig, RuleSpec};
use serde::Deserialize;

/// Runtime configuration: the detection core's tunables plus the I/O
/// endpoints of the batch run. Loaded from a TOML file, then
/// overridden by `AUTHWATCH_*` environment variables, then validated.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfig {
    pub detection: DetectionConfig,
    /// JSON-lines raw records. `None` reads stdin.
    pub input_path: Option<PathBuf>,
    /// JSON-lines alert rows. `None` writes stdout.
    pub output_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    detection: Option<FileDetectionConfig>,
    io: Option<FileIoConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FileDetectionConfig {
    window_secs: Option<i64>,
    max_tracked_sources: Option<usize>,
    contamination: Option<f64>,
    min_scoring_sources: Option<usize>,
    forest_trees: Option<usize>,
    forest_sample_size: Option<usize>,
    forest_seed: Option<u64>,
    rules: Option<Vec<FileRule>>,
}

#[derive(Debug, Deserialize)]
struct FileRule {
    name: String,
    threshold: u32,
    scope: String,
}

#[derive(Debug, Default, Deserialize)]
struct FileIoConfig {
    input: Option<String>,
    output: Option<String>,
}

impl AnalyzerConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(path) = path {
            cfg.apply_file_config(path)?;
        }
        cfg.apply_env_overrides();
        cfg.detection
            .validate()
            .context("invalid detection configuration")?;
        Ok(cfg)
    }

    fn apply_file_config(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading config file {}", path.display()))?;
        let file_cfg: FileConfig = toml::from_str(&raw)
            .with_context(|| format!("failed parsing TOML config {}", path.display()))?;

        self.apply_file_detection(file_cfg.detection);
        self.apply_file_io(file_cfg.io);
        Ok(())
    }

    fn apply_file_detection(&mut self, section: Option<FileDetectionConfig>) {
        let Some(section) = section else {
            return;
        };

        if let Some(v) = section.window_secs {
            self.detection.window_secs = v;
        }
        if let Some(v) = section.max_tracked_sources {
            self.detection.max_tracked_sources = v;
        }
        if let Some(v) = section.contamination {
            self.detection.contamination = v;
        }
        if let Some(v) = section.min_scoring_sources {
            self.detection.min_scoring_sources = v;
        }
        if let Some(v) = section.forest_trees {
            self.detection.forest_trees = v;
        }
        if let Some(v) = section.forest_sample_size {
            self.detection.forest_sample_size = v;
        }
        if let Some(v) = section.forest_seed {
            self.detection.forest_seed = v;
        }
        if let Some(rules) = section.rules {
            self.detection.rules = rules
                .into_iter()
                .map(|r| RuleSpec {
                    name: r.name,
                    threshold: r.threshold,
                    scope: r.scope,
                })
                .collect();
        }
    }

    fn apply_file_io(&mut self, section: Option<FileIoConfig>) {
        let Some(section) = section else {
            return;
        };
        if let Some(v) = non_empty(section.input) {
            self.input_path = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(section.output) {
            self.output_path = Some(PathBuf::from(v));
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<i64>("AUTHWATCH_WINDOW_SECS") {
            self.detection.window_secs = v;
        }
        if let Some(v) = env_parse::<f64>("AUTHWATCH_CONTAMINATION") {
            self.detection.contamination = v;
        }
        if let Some(v) = env_parse::<usize>("AUTHWATCH_MIN_SCORING_SOURCES") {
            self.detection.min_scoring_sources = v;
        }
        if let Some(v) = env_parse::<u64>("AUTHWATCH_FOREST_SEED") {
            self.detection.forest_seed = v;
        }
        if let Some(v) = env_non_empty("AUTHWATCH_INPUT") {
            self.input_path = Some(PathBuf::from(v));
        }
        if let Some(v) = env_non_empty("AUTHWATCH_OUTPUT") {
            self.output_path = Some(PathBuf::from(v));
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_non_empty(key: &str) -> Option<String> {
    non_empty(std::env::var(key).ok())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_non_empty(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_overrides_defaults() {
        let raw = r#"
            [detection]
            window_secs = 300
            contamination = 0.1

            [[detection.rules]]
            name = "spray"
            threshold = 8
            scope = "per_source"

            [io]
            input = "events.jsonl"
        "#;
        let file_cfg: FileConfig = toml::from_str(raw).unwrap();
        let mut cfg = AnalyzerConfig::default();
        cfg.apply_file_detection(file_cfg.detection);
        cfg.apply_file_io(file_cfg.io);

        assert_eq!(cfg.detection.window_secs, 300);
        assert_eq!(cfg.detection.contamination, 0.1);
        assert_eq!(cfg.detection.rules.len(), 1);
        assert_eq!(cfg.detection.rules[0].name, "spray");
        assert_eq!(cfg.input_path.as_deref(), Some(Path::new("events.jsonl")));
        assert!(cfg.detection.validate().is_ok());
    }

    #[test]
    fn invalid_file_values_fail_validation() {
        let mut cfg = AnalyzerConfig::default();
        cfg.detection.contamination = 0.9;
        assert!(cfg.detection.validate().is_err());
    }
}
