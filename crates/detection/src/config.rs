use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::forest::ScorerConfig;
use crate::rules::{RuleScope, ThresholdRule};

/// One named threshold rule as supplied by configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub threshold: u32,
    /// "per_source" or "per_account".
    pub scope: String,
}

impl RuleSpec {
    fn parse_scope(&self) -> Option<RuleScope> {
        match self.scope.as_str() {
            "per_source" => Some(RuleScope::PerSource),
            "per_account" => Some(RuleScope::PerAccount),
            _ => None,
        }
    }
}

/// Complete detection-core configuration. Everything here is supplied
/// by the caller; `validate` runs at startup and any violation is
/// fatal (the pipeline never runs with guessed thresholds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Trailing span, in seconds, over which failures are counted.
    pub window_secs: i64,
    pub max_tracked_sources: usize,
    pub rules: Vec<RuleSpec>,
    /// Expected outlier fraction for the anomaly scorer, in (0, 0.5].
    pub contamination: f64,
    /// Minimum distinct sources before anomaly scoring is attempted.
    pub min_scoring_sources: usize,
    pub forest_trees: usize,
    pub forest_sample_size: usize,
    pub forest_seed: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window_secs: 120,
            max_tracked_sources: 16_384,
            rules: vec![
                RuleSpec {
                    name: "failed_login_burst".to_string(),
                    threshold: 5,
                    scope: "per_source".to_string(),
                },
                RuleSpec {
                    name: "account_bruteforce".to_string(),
                    threshold: 5,
                    scope: "per_account".to_string(),
                },
            ],
            contamination: 0.05,
            min_scoring_sources: 2,
            forest_trees: 100,
            forest_sample_size: 256,
            forest_seed: 42,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_secs <= 0 {
            return Err(ConfigError::InvalidWindow(self.window_secs));
        }
        if self.max_tracked_sources == 0 {
            return Err(ConfigError::ZeroSourceCapacity);
        }
        if self.rules.is_empty() {
            return Err(ConfigError::NoRules);
        }
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.name.trim().is_empty() {
                return Err(ConfigError::UnnamedRule);
            }
            if !seen.insert(rule.name.as_str()) {
                return Err(ConfigError::DuplicateRule(rule.name.clone()));
            }
            if rule.threshold == 0 {
                return Err(ConfigError::ZeroThreshold(rule.name.clone()));
            }
            if rule.parse_scope().is_none() {
                return Err(ConfigError::UnknownScope {
                    rule: rule.name.clone(),
                    scope: rule.scope.clone(),
                });
            }
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(ConfigError::InvalidContamination(self.contamination));
        }
        if self.min_scoring_sources < 2 {
            return Err(ConfigError::MinSourcesTooSmall(self.min_scoring_sources));
        }
        if self.forest_trees == 0 || self.forest_sample_size < 2 {
            return Err(ConfigError::InvalidForestShape {
                trees: self.forest_trees,
                sample_size: self.forest_sample_size,
            });
        }
        Ok(())
    }

    /// Compiled rule list. Call after `validate`; unknown scopes are
    /// skipped here because validation already rejected them.
    pub fn threshold_rules(&self) -> Vec<ThresholdRule> {
        self.rules
            .iter()
            .filter_map(|spec| {
                spec.parse_scope().map(|scope| ThresholdRule {
                    name: spec.name.clone(),
                    threshold: spec.threshold,
                    scope,
                })
            })
            .collect()
    }

    pub fn scorer_config(&self) -> ScorerConfig {
        ScorerConfig {
            contamination: self.contamination,
            min_sources: self.min_scoring_sources,
            tree_count: self.forest_trees,
            sample_size: self.forest_sample_size,
            seed: self.forest_seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidWindow(i64),
    ZeroSourceCapacity,
    NoRules,
    UnnamedRule,
    DuplicateRule(String),
    ZeroThreshold(String),
    UnknownScope { rule: String, scope: String },
    InvalidContamination(f64),
    MinSourcesTooSmall(usize),
    InvalidForestShape { trees: usize, sample_size: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidWindow(secs) => {
                write!(f, "window_secs must be positive, got {secs}")
            }
            Self::ZeroSourceCapacity => write!(f, "max_tracked_sources must be nonzero"),
            Self::NoRules => write!(f, "at least one threshold rule is required"),
            Self::UnnamedRule => write!(f, "rule names must be non-empty"),
            Self::DuplicateRule(name) => write!(f, "duplicate rule name {name:?}"),
            Self::ZeroThreshold(name) => {
                write!(f, "rule {name:?} must have a nonzero threshold")
            }
            Self::UnknownScope { rule, scope } => {
                write!(f, "rule {rule:?} has unknown scope {scope:?}")
            }
            Self::InvalidContamination(v) => {
                write!(f, "contamination must lie in (0, 0.5], got {v}")
            }
            Self::MinSourcesTooSmall(v) => {
                write!(f, "min_scoring_sources must be at least 2, got {v}")
            }
            Self::InvalidForestShape { trees, sample_size } => {
                write!(
                    f,
                    "forest needs at least 1 tree and sample size 2, got {trees} trees / sample {sample_size}"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
