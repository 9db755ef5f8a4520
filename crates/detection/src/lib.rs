pub mod config;
mod engine;
pub mod export;
mod features;
mod forest;
mod fusion;
mod normalize;
mod policy;
mod replay;
mod rules;
mod types;
mod window;

pub use config::{ConfigError, DetectionConfig, RuleSpec};
pub use engine::{DetectionBatch, DetectionEngine};
pub use features::{extract, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use forest::{AnomalyResult, AnomalyScorer, InsufficientDataError, ScorerConfig};
pub use fusion::{fuse, Alert, WILDCARD_ACCOUNT};
pub use normalize::{normalize, MalformedRecordError, RawRecord};
pub use policy::severity_policy;
pub use replay::{replay_records, ReplaySummary};
pub use rules::{default_rules, RuleAlert, RuleEngine, RuleScope, ThresholdRule};
pub use types::{AuthEvent, DetectionSignals, EventOutcome, Severity};
pub use window::{WindowEvictionCounters, WindowSnapshot, WindowStore};
