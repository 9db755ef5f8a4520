use crate::config::{ConfigError, DetectionConfig};
use crate::features;
use crate::forest::{AnomalyResult, AnomalyScorer};
use crate::fusion::{fuse, Alert};
use crate::rules::{RuleAlert, RuleEngine};
use crate::types::AuthEvent;
use crate::window::{WindowEvictionCounters, WindowSnapshot, WindowStore};

/// One full evaluation over the current windows: rule candidates,
/// anomaly verdicts (when the batch supported them), and the fused
/// alert set.
#[derive(Debug, Clone)]
pub struct DetectionBatch {
    pub alerts: Vec<Alert>,
    pub rule_alerts: Vec<RuleAlert>,
    pub anomaly_results: Vec<AnomalyResult>,
    /// False when the batch had too few sources for outlier scoring
    /// and detection degraded to rules only.
    pub anomaly_signal_available: bool,
    pub sources_evaluated: usize,
}

/// Pipeline facade: owns the window store, the rule engine, and the
/// anomaly scorer. Ingestion mutates window state only; `detect` is
/// read-only over snapshots, so an abandoned pass corrupts nothing.
pub struct DetectionEngine {
    windows: WindowStore,
    rules: RuleEngine,
    scorer: AnomalyScorer,
}

impl DetectionEngine {
    pub fn from_config(config: &DetectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            windows: WindowStore::new(config.window_secs, config.max_tracked_sources),
            rules: RuleEngine::new(config.threshold_rules()),
            scorer: AnomalyScorer::new(config.scorer_config()),
        })
    }

    pub fn ingest_event(&mut self, event: &AuthEvent) {
        self.windows.ingest(event);
    }

    pub fn snapshot(&self, source_id: &str) -> Option<WindowSnapshot> {
        self.windows.snapshot(source_id)
    }

    pub fn source_count(&self) -> usize {
        self.windows.source_count()
    }

    pub fn eviction_counters(&self) -> WindowEvictionCounters {
        self.windows.eviction_counters()
    }

    /// Evaluate rules and the anomaly model over the current windows
    /// and fuse the results. A batch too small for anomaly scoring is
    /// not an error: rule-based alerts still flow, with the anomaly
    /// signal marked unavailable.
    pub fn detect(&self) -> DetectionBatch {
        let snapshots = self.windows.snapshots();

        let mut rule_alerts = Vec::new();
        for snapshot in &snapshots {
            rule_alerts.extend(self.rules.evaluate(snapshot));
        }

        let feature_table: Vec<_> = snapshots.iter().map(features::extract).collect();
        let (anomaly_results, anomaly_signal_available) =
            match self.scorer.score_batch(&feature_table) {
                Ok(results) => (results, true),
                Err(_insufficient) => (Vec::new(), false),
            };

        let anomaly_input = anomaly_signal_available.then_some(anomaly_results.as_slice());
        let alerts = fuse(&rule_alerts, anomaly_input, &snapshots);

        DetectionBatch {
            alerts,
            rule_alerts,
            anomaly_results,
            anomaly_signal_available,
            sources_evaluated: snapshots.len(),
        }
    }
}
