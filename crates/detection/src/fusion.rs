use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::forest::AnomalyResult;
use crate::policy::severity_policy;
use crate::rules::RuleAlert;
use crate::types::{DetectionSignals, Severity};
use crate::window::WindowSnapshot;

/// Account marker for alerts that concern a source as a whole rather
/// than one specific account.
pub const WILDCARD_ACCOUNT: &str = "*";

/// Final fused alert: one per (source, account) key, regardless of how
/// many rule firings or anomaly verdicts contributed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub source_id: String,
    pub target_account: String,
    pub signals: DetectionSignals,
    pub severity: Severity,
    /// Names of the rules that fired for this key, sorted, deduplicated.
    pub rule_names: Vec<String>,
    pub anomaly_score: Option<f64>,
    /// Highest failure count among contributing rule firings.
    pub triggering_count: Option<u32>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct AlertDraft {
    signals: DetectionSignals,
    rule_names: Vec<String>,
    anomaly_score: Option<f64>,
    triggering_count: Option<u32>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

/// Merge rule candidates and anomaly verdicts into the deduplicated
/// alert set.
///
/// `anomaly` is `None` when the scoring pass reported insufficient
/// data; fusion then degrades to rule-signal-only output. The merge is
/// idempotent: identical inputs produce an identical alert sequence,
/// ordered by severity descending, then source id, then account.
pub fn fuse(
    rule_alerts: &[RuleAlert],
    anomaly: Option<&[AnomalyResult]>,
    snapshots: &[WindowSnapshot],
) -> Vec<Alert> {
    let spans: HashMap<&str, (DateTime<Utc>, DateTime<Utc>)> = snapshots
        .iter()
        .map(|s| (s.source_id.as_str(), (s.first_seen, s.last_seen)))
        .collect();
    let accounts_by_source: HashMap<&str, &[String]> = snapshots
        .iter()
        .map(|s| (s.source_id.as_str(), s.accounts.as_slice()))
        .collect();

    // BTreeMap keys give deterministic grouping and iteration.
    let mut drafts: BTreeMap<(String, String), AlertDraft> = BTreeMap::new();

    for candidate in rule_alerts {
        let accounts: Vec<&str> = match &candidate.target_account {
            Some(account) => vec![account.as_str()],
            // Wildcard firing matches every account observed for the
            // source in the window.
            None => {
                let observed = accounts_by_source
                    .get(candidate.source_id.as_str())
                    .copied()
                    .unwrap_or(&[]);
                if observed.is_empty() {
                    vec![WILDCARD_ACCOUNT]
                } else {
                    observed.iter().map(String::as_str).collect()
                }
            }
        };

        for account in accounts {
            let draft = drafts
                .entry((candidate.source_id.clone(), account.to_string()))
                .or_insert_with(|| AlertDraft {
                    signals: DetectionSignals::default(),
                    rule_names: Vec::new(),
                    anomaly_score: None,
                    triggering_count: None,
                    first_seen: candidate.window_start,
                    last_seen: candidate.window_end,
                });
            draft.signals.rule_hit = true;
            draft.rule_names.push(candidate.rule_name.clone());
            draft.triggering_count = Some(
                draft
                    .triggering_count
                    .map_or(candidate.triggering_count, |current| {
                        current.max(candidate.triggering_count)
                    }),
            );
            draft.first_seen = draft.first_seen.min(candidate.window_start);
            draft.last_seen = draft.last_seen.max(candidate.window_end);
        }
    }

    if let Some(results) = anomaly {
        for result in results {
            let mut annotated = false;
            for (key, draft) in drafts.iter_mut() {
                if key.0 == result.source_id {
                    draft.anomaly_score = Some(result.score);
                    draft.signals.anomaly_hit |= result.is_outlier;
                    annotated = true;
                }
            }
            if annotated || !result.is_outlier {
                continue;
            }

            // Outlier source with no rule candidate: emit a wildcard
            // alert spanning the source's current window.
            let Some((first_seen, last_seen)) = spans.get(result.source_id.as_str()).copied()
            else {
                continue;
            };
            drafts.insert(
                (result.source_id.clone(), WILDCARD_ACCOUNT.to_string()),
                AlertDraft {
                    signals: DetectionSignals {
                        rule_hit: false,
                        anomaly_hit: true,
                    },
                    rule_names: Vec::new(),
                    anomaly_score: Some(result.score),
                    triggering_count: None,
                    first_seen,
                    last_seen,
                },
            );
        }
    }

    let mut alerts: Vec<Alert> = drafts
        .into_iter()
        .map(|((source_id, target_account), mut draft)| {
            draft.rule_names.sort();
            draft.rule_names.dedup();
            Alert {
                severity: severity_policy(&draft.signals),
                source_id,
                target_account,
                signals: draft.signals,
                rule_names: draft.rule_names,
                anomaly_score: draft.anomaly_score,
                triggering_count: draft.triggering_count,
                first_seen: draft.first_seen,
                last_seen: draft.last_seen,
            }
        })
        .collect();

    alerts.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.source_id.cmp(&b.source_id))
            .then_with(|| a.target_account.cmp(&b.target_account))
    });
    alerts
}
