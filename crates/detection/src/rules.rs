use chrono::{DateTime, Utc};

use crate::window::WindowSnapshot;

/// What a threshold rule counts failures against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// All failures from one source, any account. A firing carries a
    /// wildcard account (`target_account = None`).
    PerSource,
    /// Failures from one source against one specific account.
    PerAccount,
}

#[derive(Debug, Clone)]
pub struct ThresholdRule {
    pub name: String,
    pub threshold: u32,
    pub scope: RuleScope,
}

/// Candidate alert emitted by one rule firing. Immutable; consumed by
/// the fuser, which deduplicates overlapping candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleAlert {
    pub source_id: String,
    /// `None` means "any account" (per-source scope).
    pub target_account: Option<String>,
    pub rule_name: String,
    pub triggering_count: u32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Deterministic threshold evaluation over window snapshots.
///
/// A `LoginSuccess` inside the window never resets failure counts:
/// repeated failures across a long session remain evidence, so a
/// low-and-slow attacker cannot wash the counter with one good login.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<ThresholdRule>,
}

impl RuleEngine {
    pub fn new(rules: Vec<ThresholdRule>) -> Self {
        Self { rules }
    }

    pub fn with_default_rules() -> Self {
        Self::new(default_rules())
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    /// Pure function of the snapshot: rules fire in declared order,
    /// accounts in sorted order, so identical input yields an
    /// identical alert sequence.
    pub fn evaluate(&self, snapshot: &WindowSnapshot) -> Vec<RuleAlert> {
        let mut alerts = Vec::new();
        for rule in &self.rules {
            match rule.scope {
                RuleScope::PerSource => {
                    if snapshot.failure_count >= rule.threshold {
                        alerts.push(RuleAlert {
                            source_id: snapshot.source_id.clone(),
                            target_account: None,
                            rule_name: rule.name.clone(),
                            triggering_count: snapshot.failure_count,
                            window_start: snapshot.first_seen,
                            window_end: snapshot.last_seen,
                        });
                    }
                }
                RuleScope::PerAccount => {
                    // BTreeMap iteration is already account-ordered.
                    for (account, failures) in &snapshot.account_failures {
                        if *failures >= rule.threshold {
                            alerts.push(RuleAlert {
                                source_id: snapshot.source_id.clone(),
                                target_account: Some(account.clone()),
                                rule_name: rule.name.clone(),
                                triggering_count: *failures,
                                window_start: snapshot.first_seen,
                                window_end: snapshot.last_seen,
                            });
                        }
                    }
                }
            }
        }
        alerts
    }
}

/// Baseline rule set: a burst of failures from one source, and
/// repeated failures against a single account.
pub fn default_rules() -> Vec<ThresholdRule> {
    vec![
        ThresholdRule {
            name: "failed_login_burst".to_string(),
            threshold: 5,
            scope: RuleScope::PerSource,
        },
        ThresholdRule {
            name: "account_bruteforce".to_string(),
            threshold: 5,
            scope: RuleScope::PerAccount,
        },
    ]
}
