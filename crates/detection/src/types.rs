use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single authentication attempt after normalization.
///
/// Unknown raw subtypes map to `Other` instead of failing, so new log
/// schemas degrade to "uninteresting" rather than breaking ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventOutcome {
    LoginFailure,
    LoginSuccess,
    Other,
}

impl EventOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoginFailure => "login_failure",
            Self::LoginSuccess => "login_success",
            Self::Other => "other",
        }
    }
}

/// Canonical authentication event. Immutable once constructed by the
/// normalizer; every downstream component consumes this shape only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEvent {
    /// Attempt time, normalized to UTC.
    pub timestamp: DateTime<Utc>,
    /// Originating address/host of the attempt.
    pub source_id: String,
    /// Account the attempt targeted.
    pub target_account: String,
    pub outcome: EventOutcome,
    /// Opaque back-reference to the raw record. Never dereferenced here.
    pub raw_ref: Option<String>,
}

impl AuthEvent {
    pub fn ts_unix(&self) -> i64 {
        self.timestamp.timestamp()
    }
}

/// Which detection paths flagged a (source, account) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSignals {
    pub rule_hit: bool,
    pub anomaly_hit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Numeric severity level for ordering (0=Low, 3=Critical).
    pub fn numeric(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.numeric().cmp(&other.numeric())
    }
}
