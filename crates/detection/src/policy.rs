use crate::types::{DetectionSignals, Severity};

/// Severity derivation from the signal set. Agreement between the
/// deterministic rules and the statistical model always outranks
/// either signal alone.
pub fn severity_policy(s: &DetectionSignals) -> Severity {
    if s.rule_hit && s.anomaly_hit {
        return Severity::Critical;
    }
    if s.rule_hit {
        return Severity::High;
    }
    if s.anomaly_hit {
        return Severity::Medium;
    }
    Severity::Low
}
