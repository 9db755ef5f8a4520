//! Tabular export boundary. Field names and types here are a schema
//! contract with reporting/visualization consumers: one row per
//! alert/event/window, stable across runs.

use serde::Serialize;

use crate::fusion::Alert;
use crate::types::AuthEvent;
use crate::window::WindowSnapshot;

#[derive(Debug, Clone, Serialize)]
pub struct AlertRow {
    pub source_id: String,
    pub target_account: String,
    pub severity: &'static str,
    pub rule_signal: bool,
    pub anomaly_signal: bool,
    pub rule_names: String,
    pub anomaly_score: Option<f64>,
    pub triggering_count: Option<u32>,
    pub first_seen: String,
    pub last_seen: String,
}

impl From<&Alert> for AlertRow {
    fn from(alert: &Alert) -> Self {
        Self {
            source_id: alert.source_id.clone(),
            target_account: alert.target_account.clone(),
            severity: alert.severity.as_str(),
            rule_signal: alert.signals.rule_hit,
            anomaly_signal: alert.signals.anomaly_hit,
            rule_names: alert.rule_names.join(";"),
            anomaly_score: alert.anomaly_score,
            triggering_count: alert.triggering_count,
            first_seen: alert.first_seen.to_rfc3339(),
            last_seen: alert.last_seen.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRow {
    pub timestamp: String,
    pub source_id: String,
    pub target_account: String,
    pub outcome: &'static str,
}

impl From<&AuthEvent> for EventRow {
    fn from(event: &AuthEvent) -> Self {
        Self {
            timestamp: event.timestamp.to_rfc3339(),
            source_id: event.source_id.clone(),
            target_account: event.target_account.clone(),
            outcome: event.outcome.as_str(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowRow {
    pub source_id: String,
    pub failure_count: u32,
    pub distinct_accounts: usize,
    pub first_seen: String,
    pub last_seen: String,
}

impl From<&WindowSnapshot> for WindowRow {
    fn from(snapshot: &WindowSnapshot) -> Self {
        Self {
            source_id: snapshot.source_id.clone(),
            failure_count: snapshot.failure_count,
            distinct_accounts: snapshot.distinct_accounts(),
            first_seen: snapshot.first_seen.to_rfc3339(),
            last_seen: snapshot.last_seen.to_rfc3339(),
        }
    }
}

pub fn alert_rows(alerts: &[Alert]) -> Vec<AlertRow> {
    alerts.iter().map(AlertRow::from).collect()
}

pub fn window_rows(snapshots: &[WindowSnapshot]) -> Vec<WindowRow> {
    snapshots.iter().map(WindowRow::from).collect()
}
