use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use detection::export::AlertRow;
use detection::{replay_records, DetectionEngine, RawRecord};
use tracing::{info, warn};

use crate::config::AnalyzerConfig;
use crate::enrich::{enrich_row, GeoResolver};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub total_records: usize,
    /// Undecodable lines plus records the normalizer rejected.
    pub malformed_records: usize,
    pub alerts_emitted: usize,
    pub anomaly_signal_available: bool,
}

/// One batch run: JSON-lines raw records in, JSON-lines alert rows
/// out. Per-record failures are logged and counted, never fatal.
pub fn run<R: BufRead, W: Write>(
    config: &AnalyzerConfig,
    input: R,
    output: &mut W,
    resolver: &dyn GeoResolver,
) -> Result<RunReport> {
    let mut engine = DetectionEngine::from_config(&config.detection)
        .context("building detection engine")?;

    let mut undecodable = 0usize;
    let mut records = Vec::new();
    for (line_no, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("reading input line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawRecord>(&line) {
            Ok(record) => records.push(record),
            Err(err) => {
                // Unknown schema variants land here too: a record the
                // adapter set cannot place is malformed, not fatal.
                warn!(line = line_no + 1, error = %err, "skipping undecodable record");
                undecodable += 1;
            }
        }
    }

    let summary = replay_records(&mut engine, records);
    let malformed_records = summary.malformed_records + undecodable;
    if malformed_records > 0 {
        warn!(
            malformed = malformed_records,
            total = summary.total_records + undecodable,
            "some records were skipped"
        );
    }
    if !summary.anomaly_signal_available {
        info!(
            sources = engine.source_count(),
            "batch too small for anomaly scoring, rule signals only"
        );
    }

    for alert in &summary.alerts {
        let enriched = enrich_row(AlertRow::from(alert), resolver);
        let line = serde_json::to_string(&enriched).context("serializing alert row")?;
        writeln!(output, "{line}").context("writing alert row")?;
    }

    let report = RunReport {
        total_records: summary.total_records + undecodable,
        malformed_records,
        alerts_emitted: summary.alerts.len(),
        anomaly_signal_available: summary.anomaly_signal_available,
    };
    info!(
        records = report.total_records,
        malformed = report.malformed_records,
        alerts = report.alerts_emitted,
        critical = summary.critical,
        high = summary.high,
        medium = summary.medium,
        "batch analysis complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::NullResolver;

    fn failure_line(ts: &str, user: &str, ip: &str) -> String {
        format!(
            r#"{{"schema":"windows_security","timestamp":"{ts}","event_id":4625,"target_user":"{user}","ip_address":"{ip}","status":null,"raw_event":null}}"#
        )
    }

    #[test]
    fn run_emits_alert_rows_and_counts_bad_lines() {
        let mut input = String::from("not json at all\n");
        for i in 0..6 {
            input.push_str(&failure_line(
                &format!("2025-11-30T12:00:{:02}Z", i * 10),
                "admin",
                "10.0.0.5",
            ));
            input.push('\n');
        }

        let config = AnalyzerConfig::default();
        let mut output = Vec::new();
        let report = run(&config, input.as_bytes(), &mut output, &NullResolver).unwrap();

        assert_eq!(report.total_records, 7);
        assert_eq!(report.malformed_records, 1);
        assert!(report.alerts_emitted > 0);
        assert!(!report.anomaly_signal_available);

        let first_line = String::from_utf8(output)
            .unwrap()
            .lines()
            .next()
            .unwrap()
            .to_string();
        let row: serde_json::Value = serde_json::from_str(&first_line).unwrap();
        assert_eq!(row["source_id"], "10.0.0.5");
        assert_eq!(row["country"], serde_json::Value::Null);
    }
}
