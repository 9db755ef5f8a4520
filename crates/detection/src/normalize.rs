use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AuthEvent, EventOutcome};

/// Timestamp formats accepted from raw records, tried in order.
/// RFC 3339 with an explicit offset is handled separately.
const NAIVE_UTC_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M:%S",
];

/// Windows Security event IDs carrying authentication outcomes.
const EVENT_ID_LOGON_FAILURE: u32 = 4625;
const EVENT_ID_LOGON_SUCCESS: u32 = 4624;

/// One raw record in a known schema variant. The set is closed: a
/// record that fits no variant is a parse failure at the ingestion
/// boundary, not a crash inside the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "schema", rename_all = "snake_case")]
pub enum RawRecord {
    /// Fields extracted from a Windows Security XML export.
    WindowsSecurity {
        timestamp: Option<String>,
        event_id: Option<u32>,
        target_user: Option<String>,
        ip_address: Option<String>,
        /// Explicit "Failure"/"Success" status overriding the event-id
        /// mapping when present.
        status: Option<String>,
        raw_event: Option<String>,
    },
    /// Already-canonical shape with an explicit outcome string.
    Generic {
        timestamp: Option<String>,
        account: Option<String>,
        source: Option<String>,
        outcome: Option<String>,
        raw_ref: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecordError {
    MissingTimestamp,
    UnparsableTimestamp(String),
    MissingAccount,
    MissingSource,
}

impl fmt::Display for MalformedRecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTimestamp => write!(f, "record has no timestamp"),
            Self::UnparsableTimestamp(raw) => {
                write!(f, "unparsable timestamp: {raw:?}")
            }
            Self::MissingAccount => write!(f, "record has no target account"),
            Self::MissingSource => write!(f, "record has no usable source identifier"),
        }
    }
}

impl std::error::Error for MalformedRecordError {}

/// Map a raw record onto the canonical event schema.
///
/// Timestamp, account identity, and source identity are required;
/// a malformed timestamp is a hard per-record failure, never a silent
/// default. Unknown outcomes map to `EventOutcome::Other`.
pub fn normalize(record: &RawRecord) -> Result<AuthEvent, MalformedRecordError> {
    match record {
        RawRecord::WindowsSecurity {
            timestamp,
            event_id,
            target_user,
            ip_address,
            status,
            raw_event,
        } => {
            let timestamp = parse_timestamp(timestamp.as_deref())?;
            let target_account = required_field(target_user.as_deref())
                .ok_or(MalformedRecordError::MissingAccount)?;
            let source_id = sanitize_source(ip_address.as_deref())
                .ok_or(MalformedRecordError::MissingSource)?;
            let outcome = windows_outcome(*event_id, status.as_deref());

            Ok(AuthEvent {
                timestamp,
                source_id,
                target_account,
                outcome,
                raw_ref: raw_event.clone(),
            })
        }
        RawRecord::Generic {
            timestamp,
            account,
            source,
            outcome,
            raw_ref,
        } => {
            let timestamp = parse_timestamp(timestamp.as_deref())?;
            let target_account = required_field(account.as_deref())
                .ok_or(MalformedRecordError::MissingAccount)?;
            let source_id = sanitize_source(source.as_deref())
                .ok_or(MalformedRecordError::MissingSource)?;

            Ok(AuthEvent {
                timestamp,
                source_id,
                target_account,
                outcome: generic_outcome(outcome.as_deref()),
                raw_ref: raw_ref.clone(),
            })
        }
    }
}

fn parse_timestamp(raw: Option<&str>) -> Result<DateTime<Utc>, MalformedRecordError> {
    let raw = raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(MalformedRecordError::MissingTimestamp)?;

    for format in NAIVE_UTC_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.with_timezone(&Utc));
    }

    Err(MalformedRecordError::UnparsableTimestamp(raw.to_string()))
}

fn required_field(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validate a source address. Placeholder values Windows writes for
/// local or absent sources carry no attacker identity and make the
/// record malformed rather than creating a junk aggregation key.
fn sanitize_source(raw: Option<&str>) -> Option<String> {
    let raw = raw.map(str::trim).filter(|v| !v.is_empty())?;
    if matches!(raw, "-" | "127.0.0.1" | "::1") {
        return None;
    }
    if let Ok(addr) = raw.parse::<std::net::IpAddr>() {
        return Some(addr.to_string());
    }
    // Hostnames and other non-IP identifiers pass through as-is.
    Some(raw.to_string())
}

fn windows_outcome(event_id: Option<u32>, status: Option<&str>) -> EventOutcome {
    if let Some(status) = status.map(str::trim).filter(|v| !v.is_empty()) {
        if status.eq_ignore_ascii_case("failure") {
            return EventOutcome::LoginFailure;
        }
        if status.eq_ignore_ascii_case("success") {
            return EventOutcome::LoginSuccess;
        }
        return EventOutcome::Other;
    }
    match event_id {
        Some(EVENT_ID_LOGON_FAILURE) => EventOutcome::LoginFailure,
        Some(EVENT_ID_LOGON_SUCCESS) => EventOutcome::LoginSuccess,
        _ => EventOutcome::Other,
    }
}

fn generic_outcome(outcome: Option<&str>) -> EventOutcome {
    match outcome.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("failed_login") => EventOutcome::LoginFailure,
        Some(v) if v.eq_ignore_ascii_case("successful_login") => EventOutcome::LoginSuccess,
        _ => EventOutcome::Other,
    }
}
