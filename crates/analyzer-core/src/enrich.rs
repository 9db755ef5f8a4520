//! Optional geolocation annotation of alert rows. Enrichment is a
//! best-effort add-on: a resolver that knows nothing (or fails) never
//! blocks or suppresses alert emission.

use detection::export::AlertRow;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoLocation {
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Seam for an external geolocation collaborator.
pub trait GeoResolver {
    /// Location for a source identifier, or `None` when unknown.
    fn resolve(&self, source_id: &str) -> Option<GeoLocation>;
}

/// Resolver used when no geolocation backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl GeoResolver for NullResolver {
    fn resolve(&self, _source_id: &str) -> Option<GeoLocation> {
        None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichedAlertRow {
    #[serde(flatten)]
    pub alert: AlertRow,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

pub fn enrich_row(row: AlertRow, resolver: &dyn GeoResolver) -> EnrichedAlertRow {
    let location = resolver.resolve(&row.source_id);
    EnrichedAlertRow {
        alert: row,
        country: location.as_ref().map(|l| l.country.clone()),
        latitude: location.as_ref().map(|l| l.latitude),
        longitude: location.map(|l| l.longitude),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResolver;

    impl GeoResolver for FixedResolver {
        fn resolve(&self, source_id: &str) -> Option<GeoLocation> {
            (source_id == "203.0.113.7").then(|| GeoLocation {
                country: "NL".to_string(),
                latitude: 52.37,
                longitude: 4.89,
            })
        }
    }

    fn row(source: &str) -> AlertRow {
        AlertRow {
            source_id: source.to_string(),
            target_account: "admin".to_string(),
            severity: "high",
            rule_signal: true,
            anomaly_signal: false,
            rule_names: "account_bruteforce".to_string(),
            anomaly_score: None,
            triggering_count: Some(6),
            first_seen: "2025-11-30T12:00:00+00:00".to_string(),
            last_seen: "2025-11-30T12:01:00+00:00".to_string(),
        }
    }

    #[test]
    fn unknown_sources_still_emit() {
        let enriched = enrich_row(row("10.0.0.5"), &FixedResolver);
        assert_eq!(enriched.country, None);
        assert_eq!(enriched.alert.source_id, "10.0.0.5");
    }

    #[test]
    fn known_sources_carry_location() {
        let enriched = enrich_row(row("203.0.113.7"), &FixedResolver);
        assert_eq!(enriched.country.as_deref(), Some("NL"));
    }
}
