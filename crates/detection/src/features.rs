use crate::window::WindowSnapshot;

/// Width of the per-source feature vector.
pub const FEATURE_COUNT: usize = 4;

/// Feature names, in vector order (for logging and export).
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "failure_count",
    "distinct_accounts",
    "time_span_seconds",
    "failure_rate",
];

/// Rate denominator floor. A single burst measured over a few seconds
/// would otherwise produce an unbounded failures-per-second rate.
const MIN_RATE_SPAN_SECONDS: f64 = 60.0;

/// Fixed-width numeric features for one source's window. Derived
/// deterministically from the snapshot; recomputed each evaluation
/// cycle and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub source_id: String,
    pub values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn failure_count(&self) -> f64 {
        self.values[0]
    }

    pub fn distinct_accounts(&self) -> f64 {
        self.values[1]
    }

    pub fn time_span_seconds(&self) -> f64 {
        self.values[2]
    }

    pub fn failure_rate(&self) -> f64 {
        self.values[3]
    }
}

/// Total function: every snapshot maps to a vector, with degenerate
/// windows (one event) yielding a zero span and a floor-bounded rate.
/// Semantics do not depend on the rest of the batch, so scores from
/// independent passes over the same windows are comparable.
pub fn extract(snapshot: &WindowSnapshot) -> FeatureVector {
    let failure_count = f64::from(snapshot.failure_count);
    let distinct_accounts = snapshot.distinct_accounts() as f64;
    let time_span_seconds = snapshot.time_span_seconds().max(0) as f64;
    let failure_rate = failure_count / time_span_seconds.max(MIN_RATE_SPAN_SECONDS);

    FeatureVector {
        source_id: snapshot.source_id.clone(),
        values: [
            failure_count,
            distinct_accounts,
            time_span_seconds,
            failure_rate,
        ],
    }
}
