use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, TimeZone, Utc};

use crate::types::{AuthEvent, EventOutcome};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowEvictionCounters {
    /// Entries dropped because they slid out of the time window.
    pub window_prune: u64,
    /// Whole sources dropped to respect the tracked-source cap.
    pub source_cap_evict: u64,
}

#[derive(Debug, Clone)]
struct WindowEntry {
    ts_unix: i64,
    account: String,
    outcome: EventOutcome,
}

/// Per-account tallies inside one source's window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct AccountCounts {
    events: u32,
    failures: u32,
}

/// Live window state for one source. Mutated only by `WindowStore`.
#[derive(Debug, Default)]
struct SourceWindow {
    /// Retained events, ordered by timestamp (not arrival order).
    entries: VecDeque<WindowEntry>,
    failure_count: u32,
    account_counts: HashMap<String, AccountCounts>,
}

impl SourceWindow {
    fn insert_ordered(&mut self, entry: WindowEntry) {
        let position = self
            .entries
            .iter()
            .rposition(|existing| existing.ts_unix <= entry.ts_unix)
            .map(|idx| idx + 1)
            .unwrap_or(0);
        self.count_entry(&entry);
        self.entries.insert(position, entry);
    }

    fn count_entry(&mut self, entry: &WindowEntry) {
        let counts = self.account_counts.entry(entry.account.clone()).or_default();
        counts.events += 1;
        if entry.outcome == EventOutcome::LoginFailure {
            counts.failures += 1;
            self.failure_count += 1;
        }
    }

    fn uncount_entry(&mut self, entry: &WindowEntry) {
        if let Some(counts) = self.account_counts.get_mut(&entry.account) {
            counts.events = counts.events.saturating_sub(1);
            if entry.outcome == EventOutcome::LoginFailure {
                counts.failures = counts.failures.saturating_sub(1);
            }
            if counts.events == 0 {
                self.account_counts.remove(&entry.account);
            }
        }
        if entry.outcome == EventOutcome::LoginFailure {
            self.failure_count = self.failure_count.saturating_sub(1);
        }
    }

    /// Drop entries older than the window relative to the newest
    /// retained timestamp. Returns the number pruned.
    fn evict_outside_window(&mut self, window_secs: i64) -> u64 {
        let Some(newest) = self.entries.back().map(|e| e.ts_unix) else {
            return 0;
        };
        let cutoff = newest - window_secs;
        let mut pruned = 0u64;
        loop {
            match self.entries.front() {
                Some(front) if front.ts_unix < cutoff => {
                    if let Some(stale) = self.entries.pop_front() {
                        self.uncount_entry(&stale);
                        pruned += 1;
                    }
                }
                _ => break,
            }
        }
        pruned
    }

    fn first_seen_unix(&self) -> Option<i64> {
        self.entries.front().map(|e| e.ts_unix)
    }

    fn last_seen_unix(&self) -> Option<i64> {
        self.entries.back().map(|e| e.ts_unix)
    }
}

/// Immutable copy of one source's window, handed to the rule
/// evaluator and feature extractor. Never aliases live state.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    pub source_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub failure_count: u32,
    /// Per-account failure counts, sorted by account name.
    pub account_failures: BTreeMap<String, u32>,
    /// Accounts observed in the window with any outcome.
    pub accounts: Vec<String>,
}

impl WindowSnapshot {
    pub fn distinct_accounts(&self) -> usize {
        self.accounts.len()
    }

    pub fn time_span_seconds(&self) -> i64 {
        (self.last_seen - self.first_seen).num_seconds()
    }
}

/// Keyed store of per-source sliding windows — the single owner of
/// aggregation state. Consumers only ever see `WindowSnapshot` copies.
#[derive(Debug)]
pub struct WindowStore {
    window_secs: i64,
    max_tracked_sources: usize,
    sources: HashMap<String, SourceWindow>,
    eviction_counters: WindowEvictionCounters,
}

impl WindowStore {
    pub fn new(window_secs: i64, max_tracked_sources: usize) -> Self {
        Self {
            window_secs: window_secs.max(1),
            max_tracked_sources: max_tracked_sources.max(1),
            sources: HashMap::new(),
            eviction_counters: WindowEvictionCounters::default(),
        }
    }

    /// Insert one event into its source's window and slide the window
    /// relative to the newest retained timestamp for that source.
    /// Eviction keys off event time, so replay over historical logs is
    /// deterministic regardless of arrival order.
    pub fn ingest(&mut self, event: &AuthEvent) {
        let window = self.sources.entry(event.source_id.clone()).or_default();
        window.insert_ordered(WindowEntry {
            ts_unix: event.ts_unix(),
            account: event.target_account.clone(),
            outcome: event.outcome,
        });
        let pruned = window.evict_outside_window(self.window_secs);
        self.eviction_counters.window_prune += pruned;

        if window.entries.is_empty() {
            self.sources.remove(&event.source_id);
        }
        self.enforce_source_capacity();
    }

    pub fn snapshot(&self, source_id: &str) -> Option<WindowSnapshot> {
        self.sources
            .get(source_id)
            .and_then(|window| Self::snapshot_of(source_id, window))
    }

    /// Snapshots for every tracked source, sorted by source id so a
    /// whole-batch pass observes a consistent, deterministic view.
    pub fn snapshots(&self) -> Vec<WindowSnapshot> {
        let mut out: Vec<WindowSnapshot> = self
            .sources
            .iter()
            .filter_map(|(source_id, window)| Self::snapshot_of(source_id, window))
            .collect();
        out.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        out
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    pub fn eviction_counters(&self) -> WindowEvictionCounters {
        self.eviction_counters
    }

    fn snapshot_of(source_id: &str, window: &SourceWindow) -> Option<WindowSnapshot> {
        let first_seen = window.first_seen_unix()?;
        let last_seen = window.last_seen_unix()?;

        let mut account_failures = BTreeMap::new();
        let mut accounts = Vec::with_capacity(window.account_counts.len());
        for (account, counts) in &window.account_counts {
            accounts.push(account.clone());
            if counts.failures > 0 {
                account_failures.insert(account.clone(), counts.failures);
            }
        }
        accounts.sort();

        Some(WindowSnapshot {
            source_id: source_id.to_string(),
            first_seen: Utc.timestamp_opt(first_seen, 0).single()?,
            last_seen: Utc.timestamp_opt(last_seen, 0).single()?,
            failure_count: window.failure_count,
            account_failures,
            accounts,
        })
    }

    fn enforce_source_capacity(&mut self) {
        while self.sources.len() > self.max_tracked_sources {
            let Some(victim) = self
                .sources
                .iter()
                .min_by_key(|(source_id, window)| {
                    (window.last_seen_unix().unwrap_or(i64::MIN), source_id.clone())
                })
                .map(|(source_id, _)| source_id.clone())
            else {
                break;
            };
            if self.sources.remove(&victim).is_some() {
                self.eviction_counters.source_cap_evict += 1;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn debug_retained_entries(&self, source_id: &str) -> usize {
        self.sources
            .get(source_id)
            .map(|w| w.entries.len())
            .unwrap_or(0)
    }
}
