//! Sliding-window error-rate tracking
//!
//! Maintains per-category and per-severity counters over a fixed time window.
//! The counters are observational telemetry only; they never participate in
//! stage trigger decisions and are not authoritative error storage.

use crate::events::{ErrorCategory, ErrorSeverity, Timestamp};
use chrono::{Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

const DEFAULT_WINDOW_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy)]
struct RateEntry {
    timestamp: Timestamp,
    category: ErrorCategory,
    severity: ErrorSeverity,
}

/// A category currently observed in the window, with its dominant severity
/// and share of all windowed errors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedCategory {
    pub category: ErrorCategory,
    pub dominant_severity: ErrorSeverity,
    pub rate_percent: f64,
}

/// Thread-safe sliding-window counter of recent error events
///
/// Shared across concurrent processing calls; the mutex guards only short
/// append/scan operations. Reads are eventually consistent by design.
#[derive(Debug)]
pub struct RateTracker {
    window: Duration,
    entries: Mutex<VecDeque<RateEntry>>,
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MINUTES)
    }
}

impl RateTracker {
    /// Create a tracker with the given window length in minutes
    pub fn new(window_minutes: i64) -> Self {
        Self {
            window: Duration::minutes(window_minutes),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Record one error occurrence
    pub fn record(&self, category: ErrorCategory, severity: ErrorSeverity) {
        self.record_at(category, severity, Utc::now());
    }

    /// Record one error occurrence at a specific time, for tests
    pub fn record_at(
        &self,
        category: ErrorCategory,
        severity: ErrorSeverity,
        timestamp: Timestamp,
    ) {
        let mut entries = self.entries.lock().unwrap();
        entries.push_back(RateEntry {
            timestamp,
            category,
            severity,
        });
        Self::expire(&mut entries, self.window);
    }

    /// Percentage share of windowed errors belonging to a category
    pub fn rate_by_category(&self, category: ErrorCategory) -> f64 {
        let mut entries = self.entries.lock().unwrap();
        Self::expire(&mut entries, self.window);
        Self::share(&entries, |entry| entry.category == category)
    }

    /// Percentage share of windowed errors with a severity
    pub fn rate_by_severity(&self, severity: ErrorSeverity) -> f64 {
        let mut entries = self.entries.lock().unwrap();
        Self::expire(&mut entries, self.window);
        Self::share(&entries, |entry| entry.severity == severity)
    }

    /// Total number of errors currently inside the window
    pub fn total(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        Self::expire(&mut entries, self.window);
        entries.len()
    }

    /// Categories currently present in the window, each with its dominant
    /// severity and rate, sorted by descending rate
    pub fn observed_categories(&self) -> Vec<ObservedCategory> {
        let mut entries = self.entries.lock().unwrap();
        Self::expire(&mut entries, self.window);

        let total = entries.len();
        if total == 0 {
            return Vec::new();
        }

        let mut by_category: HashMap<ErrorCategory, (usize, ErrorSeverity)> = HashMap::new();
        for entry in entries.iter() {
            let slot = by_category
                .entry(entry.category)
                .or_insert((0, entry.severity));
            slot.0 += 1;
            if entry.severity > slot.1 {
                slot.1 = entry.severity;
            }
        }

        let mut observed: Vec<ObservedCategory> = by_category
            .into_iter()
            .map(|(category, (count, dominant_severity))| ObservedCategory {
                category,
                dominant_severity,
                rate_percent: count as f64 / total as f64 * 100.0,
            })
            .collect();
        observed.sort_by(|a, b| {
            b.rate_percent
                .partial_cmp(&a.rate_percent)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        observed
    }

    /// Forget all recorded entries
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    fn expire(entries: &mut VecDeque<RateEntry>, window: Duration) {
        let cutoff = Utc::now() - window;
        entries.retain(|entry| entry.timestamp > cutoff);
    }

    fn share(entries: &VecDeque<RateEntry>, predicate: impl Fn(&RateEntry) -> bool) -> f64 {
        if entries.is_empty() {
            return 0.0;
        }
        let matching = entries.iter().filter(|entry| predicate(entry)).count();
        matching as f64 / entries.len() as f64 * 100.0
    }
}
