//! Recent-change tracking for HUD stats.
//!
//! A changed stat is shown with its delta for one window, then reverts to
//! silence. The first observation of a stat is seeded one window in the past
//! so the initial 0 -> X jump never surfaces.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Default time a change stays visible
pub const DEFAULT_STAT_WINDOW: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatRecord {
    pub previous: f32,
    pub current: f32,
    pub delta: f32,
    /// `None` when the seed could not be placed before the clock origin
    pub changed_at: Option<Instant>,
    pub window: Duration,
}

impl StatRecord {
    fn seeded(value: f32, now: Instant, window: Duration) -> Self {
        Self {
            previous: value,
            current: value,
            delta: 0.0,
            changed_at: now.checked_sub(window),
            window,
        }
    }

    pub fn is_recent(&self, now: Instant) -> bool {
        match self.changed_at {
            Some(at) => now.saturating_duration_since(at) < self.window,
            None => false,
        }
    }
}

pub struct StatTracker<K> {
    records: HashMap<K, StatRecord>,
    window: Duration,
}

impl<K: Eq + Hash + Copy> StatTracker<K> {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_STAT_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            records: HashMap::new(),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn update(&mut self, key: K, value: f32) {
        self.update_at(key, value, Instant::now());
    }

    pub fn update_at(&mut self, key: K, value: f32, now: Instant) {
        // NaN never compares equal and would restart the window every frame;
        // it only comes from a torn read, so the last good value stays
        if value.is_nan() {
            return;
        }

        let window = self.window;
        let record = self
            .records
            .entry(key)
            .or_insert_with(|| StatRecord::seeded(value, now, window));

        // Equal values must not restart the window
        if record.current != value {
            record.previous = record.current;
            record.current = value;
            record.delta = record.current - record.previous;
            record.changed_at = Some(now);
        }
    }

    pub fn recent_delta_f32(&self, key: K) -> f32 {
        self.recent_delta_f32_at(key, Instant::now())
    }

    pub fn recent_delta_f32_at(&self, key: K, now: Instant) -> f32 {
        match self.records.get(&key) {
            Some(record) if record.is_recent(now) => record.delta,
            _ => 0.0,
        }
    }

    pub fn recent_delta_i32(&self, key: K) -> i32 {
        self.recent_delta_i32_at(key, Instant::now())
    }

    /// Integer stats share the float record; the delta is truncated.
    pub fn recent_delta_i32_at(&self, key: K, now: Instant) -> i32 {
        self.recent_delta_f32_at(key, now) as i32
    }

    pub fn record(&self, key: K) -> Option<&StatRecord> {
        self.records.get(&key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<K: Eq + Hash + Copy> Default for StatTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}
