//! Cooperative one-shot timers
//!
//! Nothing here sleeps: owners call `pop_due` from their poll loop and act
//! on whatever fired. Recurring loops re-arm themselves after each tick.

/// Tolerance for timers that land on the polling instant
const DUE_EPSILON: f64 = 1e-9;

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Entry<K> {
    id: TimerId,
    due: f64,
    kind: K,
}

/// Timer queue keyed by a small kind enum
#[derive(Debug, Clone)]
pub struct TimerQueue<K> {
    entries: Vec<Entry<K>>,
    next_id: u64,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<K: Copy + PartialEq> TimerQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` to fire at host time `due`
    pub fn schedule(&mut self, due: f64, kind: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry { id, due, kind });
        id
    }

    /// Cancel a single timer
    ///
    /// # Returns
    /// true if the timer was still pending
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    /// Cancel every pending timer of `kind`, returning how many were removed
    pub fn cancel_kind(&mut self, kind: K) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.kind != kind);
        before - self.entries.len()
    }

    /// Remove and return every timer due at `now`, earliest first
    pub fn pop_due(&mut self, now: f64) -> Vec<(TimerId, K)> {
        let mut due: Vec<Entry<K>> = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].due <= now + DUE_EPSILON {
                due.push(self.entries.swap_remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.id.cmp(&b.id)));
        due.into_iter().map(|e| (e.id, e.kind)).collect()
    }

    /// Number of pending timers of `kind`
    pub fn count(&self, kind: K) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Due time of a pending timer
    pub fn due_time(&self, id: TimerId) -> Option<f64> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.due)
    }

    /// Earliest pending due time
    pub fn next_due(&self) -> Option<f64> {
        self.entries.iter().map(|e| e.due).min_by(|a, b| a.total_cmp(b))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
