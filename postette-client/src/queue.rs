use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};

use postette_shared::{Record, RecordId};
use tracing::{debug, error};

/// Completion callback: `true` once the record was displayed, `false` when it
/// was rejected or never shown.
pub type Callback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Fires its callback at most once.
#[derive(Default)]
pub struct Completion(Option<Callback>);

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Completion")
            .field(&self.0.as_ref().map(|_| "callback"))
            .finish()
    }
}

impl Completion {
    pub fn new(callback: Callback) -> Self {
        Self(Some(callback))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_pending(&self) -> bool {
        self.0.is_some()
    }

    /// Runs the callback if it has not run yet. A panicking callback is
    /// logged and does not unwind into the scheduler.
    pub fn fire(&mut self, id: RecordId, displayed: bool) {
        let Some(callback) = self.0.take() else {
            return;
        };
        debug!(%id, displayed, "completion");
        if catch_unwind(AssertUnwindSafe(|| callback(displayed))).is_err() {
            error!(%id, "notification callback panicked");
        }
    }
}

impl From<Option<Callback>> for Completion {
    fn from(value: Option<Callback>) -> Self {
        Self(value)
    }
}

/// A record travelling through the scheduler with its completion.
#[derive(Debug)]
pub struct Entry {
    pub record: Record,
    pub completion: Completion,
    /// Set once the record has been drawn.
    pub shown: bool,
}

impl Entry {
    pub fn new(record: Record, completion: Completion) -> Self {
        Self {
            record,
            completion,
            shown: false,
        }
    }

    pub fn complete(&mut self) {
        let shown = self.shown;
        self.completion.fire(self.record.id, shown);
    }

    pub fn reject(&mut self) {
        self.completion.fire(self.record.id, false);
    }
}

/// Pending records, consumed most-recent-first.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    entries: VecDeque<Entry>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push_front(entry);
    }

    pub fn pop(&mut self) -> Option<Entry> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records in the order they would be shown.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn snapshot(&self) -> Vec<Record> {
        self.records().cloned().collect()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Entry> + '_ {
        self.entries.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use chrono::Utc;
    use postette_shared::{Delay, Integrate, Level, Pause};

    use super::*;

    fn record(id: u64) -> Record {
        Record {
            id: RecordId(id),
            user: "u".into(),
            message: format!("message {id}"),
            created: Utc::now(),
            created_at: Instant::now(),
            level: Level::Alert,
            href: "/".into(),
            pause: Pause::Millis(3000),
            delay: Delay::Millis(400),
            integrate: Integrate::Auto,
            once: false,
        }
    }

    #[test]
    fn queue_is_lifo() {
        let mut queue = NotificationQueue::new();
        for id in 1..=3 {
            queue.push(Entry::new(record(id), Completion::none()));
        }
        let order: Vec<u64> = queue.records().map(|r| r.id.0).collect();
        assert_eq!(order, vec![3, 2, 1]);
        assert_eq!(queue.pop().map(|e| e.record.id), Some(RecordId(3)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn completion_fires_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut entry = Entry::new(
            record(1),
            Completion::new(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );
        entry.complete();
        entry.reject();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!entry.completion.is_pending());
    }

    #[test]
    fn panicking_callback_is_contained() {
        let mut completion = Completion::new(Box::new(|_| panic!("boom")));
        completion.fire(RecordId(9), true);
        assert!(!completion.is_pending());
    }
}
