//! Append-only violation ledger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use proctor_types::{Clock, Finding, ViolationRecord};
use tracing::{info, warn};

/// Notified after every counted record.
///
/// Notifications are delivered after the ledger lock is released, so two
/// racing writers may deliver counts out of order. Observers must treat the
/// count as a high-water mark.
pub trait LedgerObserver: Send + Sync {
    fn on_violation_count(&self, count: u32);
}

#[derive(Debug, Default)]
struct LedgerInner {
    records: Vec<ViolationRecord>,
    violation_count: u32,
}

/// Monotonic violation counter plus the session's record log.
///
/// Sequence numbers start at 1 and are assigned in admission order across
/// every detector, without gaps.
pub struct ViolationLedger {
    inner: Mutex<LedgerInner>,
    observers: Vec<Arc<dyn LedgerObserver>>,
    clock: Arc<dyn Clock>,
}

impl ViolationLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(LedgerInner::default()),
            observers: Vec::new(),
            clock,
        }
    }

    /// Register an observer of the running count.
    pub fn with_observer(mut self, observer: Arc<dyn LedgerObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Record a counted finding now.
    pub fn record(&self, finding: &Finding) -> ViolationRecord {
        self.record_at(finding, self.clock.now())
    }

    /// Record a counted finding admitted at `admitted_at`.
    pub fn record_at(&self, finding: &Finding, admitted_at: DateTime<Utc>) -> ViolationRecord {
        let record = self.append(finding, admitted_at, true);

        warn!(
            sequence = record.sequence_number,
            count = record.violation_count,
            source = %finding.source,
            label = %finding.label,
            "Violation recorded"
        );

        for observer in &self.observers {
            observer.on_violation_count(record.violation_count);
        }

        record
    }

    /// Log an informational finding without touching the count.
    pub fn note_at(&self, finding: &Finding, admitted_at: DateTime<Utc>) -> ViolationRecord {
        let record = self.append(finding, admitted_at, false);
        info!(
            sequence = record.sequence_number,
            label = %finding.label,
            "Informational finding noted"
        );
        record
    }

    fn append(&self, finding: &Finding, at: DateTime<Utc>, counted: bool) -> ViolationRecord {
        let mut inner = self.inner.lock();

        if counted {
            inner.violation_count = inner.violation_count.saturating_add(1);
        }

        let record = ViolationRecord {
            sequence_number: inner.records.len() as u64 + 1,
            source: finding.source,
            label: finding.label.clone(),
            message: finding.message.clone(),
            timestamp: at,
            counted,
            violation_count: inner.violation_count,
        };
        inner.records.push(record.clone());
        record
    }

    /// Number of counted violations.
    pub fn count(&self) -> u32 {
        self.inner.lock().violation_count
    }

    /// All records in sequence order.
    pub fn records(&self) -> Vec<ViolationRecord> {
        self.inner.lock().records.clone()
    }

    /// Counted records only.
    pub fn counted_records(&self) -> Vec<ViolationRecord> {
        self.inner
            .lock()
            .records
            .iter()
            .filter(|r| r.counted)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_types::{labels, DetectorSource, ManualClock};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct HighWater(AtomicU32);

    impl LedgerObserver for HighWater {
        fn on_violation_count(&self, count: u32) {
            self.0.fetch_max(count, Ordering::SeqCst);
        }
    }

    fn ledger() -> ViolationLedger {
        ViolationLedger::new(Arc::new(ManualClock::default()))
    }

    fn finding(label: &str) -> Finding {
        Finding::new(DetectorSource::Object, label, 0.9, format!("saw {}", label))
    }

    #[test]
    fn record_assigns_sequence_and_count() {
        let ledger = ledger();
        let first = ledger.record(&finding(labels::BOOK));
        let second = ledger.record(&finding(labels::MOBILE_PHONE));

        assert_eq!(first.sequence_number, 1);
        assert_eq!(second.sequence_number, 2);
        assert_eq!(second.violation_count, 2);
        assert!(second.counted);
        assert_eq!(second.message, "saw mobile phone");
        assert_eq!(ledger.count(), 2);
    }

    #[test]
    fn notes_share_sequence_but_not_count() {
        let ledger = ledger();
        let now = Utc::now();
        ledger.record_at(&finding(labels::BOOK), now);
        let note = ledger.note_at(&finding(labels::FACE_NOT_VISIBLE), now);

        assert_eq!(note.sequence_number, 2);
        assert!(!note.counted);
        assert_eq!(note.violation_count, 1);
        assert_eq!(ledger.count(), 1);
        assert_eq!(ledger.counted_records().len(), 1);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn observer_sees_counts() {
        let observer = Arc::new(HighWater(AtomicU32::new(0)));
        let ledger = ledger().with_observer(observer.clone());
        ledger.record(&finding(labels::BOOK));
        ledger.record(&finding(labels::BOOK));
        assert_eq!(observer.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_writers_get_gap_free_sequence() {
        let ledger = Arc::new(ledger());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        ledger.record(&finding(labels::LAPTOP));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let records = ledger.records();
        assert_eq!(ledger.count(), 200);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.sequence_number, i as u64 + 1);
            assert_eq!(record.violation_count, i as u32 + 1);
        }
    }

    proptest! {
        #[test]
        fn sequence_is_gap_free_and_count_matches(kinds in prop::collection::vec(any::<bool>(), 0..64)) {
            let ledger = ledger();
            let now = Utc::now();
            for counted in &kinds {
                if *counted {
                    ledger.record_at(&finding(labels::BOOK), now);
                } else {
                    ledger.note_at(&finding(labels::FACE_NOT_VISIBLE), now);
                }
            }

            let records = ledger.records();
            prop_assert_eq!(records.len(), kinds.len());
            for (i, record) in records.iter().enumerate() {
                prop_assert_eq!(record.sequence_number, i as u64 + 1);
            }
            let expected = kinds.iter().filter(|c| **c).count() as u32;
            prop_assert_eq!(ledger.count(), expected);
        }
    }
}
