//! Finish ledger - the ordered record of who crossed the line
//!
//! All appends go through one mutex, so concurrent finishers are linearized
//! into a single order. Entries are never removed or reordered; any read
//! returns a prefix of the final order.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One line of the finish order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishEntry {
    /// Roster index of the competitor
    pub index: usize,
    pub name: String,
    pub controlled: bool,
    /// 1-based, assigned on append
    pub placement: u32,
    /// Tick on which the line was crossed
    pub finish_tick: u64,
    /// Race clock at the crossing, in milliseconds
    pub finish_time_ms: u64,
}

/// Append-only, concurrency-safe finish order
#[derive(Debug, Default)]
pub struct FinishLedger {
    entries: Mutex<Vec<FinishEntry>>,
}

impl FinishLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a finisher and stamps its placement. Returns false, leaving
    /// the ledger untouched, if that competitor is already recorded.
    pub fn append(&self, mut entry: FinishEntry) -> bool {
        let mut entries = self.entries.lock();
        if entries.iter().any(|e| e.index == entry.index) {
            log::warn!("Ignoring duplicate finish for {}", entry.name);
            return false;
        }
        entry.placement = entries.len() as u32 + 1;
        log::debug!("{} finished #{} on tick {}", entry.name, entry.placement, entry.finish_tick);
        entries.push(entry);
        true
    }

    /// Copy of the order so far
    pub fn entries(&self) -> Vec<FinishEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.lock().iter().any(|e| e.index == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn entry(index: usize) -> FinishEntry {
        FinishEntry {
            index,
            name: format!("Runner {index}"),
            controlled: index == 0,
            placement: 0,
            finish_tick: 0,
            finish_time_ms: 0,
        }
    }

    #[test]
    fn test_append_assigns_placements_in_order() {
        let ledger = FinishLedger::new();
        assert!(ledger.is_empty());
        assert!(ledger.append(entry(3)));
        assert!(ledger.append(entry(1)));

        let order = ledger.entries();
        assert_eq!(order.iter().map(|e| e.index).collect::<Vec<_>>(), [3, 1]);
        assert_eq!(order.iter().map(|e| e.placement).collect::<Vec<_>>(), [1, 2]);
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let ledger = FinishLedger::new();
        assert!(ledger.append(entry(2)));
        assert!(!ledger.append(entry(2)));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(2));
        assert!(!ledger.contains(0));
    }

    #[test]
    fn test_concurrent_appends_are_unique_and_gapless() {
        let ledger = Arc::new(FinishLedger::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                // Two threads race for each index
                thread::spawn(move || ledger.append(entry(i / 2)))
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .filter(|appended| *appended)
            .count();
        assert_eq!(accepted, 8);

        let order = ledger.entries();
        assert_eq!(order.len(), 8);
        for (i, e) in order.iter().enumerate() {
            assert_eq!(e.placement, i as u32 + 1);
        }
        let mut indices: Vec<_> = order.iter().map(|e| e.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_reads_are_prefixes() {
        let ledger = FinishLedger::new();
        ledger.append(entry(4));
        let early = ledger.entries();
        ledger.append(entry(0));
        let late = ledger.entries();
        assert_eq!(&late[..early.len()], &early[..]);
    }
}
