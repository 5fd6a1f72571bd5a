// Crowd-powered trend votes.
// Votes are not deduplicated per voter; a shared deployment must record them server-side.

use indexmap::IndexMap;

use crate::error::{Result, StorefrontError};
use crate::types::TrendEntry;

/// Vote counters per label, remembering first-seen order.
#[derive(Debug, Clone, Default)]
pub struct TrendLedger {
    votes: IndexMap<String, u64>,
}

impl TrendLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed counters. Repeated labels accumulate.
    pub fn seeded(seeds: &[TrendEntry]) -> Self {
        let mut ledger = Self::new();
        for seed in seeds {
            let count = ledger.votes.entry(seed.label.clone()).or_insert(0);
            *count = count.saturating_add(seed.votes);
        }
        ledger
    }

    /// Increment a label, starting unseen labels at zero. Returns the new count.
    pub fn vote(&mut self, label: &str) -> Result<u64> {
        let label = label.trim();
        if label.is_empty() {
            return Err(StorefrontError::invalid_input("Pick something to vote for"));
        }
        let count = self.votes.entry(label.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        Ok(*count)
    }

    pub fn votes(&self, label: &str) -> u64 {
        self.votes.get(label).copied().unwrap_or(0)
    }

    /// Entries by descending votes; ties keep first-seen order.
    pub fn list(&self) -> Vec<TrendEntry> {
        let mut entries: Vec<TrendEntry> = self
            .votes
            .iter()
            .map(|(label, &votes)| TrendEntry {
                label: label.clone(),
                votes,
            })
            .collect();
        entries.sort_by(|a, b| b.votes.cmp(&a.votes));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StorefrontConfig;

    fn pairs(ledger: &TrendLedger) -> Vec<(String, u64)> {
        ledger
            .list()
            .into_iter()
            .map(|e| (e.label, e.votes))
            .collect()
    }

    #[test]
    fn votes_sort_descending() {
        let mut ledger = TrendLedger::new();
        for _ in 0..3 {
            ledger.vote("A").unwrap();
        }
        ledger.vote("B").unwrap();
        assert_eq!(
            pairs(&ledger),
            vec![("A".to_string(), 3), ("B".to_string(), 1)]
        );
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let mut ledger = TrendLedger::new();
        ledger.vote("C").unwrap();
        ledger.vote("A").unwrap();
        ledger.vote("B").unwrap();
        ledger.vote("A").unwrap();
        assert_eq!(
            pairs(&ledger),
            vec![
                ("A".to_string(), 2),
                ("C".to_string(), 1),
                ("B".to_string(), 1)
            ]
        );
    }

    #[test]
    fn seeded_from_config() {
        let mut ledger = TrendLedger::seeded(&StorefrontConfig::default().trend_seeds);
        assert_eq!(ledger.list()[0].label, "Warli Painted Cushion");
        assert_eq!(ledger.list()[1].label, "Recycled Glass");

        for _ in 0..4 {
            ledger.vote("Mango Wood Lamp").unwrap();
        }
        // 9 votes now beats Recycled Glass at 8.
        assert_eq!(ledger.list()[1].label, "Mango Wood Lamp");
        assert_eq!(ledger.votes("Mango Wood Lamp"), 9);
    }

    #[test]
    fn blank_label_rejected() {
        let mut ledger = TrendLedger::new();
        assert!(ledger.vote("   ").is_err());
        assert!(ledger.list().is_empty());
    }
}
