//! Review batch: records paired with their match decisions.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::DecisionError;
use crate::models::matching::{DecisionState, MatchDecision};
use crate::models::record::ExtractedRecord;

/// A record and its decision, keyed by source position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewEntry {
    /// Zero-based position of the record in the extraction result.
    pub position: usize,
    pub record: ExtractedRecord,
    pub decision: MatchDecision,
}

/// Decision counts of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    pub total: usize,
    pub pending: usize,
    pub accept_update: usize,
    pub create_new: usize,
    /// Decisions already made by the caller.
    pub decided: usize,
}

/// Records of one document awaiting disposition.
///
/// Withdrawn records are removed together with their decision.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewBatch {
    entries: BTreeMap<usize, ReviewEntry>,
}

impl ReviewBatch {
    /// Pair records with decisions by position.
    pub fn new(records: Vec<ExtractedRecord>, decisions: Vec<MatchDecision>) -> Self {
        let entries = records
            .into_iter()
            .zip(decisions)
            .enumerate()
            .map(|(position, (record, decision))| {
                (
                    position,
                    ReviewEntry {
                        position,
                        record,
                        decision,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&ReviewEntry> {
        self.entries.get(&position)
    }

    /// Entries in source order.
    pub fn entries(&self) -> impl Iterator<Item = &ReviewEntry> {
        self.entries.values()
    }

    /// Caller accepts an update of `candidate_id` for the record.
    pub fn accept(&mut self, position: usize, candidate_id: &str) -> Result<(), DecisionError> {
        self.entry_mut(position)?.decision.accept(candidate_id)
    }

    /// Caller makes the record a new catalog entry.
    pub fn create_new(&mut self, position: usize) -> Result<(), DecisionError> {
        self.entry_mut(position)?.decision.create_new()
    }

    /// Remove a record and its decision from the batch.
    pub fn withdraw(&mut self, position: usize) -> Result<ReviewEntry, DecisionError> {
        let entry = self
            .entries
            .remove(&position)
            .ok_or(DecisionError::UnknownRecord(position))?;
        debug!("Withdrew record {} ('{}')", position, entry.record.name);
        Ok(entry)
    }

    pub fn pending_count(&self) -> usize {
        self.entries.values().filter(|e| e.decision.is_pending()).count()
    }

    pub fn summary(&self) -> ReviewSummary {
        let mut summary = ReviewSummary {
            total: self.entries.len(),
            ..ReviewSummary::default()
        };
        for entry in self.entries.values() {
            match entry.decision.state {
                DecisionState::Pending => summary.pending += 1,
                DecisionState::AcceptUpdate => summary.accept_update += 1,
                DecisionState::CreateNew => summary.create_new += 1,
            }
            if entry.decision.is_final() {
                summary.decided += 1;
            }
        }
        summary
    }

    /// Hand the remaining entries over, in source order.
    pub fn into_entries(self) -> Vec<ReviewEntry> {
        self.entries.into_values().collect()
    }

    fn entry_mut(&mut self, position: usize) -> Result<&mut ReviewEntry, DecisionError> {
        self.entries
            .get_mut(&position)
            .ok_or(DecisionError::UnknownRecord(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::matching::{MatchCandidate, MatchTier};
    use pretty_assertions::assert_eq;

    fn candidate(id: &str) -> MatchCandidate {
        MatchCandidate {
            candidate_id: id.to_string(),
            tier: MatchTier::Fuzzy,
            confidence: 0.92,
            justification: String::new(),
        }
    }

    fn batch() -> ReviewBatch {
        ReviewBatch::new(
            vec![
                ExtractedRecord::new("a"),
                ExtractedRecord::new("b"),
                ExtractedRecord::new("c"),
            ],
            vec![
                MatchDecision::pending(vec![candidate("c1")]),
                MatchDecision::pending(vec![candidate("c2")]),
                MatchDecision::recommend_new(Vec::new()),
            ],
        )
    }

    #[test]
    fn test_withdraw_removes_decision() {
        let mut batch = batch();
        assert_eq!(batch.pending_count(), 2);

        let withdrawn = batch.withdraw(1).unwrap();
        assert_eq!(withdrawn.record.name, "b");
        assert_eq!(batch.pending_count(), 1);
        assert_eq!(batch.len(), 2);
        assert!(batch.get(1).is_none());

        assert_eq!(batch.withdraw(1).unwrap_err(), DecisionError::UnknownRecord(1));
        assert_eq!(batch.accept(1, "c2"), Err(DecisionError::UnknownRecord(1)));
    }

    #[test]
    fn test_positions_survive_withdrawal() {
        let mut batch = batch();
        batch.withdraw(0).unwrap();
        let positions: Vec<usize> = batch.entries().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(batch.get(2).unwrap().record.name, "c");
    }

    #[test]
    fn test_decisions_and_summary() {
        let mut batch = batch();
        batch.accept(0, "c1").unwrap();
        batch.create_new(2).unwrap();

        assert_eq!(
            batch.summary(),
            ReviewSummary {
                total: 3,
                pending: 1,
                accept_update: 1,
                create_new: 1,
                decided: 2,
            }
        );
        assert_eq!(
            batch.create_new(0),
            Err(DecisionError::AlreadyResolved(DecisionState::AcceptUpdate))
        );
    }
}
