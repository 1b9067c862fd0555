//! Catalog entries, match candidates and match decisions.

use serde::{Deserialize, Serialize};

use crate::error::DecisionError;

/// A record of the existing catalog, as returned by the catalog collaborator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Opaque catalog identifier.
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Matching strategy that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Fuzzy,
    Semantic,
}

impl MatchTier {
    /// Lower is stronger; used to break confidence ties.
    pub fn rank(&self) -> u8 {
        match self {
            MatchTier::Exact => 0,
            MatchTier::Fuzzy => 1,
            MatchTier::Semantic => 2,
        }
    }
}

/// One existing catalog record that may correspond to an extracted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub candidate_id: String,
    pub tier: MatchTier,
    /// Match confidence (0.0 - 1.0).
    pub confidence: f64,
    /// Human-readable reason for the match.
    pub justification: String,
}

/// Resolution state of a match decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionState {
    Pending,
    AcceptUpdate,
    CreateNew,
}

/// Who set the current decision state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Recommendation made by the matcher; the caller may still override it.
    Matcher,
    /// Explicit caller decision; final.
    Caller,
}

/// Reconciliation outcome for one extracted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDecision {
    /// Candidates, highest confidence first.
    pub candidates: Vec<MatchCandidate>,
    pub state: DecisionState,
    /// Present only when `state` is `AcceptUpdate`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
    pub source: DecisionSource,
}

impl MatchDecision {
    /// Undecided decision awaiting the caller.
    pub fn pending(candidates: Vec<MatchCandidate>) -> Self {
        Self {
            candidates,
            state: DecisionState::Pending,
            selected: None,
            source: DecisionSource::Matcher,
        }
    }

    /// Matcher recommendation to update the given candidate.
    pub fn recommend_update(candidates: Vec<MatchCandidate>, candidate_id: impl Into<String>) -> Self {
        Self {
            candidates,
            state: DecisionState::AcceptUpdate,
            selected: Some(candidate_id.into()),
            source: DecisionSource::Matcher,
        }
    }

    /// Matcher recommendation to create a new catalog entry.
    pub fn recommend_new(candidates: Vec<MatchCandidate>) -> Self {
        Self {
            candidates,
            state: DecisionState::CreateNew,
            selected: None,
            source: DecisionSource::Matcher,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == DecisionState::Pending
    }

    /// Whether the caller has made the final call.
    pub fn is_final(&self) -> bool {
        self.source == DecisionSource::Caller
    }

    /// Highest ranked candidate.
    pub fn best(&self) -> Option<&MatchCandidate> {
        self.candidates.first()
    }

    /// Caller accepts an update of the given candidate.
    pub fn accept(&mut self, candidate_id: &str) -> Result<(), DecisionError> {
        self.ensure_open()?;
        if !self.candidates.iter().any(|c| c.candidate_id == candidate_id) {
            return Err(DecisionError::UnknownCandidate(candidate_id.to_string()));
        }
        self.state = DecisionState::AcceptUpdate;
        self.selected = Some(candidate_id.to_string());
        self.source = DecisionSource::Caller;
        Ok(())
    }

    /// Caller decides the record becomes a new catalog entry.
    pub fn create_new(&mut self) -> Result<(), DecisionError> {
        self.ensure_open()?;
        self.state = DecisionState::CreateNew;
        self.selected = None;
        self.source = DecisionSource::Caller;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DecisionError> {
        if self.is_final() {
            return Err(DecisionError::AlreadyResolved(self.state));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, tier: MatchTier, confidence: f64) -> MatchCandidate {
        MatchCandidate {
            candidate_id: id.to_string(),
            tier,
            confidence,
            justification: String::new(),
        }
    }

    #[test]
    fn test_pending_accepts_known_candidate() {
        let mut decision = MatchDecision::pending(vec![candidate("c1", MatchTier::Fuzzy, 0.93)]);
        decision.accept("c1").unwrap();

        assert_eq!(decision.state, DecisionState::AcceptUpdate);
        assert_eq!(decision.selected.as_deref(), Some("c1"));
        assert!(decision.is_final());
    }

    #[test]
    fn test_unknown_candidate_is_rejected() {
        let mut decision = MatchDecision::pending(vec![candidate("c1", MatchTier::Fuzzy, 0.93)]);
        assert_eq!(
            decision.accept("c9"),
            Err(DecisionError::UnknownCandidate("c9".to_string()))
        );
        assert!(decision.is_pending());
    }

    #[test]
    fn test_recommendation_can_be_overridden_once() {
        let mut decision =
            MatchDecision::recommend_update(vec![candidate("c1", MatchTier::Exact, 1.0)], "c1");
        assert!(!decision.is_final());

        decision.create_new().unwrap();
        assert_eq!(decision.state, DecisionState::CreateNew);
        assert_eq!(decision.selected, None);

        assert_eq!(
            decision.accept("c1"),
            Err(DecisionError::AlreadyResolved(DecisionState::CreateNew))
        );
    }

    #[test]
    fn test_tier_rank_orders_exact_first() {
        assert!(MatchTier::Exact.rank() < MatchTier::Fuzzy.rank());
        assert!(MatchTier::Fuzzy.rank() < MatchTier::Semantic.rank());
    }
}
