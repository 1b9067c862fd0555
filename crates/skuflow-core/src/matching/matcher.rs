//! Tiered matching of extracted records against the catalog.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::catalog::Catalog;
use super::review::ReviewBatch;
use super::semantic::SemanticMatcher;
use super::similarity::{party_similarity, record_similarity};
use crate::models::config::MatchingConfig;
use crate::models::matching::{CatalogEntry, MatchCandidate, MatchDecision, MatchTier};
use crate::models::record::{ExtractedRecord, ExtractionResult};

/// Runs the exact, fuzzy and semantic tiers for each record.
pub struct TieredMatcher<C: Catalog> {
    catalog: C,
    semantic: Option<Arc<dyn SemanticMatcher>>,
    config: MatchingConfig,
}

impl<C: Catalog> TieredMatcher<C> {
    pub fn new(catalog: C, config: MatchingConfig) -> Self {
        Self {
            catalog,
            semantic: None,
            config,
        }
    }

    /// Enable the semantic tier.
    pub fn with_semantic(mut self, semantic: Arc<dyn SemanticMatcher>) -> Self {
        self.semantic = Some(semantic);
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Candidates and recommended decision for one record.
    pub async fn evaluate(&self, record: &ExtractedRecord) -> MatchDecision {
        self.run(record, None).await
    }

    /// As [`evaluate`](Self::evaluate), with a time budget for the semantic
    /// tier. An exhausted budget skips the tier.
    pub async fn evaluate_with_deadline(&self, record: &ExtractedRecord, budget: Duration) -> MatchDecision {
        self.run(record, Some(Instant::now() + budget)).await
    }

    /// Evaluate records concurrently; decisions follow record order.
    pub async fn evaluate_all(&self, records: &[ExtractedRecord]) -> Vec<MatchDecision> {
        join_all(records.iter().map(|record| self.evaluate(record))).await
    }

    /// Match every record of an extraction result into a review batch.
    pub async fn review(&self, result: ExtractionResult) -> ReviewBatch {
        let decisions = self.evaluate_all(&result.records).await;
        ReviewBatch::new(result.records, decisions)
    }

    async fn run(&self, record: &ExtractedRecord, deadline: Option<Instant>) -> MatchDecision {
        let exact = self.exact_tier(record);
        let (mut candidates, mut borderline) = self.fuzzy_tier(record);
        if let Some((hit, _)) = &exact {
            borderline.retain(|(entry, _)| entry.id != hit.id);
        }

        if let Some(semantic) = &self.semantic {
            if !borderline.is_empty() {
                candidates.extend(self.semantic_tier(semantic.as_ref(), record, borderline, deadline).await);
            }
        }

        if let Some((entry, _)) = &exact {
            candidates.push(MatchCandidate {
                candidate_id: entry.id.clone(),
                tier: MatchTier::Exact,
                confidence: 1.0,
                justification: "manufacturer and part number match".to_string(),
            });
        }

        let candidates = rank(candidates);
        debug!("'{}': {} candidates", record.name, candidates.len());

        match exact {
            Some((entry, supplier)) => {
                if self.supplier_diverges(record, supplier.as_deref()) {
                    info!(
                        "'{}' matches {} exactly but the supplier differs; recommending a new entry",
                        record.name, entry.id
                    );
                    MatchDecision::recommend_new(candidates)
                } else {
                    MatchDecision::recommend_update(candidates, entry.id)
                }
            }
            None if !candidates.is_empty() => MatchDecision::pending(candidates),
            None => MatchDecision::recommend_new(Vec::new()),
        }
    }

    fn exact_tier(&self, record: &ExtractedRecord) -> Option<(CatalogEntry, Option<String>)> {
        let manufacturer = record.manufacturer.as_deref().filter(|s| !s.trim().is_empty())?;
        let part_number = record.part_number.as_deref().filter(|s| !s.trim().is_empty())?;
        let entry = self.catalog.lookup_exact(manufacturer, part_number)?;
        let supplier = self.catalog.supplier(&entry);
        Some((entry, supplier))
    }

    /// Confident fuzzy candidates, plus borderline entries with their scores.
    fn fuzzy_tier(&self, record: &ExtractedRecord) -> (Vec<MatchCandidate>, Vec<(CatalogEntry, f64)>) {
        let mut confident = Vec::new();
        let mut borderline = Vec::new();

        for entry in self.catalog.candidates() {
            let score = record_similarity(record, &entry);
            if score >= self.config.fuzzy_high {
                confident.push(MatchCandidate {
                    candidate_id: entry.id.clone(),
                    tier: MatchTier::Fuzzy,
                    confidence: score,
                    justification: format!("fuzzy similarity {:.2}", score),
                });
            } else if score >= self.config.fuzzy_borderline {
                borderline.push((entry, score));
            }
        }

        borderline.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
        (confident, borderline)
    }

    /// Ask the semantic collaborator about the best borderline entries.
    ///
    /// Any error or timeout discards the whole tier.
    async fn semantic_tier(
        &self,
        semantic: &dyn SemanticMatcher,
        record: &ExtractedRecord,
        borderline: Vec<(CatalogEntry, f64)>,
        deadline: Option<Instant>,
    ) -> Vec<MatchCandidate> {
        let mut accepted = Vec::new();

        for (entry, fuzzy) in borderline.into_iter().take(self.config.max_semantic_calls) {
            let mut limit = self.config.semantic_timeout();
            if let Some(deadline) = deadline {
                limit = limit.min(deadline.saturating_duration_since(Instant::now()));
            }
            if limit.is_zero() {
                warn!("Semantic tier skipped for '{}': no time left", record.name);
                return Vec::new();
            }

            let confidence = match tokio::time::timeout(limit, semantic.evaluate(record, &entry)).await {
                Ok(Ok(confidence)) if confidence.is_finite() => confidence.clamp(0.0, 1.0),
                Ok(Ok(confidence)) => {
                    warn!("Semantic tier skipped for '{}': invalid confidence {}", record.name, confidence);
                    return Vec::new();
                }
                Ok(Err(e)) => {
                    warn!("Semantic tier skipped for '{}': {}", record.name, e);
                    return Vec::new();
                }
                Err(_) => {
                    warn!("Semantic tier skipped for '{}': timed out after {:?}", record.name, limit);
                    return Vec::new();
                }
            };

            debug!("Semantic {} vs {}: {:.2}", record.name, entry.id, confidence);
            if confidence >= self.config.semantic_threshold {
                accepted.push(MatchCandidate {
                    candidate_id: entry.id,
                    tier: MatchTier::Semantic,
                    confidence,
                    justification: format!("semantic equivalence {:.2} (fuzzy {:.2})", confidence, fuzzy),
                });
            }
        }

        accepted
    }

    fn supplier_diverges(&self, record: &ExtractedRecord, catalog_supplier: Option<&str>) -> bool {
        let extracted = record.supplier.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let recorded = catalog_supplier.map(str::trim).filter(|s| !s.is_empty());
        match (extracted, recorded) {
            (Some(a), Some(b)) => party_similarity(a, b) < self.config.supplier_divergence,
            _ => false,
        }
    }
}

/// One candidate per catalog entry (strongest tier wins), highest
/// confidence first.
fn rank(candidates: Vec<MatchCandidate>) -> Vec<MatchCandidate> {
    let mut best: HashMap<String, MatchCandidate> = HashMap::new();
    for candidate in candidates {
        match best.get(&candidate.candidate_id) {
            Some(kept) if kept.tier.rank() <= candidate.tier.rank() => {}
            _ => {
                best.insert(candidate.candidate_id.clone(), candidate);
            }
        }
    }

    let mut ranked: Vec<MatchCandidate> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.tier.rank().cmp(&b.tier.rank()))
            .then_with(|| a.candidate_id.cmp(&b.candidate_id))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SemanticError;
    use crate::matching::InMemoryCatalog;
    use crate::models::matching::DecisionState;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entry(id: &str, name: &str, manufacturer: &str, part_number: &str, supplier: &str) -> CatalogEntry {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        CatalogEntry {
            id: id.to_string(),
            name: name.to_string(),
            manufacturer: opt(manufacturer),
            part_number: opt(part_number),
            supplier: opt(supplier),
            category: None,
        }
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new(vec![
            entry("plc-1", "S7-1500 CPU 1512C-1 PN", "Siemens", "6ES7512-1DK01-0AB0", "Rexel"),
            entry("relay-1", "Relay 24V DC 2CO", "Finder", "40.52.9.024.0000", "Conrad"),
            entry("valve-1", "Solenoid valve 5/2", "Festo", "", ""),
        ])
    }

    fn record(name: &str, manufacturer: &str, part_number: &str, supplier: &str) -> ExtractedRecord {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        let mut record = ExtractedRecord::new(name);
        record.manufacturer = opt(manufacturer);
        record.part_number = opt(part_number);
        record.supplier = opt(supplier);
        record
    }

    /// Semantic double answering from a table; counts calls.
    struct TableSemantic {
        answers: HashMap<String, f64>,
        calls: AtomicUsize,
    }

    impl TableSemantic {
        fn new(answers: &[(&str, f64)]) -> Arc<Self> {
            Arc::new(Self {
                answers: answers.iter().map(|(id, c)| (id.to_string(), *c)).collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SemanticMatcher for TableSemantic {
        async fn evaluate(&self, _extracted: &ExtractedRecord, candidate: &CatalogEntry) -> Result<f64, SemanticError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answers.get(&candidate.id).copied().unwrap_or(0.0))
        }
    }

    struct FailingSemantic;

    #[async_trait]
    impl SemanticMatcher for FailingSemantic {
        async fn evaluate(&self, _extracted: &ExtractedRecord, _candidate: &CatalogEntry) -> Result<f64, SemanticError> {
            Err(SemanticError::Communication("connection refused".to_string()))
        }
    }

    struct SlowSemantic;

    #[async_trait]
    impl SemanticMatcher for SlowSemantic {
        async fn evaluate(&self, _extracted: &ExtractedRecord, _candidate: &CatalogEntry) -> Result<f64, SemanticError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(1.0)
        }
    }

    fn matcher() -> TieredMatcher<InMemoryCatalog> {
        TieredMatcher::new(catalog(), MatchingConfig::default())
    }

    #[tokio::test]
    async fn test_exact_match_recommends_update() {
        let decision = matcher()
            .evaluate(&record("CPU", "siemens", " 6es7512-1dk01-0ab0 ", ""))
            .await;

        assert_eq!(decision.state, DecisionState::AcceptUpdate);
        assert_eq!(decision.selected.as_deref(), Some("plc-1"));
        assert!(!decision.is_final());

        let best = decision.best().unwrap();
        assert_eq!(best.tier, MatchTier::Exact);
        assert_eq!(best.confidence, 1.0);
        assert_eq!(decision.candidates.iter().filter(|c| c.candidate_id == "plc-1").count(), 1);
    }

    #[tokio::test]
    async fn test_supplier_divergence_recommends_new() {
        let decision = matcher()
            .evaluate(&record("CPU", "Siemens", "6ES7512-1DK01-0AB0", "Würth Elektronik"))
            .await;

        assert_eq!(decision.state, DecisionState::CreateNew);
        assert_eq!(decision.selected, None);
        assert_eq!(decision.best().unwrap().tier, MatchTier::Exact);
    }

    #[tokio::test]
    async fn test_similar_supplier_keeps_update() {
        let decision = matcher()
            .evaluate(&record("CPU", "Siemens", "6ES7512-1DK01-0AB0", "Rexel GmbH"))
            .await;
        assert_eq!(decision.state, DecisionState::AcceptUpdate);
    }

    #[tokio::test]
    async fn test_caller_can_override_exact_recommendation() {
        let mut decision = matcher()
            .evaluate(&record("CPU", "Siemens", "6ES7512-1DK01-0AB0", ""))
            .await;
        decision.create_new().unwrap();
        assert_eq!(decision.state, DecisionState::CreateNew);
        assert!(decision.is_final());
    }

    #[tokio::test]
    async fn test_fuzzy_match_is_pending() {
        // Same part number with a typo, no manufacturer
        let decision = matcher()
            .evaluate(&record("S7-1500 CPU 1512C-1 PN", "", "6ES7512-1DK01-0AB1", ""))
            .await;

        assert_eq!(decision.state, DecisionState::Pending);
        let best = decision.best().unwrap();
        assert_eq!(best.candidate_id, "plc-1");
        assert_eq!(best.tier, MatchTier::Fuzzy);
        assert!(best.confidence >= 0.9);
    }

    #[tokio::test]
    async fn test_no_candidates_recommends_new() {
        let decision = matcher().evaluate(&record("Cable tie 200mm", "Hellermann", "T50R", "")).await;
        assert_eq!(decision.state, DecisionState::CreateNew);
        assert!(decision.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_semantic_tier_accepts_borderline() {
        let semantic = TableSemantic::new(&[("valve-1", 0.92)]);
        let matcher = matcher().with_semantic(semantic.clone());

        // "solenoid valve 5 2" vs "solenoid valve 52": borderline by name only
        let decision = matcher.evaluate(&record("Solenoid valve 52", "", "", "")).await;

        assert_eq!(semantic.calls.load(Ordering::SeqCst), 1);
        assert_eq!(decision.state, DecisionState::Pending);
        let best = decision.best().unwrap();
        assert_eq!(best.candidate_id, "valve-1");
        assert_eq!(best.tier, MatchTier::Semantic);
        assert_eq!(best.confidence, 0.92);
    }

    #[tokio::test]
    async fn test_semantic_below_threshold_is_dropped() {
        let semantic = TableSemantic::new(&[("valve-1", 0.6)]);
        let matcher = matcher().with_semantic(semantic);
        let decision = matcher.evaluate(&record("Solenoid valve 52", "", "", "")).await;

        assert_eq!(decision.state, DecisionState::CreateNew);
        assert!(decision.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_semantic_failure_skips_tier() {
        let matcher = matcher().with_semantic(Arc::new(FailingSemantic));
        let decision = matcher
            .evaluate(&record("CPU", "Siemens", "6ES7512-1DK01-0AB0", ""))
            .await;
        assert_eq!(decision.state, DecisionState::AcceptUpdate);

        let decision = matcher.evaluate(&record("Solenoid valve 52", "", "", "")).await;
        assert_eq!(decision.state, DecisionState::CreateNew);
    }

    #[tokio::test(start_paused = true)]
    async fn test_semantic_timeout_skips_tier() {
        let matcher = matcher().with_semantic(Arc::new(SlowSemantic));
        let decision = matcher
            .evaluate_with_deadline(&record("Solenoid valve 52", "", "", ""), Duration::from_secs(1))
            .await;
        assert_eq!(decision.state, DecisionState::CreateNew);
        assert!(decision.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_semantic_not_called_without_borderline() {
        let semantic = TableSemantic::new(&[]);
        let matcher = matcher().with_semantic(semantic.clone());
        matcher.evaluate(&record("Cable tie 200mm", "", "", "")).await;
        assert_eq!(semantic.calls.load(Ordering::SeqCst), 0);
    }

    fn sensor_catalog() -> InMemoryCatalog {
        // fuzzy scores against "Inductive sensor M12": 0.83, 0.79, 0.76, 0.75
        InMemoryCatalog::new(vec![
            entry("sens-a", "Inductive sensor M12 NPN", "", "", ""),
            entry("sens-b", "Inductive sensor M18 PNP", "", "", ""),
            entry("sens-c", "Capacitive sensor M12", "", "", ""),
            entry("sens-d", "Inductive switch M12", "", "", ""),
        ])
    }

    #[tokio::test]
    async fn test_semantic_candidates_ranked_by_confidence() {
        let semantic = TableSemantic::new(&[("sens-a", 0.88), ("sens-b", 0.95), ("sens-c", 0.9), ("sens-d", 0.86)]);
        let matcher = TieredMatcher::new(sensor_catalog(), MatchingConfig::default()).with_semantic(semantic.clone());

        let decision = matcher.evaluate(&record("Inductive sensor M12", "", "", "")).await;

        assert_eq!(semantic.calls.load(Ordering::SeqCst), 4);
        assert_eq!(decision.state, DecisionState::Pending);
        let ranked: Vec<(&str, MatchTier, f64)> = decision
            .candidates
            .iter()
            .map(|c| (c.candidate_id.as_str(), c.tier, c.confidence))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("sens-b", MatchTier::Semantic, 0.95),
                ("sens-c", MatchTier::Semantic, 0.9),
                ("sens-a", MatchTier::Semantic, 0.88),
                ("sens-d", MatchTier::Semantic, 0.86),
            ]
        );
    }

    #[tokio::test]
    async fn test_semantic_calls_capped_best_fuzzy_first() {
        let semantic = TableSemantic::new(&[("sens-a", 0.86), ("sens-b", 0.9), ("sens-c", 0.99), ("sens-d", 0.99)]);
        let config = MatchingConfig {
            max_semantic_calls: 2,
            ..MatchingConfig::default()
        };
        let matcher = TieredMatcher::new(sensor_catalog(), config).with_semantic(semantic.clone());

        let decision = matcher.evaluate(&record("Inductive sensor M12", "", "", "")).await;

        assert_eq!(semantic.calls.load(Ordering::SeqCst), 2);
        let ids: Vec<&str> = decision.candidates.iter().map(|c| c.candidate_id.as_str()).collect();
        assert_eq!(ids, vec!["sens-b", "sens-a"]);
    }

    #[tokio::test]
    async fn test_exact_hit_not_sent_to_semantic_tier() {
        // "CPU" against plc-1 is only borderline by fuzzy score
        let semantic = TableSemantic::new(&[("plc-1", 0.99)]);
        let matcher = matcher().with_semantic(semantic.clone());

        let decision = matcher
            .evaluate(&record("CPU", "Siemens", "6ES7512-1DK01-0AB0", ""))
            .await;

        assert_eq!(semantic.calls.load(Ordering::SeqCst), 0);
        assert_eq!(decision.state, DecisionState::AcceptUpdate);
        assert_eq!(decision.candidates.len(), 1);
        assert_eq!(decision.best().unwrap().tier, MatchTier::Exact);
    }

    #[tokio::test]
    async fn test_evaluate_all_keeps_order() {
        let records = vec![
            record("Cable tie", "", "", ""),
            record("CPU", "Siemens", "6ES7512-1DK01-0AB0", ""),
        ];
        let decisions = matcher().evaluate_all(&records).await;
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].state, DecisionState::CreateNew);
        assert_eq!(decisions[1].state, DecisionState::AcceptUpdate);
    }

    #[test]
    fn test_rank_dedupes_and_orders() {
        let candidate = |id: &str, tier, confidence| MatchCandidate {
            candidate_id: id.to_string(),
            tier,
            confidence,
            justification: String::new(),
        };
        let ranked = rank(vec![
            candidate("b", MatchTier::Fuzzy, 0.95),
            candidate("a", MatchTier::Fuzzy, 0.97),
            candidate("b", MatchTier::Exact, 1.0),
            candidate("c", MatchTier::Semantic, 0.95),
        ]);

        let ids: Vec<(&str, MatchTier)> = ranked.iter().map(|c| (c.candidate_id.as_str(), c.tier)).collect();
        assert_eq!(
            ids,
            vec![("b", MatchTier::Exact), ("a", MatchTier::Fuzzy), ("c", MatchTier::Semantic)]
        );
    }
}
