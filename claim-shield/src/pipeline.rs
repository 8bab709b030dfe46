use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
    config::EngineConfig,
    consistency::{ConsistencyReport, financial_anomalies},
    embedding::EmbeddingProvider,
    error::{FraudError, Result},
    index::SimilarityIndex,
    model::{ClaimEvidence, FraudAssessment, SimilarCase},
    narrative::{LinguisticAnalysis, analyze_narrative},
    report::{ReportRecord, round_probability},
    scoring::{ScoreAggregator, ScoreInputs, best_similarity},
};

/// Result of one claim evaluation: the assessment plus the side evidence
/// the report renderer needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimEvaluation {
    pub assessment: FraudAssessment,
    pub linguistic: LinguisticAnalysis,
    pub financial_anomalies: Vec<String>,
    pub record: ReportRecord,
}

/// Runs embed → retrieve → rule-evaluate → aggregate for a claim.
#[derive(Clone)]
pub struct ClaimEvaluator {
    index: Arc<dyn SimilarityIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    aggregator: ScoreAggregator,
    config: EngineConfig,
}

impl ClaimEvaluator {
    pub fn new(
        index: Arc<dyn SimilarityIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        aggregator: ScoreAggregator,
        config: EngineConfig,
    ) -> Result<Self> {
        if embedder.dimension() != index.dimension() {
            return Err(FraudError::InvalidDimension {
                expected: index.dimension(),
                actual: embedder.dimension(),
            });
        }
        Ok(Self {
            index,
            embedder,
            aggregator,
            config,
        })
    }

    pub fn index(&self) -> &Arc<dyn SimilarityIndex> {
        &self.index
    }

    /// Evaluates one claim. Only malformed evidence is an error; collaborator
    /// failures degrade to their documented fallbacks.
    #[instrument(skip_all, fields(detections = evidence.damage.len(), items = evidence.invoice.items.len()))]
    pub async fn evaluate(&self, evidence: &ClaimEvidence) -> Result<ClaimEvaluation> {
        evidence.validate()?;

        let linguistic = analyze_narrative(evidence.description.as_deref());
        let similar_cases = self.similar_cases(evidence.description.as_deref()).await;

        let consistency = ConsistencyReport::evaluate(
            &evidence.scene,
            &evidence.damage,
            &evidence.invoice.items,
        );
        let anomaly_score = consistency.anomaly_score();

        let inputs = ScoreInputs {
            estimated_force: evidence.scene.estimated_force,
            detection_count: evidence.damage.len(),
            physical_finding_count: consistency.physical.len(),
            invoice_finding_count: consistency.invoice.len(),
            anomaly_score,
            best_similarity: best_similarity(&similar_cases),
            narrative_score: linguistic.score,
        };
        let probability = self.aggregator.aggregate(&inputs, &evidence.signals).await;

        let assessment = FraudAssessment {
            probability,
            findings: consistency.into_findings(),
            anomaly_score,
            similarity_evidence: similar_cases,
        };
        let financial = financial_anomalies(&evidence.invoice.items);

        info!(
            probability,
            findings = assessment.findings.len(),
            anomaly_score,
            similar_cases = assessment.similarity_evidence.len(),
            strategy = self.aggregator.strategy_name(),
            "Claim evaluated"
        );

        let record = ReportRecord {
            fraud_probability: round_probability(probability),
            collision_geometry: evidence.scene.clone(),
            damaged_parts: evidence.damage.clone(),
            invoice_total: evidence.invoice.reported_total(),
            inconsistencies: assessment.findings.iter().map(|f| f.message.clone()).collect(),
            linguistic_anomalies: linguistic.indicators.clone(),
            financial_anomalies: financial.clone(),
            anomaly_score,
            similar_claims_detected: assessment.similarity_evidence.len(),
        };

        Ok(ClaimEvaluation {
            assessment,
            linguistic,
            financial_anomalies: financial,
            record,
        })
    }

    /// Nearest known fraud narratives, or nothing when the narrative is
    /// absent or any step of retrieval fails.
    async fn similar_cases(&self, description: Option<&str>) -> Vec<SimilarCase> {
        let Some(text) = description.map(str::trim).filter(|t| !t.is_empty()) else {
            return Vec::new();
        };

        let result = match self.embed(text).await {
            Ok(embedding) => self.index.query(&embedding, self.config.similar_case_limit),
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            warn!(error = %e, "Similar-case retrieval failed, continuing without evidence");
            Vec::new()
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let timeout = self.config.embedding_timeout;
        tokio::time::timeout(timeout, self.embedder.embed(text))
            .await
            .map_err(|_| FraudError::ExternalTimeout {
                operation: "embedding".to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })?
    }

    /// Embeds and appends a new case narrative to the index.
    pub async fn add_case(&self, text: &str) -> Result<usize> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FraudError::MalformedInput("case text is required".to_string()));
        }
        let embedding = self.embed(text).await?;
        self.index.insert(text.to_string(), embedding)?;
        let total = self.index.len();
        info!(total, "Added case to similarity index");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embedding::HashingEmbedder,
        index::ExactIndex,
        model::{DamageDetection, ExternalSignals, Invoice, InvoiceItem, SceneMetadata},
    };

    fn evaluator(dimension: usize) -> ClaimEvaluator {
        ClaimEvaluator::new(
            Arc::new(ExactIndex::new(dimension).unwrap()),
            Arc::new(HashingEmbedder::new(dimension)),
            ScoreAggregator::formula(),
            EngineConfig::default(),
        )
        .unwrap()
    }

    fn evidence(description: Option<&str>) -> ClaimEvidence {
        ClaimEvidence {
            scene: SceneMetadata {
                impact_direction: "Rear-End".to_string(),
                collision_type: "Rear-End Collision".to_string(),
                estimated_force: 0.4,
                description: String::new(),
            },
            damage: vec![DamageDetection::new("Front Bumper", 0.8)],
            invoice: Invoice::from_items(vec![
                InvoiceItem::part("Front Bumper Replacement", 1200.0),
                InvoiceItem::part("Engine Oil Pan", 150.0),
            ]),
            description: description.map(str::to_string),
            signals: ExternalSignals::default(),
        }
    }

    #[test]
    fn test_dimension_mismatch_at_construction() {
        let result = ClaimEvaluator::new(
            Arc::new(ExactIndex::new(8).unwrap()),
            Arc::new(HashingEmbedder::new(16)),
            ScoreAggregator::formula(),
            EngineConfig::default(),
        );
        assert!(matches!(
            result,
            Err(FraudError::InvalidDimension {
                expected: 8,
                actual: 16
            })
        ));
    }

    #[tokio::test]
    async fn test_empty_index_uses_similarity_floor() {
        let evaluation = evaluator(32)
            .evaluate(&evidence(Some(
                "I was waiting at the lights when another driver hit my car from behind",
            )))
            .await
            .unwrap();

        // One physical + one invoice finding, floor similarity 0.1.
        let expected = 2.0 * 0.15 + 0.1 * 0.3;
        assert!((evaluation.assessment.probability - expected).abs() < 1e-12);
        assert_eq!(evaluation.assessment.anomaly_score, 30.0);
        assert!(evaluation.assessment.similarity_evidence.is_empty());
        assert_eq!(evaluation.record.similar_claims_detected, 0);
    }

    #[tokio::test]
    async fn test_add_case_then_retrieve() {
        let evaluator = evaluator(64);
        assert_eq!(evaluator.add_case("Ghost parts billed by garage").await.unwrap(), 1);
        assert!(evaluator.add_case("   ").await.is_err());

        let evaluation = evaluator
            .evaluate(&evidence(Some("Ghost parts billed by garage")))
            .await
            .unwrap();
        assert_eq!(evaluation.assessment.similarity_evidence.len(), 1);
        assert_eq!(evaluation.assessment.similarity_evidence[0].similarity, 1.0);
    }

    #[tokio::test]
    async fn test_malformed_evidence_is_surfaced() {
        let mut claim = evidence(None);
        claim.invoice.items.push(InvoiceItem::labor("Paint", -20.0));
        assert!(matches!(
            evaluator(8).evaluate(&claim).await,
            Err(FraudError::MalformedInput(_))
        ));
    }
}
