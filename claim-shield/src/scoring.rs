//! Fraud-probability aggregation.
//!
//! A [`ScoreAggregator`] is built once with a [`ScoringStrategy`]: either the
//! learned classifier (falling back to the formula when it fails or times
//! out) or the formula alone. The forensic and risk-network bumps are applied
//! afterwards, identically for both strategies.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FraudError, Result};
use crate::model::{ExternalSignals, MetadataConsistency, SimilarCase};

/// Best similarity assumed when retrieval returned nothing.
pub const SIMILARITY_FLOOR: f64 = 0.1;

pub const FORMULA_FINDING_WEIGHT: f64 = 0.15;
pub const FORMULA_SIMILARITY_WEIGHT: f64 = 0.3;
pub const FORMULA_CAP: f64 = 0.95;

pub const METADATA_FAILURE_BUMP: f64 = 0.15;
pub const KNOWN_ASSOCIATES_BUMP: f64 = 0.10;
pub const PROBABILITY_CEILING: f64 = 0.99;

pub const FEATURE_COUNT: usize = 6;

/// Every upstream signal the aggregator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreInputs {
    pub estimated_force: f64,
    pub detection_count: usize,
    pub physical_finding_count: usize,
    pub invoice_finding_count: usize,
    pub anomaly_score: f64,
    pub best_similarity: f64,
    pub narrative_score: f64,
}

impl ScoreInputs {
    pub fn total_findings(&self) -> usize {
        self.physical_finding_count + self.invoice_finding_count
    }

    /// Classifier features, in the order the model was trained on.
    pub fn features(&self) -> [f64; FEATURE_COUNT] {
        [
            self.estimated_force,
            self.detection_count as f64,
            self.physical_finding_count as f64,
            self.invoice_finding_count as f64,
            self.anomaly_score,
            self.best_similarity,
        ]
    }
}

/// Highest finite similarity among the retrieved cases, or [`SIMILARITY_FLOOR`].
pub fn best_similarity(cases: &[SimilarCase]) -> f64 {
    cases
        .iter()
        .map(|c| c.similarity)
        .filter(|s| s.is_finite())
        .reduce(f64::max)
        .unwrap_or(SIMILARITY_FLOOR)
}

pub fn formula_probability(inputs: &ScoreInputs) -> f64 {
    let raw = inputs.total_findings() as f64 * FORMULA_FINDING_WEIGHT
        + inputs.best_similarity * FORMULA_SIMILARITY_WEIGHT
        + inputs.narrative_score;
    raw.min(FORMULA_CAP)
}

/// Adds the corroborating-signal bumps, then clamps once to `[0, 0.99]`.
pub fn apply_external_signals(base: f64, signals: &ExternalSignals) -> f64 {
    let mut probability = base;
    if signals.metadata_consistency == MetadataConsistency::Fail {
        probability += METADATA_FAILURE_BUMP;
    }
    if signals.known_associates {
        probability += KNOWN_ASSOCIATES_BUMP;
    }
    if probability.is_nan() {
        return 0.0;
    }
    probability.clamp(0.0, PROBABILITY_CEILING)
}

/// A trained model returning the positive-class probability.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn predict_proba(&self, features: &[f64; FEATURE_COUNT]) -> Result<f64>;
}

/// Logistic regression exported as JSON: `{"weights": [..6], "bias": b}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticClassifier {
    pub weights: [f64; FEATURE_COUNT],
    pub bias: f64,
}

impl LogisticClassifier {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let model = Self::from_json(&json)?;
        info!(path = %path.as_ref().display(), "Loaded fraud classifier");
        Ok(model)
    }

    pub fn probability(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let z = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        1.0 / (1.0 + (-z).exp())
    }
}

#[async_trait]
impl Classifier for LogisticClassifier {
    async fn predict_proba(&self, features: &[f64; FEATURE_COUNT]) -> Result<f64> {
        Ok(self.probability(features))
    }
}

/// Produces the base probability before external-signal adjustment.
#[async_trait]
pub trait ScoringStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn base_probability(&self, inputs: &ScoreInputs) -> f64;
}

/// Deterministic weighted formula, used whenever no classifier is held.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormulaScoring;

#[async_trait]
impl ScoringStrategy for FormulaScoring {
    fn name(&self) -> &str {
        "formula"
    }

    async fn base_probability(&self, inputs: &ScoreInputs) -> f64 {
        formula_probability(inputs)
    }
}

/// Classifier inference bounded by a timeout, with the formula as fallback.
pub struct ClassifierScoring {
    classifier: Arc<dyn Classifier>,
    timeout: Duration,
}

impl ClassifierScoring {
    pub fn new(classifier: Arc<dyn Classifier>, timeout: Duration) -> Self {
        Self {
            classifier,
            timeout,
        }
    }

    async fn predict(&self, inputs: &ScoreInputs) -> Result<f64> {
        let features = inputs.features();
        let probability = tokio::time::timeout(self.timeout, self.classifier.predict_proba(&features))
            .await
            .map_err(|_| FraudError::ExternalTimeout {
                operation: "classifier".to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            })??;

        if !probability.is_finite() {
            return Err(FraudError::Classifier(format!(
                "non-finite probability {probability}"
            )));
        }
        Ok(probability)
    }
}

#[async_trait]
impl ScoringStrategy for ClassifierScoring {
    fn name(&self) -> &str {
        "classifier"
    }

    async fn base_probability(&self, inputs: &ScoreInputs) -> f64 {
        match self.predict(inputs).await {
            Ok(probability) => probability,
            Err(e) => {
                warn!(error = %e, "Classifier unavailable, using fallback formula");
                formula_probability(inputs)
            }
        }
    }
}

/// Combines all upstream signals into one bounded probability.
#[derive(Clone)]
pub struct ScoreAggregator {
    strategy: Arc<dyn ScoringStrategy>,
}

impl ScoreAggregator {
    pub fn new(strategy: Arc<dyn ScoringStrategy>) -> Self {
        Self { strategy }
    }

    /// Chooses the strategy once, from whether a classifier is present.
    pub fn from_classifier(classifier: Option<Arc<dyn Classifier>>, timeout: Duration) -> Self {
        let strategy: Arc<dyn ScoringStrategy> = match classifier {
            Some(classifier) => Arc::new(ClassifierScoring::new(classifier, timeout)),
            None => Arc::new(FormulaScoring),
        };
        Self::new(strategy)
    }

    pub fn formula() -> Self {
        Self::new(Arc::new(FormulaScoring))
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub async fn aggregate(&self, inputs: &ScoreInputs, signals: &ExternalSignals) -> f64 {
        let base = self.strategy.base_probability(inputs).await;
        apply_external_signals(base, signals)
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::formula()
    }
}
