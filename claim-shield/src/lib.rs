pub mod config;
pub mod consistency;
pub mod embedding;
pub mod error;
pub mod index;
pub mod model;
pub mod narrative;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod seed;

// Re-export commonly used types
pub use config::EngineConfig;
pub use consistency::{ConsistencyReport, check_invoice_consistency, check_physical_consistency};
pub use embedding::{EmbeddingProvider, HashingEmbedder};
#[cfg(feature = "fastembed")]
pub use embedding::FastEmbedProvider;
pub use error::{FraudError, Result};
pub use index::{ExactIndex, SimilarityIndex};
pub use model::{
    BoundingBox, ClaimEvidence, ConsistencyFinding, DamageDetection, ExternalSignals,
    FindingKind, FraudAssessment, Invoice, InvoiceCategory, InvoiceItem, MetadataConsistency,
    SceneMetadata, SimilarCase,
};
pub use narrative::{LinguisticAnalysis, analyze_narrative};
pub use pipeline::{ClaimEvaluation, ClaimEvaluator};
#[cfg(feature = "rig")]
pub use report::LlmReportGenerator;
pub use report::{ReportGenerator, ReportRecord, TemplateReportGenerator};
pub use scoring::{
    Classifier, ClassifierScoring, FormulaScoring, LogisticClassifier, ScoreAggregator,
    ScoreInputs, ScoringStrategy,
};
pub use seed::{SEED_CASES, seed_index};
