use claim_shield::{
    ClaimEvidence, DamageDetection, ExternalSignals, InvoiceItem, LinguisticAnalysis,
    SimilarCase, report::round_probability,
};
use serde::{Deserialize, Serialize};

use crate::store::StoredAssessment;

/// Body of `POST /analyze_claim`: the collaborator outputs for one claim.
pub type AnalyzeClaimRequest = ClaimEvidence;

#[derive(Debug, Serialize, Deserialize)]
pub struct AddCaseRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddCaseResponse {
    pub total_cases: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeClaimResponse {
    pub assessment_id: String,
    pub fraud_score: f64,
    pub anomaly_score: f64,
    pub inconsistencies: Vec<String>,
    pub linguistic_analysis: LinguisticAnalysis,
    pub financial_anomalies: Vec<String>,
    pub signals: ExternalSignals,
    pub damage_analysis: Vec<DamageDetection>,
    pub invoice_table: Vec<InvoiceItem>,
    pub similar_cases: Vec<SimilarCase>,
    pub report: String,
}

impl AnalyzeClaimResponse {
    pub fn from_stored(stored: &StoredAssessment, evidence: &ClaimEvidence) -> Self {
        let evaluation = &stored.evaluation;
        Self {
            assessment_id: stored.id.clone(),
            fraud_score: evaluation.record.fraud_probability,
            anomaly_score: evaluation.assessment.anomaly_score,
            inconsistencies: evaluation.record.inconsistencies.clone(),
            linguistic_analysis: LinguisticAnalysis {
                score: round_probability(evaluation.linguistic.score),
                indicators: evaluation.linguistic.indicators.clone(),
            },
            financial_anomalies: evaluation.financial_anomalies.clone(),
            signals: evidence.signals,
            damage_analysis: evidence.damage.clone(),
            invoice_table: evidence.invoice.items.clone(),
            similar_cases: evaluation.assessment.similarity_evidence.clone(),
            report: stored.report.clone(),
        }
    }
}
