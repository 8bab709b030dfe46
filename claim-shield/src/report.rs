use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{DamageDetection, SceneMetadata};

/// Flat evidence record handed to the report renderer unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    /// Rounded to two decimals.
    pub fraud_probability: f64,
    pub collision_geometry: SceneMetadata,
    pub damaged_parts: Vec<DamageDetection>,
    pub invoice_total: f64,
    pub inconsistencies: Vec<String>,
    pub linguistic_anomalies: Vec<String>,
    pub financial_anomalies: Vec<String>,
    pub anomaly_score: f64,
    pub similar_claims_detected: usize,
}

pub fn round_probability(probability: f64) -> f64 {
    (probability * 100.0).round() / 100.0
}

/// Renders a [`ReportRecord`] for investigators.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, record: &ReportRecord) -> Result<String>;
}

/// Plain listing of the evidence. Never fails, so it also serves as the
/// fallback when a richer generator errors out.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateReportGenerator;

impl TemplateReportGenerator {
    pub fn render(record: &ReportRecord) -> String {
        let mut out = format!(
            "Fraud probability: {:.2}\nAnomaly score: {:.1}\nSimilar fraud patterns: {}\n",
            record.fraud_probability, record.anomaly_score, record.similar_claims_detected
        );
        push_section(&mut out, "Inconsistencies", &record.inconsistencies);
        push_section(&mut out, "Linguistic anomalies", &record.linguistic_anomalies);
        push_section(&mut out, "Financial anomalies", &record.financial_anomalies);
        out
    }
}

fn push_section(out: &mut String, title: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    out.push('\n');
    out.push_str(title);
    out.push_str(":\n");
    for line in lines {
        out.push_str("- ");
        out.push_str(line);
        out.push('\n');
    }
}

#[async_trait]
impl ReportGenerator for TemplateReportGenerator {
    async fn generate(&self, record: &ReportRecord) -> Result<String> {
        Ok(Self::render(record))
    }
}

#[cfg(feature = "rig")]
pub use llm::LlmReportGenerator;

#[cfg(feature = "rig")]
mod llm {
    use async_trait::async_trait;
    use rig::{
        agent::Agent,
        client::CompletionClient,
        completion::Prompt,
        providers::openrouter,
    };
    use tracing::info;

    use super::{ReportGenerator, ReportRecord};
    use crate::error::{FraudError, Result};

    const REPORT_PREAMBLE: &str = "You are a specialized insurance fraud reasoning engine. Output as professional markdown.";

    const DEFAULT_REPORT_MODEL: &str = "openai/gpt-4o-mini";

    /// Investigation report written by an OpenRouter-hosted model.
    pub struct LlmReportGenerator {
        agent: Agent<openrouter::CompletionModel>,
    }

    impl LlmReportGenerator {
        pub fn new(api_key: &str, model: &str) -> Self {
            let client = openrouter::Client::new(api_key);
            let agent = client.agent(model).preamble(REPORT_PREAMBLE).build();
            Self { agent }
        }

        /// Reads `OPENROUTER_API_KEY`; returns `None` when it is not set.
        pub fn from_env() -> Option<Self> {
            let api_key = std::env::var("OPENROUTER_API_KEY").ok()?;
            Some(Self::new(&api_key, DEFAULT_REPORT_MODEL))
        }
    }

    #[async_trait]
    impl ReportGenerator for LlmReportGenerator {
        async fn generate(&self, record: &ReportRecord) -> Result<String> {
            let evidence = serde_json::to_string_pretty(record)?;
            let prompt = format!(
                "Write an investigation report for the insurance claim evidence below. \
                 Highlight mismatches between the visual damage and the repair invoice \
                 and justify the fraud probability.\n\nEVIDENCE DATA (JSON):\n{evidence}"
            );
            info!(
                fraud_probability = record.fraud_probability,
                "Requesting investigation report"
            );
            self.agent
                .prompt(&prompt)
                .await
                .map_err(|e| FraudError::Report(e.to_string()))
        }
    }
}
