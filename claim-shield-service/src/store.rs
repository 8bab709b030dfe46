use async_trait::async_trait;
use chrono::{DateTime, Utc};
use claim_shield::ClaimEvaluation;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A finished evaluation kept addressable by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAssessment {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub evaluation: ClaimEvaluation,
    pub report: String,
}

/// Trait for storing and retrieving finished assessments
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn save(&self, assessment: StoredAssessment) -> anyhow::Result<()>;
    async fn get(&self, id: &str) -> anyhow::Result<Option<StoredAssessment>>;
}

/// In-memory implementation of AssessmentStore
pub struct InMemoryAssessmentStore {
    assessments: Arc<DashMap<String, StoredAssessment>>,
}

impl InMemoryAssessmentStore {
    pub fn new() -> Self {
        Self {
            assessments: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryAssessmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssessmentStore for InMemoryAssessmentStore {
    async fn save(&self, assessment: StoredAssessment) -> anyhow::Result<()> {
        self.assessments.insert(assessment.id.clone(), assessment);
        Ok(())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<StoredAssessment>> {
        Ok(self.assessments.get(id).map(|entry| entry.clone()))
    }
}
