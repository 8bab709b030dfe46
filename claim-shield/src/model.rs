use serde::{Deserialize, Serialize};

use crate::error::{FraudError, Result};

/// Collision geometry estimated by the vision collaborator from the scene photo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneMetadata {
    pub impact_direction: String,
    pub collision_type: String,
    /// Normalized collision force in `[0, 1]`.
    pub estimated_force: f64,
    #[serde(default, alias = "scene_description")]
    pub description: String,
}

/// Pixel-space box around a detected part: `(x0, y0, x1, y1)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct BoundingBox(pub f64, pub f64, pub f64, pub f64);

/// One damaged part found in the damage photo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DamageDetection {
    pub part: String,
    pub severity: f64,
    #[serde(default, alias = "bbox")]
    pub bounding_box: BoundingBox,
}

impl DamageDetection {
    pub fn new(part: impl Into<String>, severity: f64) -> Self {
        Self {
            part: part.into(),
            severity,
            bounding_box: BoundingBox::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvoiceCategory {
    Part,
    Labor,
}

/// A billed line extracted from the repair invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceItem {
    pub description: String,
    pub cost: f64,
    #[serde(alias = "type")]
    pub category: InvoiceCategory,
}

impl InvoiceItem {
    pub fn part(description: impl Into<String>, cost: f64) -> Self {
        Self {
            description: description.into(),
            cost,
            category: InvoiceCategory::Part,
        }
    }

    pub fn labor(description: impl Into<String>, cost: f64) -> Self {
        Self {
            description: description.into(),
            cost,
            category: InvoiceCategory::Labor,
        }
    }
}

/// Invoice as delivered by the OCR collaborator.
///
/// `total_cost` is whatever the document printed; it is carried along for
/// reporting and never checked against the items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Invoice {
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
    #[serde(default)]
    pub total_cost: Option<f64>,
}

impl Invoice {
    pub fn from_items(items: Vec<InvoiceItem>) -> Self {
        Self {
            invoice_number: None,
            items,
            total_cost: None,
        }
    }

    /// The printed total if present, otherwise the sum of the items.
    pub fn reported_total(&self) -> f64 {
        self.total_cost
            .unwrap_or_else(|| self.items.iter().map(|item| item.cost).sum())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    PhysicalMismatch,
    InvoiceMismatch,
}

/// A single inconsistency emitted by a rule evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsistencyFinding {
    pub message: String,
    pub kind: FindingKind,
}

impl ConsistencyFinding {
    pub fn physical(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: FindingKind::PhysicalMismatch,
        }
    }

    pub fn invoice(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: FindingKind::InvoiceMismatch,
        }
    }
}

/// A stored narrative returned by a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarCase {
    pub case_text: String,
    /// `1 / (1 + distance)`, in `(0, 1]`.
    pub similarity: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MetadataConsistency {
    Pass,
    Fail,
    #[default]
    Unknown,
}

/// Opaque flags from the photo-forensics and risk-network collaborators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ExternalSignals {
    #[serde(default)]
    pub metadata_consistency: MetadataConsistency,
    #[serde(default)]
    pub known_associates: bool,
}

/// Everything the collaborators hand over for one claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaimEvidence {
    pub scene: SceneMetadata,
    #[serde(default)]
    pub damage: Vec<DamageDetection>,
    #[serde(default)]
    pub invoice: Invoice,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub signals: ExternalSignals,
}

impl ClaimEvidence {
    /// Rejects evidence that breaks the collaborator contracts instead of
    /// coercing it into range.
    pub fn validate(&self) -> Result<()> {
        check_unit_interval("scene.estimated_force", self.scene.estimated_force)?;

        for (i, detection) in self.damage.iter().enumerate() {
            check_unit_interval(&format!("damage[{i}].severity"), detection.severity)?;
        }

        for (i, item) in self.invoice.items.iter().enumerate() {
            if !item.cost.is_finite() || item.cost < 0.0 {
                return Err(FraudError::MalformedInput(format!(
                    "invoice.items[{i}].cost must be a non-negative number, got {}",
                    item.cost
                )));
            }
            if item.description.trim().is_empty() {
                return Err(FraudError::MalformedInput(format!(
                    "invoice.items[{i}].description is required"
                )));
            }
        }

        Ok(())
    }
}

fn check_unit_interval(field: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(FraudError::MalformedInput(format!(
            "{field} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

/// Final artifact of one claim evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FraudAssessment {
    pub probability: f64,
    pub findings: Vec<ConsistencyFinding>,
    pub anomaly_score: f64,
    pub similarity_evidence: Vec<SimilarCase>,
}
