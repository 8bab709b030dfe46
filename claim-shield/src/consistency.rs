//! Deterministic rule evaluators comparing the scene, the detected damage and
//! the invoice.
//!
//! Each rule family returns its findings in evaluation order and never fails:
//! missing or empty inputs simply produce no findings.

use tracing::debug;

use crate::model::{
    ConsistencyFinding, DamageDetection, InvoiceCategory, InvoiceItem, SceneMetadata,
};

/// Scene force below which a large damage footprint is implausible.
pub const LOW_FORCE_THRESHOLD: f64 = 0.2;

/// Detection count above which a low-force collision is flagged.
pub const MAX_LOW_FORCE_DETECTIONS: usize = 5;

/// Parts that can legitimately be damaged without showing in photos.
pub const INTERNAL_PART_KEYWORDS: [&str; 3] = ["pan", "radiator", "engine"];

pub const REAR_IMPACT_KEYWORD: &str = "rear";
pub const FRONT_PART_KEYWORDS: [&str; 2] = ["front", "hood"];
pub const REAR_PART_KEYWORDS: [&str; 2] = ["rear", "trunk"];

/// Line items costing more than this are listed as financial anomalies.
pub const HIGH_COST_THRESHOLD: f64 = 5_000.0;

/// Weight applied per finding when computing the anomaly score.
pub const ANOMALY_WEIGHT_PER_FINDING: f64 = 15.0;

pub const DIRECTIONAL_MISMATCH_MESSAGE: &str =
    "Front damage detected but scene indicates rear impact.";
pub const FORCE_SEVERITY_MISMATCH_MESSAGE: &str =
    "Visual damage severity exceeds estimated collision force.";

fn any_part_matches(detections: &[DamageDetection], keywords: &[&str]) -> bool {
    detections.iter().any(|d| {
        let part = d.part.to_lowercase();
        keywords.iter().any(|k| part.contains(k))
    })
}

/// Compares the collision geometry with where and how much damage was seen.
pub fn check_physical_consistency(
    scene: &SceneMetadata,
    detections: &[DamageDetection],
) -> Vec<ConsistencyFinding> {
    let mut findings = Vec::new();

    let rear_impact = scene
        .impact_direction
        .to_lowercase()
        .contains(REAR_IMPACT_KEYWORD);
    let front_damage = any_part_matches(detections, &FRONT_PART_KEYWORDS);
    let rear_damage = any_part_matches(detections, &REAR_PART_KEYWORDS);

    if rear_impact && front_damage && !rear_damage {
        findings.push(ConsistencyFinding::physical(DIRECTIONAL_MISMATCH_MESSAGE));
    }

    if scene.estimated_force < LOW_FORCE_THRESHOLD && detections.len() > MAX_LOW_FORCE_DETECTIONS {
        findings.push(ConsistencyFinding::physical(FORCE_SEVERITY_MISMATCH_MESSAGE));
    }

    debug!(count = findings.len(), "Physical consistency evaluated");
    findings
}

/// Compares billed parts with the parts seen in the damage photos.
///
/// Matching is plain case-insensitive substring containment of a detected
/// part name inside the item description. Labor lines are never flagged.
pub fn check_invoice_consistency(
    detections: &[DamageDetection],
    items: &[InvoiceItem],
) -> Vec<ConsistencyFinding> {
    let visual_parts: Vec<String> = detections.iter().map(|d| d.part.to_lowercase()).collect();

    let findings: Vec<ConsistencyFinding> = items
        .iter()
        .filter(|item| item.category == InvoiceCategory::Part)
        .filter_map(|item| {
            let billed = item.description.to_lowercase();
            if visual_parts.iter().any(|part| billed.contains(part.as_str())) {
                return None;
            }

            let internal = INTERNAL_PART_KEYWORDS.iter().any(|k| billed.contains(k));
            let message = if internal {
                format!(
                    "Billed internal part '{}' has no corresponding external impact indicators.",
                    item.description
                )
            } else {
                format!(
                    "Billed part '{}' was not detected in damage photos.",
                    item.description
                )
            };
            Some(ConsistencyFinding::invoice(message))
        })
        .collect();

    debug!(count = findings.len(), "Invoice consistency evaluated");
    findings
}

/// Informational cost outliers. These are reported alongside the findings
/// but are not findings themselves and do not move the score.
pub fn financial_anomalies(items: &[InvoiceItem]) -> Vec<String> {
    items
        .iter()
        .filter(|item| item.cost > HIGH_COST_THRESHOLD)
        .map(|item| format!("High cost for {}", item.description))
        .collect()
}

pub fn anomaly_score(total_findings: usize) -> f64 {
    total_findings as f64 * ANOMALY_WEIGHT_PER_FINDING
}

/// Physical and invoice findings for one claim, kept separate because the
/// classifier consumes their counts individually.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyReport {
    pub physical: Vec<ConsistencyFinding>,
    pub invoice: Vec<ConsistencyFinding>,
}

impl ConsistencyReport {
    pub fn evaluate(
        scene: &SceneMetadata,
        detections: &[DamageDetection],
        items: &[InvoiceItem],
    ) -> Self {
        Self {
            physical: check_physical_consistency(scene, detections),
            invoice: check_invoice_consistency(detections, items),
        }
    }

    pub fn total(&self) -> usize {
        self.physical.len() + self.invoice.len()
    }

    pub fn anomaly_score(&self) -> f64 {
        anomaly_score(self.total())
    }

    /// Physical findings first, then invoice findings.
    pub fn into_findings(self) -> Vec<ConsistencyFinding> {
        let mut all = self.physical;
        all.extend(self.invoice);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FindingKind;

    fn scene(direction: &str, force: f64) -> SceneMetadata {
        SceneMetadata {
            impact_direction: direction.to_string(),
            collision_type: "Collision".to_string(),
            estimated_force: force,
            description: String::new(),
        }
    }

    fn parts(names: &[&str]) -> Vec<DamageDetection> {
        names.iter().map(|n| DamageDetection::new(*n, 0.5)).collect()
    }

    #[test]
    fn test_directional_mismatch_fires() {
        let findings = check_physical_consistency(&scene("Rear-End", 0.6), &parts(&["Front Bumper"]));
        assert_eq!(findings, vec![ConsistencyFinding::physical(DIRECTIONAL_MISMATCH_MESSAGE)]);
    }

    #[test]
    fn test_directional_mismatch_suppressed_by_rear_damage() {
        let findings = check_physical_consistency(
            &scene("Rear-End", 0.6),
            &parts(&["Front Bumper", "Trunk"]),
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_directional_mismatch_needs_rear_impact_and_front_damage() {
        assert!(check_physical_consistency(&scene("Frontal-Left", 0.6), &parts(&["Hood"])).is_empty());
        assert!(check_physical_consistency(&scene("REAR", 0.6), &parts(&["Left Door"])).is_empty());
        assert_eq!(
            check_physical_consistency(&scene("REAR", 0.6), &parts(&["HOOD"])).len(),
            1
        );
    }

    #[test]
    fn test_force_severity_boundaries() {
        let six = parts(&["a", "b", "c", "d", "e", "f"]);
        let five = parts(&["a", "b", "c", "d", "e"]);

        let fired = check_physical_consistency(&scene("Side", 0.1), &six);
        assert_eq!(fired, vec![ConsistencyFinding::physical(FORCE_SEVERITY_MISMATCH_MESSAGE)]);

        assert!(check_physical_consistency(&scene("Side", 0.2), &six).is_empty());
        assert!(check_physical_consistency(&scene("Side", 0.1), &five).is_empty());
    }

    #[test]
    fn test_both_physical_rules_fire_in_order() {
        let mut detections = parts(&["Front Bumper"]);
        detections.extend(parts(&["a", "b", "c", "d", "e"]));
        let findings = check_physical_consistency(&scene("rear", 0.05), &detections);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].message, DIRECTIONAL_MISMATCH_MESSAGE);
        assert_eq!(findings[1].message, FORCE_SEVERITY_MISMATCH_MESSAGE);
    }

    #[test]
    fn test_internal_part_finding() {
        let findings = check_invoice_consistency(
            &parts(&["Front Bumper"]),
            &[InvoiceItem::part("Engine Oil Pan", 150.0)],
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::InvoiceMismatch);
        assert_eq!(
            findings[0].message,
            "Billed internal part 'Engine Oil Pan' has no corresponding external impact indicators."
        );
    }

    #[test]
    fn test_unverified_part_and_matches() {
        let detections = parts(&["Front Bumper", "Left Headlight", "Hood"]);
        let items = vec![
            InvoiceItem::part("Front Bumper Replacement", 1200.0),
            InvoiceItem::part("Left Headlight Assembly", 450.0),
            InvoiceItem::labor("Hood Refinishing", 300.0),
            InvoiceItem::part("Rear Spoiler", 220.0),
            InvoiceItem::labor("Chassis Alignment", 500.0),
        ];
        let findings = check_invoice_consistency(&detections, &items);
        assert_eq!(
            findings,
            vec![ConsistencyFinding::invoice(
                "Billed part 'Rear Spoiler' was not detected in damage photos."
            )]
        );
    }

    #[test]
    fn test_repeated_line_items_are_each_flagged() {
        let detections = parts(&["Front Bumper"]);
        let items = vec![
            InvoiceItem::part("Rear Spoiler", 220.0),
            InvoiceItem::part("Rear Spoiler", 220.0),
        ];
        let findings = check_invoice_consistency(&detections, &items);
        let expected =
            ConsistencyFinding::invoice("Billed part 'Rear Spoiler' was not detected in damage photos.");
        assert_eq!(findings, vec![expected.clone(), expected]);
        assert_eq!(anomaly_score(findings.len()), 30.0);
    }

    #[test]
    fn test_labor_never_flagged() {
        let findings = check_invoice_consistency(&[], &[InvoiceItem::labor("Radiator flush", 90.0)]);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_empty_inputs_yield_no_findings() {
        assert!(check_invoice_consistency(&[], &[]).is_empty());
        assert!(check_physical_consistency(&scene("", 0.0), &[]).is_empty());
    }

    #[test]
    fn test_financial_anomalies_are_strictly_above_threshold() {
        let items = vec![
            InvoiceItem::part("Transmission", 7200.0),
            InvoiceItem::labor("Frame straightening", 5000.0),
            InvoiceItem::part("Mirror", 80.0),
        ];
        assert_eq!(financial_anomalies(&items), vec!["High cost for Transmission".to_string()]);
    }

    #[test]
    fn test_report_concatenates_and_scores() {
        let report = ConsistencyReport::evaluate(
            &scene("Rear", 0.5),
            &parts(&["Hood"]),
            &[InvoiceItem::part("Radiator", 300.0), InvoiceItem::part("Mirror", 80.0)],
        );
        assert_eq!(report.total(), 3);
        assert_eq!(report.anomaly_score(), 45.0);

        let findings = report.into_findings();
        let kinds: Vec<_> = findings.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FindingKind::PhysicalMismatch,
                FindingKind::InvoiceMismatch,
                FindingKind::InvoiceMismatch
            ]
        );
    }
}
