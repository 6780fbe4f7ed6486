use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// A single OCR-reported summary value: service type label, raw text,
/// confidence in [0,1]. Several detections may share one label; the
/// normalizer picks a canonical one per semantic kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(rename = "type")]
    pub label: String,
    pub text: String,
    pub confidence: f32,
}

/// One line item as reported by the analysis service. All value fields
/// are raw OCR text; typing happens in the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLineItem {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub unit_price: Option<String>,
    #[serde(default)]
    pub line_total: Option<String>,
    #[serde(default)]
    pub confidence: f32,
}

/// Full expense analysis for one document: summary detections plus
/// line-item groups. Group and item order is the service's reading
/// order and is preserved end-to-end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseAnalysis {
    #[serde(default)]
    pub detections: Vec<RawDetection>,
    #[serde(default)]
    pub line_item_groups: Vec<Vec<RawLineItem>>,
}

impl ExpenseAnalysis {
    /// Structurally empty: nothing at all was detected.
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty() && self.line_item_groups.iter().all(|g| g.is_empty())
    }
}

/// Expense-analysis service abstraction (allows mocking for tests).
pub trait ExpenseAnalyzer {
    fn analyze(&self, container: &str, object_key: &str)
        -> Result<ExpenseAnalysis, ExtractionError>;
}

impl<A: ExpenseAnalyzer> ExpenseAnalyzer for std::sync::Arc<A> {
    fn analyze(
        &self,
        container: &str,
        object_key: &str,
    ) -> Result<ExpenseAnalysis, ExtractionError> {
        (**self).analyze(container, object_key)
    }
}
