use serde::Serialize;

use crate::model::field::{FieldName, FieldValue};
use crate::model::task::Task;

/// How one field looks across a selection of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAnalysis {
    pub field: FieldName,
    pub has_common_value: bool,
    /// Set only when every task agrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_value: Option<FieldValue>,
    /// Distinct values in first-seen order, set only when tasks disagree
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub different_values: Vec<FieldValue>,
}

/// Classify every tracked field of a selection as common or divergent.
///
/// Callers short-circuit on an empty selection; given one anyway this
/// returns no entries.
pub fn analyze_fields(tasks: &[Task]) -> Vec<FieldAnalysis> {
    if tasks.is_empty() {
        return Vec::new();
    }
    FieldName::ALL
        .iter()
        .map(|&field| analyze_field(tasks, field))
        .collect()
}

/// Classify a single field. A field absent on every task is common with
/// the `Empty` value.
pub fn analyze_field(tasks: &[Task], field: FieldName) -> FieldAnalysis {
    let values: Vec<FieldValue> = tasks.iter().map(|t| field.extract(t)).collect();

    let Some(first) = values.first() else {
        return FieldAnalysis {
            field,
            has_common_value: false,
            common_value: None,
            different_values: Vec::new(),
        };
    };

    if values.iter().all(|v| v == first) {
        return FieldAnalysis {
            field,
            has_common_value: true,
            common_value: Some(first.clone()),
            different_values: Vec::new(),
        };
    }

    let mut distinct: Vec<FieldValue> = Vec::new();
    for value in values {
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }
    FieldAnalysis {
        field,
        has_common_value: false,
        common_value: None,
        different_values: distinct,
    }
}

/// Look up one field's entry in an analysis.
pub fn analysis_for(analysis: &[FieldAnalysis], field: FieldName) -> Option<&FieldAnalysis> {
    analysis.iter().find(|a| a.field == field)
}
