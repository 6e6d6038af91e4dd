use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::task::DateRange;

/// Which side of the parent's range a subtask spills over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConflictType {
    #[serde(rename = "subtask-starts-before-parent")]
    StartsBeforeParent,
    #[serde(rename = "subtask-ends-after-parent")]
    EndsAfterParent,
    /// Starts before the parent starts and ends after it ends
    #[serde(rename = "subtask-entirely-outside-parent")]
    EntirelyOutsideParent,
}

impl ConflictType {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictType::StartsBeforeParent => "subtask-starts-before-parent",
            ConflictType::EndsAfterParent => "subtask-ends-after-parent",
            ConflictType::EntirelyOutsideParent => "subtask-entirely-outside-parent",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            ConflictType::StartsBeforeParent => "subtask starts before its parent",
            ConflictType::EndsAfterParent => "subtask ends after its parent",
            ConflictType::EntirelyOutsideParent => {
                "subtask starts before and ends after its parent"
            }
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of comparing a subtask's dates with its parent's.
///
/// Suggestions are only set for the bound that needs to change; an unset
/// suggestion means "leave this bound as it is".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateConflict {
    pub has_conflict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_type: Option<ConflictType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_parent_start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_parent_end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_subtask_start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_subtask_end_date: Option<NaiveDate>,
}

impl DateConflict {
    pub fn none() -> Self {
        Self::default()
    }

    /// The parent's range after the widen-parent resolution.
    pub fn widened_parent(&self, parent: DateRange) -> DateRange {
        DateRange {
            start: self.suggested_parent_start_date.or(parent.start),
            due: self.suggested_parent_end_date.or(parent.due),
        }
    }

    /// The subtask's range after the clamp-subtask resolution.
    pub fn clamped_subtask(&self, subtask: DateRange) -> DateRange {
        DateRange {
            start: self.suggested_subtask_start_date.or(subtask.start),
            due: self.suggested_subtask_end_date.or(subtask.due),
        }
    }
}

/// Check whether a subtask's range fits inside its parent's.
///
/// An absent bound on either side is unbounded, so an undated parent or an
/// undated subtask never conflicts.
pub fn validate_date_conflict(subtask: DateRange, parent: DateRange) -> DateConflict {
    if parent.is_undated() || subtask.is_undated() {
        return DateConflict::none();
    }

    let starts_early = match (subtask.start, parent.start) {
        (Some(s), Some(p)) => s < p,
        _ => false,
    };
    let ends_late = match (subtask.due, parent.due) {
        (Some(s), Some(p)) => s > p,
        _ => false,
    };
    if !starts_early && !ends_late {
        return DateConflict::none();
    }

    let conflict_type = match (starts_early, ends_late) {
        (true, true) => ConflictType::EntirelyOutsideParent,
        (true, false) => ConflictType::StartsBeforeParent,
        _ => ConflictType::EndsAfterParent,
    };

    let mut conflict = DateConflict {
        has_conflict: true,
        conflict_type: Some(conflict_type),
        ..Default::default()
    };

    if starts_early {
        conflict.suggested_parent_start_date = min_opt(parent.start, subtask.start);
        conflict.suggested_subtask_start_date = max_opt(parent.start, subtask.start);
    }
    if ends_late {
        conflict.suggested_parent_end_date = max_opt(parent.due, subtask.due);
        conflict.suggested_subtask_end_date = min_opt(parent.due, subtask.due);
    }

    // Clamping one bound past the other would leave the subtask inverted;
    // pin the untouched bound to the same day instead.
    let clamped = conflict.clamped_subtask(subtask);
    if clamped.is_inverted() {
        if starts_early && !ends_late {
            conflict.suggested_subtask_end_date = clamped.start;
        } else if ends_late && !starts_early {
            conflict.suggested_subtask_start_date = clamped.due;
        }
    }

    conflict
}

fn min_opt(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_opt(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn range(start: Option<&str>, due: Option<&str>) -> DateRange {
        DateRange::new(start.map(d), due.map(d))
    }

    /// Every dated pairing used by the convergence tests below.
    fn cases() -> Vec<(DateRange, DateRange)> {
        let parents = [
            range(Some("2024-01-05"), Some("2024-01-10")),
            range(Some("2024-01-05"), None),
            range(None, Some("2024-01-10")),
        ];
        let subtasks = [
            range(Some("2024-01-01"), Some("2024-01-08")),
            range(Some("2024-01-06"), Some("2024-01-12")),
            range(Some("2024-01-01"), Some("2024-01-12")),
            range(Some("2024-01-01"), Some("2024-01-03")),
            range(Some("2024-01-11"), Some("2024-01-15")),
            range(Some("2024-01-06"), Some("2024-01-08")),
            range(Some("2024-01-01"), None),
            range(None, Some("2024-01-20")),
        ];
        parents
            .iter()
            .flat_map(|p| subtasks.iter().map(move |s| (*s, *p)))
            .collect()
    }

    #[test]
    fn test_starts_before_parent() {
        let conflict = validate_date_conflict(
            range(Some("2024-01-01"), Some("2024-01-08")),
            range(Some("2024-01-05"), Some("2024-01-10")),
        );
        assert_eq!(
            conflict,
            DateConflict {
                has_conflict: true,
                conflict_type: Some(ConflictType::StartsBeforeParent),
                suggested_parent_start_date: Some(d("2024-01-01")),
                suggested_parent_end_date: None,
                suggested_subtask_start_date: Some(d("2024-01-05")),
                suggested_subtask_end_date: None,
            }
        );
    }

    #[test]
    fn test_ends_after_parent() {
        let conflict = validate_date_conflict(
            range(Some("2024-01-06"), Some("2024-01-12")),
            range(Some("2024-01-05"), Some("2024-01-10")),
        );
        assert_eq!(conflict.conflict_type, Some(ConflictType::EndsAfterParent));
        assert_eq!(conflict.suggested_parent_start_date, None);
        assert_eq!(conflict.suggested_parent_end_date, Some(d("2024-01-12")));
        assert_eq!(conflict.suggested_subtask_start_date, None);
        assert_eq!(conflict.suggested_subtask_end_date, Some(d("2024-01-10")));
    }

    #[test]
    fn test_entirely_outside_parent() {
        let conflict = validate_date_conflict(
            range(Some("2024-01-01"), Some("2024-01-12")),
            range(Some("2024-01-05"), Some("2024-01-10")),
        );
        assert_eq!(
            conflict.conflict_type,
            Some(ConflictType::EntirelyOutsideParent)
        );
        assert_eq!(conflict.suggested_parent_start_date, Some(d("2024-01-01")));
        assert_eq!(conflict.suggested_parent_end_date, Some(d("2024-01-12")));
        assert_eq!(conflict.suggested_subtask_start_date, Some(d("2024-01-05")));
        assert_eq!(conflict.suggested_subtask_end_date, Some(d("2024-01-10")));
    }

    #[test]
    fn test_undated_parent_never_conflicts() {
        let conflict = validate_date_conflict(
            range(Some("2024-01-01"), Some("2024-01-03")),
            DateRange::default(),
        );
        assert!(!conflict.has_conflict);
        assert_eq!(conflict, DateConflict::none());
    }

    #[test]
    fn test_undated_subtask_never_conflicts() {
        let conflict = validate_date_conflict(
            DateRange::default(),
            range(Some("2024-01-05"), Some("2024-01-10")),
        );
        assert!(!conflict.has_conflict);
    }

    #[test]
    fn test_contained_range_no_conflict() {
        for sub in [
            range(Some("2024-01-05"), Some("2024-01-10")),
            range(Some("2024-01-06"), Some("2024-01-08")),
            range(None, Some("2024-01-10")),
        ] {
            let conflict =
                validate_date_conflict(sub, range(Some("2024-01-05"), Some("2024-01-10")));
            assert!(!conflict.has_conflict, "{:?} should fit", sub);
        }
    }

    #[test]
    fn test_half_open_parent_bounds() {
        // Parent has only a start: the end is unbounded
        let conflict = validate_date_conflict(
            range(Some("2024-01-06"), Some("2030-01-01")),
            range(Some("2024-01-05"), None),
        );
        assert!(!conflict.has_conflict);

        let conflict = validate_date_conflict(
            range(Some("2024-01-01"), None),
            range(Some("2024-01-05"), None),
        );
        assert_eq!(conflict.conflict_type, Some(ConflictType::StartsBeforeParent));
        assert_eq!(conflict.suggested_parent_start_date, Some(d("2024-01-01")));
    }

    #[test]
    fn test_clamp_never_inverts_subtask() {
        // Subtask sits wholly before the parent; only its start is violated
        let sub = range(Some("2024-01-01"), Some("2024-01-03"));
        let conflict = validate_date_conflict(sub, range(Some("2024-01-05"), Some("2024-01-10")));
        assert_eq!(conflict.conflict_type, Some(ConflictType::StartsBeforeParent));
        assert_eq!(conflict.suggested_subtask_start_date, Some(d("2024-01-05")));
        assert_eq!(conflict.suggested_subtask_end_date, Some(d("2024-01-05")));
        assert!(!conflict.clamped_subtask(sub).is_inverted());

        // And wholly after
        let sub = range(Some("2024-01-11"), Some("2024-01-15"));
        let conflict = validate_date_conflict(sub, range(Some("2024-01-05"), Some("2024-01-10")));
        assert_eq!(conflict.suggested_subtask_start_date, Some(d("2024-01-10")));
        assert_eq!(conflict.suggested_subtask_end_date, Some(d("2024-01-10")));
    }

    #[test]
    fn test_widen_parent_converges() {
        for (sub, parent) in cases() {
            let conflict = validate_date_conflict(sub, parent);
            if !conflict.has_conflict {
                continue;
            }
            let widened = conflict.widened_parent(parent);
            assert!(
                !validate_date_conflict(sub, widened).has_conflict,
                "widening {:?} for {:?} did not resolve",
                parent,
                sub
            );
        }
    }

    #[test]
    fn test_clamp_subtask_converges() {
        for (sub, parent) in cases() {
            let conflict = validate_date_conflict(sub, parent);
            if !conflict.has_conflict {
                continue;
            }
            let clamped = conflict.clamped_subtask(sub);
            assert!(
                !validate_date_conflict(clamped, parent).has_conflict,
                "clamping {:?} into {:?} did not resolve",
                sub,
                parent
            );
        }
    }

    #[test]
    fn test_conflict_json() {
        let conflict = validate_date_conflict(
            range(Some("2024-01-01"), Some("2024-01-08")),
            range(Some("2024-01-05"), Some("2024-01-10")),
        );
        let json = serde_json::to_value(&conflict).unwrap();
        assert_eq!(json["hasConflict"], true);
        assert_eq!(json["conflictType"], "subtask-starts-before-parent");
        assert_eq!(json["suggestedParentStartDate"], "2024-01-01");
        assert!(json.get("suggestedParentEndDate").is_none());
    }
}
