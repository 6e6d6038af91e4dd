use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::task::{GroupId, Priority, TagId, Task};

/// Error type for reading or writing a single task field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: FieldName, reason: String },
    #[error("{field} expects a {expected} value")]
    TypeMismatch {
        field: FieldName,
        expected: &'static str,
    },
    #[error("{0} cannot be cleared")]
    CannotClear(FieldName),
}

/// The editable fields tracked by bulk edit, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldName {
    Title,
    Description,
    Priority,
    StartDate,
    DueDate,
    Group,
    Tags,
}

impl FieldName {
    pub const ALL: [FieldName; 7] = [
        FieldName::Title,
        FieldName::Description,
        FieldName::Priority,
        FieldName::StartDate,
        FieldName::DueDate,
        FieldName::Group,
        FieldName::Tags,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldName::Title => "title",
            FieldName::Description => "description",
            FieldName::Priority => "priority",
            FieldName::StartDate => "startDate",
            FieldName::DueDate => "dueDate",
            FieldName::Group => "group",
            FieldName::Tags => "tags",
        }
    }

    /// Fields that may be pushed down from a parent onto its subtasks.
    pub fn cascades(self) -> bool {
        matches!(self, FieldName::Priority | FieldName::Group | FieldName::Tags)
    }

    /// Read this field from a task in its normalized comparison form.
    pub fn extract(self, task: &Task) -> FieldValue {
        match self {
            FieldName::Title => FieldValue::Text(task.title.clone()),
            FieldName::Description => task
                .description
                .clone()
                .map_or(FieldValue::Empty, FieldValue::Text),
            FieldName::Priority => FieldValue::Priority(task.priority),
            FieldName::StartDate => task.start_date.map_or(FieldValue::Empty, FieldValue::Date),
            FieldName::DueDate => task.due_date.map_or(FieldValue::Empty, FieldValue::Date),
            FieldName::Group => task
                .group_id
                .clone()
                .map_or(FieldValue::Empty, FieldValue::Group),
            FieldName::Tags => FieldValue::Tags(task.tags.clone()),
        }
    }

    /// Parse a command-line value for this field.
    ///
    /// Text fields keep an empty string as `Text("")`; every other field
    /// reads an empty string as `Empty`. Tags are comma-separated.
    pub fn parse_value(self, raw: &str) -> Result<FieldValue, FieldError> {
        let raw_trimmed = raw.trim();
        match self {
            FieldName::Title | FieldName::Description => Ok(FieldValue::Text(raw.to_string())),
            _ if raw_trimmed.is_empty() => Ok(FieldValue::Empty),
            FieldName::Priority => raw_trimmed
                .parse::<Priority>()
                .map(FieldValue::Priority)
                .map_err(|reason| FieldError::InvalidValue {
                    field: self,
                    reason,
                }),
            FieldName::StartDate | FieldName::DueDate => parse_date(raw_trimmed)
                .map(FieldValue::Date)
                .map_err(|reason| FieldError::InvalidValue {
                    field: self,
                    reason,
                }),
            FieldName::Group => Ok(FieldValue::Group(raw_trimmed.to_string())),
            FieldName::Tags => Ok(FieldValue::Tags(
                raw_trimmed
                    .split(',')
                    .map(|t| t.trim().trim_start_matches('#'))
                    .filter(|t| !t.is_empty())
                    .map(|t| t.to_string())
                    .collect(),
            )),
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldName {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(FieldName::Title),
            "description" | "desc" => Ok(FieldName::Description),
            "priority" => Ok(FieldName::Priority),
            "startDate" | "start_date" | "start" => Ok(FieldName::StartDate),
            "dueDate" | "due_date" | "due" => Ok(FieldName::DueDate),
            "group" | "groupId" | "group_id" => Ok(FieldName::Group),
            "tags" => Ok(FieldName::Tags),
            other => Err(FieldError::UnknownField(other.to_string())),
        }
    }
}

/// A single field value, normalized for comparison.
///
/// Tags are a set, so two tasks carrying the same tags in a different order
/// compare equal. Groups compare by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Absent (`None` description, date, or group)
    Empty,
    Text(String),
    Priority(Priority),
    Date(NaiveDate),
    Group(GroupId),
    Tags(BTreeSet<TagId>),
}

impl FieldValue {
    /// Absent or empty-string values. These are never written by a bulk update.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Group(g) => g.is_empty(),
            _ => false,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Empty => f.write_str("(none)"),
            FieldValue::Text(s) if s.is_empty() => f.write_str("\"\""),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Priority(p) => write!(f, "{}", p),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Group(g) => f.write_str(g),
            FieldValue::Tags(tags) if tags.is_empty() => f.write_str("(no tags)"),
            FieldValue::Tags(tags) => {
                let joined: Vec<&str> = tags.iter().map(|t| t.as_str()).collect();
                f.write_str(&joined.join(", "))
            }
        }
    }
}

/// Field name → value, ordered by field.
pub type FieldMap = BTreeMap<FieldName, FieldValue>;

/// Write one field onto a task. `Empty` clears optional fields.
pub fn apply_field(task: &mut Task, field: FieldName, value: &FieldValue) -> Result<(), FieldError> {
    match (field, value) {
        (FieldName::Title, FieldValue::Text(s)) => {
            if s.trim().is_empty() {
                return Err(FieldError::CannotClear(field));
            }
            task.title = s.clone();
        }
        (FieldName::Title, FieldValue::Empty) => return Err(FieldError::CannotClear(field)),
        (FieldName::Description, FieldValue::Text(s)) => {
            task.description = if s.is_empty() { None } else { Some(s.clone()) };
        }
        (FieldName::Description, FieldValue::Empty) => task.description = None,
        (FieldName::Priority, FieldValue::Priority(p)) => task.priority = *p,
        (FieldName::Priority, FieldValue::Empty) => return Err(FieldError::CannotClear(field)),
        (FieldName::StartDate, FieldValue::Date(d)) => task.start_date = Some(*d),
        (FieldName::StartDate, FieldValue::Empty) => task.start_date = None,
        (FieldName::DueDate, FieldValue::Date(d)) => task.due_date = Some(*d),
        (FieldName::DueDate, FieldValue::Empty) => task.due_date = None,
        (FieldName::Group, FieldValue::Group(g)) => task.group_id = Some(g.clone()),
        (FieldName::Group, FieldValue::Empty) => task.group_id = None,
        (FieldName::Tags, FieldValue::Tags(tags)) => task.tags = tags.clone(),
        (FieldName::Tags, FieldValue::Empty) => task.tags.clear(),
        (field, _) => {
            return Err(FieldError::TypeMismatch {
                field,
                expected: expected_kind(field),
            });
        }
    }
    Ok(())
}

fn expected_kind(field: FieldName) -> &'static str {
    match field {
        FieldName::Title | FieldName::Description => "text",
        FieldName::Priority => "priority",
        FieldName::StartDate | FieldName::DueDate => "date",
        FieldName::Group => "group id",
        FieldName::Tags => "tag set",
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{}': {}", s.trim(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_name_round_trip_through_str() {
        for field in FieldName::ALL {
            assert_eq!(field.as_str().parse::<FieldName>().unwrap(), field);
        }
        assert_eq!("due".parse::<FieldName>().unwrap(), FieldName::DueDate);
        assert!("colour".parse::<FieldName>().is_err());
    }

    #[test]
    fn test_parse_value_by_field() {
        assert_eq!(
            FieldName::Priority.parse_value("urgent").unwrap(),
            FieldValue::Priority(Priority::Urgent)
        );
        assert_eq!(
            FieldName::DueDate.parse_value("2024-01-10").unwrap(),
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap())
        );
        assert_eq!(
            FieldName::Tags.parse_value("#b, a,,").unwrap(),
            FieldValue::Tags(["a".to_string(), "b".to_string()].into_iter().collect())
        );
        assert_eq!(
            FieldName::Title.parse_value("").unwrap(),
            FieldValue::Text(String::new())
        );
        assert_eq!(FieldName::Group.parse_value(" ").unwrap(), FieldValue::Empty);
        assert!(FieldName::StartDate.parse_value("Jan 5").is_err());
    }

    #[test]
    fn test_blank_values() {
        assert!(FieldValue::Empty.is_blank());
        assert!(FieldValue::Text(String::new()).is_blank());
        assert!(!FieldValue::Text("x".into()).is_blank());
        // An empty tag set is a real value (remove all tags), not a blank
        assert!(!FieldValue::Tags(BTreeSet::new()).is_blank());
    }

    #[test]
    fn test_apply_field() {
        let mut task = Task::new("a", "Old");
        apply_field(&mut task, FieldName::Title, &FieldValue::Text("New".into())).unwrap();
        apply_field(&mut task, FieldName::Group, &FieldValue::Group("home".into())).unwrap();
        assert_eq!(task.title, "New");
        assert_eq!(task.group_id.as_deref(), Some("home"));

        apply_field(&mut task, FieldName::Group, &FieldValue::Empty).unwrap();
        assert_eq!(task.group_id, None);

        assert_eq!(
            apply_field(&mut task, FieldName::Title, &FieldValue::Empty),
            Err(FieldError::CannotClear(FieldName::Title))
        );
        assert!(matches!(
            apply_field(&mut task, FieldName::DueDate, &FieldValue::Text("soon".into())),
            Err(FieldError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_field_value_json() {
        assert_eq!(serde_json::to_string(&FieldValue::Empty).unwrap(), "null");
        assert_eq!(
            serde_json::to_string(&FieldValue::Priority(Priority::High)).unwrap(),
            "\"HIGH\""
        );
        let mut map = FieldMap::new();
        map.insert(FieldName::StartDate, FieldValue::Empty);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"startDate":null}"#);
    }
}
