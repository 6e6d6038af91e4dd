use serde::{Deserialize, Serialize};

use super::task::{GroupId, TagId};

/// A label that can be attached to any number of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    /// Display color, `#rrggbb`
    pub color: String,
}

/// A named bucket a task may belong to (at most one per task).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Check a `#rrggbb` display color.
pub fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color() {
        assert!(is_hex_color("#A09BFE"));
        assert!(is_hex_color("#0c001b"));
        assert!(!is_hex_color("A09BFE"));
        assert!(!is_hex_color("#A09BF"));
        assert!(!is_hex_color("#GGGGGG"));
    }
}
