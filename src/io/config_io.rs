use std::fs;
use std::path::Path;

use toml_edit::DocumentMut;

use crate::io::store::atomic_write;
use crate::io::workspace_io::{CONFIG_FILE, WorkspaceError};
use crate::model::config::WorkspaceConfig;
use crate::ops::calendar::MAX_DAYS;

/// Keys `td config` may set, with the kind of value each takes.
const SETTABLE: &[(&str, ValueKind)] = &[
    ("workspace.name", ValueKind::Text),
    ("tree.max_depth", ValueKind::Count { max: None }),
    ("bulk.cascade_to_subtasks", ValueKind::Flag),
    ("calendar.default_days", ValueKind::Count { max: Some(MAX_DAYS) }),
];

#[derive(Debug, Clone, Copy)]
enum ValueKind {
    Text,
    Count { max: Option<u32> },
    Flag,
}

/// Every key `set_value` accepts, in file order.
pub fn settable_keys() -> impl Iterator<Item = &'static str> {
    SETTABLE.iter().map(|(k, _)| *k)
}

/// Read taskdeck.toml as both the typed config and an editable document.
pub fn read_config(data_dir: &Path) -> Result<(WorkspaceConfig, DocumentMut), WorkspaceError> {
    let path = data_dir.join(CONFIG_FILE);
    let text = fs::read_to_string(&path).map_err(|e| WorkspaceError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    let config: WorkspaceConfig = toml::from_str(&text)?;
    let doc: DocumentMut = text.parse()?;
    Ok((config, doc))
}

/// Write the document back, keeping the user's formatting and comments.
pub fn write_config(data_dir: &Path, doc: &DocumentMut) -> Result<(), WorkspaceError> {
    let path = data_dir.join(CONFIG_FILE);
    atomic_write(&path, doc.to_string().as_bytes()).map_err(|e| WorkspaceError::WriteError {
        path,
        source: e,
    })
}

/// Set a dotted `section.key` to `raw`, typed by the key. The edited
/// document must still parse as a valid config.
pub fn set_value(doc: &mut DocumentMut, key: &str, raw: &str) -> Result<(), WorkspaceError> {
    let invalid = |reason: String| WorkspaceError::InvalidConfigValue {
        key: key.to_string(),
        reason,
    };
    let kind = SETTABLE
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| {
            let known: Vec<&str> = settable_keys().collect();
            invalid(format!("unknown key (expected one of: {})", known.join(", ")))
        })?;
    let Some((section, field)) = key.split_once('.') else {
        return Err(invalid("expected section.key".into()));
    };

    let value = match kind {
        ValueKind::Text => {
            if raw.trim().is_empty() {
                return Err(invalid("must not be empty".into()));
            }
            toml_edit::value(raw)
        }
        ValueKind::Count { max } => {
            let n: i64 = raw
                .parse()
                .map_err(|_| invalid(format!("expected a whole number, got '{}'", raw)))?;
            if n < 0 {
                return Err(invalid("must not be negative".into()));
            }
            if let Some(max) = max
                && n > i64::from(max)
            {
                return Err(invalid(format!("must be at most {}", max)));
            }
            toml_edit::value(n)
        }
        ValueKind::Flag => match raw {
            "true" | "yes" | "on" => toml_edit::value(true),
            "false" | "no" | "off" => toml_edit::value(false),
            _ => return Err(invalid(format!("expected true or false, got '{}'", raw))),
        },
    };

    let mut edited = doc.clone();
    if !edited.contains_key(section) {
        edited[section] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    edited[section][field] = value;
    toml::from_str::<WorkspaceConfig>(&edited.to_string())?;
    *doc = edited;
    Ok(())
}

/// Read a dotted key back as a display string.
pub fn get_value(config: &WorkspaceConfig, key: &str) -> Option<String> {
    match key {
        "workspace.name" => Some(config.workspace.name.clone()),
        "tree.max_depth" => Some(config.tree.max_depth.to_string()),
        "bulk.cascade_to_subtasks" => Some(config.bulk.cascade_to_subtasks.to_string()),
        "calendar.default_days" => Some(config.calendar.default_days.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"# household chores
[workspace]
name = "home"

[tree]
max_depth = 2 # three levels
"#;

    #[test]
    fn test_round_trip_preserves_formatting() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), SAMPLE).unwrap();

        let (config, doc) = read_config(tmp.path()).unwrap();
        assert_eq!(config.workspace.name, "home");
        write_config(tmp.path(), &doc).unwrap();

        let written = fs::read_to_string(tmp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(written, SAMPLE);
    }

    #[test]
    fn test_set_existing_and_new_sections() {
        let mut doc: DocumentMut = SAMPLE.parse().unwrap();
        set_value(&mut doc, "tree.max_depth", "1").unwrap();
        set_value(&mut doc, "bulk.cascade_to_subtasks", "yes").unwrap();

        let text = doc.to_string();
        assert!(text.starts_with("# household chores"));
        let config: WorkspaceConfig = toml::from_str(&text).unwrap();
        assert_eq!(config.tree.max_depth, 1);
        assert!(config.bulk.cascade_to_subtasks);
        assert_eq!(get_value(&config, "tree.max_depth").as_deref(), Some("1"));
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut doc: DocumentMut = SAMPLE.parse().unwrap();
        assert!(set_value(&mut doc, "tree.max_depth", "deep").is_err());
        assert!(set_value(&mut doc, "tree.max_depth", "-1").is_err());
        assert!(set_value(&mut doc, "bulk.cascade_to_subtasks", "maybe").is_err());
        assert!(set_value(&mut doc, "workspace.name", "  ").is_err());
        let err = set_value(&mut doc, "calendar.default_days", "367").unwrap_err();
        assert!(err.to_string().contains("must be at most 366"));
        let err = set_value(&mut doc, "tree.colour", "red").unwrap_err();
        assert!(err.to_string().contains("unknown key"));
        // Nothing changed
        assert_eq!(doc.to_string(), SAMPLE);
    }
}
