use std::fs;

use crate::cli::commands::InitArgs;
use crate::io::store::atomic_write;
use crate::io::workspace_io::{self, CONFIG_FILE, DATA_DIR};

const CONFIG_TEMPLATE: &str = r##"[workspace]
name = "{name}"

[tree]
# Deepest subtask level; 0 is a top-level task.
# 2 allows task > subtask > sub-subtask.
max_depth = 2

[bulk]
# Copy priority, group and tag edits from `td bulk` onto subtasks.
cascade_to_subtasks = false

[calendar]
default_days = 7
"##;

const TASKS_TEMPLATE: &str = "{\n  \"tags\": [],\n  \"groups\": [],\n  \"tasks\": []\n}\n";

/// Infer a workspace name from a directory name: hyphens and underscores
/// become spaces, each word capitalized.
fn infer_name(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => c.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_config(name: &str) -> String {
    // Keep the name a valid TOML basic string
    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
    CONFIG_TEMPLATE.replace("{name}", &escaped)
}

pub fn cmd_init(args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let root = super::start_dir()?;
    let data_dir = root.join(DATA_DIR);

    if data_dir.join(CONFIG_FILE).exists() && !args.force {
        return Err("taskdeck workspace already exists in ./taskdeck/ (use --force)".into());
    }

    if let Some(parent) = root.parent()
        && let Ok(parent_root) = workspace_io::discover_workspace(parent)
    {
        eprintln!(
            "Note: enclosing workspace found at {}/",
            parent_root.join(DATA_DIR).display()
        );
    }

    let name = args.name.unwrap_or_else(|| {
        root.file_name()
            .and_then(|n| n.to_str())
            .map(infer_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Untitled".to_string())
    });

    fs::create_dir_all(&data_dir)?;
    atomic_write(&data_dir.join(CONFIG_FILE), render_config(&name).as_bytes())?;

    // --force keeps existing tasks
    let tasks_path = data_dir.join("tasks.json");
    if !tasks_path.exists() {
        atomic_write(&tasks_path, TASKS_TEMPLATE.as_bytes())?;
    }

    tracing::info!(root = %root.display(), %name, "initialized workspace");
    println!("Initialized taskdeck workspace: {}", name);
    Ok(())
}
