use std::path::PathBuf;

use super::config::WorkspaceConfig;

/// A discovered taskdeck workspace
#[derive(Debug)]
pub struct Workspace {
    /// Directory containing `taskdeck/`
    pub root: PathBuf,
    /// Path to the `taskdeck/` directory
    pub data_dir: PathBuf,
    /// Parsed taskdeck.toml
    pub config: WorkspaceConfig,
}

impl Workspace {
    pub fn tasks_path(&self) -> PathBuf {
        self.data_dir.join("tasks.json")
    }
}
