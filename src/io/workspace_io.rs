use std::fs;
use std::path::{Path, PathBuf};

use crate::io::store::{JsonStore, StoreError};
use crate::model::config::WorkspaceConfig;
use crate::model::workspace::Workspace;

/// Name of the data directory inside a workspace root
pub const DATA_DIR: &str = "taskdeck";
/// Config file inside the data directory
pub const CONFIG_FILE: &str = "taskdeck.toml";

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("not a taskdeck workspace: no taskdeck/taskdeck.toml found (run `td init`)")]
    NotAWorkspace,
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse taskdeck.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not edit taskdeck.toml: {0}")]
    ConfigEditError(#[from] toml_edit::TomlError),
    #[error("invalid config value for {key}: {reason}")]
    InvalidConfigValue { key: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Walk up from `start` until a directory holding `taskdeck/taskdeck.toml`
/// is found. Returns that directory.
pub fn discover_workspace(start: &Path) -> Result<PathBuf, WorkspaceError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(DATA_DIR).join(CONFIG_FILE).is_file() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(WorkspaceError::NotAWorkspace);
        }
    }
}

/// Load the workspace rooted at `root`.
pub fn load_workspace(root: &Path) -> Result<Workspace, WorkspaceError> {
    let data_dir = root.join(DATA_DIR);
    let config_path = data_dir.join(CONFIG_FILE);
    if !config_path.is_file() {
        return Err(WorkspaceError::NotAWorkspace);
    }
    let text = fs::read_to_string(&config_path).map_err(|e| WorkspaceError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let config: WorkspaceConfig = toml::from_str(&text)?;
    tracing::debug!(root = %root.display(), name = %config.workspace.name, "loaded workspace");
    Ok(Workspace {
        root: root.to_path_buf(),
        data_dir,
        config,
    })
}

/// Open the task file with the workspace's depth limit.
pub fn open_store(workspace: &Workspace) -> Result<JsonStore, WorkspaceError> {
    Ok(JsonStore::open(
        &workspace.tasks_path(),
        workspace.config.tree.max_depth,
    )?)
}
