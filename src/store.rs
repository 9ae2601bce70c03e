use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;

use crate::config::LocalConfig;
use crate::error::UserError;
use crate::run_id::RunId;

/// Local side of the mirror: directory/file creation, permissions, deletion,
/// and the scan of which run ids are already present.
pub struct LocalFileStore {
    root: PathBuf,
    delete_script: Option<PathBuf>,
    permission_script: Option<PathBuf>,
}

impl LocalFileStore {
    pub fn new(config: &LocalConfig) -> Self {
        Self {
            root: config.root_path.clone(),
            delete_script: config.delete_script.clone(),
            permission_script: config.permission_script.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collect the run ids present locally by scanning directory names of the
    /// form `run<digits>`. Anything else in the root is silently skipped.
    pub fn scan_run_ids(&self) -> Result<HashSet<RunId>> {
        if !self.root.exists() {
            self.create_dir(&self.root)?;
            return Ok(HashSet::new());
        }

        let entries = fs::read_dir(&self.root).map_err(|e| {
            UserError::filesystem(format!("Could not list {}: {e}", self.root.display()))
        })?;

        let mut ids = HashSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                UserError::filesystem(format!("Could not list {}: {e}", self.root.display()))
            })?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(id) = RunId::from_dir_name(name) {
                    ids.insert(id);
                }
            }
        }
        Ok(ids)
    }

    pub fn create_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| {
            UserError::filesystem(format!("Could not create {}: {e}", path.display()))
        })?;
        Ok(())
    }

    /// Create (or truncate) a file, creating parent directories as needed.
    pub fn create_file(&self, path: &Path) -> Result<fs::File> {
        if let Some(parent) = path.parent() {
            self.create_dir(parent)?;
        }
        let file = fs::File::create(path).map_err(|e| {
            UserError::filesystem(format!("Could not create {}: {e}", path.display()))
        })?;
        Ok(file)
    }

    /// Remove a run directory tree. Uses the configured delete script when
    /// present (deletion may need elevated rights), plain removal otherwise.
    pub fn delete_dir(&self, path: &Path) -> Result<()> {
        match &self.delete_script {
            Some(script) => run_script(script, path, "delete"),
            None => {
                fs::remove_dir_all(path).map_err(|e| {
                    UserError::filesystem(format!("Could not delete {}: {e}", path.display()))
                })?;
                Ok(())
            }
        }
    }

    /// Apply the configured permission/ownership settings to a directory.
    /// A no-op when no permission script is configured.
    pub fn apply_permissions(&self, path: &Path) -> Result<()> {
        match &self.permission_script {
            Some(script) => run_script(script, path, "set permissions on"),
            None => Ok(()),
        }
    }
}

fn run_script(script: &Path, target: &Path, action: &str) -> Result<()> {
    let status = Command::new(script).arg(target).status().map_err(|e| {
        UserError::filesystem(format!(
            "Could not {action} {}: {} failed to start: {e}",
            target.display(),
            script.display()
        ))
    })?;

    if !status.success() {
        return Err(UserError::filesystem(format!(
            "Could not {action} {}: {} exited with {status}",
            target.display(),
            script.display()
        ))
        .into());
    }
    Ok(())
}
