//! Checkpoint persistence
//!
//! The whole root config is written after every successful step, replacing
//! the previous checkpoint.

use crate::error::{DeployError, Result};
use async_trait::async_trait;
use projectforge_config::{ConfigError, RootConfig};
use std::path::{Path, PathBuf};
use tokio::fs;

#[async_trait]
pub trait Checkpoint: Send + Sync {
    async fn save(&self, root: &RootConfig) -> Result<()>;
}

/// Writes the root config as YAML to a fixed path.
pub struct YamlCheckpoint {
    path: PathBuf,
}

impl YamlCheckpoint {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write(&self, root: &RootConfig) -> std::result::Result<(), ConfigError> {
        let content = projectforge_config::to_yaml(root)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
                tracing::debug!("Created checkpoint directory: {}", parent.display());
            }
        }

        // Rename over the old file so a crash never leaves half a checkpoint.
        let temp = self.temp_path();
        fs::write(&temp, content).await?;
        fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Checkpoint for YamlCheckpoint {
    async fn save(&self, root: &RootConfig) -> Result<()> {
        self.write(root)
            .await
            .map_err(|source| DeployError::Checkpoint {
                path: self.path.clone(),
                source,
            })?;
        tracing::debug!("Saved checkpoint to {}", self.path.display());
        Ok(())
    }
}
