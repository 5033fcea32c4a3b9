//! Post-deploy stage: hands the deployed config to rule generation.

use async_trait::async_trait;
use projectforge_config::RootConfig;
use projectforge_deploy::{DeployError, PostDeploy};
use std::path::{Path, PathBuf};

/// File name used when the rules path is a directory.
const SNAPSHOT_FILE_NAME: &str = "deployed_config.yaml";

/// Writes the fully deployed config where the rule generator reads it.
pub struct RulesHook {
    output_rules_path: Option<PathBuf>,
}

impl RulesHook {
    pub fn new(output_rules_path: Option<PathBuf>) -> Self {
        Self { output_rules_path }
    }

    fn snapshot_path(path: &Path) -> PathBuf {
        if path.is_dir() {
            path.join(SNAPSHOT_FILE_NAME)
        } else {
            path.to_path_buf()
        }
    }
}

#[async_trait]
impl PostDeploy for RulesHook {
    async fn after_deploy(&self, root: &RootConfig) -> Result<(), DeployError> {
        let Some(path) = &self.output_rules_path else {
            let bucket = root
                .forseti
                .as_ref()
                .and_then(|f| f.generated_fields.as_ref())
                .map(|g| g.server_bucket.as_str())
                .unwrap_or("the monitor server bucket");
            tracing::info!(
                "No --output-rules-path given; rules are to be generated into {}",
                bucket
            );
            return Ok(());
        };

        let path = Self::snapshot_path(path);
        let content = projectforge_config::to_yaml(root)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| DeployError::PostDeploy(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Wrote deployed config for rule generation to {}", path.display());
        Ok(())
    }
}
