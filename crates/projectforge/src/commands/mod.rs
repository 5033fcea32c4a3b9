pub mod deploy;
pub mod plan;
pub mod validate;

use projectforge_config::RootConfig;
use std::path::{Path, PathBuf};

/// Load the config at `path` and check its structure.
pub fn load_validated(path: &Path) -> anyhow::Result<(PathBuf, RootConfig)> {
    let path = projectforge_config::normalize_path(path)?;
    let root = projectforge_config::load_config(&path)?;
    tracing::info!("Validating project YAML");
    projectforge_config::validate_config(&root)?;
    Ok((path, root))
}
