//! Deployment error types

use projectforge_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single step's call into an external tool.
///
/// The pipeline only distinguishes success from failure; the variants exist
/// for the operator's benefit.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("project '{0}' is not present in the config")]
    MissingProject(String),

    #[error("missing config field: {0}")]
    MissingField(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    External(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors that abort a run outright.
#[derive(Error, Debug)]
pub enum DeployError {
    /// Nothing has been touched yet.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write checkpoint {}: {source}", path.display())]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    /// Step `step` of `project_id` ran but its result never reached disk.
    #[error(
        "{project_id} step {step} ran but could not be saved: {source}\n\
         Resume with: --resume-from-project={project_id} --resume-from-step={step}"
    )]
    StepNotSaved {
        project_id: String,
        step: usize,
        #[source]
        source: Box<DeployError>,
    },

    #[error("post-deploy stage failed: {0}")]
    PostDeploy(String),
}

pub type Result<T> = std::result::Result<T, DeployError>;
