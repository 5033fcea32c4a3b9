//! Google Cloud step error types

use projectforge_deploy::StepError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcloudError {
    #[error("gcloud not found. Please install the Google Cloud SDK: https://cloud.google.com/sdk")]
    NotInstalled,

    #[error("gcloud command failed: {0}")]
    CommandFailed(String),

    #[error("monitor installer failed: {0}")]
    InstallerFailed(String),

    #[error("unexpected gcloud output: {0}")]
    UnexpectedOutput(String),

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<GcloudError> for StepError {
    fn from(err: GcloudError) -> Self {
        match err {
            GcloudError::CommandFailed(stderr) => StepError::CommandFailed(stderr),
            other => StepError::External(Box::new(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, GcloudError>;
