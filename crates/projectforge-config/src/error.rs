use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("home directory not found while expanding '~'")]
    HomeDirNotFound,

    #[error("environment variable '{0}' referenced in the config is not set")]
    MissingEnvVar(String),

    #[error("invalid config:\n{}", .0.iter().map(|p| format!("  - {p}")).collect::<Vec<_>>().join("\n"))]
    Invalid(Vec<String>),

    /// API name -> ids of the projects requesting it.
    #[error(
        "projects try to enable APIs that are not in the allowed_apis list:\n{}",
        format_disallowed(.0)
    )]
    ApisNotAllowed(BTreeMap<String, Vec<String>>),

    #[error("output path {} cannot overwrite the input config", .0.display())]
    OutputOverwritesInput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_disallowed(offenders: &BTreeMap<String, Vec<String>>) -> String {
    offenders
        .iter()
        .map(|(api, projects)| format!("  - {api} (requested by {})", projects.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, ConfigError>;
