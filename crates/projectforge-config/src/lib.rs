//! projectforge provisioning config
//!
//! Loads the operator's YAML document into a typed [`RootConfig`],
//! substituting `${VAR}` references from the environment, and writes it back
//! out as checkpoints.

pub mod error;
pub mod model;
pub mod validate;

pub use error::*;
pub use model::*;
pub use validate::{check_allowed_apis, validate_config};

use regex::{Captures, Regex};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

static ENV_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}").expect("valid env pattern")
});

/// Expand `~`, make the path absolute against the current directory and
/// collapse `.` and `..` components.
pub fn normalize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();

    let expanded = match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .ok_or(ConfigError::HomeDirNotFound)?
            .join(rest),
        Err(_) => path.to_path_buf(),
    };

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()?.join(expanded)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

/// Follow symlinks as far as the filesystem allows. A missing file resolves
/// through its parent directory.
fn resolve_on_disk(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|dir| dir.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

/// Replace `${VAR}` tokens with values from the process environment.
pub fn substitute_env(raw: &str) -> Result<String> {
    let mut missing = None;
    let substituted = ENV_PATTERN.replace_all(raw, |caps: &Captures| {
        let name = &caps[1];
        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(ConfigError::MissingEnvVar(name)),
        None => Ok(substituted.into_owned()),
    }
}

/// Parse a config document after environment substitution.
pub fn parse_config(raw: &str) -> Result<RootConfig> {
    let substituted = substitute_env(raw)?;
    Ok(serde_yaml::from_str(&substituted)?)
}

/// Read and parse the config at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<RootConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let raw = std::fs::read_to_string(path)?;
    let root = parse_config(&raw)?;
    tracing::debug!(
        "Loaded config {} with {} projects",
        path.display(),
        root.projects.len()
    );
    Ok(root)
}

pub fn to_yaml(root: &RootConfig) -> Result<String> {
    Ok(serde_yaml::to_string(root)?)
}

/// Refuse an output path that would overwrite the input document.
pub fn ensure_distinct_paths(input: &Path, output: &Path) -> Result<()> {
    if input == output || resolve_on_disk(input) == resolve_on_disk(output) {
        return Err(ConfigError::OutputOverwritesInput(output.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    const SAMPLE: &str = r#"
overall:
  organization_id: "433637338589"
  billing_account: 000000-000000-000000
  allowed_apis:
    - compute.googleapis.com
audit_logs_project:
  project_id: ${LOGS_PROJECT}
  owners_group: logs-owners@example.com
  auditors_group: auditors@example.com
  audit_logs:
    logs_bigquery_dataset:
      name: all_audit_logs
      location: US
projects:
  - project_id: data-1
    owners_group: owners@example.com
    auditors_group: auditors@example.com
    audit_logs:
      logs_bigquery_dataset:
        name: data_1_logs
        location: US
    enabled_apis:
      - compute.googleapis.com
    generated_fields:
      project_number: 123456789
      log_sink_service_account: p123@gcp-sa-logging.iam.gserviceaccount.com
"#;

    #[test]
    #[serial]
    fn test_parse_sample_config() {
        temp_env::with_var("LOGS_PROJECT", Some("audit-logs"), || {
            let root = parse_config(SAMPLE).unwrap();
            assert_eq!(root.overall.organization_id.as_deref(), Some("433637338589"));
            assert_eq!(
                root.audit_logs_project.as_ref().map(|p| p.project_id.as_str()),
                Some("audit-logs")
            );
            assert_eq!(root.projects.len(), 1);

            let generated = root.projects[0].generated_fields.as_ref().unwrap();
            assert_eq!(generated.project_number, "123456789");
            assert!(root.forseti.is_none());
            assert!(validate_config(&root).is_ok());
        });
    }

    #[test]
    #[serial]
    fn test_missing_env_var() {
        temp_env::with_var_unset("LOGS_PROJECT", || {
            let err = parse_config(SAMPLE).unwrap_err();
            assert!(matches!(err, ConfigError::MissingEnvVar(ref name) if name == "LOGS_PROJECT"));
        });
    }

    #[test]
    #[serial]
    fn test_substitute_env_allows_whitespace() {
        temp_env::with_var("PF_TEST_VALUE", Some("abc"), || {
            assert_eq!(substitute_env("x: ${ PF_TEST_VALUE }").unwrap(), "x: abc");
            assert_eq!(substitute_env("no tokens").unwrap(), "no tokens");
        });
    }

    #[test]
    fn test_normalize_path_expands_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(normalize_path("~/out.yaml").unwrap(), home.join("out.yaml"));
        assert_eq!(normalize_path("/tmp/out.yaml").unwrap(), PathBuf::from("/tmp/out.yaml"));
    }

    #[test]
    fn test_normalize_path_relative() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(normalize_path("out.yaml").unwrap(), cwd.join("out.yaml"));
    }

    #[test]
    #[serial]
    fn test_load_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("project.yaml");
        fs::write(&path, SAMPLE.replace("${LOGS_PROJECT}", "audit-logs")).unwrap();

        let root = load_config(&path).unwrap();
        let yaml = to_yaml(&root).unwrap();
        let reloaded = parse_config(&yaml).unwrap();
        assert_eq!(root, reloaded);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = load_config(temp_dir.path().join("nope.yaml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_same_input_and_output_rejected() {
        let path = Path::new("/tmp/project.yaml");
        assert!(matches!(
            ensure_distinct_paths(path, path),
            Err(ConfigError::OutputOverwritesInput(_))
        ));
        assert!(ensure_distinct_paths(path, Path::new("/tmp/output.yaml")).is_ok());
    }

    #[test]
    fn test_normalize_path_collapses_parent_dirs() {
        assert_eq!(
            normalize_path("/tmp/sub/../project.yaml").unwrap(),
            PathBuf::from("/tmp/project.yaml")
        );
        assert_eq!(
            normalize_path("/tmp/./a/b/../../project.yaml").unwrap(),
            PathBuf::from("/tmp/project.yaml")
        );
    }

    #[test]
    fn test_parent_dir_output_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let input = temp_dir.path().join("project.yaml");
        fs::write(&input, "overall: {}\n").unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();

        let input = normalize_path(&input).unwrap();
        let output = normalize_path(temp_dir.path().join("sub/../project.yaml")).unwrap();
        assert!(matches!(
            ensure_distinct_paths(&input, &output),
            Err(ConfigError::OutputOverwritesInput(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_output_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let input = temp_dir.path().join("project.yaml");
        fs::write(&input, "overall: {}\n").unwrap();

        let link = temp_dir.path().join("link.yaml");
        std::os::unix::fs::symlink(&input, &link).unwrap();
        assert!(matches!(
            ensure_distinct_paths(&input, &link),
            Err(ConfigError::OutputOverwritesInput(_))
        ));

        let linked_dir = temp_dir.path().join("linked");
        std::os::unix::fs::symlink(temp_dir.path(), &linked_dir).unwrap();
        assert!(matches!(
            ensure_distinct_paths(&input, &linked_dir.join("project.yaml")),
            Err(ConfigError::OutputOverwritesInput(_))
        ));

        assert!(ensure_distinct_paths(&input, &temp_dir.path().join("output.yaml")).is_ok());
    }
}
