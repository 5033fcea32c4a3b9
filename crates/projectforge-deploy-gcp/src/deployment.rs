//! Deployment Manager deployments
//!
//! Each deployment imports one template and declares one resource of that
//! template's type. The config is written to a temporary YAML file for the
//! duration of the gcloud call.

use crate::error::Result;
use crate::gcloud::Gcloud;
use serde::Serialize;
use serde_yaml::Value;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentConfig {
    pub imports: Vec<TemplateImport>,
    pub resources: Vec<DeploymentResource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateImport {
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentResource {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub properties: Value,
}

impl DeploymentConfig {
    /// A config deploying a single resource from `template`.
    pub fn single(template: &Path, name: impl Into<String>, properties: Value) -> Self {
        let path = template.display().to_string();
        Self {
            imports: vec![TemplateImport { path: path.clone() }],
            resources: vec![DeploymentResource {
                kind: path,
                name: name.into(),
                properties,
            }],
        }
    }
}

/// Creates or updates Deployment Manager deployments from local templates.
pub struct Deployments<'a> {
    gcloud: &'a Gcloud,
    templates_dir: &'a Path,
}

impl<'a> Deployments<'a> {
    pub fn new(gcloud: &'a Gcloud, templates_dir: &'a Path) -> Self {
        Self {
            gcloud,
            templates_dir,
        }
    }

    pub fn template(&self, file_name: &str) -> PathBuf {
        self.templates_dir.join(file_name)
    }

    async fn exists(&self, name: &str, project_id: &str) -> Result<bool> {
        let output = self
            .gcloud
            .run_command(
                &[
                    "deployment-manager",
                    "deployments",
                    "list",
                    "--format",
                    "value(name)",
                ],
                Some(project_id),
            )
            .await?;
        Ok(output.lines().any(|line| line.trim() == name))
    }

    /// Create the deployment, or update it when a previous attempt already
    /// created one with the same name.
    pub async fn apply(&self, config: &DeploymentConfig, name: &str, project_id: &str) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("projectforge-dm-")
            .suffix(".yaml")
            .tempfile()?;
        file.write_all(serde_yaml::to_string(config)?.as_bytes())?;
        file.flush()?;
        let config_path = file.path().display().to_string();

        let action = if self.exists(name, project_id).await? {
            tracing::info!("Updating existing deployment {} in {}", name, project_id);
            "update"
        } else {
            tracing::info!("Creating deployment {} in {}", name, project_id);
            "create"
        };

        let mut args = vec![
            "deployment-manager",
            "deployments",
            action,
            name,
            "--config",
            config_path.as_str(),
        ];
        if action == "create" {
            args.push("--automatic-rollback-on-error");
        }

        self.gcloud.run_command(&args, Some(project_id)).await?;
        Ok(())
    }
}

/// Deployment Manager rejects underscores in deployment names.
pub fn deployment_name(prefix: &str, project_id: &str, suffix: &str) -> String {
    format!("{}-{}-{}", prefix, project_id.replace('_', "-"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_name_replaces_underscores() {
        assert_eq!(
            deployment_name("audit-logs", "my_data_project", "gcs"),
            "audit-logs-my-data-project-gcs"
        );
    }

    #[test]
    fn test_single_resource_config() {
        let config = DeploymentConfig::single(
            Path::new("/templates/gce_vms.py"),
            "gce-vms",
            serde_yaml::from_str("gce_instances: []").unwrap(),
        );
        let yaml = serde_yaml::to_string(&config).unwrap();

        assert!(yaml.contains("path: /templates/gce_vms.py"));
        assert!(yaml.contains("type: /templates/gce_vms.py"));
        assert!(yaml.contains("name: gce-vms"));
    }

    #[tokio::test]
    async fn test_apply_creates_when_absent() {
        let gcloud = Gcloud::dry_run();
        let deployments = Deployments::new(&gcloud, Path::new("/templates"));
        let config = DeploymentConfig::single(
            &deployments.template("data_project.py"),
            "data_project_deployment",
            Value::Null,
        );

        deployments
            .apply(&config, "data-project-deployment", "p1")
            .await
            .unwrap();

        let issued = gcloud.issued();
        assert_eq!(issued.len(), 2);
        assert_eq!(issued[0][2], "list");
        assert_eq!(
            issued[1][..4],
            ["deployment-manager", "deployments", "create", "data-project-deployment"]
        );
        assert!(issued[1].contains(&"--automatic-rollback-on-error".to_string()));
    }
}
