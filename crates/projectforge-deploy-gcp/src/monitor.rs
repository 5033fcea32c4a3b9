//! Forseti monitoring helpers
//!
//! Installs the Forseti server into the monitor project and grants its
//! service account read access to monitored projects.

use crate::error::{GcloudError, Result};
use crate::gcloud::{DRY_RUN_PLACEHOLDER, Gcloud};
use projectforge_config::MonitorConfig;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Roles the Forseti server needs on every monitored project.
pub const SERVER_ROLES: &[&str] = &[
    "roles/appengine.appViewer",
    "roles/bigquery.metadataViewer",
    "roles/browser",
    "roles/cloudasset.viewer",
    "roles/cloudsql.viewer",
    "roles/compute.networkViewer",
    "roles/iam.securityReviewer",
    "roles/servicemanagement.quotaViewer",
    "roles/serviceusage.serviceUsageConsumer",
];

const SERVER_PREFIX: &str = "forseti-server";

pub struct Forseti<'a> {
    gcloud: &'a Gcloud,
    installer: Option<&'a Path>,
}

impl<'a> Forseti<'a> {
    pub fn new(gcloud: &'a Gcloud, installer: Option<&'a Path>) -> Self {
        Self { gcloud, installer }
    }

    fn installer_script(&self) -> Result<PathBuf> {
        let dir = self.installer.ok_or_else(|| {
            GcloudError::InstallerFailed(
                "no installer configured, pass --monitor-installer".to_string(),
            )
        })?;
        Ok(dir.join("install").join("gcp_installer.py"))
    }

    /// Run the Forseti installer against the monitor project.
    pub async fn install(&self, config: &MonitorConfig) -> Result<()> {
        let script = self.installer_script()?;
        let project_id = config.project.project_id.as_str();

        let mut args = vec![
            script.display().to_string(),
            "--no-cloudshell".to_string(),
            "--project-id".to_string(),
            project_id.to_string(),
        ];
        args.extend(config.installer_flags.iter().cloned());

        if self.gcloud.is_dry_run() {
            tracing::info!("Dry run: python3 {}", args.join(" "));
            return Ok(());
        }

        tracing::info!("Installing Forseti into {}", project_id);
        let status = Command::new("python3")
            .args(&args)
            .current_dir(script.parent().unwrap_or(Path::new(".")))
            .stdin(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(GcloudError::InstallerFailed(format!(
                "installer exited with {status}"
            )));
        }
        Ok(())
    }

    pub async fn server_service_account(&self, project_id: &str) -> Result<String> {
        let filter = format!("email:{SERVER_PREFIX}-gcp-*");
        let output = self
            .gcloud
            .run_command(
                &[
                    "iam",
                    "service-accounts",
                    "list",
                    "--format",
                    "value(email)",
                    "--filter",
                    filter.as_str(),
                ],
                Some(project_id),
            )
            .await?;
        first_line(self.gcloud, &output, "Forseti server service account")
    }

    pub async fn server_bucket(&self, project_id: &str) -> Result<String> {
        let filter = format!("name:{SERVER_PREFIX}-*");
        let output = self
            .gcloud
            .run_command(
                &[
                    "storage",
                    "buckets",
                    "list",
                    "--format",
                    "value(name)",
                    "--filter",
                    filter.as_str(),
                ],
                Some(project_id),
            )
            .await?;
        let bucket = first_line(self.gcloud, &output, "Forseti server bucket")?;
        Ok(format!("gs://{bucket}"))
    }

    /// Grant `service_account` every server role on `project_id`.
    pub async fn grant_access(&self, project_id: &str, service_account: &str) -> Result<()> {
        let member = format!("serviceAccount:{service_account}");
        for &role in SERVER_ROLES {
            self.gcloud
                .run_command(
                    &[
                        "projects",
                        "add-iam-policy-binding",
                        project_id,
                        "--member",
                        member.as_str(),
                        "--role",
                        role,
                    ],
                    None,
                )
                .await?;
        }
        Ok(())
    }
}

fn first_line(gcloud: &Gcloud, output: &str, what: &str) -> Result<String> {
    if gcloud.is_dry_run() {
        return Ok(DRY_RUN_PLACEHOLDER.to_string());
    }
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .ok_or_else(|| GcloudError::UnexpectedOutput(format!("{what} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use projectforge_config::TargetSpec;

    #[tokio::test]
    async fn test_grant_access_binds_every_role() {
        let gcloud = Gcloud::dry_run();
        Forseti::new(&gcloud, None)
            .grant_access("data-1", "forseti@monitor.iam.gserviceaccount.com")
            .await
            .unwrap();

        let issued = gcloud.issued();
        assert_eq!(issued.len(), SERVER_ROLES.len());
        assert!(issued.iter().all(|cmd| cmd[2] == "data-1"
            && cmd[4] == "serviceAccount:forseti@monitor.iam.gserviceaccount.com"));
        assert_eq!(issued[2][6], "roles/browser");
    }

    #[tokio::test]
    async fn test_install_requires_installer() {
        let gcloud = Gcloud::dry_run();
        let config = MonitorConfig {
            project: TargetSpec::new("monitor"),
            ..MonitorConfig::default()
        };

        let err = Forseti::new(&gcloud, None).install(&config).await.unwrap_err();
        assert!(matches!(err, GcloudError::InstallerFailed(_)));

        Forseti::new(&gcloud, Some(Path::new("/opt/forseti")))
            .install(&config)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_server_bucket() {
        let gcloud = Gcloud::dry_run();
        let bucket = Forseti::new(&gcloud, None).server_bucket("monitor").await.unwrap();
        assert_eq!(bucket, format!("gs://{DRY_RUN_PLACEHOLDER}"));
    }
}
