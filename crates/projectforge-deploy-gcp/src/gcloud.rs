//! gcloud CLI wrapper
//!
//! Every call into Google Cloud goes through [`Gcloud::run_command`]. In
//! dry-run mode commands are logged and recorded instead of executed, and
//! return empty output.

use crate::error::{GcloudError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;

/// Placeholder returned by lookups during a dry run.
pub const DRY_RUN_PLACEHOLDER: &str = "__DRY_RUN__";

/// gcloud CLI wrapper
pub struct Gcloud {
    binary: String,
    dry_run: bool,
    issued: Mutex<Vec<Vec<String>>>,
}

impl Default for Gcloud {
    fn default() -> Self {
        Self::new()
    }
}

impl Gcloud {
    pub fn new() -> Self {
        Self {
            binary: "gcloud".to_string(),
            dry_run: false,
            issued: Mutex::new(Vec::new()),
        }
    }

    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::new()
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Commands recorded during a dry run, without the binary name.
    pub fn issued(&self) -> Vec<Vec<String>> {
        self.issued
            .lock()
            .map(|issued| issued.clone())
            .unwrap_or_default()
    }

    /// Check that the gcloud binary is on the PATH.
    pub async fn check_installed(&self) -> Result<()> {
        let which = Command::new("which").arg(&self.binary).output().await?;
        if !which.status.success() {
            return Err(GcloudError::NotInstalled);
        }
        Ok(())
    }

    /// Run a gcloud command and return stdout. `project_id` adds `--project`.
    pub async fn run_command(&self, args: &[&str], project_id: Option<&str>) -> Result<String> {
        let mut full: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        if let Some(project_id) = project_id {
            full.push("--project".to_string());
            full.push(project_id.to_string());
        }

        if self.dry_run {
            tracing::info!("Dry run: {} {}", self.binary, full.join(" "));
            if let Ok(mut issued) = self.issued.lock() {
                issued.push(full);
            }
            return Ok(String::new());
        }

        tracing::debug!("Running: {} {}", self.binary, full.join(" "));

        let output = Command::new(&self.binary)
            .args(&full)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GcloudError::CommandFailed(format!(
                "{} {}: {}",
                self.binary,
                full.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a lookup that must produce a single value.
    async fn lookup(&self, args: &[&str], project_id: Option<&str>) -> Result<String> {
        let output = self.run_command(args, project_id).await?;
        if self.dry_run {
            return Ok(DRY_RUN_PLACEHOLDER.to_string());
        }

        let value = output.trim();
        if value.is_empty() {
            return Err(GcloudError::UnexpectedOutput(format!(
                "no value returned by: {}",
                args.join(" ")
            )));
        }
        Ok(value.to_string())
    }

    pub async fn project_number(&self, project_id: &str) -> Result<String> {
        self.lookup(
            &["projects", "describe", project_id, "--format", "value(projectNumber)"],
            None,
        )
        .await
    }

    /// IAM member of the project's Deployment Manager (Google APIs) service
    /// account.
    pub async fn deployment_manager_service_account(&self, project_id: &str) -> Result<String> {
        let number = self.project_number(project_id).await?;
        Ok(format!(
            "serviceAccount:{number}@cloudservices.gserviceaccount.com"
        ))
    }

    /// Account gcloud is authenticated as.
    pub async fn current_account(&self) -> Result<String> {
        self.lookup(&["config", "get-value", "account"], None).await
    }

    pub async fn enabled_services(&self, project_id: &str) -> Result<Vec<String>> {
        let output = self
            .run_command(
                &["services", "list", "--format", "value(NAME)"],
                Some(project_id),
            )
            .await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn log_sink_service_account(&self, sink_name: &str, project_id: &str) -> Result<String> {
        self.lookup(
            &[
                "logging",
                "sinks",
                "describe",
                sink_name,
                "--format",
                "value(writerIdentity)",
            ],
            Some(project_id),
        )
        .await
    }

    pub async fn instances(&self, project_id: &str) -> Result<Vec<InstanceInfo>> {
        let output = self
            .run_command(
                &["compute", "instances", "list", "--format", "json"],
                Some(project_id),
            )
            .await?;

        if output.trim().is_empty() || output.trim() == "[]" {
            return Ok(Vec::new());
        }

        let instances: Vec<InstanceInfo> = serde_json::from_str(&output)?;
        Ok(instances)
    }

    /// Create an email notification channel and return its resource name.
    pub async fn create_notification_channel(&self, email: &str, project_id: &str) -> Result<String> {
        let label = format!("email_address={email}");
        self.lookup(
            &[
                "alpha",
                "monitoring",
                "channels",
                "create",
                "--display-name",
                "Email",
                "--type",
                "email",
                "--channel-labels",
                label.as_str(),
                "--format",
                "value(name)",
            ],
            Some(project_id),
        )
        .await
    }

    pub async fn create_alert_policy(&self, policy: &AlertPolicy<'_>, project_id: &str) -> Result<()> {
        let body = serde_json::to_string(&policy.to_json())?;
        self.run_command(
            &["alpha", "monitoring", "policies", "create", "--policy", body.as_str()],
            Some(project_id),
        )
        .await?;
        Ok(())
    }
}

/// Instance information from `compute instances list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub name: String,
    pub id: String,
}

/// Alert firing on any count of a logs-based metric.
#[derive(Debug, Clone)]
pub struct AlertPolicy<'a> {
    pub resource_types: &'a [&'a str],
    pub metric_name: String,
    pub display_name: String,
    pub description: String,
    pub channel: &'a str,
}

impl AlertPolicy<'_> {
    pub fn to_json(&self) -> serde_json::Value {
        let conditions: Vec<_> = self
            .resource_types
            .iter()
            .map(|resource_type| {
                json!({
                    "displayName": format!(
                        "No tolerance on {} for resource type {}",
                        self.metric_name, resource_type
                    ),
                    "conditionThreshold": {
                        "filter": format!(
                            "resource.type=\"{}\" AND metric.type=\"logging.googleapis.com/user/{}\"",
                            resource_type, self.metric_name
                        ),
                        "comparison": "COMPARISON_GT",
                        "thresholdValue": 0,
                        "duration": "0s",
                    },
                })
            })
            .collect();

        json!({
            "displayName": self.display_name,
            "documentation": {
                "content": self.description,
                "mimeType": "text/markdown",
            },
            "conditions": conditions,
            "combiner": "OR",
            "notificationChannels": [self.channel],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_records_commands() {
        let gcloud = Gcloud::dry_run();
        let output = gcloud
            .run_command(&["services", "enable", "a", "b"], Some("p1"))
            .await
            .unwrap();

        assert!(output.is_empty());
        assert_eq!(
            gcloud.issued(),
            vec![vec!["services", "enable", "a", "b", "--project", "p1"]]
        );
    }

    #[tokio::test]
    async fn test_dry_run_lookups_return_placeholder() {
        let gcloud = Gcloud::dry_run();
        assert_eq!(gcloud.project_number("p1").await.unwrap(), DRY_RUN_PLACEHOLDER);
        assert_eq!(
            gcloud.deployment_manager_service_account("p1").await.unwrap(),
            format!("serviceAccount:{DRY_RUN_PLACEHOLDER}@cloudservices.gserviceaccount.com")
        );
        assert!(gcloud.instances("p1").await.unwrap().is_empty());
        assert!(gcloud.enabled_services("p1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_command_reports_stderr() {
        // `false` ignores its arguments and exits non-zero.
        let gcloud = Gcloud::new().with_binary("false");
        let err = gcloud.run_command(&["projects", "list"], None).await.unwrap_err();
        assert!(matches!(err, GcloudError::CommandFailed(ref msg) if msg.contains("projects list")));
    }

    #[test]
    fn test_alert_policy_json() {
        let policy = AlertPolicy {
            resource_types: &["global", "gcs_bucket"],
            metric_name: "iam-policy-change-count".to_string(),
            display_name: "IAM Policy Change Alert".to_string(),
            description: "IAM changed".to_string(),
            channel: "projects/p1/notificationChannels/7",
        };
        let value = policy.to_json();

        assert_eq!(value["displayName"], "IAM Policy Change Alert");
        assert_eq!(value["conditions"].as_array().unwrap().len(), 2);
        assert_eq!(
            value["conditions"][1]["conditionThreshold"]["filter"],
            "resource.type=\"gcs_bucket\" AND metric.type=\"logging.googleapis.com/user/iam-policy-change-count\""
        );
        assert_eq!(value["notificationChannels"][0], "projects/p1/notificationChannels/7");
    }
}
