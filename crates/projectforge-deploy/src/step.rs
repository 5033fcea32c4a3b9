//! The setup steps applied to each project.
//!
//! Steps are plain data: the canonical sequence is fixed, and extra steps
//! carry the parameters they need instead of capturing them.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    /// Create the project under the configured folder or organization.
    CreateProject,
    /// Link the billing account.
    SetupBilling,
    /// Enable Deployment Manager and grant its service account owner.
    EnableDeploymentManager,
    /// Create the GCS logs bucket in the shared audit-logs project.
    DeployGcsAuditLogs,
    /// Deploy the data project template.
    DeployProjectResources,
    /// Create the BigQuery audit-log dataset.
    DeployBigqueryAuditLogs,
    /// Create custom VM images.
    CreateComputeImages,
    /// Create VMs and firewall rules.
    CreateComputeVms,
    /// Enable the project's requested APIs.
    EnableApis,
    /// Ask the operator to create a Stackdriver account.
    CreateStackdriverAccount,
    /// Create the notification channel and alert policies.
    CreateAlerts,
    /// Record generated fields; marks the project as deployed.
    AddGeneratedFields,
    /// Install the monitoring tool into its own project.
    InstallMonitor,
    /// Grant the monitoring service account access to a project.
    GrantMonitorAccess { project_id: String },
}

impl Step {
    /// The fixed setup sequence every project goes through.
    pub fn canonical() -> Vec<Self> {
        vec![
            Self::CreateProject,
            Self::SetupBilling,
            Self::EnableDeploymentManager,
            Self::DeployGcsAuditLogs,
            Self::DeployProjectResources,
            Self::DeployBigqueryAuditLogs,
            Self::CreateComputeImages,
            Self::CreateComputeVms,
            Self::EnableApis,
            Self::CreateStackdriverAccount,
            Self::CreateAlerts,
            Self::AddGeneratedFields,
        ]
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::CreateProject => "create-project",
            Self::SetupBilling => "setup-billing",
            Self::EnableDeploymentManager => "enable-deployment-manager",
            Self::DeployGcsAuditLogs => "deploy-gcs-audit-logs",
            Self::DeployProjectResources => "deploy-project-resources",
            Self::DeployBigqueryAuditLogs => "deploy-bigquery-audit-logs",
            Self::CreateComputeImages => "create-compute-images",
            Self::CreateComputeVms => "create-compute-vms",
            Self::EnableApis => "enable-apis",
            Self::CreateStackdriverAccount => "create-stackdriver-account",
            Self::CreateAlerts => "create-alerts",
            Self::AddGeneratedFields => "add-generated-fields",
            Self::InstallMonitor => "install-monitor",
            Self::GrantMonitorAccess { .. } => "grant-monitor-access",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GrantMonitorAccess { project_id } => {
                write!(f, "grant monitor access to {project_id}")
            }
            other => f.write_str(other.id()),
        }
    }
}
