//! Google Cloud implementation of every setup step.

use crate::deployment::{DeploymentConfig, Deployments, deployment_name};
use crate::error::GcloudError;
use crate::gcloud::{AlertPolicy, Gcloud};
use crate::monitor::Forseti;
use async_trait::async_trait;
use dialoguer::Confirm;
use projectforge_config::{
    AuditLogs, GeneratedFields, GceInstanceInfo, LogsBucket, MonitorGeneratedFields, TargetSpec,
};
use projectforge_deploy::{Step, StepContext, StepError, StepRunner};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;

type StepResult = std::result::Result<(), StepError>;

/// Log sink created by the data project template.
pub const LOG_SINK_NAME: &str = "audit-logs-to-bigquery";

/// Enabled per `gcloud services enable` call.
const API_BATCH_SIZE: usize = 10;

const IAM_API: &str = "iam.googleapis.com";

/// Runs steps with the gcloud CLI and Deployment Manager templates.
pub struct GcpStepRunner {
    gcloud: Gcloud,
    templates_dir: PathBuf,
    monitor_installer: Option<PathBuf>,
    interactive: bool,
}

impl GcpStepRunner {
    pub fn new(gcloud: Gcloud, templates_dir: impl Into<PathBuf>) -> Self {
        let interactive = !gcloud.is_dry_run();
        Self {
            gcloud,
            templates_dir: templates_dir.into(),
            monitor_installer: None,
            interactive,
        }
    }

    pub fn with_monitor_installer(mut self, installer: Option<PathBuf>) -> Self {
        self.monitor_installer = installer;
        self
    }

    /// Whether operator prompts may be shown. Off in dry runs.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn gcloud(&self) -> &Gcloud {
        &self.gcloud
    }

    fn deployments(&self) -> Deployments<'_> {
        Deployments::new(&self.gcloud, &self.templates_dir)
    }

    fn forseti(&self) -> Forseti<'_> {
        Forseti::new(&self.gcloud, self.monitor_installer.as_deref())
    }

    async fn create_project(&self, ctx: &StepContext<'_>) -> StepResult {
        tracing::info!("Creating a new GCP project...");
        let project_id = ctx.project_id();
        let overall = ctx.overall();

        let mut args = vec!["projects", "create", project_id];
        if let Some(folder_id) = overall.folder() {
            args.extend(["--folder", folder_id]);
        } else if let Some(organization_id) = overall.organization() {
            args.extend(["--organization", organization_id]);
        } else {
            tracing::info!("Deploying without a parent organization or folder");
        }

        self.gcloud.run_command(&args, None).await?;
        Ok(())
    }

    async fn setup_billing(&self, ctx: &StepContext<'_>) -> StepResult {
        tracing::info!("Setting up billing...");
        self.gcloud
            .run_command(
                &[
                    "beta",
                    "billing",
                    "projects",
                    "link",
                    ctx.project_id(),
                    "--billing-account",
                    ctx.overall().billing_account.as_str(),
                ],
                None,
            )
            .await?;
        Ok(())
    }

    async fn enable_deployment_manager(&self, ctx: &StepContext<'_>) -> StepResult {
        tracing::info!("Setting up Deployment Manager...");
        let project_id = ctx.project_id();

        self.gcloud
            .run_command(
                &[
                    "services",
                    "enable",
                    "deploymentmanager",
                    "cloudresourcemanager.googleapis.com",
                ],
                Some(project_id),
            )
            .await?;

        // Owner is revoked again at the end of deploy-project-resources.
        let dm_service_account = self
            .gcloud
            .deployment_manager_service_account(project_id)
            .await?;
        self.gcloud
            .run_command(
                &[
                    "projects",
                    "add-iam-policy-binding",
                    project_id,
                    "--member",
                    dm_service_account.as_str(),
                    "--role",
                    "roles/owner",
                ],
                None,
            )
            .await?;
        Ok(())
    }

    async fn deploy_gcs_audit_logs(&self, ctx: &StepContext<'_>) -> StepResult {
        let Some(logs_project) = ctx.audit_logs_project() else {
            tracing::info!("Using local GCS audit logs");
            return Ok(());
        };
        let project = ctx.project()?;
        let Some(logs_gcs_bucket) = audit_logs(project)?.logs_gcs_bucket.as_ref() else {
            tracing::info!("No remote GCS logs bucket required");
            return Ok(());
        };

        tracing::info!("Creating remote GCS logs bucket");
        let name = deployment_name("audit-logs", &project.project_id, "gcs");
        let properties = serde_yaml::to_value(RemoteLogsProperties {
            owners_group: required(&logs_project.owners_group, logs_project, "owners_group")?,
            auditors_group: required(&project.auditors_group, project, "auditors_group")?,
            logs_gcs_bucket: Some(logs_gcs_bucket),
            logs_bigquery_dataset: None,
        })?;

        let deployments = self.deployments();
        let config = DeploymentConfig::single(
            &deployments.template("remote_audit_logs.py"),
            name.as_str(),
            properties,
        );
        deployments
            .apply(&config, &name, &logs_project.project_id)
            .await?;
        Ok(())
    }

    async fn deploy_project_resources(&self, ctx: &StepContext<'_>) -> StepResult {
        tracing::info!("Deploying project resources...");
        let project = ctx.project()?;
        let project_id = project.project_id.as_str();
        let has_organization = ctx.overall().organization().is_some();

        let setup_account = self.gcloud.current_account().await?;
        let dm_service_account = self
            .gcloud
            .deployment_manager_service_account(project_id)
            .await?;

        let properties = data_project_properties(
            project,
            ctx.audit_logs_project(),
            has_organization,
            &setup_account,
        )?;
        let deployments = self.deployments();
        let config = DeploymentConfig::single(
            &deployments.template("data_project.py"),
            "data_project_deployment",
            properties,
        );

        // Custom roles in the template need the IAM API.
        let enabled = self.gcloud.enabled_services(project_id).await?;
        let enable_iam = !enabled.iter().any(|s| s == IAM_API);
        if enable_iam {
            self.gcloud
                .run_command(&["services", "enable", IAM_API], Some(project_id))
                .await?;
        }

        let result = self
            .deploy_data_project(
                &deployments,
                &config,
                project,
                dm_service_account.as_str(),
            )
            .await;

        if enable_iam {
            let disabled = self
                .gcloud
                .run_command(&["services", "disable", IAM_API], Some(project_id))
                .await;
            match (&result, disabled) {
                (Ok(()), Err(e)) => return Err(e.into()),
                (Err(_), Err(e)) => tracing::warn!("Failed to disable {}: {}", IAM_API, e),
                _ => {}
            }
        }
        result
    }

    async fn deploy_data_project(
        &self,
        deployments: &Deployments<'_>,
        config: &DeploymentConfig,
        project: &TargetSpec,
        dm_service_account: &str,
    ) -> StepResult {
        let project_id = project.project_id.as_str();
        deployments
            .apply(config, "data-project-deployment", project_id)
            .await?;

        if project.create_deletion_lien {
            self.gcloud
                .run_command(
                    &[
                        "alpha",
                        "resource-manager",
                        "liens",
                        "create",
                        "--restrictions",
                        "resourcemanager.projects.delete",
                        "--reason",
                        "Automated project deletion lien deployment.",
                    ],
                    Some(project_id),
                )
                .await?;
        }

        self.gcloud
            .run_command(
                &[
                    "projects",
                    "remove-iam-policy-binding",
                    project_id,
                    "--member",
                    dm_service_account,
                    "--role",
                    "roles/owner",
                ],
                None,
            )
            .await?;
        Ok(())
    }

    async fn deploy_bigquery_audit_logs(&self, ctx: &StepContext<'_>) -> StepResult {
        let project = ctx.project()?;
        let project_id = project.project_id.as_str();
        let mut dataset = serde_yaml::to_value(&audit_logs(project)?.logs_bigquery_dataset)?;

        let (audit_project_id, owners_group) = match ctx.audit_logs_project() {
            Some(logs_project) => {
                tracing::info!("Creating remote BigQuery logs dataset");
                (
                    logs_project.project_id.as_str(),
                    required(&logs_project.owners_group, logs_project, "owners_group")?,
                )
            }
            None => {
                tracing::info!("Creating local BigQuery logs dataset");
                insert(&mut dataset, "name", Value::from("audit_logs"));
                (
                    project_id,
                    required(&project.owners_group, project, "owners_group")?,
                )
            }
        };

        let sink_account = self
            .gcloud
            .log_sink_service_account(LOG_SINK_NAME, project_id)
            .await?;
        insert(&mut dataset, "log_sink_service_account", Value::from(sink_account));

        let name = deployment_name("audit-logs", project_id, "bq");
        let properties = serde_yaml::to_value(RemoteLogsProperties {
            owners_group,
            auditors_group: required(&project.auditors_group, project, "auditors_group")?,
            logs_gcs_bucket: None,
            logs_bigquery_dataset: Some(dataset),
        })?;

        let deployments = self.deployments();
        let config = DeploymentConfig::single(
            &deployments.template("remote_audit_logs.py"),
            name.as_str(),
            properties,
        );
        deployments.apply(&config, &name, audit_project_id).await?;
        Ok(())
    }

    async fn create_compute_images(&self, ctx: &StepContext<'_>) -> StepResult {
        let project = ctx.project()?;
        let instances = project.gce_instances.as_deref().unwrap_or_default();
        if instances.is_empty() {
            tracing::info!("No GCE images required");
            return Ok(());
        }

        for instance in instances {
            let Some(custom) = &instance.custom_boot_image else {
                tracing::info!(
                    "Using existing compute image {}",
                    instance.existing_boot_image.as_deref().unwrap_or_default()
                );
                continue;
            };

            let filter = format!("name={}", custom.image_name);
            let existing = self
                .gcloud
                .run_command(
                    &[
                        "compute",
                        "images",
                        "list",
                        "--no-standard-images",
                        "--filter",
                        filter.as_str(),
                        "--format",
                        "value(name)",
                    ],
                    Some(project.project_id.as_str()),
                )
                .await?;
            if !existing.trim().is_empty() {
                tracing::info!(
                    "Image {} already exists, skipping image creation",
                    custom.image_name
                );
                continue;
            }

            tracing::info!("Creating VM image {}", custom.image_name);
            let source_uri = format!("gs://{}", custom.gcs_path);
            self.gcloud
                .run_command(
                    &[
                        "compute",
                        "images",
                        "create",
                        custom.image_name.as_str(),
                        "--source-uri",
                        source_uri.as_str(),
                    ],
                    Some(project.project_id.as_str()),
                )
                .await?;
        }
        Ok(())
    }

    async fn create_compute_vms(&self, ctx: &StepContext<'_>) -> StepResult {
        let project = ctx.project()?;
        let Some(instances) = &project.gce_instances else {
            tracing::info!("No GCE VMs required");
            return Ok(());
        };
        let project_id = project.project_id.as_str();
        tracing::info!("Creating GCE VMs");

        // OS Login for VM SSH access.
        self.gcloud
            .run_command(
                &[
                    "compute",
                    "project-info",
                    "add-metadata",
                    "--metadata",
                    "enable-oslogin=TRUE",
                ],
                Some(project_id),
            )
            .await?;

        let mut vms = Vec::with_capacity(instances.len());
        for instance in instances {
            let boot_image_name = instance.boot_image_name().ok_or_else(|| {
                StepError::MissingField(format!(
                    "{}.gce_instances.{}.existing_boot_image",
                    project_id, instance.name
                ))
            })?;
            vms.push(VmProperties {
                name: &instance.name,
                zone: &instance.zone,
                machine_type: &instance.machine_type,
                boot_image_name,
                start_vm: instance.start_vm,
                metadata: instance
                    .startup_script
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .map(|script| VmMetadata {
                        items: vec![MetadataItem {
                            key: "startup-script",
                            value: script,
                        }],
                    }),
            });
        }

        let properties = serde_yaml::to_value(GceProperties {
            gce_instances: vms,
            firewall_rules: &project.gce_firewall_rules,
        })?;
        let deployments = self.deployments();
        let config =
            DeploymentConfig::single(&deployments.template("gce_vms.py"), "gce-vms", properties);
        deployments.apply(&config, "gce-vms", project_id).await?;
        Ok(())
    }

    async fn enable_apis(&self, ctx: &StepContext<'_>) -> StepResult {
        tracing::info!("Enabling APIs...");
        let project = ctx.project()?;
        for batch in project.enabled_apis.chunks(API_BATCH_SIZE) {
            let mut args = vec!["services", "enable"];
            args.extend(batch.iter().map(String::as_str));
            self.gcloud
                .run_command(&args, Some(project.project_id.as_str()))
                .await?;
        }
        Ok(())
    }

    async fn create_stackdriver_account(&self, ctx: &StepContext<'_>) -> StepResult {
        let project = ctx.project()?;
        if project.stackdriver_alert_email.is_none() {
            tracing::warn!(
                "No Stackdriver alert email specified, skipping creation of Stackdriver account"
            );
            return Ok(());
        }
        let project_id = project.project_id.as_str();

        if !self.interactive {
            tracing::warn!(
                "Not interactive, skipping Stackdriver account confirmation for {}",
                project_id
            );
            return Ok(());
        }

        tracing::info!("Creating Stackdriver account");
        println!("{}", stackdriver_instructions(project_id));

        loop {
            let confirmed = tokio::task::spawn_blocking(|| {
                Confirm::new()
                    .with_prompt("Account created?")
                    .default(false)
                    .interact()
            })
            .await
            .map_err(|e| StepError::External(Box::new(e)))?
            .map_err(GcloudError::from)?;

            if !confirmed {
                tracing::warn!("Skipping creation of Stackdriver account");
                return Ok(());
            }

            match self
                .gcloud
                .run_command(&["alpha", "monitoring", "policies", "list"], Some(project_id))
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) => {
                    tracing::error!("Error reading Stackdriver account: {}", e);
                    println!("Could not find Stackdriver account.");
                }
            }
        }
    }

    async fn create_alerts(&self, ctx: &StepContext<'_>) -> StepResult {
        let project = ctx.project()?;
        let Some(alert_email) = project.stackdriver_alert_email.as_deref() else {
            tracing::warn!(
                "No Stackdriver alert email specified, skipping creation of Stackdriver alerts"
            );
            return Ok(());
        };
        let project_id = project.project_id.as_str();

        tracing::info!("Creating Stackdriver notification channel");
        let channel = self
            .gcloud
            .create_notification_channel(alert_email, project_id)
            .await?;

        tracing::info!("Creating Stackdriver alerts");
        let fixed = [
            (
                &["global", "pubsub_topic", "pubsub_subscription", "gce_instance"][..],
                "iam-policy-change-count",
                "IAM Policy Change Alert",
                "This policy ensures the designated user/group is notified when IAM policies are altered.",
            ),
            (
                &["gcs_bucket"][..],
                "bucket-permission-change-count",
                "Bucket Permission Change Alert",
                "This policy ensures the designated user/group is notified when bucket/object permissions are altered.",
            ),
            (
                &["global"][..],
                "bigquery-settings-change-count",
                "Bigquery Update Alert",
                "This policy ensures the designated user/group is notified when Bigquery dataset settings are altered.",
            ),
        ];
        for (resource_types, metric_name, display_name, description) in fixed {
            let policy = AlertPolicy {
                resource_types,
                metric_name: metric_name.to_string(),
                display_name: display_name.to_string(),
                description: description.to_string(),
                channel: &channel,
            };
            self.gcloud.create_alert_policy(&policy, project_id).await?;
        }

        for bucket in &project.data_buckets {
            if bucket.expected_users.is_none() {
                continue;
            }
            let bucket_name = format!("{}{}", project_id, bucket.name_suffix);
            let policy = AlertPolicy {
                resource_types: &["gcs_bucket"],
                metric_name: format!("unexpected-access-{bucket_name}"),
                display_name: format!("Unexpected Access to {bucket_name} Alert"),
                description: format!(
                    "This policy ensures the designated user/group is notified when bucket {bucket_name} is accessed by an unexpected user."
                ),
                channel: &channel,
            };
            self.gcloud.create_alert_policy(&policy, project_id).await?;
        }
        Ok(())
    }

    async fn add_generated_fields(&self, ctx: &mut StepContext<'_>) -> StepResult {
        let project_id = ctx.project_id().to_string();
        tracing::info!("Adding project post deployment fields for {}", project_id);
        if ctx.project()?.has_generated_fields() {
            return Ok(());
        }

        let project_number = self.gcloud.project_number(&project_id).await?;
        let log_sink_service_account = self
            .gcloud
            .log_sink_service_account(LOG_SINK_NAME, &project_id)
            .await?;
        let instances: Vec<GceInstanceInfo> = self
            .gcloud
            .instances(&project_id)
            .await?
            .into_iter()
            .map(|i| GceInstanceInfo {
                name: i.name,
                id: i.id,
            })
            .collect();

        ctx.project_mut()?.generated_fields = Some(GeneratedFields {
            project_number,
            log_sink_service_account,
            gce_instance_info: Some(instances).filter(|i| !i.is_empty()),
            ..GeneratedFields::default()
        });
        Ok(())
    }

    async fn install_monitor(&self, ctx: &mut StepContext<'_>) -> StepResult {
        let config = ctx
            .root()
            .forseti
            .clone()
            .ok_or_else(|| StepError::MissingField("forseti".to_string()))?;
        let project_id = config.project.project_id.as_str();

        let forseti = self.forseti();
        forseti.install(&config).await?;
        let service_account = forseti.server_service_account(project_id).await?;
        let server_bucket = forseti.server_bucket(project_id).await?;

        if let Some(monitor) = ctx.root_mut().forseti.as_mut() {
            monitor.generated_fields = Some(MonitorGeneratedFields {
                service_account,
                server_bucket,
                ..MonitorGeneratedFields::default()
            });
        }
        Ok(())
    }

    async fn grant_monitor_access(&self, ctx: &StepContext<'_>, project_id: &str) -> StepResult {
        let service_account = ctx.root().monitor_service_account().ok_or_else(|| {
            StepError::MissingField("forseti.generated_fields.service_account".to_string())
        })?;
        tracing::info!(
            "Granting Forseti service account access to project {}",
            project_id
        );
        self.forseti()
            .grant_access(project_id, service_account)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StepRunner for GcpStepRunner {
    async fn run_step(&self, step: &Step, ctx: &mut StepContext<'_>) -> StepResult {
        match step {
            Step::CreateProject => self.create_project(ctx).await,
            Step::SetupBilling => self.setup_billing(ctx).await,
            Step::EnableDeploymentManager => self.enable_deployment_manager(ctx).await,
            Step::DeployGcsAuditLogs => self.deploy_gcs_audit_logs(ctx).await,
            Step::DeployProjectResources => self.deploy_project_resources(ctx).await,
            Step::DeployBigqueryAuditLogs => self.deploy_bigquery_audit_logs(ctx).await,
            Step::CreateComputeImages => self.create_compute_images(ctx).await,
            Step::CreateComputeVms => self.create_compute_vms(ctx).await,
            Step::EnableApis => self.enable_apis(ctx).await,
            Step::CreateStackdriverAccount => self.create_stackdriver_account(ctx).await,
            Step::CreateAlerts => self.create_alerts(ctx).await,
            Step::AddGeneratedFields => self.add_generated_fields(ctx).await,
            Step::InstallMonitor => self.install_monitor(ctx).await,
            Step::GrantMonitorAccess { project_id } => {
                self.grant_monitor_access(ctx, project_id).await
            }
        }
    }
}

#[derive(Serialize)]
struct RemoteLogsProperties<'a> {
    owners_group: &'a str,
    auditors_group: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    logs_gcs_bucket: Option<&'a LogsBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logs_bigquery_dataset: Option<Value>,
}

#[derive(Serialize)]
struct GceProperties<'a> {
    gce_instances: Vec<VmProperties<'a>>,
    firewall_rules: &'a [Value],
}

#[derive(Serialize)]
struct VmProperties<'a> {
    name: &'a str,
    zone: &'a str,
    machine_type: &'a str,
    boot_image_name: String,
    start_vm: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<VmMetadata<'a>>,
}

#[derive(Serialize)]
struct VmMetadata<'a> {
    items: Vec<MetadataItem<'a>>,
}

#[derive(Serialize)]
struct MetadataItem<'a> {
    key: &'a str,
    value: &'a str,
}

/// Properties for the data project template: the project's own fields with
/// `audit_logs` rewritten as local or remote audit log settings.
pub fn data_project_properties(
    project: &TargetSpec,
    audit_logs_project: Option<&TargetSpec>,
    has_organization: bool,
    setup_account: &str,
) -> std::result::Result<Value, StepError> {
    let logs = audit_logs(project)?;
    let mut properties = serde_yaml::to_value(project)?;
    if let Value::Mapping(map) = &mut properties {
        map.remove("audit_logs");
        map.remove(projectforge_config::GENERATED_FIELDS_NAME);
    }

    insert(&mut properties, "has_organization", Value::from(has_organization));
    // Drop the operator's own owner grant once the org owns the project.
    if has_organization {
        insert(&mut properties, "remove_owner_user", Value::from(setup_account));
    }

    match audit_logs_project {
        Some(logs_project) => {
            let mut remote = Mapping::new();
            remote.insert(
                "audit_logs_project_id".into(),
                logs_project.project_id.as_str().into(),
            );
            remote.insert(
                "logs_bigquery_dataset_id".into(),
                logs.logs_bigquery_dataset.name.as_str().into(),
            );
            if let Some(bucket) = &logs.logs_gcs_bucket {
                remote.insert("logs_gcs_bucket_name".into(), bucket.name.as_str().into());
            }
            insert(&mut properties, "remote_audit_logs", Value::Mapping(remote));
        }
        None => {
            insert(&mut properties, "local_audit_logs", serde_yaml::to_value(logs)?);
        }
    }
    Ok(properties)
}

fn audit_logs(project: &TargetSpec) -> std::result::Result<&AuditLogs, StepError> {
    project
        .audit_logs
        .as_ref()
        .ok_or_else(|| StepError::MissingField(format!("{}.audit_logs", project.project_id)))
}

fn required<'a>(
    value: &'a Option<String>,
    project: &TargetSpec,
    field: &str,
) -> std::result::Result<&'a str, StepError> {
    value
        .as_deref()
        .ok_or_else(|| StepError::MissingField(format!("{}.{}", project.project_id, field)))
}

fn insert(value: &mut Value, key: &str, entry: Value) {
    if let Value::Mapping(map) = value {
        map.insert(Value::from(key), entry);
    }
}

fn stackdriver_instructions(project_id: &str) -> String {
    format!(
        r#"
------------------------------------------------------------------------------
To create email alerts, this project needs a Stackdriver account.
Create a new Stackdriver account for this project by visiting:
    https://console.cloud.google.com/monitoring?project={project_id}

Only add this project, and skip steps for adding additional GCP or AWS
projects. You don't need to install Stackdriver Agents.

IMPORTANT: Wait about 5 minutes for the account to be created.

For more information, see: https://cloud.google.com/monitoring/accounts/

After the account is created, answer [y] to continue, or [N] to skip the
creation of Stackdriver alerts.
------------------------------------------------------------------------------
"#
    )
}
