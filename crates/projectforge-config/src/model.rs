//! Typed provisioning config.
//!
//! Every record keeps the fields it does not know about in a flattened
//! `extra` map, so writing a loaded config back out loses nothing the
//! operator wrote.

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Catch-all for operator fields the typed model does not name.
pub type Extra = BTreeMap<String, Value>;

/// Name of the block steps write once a project is fully deployed.
pub const GENERATED_FIELDS_NAME: &str = "generated_fields";

/// The whole provisioning request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootConfig {
    pub overall: Overall,

    /// Remote project that centralises audit logs for every other project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_logs_project: Option<TargetSpec>,

    /// Monitoring (Forseti) deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forseti: Option<MonitorConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<TargetSpec>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overall {
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub organization_id: Option<String>,

    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub folder_id: Option<String>,

    #[serde(default)]
    pub billing_account: String,

    /// When set, projects may only enable APIs listed here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_apis: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Overall {
    /// Parent organization, ignoring a blank value.
    pub fn organization(&self) -> Option<&str> {
        non_blank(self.organization_id.as_deref())
    }

    /// Parent folder, ignoring a blank value.
    pub fn folder(&self) -> Option<&str> {
        non_blank(self.folder_id.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// One project's configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub project_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owners_group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auditors_group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_logs: Option<AuditLogs>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled_apis: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_buckets: Vec<DataBucket>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gce_instances: Option<Vec<GceInstance>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gce_firewall_rules: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stackdriver_alert_email: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub create_deletion_lien: bool,

    /// Completion marker: present once every canonical step has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_fields: Option<GeneratedFields>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl TargetSpec {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    pub fn has_generated_fields(&self) -> bool {
        self.generated_fields.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditLogs {
    pub logs_bigquery_dataset: LogsDataset,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_gcs_bucket: Option<LogsBucket>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogsDataset {
    pub name: String,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogsBucket {
    pub name: String,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataBucket {
    pub name_suffix: String,

    /// Users allowed to access the bucket; any other access raises an alert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_users: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GceInstance {
    pub name: String,
    pub zone: String,
    pub machine_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_boot_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_boot_image: Option<CustomBootImage>,

    #[serde(default)]
    pub start_vm: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_script: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl GceInstance {
    /// Image reference passed to the VM template.
    pub fn boot_image_name(&self) -> Option<String> {
        match (&self.existing_boot_image, &self.custom_boot_image) {
            (Some(existing), _) => Some(existing.clone()),
            (None, Some(custom)) => Some(format!("global/images/{}", custom.image_name)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomBootImage {
    pub image_name: String,
    /// Bucket path without the `gs://` scheme.
    pub gcs_path: String,
}

/// Values produced by steps rather than supplied by the operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFields {
    #[serde(default, deserialize_with = "string_or_number")]
    pub project_number: String,

    #[serde(default)]
    pub log_sink_service_account: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gce_instance_info: Option<Vec<GceInstanceInfo>>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GceInstanceInfo {
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub project: TargetSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_fields: Option<MonitorGeneratedFields>,

    /// Extra flags passed verbatim to the installer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub installer_flags: Vec<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorGeneratedFields {
    pub service_account: String,
    pub server_bucket: String,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Position of a project inside a [`RootConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetSlot {
    AuditLogs,
    Monitor,
    Project(usize),
}

impl RootConfig {
    pub fn target(&self, slot: TargetSlot) -> Option<&TargetSpec> {
        match slot {
            TargetSlot::AuditLogs => self.audit_logs_project.as_ref(),
            TargetSlot::Monitor => self.forseti.as_ref().map(|f| &f.project),
            TargetSlot::Project(index) => self.projects.get(index),
        }
    }

    pub fn target_mut(&mut self, slot: TargetSlot) -> Option<&mut TargetSpec> {
        match slot {
            TargetSlot::AuditLogs => self.audit_logs_project.as_mut(),
            TargetSlot::Monitor => self.forseti.as_mut().map(|f| &mut f.project),
            TargetSlot::Project(index) => self.projects.get_mut(index),
        }
    }

    /// Every project in the config, audit-logs project and monitor first.
    pub fn targets(&self) -> impl Iterator<Item = (TargetSlot, &TargetSpec)> {
        let audit = self
            .audit_logs_project
            .iter()
            .map(|spec| (TargetSlot::AuditLogs, spec));
        let monitor = self
            .forseti
            .iter()
            .map(|f| (TargetSlot::Monitor, &f.project));
        let projects = self
            .projects
            .iter()
            .enumerate()
            .map(|(i, spec)| (TargetSlot::Project(i), spec));
        audit.chain(monitor).chain(projects)
    }

    pub fn find(&self, project_id: &str) -> Option<(TargetSlot, &TargetSpec)> {
        self.targets().find(|(_, spec)| spec.project_id == project_id)
    }

    pub fn monitor_service_account(&self) -> Option<&str> {
        self.forseti
            .as_ref()?
            .generated_fields
            .as_ref()
            .map(|g| g.service_account.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Unsigned(u64),
    Signed(i64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Unsigned(n) => n.to_string(),
            StringOrNumber::Signed(n) => n.to_string(),
        }
    }
}

// Numeric ids are often written unquoted in YAML.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(String::from))
}
