//! Structural checks run once after loading, before any planning.

use crate::error::{ConfigError, Result};
use crate::model::{RootConfig, TargetSlot, TargetSpec};
use std::collections::{BTreeMap, HashSet};

/// Check the config shape; every problem found is reported at once.
pub fn validate_config(root: &RootConfig) -> Result<()> {
    let mut problems = Vec::new();

    if root.overall.billing_account.trim().is_empty() {
        problems.push("overall.billing_account is required".to_string());
    }

    let mut seen = HashSet::new();
    for (slot, spec) in root.targets() {
        let location = describe_slot(slot);
        if spec.project_id.trim().is_empty() {
            problems.push(format!("{location}: project_id is required"));
            continue;
        }
        if !seen.insert(spec.project_id.as_str()) {
            problems.push(format!(
                "{location}: project_id '{}' is used more than once",
                spec.project_id
            ));
        }
        check_project(&location, spec, &mut problems);
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(problems))
    }
}

fn check_project(location: &str, spec: &TargetSpec, problems: &mut Vec<String>) {
    if spec.owners_group.is_none() {
        problems.push(format!("{location}: owners_group is required"));
    }
    if spec.auditors_group.is_none() {
        problems.push(format!("{location}: auditors_group is required"));
    }
    if spec.audit_logs.is_none() {
        problems.push(format!("{location}: audit_logs is required"));
    }
    for (i, instance) in spec.gce_instances.iter().flatten().enumerate() {
        if instance.boot_image_name().is_none() {
            problems.push(format!(
                "{location}: gce_instances[{i}] needs existing_boot_image or custom_boot_image"
            ));
        }
    }
}

fn describe_slot(slot: TargetSlot) -> String {
    match slot {
        TargetSlot::AuditLogs => "audit_logs_project".to_string(),
        TargetSlot::Monitor => "forseti.project".to_string(),
        TargetSlot::Project(i) => format!("projects[{i}]"),
    }
}

/// Check requested APIs against `overall.allowed_apis`, if configured.
pub fn check_allowed_apis<'a>(
    allowed_apis: Option<&[String]>,
    targets: impl IntoIterator<Item = &'a TargetSpec>,
) -> Result<()> {
    let Some(allowed) = allowed_apis else {
        return Ok(());
    };
    let allowed: HashSet<&str> = allowed.iter().map(String::as_str).collect();

    let mut offenders: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for spec in targets {
        for api in &spec.enabled_apis {
            if !allowed.contains(api.as_str()) {
                offenders
                    .entry(api.clone())
                    .or_default()
                    .push(spec.project_id.clone());
            }
        }
    }

    if offenders.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ApisNotAllowed(offenders))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuditLogs, MonitorConfig};

    fn data_project(id: &str) -> TargetSpec {
        TargetSpec {
            owners_group: Some("owners@example.com".to_string()),
            auditors_group: Some("auditors@example.com".to_string()),
            audit_logs: Some(AuditLogs::default()),
            ..TargetSpec::new(id)
        }
    }

    fn root_with(projects: Vec<TargetSpec>) -> RootConfig {
        let mut root = RootConfig {
            projects,
            ..RootConfig::default()
        };
        root.overall.billing_account = "000000-000000-000000".to_string();
        root
    }

    #[test]
    fn test_valid_config() {
        let mut root = root_with(vec![data_project("a"), data_project("b")]);
        root.forseti = Some(MonitorConfig {
            project: data_project("monitor"),
            ..MonitorConfig::default()
        });
        assert!(validate_config(&root).is_ok());
    }

    #[test]
    fn test_reports_every_problem() {
        let mut root = root_with(vec![data_project("a"), data_project("a"), TargetSpec::new("c")]);
        root.overall.billing_account.clear();

        let Err(ConfigError::Invalid(problems)) = validate_config(&root) else {
            panic!("expected invalid config");
        };
        assert!(problems.iter().any(|p| p.contains("billing_account")));
        assert!(problems.iter().any(|p| p.contains("'a' is used more than once")));
        assert!(problems.iter().any(|p| p.starts_with("projects[2]: owners_group")));
        assert!(problems.iter().any(|p| p.starts_with("projects[2]: audit_logs")));
    }

    #[test]
    fn test_duplicate_id_across_sections() {
        let mut root = root_with(vec![data_project("logs")]);
        root.audit_logs_project = Some(data_project("logs"));
        assert!(matches!(validate_config(&root), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_allowed_apis_unset_allows_everything() {
        let mut spec = data_project("a");
        spec.enabled_apis = vec!["anything.googleapis.com".to_string()];
        assert!(check_allowed_apis(None, [&spec]).is_ok());
    }

    #[test]
    fn test_allowed_apis_names_offenders() {
        let allowed = vec!["A".to_string(), "B".to_string()];
        let mut t1 = data_project("t1");
        t1.enabled_apis = vec!["A".to_string(), "C".to_string()];
        let mut t2 = data_project("t2");
        t2.enabled_apis = vec!["C".to_string(), "D".to_string()];

        let err = check_allowed_apis(Some(allowed.as_slice()), [&t1, &t2]).unwrap_err();
        let ConfigError::ApisNotAllowed(offenders) = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(offenders.len(), 2);
        assert_eq!(offenders["C"], vec!["t1", "t2"]);
        assert_eq!(offenders["D"], vec!["t2"]);
        assert!(err.to_string().contains("C (requested by t1, t2)"));
    }
}
