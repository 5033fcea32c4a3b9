//! Builds the ordered list of projects to deploy in a run.
//!
//! Order is fixed: shared audit-logs project, then the monitor project, then
//! the regular projects in declaration order. Other projects may read the
//! generated fields of the ones before them.

use crate::options::RunOptions;
use crate::oracle::CompletionOracle;
use crate::step::Step;
use crate::target::Target;
use projectforge_config::{Result, RootConfig, TargetSlot, check_allowed_apis};

pub struct Planner<'a> {
    options: &'a RunOptions,
}

impl<'a> Planner<'a> {
    pub fn new(options: &'a RunOptions) -> Self {
        Self { options }
    }

    /// Plan the run and check requested APIs against the allow-list before
    /// anything is deployed.
    pub fn plan(&self, root: &RootConfig) -> Result<Vec<Target>> {
        let oracle = CompletionOracle::new(self.options);
        let audit_logs_id = root
            .audit_logs_project
            .as_ref()
            .map(|spec| spec.project_id.clone());

        let mut targets = Vec::new();

        if let Some(spec) = &root.audit_logs_project
            && !oracle.is_deployed(Some(spec))
        {
            targets.push(Target::new(TargetSlot::AuditLogs, &spec.project_id));
        }

        if let Some(monitor) = &root.forseti
            && !oracle.is_deployed(Some(&monitor.project))
        {
            let monitor_id = &monitor.project.project_id;
            let mut target = Target::new(TargetSlot::Monitor, monitor_id)
                .with_audit_logs_project(audit_logs_id.clone())
                .with_extra_step(Step::InstallMonitor)
                .with_extra_step(Step::GrantMonitorAccess {
                    project_id: monitor_id.clone(),
                });
            if let Some(logs_id) = &audit_logs_id {
                target = target.with_extra_step(Step::GrantMonitorAccess {
                    project_id: logs_id.clone(),
                });
            }
            targets.push(target);
        }

        for (index, spec) in root.projects.iter().enumerate() {
            if oracle.is_deployed(Some(spec)) {
                continue;
            }

            let mut target = Target::new(TargetSlot::Project(index), &spec.project_id)
                .with_audit_logs_project(audit_logs_id.clone());
            // Granted whenever a monitor is configured, deployed or not.
            if root.forseti.is_some() {
                target = target.with_extra_step(Step::GrantMonitorAccess {
                    project_id: spec.project_id.clone(),
                });
            }
            targets.push(target);
        }

        check_allowed_apis(
            root.overall.allowed_apis.as_deref(),
            targets.iter().filter_map(|t| root.target(t.slot)),
        )?;

        tracing::info!("Found {} projects to deploy", targets.len());
        Ok(targets)
    }
}
