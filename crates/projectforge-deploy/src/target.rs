//! Planned targets and the context handed to each step.

use crate::error::StepError;
use crate::step::Step;
use projectforge_config::{Overall, RootConfig, TargetSlot, TargetSpec};

/// One project scheduled for deployment in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Where the project lives in the root config.
    pub slot: TargetSlot,

    pub project_id: String,

    /// Project providing shared audit logs, if one is configured.
    pub audit_logs_project: Option<String>,

    /// Steps run after the canonical sequence.
    pub extra_steps: Vec<Step>,
}

impl Target {
    pub fn new(slot: TargetSlot, project_id: impl Into<String>) -> Self {
        Self {
            slot,
            project_id: project_id.into(),
            audit_logs_project: None,
            extra_steps: Vec::new(),
        }
    }

    pub fn with_audit_logs_project(mut self, project_id: Option<String>) -> Self {
        self.audit_logs_project = project_id;
        self
    }

    pub fn with_extra_step(mut self, step: Step) -> Self {
        self.extra_steps.push(step);
        self
    }

    /// Canonical steps followed by this target's extra steps.
    pub fn steps(&self) -> Vec<Step> {
        let mut steps = Step::canonical();
        steps.extend(self.extra_steps.iter().cloned());
        steps
    }

    pub fn total_steps(&self) -> usize {
        Step::canonical().len() + self.extra_steps.len()
    }
}

/// Mutable view of the run state for a single step.
pub struct StepContext<'a> {
    root: &'a mut RootConfig,
    target: &'a Target,
}

impl<'a> StepContext<'a> {
    pub fn new(root: &'a mut RootConfig, target: &'a Target) -> Self {
        Self { root, target }
    }

    pub fn target(&self) -> &Target {
        self.target
    }

    pub fn project_id(&self) -> &str {
        &self.target.project_id
    }

    pub fn root(&self) -> &RootConfig {
        &*self.root
    }

    pub fn root_mut(&mut self) -> &mut RootConfig {
        &mut *self.root
    }

    pub fn overall(&self) -> &Overall {
        &self.root.overall
    }

    pub fn project(&self) -> Result<&TargetSpec, StepError> {
        self.root
            .target(self.target.slot)
            .ok_or_else(|| StepError::MissingProject(self.target.project_id.clone()))
    }

    pub fn project_mut(&mut self) -> Result<&mut TargetSpec, StepError> {
        self.root
            .target_mut(self.target.slot)
            .ok_or_else(|| StepError::MissingProject(self.target.project_id.clone()))
    }

    /// The shared audit-logs project, when this target logs remotely.
    pub fn audit_logs_project(&self) -> Option<&TargetSpec> {
        self.target.audit_logs_project.as_ref()?;
        self.root.audit_logs_project.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_steps_follow_canonical() {
        let target = Target::new(TargetSlot::Project(0), "t1").with_extra_step(
            Step::GrantMonitorAccess {
                project_id: "t1".to_string(),
            },
        );

        let steps = target.steps();
        assert_eq!(steps.len(), target.total_steps());
        assert_eq!(steps[11], Step::AddGeneratedFields);
        assert_eq!(steps[12].id(), "grant-monitor-access");
    }

    #[test]
    fn test_context_resolves_project() {
        let mut root = RootConfig {
            audit_logs_project: Some(TargetSpec::new("logs")),
            projects: vec![TargetSpec::new("t1")],
            ..RootConfig::default()
        };
        let target = Target::new(TargetSlot::Project(0), "t1")
            .with_audit_logs_project(Some("logs".to_string()));

        let mut ctx = StepContext::new(&mut root, &target);
        assert_eq!(ctx.project().unwrap().project_id, "t1");
        assert_eq!(ctx.audit_logs_project().unwrap().project_id, "logs");

        ctx.project_mut().unwrap().enabled_apis.push("x".to_string());
        assert_eq!(root.projects[0].enabled_apis, vec!["x"]);
    }

    #[test]
    fn test_context_missing_project() {
        let mut root = RootConfig::default();
        let target = Target::new(TargetSlot::Project(3), "gone");
        let ctx = StepContext::new(&mut root, &target);
        assert!(matches!(ctx.project(), Err(StepError::MissingProject(id)) if id == "gone"));
        assert!(ctx.audit_logs_project().is_none());
    }
}
