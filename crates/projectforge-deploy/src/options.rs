//! Per-run settings supplied by the operator.

/// Resume parameters for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Project to resume; empty means no override.
    pub resume_from_project: String,

    /// 1-indexed step to resume from; values below 1 are treated as 1.
    pub resume_from_step: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            resume_from_project: String::new(),
            resume_from_step: 1,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resume(project_id: impl Into<String>, step: usize) -> Self {
        Self {
            resume_from_project: project_id.into(),
            resume_from_step: step,
        }
    }

    pub fn resume_project(&self) -> Option<&str> {
        Some(self.resume_from_project.as_str()).filter(|id| !id.is_empty())
    }

    pub fn is_resume_target(&self, project_id: &str) -> bool {
        self.resume_project() == Some(project_id)
    }

    /// Step a project's sequence starts from in this run.
    pub fn starting_step(&self, project_id: &str) -> usize {
        if self.is_resume_target(project_id) {
            self.resume_from_step.max(1)
        } else {
            1
        }
    }
}
