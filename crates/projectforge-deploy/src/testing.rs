//! Fakes shared by the pipeline tests.

use crate::checkpoint::Checkpoint;
use crate::error::{DeployError, Result, StepError};
use crate::runner::StepRunner;
use crate::step::Step;
use crate::target::StepContext;
use async_trait::async_trait;
use projectforge_config::{ConfigError, GeneratedFields, MonitorGeneratedFields, RootConfig};
use std::path::PathBuf;
use std::sync::Mutex;

/// Records every step call; can be told to fail one step of one project.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<(String, Step)>>,
    fail_on: Option<(String, usize)>,
    mark_steps: bool,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, project_id: &str, step_num: usize) -> Self {
        self.fail_on = Some((project_id.to_string(), step_num));
        self
    }

    /// Append each step's id to the project's `enabled_apis`, so checkpoints
    /// show which steps have run.
    pub fn mark_steps(mut self) -> Self {
        self.mark_steps = true;
        self
    }

    pub fn calls(&self) -> Vec<(String, Step)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn steps(&self) -> Vec<Step> {
        self.calls().into_iter().map(|(_, step)| step).collect()
    }

    pub fn projects(&self) -> Vec<String> {
        let mut projects: Vec<String> = Vec::new();
        for (project, _) in self.calls() {
            if projects.last() != Some(&project) {
                projects.push(project);
            }
        }
        projects
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl StepRunner for RecordingRunner {
    async fn run_step(
        &self,
        step: &Step,
        ctx: &mut StepContext<'_>,
    ) -> std::result::Result<(), StepError> {
        let project_id = ctx.project_id().to_string();
        self.calls
            .lock()
            .unwrap()
            .push((project_id.clone(), step.clone()));

        let step_num = ctx
            .target()
            .steps()
            .iter()
            .position(|s| s == step)
            .map(|i| i + 1);
        if let Some((fail_project, fail_step)) = &self.fail_on
            && *fail_project == project_id
            && step_num == Some(*fail_step)
        {
            return Err(StepError::CommandFailed(format!("{step} exploded")));
        }

        if self.mark_steps {
            ctx.project_mut()?.enabled_apis.push(step.id().to_string());
        }

        match step {
            Step::AddGeneratedFields => {
                let project = ctx.project_mut()?;
                if project.generated_fields.is_none() {
                    project.generated_fields = Some(GeneratedFields {
                        project_number: "1234".to_string(),
                        ..GeneratedFields::default()
                    });
                }
            }
            Step::InstallMonitor => {
                if let Some(monitor) = ctx.root_mut().forseti.as_mut() {
                    monitor.generated_fields = Some(MonitorGeneratedFields {
                        service_account: "monitor@example.iam.gserviceaccount.com".to_string(),
                        server_bucket: "gs://monitor-server".to_string(),
                        ..MonitorGeneratedFields::default()
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Keeps every checkpoint in memory.
#[derive(Default)]
pub struct MemoryCheckpoint {
    snapshots: Mutex<Vec<RootConfig>>,
    failing: bool,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    pub fn snapshots(&self) -> Vec<RootConfig> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<RootConfig> {
        self.snapshots.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Checkpoint for MemoryCheckpoint {
    async fn save(&self, root: &RootConfig) -> Result<()> {
        if self.failing {
            return Err(DeployError::Checkpoint {
                path: PathBuf::from("memory"),
                source: ConfigError::Io(std::io::Error::other("disk full")),
            });
        }
        self.snapshots.lock().unwrap().push(root.clone());
        Ok(())
    }
}
