//! Run driver
//!
//! Walks the planned targets one at a time through
//! `Pending → Running → {Completed, Failed}` and stops the whole run at the
//! first failure.

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use crate::options::RunOptions;
use crate::planner::Planner;
use crate::runner::{DeployObserver, NoopObserver, PostDeploy, StepRunner};
use crate::sequencer::{SequenceOutcome, Sequencer};
use chrono::{DateTime, Utc};
use projectforge_config::RootConfig;
use serde::Serialize;

/// Lifecycle state of one planned target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TargetState {
    Pending,
    Running,
    Completed,
    Failed { step: usize, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub project_id: String,
    pub state: TargetState,
    pub starting_step: usize,
    pub total_steps: usize,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub targets: Vec<TargetReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub post_deploy_ran: bool,
}

impl RunReport {
    fn new() -> Self {
        Self {
            targets: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            post_deploy_ran: false,
        }
    }

    /// True when every planned target completed. An empty plan succeeds.
    pub fn is_success(&self) -> bool {
        self.targets
            .iter()
            .all(|t| t.state == TargetState::Completed)
    }

    /// The failed target, if any.
    pub fn failure(&self) -> Option<&TargetReport> {
        self.targets
            .iter()
            .find(|t| matches!(t.state, TargetState::Failed { .. }))
    }

    pub fn count(&self, state: &TargetState) -> usize {
        self.targets.iter().filter(|t| &t.state == state).count()
    }
}

/// Drives a full deployment run.
pub struct Deployer<'a> {
    runner: &'a dyn StepRunner,
    checkpoint: &'a dyn Checkpoint,
    observer: &'a dyn DeployObserver,
    post_deploy: Option<&'a dyn PostDeploy>,
    options: RunOptions,
}

impl<'a> Deployer<'a> {
    pub fn new(
        runner: &'a dyn StepRunner,
        checkpoint: &'a dyn Checkpoint,
        options: RunOptions,
    ) -> Self {
        Self {
            runner,
            checkpoint,
            observer: &NoopObserver,
            post_deploy: None,
            options,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn DeployObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_post_deploy(mut self, post_deploy: &'a dyn PostDeploy) -> Self {
        self.post_deploy = Some(post_deploy);
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Plan and deploy every pending project in `root`.
    ///
    /// Configuration problems and checkpoint write failures are returned as
    /// errors. A failing step is not an error here: it ends the run and is
    /// recorded in the report.
    pub async fn run(&self, root: &mut RootConfig) -> Result<RunReport> {
        let targets = Planner::new(&self.options).plan(root)?;

        if let Some(resume_id) = self.options.resume_project()
            && !targets.iter().any(|t| t.project_id == resume_id)
        {
            tracing::warn!(
                "Resume project {} is not part of this run; starting every project at step 1",
                resume_id
            );
        }
        self.observer.plan_ready(&targets);

        let mut report = RunReport::new();
        report.targets = targets
            .iter()
            .map(|t| TargetReport {
                project_id: t.project_id.clone(),
                state: TargetState::Pending,
                starting_step: self.options.starting_step(&t.project_id),
                total_steps: t.total_steps(),
            })
            .collect();

        let sequencer = Sequencer::new(self.runner, self.checkpoint, self.observer);

        for (index, target) in targets.iter().enumerate() {
            let starting_step = report.targets[index].starting_step;
            report.targets[index].state = TargetState::Running;
            tracing::info!("Deploying project {}", target.project_id);
            self.observer.target_started(target, starting_step);

            match sequencer.run(root, target, starting_step).await? {
                SequenceOutcome::Completed => {
                    report.targets[index].state = TargetState::Completed;
                    self.observer.target_completed(target);
                }
                SequenceOutcome::Failed { step, error } => {
                    report.targets[index].state = TargetState::Failed {
                        step,
                        error: error.to_string(),
                    };
                    report.finished_at = Some(Utc::now());
                    return Ok(report);
                }
            }
        }

        if root.forseti.is_some()
            && let Some(post_deploy) = self.post_deploy
        {
            tracing::info!("All projects deployed, running post-deploy stage");
            post_deploy.after_deploy(root).await?;
            report.post_deploy_ran = true;
        }

        report.finished_at = Some(Utc::now());
        Ok(report)
    }
}
