//! Runs one target's steps in order, checkpointing after each success.

use crate::checkpoint::Checkpoint;
use crate::error::{DeployError, Result, StepError};
use crate::runner::{DeployObserver, StepRunner};
use crate::target::{StepContext, Target};
use projectforge_config::RootConfig;
use std::time::Instant;

/// How a target's sequence ended.
#[derive(Debug)]
pub enum SequenceOutcome {
    Completed,
    /// `step` is 1-indexed, the value to resume from.
    Failed { step: usize, error: StepError },
}

impl SequenceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

pub struct Sequencer<'a> {
    runner: &'a dyn StepRunner,
    checkpoint: &'a dyn Checkpoint,
    observer: &'a dyn DeployObserver,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        runner: &'a dyn StepRunner,
        checkpoint: &'a dyn Checkpoint,
        observer: &'a dyn DeployObserver,
    ) -> Self {
        Self {
            runner,
            checkpoint,
            observer,
        }
    }

    /// Run steps `start_step..=total` of `target`. A start past the last step
    /// is a successful no-op.
    ///
    /// Step failures are reported in the outcome; only a checkpoint write
    /// failure is returned as an error.
    pub async fn run(
        &self,
        root: &mut RootConfig,
        target: &Target,
        start_step: usize,
    ) -> Result<SequenceOutcome> {
        let steps = target.steps();
        let total_steps = steps.len();

        for (step_num, step) in steps.iter().enumerate().skip(start_step.max(1) - 1) {
            let step_num = step_num + 1;
            tracing::info!("Step {}/{}: {}", step_num, total_steps, step);
            self.observer
                .step_started(target, step_num, total_steps, step);

            let started = Instant::now();
            let result = {
                let mut ctx = StepContext::new(root, target);
                self.runner.run_step(step, &mut ctx).await
            };

            if let Err(error) = result {
                tracing::error!("Setup failed on step {}: {}", step_num, error);
                tracing::error!(
                    "To continue, sync the input file with the checkpoint output and re-run with: \
                     --resume-from-project={} --resume-from-step={}",
                    target.project_id,
                    step_num
                );
                self.observer.step_failed(target, step_num, &error);
                return Ok(SequenceOutcome::Failed {
                    step: step_num,
                    error,
                });
            }

            if let Err(source) = self.checkpoint.save(root).await {
                tracing::error!(
                    "Could not save the checkpoint after step {} of {}: {}",
                    step_num,
                    target.project_id,
                    source
                );
                return Err(DeployError::StepNotSaved {
                    project_id: target.project_id.clone(),
                    step: step_num,
                    source: Box::new(source),
                });
            }
            self.observer
                .step_succeeded(target, step_num, started.elapsed());
        }

        tracing::info!("Setup of {} completed successfully", target.project_id);
        Ok(SequenceOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::NoopObserver;
    use crate::step::Step;
    use crate::testing::{MemoryCheckpoint, RecordingRunner};
    use projectforge_config::{TargetSlot, TargetSpec};

    fn root_with(ids: &[&str]) -> RootConfig {
        RootConfig {
            projects: ids.iter().map(|id| TargetSpec::new(*id)).collect(),
            ..RootConfig::default()
        }
    }

    fn grant(project_id: &str) -> Step {
        Step::GrantMonitorAccess {
            project_id: project_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_runs_every_step_in_order() {
        let mut root = root_with(&["t1"]);
        let target = Target::new(TargetSlot::Project(0), "t1").with_extra_step(grant("t1"));
        let runner = RecordingRunner::new();
        let checkpoint = MemoryCheckpoint::new();

        let outcome = Sequencer::new(&runner, &checkpoint, &NoopObserver)
            .run(&mut root, &target, 1)
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(runner.steps(), target.steps());
        assert_eq!(runner.projects(), vec!["t1"]);
        assert_eq!(checkpoint.count(), 13);
    }

    #[tokio::test]
    async fn test_starts_at_given_step() {
        let mut root = root_with(&["t1"]);
        let target = Target::new(TargetSlot::Project(0), "t1").with_extra_step(grant("t1"));
        let runner = RecordingRunner::new();
        let checkpoint = MemoryCheckpoint::new();

        for k in [1, 5, 12, 13] {
            runner.reset();
            Sequencer::new(&runner, &checkpoint, &NoopObserver)
                .run(&mut root, &target, k)
                .await
                .unwrap();
            let expected: Vec<Step> = target.steps().into_iter().skip(k - 1).collect();
            assert_eq!(runner.steps(), expected, "start step {k}");
        }
    }

    #[tokio::test]
    async fn test_start_past_end_is_noop_success() {
        let mut root = root_with(&["t1"]);
        let target = Target::new(TargetSlot::Project(0), "t1");
        let runner = RecordingRunner::new();
        let checkpoint = MemoryCheckpoint::new();

        let outcome = Sequencer::new(&runner, &checkpoint, &NoopObserver)
            .run(&mut root, &target, 40)
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert!(runner.calls().is_empty());
        assert_eq!(checkpoint.count(), 0);
    }

    #[tokio::test]
    async fn test_halts_on_failure_without_checkpoint() {
        let mut root = root_with(&["t1"]);
        let target = Target::new(TargetSlot::Project(0), "t1");
        let runner = RecordingRunner::new().fail_on("t1", 3);
        let checkpoint = MemoryCheckpoint::new();

        let outcome = Sequencer::new(&runner, &checkpoint, &NoopObserver)
            .run(&mut root, &target, 1)
            .await
            .unwrap();

        let SequenceOutcome::Failed { step, .. } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(step, 3);
        assert_eq!(runner.calls().len(), 3);
        assert_eq!(checkpoint.count(), 2);
    }

    #[tokio::test]
    async fn test_unsaved_step_names_resume_point() {
        let mut root = root_with(&["t1"]);
        let target = Target::new(TargetSlot::Project(0), "t1");
        let runner = RecordingRunner::new();
        let checkpoint = MemoryCheckpoint::failing();

        let err = Sequencer::new(&runner, &checkpoint, &NoopObserver)
            .run(&mut root, &target, 5)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeployError::StepNotSaved { ref project_id, step: 5, .. } if project_id == "t1"
        ));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_checkpoint_sees_mutations_up_to_current_step() {
        let mut root = root_with(&["t1"]);
        let target = Target::new(TargetSlot::Project(0), "t1");
        let runner = RecordingRunner::new().mark_steps();
        let checkpoint = MemoryCheckpoint::new();

        Sequencer::new(&runner, &checkpoint, &NoopObserver)
            .run(&mut root, &target, 1)
            .await
            .unwrap();

        for (i, snapshot) in checkpoint.snapshots().iter().enumerate() {
            let marks = &snapshot.projects[0].enabled_apis;
            let expected: Vec<String> = Step::canonical()
                .iter()
                .take(i + 1)
                .map(|s| s.id().to_string())
                .collect();
            assert_eq!(marks, &expected);
        }
    }
}
