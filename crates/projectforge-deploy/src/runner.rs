//! Seams between the pipeline and the outside world.

use crate::error::{DeployError, StepError};
use crate::step::Step;
use crate::target::{StepContext, Target};
use async_trait::async_trait;
use projectforge_config::RootConfig;
use std::time::Duration;

/// Executes step bodies against a cloud provider.
///
/// A step may mutate its own project's spec (and, for the monitor and
/// audit-logs phases, the matching generated fields) through the context.
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn run_step(&self, step: &Step, ctx: &mut StepContext<'_>) -> Result<(), StepError>;
}

/// Stage run once every planned project has deployed.
#[async_trait]
pub trait PostDeploy: Send + Sync {
    async fn after_deploy(&self, root: &RootConfig) -> Result<(), DeployError>;
}

/// Progress callbacks for operator-facing output. All methods default to
/// doing nothing.
pub trait DeployObserver: Send + Sync {
    fn plan_ready(&self, _targets: &[Target]) {}

    fn target_started(&self, _target: &Target, _starting_step: usize) {}

    fn step_started(&self, _target: &Target, _step_num: usize, _total: usize, _step: &Step) {}

    fn step_succeeded(&self, _target: &Target, _step_num: usize, _elapsed: Duration) {}

    fn step_failed(&self, _target: &Target, _step_num: usize, _error: &StepError) {}

    fn target_completed(&self, _target: &Target) {}
}

pub struct NoopObserver;

impl DeployObserver for NoopObserver {}
