//! projectforge deployment pipeline
//!
//! Takes a root config describing many cloud projects and deploys the ones
//! that are not finished yet, one step at a time, writing a checkpoint of the
//! whole config after every successful step so a failed run can be resumed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 projectforge CLI                 │
//! │            (pforge deploy / plan)                │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               projectforge-deploy                │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────────┐   │
//! │  │ Planner  │─▶│ Deployer │─▶│  Sequencer   │   │
//! │  │ (Oracle) │  │ (driver) │  │ (Checkpoint) │   │
//! │  └──────────┘  └──────────┘  └──────┬───────┘   │
//! │  ┌──────────────────────────────────▼───────┐   │
//! │  │       trait StepRunner { ... }           │   │
//! │  └──────────────────────────────────────────┘   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼────────┐
//!           │ projectforge-  │
//!           │   deploy-gcp   │
//!           │ (gcloud CLI)   │
//!           └────────────────┘
//! ```

pub mod checkpoint;
pub mod driver;
pub mod error;
pub mod options;
pub mod oracle;
pub mod planner;
pub mod runner;
pub mod sequencer;
pub mod step;
pub mod target;

#[cfg(test)]
mod testing;

// Re-exports
pub use checkpoint::{Checkpoint, YamlCheckpoint};
pub use driver::{Deployer, RunReport, TargetReport, TargetState};
pub use error::{DeployError, Result, StepError};
pub use options::RunOptions;
pub use oracle::CompletionOracle;
pub use planner::Planner;
pub use runner::{DeployObserver, NoopObserver, PostDeploy, StepRunner};
pub use sequencer::{SequenceOutcome, Sequencer};
pub use step::Step;
pub use target::{StepContext, Target};
