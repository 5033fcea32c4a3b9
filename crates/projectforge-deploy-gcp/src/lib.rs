//! Google Cloud step runner for projectforge
//!
//! Implements [`projectforge_deploy::StepRunner`] for every setup step by
//! shelling out to `gcloud` and creating Deployment Manager deployments from
//! local templates.
//!
//! # Requirements
//!
//! - `gcloud` must be installed and authenticated
//! - Deployment Manager templates (`data_project.py`, `remote_audit_logs.py`,
//!   `gce_vms.py`) must be present in the templates directory
//! - Installing Forseti needs a checkout of its installer
//!
//! # Example
//!
//! ```ignore
//! use projectforge_deploy_gcp::{Gcloud, GcpStepRunner};
//!
//! let runner = GcpStepRunner::new(Gcloud::dry_run(), "deploy/templates");
//! let deployer = Deployer::new(&runner, &checkpoint, options);
//! let report = deployer.run(&mut root).await?;
//! ```

pub mod deployment;
pub mod error;
pub mod gcloud;
pub mod monitor;
pub mod runner;

pub use deployment::{DeploymentConfig, Deployments};
pub use error::{GcloudError, Result};
pub use gcloud::{AlertPolicy, DRY_RUN_PLACEHOLDER, Gcloud, InstanceInfo};
pub use monitor::Forseti;
pub use runner::{GcpStepRunner, LOG_SINK_NAME};
