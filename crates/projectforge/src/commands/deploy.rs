use crate::hook::RulesHook;
use crate::progress::DeployLogger;
use colored::Colorize;
use projectforge_config::{ensure_distinct_paths, normalize_path};
use projectforge_deploy::{Deployer, RunOptions, YamlCheckpoint};
use projectforge_deploy_gcp::{GcpStepRunner, Gcloud};
use std::path::PathBuf;

pub struct DeployOptions {
    pub project_yaml: PathBuf,
    pub output_yaml_path: PathBuf,
    pub resume_from_project: String,
    pub resume_from_step: usize,
    pub dry_run: bool,
    pub output_rules_path: Option<PathBuf>,
    pub templates_dir: PathBuf,
    pub monitor_installer: Option<PathBuf>,
}

/// Run a deployment. Returns whether every planned project deployed.
pub async fn handle(options: DeployOptions) -> anyhow::Result<bool> {
    let input = normalize_path(&options.project_yaml)?;
    let output = normalize_path(&options.output_yaml_path)?;
    // The checkpoint drops comments and reorders fields.
    ensure_distinct_paths(&input, &output)?;

    let (_, mut root) = super::load_validated(&input)?;

    let gcloud = if options.dry_run {
        println!("{}", "Dry run: gcloud commands are printed, not run".yellow());
        Gcloud::dry_run()
    } else {
        let gcloud = Gcloud::new();
        gcloud.check_installed().await?;
        gcloud
    };

    let monitor_installer = options
        .monitor_installer
        .map(normalize_path)
        .transpose()?;
    let runner = GcpStepRunner::new(gcloud, normalize_path(&options.templates_dir)?)
        .with_monitor_installer(monitor_installer);
    let checkpoint = YamlCheckpoint::new(&output);
    let logger = DeployLogger::new();
    let hook = RulesHook::new(options.output_rules_path.map(normalize_path).transpose()?);
    let run_options = RunOptions::resume(options.resume_from_project, options.resume_from_step);

    let report = Deployer::new(&runner, &checkpoint, run_options)
        .with_observer(&logger)
        .with_post_deploy(&hook)
        .run(&mut root)
        .await?;

    logger.print_summary(&report);
    println!("Checkpoint: {}", output.display().to_string().cyan());
    Ok(report.is_success())
}
