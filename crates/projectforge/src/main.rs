mod commands;
mod hook;
mod progress;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pforge")]
#[command(about = "Deploy monitored Google Cloud projects from a YAML config", long_about = None)]
struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy every project that has not been deployed yet
    Deploy(DeployArgs),
    /// Show which projects would be deployed, and from which step
    Plan {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        resume: ResumeArgs,
    },
    /// Check the config without deploying anything
    Validate {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Show version information
    Version,
}

#[derive(Args)]
struct InputArgs {
    /// Location of the project config YAML
    #[arg(long)]
    project_yaml: PathBuf,
}

#[derive(Args)]
struct ResumeArgs {
    /// Project id to resume a failed run from
    #[arg(long, default_value = "")]
    resume_from_project: String,

    /// Step to resume the project from (1-indexed, lower values mean 1)
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    resume_from_step: i64,
}

impl ResumeArgs {
    fn starting_step(&self) -> usize {
        usize::try_from(self.resume_from_step.max(1)).unwrap_or(usize::MAX)
    }
}

#[derive(Args)]
struct DeployArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Where to write the config with generated fields after every step.
    /// Must differ from --project-yaml
    #[arg(long, env = "PFORGE_OUTPUT_YAML")]
    output_yaml_path: PathBuf,

    #[command(flatten)]
    resume: ResumeArgs,

    /// Print gcloud commands instead of running them
    #[arg(long)]
    dry_run: bool,

    /// Local file or directory to write the deployed config to for rule
    /// generation
    #[arg(long, value_parser = parse_local_path)]
    output_rules_path: Option<PathBuf>,

    /// Directory containing the Deployment Manager templates
    #[arg(long, default_value = "deploy/templates")]
    templates_dir: PathBuf,

    /// Checkout of the Forseti installer
    #[arg(long)]
    monitor_installer: Option<PathBuf>,
}

/// Accept local filesystem paths only; bucket URLs cannot be written to.
fn parse_local_path(value: &str) -> Result<PathBuf, String> {
    if value.contains("://") {
        return Err(format!(
            "'{value}' is not a local path; pass a file or directory on this machine"
        ));
    }
    Ok(PathBuf::from(value))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Version => {
            println!("projectforge {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Validate { input } => {
            commands::validate::handle(&input.project_yaml)?;
        }
        Commands::Plan { input, resume } => {
            let starting_step = resume.starting_step();
            commands::plan::handle(
                &input.project_yaml,
                resume.resume_from_project,
                starting_step,
            )?;
        }
        Commands::Deploy(args) => {
            let options = commands::deploy::DeployOptions {
                project_yaml: args.input.project_yaml,
                output_yaml_path: args.output_yaml_path,
                resume_from_step: args.resume.starting_step(),
                resume_from_project: args.resume.resume_from_project,
                dry_run: args.dry_run,
                output_rules_path: args.output_rules_path,
                templates_dir: args.templates_dir,
                monitor_installer: args.monitor_installer,
            };
            if !commands::deploy::handle(options).await? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resume_step(extra: &[&str]) -> usize {
        let mut args = vec!["pforge", "plan", "--project-yaml", "project.yaml"];
        args.extend_from_slice(extra);
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Plan { resume, .. } => resume.starting_step(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_output_rules_path_must_be_local() {
        let base = [
            "pforge",
            "deploy",
            "--project-yaml",
            "project.yaml",
            "--output-yaml-path",
            "out.yaml",
        ];

        let mut args = base.to_vec();
        args.extend(["--output-rules-path", "gs://rules-bucket"]);
        assert!(Cli::try_parse_from(args).is_err());

        let mut args = base.to_vec();
        args.extend(["--output-rules-path", "rules/"]);
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn test_resume_step_is_clamped() {
        assert_eq!(resume_step(&[]), 1);
        assert_eq!(resume_step(&["--resume-from-step=-1"]), 1);
        assert_eq!(resume_step(&["--resume-from-step", "-3"]), 1);
        assert_eq!(resume_step(&["--resume-from-step", "0"]), 1);
        assert_eq!(resume_step(&["--resume-from-step", "5"]), 5);
    }
}
