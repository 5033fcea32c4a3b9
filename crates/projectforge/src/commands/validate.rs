use colored::Colorize;
use projectforge_config::{RootConfig, check_allowed_apis};
use std::path::Path;

pub fn handle(project_yaml: &Path) -> anyhow::Result<()> {
    println!("{}", "Validating config...".blue());

    let result = super::load_validated(project_yaml).and_then(|(path, root)| {
        check_allowed_apis(
            root.overall.allowed_apis.as_deref(),
            root.targets().map(|(_, spec)| spec),
        )?;
        Ok((path, root))
    });

    match result {
        Ok((path, root)) => {
            println!("Config: {}", path.display().to_string().cyan());
            println!("{}", "✓ Config is valid".green().bold());
            println!();
            print_summary(&root);
            Ok(())
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Config error".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}

fn print_summary(root: &RootConfig) {
    println!("Summary:");
    if let Some(logs) = &root.audit_logs_project {
        println!("  Audit logs project: {}", logs.project_id.cyan());
    }
    if let Some(monitor) = &root.forseti {
        println!("  Monitor project:    {}", monitor.project.project_id.cyan());
    }
    println!("  Projects: {}", root.projects.len());
    for project in &root.projects {
        let status = if project.has_generated_fields() {
            "deployed".green()
        } else {
            "pending".yellow()
        };
        println!("    - {} ({})", project.project_id.cyan(), status);
    }
}
