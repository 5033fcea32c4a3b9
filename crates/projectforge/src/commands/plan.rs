use colored::Colorize;
use projectforge_deploy::{Planner, RunOptions};
use std::path::Path;

pub fn handle(
    project_yaml: &Path,
    resume_from_project: String,
    resume_from_step: usize,
) -> anyhow::Result<()> {
    let (_, root) = super::load_validated(project_yaml)?;
    let options = RunOptions::resume(resume_from_project, resume_from_step);
    let targets = Planner::new(&options).plan(&root)?;

    if let Some(resume_id) = options.resume_project()
        && !targets.iter().any(|t| t.project_id == resume_id)
    {
        println!(
            "{} resume project {} is not part of the plan",
            "⚠".yellow(),
            resume_id
        );
    }

    if targets.is_empty() {
        println!("{}", "Nothing to deploy: every project has generated fields.".green());
        return Ok(());
    }

    println!("{}", format!("{} project(s) to deploy:", targets.len()).bold());
    for (index, target) in targets.iter().enumerate() {
        let starting_step = options.starting_step(&target.project_id);
        println!();
        println!(
            "{}. {} (steps {}-{})",
            index + 1,
            target.project_id.cyan().bold(),
            starting_step,
            target.total_steps()
        );
        if let Some(logs) = &target.audit_logs_project {
            println!("   audit logs: {}", logs);
        }
        for (i, step) in target.steps().iter().enumerate() {
            let step_num = i + 1;
            if step_num < starting_step {
                println!("   {} {}", format!("{step_num:>2}.").dimmed(), step.to_string().dimmed());
            } else {
                println!("   {} {}", format!("{step_num:>2}."), step);
            }
        }
    }

    Ok(())
}
