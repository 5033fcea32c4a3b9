//! Operator-facing deployment progress
//!
//! Prints a timestamped line per step with its duration, and a summary of
//! the whole run at the end.

use chrono::Local;
use colored::Colorize;
use projectforge_deploy::{DeployObserver, RunReport, Step, StepError, Target, TargetState};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct StepRecord {
    project_id: String,
    step: String,
    duration: Duration,
}

#[derive(Default)]
struct LoggerState {
    current_step: Option<String>,
    records: Vec<StepRecord>,
}

/// Deployment progress printer
pub struct DeployLogger {
    start_time: Instant,
    state: Mutex<LoggerState>,
}

impl DeployLogger {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            state: Mutex::new(LoggerState::default()),
        }
    }

    fn timestamp() -> String {
        Local::now().format("%H:%M:%S").to_string()
    }

    fn with_state(&self, f: impl FnOnce(&mut LoggerState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    /// Print the run summary.
    pub fn print_summary(&self, report: &RunReport) {
        let total_duration = self.start_time.elapsed();
        let slowest = self
            .state
            .lock()
            .ok()
            .and_then(|state| state.records.iter().max_by_key(|r| r.duration).cloned());

        println!();
        println!("{}", "═".repeat(44));
        println!("Deployment Summary");
        println!("{}", "─".repeat(44));
        println!("Total time:    {}", format_duration(total_duration).green());

        if let Some(record) = slowest {
            println!(
                "Slowest step:  {} on {} ({})",
                record.step,
                record.project_id,
                format_duration(record.duration)
            );
        }

        println!(
            "Projects:      {} deployed, {} not attempted",
            report.count(&TargetState::Completed).to_string().green(),
            report.count(&TargetState::Pending)
        );

        match report.failure() {
            Some(failed) => {
                println!("Errors:        {}", "1".red().bold());
                if let TargetState::Failed { step, error } = &failed.state {
                    println!("Failed:        {} step {}: {}", failed.project_id, step, error.red());
                    println!(
                        "Resume with:   {}",
                        format!(
                            "--resume-from-project={} --resume-from-step={}",
                            failed.project_id, step
                        )
                        .cyan()
                    );
                }
            }
            None => println!("Errors:        {}", "0".green()),
        }
        println!("{}", "═".repeat(44));
    }
}

impl Default for DeployLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl DeployObserver for DeployLogger {
    fn plan_ready(&self, targets: &[Target]) {
        println!(
            "[{}] {} {} project(s) to deploy",
            Self::timestamp().dimmed(),
            "●".cyan(),
            targets.len()
        );
    }

    fn target_started(&self, target: &Target, starting_step: usize) {
        println!();
        if starting_step > 1 {
            println!(
                "[{}] {} {} (resuming at step {})",
                Self::timestamp().dimmed(),
                "▶".cyan(),
                target.project_id.bold(),
                starting_step
            );
        } else {
            println!(
                "[{}] {} {}",
                Self::timestamp().dimmed(),
                "▶".cyan(),
                target.project_id.bold()
            );
        }
    }

    fn step_started(&self, _target: &Target, step_num: usize, total: usize, step: &Step) {
        println!(
            "[{}] {} {}/{} {}",
            Self::timestamp().dimmed(),
            "▶".cyan(),
            step_num,
            total,
            step
        );
        let name = step.to_string();
        self.with_state(|state| state.current_step = Some(name));
    }

    fn step_succeeded(&self, target: &Target, step_num: usize, elapsed: Duration) {
        let mut name = None;
        self.with_state(|state| {
            name = state.current_step.take();
            if let Some(step) = &name {
                state.records.push(StepRecord {
                    project_id: target.project_id.clone(),
                    step: step.clone(),
                    duration: elapsed,
                });
            }
        });
        println!(
            "[{}] {} step {} {} done ({})",
            Self::timestamp().dimmed(),
            "✓".green().bold(),
            step_num,
            name.unwrap_or_default(),
            format_duration(elapsed).dimmed()
        );
    }

    fn step_failed(&self, target: &Target, step_num: usize, error: &StepError) {
        let mut name = None;
        self.with_state(|state| name = state.current_step.take());
        println!(
            "[{}] {} {} step {} {}: {}",
            Self::timestamp().dimmed(),
            "✗".red().bold(),
            target.project_id,
            step_num,
            name.unwrap_or_default(),
            error.to_string().red()
        );
    }

    fn target_completed(&self, target: &Target) {
        println!(
            "[{}] {} {} deployed",
            Self::timestamp().dimmed(),
            "✓".green().bold(),
            target.project_id.bold()
        );
    }
}

/// Short human form of a step or run duration; deploys of the monitor can
/// run past an hour.
pub fn format_duration(duration: Duration) -> String {
    match duration.as_secs() {
        0 => format!("{}ms", duration.subsec_millis()),
        secs @ 1..60 => format!("{secs}.{}s", duration.subsec_millis() / 100),
        secs @ 60..3600 => format!("{}m {}s", secs / 60, secs % 60),
        secs => format!("{}h {}m", secs / 3600, secs % 3600 / 60),
    }
}
