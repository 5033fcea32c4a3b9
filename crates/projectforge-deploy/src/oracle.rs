//! Decides whether a project still needs deploying.

use crate::options::RunOptions;
use projectforge_config::TargetSpec;

pub struct CompletionOracle<'a> {
    options: &'a RunOptions,
}

impl<'a> CompletionOracle<'a> {
    pub fn new(options: &'a RunOptions) -> Self {
        Self { options }
    }

    /// An absent project has nothing to do. The resume target is never
    /// deployed, even if a previous run left generated fields on it.
    pub fn is_deployed(&self, spec: Option<&TargetSpec>) -> bool {
        let Some(spec) = spec else {
            return true;
        };
        !self.options.is_resume_target(&spec.project_id) && spec.has_generated_fields()
    }
}
