use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Minimal valid config: one regular project, no shared logs, no monitor.
pub const SINGLE_PROJECT: &str = r#"
overall:
  organization_id: 12345
  billing_account: 000000-000000-000000
  allowed_apis:
    - compute.googleapis.com
projects:
  - project_id: data-1
    owners_group: owners@example.com
    auditors_group: auditors@example.com
    audit_logs:
      logs_bigquery_dataset:
        name: data_1_logs
    enabled_apis:
      - compute.googleapis.com
"#;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_config(&self, name: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }
}
