use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test harness for running CLI commands with temporary databases
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    /// Create a new test harness with a temporary database
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self { temp_dir, db_path }
    }

    /// Get a Command instance configured for testing
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("rota").expect("Failed to find rota binary");

        // Run inside the temp dir so no rota.toml from the workspace is picked up.
        cmd.current_dir(self.temp_dir.path());
        cmd.env("ROTA_DATABASE_PATH", &self.db_path);
        cmd.env("ROTA_SCHEDULER__TIMEZONE", "UTC");
        cmd.env_remove("RUST_LOG");

        cmd
    }

    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Helper to run a command and assert success
    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    /// Helper to run a command and assert failure
    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Stdout of a successful command
    pub fn stdout(&self, args: &[&str]) -> String {
        let output = self.run_success(args).get_output().stdout.clone();
        String::from_utf8(output).expect("stdout is UTF-8")
    }

    /// Short id of the first listed occurrence whose row mentions `title`.
    pub fn instance_id(&self, title: &str) -> String {
        let listing = self.stdout(&["list"]);
        listing
            .lines()
            .filter(|line| line.contains(title))
            .find_map(|line| {
                line.split(|c| c == '│' || c == '┆' || c == '|')
                    .map(str::trim)
                    .find(|cell| !cell.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| panic!("no row for '{}' in:\n{}", title, listing))
    }
}

/// Utility functions for test assertions
pub mod assertions {
    use predicates::prelude::*;

    /// Predicate to check if output contains the occurrence table headers
    pub fn has_instance_table_headers() -> impl Predicate<str> {
        predicate::str::contains("ID")
            .and(predicate::str::contains("Title"))
            .and(predicate::str::contains("Status"))
            .and(predicate::str::contains("Due"))
    }

    /// Predicate to check if output indicates successful task creation
    pub fn task_created_successfully() -> impl Predicate<str> {
        predicate::str::contains("Created task").or(predicate::str::contains("Created recurring task"))
    }

    /// Predicate to check for error messages
    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error").or(predicate::str::contains("error"))
    }
}
