//! Criteria and console builders.

#![allow(dead_code)]

use std::collections::HashMap;

use baculum::console::{ConsoleGateway, ConsoleOutput};
use baculum::db::{Criteria, Row, RowExt};
use baculum::ConsoleError;

/// Criteria from their JSON wire form.
pub fn criteria(raw: serde_json::Value) -> Criteria {
    Criteria::from_raw(&raw).expect("invalid criteria")
}

pub fn job_ids(rows: &[Row]) -> Vec<i64> {
    rows.iter().filter_map(|r| r.get_i64("jobid")).collect()
}

/// Console answering from a command table; unknown commands fail to spawn.
#[derive(Default)]
pub struct FakeConsole {
    replies: HashMap<String, ConsoleOutput>,
}

impl FakeConsole {
    pub fn on(mut self, command: &str, lines: &[&str]) -> Self {
        self.replies.insert(
            command.to_string(),
            ConsoleOutput::success(lines.iter().map(|l| l.to_string()).collect()),
        );
        self
    }

    pub fn failing(mut self, command: &str, exitcode: i32, lines: &[&str]) -> Self {
        self.replies.insert(
            command.to_string(),
            ConsoleOutput {
                exitcode,
                output: lines.iter().map(|l| l.to_string()).collect(),
            },
        );
        self
    }

    /// Director with the fixture's backup jobs plus one that never ran.
    pub fn director() -> Self {
        Self::default()
            .on(
                ".jobs type=B",
                &["backup-alpha", "backup-beta", "backup-catalog", "pg-gamma", "never-run"],
            )
            .on(
                ".defaults job=\"backup-alpha\"",
                &["job=backup-alpha", "client=alpha-fd", "fileset=Full Set", "pool=Default"],
            )
            .on(
                ".defaults job=\"backup-beta\"",
                &["client=beta-fd", "fileset=Full Set"],
            )
            .on(
                ".defaults job=\"backup-catalog\"",
                &["client=alpha-fd", "fileset=Catalog"],
            )
            .on(
                ".defaults job=\"pg-gamma\"",
                &["client=gamma-fd", "fileset=PgSet"],
            )
            .on(
                ".defaults job=\"never-run\"",
                &["client=beta-fd", "fileset=Catalog"],
            )
    }
}

impl ConsoleGateway for FakeConsole {
    fn run_command(&self, _director: &str, command: &[&str]) -> Result<ConsoleOutput, ConsoleError> {
        let key = command.join(" ");
        self.replies
            .get(&key)
            .cloned()
            .ok_or(ConsoleError::Unavailable(key))
    }
}
