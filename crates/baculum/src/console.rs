//! Bacula console (`bconsole`) access.
//!
//! Services only see the [`ConsoleGateway`] trait. [`BconsoleGateway`]
//! runs the real binary; tests plug in canned output.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::config::ConsoleConfig;
use crate::error::ConsoleError;
use crate::validation::is_valid_name;

/// Raw result of one console command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleOutput {
    pub exitcode: i32,
    pub output: Vec<String>,
}

impl ConsoleOutput {
    pub fn success(output: Vec<String>) -> Self {
        Self {
            exitcode: 0,
            output,
        }
    }

    /// Output lines on exit code 0, the whole output as an error otherwise.
    pub fn into_lines(self, command: &[&str]) -> Result<Vec<String>, ConsoleError> {
        if self.exitcode == 0 {
            Ok(self.output)
        } else {
            Err(ConsoleError::Command {
                command: command.join(" "),
                exitcode: self.exitcode,
                output: self.output,
            })
        }
    }
}

pub trait ConsoleGateway {
    /// Runs `command` (space joined) on `director`.
    fn run_command(&self, director: &str, command: &[&str]) -> Result<ConsoleOutput, ConsoleError>;
}

/// Runs `bconsole -n -c <config> -D <director>` with the command on stdin.
pub struct BconsoleGateway {
    bconsole_path: PathBuf,
    config_path: PathBuf,
    use_sudo: bool,
}

const NOISE_PREFIXES: &[&str] = &[
    "Connecting to Director",
    "1000 OK",
    "Enter a period to cancel a command.",
    "You have messages.",
    "Automatically selected Catalog",
    "Using Catalog",
];

impl BconsoleGateway {
    pub fn new(config: &ConsoleConfig) -> Self {
        Self {
            bconsole_path: config.bconsole_path.clone(),
            config_path: config.config_path.clone(),
            use_sudo: config.use_sudo,
        }
    }

    fn command(&self, director: &str) -> Command {
        let mut cmd = if self.use_sudo {
            let mut c = Command::new("sudo");
            c.arg("-n").arg(&self.bconsole_path);
            c
        } else {
            Command::new(&self.bconsole_path)
        };
        cmd.arg("-n").arg("-c").arg(&self.config_path);
        if !director.is_empty() {
            cmd.arg("-D").arg(director);
        }
        cmd
    }
}

impl ConsoleGateway for BconsoleGateway {
    fn run_command(&self, director: &str, command: &[&str]) -> Result<ConsoleOutput, ConsoleError> {
        let line = command.join(" ");
        log::debug!("bconsole [{}]: {}", director, line);
        let mut child = self
            .command(director)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ConsoleError::Unavailable(format!("{}: {}", self.bconsole_path.display(), e))
            })?;
        if let Some(mut stdin) = child.stdin.take() {
            writeln!(stdin, "{}", line)
                .and_then(|_| writeln!(stdin, "quit"))
                .map_err(|e| ConsoleError::Unavailable(e.to_string()))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| ConsoleError::Unavailable(e.to_string()))?;
        let exitcode = output.status.code().unwrap_or(-1);
        let mut lines = clean_output(&line, &String::from_utf8_lossy(&output.stdout));
        if exitcode != 0 {
            let stderr = String::from_utf8_lossy(&output.stderr);
            lines.extend(stderr.lines().map(str::to_string));
            log::warn!("bconsole command '{}' exited with {}", line, exitcode);
        }
        Ok(ConsoleOutput {
            exitcode,
            output: lines,
        })
    }
}

/// Strips the connection banner, the echoed command and the trailing
/// `quit` from bconsole output.
pub fn clean_output(command: &str, stdout: &str) -> Vec<String> {
    let mut lines: Vec<String> = stdout
        .lines()
        .map(|l| l.trim_end().to_string())
        .filter(|l| !NOISE_PREFIXES.iter().any(|p| l.starts_with(p)))
        .filter(|l| l.trim() != command.trim() && l.trim() != "quit")
        .collect();
    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Names of the backup jobs configured on `director`.
pub fn list_backup_jobs(
    gateway: &dyn ConsoleGateway,
    director: &str,
) -> Result<Vec<String>, ConsoleError> {
    list_resources(gateway, director, &[".jobs", "type=B"])
}

/// One name per line, as printed by the dot commands (`.jobs`, `.client`...).
pub fn list_resources(
    gateway: &dyn ConsoleGateway,
    director: &str,
    command: &[&str],
) -> Result<Vec<String>, ConsoleError> {
    let lines = gateway.run_command(director, command)?.into_lines(command)?;
    Ok(lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

/// Resource defaults of one job (`client`, `fileset`, `pool`...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobDefaults {
    pub job: String,
    pub client: Option<String>,
    pub fileset: Option<String>,
    pub pool: Option<String>,
    pub storage: Option<String>,
    pub level: Option<String>,
}

/// Refuses job names outside the Bacula resource name alphabet, so the
/// quoted argument cannot be broken out of.
pub fn job_defaults(
    gateway: &dyn ConsoleGateway,
    director: &str,
    job: &str,
) -> Result<JobDefaults, ConsoleError> {
    if !is_valid_name(job) {
        return Err(ConsoleError::InvalidName(job.to_string()));
    }
    let arg = format!("job=\"{}\"", job);
    let command = [".defaults", arg.as_str()];
    let lines = gateway.run_command(director, &command)?.into_lines(&command)?;
    Ok(parse_defaults(job, &lines))
}

/// Parses `key=value` lines of `.defaults`.
pub fn parse_defaults(job: &str, lines: &[String]) -> JobDefaults {
    let mut defaults = JobDefaults {
        job: job.to_string(),
        ..Default::default()
    };
    for line in lines {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = Some(value.trim().to_string());
        match key.trim() {
            "client" => defaults.client = value,
            "fileset" => defaults.fileset = value,
            "pool" => defaults.pool = value,
            "storage" => defaults.storage = value,
            "level" => defaults.level = value,
            _ => {}
        }
    }
    defaults
}
