//! Restore chain resolution over newest-first job history.

/// Backup level letter as stored in `Job.Level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Full,
    Differential,
    Incremental,
    Other(char),
}

impl Level {
    pub fn from_letter(c: char) -> Self {
        match c {
            'F' => Level::Full,
            'D' => Level::Differential,
            'I' => Level::Incremental,
            other => Level::Other(other),
        }
    }

    pub fn letter(&self) -> char {
        match self {
            Level::Full => 'F',
            Level::Differential => 'D',
            Level::Incremental => 'I',
            Level::Other(c) => *c,
        }
    }
}

/// Picks the jobs needed to restore the newest state in `history`
/// (newest first).
///
/// Incrementals are taken until the first Differential, at most one
/// Differential is taken, and the walk stops at the first Full, which is
/// included.
pub fn find_compositional_jobs(history: &[(i64, Level)]) -> Vec<i64> {
    let mut jobids = Vec::new();
    let mut wait_on_full = false;
    for &(jobid, level) in history {
        match level {
            Level::Full => {
                jobids.push(jobid);
                break;
            }
            Level::Differential if !wait_on_full => {
                jobids.push(jobid);
                wait_on_full = true;
            }
            Level::Incremental if !wait_on_full => jobids.push(jobid),
            _ => {}
        }
    }
    jobids
}
