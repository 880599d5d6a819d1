//! Job status letters and the status groups reported by overviews.

use serde::{Deserialize, Serialize};

pub const JS_SUCCESSFUL: &[char] = &['T'];
pub const JS_UNSUCCESSFUL: &[char] = &['A', 'E', 'f'];
/// Canonical warning set. Terminated-with-errors (`T` and errors > 0) is a
/// warning as well, see [`classify`].
pub const JS_WARNING: &[char] = &['I', 'e', 'W'];
/// Includes internal states the director never writes to the catalog.
pub const JS_RUNNING: &[char] = &[
    'C', 'B', 'D', 'F', 'L', 'M', 'R', 'S', 'a', 'c', 'd', 'i', 'j', 'l', 'm', 'p', 'q', 's', 't',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatusGroup {
    Successful,
    Unsuccessful,
    Warning,
    Running,
    AllTerminated,
}

impl JobStatusGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatusGroup::Successful => "successful",
            JobStatusGroup::Unsuccessful => "unsuccessful",
            JobStatusGroup::Warning => "warning",
            JobStatusGroup::Running => "running",
            JobStatusGroup::AllTerminated => "all_terminated",
        }
    }

    /// Every group, in report order.
    pub fn all() -> [JobStatusGroup; 5] {
        [
            JobStatusGroup::Successful,
            JobStatusGroup::Unsuccessful,
            JobStatusGroup::Warning,
            JobStatusGroup::Running,
            JobStatusGroup::AllTerminated,
        ]
    }
}

/// Classifies one job. `T` with errors is a warning, never successful.
/// Letters outside the known sets belong to no group; they still count as
/// terminated, see [`is_terminated`].
pub fn classify(status: char, errors: i64) -> Option<JobStatusGroup> {
    if JS_SUCCESSFUL.contains(&status) {
        if errors > 0 {
            Some(JobStatusGroup::Warning)
        } else {
            Some(JobStatusGroup::Successful)
        }
    } else if JS_WARNING.contains(&status) {
        Some(JobStatusGroup::Warning)
    } else if JS_RUNNING.contains(&status) {
        Some(JobStatusGroup::Running)
    } else if JS_UNSUCCESSFUL.contains(&status) {
        Some(JobStatusGroup::Unsuccessful)
    } else {
        None
    }
}

pub fn is_terminated(status: char) -> bool {
    !JS_RUNNING.contains(&status)
}

/// `'A','E','f'` for an IN list. Letters are constants, never user input.
pub(crate) fn sql_list(letters: &[char]) -> String {
    letters
        .iter()
        .map(|c| format!("'{}'", c))
        .collect::<Vec<_>>()
        .join(",")
}

/// SQL predicate selecting one status group over `status_col`/`errors_col`.
pub(crate) fn group_predicate(group: JobStatusGroup, status_col: &str, errors_col: &str) -> String {
    match group {
        JobStatusGroup::Successful => format!(
            "{} IN ({}) AND {} = 0",
            status_col,
            sql_list(JS_SUCCESSFUL),
            errors_col
        ),
        JobStatusGroup::Unsuccessful => {
            format!("{} IN ({})", status_col, sql_list(JS_UNSUCCESSFUL))
        }
        JobStatusGroup::Warning => format!(
            "({} IN ({}) OR ({} IN ({}) AND {} > 0))",
            status_col,
            sql_list(JS_WARNING),
            status_col,
            sql_list(JS_SUCCESSFUL),
            errors_col
        ),
        JobStatusGroup::Running => format!("{} IN ({})", status_col, sql_list(JS_RUNNING)),
        JobStatusGroup::AllTerminated => {
            format!("{} NOT IN ({})", status_col, sql_list(JS_RUNNING))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminated_with_errors_is_warning() {
        assert_eq!(classify('T', 3), Some(JobStatusGroup::Warning));
        assert_eq!(classify('T', 0), Some(JobStatusGroup::Successful));
    }

    #[test]
    fn test_classify_sets() {
        for c in ['A', 'E', 'f'] {
            assert_eq!(classify(c, 0), Some(JobStatusGroup::Unsuccessful));
        }
        for c in ['I', 'e', 'W'] {
            assert_eq!(classify(c, 0), Some(JobStatusGroup::Warning));
        }
        for c in JS_RUNNING {
            assert_eq!(classify(*c, 0), Some(JobStatusGroup::Running));
            assert!(!is_terminated(*c));
        }
        assert!(is_terminated('T'));
    }

    #[test]
    fn test_unknown_letter_is_terminated_without_group() {
        assert_eq!(classify('X', 0), None);
        assert_eq!(classify('X', 4), None);
        assert!(is_terminated('X'));
    }

    #[test]
    fn test_sets_are_disjoint() {
        for c in JS_WARNING {
            assert!(!JS_RUNNING.contains(c));
            assert!(!JS_UNSUCCESSFUL.contains(c));
            assert!(!JS_SUCCESSFUL.contains(c));
        }
    }

    #[test]
    fn test_group_predicate() {
        assert_eq!(
            group_predicate(JobStatusGroup::Warning, "Job.JobStatus", "Job.JobErrors"),
            "(Job.JobStatus IN ('I','e','W') OR (Job.JobStatus IN ('T') AND Job.JobErrors > 0))"
        );
        assert_eq!(
            group_predicate(JobStatusGroup::Unsuccessful, "s", "e"),
            "s IN ('A','E','f')"
        );
    }

    #[test]
    fn test_group_names() {
        assert_eq!(JobStatusGroup::AllTerminated.as_str(), "all_terminated");
        assert_eq!(
            serde_json::to_value(JobStatusGroup::AllTerminated).unwrap(),
            serde_json::json!("all_terminated")
        );
    }
}
