//! Job reporting against a fixture catalog opened through the config path.

mod common;

use serde_json::json;

use baculum::job::{
    classify, find_compositional_jobs, FileListType, JobList, JobManager, JobMode, JobQuery,
    JobStatusGroup, ResultView,
};
use baculum::Criteria;
use common::{criteria, job_ids, CatalogHarness};

/// Restore chain expected for a job.
struct RestoreTestCase {
    name: &'static str,
    jobid: i64,
    expected: &'static [i64],
}

const RESTORE_TESTS: &[RestoreTestCase] = &[
    RestoreTestCase {
        name: "incremental_after_differential",
        jobid: 5,
        expected: &[5, 4, 1],
    },
    RestoreTestCase {
        name: "incremental_chain",
        jobid: 3,
        expected: &[3, 2, 1],
    },
    RestoreTestCase {
        name: "differential",
        jobid: 4,
        expected: &[4, 1],
    },
    RestoreTestCase {
        name: "full_only",
        jobid: 1,
        expected: &[1],
    },
    RestoreTestCase {
        name: "latest_successful_full",
        jobid: 7,
        expected: &[7],
    },
    RestoreTestCase {
        name: "unknown_job",
        jobid: 404,
        expected: &[],
    },
];

#[test]
fn test_restore_table() {
    let harness = CatalogHarness::new();
    let exec = harness.connect();
    let jobs = JobManager::new(exec.as_ref());
    for case in RESTORE_TESTS {
        assert_eq!(
            jobs.get_jobids_to_restore(case.jobid).unwrap(),
            case.expected,
            "case {}",
            case.name
        );
    }
}

#[test]
fn test_status_counts_identity_holds_for_any_filter() {
    let harness = CatalogHarness::new();
    let exec = harness.connect();
    let jobs = JobManager::new(exec.as_ref());
    let filters = [
        Criteria::new(),
        criteria(json!({"Job.Name": [{"vals": "backup-beta"}]})),
        criteria(json!({"Client.Name": [{"vals": "gamma-fd"}]})),
        criteria(json!({"Job.Level": [{"operator": "IN", "vals": ["I", "D"]}]})),
        criteria(json!({"Job.JobId": [{"operator": "IN", "vals": []}]})),
    ];
    for c in &filters {
        let counts = jobs.get_job_count_by_js_group(c).unwrap();
        assert_eq!(counts.all_terminated + counts.running, counts.all);
        assert!(counts.successful + counts.unsuccessful <= counts.all_terminated);
    }

    let beta = jobs.get_job_count_by_js_group(&filters[1]).unwrap();
    assert_eq!((beta.successful, beta.unsuccessful, beta.running), (1, 1, 1));
    let empty = jobs.get_job_count_by_js_group(&filters[4]).unwrap();
    assert_eq!(empty.all, 0);
}

#[test]
fn test_warning_jobs_are_counted_as_warning() {
    // JobStatus T with errors, and a W status.
    assert_eq!(classify('T', 2), Some(JobStatusGroup::Warning));
    assert_eq!(classify('W', 0), Some(JobStatusGroup::Warning));
    assert_eq!(classify('T', 0), Some(JobStatusGroup::Successful));

    let harness = CatalogHarness::new();
    let exec = harness.connect();
    let counts = JobManager::new(exec.as_ref())
        .get_job_count_by_js_group(&Criteria::new())
        .unwrap();
    assert_eq!(counts.warning, 2);
}

#[test]
fn test_jobs_group_mode_buckets_by_jobid() {
    let harness = CatalogHarness::new();
    let exec = harness.connect();
    let query = JobQuery {
        mode: JobMode::Group,
        view: ResultView::Basic,
        limit: 4,
        ..Default::default()
    };
    let JobList::Group(grouped) = JobManager::new(exec.as_ref())
        .get_jobs(&Criteria::new(), &query)
        .unwrap()
    else {
        panic!("expected groups");
    };
    assert_eq!(grouped.len(), 4);
    assert_eq!(grouped.keys().collect::<Vec<_>>(), vec!["1", "2", "3", "4"]);
}

#[test]
fn test_objects_overview_per_status_bucket() {
    let harness = CatalogHarness::new();
    let exec = harness.connect();
    let overview = JobManager::new(exec.as_ref()).get_jobs_objects_overview(
        &Criteria::new(),
        2,
        0,
        ResultView::Basic,
    );
    assert_eq!(overview.overview.all_terminated.count, 12);
    assert_eq!(overview.overview.all_terminated.jobs.len(), 2);
    assert_eq!(overview.overview.running.count, 1);
    assert_eq!(job_ids(&overview.overview.running.jobs), vec![8]);

    let second_page = JobManager::new(exec.as_ref()).get_jobs_objects_overview(
        &Criteria::new(),
        2,
        2,
        ResultView::Basic,
    );
    assert_eq!(second_page.overview.all_terminated.count, 12);
    let first = job_ids(&overview.overview.all_terminated.jobs);
    let second = job_ids(&second_page.overview.all_terminated.jobs);
    assert!(first.iter().all(|id| !second.contains(id)));
}

#[test]
fn test_file_lists_and_search() {
    let harness = CatalogHarness::new();
    let exec = harness.connect();
    let jobs = JobManager::new(exec.as_ref());

    let all = jobs.get_job_file_names(2, FileListType::All, 0, 0, None).unwrap();
    assert_eq!(all.len(), 3);
    let search = jobs
        .get_job_file_names(1, FileListType::Saved, 0, 0, Some("etc"))
        .unwrap();
    assert_eq!(search, vec!["/etc/passwd", "/etc/hosts"]);
    assert!(jobs
        .get_job_file_names(404, FileListType::All, 0, 0, None)
        .unwrap()
        .is_empty());
}

#[test]
fn test_compositional_chain_from_levels() {
    use baculum::job::Level;
    let history = [
        (5, Level::Incremental),
        (4, Level::Differential),
        (3, Level::Incremental),
        (2, Level::Incremental),
        (1, Level::Full),
    ];
    assert_eq!(find_compositional_jobs(&history), vec![5, 4, 1]);
}
