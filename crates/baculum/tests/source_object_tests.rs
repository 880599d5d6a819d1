//! Sources reconciled with a scripted console, and object reporting.

mod common;

use serde_json::{json, Value};

use baculum::acl::{AclResource, AllowedResources};
use baculum::db::RowExt;
use baculum::object::{ObjectList, ObjectManager, ObjectQuery, FILES_TYPE};
use baculum::source::{SourceList, SourceManager, SourceMode, SourceProps};
use baculum::{Criteria, OrderDirection};
use common::{criteria, job_ids, CatalogHarness, FakeConsole};

fn flat(list: SourceList) -> Vec<baculum::Row> {
    match list {
        SourceList::Normal(rows) => rows,
        SourceList::Overview { .. } => panic!("expected flat sources"),
    }
}

#[test]
fn test_sources_merge_console_and_catalog() {
    let harness = CatalogHarness::new();
    let exec = harness.connect();
    let console = FakeConsole::director();
    let sources = flat(
        SourceManager::new(exec.as_ref(), &console)
            .get_sources(
                "bacula-dir",
                &Criteria::new(),
                &SourceProps::default(),
                0,
                0,
                Some("job"),
                OrderDirection::Asc,
                SourceMode::Normal,
            )
            .unwrap(),
    );

    let names: Vec<&str> = sources.iter().filter_map(|s| s.get_str("job")).collect();
    assert_eq!(
        names,
        vec!["backup-alpha", "backup-beta", "backup-catalog", "never-run", "pg-gamma"]
    );
    // Latest backup per job, client and fileset.
    assert_eq!(job_ids(&sources), vec![5, 8, 9, 12]);
    assert_eq!(sources[1].get_str("jobstatus"), Some("R"));
    assert_eq!(sources[3].get("starttime"), Some(&Value::Null));
    assert_eq!(sources[4].get_str("content"), Some("postgresql"));
}

#[test]
fn test_sources_criteria_on_latest_run() {
    let harness = CatalogHarness::new();
    let exec = harness.connect();
    let console = FakeConsole::director();
    let failed = criteria(json!({"jres.JobStatus": [{"operator": "IN", "vals": ["f", "E"]}]}));
    let sources = flat(
        SourceManager::new(exec.as_ref(), &console)
            .get_sources(
                "bacula-dir",
                &failed,
                &SourceProps::default(),
                0,
                0,
                None,
                OrderDirection::Asc,
                SourceMode::Normal,
            )
            .unwrap(),
    );
    // backup-beta failed in job 6, but its latest run is job 8.
    assert_eq!(job_ids(&sources), vec![12]);
}

#[test]
fn test_sources_overview_counts_before_paging() {
    let harness = CatalogHarness::new();
    let exec = harness.connect();
    let console = FakeConsole::director();
    let SourceList::Overview { sources, overview } = SourceManager::new(exec.as_ref(), &console)
        .get_sources(
            "bacula-dir",
            &Criteria::new(),
            &SourceProps::default(),
            1,
            1,
            None,
            OrderDirection::Asc,
            SourceMode::Overview,
        )
        .unwrap()
    else {
        panic!("expected overview");
    };
    let files = sources.get(FILES_TYPE).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].get_str("job"), Some("backup-alpha"));
    assert!(sources.get("PostgreSQL").unwrap().is_empty());
    let count = |t: &str| overview.iter().find(|e| e.value == t).map(|e| e.count);
    assert_eq!(count(FILES_TYPE), Some(3));
    assert_eq!(count("PostgreSQL"), Some(1));
    assert_eq!(count(""), Some(1));
}

#[test]
fn test_sources_console_error_carries_output() {
    let harness = CatalogHarness::new();
    let exec = harness.connect();
    let console = FakeConsole::default().failing(".jobs type=B", 1, &["Permission denied"]);
    let err = SourceManager::new(exec.as_ref(), &console)
        .get_sources(
            "bacula-dir",
            &Criteria::new(),
            &SourceProps::default(),
            0,
            0,
            None,
            OrderDirection::Asc,
            SourceMode::Normal,
        )
        .unwrap_err();
    match err {
        baculum::BaculumError::Console(baculum::ConsoleError::Command { output, .. }) => {
            assert_eq!(output, vec!["Permission denied"]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_objects_restricted_by_acl() {
    let harness = CatalogHarness::new();
    let exec = harness.connect();
    let console = FakeConsole::default()
        .on(".jobs", &["pg-gamma"])
        .on(".client", &["gamma-fd"])
        .on(".fileset", &["PgSet"])
        .on(".pool", &["File"])
        .on(".storage", &[]);
    let acl = AllowedResources::from_console(&console, "bacula-dir").unwrap();

    let mut c = criteria(json!({"Object.ObjectName": [{"vals": "db1"}]}));
    assert!(acl.apply(&mut c, &[AclResource::Job]).unwrap());
    let ObjectList::Flat(rows) = ObjectManager::new(exec.as_ref())
        .get_objects(&c, &ObjectQuery::default())
        .unwrap()
    else {
        panic!("expected a flat list");
    };
    assert_eq!(job_ids(&rows), vec![12, 11, 10]);

    let mut blocked = Criteria::new();
    assert!(!acl.apply(&mut blocked, &[AclResource::Storage]).unwrap());
    assert!(blocked.contains("Storage.Name"));
}

#[test]
fn test_objects_overview_through_config_path() {
    let harness = CatalogHarness::new();
    let exec = harness.connect();
    let overview = ObjectManager::new(exec.as_ref())
        .get_objects_overview(
            &Criteria::new(),
            &Criteria::new(),
            1,
            0,
            Some("jobid"),
            OrderDirection::Desc,
        )
        .unwrap();
    let pg = overview.get("PostgreSQL").unwrap();
    assert_eq!(pg.count, 2);
    assert_eq!(pg.items.len(), 1);
    let files = overview.get(FILES_TYPE).unwrap();
    assert_eq!(job_ids(&files.items), vec![9]);
}
