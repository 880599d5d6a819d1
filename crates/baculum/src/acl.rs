//! Resource names visible to the current console user.
//!
//! `None` means unrestricted. An empty list means nothing is visible: the
//! criteria then match no row, so a caller that runs the query anyway still
//! gets an empty result.

use crate::console::{list_resources, ConsoleGateway};
use crate::db::{Clause, Criteria};
use crate::error::{ConsoleError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclResource {
    Job,
    Client,
    FileSet,
    Pool,
    Storage,
}

impl AclResource {
    fn console_command(&self) -> &'static [&'static str] {
        match self {
            AclResource::Job => &[".jobs"],
            AclResource::Client => &[".client"],
            AclResource::FileSet => &[".fileset"],
            AclResource::Pool => &[".pool"],
            AclResource::Storage => &[".storage"],
        }
    }

    /// Catalog column holding the resource name.
    fn column(&self) -> &'static str {
        match self {
            AclResource::Job => "Job.Name",
            AclResource::Client => "Client.Name",
            AclResource::FileSet => "FileSet.FileSet",
            AclResource::Pool => "Pool.Name",
            AclResource::Storage => "Storage.Name",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedResources {
    pub jobs: Option<Vec<String>>,
    pub clients: Option<Vec<String>>,
    pub filesets: Option<Vec<String>>,
    pub pools: Option<Vec<String>>,
    pub storages: Option<Vec<String>>,
}

impl AllowedResources {
    /// No restriction on any resource.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Lists every resource type through the user's console. The director
    /// already filters dot command output by the console ACLs.
    pub fn from_console(
        gateway: &dyn ConsoleGateway,
        director: &str,
    ) -> std::result::Result<Self, ConsoleError> {
        let fetch = |r: AclResource| list_resources(gateway, director, r.console_command()).map(Some);
        Ok(Self {
            jobs: fetch(AclResource::Job)?,
            clients: fetch(AclResource::Client)?,
            filesets: fetch(AclResource::FileSet)?,
            pools: fetch(AclResource::Pool)?,
            storages: fetch(AclResource::Storage)?,
        })
    }

    pub fn get(&self, resource: AclResource) -> Option<&[String]> {
        match resource {
            AclResource::Job => self.jobs.as_deref(),
            AclResource::Client => self.clients.as_deref(),
            AclResource::FileSet => self.filesets.as_deref(),
            AclResource::Pool => self.pools.as_deref(),
            AclResource::Storage => self.storages.as_deref(),
        }
    }

    /// Allowed job names in the form the job queries take.
    pub fn jobs(&self) -> Option<&[String]> {
        self.get(AclResource::Job)
    }

    /// Whether `name` is visible for `resource`.
    pub fn allows(&self, resource: AclResource, name: &str) -> bool {
        self.get(resource)
            .map_or(true, |names| names.iter().any(|n| n == name))
    }

    /// Adds an `IN` clause per restricted resource. Returns false when one
    /// of them allows nothing; the clause added for it matches no row.
    pub fn apply(&self, criteria: &mut Criteria, resources: &[AclResource]) -> Result<bool> {
        let mut visible = true;
        for resource in resources {
            match self.get(*resource) {
                None => {}
                Some([]) => {
                    log::debug!("No {:?} resources allowed", resource);
                    criteria.push(resource.column(), Clause::in_list(Vec::<String>::new()))?;
                    visible = false;
                }
                Some(names) => {
                    criteria.push(resource.column(), Clause::in_list(names))?;
                }
            }
        }
        Ok(visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::testing::ScriptedGateway;
    use crate::db::build_where;
    use crate::job::{JobList, JobManager, JobQuery, JobStatusCounts, ResultView};
    use crate::testutil::catalog;

    fn gateway() -> ScriptedGateway {
        ScriptedGateway::default()
            .reply(".jobs", &["backup-alpha", "restore-alpha"])
            .reply(".client", &["alpha-fd"])
            .reply(".fileset", &["Full Set"])
            .reply(".pool", &[])
            .reply(".storage", &["File1"])
    }

    #[test]
    fn test_from_console() {
        let acl = AllowedResources::from_console(&gateway(), "dir").unwrap();
        assert_eq!(acl.jobs().map(|j| j.len()), Some(2));
        assert_eq!(acl.get(AclResource::Pool), Some(&[][..]));
    }

    #[test]
    fn test_apply_adds_in_clauses() {
        let acl = AllowedResources::from_console(&gateway(), "dir").unwrap();
        let mut criteria = Criteria::new();
        assert!(acl
            .apply(&mut criteria, &[AclResource::Job, AclResource::Client])
            .unwrap());
        let w = build_where(&criteria, false);
        assert!(w.clause().contains("Job.Name IN"));
        assert!(w.clause().contains("Client.Name IN"));
        assert_eq!(w.params.len(), 3);
    }

    #[test]
    fn test_empty_list_matches_nothing() {
        let acl = AllowedResources::from_console(&gateway(), "dir").unwrap();
        let mut criteria = Criteria::new();
        assert!(!acl.apply(&mut criteria, &[AclResource::Pool]).unwrap());
        assert_eq!(build_where(&criteria, false).clause(), "WHERE (1 = 0)");
    }

    #[test]
    fn test_empty_job_list_counts_nothing() {
        let session = catalog();
        let acl = AllowedResources {
            jobs: Some(Vec::new()),
            ..Default::default()
        };
        let mut criteria = Criteria::new();
        assert!(!acl.apply(&mut criteria, &[AclResource::Job]).unwrap());
        let jobs = JobManager::new(&session);
        assert_eq!(
            jobs.get_job_count_by_js_group(&criteria).unwrap(),
            JobStatusCounts::default()
        );
        let result = jobs.get_jobs_objects_overview(&criteria, 10, 0, ResultView::Basic);
        assert_eq!(result.overview.all_terminated.count, 0);
        assert_eq!(result.overview.successful.count, 0);
        assert!(result.overview.all_terminated.jobs.is_empty());
        assert!(result.objects.is_empty());
    }

    #[test]
    fn test_allows() {
        let acl = AllowedResources::from_console(&gateway(), "dir").unwrap();
        assert!(acl.allows(AclResource::Client, "alpha-fd"));
        assert!(!acl.allows(AclResource::Client, "beta-fd"));
        assert!(!acl.allows(AclResource::Pool, "Default"));
        assert!(AllowedResources::unrestricted().allows(AclResource::Pool, "Default"));
    }

    #[test]
    fn test_unrestricted_leaves_criteria_alone() {
        let mut criteria = Criteria::new();
        assert!(AllowedResources::unrestricted()
            .apply(&mut criteria, &[AclResource::Job, AclResource::Storage])
            .unwrap());
        assert!(criteria.is_empty());
    }

    #[test]
    fn test_acl_limits_job_list() {
        let session = catalog();
        let acl = AllowedResources::from_console(&gateway(), "dir").unwrap();
        let mut criteria = Criteria::new();
        assert!(acl.apply(&mut criteria, &[AclResource::Job]).unwrap());
        let JobList::Normal(jobs) = JobManager::new(&session)
            .get_jobs(&criteria, &JobQuery::default())
            .unwrap()
        else {
            panic!("expected flat job list");
        };
        assert_eq!(jobs.len(), 6);
    }

    #[test]
    fn test_console_failure_propagates() {
        let gw = ScriptedGateway::default().fail(".jobs", 2, &["not allowed"]);
        let err = AllowedResources::from_console(&gw, "dir").unwrap_err();
        assert!(matches!(err, ConsoleError::Command { exitcode: 2, .. }));
    }
}
