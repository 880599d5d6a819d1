use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::acl::{AclResource, AllowedResources};
use crate::console::{job_defaults, list_backup_jobs, ConsoleGateway};
use crate::db::grouping::compare_values;
use crate::db::{
    build_where, group_by, group_rows_by, Criteria, GroupOptions, Grouped, OverviewEntry,
    QueryExecutor, Row, RowExt, SortEntity,
};
use crate::error::Result;
use crate::object::FILES_TYPE;
use crate::validation::{is_valid_name, validate_sort_column, OrderDirection};

/// Execution fields of a source, null for never executed ones.
const EXECUTION_FIELDS: &[&str] = &[
    "jobid",
    "starttime",
    "endtime",
    "jobstatus",
    "joberrors",
    "content",
    "type",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceMode {
    #[default]
    Normal,
    /// Sources bucketed by backup content type, paged per bucket.
    Overview,
}

/// Narrows the configured sources by resource name.
#[derive(Debug, Clone, Default)]
pub struct SourceProps {
    pub job: Option<String>,
    pub client: Option<String>,
    pub fileset: Option<String>,
    /// Console ACLs; a source is listed only when its job, client and
    /// fileset are all visible.
    pub allowed: AllowedResources,
}

impl SourceProps {
    fn wants_job(&self, job: &str) -> bool {
        self.job.as_deref().is_none_or(|j| j == job) && self.allowed.allows(AclResource::Job, job)
    }

    fn matches(&self, job: &str, client: &str, fileset: &str) -> bool {
        self.wants_job(job)
            && self.client.as_deref().is_none_or(|c| c == client)
            && self.fileset.as_deref().is_none_or(|f| f == fileset)
            && self.allowed.allows(AclResource::Client, client)
            && self.allowed.allows(AclResource::FileSet, fileset)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SourceList {
    Normal(Vec<Row>),
    Overview {
        sources: Grouped,
        /// Sources per type before paging.
        overview: Vec<OverviewEntry>,
    },
}

/// A configured `(job, client, fileset)` backup target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Triple {
    job: String,
    client: String,
    fileset: String,
}

/// Reconciles configured backup targets with their catalog history.
pub struct SourceManager<'a> {
    exec: &'a dyn QueryExecutor,
    console: &'a dyn ConsoleGateway,
}

impl<'a> SourceManager<'a> {
    pub fn new(exec: &'a dyn QueryExecutor, console: &'a dyn ConsoleGateway) -> Self {
        Self { exec, console }
    }

    /// Sources of `director`. Targets without catalog history are listed as
    /// never executed only when `criteria` is empty; history of targets no
    /// longer configured is never listed.
    #[allow(clippy::too_many_arguments)]
    pub fn get_sources(
        &self,
        director: &str,
        criteria: &Criteria,
        props: &SourceProps,
        limit: u64,
        offset: u64,
        order_by: Option<&str>,
        order_dir: OrderDirection,
        mode: SourceMode,
    ) -> Result<SourceList> {
        let order = match order_by {
            Some(col) => Some(validate_sort_column(SortEntity::Source, col)?),
            None => None,
        };
        let _span = tracing::info_span!("sources", director = director).entered();

        let configured = self.configured_sources(director, props)?;
        let executed = self.executed_sources(criteria)?;
        log::debug!(
            "Sources: {} configured, {} with history",
            configured.len(),
            executed.len()
        );

        let mut sources: Vec<Row> = Vec::new();
        for triple in configured {
            match executed.get(&triple) {
                Some(row) => sources.push(row.clone()),
                None if criteria.is_empty() => sources.push(never_executed(&triple)),
                None => {}
            }
        }

        sort_sources(&mut sources, order, order_dir);

        Ok(match mode {
            SourceMode::Normal => {
                let take = if limit > 0 { limit as usize } else { usize::MAX };
                SourceList::Normal(sources.into_iter().skip(offset as usize).take(take).collect())
            }
            SourceMode::Overview => {
                let totals = group_rows_by("type", sources.clone());
                let overview = totals
                    .iter()
                    .map(|(key, rows)| OverviewEntry {
                        field: "type".to_string(),
                        value: Value::String(key.to_string()),
                        count: rows.len() as u64,
                    })
                    .collect();
                let opts = GroupOptions {
                    limit,
                    offset,
                    ..Default::default()
                };
                let (grouped, _) = group_by("type", sources, &opts);
                SourceList::Overview {
                    sources: grouped,
                    overview,
                }
            }
        })
    }

    /// Backup targets from the director configuration.
    fn configured_sources(&self, director: &str, props: &SourceProps) -> Result<Vec<Triple>> {
        let mut triples = Vec::new();
        for job in list_backup_jobs(self.console, director)? {
            if !props.wants_job(&job) {
                continue;
            }
            if !is_valid_name(&job) {
                log::warn!("Skipping job with unusable name '{}'", job);
                continue;
            }
            let defaults = job_defaults(self.console, director, &job)?;
            let (Some(client), Some(fileset)) = (defaults.client, defaults.fileset) else {
                log::warn!("Job '{}' has no client or fileset defaults", job);
                continue;
            };
            if props.matches(&job, &client, &fileset) {
                triples.push(Triple {
                    job,
                    client,
                    fileset,
                });
            }
        }
        Ok(triples)
    }

    /// Latest backup of every `(job, client, fileset)` in the catalog.
    fn executed_sources(&self, criteria: &Criteria) -> Result<HashMap<Triple, Row>> {
        let w = build_where(criteria, true);
        let filter = if w.is_empty() {
            String::new()
        } else {
            format!(" AND {}", w.clause())
        };
        let sql = format!(
            "SELECT DISTINCT sres.job AS job, sres.client AS client, sres.fileset AS fileset, \
             jres.JobId AS jobid, jres.StartTime AS starttime, jres.EndTime AS endtime, \
             jres.JobStatus AS jobstatus, jres.JobErrors AS joberrors, fres.Content AS content, \
             COALESCE((SELECT MIN(o.ObjectType) FROM Object AS o WHERE o.JobId = jres.JobId), '{}') AS type \
             FROM (\
             SELECT MAX(Job.JobId) AS jobid, FileSet.FileSet AS fileset, Client.Name AS client, Job.Name AS job \
             FROM Job JOIN FileSet USING (FileSetId) JOIN Client USING (ClientId) \
             WHERE Job.Type = 'B' \
             GROUP BY FileSet.FileSet, Client.Name, Job.Name\
             ) AS sres \
             JOIN Job AS jres ON jres.JobId = sres.jobid \
             JOIN FileSet AS fres ON fres.FileSetId = jres.FileSetId \
             LEFT JOIN Object ON Object.JobId = jres.JobId \
             WHERE jres.Type = 'B'{}",
            FILES_TYPE, filter
        );
        let rows = self.exec.run(&sql, &w.params)?;
        let mut executed = HashMap::new();
        for row in rows {
            let triple = Triple {
                job: row.get_str("job").unwrap_or_default().to_string(),
                client: row.get_str("client").unwrap_or_default().to_string(),
                fileset: row.get_str("fileset").unwrap_or_default().to_string(),
            };
            executed.entry(triple).or_insert(row);
        }
        Ok(executed)
    }
}

fn never_executed(triple: &Triple) -> Row {
    let mut row = Map::new();
    row.insert("job".to_string(), Value::String(triple.job.clone()));
    row.insert("client".to_string(), Value::String(triple.client.clone()));
    row.insert("fileset".to_string(), Value::String(triple.fileset.clone()));
    for field in EXECUTION_FIELDS {
        row.insert(field.to_string(), Value::Null);
    }
    row
}

/// Sorts by `order` if given; fileset, client and job ascending break ties
/// and are the default order.
fn sort_sources(sources: &mut [Row], order: Option<&str>, dir: OrderDirection) {
    let null = Value::Null;
    let by = |a: &Row, b: &Row, key: &str| {
        compare_values(a.get(key).unwrap_or(&null), b.get(key).unwrap_or(&null))
    };
    sources.sort_by(|a, b| {
        let primary = match order {
            Some(key) => match dir {
                OrderDirection::Asc => by(a, b, key),
                OrderDirection::Desc => by(a, b, key).reverse(),
            },
            None => Ordering::Equal,
        };
        primary
            .then_with(|| by(a, b, "fileset"))
            .then_with(|| by(a, b, "client"))
            .then_with(|| by(a, b, "job"))
    });
}
