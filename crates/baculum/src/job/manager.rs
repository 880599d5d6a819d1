use serde::Serialize;

use crate::db::{
    build_where, group_rows_by, Clause, Criteria, DatabaseError, Dialect, Grouped, Params,
    QueryExecutor, Row, RowExt, ScratchTable, SortEntity, SqlValue, TransactionGuard,
};
use crate::error::Result;
use crate::job::lstat;
use crate::job::restore::{find_compositional_jobs, Level};
use crate::job::status::{classify, group_predicate, is_terminated, JobStatusGroup};
use crate::validation::{validate_sort_column, OrderDirection};

/// Job record joined with the names of its client, pool and fileset.
const JOB_JOINS: &str = "Job JOIN Client USING (ClientId) \
     LEFT JOIN Pool USING (PoolId) \
     LEFT JOIN FileSet USING (FileSetId)";

/// Same joins for counting, keeping jobs without a client row.
const JOB_COUNT_JOINS: &str = "Job LEFT JOIN Client USING (ClientId) \
     LEFT JOIN Pool USING (PoolId) \
     LEFT JOIN FileSet USING (FileSetId)";

const JOB_JOINED_NAMES: &str =
    "Client.Name AS client, Pool.Name AS pool, FileSet.FileSet AS fileset";

const JOB_BASIC_FIELDS: &[&str] = &[
    "JobId",
    "Job",
    "Name",
    "Type",
    "Level",
    "JobStatus",
    "SchedTime",
    "RealEndTime",
    "JobFiles",
    "JobBytes",
    "JobErrors",
    "Reviewed",
    "Comment",
    "RealStartTime",
    "IsVirtualFull",
    "CompressRatio",
    "Rate",
    "StatusInfo",
    "Encrypted",
];

pub(crate) const OBJECT_BASIC_FIELDS: &[&str] = &[
    "ObjectId",
    "JobId",
    "ObjectCategory",
    "ObjectType",
    "ObjectName",
    "ObjectSource",
    "ObjectSize",
    "ObjectStatus",
    "ObjectCount",
];

/// How much of each record is returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultView {
    Basic,
    #[default]
    Full,
}

impl ResultView {
    /// Projection of `table`: `table.*` or the basic field list.
    pub(crate) fn projection(&self, table: &str, basic: &[&str]) -> String {
        match self {
            ResultView::Full => format!("{}.*", table),
            ResultView::Basic => basic
                .iter()
                .map(|f| format!("{}.{}", table, f))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobMode {
    #[default]
    Normal,
    /// Jobs plus status group counts over the whole criteria.
    Overview,
    /// Jobs bucketed by job id.
    Group,
}

#[derive(Debug, Clone, Default)]
pub struct JobQuery {
    pub limit: u64,
    pub offset: u64,
    /// Job column to sort by, defaults to `jobid`.
    pub sort_col: Option<String>,
    pub sort_dir: OrderDirection,
    pub mode: JobMode,
    pub view: ResultView,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStatusCounts {
    pub successful: u64,
    pub unsuccessful: u64,
    pub warning: u64,
    pub running: u64,
    pub all_terminated: u64,
    pub all: u64,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum JobList {
    Normal(Vec<Row>),
    Overview {
        jobs: Vec<Row>,
        overview: JobStatusCounts,
    },
    Group(Grouped),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusBucket {
    pub count: u64,
    pub jobs: Vec<Row>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JobsOverview {
    pub successful: StatusBucket,
    pub unsuccessful: StatusBucket,
    pub warning: StatusBucket,
    pub running: StatusBucket,
    pub all_terminated: StatusBucket,
}

impl JobsOverview {
    fn bucket_mut(&mut self, group: JobStatusGroup) -> &mut StatusBucket {
        match group {
            JobStatusGroup::Successful => &mut self.successful,
            JobStatusGroup::Unsuccessful => &mut self.unsuccessful,
            JobStatusGroup::Warning => &mut self.warning,
            JobStatusGroup::Running => &mut self.running,
            JobStatusGroup::AllTerminated => &mut self.all_terminated,
        }
    }
}

/// Per-status job lists with the objects of the listed terminated jobs,
/// grouped by job id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobsObjectsOverview {
    pub overview: JobsOverview,
    pub objects: Grouped,
}

/// Which files of a job to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileListType {
    #[default]
    Saved,
    Deleted,
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobTotals {
    pub bytes: i64,
    pub files: i64,
}

/// Size and duration forecast for the next run of a job at a level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobEstimation {
    pub bytes_est: i64,
    pub bytes_corr: f64,
    pub files_est: i64,
    pub files_corr: f64,
    pub job_count: i64,
    pub avg_duration: i64,
    pub avg_objects: i64,
    pub success_perc: i64,
}

/// Job reporting over one catalog session.
pub struct JobManager<'a> {
    exec: &'a dyn QueryExecutor,
}

impl<'a> JobManager<'a> {
    pub fn new(exec: &'a dyn QueryExecutor) -> Self {
        Self { exec }
    }

    fn dialect(&self) -> Dialect {
        self.exec.dialect()
    }

    pub fn get_jobs(&self, criteria: &Criteria, query: &JobQuery) -> Result<JobList> {
        let sort = validate_sort_column(
            SortEntity::Job,
            query.sort_col.as_deref().unwrap_or("jobid"),
        )?;
        let dialect = self.dialect();
        let order = dialect.fold_identifier(&format!("Job.{}", sort));
        let w = build_where(criteria, false);
        let sql = format!(
            "SELECT {}, {} FROM {} {} ORDER BY {} {}{}",
            query.view.projection("Job", JOB_BASIC_FIELDS),
            JOB_JOINED_NAMES,
            JOB_JOINS,
            w.clause(),
            order,
            query.sort_dir.as_sql(),
            dialect.limit_offset(query.limit, query.offset)
        );
        let jobs = self.exec.run(&sql, &w.params)?;
        Ok(match query.mode {
            JobMode::Normal => JobList::Normal(jobs),
            JobMode::Overview => JobList::Overview {
                jobs,
                overview: self.get_job_count_by_js_group(criteria)?,
            },
            JobMode::Group => JobList::Group(group_rows_by("jobid", jobs)),
        })
    }

    /// Job counts per status group. The same criteria parameters are
    /// bound into every subquery.
    pub fn get_job_count_by_js_group(&self, criteria: &Criteria) -> Result<JobStatusCounts> {
        let w = build_where(criteria, true);
        let scope = if w.is_empty() {
            String::new()
        } else {
            format!("{} AND ", w.clause())
        };
        let count = |predicate: &str| {
            format!(
                "(SELECT COUNT(1) FROM {} WHERE {}{})",
                JOB_COUNT_JOINS, scope, predicate
            )
        };
        let mut columns: Vec<String> = JobStatusGroup::all()
            .iter()
            .map(|g| {
                format!(
                    "{} AS {}",
                    count(&group_predicate(*g, "Job.JobStatus", "Job.JobErrors")),
                    g.as_str()
                )
            })
            .collect();
        columns.push(format!(
            "{} AS {}",
            count("1 = 1"),
            self.dialect().quote_identifier("all")
        ));
        let sql = format!("SELECT {}", columns.join(", "));
        let row = self.exec.run_one(&sql, &w.params)?.unwrap_or_default();
        let get = |key: &str| row.get_i64(key).unwrap_or(0).max(0) as u64;
        Ok(JobStatusCounts {
            successful: get("successful"),
            unsuccessful: get("unsuccessful"),
            warning: get("warning"),
            running: get("running"),
            all_terminated: get("all_terminated"),
            all: get("all"),
        })
    }

    /// Best effort: a failing step is logged, rolled back and reported as
    /// an empty overview.
    pub fn get_jobs_objects_overview(
        &self,
        criteria: &Criteria,
        limit: u64,
        offset: u64,
        view: ResultView,
    ) -> JobsObjectsOverview {
        let _span = tracing::info_span!("jobs_objects_overview").entered();
        match self.try_jobs_objects_overview(criteria, limit, offset, view) {
            Ok(overview) => overview,
            Err(e) => {
                log::error!(
                    "Jobs objects overview failed: {} (SQL: {})",
                    e,
                    e.statement().unwrap_or("-")
                );
                JobsObjectsOverview::default()
            }
        }
    }

    fn try_jobs_objects_overview(
        &self,
        criteria: &Criteria,
        limit: u64,
        offset: u64,
        view: ResultView,
    ) -> std::result::Result<JobsObjectsOverview, DatabaseError> {
        let dialect = self.dialect();
        let tx = TransactionGuard::begin(self.exec)?;
        let w = build_where(criteria, false);
        let select = format!(
            "SELECT Job.JobId AS jobid, Job.JobStatus AS jobstatus, Job.JobErrors AS joberrors \
             FROM {} {}",
            JOB_COUNT_JOINS,
            w.clause()
        );
        let scratch = ScratchTable::create(self.exec, "jobid_jobstatus", &select, &w.params)?;
        let t = scratch.name();
        let no_params = Params::new();

        let mut overview = JobsOverview::default();
        let counts = self.exec.run(
            &format!(
                "SELECT CASE WHEN joberrors > 0 AND jobstatus = 'T' THEN 'W' ELSE jobstatus END \
                 AS status, COUNT(1) AS count FROM {} GROUP BY 1",
                t
            ),
            &no_params,
        )?;
        for row in &counts {
            let status = row.get_str("status").and_then(|s| s.chars().next());
            let count = row.get_i64("count").unwrap_or(0).max(0) as u64;
            let Some(status) = status else { continue };
            if let Some(group) = classify(status, 0) {
                overview.bucket_mut(group).count += count;
            }
            if is_terminated(status) {
                overview.all_terminated.count += count;
            }
        }

        let record = view.projection("Job", JOB_BASIC_FIELDS);
        let page = dialect.limit_offset(limit, offset);
        for group in JobStatusGroup::all() {
            let order = match group {
                JobStatusGroup::Running => "Job.JobId DESC",
                JobStatusGroup::AllTerminated => "Job.StartTime DESC",
                _ => "Job.EndTime DESC",
            };
            let predicate = group_predicate(group, &format!("{}.jobstatus", t), &format!("{}.joberrors", t));
            let sql = format!(
                "SELECT {} FROM {} JOIN Job ON Job.JobId = {}.jobid WHERE {} ORDER BY {}{}",
                record, t, t, predicate, order, page
            );
            overview.bucket_mut(group).jobs = self.exec.run(&sql, &no_params)?;
        }

        // Objects of exactly the jobs listed in the three terminated buckets.
        let listed: Vec<String> = [
            JobStatusGroup::Unsuccessful,
            JobStatusGroup::Warning,
            JobStatusGroup::Successful,
        ]
        .iter()
        .enumerate()
        .map(|(i, group)| {
            format!(
                "SELECT jobid FROM (SELECT jobid FROM {} WHERE {} ORDER BY jobid DESC{}) AS listed_{}",
                t,
                group_predicate(*group, "jobstatus", "joberrors"),
                page,
                i
            )
        })
        .collect();
        let sql = format!(
            "SELECT {} FROM Object WHERE Object.JobId IN ({}) ORDER BY Object.JobId DESC, Object.ObjectId",
            view.projection("Object", OBJECT_BASIC_FIELDS),
            listed.join(" UNION ")
        );
        let objects = group_rows_by("jobid", self.exec.run(&sql, &no_params)?);

        drop(scratch);
        tx.commit()?;
        Ok(JobsObjectsOverview { overview, objects })
    }

    pub fn get_job_by_id(&self, jobid: i64) -> Result<Option<Row>> {
        let criteria = Criteria::new().with("Job.JobId", Clause::eq(jobid))?;
        let w = build_where(&criteria, false);
        let sql = format!(
            "SELECT Job.*, {} FROM {} {}",
            JOB_JOINED_NAMES,
            JOB_JOINS,
            w.clause()
        );
        Ok(self.exec.run_one(&sql, &w.params)?)
    }

    /// Successful backups of a job/client/fileset, newest first, reduced to
    /// the chain needed for a restore.
    pub fn get_recent_jobids(
        &self,
        jobname: &str,
        clientid: i64,
        filesetid: i64,
        include_copy_jobs: bool,
    ) -> Result<Vec<i64>> {
        let types = if include_copy_jobs { "'B','C'" } else { "'B'" };
        let sql = format!(
            "SELECT JobId AS jobid, Level AS level FROM Job \
             WHERE Name = :name AND ClientId = :clientid AND FileSetId = :filesetid \
             AND Type IN ({}) AND JobStatus IN ('T','W') AND Level IN ('F','I','D') \
             ORDER BY RealEndTime DESC, JobId DESC",
            types
        );
        let params = Params::from([
            (":name".to_string(), SqlValue::from(jobname)),
            (":clientid".to_string(), SqlValue::from(clientid)),
            (":filesetid".to_string(), SqlValue::from(filesetid)),
        ]);
        let rows = self.exec.run(&sql, &params)?;
        Ok(find_compositional_jobs(&history(&rows)))
    }

    /// Job ids a restore of `jobid` has to read, newest first.
    pub fn get_jobids_to_restore(&self, jobid: i64) -> Result<Vec<i64>> {
        let params = Params::from([(":jobid".to_string(), SqlValue::from(jobid))]);
        let job = self.exec.run_one(
            "SELECT JobId AS jobid, Level AS level, ClientId AS clientid, \
             FileSetId AS filesetid, EndTime AS endtime FROM Job \
             WHERE JobId = :jobid AND JobStatus IN ('T','W') AND Type IN ('B','C') \
             AND Level IN ('F','I','D')",
            &params,
        )?;
        let Some(job) = job else {
            return Ok(Vec::new());
        };
        if job.get_str("level") == Some("F") {
            return Ok(vec![jobid]);
        }
        let params = Params::from([
            (":jobid".to_string(), SqlValue::from(jobid)),
            (":clientid".to_string(), SqlValue::from(job.get_i64("clientid"))),
            (":filesetid".to_string(), SqlValue::from(job.get_i64("filesetid"))),
            (":endtime".to_string(), SqlValue::from(job.get_str("endtime"))),
        ]);
        let rows = self.exec.run(
            "SELECT JobId AS jobid, Level AS level FROM Job \
             WHERE ClientId = :clientid AND FileSetId = :filesetid \
             AND Type IN ('B','C') AND JobStatus IN ('T','W') AND Level IN ('F','I','D') \
             AND StartTime <= :endtime AND JobId <= :jobid \
             ORDER BY JobId DESC",
            &params,
        )?;
        Ok(find_compositional_jobs(&history(&rows)))
    }

    /// Saved versions of a file on one client. `filename` is matched as a
    /// substring unless `strict`.
    pub fn get_jobs_by_filename(
        &self,
        clientid: i64,
        filename: &str,
        strict: bool,
        path: Option<&str>,
        allowed_jobs: Option<&[String]>,
    ) -> Result<Vec<Row>> {
        if allowed_jobs.is_some_and(|a| a.is_empty()) {
            return Ok(Vec::new());
        }
        let pattern = if strict {
            filename.to_string()
        } else {
            format!("%{}%", filename)
        };
        let mut criteria = Criteria::new()
            .with("Client.ClientId", Clause::eq(clientid))?
            .with("File.Filename", Clause::like(pattern))?;
        if let Some(path) = path {
            criteria.push("Path.Path", Clause::eq(path))?;
        }
        if let Some(allowed) = allowed_jobs {
            criteria.push("Job.Name", Clause::in_list(allowed))?;
        }
        let w = build_where(&criteria, true);
        let sql = format!(
            "SELECT Job.JobId AS jobid, Job.Name AS name, {} AS file, \
             Job.StartTime AS starttime, Job.EndTime AS endtime, Job.Type AS type, \
             Job.Level AS level, Job.JobStatus AS jobstatus, Job.JobFiles AS jobfiles, \
             Job.JobBytes AS jobbytes \
             FROM Client, Job, File, Path \
             WHERE Client.ClientId = Job.ClientId AND Job.JobId = File.JobId \
             AND File.FileIndex > 0 AND Path.PathId = File.PathId AND {} \
             ORDER BY starttime DESC",
            self.dialect().concat("Path.Path", "File.Filename"),
            w.clause()
        );
        Ok(self.exec.run(&sql, &w.params)?)
    }

    /// Files of a job including its base files. `lstat` is replaced by
    /// the decoded attributes when it can be decoded.
    pub fn get_job_files(
        &self,
        jobid: i64,
        list_type: FileListType,
        offset: u64,
        limit: u64,
        search: Option<&str>,
    ) -> Result<Vec<Row>> {
        let mut rows = self.job_files(jobid, list_type, offset, limit, search)?;
        for row in rows.iter_mut() {
            let decoded = row.get_str("lstat").and_then(lstat::decode);
            if let Some(stat) = decoded {
                if let Ok(value) = serde_json::to_value(stat) {
                    row.insert("lstat".to_string(), value);
                }
            }
        }
        Ok(rows)
    }

    /// Full paths only.
    pub fn get_job_file_names(
        &self,
        jobid: i64,
        list_type: FileListType,
        offset: u64,
        limit: u64,
        search: Option<&str>,
    ) -> Result<Vec<String>> {
        let rows = self.job_files(jobid, list_type, offset, limit, search)?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get_str("file").map(str::to_string))
            .collect())
    }

    fn job_files(
        &self,
        jobid: i64,
        list_type: FileListType,
        offset: u64,
        limit: u64,
        search: Option<&str>,
    ) -> Result<Vec<Row>> {
        let dialect = self.dialect();
        let index_filter = |column: &str| match list_type {
            FileListType::Saved => format!(" AND {} > 0", column),
            FileListType::Deleted => format!(" AND {} <= 0", column),
            FileListType::All => String::new(),
        };
        let mut params = Params::from([(":jobid".to_string(), SqlValue::from(jobid))]);
        let search_filter = match search.filter(|s| !s.is_empty()) {
            Some(s) => {
                params.insert(":search".to_string(), SqlValue::from(format!("%{}%", s)));
                format!(
                    " AND (LOWER({}) LIKE LOWER(:search) OR LOWER({}) LIKE LOWER(:search))",
                    dialect.text_for_lower("Path.Path"),
                    dialect.text_for_lower("File.Filename")
                )
            }
            None => String::new(),
        };
        let sql = format!(
            "SELECT {} AS file, F.lstat AS lstat, F.fileindex AS fileindex FROM (\
             SELECT PathId AS pathid, LStat AS lstat, FileIndex AS fileindex, FileId AS fileid \
             FROM File WHERE JobId = :jobid{} \
             UNION ALL \
             SELECT File.PathId AS pathid, File.LStat AS lstat, File.FileIndex AS fileindex, \
             File.FileId AS fileid \
             FROM BaseFiles JOIN File ON (BaseFiles.FileId = File.FileId) \
             WHERE BaseFiles.JobId = :jobid{}\
             ) AS F, File, Path \
             WHERE File.FileId = F.fileid AND Path.PathId = F.pathid{} \
             ORDER BY F.fileid{}",
            dialect.concat("Path.Path", "File.Filename"),
            index_filter("FileIndex"),
            index_filter("File.FileIndex"),
            search_filter,
            dialect.limit_offset(limit, offset)
        );
        Ok(self.exec.run(&sql, &params)?)
    }

    pub fn get_job_totals(&self, allowed_jobs: Option<&[String]>) -> Result<JobTotals> {
        if allowed_jobs.is_some_and(|a| a.is_empty()) {
            return Ok(JobTotals::default());
        }
        let mut criteria = Criteria::new();
        if let Some(allowed) = allowed_jobs {
            criteria.push("Job.Name", Clause::in_list(allowed))?;
        }
        let w = build_where(&criteria, false);
        let sql = format!(
            "SELECT SUM(JobFiles) AS files, SUM(JobBytes) AS bytes FROM Job {}",
            w.clause()
        );
        let row = self.exec.run_one(&sql, &w.params)?.unwrap_or_default();
        Ok(JobTotals {
            bytes: row.get_i64("bytes").unwrap_or(0),
            files: row.get_i64("files").unwrap_or(0),
        })
    }

    pub fn get_jobs_on_volume(
        &self,
        mediaid: i64,
        allowed_jobs: Option<&[String]>,
    ) -> Result<Vec<Row>> {
        let criteria = Criteria::new().with("JobMedia.MediaId", Clause::eq(mediaid))?;
        self.joined_jobs(
            criteria,
            "LEFT JOIN JobMedia USING (JobId)",
            allowed_jobs,
        )
    }

    pub fn get_jobs_for_client(
        &self,
        clientid: i64,
        allowed_jobs: Option<&[String]>,
    ) -> Result<Vec<Row>> {
        let criteria = Criteria::new().with("Client.ClientId", Clause::eq(clientid))?;
        self.joined_jobs(criteria, "", allowed_jobs)
    }

    fn joined_jobs(
        &self,
        mut criteria: Criteria,
        extra_join: &str,
        allowed_jobs: Option<&[String]>,
    ) -> Result<Vec<Row>> {
        if allowed_jobs.is_some_and(|a| a.is_empty()) {
            return Ok(Vec::new());
        }
        if let Some(allowed) = allowed_jobs {
            criteria.push("Job.Name", Clause::in_list(allowed))?;
        }
        let w = build_where(&criteria, false);
        let sql = format!(
            "SELECT DISTINCT Job.*, {} FROM {} {} {} ORDER BY Job.JobId DESC",
            JOB_JOINED_NAMES,
            JOB_COUNT_JOINS,
            extra_join,
            w.clause()
        );
        Ok(self.exec.run(&sql, &w.params)?)
    }

    /// Job totals per `(type, jobstatus)`.
    pub fn get_number_of_jobs(&self, criteria: &Criteria) -> Result<Vec<Row>> {
        let w = build_where(criteria, false);
        let sql = format!(
            "SELECT Job.Type AS type, COUNT(1) AS total, Job.JobStatus AS jobstatus \
             FROM {} {} GROUP BY Job.Type, Job.JobStatus ORDER BY Job.Type, Job.JobStatus",
            JOB_COUNT_JOINS,
            w.clause()
        );
        Ok(self.exec.run(&sql, &w.params)?)
    }

    /// Forecast from the last four successful runs of `job` at `level`.
    /// Differentials only look at runs after the latest Full.
    pub fn get_job_estimation(&self, job: &str, level: char) -> Result<JobEstimation> {
        let dialect = self.dialect();
        let params = Params::from([
            (":job".to_string(), SqlValue::from(job)),
            (":level".to_string(), SqlValue::from(level.to_string())),
        ]);
        let since_full = if level == 'D' {
            " AND Job.StartTime > (SELECT StartTime FROM Job WHERE Job.Name = :job \
             AND Job.Level = 'F' AND JobStatus IN ('T','W') ORDER BY StartTime DESC LIMIT 1)"
        } else {
            ""
        };
        let source = format!(
            "SELECT JobBytes AS jobbytes, JobFiles AS jobfiles, JobTDate AS jobtdate FROM Job \
             WHERE Job.Name = :job AND Job.Level = :level AND Job.JobStatus IN ('T','W'){} \
             ORDER BY StartTime DESC LIMIT 4",
            since_full
        );
        let aggregates = if dialect.supports_regression() {
            let now = chrono::Utc::now().timestamp();
            format!(
                "COALESCE(CORR(jobbytes, jobtdate), 0) AS corr_jobbytes, \
                 ({now} * REGR_SLOPE(jobbytes, jobtdate) + REGR_INTERCEPT(jobbytes, jobtdate)) AS jobbytes, \
                 COALESCE(CORR(jobfiles, jobtdate), 0) AS corr_jobfiles, \
                 ({now} * REGR_SLOPE(jobfiles, jobtdate) + REGR_INTERCEPT(jobfiles, jobtdate)) AS jobfiles, \
                 COUNT(1) AS nb_jobs",
                now = now
            )
        } else {
            "0.1 AS corr_jobbytes, AVG(jobbytes) AS jobbytes, \
             0.1 AS corr_jobfiles, AVG(jobfiles) AS jobfiles, \
             COUNT(1) AS nb_jobs"
                .to_string()
        };
        let sql = format!("SELECT {} FROM ({}) AS estimation_source", aggregates, source);
        let row = self.exec.run_one(&sql, &params)?.unwrap_or_default();

        let duration = self.get_job_history_duration(job, level)?;
        let success = self.get_job_history_success_percent(job)?;
        let objects = self.get_job_history_average_objects(job, level)?;
        Ok(JobEstimation {
            bytes_est: row.get_f64("jobbytes").unwrap_or(0.0).max(0.0).round() as i64,
            bytes_corr: row.get_f64("corr_jobbytes").unwrap_or(0.0),
            files_est: row.get_f64("jobfiles").unwrap_or(0.0).max(0.0).round() as i64,
            files_corr: row.get_f64("corr_jobfiles").unwrap_or(0.0),
            job_count: row.get_i64("nb_jobs").unwrap_or(0),
            avg_duration: duration.unwrap_or(0.0).max(0.0).round() as i64,
            avg_objects: objects.unwrap_or(0.0).max(0.0).round() as i64,
            success_perc: success.unwrap_or(0.0).max(0.0).round() as i64,
        })
    }

    /// Average run time in seconds of `job` at `level`.
    pub fn get_job_history_duration(&self, job: &str, level: char) -> Result<Option<f64>> {
        let sql = format!(
            "SELECT AVG({}) AS duration FROM Job WHERE Name = :job AND Level = :level",
            self.dialect().epoch_diff("EndTime", "StartTime")
        );
        let params = Params::from([
            (":job".to_string(), SqlValue::from(job)),
            (":level".to_string(), SqlValue::from(level.to_string())),
        ]);
        let row = self.exec.run_one(&sql, &params)?;
        Ok(row.and_then(|r| r.get_f64("duration")))
    }

    /// Share of runs of `job` that terminated normally, in percent.
    pub fn get_job_history_success_percent(&self, job: &str) -> Result<Option<f64>> {
        let sql = "SELECT (COUNT(*) * 100.0 / NULLIF((SELECT COUNT(*) FROM Job WHERE Name = :job), 0)) \
                   AS success FROM Job WHERE Name = :job AND JobStatus = 'T'";
        let params = Params::from([(":job".to_string(), SqlValue::from(job))]);
        let row = self.exec.run_one(sql, &params)?;
        Ok(row.and_then(|r| r.get_f64("success")))
    }

    /// Average number of objects written by successful runs of `job` at `level`.
    pub fn get_job_history_average_objects(&self, job: &str, level: char) -> Result<Option<f64>> {
        let sql = "SELECT AVG(objects) AS objects FROM (\
                   SELECT COUNT(Object.ObjectId) AS objects FROM Job \
                   JOIN Object USING (JobId) \
                   WHERE Job.Name = :job AND Job.Level = :level AND Job.JobStatus = 'T' \
                   GROUP BY Job.JobId) AS job_objects";
        let params = Params::from([
            (":job".to_string(), SqlValue::from(job)),
            (":level".to_string(), SqlValue::from(level.to_string())),
        ]);
        let row = self.exec.run_one(sql, &params)?;
        Ok(row.and_then(|r| r.get_f64("objects")))
    }
}

fn history(rows: &[Row]) -> Vec<(i64, Level)> {
    rows.iter()
        .filter_map(|r| {
            let jobid = r.get_i64("jobid")?;
            let level = r.get_str("level")?.chars().next()?;
            Some((jobid, Level::from_letter(level)))
        })
        .collect()
}
