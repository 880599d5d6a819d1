//! Registry of catalog columns that may appear in generated SQL text.
//!
//! Column names are the only user-influenced text interpolated into
//! queries. Everything that reaches [`super::criteria`] or an ORDER BY goes
//! through this registry first.

use std::fmt;

use super::criteria::CriteriaError;

pub const JOB_FIELDS: &[&str] = &[
    "JobId",
    "Job",
    "Name",
    "Type",
    "Level",
    "ClientId",
    "JobStatus",
    "SchedTime",
    "StartTime",
    "EndTime",
    "RealEndTime",
    "RealStartTime",
    "JobTDate",
    "VolSessionId",
    "VolSessionTime",
    "JobFiles",
    "JobBytes",
    "ReadBytes",
    "JobErrors",
    "JobMissingFiles",
    "PoolId",
    "FileSetId",
    "PriorJobId",
    "PriorJob",
    "PurgedFiles",
    "HasBase",
    "HasCache",
    "Reviewed",
    "Comment",
    "FileTable",
    "IsVirtualFull",
    "CompressRatio",
    "Rate",
    "StatusInfo",
    "Encrypted",
];

pub const OBJECT_FIELDS: &[&str] = &[
    "ObjectId",
    "JobId",
    "Path",
    "Filename",
    "PluginName",
    "ObjectCategory",
    "ObjectType",
    "ObjectName",
    "ObjectSource",
    "ObjectUUID",
    "ObjectSize",
    "ObjectStatus",
    "ObjectCount",
];

pub const CLIENT_FIELDS: &[&str] = &[
    "ClientId",
    "Name",
    "Uname",
    "AutoPrune",
    "FileRetention",
    "JobRetention",
];

pub const FILESET_FIELDS: &[&str] = &["FileSetId", "FileSet", "MD5", "CreateTime", "Content"];

pub const POOL_FIELDS: &[&str] = &[
    "PoolId",
    "Name",
    "NumVols",
    "MaxVols",
    "PoolType",
    "LabelFormat",
    "Enabled",
];

pub const STORAGE_FIELDS: &[&str] = &["StorageId", "Name", "AutoChanger"];

pub const MEDIA_FIELDS: &[&str] = &[
    "MediaId",
    "VolumeName",
    "PoolId",
    "StorageId",
    "MediaType",
    "VolStatus",
    "VolBytes",
    "LastWritten",
];

pub const FILE_FIELDS: &[&str] = &[
    "FileId",
    "FileIndex",
    "JobId",
    "PathId",
    "Filename",
    "DeltaSeq",
    "MarkId",
    "LStat",
    "MD5",
];

pub const PATH_FIELDS: &[&str] = &["PathId", "Path"];

pub const JOBMEDIA_FIELDS: &[&str] = &[
    "JobMediaId",
    "JobId",
    "MediaId",
    "FirstIndex",
    "LastIndex",
];

/// Columns of the configured-source projection (`sres`).
pub const SOURCE_FIELDS: &[&str] = &["job", "client", "fileset"];

/// Table names and aliases accepted as the qualifier of a column.
const TABLES: &[(&str, &[&str])] = &[
    ("Job", JOB_FIELDS),
    ("Object", OBJECT_FIELDS),
    ("Client", CLIENT_FIELDS),
    ("FileSet", FILESET_FIELDS),
    ("Pool", POOL_FIELDS),
    ("Storage", STORAGE_FIELDS),
    ("Media", MEDIA_FIELDS),
    ("File", FILE_FIELDS),
    ("Path", PATH_FIELDS),
    ("JobMedia", JOBMEDIA_FIELDS),
    // Latest-job alias used by source reconciliation.
    ("jres", JOB_FIELDS),
    ("fres", FILESET_FIELDS),
    ("sres", SOURCE_FIELDS),
];

/// A registry-validated, qualified catalog column such as `Job.JobId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Column {
    table: &'static str,
    field: &'static str,
}

impl Column {
    /// Resolves `Table.Field` (case-insensitive) to its canonical spelling.
    pub fn parse(name: &str) -> Result<Self, CriteriaError> {
        let (table, field) = name
            .split_once('.')
            .ok_or_else(|| CriteriaError::UnknownColumn(name.to_string()))?;
        TABLES
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(table))
            .and_then(|(t, fields)| {
                fields
                    .iter()
                    .find(|f| f.eq_ignore_ascii_case(field))
                    .map(|f| Column { table: t, field: f })
            })
            .ok_or_else(|| CriteriaError::UnknownColumn(name.to_string()))
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Base of the bind-parameter names generated for this column.
    pub fn param_base(&self) -> String {
        format!("{}_{}", self.table, self.field).to_lowercase()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.field)
    }
}

/// Entities whose result sets can be sorted by a caller-supplied column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortEntity {
    Job,
    Object,
    ObjectOverview,
    Source,
    Client,
    FileSet,
}

/// Source listing sort keys.
pub const SOURCE_SORT_COLUMNS: &[&str] = &[
    "job",
    "client",
    "fileset",
    "starttime",
    "endtime",
    "jobid",
    "content",
    "type",
    "jobstatus",
    "joberrors",
];

/// Sort keys shared by both halves of the object overview.
pub const OVERVIEW_GENERAL_ORDER_COLUMNS: &[&str] =
    &["jobid", "starttime", "endtime", "jobstatus", "joberrors", "client"];

/// Sort keys only meaningful for the object half of the overview.
pub const OVERVIEW_OBJECT_ORDER_COLUMNS: &[&str] = &[
    "objectname",
    "objecttype",
    "objectcategory",
    "objectsource",
    "objectsize",
    "objectstatus",
];

impl SortEntity {
    /// Sort keys for the entity. Job and object keys are catalog columns
    /// only, so joined names such as `client` or `jobname` are refused.
    pub fn columns(&self) -> Vec<&'static str> {
        match self {
            SortEntity::Job => JOB_FIELDS.to_vec(),
            SortEntity::Object => OBJECT_FIELDS.to_vec(),
            SortEntity::ObjectOverview => OVERVIEW_GENERAL_ORDER_COLUMNS
                .iter()
                .chain(OVERVIEW_OBJECT_ORDER_COLUMNS.iter())
                .copied()
                .collect(),
            SortEntity::Source => SOURCE_SORT_COLUMNS.to_vec(),
            SortEntity::Client => CLIENT_FIELDS.to_vec(),
            SortEntity::FileSet => FILESET_FIELDS.to_vec(),
        }
    }

    /// Finds the canonical spelling of a sort key, ignoring case.
    pub fn resolve(&self, name: &str) -> Option<&'static str> {
        self.columns()
            .into_iter()
            .find(|c| c.eq_ignore_ascii_case(name))
    }
}
