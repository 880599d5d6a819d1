use serde::Serialize;

use crate::db::columns::{OVERVIEW_GENERAL_ORDER_COLUMNS, OVERVIEW_OBJECT_ORDER_COLUMNS};
use crate::db::grouping::compare_values;
use crate::db::{
    build_where, group_by, Clause, Criteria, DatabaseError, GroupOptions, Grouped, LatestPerKey,
    OverviewEntry, OverviewSort, Params, QueryExecutor, Row, RowExt, ScratchTable, SortEntity,
    SqlValue, TransactionGuard, WhereClause,
};
use crate::error::Result;
use crate::job::manager::OBJECT_BASIC_FIELDS;
use crate::job::ResultView;
use crate::validation::{validate_sort_column, OrderDirection};

/// Pseudo object type of jobs that wrote plain files only.
pub const FILES_TYPE: &str = "files";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ObjectMode {
    #[default]
    Normal,
    /// Objects plus counts per group, or per object type when ungrouped.
    Overview,
}

#[derive(Debug, Clone)]
pub struct ObjectQuery {
    pub limit: u64,
    pub offset: u64,
    /// Object column to sort by, defaults to `objectid`.
    pub sort_col: Option<String>,
    pub sort_dir: OrderDirection,
    /// Object property to bucket the result by.
    pub group_by: Option<String>,
    pub group_limit: u64,
    pub group_offset: u64,
    pub group_order: Option<(OverviewSort, OrderDirection)>,
    pub view: ResultView,
    pub mode: ObjectMode,
    /// Keep only the newest row of each object name.
    pub unique_objects: bool,
}

impl Default for ObjectQuery {
    fn default() -> Self {
        Self {
            limit: 0,
            offset: 0,
            sort_col: None,
            sort_dir: OrderDirection::Desc,
            group_by: None,
            group_limit: 0,
            group_offset: 0,
            group_order: None,
            view: ResultView::Full,
            mode: ObjectMode::Normal,
            unique_objects: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ObjectList {
    Flat(Vec<Row>),
    Grouped(Grouped),
    Overview {
        objects: Box<ObjectList>,
        overview: Vec<OverviewEntry>,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectTypeOverview {
    pub objecttype: String,
    pub count: u64,
    pub items: Vec<Row>,
}

/// Latest state of every object and of every file-only backup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectsOverview {
    pub types: Vec<ObjectTypeOverview>,
}

impl ObjectsOverview {
    pub fn get(&self, objecttype: &str) -> Option<&ObjectTypeOverview> {
        self.types.iter().find(|t| t.objecttype == objecttype)
    }
}

/// Object reporting over one catalog session.
pub struct ObjectManager<'a> {
    exec: &'a dyn QueryExecutor,
}

impl<'a> ObjectManager<'a> {
    pub fn new(exec: &'a dyn QueryExecutor) -> Self {
        Self { exec }
    }

    pub fn get_objects(&self, criteria: &Criteria, query: &ObjectQuery) -> Result<ObjectList> {
        let sort = validate_sort_column(
            SortEntity::Object,
            query.sort_col.as_deref().unwrap_or("objectid"),
        )?;
        let group_key = match query.group_by.as_deref() {
            Some(g) => Some(validate_sort_column(SortEntity::Object, g)?.to_lowercase()),
            None => None,
        };
        let dialect = self.exec.dialect();
        let w = build_where(criteria, false);
        let record = match query.view {
            ResultView::Full => "Object.*, Job.Name AS jobname".to_string(),
            ResultView::Basic => query.view.projection("Object", OBJECT_BASIC_FIELDS),
        };

        let mut rows = if query.unique_objects {
            // Newest first so the kept row of each name is the latest one,
            // then the caller's order and page.
            let sql = format!(
                "SELECT {} FROM Object LEFT JOIN Job USING (JobId) {} ORDER BY Object.ObjectId DESC",
                record,
                w.clause()
            );
            let all = self.exec.run(&sql, &w.params)?;
            let opts = GroupOptions {
                limit: 1,
                ..Default::default()
            };
            let mut unique = group_by("objectname", all, &opts).0.into_rows();
            let key = sort.to_lowercase();
            unique.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(&key).unwrap_or(&serde_json::Value::Null),
                    b.get(&key).unwrap_or(&serde_json::Value::Null),
                );
                match query.sort_dir {
                    OrderDirection::Asc => ord,
                    OrderDirection::Desc => ord.reverse(),
                }
            });
            let skip = query.offset as usize;
            let take = if query.limit > 0 {
                query.limit as usize
            } else {
                usize::MAX
            };
            unique.into_iter().skip(skip).take(take).collect()
        } else {
            let sql = format!(
                "SELECT {} FROM Object LEFT JOIN Job USING (JobId) {} ORDER BY {} {}{}",
                record,
                w.clause(),
                dialect.fold_identifier(&format!("Object.{}", sort)),
                query.sort_dir.as_sql(),
                dialect.limit_offset(query.limit, query.offset)
            );
            self.exec.run(&sql, &w.params)?
        };

        let Some(key) = group_key else {
            return Ok(match query.mode {
                ObjectMode::Normal => ObjectList::Flat(rows),
                ObjectMode::Overview => ObjectList::Overview {
                    overview: self.object_type_counts(&w)?,
                    objects: Box::new(ObjectList::Flat(rows)),
                },
            });
        };

        let opts = GroupOptions {
            limit: query.group_limit,
            offset: query.group_offset,
            overview_key: Some(key.as_str()),
            order: query.group_order,
        };
        let (grouped, overview) = group_by(&key, std::mem::take(&mut rows), &opts);
        Ok(match query.mode {
            ObjectMode::Normal => ObjectList::Grouped(grouped),
            ObjectMode::Overview => ObjectList::Overview {
                objects: Box::new(ObjectList::Grouped(grouped)),
                overview,
            },
        })
    }

    fn object_type_counts(&self, w: &WhereClause) -> Result<Vec<OverviewEntry>> {
        let sql = format!(
            "SELECT Object.ObjectType AS objecttype, COUNT(1) AS count \
             FROM Object LEFT JOIN Job USING (JobId) {} \
             GROUP BY Object.ObjectType ORDER BY Object.ObjectType",
            w.clause()
        );
        let rows = self.exec.run(&sql, &w.params)?;
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let count = r.get_i64("count")?.max(0) as u64;
                let value = r.get("objecttype")?.clone();
                Some(OverviewEntry {
                    field: "objecttype".to_string(),
                    value,
                    count,
                })
            })
            .collect())
    }

    pub fn get_object_by_id(&self, objectid: i64) -> Result<Option<Row>> {
        let criteria = Criteria::new().with("Object.ObjectId", Clause::eq(objectid))?;
        let query = ObjectQuery {
            limit: 1,
            ..Default::default()
        };
        match self.get_objects(&criteria, &query)? {
            ObjectList::Flat(rows) => Ok(rows.into_iter().next()),
            _ => Ok(None),
        }
    }

    pub fn get_object_categories(&self, criteria: &Criteria) -> Result<Vec<String>> {
        let w = build_where(criteria, false);
        let sql = format!(
            "SELECT DISTINCT Object.ObjectCategory AS objectcategory \
             FROM Object JOIN Job USING (JobId) {} ORDER BY objectcategory",
            w.clause()
        );
        let rows = self.exec.run(&sql, &w.params)?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get_str("objectcategory").map(str::to_string))
            .collect())
    }

    /// Every stored version of one object, newest job first.
    pub fn get_object_versions(&self, objectuuid: &str) -> Result<Vec<Row>> {
        let sql = "SELECT obj.ObjectUUID AS objectuuid, obj.ObjectId AS objectid, \
                   obj.ObjectType AS objecttype, obj.ObjectName AS objectname, \
                   obj.ObjectCategory AS objectcategory, Job.JobId AS jobid, \
                   Job.Name AS jobname, Job.Level AS level, Job.JobStatus AS jobstatus, \
                   Job.JobBytes AS jobbytes, Job.JobFiles AS jobfiles, \
                   Job.StartTime AS starttime, Job.EndTime AS endtime, \
                   Job.JobErrors AS joberrors, Client.Name AS client, \
                   FileSet.FileSet AS fileset \
                   FROM Object AS obj \
                   LEFT JOIN Job USING (JobId) \
                   LEFT JOIN Client USING (ClientId) \
                   LEFT JOIN FileSet USING (FileSetId) \
                   WHERE obj.ObjectUUID = :objectuuid \
                   ORDER BY Job.StartTime DESC";
        let params = Params::from([(":objectuuid".to_string(), SqlValue::from(objectuuid))]);
        Ok(self.exec.run(sql, &params)?)
    }

    /// Latest object of every `(type, name)` and latest file-only backup of
    /// every client/fileset pair, counted and paged per object type.
    ///
    /// `general` filters jobs, `object` filters objects; with object
    /// filters present the `files` type is empty. Database failures are
    /// logged and give an empty overview.
    pub fn get_objects_overview(
        &self,
        general: &Criteria,
        object: &Criteria,
        limit: u64,
        offset: u64,
        order_by: Option<&str>,
        order_dir: OrderDirection,
    ) -> Result<ObjectsOverview> {
        let order = match order_by {
            Some(col) => {
                let lc = col.to_lowercase();
                OVERVIEW_GENERAL_ORDER_COLUMNS
                    .iter()
                    .chain(OVERVIEW_OBJECT_ORDER_COLUMNS.iter())
                    .find(|c| **c == lc)
                    .copied()
                    .ok_or_else(|| crate::error::ValidationError::InvalidProperty {
                        property: col.to_string(),
                        allowed: SortEntity::ObjectOverview.columns().join(", "),
                    })?
            }
            None => "jobid",
        };
        let _span = tracing::info_span!("objects_overview").entered();
        match self.try_objects_overview(general, object, limit, offset, order, order_dir) {
            Ok(overview) => Ok(overview),
            Err(e) => {
                log::error!(
                    "Objects overview failed: {} (SQL: {})",
                    e,
                    e.statement().unwrap_or("-")
                );
                Ok(ObjectsOverview::default())
            }
        }
    }

    fn try_objects_overview(
        &self,
        general: &Criteria,
        object: &Criteria,
        limit: u64,
        offset: u64,
        order: &str,
        order_dir: OrderDirection,
    ) -> std::result::Result<ObjectsOverview, DatabaseError> {
        let dialect = self.exec.dialect();
        let tx = TransactionGuard::begin(self.exec)?;

        let objects_where = build_where(general, false).merge(build_where(object, true));
        let object_columns = "Object.ObjectId AS objectid, Object.ObjectType AS objecttype, \
             Object.ObjectName AS objectname, Object.ObjectCategory AS objectcategory, \
             Object.ObjectSource AS objectsource, Object.ObjectUUID AS objectuuid, \
             Object.ObjectSize AS objectsize, Object.ObjectStatus AS objectstatus, \
             Object.ObjectCount AS objectcount, Job.JobId AS jobid, Job.Name AS jobname, \
             Job.StartTime AS starttime, Job.EndTime AS endtime, Job.JobStatus AS jobstatus, \
             Job.JobErrors AS joberrors, Client.Name AS client";
        let latest_objects = match dialect.latest_per_key() {
            LatestPerKey::DistinctOn => format!(
                "SELECT DISTINCT ON (Object.ObjectType, Object.ObjectName) {} \
                 FROM Object JOIN Job USING (JobId) LEFT JOIN Client USING (ClientId) {} \
                 ORDER BY Object.ObjectType, Object.ObjectName, Object.ObjectId DESC",
                object_columns,
                objects_where.clause()
            ),
            LatestPerKey::JoinMax => format!(
                "SELECT {} FROM Object \
                 JOIN (SELECT MAX(Object.ObjectId) AS latest_id \
                 FROM Object JOIN Job USING (JobId) LEFT JOIN Client USING (ClientId) {} \
                 GROUP BY Object.ObjectType, Object.ObjectName) AS latest \
                 ON latest.latest_id = Object.ObjectId \
                 JOIN Job ON Job.JobId = Object.JobId \
                 LEFT JOIN Client ON Client.ClientId = Job.ClientId",
                object_columns,
                objects_where.clause()
            ),
        };
        let objects_table = ScratchTable::create(
            self.exec,
            "objects_latest",
            &latest_objects,
            &objects_where.params,
        )?;

        let files_where = build_where(general, false)
            .and("Job.Type = 'B'")
            .and("NOT EXISTS (SELECT 1 FROM Object WHERE Object.JobId = Job.JobId)");
        let file_columns = "Job.JobId AS jobid, Job.Name AS jobname, \
             Job.StartTime AS starttime, Job.EndTime AS endtime, Job.JobStatus AS jobstatus, \
             Job.JobErrors AS joberrors, Client.Name AS client, FileSet.FileSet AS fileset";
        let latest_files = match dialect.latest_per_key() {
            LatestPerKey::DistinctOn => format!(
                "SELECT DISTINCT ON (Job.ClientId, Job.FileSetId) {} \
                 FROM Job LEFT JOIN Client USING (ClientId) LEFT JOIN FileSet USING (FileSetId) {} \
                 ORDER BY Job.ClientId, Job.FileSetId, Job.JobId DESC",
                file_columns,
                files_where.clause()
            ),
            LatestPerKey::JoinMax => format!(
                "SELECT {} FROM Job \
                 JOIN (SELECT MAX(Job.JobId) AS latest_id \
                 FROM Job LEFT JOIN Client USING (ClientId) LEFT JOIN FileSet USING (FileSetId) {} \
                 GROUP BY Job.ClientId, Job.FileSetId) AS latest \
                 ON latest.latest_id = Job.JobId \
                 LEFT JOIN Client ON Client.ClientId = Job.ClientId \
                 LEFT JOIN FileSet ON FileSet.FileSetId = Job.FileSetId",
                file_columns,
                files_where.clause()
            ),
        };
        let files_table = if object.is_empty() {
            Some(ScratchTable::create(
                self.exec,
                "files_latest",
                &latest_files,
                &files_where.params,
            )?)
        } else {
            None
        };

        let page = dialect.limit_offset(limit, offset);
        let no_params = Params::new();
        let mut overview = ObjectsOverview::default();

        let type_counts = self.exec.run(
            &format!(
                "SELECT objecttype, COUNT(1) AS count FROM {} GROUP BY objecttype ORDER BY objecttype",
                objects_table.name()
            ),
            &no_params,
        )?;
        for row in type_counts {
            let Some(objecttype) = row.get_str("objecttype").map(str::to_string) else {
                continue;
            };
            let params = Params::from([(":objecttype".to_string(), SqlValue::from(&objecttype))]);
            let items = self.exec.run(
                &format!(
                    "SELECT * FROM {} WHERE objecttype = :objecttype ORDER BY {} {}, objectid DESC{}",
                    objects_table.name(),
                    order,
                    order_dir.as_sql(),
                    page
                ),
                &params,
            )?;
            overview.types.push(ObjectTypeOverview {
                objecttype,
                count: row.get_i64("count").unwrap_or(0).max(0) as u64,
                items,
            });
        }

        let mut files = ObjectTypeOverview {
            objecttype: FILES_TYPE.to_string(),
            ..Default::default()
        };
        if let Some(table) = &files_table {
            let count = self.exec.run_one(
                &format!("SELECT COUNT(1) AS count FROM {}", table.name()),
                &no_params,
            )?;
            files.count = count
                .and_then(|r| r.get_i64("count"))
                .unwrap_or(0)
                .max(0) as u64;
            // Object-only columns do not exist for file backups.
            let files_order = if OVERVIEW_GENERAL_ORDER_COLUMNS.contains(&order) {
                order
            } else {
                "jobid"
            };
            files.items = self.exec.run(
                &format!(
                    "SELECT * FROM {} ORDER BY {} {}, jobid DESC{}",
                    table.name(),
                    files_order,
                    order_dir.as_sql(),
                    page
                ),
                &no_params,
            )?;
        }
        overview.types.push(files);

        drop(files_table);
        drop(objects_table);
        tx.commit()?;
        Ok(overview)
    }

    /// Status of the last three jobs of each object category.
    pub fn get_object_category_status(
        &self,
        objecttype: Option<&str>,
        objectsource: Option<&str>,
        objectcategory: Option<&str>,
    ) -> Result<Vec<Row>> {
        let mut criteria = Criteria::new();
        if let Some(t) = objecttype {
            criteria.push("Object.ObjectType", Clause::eq(t))?;
        }
        if let Some(s) = objectsource {
            criteria.push("Object.ObjectSource", Clause::eq(s))?;
        }
        if let Some(c) = objectcategory {
            criteria.push("Object.ObjectCategory", Clause::eq(c))?;
        }
        let w = build_where(&criteria, false);
        let sql = format!(
            "SELECT DISTINCT b.jobid, b.jobstatus, b.starttime, b.objectcategory FROM (\
             SELECT Job.JobId AS jobid, Job.JobStatus AS jobstatus, Job.StartTime AS starttime, \
             Object.ObjectCategory AS objectcategory, \
             ROW_NUMBER() OVER (PARTITION BY Object.ObjectCategory ORDER BY Job.JobId DESC) AS r \
             FROM Job JOIN Object USING (JobId) {}\
             ) AS b WHERE b.r <= 3 ORDER BY b.objectcategory, b.jobid DESC",
            w.clause()
        );
        Ok(self.exec.run(&sql, &w.params)?)
    }

    /// Number of objects per category/type/source, counting only each
    /// object's latest version.
    pub fn get_object_category_sum(&self, criteria: &Criteria) -> Result<Vec<Row>> {
        let w = build_where(criteria, false).and(
            "Object.JobId = (SELECT MAX(iobj.JobId) FROM Object AS iobj \
             WHERE iobj.ObjectUUID = Object.ObjectUUID)",
        );
        let sql = format!(
            "SELECT Object.ObjectCategory AS objectcategory, Object.ObjectType AS objecttype, \
             Object.ObjectSource AS objectsource, SUM(1) AS count, \
             MAX(Job.StartTime) AS last_job_time \
             FROM Object JOIN Job USING (JobId) {} \
             GROUP BY Object.ObjectCategory, Object.ObjectType, Object.ObjectSource \
             ORDER BY objectcategory, objecttype, objectsource",
            w.clause()
        );
        Ok(self.exec.run(&sql, &w.params)?)
    }

    /// Object bytes per month between `datestart` and `dateend`
    /// (`YYYY-MM-DD HH:MM:SS`), by default over the last month.
    pub fn get_object_size_sum(
        &self,
        objecttype: Option<&str>,
        objectsource: Option<&str>,
        datestart: Option<&str>,
        dateend: Option<&str>,
    ) -> Result<Vec<Row>> {
        const FORMAT: &str = "%Y-%m-%d %H:%M:%S";
        let now = chrono::Local::now();
        let start = match datestart {
            Some(s) => s.to_string(),
            None => (now - chrono::Months::new(1)).format(FORMAT).to_string(),
        };
        let end = match dateend {
            Some(s) => s.to_string(),
            None => now.format(FORMAT).to_string(),
        };
        let mut params = Params::from([
            (":datestart".to_string(), SqlValue::from(start)),
            (":dateend".to_string(), SqlValue::from(end)),
        ]);
        let mut filters = String::new();
        if let Some(t) = objecttype {
            filters.push_str(" AND Object.ObjectType = :objecttype");
            params.insert(":objecttype".to_string(), SqlValue::from(t));
        }
        if let Some(s) = objectsource {
            filters.push_str(" AND Object.ObjectSource = :objectsource");
            params.insert(":objectsource".to_string(), SqlValue::from(s));
        }
        let sql = format!(
            "SELECT SUM(Object.ObjectSize) AS sum, {} AS month \
             FROM Object LEFT JOIN Job USING (JobId) \
             WHERE Job.StartTime BETWEEN :datestart AND :dateend{} \
             GROUP BY month ORDER BY month ASC",
            self.exec.dialect().date_trunc_month("Job.StartTime"),
            filters
        );
        Ok(self.exec.run(&sql, &params)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Dialect;
    use crate::testutil::{catalog, RecordingExecutor};

    fn ids(rows: &[Row], key: &str) -> Vec<i64> {
        rows.iter().filter_map(|r| r.get_i64(key)).collect()
    }

    #[test]
    fn test_get_objects_flat() {
        let session = catalog();
        let objects = ObjectManager::new(&session);
        let criteria = Criteria::new()
            .with("Object.ObjectType", Clause::eq("PostgreSQL"))
            .unwrap();
        let ObjectList::Flat(rows) = objects.get_objects(&criteria, &ObjectQuery::default()).unwrap()
        else {
            panic!("expected a flat list");
        };
        assert_eq!(ids(&rows, "objectid"), vec![5, 4, 3, 2, 1]);
        assert_eq!(rows[0].get_str("jobname"), Some("pg-gamma"));
    }

    #[test]
    fn test_get_objects_basic_view_and_paging() {
        let session = catalog();
        let query = ObjectQuery {
            limit: 2,
            offset: 1,
            sort_col: Some("ObjectSize".to_string()),
            sort_dir: OrderDirection::Asc,
            view: ResultView::Basic,
            ..Default::default()
        };
        let ObjectList::Flat(rows) = ObjectManager::new(&session)
            .get_objects(&Criteria::new(), &query)
            .unwrap()
        else {
            panic!("expected a flat list");
        };
        assert_eq!(ids(&rows, "objectid"), vec![1, 3]);
        assert!(!rows[0].contains_key("jobname"));
        assert!(!rows[0].contains_key("objectuuid"));
    }

    #[test]
    fn test_get_objects_unique() {
        let session = catalog();
        let query = ObjectQuery {
            unique_objects: true,
            sort_col: Some("objectname".to_string()),
            sort_dir: OrderDirection::Asc,
            ..Default::default()
        };
        let ObjectList::Flat(rows) = ObjectManager::new(&session)
            .get_objects(&Criteria::new(), &query)
            .unwrap()
        else {
            panic!("expected a flat list");
        };
        // Newest version of db1, db2 and vm1.
        assert_eq!(ids(&rows, "objectid"), vec![5, 4, 6]);
    }

    #[test]
    fn test_get_objects_grouped_overview() {
        let session = catalog();
        let query = ObjectQuery {
            group_by: Some("ObjectName".to_string()),
            group_limit: 2,
            group_order: Some((OverviewSort::Count, OrderDirection::Desc)),
            mode: ObjectMode::Overview,
            ..Default::default()
        };
        let list = ObjectManager::new(&session)
            .get_objects(&Criteria::new(), &query)
            .unwrap();
        let ObjectList::Overview { objects, overview } = list else {
            panic!("expected overview");
        };
        let ObjectList::Grouped(grouped) = *objects else {
            panic!("expected groups");
        };
        assert_eq!(grouped.get("db1").map(|g| g.len()), Some(2));
        assert_eq!(grouped.get("vm1").map(|g| g.len()), Some(1));
        assert_eq!(overview[0].count, 2);
        assert_eq!(overview.last().map(|e| e.count), Some(1));
    }

    #[test]
    fn test_get_objects_type_overview() {
        let session = catalog();
        let query = ObjectQuery {
            limit: 1,
            mode: ObjectMode::Overview,
            ..Default::default()
        };
        let ObjectList::Overview { overview, .. } = ObjectManager::new(&session)
            .get_objects(&Criteria::new(), &query)
            .unwrap()
        else {
            panic!("expected overview");
        };
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].value, "PostgreSQL");
        assert_eq!(overview[0].count, 5);
        assert_eq!(overview[1].count, 1);
    }

    #[test]
    fn test_get_objects_rejects_unknown_columns() {
        let session = catalog();
        let objects = ObjectManager::new(&session);
        let query = ObjectQuery {
            sort_col: Some("jobname".to_string()),
            ..Default::default()
        };
        assert!(objects.get_objects(&Criteria::new(), &query).is_err());
        let query = ObjectQuery {
            group_by: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(objects.get_objects(&Criteria::new(), &query).is_err());
    }

    #[test]
    fn test_object_lookups() {
        let session = catalog();
        let objects = ObjectManager::new(&session);
        let obj = objects.get_object_by_id(6).unwrap().unwrap();
        assert_eq!(obj.get_str("objectname"), Some("vm1"));
        assert!(objects.get_object_by_id(60).unwrap().is_none());

        assert_eq!(
            objects.get_object_categories(&Criteria::new()).unwrap(),
            vec!["Database", "Virtual Machine"]
        );

        let versions = objects.get_object_versions("uuid-db1").unwrap();
        assert_eq!(ids(&versions, "jobid"), vec![12, 11, 10]);
        assert_eq!(versions[0].get_str("client"), Some("gamma-fd"));
        assert_eq!(versions[0].get_str("fileset"), Some("PgSet"));
    }

    #[test]
    fn test_objects_overview() {
        let session = catalog();
        let overview = ObjectManager::new(&session)
            .get_objects_overview(&Criteria::new(), &Criteria::new(), 10, 0, None, OrderDirection::Desc)
            .unwrap();
        let pg = overview.get("PostgreSQL").unwrap();
        assert_eq!(pg.count, 2);
        assert_eq!(ids(&pg.items, "objectid"), vec![5, 4]);
        assert_eq!(overview.get("VMware").unwrap().count, 1);
        let files = overview.get(FILES_TYPE).unwrap();
        assert_eq!(files.count, 3);
        assert_eq!(ids(&files.items, "jobid"), vec![9, 8, 5]);
    }

    #[test]
    fn test_objects_overview_object_criteria_hide_files() {
        let session = catalog();
        let object = Criteria::new()
            .with("Object.ObjectStatus", Clause::eq("T"))
            .unwrap();
        let overview = ObjectManager::new(&session)
            .get_objects_overview(
                &Criteria::new(),
                &object,
                1,
                0,
                Some("ObjectSize"),
                OrderDirection::Asc,
            )
            .unwrap();
        let pg = overview.get("PostgreSQL").unwrap();
        assert_eq!(pg.count, 2);
        assert_eq!(ids(&pg.items, "objectid"), vec![1]);
        assert_eq!(overview.get(FILES_TYPE).unwrap().count, 0);
    }

    #[test]
    fn test_objects_overview_general_criteria() {
        let session = catalog();
        let general = Criteria::new()
            .with("Client.Name", Clause::eq("alpha-fd"))
            .unwrap();
        let overview = ObjectManager::new(&session)
            .get_objects_overview(&general, &Criteria::new(), 0, 0, Some("client"), OrderDirection::Asc)
            .unwrap();
        assert!(overview.get("PostgreSQL").is_none());
        assert_eq!(overview.get(FILES_TYPE).unwrap().count, 2);
    }

    #[test]
    fn test_objects_overview_rejects_unknown_order() {
        let session = catalog();
        let err = ObjectManager::new(&session)
            .get_objects_overview(&Criteria::new(), &Criteria::new(), 0, 0, Some("pool"), OrderDirection::Asc)
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ERROR_INVALID_PROPERTY);
    }

    #[test]
    fn test_objects_overview_failure_is_empty() {
        let session = crate::db::SqliteSession::open_in_memory().unwrap();
        let overview = ObjectManager::new(&session)
            .get_objects_overview(&Criteria::new(), &Criteria::new(), 0, 0, None, OrderDirection::Asc)
            .unwrap();
        assert!(overview.types.is_empty());
    }

    #[test]
    fn test_category_status_and_sum() {
        let session = catalog();
        let objects = ObjectManager::new(&session);
        let status = objects.get_object_category_status(None, None, None).unwrap();
        let db: Vec<(i64, String)> = status
            .iter()
            .filter(|r| r.get_str("objectcategory") == Some("Database"))
            .map(|r| (r.get_i64("jobid").unwrap(), r.get_str("jobstatus").unwrap().to_string()))
            .collect();
        assert_eq!(db, vec![(12, "f".to_string()), (11, "W".to_string())]);

        let only_vm = objects
            .get_object_category_status(Some("VMware"), None, None)
            .unwrap();
        assert_eq!(ids(&only_vm, "jobid"), vec![10]);

        let sum = objects.get_object_category_sum(&Criteria::new()).unwrap();
        assert_eq!(sum.len(), 2);
        assert_eq!(sum[0].get_str("objectcategory"), Some("Database"));
        assert_eq!(sum[0].get_i64("count"), Some(2));
        assert_eq!(sum[0].get_str("last_job_time"), Some("2026-09-10 03:00:00"));
    }

    #[test]
    fn test_size_sum_by_month() {
        let session = catalog();
        let objects = ObjectManager::new(&session);
        let rows = objects
            .get_object_size_sum(None, None, Some("2026-09-01 00:00:00"), Some("2026-09-30 23:59:59"))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("sum"), Some(11200));
        assert_eq!(rows[0].get_str("month"), Some("2026-09-01 00:00:00"));

        let pg = objects
            .get_object_size_sum(
                Some("PostgreSQL"),
                Some("gamma-fd"),
                Some("2026-09-01 00:00:00"),
                Some("2026-09-30 23:59:59"),
            )
            .unwrap();
        assert_eq!(pg[0].get_i64("sum"), Some(6200));

        let empty = objects
            .get_object_size_sum(None, None, Some("2020-01-01 00:00:00"), Some("2020-02-01 00:00:00"))
            .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_objects_overview_sql_postgresql() {
        let pg = RecordingExecutor::new(Dialect::PostgreSql);
        let general = Criteria::new()
            .with("Job.Name", Clause::eq("backup-alpha"))
            .unwrap();
        let overview = ObjectManager::new(&pg)
            .get_objects_overview(&general, &Criteria::new(), 5, 0, None, OrderDirection::Desc)
            .unwrap();
        assert_eq!(overview.get(FILES_TYPE).map(|t| t.count), Some(0));

        let statements = pg.statements();
        assert_eq!(statements.first().map(String::as_str), Some("BEGIN"));
        assert_eq!(statements.last().map(String::as_str), Some("COMMIT"));
        let objects = pg.find("objects_latest_").unwrap();
        assert!(objects.starts_with("CREATE TEMPORARY TABLE objects_latest_"));
        assert!(objects.contains(
            "SELECT DISTINCT ON (Object.ObjectType, Object.ObjectName) Object.ObjectId AS objectid"
        ));
        assert!(objects.contains("ORDER BY Object.ObjectType, Object.ObjectName, Object.ObjectId DESC"));
        let files = pg.find("CREATE TEMPORARY TABLE files_latest_").unwrap();
        assert!(files.contains("SELECT DISTINCT ON (Job.ClientId, Job.FileSetId)"));
        assert!(files.contains("NOT EXISTS (SELECT 1 FROM Object WHERE Object.JobId = Job.JobId)"));
        assert_eq!(
            statements.iter().filter(|s| s.starts_with("DROP TABLE IF EXISTS")).count(),
            2
        );
        assert!(pg.find("LIMIT 5").is_some());
        assert!(pg.positional().iter().any(|s| s.contains("Job.Name = $1")));
    }

    #[test]
    fn test_objects_overview_sql_mysql() {
        let my = RecordingExecutor::new(Dialect::MySql);
        ObjectManager::new(&my)
            .get_objects_overview(
                &Criteria::new(),
                &Criteria::new(),
                0,
                3,
                Some("objectsize"),
                OrderDirection::Asc,
            )
            .unwrap();
        assert_eq!(
            my.statements().first().map(String::as_str),
            Some("START TRANSACTION")
        );
        let objects = my.find("objects_latest_").unwrap();
        assert!(objects.starts_with("CREATE TABLE objects_latest_"));
        assert!(objects.contains("JOIN (SELECT MAX(Object.ObjectId) AS latest_id"));
        assert!(objects.contains("GROUP BY Object.ObjectType, Object.ObjectName) AS latest"));
        assert!(!objects.contains("DISTINCT ON"));
        let files = my.find("CREATE TABLE files_latest_").unwrap();
        assert!(files.contains("JOIN (SELECT MAX(Job.JobId) AS latest_id"));
        // Object-only sort keys fall back to jobid for file backups.
        let files_items = my.find("SELECT * FROM files_latest_").unwrap();
        assert!(files_items.contains("ORDER BY jobid ASC, jobid DESC LIMIT 18446744073709551615 OFFSET 3"));
    }

    #[test]
    fn test_category_status_sql_per_dialect() {
        for dialect in [Dialect::PostgreSql, Dialect::MySql] {
            let exec = RecordingExecutor::new(dialect);
            let rows = ObjectManager::new(&exec)
                .get_object_category_status(Some("PostgreSQL"), None, Some("Database"))
                .unwrap();
            assert!(rows.is_empty());
            let sql = exec.find("ROW_NUMBER()").unwrap();
            assert!(sql.contains(
                "ROW_NUMBER() OVER (PARTITION BY Object.ObjectCategory ORDER BY Job.JobId DESC) AS r"
            ));
            assert!(sql.contains("WHERE b.r <= 3"));
            let bound = &exec.positional()[0];
            match dialect {
                Dialect::MySql => assert_eq!(bound.matches('?').count(), 2),
                _ => assert!(bound.contains("$1") && bound.contains("$2")),
            }
        }
    }

    #[test]
    fn test_zero_row_queries_return_empty_lists() {
        let session = catalog();
        let objects = ObjectManager::new(&session);
        let criteria = Criteria::new()
            .with("Object.ObjectType", Clause::eq("NoSuchType"))
            .unwrap();
        let ObjectList::Flat(rows) = objects.get_objects(&criteria, &ObjectQuery::default()).unwrap()
        else {
            panic!("expected a flat list");
        };
        assert!(rows.is_empty());
        assert!(objects.get_object_by_id(404).unwrap().is_none());
        assert!(objects.get_object_versions("no-such-uuid").unwrap().is_empty());
        assert!(objects.get_object_categories(&criteria).unwrap().is_empty());
    }
}
