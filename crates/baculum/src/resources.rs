//! Dimension tables: clients, filesets, pools, storages and volumes.

use crate::acl::AclResource;
use crate::db::{build_where, Criteria, Params, QueryExecutor, Row, SqlValue};
use crate::error::Result;
use crate::validation::validate_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Client,
    FileSet,
    Pool,
    Storage,
    /// Media records, named by volume.
    Volume,
}

impl Resource {
    fn table(&self) -> &'static str {
        match self {
            Resource::Client => "Client",
            Resource::FileSet => "FileSet",
            Resource::Pool => "Pool",
            Resource::Storage => "Storage",
            Resource::Volume => "Media",
        }
    }

    fn id_column(&self) -> &'static str {
        match self {
            Resource::Client => "ClientId",
            Resource::FileSet => "FileSetId",
            Resource::Pool => "PoolId",
            Resource::Storage => "StorageId",
            Resource::Volume => "MediaId",
        }
    }

    fn name_column(&self) -> &'static str {
        match self {
            Resource::FileSet => "FileSet",
            Resource::Volume => "VolumeName",
            _ => "Name",
        }
    }

    /// Console ACL restricting the resource. Volumes have none.
    pub fn acl(&self) -> Option<AclResource> {
        match self {
            Resource::Client => Some(AclResource::Client),
            Resource::FileSet => Some(AclResource::FileSet),
            Resource::Pool => Some(AclResource::Pool),
            Resource::Storage => Some(AclResource::Storage),
            Resource::Volume => None,
        }
    }

    /// Pools are listed by name, the rest in catalog order.
    fn order(&self) -> &'static str {
        match self {
            Resource::Pool => " ORDER BY Name ASC",
            _ => "",
        }
    }
}

pub struct ResourceManager<'a> {
    exec: &'a dyn QueryExecutor,
}

impl<'a> ResourceManager<'a> {
    pub fn new(exec: &'a dyn QueryExecutor) -> Self {
        Self { exec }
    }

    pub fn list(
        &self,
        resource: Resource,
        criteria: &Criteria,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Row>> {
        let w = build_where(criteria, false);
        let sql = format!(
            "SELECT {table}.* FROM {table} {where_}{order}{page}",
            table = resource.table(),
            where_ = w.clause(),
            order = resource.order(),
            page = self.exec.dialect().limit_offset(limit, offset),
        );
        Ok(self.exec.run(&sql, &w.params)?)
    }

    pub fn by_id(&self, resource: Resource, id: i64) -> Result<Option<Row>> {
        self.find(resource, resource.id_column(), SqlValue::Integer(id))
    }

    pub fn by_name(&self, resource: Resource, name: &str) -> Result<Option<Row>> {
        let name = validate_name(name)?;
        self.find(resource, resource.name_column(), SqlValue::from(name))
    }

    fn find(&self, resource: Resource, column: &str, value: SqlValue) -> Result<Option<Row>> {
        let sql = format!(
            "SELECT {table}.* FROM {table} WHERE {table}.{column} = :value",
            table = resource.table(),
            column = column,
        );
        let params = Params::from([(":value".to_string(), value)]);
        Ok(self.exec.run_one(&sql, &params)?)
    }

    pub fn get_clients(&self, criteria: &Criteria, limit: u64, offset: u64) -> Result<Vec<Row>> {
        self.list(Resource::Client, criteria, limit, offset)
    }

    pub fn get_client_by_id(&self, id: i64) -> Result<Option<Row>> {
        self.by_id(Resource::Client, id)
    }

    pub fn get_client_by_name(&self, name: &str) -> Result<Option<Row>> {
        self.by_name(Resource::Client, name)
    }

    pub fn get_filesets(&self, criteria: &Criteria, limit: u64, offset: u64) -> Result<Vec<Row>> {
        self.list(Resource::FileSet, criteria, limit, offset)
    }

    pub fn get_fileset_by_id(&self, id: i64) -> Result<Option<Row>> {
        self.by_id(Resource::FileSet, id)
    }

    pub fn get_fileset_by_name(&self, name: &str) -> Result<Option<Row>> {
        self.by_name(Resource::FileSet, name)
    }

    pub fn get_pools(&self, limit: u64, offset: u64) -> Result<Vec<Row>> {
        self.list(Resource::Pool, &Criteria::new(), limit, offset)
    }

    pub fn get_pool_by_id(&self, id: i64) -> Result<Option<Row>> {
        self.by_id(Resource::Pool, id)
    }

    pub fn get_pool_by_name(&self, name: &str) -> Result<Option<Row>> {
        self.by_name(Resource::Pool, name)
    }

    pub fn get_storages(&self, limit: u64, offset: u64) -> Result<Vec<Row>> {
        self.list(Resource::Storage, &Criteria::new(), limit, offset)
    }

    pub fn get_storage_by_id(&self, id: i64) -> Result<Option<Row>> {
        self.by_id(Resource::Storage, id)
    }

    pub fn get_storage_by_name(&self, name: &str) -> Result<Option<Row>> {
        self.by_name(Resource::Storage, name)
    }

    pub fn get_volumes(&self, criteria: &Criteria, limit: u64, offset: u64) -> Result<Vec<Row>> {
        self.list(Resource::Volume, criteria, limit, offset)
    }

    pub fn get_volume_by_id(&self, id: i64) -> Result<Option<Row>> {
        self.by_id(Resource::Volume, id)
    }

    pub fn get_volume_by_name(&self, name: &str) -> Result<Option<Row>> {
        self.by_name(Resource::Volume, name)
    }
}
