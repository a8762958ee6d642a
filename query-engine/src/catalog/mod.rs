//! Name lookup for append-only tables.
//!
//! Each table name maps to a relation id and the [`AppendOnlyRelation`]
//! holding its segment files.

use crate::{QueryError, Result};
use common::disk_manager::DiskManager;
use common::tuple::Schema;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use storage_engine::{AppendOnlyRelation, RelationDesc, StorageError, StorageKind, StorageOptions};
use tracing::info;

/// A catalog entry.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub table_id: u32,
    pub name: String,
    pub schema: Schema,
    pub relation: Arc<AppendOnlyRelation>,
}

/// Tables by name. Lookups take the read lock; create and drop take the
/// write lock.
#[derive(Debug)]
pub struct Catalog {
    tables: RwLock<HashMap<String, Arc<TableInfo>>>,
    next_table_id: Mutex<u32>,
    disk: Arc<DiskManager>,
}

impl Catalog {
    /// Creates a new empty catalog over an existing disk manager.
    pub fn new(disk: Arc<DiskManager>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            next_table_id: Mutex::new(1),
            disk,
        }
    }

    /// Creates a new empty catalog whose relation files live in `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let disk = DiskManager::new(data_dir).map_err(StorageError::from)?;
        Ok(Self::new(Arc::new(disk)))
    }

    pub fn disk(&self) -> &Arc<DiskManager> {
        &self.disk
    }

    /// Registers a table and creates its relation. The relation id is the
    /// next free table id.
    pub fn create_table(
        &self,
        name: &str,
        schema: Schema,
        storage: StorageKind,
        options: StorageOptions,
    ) -> Result<Arc<TableInfo>> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(QueryError::TableExists(name.to_string()));
        }

        // The id is consumed only once the relation exists.
        let mut next_id = self.next_table_id.lock();
        let table_id = *next_id;
        let desc = RelationDesc::new(table_id, name, schema.clone(), storage).with_options(options);
        let relation = AppendOnlyRelation::create(desc, Arc::clone(&self.disk))?;
        *next_id += 1;
        drop(next_id);

        let table_info = Arc::new(TableInfo {
            table_id,
            name: name.to_string(),
            schema,
            relation,
        });
        tables.insert(name.to_string(), Arc::clone(&table_info));
        info!(table_id, name, %storage, "created table");

        Ok(table_info)
    }

    /// Looks up a table by name.
    pub fn get_table(&self, name: &str) -> Result<Arc<TableInfo>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| QueryError::TableNotFound(name.to_string()))
    }

    /// Returns all table names in the catalog, sorted.
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drops a table from the catalog and removes its files.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let table = self
            .tables
            .write()
            .remove(name)
            .ok_or_else(|| QueryError::TableNotFound(name.to_string()))?;
        table.relation.drop_storage()?;
        info!(table_id = table.table_id, name, "dropped table");
        Ok(())
    }
}
