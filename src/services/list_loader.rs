//! services/list_loader.rs
//! Obtiene las filas crudas de una lista: archivo subido o tabla importada.

use anyhow::Result;

use crate::{
    models::campaign_model::{CellValue, ListSource},
    services::{contact_store::SqliteContactStore, tenant_files::TenantFiles},
};

#[derive(Clone)]
pub struct ListLoader {
    files: TenantFiles,
    store: SqliteContactStore,
}

impl ListLoader {
    pub fn new(files: TenantFiles, store: SqliteContactStore) -> Self {
        ListLoader { files, store }
    }

    /// Encabezado + filas. `Ok(None)` si la fuente no existe.
    pub async fn load(&self, tenant: &str, source: &ListSource) -> Result<Option<Vec<Vec<CellValue>>>> {
        match source {
            ListSource::File { file_name } => self.files.read_list(tenant, file_name),
            ListSource::Table { table_name } => self.store.read_table(tenant, table_name).await,
        }
    }
}
