//! services/contact_store.rs
//! Almacén por tenant (contactos + auditoría de envíos) sobre SQLite.
//! Cada tenant tiene su propio archivo: <user_dir>/<tenant>/database/<tenant>.db

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Local, SecondsFormat, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use tokio::sync::Mutex;

use crate::{
    models::{
        campaign_model::CellValue,
        contact_model::{Contact, ContactFilter, OutcomeCount, SendLogEntry, SendOutcome},
    },
    services::tenant_files::sanitize_identifier,
};

/// Operaciones estrechas que el motor de campañas usa sobre el almacén.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn get_contact(&self, tenant: &str, identifier: &str) -> Result<Option<Contact>>;

    async fn get_contact_by_address(&self, tenant: &str, address: &str) -> Result<Option<Contact>>;

    /// Inserta o actualiza por `identifier` en una sola sentencia.
    async fn upsert_contact(&self, tenant: &str, contact: &Contact) -> Result<()>;

    async fn append_send_log(&self, tenant: &str, identifier: &str, outcome: SendOutcome) -> Result<()>;

    /// true si la dirección tuvo un envío exitoso dentro de la ventana
    async fn was_contacted_recently(&self, tenant: &str, address: &str, within_days: i64) -> Result<bool>;
}

#[derive(Debug, Clone)]
enum StoreLocation {
    Directory(PathBuf),
    InMemory,
}

#[derive(Clone)]
pub struct SqliteContactStore {
    location: StoreLocation,
    pools: Arc<Mutex<HashMap<String, Pool<Sqlite>>>>,
    opening: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Timestamp inválido en la base: '{}'", raw))?
        .with_timezone(&Utc))
}

/// "Data de Cadastro" -> "data_de_cadastro"
pub fn sanitize_column_name(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

/// Nombres de columna únicos: los repetidos reciben sufijo _2, _3, ...
fn unique_column_names(header_row: &[CellValue]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    // "id" es la clave primaria de la tabla importada
    counts.insert("id".to_string(), 1);

    header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let mut name = sanitize_column_name(&cell.as_text());
            if name.is_empty() {
                name = format!("column_{}", i + 1);
            }
            let seen = counts.entry(name.clone()).or_insert(0);
            *seen += 1;
            if *seen > 1 {
                format!("{}_{}", name, seen)
            } else {
                name
            }
        })
        .collect()
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', ""))
}

impl SqliteContactStore {
    pub fn new(user_data_dir: PathBuf) -> Self {
        SqliteContactStore {
            location: StoreLocation::Directory(user_data_dir),
            pools: Arc::new(Mutex::new(HashMap::new())),
            opening: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Base en memoria por tenant (tests)
    pub fn in_memory() -> Self {
        SqliteContactStore {
            location: StoreLocation::InMemory,
            pools: Arc::new(Mutex::new(HashMap::new())),
            opening: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Devuelve (y cachea) el pool del tenant, creando la base si no existe.
    pub async fn pool(&self, tenant: &str) -> Result<Pool<Sqlite>> {
        let key = sanitize_identifier(tenant);
        if key.is_empty() {
            return Err(anyhow!("Identificador de tenant vacío"));
        }

        if let Some(pool) = self.pools.lock().await.get(&key) {
            return Ok(pool.clone());
        }

        // Solo se serializa la apertura del mismo tenant; los demás siguen
        let opening = self
            .opening
            .lock()
            .await
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _opening = opening.lock().await;

        if let Some(pool) = self.pools.lock().await.get(&key) {
            return Ok(pool.clone());
        }

        let pool = self.open_pool(&key).await?;
        self.pools.lock().await.insert(key, pool.clone());
        Ok(pool)
    }

    async fn open_pool(&self, key: &str) -> Result<Pool<Sqlite>> {
        let pool = match &self.location {
            StoreLocation::Directory(base) => {
                let db_dir = base.join(key).join("database");
                std::fs::create_dir_all(&db_dir)
                    .with_context(|| format!("No se pudo crear {:?}", db_dir))?;
                let db_path = db_dir.join(format!("{}.db", key));
                let db_url = format!("sqlite:{}?mode=rwc", db_path.to_string_lossy());
                log::info!("(pool) Conectando a SQLite en {}", db_url);
                Pool::<Sqlite>::connect(&db_url)
                    .await
                    .with_context(|| format!("No se pudo abrir la base del tenant {}", key))?
            }
            StoreLocation::InMemory => SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await
                .context("No se pudo abrir la base en memoria")?,
        };

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .with_context(|| format!("Fallo en migraciones del tenant {}", key))?;
        Ok(pool)
    }

    /// Cierra todas las conexiones abiertas (apagado del proceso).
    pub async fn close_all(&self) {
        let mut pools = self.pools.lock().await;
        for (tenant, pool) in pools.drain() {
            pool.close().await;
            log::info!("(close_all) Conexión cerrada para el tenant {}", tenant);
        }
    }

    pub async fn last_sent_for_address(&self, tenant: &str, address: &str) -> Result<Option<DateTime<Utc>>> {
        let pool = self.pool(tenant).await?;
        let row = sqlx::query(
            r#"
            SELECT last_sent_at
            FROM contacts
            WHERE phone = ?1 AND last_sent_at IS NOT NULL
            ORDER BY last_sent_at DESC
            LIMIT 1
            "#,
        )
        .bind(address)
        .fetch_optional(&pool)
        .await
        .context("Error consultando último envío")?;

        match row {
            Some(r) => {
                let raw: String = r.try_get("last_sent_at")?;
                Ok(Some(parse_timestamp(&raw)?))
            }
            None => Ok(None),
        }
    }

    pub async fn send_log_for(&self, tenant: &str, identifier: &str) -> Result<Vec<SendLogEntry>> {
        let pool = self.pool(tenant).await?;
        let rows = sqlx::query(
            r#"
            SELECT contact_identifier, status, timestamp
            FROM campaign_sends
            WHERE contact_identifier = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(identifier)
        .fetch_all(&pool)
        .await
        .context("Error leyendo campaign_sends")?;

        let mut entries = Vec::with_capacity(rows.len());
        for r in rows {
            let status: String = r.try_get("status")?;
            let outcome = SendOutcome::parse(&status)
                .ok_or_else(|| anyhow!("Estado desconocido en campaign_sends: {}", status))?;
            let ts: String = r.try_get("timestamp")?;
            entries.push(SendLogEntry {
                contact_identifier: r.try_get("contact_identifier")?,
                outcome,
                timestamp: parse_timestamp(&ts)?,
            });
        }
        Ok(entries)
    }

    /// Conteo de envíos por estado
    pub async fn send_stats(&self, tenant: &str) -> Result<Vec<OutcomeCount>> {
        let pool = self.pool(tenant).await?;
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS count
            FROM campaign_sends
            GROUP BY status
            ORDER BY status
            "#,
        )
        .fetch_all(&pool)
        .await
        .context("Error calculando estadísticas")?;

        rows.into_iter()
            .map(|r| -> Result<OutcomeCount> {
                Ok(OutcomeCount {
                    status: r.try_get("status")?,
                    count: r.try_get("count")?,
                })
            })
            .collect()
    }

    pub async fn search_contacts(
        &self,
        tenant: &str,
        filter: ContactFilter,
        search_term: &str,
    ) -> Result<Vec<Contact>> {
        let pool = self.pool(tenant).await?;

        let mut sql = String::from(
            "SELECT identifier, name, branch, phone, birth_date, last_sent_at FROM contacts WHERE 1=1",
        );
        let mut params: Vec<String> = Vec::new();

        let term = search_term.trim();
        if !term.is_empty() {
            let numeric: String = term.chars().filter(|c| c.is_ascii_digit()).collect();
            // Sin dígitos no filtramos por columnas numéricas (LIKE '%%' lo aceptaría todo)
            let numeric = if numeric.is_empty() { term.to_string() } else { numeric };
            sql.push_str(" AND (name LIKE ? OR identifier LIKE ? OR phone LIKE ? OR birth_date LIKE ?)");
            params.push(format!("%{}%", term));
            params.push(format!("%{}%", numeric));
            params.push(format!("%{}%", numeric));
            params.push(format!("%{}%", term));
        }

        let today = Local::now();
        match filter {
            ContactFilter::Recent => sql.push_str(" ORDER BY last_sent_at DESC"),
            ContactFilter::BirthdaysToday => {
                sql.push_str(" AND birth_date LIKE ? ORDER BY name");
                params.push(format!("{:02}/{:02}/%", today.day(), today.month()));
            }
            ContactFilter::BirthdaysMonth => {
                sql.push_str(" AND birth_date LIKE ? ORDER BY birth_date");
                params.push(format!("%/{:02}/%", today.month()));
            }
            ContactFilter::OldestHundred => sql.push_str(" ORDER BY last_sent_at ASC LIMIT 100"),
        }

        let mut query = sqlx::query(&sql);
        for p in &params {
            query = query.bind(p);
        }
        let rows = query
            .fetch_all(&pool)
            .await
            .context("Error buscando contactos")?;

        rows.into_iter().map(|r| contact_from_row(&r)).collect()
    }

    /// Importa filas (la primera es el encabezado) a una tabla TEXT del tenant.
    /// Devuelve la cantidad de filas insertadas.
    pub async fn import_table(&self, tenant: &str, table: &str, rows: &[Vec<CellValue>]) -> Result<usize> {
        let table_name = sanitize_column_name(table);
        if table_name.is_empty() {
            return Err(anyhow!("Nombre de tabla inválido: '{}'", table));
        }
        let (header_row, data_rows) = rows
            .split_first()
            .ok_or_else(|| anyhow!("La planilla está vacía"))?;
        let columns = unique_column_names(header_row);
        if columns.is_empty() {
            return Err(anyhow!("No se encontró ningún encabezado válido"));
        }

        log::info!(
            "(import_table) tenant={} tabla={} columnas={:?}",
            tenant,
            table_name,
            columns
        );

        let pool = self.pool(tenant).await?;
        let column_defs = columns
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let create_sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, {})",
            quote_ident(&table_name),
            column_defs
        );
        sqlx::query(&create_sql)
            .execute(&pool)
            .await
            .with_context(|| format!("No se pudo crear la tabla {}", table_name))?;

        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&table_name),
            columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            vec!["?"; columns.len()].join(", ")
        );

        let mut tx = pool.begin().await?;
        let mut inserted = 0;
        for row in data_rows {
            if row.iter().all(|c| *c == CellValue::Empty) {
                continue;
            }
            let mut query = sqlx::query(&insert_sql);
            for i in 0..columns.len() {
                let value = match row.get(i) {
                    Some(CellValue::Empty) | None => None,
                    Some(cell) => Some(cell.as_text()),
                };
                query = query.bind(value);
            }
            query
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Error insertando en {}", table_name))?;
            inserted += 1;
        }
        tx.commit().await?;

        log::info!("(import_table) {} filas importadas en {}", inserted, table_name);
        Ok(inserted)
    }

    /// Lee una tabla importada: encabezado + filas. None si la tabla no existe.
    pub async fn read_table(&self, tenant: &str, table: &str) -> Result<Option<Vec<Vec<CellValue>>>> {
        let table_name = sanitize_column_name(table);
        if table_name.is_empty() {
            return Ok(None);
        }
        let pool = self.pool(tenant).await?;

        let info = sqlx::query(&format!("PRAGMA table_info({})", quote_ident(&table_name)))
            .fetch_all(&pool)
            .await
            .context("Error leyendo estructura de la tabla")?;
        let columns: Vec<String> = info
            .iter()
            .map(|r| r.try_get::<String, _>("name"))
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|name| name != "id")
            .collect();
        if columns.is_empty() {
            return Ok(None);
        }

        let select_sql = format!(
            "SELECT {} FROM {} ORDER BY id ASC",
            columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            quote_ident(&table_name)
        );
        let rows = sqlx::query(&select_sql)
            .fetch_all(&pool)
            .await
            .with_context(|| format!("Error leyendo la tabla {}", table_name))?;

        let mut table_rows = Vec::with_capacity(rows.len() + 1);
        table_rows.push(columns.iter().map(|c| CellValue::Text(c.clone())).collect());
        for r in rows {
            let mut cells = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let value: Option<String> = r.try_get(i)?;
                cells.push(match value {
                    Some(v) if !v.is_empty() => CellValue::Text(v),
                    _ => CellValue::Empty,
                });
            }
            table_rows.push(cells);
        }
        Ok(Some(table_rows))
    }
}

fn contact_from_row(r: &sqlx::sqlite::SqliteRow) -> Result<Contact> {
    let last_sent: Option<String> = r.try_get("last_sent_at")?;
    Ok(Contact {
        identifier: r.try_get("identifier")?,
        name: r.try_get("name")?,
        branch: r.try_get("branch")?,
        chosen_address: r.try_get("phone")?,
        birth_date: r.try_get("birth_date")?,
        last_sent_at: last_sent.as_deref().map(parse_timestamp).transpose()?,
    })
}

#[async_trait]
impl ContactStore for SqliteContactStore {
    async fn get_contact(&self, tenant: &str, identifier: &str) -> Result<Option<Contact>> {
        let pool = self.pool(tenant).await?;
        let row = sqlx::query(
            r#"
            SELECT identifier, name, branch, phone, birth_date, last_sent_at
            FROM contacts
            WHERE identifier = ?1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&pool)
        .await
        .context("Error consultando contacto")?;

        row.as_ref().map(contact_from_row).transpose()
    }

    async fn get_contact_by_address(&self, tenant: &str, address: &str) -> Result<Option<Contact>> {
        let pool = self.pool(tenant).await?;
        let row = sqlx::query(
            r#"
            SELECT identifier, name, branch, phone, birth_date, last_sent_at
            FROM contacts
            WHERE phone = ?1
            ORDER BY last_sent_at DESC
            LIMIT 1
            "#,
        )
        .bind(address)
        .fetch_optional(&pool)
        .await
        .context("Error consultando contacto por teléfono")?;

        row.as_ref().map(contact_from_row).transpose()
    }

    async fn upsert_contact(&self, tenant: &str, contact: &Contact) -> Result<()> {
        let pool = self.pool(tenant).await?;
        let last_sent = contact.last_sent_at.as_ref().map(format_timestamp);

        sqlx::query(
            r#"
            INSERT INTO contacts (identifier, name, branch, phone, birth_date, last_sent_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(identifier) DO UPDATE SET
                name = excluded.name,
                branch = excluded.branch,
                phone = excluded.phone,
                birth_date = excluded.birth_date,
                last_sent_at = excluded.last_sent_at
            "#,
        )
        .bind(&contact.identifier)
        .bind(&contact.name)
        .bind(&contact.branch)
        .bind(&contact.chosen_address)
        .bind(&contact.birth_date)
        .bind(last_sent)
        .execute(&pool)
        .await
        .context("Error guardando contacto")?;

        Ok(())
    }

    async fn append_send_log(&self, tenant: &str, identifier: &str, outcome: SendOutcome) -> Result<()> {
        let pool = self.pool(tenant).await?;
        let now = format_timestamp(&Utc::now());

        sqlx::query(
            r#"
            INSERT INTO campaign_sends (contact_identifier, status, timestamp)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(identifier)
        .bind(outcome.as_str())
        .bind(now)
        .execute(&pool)
        .await
        .context("Error registrando envío en campaign_sends")?;

        Ok(())
    }

    async fn was_contacted_recently(&self, tenant: &str, address: &str, within_days: i64) -> Result<bool> {
        let last_sent = self.last_sent_for_address(tenant, address).await?;
        Ok(match last_sent {
            Some(ts) => ts > Utc::now() - Duration::days(within_days),
            None => false,
        })
    }
}
