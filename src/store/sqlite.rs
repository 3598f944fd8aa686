//! Embedded relational sink. Lists are stored as JSON text and the
//! publication date as ISO `YYYY-MM-DD` text.

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{params, Connection};
use tracing::debug;

use super::{STAGING_TABLE, TABLE};
use crate::dataset::{Dataset, VacancyId, VacancyRow, COLUMNS};
use crate::error::StorageError;

const COLUMN_DEFS: &str = "
    id              INTEGER PRIMARY KEY,
    name            VARCHAR(255) NOT NULL,
    employer        VARCHAR(255) NOT NULL,
    salary_from     INTEGER,
    salary_to       INTEGER,
    currency        VARCHAR(10),
    description     TEXT NOT NULL,
    city            VARCHAR(100),
    full_address    TEXT,
    url             TEXT NOT NULL,
    key_skills      TEXT NOT NULL,
    schedule        TEXT NOT NULL,
    specializations TEXT NOT NULL,
    published_at    DATE NOT NULL,
    experience      TEXT NOT NULL
";

pub fn connect(path: &Path) -> Result<Connection, StorageError> {
    if path != Path::new(":memory:") {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        TABLE, COLUMN_DEFS
    ))?;
    Ok(())
}

/// Replace the staging table with `dataset`, then copy over every staged row
/// whose id is absent from `vacancy`. Existing rows are never updated.
/// Runs in one transaction and returns the number of inserted rows.
pub fn merge(conn: &Connection, dataset: &Dataset) -> Result<usize, StorageError> {
    init_schema(conn)?;
    let tx = conn.unchecked_transaction()?;
    load_staging(&tx, dataset)?;
    let columns = COLUMNS.join(", ");
    let inserted = tx.execute(
        &format!(
            "INSERT INTO {table} ({columns})
             SELECT {columns} FROM {staging} AS s
             WHERE s.id NOT IN (SELECT v.id FROM {table} AS v)",
            table = TABLE,
            staging = STAGING_TABLE,
            columns = columns,
        ),
        [],
    )?;
    tx.commit()?;
    Ok(inserted)
}

fn load_staging(conn: &Connection, dataset: &Dataset) -> Result<(), StorageError> {
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {staging};
         CREATE TABLE {staging} ({defs});",
        staging = STAGING_TABLE,
        defs = COLUMN_DEFS,
    ))?;

    let placeholders: Vec<String> = (1..=COLUMNS.len()).map(|i| format!("?{}", i)).collect();
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        STAGING_TABLE,
        COLUMNS.join(", "),
        placeholders.join(", ")
    ))?;
    for r in dataset.rows() {
        stmt.execute(params![
            r.id.0,
            r.name,
            r.employer,
            r.salary_from,
            r.salary_to,
            r.currency,
            r.description,
            r.city,
            r.full_address,
            r.url,
            serde_json::to_string(&r.key_skills)?,
            r.schedule,
            serde_json::to_string(&r.specializations)?,
            r.published_at,
            r.experience,
        ])?;
    }
    debug!("Staged {} rows in {}", dataset.len(), STAGING_TABLE);
    Ok(())
}

pub fn read_all(conn: &Connection) -> Result<Dataset, StorageError> {
    init_schema(conn)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} ORDER BY id",
        COLUMNS.join(", "),
        TABLE
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(VacancyRow {
                id: VacancyId(row.get(0)?),
                name: row.get(1)?,
                employer: row.get(2)?,
                salary_from: row.get(3)?,
                salary_to: row.get(4)?,
                currency: row.get(5)?,
                description: row.get(6)?,
                city: row.get(7)?,
                full_address: row.get(8)?,
                url: row.get(9)?,
                key_skills: json_list(row, 10)?,
                schedule: row.get(11)?,
                specializations: json_list(row, 12)?,
                published_at: row.get(13)?,
                experience: row.get(14)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Dataset::assemble(rows))
}

fn json_list(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
