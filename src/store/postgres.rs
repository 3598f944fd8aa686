//! PostgreSQL sink with native `TEXT[]` and `DATE` columns.

use chrono::NaiveDate;
use postgres::{Client, NoTls};
use tracing::debug;

use super::{STAGING_TABLE, TABLE};
use crate::dataset::{Dataset, VacancyId, VacancyRow, COLUMNS};
use crate::error::StorageError;

const COLUMN_DEFS: &str = "
    id              BIGINT PRIMARY KEY,
    name            VARCHAR(255) NOT NULL,
    employer        VARCHAR(255) NOT NULL,
    salary_from     BIGINT,
    salary_to       BIGINT,
    currency        VARCHAR(10),
    description     TEXT NOT NULL,
    city            VARCHAR(100),
    full_address    TEXT,
    url             TEXT NOT NULL,
    key_skills      TEXT[] NOT NULL,
    schedule        TEXT NOT NULL,
    specializations TEXT[] NOT NULL,
    published_at    DATE NOT NULL,
    experience      TEXT NOT NULL
";

pub fn connect(conn_str: &str) -> Result<Client, StorageError> {
    Ok(Client::connect(conn_str, NoTls)?)
}

pub fn init_schema(client: &mut Client) -> Result<(), StorageError> {
    client.batch_execute(&format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        TABLE, COLUMN_DEFS
    ))?;
    Ok(())
}

/// Same contract as the SQLite sink: rebuild staging, anti-join on id,
/// one transaction, number of inserted rows returned.
pub fn merge(client: &mut Client, dataset: &Dataset) -> Result<usize, StorageError> {
    init_schema(client)?;
    let mut tx = client.transaction()?;
    tx.batch_execute(&format!(
        "DROP TABLE IF EXISTS {staging};
         CREATE TABLE {staging} ({defs});",
        staging = STAGING_TABLE,
        defs = COLUMN_DEFS,
    ))?;

    let placeholders: Vec<String> = (1..=COLUMNS.len()).map(|i| format!("${}", i)).collect();
    let insert = tx.prepare(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        STAGING_TABLE,
        COLUMNS.join(", "),
        placeholders.join(", ")
    ))?;
    for r in dataset.rows() {
        let published: NaiveDate = r.published_date().ok_or_else(|| StorageError::InvalidDate {
            id: r.id,
            value: r.published_at.clone(),
        })?;
        tx.execute(
            &insert,
            &[
                &r.id.0,
                &r.name,
                &r.employer,
                &r.salary_from,
                &r.salary_to,
                &r.currency,
                &r.description,
                &r.city,
                &r.full_address,
                &r.url,
                &r.key_skills,
                &r.schedule,
                &r.specializations,
                &published,
                &r.experience,
            ],
        )?;
    }
    debug!("Staged {} rows in {}", dataset.len(), STAGING_TABLE);

    let columns = COLUMNS.join(", ");
    let anti_join = format!(
        "INSERT INTO {table} ({columns})
         SELECT {columns} FROM {staging} AS s
         WHERE s.id NOT IN (SELECT v.id FROM {table} AS v)",
        table = TABLE,
        staging = STAGING_TABLE,
        columns = columns,
    );
    let inserted = tx.execute(anti_join.as_str(), &[])?;
    tx.commit()?;
    Ok(inserted as usize)
}

pub fn read_all(client: &mut Client) -> Result<Dataset, StorageError> {
    init_schema(client)?;
    let sql = format!("SELECT {} FROM {} ORDER BY id", COLUMNS.join(", "), TABLE);
    let rows = client.query(sql.as_str(), &[])?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let published: NaiveDate = row.try_get(13)?;
        out.push(VacancyRow {
            id: VacancyId(row.try_get(0)?),
            name: row.try_get(1)?,
            employer: row.try_get(2)?,
            salary_from: row.try_get(3)?,
            salary_to: row.try_get(4)?,
            currency: row.try_get(5)?,
            description: row.try_get(6)?,
            city: row.try_get(7)?,
            full_address: row.try_get(8)?,
            url: row.try_get(9)?,
            key_skills: row.try_get(10)?,
            schedule: row.try_get(11)?,
            specializations: row.try_get(12)?,
            published_at: published.format("%Y-%m-%d").to_string(),
            experience: row.try_get(14)?,
        });
    }
    Ok(Dataset::assemble(out))
}
