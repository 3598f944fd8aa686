//! Comma-separated flat file: header row of [`COLUMNS`], one line per vacancy.
//! A null is an unquoted empty field, an empty string is `""`. List columns
//! are JSON arrays.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::mem::take;
use std::path::Path;

use crate::dataset::{Dataset, VacancyRow, COLUMNS};
use crate::error::StorageError;

const SEP: char = ',';

/// Write the dataset to `path`, replacing any existing file.
pub fn write(path: &Path, dataset: &Dataset) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    write_to(&mut out, dataset)?;
    out.flush()?;
    Ok(())
}

pub fn write_to<W: Write>(mut w: W, dataset: &Dataset) -> Result<(), StorageError> {
    let header: Vec<Option<String>> = COLUMNS.iter().map(|c| Some(c.to_string())).collect();
    write_row(&mut w, &header)?;
    for row in dataset.rows() {
        write_row(&mut w, &to_record(row)?)?;
    }
    Ok(())
}

/// Read a file produced by [`write`] back into a dataset.
pub fn read(path: &Path) -> Result<Dataset, StorageError> {
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

pub fn parse(text: &str) -> Result<Dataset, StorageError> {
    let mut rows = parse_rows(text).into_iter();
    match rows.next() {
        Some(header) if header.iter().map(|f| f.text.as_str()).eq(COLUMNS) => {}
        Some(header) => {
            let names: Vec<&str> = header.iter().map(|f| f.text.as_str()).collect();
            return Err(StorageError::Malformed {
                line: 1,
                reason: format!("unexpected header {:?}", names),
            });
        }
        None => {
            return Err(StorageError::Malformed {
                line: 1,
                reason: "empty file".to_string(),
            })
        }
    }

    let mut out = Vec::new();
    for (i, record) in rows.enumerate() {
        out.push(from_record(&record).map_err(|reason| StorageError::Malformed {
            line: i + 2,
            reason,
        })?);
    }
    Ok(Dataset::assemble(out))
}

fn to_record(row: &VacancyRow) -> Result<Vec<Option<String>>, StorageError> {
    Ok(vec![
        Some(row.id.to_string()),
        Some(row.name.clone()),
        Some(row.employer.clone()),
        row.salary_from.map(|v| v.to_string()),
        row.salary_to.map(|v| v.to_string()),
        row.currency.clone(),
        Some(row.description.clone()),
        row.city.clone(),
        row.full_address.clone(),
        Some(row.url.clone()),
        Some(serde_json::to_string(&row.key_skills)?),
        Some(row.schedule.clone()),
        Some(serde_json::to_string(&row.specializations)?),
        Some(row.published_at.clone()),
        Some(row.experience.clone()),
    ])
}

fn from_record(record: &[Field]) -> Result<VacancyRow, String> {
    if record.len() != COLUMNS.len() {
        return Err(format!(
            "expected {} fields, found {}",
            COLUMNS.len(),
            record.len()
        ));
    }
    let text = |i: usize| record[i].text.clone();
    let nullable = |i: usize| (!record[i].is_null()).then(|| record[i].text.clone());
    let number = |i: usize| -> Result<Option<i64>, String> {
        match nullable(i) {
            None => Ok(None),
            Some(s) => s
                .parse()
                .map(Some)
                .map_err(|_| format!("{}: `{}` is not an integer", COLUMNS[i], s)),
        }
    };
    let list = |i: usize| -> Result<Vec<String>, String> {
        if record[i].is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&record[i].text).map_err(|e| format!("{}: {}", COLUMNS[i], e))
    };

    Ok(VacancyRow {
        id: record[0]
            .text
            .parse()
            .map_err(|_| format!("id: `{}` is not an integer", record[0].text))?,
        name: text(1),
        employer: text(2),
        salary_from: number(3)?,
        salary_to: number(4)?,
        currency: nullable(5),
        description: text(6),
        city: nullable(7),
        full_address: nullable(8),
        url: text(9),
        key_skills: list(10)?,
        schedule: text(11),
        specializations: list(12)?,
        published_at: text(13),
        experience: text(14),
    })
}

fn needs_quotes(field: &str) -> bool {
    field.is_empty()
        || field.contains(SEP)
        || field.contains('"')
        || field.contains('\n')
        || field.contains('\r')
}

/// `None` cells are written as nothing at all.
fn write_row<W: Write>(w: &mut W, row: &[Option<String>]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, "{}", SEP)?;
        } else {
            first = false;
        }
        match cell {
            None => {}
            Some(cell) if needs_quotes(cell) => write!(w, "\"{}\"", cell.replace('"', "\"\""))?,
            Some(cell) => w.write_all(cell.as_bytes())?,
        }
    }
    w.write_all(b"\n")
}

struct Field {
    text: String,
    quoted: bool,
}

impl Field {
    fn is_null(&self) -> bool {
        !self.quoted && self.text.is_empty()
    }
}

fn finish(text: &mut String, quoted: &mut bool) -> Field {
    Field {
        text: take(text),
        quoted: take(quoted),
    }
}

/// Split text into records. Quoted fields may hold separators, doubled
/// quotes and line breaks; CRLF and LF both end a record.
fn parse_rows(text: &str) -> Vec<Vec<Field>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            c if c == SEP && !in_quotes => row.push(finish(&mut field, &mut quoted)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(finish(&mut field, &mut quoted));
                if row.len() == 1 && row[0].is_null() {
                    row.clear();
                } else {
                    rows.push(take(&mut row));
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || quoted || !row.is_empty() {
        row.push(finish(&mut field, &mut quoted));
        rows.push(row);
    }
    rows
}
