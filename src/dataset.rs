use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Output columns, in order. `id` comes first and indexes the table.
pub const COLUMNS: [&str; 15] = [
    "id",
    "name",
    "employer",
    "salary_from",
    "salary_to",
    "currency",
    "description",
    "city",
    "full_address",
    "url",
    "key_skills",
    "schedule",
    "specializations",
    "published_at",
    "experience",
];

/// Vacancy key. The API sends it as a JSON string (`"41223344"`), older
/// payloads and our own files use a number; both decode to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VacancyId(pub i64);

impl fmt::Display for VacancyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for VacancyId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(VacancyId)
    }
}

impl<'de> Deserialize<'de> for VacancyId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(i64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(VacancyId(n)),
            Repr::Text(s) => s
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid vacancy id `{}`", s))),
        }
    }
}

/// One normalized vacancy, the unit stored by every sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VacancyRow {
    pub id: VacancyId,
    pub name: String,
    pub employer: String,
    pub salary_from: Option<i64>,
    pub salary_to: Option<i64>,
    pub currency: Option<String>,
    pub description: String,
    pub city: Option<String>,
    pub full_address: Option<String>,
    pub url: String,
    pub key_skills: Vec<String>,
    pub schedule: String,
    pub specializations: Vec<String>,
    /// `YYYY-MM-DD`, the date part of the upstream timestamp.
    pub published_at: String,
    pub experience: String,
}

impl VacancyRow {
    pub fn published_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.published_at, "%Y-%m-%d").ok()
    }
}

/// Vacancies in discovery order, indexed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    rows: Vec<VacancyRow>,
    index: HashMap<VacancyId, usize>,
}

impl Dataset {
    /// Build the table from rows in the given order. A repeated id overwrites
    /// the earlier row in place, so the last occurrence wins.
    pub fn assemble<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = VacancyRow>,
    {
        let mut dataset = Dataset::default();
        for row in rows {
            dataset.push(row);
        }
        dataset
    }

    fn push(&mut self, row: VacancyRow) {
        match self.index.get(&row.id) {
            Some(&pos) => self.rows[pos] = row,
            None => {
                self.index.insert(row.id, self.rows.len());
                self.rows.push(row);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, id: VacancyId) -> Option<&VacancyRow> {
        self.index.get(&id).map(|&pos| &self.rows[pos])
    }

    pub fn rows(&self) -> &[VacancyRow] {
        &self.rows
    }

    #[cfg(test)]
    pub fn ids(&self) -> impl Iterator<Item = VacancyId> + '_ {
        self.rows.iter().map(|r| r.id)
    }
}

impl FromIterator<VacancyRow> for Dataset {
    fn from_iter<I: IntoIterator<Item = VacancyRow>>(iter: I) -> Self {
        Dataset::assemble(iter)
    }
}
