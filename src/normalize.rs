use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::dataset::{VacancyId, VacancyRow};
use crate::sanitize;

// Shape of a vacancy detail response. Only the fields we keep are declared;
// serde ignores the rest.

#[derive(Deserialize)]
struct RawVacancy {
    id: VacancyId,
    name: String,
    employer: Named,
    #[serde(deserialize_with = "present_or_null")]
    salary: Option<RawSalary>,
    description: String,
    #[serde(deserialize_with = "present_or_null")]
    address: Option<RawAddress>,
    alternate_url: String,
    key_skills: Vec<Named>,
    schedule: Named,
    specializations: Vec<RawSpecialization>,
    published_at: String,
    experience: Named,
}

#[derive(Deserialize)]
struct Named {
    name: String,
}

#[derive(Deserialize)]
struct RawSalary {
    #[serde(deserialize_with = "present_or_null")]
    from: Option<i64>,
    #[serde(deserialize_with = "present_or_null")]
    to: Option<i64>,
    #[serde(deserialize_with = "present_or_null")]
    currency: Option<String>,
}

#[derive(Deserialize)]
struct RawAddress {
    #[serde(deserialize_with = "present_or_null")]
    city: Option<String>,
    #[serde(deserialize_with = "present_or_null")]
    raw: Option<String>,
}

#[derive(Deserialize)]
struct RawSpecialization {
    profarea_name: String,
}

/// The key must exist, its value may be `null`. Plain `Option` fields would
/// also accept a missing key.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

/// Map a raw vacancy document onto the fixed output row.
///
/// Fails when a required key is missing or has the wrong type. `schedule`
/// and `experience` are required objects; a vacancy without them is rejected.
pub fn normalize(raw: Value) -> Result<VacancyRow, serde_json::Error> {
    let v: RawVacancy = serde_json::from_value(raw)?;

    let (salary_from, salary_to, currency) = match v.salary {
        Some(s) => (s.from, s.to, s.currency),
        None => (None, None, None),
    };
    let (city, full_address) = match v.address {
        Some(a) => (a.city, a.raw),
        None => (None, None),
    };

    Ok(VacancyRow {
        id: v.id,
        name: v.name,
        employer: v.employer.name,
        salary_from,
        salary_to,
        currency,
        description: sanitize::clean(&v.description),
        city,
        full_address,
        url: v.alternate_url,
        key_skills: v.key_skills.into_iter().map(|s| s.name).collect(),
        schedule: v.schedule.name,
        specializations: v
            .specializations
            .into_iter()
            .map(|s| s.profarea_name)
            .collect(),
        published_at: v.published_at.chars().take(10).collect(),
        experience: v.experience.name,
    })
}
