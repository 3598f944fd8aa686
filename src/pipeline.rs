use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::client::{Endpoint, HttpTransport, Query, Transport};
use crate::config::Settings;
use crate::dataset::{Dataset, VacancyId, VacancyRow};
use crate::error::CollectError;
use crate::fetcher::RecordFetcher;
use crate::listing::IdCollector;
use crate::normalize::normalize;
use crate::retry::RetryPolicy;
use crate::store::{self, Destination};

/// Discover ids, fetch and normalize each vacancy, assemble, store.
///
/// All ids are collected before the first vacancy is fetched. Any error
/// aborts the run; nothing collected so far is stored.
pub struct VacancyCollector<T: Transport> {
    transport: T,
    endpoint: Endpoint,
    query: Query,
    retry: RetryPolicy,
}

impl VacancyCollector<HttpTransport> {
    pub fn from_settings(settings: &Settings) -> Result<Self, CollectError> {
        let transport = HttpTransport::new(&settings.user_agent, settings.timeout())
            .map_err(|e| CollectError::Config(format!("HTTP client: {}", e)))?;
        VacancyCollector::new(
            transport,
            &settings.base_url,
            settings.query(),
            settings.retry_policy()?,
        )
    }
}

impl<T: Transport> VacancyCollector<T> {
    pub fn new(
        transport: T,
        base_url: &str,
        query: Query,
        retry: RetryPolicy,
    ) -> Result<Self, CollectError> {
        Ok(VacancyCollector {
            transport,
            endpoint: Endpoint::parse(base_url)?,
            query,
            retry,
        })
    }

    pub fn collect_ids(&self) -> Result<Vec<VacancyId>, CollectError> {
        IdCollector::new(&self.transport, &self.endpoint, &self.query).collect_ids()
    }

    /// Fetch one vacancy and map it onto the output row.
    pub fn fetch_row(&self, id: VacancyId) -> Result<VacancyRow, CollectError> {
        let raw = RecordFetcher::new(&self.transport, &self.endpoint, self.retry).fetch(id)?;
        normalize(raw).map_err(|source| CollectError::Schema { id, source })
    }

    pub fn collect(&self) -> Result<Dataset, CollectError> {
        let ids = self.collect_ids()?;
        info!("Fetching {} vacancies", ids.len());
        let rows = self.fetch_rows(&ids)?;
        let dataset = Dataset::assemble(rows);
        info!("Assembled {} vacancies", dataset.len());
        Ok(dataset)
    }

    pub fn collect_and_store(&self, destination: &Destination) -> Result<Dataset, CollectError> {
        let dataset = self.collect()?;
        Ok(store::persist(dataset, destination)?)
    }

    fn fetch_rows(&self, ids: &[VacancyId]) -> Result<Vec<VacancyRow>, CollectError> {
        let pb = progress_bar(ids.len());

        #[cfg(not(feature = "rayon"))]
        let rows = ids
            .iter()
            .map(|&id| {
                let row = self.fetch_row(id);
                pb.inc(1);
                row
            })
            .collect::<Result<Vec<_>, _>>();

        // Indexed parallel collect keeps discovery order.
        #[cfg(feature = "rayon")]
        let rows = ids
            .par_iter()
            .map(|&id| {
                let row = self.fetch_row(id);
                pb.inc(1);
                row
            })
            .collect::<Result<Vec<_>, _>>();

        pb.finish_and_clear();
        rows
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockTransport;
    use crate::error::StorageError;
    use crate::store::DatabaseUrl;
    use serde_json::{json, Value};

    const BASE: &str = "https://api.test/vacancies";

    fn listing(page: u32) -> String {
        format!("{}?text=rust&page={}", BASE, page)
    }

    fn detail(id: i64) -> String {
        format!("{}/{}", BASE, id)
    }

    fn vacancy(id: i64, name: &str) -> Value {
        json!({
            "id": id.to_string(),
            "name": name,
            "employer": { "name": "Acme" },
            "salary": { "from": 100, "to": 200, "currency": "RUR" },
            "description": "<p>Build things &amp; ship</p>",
            "address": null,
            "alternate_url": format!("https://hh.ru/vacancy/{}", id),
            "key_skills": [{ "name": "Rust" }],
            "schedule": { "name": "Remote" },
            "specializations": [{ "profarea_name": "IT" }],
            "published_at": "2021-05-01T12:00:00+0300",
            "experience": { "name": "1-3 years" }
        })
    }

    fn three_vacancies() -> MockTransport {
        MockTransport::new()
            .respond(&listing(0), json!({ "pages": 2, "items": [{ "id": "3" }, { "id": "1" }] }))
            .respond(&listing(1), json!({ "pages": 2, "items": [{ "id": "2" }] }))
            .respond(&detail(1), vacancy(1, "one"))
            .respond(&detail(2), vacancy(2, "two"))
            .respond(&detail(3), vacancy(3, "three"))
    }

    fn collector(transport: MockTransport) -> VacancyCollector<MockTransport> {
        VacancyCollector::new(
            transport,
            BASE,
            Query::new().with("text", "rust"),
            RetryPolicy::immediate(3),
        )
        .unwrap()
    }

    #[test]
    fn collects_in_discovery_order() {
        let c = collector(three_vacancies());
        let ds = c.collect().unwrap();
        let ids: Vec<i64> = ds.ids().map(|id| id.0).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        let first = ds.get(VacancyId(3)).unwrap();
        assert_eq!(first.name, "three");
        assert_eq!(first.description, "Build things  ship");
        assert_eq!(first.key_skills, vec!["Rust"]);
    }

    #[test]
    fn ids_are_discovered_before_any_fetch() {
        let c = collector(three_vacancies());
        c.collect().unwrap();
        let requests = c.transport.requests();
        assert_eq!(&requests[..2], &[listing(0), listing(1)]);
        assert_eq!(requests.len(), 5);
    }

    #[test]
    fn transient_failure_is_retried() {
        let transport = MockTransport::new()
            .respond(&listing(0), json!({ "pages": 1, "items": [{ "id": "1" }] }))
            .fail(&detail(1), 503)
            .respond(&detail(1), vacancy(1, "one"));
        let c = collector(transport);
        let ds = c.collect().unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(c.transport.hits(&detail(1)), 2);
    }

    #[test]
    fn persistent_fetch_failure_aborts_run() {
        let transport = MockTransport::new()
            .respond(&listing(0), json!({ "pages": 1, "items": [{ "id": "1" }, { "id": "2" }] }))
            .fail(&detail(1), 500)
            .respond(&detail(2), vacancy(2, "two"));
        let c = collector(transport);
        let err = c.collect().unwrap_err();
        assert!(matches!(err, CollectError::Fetch { id: VacancyId(1), attempts: 3, .. }));
        assert_eq!(c.transport.hits(&detail(1)), 3);
    }

    #[test]
    fn schema_error_names_vacancy() {
        let mut broken = vacancy(1, "one");
        broken.as_object_mut().unwrap().remove("experience");
        let transport = MockTransport::new()
            .respond(&listing(0), json!({ "pages": 1, "items": [{ "id": "1" }] }))
            .respond(&detail(1), broken);
        let err = collector(transport).collect().unwrap_err();
        assert!(matches!(err, CollectError::Schema { id: VacancyId(1), .. }));
    }

    #[test]
    fn listing_failure_aborts_before_fetching() {
        let transport = MockTransport::new().fail(&listing(0), 500);
        let c = collector(transport);
        assert!(matches!(
            c.collect().unwrap_err(),
            CollectError::Listing { page: 0, .. }
        ));
        assert_eq!(c.transport.requests().len(), 1);
    }

    #[test]
    fn stores_into_relational_table() {
        let dir = tempfile::tempdir().unwrap();
        let url = DatabaseUrl::Sqlite(dir.path().join("hh.sqlite"));
        let c = collector(three_vacancies());
        let ds = c
            .collect_and_store(&Destination::Relational(url.clone()))
            .unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(store::read(&url).unwrap().len(), 3);
    }

    #[test]
    fn nothing_stored_when_collection_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vacancies.csv");
        let transport = MockTransport::new()
            .respond(&listing(0), json!({ "pages": 1, "items": [{ "id": "1" }] }))
            .fail(&detail(1), 500);
        let result = collector(transport).collect_and_store(&Destination::FlatFile(path.clone()));
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn missing_database_url_is_storage_error() {
        let err: CollectError = StorageError::MissingDatabaseUrl.into();
        assert!(err.to_string().contains("database URL"));
    }

    #[test]
    fn fetch_row_single() {
        let c = collector(three_vacancies());
        let row = c.fetch_row(VacancyId(2)).unwrap();
        assert_eq!(row.name, "two");
        assert_eq!(row.salary_from, Some(100));
        assert_eq!(row.city, None);
    }
}
