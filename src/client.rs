use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::dataset::VacancyId;
use crate::error::{CollectError, TransportError};

pub const DEFAULT_BASE_URL: &str = "https://api.hh.ru/vacancies";
pub const DEFAULT_USER_AGENT: &str = concat!("hh_collector/", env!("CARGO_PKG_VERSION"));

/// A blocking GET that yields a JSON document.
///
/// The pipeline only ever talks to the API through this trait, so tests can
/// swap in canned responses.
pub trait Transport: Send + Sync {
    fn get_json(&self, url: &Url) -> Result<Value, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// `timeout` of `None` keeps reqwest's default.
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::blocking::Client::builder().user_agent(user_agent);
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(HttpTransport {
            client: builder.build()?,
        })
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, url: &Url) -> Result<Value, TransportError> {
        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Search parameters for the listing endpoint, fixed for the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    /// Every value of a multi-valued key becomes its own `key=value` pair.
    pub fn from_params(params: &BTreeMap<String, Vec<String>>) -> Self {
        params.iter().fold(Query::new(), |query, (k, values)| {
            values.iter().fold(query, |query, v| query.with(k, v))
        })
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// Base URL of the vacancies resource; both endpoints hang off it.
#[derive(Debug, Clone)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    pub fn parse(base: &str) -> Result<Self, CollectError> {
        let url = Url::parse(base)
            .map_err(|e| CollectError::Config(format!("base URL `{}`: {}", base, e)))?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(CollectError::Config(format!(
                "base URL `{}` must be an http(s) URL",
                base
            )));
        }
        Ok(Endpoint { base: url })
    }

    /// `{base}?{query}&page={page}`
    pub fn listing(&self, query: &Query, page: u32) -> Url {
        let mut url = self.base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query.pairs() {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("page", &page.to_string());
        }
        url
    }

    /// `{base}/{id}`
    pub fn vacancy(&self, id: VacancyId) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&id.to_string());
        }
        url
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_url_appends_query_and_page() {
        let endpoint = Endpoint::parse("https://api.hh.ru/vacancies").unwrap();
        let query = Query::new().with("text", "rust developer").with("area", "1");
        assert_eq!(
            endpoint.listing(&query, 3).as_str(),
            "https://api.hh.ru/vacancies?text=rust+developer&area=1&page=3"
        );
    }

    #[test]
    fn multi_valued_params_repeat() {
        let mut params = BTreeMap::new();
        params.insert("area".to_string(), vec!["1".to_string(), "2".to_string()]);
        params.insert("text".to_string(), vec!["rust".to_string()]);
        let query = Query::from_params(&params);
        assert_eq!(
            query.pairs(),
            &[
                ("area".to_string(), "1".to_string()),
                ("area".to_string(), "2".to_string()),
                ("text".to_string(), "rust".to_string()),
            ]
        );
    }

    #[test]
    fn vacancy_url_with_and_without_trailing_slash() {
        let a = Endpoint::parse("https://api.hh.ru/vacancies").unwrap();
        let b = Endpoint::parse("https://api.hh.ru/vacancies/").unwrap();
        assert_eq!(a.vacancy(VacancyId(42)).as_str(), "https://api.hh.ru/vacancies/42");
        assert_eq!(b.vacancy(VacancyId(42)).as_str(), "https://api.hh.ru/vacancies/42");
    }

    #[test]
    fn rejects_non_http_base() {
        assert!(Endpoint::parse("not a url").is_err());
        assert!(Endpoint::parse("mailto:jobs@example.com").is_err());
        assert!(Endpoint::parse("ftp://example.com/vacancies").is_err());
    }
}
