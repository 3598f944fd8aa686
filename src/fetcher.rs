use serde_json::Value;
use tracing::warn;

use crate::client::{Endpoint, Transport};
use crate::dataset::VacancyId;
use crate::error::CollectError;
use crate::retry::RetryPolicy;

/// Loads single vacancy documents from `{base}/{id}`.
pub struct RecordFetcher<'a, T: Transport + ?Sized> {
    transport: &'a T,
    endpoint: &'a Endpoint,
    retry: RetryPolicy,
}

impl<'a, T: Transport + ?Sized> RecordFetcher<'a, T> {
    pub fn new(transport: &'a T, endpoint: &'a Endpoint, retry: RetryPolicy) -> Self {
        RecordFetcher {
            transport,
            endpoint,
            retry,
        }
    }

    /// Transport and decode failures are retried per the policy; the last
    /// failure aborts the run.
    pub fn fetch(&self, id: VacancyId) -> Result<Value, CollectError> {
        let url = self.endpoint.vacancy(id);
        let max = self.retry.max_attempts();
        self.retry
            .run(
                || self.transport.get_json(&url),
                |attempt, e| {
                    warn!(
                        "Bad response for vacancy {} (attempt {}/{}): {}, trying again",
                        id, attempt, max, e
                    );
                },
            )
            .map_err(|source| CollectError::Fetch {
                id,
                attempts: max,
                source,
            })
    }
}
