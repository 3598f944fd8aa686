use serde::Deserialize;
use tracing::{debug, info};

use crate::client::{Endpoint, Query, Transport};
use crate::dataset::VacancyId;
use crate::error::{CollectError, TransportError};

#[derive(Deserialize)]
struct ListingPage {
    pages: u32,
    items: Vec<ListingItem>,
}

#[derive(Deserialize)]
struct ListingItem {
    id: VacancyId,
}

/// Walks the paginated search endpoint and gathers vacancy ids.
pub struct IdCollector<'a, T: Transport + ?Sized> {
    transport: &'a T,
    endpoint: &'a Endpoint,
    query: &'a Query,
}

impl<'a, T: Transport + ?Sized> IdCollector<'a, T> {
    pub fn new(transport: &'a T, endpoint: &'a Endpoint, query: &'a Query) -> Self {
        IdCollector {
            transport,
            endpoint,
            query,
        }
    }

    /// Ids in page order, then item order within a page.
    ///
    /// Page 0 tells how many pages there are; the upstream cap on reachable
    /// results is whatever that count allows. Duplicates are kept. No retry:
    /// the first failing page aborts.
    pub fn collect_ids(&self) -> Result<Vec<VacancyId>, CollectError> {
        let first = self.page(0)?;
        let pages = first.pages;
        info!("Listing reports {} pages", pages);

        let mut ids = Vec::new();
        if pages == 0 {
            return Ok(ids);
        }
        ids.extend(first.items.into_iter().map(|item| item.id));

        for page in 1..pages {
            let listing = self.page(page)?;
            debug!("Page {}: {} items", page, listing.items.len());
            ids.extend(listing.items.into_iter().map(|item| item.id));
        }

        info!("Collected {} vacancy ids", ids.len());
        Ok(ids)
    }

    fn page(&self, page: u32) -> Result<ListingPage, CollectError> {
        let url = self.endpoint.listing(self.query, page);
        let fail = |source: TransportError| CollectError::Listing { page, source };
        let body = self.transport.get_json(&url).map_err(fail)?;
        serde_json::from_value(body).map_err(|e| fail(TransportError::Decode(e)))
    }
}
