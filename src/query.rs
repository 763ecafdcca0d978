use std::fmt;

use url::Url;

use crate::domain::{SearchRequest, SearchType};
use crate::error::KnapsackError;

pub const DEFAULT_BASE_URL: &str = "http://www.knapsackfamily.com/knapsack_core/";

const RESULT_ENDPOINT: &str = "result.php";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Results { page: usize },
    Compound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    pub kind: PageKind,
    pub url: Url,
}

impl PageDescriptor {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for PageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Maps search requests onto the site's `result.php` endpoint and resolves
/// links found on fetched pages.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    base_url: Url,
}

impl QueryBuilder {
    pub fn new(base_url: &str) -> Result<Self, KnapsackError> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized)
            .map_err(|err| KnapsackError::InvalidUrl(format!("{base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(KnapsackError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Descriptors for the first result pages of `request`. Later pages are
    /// discovered from pagination links while collecting.
    pub fn descriptors(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<PageDescriptor>, KnapsackError> {
        let endpoint = self
            .base_url
            .join(RESULT_ENDPOINT)
            .map_err(|err| KnapsackError::InvalidUrl(err.to_string()))?;
        let url = Url::parse_with_params(
            endpoint.as_str(),
            &[
                ("sname", request.search_type().as_param()),
                ("word", request.keyword().as_str()),
            ],
        )
        .map_err(|err| KnapsackError::InvalidUrl(err.to_string()))?;

        Ok(vec![PageDescriptor {
            kind: PageKind::Results { page: 1 },
            url,
        }])
    }

    /// Resolves `href` relative to the page it was found on.
    pub fn resolve(
        &self,
        current: &PageDescriptor,
        href: &str,
        kind: PageKind,
    ) -> Result<PageDescriptor, KnapsackError> {
        let url = current
            .url
            .join(href.trim())
            .map_err(|err| KnapsackError::InvalidUrl(format!("{href}: {err}")))?;
        Ok(PageDescriptor { kind, url })
    }
}

/// Validates a raw search type and returns its `sname` value.
pub fn search_type_param(value: &str) -> Result<&'static str, KnapsackError> {
    value.parse::<SearchType>().map(|kind| kind.as_param())
}
