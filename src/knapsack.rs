use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::config::SearchSettings;
use crate::error::KnapsackError;

pub trait KnapsackClient: Send + Sync {
    /// Fetches one page and returns its HTML body. Non-2xx responses are
    /// errors.
    fn fetch_page(&self, url: &str) -> Result<String, KnapsackError>;
}

#[derive(Clone)]
pub struct KnapsackHttpClient {
    client: Client,
}

impl KnapsackHttpClient {
    pub fn new(settings: &SearchSettings) -> Result<Self, KnapsackError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&settings.user_agent)
                .map_err(|err| KnapsackError::InvalidConfig(format!("user_agent: {err}")))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("text/html"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|err| KnapsackError::Fetch {
                url: settings.base_url.clone(),
                message: err.to_string(),
            })?;
        Ok(Self { client })
    }

    fn handle_status(
        url: &str,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, KnapsackError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(KnapsackError::FetchStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        })
    }
}

impl KnapsackClient for KnapsackHttpClient {
    fn fetch_page(&self, url: &str) -> Result<String, KnapsackError> {
        debug!(url, "knapsack.request");
        let start = std::time::Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| KnapsackError::Fetch {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        let response = Self::handle_status(url, response)?;
        let body = response.text().map_err(|err| KnapsackError::Fetch {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        debug!(
            url,
            latency_ms = start.elapsed().as_millis() as u64,
            bytes = body.len(),
            "knapsack.response"
        );
        Ok(body)
    }
}
