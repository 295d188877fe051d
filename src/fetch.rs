use std::time::Duration;

use reqwest::Client;

use crate::error::{FetchCause, FetchError};

/// Source of raw listing HTML. The pipeline only cares about success or failure.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let classify = |e: reqwest::Error| {
            if e.is_timeout() { FetchError::new(url, FetchCause::Timeout(timeout)) }
            else { FetchError::new(url, FetchCause::Request(e)) }
        };

        let res = self.client.get(url).timeout(timeout).send().await.map_err(classify)?;
        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::new(url, FetchCause::Status(status.as_u16())));
        }
        let text = res.text().await.map_err(classify)?;
        Ok(text)
    }
}
