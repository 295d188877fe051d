use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::error::{FetchCause, FetchError};
use crate::extractor::Strategy;
use crate::fetch::Fetcher;
use crate::model::{Product, ScrapeOutcome};

pub const CANCELLED: &str = "cancelled";

/// Sequential page loop: fetch, extract, next. One outcome per input URL.
pub struct Orchestrator<F> {
    fetcher: F,
    strategy: Strategy,
    delay: Duration,
    timeout: Duration,
    cancel: CancellationToken,
}

impl<F: Fetcher> Orchestrator<F> {
    pub fn new(fetcher: F, strategy: Strategy, delay: Duration, timeout: Duration) -> Self {
        Self { fetcher, strategy, delay, timeout, cancel: CancellationToken::new() }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A failing page never stops the batch. After cancellation the remaining
    /// URLs are reported as failed so the output still lines up with the input.
    pub async fn run(&self, urls: &[String]) -> Vec<ScrapeOutcome> {
        let mut outcomes = Vec::with_capacity(urls.len());
        let mut clock = Clock::default();

        for (idx, url) in urls.iter().enumerate() {
            if idx > 0 && !self.delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
            if self.cancel.is_cancelled() {
                outcomes.push(ScrapeOutcome::failed(url, CANCELLED, clock.now()));
                continue;
            }

            let outcome = match self.scrape_one(url, &mut clock).await {
                Ok(outcome) => {
                    info!(url = %url, records = outcome.records.len(), "page scraped");
                    outcome
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "page failed");
                    ScrapeOutcome::failed(url, &e, clock.now())
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn scrape_one(&self, url: &str, clock: &mut Clock) -> Result<ScrapeOutcome, FetchError> {
        Url::parse(url).map_err(|e| FetchError::new(url, FetchCause::InvalidUrl(e.to_string())))?;

        let html = tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(FetchError::new(url, FetchCause::Other(CANCELLED.to_string())));
            }
            res = self.fetcher.fetch(url, self.timeout) => res?,
        };

        let at = clock.now();
        let records = self.strategy.apply(&html, url, at);
        Ok(ScrapeOutcome::succeeded(url, records, at))
    }
}

/// Flattens successful outcomes in outcome order, then page order.
pub fn aggregate(outcomes: &[ScrapeOutcome]) -> Vec<Product> {
    outcomes
        .iter()
        .filter(|o| o.success)
        .flat_map(|o| o.records.iter().cloned())
        .collect()
}

/// Wall clock that never steps backwards within one run.
#[derive(Default)]
struct Clock {
    last: Option<DateTime<Utc>>,
}

impl Clock {
    fn now(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let t = match self.last {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last = Some(t);
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Serves canned pages; URLs without a page fail with a 503.
    struct Scripted {
        pages: HashMap<String, String>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl Scripted {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages.iter().map(|(u, h)| (u.to_string(), h.to_string())).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Fetcher for Scripted {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push((url.to_string(), Instant::now()));
            self.pages.get(url).cloned().ok_or_else(|| FetchError::new(url, FetchCause::Status(503)))
        }
    }

    fn page(name: &str) -> String {
        format!(r#"<div data-test="product-item"><h3>{}</h3><p>tag</p></div>"#, name)
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn failed_page_does_not_stop_batch() {
        let (a, c) = (page("Alpha"), page("Gamma"));
        let fetcher = Scripted::new(&[("https://s.test/a", &a), ("https://s.test/c", &c)]);
        let orch = Orchestrator::new(fetcher, Strategy::Listing, Duration::ZERO, Duration::from_secs(1));

        let input = urls(&["https://s.test/a", "https://s.test/b", "https://s.test/c"]);
        let out = orch.run(&input).await;

        assert_eq!(out.len(), 3);
        let pages: Vec<&str> = out.iter().map(|o| o.page_url.as_str()).collect();
        assert_eq!(pages, vec!["https://s.test/a", "https://s.test/b", "https://s.test/c"]);
        assert!(out[0].success && out[2].success);
        assert!(!out[1].success);
        assert!(out[1].records.is_empty());
        assert!(out[1].error_message.as_deref().is_some_and(|m| m.contains("503")));

        let names: Vec<String> = aggregate(&out).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Alpha", "Gamma"]);
    }

    #[tokio::test]
    async fn invalid_url_is_a_failed_outcome() {
        let orch = Orchestrator::new(Scripted::new(&[]), Strategy::Listing, Duration::ZERO, Duration::from_secs(1));
        let out = orch.run(&urls(&["not a url"])).await;
        assert_eq!(out.len(), 1);
        assert!(!out[0].success);
        assert!(orch.fetcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn all_pages_failing_still_completes() {
        let orch = Orchestrator::new(Scripted::new(&[]), Strategy::Listing, Duration::ZERO, Duration::from_secs(1));
        let out = orch.run(&urls(&["https://s.test/1", "https://s.test/2"])).await;
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|o| !o.success));
        assert!(aggregate(&out).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delay_between_attempts_even_after_failure() {
        let a = page("A");
        let fetcher = Scripted::new(&[("https://s.test/a", &a)]);
        let orch = Orchestrator::new(fetcher, Strategy::Listing, Duration::from_secs(2), Duration::from_secs(1));
        orch.run(&urls(&["https://s.test/missing", "https://s.test/a", "https://s.test/missing2"])).await;

        let calls = orch.fetcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls[1].1 - calls[0].1 >= Duration::from_secs(2));
        assert!(calls[2].1 - calls[1].1 >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn cancelled_run_reports_remaining_urls() {
        let a = page("A");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let orch = Orchestrator::new(Scripted::new(&[("https://s.test/a", &a)]), Strategy::Listing, Duration::ZERO, Duration::from_secs(1))
            .with_cancel(cancel);
        let out = orch.run(&urls(&["https://s.test/a", "https://s.test/b"])).await;
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|o| o.error_message.as_deref() == Some(CANCELLED)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_inter_page_delay() {
        let a = page("A");
        let cancel = CancellationToken::new();
        let orch = Orchestrator::new(Scripted::new(&[("https://s.test/a", &a)]), Strategy::Listing, Duration::from_secs(60), Duration::from_secs(1))
            .with_cancel(cancel.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });

        let started = Instant::now();
        let out = orch.run(&urls(&["https://s.test/a", "https://s.test/b", "https://s.test/c"])).await;

        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(out.len(), 3);
        assert!(out[0].success);
        assert_eq!(out[0].records.len(), 1);
        assert!(out[1..].iter().all(|o| !o.success && o.error_message.as_deref() == Some(CANCELLED)));
        // nothing fetched after the cancel
        assert_eq!(orch.fetcher.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scraped_at_is_non_decreasing() {
        let (a, b) = (page("A"), page("B"));
        let orch = Orchestrator::new(
            Scripted::new(&[("https://s.test/a", &a), ("https://s.test/b", &b)]),
            Strategy::Listing,
            Duration::ZERO,
            Duration::from_secs(1),
        );
        let out = orch.run(&urls(&["https://s.test/a", "https://s.test/b"])).await;
        let all = aggregate(&out);
        assert_eq!(all.len(), 2);
        assert!(all[0].scraped_at <= all[1].scraped_at);
    }
}
