//! Exchange-rate source with a refresh interval.
//!
//! Rates decorate `get_address_info` responses and are never load-bearing:
//! callers log failures and continue. A source constructed without a URL is
//! permanently disabled.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::RatesError;

/// Currency ticker to price of one coin.
pub type Rates = BTreeMap<String, f64>;

/// Default refresh interval.
pub const RATES_INTERVAL: Duration = Duration::from_secs(90);

#[derive(Clone)]
pub struct RateSource {
    client: reqwest::Client,
    url: Option<Arc<str>>,
    interval: Duration,
    cache: Arc<Mutex<Option<(Instant, Rates)>>>,
}

impl RateSource {
    /// `url` of a JSON object mapping tickers to prices, or `None` to
    /// disable rate fetching entirely.
    pub fn new(url: Option<String>, interval: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.map(Into::into),
            interval,
            cache: Arc::new(Mutex::new(None)),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, RATES_INTERVAL)
    }

    /// Current rates: the cached value while fresh, otherwise a refetch.
    /// A failed refetch with a stale cache reports `Old` rather than
    /// serving outdated prices.
    pub async fn get_rates(&self) -> Result<Rates, RatesError> {
        let Some(url) = &self.url else {
            return Err(RatesError::Disabled);
        };

        let mut cache = self.cache.lock().await;
        if let Some((fetched_at, rates)) = cache.as_ref() {
            if fetched_at.elapsed() < self.interval {
                return Ok(rates.clone());
            }
        }

        let fetched = self
            .client
            .get(url.as_ref())
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match fetched {
            Ok(resp) => {
                let rates: Rates = resp.json().await.map_err(RatesError::Fetch)?;
                *cache = Some((Instant::now(), rates.clone()));
                Ok(rates)
            }
            Err(err) if cache.is_some() => {
                let _ = err;
                Err(RatesError::Old)
            }
            Err(err) => Err(RatesError::Fetch(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_source_reports_disabled() {
        let source = RateSource::disabled();
        assert!(matches!(source.get_rates().await, Err(RatesError::Disabled)));
    }
}
