//! Weather provider seam and the batched, retrying fetch along a route
//!
//! The provider's wire protocol lives outside this crate. Implementations only need
//! to return one observation (or `None`) per requested forecast point.

use async_trait::async_trait;
use rand::RngExt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::Result;
use crate::config::WeatherConfig;
use crate::models::{ForecastPoint, WeatherObservation};

/// Source of weather observations for forecast points
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Observations keyed positionally to `points`
    async fn fetch_batch(
        &self,
        points: &[ForecastPoint],
    ) -> Result<Vec<Option<WeatherObservation>>>;
}

/// Exponential backoff settings for failed batches
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), with +-10% jitter
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponential = self.base_delay.saturating_mul(2_u32.saturating_pow(attempt));
        let jitter: f64 = rand::rng().random_range(0.9..1.1);
        Duration::try_from_secs_f64(exponential.as_secs_f64() * jitter).unwrap_or(Duration::MAX)
    }
}

/// Drives a [`WeatherProvider`] over every forecast point of a route
pub struct WeatherFetcher<P> {
    provider: P,
    batch_size: usize,
    retry: RetryPolicy,
}

impl<P: WeatherProvider> WeatherFetcher<P> {
    #[must_use]
    pub fn new(provider: P, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    #[must_use]
    pub fn from_config(provider: P, config: &WeatherConfig) -> Self {
        Self::new(
            provider,
            config.batch_size,
            RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(config.retry_base_delay_ms),
            },
        )
    }

    /// Observations for all points, positionally aligned with `points`.
    ///
    /// A batch that still fails after every retry contributes `None` for each of its
    /// points rather than failing the whole route.
    #[instrument(skip_all, fields(points = points.len(), batch_size = self.batch_size))]
    pub async fn fetch_along_route(
        &self,
        points: &[ForecastPoint],
    ) -> Vec<Option<WeatherObservation>> {
        let mut observations = Vec::with_capacity(points.len());

        for (index, batch) in points.chunks(self.batch_size).enumerate() {
            match self.fetch_with_retry(batch).await {
                Ok(mut batch_observations) => {
                    if batch_observations.len() != batch.len() {
                        warn!(
                            "Batch {} returned {} observations for {} points",
                            index,
                            batch_observations.len(),
                            batch.len()
                        );
                    }
                    batch_observations.resize(batch.len(), None);
                    observations.extend(batch_observations);
                }
                Err(e) => {
                    warn!("Giving up on weather batch {}: {}", index, e);
                    observations.extend(std::iter::repeat_n(None, batch.len()));
                }
            }
        }

        observations
    }

    async fn fetch_with_retry(
        &self,
        batch: &[ForecastPoint],
    ) -> Result<Vec<Option<WeatherObservation>>> {
        let max_attempts = self.retry.max_retries + 1;
        let mut attempt = 0;

        loop {
            debug!("Fetching weather batch (attempt {}/{})", attempt + 1, max_attempts);
            match self.provider.fetch_batch(batch).await {
                Ok(observations) => return Ok(observations),
                Err(e) if attempt + 1 < max_attempts => {
                    let backoff = self.retry.backoff(attempt);
                    warn!(
                        "Weather fetch failed on attempt {}: {}; retrying in {:.1}s",
                        attempt + 1,
                        e,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoutecastError;
    use crate::models::Coordinate;
    use crate::models::weather::tests::observation;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn points(count: usize) -> Vec<ForecastPoint> {
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        (0..count)
            .map(|i| ForecastPoint::new(Coordinate::new(46.0, 8.0), i as f64, time))
            .collect()
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    /// Reports the distance of each point as its temperature, failing the first calls
    struct FlakyProvider {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl FlakyProvider {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl WeatherProvider for FlakyProvider {
        async fn fetch_batch(
            &self,
            points: &[ForecastPoint],
        ) -> Result<Vec<Option<WeatherObservation>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err(RoutecastError::weather("service unavailable"));
            }
            Ok(points
                .iter()
                .map(|point| Some(observation(point.distance_km as f32)))
                .collect())
        }
    }

    /// Always answers with a single observation regardless of batch size
    struct ShortProvider;

    #[async_trait]
    impl WeatherProvider for ShortProvider {
        async fn fetch_batch(
            &self,
            _points: &[ForecastPoint],
        ) -> Result<Vec<Option<WeatherObservation>>> {
            Ok(vec![Some(observation(1.0))])
        }
    }

    #[tokio::test]
    async fn test_fetch_is_batched_and_positional() {
        let fetcher = WeatherFetcher::new(FlakyProvider::new(0), 2, fast_retry(0));
        let observations = fetcher.fetch_along_route(&points(5)).await;

        assert_eq!(observations.len(), 5);
        for (index, weather) in observations.iter().enumerate() {
            assert_eq!(weather.as_ref().unwrap().temperature, index as f32);
        }
        assert_eq!(fetcher.provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_batch_is_retried() {
        let fetcher = WeatherFetcher::new(FlakyProvider::new(2), 10, fast_retry(3));
        let observations = fetcher.fetch_along_route(&points(3)).await;

        assert!(observations.iter().all(Option::is_some));
        assert_eq!(fetcher.provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_degrade_to_none() {
        let fetcher = WeatherFetcher::new(FlakyProvider::new(10), 10, fast_retry(1));
        let observations = fetcher.fetch_along_route(&points(4)).await;

        assert_eq!(observations.len(), 4);
        assert!(observations.iter().all(Option::is_none));
        assert_eq!(fetcher.provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_short_batches_are_padded() {
        let fetcher = WeatherFetcher::new(ShortProvider, 3, fast_retry(0));
        let observations = fetcher.fetch_along_route(&points(4)).await;

        let present: Vec<bool> = observations.iter().map(Option::is_some).collect();
        assert_eq!(present, vec![true, false, false, true]);
    }

    #[tokio::test]
    async fn test_no_points_makes_no_calls() {
        let fetcher = WeatherFetcher::new(FlakyProvider::new(0), 3, fast_retry(0));
        assert!(fetcher.fetch_along_route(&[]).await.is_empty());
        assert_eq!(fetcher.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        };
        let first = policy.backoff(0);
        let third = policy.backoff(2);
        assert!(first >= Duration::from_millis(900) && first <= Duration::from_millis(1100));
        assert!(third >= Duration::from_millis(3600) && third <= Duration::from_millis(4400));
    }
}
