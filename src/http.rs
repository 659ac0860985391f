//! HTTP elevation services.
//!
//! This module provides elevation lookups with:
//! - Connection pooling through one shared client per service
//! - Batching (500 coordinates per request by default)
//! - Concurrent batches with results kept in request order
//! - A blocking [`ElevationService`] impl that drives the async code on a tokio runtime
//!
//! The blocking impl builds its own runtime, so it must not be called from inside
//! an async context. Async hosts can call `lookup_async` directly.

use std::future::Future;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;

use crate::elevation::{ElevationError, ElevationService, LatLon};

const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Transport settings shared by the HTTP services.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    /// Coordinates per request.
    /// Default: 500
    pub batch_size: usize,

    /// Requests in flight at once.
    /// Default: 4
    pub concurrency: usize,

    /// Per-request timeout.
    /// Default: 30s
    pub timeout: Duration,

    /// Worker threads of the runtime used by blocking lookups.
    /// Default: 2
    pub worker_threads: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            worker_threads: 2,
        }
    }
}

impl HttpConfig {
    fn client(&self) -> Result<Client, ElevationError> {
        Client::builder()
            .pool_max_idle_per_host(self.concurrency.max(1))
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(self.timeout)
            .build()
            .map_err(|e| ElevationError::Request(format!("Failed to create HTTP client: {}", e)))
    }

    /// Run `future` to completion on a fresh multi-threaded runtime.
    fn block_on<F: Future>(&self, future: F) -> Result<F::Output, ElevationError> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.worker_threads.max(1))
            .enable_all()
            .build()
            .map_err(|e| ElevationError::Runtime(e.to_string()))?;
        Ok(rt.block_on(future))
    }
}

/// Split `points` into batches, fetch them concurrently and join the answers in order.
///
/// Every batch must answer with exactly one value per coordinate.
async fn lookup_batched<F, Fut>(
    config: &HttpConfig,
    service: &str,
    points: &[LatLon],
    fetch: F,
) -> Result<Vec<Option<f64>>, ElevationError>
where
    F: Fn(Vec<LatLon>) -> Fut,
    Fut: Future<Output = Result<Vec<Option<f64>>, ElevationError>>,
{
    let start = Instant::now();
    let batches: Vec<Vec<LatLon>> = points
        .chunks(config.batch_size.max(1))
        .map(<[LatLon]>::to_vec)
        .collect();
    let count = batches.len();

    let results: Vec<Result<Vec<Option<f64>>, ElevationError>> = stream::iter(batches)
        .enumerate()
        .map(|(i, batch)| {
            let expected = batch.len();
            let request = fetch(batch);
            async move {
                let batch_start = Instant::now();
                let elevations = request.await?;
                debug!(
                    "[{}] Batch {}/{}: {} points in {:?}",
                    service,
                    i + 1,
                    count,
                    expected,
                    batch_start.elapsed()
                );
                check_length(expected, elevations)
            }
        })
        .buffered(config.concurrency.max(1))
        .collect()
        .await;

    let mut elevations = Vec::with_capacity(points.len());
    for result in results {
        elevations.extend(result?);
    }

    info!(
        "[{}] Looked up {} points in {} batches in {:.2}s",
        service,
        points.len(),
        count,
        start.elapsed().as_secs_f64()
    );
    Ok(elevations)
}

fn check_length(expected: usize, elevations: Vec<Option<f64>>) -> Result<Vec<Option<f64>>, ElevationError> {
    if elevations.len() != expected {
        return Err(ElevationError::LengthMismatch {
            expected,
            actual: elevations.len(),
        });
    }
    Ok(elevations)
}

async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, ElevationError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ElevationError::Status(status.as_u16()));
    }
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| ElevationError::Request(format!("Body download error: {}", e)))
}

// ============================================================================
// Outdoor Safety Lab
// ============================================================================

/// Elevation API that takes a JSON array of `[lon, lat]` pairs and answers with a
/// JSON array of elevations (`null` where unknown).
pub struct OutdoorSafetyLab {
    endpoint: String,
    token: String,
    config: HttpConfig,
    client: Client,
}

impl OutdoorSafetyLab {
    /// `url` is the service root; requests go to `{url}/v1/elevations`.
    pub fn new(url: &str, token: &str) -> Result<Self, ElevationError> {
        Self::with_config(url, token, HttpConfig::default())
    }

    pub fn with_config(url: &str, token: &str, config: HttpConfig) -> Result<Self, ElevationError> {
        Ok(Self {
            endpoint: format!("{}/v1/elevations", url.trim_end_matches('/')),
            token: token.to_string(),
            client: config.client()?,
            config,
        })
    }

    pub async fn lookup_async(&self, points: &[LatLon]) -> Result<Vec<Option<f64>>, ElevationError> {
        lookup_batched(&self.config, "OutdoorSafetyLab", points, |batch| self.fetch(batch)).await
    }

    async fn fetch(&self, batch: Vec<LatLon>) -> Result<Vec<Option<f64>>, ElevationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&osl_request(&batch))
            .send()
            .await
            .map_err(|e| ElevationError::Request(e.to_string()))?;
        let body = read_body(response).await?;
        osl_decode(&body)
    }
}

impl ElevationService for OutdoorSafetyLab {
    fn lookup(&self, points: &[LatLon]) -> Result<Vec<Option<f64>>, ElevationError> {
        self.config.block_on(self.lookup_async(points))?
    }
}

fn osl_request(points: &[LatLon]) -> Vec<[f64; 2]> {
    points.iter().map(|p| [p.lon, p.lat]).collect()
}

fn osl_decode(body: &[u8]) -> Result<Vec<Option<f64>>, ElevationError> {
    serde_json::from_slice(body).map_err(|e| ElevationError::Decode(e.to_string()))
}

// ============================================================================
// Google Elevation API
// ============================================================================

const GOOGLE_ELEVATION_URL: &str = "https://maps.googleapis.com/maps/api/elevation/json";

/// Google Maps Elevation API client.
pub struct GoogleElevation {
    url: String,
    api_key: String,
    config: HttpConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    results: Vec<GoogleResult>,
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    elevation: Option<f64>,
}

impl GoogleElevation {
    pub fn new(api_key: &str) -> Result<Self, ElevationError> {
        Self::with_config(api_key, HttpConfig::default())
    }

    pub fn with_config(api_key: &str, config: HttpConfig) -> Result<Self, ElevationError> {
        Ok(Self {
            url: GOOGLE_ELEVATION_URL.to_string(),
            api_key: api_key.to_string(),
            client: config.client()?,
            config,
        })
    }

    /// Point the client at a different endpoint (e.g. a proxy).
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub async fn lookup_async(&self, points: &[LatLon]) -> Result<Vec<Option<f64>>, ElevationError> {
        lookup_batched(&self.config, "GoogleElevation", points, |batch| self.fetch(batch)).await
    }

    async fn fetch(&self, batch: Vec<LatLon>) -> Result<Vec<Option<f64>>, ElevationError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("locations", google_locations(&batch)), ("key", self.api_key.clone())])
            .send()
            .await
            .map_err(|e| ElevationError::Request(e.to_string()))?;
        let body = read_body(response).await?;
        google_decode(&body)
    }
}

impl ElevationService for GoogleElevation {
    fn lookup(&self, points: &[LatLon]) -> Result<Vec<Option<f64>>, ElevationError> {
        self.config.block_on(self.lookup_async(points))?
    }
}

fn google_locations(points: &[LatLon]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.lat, p.lon))
        .collect::<Vec<_>>()
        .join("|")
}

fn google_decode(body: &[u8]) -> Result<Vec<Option<f64>>, ElevationError> {
    let response: GoogleResponse =
        serde_json::from_slice(body).map_err(|e| ElevationError::Decode(e.to_string()))?;
    if response.status != "OK" {
        let message = match response.error_message {
            Some(m) => format!("{}: {}", response.status, m),
            None => response.status,
        };
        return Err(ElevationError::Service(message));
    }
    Ok(response.results.into_iter().map(|r| r.elevation).collect())
}
