//! REST client for the managed backend holding trips and expenses.
//!
//! This module provides the `BackendClient` for reading trip and expense
//! rows over the backend's REST surface and for downloading receipt
//! photos from its object storage. Writes, authentication flows and the
//! row-level-security model live entirely on the backend side; the
//! client only carries the `apikey` and bearer token it is given.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::{Trip, TripRow};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s tolerates slow mobile uplinks while still failing fast enough.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Column selection for trip queries, with expense rows nested per trip.
/// Row-level security on the backend restricts results to the
/// authenticated user's rows.
const TRIP_SELECT: &str =
    "id,location,date,expenses:expenses(id,amount,comment,photo_url,photo_path,timestamp)";

/// Read-only client for the trips backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: String,
}

impl BackendClient {
    /// Create a new backend client for the given project URL and credentials
    pub fn new(base_url: &str, api_key: &str, access_token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token: access_token.to_string(),
        })
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert("apikey", header::HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", self.access_token))?,
        );
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit
    /// (should retry), or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            // Rate limited - signal to retry
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .query(query)
                .headers(self.auth_headers()?)
                .send()
                .await
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    // Rate limited
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    // ===== Data Fetching Methods =====

    /// Fetch all trips with their expenses, newest first
    pub async fn fetch_trips(&self) -> Result<Vec<Trip>> {
        let url = format!("{}/rest/v1/trips", self.base_url);
        let rows: Vec<TripRow> = self
            .get_json(
                &url,
                &[
                    ("select", TRIP_SELECT.to_string()),
                    ("order", "date.desc".to_string()),
                ],
            )
            .await?;

        debug!(count = rows.len(), "Fetched trip rows");

        let trips = rows
            .into_iter()
            .map(TripRow::into_trip)
            .collect::<Result<Vec<_>, _>>()
            .context("Backend returned an invalid trip row")?;

        Ok(trips)
    }

    /// Fetch a single trip by its (location, date) key
    pub async fn fetch_trip(&self, location: &str, date: &str) -> Result<Option<Trip>> {
        let url = format!("{}/rest/v1/trips", self.base_url);
        let mut rows: Vec<TripRow> = self
            .get_json(
                &url,
                &[
                    ("select", TRIP_SELECT.to_string()),
                    ("location", format!("eq.{}", location)),
                    ("date", format!("eq.{}", date)),
                ],
            )
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let trip = rows
            .remove(0)
            .into_trip()
            .context("Backend returned an invalid trip row")?;
        Ok(Some(trip))
    }

    /// Download binary content (a receipt photo) from its public URL.
    /// Photo URLs point at object storage, not the REST surface, so no
    /// auth headers are attached.
    pub async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        let response = Self::check_response(response).await?;

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;

        Ok(bytes.to_vec())
    }
}
