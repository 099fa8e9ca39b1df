//! HTTP client for the inspection backend
//!
//! Implements media upload, hotel listing and the location sink against the
//! backend's REST routes. Every request carries the bearer token when one is
//! configured; non-success responses surface the backend's `error` message.

use crate::collaborators::{HotelDirectory, MediaUploader, UploadRequest};
use crate::error::{ApiError, ApiResult};
use crate::protocol::{ErrorBody, HotelSummary, LocationPush, LocationRecord, UploadReceipt};
use async_trait::async_trait;
use fieldcap_core::LocationSample;
use fieldcap_location::{LocationError, LocationResult, LocationSink};
use reqwest::multipart;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default backend base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL including the `/api` prefix
    pub base_url: String,
    /// Bearer token sent with every request
    pub bearer_token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            bearer_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// reqwest-backed backend client
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpApiClient {
    /// Build a client
    pub fn new(config: ApiClientConfig) -> ApiResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::InvalidConfiguration {
                message: format!("base URL {:?} is not http(s)", config.base_url),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::InvalidConfiguration {
                message: e.to_string(),
            })?;

        info!("Backend client initialized for {}", base_url);
        Ok(Self {
            client,
            base_url,
            bearer_token: config.bearer_token,
        })
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the bearer token
    pub fn set_bearer_token(&mut self, token: Option<String>) {
        self.bearer_token = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Turn a non-success response into `ApiError::Status`
    async fn check(response: reqwest::Response) -> ApiResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(error_body) => error_body.error,
            Err(_) if body.trim().is_empty() => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
            Err(_) => body.trim().to_string(),
        };
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// `POST /location`
    pub async fn push_location(&self, latitude: f64, longitude: f64) -> ApiResult<()> {
        let response = self
            .request(reqwest::Method::POST, "location")
            .json(&LocationPush {
                latitude,
                longitude,
            })
            .send()
            .await?;
        Self::check(response).await?;
        debug!("Pushed location ({}, {})", latitude, longitude);
        Ok(())
    }

    /// `GET /location`
    pub async fn latest_location(&self) -> ApiResult<LocationSample> {
        let response = self
            .request(reqwest::Method::GET, "location")
            .send()
            .await?;
        let record: LocationRecord = Self::check(response).await?.json().await?;
        record.into_sample()
    }
}

#[async_trait]
impl MediaUploader for HttpApiClient {
    async fn upload(&self, request: &UploadRequest) -> ApiResult<UploadReceipt> {
        request.validate()?;

        let media = &request.media;
        let file_name = media.file_name();
        let file = multipart::Part::bytes(media.data().to_vec())
            .file_name(file_name.clone())
            .mime_str(media.mime_type())
            .map_err(|e| ApiError::InvalidRequest {
                field: "file".to_string(),
                reason: e.to_string(),
            })?;

        let mut form = multipart::Form::new()
            .part("file", file)
            .text("media_type", media.kind().as_str())
            .text("description", request.description.clone())
            .text("hotel_id", request.target_id.to_string());
        if let Some(location) = request.location {
            let location = serde_json::to_string(&LocationPush::from(location)).map_err(|e| {
                ApiError::InvalidRequest {
                    field: "location".to_string(),
                    reason: e.to_string(),
                }
            })?;
            form = form.text("location", location);
        }

        info!(
            "Uploading {} ({} bytes) for hotel {}",
            file_name,
            media.size_bytes(),
            request.target_id
        );
        let response = self
            .request(reqwest::Method::POST, "worker/upload_media")
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!("Upload of {} failed: {}", file_name, e);
                ApiError::from(e)
            })?;

        let response = Self::check(response).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(UploadReceipt {
                message: String::new(),
            });
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl HotelDirectory for HttpApiClient {
    async fn list_hotels(&self) -> ApiResult<Vec<HotelSummary>> {
        let response = self
            .request(reqwest::Method::GET, "worker/hotels")
            .send()
            .await?;
        let hotels: Vec<HotelSummary> = Self::check(response).await?.json().await?;
        debug!("Loaded {} hotels", hotels.len());
        Ok(hotels)
    }
}

#[async_trait]
impl LocationSink for HttpApiClient {
    async fn push(&self, latitude: f64, longitude: f64) -> LocationResult<()> {
        self.push_location(latitude, longitude)
            .await
            .map_err(|e| LocationError::Push {
                reason: e.to_string(),
            })
    }

    async fn fetch_latest(&self) -> LocationResult<LocationSample> {
        self.latest_location().await.map_err(|e| {
            if e.is_not_found() {
                LocationError::NoStoredLocation
            } else {
                LocationError::Fetch {
                    reason: e.to_string(),
                }
            }
        })
    }
}
