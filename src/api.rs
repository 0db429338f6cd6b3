//! REST client for the backend's serial and data endpoints
//!
//! The session core never calls these endpoints. The CLI and the monitor's
//! slash commands use them to drive the backend's serial link and its data
//! store.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ObdWatchError, Result};

/// A serial device the backend can open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// Device path, e.g. `/dev/ttyUSB0`
    pub device: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct PortsResponse {
    ports: Vec<PortInfo>,
}

#[derive(Debug, Serialize)]
struct SerialConnectRequest<'a> {
    port: &'a str,
    baud_rate: u32,
}

/// Outcome reported by the serial connect/disconnect endpoints
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusResponse {
    /// Whether the backend performed the action
    pub success: bool,
    /// Backend explanation
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ClearResponse {
    success: bool,
}

/// Summary of `GET /api/data/export`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExportSummary {
    /// Number of exported records
    pub count: usize,
    /// Remaining fields, passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Result of `GET /api/data/chart`
#[derive(Debug, Clone, PartialEq)]
pub enum ChartPayload {
    /// Chart data produced by the backend
    Chart(serde_json::Value),
    /// The backend could not produce a chart
    Unavailable(String),
}

/// Thin typed client for the backend REST endpoints
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base: Url,
}

impl BackendClient {
    /// Create a client for the API rooted at `base`
    ///
    /// Endpoint paths are resolved below `base`, so a base such as
    /// `http://host/obd` reaches `http://host/obd/api/ports`.
    ///
    /// # Errors
    ///
    /// Returns [`ObdWatchError::Api`] if the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use obdwatch::api::BackendClient;
    ///
    /// let base = url::Url::parse("http://localhost:8000").unwrap();
    /// let client = BackendClient::new(base, Duration::from_secs(10));
    /// assert!(client.is_ok());
    /// ```
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("obdwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ObdWatchError::Api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base: with_trailing_slash(base),
        })
    }

    /// Resolve `path` (relative, no leading slash) against the base
    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| ObdWatchError::Api(format!("Invalid endpoint {}: {}", path, e)).into())
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response, path: &str) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!("Backend {} returned {}: {}", path, status, error_text);
            return Err(ObdWatchError::Api(format!(
                "{} returned {}: {}",
                path, status, error_text
            ))
            .into());
        }

        response.json().await.map_err(|e| {
            ObdWatchError::Api(format!("Failed to parse {} response: {}", path, e)).into()
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(|e| {
            ObdWatchError::Api(format!("Failed to reach backend at {}: {}", path, e))
        })?;
        Self::decode(response, path).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        tracing::debug!("POST {}", url);
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| {
            ObdWatchError::Api(format!("Failed to reach backend at {}: {}", path, e))
        })?;
        Self::decode(response, path).await
    }

    /// `GET /api/ports`
    pub async fn list_ports(&self) -> Result<Vec<PortInfo>> {
        let response: PortsResponse = self.get("api/ports").await?;
        Ok(response.ports)
    }

    /// `POST /api/serial/connect`
    pub async fn connect_serial(&self, port: &str, baud_rate: u32) -> Result<StatusResponse> {
        let body = SerialConnectRequest { port, baud_rate };
        self.post("api/serial/connect", Some(&body)).await
    }

    /// `POST /api/serial/disconnect`
    pub async fn disconnect_serial(&self) -> Result<StatusResponse> {
        self.post::<(), _>("api/serial/disconnect", None).await
    }

    /// `POST /api/data/clear`; returns the backend's `success` flag
    pub async fn clear_data(&self) -> Result<bool> {
        let response: ClearResponse = self.post::<(), _>("api/data/clear", None).await?;
        Ok(response.success)
    }

    /// `GET /api/data/export`
    pub async fn export_data(&self) -> Result<ExportSummary> {
        self.get("api/data/export").await
    }

    /// `GET /api/data/chart`
    pub async fn chart(&self) -> Result<ChartPayload> {
        let value: serde_json::Value = self.get("api/data/chart").await?;
        if let Some(chart) = value.get("chart") {
            return Ok(ChartPayload::Chart(chart.clone()));
        }
        if let Some(error) = value.get("error") {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Ok(ChartPayload::Unavailable(message));
        }
        Err(ObdWatchError::Api("Chart response has neither chart nor error".to_string()).into())
    }
}

/// `Url::join` replaces the last path segment unless the base ends in `/`
fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}
