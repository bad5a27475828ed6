// REST client for the sensor, simulation and access endpoints
use crate::application::access_service::{AccessGateway, SendCodeReply, VerifyCodeReply};
use crate::application::telemetry_source::TelemetrySource;
use crate::domain::mesh::SimulationResult;
use crate::domain::telemetry::{SensorReading, TimeSeries};
use crate::infrastructure::config::{prepare_path, ApiSettings};
use crate::infrastructure::error::ApiError;
use crate::infrastructure::payload;
use async_trait::async_trait;
use reqwest::{header, Method};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    settings: ApiSettings,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = settings.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(ApiError::Client)?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
            settings: settings.clone(),
        })
    }

    fn vars(&self, client_id: &str, window: String, limit: u32) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("client".to_string(), client_id.to_string());
        vars.insert("window_secs".to_string(), window.clone());
        vars.insert("window".to_string(), window);
        vars.insert("limit".to_string(), limit.to_string());
        vars
    }

    /// Every request carries a `_t` timestamp and `Cache-Control: no-store`
    /// so intermediaries never serve a stale reading.
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        let method_name = if method == Method::POST { "POST" } else { "GET" };
        let separator = if path.contains('?') { '&' } else { '?' };
        let url = format!(
            "{}{}{}_t={}",
            self.base_url,
            path,
            separator,
            chrono::Utc::now().timestamp_millis()
        );

        let mut request = self
            .client
            .request(method, &url)
            .header(header::CACHE_CONTROL, "no-store")
            .header(header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        tracing::debug!("{} {}", method_name, path);
        let response = request.send().await.map_err(|source| ApiError::Transport {
            method: method_name,
            path: path.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("{} {} returned {}", method_name, path, status);
            return Err(ApiError::Status {
                method: method_name,
                path: path.to_string(),
                status,
            });
        }

        response.json::<Value>().await.map_err(|source| ApiError::Decode {
            method: method_name,
            path: path.to_string(),
            source,
        })
    }

    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }
}

#[async_trait]
impl TelemetrySource for ApiClient {
    async fn latest_reading(&self, client_id: &str) -> anyhow::Result<Option<SensorReading>> {
        let vars = self.vars(client_id, self.settings.stream_window.clone(), self.settings.stream_limit);
        let body = self.get(&prepare_path(&self.settings.latest_path, &vars)).await?;
        Ok(payload::sensor_reading(&body))
    }

    async fn sensor_series(&self, client_id: &str) -> anyhow::Result<Vec<TimeSeries>> {
        let vars = self.vars(client_id, self.settings.stream_window.clone(), self.settings.stream_limit);
        let body = self.get(&prepare_path(&self.settings.stream_path, &vars)).await?;
        Ok(payload::sensor_series(&body))
    }

    async fn latest_simulation(&self, client_id: &str) -> anyhow::Result<Option<SimulationResult>> {
        let vars = self.vars(
            client_id,
            self.settings.simulation_window_secs.to_string(),
            self.settings.simulation_limit,
        );
        let body = self.get(&prepare_path(&self.settings.simulation_path, &vars)).await?;
        Ok(payload::simulation_result(&body))
    }

    async fn simulation_series(&self, client_id: &str) -> anyhow::Result<Vec<TimeSeries>> {
        let vars = self.vars(
            client_id,
            self.settings.simulation_window_secs.to_string(),
            self.settings.simulation_limit,
        );
        let body = self
            .get(&prepare_path(&self.settings.simulation_series_path, &vars))
            .await?;
        Ok(payload::simulation_series(&body))
    }
}

#[async_trait]
impl AccessGateway for ApiClient {
    async fn send_code(&self, phone_number: &str) -> anyhow::Result<SendCodeReply> {
        let body = self
            .post(&self.settings.send_code_path, json!({ "phoneNumber": phone_number }))
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn verify_code(&self, phone_number: &str, code: &str) -> anyhow::Result<VerifyCodeReply> {
        let body = self
            .post(
                &self.settings.verify_code_path,
                json!({ "phoneNumber": phone_number, "code": code }),
            )
            .await?;
        Ok(serde_json::from_value(body)?)
    }
}
