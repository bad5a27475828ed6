// Presentation layer - HTTP routes
pub mod app_state;
pub mod handlers;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    dashboard_events, get_chart, get_dashboard, get_mesh, health_check, post_camera, send_code, verify_code,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/dashboards/:client", get(get_dashboard))
        .route("/dashboards/:client/charts/:chart", get(get_chart))
        .route("/dashboards/:client/mesh", get(get_mesh))
        .route("/dashboards/:client/camera", post(post_camera))
        .route("/dashboards/:client/events", get(dashboard_events))
        .route("/access/send-code", post(send_code))
        .route("/access/verify-code", post(verify_code))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::access_service::{AccessGateway, AccessService, SendCodeReply, VerifyCodeReply};
    use crate::application::dashboard_registry::{viewer_options, DashboardRegistry};
    use crate::application::dashboard_service::DashboardService;
    use crate::application::polling_service::PollingConfig;
    use crate::application::telemetry_source::{SystemClock, TelemetrySource};
    use crate::domain::mesh::SimulationResult;
    use crate::domain::telemetry::{SensorReading, TimeSample, TimeSeries};
    use crate::infrastructure::config::{ChartConfig, DisplaySettings, ViewerSettings};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct StaticSource;

    #[async_trait]
    impl TelemetrySource for StaticSource {
        async fn latest_reading(&self, _client_id: &str) -> anyhow::Result<Option<SensorReading>> {
            Ok(Some(SensorReading {
                displacement_mm: Some(1.25),
                ..Default::default()
            }))
        }

        async fn sensor_series(&self, _client_id: &str) -> anyhow::Result<Vec<TimeSeries>> {
            let now = chrono::Utc::now().timestamp_millis();
            Ok(vec![TimeSeries::new(
                "displacement",
                vec![
                    TimeSample::new(now - 2000, Some(1.0)),
                    TimeSample::new(now - 1000, Some(1.25)),
                ],
            )])
        }

        async fn latest_simulation(&self, _client_id: &str) -> anyhow::Result<Option<SimulationResult>> {
            anyhow::bail!("simulation backend down")
        }

        async fn simulation_series(&self, _client_id: &str) -> anyhow::Result<Vec<TimeSeries>> {
            Ok(Vec::new())
        }
    }

    struct DenyAll;

    #[async_trait]
    impl AccessGateway for DenyAll {
        async fn send_code(&self, _phone_number: &str) -> anyhow::Result<SendCodeReply> {
            Ok(SendCodeReply {
                success: true,
                message: None,
            })
        }

        async fn verify_code(&self, _phone_number: &str, _code: &str) -> anyhow::Result<VerifyCodeReply> {
            Ok(VerifyCodeReply {
                status: "denied".to_string(),
                redirect: None,
                message: Some("wrong code".to_string()),
            })
        }
    }

    async fn serve() -> (String, Arc<AppState>) {
        let state = Arc::new(AppState {
            registry: Arc::new(DashboardRegistry::new(
                Arc::new(StaticSource),
                Arc::new(SystemClock),
                PollingConfig::default(),
                viewer_options(&ViewerSettings::default()),
                2,
                std::time::Duration::from_secs(300),
            )),
            dashboard_service: DashboardService::new(&ChartConfig::defaults(), &DisplaySettings::default()),
            access_service: AccessService::new(Arc::new(DenyAll)),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), state)
    }

    #[tokio::test]
    async fn test_dashboard_routes() {
        let (base, state) = serve().await;
        let client = reqwest::Client::new();

        let health = client.get(format!("{}/healthz", base)).send().await.unwrap();
        assert_eq!(health.text().await.unwrap(), "ok");

        // first request starts the pollers; give them one tick
        client.get(format!("{}/dashboards/cliente_1", base)).send().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let view: Value = client
            .get(format!("{}/dashboards/cliente_1", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["latest"]["displacement_mm"], json!(1.25));
        assert_eq!(view["banner"], Value::Null);
        assert_eq!(view["model"], Value::Null);

        let chart = client
            .get(format!("{}/dashboards/cliente_1/charts/real", base))
            .send()
            .await
            .unwrap();
        assert_eq!(chart.headers()["content-type"], "image/svg+xml");
        assert!(chart.text().await.unwrap().contains("<polyline"));

        let missing = client
            .get(format!("{}/dashboards/cliente_1/charts/nope", base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);

        let mesh = client
            .get(format!("{}/dashboards/cliente_1/mesh", base))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(mesh.contains("no model"));

        let camera = client
            .post(format!("{}/dashboards/cliente_1/camera", base))
            .json(&json!({ "action": "orbit", "d_yaw": 0.1, "d_pitch": 0.0 }))
            .send()
            .await
            .unwrap();
        assert_eq!(camera.status(), 202);

        let lock = client
            .post(format!("{}/dashboards/cliente_1/camera", base))
            .json(&json!({ "action": "set_interactive", "enabled": false }))
            .send()
            .await
            .unwrap();
        assert_eq!(lock.status(), 202);
        let locked = client
            .post(format!("{}/dashboards/cliente_1/camera", base))
            .json(&json!({ "action": "zoom", "factor": 2.0 }))
            .send()
            .await
            .unwrap();
        assert_eq!(locked.status(), 409);
        let bad_scale = client
            .post(format!("{}/dashboards/cliente_1/camera", base))
            .json(&json!({ "action": "set_scale", "factor": -1.0 }))
            .send()
            .await
            .unwrap();
        assert_eq!(bad_scale.status(), 400);

        let bad = client.get(format!("{}/dashboards/a.b", base)).send().await.unwrap();
        assert_eq!(bad.status(), 400);

        state.registry.shutdown_all().await;
    }

    #[tokio::test]
    async fn test_access_routes() {
        let (base, _state) = serve().await;
        let client = reqwest::Client::new();

        let sent: Value = client
            .post(format!("{}/access/send-code", base))
            .json(&json!({ "phoneNumber": "+447471256650" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(sent["outcome"], "code_sent");

        let invalid = client
            .post(format!("{}/access/send-code", base))
            .json(&json!({ "phoneNumber": "12345" }))
            .send()
            .await
            .unwrap();
        assert_eq!(invalid.status(), 400);

        let denied = client
            .post(format!("{}/access/verify-code", base))
            .json(&json!({ "phoneNumber": "+447471256650", "code": "000000" }))
            .send()
            .await
            .unwrap();
        assert_eq!(denied.status(), 401);
        let body: Value = denied.json().await.unwrap();
        assert_eq!(body["message"], "wrong code");
    }
}
