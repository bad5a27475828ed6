// Application state for HTTP handlers
use crate::application::access_service::AccessService;
use crate::application::dashboard_registry::DashboardRegistry;
use crate::application::dashboard_service::DashboardService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DashboardRegistry>,
    pub dashboard_service: DashboardService,
    pub access_service: AccessService,
}
