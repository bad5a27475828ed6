// Application layer - Use cases and the seams to external sources
pub mod access_service;
pub mod dashboard_registry;
pub mod dashboard_service;
pub mod polling_service;
pub mod telemetry_source;
