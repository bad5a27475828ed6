// Infrastructure layer - External dependencies and adapters
pub mod api_client;
pub mod config;
pub mod error;
pub mod http_response;
pub mod payload;
