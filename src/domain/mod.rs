// Domain layer - Plain data types, no I/O
pub mod dashboard;
pub mod mesh;
pub mod telemetry;
