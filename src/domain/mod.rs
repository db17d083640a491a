// Domain layer - Station telemetry models
pub mod device;
pub mod error;
pub mod ingestion;
pub mod report;
pub mod telemetry;
pub mod timestamp;
