// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod device_directory;
pub mod influx_repository;
pub mod line_protocol;
pub mod memory_repository;
