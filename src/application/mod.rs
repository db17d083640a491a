// Application layer - Ingestion use cases and ports
pub mod channel_decoder;
pub mod channel_writer;
pub mod device_resolver;
pub mod dispatcher;
pub mod scheduler;
