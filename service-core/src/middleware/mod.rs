pub mod api_key;
pub mod error_handling;
pub mod metrics;
pub mod security_headers;
pub mod tracing;
