pub mod pipeline;
pub mod config;
pub mod error;
pub mod sources;
pub mod sinks;
pub mod transform;
pub mod query;
pub mod export;
pub mod http;
pub mod observability;
pub mod metrics_server;

pub use pipeline::{Pipeline, Envelope};
