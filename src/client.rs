//! Calling-side credential lifecycle: configuration, the single-flight refresh coordinator, and
//! the dispatcher that decorates requests with bearer tokens.

pub mod config;
pub mod coordinator;
pub mod dispatcher;

mod metrics;

pub use config::*;
pub use coordinator::*;
pub use dispatcher::*;
pub use metrics::RefreshMetrics;
