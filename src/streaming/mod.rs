pub mod controller;
pub mod data_feed;
pub mod metrics;

pub use controller::PipelineController;
pub use data_feed::{DataFeed, FeedCommand, TickOutcome};
pub use metrics::PerformanceMetrics;
