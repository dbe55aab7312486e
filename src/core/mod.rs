pub mod config;
pub mod error;
pub mod event_bus;
pub mod health;
pub mod logging;

pub use config::Config;
pub use error::{AcquisitionError, ExportError, ParseStrategyError, TickError};
pub use event_bus::{EventBus, VotingEvent};
pub use health::HealthChecker;
