//! Fault-tolerant fusion of redundant temperature sensors.
//!
//! Readings flow from a [`acquisition::RegisterSource`] through the
//! [`acquisition::AcquisitionService`] into a [`streaming::DataFeed`], which
//! votes each tick with the configured [`strategy::Voter`].

pub mod acquisition;
pub mod core;
pub mod monitoring;
pub mod streaming;
pub mod strategy;
