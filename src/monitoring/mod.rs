pub mod history;

pub use history::{HistorySnapshot, TickHistory};
