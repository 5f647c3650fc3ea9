//! Writers that turn a recital collection into workbook updates.

pub mod dates;
pub mod history;
pub mod log;

pub use dates::{PropagationSummary, update_performance_dates};
pub use history::{append_recital_history, restore_history_formatting};
pub use log::{LogEntry, append_workflow_log};
