pub mod config;
pub mod error;
pub mod history_recorder;
pub mod state_machine;
pub mod types;

pub use config::{ConfigLoader, ConfigValidator, RuntimeConfig};
pub use error::AppError;
pub use history_recorder::{Execution, HistoryEvent, HistoryEventType};
pub use state_machine::{ExecutionResult, StateMachine};
pub use types::*;
