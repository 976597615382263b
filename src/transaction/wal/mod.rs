pub mod log_manager;
pub mod log_record;

pub use log_manager::{LogManager, WalError};
pub use log_record::{LogPayload, LogRecord};
