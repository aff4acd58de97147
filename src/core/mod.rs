pub mod error;
pub mod types;
pub mod workflow;

pub use error::AppError;
pub use types::{ErrorCategory, ErrorSeverity};
