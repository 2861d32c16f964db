pub mod types;

pub use types::*;

pub type AppResult<T> = Result<T, AppError>;
