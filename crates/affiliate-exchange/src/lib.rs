pub mod config;
pub mod error;
pub mod marketplace;
pub mod telemetry;

pub use error::AppError;
