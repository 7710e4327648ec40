pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod fixtures;
pub mod models;
pub mod reports;
pub mod routes;
pub mod storage;
pub mod upload;
pub mod user_models;
pub mod user_storage;

pub use error::{AppError, AppResult};
pub use filter::{filter, matches, AmountRange, DateRange, FilterCriteria, Filterable};
