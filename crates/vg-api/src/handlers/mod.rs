//! HTTP handlers for the Vantage API surface (§6).

pub mod chat;
pub mod error;
pub mod info;
pub mod openai;

pub use error::{ApiError, ApiResult};
