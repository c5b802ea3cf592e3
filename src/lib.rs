pub mod bot;
pub mod cipher;
pub mod config;
pub mod error;
pub mod identity;
pub mod liveness;
pub mod store;
pub mod verification;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
