use crate::cipher::CipherError;
use thiserror::Error;

/// Application-wide error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Discord error: {0}")]
    Discord(#[from] serenity::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Run a future under a deadline, mapping expiry to [`AppError::Timeout`].
pub async fn with_timeout<T, F>(
    what: &'static str,
    limit: std::time::Duration,
    fut: F,
) -> AppResult<T>
where
    F: std::future::Future<Output = AppResult<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| AppError::Timeout(what))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: AppResult<()> = with_timeout("sleep", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AppError::Timeout("sleep"))));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let result = with_timeout("quick", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
