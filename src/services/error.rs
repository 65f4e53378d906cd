//! Error handling utilities for route handlers

use axum::http::StatusCode;

/// Extension trait for logging errors and converting to StatusCode
pub trait LogErr<T> {
    /// Log error with context and return INTERNAL_SERVER_ERROR
    fn log_500(self, context: &str) -> Result<T, StatusCode>;

    /// Log error with context and return a custom StatusCode
    fn log_status(self, context: &str, status: StatusCode) -> Result<T, StatusCode>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, StatusCode> {
        self.map_err(|e| {
            log::error!("[dashboard] {}: {}", context, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }

    fn log_status(self, context: &str, status: StatusCode) -> Result<T, StatusCode> {
        self.map_err(|e| {
            log::warn!("[dashboard] {}: {}", context, e);
            status
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_errors_to_status() {
        let bad: Result<(), &str> = Err("nope");
        assert_eq!(bad.log_500("ctx"), Err(StatusCode::INTERNAL_SERVER_ERROR));

        let bad: Result<(), &str> = Err("nope");
        assert_eq!(
            bad.log_status("ctx", StatusCode::BAD_REQUEST),
            Err(StatusCode::BAD_REQUEST)
        );

        let good: Result<u8, &str> = Ok(1);
        assert_eq!(good.log_500("ctx"), Ok(1));
    }
}
