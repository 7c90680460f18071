use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Accesso negato dal backend: {0}")]
    AccessDenied(String),

    #[error("Non autorizzato - il token di accesso potrebbe essere scaduto")]
    Unauthorized,

    #[error("Risorsa non trovata: {0}")]
    NotFound(String),

    #[error("Troppe richieste - riprovare tra poco")]
    RateLimited,

    #[error("Errore del server: {0}")]
    ServerError(String),

    #[error("Errore di rete: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Risposta non valida: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid dragging whole HTML error pages
    /// into log lines
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}
