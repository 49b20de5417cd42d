use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn request_not_found(id: &str) -> Self {
        Self::NotFound {
            entity: "Request",
            id: id.to_string(),
        }
    }

    pub fn broker_not_found(name: &str) -> Self {
        Self::NotFound {
            entity: "Broker",
            id: name.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
