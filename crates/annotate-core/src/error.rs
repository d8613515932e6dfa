use std::fmt;

/// Failure to decode persisted block content.
#[derive(Debug)]
pub enum ContentError {
    Json(serde_json::Error),
    UnexpectedShape(String),
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentError::Json(err) => write!(f, "invalid content json: {err}"),
            ContentError::UnexpectedShape(message) => {
                write!(f, "unexpected content shape: {message}")
            }
        }
    }
}

impl std::error::Error for ContentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContentError::Json(err) => Some(err),
            ContentError::UnexpectedShape(_) => None,
        }
    }
}

impl From<serde_json::Error> for ContentError {
    fn from(value: serde_json::Error) -> Self {
        ContentError::Json(value)
    }
}
