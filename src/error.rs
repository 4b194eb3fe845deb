use thiserror::Error;

/// Errors surfaced by the photo and birthday services.
///
/// Validation kinds are reported to the user per file and never leave partial
/// state behind. Everything else is logged server-side and presented as a
/// generic failure.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// File extension is not in the allow-list
    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),

    /// Birthday date tag is not one of the configured birth dates
    #[error("unknown birthday date tag: {0}")]
    UnknownBirthdayDate(String),

    /// Object storage operation failed
    #[error("object storage error: {0}")]
    Storage(String),

    /// Database operation failed
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Anything else that went wrong during a save
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl ServiceError {
    /// True for user-correctable input errors (bad extension, bad date tag)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ServiceError::UnsupportedFile(_) | ServiceError::UnknownBirthdayDate(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_kinds() {
        assert!(ServiceError::UnsupportedFile("x.txt".into()).is_validation());
        assert!(ServiceError::UnknownBirthdayDate("02-30".into()).is_validation());
        assert!(!ServiceError::Storage("boom".into()).is_validation());
    }

    #[test]
    fn test_display_includes_context() {
        let err = ServiceError::UnsupportedFile("notes.txt".into());
        assert_eq!(err.to_string(), "unsupported file type: notes.txt");
    }
}
