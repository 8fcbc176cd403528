use serde::Serialize;

/// Library-wide error type. Every fallible function returns `Result<T, AppError>`.
/// Serializes cleanly for the UI layer so it gets structured error messages.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// The UI consumes errors as `{ error: "...", kind: "..." }`.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("error", &self.to_string())?;
        s.serialize_field(
            "kind",
            match self {
                AppError::Validation(_) => "validation",
                AppError::Backend(_) => "backend",
                AppError::Io(_) => "io",
                AppError::Serde(_) => "serde",
            },
        )?;
        s.end()
    }
}
