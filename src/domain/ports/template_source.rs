//! TemplateSource port

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("template '{name}' not found")]
    NotFound { name: String },

    #[error("template name '{name}' is invalid: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("template '{name}' could not be read: {message}")]
    Unreadable { name: String, message: String },
}

impl From<TemplateError> for crate::error::EngineError {
    fn from(err: TemplateError) -> Self {
        crate::error::EngineError::render(err.to_string())
    }
}

/// Resolves named templates to their text
pub trait TemplateSource: Send + Sync {
    fn load(&self, name: &str) -> Result<String, TemplateError>;

    /// Names of the available templates, sorted
    fn names(&self) -> Result<Vec<String>, TemplateError> {
        Ok(Vec::new())
    }
}
