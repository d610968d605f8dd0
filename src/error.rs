//! Errors raised while compiling a request.
//!
//! Every error is a client-input error and names the offending parameter
//! path. Compilation stops at the first one.

/// Errors that can occur during compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// Unknown field, relationship or operator, a value of the wrong type,
    /// an operator the backend cannot express or a disallowed function.
    #[error("Param {path} is invalid, {reason}")]
    InvalidAttribute { path: String, reason: String },

    /// Structurally malformed filter, order or totals specification.
    #[error("Specification {path} is invalid, {reason}")]
    InvalidSpecification { path: String, reason: String },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),
}

pub type CompileResult<T> = Result<T, CompileError>;

impl CompileError {
    pub fn invalid_attribute(path: impl Into<String>, reason: impl Into<String>) -> Self {
        CompileError::InvalidAttribute {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_specification(path: impl Into<String>, reason: impl Into<String>) -> Self {
        CompileError::InvalidSpecification {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The parameter path (or entity name) the error refers to.
    pub fn path(&self) -> &str {
        match self {
            CompileError::InvalidAttribute { path, .. } => path,
            CompileError::InvalidSpecification { path, .. } => path,
            CompileError::UnknownEntity(name) => name,
        }
    }

    /// Report the error against another parameter path.
    pub fn with_path(self, new_path: impl Into<String>) -> Self {
        match self {
            CompileError::InvalidAttribute { reason, .. } => CompileError::InvalidAttribute {
                path: new_path.into(),
                reason,
            },
            CompileError::InvalidSpecification { reason, .. } => {
                CompileError::InvalidSpecification {
                    path: new_path.into(),
                    reason,
                }
            }
            other => other,
        }
    }
}
