use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("shape mismatch in {context}: {left} vs {right}")]
    ShapeMismatch {
        context: &'static str,
        left: usize,
        right: usize,
    },

    #[error("invalid distribution: {0}")]
    Distribution(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
