use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QrnnError {
    // --- Config ---
    #[error("Invalid config: {0}")]
    Config(String),

    // --- Shapes ---
    #[error("Shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        got: String,
    },

    // --- Numerics ---
    #[error("Numerical error: {0}")]
    Numerical(String),

    // --- Tensor read-back ---
    #[error("Tensor data error: {0}")]
    TensorData(String),
}

impl QrnnError {
    pub(crate) fn shape(what: &'static str, expected: impl ToString, got: impl ToString) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QrnnError>;
