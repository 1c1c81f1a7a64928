use thiserror::Error;

/// Fatal per-shader recompilation errors.
///
/// Every stage of the pipeline is fail-fast: the first error aborts the
/// compile of that shader and no partial output is produced. The embedding
/// driver decides whether to retry with another backend or skip the shader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// An IR construction invariant was violated: mismatched operand types,
    /// out-of-range composite element index, unknown opcode variant.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An opcode variant the current backend or translator does not lower.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Reached a branch a prior pass should have eliminated. Indicates a bug
    /// in an earlier stage, not in the input shader.
    #[error("logic error: {0}")]
    LogicError(String),

    /// A source-ISA bit-field was outside the range the hardware accepts.
    #[error("decode error at instruction word {word_index}: {message}")]
    Decode { word_index: u32, message: String },

    /// The backend register pool ran out of registers.
    #[error("backend register pool exhausted")]
    BackendResourceExhausted,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Error::NotImplemented(message.into())
    }

    pub fn logic(message: impl Into<String>) -> Self {
        Error::LogicError(message.into())
    }

    pub fn decode(word_index: u32, message: impl Into<String>) -> Self {
        Error::Decode {
            word_index,
            message: message.into(),
        }
    }
}
