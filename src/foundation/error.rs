pub type SublayResult<T> = Result<T, SublayError>;

#[derive(thiserror::Error, Debug)]
pub enum SublayError {
    /// A backend tier or the background context could not be set up.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// A background dispatch exceeded its deadline.
    #[error("timeout error: {0}")]
    Timeout(String),

    /// A composition whose pixel buffer does not match its dimensions.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// GPU resource creation failed after initialization.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// The codec engine reported a failure.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SublayError {
    pub fn initialization(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn malformed_frame(msg: impl Into<String>) -> Self {
        Self::MalformedFrame(msg.into())
    }

    pub fn resource_exhaustion(msg: impl Into<String>) -> Self {
        Self::ResourceExhaustion(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for SublayError {
    fn from(err: serde_json::Error) -> Self {
        Self::serde(err.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
