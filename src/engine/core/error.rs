use thiserror::Error;

/// Errors raised while building or driving a transcode job
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// The processing graph for a pass cannot be built
    #[error("Unable to construct pipeline! {0}")]
    PipelineConstruction(String),

    /// Encoder capabilities could not be queried (recovered by callers)
    #[error("Capabilities unavailable for element {element}")]
    CapabilityUnavailable { element: String },

    /// Progress cannot be computed right now
    #[error("Status unavailable: {0}")]
    StatusUnavailable(String),

    /// Reported verbatim by the execution engine
    #[error("{0}")]
    EngineRuntime(String),

    /// The input could not be discovered
    #[error("Unable to discover input: {0}")]
    Discovery(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    pub fn construction(message: impl Into<String>) -> Self {
        Self::PipelineConstruction(message.into())
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::StatusUnavailable(message.into())
    }
}

pub type TranscodeResult<T> = std::result::Result<T, TranscodeError>;
