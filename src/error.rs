use thiserror::Error;

pub type Result<T> = std::result::Result<T, SweepError>;

#[derive(Error, Debug)]
pub enum SweepError {
    /// The service answered with a client error; for result polling this
    /// usually means the step has not finished yet.
    #[error("request rejected with {status}: {detail}")]
    Transient { status: u16, detail: String },

    #[error("service error {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("response parse failed: {0}")]
    Parse(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("parameter {key} has unusable default value {value:?}")]
    InvalidDefault { key: String, value: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SweepError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SweepError::Transient { .. })
    }

    /// Classifies a non-success HTTP status: 4xx is retryable, anything else is not.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if (400..500).contains(&status) {
            SweepError::Transient { status, detail }
        } else {
            SweepError::Status { status, detail }
        }
    }
}
