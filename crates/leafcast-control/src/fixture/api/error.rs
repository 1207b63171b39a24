use thiserror::Error;

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Fixture address or auth token is missing")]
    NotConfigured,
    #[error("Pairing is not enabled. Hold the power button on the fixture for 5-7 seconds and retry.")]
    PairingNotEnabled,
    #[error("Auth token rejected by the fixture")]
    Unauthorized,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API error: HTTP {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Stream socket error: {0}")]
    Io(#[from] std::io::Error),
}

impl FixtureError {
    /// Connection-level failures (timeouts, refused connections)
    pub fn is_network(&self) -> bool {
        matches!(self, FixtureError::Network(_) | FixtureError::Io(_))
    }
}
