/// Errors produced by the Signal adapter.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("signal-cli I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("signal-cli exited with a non-zero status; stderr: {0}")]
    CliFailed(String),

    #[error("rest bridge request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("rest bridge returned status {0}: {1}")]
    RestStatus(u16, String),

    #[error("no signal_cli_path configured for cli mode")]
    NoCliPath,

    #[error("no rest_api_url configured for rest mode")]
    NoRestUrl,
}
