use thiserror::Error;

/// Failures surfaced by a chain io driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Too few verified peers to fan a request out; retry later.
    #[error("not enough verified peers: have {0}, need {1}")]
    NotEnoughPeers(usize, usize),

    /// The foreign chain endpoint could not be reached; retry later.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// Unrecoverable local condition; the process should exit.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl DriverError {
    /// Whether the batch should simply be retried on the next watchdog tick.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, DriverError::Fatal(_))
    }
}

/// Failures talking to the parent coordinator. Never propagated into chain
/// io handling; the control loop logs and backs off.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("rpc: {0}")]
    Rpc(String),
}
