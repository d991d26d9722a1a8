use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    /// A subscriber's handler panicked; the consumer task is gone.
    #[error("bus worker failed: {0}")]
    WorkerFailed(String),
}

pub type Result<T> = std::result::Result<T, BusError>;
