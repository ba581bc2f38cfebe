use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("sensor timeout")]
    Timeout,
    #[error("reading out of range: {0}")]
    OutOfRange(String),
    #[error("valve {0} not wired")]
    NotWired(&'static str),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
