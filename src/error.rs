use thiserror::Error;

/// Main error type for the codec library.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported block length {0}, expected one of 32, 64, 128, 256, 512")]
    UnsupportedBlockLength(usize),
    #[error("signal has {got} channels but the header field holds at most {max}")]
    TooManyChannels { got: usize, max: usize },
    #[error("bitstream too short: {0}")]
    TruncatedStream(&'static str),
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// A specialized `Result` type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
