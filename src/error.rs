//! Error handling for the external sort

use std::io;
use std::path::Path;
use thiserror::Error;

/// Custom error type for sort operations
#[derive(Error, Debug)]
pub enum SortError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed record: {reason}")]
    MalformedRecord { reason: String },

    #[error("cannot open input '{path}': {source}")]
    InputOpen { path: String, source: io::Error },

    #[error("cannot read input '{path}': {source}")]
    InputRead { path: String, source: io::Error },

    #[error("cannot create output '{path}': {source}")]
    OutputCreate { path: String, source: io::Error },

    #[error("cannot write output '{path}': {source}")]
    OutputWrite { path: String, source: io::Error },

    #[error("cannot write temporary run file '{path}': {source}")]
    TempFile { path: String, source: io::Error },

    #[error("cannot read run file '{path}': {source}")]
    RunRead { path: String, source: io::Error },

    #[error("Invalid batch size: {size}")]
    InvalidBatchSize { size: String },

    #[error("Invalid buffer size: {size}")]
    InvalidBufferSize { size: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("sort has already finished")]
    AlreadyFinished,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SortError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SortError::InputOpen { .. }
            | SortError::InputRead { .. }
            | SortError::OutputCreate { .. }
            | SortError::OutputWrite { .. }
            | SortError::TempFile { .. }
            | SortError::RunRead { .. }
            | SortError::Io(_) => crate::SORT_FAILURE,

            _ => crate::EXIT_FAILURE,
        }
    }

    /// Whether the error is per-line and recoverable by dropping the line
    pub fn is_malformed_record(&self) -> bool {
        matches!(self, SortError::MalformedRecord { .. })
    }

    /// Create a malformed record error
    pub fn malformed_record(reason: impl Into<String>) -> Self {
        SortError::MalformedRecord {
            reason: reason.into(),
        }
    }

    /// Create an input open error
    pub fn input_open(path: &Path, source: io::Error) -> Self {
        SortError::InputOpen {
            path: path.display().to_string(),
            source,
        }
    }

    /// Create an input read error
    pub fn input_read(path: &Path, source: io::Error) -> Self {
        SortError::InputRead {
            path: path.display().to_string(),
            source,
        }
    }

    /// Create an output create error
    pub fn output_create(path: &Path, source: io::Error) -> Self {
        SortError::OutputCreate {
            path: path.display().to_string(),
            source,
        }
    }

    /// Create an output write error
    pub fn output_write(path: &Path, source: io::Error) -> Self {
        SortError::OutputWrite {
            path: path.display().to_string(),
            source,
        }
    }

    /// Create a temp file error
    pub fn temp_file(path: &Path, source: io::Error) -> Self {
        SortError::TempFile {
            path: path.display().to_string(),
            source,
        }
    }

    /// Create a run read error
    pub fn run_read(path: &Path, source: io::Error) -> Self {
        SortError::RunRead {
            path: path.display().to_string(),
            source,
        }
    }

    /// Create an invalid batch size error
    pub fn invalid_batch_size(size: &str) -> Self {
        SortError::InvalidBatchSize {
            size: size.to_string(),
        }
    }

    /// Create an invalid buffer size error
    pub fn invalid_buffer_size(size: &str) -> Self {
        SortError::InvalidBufferSize {
            size: size.to_string(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: &str) -> Self {
        SortError::InvalidArgument {
            message: message.to_string(),
        }
    }

    /// Create an internal error
    pub fn internal(message: &str) -> Self {
        SortError::Internal {
            message: message.to_string(),
        }
    }
}

/// Result type for sort operations
pub type SortResult<T> = Result<T, SortError>;

/// Attaches the failing pipeline stage and path to raw I/O errors
pub trait SortContext<T> {
    /// Opening the input
    fn input_context(self, path: &Path) -> SortResult<T>;

    /// Reading lines from the input
    fn read_context(self, path: &Path) -> SortResult<T>;

    /// Creating the output
    fn output_context(self, path: &Path) -> SortResult<T>;

    /// Writing or flushing the output
    fn write_context(self, path: &Path) -> SortResult<T>;

    fn temp_context(self, path: &Path) -> SortResult<T>;

    fn run_context(self, path: &Path) -> SortResult<T>;
}

impl<T> SortContext<T> for Result<T, io::Error> {
    fn input_context(self, path: &Path) -> SortResult<T> {
        self.map_err(|err| SortError::input_open(path, err))
    }

    fn read_context(self, path: &Path) -> SortResult<T> {
        self.map_err(|err| SortError::input_read(path, err))
    }

    fn output_context(self, path: &Path) -> SortResult<T> {
        self.map_err(|err| SortError::output_create(path, err))
    }

    fn write_context(self, path: &Path) -> SortResult<T> {
        self.map_err(|err| SortError::output_write(path, err))
    }

    fn temp_context(self, path: &Path) -> SortResult<T> {
        self.map_err(|err| SortError::temp_file(path, err))
    }

    fn run_context(self, path: &Path) -> SortResult<T> {
        self.map_err(|err| SortError::run_read(path, err))
    }
}
