//! Configuration management for sort operations

use crate::error::{SortError, SortResult};
use std::path::{Path, PathBuf};

/// Records held in memory per run before spilling to disk
pub const DEFAULT_BATCH_SIZE: usize = 1_000_000;

/// Capacity of each buffered reader and writer
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Smallest accepted I/O buffer
pub const MIN_BUFFER_SIZE: usize = 1024;

/// Most run files held open by one merge pass
pub const DEFAULT_MERGE_FAN_IN: usize = 512;

/// Main configuration structure for sort operations
#[derive(Debug, Clone)]
pub struct SortConfig {
    /// File to read records from
    pub input: PathBuf,
    /// File to write sorted records to; run files are created next to it
    pub output: PathBuf,
    /// Maximum number of parsed records per run
    pub batch_size: usize,
    /// Buffer size for I/O operations
    pub buffer_size: Option<usize>,
    /// Maximum number of runs merged at once; more runs take extra passes
    pub merge_fan_in: usize,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: PathBuf::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            buffer_size: None,
            merge_fan_in: DEFAULT_MERGE_FAN_IN,
        }
    }
}

impl SortConfig {
    /// Create a configuration sorting `input` into `output` with default limits
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            ..Self::default()
        }
    }

    /// Set the number of records per run
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set buffer size
    pub fn with_buffer_size(mut self, buffer_size: Option<usize>) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set how many runs a single merge pass may open
    pub fn with_merge_fan_in(mut self, fan_in: usize) -> Self {
        self.merge_fan_in = fan_in;
        self
    }

    /// Parse buffer size from a string like `64K`, `4M` or `1048576`
    pub fn set_buffer_size_from_string(&mut self, size_str: &str) -> SortResult<()> {
        self.buffer_size = Some(parse_size(size_str)?);
        Ok(())
    }

    /// Parse the batch size from a command line string
    pub fn set_batch_size_from_string(&mut self, size_str: &str) -> SortResult<()> {
        self.batch_size = size_str
            .trim()
            .parse::<usize>()
            .map_err(|_| SortError::invalid_batch_size(size_str))?;
        Ok(())
    }

    /// Parse the merge fan-in from a command line string
    pub fn set_merge_fan_in_from_string(&mut self, fan_in_str: &str) -> SortResult<()> {
        self.merge_fan_in = fan_in_str.trim().parse::<usize>().map_err(|_| {
            SortError::invalid_argument(&format!("invalid merge fan-in: {fan_in_str}"))
        })?;
        Ok(())
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> SortResult<()> {
        if self.input.as_os_str().is_empty() {
            return Err(SortError::invalid_argument("missing input path"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(SortError::invalid_argument("missing output path"));
        }
        if self.input == self.output || same_existing_file(&self.input, &self.output) {
            return Err(SortError::invalid_argument(
                "input and output must be different files",
            ));
        }

        if self.batch_size == 0 {
            return Err(SortError::invalid_batch_size(
                "batch size must be at least 1 record",
            ));
        }

        // Check for reasonable buffer size
        if let Some(buffer_size) = self.buffer_size {
            if buffer_size < MIN_BUFFER_SIZE {
                return Err(SortError::invalid_buffer_size(
                    "buffer size too small (minimum 1KB)",
                ));
            }
        }

        if self.merge_fan_in < 2 {
            return Err(SortError::invalid_argument(
                "merge fan-in must be at least 2 runs",
            ));
        }

        Ok(())
    }

    /// Get effective buffer size
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE)
    }

    /// Directory that receives the temporary run files
    pub fn temp_dir(&self) -> &Path {
        match self.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

fn same_existing_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Parse a byte count with an optional `K`, `M` or `G` suffix (powers of 1024)
pub fn parse_size(size_str: &str) -> SortResult<usize> {
    let trimmed = size_str.trim();
    let (digits, multiplier) = match trimmed.chars().last() {
        Some('k') | Some('K') => (&trimmed[..trimmed.len() - 1], 1024),
        Some('m') | Some('M') => (&trimmed[..trimmed.len() - 1], 1024 * 1024),
        Some('g') | Some('G') => (&trimmed[..trimmed.len() - 1], 1024 * 1024 * 1024),
        Some('b') | Some('B') => (&trimmed[..trimmed.len() - 1], 1),
        _ => (trimmed, 1),
    };

    digits
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| SortError::invalid_buffer_size(size_str))
}

/// Builder pattern for creating sort configurations
#[derive(Debug, Default)]
pub struct SortConfigBuilder {
    config: SortConfig,
}

impl SortConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, input: impl Into<PathBuf>) -> Self {
        self.config.input = input.into();
        self
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.config.output = output.into();
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = Some(size);
        self
    }

    pub fn merge_fan_in(mut self, fan_in: usize) -> Self {
        self.config.merge_fan_in = fan_in;
        self
    }

    pub fn build(self) -> SortResult<SortConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
