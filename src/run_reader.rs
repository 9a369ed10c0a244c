//! Sequential reader over one sorted run file

use crate::error::{SortContext, SortResult};
use crate::record::{trim_newline, Record};
use crate::run::Run;
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Exposes the head record of a run and steps through it one record at a time.
///
/// Origin indices are not stored in run files. They are reassigned from the
/// run's `first_origin`, which keeps them strictly increasing within the run
/// and disjoint from every other run.
pub struct RunReader<R = BufReader<File>> {
    path: PathBuf,
    reader: R,
    current: Option<Record>,
    next_origin: u64,
    skipped: u64,
    line: Vec<u8>,
}

impl RunReader<BufReader<File>> {
    /// Open a run file and load its first record
    pub fn open(run: &Run, buffer_size: usize) -> SortResult<Self> {
        let file = File::open(&run.path).run_context(&run.path)?;
        Self::from_reader(
            BufReader::with_capacity(buffer_size, file),
            &run.path,
            run.first_origin,
        )
    }
}

impl<R: BufRead> RunReader<R> {
    /// Wrap an already open stream; `path` is only used in diagnostics
    pub fn from_reader(reader: R, path: &Path, first_origin: u64) -> SortResult<Self> {
        let mut run_reader = Self {
            path: path.to_path_buf(),
            reader,
            current: None,
            next_origin: first_origin,
            skipped: 0,
            line: Vec::new(),
        };
        run_reader.advance()?;
        Ok(run_reader)
    }

    /// Current head record, `None` once drained
    #[inline]
    pub fn peek(&self) -> Option<&Record> {
        self.current.as_ref()
    }

    /// Move to the next well-formed record.
    ///
    /// Lines that fail to parse are skipped in a loop rather than reported.
    /// Runs are written by this crate, so such lines only appear if the file
    /// was damaged on disk.
    pub fn advance(&mut self) -> SortResult<()> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.line)
                .run_context(&self.path)?;
            if read == 0 {
                self.current = None;
                return Ok(());
            }

            match Record::parse(trim_newline(&self.line), self.next_origin) {
                Ok(record) => {
                    self.next_origin += 1;
                    self.current = Some(record);
                    return Ok(());
                }
                Err(err) => {
                    self.skipped += 1;
                    debug!("{}: skipping damaged run line: {}", self.path.display(), err);
                }
            }
        }
    }

    pub fn is_drained(&self) -> bool {
        self.current.is_none()
    }

    /// Damaged lines skipped so far
    pub fn skipped_lines(&self) -> u64 {
        self.skipped
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
