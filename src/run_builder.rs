//! Splits a forward-only line stream into sorted runs on disk

use crate::error::{SortContext, SortResult};
use crate::record::{trim_newline, Record};
use crate::run::{Run, RunSet};
use log::{debug, warn};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Outcome of one [`RunBuilder::next_run`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    /// A batch was sorted and written as a new run
    Spilled { records: usize },
    /// The input is exhausted and every batch has been flushed
    Exhausted,
}

/// Reads batches of up to `batch_size` records, sorts them and spills them
pub struct RunBuilder<R> {
    reader: R,
    /// Input path, named in read errors
    source: PathBuf,
    batch_size: usize,
    buffer_size: usize,
    /// Origin index handed to the next parsed record
    next_origin: u64,
    /// Physical line number, for diagnostics
    line_number: u64,
    malformed_lines: u64,
    exhausted: bool,
    line: Vec<u8>,
}

impl<R: BufRead> RunBuilder<R> {
    pub fn new(reader: R, source: &Path, batch_size: usize, buffer_size: usize) -> Self {
        Self {
            reader,
            source: source.to_path_buf(),
            batch_size: batch_size.max(1),
            buffer_size,
            next_origin: 0,
            line_number: 0,
            malformed_lines: 0,
            exhausted: false,
            line: Vec::new(),
        }
    }

    /// Read, sort and spill the next batch into a file owned by `runs`.
    ///
    /// A batch that ends up empty at end of input writes no file.
    pub fn next_run(&mut self, runs: &mut RunSet) -> SortResult<BuildStep> {
        if self.exhausted {
            return Ok(BuildStep::Exhausted);
        }

        let first_origin = self.next_origin;
        let mut batch = self.read_batch()?;
        if batch.is_empty() {
            return Ok(BuildStep::Exhausted);
        }

        // Origin indices are unique, so this total order is stable on key
        batch.sort_unstable_by_key(Record::sort_key);

        let (path, file) = runs.create_file()?;
        let mut writer = BufWriter::with_capacity(self.buffer_size, file);
        for record in &batch {
            record.write_line(&mut writer).temp_context(&path)?;
        }
        writer.flush().temp_context(&path)?;

        debug!(
            "spilled {} records (origins {}..{}) to {}",
            batch.len(),
            first_origin,
            self.next_origin,
            path.display()
        );

        runs.push(Run {
            path,
            first_origin,
            len: batch.len() as u64,
        })?;

        Ok(BuildStep::Spilled {
            records: batch.len(),
        })
    }

    /// Accumulate up to `batch_size` parsed records, skipping malformed lines
    fn read_batch(&mut self) -> SortResult<Vec<Record>> {
        let mut batch = Vec::with_capacity(self.batch_size.min(64 * 1024));

        while batch.len() < self.batch_size {
            self.line.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.line)
                .read_context(&self.source)?;
            if read == 0 {
                self.exhausted = true;
                break;
            }
            self.line_number += 1;

            match Record::parse(trim_newline(&self.line), self.next_origin) {
                Ok(record) => {
                    self.next_origin += 1;
                    batch.push(record);
                }
                Err(err) => {
                    self.malformed_lines += 1;
                    warn!("skipping malformed line {}: {}", self.line_number, err);
                }
            }
        }

        Ok(batch)
    }

    /// Records parsed so far
    pub fn records_read(&self) -> u64 {
        self.next_origin
    }

    pub fn malformed_lines(&self) -> u64 {
        self.malformed_lines
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SortError;
    use std::fs;
    use std::io::{self, BufReader, Cursor, Read};
    use tempfile::TempDir;

    /// Input that fails on every read, like a device that went away
    struct Unplugged;

    impl Read for Unplugged {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "device unplugged"))
        }
    }

    fn build_all(input: &str, batch_size: usize, runs: &mut RunSet) -> SortResult<Vec<BuildStep>> {
        let mut builder = RunBuilder::new(
            Cursor::new(input.as_bytes()),
            Path::new("input.txt"),
            batch_size,
            4096,
        );
        let mut steps = Vec::new();
        loop {
            let step = builder.next_run(runs)?;
            steps.push(step);
            if step == BuildStep::Exhausted {
                return Ok(steps);
            }
        }
    }

    #[test]
    fn test_single_batch_is_sorted() -> SortResult<()> {
        let temp_dir = TempDir::new()?;
        let mut runs = RunSet::new(temp_dir.path().join("out.txt"));

        let steps = build_all("3:c\n1:a\n2:b\n", 10, &mut runs)?;

        assert_eq!(
            steps,
            vec![BuildStep::Spilled { records: 3 }, BuildStep::Exhausted]
        );
        assert_eq!(runs.len(), 1);
        assert_eq!(fs::read_to_string(&runs.runs()[0].path)?, "1:a\n2:b\n3:c\n");
        Ok(())
    }

    #[test]
    fn test_batches_split_by_record_count() -> SortResult<()> {
        let temp_dir = TempDir::new()?;
        let mut runs = RunSet::new(temp_dir.path().join("out.txt"));

        build_all("5:e\n4:d\n3:c\n2:b\n1:a\n", 2, &mut runs)?;

        let contents: Vec<String> = runs
            .runs()
            .iter()
            .map(|run| fs::read_to_string(&run.path))
            .collect::<Result<_, _>>()?;
        assert_eq!(contents, vec!["4:d\n5:e\n", "2:b\n3:c\n", "1:a\n"]);

        let origins: Vec<(u64, u64)> = runs
            .runs()
            .iter()
            .map(|run| (run.first_origin, run.len))
            .collect();
        assert_eq!(origins, vec![(0, 2), (2, 2), (4, 1)]);
        Ok(())
    }

    #[test]
    fn test_equal_keys_keep_input_order() -> SortResult<()> {
        let temp_dir = TempDir::new()?;
        let mut runs = RunSet::new(temp_dir.path().join("out.txt"));

        build_all("2:x\n1:first\n2:y\n1:second\n", 10, &mut runs)?;

        assert_eq!(
            fs::read_to_string(&runs.runs()[0].path)?,
            "1:first\n1:second\n2:x\n2:y\n"
        );
        Ok(())
    }

    #[test]
    fn test_malformed_lines_do_not_consume_origins() -> SortResult<()> {
        let temp_dir = TempDir::new()?;
        let mut runs = RunSet::new(temp_dir.path().join("out.txt"));
        let input = "5:a\nxyz\n\n3:b\n";
        let mut builder =
            RunBuilder::new(Cursor::new(input.as_bytes()), Path::new("input.txt"), 10, 4096);

        while builder.next_run(&mut runs)? != BuildStep::Exhausted {}

        assert_eq!(builder.records_read(), 2);
        assert_eq!(builder.malformed_lines(), 2);
        assert!(builder.is_exhausted());
        assert_eq!(fs::read_to_string(&runs.runs()[0].path)?, "3:b\n5:a\n");
        Ok(())
    }

    #[test]
    fn test_empty_input_writes_no_run() -> SortResult<()> {
        let temp_dir = TempDir::new()?;
        let mut runs = RunSet::new(temp_dir.path().join("out.txt"));

        let steps = build_all("", 4, &mut runs)?;

        assert_eq!(steps, vec![BuildStep::Exhausted]);
        assert!(runs.is_empty());
        assert_eq!(runs.pending_files(), 0);
        Ok(())
    }

    #[test]
    fn test_exact_multiple_of_batch_size() -> SortResult<()> {
        let temp_dir = TempDir::new()?;
        let mut runs = RunSet::new(temp_dir.path().join("out.txt"));

        let steps = build_all("2:b\n1:a\n4:d\n3:c\n", 2, &mut runs)?;

        assert_eq!(
            steps,
            vec![
                BuildStep::Spilled { records: 2 },
                BuildStep::Spilled { records: 2 },
                BuildStep::Exhausted
            ]
        );
        assert_eq!(runs.pending_files(), 2);
        Ok(())
    }

    #[test]
    fn test_missing_final_newline() -> SortResult<()> {
        let temp_dir = TempDir::new()?;
        let mut runs = RunSet::new(temp_dir.path().join("out.txt"));

        build_all("2:b\n1:a", 10, &mut runs)?;

        assert_eq!(fs::read_to_string(&runs.runs()[0].path)?, "1:a\n2:b\n");
        Ok(())
    }

    #[test]
    fn test_unwritable_temp_location_is_fatal() {
        let temp_dir = TempDir::new().expect("temp dir");
        let mut runs = RunSet::new(temp_dir.path().join("missing").join("out.txt"));
        let mut builder =
            RunBuilder::new(Cursor::new(&b"1:a\n"[..]), Path::new("input.txt"), 10, 4096);

        let err = builder.next_run(&mut runs).expect_err("temp dir is missing");
        assert!(matches!(err, SortError::TempFile { .. }));
    }

    #[test]
    fn test_read_failure_names_input() {
        let temp_dir = TempDir::new().expect("temp dir");
        let mut runs = RunSet::new(temp_dir.path().join("out.txt"));
        let reader = BufReader::new(Cursor::new(&b"2:b\n1:a\n"[..]).chain(Unplugged));
        let mut builder = RunBuilder::new(reader, Path::new("big-input.txt"), 10, 4096);

        let err = builder.next_run(&mut runs).expect_err("input fails mid-stream");

        assert!(matches!(err, SortError::InputRead { .. }));
        let msg = err.to_string();
        assert!(msg.contains("big-input.txt"), "message: {msg}");
        assert!(msg.contains("device unplugged"), "message: {msg}");
        assert_eq!(runs.pending_files(), 0);
    }
}
