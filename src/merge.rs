//! K-way merge of sorted runs
//!
//! Each run is sorted by `(key, origin_index)` and the runs cover disjoint,
//! increasing origin ranges. Repeatedly emitting the smallest head under that
//! same order therefore yields exactly what one stable in-memory sort of the
//! whole input would produce.

use crate::error::{SortError, SortResult};
use crate::run::Run;
use crate::run_reader::RunReader;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::{BufRead, Write};

/// Heap entry pointing at the head record of one reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct MergeItem {
    key: u64,
    origin_index: u64,
    reader_index: usize,
}

/// Merges any number of run readers into one ordered stream
pub struct KWayMerger<R> {
    readers: Vec<RunReader<R>>,
    heap: BinaryHeap<Reverse<MergeItem>>,
}

impl KWayMerger<std::io::BufReader<std::fs::File>> {
    /// Open a reader for every run.
    ///
    /// Every run holds a file open for the life of the merger, so callers keep
    /// `runs` below the merge fan-in.
    pub fn open(runs: &[Run], buffer_size: usize) -> SortResult<Self> {
        let readers = runs
            .iter()
            .map(|run| RunReader::open(run, buffer_size))
            .collect::<SortResult<Vec<_>>>()?;
        Ok(Self::new(readers))
    }
}

impl<R: BufRead> KWayMerger<R> {
    pub fn new(readers: Vec<RunReader<R>>) -> Self {
        let mut heap = BinaryHeap::with_capacity(readers.len());
        for (reader_index, reader) in readers.iter().enumerate() {
            if let Some(record) = reader.peek() {
                heap.push(Reverse(MergeItem {
                    key: record.key,
                    origin_index: record.origin_index,
                    reader_index,
                }));
            }
        }
        Self { readers, heap }
    }

    /// Number of runs that still have records
    pub fn active_runs(&self) -> usize {
        self.heap.len()
    }

    /// Write the next record to `output`; `Ok(false)` once every run is drained.
    ///
    /// Errors from `output` are returned as [`SortError::Io`]; errors reading a
    /// run come back as [`SortError::RunRead`].
    pub fn write_next<W: Write>(&mut self, output: &mut W) -> SortResult<bool> {
        let Some(Reverse(item)) = self.heap.pop() else {
            return Ok(false);
        };

        let reader = &mut self.readers[item.reader_index];
        let record = reader
            .peek()
            .ok_or_else(|| SortError::internal("merge heap points at a drained run"))?;
        record.write_line(output)?;

        reader.advance()?;
        if let Some(next) = reader.peek() {
            self.heap.push(Reverse(MergeItem {
                key: next.key,
                origin_index: next.origin_index,
                reader_index: item.reader_index,
            }));
        }

        Ok(true)
    }

    /// Drain every run into `output`, returning the number of records written
    pub fn merge_into<W: Write>(mut self, output: &mut W) -> SortResult<u64> {
        let mut written = 0;
        while self.write_next(output)? {
            written += 1;
        }
        output.flush()?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::Path;

    fn merger(runs: &[(&'static str, u64)]) -> KWayMerger<Cursor<&'static [u8]>> {
        let readers = runs
            .iter()
            .enumerate()
            .map(|(i, &(contents, first_origin))| {
                RunReader::from_reader(
                    Cursor::new(contents.as_bytes()),
                    Path::new(&format!("run{i}")),
                    first_origin,
                )
            })
            .collect::<SortResult<Vec<_>>>()
            .expect("in-memory runs");
        KWayMerger::new(readers)
    }

    fn merge(runs: &[(&'static str, u64)]) -> String {
        let mut out = Vec::new();
        merger(runs).merge_into(&mut out).expect("merge to vec");
        String::from_utf8(out).expect("utf8 output")
    }

    #[test]
    fn test_merge_interleaved_runs() {
        let output = merge(&[("1:a\n4:d\n7:g\n", 0), ("2:b\n5:e\n", 3), ("3:c\n6:f\n", 5)]);
        assert_eq!(output, "1:a\n2:b\n3:c\n4:d\n5:e\n6:f\n7:g\n");
    }

    #[test]
    fn test_ties_resolved_by_origin_across_runs() {
        let output = merge(&[("1:a\n", 0), ("1:b\n", 1), ("1:c\n", 2)]);
        assert_eq!(output, "1:a\n1:b\n1:c\n");
    }

    #[test]
    fn test_ties_follow_origin_not_reader_position() {
        // Later run listed first: its origins are still higher
        let output = merge(&[("5:late\n", 10), ("5:early\n", 0)]);
        assert_eq!(output, "5:early\n5:late\n");
    }

    #[test]
    fn test_uneven_and_empty_runs() {
        let output = merge(&[("", 0), ("2:x\n2:y\n9:z\n", 0), ("2:w\n", 3)]);
        assert_eq!(output, "2:x\n2:y\n2:w\n9:z\n");
    }

    #[test]
    fn test_merge_counts_records_and_drains() {
        let mut m = merger(&[("1:a\n3:c\n", 0), ("2:b\n", 2)]);
        assert_eq!(m.active_runs(), 2);

        let mut out: Vec<u8> = Vec::new();
        assert!(m.write_next(&mut out).expect("write"));
        assert!(m.write_next(&mut out).expect("write"));
        assert_eq!(m.active_runs(), 1);
        assert!(m.write_next(&mut out).expect("write"));
        assert!(!m.write_next(&mut out).expect("write"));
        assert_eq!(out, b"1:a\n2:b\n3:c\n");
    }

    #[test]
    fn test_merge_skips_damaged_run_lines() {
        let output = merge(&[("1:a\n???\n3:c\n", 0), ("2:b\n", 2)]);
        assert_eq!(output, "1:a\n2:b\n3:c\n");
    }

    #[test]
    fn test_output_failure_is_bare_io() {
        struct Full;

        impl Write for Full {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "no space left"))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let err = merger(&[("1:a\n", 0), ("2:b\n", 1)])
            .merge_into(&mut Full)
            .expect_err("writer is full");
        assert!(matches!(err, SortError::Io(_)));
    }

    #[test]
    fn test_merge_into_returns_count() {
        let written = merger(&[("1:a\n", 0), ("0:z\n", 1)])
            .merge_into(&mut Vec::<u8>::new())
            .expect("merge to vec");
        assert_eq!(written, 2);
    }
}
