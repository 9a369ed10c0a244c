//! External sorting for inputs larger than memory
//!
//! Drives the whole pipeline: input → sorted runs on disk → merged output,
//! and removes every run file on the way out whether or not the sort worked.

use crate::config::SortConfig;
use crate::error::{SortContext, SortError, SortResult};
use crate::merge::KWayMerger;
use crate::run::{Run, RunSet};
use crate::run_builder::{BuildStep, RunBuilder};
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Where the orchestrator is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortPhase {
    Opening,
    Building { runs: usize },
    Merging,
    EmptyOutput,
    Cleanup,
    Done,
    Failed,
}

/// How the output file was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStrategy {
    /// No records survived parsing; the output is an empty file
    Empty,
    /// One run was copied to the output
    SingleRun,
    /// Several runs were k-way merged into the output
    Merged,
}

/// Summary of a finished sort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortStats {
    /// Records parsed from the input and written to the output
    pub records: u64,
    /// Input lines dropped because they failed to parse
    pub malformed_lines: u64,
    /// Number of runs spilled to disk
    pub runs: usize,
    pub strategy: OutputStrategy,
    pub elapsed: Duration,
}

/// External sorter for key-value files of any size
pub struct ExternalSort {
    config: SortConfig,
    phase: SortPhase,
    runs: RunSet,
    /// Set once the output file exists, so a failure can remove it
    output_created: bool,
}

impl ExternalSort {
    /// Create a sorter for a validated configuration
    pub fn new(config: SortConfig) -> SortResult<Self> {
        config.validate()?;
        let runs = RunSet::new(&config.output);
        Ok(Self {
            config,
            phase: SortPhase::Opening,
            runs,
            output_created: false,
        })
    }

    pub fn phase(&self) -> SortPhase {
        self.phase
    }

    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    /// Main external sort entry point.
    ///
    /// Run files are deleted before this returns, on success and on failure.
    /// A sorter runs once; later calls return [`SortError::AlreadyFinished`].
    pub fn sort(&mut self) -> SortResult<SortStats> {
        if self.phase != SortPhase::Opening {
            return Err(SortError::AlreadyFinished);
        }

        let started = Instant::now();
        let result = self.build_runs().and_then(|built| self.write_output(built));
        self.finish(started, result)
    }

    /// Split the input into sorted runs; the input is closed on return
    fn build_runs(&mut self) -> SortResult<BuiltRuns> {
        let buffer_size = self.config.effective_buffer_size();
        let input = self.open_input()?;

        self.transition(SortPhase::Building { runs: 0 });
        debug!(
            "building runs of up to {} records in {}",
            self.config.batch_size,
            self.config.temp_dir().display()
        );

        let mut builder = RunBuilder::new(
            BufReader::with_capacity(buffer_size, input),
            &self.config.input,
            self.config.batch_size,
            buffer_size,
        );
        while let BuildStep::Spilled { .. } = builder.next_run(&mut self.runs)? {
            self.transition(SortPhase::Building {
                runs: self.runs.len(),
            });
        }

        Ok(BuiltRuns {
            records: builder.records_read(),
            malformed_lines: builder.malformed_lines(),
        })
    }

    fn write_output(&mut self, built: BuiltRuns) -> SortResult<SortStats> {
        let runs = self.runs.len();
        let strategy = match runs {
            0 => {
                self.transition(SortPhase::EmptyOutput);
                self.write_empty_output()?;
                OutputStrategy::Empty
            }
            1 => {
                self.transition(SortPhase::Merging);
                let run = self.runs.runs()[0].clone();
                self.copy_single_run(&run)?;
                OutputStrategy::SingleRun
            }
            _ => {
                self.transition(SortPhase::Merging);
                self.merge_runs()?;
                OutputStrategy::Merged
            }
        };

        Ok(SortStats {
            records: built.records,
            malformed_lines: built.malformed_lines,
            runs,
            strategy,
            elapsed: Duration::ZERO,
        })
    }

    /// Remove run files, and the output too if the sort failed
    fn finish(
        &mut self,
        started: Instant,
        result: SortResult<SortStats>,
    ) -> SortResult<SortStats> {
        self.transition(SortPhase::Cleanup);
        let result = match (result, self.runs.cleanup()) {
            (Ok(stats), Ok(())) => Ok(stats),
            (Ok(_), Err(cleanup_err)) => Err(cleanup_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(cleanup_err)) => {
                warn!("cleanup after failed sort also failed: {}", cleanup_err);
                Err(err)
            }
        };

        match result {
            Ok(mut stats) => {
                stats.elapsed = started.elapsed();
                self.transition(SortPhase::Done);
                Ok(stats)
            }
            Err(err) => {
                self.discard_partial_output();
                self.transition(SortPhase::Failed);
                Err(err)
            }
        }
    }

    fn open_input(&self) -> SortResult<File> {
        let path = &self.config.input;
        let file = File::open(path).input_context(path)?;
        if file.metadata().input_context(path)?.is_dir() {
            return Err(SortError::input_open(
                path,
                io::Error::new(io::ErrorKind::Other, "is a directory"),
            ));
        }
        Ok(file)
    }

    fn create_output(&mut self) -> SortResult<BufWriter<File>> {
        let path = &self.config.output;
        let file = File::create(path).output_context(path)?;
        self.output_created = true;
        Ok(BufWriter::with_capacity(
            self.config.effective_buffer_size(),
            file,
        ))
    }

    fn write_empty_output(&mut self) -> SortResult<()> {
        let mut output = self.create_output()?;
        output.flush().write_context(&self.config.output)
    }

    /// Copy the only run to the output; the run itself is left for cleanup
    fn copy_single_run(&mut self, run: &Run) -> SortResult<()> {
        let file = File::open(&run.path).run_context(&run.path)?;
        let mut reader = BufReader::with_capacity(self.config.effective_buffer_size(), file);
        let mut output = self.create_output()?;
        let output_path = &self.config.output;

        loop {
            let chunk = reader.fill_buf().run_context(&run.path)?;
            if chunk.is_empty() {
                break;
            }
            let len = chunk.len();
            output.write_all(chunk).write_context(output_path)?;
            reader.consume(len);
        }

        output.flush().write_context(output_path)
    }

    /// Merge every run into the output, `merge_fan_in` runs at a time
    fn merge_runs(&mut self) -> SortResult<()> {
        let buffer_size = self.config.effective_buffer_size();
        let fan_in = self.config.merge_fan_in;

        let mut pass = 0;
        while self.runs.len() > fan_in {
            pass += 1;
            self.merge_pass(fan_in, buffer_size)?;
            debug!("merge pass {} left {} runs", pass, self.runs.len());
        }

        let merger = KWayMerger::open(self.runs.runs(), buffer_size)?;
        let mut output = self.create_output()?;
        let written = drain_merger(
            merger,
            &mut output,
            &self.config.output,
            SortError::output_write,
        )?;

        debug!("merged {} runs, {} records written", self.runs.len(), written);
        Ok(())
    }

    /// Replace each group of `fan_in` consecutive runs with one merged run.
    ///
    /// Consecutive runs cover adjacent origin ranges, so the merged run is
    /// itself a valid run for the next pass.
    fn merge_pass(&mut self, fan_in: usize, buffer_size: usize) -> SortResult<()> {
        let pending = self.runs.take_runs();

        for group in pending.chunks(fan_in) {
            if let [run] = group {
                self.runs.push(run.clone())?;
                continue;
            }

            let merger = KWayMerger::open(group, buffer_size)?;
            let (path, file) = self.runs.create_file()?;
            let mut writer = BufWriter::with_capacity(buffer_size, file);
            let written = drain_merger(merger, &mut writer, &path, SortError::temp_file)?;
            drop(writer);

            for run in group {
                self.runs.retire(run)?;
            }
            self.runs.push(Run {
                path,
                first_origin: group[0].first_origin,
                len: written,
            })?;
        }

        Ok(())
    }

    fn discard_partial_output(&mut self) {
        if !self.output_created {
            return;
        }
        self.output_created = false;
        match fs::remove_file(&self.config.output) {
            Ok(()) => debug!("removed partial output {}", self.config.output.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                "failed to remove partial output {}: {}",
                self.config.output.display(),
                err
            ),
        }
    }

    fn transition(&mut self, next: SortPhase) {
        if self.phase != next {
            debug!("sort phase {:?} -> {:?}", self.phase, next);
            self.phase = next;
        }
    }
}

/// Counters carried from run building to the final stats
struct BuiltRuns {
    records: u64,
    malformed_lines: u64,
}

/// Run `merger` to completion, charging write failures to `path`
fn drain_merger<R: BufRead, W: Write>(
    merger: KWayMerger<R>,
    writer: &mut W,
    path: &Path,
    write_error: fn(&Path, io::Error) -> SortError,
) -> SortResult<u64> {
    merger.merge_into(writer).map_err(|err| match err {
        SortError::Io(source) => write_error(path, source),
        other => other,
    })
}
