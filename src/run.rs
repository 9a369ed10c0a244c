//! Temporary run files and their lifecycle
//!
//! Runs are named `<output>.temp<N>` with `N` taken from a counter owned by the
//! [`RunSet`], so they land in the same directory as the output. Every path is
//! registered before the file is created, which lets [`RunSet::cleanup`] (and
//! `Drop`, as a last resort) remove half-written runs as well as finished ones.

use crate::error::{SortContext, SortError, SortResult};
use log::{debug, warn};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// A sorted spill file together with the origin indices it covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub path: PathBuf,
    /// Origin index of the first record written to this run
    pub first_origin: u64,
    /// Number of records in the run
    pub len: u64,
}

impl Run {
    /// One past the last origin index in this run
    pub fn end_origin(&self) -> u64 {
        self.first_origin + self.len
    }
}

/// Owns every temporary run file created for one sort
#[derive(Debug)]
pub struct RunSet {
    output: PathBuf,
    next_index: usize,
    /// Every path handed out, finished or not
    created: Vec<PathBuf>,
    runs: Vec<Run>,
}

impl RunSet {
    /// Create an empty set naming its files after `output`
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            next_index: 0,
            created: Vec::new(),
            runs: Vec::new(),
        }
    }

    /// Path for temporary file `index` of `output`
    pub fn temp_path(output: &Path, index: usize) -> PathBuf {
        let mut name = OsString::from(output.as_os_str());
        name.push(format!(".temp{index}"));
        PathBuf::from(name)
    }

    /// Create the next run file, registering it for cleanup first
    pub fn create_file(&mut self) -> SortResult<(PathBuf, File)> {
        let path = Self::temp_path(&self.output, self.next_index);
        self.next_index += 1;
        self.created.push(path.clone());

        let file = File::create(&path).temp_context(&path)?;
        debug!("created run file {}", path.display());
        Ok((path, file))
    }

    /// Record a fully written run
    pub fn push(&mut self, run: Run) -> SortResult<()> {
        if !self.created.contains(&run.path) {
            return Err(SortError::internal(&format!(
                "run {} was not created by this set",
                run.path.display()
            )));
        }
        if let Some(last) = self.runs.last() {
            if run.first_origin < last.end_origin() {
                return Err(SortError::internal("run origin ranges overlap"));
            }
        }
        self.runs.push(run);
        Ok(())
    }

    /// Hand over the finished runs for another merge pass.
    ///
    /// Their files stay registered for cleanup until [`RunSet::retire`]d.
    pub fn take_runs(&mut self) -> Vec<Run> {
        std::mem::take(&mut self.runs)
    }

    /// Delete a run that has been merged into a newer one
    pub fn retire(&mut self, run: &Run) -> SortResult<()> {
        match fs::remove_file(&run.path) {
            Ok(()) => debug!("removed merged run {}", run.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(SortError::temp_file(&run.path, err)),
        }
        self.created.retain(|path| path != &run.path);
        Ok(())
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Number of files currently tracked for deletion
    pub fn pending_files(&self) -> usize {
        self.created.len()
    }

    /// Delete every temporary file created so far.
    ///
    /// Files that are already gone are not an error. Every file is attempted
    /// even if an earlier removal fails; the first failure is returned.
    pub fn cleanup(&mut self) -> SortResult<()> {
        let mut first_error = None;

        for path in self.created.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("removed run file {}", path.display()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!("failed to remove run file {}: {}", path.display(), err);
                    if first_error.is_none() {
                        first_error = Some(SortError::temp_file(&path, err));
                    }
                }
            }
        }
        self.runs.clear();

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for RunSet {
    fn drop(&mut self) {
        if !self.created.is_empty() {
            let _ = self.cleanup();
        }
    }
}
