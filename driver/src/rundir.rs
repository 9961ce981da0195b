use crate::{config::RunConfig, partition::WriterAssignment};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RunDirError {
    #[error("run directory {0} already exists, pass --force to overwrite it")]
    AlreadyExists(PathBuf),
    #[error("run directory {0} does not exist")]
    Missing(PathBuf),
    #[error("failed to build run directory")]
    Io(#[from] io::Error),
    #[error("failed to snapshot the run config")]
    Snapshot(#[from] serde_yaml::Error),
}

/// `<group>-s<ordinal>` with the ordinal zero padded to four digits
///
/// every per-job file name is derived from this basename
pub fn job_basename(group: &str, ordinal: usize) -> String {
    format!("{group}-s{ordinal:04}")
}

/// the fixed subtree one run owns: hdf5/, logs/, results/ and pids/
#[derive(Debug, Clone)]
pub struct RunDir {
    root: PathBuf,
}

impl RunDir {
    /// create `<root>/<run_id>` and its subdirectories
    ///
    /// an existing run directory is only removed under `force`
    pub fn prepare(root: &Path, run_id: &str, force: bool) -> Result<Self, RunDirError> {
        let dir = root.join(run_id);

        if dir.exists() {
            if !force {
                return Err(RunDirError::AlreadyExists(dir));
            }
            warn!(rundir = %dir.display(), "removing existing run directory");
            fs::remove_dir_all(&dir)?;
        }

        let rundir = Self { root: dir };
        for sub in [
            rundir.hdf5_dir(),
            rundir.logs_dir(),
            rundir.results_dir(),
            rundir.pids_dir(),
        ] {
            fs::create_dir_all(sub)?;
        }
        info!(rundir = %rundir.root.display(), "prepared run directory");

        Ok(rundir)
    }

    /// open an existing run directory, for operating on a finished or hung run
    pub fn open(root: &Path, run_id: &str) -> Result<Self, RunDirError> {
        let dir = root.join(run_id);

        if !dir.is_dir() {
            return Err(RunDirError::Missing(dir));
        }

        Ok(Self { root: dir })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hdf5_dir(&self) -> PathBuf {
        self.root.join("hdf5")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    pub fn pids_dir(&self) -> PathBuf {
        self.root.join("pids")
    }

    pub fn log_file(&self, basename: &str) -> PathBuf {
        self.logs_dir().join(format!("{basename}.log"))
    }

    /// marker a job writes on successful completion
    pub fn sentinel_file(&self, basename: &str) -> PathBuf {
        self.logs_dir().join(format!("{basename}.finished"))
    }

    /// record of a job's host and process id, written by the job on startup
    pub fn pid_file(&self, basename: &str) -> PathBuf {
        self.pids_dir().join(format!("{basename}.pid"))
    }

    /// preserve the validated configuration this run was driven with
    pub fn snapshot_config(&self, config: &RunConfig) -> Result<(), RunDirError> {
        let file = fs::File::create(self.results_dir().join("config.yaml"))?;
        serde_yaml::to_writer(file, config)?;

        Ok(())
    }

    /// preserve the partition table so a run can be audited after the fact
    pub fn snapshot_assignments(
        &self,
        assignments: &[WriterAssignment],
    ) -> Result<(), RunDirError> {
        let file = fs::File::create(self.results_dir().join("assignments.yaml"))?;
        serde_yaml::to_writer(file, assignments)?;

        Ok(())
    }
}
