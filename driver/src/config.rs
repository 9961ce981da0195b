use crate::{hosts, partition::ClassShape};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::{
    fs::File,
    io,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::{error, warn};

// check if a file is executable
pub fn check_executable(path: &Path) -> Result<bool, ConfigErrors> {
    if !path.is_file() {
        Err(ConfigErrors::FileNotFound)
    } else {
        match File::open(path).map(|file| file.metadata()) {
            Ok(Ok(metadata)) => Ok((metadata.mode() & 0o111) != 0),
            Ok(Err(e)) | Err(e) => Err(ConfigErrors::MetadataNotFound(e)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("config file could not be read")]
    Unreadable(#[from] io::Error),
    #[error("config file could not be parsed")]
    Unparsable(#[from] serde_yaml::Error),
    #[error("file not found")]
    FileNotFound,
    #[error("metadata not found")]
    MetadataNotFound(io::Error),
}

/// verbosity level handed through to the writer processes
#[derive(Serialize_repr, Deserialize_repr, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Default)]
#[repr(u8)]
pub enum Verbosity {
    Quiet = 0,
    #[default]
    Info = 1,
    Debug = 2,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    // verbosity level forwarded to every writer
    #[serde(default)]
    pub verbose: Verbosity,
    // shots every writer iterates over in this run
    pub num_shots: u64,
    // shots between writer-side flushes
    pub flush_interval: u64,
    // have writers hang after finishing, for debugging process control
    #[serde(default)]
    pub writers_hang: bool,

    pub output: OutputConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    pub writers: WritersConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    // run directories are created as subdirectories of this root
    pub root: PathBuf,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct SupervisorConfig {
    // seconds between sentinel-file polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    // wall clock limit in seconds after which outstanding jobs are killed,
    // 0 disables the limit
    #[serde(default)]
    pub max_run_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_run_secs: 0,
        }
    }
}

impl SupervisorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_run(&self) -> Option<Duration> {
        (self.max_run_secs > 0).then(|| Duration::from_secs(self.max_run_secs))
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct WritersConfig {
    // writer binary launched on the assigned hosts
    pub exec: PathBuf,
    // size of the writer fleet
    pub count: usize,
    // writers packed onto one host before moving to the next
    pub num_per_host: usize,
    // ordered host pool, `local` runs on the driving machine
    pub hosts: Vec<String>,
    pub classes: DatasetClasses,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct DatasetClasses {
    pub small: SmallClass,
    pub vlen: VlenClass,
    pub detector: DetectorClass,
}

// small fixed-size records
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct SmallClass {
    pub count: usize,
    pub shots_per_sample: usize,
    pub chunk_size: usize,
}

// variable-length records with per-shot size bounds
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct VlenClass {
    pub count: usize,
    pub shots_per_sample: usize,
    pub chunk_size: usize,
    pub min_per_shot: usize,
    pub max_per_shot: usize,
}

// fixed-dimension image records
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct DetectorClass {
    pub count: usize,
    pub shots_per_sample: usize,
    pub chunk_size: usize,
    pub rows: usize,
    pub columns: usize,
}

impl SmallClass {
    pub fn shape(&self) -> ClassShape {
        ClassShape {
            count: self.count,
            shots_per_sample: self.shots_per_sample,
        }
    }
}

impl VlenClass {
    pub fn shape(&self) -> ClassShape {
        ClassShape {
            count: self.count,
            shots_per_sample: self.shots_per_sample,
        }
    }
}

impl DetectorClass {
    pub fn shape(&self) -> ClassShape {
        ClassShape {
            count: self.count,
            shots_per_sample: self.shots_per_sample,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        let file = File::open(path)?;

        Ok(serde_yaml::from_reader(file)?)
    }

    /// validate everything that must hold before any job is launched
    ///
    /// attempts to catch all errors instead of piece-by-piece to make
    /// debugging easier for users, returns whether any error was found
    pub fn preflight_checks(&self) -> bool {
        let mut contains_error = false;

        if self.num_shots == 0 {
            warn!("num_shots is 0, writers will produce empty datasets");
        }

        if self.flush_interval == 0 {
            error!("flush_interval cannot be 0, writers flush on shot % flush_interval");
            contains_error = true;
        }

        if self.supervisor.poll_interval_secs == 0 {
            error!("supervisor.poll_interval_secs cannot be 0");
            contains_error = true;
        }

        let writers = &self.writers;

        if writers.count == 0 {
            error!("writers.count cannot be 0, there is nothing to launch");
            contains_error = true;
        }

        match check_executable(&writers.exec) {
            Ok(true) => {}
            Ok(false) => {
                error!(
                    "writers.exec {} is not executable",
                    writers.exec.to_string_lossy()
                );
                contains_error = true;
            }
            Err(e) => {
                error!(
                    "failed to find writers.exec at {}: {e}",
                    writers.exec.to_string_lossy()
                );
                contains_error = true;
            }
        }

        if let Err(e) = hosts::check_host_pool(writers.count, writers.num_per_host, &writers.hosts)
        {
            error!("writers host pool: {e}");
            contains_error = true;
        }

        for (name, shape) in [
            ("small", writers.classes.small.shape()),
            ("vlen", writers.classes.vlen.shape()),
            ("detector", writers.classes.detector.shape()),
        ] {
            if shape.shots_per_sample == 0 {
                error!("writers.classes.{name}.shots_per_sample must be positive");
                contains_error = true;
            }
        }

        let vlen = &writers.classes.vlen;
        if vlen.min_per_shot > vlen.max_per_shot {
            error!(
                "writers.classes.vlen: min_per_shot ({}) exceeds max_per_shot ({})",
                vlen.min_per_shot, vlen.max_per_shot
            );
            contains_error = true;
        }

        let detector = &writers.classes.detector;
        if detector.count > 0 && (detector.rows == 0 || detector.columns == 0) {
            error!(
                "writers.classes.detector: dimensions {}x{} are degenerate",
                detector.rows, detector.columns
            );
            contains_error = true;
        }

        contains_error
    }
}

fn default_poll_interval_secs() -> u64 {
    3
}
