pub mod pidfile;
pub mod shell;

#[cfg(test)]
mod pidfile_test;

use crate::{
    command::WriterCommand,
    hosts::{LOCAL_HOST, LOCAL_HOSTNAME},
    rundir::{job_basename, RunDir},
    supervisor::{pidfile::PidRecord, shell::ShellPool},
};
use globset::{Glob, GlobMatcher};
use once_cell::sync::Lazy;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs, io,
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

// bound on the kill invocation itself, not on the job being killed
const KILL_TIMEOUT: Duration = Duration::from_secs(10);

static PID_GLOB: Lazy<GlobMatcher> =
    Lazy::new(|| Glob::new("*.pid").expect("static glob is valid").compile_matcher());

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("{commands} commands but {hosts} hosts for group {group}")]
    Mismatched {
        group: String,
        commands: usize,
        hosts: usize,
    },
    #[error("launch of {basename} on {host} failed with status {status}")]
    LaunchFailed {
        basename: String,
        host: String,
        status: i32,
    },
    #[error("failed to spawn a remote invocation")]
    Spawn(#[from] io::Error),
}

/// one remotely started process and the two filesystem markers it is
/// expected to produce
#[derive(Debug, Clone)]
pub struct LaunchedJob {
    pub group: String,
    pub ordinal: usize,
    pub host: String,
    pub command: String,
    pub pid_file: PathBuf,
    pub sentinel: PathBuf,
}

/// outcome of waiting on a batch of launched jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// every job produced its sentinel file
    AllFinished,
    /// the wall clock limit fired first, the remaining jobs were killed
    TimedOut { unfinished: usize },
}

/// launches, tracks and kills the jobs of one run
///
/// Coordination with the jobs is purely filesystem based: completion is the
/// existence of a sentinel file, termination is a signal at the (hostname,
/// pid) a job recorded at startup. Launches are sequential, the launched jobs
/// themselves run concurrently on their hosts.
pub struct Supervisor {
    rundir: RunDir,
    poll_interval: Duration,
    max_run: Option<Duration>,
    shells: ShellPool,
    launched: Vec<LaunchedJob>,
}

impl Supervisor {
    pub fn new(rundir: RunDir, poll_interval: Duration, max_run: Option<Duration>) -> Self {
        Self {
            rundir,
            poll_interval,
            max_run,
            shells: ShellPool::new(),
            launched: Vec::new(),
        }
    }

    pub fn launched(&self) -> &[LaunchedJob] {
        &self.launched
    }

    /// fire every (command, host) pair in order as a backgrounded remote
    /// invocation
    ///
    /// A failing invocation aborts the remaining launches of the batch, jobs
    /// already started are not rolled back. The failure of the invocation is
    /// distinct from the job's eventual exit code, which is never observed.
    pub fn launch(
        &mut self,
        group: &str,
        commands: &[WriterCommand],
        hosts: &[String],
    ) -> Result<(), SupervisorError> {
        if commands.len() != hosts.len() {
            return Err(SupervisorError::Mismatched {
                group: group.to_string(),
                commands: commands.len(),
                hosts: hosts.len(),
            });
        }

        for (command, host) in commands.iter().zip(hosts.iter()) {
            // the ordinal the writer was handed also names its markers
            let ordinal = command.ordinal;
            let basename = job_basename(group, ordinal);
            let line = command.shell_line();
            info!(group, ordinal, host = %host, "launching job");

            let shell = self.shells.get_or_connect(host);
            let status = shell.launch(&line)?;
            if !status.success() {
                return Err(SupervisorError::LaunchFailed {
                    basename,
                    host: host.clone(),
                    status: status.code().unwrap_or(-1),
                });
            }

            self.launched.push(LaunchedJob {
                group: group.to_string(),
                ordinal,
                host: host.clone(),
                command: line,
                pid_file: self.rundir.pid_file(&basename),
                sentinel: self.rundir.sentinel_file(&basename),
            });
        }

        Ok(())
    }

    /// poll the expected sentinel files until every launched job has finished
    /// or the wall clock limit fires, whichever is first
    ///
    /// a sentinel already present at the first poll counts as finished
    pub fn wait(&mut self) -> WaitOutcome {
        let mut outstanding: BTreeMap<PathBuf, String> = BTreeMap::new();
        for job in &self.launched {
            let basename = job_basename(&job.group, job.ordinal);
            if outstanding.insert(job.sentinel.clone(), basename).is_some() {
                warn!(sentinel = %job.sentinel.display(), "sentinel already awaited");
            }
        }

        if outstanding.is_empty() {
            info!("no jobs to wait for");
            return WaitOutcome::AllFinished;
        }

        info!(jobs = outstanding.len(), "waiting for jobs to finish");
        let started = Instant::now();

        loop {
            outstanding.retain(|sentinel, basename| {
                if sentinel.exists() {
                    info!(job = %basename, "job finished");
                    false
                } else {
                    true
                }
            });

            if outstanding.is_empty() {
                info!("all jobs finished");
                return WaitOutcome::AllFinished;
            }

            if let Some(max_run) = self.max_run {
                if started.elapsed() > max_run {
                    warn!(
                        unfinished = outstanding.len(),
                        "wall clock limit hit, killing remaining jobs"
                    );
                    let subset: BTreeSet<String> = outstanding.values().cloned().collect();
                    let unfinished = subset.len();
                    self.kill_all(Some(&subset));

                    return WaitOutcome::TimedOut { unfinished };
                }
            }

            debug!(outstanding = outstanding.len(), "jobs still outstanding");
            thread::sleep(self.poll_interval);
        }
    }

    /// scan the run's pid directory and signal every recorded process,
    /// restricted to `subset` basenames when given
    ///
    /// kill attempts are independent, a failed one never aborts the scan;
    /// returns how many processes were signalled successfully
    pub fn kill_all(&mut self, subset: Option<&BTreeSet<String>>) -> usize {
        let pid_files = match select_pid_files(&self.rundir, subset) {
            Ok(files) => files,
            Err(error) => {
                error!(error = %error, "failed to scan the pid directory");
                return 0;
            }
        };

        if pid_files.is_empty() {
            info!(pid_dir = %self.rundir.pids_dir().display(), "no pid files to kill");
            return 0;
        }

        info!(count = pid_files.len(), "killing recorded processes");
        let mut killed = 0;

        for path in pid_files {
            let record: PidRecord = match fs::read_to_string(&path) {
                Ok(contents) => match contents.parse() {
                    Ok(record) => record,
                    Err(error) => {
                        error!(file = %path.display(), error = %error, "malformed pid file");
                        continue;
                    }
                },
                Err(error) => {
                    error!(file = %path.display(), error = %error, "unreadable pid file");
                    continue;
                }
            };

            let target = if record.hostname == *LOCAL_HOSTNAME {
                LOCAL_HOST
            } else {
                record.hostname.as_str()
            };
            let shell = self.shells.get_or_connect(target);
            let kill_cmd = format!("kill -9 {}", record.pid);
            info!(
                group = %record.group,
                idx = record.idx,
                hostname = %record.hostname,
                pid = record.pid,
                "attempting kill"
            );

            match shell.run(&kill_cmd, KILL_TIMEOUT) {
                Ok(Some(status)) if status.success() => {
                    info!(pid = record.pid, hostname = %record.hostname, "killed");
                    killed += 1;
                }
                Ok(Some(status)) => {
                    error!(pid = record.pid, status = ?status.code(), "kill failed");
                }
                Ok(None) => {
                    error!(pid = record.pid, hostname = %record.hostname, "kill timed out");
                }
                Err(error) => {
                    error!(pid = record.pid, error = %error, "failed to issue kill");
                }
            }
        }

        killed
    }
}

/// pid files of the run, filtered to `subset` basenames when given
fn select_pid_files(
    rundir: &RunDir,
    subset: Option<&BTreeSet<String>>,
) -> Result<Vec<PathBuf>, io::Error> {
    let mut selected = Vec::new();

    for entry in fs::read_dir(rundir.pids_dir())? {
        let path = entry?.path();
        let Some(name) = path.file_name() else {
            continue;
        };
        if !PID_GLOB.is_match(name) {
            continue;
        }

        if let Some(subset) = subset {
            let stem = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !subset.contains(&stem) {
                continue;
            }
        }

        selected.push(path);
    }

    selected.sort();
    Ok(selected)
}
