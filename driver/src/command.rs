use crate::{
    config::RunConfig,
    partition::{ClassRange, WriterAssignment},
    rundir::{job_basename, RunDir},
};
use itertools::Itertools;
use std::path::PathBuf;

/// group name shared by every writer job of a run
pub const WRITER_GROUP: &str = "daq_writer";

/// one writer invocation: the argv handed to the binary plus where its
/// output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterCommand {
    pub ordinal: usize,
    pub program: String,
    pub args: Vec<String>,
    // None runs the writer in the foreground without redirection
    pub log_path: Option<PathBuf>,
}

impl WriterCommand {
    /// render the invocation as a single shell line with the redirection
    /// policy applied
    pub fn shell_line(&self) -> String {
        let mut line = self.program.clone();
        if !self.args.is_empty() {
            line.push(' ');
            line.push_str(&self.args.join(" "));
        }
        if let Some(ref log) = self.log_path {
            line.push_str(&format!(" > {} 2>&1", log.display()));
        }

        line
    }
}

/// build the positional argument list for every writer
///
/// The slot order below is the contract with the external writer binary and
/// must never be reordered on only one side:
///
///   num_shots,
///   small/vlen/detector first dataset,
///   small/vlen/detector dataset count,
///   small/vlen/detector shot start,
///   small/vlen/detector shot stride,
///   small/vlen/detector chunk size,
///   vlen min/max per shot,
///   detector rows/columns,
///   flush_interval, verbose, writers_hang,
///   rundir, group, ordinal
///
/// A writer with no slice of a class gets `0 0 0 0` for that class; the zero
/// dataset count tells the binary to skip the class entirely.
pub fn build_writer_commands(
    config: &RunConfig,
    rundir: &RunDir,
    assignments: &[WriterAssignment],
    foreground: bool,
) -> Vec<WriterCommand> {
    assignments
        .iter()
        .enumerate()
        .map(|(ordinal, assignment)| {
            let basename = job_basename(WRITER_GROUP, ordinal);
            let small = assignment.small.unwrap_or(ClassRange::EMPTY);
            let vlen = assignment.vlen.unwrap_or(ClassRange::EMPTY);
            let detector = assignment.detector.unwrap_or(ClassRange::EMPTY);
            let classes = &config.writers.classes;

            let args = [
                config.num_shots as usize,
                small.first_dset,
                vlen.first_dset,
                detector.first_dset,
                small.num_dsets,
                vlen.num_dsets,
                detector.num_dsets,
                small.start,
                vlen.start,
                detector.start,
                small.stride,
                vlen.stride,
                detector.stride,
                classes.small.chunk_size,
                classes.vlen.chunk_size,
                classes.detector.chunk_size,
                classes.vlen.min_per_shot,
                classes.vlen.max_per_shot,
                classes.detector.rows,
                classes.detector.columns,
                config.flush_interval as usize,
                config.verbose as usize,
                usize::from(config.writers_hang),
            ]
            .iter()
            .map(usize::to_string)
            .chain([
                rundir.root().display().to_string(),
                WRITER_GROUP.to_string(),
                ordinal.to_string(),
            ])
            .collect_vec();

            WriterCommand {
                ordinal,
                program: config.writers.exec.display().to_string(),
                args,
                log_path: (!foreground).then(|| rundir.log_file(&basename)),
            }
        })
        .collect_vec()
}
