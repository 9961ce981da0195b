use crate::{
    config::{
        DatasetClasses, DetectorClass, OutputConfig, RunConfig, SmallClass, SupervisorConfig,
        Verbosity, VlenClass, WritersConfig,
    },
    rundir::RunDir,
};
use std::{env, fs, path::PathBuf};

/// scratch area under the system temp dir, fresh per (tag, test process)
pub fn scratch_root(tag: &str) -> PathBuf {
    let root = env::temp_dir().join(format!("shotfan-{tag}-{}", std::process::id()));
    if root.exists() {
        fs::remove_dir_all(&root).unwrap();
    }
    fs::create_dir_all(&root).unwrap();

    root
}

pub fn scratch_rundir(tag: &str) -> RunDir {
    RunDir::prepare(&scratch_root(tag), "run", false).unwrap()
}

/// the worked three-writer example configuration
pub fn sample_config() -> RunConfig {
    RunConfig {
        verbose: Verbosity::Info,
        num_shots: 1000,
        flush_interval: 100,
        writers_hang: false,
        output: OutputConfig {
            root: PathBuf::from("/data/runs"),
        },
        supervisor: SupervisorConfig::default(),
        writers: WritersConfig {
            exec: PathBuf::from("/bin/sh"),
            count: 3,
            num_per_host: 2,
            hosts: vec![String::from("daq01"), String::from("daq02")],
            classes: DatasetClasses {
                small: SmallClass {
                    count: 10,
                    shots_per_sample: 1,
                    chunk_size: 600,
                },
                vlen: VlenClass {
                    count: 3,
                    shots_per_sample: 1,
                    chunk_size: 600,
                    min_per_shot: 1,
                    max_per_shot: 8,
                },
                detector: DetectorClass {
                    count: 1,
                    shots_per_sample: 100,
                    chunk_size: 10,
                    rows: 512,
                    columns: 512,
                },
            },
        },
    }
}
