use crate::config::WritersConfig;
use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::error;

/// pseudo host denoting the machine the driver itself runs on
pub const LOCAL_HOST: &str = "local";

/// name of the local machine, resolved once
///
/// falls back to a marker the kill path can never match so a bad hostname
/// lookup degrades to remote kills instead of killing random local pids
pub static LOCAL_HOSTNAME: Lazy<String> = Lazy::new(|| match nix::unistd::gethostname() {
    Ok(name) => name.to_string_lossy().into_owned(),
    Err(errno) => {
        error!(errno = ?errno, "failed to retrieve the local hostname");
        String::from("--unknown--")
    }
});

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HostPoolError {
    #[error("num_per_host cannot be 0 with {count} processes requested")]
    ZeroPerHost { count: usize },
    #[error(
        "{count} processes at {num_per_host} per host need {needed} hosts, \
         only {available} configured"
    )]
    Insufficient {
        count: usize,
        num_per_host: usize,
        needed: usize,
        available: usize,
    },
}

/// resolve the `local` pseudo host to the real machine name
pub fn resolve_host(host: &str) -> &str {
    if host == LOCAL_HOST {
        LOCAL_HOSTNAME.as_str()
    } else {
        host
    }
}

/// verify the pool can hold `count` processes at `num_per_host` each
pub fn check_host_pool(
    count: usize,
    num_per_host: usize,
    hosts: &[String],
) -> Result<(), HostPoolError> {
    if count == 0 {
        return Ok(());
    }
    if num_per_host == 0 {
        return Err(HostPoolError::ZeroPerHost { count });
    }

    let needed = count.div_ceil(num_per_host);
    if needed > hosts.len() {
        return Err(HostPoolError::Insufficient {
            count,
            num_per_host,
            needed,
            available: hosts.len(),
        });
    }

    Ok(())
}

/// assign every process ordinal its host, filling each host before moving on
pub fn assign_hosts(cfg: &WritersConfig) -> Result<Vec<String>, HostPoolError> {
    check_host_pool(cfg.count, cfg.num_per_host, &cfg.hosts)?;

    Ok((0..cfg.count)
        .map(|ordinal| cfg.hosts[ordinal / cfg.num_per_host].clone())
        .collect())
}
